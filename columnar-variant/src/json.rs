// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Conversions between JSON values and Arrow columns

use crate::types::{least_common_type, list_of};
use arrow_array::builder::{
    BooleanBuilder, Float64Builder, Int64Builder, StringBuilder, UInt64Builder,
};
use arrow_array::cast::AsArray;
use arrow_array::types::{Float64Type, Int64Type, UInt64Type};
use arrow_array::{Array, ArrayRef, GenericListArray, ListArray, NullArray, OffsetSizeTrait};
use arrow_buffer::{NullBufferBuilder, OffsetBuffer};
use arrow_cast::cast::cast;
use arrow_cast::display::{ArrayFormatter, FormatOptions};
use arrow_schema::{ArrowError, DataType};
use serde_json::{Number, Value};
use std::sync::Arc;

/// Returns the column type a single JSON value is stored as.
///
/// Objects only reach a column when nested in an array, in which case they
/// are kept as JSON text.
pub fn infer_json_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::Null,
        Value::Bool(_) => DataType::Boolean,
        Value::Number(n) if n.is_i64() => DataType::Int64,
        Value::Number(n) if n.is_u64() => DataType::UInt64,
        Value::Number(_) => DataType::Float64,
        Value::String(_) => DataType::Utf8,
        Value::Array(items) => list_of(items.iter().fold(DataType::Null, |acc, item| {
            least_common_type(&acc, &infer_json_type(item))
        })),
        Value::Object(_) => DataType::Utf8,
    }
}

/// Converts a run of JSON values into a column of `data_type`.
///
/// JSON `null` becomes a null slot. Values are coerced along the widening
/// rules of [`least_common_type`]; anything stored into `Utf8` that is not
/// already a string is written as its JSON text.
pub fn json_values_to_array(
    values: &[Value],
    data_type: &DataType,
) -> Result<ArrayRef, ArrowError> {
    let values: Vec<&Value> = values.iter().collect();
    values_to_array(&values, data_type)
}

fn values_to_array(values: &[&Value], data_type: &DataType) -> Result<ArrayRef, ArrowError> {
    let array: ArrayRef = match data_type {
        DataType::Null => Arc::new(NullArray::new(values.len())),
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(values.len());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Bool(b) => builder.append_value(*b),
                    other => return Err(conversion_error(other, data_type)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(values.len());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Bool(b) => builder.append_value(i64::from(*b)),
                    Value::Number(n) => match n.as_i64() {
                        Some(v) => builder.append_value(v),
                        None => return Err(conversion_error(value, data_type)),
                    },
                    other => return Err(conversion_error(other, data_type)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::UInt64 => {
            let mut builder = UInt64Builder::with_capacity(values.len());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Bool(b) => builder.append_value(u64::from(*b)),
                    Value::Number(n) => match n.as_u64() {
                        Some(v) => builder.append_value(v),
                        None => return Err(conversion_error(value, data_type)),
                    },
                    other => return Err(conversion_error(other, data_type)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(values.len());
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::Bool(b) => builder.append_value(if *b { 1.0 } else { 0.0 }),
                    Value::Number(n) => match n.as_f64() {
                        Some(v) => builder.append_value(v),
                        None => return Err(conversion_error(value, data_type)),
                    },
                    other => return Err(conversion_error(other, data_type)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(values.len(), values.len() * 8);
            for value in values {
                match value {
                    Value::Null => builder.append_null(),
                    Value::String(s) => builder.append_value(s),
                    other => builder.append_value(other.to_string()),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::List(field) => {
            let mut lengths = Vec::with_capacity(values.len());
            let mut nulls = NullBufferBuilder::new(values.len());
            let mut children = Vec::new();
            for value in values {
                match value {
                    Value::Null => {
                        nulls.append_null();
                        lengths.push(0);
                    }
                    Value::Array(items) => {
                        nulls.append_non_null();
                        lengths.push(items.len());
                        children.extend(items.iter());
                    }
                    other => return Err(conversion_error(other, data_type)),
                }
            }
            let child = values_to_array(&children, field.data_type())?;
            Arc::new(ListArray::try_new(
                field.clone(),
                OffsetBuffer::from_lengths(lengths),
                child,
                nulls.finish(),
            )?)
        }
        other => {
            return Err(ArrowError::NotYetImplemented(format!(
                "Converting JSON values to {other}"
            )))
        }
    };
    Ok(array)
}

fn conversion_error(value: &Value, data_type: &DataType) -> ArrowError {
    ArrowError::JsonError(format!("Cannot store JSON value {value} as {data_type}"))
}

/// Reads the value at `row` of `array` back as JSON.
///
/// Null slots read as `Value::Null`. Types without a natural JSON mapping
/// are rendered with Arrow's display formatting.
pub fn array_value_to_json(array: &dyn Array, row: usize) -> Result<Value, ArrowError> {
    if matches!(array.data_type(), DataType::Null) || array.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match array.data_type() {
        DataType::Boolean => Value::Bool(array.as_boolean().value(row)),
        DataType::Int64 => Value::from(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt64 => Value::from(array.as_primitive::<UInt64Type>().value(row)),
        DataType::Float64 => float_to_json(array.as_primitive::<Float64Type>().value(row)),
        dt if dt.is_integer() => {
            let widened = cast(&array.slice(row, 1), &DataType::Int64)?;
            Value::from(widened.as_primitive::<Int64Type>().value(0))
        }
        dt if dt.is_floating() => {
            let widened = cast(&array.slice(row, 1), &DataType::Float64)?;
            float_to_json(widened.as_primitive::<Float64Type>().value(0))
        }
        DataType::Utf8 => Value::from(array.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => Value::from(array.as_string::<i64>().value(row)),
        DataType::Utf8View => Value::from(array.as_string_view().value(row)),
        DataType::List(_) => list_value_to_json(array.as_list::<i32>(), row)?,
        DataType::LargeList(_) => list_value_to_json(array.as_list::<i64>(), row)?,
        _ => {
            let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
            Value::String(formatter.value(row).to_string())
        }
    };
    Ok(value)
}

fn list_value_to_json<O: OffsetSizeTrait>(
    list: &GenericListArray<O>,
    row: usize,
) -> Result<Value, ArrowError> {
    let items = list.value(row);
    let values = (0..items.len())
        .map(|i| array_value_to_json(items.as_ref(), i))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(values))
}

fn float_to_json(v: f64) -> Value {
    Number::from_f64(v).map_or(Value::Null, Value::Number)
}
