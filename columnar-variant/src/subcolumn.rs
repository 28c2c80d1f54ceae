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

//! [`Subcolumn`]: one typed, nullable data stream of a variant column

use crate::json::{array_value_to_json, infer_json_type, json_values_to_array};
use crate::types::{is_string_type, least_common_type};
use arrow_array::builder::StringBuilder;
use arrow_array::{new_empty_array, new_null_array, Array, ArrayRef};
use arrow_cast::cast::cast;
use arrow_schema::{ArrowError, DataType};
use arrow_select::concat::concat;
use serde_json::Value;
use std::sync::Arc;

/// A contiguous run of rows that share one representation until finalization
#[derive(Debug, Clone)]
enum Part {
    /// Rows inserted one value at a time, converted at finalization
    Values(Vec<Value>),
    /// Rows copied in as an already materialized column
    Array(ArrayRef),
}

/// A single typed, nullable data stream of a [`VariantColumn`].
///
/// While a batch is being built, rows of different JSON types can be
/// inserted; the subcolumn only tracks the least common type of everything it
/// has seen. [`Subcolumn::finalize`] then materializes all rows into one
/// dense column of that type. Defaults are null slots.
///
/// [`VariantColumn`]: crate::VariantColumn
#[derive(Debug, Clone)]
pub struct Subcolumn {
    parts: Vec<Part>,
    least_common_type: DataType,
    /// Defaults inserted before the first real value
    num_of_defaults_in_prefix: usize,
    len: usize,
}

impl Default for Subcolumn {
    fn default() -> Self {
        Self::new()
    }
}

impl Subcolumn {
    /// Creates an empty subcolumn of the "nothing" type
    pub fn new() -> Self {
        Self::with_defaults(0)
    }

    /// Creates a subcolumn holding `len` defaults
    pub fn with_defaults(len: usize) -> Self {
        Self {
            parts: vec![],
            least_common_type: DataType::Null,
            num_of_defaults_in_prefix: len,
            len,
        }
    }

    /// Creates a finalized subcolumn backed by `array`
    pub fn from_array(array: ArrayRef) -> Self {
        Self {
            least_common_type: array.data_type().clone(),
            len: array.len(),
            parts: vec![Part::Array(array)],
            num_of_defaults_in_prefix: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The type every row will have once finalized
    pub fn least_common_type(&self) -> &DataType {
        &self.least_common_type
    }

    pub fn num_of_defaults_in_prefix(&self) -> usize {
        self.num_of_defaults_in_prefix
    }

    /// Appends one JSON value, widening the least common type if needed
    pub fn insert(&mut self, value: &Value) {
        if value.is_null() {
            self.insert_default();
            return;
        }
        let value_type = infer_json_type(value);
        self.least_common_type = least_common_type(&self.least_common_type, &value_type);
        match self.parts.last_mut() {
            Some(Part::Values(values)) => values.push(value.clone()),
            _ => self.parts.push(Part::Values(vec![value.clone()])),
        }
        self.len += 1;
    }

    pub fn insert_default(&mut self) {
        self.insert_many_defaults(1)
    }

    pub fn insert_many_defaults(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        match self.parts.last_mut() {
            None => self.num_of_defaults_in_prefix += n,
            Some(Part::Values(values)) => values.extend(std::iter::repeat_n(Value::Null, n)),
            Some(Part::Array(_)) => self.parts.push(Part::Values(vec![Value::Null; n])),
        }
        self.len += n;
    }

    /// Appends rows `start..start + length` of the finalized `src`
    pub fn insert_range_from(
        &mut self,
        src: &Subcolumn,
        start: usize,
        length: usize,
    ) -> Result<(), ArrowError> {
        let column = src.get_finalized_column()?;
        if start.checked_add(length).is_none_or(|end| end > column.len()) {
            return Err(ArrowError::InvalidArgumentError(format!(
                "Range {start}+{length} is out of bounds for subcolumn of length {}",
                column.len()
            )));
        }
        if length == 0 {
            return Ok(());
        }
        self.least_common_type = least_common_type(&self.least_common_type, &src.least_common_type);
        self.parts.push(Part::Array(column.slice(start, length)));
        self.len += length;
        Ok(())
    }

    /// Returns true once all rows live in one column of the least common type
    pub fn is_finalized(&self) -> bool {
        self.num_of_defaults_in_prefix == 0
            && matches!(
                self.parts.as_slice(),
                [Part::Array(array)] if array.data_type() == &self.least_common_type
            )
    }

    /// Materializes all rows into one dense column of the least common type
    pub fn finalize(&mut self) -> Result<(), ArrowError> {
        if self.is_finalized() {
            return Ok(());
        }
        let target = self.least_common_type.clone();
        let mut chunks = Vec::with_capacity(self.parts.len() + 1);
        if self.num_of_defaults_in_prefix > 0 {
            chunks.push(new_null_array(&target, self.num_of_defaults_in_prefix));
        }
        for part in &self.parts {
            let chunk = match part {
                Part::Values(values) => json_values_to_array(values, &target)?,
                Part::Array(array) if array.data_type() == &target => array.clone(),
                Part::Array(array)
                    if target == DataType::Utf8 && !is_string_type(array.data_type()) =>
                {
                    to_json_text(array.as_ref())?
                }
                Part::Array(array) => cast(array, &target)?,
            };
            chunks.push(chunk);
        }
        let column = match chunks.as_slice() {
            [] => new_empty_array(&target),
            [single] => single.clone(),
            _ => {
                let refs: Vec<&dyn Array> = chunks.iter().map(|c| c.as_ref()).collect();
                concat(&refs)?
            }
        };
        debug_assert_eq!(column.len(), self.len);
        self.parts = vec![Part::Array(column)];
        self.num_of_defaults_in_prefix = 0;
        Ok(())
    }

    /// Returns the materialized column; fails if not yet finalized
    pub fn get_finalized_column(&self) -> Result<&ArrayRef, ArrowError> {
        match self.parts.as_slice() {
            [Part::Array(array)] if self.is_finalized() => Ok(array),
            _ => Err(ArrowError::InvalidArgumentError(
                "Subcolumn must be finalized before it is read".to_string(),
            )),
        }
    }
}

/// Writes every row of `array` as its JSON text, keeping null slots
fn to_json_text(array: &dyn Array) -> Result<ArrayRef, ArrowError> {
    let mut builder = StringBuilder::with_capacity(array.len(), array.len() * 8);
    for row in 0..array.len() {
        match array_value_to_json(array, row)? {
            Value::Null => builder.append_null(),
            value => builder.append_value(value.to_string()),
        }
    }
    Ok(Arc::new(builder.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::list_of;
    use arrow_array::cast::AsArray;
    use arrow_array::types::{Float64Type, Int64Type};
    use arrow_array::{Int64Array, StringArray};
    use serde_json::json;

    #[test]
    fn defaults_only_finalize_to_nothing() {
        let mut subcolumn = Subcolumn::with_defaults(3);
        subcolumn.insert_default();
        subcolumn.finalize().unwrap();
        let column = subcolumn.get_finalized_column().unwrap();
        assert_eq!(column.data_type(), &DataType::Null);
        assert_eq!(column.len(), 4);
    }

    #[test]
    fn mixed_numbers_widen_to_float() {
        let mut subcolumn = Subcolumn::new();
        subcolumn.insert_default();
        subcolumn.insert(&json!(1));
        subcolumn.insert(&json!(null));
        subcolumn.insert(&json!(2.5));
        assert!(!subcolumn.is_finalized());
        assert_eq!(subcolumn.least_common_type(), &DataType::Float64);

        subcolumn.finalize().unwrap();
        let column = subcolumn.get_finalized_column().unwrap();
        let values: Vec<_> = column.as_primitive::<Float64Type>().iter().collect();
        assert_eq!(values, vec![None, Some(1.0), None, Some(2.5)]);
    }

    #[test]
    fn conflicting_types_become_text() {
        let mut subcolumn = Subcolumn::new();
        subcolumn.insert(&json!(1));
        subcolumn.insert(&json!("two"));
        subcolumn.insert(&json!([3]));
        subcolumn.finalize().unwrap();
        let column = subcolumn.get_finalized_column().unwrap();
        let expected = StringArray::from(vec!["1", "two", "[3]"]);
        assert_eq!(column.as_string::<i32>(), &expected);
    }

    #[test]
    fn reading_before_finalize_fails() {
        let mut subcolumn = Subcolumn::new();
        subcolumn.insert(&json!(1));
        let err = subcolumn.get_finalized_column().unwrap_err();
        assert!(err.to_string().contains("finalized"), "{err}");
    }

    #[test]
    fn insert_range_from_casts_parts() {
        let src = Subcolumn::from_array(Arc::new(Int64Array::from(vec![10, 20, 30])));
        assert!(src.is_finalized());

        let mut dst = Subcolumn::new();
        dst.insert(&json!(0.5));
        dst.insert_range_from(&src, 1, 2).unwrap();
        dst.insert_default();
        assert_eq!(dst.len(), 4);
        assert_eq!(dst.least_common_type(), &DataType::Float64);

        dst.finalize().unwrap();
        let values: Vec<_> = dst
            .get_finalized_column()
            .unwrap()
            .as_primitive::<Float64Type>()
            .iter()
            .collect();
        assert_eq!(values, vec![Some(0.5), Some(20.0), Some(30.0), None]);

        // lists widened to text are written as JSON, matching inserted values
        let mut lists = Subcolumn::new();
        lists.insert(&json!([1, 2]));
        lists.insert_default();
        lists.finalize().unwrap();

        let mut merged = Subcolumn::new();
        merged.insert(&json!("s"));
        merged.insert_range_from(&lists, 0, 2).unwrap();
        merged.insert(&json!(true));
        merged.finalize().unwrap();

        let mut direct = Subcolumn::new();
        direct.insert(&json!("s"));
        direct.insert(&json!([1, 2]));
        direct.insert_default();
        direct.insert(&json!(true));
        direct.finalize().unwrap();

        let merged = merged.get_finalized_column().unwrap();
        let direct = direct.get_finalized_column().unwrap();
        let expected = StringArray::from(vec![Some("s"), Some("[1,2]"), None, Some("true")]);
        assert_eq!(merged.as_string::<i32>(), &expected);
        assert_eq!(direct.as_string::<i32>(), &expected);
    }

    #[test]
    fn insert_range_from_checks_bounds() {
        let src = Subcolumn::from_array(Arc::new(Int64Array::from(vec![1])));
        let mut dst = Subcolumn::new();
        assert!(dst.insert_range_from(&src, 0, 2).is_err());
        let err = dst.insert_range_from(&src, 1, usize::MAX).unwrap_err();
        assert!(matches!(err, ArrowError::InvalidArgumentError(_)));
        assert!(dst.is_empty());
    }

    #[test]
    fn insert_range_into_defaults_keeps_source_type() {
        let src = Subcolumn::from_array(Arc::new(Int64Array::from(vec![5, 6])));
        let mut dst = Subcolumn::with_defaults(2);
        dst.insert_range_from(&src, 0, 2).unwrap();
        dst.finalize().unwrap();
        let column = dst.get_finalized_column().unwrap();
        let expected = Int64Array::from(vec![None, None, Some(5), Some(6)]);
        assert_eq!(column.as_primitive::<Int64Type>(), &expected);
    }

    #[test]
    fn arrays_become_list_columns() {
        let mut subcolumn = Subcolumn::new();
        subcolumn.insert(&json!([1, 2]));
        subcolumn.insert(&json!([]));
        subcolumn.finalize().unwrap();
        assert_eq!(subcolumn.least_common_type(), &list_of(DataType::Int64));
        let list = subcolumn.get_finalized_column().unwrap().as_list::<i32>();
        assert_eq!(list.value_offsets(), &[0, 2, 2]);
    }
}
