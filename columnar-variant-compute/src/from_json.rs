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

//! Module for transforming a batch of JSON strings into a decomposed
//! [`VariantColumn`]

use arrow_array::cast::AsArray;
use arrow_array::{Array, ArrayRef};
use arrow_schema::{ArrowError, DataType};
use columnar_variant::VariantColumn;
use serde_json::Value;

/// Parse a batch of JSON strings into a variant column whose objects are
/// decomposed into one subcolumn per path. Null strings become null rows.
/// The JSON strings in the input must be valid.
pub fn batch_json_string_to_variant(input: &ArrayRef) -> Result<VariantColumn, ArrowError> {
    let mut variant = VariantColumn::new();
    let mut append = |text: Option<&str>| -> Result<(), ArrowError> {
        match text {
            Some(text) => {
                let value: Value = serde_json::from_str(text)
                    .map_err(|e| ArrowError::JsonError(format!("Invalid JSON {text:?}: {e}")))?;
                variant.insert_json(&value)
            }
            None => {
                variant.insert_default();
                Ok(())
            }
        }
    };
    match input.data_type() {
        DataType::Utf8 => input.as_string::<i32>().iter().try_for_each(&mut append)?,
        DataType::LargeUtf8 => input.as_string::<i64>().iter().try_for_each(&mut append)?,
        DataType::Utf8View => input.as_string_view().iter().try_for_each(&mut append)?,
        other => {
            return Err(ArrowError::CastError(format!(
                "Expected a string array as input, got {other}"
            )))
        }
    }

    let nulls = input.logical_nulls();
    let mut variant = variant.with_nulls(nulls)?;
    variant.finalize()?;
    Ok(variant)
}
