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

//! Type rules shared by subcolumns: the "nothing" sentinel and least common types

use arrow_schema::{DataType, Field};
use std::sync::Arc;

/// Returns true if `data_type` is the sentinel type for "no data"
pub fn is_nothing(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Null)
}

/// Returns true if values of `data_type` are text
pub fn is_string_type(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

/// Returns true if `data_type` is a variable length list
pub fn is_list_type(data_type: &DataType) -> bool {
    matches!(data_type, DataType::List(_) | DataType::LargeList(_))
}

/// Returns the element type of a list type
pub fn list_item_type(data_type: &DataType) -> Option<&DataType> {
    match data_type {
        DataType::List(field) | DataType::LargeList(field) => Some(field.data_type()),
        _ => None,
    }
}

/// Creates a `List` type whose elements are always nullable
pub fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new_list_field(item, true)))
}

/// Returns the narrowest type that can hold values of both `a` and `b`.
///
/// Numeric types widen along `Boolean < Int64 < Float64`, mixing `UInt64`
/// with a signed type goes to `Float64`, lists unify element-wise, and any
/// other mix falls back to `Utf8` holding JSON text. [`DataType::Null`] is
/// the identity.
pub fn least_common_type(a: &DataType, b: &DataType) -> DataType {
    use DataType::*;
    match (a, b) {
        (a, b) if a == b => a.clone(),
        (Null, other) | (other, Null) => other.clone(),
        (Boolean, Int64) | (Int64, Boolean) => Int64,
        (Boolean, UInt64) | (UInt64, Boolean) => UInt64,
        (Boolean | Int64 | UInt64, Float64) | (Float64, Boolean | Int64 | UInt64) => Float64,
        (Int64, UInt64) | (UInt64, Int64) => Float64,
        (List(a), List(b)) => list_of(least_common_type(a.data_type(), b.data_type())),
        _ => Utf8,
    }
}
