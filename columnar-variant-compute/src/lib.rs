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

//! Kernels over [`VariantColumn`](columnar_variant::VariantColumn)s: field
//! extraction with [`element_at`] and array expansion with
//! [`ExplodeTableFunction`].
//!
//! ```
//! # use std::sync::Arc;
//! # use arrow_array::{ArrayRef, StringArray};
//! # use columnar_variant::{Column, VariantColumn};
//! # use columnar_variant_compute::element_at;
//! let texts: ArrayRef = Arc::new(StringArray::from(vec![r#"{"a": {"b": 1}}"#]));
//! let input = Column::from(VariantColumn::from_root(texts));
//! let result = element_at(&input, &StringArray::from(vec!["a.b"])).unwrap();
//! assert_eq!(result.as_variant().unwrap().to_json_string(0).unwrap(), r#""1""#);
//! ```

mod explode;
mod from_json;
pub mod json_path;
pub mod table_function;
mod variant_element;

pub use explode::ExplodeTableFunction;
pub use from_json::batch_json_string_to_variant;
pub use table_function::{expand, ExpandOptions, ExpandedColumn, TableFunction};
pub use variant_element::{element_at, variant_element, wrap_variant_nullable};
