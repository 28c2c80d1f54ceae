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

//! Columnar storage for semi-structured (variant) values.
//!
//! A [`VariantColumn`] stores one batch of variant values either as a single
//! root subcolumn, typically raw JSON text, or decomposed into one typed
//! [`Subcolumn`] per field path, organized in a [`SubcolumnTree`].
//!
//! ```
//! # use columnar_variant::{VariantColumn, VariantPath};
//! # use serde_json::json;
//! let mut column = VariantColumn::new();
//! column.insert_json(&json!({"a": {"b": 1}})).unwrap();
//! column.insert_json(&json!({"a": {"b": 2}, "c": "x"})).unwrap();
//! column.finalize().unwrap();
//!
//! let path = VariantPath::parse("a.b").unwrap();
//! assert!(column.subcolumns().find_exact(&path).is_some());
//! assert_eq!(column.value(1).unwrap(), json!({"a": {"b": 2}, "c": "x"}));
//! ```

pub mod column;
pub mod json;
mod path;
mod subcolumn;
pub mod tree;
pub mod types;
mod variant;

pub use column::{Column, ColumnBuilder};
pub use path::{PathElement, VariantPath};
pub use subcolumn::Subcolumn;
pub use tree::{NodeKind, SubcolumnNode, SubcolumnTree};
pub use variant::VariantColumn;
