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

//! The `element_at` kernel: extract the value at a path from every row of a
//! variant column

use crate::json_path::JsonPath;
use arrow_array::builder::StringBuilder;
use arrow_array::cast::AsArray;
use arrow_array::Array;
use arrow_buffer::NullBuffer;
use arrow_schema::{ArrowError, DataType};
use columnar_variant::column::resize_nulls;
use columnar_variant::types::is_string_type;
use columnar_variant::{Column, SubcolumnTree, VariantColumn, VariantPath};
use serde_json::Value;
use std::borrow::Cow;
use std::sync::Arc;

/// Extracts `field_name` from every row of `src`, without row-level null
/// wrapping.
///
/// * A column without any subcolumn yields a null-rooted column.
/// * A scalar-rooted column of strings is read as JSON text: each row is
///   parsed and the path `$.<field_name>` is evaluated. Rows that fail to
///   parse, miss the path or find a JSON `null` yield an empty string. Found
///   values are stored as JSON text, except booleans which are stored as
///   `"1"` / `"0"`. Only a null source row yields a null slot.
/// * Otherwise the subcolumns under `field_name` are re-rooted into a new
///   column. A path absent from the tree yields a null-rooted column.
///
/// The result is always finalized. `src` is never modified.
pub fn variant_element(src: &VariantColumn, field_name: &str) -> Result<VariantColumn, ArrowError> {
    let src = if src.is_finalized() {
        Cow::Borrowed(src)
    } else {
        Cow::Owned(src.clone_finalized()?)
    };
    let num_rows = src.len();
    if src.subcolumns().is_empty() {
        return VariantColumn::create_empty_with_rows(num_rows).clone_finalized();
    }

    if src.is_scalar_variant() && is_string_type(&src.root_type()) {
        if let Some(root) = src.root() {
            return extract_from_json_text(root.get_finalized_column()?.as_ref(), field_name);
        }
    }

    let path = variant_path_of(field_name)?;
    let mut result = match src.subcolumns().find_exact(&path) {
        Some(node) => {
            let leaves = node.leaves_under();
            let subcolumns = SubcolumnTree::rebuild_stripping_prefix(&leaves);
            VariantColumn::from_subcolumns(subcolumns, num_rows)?
        }
        None => {
            tracing::debug!(path = %path, rows = num_rows, "path not found in variant column");
            VariantColumn::create_empty_with_rows(num_rows)
        }
    };
    result.finalize()?;
    Ok(result)
}

/// Adds the row-level null buffer of an extraction result.
///
/// A null-rooted result is null in every row. A scalar-rooted result reuses
/// the null buffer of its root. Any other result gets a buffer without nulls.
pub fn wrap_variant_nullable(result: VariantColumn) -> Result<VariantColumn, ArrowError> {
    let num_rows = result.len();
    let nulls = if result.is_null_root() {
        NullBuffer::new_null(num_rows)
    } else {
        match result.root().map(|root| root.get_finalized_column()).transpose()? {
            Some(column) => match column.logical_nulls() {
                Some(nulls) => resize_nulls(&nulls, num_rows),
                None => NullBuffer::new_valid(num_rows),
            },
            None => NullBuffer::new_valid(num_rows),
        }
    };
    result.with_nulls(Some(nulls))
}

/// Extracts the field named by the constant string in `field` from the
/// variant column `input`.
///
/// `field` must be a string array whose first value is the field name; an
/// empty name selects the whole value. Row-level nulls of `input` are kept
/// in the result.
pub fn element_at(input: &Column, field: &dyn Array) -> Result<Column, ArrowError> {
    let Some(variant) = input.as_variant() else {
        return Err(ArrowError::InvalidArgumentError(format!(
            "element_at is not supported for type {}, expected Variant",
            input.type_name()
        )));
    };
    if !is_string_type(field.data_type()) {
        return Err(ArrowError::InvalidArgumentError(format!(
            "element_at field name of type {} is not supported, expected a string",
            field.data_type()
        )));
    }
    let Some(field_name) = string_value(field, 0) else {
        return Err(ArrowError::InvalidArgumentError(
            "element_at expects a constant, non-null field name".to_string(),
        ));
    };

    let result = wrap_variant_nullable(variant_element(variant, field_name)?)?;
    let nulls = NullBuffer::union(result.nulls(), variant.nulls());
    Ok(Column::from(result.with_nulls(nulls)?))
}

fn extract_from_json_text(
    texts: &dyn Array,
    field_name: &str,
) -> Result<VariantColumn, ArrowError> {
    let path = JsonPath::compile(&json_path_of(field_name))?;
    let mut builder = StringBuilder::with_capacity(texts.len(), texts.len() * 8);
    for row in 0..texts.len() {
        let Some(text) = string_value(texts, row) else {
            builder.append_null();
            continue;
        };
        match serde_json::from_str::<Value>(text) {
            Ok(document) => match path.evaluate(&document) {
                Some(Value::Null) | None => builder.append_value(""),
                Some(Value::Bool(b)) => builder.append_value(if *b { "1" } else { "0" }),
                Some(value) => builder.append_value(value.to_string()),
            },
            Err(e) => {
                tracing::debug!(row, path = %path, error = %e, "failed to parse JSON text");
                builder.append_value("");
            }
        }
    }
    let mut result = VariantColumn::from_root(Arc::new(builder.finish()));
    result.finalize()?;
    Ok(result)
}

/// `$` for the empty name, the name itself if it is already a JSON path,
/// and `$.<name>` otherwise
fn json_path_of(field_name: &str) -> Cow<'_, str> {
    if field_name.is_empty() {
        Cow::Borrowed("$")
    } else if field_name.starts_with('$') {
        Cow::Borrowed(field_name)
    } else {
        Cow::Owned(format!("$.{field_name}"))
    }
}

/// The subcolumn path for a field name, accepting an optional leading `$.`
fn variant_path_of(field_name: &str) -> Result<VariantPath, ArrowError> {
    let path = match field_name.strip_prefix('$') {
        Some(rest) => rest.strip_prefix('.').unwrap_or(rest),
        None => field_name,
    };
    VariantPath::parse(path)
}

fn string_value(array: &dyn Array, row: usize) -> Option<&str> {
    if row >= array.len() || array.is_null(row) {
        return None;
    }
    match array.data_type() {
        DataType::Utf8 => Some(array.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => Some(array.as_string::<i64>().value(row)),
        DataType::Utf8View => Some(array.as_string_view().value(row)),
        _ => None,
    }
}
