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

//! [`VariantColumn`]: a column of semi-structured values decomposed into
//! typed subcolumns

use crate::column::resize_nulls;
use crate::json::array_value_to_json;
use crate::path::{PathElement, VariantPath};
use crate::subcolumn::Subcolumn;
use crate::tree::{NodeKind, SubcolumnNode, SubcolumnTree};
use crate::types::is_nothing;
use arrow_array::ArrayRef;
use arrow_buffer::{NullBuffer, NullBufferBuilder};
use arrow_schema::{ArrowError, DataType};
use serde_json::{Map, Value};

/// A column of variant values.
///
/// The values of a batch are stored in a [`SubcolumnTree`]. A tree whose
/// only entry is the root holds one value per row, commonly raw JSON text
/// that has not been decomposed yet; otherwise every leaf holds one field
/// of the decomposed objects. All leaves have one slot per row.
///
/// A column is built by appending rows (see [`Self::insert_json`]) and then
/// [finalized](Self::finalize), after which it is read-only. Path lookups
/// and extraction expect a finalized column.
///
/// An optional [`NullBuffer`] marks rows whose whole value is null,
/// independently of the nulls inside the subcolumns.
#[derive(Debug, Clone, Default)]
pub struct VariantColumn {
    subcolumns: SubcolumnTree,
    num_rows: usize,
    nulls: Option<NullBuffer>,
}

impl VariantColumn {
    /// Creates an empty column without any subcolumn
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a null-rooted column of `num_rows` rows: the root holds only
    /// defaults, so every row reads back as null
    pub fn create_empty_with_rows(num_rows: usize) -> Self {
        let mut subcolumns = SubcolumnTree::new();
        subcolumns.create_root(Subcolumn::with_defaults(num_rows));
        Self {
            subcolumns,
            num_rows,
            nulls: None,
        }
    }

    /// Creates a scalar-rooted column holding `array` as its root
    pub fn from_root(array: ArrayRef) -> Self {
        let num_rows = array.len();
        let mut subcolumns = SubcolumnTree::new();
        subcolumns.create_root(Subcolumn::from_array(array));
        Self {
            subcolumns,
            num_rows,
            nulls: None,
        }
    }

    /// Creates a column from an existing tree, checking that every leaf has
    /// `num_rows` slots
    pub fn from_subcolumns(subcolumns: SubcolumnTree, num_rows: usize) -> Result<Self, ArrowError> {
        if let Some(leaf) = subcolumns
            .leaves()
            .into_iter()
            .find(|leaf| leaf.data().is_some_and(|data| data.len() != num_rows))
        {
            return Err(ArrowError::InvalidArgumentError(format!(
                "Subcolumn '{}' has {} rows, expected {num_rows}",
                leaf.path(),
                leaf.data().map(Subcolumn::len).unwrap_or_default()
            )));
        }
        Ok(Self {
            subcolumns,
            num_rows,
            nulls: None,
        })
    }

    pub fn len(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn subcolumns(&self) -> &SubcolumnTree {
        &self.subcolumns
    }

    /// The root subcolumn, if this column is scalar-rooted
    pub fn root(&self) -> Option<&Subcolumn> {
        self.subcolumns.root().and_then(SubcolumnNode::data)
    }

    /// The type of the root node: the root subcolumn's type, a struct for a
    /// decomposed column, or [`DataType::Null`] without any data
    pub fn root_type(&self) -> DataType {
        self.subcolumns
            .root()
            .map(SubcolumnNode::data_type)
            .unwrap_or(DataType::Null)
    }

    /// Returns true if this column carries no information: there is no
    /// subcolumn, or the root has never held a value
    pub fn is_null_root(&self) -> bool {
        match self.subcolumns.root().map(SubcolumnNode::kind) {
            None => true,
            Some(NodeKind::Leaf(data)) => is_nothing(data.least_common_type()),
            Some(NodeKind::Branch(children)) => children.is_empty(),
        }
    }

    /// Returns true if the root is the only subcolumn
    pub fn is_scalar_variant(&self) -> bool {
        self.subcolumns.root().is_some_and(SubcolumnNode::is_leaf)
    }

    pub fn is_finalized(&self) -> bool {
        self.subcolumns.is_finalized()
    }

    /// Unifies the type of every subcolumn and materializes its values
    pub fn finalize(&mut self) -> Result<(), ArrowError> {
        self.subcolumns.finalize()
    }

    /// Returns a finalized copy of this column
    pub fn clone_finalized(&self) -> Result<Self, ArrowError> {
        let mut finalized = self.clone();
        finalized.finalize()?;
        Ok(finalized)
    }

    /// The rows whose whole value is null, if any
    pub fn nulls(&self) -> Option<&NullBuffer> {
        self.nulls.as_ref()
    }

    /// Replaces the row-level null buffer
    pub fn with_nulls(mut self, nulls: Option<NullBuffer>) -> Result<Self, ArrowError> {
        if let Some(nulls) = &nulls {
            if nulls.len() != self.num_rows {
                return Err(ArrowError::InvalidArgumentError(format!(
                    "Null buffer of length {} does not match variant column of length {}",
                    nulls.len(),
                    self.num_rows
                )));
            }
        }
        self.nulls = nulls;
        Ok(self)
    }

    pub fn is_null(&self, row: usize) -> bool {
        self.nulls.as_ref().is_some_and(|nulls| nulls.is_null(row))
    }

    /// Appends one row.
    ///
    /// Objects are decomposed: every non-null field at any depth is stored
    /// in the subcolumn at its path. Any other value is stored in the root.
    /// Null values and empty objects append a default row.
    pub fn insert_json(&mut self, value: &Value) -> Result<(), ArrowError> {
        let mut entries = vec![];
        flatten(VariantPath::root(), value, &mut entries);
        if entries.is_empty() {
            self.insert_default();
            return Ok(());
        }
        for (path, _) in &entries {
            self.subcolumns.check_leaf_path(path)?;
        }
        for (path, value) in entries {
            self.subcolumns
                .get_or_create_leaf(&path, self.num_rows)?
                .insert(value);
        }
        self.pad_leaves(self.num_rows + 1);
        Ok(())
    }

    pub fn insert_default(&mut self) {
        self.insert_many_defaults(1)
    }

    pub fn insert_many_defaults(&mut self, n: usize) {
        if self.subcolumns.is_empty() {
            self.subcolumns
                .create_root(Subcolumn::with_defaults(self.num_rows));
        }
        self.pad_leaves(self.num_rows + n);
    }

    /// Appends rows `start..start + length` of the finalized `src`, merging
    /// its subcolumns into this column's tree
    pub fn insert_range_from(
        &mut self,
        src: &VariantColumn,
        start: usize,
        length: usize,
    ) -> Result<(), ArrowError> {
        if start.checked_add(length).is_none_or(|end| end > src.num_rows) {
            return Err(ArrowError::InvalidArgumentError(format!(
                "Range {start}+{length} is out of bounds for variant column of length {}",
                src.num_rows
            )));
        }
        if !src.is_finalized() {
            return Err(ArrowError::InvalidArgumentError(
                "Cannot copy rows from a variant column that is not finalized".to_string(),
            ));
        }
        // leaves that never held a value only contribute defaults
        let leaves: Vec<_> = src
            .subcolumns
            .leaves()
            .into_iter()
            .filter_map(|leaf| Some((leaf.path(), leaf.data()?)))
            .filter(|(_, data)| !is_nothing(data.least_common_type()))
            .collect();
        for (path, _) in &leaves {
            self.subcolumns.check_leaf_path(path)?;
        }

        let num_rows = self.num_rows;
        let src_nulls = src.nulls.as_ref().map(|nulls| nulls.slice(start, length));
        for (path, data) in leaves {
            self.subcolumns
                .get_or_create_leaf(path, num_rows)?
                .insert_range_from(data, start, length)?;
        }
        self.pad_leaves(num_rows + length);

        if self.nulls.is_some() || src_nulls.is_some() {
            let mut builder = NullBufferBuilder::new(num_rows + length);
            match &self.nulls {
                Some(nulls) => builder.append_buffer(&nulls.slice(0, num_rows)),
                None => builder.append_n_non_nulls(num_rows),
            }
            match &src_nulls {
                Some(nulls) => builder.append_buffer(nulls),
                None => builder.append_n_non_nulls(length),
            }
            self.nulls = builder.finish();
        }
        Ok(())
    }

    /// Pads every leaf with defaults up to `num_rows` rows
    fn pad_leaves(&mut self, num_rows: usize) {
        for leaf in self.subcolumns.leaves_mut() {
            if leaf.len() < num_rows {
                leaf.insert_many_defaults(num_rows - leaf.len());
            }
        }
        self.num_rows = num_rows;
        if let Some(nulls) = &self.nulls {
            self.nulls = Some(resize_nulls(nulls, num_rows));
        }
    }

    /// Reassembles the value of `row` from the finalized subcolumns.
    ///
    /// Null rows, and rows without any non-null field, read back as
    /// [`Value::Null`].
    pub fn value(&self, row: usize) -> Result<Value, ArrowError> {
        if row >= self.num_rows {
            return Err(ArrowError::InvalidArgumentError(format!(
                "Row {row} is out of bounds for variant column of length {}",
                self.num_rows
            )));
        }
        if self.is_null(row) {
            return Ok(Value::Null);
        }
        match self.subcolumns.root() {
            Some(root) => node_value(root, row),
            None => Ok(Value::Null),
        }
    }

    /// The JSON text of `row`
    pub fn to_json_string(&self, row: usize) -> Result<String, ArrowError> {
        Ok(self.value(row)?.to_string())
    }
}

fn flatten<'a>(path: VariantPath, value: &'a Value, out: &mut Vec<(VariantPath, &'a Value)>) {
    match value {
        Value::Null => {}
        Value::Object(fields) => {
            for (name, field) in fields {
                flatten(path.clone().join(name.as_str()), field, out);
            }
        }
        _ => out.push((path, value)),
    }
}

fn node_value(node: &SubcolumnNode, row: usize) -> Result<Value, ArrowError> {
    match node.kind() {
        NodeKind::Leaf(data) => array_value_to_json(data.get_finalized_column()?.as_ref(), row),
        NodeKind::Branch(children) => {
            let mut object = Map::new();
            for (element, child) in children {
                let value = node_value(child, row)?;
                if value.is_null() {
                    continue;
                }
                let name = match element {
                    PathElement::Field(name) => name.clone(),
                    PathElement::Index(index) => index.to_string(),
                };
                object.insert(name, value);
            }
            if object.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Object(object))
            }
        }
    }
}
