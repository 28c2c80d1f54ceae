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

//! The column container surface shared by the variant kernels

use crate::types::is_nothing;
use crate::VariantColumn;
use arrow_array::{make_array, new_empty_array, new_null_array, Array, ArrayRef, UInt32Array};
use arrow_buffer::{NullBuffer, NullBufferBuilder};
use arrow_data::ArrayDataBuilder;
use arrow_schema::{ArrowError, DataType};
use arrow_select::concat::concat;
use arrow_select::take::take;
use std::sync::Arc;

/// A column of a batch: either a plain Arrow array or a variant column
#[derive(Debug, Clone)]
pub enum Column {
    Array(ArrayRef),
    Variant(Arc<VariantColumn>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Array(array) => array.len(),
            Column::Variant(variant) => variant.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_variant(&self) -> bool {
        matches!(self, Column::Variant(_))
    }

    /// The declared type of this column, for messages
    pub fn type_name(&self) -> String {
        match self {
            Column::Array(array) => array.data_type().to_string(),
            Column::Variant(_) => "Variant".to_string(),
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Column::Array(array) => Some(array),
            Column::Variant(_) => None,
        }
    }

    pub fn as_variant(&self) -> Option<&VariantColumn> {
        match self {
            Column::Array(_) => None,
            Column::Variant(variant) => Some(variant),
        }
    }
}

impl From<ArrayRef> for Column {
    fn from(array: ArrayRef) -> Self {
        Column::Array(array)
    }
}

impl From<VariantColumn> for Column {
    fn from(variant: VariantColumn) -> Self {
        Column::Variant(Arc::new(variant))
    }
}

/// Builds a nullable column by appending defaults and copies of other columns.
///
/// Validity is tracked in an explicit [`NullBufferBuilder`]: copying a range
/// copies the matching run of the source's null bitmap, so null values keep
/// their null slot. Defaults are null slots.
#[derive(Debug)]
pub struct ColumnBuilder {
    data_type: DataType,
    chunks: Vec<ArrayRef>,
    pending_defaults: usize,
    nulls: NullBufferBuilder,
    len: usize,
}

impl ColumnBuilder {
    pub fn new(data_type: DataType) -> Self {
        Self::with_capacity(data_type, 1024)
    }

    pub fn with_capacity(data_type: DataType, capacity: usize) -> Self {
        Self {
            data_type,
            chunks: vec![],
            pending_defaults: 0,
            nulls: NullBufferBuilder::new(capacity),
            len: 0,
        }
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert_default(&mut self) {
        self.insert_many_defaults(1)
    }

    pub fn insert_many_defaults(&mut self, n: usize) {
        self.pending_defaults += n;
        self.nulls.append_n_nulls(n);
        self.len += n;
    }

    /// Appends rows `offset..offset + count` of `src`
    pub fn insert_range_from(
        &mut self,
        src: &dyn Array,
        offset: usize,
        count: usize,
    ) -> Result<(), ArrowError> {
        self.check_source(src)?;
        if offset.checked_add(count).is_none_or(|end| end > src.len()) {
            return Err(ArrowError::InvalidArgumentError(format!(
                "Range {offset}+{count} is out of bounds for column of length {}",
                src.len()
            )));
        }
        if count == 0 {
            return Ok(());
        }
        self.push_chunk(src.slice(offset, count));
        Ok(())
    }

    /// Appends row `position` of `src` `length` times
    pub fn insert_many_from(
        &mut self,
        src: &dyn Array,
        position: usize,
        length: usize,
    ) -> Result<(), ArrowError> {
        self.check_source(src)?;
        if position >= src.len() {
            return Err(ArrowError::InvalidArgumentError(format!(
                "Position {position} is out of bounds for column of length {}",
                src.len()
            )));
        }
        if length == 0 {
            return Ok(());
        }
        let index = u32::try_from(position).map_err(|_| {
            ArrowError::InvalidArgumentError(format!("Position {position} exceeds u32"))
        })?;
        let indices = UInt32Array::from_value(index, length);
        self.push_chunk(take(src, &indices, None)?);
        Ok(())
    }

    fn check_source(&self, src: &dyn Array) -> Result<(), ArrowError> {
        if src.data_type() != &self.data_type {
            return Err(ArrowError::InvalidArgumentError(format!(
                "Cannot append {} values to a column of type {}",
                src.data_type(),
                self.data_type
            )));
        }
        Ok(())
    }

    fn push_chunk(&mut self, chunk: ArrayRef) {
        self.flush_defaults();
        match chunk.logical_nulls() {
            Some(nulls) => self.nulls.append_buffer(&nulls),
            None => self.nulls.append_n_non_nulls(chunk.len()),
        }
        self.len += chunk.len();
        self.chunks.push(chunk);
    }

    fn flush_defaults(&mut self) {
        if self.pending_defaults > 0 {
            self.chunks
                .push(new_null_array(&self.data_type, self.pending_defaults));
            self.pending_defaults = 0;
        }
    }

    /// Returns the built column and resets this builder
    pub fn finish(&mut self) -> Result<ArrayRef, ArrowError> {
        self.flush_defaults();
        let chunks = std::mem::take(&mut self.chunks);
        let nulls = self.nulls.finish();
        self.len = 0;

        let values = match chunks.as_slice() {
            [] => new_empty_array(&self.data_type),
            [single] => single.clone(),
            _ => {
                let refs: Vec<&dyn Array> = chunks.iter().map(|c| c.as_ref()).collect();
                concat(&refs)?
            }
        };
        if is_nothing(&self.data_type) {
            // the null type carries no validity buffer
            return Ok(values);
        }
        let builder: ArrayDataBuilder = values.into_data().into_builder().nulls(nulls);
        Ok(make_array(builder.build()?))
    }
}

/// Returns `nulls` truncated or extended to `len`; new slots are valid
pub fn resize_nulls(nulls: &NullBuffer, len: usize) -> NullBuffer {
    if len <= nulls.len() {
        return nulls.slice(0, len);
    }
    let mut builder = NullBufferBuilder::new(len);
    builder.append_buffer(nulls);
    builder.append_n_non_nulls(len - nulls.len());
    builder.finish().unwrap_or_else(|| NullBuffer::new_valid(len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::cast::AsArray;
    use arrow_array::types::Int64Type;
    use arrow_array::{Int64Array, NullArray, StringArray};

    #[test]
    fn defaults_and_ranges() {
        let src = Int64Array::from(vec![Some(1), None, Some(3), Some(4)]);
        let mut builder = ColumnBuilder::new(DataType::Int64);
        builder.insert_default();
        builder.insert_range_from(&src, 0, 3).unwrap();
        builder.insert_many_defaults(2);
        builder.insert_range_from(&src, 3, 1).unwrap();
        assert_eq!(builder.len(), 7);

        let array = builder.finish().unwrap();
        let expected = Int64Array::from(vec![None, Some(1), None, Some(3), None, None, Some(4)]);
        assert_eq!(array.as_primitive::<Int64Type>(), &expected);
        assert!(builder.is_empty());
    }

    #[test]
    fn many_from_repeats_one_row() {
        let src = StringArray::from(vec![Some("a"), None, Some("c")]);
        let mut builder = ColumnBuilder::new(DataType::Utf8);
        builder.insert_many_from(&src, 2, 3).unwrap();
        builder.insert_many_from(&src, 1, 2).unwrap();
        let array = builder.finish().unwrap();
        let expected = StringArray::from(vec![Some("c"), Some("c"), Some("c"), None, None]);
        assert_eq!(array.as_string::<i32>(), &expected);
    }

    #[test]
    fn rejects_mismatched_types_and_bounds() {
        let src = StringArray::from(vec!["a"]);
        let mut builder = ColumnBuilder::new(DataType::Int64);
        assert!(builder.insert_range_from(&src, 0, 1).is_err());

        let src = Int64Array::from(vec![1]);
        assert!(builder.insert_range_from(&src, 0, 2).is_err());
        assert!(builder.insert_range_from(&src, 1, usize::MAX).is_err());
        assert!(builder.insert_many_from(&src, 1, 1).is_err());
        assert!(builder.is_empty());
    }

    #[test]
    fn null_typed_column() {
        let src = NullArray::new(3);
        let mut builder = ColumnBuilder::new(DataType::Null);
        builder.insert_default();
        builder.insert_range_from(&src, 1, 2).unwrap();
        let array = builder.finish().unwrap();
        assert_eq!(array.data_type(), &DataType::Null);
        assert_eq!(array.len(), 3);
    }

    #[test]
    fn empty_builder_finishes_empty() {
        let mut builder = ColumnBuilder::new(DataType::Utf8);
        let array = builder.finish().unwrap();
        assert_eq!(array.len(), 0);
        assert_eq!(array.data_type(), &DataType::Utf8);
    }

    #[test]
    fn resize_nulls_truncates_and_pads() {
        let nulls = NullBuffer::from(vec![true, false, true]);
        let shorter = resize_nulls(&nulls, 2);
        assert_eq!(shorter.len(), 2);
        assert!(shorter.is_null(1));

        let longer = resize_nulls(&nulls, 5);
        assert_eq!(longer.len(), 5);
        assert!(longer.is_null(1));
        assert!(longer.is_valid(3));
        assert!(longer.is_valid(4));
        assert_eq!(longer.null_count(), 1);
    }

    #[test]
    fn column_type_names() {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![1]));
        let column = Column::from(array);
        assert_eq!(column.type_name(), "Int64");
        assert!(!column.is_variant());

        let column = Column::from(VariantColumn::create_empty_with_rows(2));
        assert_eq!(column.type_name(), "Variant");
        assert_eq!(column.len(), 2);
        assert!(column.as_variant().unwrap().is_null_root());
    }
}
