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

//! The `explode` table function: one output row per array element

use crate::table_function::{RowCursor, TableFunction};
use arrow_array::cast::AsArray;
use arrow_array::{Array, ArrayRef, GenericListArray, ListArray, NullArray, OffsetSizeTrait};
use arrow_buffer::{NullBuffer, OffsetBuffer};
use arrow_schema::{ArrowError, DataType, Field};
use columnar_variant::types::is_list_type;
use columnar_variant::{Column, ColumnBuilder, VariantColumn};
use std::borrow::Cow;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Offsets {
    Small(OffsetBuffer<i32>),
    Large(OffsetBuffer<i64>),
}

impl Offsets {
    /// The start and length of the elements of `row`
    fn window(&self, row: usize) -> (usize, usize) {
        match self {
            Offsets::Small(offsets) => window(offsets, row),
            Offsets::Large(offsets) => window(offsets, row),
        }
    }
}

fn window<O: OffsetSizeTrait>(offsets: &OffsetBuffer<O>, row: usize) -> (usize, usize) {
    let start = offsets[row].as_usize();
    let end = offsets[row + 1].as_usize();
    (start, end.saturating_sub(start))
}

/// The parts of the array column being exploded
#[derive(Debug, Clone)]
struct ArrayDetail {
    offsets: Offsets,
    /// Null input rows
    outer_nulls: Option<NullBuffer>,
    /// The elements of all rows
    nested_col: ArrayRef,
    /// Null elements
    nested_nulls: Option<NullBuffer>,
    nested_type: DataType,
}

impl ArrayDetail {
    fn try_new(array: &dyn Array) -> Option<Self> {
        match array.data_type() {
            DataType::List(_) => {
                let list = array.as_list::<i32>();
                Some(Self::from_list(list, Offsets::Small(list.offsets().clone())))
            }
            DataType::LargeList(_) => {
                let list = array.as_list::<i64>();
                Some(Self::from_list(list, Offsets::Large(list.offsets().clone())))
            }
            _ => None,
        }
    }

    fn from_list<O: OffsetSizeTrait>(list: &GenericListArray<O>, offsets: Offsets) -> Self {
        Self {
            offsets,
            outer_nulls: list.nulls().cloned(),
            nested_col: list.values().clone(),
            nested_nulls: list.values().logical_nulls(),
            nested_type: list.value_type(),
        }
    }

    fn is_null_row(&self, row: usize) -> bool {
        self.outer_nulls.as_ref().is_some_and(|nulls| nulls.is_null(row))
    }

    fn is_null_element(&self, position: usize) -> bool {
        self.nested_nulls
            .as_ref()
            .is_some_and(|nulls| nulls.is_null(position))
    }
}

/// Expands every element of an array column into its own output row.
///
/// The input is a `List` or `LargeList` column, or a variant column whose
/// root holds one. Exploding a variant produces values to be wrapped into
/// a variant column again (see [`TableFunction::output_as_variant`]). A
/// null-rooted variant explodes like a column of empty arrays.
///
/// An empty array produces one default row. A null row produces no row, or
/// one default row for [`ExplodeTableFunction::new_outer`].
#[derive(Debug, Default)]
pub struct ExplodeTableFunction {
    outer: bool,
    detail: Option<ArrayDetail>,
    output_as_variant: bool,
    array_offset: usize,
    cursor: RowCursor,
}

impl ExplodeTableFunction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an `explode_outer` function, which emits one default row for
    /// each null input row
    pub fn new_outer() -> Self {
        Self {
            outer: true,
            ..Self::default()
        }
    }

    fn detail(&self) -> Result<&ArrayDetail, ArrowError> {
        self.detail.as_ref().ok_or_else(|| {
            ArrowError::InvalidArgumentError(format!("{} is not initialized", self.name()))
        })
    }

    /// The array column inside a variant column
    fn variant_array(variant: &VariantColumn) -> Result<ArrayRef, ArrowError> {
        if variant.is_null_root() {
            let field = Arc::new(Field::new_list_field(DataType::Null, true));
            let list = ListArray::try_new(
                field,
                OffsetBuffer::new_zeroed(variant.len()),
                Arc::new(NullArray::new(0)),
                variant.nulls().cloned(),
            )?;
            return Ok(Arc::new(list));
        }
        let root_type = variant.root_type();
        if !variant.is_scalar_variant() || !is_list_type(&root_type) {
            return Err(ArrowError::InvalidArgumentError(format!(
                "explode of variant with root type {root_type} is not supported"
            )));
        }
        let variant = if variant.is_finalized() {
            Cow::Borrowed(variant)
        } else {
            Cow::Owned(variant.clone_finalized()?)
        };
        match variant.root() {
            Some(root) => Ok(root.get_finalized_column()?.clone()),
            None => Err(ArrowError::InvalidArgumentError(
                "explode of variant without root is not supported".to_string(),
            )),
        }
    }
}

impl TableFunction for ExplodeTableFunction {
    fn name(&self) -> &str {
        if self.outer {
            "explode_outer"
        } else {
            "explode"
        }
    }

    fn process_init(&mut self, input: &Column) -> Result<(), ArrowError> {
        self.process_close();
        let (array, row_nulls) = match input {
            Column::Array(array) => (array.clone(), None),
            Column::Variant(variant) => {
                self.output_as_variant = true;
                (Self::variant_array(variant)?, variant.nulls())
            }
        };
        let Some(mut detail) = ArrayDetail::try_new(array.as_ref()) else {
            return Err(ArrowError::InvalidArgumentError(format!(
                "{} of column type {} is not supported",
                self.name(),
                input.type_name()
            )));
        };
        detail.outer_nulls = NullBuffer::union(detail.outer_nulls.as_ref(), row_nulls);
        self.detail = Some(detail);
        Ok(())
    }

    /// Null rows get an empty window
    fn process_row(&mut self, row: usize) {
        self.cursor.reset(0);
        self.array_offset = 0;
        let Some(detail) = &self.detail else {
            return;
        };
        if !detail.is_null_row(row) {
            let (start, len) = detail.offsets.window(row);
            self.array_offset = start;
            self.cursor.reset(len);
        }
    }

    fn get_value(&mut self, out: &mut ColumnBuilder, max_step: usize) -> Result<usize, ArrowError> {
        let detail = self.detail()?;
        let step = if self.current_empty() {
            out.insert_default();
            1
        } else {
            let step = max_step.min(self.cursor.remaining());
            let position = self.array_offset + self.cursor.offset();
            out.insert_range_from(detail.nested_col.as_ref(), position, step)?;
            step
        };
        self.forward(step);
        Ok(step)
    }

    fn get_same_many_values(
        &mut self,
        out: &mut ColumnBuilder,
        length: usize,
    ) -> Result<(), ArrowError> {
        let detail = self.detail()?;
        let position = self.array_offset + self.cursor.offset();
        if self.current_empty() || detail.is_null_element(position) {
            out.insert_many_defaults(length);
        } else {
            out.insert_many_from(detail.nested_col.as_ref(), position, length)?;
        }
        Ok(())
    }

    fn process_close(&mut self) {
        self.detail = None;
        self.output_as_variant = false;
        self.array_offset = 0;
        self.cursor = RowCursor::default();
    }

    fn cursor(&self) -> &RowCursor {
        &self.cursor
    }

    fn cursor_mut(&mut self) -> &mut RowCursor {
        &mut self.cursor
    }

    fn is_null_row(&self, row: usize) -> bool {
        self.detail
            .as_ref()
            .is_some_and(|detail| detail.is_null_row(row))
    }

    fn output_type(&self) -> DataType {
        self.detail
            .as_ref()
            .map(|detail| detail.nested_type.clone())
            .unwrap_or(DataType::Null)
    }

    fn output_as_variant(&self) -> bool {
        self.output_as_variant
    }

    fn is_outer(&self) -> bool {
        self.outer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::types::Int64Type;
    use arrow_array::{Int64Array, LargeListArray};

    fn lists(rows: Vec<Option<Vec<Option<i64>>>>) -> Column {
        let array: ArrayRef = Arc::new(ListArray::from_iter_primitive::<Int64Type, _, _>(rows));
        Column::from(array)
    }

    fn emit_all(function: &mut ExplodeTableFunction, row: usize, max_step: usize) -> ArrayRef {
        let mut out = ColumnBuilder::new(function.output_type());
        function.process_row(row);
        while !function.eos() {
            function.get_value(&mut out, max_step).unwrap();
        }
        out.finish().unwrap()
    }

    #[test]
    fn windows_follow_offsets() {
        let input = lists(vec![
            Some(vec![Some(1), Some(2), Some(3)]),
            Some(vec![]),
            None,
            Some(vec![None, Some(5)]),
        ]);
        let mut function = ExplodeTableFunction::new();
        function.process_init(&input).unwrap();
        assert_eq!(function.output_type(), DataType::Int64);
        assert!(!function.output_as_variant());

        function.process_row(0);
        assert_eq!(function.cursor().size(), 3);
        let mut out = ColumnBuilder::new(DataType::Int64);
        assert_eq!(function.get_value(&mut out, 2).unwrap(), 2);
        assert!(!function.eos());
        assert_eq!(function.get_value(&mut out, 2).unwrap(), 1);
        assert!(function.eos());

        function.process_row(1);
        assert!(function.current_empty());
        assert_eq!(function.get_value(&mut out, 8).unwrap(), 1);
        assert!(function.eos());

        assert!(function.is_null_row(2));
        assert!(!function.is_null_row(3));

        function.process_row(3);
        function.get_value(&mut out, 8).unwrap();
        let values = out.finish().unwrap();
        assert_eq!(
            values.as_primitive::<Int64Type>(),
            &Int64Array::from(vec![Some(1), Some(2), Some(3), None, None, Some(5)])
        );
    }

    #[test]
    fn same_many_values_match_single_steps() {
        let input = lists(vec![Some(vec![Some(7), None, Some(9)]), Some(vec![])]);
        let mut function = ExplodeTableFunction::new();
        function.process_init(&input).unwrap();

        for element in 0..3 {
            let mut many = ColumnBuilder::new(DataType::Int64);
            function.process_row(0);
            function.forward(element);
            function.get_same_many_values(&mut many, 3).unwrap();

            let mut single = ColumnBuilder::new(DataType::Int64);
            for _ in 0..3 {
                function.process_row(0);
                function.forward(element);
                function.get_value(&mut single, 1).unwrap();
            }
            assert_eq!(&many.finish().unwrap(), &single.finish().unwrap());
        }

        let mut many = ColumnBuilder::new(DataType::Int64);
        function.process_row(1);
        function.get_same_many_values(&mut many, 2).unwrap();
        let values = many.finish().unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values.null_count(), 2);
    }

    #[test]
    fn large_lists() {
        let array: ArrayRef = Arc::new(LargeListArray::from_iter_primitive::<Int64Type, _, _>(
            vec![Some(vec![Some(1)]), Some(vec![Some(2), Some(3)])],
        ));
        let mut function = ExplodeTableFunction::new();
        function.process_init(&Column::from(array)).unwrap();
        let values = emit_all(&mut function, 1, 16);
        assert_eq!(
            values.as_primitive::<Int64Type>(),
            &Int64Array::from(vec![2, 3])
        );
    }

    #[test]
    fn variant_inputs() {
        let mut variant = VariantColumn::new();
        variant.insert_json(&serde_json::json!([1, 2])).unwrap();
        variant.insert_json(&serde_json::json!(null)).unwrap();
        variant.finalize().unwrap();

        let mut function = ExplodeTableFunction::new();
        function.process_init(&Column::from(variant)).unwrap();
        assert!(function.output_as_variant());
        assert_eq!(function.output_type(), DataType::Int64);
        let values = emit_all(&mut function, 0, 16);
        assert_eq!(
            values.as_primitive::<Int64Type>(),
            &Int64Array::from(vec![1, 2])
        );

        let null_rooted = Column::from(VariantColumn::create_empty_with_rows(2));
        function.process_init(&null_rooted).unwrap();
        assert_eq!(function.output_type(), DataType::Null);
        assert!(!function.is_null_row(1));
        let values = emit_all(&mut function, 1, 16);
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn unsupported_inputs() {
        let mut function = ExplodeTableFunction::new();
        let ints: ArrayRef = Arc::new(Int64Array::from(vec![1]));
        let err = function.process_init(&Column::from(ints)).unwrap_err();
        assert!(err.to_string().contains("not supported"), "{err}");

        let mut variant = VariantColumn::new();
        variant.insert_json(&serde_json::json!("text")).unwrap();
        let err = function.process_init(&Column::from(variant)).unwrap_err();
        assert!(err.to_string().contains("not supported"), "{err}");
        assert!(err.to_string().contains("Utf8"), "{err}");

        // closing after a failed init is fine
        function.process_close();
        assert!(function.get_value(&mut ColumnBuilder::new(DataType::Null), 1).is_err());
    }

    #[test]
    fn names() {
        assert_eq!(ExplodeTableFunction::new().name(), "explode");
        assert!(!ExplodeTableFunction::new().is_outer());
        assert_eq!(ExplodeTableFunction::new_outer().name(), "explode_outer");
        assert!(ExplodeTableFunction::new_outer().is_outer());
    }
}
