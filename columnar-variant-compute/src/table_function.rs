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

//! Table functions: operators producing zero or more output rows per input
//! row, and a driver that runs one over a whole column

use arrow_array::builder::UInt32Builder;
use arrow_array::UInt32Array;
use arrow_schema::{ArrowError, DataType};
use columnar_variant::{Column, ColumnBuilder, VariantColumn};
use std::fmt::Debug;

/// The emission state of the current input row: the length of its window of
/// output values and how far into it the function has emitted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowCursor {
    size: usize,
    offset: usize,
    eos: bool,
}

impl RowCursor {
    /// Starts a new row with `size` values to emit
    pub fn reset(&mut self, size: usize) {
        self.size = size;
        self.offset = 0;
        self.eos = false;
    }

    /// Advances past `step` emitted values
    pub fn forward(&mut self, step: usize) {
        self.offset += step;
        if self.offset >= self.size {
            self.eos = true;
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The number of values of the current row not emitted yet
    pub fn remaining(&self) -> usize {
        self.size.saturating_sub(self.offset)
    }

    pub fn eos(&self) -> bool {
        self.eos
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// An operator expanding each input row into zero or more output rows.
///
/// A function is driven once per batch:
///
/// 1. [`process_init`](Self::process_init) with the input column
/// 2. for every row that is not [null](Self::is_null_row):
///    [`process_row`](Self::process_row), then
///    [`get_value`](Self::get_value) until [`eos`](Self::eos)
/// 3. [`process_close`](Self::process_close)
///
/// See [`expand`] for a driver.
pub trait TableFunction: Debug + Send {
    fn name(&self) -> &str;

    /// Prepares the function for a batch
    fn process_init(&mut self, input: &Column) -> Result<(), ArrowError>;

    /// Moves to input row `row`
    fn process_row(&mut self, row: usize);

    /// Appends up to `max_step` output values of the current row to `out`,
    /// returning how many were appended
    fn get_value(&mut self, out: &mut ColumnBuilder, max_step: usize) -> Result<usize, ArrowError>;

    /// Appends the current output value `length` times, without advancing
    fn get_same_many_values(
        &mut self,
        out: &mut ColumnBuilder,
        length: usize,
    ) -> Result<(), ArrowError>;

    /// Releases the batch state. Safe to call after a failed
    /// [`process_init`](Self::process_init).
    fn process_close(&mut self);

    fn cursor(&self) -> &RowCursor;

    fn cursor_mut(&mut self) -> &mut RowCursor;

    /// Returns true if input row `row` is null
    fn is_null_row(&self, row: usize) -> bool;

    /// The type of the produced values
    fn output_type(&self) -> DataType;

    /// Returns true if the produced values should be wrapped into a variant
    /// column
    fn output_as_variant(&self) -> bool {
        false
    }

    /// Returns true if null input rows produce one default output row
    /// instead of none
    fn is_outer(&self) -> bool {
        false
    }

    fn eos(&self) -> bool {
        self.cursor().eos()
    }

    /// Returns true if the current row has no value to emit
    fn current_empty(&self) -> bool {
        self.cursor().is_empty()
    }

    fn forward(&mut self, step: usize) {
        self.cursor_mut().forward(step)
    }
}

/// Options for [`expand`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandOptions {
    /// The most values requested from one [`TableFunction::get_value`] call
    pub max_step: usize,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self { max_step: 4096 }
    }
}

impl ExpandOptions {
    pub fn with_max_step(mut self, max_step: usize) -> Self {
        self.max_step = max_step;
        self
    }
}

/// The output of [`expand`]
#[derive(Debug, Clone)]
pub struct ExpandedColumn {
    /// The produced values
    pub column: Column,
    /// For every produced value, the index of the input row it came from
    pub parent_indices: UInt32Array,
}

/// Runs `function` over every row of `input`.
///
/// Null rows produce no output, or one default value if the function
/// [is outer](TableFunction::is_outer). The function is closed before
/// returning, also when it fails.
pub fn expand(
    function: &mut dyn TableFunction,
    input: &Column,
    options: ExpandOptions,
) -> Result<ExpandedColumn, ArrowError> {
    let result = expand_rows(function, input, &options);
    function.process_close();
    tracing::trace!(function = function.name(), "closed table function");
    result
}

fn expand_rows(
    function: &mut dyn TableFunction,
    input: &Column,
    options: &ExpandOptions,
) -> Result<ExpandedColumn, ArrowError> {
    function.process_init(input)?;
    tracing::trace!(
        function = function.name(),
        rows = input.len(),
        output_type = %function.output_type(),
        "initialized table function"
    );

    let max_step = options.max_step.max(1);
    let mut out = ColumnBuilder::with_capacity(function.output_type(), input.len());
    let mut parent_indices = UInt32Builder::with_capacity(input.len());
    for row in 0..input.len() {
        let parent = u32::try_from(row).map_err(|_| {
            ArrowError::InvalidArgumentError(format!("Row index {row} exceeds u32"))
        })?;
        if function.is_null_row(row) {
            if function.is_outer() {
                out.insert_default();
                parent_indices.append_value(parent);
            }
            continue;
        }
        function.process_row(row);
        while !function.eos() {
            let step = function.get_value(&mut out, max_step)?;
            parent_indices.append_value_n(parent, step);
        }
    }

    let values = out.finish()?;
    let column = if function.output_as_variant() {
        Column::from(VariantColumn::from_root(values))
    } else {
        Column::Array(values)
    };
    Ok(ExpandedColumn {
        column,
        parent_indices: parent_indices.finish(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::cast::AsArray;
    use arrow_array::types::Int64Type;
    use arrow_array::{Array, ArrayRef, Int64Array};
    use std::sync::Arc;

    /// Emits each row's value `row % 3` times
    #[derive(Debug, Default)]
    struct Repeat {
        input: Option<Int64Array>,
        cursor: RowCursor,
        row: usize,
    }

    impl TableFunction for Repeat {
        fn name(&self) -> &str {
            "repeat"
        }

        fn process_init(&mut self, input: &Column) -> Result<(), ArrowError> {
            let array = input
                .as_array()
                .ok_or_else(|| ArrowError::InvalidArgumentError("not an array".to_string()))?;
            self.input = Some(array.as_primitive::<Int64Type>().clone());
            Ok(())
        }

        fn process_row(&mut self, row: usize) {
            self.row = row;
            self.cursor.reset(row % 3);
        }

        fn get_value(
            &mut self,
            out: &mut ColumnBuilder,
            max_step: usize,
        ) -> Result<usize, ArrowError> {
            if self.current_empty() {
                self.forward(1);
                return Ok(0);
            }
            let step = max_step.min(self.cursor.remaining());
            if let Some(input) = &self.input {
                out.insert_many_from(input, self.row, step)?;
            }
            self.forward(step);
            Ok(step)
        }

        fn get_same_many_values(
            &mut self,
            out: &mut ColumnBuilder,
            length: usize,
        ) -> Result<(), ArrowError> {
            out.insert_many_defaults(length);
            Ok(())
        }

        fn process_close(&mut self) {
            self.input = None;
        }

        fn cursor(&self) -> &RowCursor {
            &self.cursor
        }

        fn cursor_mut(&mut self) -> &mut RowCursor {
            &mut self.cursor
        }

        fn is_null_row(&self, row: usize) -> bool {
            self.input.as_ref().is_some_and(|input| input.is_null(row))
        }

        fn output_type(&self) -> DataType {
            DataType::Int64
        }
    }

    #[test]
    fn cursor_forward() {
        let mut cursor = RowCursor::default();
        cursor.reset(3);
        cursor.forward(2);
        assert!(!cursor.eos());
        assert_eq!(cursor.remaining(), 1);
        cursor.forward(1);
        assert!(cursor.eos());

        cursor.reset(0);
        assert!(cursor.is_empty());
        cursor.forward(1);
        assert!(cursor.eos());
    }

    #[test]
    fn expand_small_steps() {
        let input: ArrayRef = Arc::new(Int64Array::from(vec![
            Some(10),
            Some(11),
            Some(12),
            None,
            Some(14),
            Some(15),
        ]));
        let mut function = Repeat::default();
        let options = ExpandOptions::default().with_max_step(1);
        let expanded = expand(&mut function, &Column::from(input), options).unwrap();

        let values = expanded.column.as_array().unwrap();
        assert_eq!(
            values.as_primitive::<Int64Type>(),
            &Int64Array::from(vec![11, 12, 12, 14, 15, 15])
        );
        assert_eq!(
            expanded.parent_indices,
            UInt32Array::from(vec![1, 2, 2, 4, 5, 5])
        );
        assert!(function.input.is_none());
    }

    #[test]
    fn expand_closes_after_failure() {
        let mut function = Repeat::default();
        let input = Column::from(VariantColumn::create_empty_with_rows(1));
        assert!(expand(&mut function, &input, ExpandOptions::default()).is_err());
        assert!(function.input.is_none());
    }
}
