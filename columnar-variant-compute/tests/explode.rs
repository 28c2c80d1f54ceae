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

//! End-to-end tests of exploding array and variant columns

use arrow_array::cast::AsArray;
use arrow_array::types::Int64Type;
use arrow_array::{Array, ArrayRef, Int64Array, ListArray, StringArray, UInt32Array};
use arrow_buffer::{NullBuffer, OffsetBuffer};
use arrow_schema::{DataType, Field};
use columnar_variant::{Column, VariantColumn};
use columnar_variant_compute::{
    batch_json_string_to_variant, expand, ExpandOptions, ExplodeTableFunction,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;
use std::sync::Arc;

#[test]
fn unnest_example() {
    // [1, 2], [], null
    let values = Arc::new(Int64Array::from(vec![1, 2]));
    let list = ListArray::new(
        Arc::new(Field::new_list_field(DataType::Int64, true)),
        OffsetBuffer::new(vec![0, 2, 2, 2].into()),
        values,
        Some(NullBuffer::from(vec![true, true, false])),
    );
    let input = Column::from(Arc::new(list) as ArrayRef);

    let mut function = ExplodeTableFunction::new();
    let expanded = expand(&mut function, &input, ExpandOptions::default()).unwrap();
    let values = expanded.column.as_array().unwrap();
    assert_eq!(
        values.as_primitive::<Int64Type>(),
        &Int64Array::from(vec![Some(1), Some(2), None])
    );
    assert_eq!(expanded.parent_indices, UInt32Array::from(vec![0, 0, 1]));

    let mut function = ExplodeTableFunction::new_outer();
    let expanded = expand(&mut function, &input, ExpandOptions::default()).unwrap();
    assert_eq!(expanded.column.len(), 4);
    assert_eq!(expanded.parent_indices, UInt32Array::from(vec![0, 0, 1, 2]));
}

#[test]
fn emitted_rows_match_window_lengths() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..20 {
        let rows: Vec<Option<Vec<Option<i64>>>> = (0..rng.random_range(0..64))
            .map(|_| {
                if rng.random_bool(0.2) {
                    return None;
                }
                let len = rng.random_range(0..6);
                Some(
                    (0..len)
                        .map(|i| rng.random_bool(0.8).then_some(i))
                        .collect(),
                )
            })
            .collect();
        let expected_rows: usize = rows
            .iter()
            .map(|row| row.as_ref().map_or(0, |items| items.len().max(1)))
            .sum();
        let expected_nulls: usize = rows
            .iter()
            .flatten()
            .map(|items| {
                if items.is_empty() {
                    1
                } else {
                    items.iter().filter(|item| item.is_none()).count()
                }
            })
            .sum();

        let array: ArrayRef = Arc::new(ListArray::from_iter_primitive::<Int64Type, _, _>(
            rows.clone(),
        ));
        let max_step = rng.random_range(1..5);
        let mut function = ExplodeTableFunction::new();
        let expanded = expand(
            &mut function,
            &Column::from(array),
            ExpandOptions::default().with_max_step(max_step),
        )
        .unwrap();

        assert_eq!(expanded.column.len(), expected_rows);
        assert_eq!(expanded.parent_indices.len(), expected_rows);
        let values = expanded.column.as_array().unwrap();
        assert_eq!(values.null_count(), expected_nulls);

        // values come out in row order
        let values = values.as_primitive::<Int64Type>();
        let mut output = 0;
        for (row, items) in rows.iter().enumerate() {
            let Some(items) = items else { continue };
            if items.is_empty() {
                assert!(values.is_null(output));
                output += 1;
                continue;
            }
            for item in items {
                assert_eq!(expanded.parent_indices.value(output) as usize, row);
                assert_eq!(values.is_null(output), item.is_none());
                if let Some(item) = item {
                    assert_eq!(values.value(output), *item);
                }
                output += 1;
            }
        }
    }
}

#[test]
fn variant_arrays_explode_into_variants() {
    let texts: ArrayRef = Arc::new(StringArray::from(vec![
        Some("[1, 2, 3]"),
        None,
        Some("[]"),
        Some("[4]"),
    ]));
    let input = Column::from(batch_json_string_to_variant(&texts).unwrap());

    let mut function = ExplodeTableFunction::new();
    let expanded = expand(&mut function, &input, ExpandOptions::default()).unwrap();

    let variant = expanded.column.as_variant().unwrap();
    assert!(variant.is_scalar_variant());
    let values: Vec<_> = (0..variant.len())
        .map(|row| variant.value(row).unwrap())
        .collect();
    assert_eq!(values, vec![json!(1), json!(2), json!(3), json!(null), json!(4)]);
    assert_eq!(
        expanded.parent_indices,
        UInt32Array::from(vec![0, 0, 0, 2, 3])
    );
}

#[test]
fn null_rooted_variants_explode_to_defaults() {
    let input = Column::from(VariantColumn::create_empty_with_rows(3));
    let mut function = ExplodeTableFunction::new();
    let expanded = expand(&mut function, &input, ExpandOptions::default()).unwrap();
    let variant = expanded.column.as_variant().unwrap();
    assert_eq!(variant.len(), 3);
    assert!(variant.is_null_root());
}

#[test]
fn non_array_variants_are_rejected() {
    let texts: ArrayRef = Arc::new(StringArray::from(vec![r#"{"a": [1]}"#]));
    let input = Column::from(batch_json_string_to_variant(&texts).unwrap());
    let mut function = ExplodeTableFunction::new();
    let err = expand(&mut function, &input, ExpandOptions::default()).unwrap_err();
    assert!(err.to_string().contains("not supported"), "{err}");
    assert!(err.to_string().contains("Struct"), "{err}");
}
