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

//! Compiled JSON path expressions evaluated against [`serde_json::Value`]
//! documents

use arrow_schema::ArrowError;
use columnar_variant::PathElement;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::iter::Peekable;
use std::str::Chars;

/// A JSON path such as `$.a.b[0]`, compiled once and evaluated per document.
///
/// Supported syntax: the root `$`, followed by any number of `.name`,
/// `."quoted name"`, `[index]` and `["quoted name"]` steps.
///
/// ```
/// # use columnar_variant_compute::json_path::JsonPath;
/// # use serde_json::json;
/// let path = JsonPath::compile("$.a[1].b").unwrap();
/// let document = json!({"a": [{"b": 1}, {"b": 2}]});
/// assert_eq!(path.evaluate(&document), Some(&json!(2)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    text: String,
    elements: Vec<PathElement>,
}

impl JsonPath {
    pub fn compile(text: &str) -> Result<Self, ArrowError> {
        let mut chars = text.chars().peekable();
        if chars.next() != Some('$') {
            return Err(parse_error(text, "path must start with '$'"));
        }
        let mut elements = vec![];
        while let Some(c) = chars.next() {
            let element = match c {
                '.' if chars.peek() == Some(&'"') => {
                    chars.next();
                    PathElement::Field(read_quoted(text, &mut chars)?)
                }
                '.' => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if c == '.' || c == '[' {
                            break;
                        }
                        name.push(c);
                        chars.next();
                    }
                    if name.is_empty() {
                        return Err(parse_error(text, "empty field name"));
                    }
                    PathElement::Field(name)
                }
                '[' => {
                    let element = if chars.peek() == Some(&'"') {
                        chars.next();
                        PathElement::Field(read_quoted(text, &mut chars)?)
                    } else {
                        let mut digits = String::new();
                        while let Some(&c) = chars.peek() {
                            if c == ']' {
                                break;
                            }
                            digits.push(c);
                            chars.next();
                        }
                        let index = digits.trim().parse::<usize>().map_err(|_| {
                            parse_error(text, &format!("invalid array index '{digits}'"))
                        })?;
                        PathElement::Index(index)
                    };
                    if chars.next() != Some(']') {
                        return Err(parse_error(text, "missing ']'"));
                    }
                    element
                }
                other => {
                    return Err(parse_error(text, &format!("unexpected character '{other}'")));
                }
            };
            elements.push(element);
        }
        Ok(Self {
            text: text.to_string(),
            elements,
        })
    }

    /// The steps of this path, outermost first
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Returns true for the path `$`, which selects the whole document
    pub fn is_root(&self) -> bool {
        self.elements.is_empty()
    }

    /// Returns the value this path selects in `document`, or `None` if any
    /// step is missing or applied to a value of the wrong kind
    pub fn evaluate<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.elements
            .iter()
            .try_fold(document, |value, element| match element {
                PathElement::Field(name) => value.as_object()?.get(name),
                PathElement::Index(index) => value.as_array()?.get(*index),
            })
    }
}

impl Display for JsonPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Reads a double-quoted name after its opening quote; `\"` and `\\` escape
fn read_quoted(text: &str, chars: &mut Peekable<Chars<'_>>) -> Result<String, ArrowError> {
    let mut name = String::new();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Ok(name),
            '\\' => match chars.next() {
                Some(escaped) => name.push(escaped),
                None => break,
            },
            c => name.push(c),
        }
    }
    Err(parse_error(text, "unterminated quoted name"))
}

fn parse_error(text: &str, reason: &str) -> ArrowError {
    ArrowError::ParseError(format!("Invalid JSON path '{text}': {reason}"))
}
