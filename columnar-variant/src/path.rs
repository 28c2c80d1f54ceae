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

//! [`VariantPath`] addresses a value nested inside a variant column

use arrow_schema::ArrowError;
use std::fmt::{Display, Formatter, Write};

/// One step of a [`VariantPath`]: an object field or an array index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathElement {
    /// Access the object field with this name
    Field(String),
    /// Access the array element at this position
    Index(usize),
}

impl PathElement {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    pub fn index(index: usize) -> Self {
        Self::Index(index)
    }

    /// Returns the field name if this element is a [`PathElement::Field`]
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Self::Field(name) => Some(name),
            Self::Index(_) => None,
        }
    }
}

impl From<&str> for PathElement {
    fn from(name: &str) -> Self {
        Self::field(name)
    }
}

impl From<String> for PathElement {
    fn from(name: String) -> Self {
        Self::Field(name)
    }
}

impl From<usize> for PathElement {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// An immutable path into a variant value, such as `a.b[0].c`
///
/// The empty path addresses the root of the variant. Paths compare and hash
/// element-wise, which is what the subcolumn tree relies on for exact lookup.
///
/// ```
/// # use columnar_variant::{PathElement, VariantPath};
/// let path = VariantPath::parse("a.b[1]").unwrap();
/// assert_eq!(path.len(), 3);
/// assert_eq!(path.pop_front(), VariantPath::parse("b[1]").unwrap());
/// assert_eq!(path.to_string(), "a.b[1]");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VariantPath(Vec<PathElement>);

impl VariantPath {
    pub fn new(elements: Vec<PathElement>) -> Self {
        Self(elements)
    }

    /// The path of the variant root
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path string.
    ///
    /// # Syntax
    /// - `.field` or `field` - access object field (no special characters)
    /// - `[index]` - access array element by index
    /// - `[field]` - access object field (special characters allowed, escape with `\`)
    ///
    /// Inside brackets `\\` is a literal `\`, `\]` is a literal `]`, and any
    /// other `\x` is a literal `x`. Outside brackets there is no escaping.
    ///
    /// # Errors
    /// - Leading `.` (e.g., `".foo"`)
    /// - Trailing `.` (e.g., `"foo."`)
    /// - Unclosed `[` (e.g., `"foo[1"`)
    /// - Unexpected `]` (e.g., `"foo]"`)
    pub fn parse(s: &str) -> Result<Self, ArrowError> {
        let scan_field = |start: usize| {
            s[start..]
                .find(['.', '[', ']'])
                .map_or_else(|| s.len(), |p| start + p)
        };

        let bytes = s.as_bytes();
        if let Some(b'.') = bytes.first() {
            return Err(ArrowError::ParseError("Unexpected leading '.'".into()));
        }

        let mut elements = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let (element, end) = match bytes[i] {
                b'.' => {
                    i += 1;
                    let end = scan_field(i);
                    if end == i {
                        return Err(ArrowError::ParseError(match bytes.get(i) {
                            None => "Unexpected trailing '.'".into(),
                            Some(&c) => format!("Unexpected '{}' at byte {i}", c as char),
                        }));
                    }
                    (PathElement::field(&s[i..end]), end)
                }
                b'[' => parse_in_bracket(s, i)?,
                b']' => {
                    return Err(ArrowError::ParseError(format!(
                        "Unexpected ']' at byte {i}"
                    )));
                }
                _ => {
                    let end = scan_field(i);
                    (PathElement::field(&s[i..end]), end)
                }
            };
            elements.push(element);
            i = end;
        }

        Ok(Self(elements))
    }

    pub fn elements(&self) -> &[PathElement] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&PathElement> {
        self.0.first()
    }

    /// Returns a new path with `element` appended
    pub fn join(mut self, element: impl Into<PathElement>) -> Self {
        self.0.push(element.into());
        self
    }

    /// Returns a copy of this path without its leading element.
    ///
    /// Popping the root path yields the root path.
    pub fn pop_front(&self) -> Self {
        Self(self.0.iter().skip(1).cloned().collect())
    }

    pub fn starts_with(&self, prefix: &VariantPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns the remainder of this path after `prefix`, if it is a prefix
    pub fn strip_prefix(&self, prefix: &VariantPath) -> Option<VariantPath> {
        self.0
            .strip_prefix(prefix.0.as_slice())
            .map(|rest| Self(rest.to_vec()))
    }
}

/// Parse `[digits | field]` starting at `i` (which points to `[`).
/// Returns the element and the position after `]`.
fn parse_in_bracket(s: &str, i: usize) -> Result<(PathElement, usize), ArrowError> {
    let start = i + 1;

    let mut unescaped = String::new();
    let mut chars = s[start..].char_indices();
    let mut end = None;

    while let Some((offset, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, next)) = chars.next() {
                    unescaped.push(next);
                }
                // a trailing backslash is reported as an unclosed bracket below
            }
            ']' => {
                end = Some(start + offset);
                break;
            }
            _ => unescaped.push(c),
        }
    }

    let Some(end) = end else {
        return Err(ArrowError::ParseError(format!("Unclosed '[' at byte {i}")));
    };

    let element = match unescaped.parse() {
        Ok(index) => PathElement::Index(index),
        Err(_) => PathElement::Field(unescaped),
    };
    Ok((element, end + 1))
}

impl TryFrom<&str> for VariantPath {
    type Error = ArrowError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<Vec<PathElement>> for VariantPath {
    fn from(elements: Vec<PathElement>) -> Self {
        Self(elements)
    }
}

impl FromIterator<PathElement> for VariantPath {
    fn from_iter<T: IntoIterator<Item = PathElement>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Display for VariantPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, element) in self.0.iter().enumerate() {
            match element {
                PathElement::Index(index) => write!(f, "[{index}]")?,
                PathElement::Field(name) if needs_brackets(name) => {
                    f.write_char('[')?;
                    for c in name.chars() {
                        if matches!(c, '\\' | ']') {
                            f.write_char('\\')?;
                        }
                        f.write_char(c)?;
                    }
                    f.write_char(']')?;
                }
                PathElement::Field(name) => {
                    if i > 0 {
                        f.write_char('.')?;
                    }
                    f.write_str(name)?;
                }
            }
        }
        Ok(())
    }
}

fn needs_brackets(name: &str) -> bool {
    name.is_empty() || name.contains(['.', '[', ']'])
}
