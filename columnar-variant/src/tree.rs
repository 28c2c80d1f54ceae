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

//! [`SubcolumnTree`]: the [`Subcolumn`]s of a variant column, addressed by [`VariantPath`]

use crate::path::{PathElement, VariantPath};
use crate::subcolumn::Subcolumn;
use crate::types::is_nothing;
use arrow_schema::{ArrowError, DataType, Field, Fields};
use indexmap::IndexMap;

/// The two shapes a node of a [`SubcolumnTree`] can take
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A node holding data
    Leaf(Subcolumn),
    /// A pure structural node; children keep their insertion order
    Branch(IndexMap<PathElement, SubcolumnNode>),
}

/// A node of a [`SubcolumnTree`] together with its absolute path
#[derive(Debug, Clone)]
pub struct SubcolumnNode {
    path: VariantPath,
    kind: NodeKind,
}

impl SubcolumnNode {
    fn leaf(path: VariantPath, data: Subcolumn) -> Self {
        Self {
            path,
            kind: NodeKind::Leaf(data),
        }
    }

    fn branch(path: VariantPath) -> Self {
        Self {
            path,
            kind: NodeKind::Branch(IndexMap::new()),
        }
    }

    pub fn path(&self) -> &VariantPath {
        &self.path
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// The subcolumn of a leaf, `None` for branches
    pub fn data(&self) -> Option<&Subcolumn> {
        match &self.kind {
            NodeKind::Leaf(data) => Some(data),
            NodeKind::Branch(_) => None,
        }
    }

    pub fn child(&self, element: &PathElement) -> Option<&SubcolumnNode> {
        match &self.kind {
            NodeKind::Branch(children) => children.get(element),
            NodeKind::Leaf(_) => None,
        }
    }

    /// The type of this node: the least common type of a leaf, or a struct
    /// of the children's types for a branch
    pub fn data_type(&self) -> DataType {
        match &self.kind {
            NodeKind::Leaf(data) => data.least_common_type().clone(),
            NodeKind::Branch(children) => {
                let fields: Fields = children
                    .iter()
                    .map(|(element, child)| {
                        let name = match element {
                            PathElement::Field(name) => name.clone(),
                            PathElement::Index(index) => index.to_string(),
                        };
                        Field::new(name, child.data_type(), true)
                    })
                    .collect();
                DataType::Struct(fields)
            }
        }
    }

    /// Collects every leaf reachable from this node, paired with its path
    /// relative to this node. A leaf node yields itself with the empty path.
    pub fn leaves_under(&self) -> Vec<(&SubcolumnNode, VariantPath)> {
        let mut leaves = vec![];
        self.collect_leaves(&mut leaves);
        leaves
            .into_iter()
            .map(|leaf| {
                let relative = leaf.path.strip_prefix(&self.path).unwrap_or_default();
                (leaf, relative)
            })
            .collect()
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a SubcolumnNode>) {
        match &self.kind {
            NodeKind::Leaf(_) => out.push(self),
            NodeKind::Branch(children) => {
                for child in children.values() {
                    child.collect_leaves(out);
                }
            }
        }
    }

    fn collect_leaves_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Subcolumn>) {
        match &mut self.kind {
            NodeKind::Leaf(data) => out.push(data),
            NodeKind::Branch(children) => {
                for child in children.values_mut() {
                    child.collect_leaves_mut(out);
                }
            }
        }
    }

    /// Returns the children of this branch. A leaf that so far holds only
    /// defaults is turned into an empty branch first.
    fn children_for_insert(
        &mut self,
    ) -> Result<&mut IndexMap<PathElement, SubcolumnNode>, ArrowError> {
        if let NodeKind::Leaf(data) = &self.kind {
            if !is_nothing(data.least_common_type()) {
                return Err(ambiguous_path(&self.path));
            }
            self.kind = NodeKind::Branch(IndexMap::new());
        }
        match &mut self.kind {
            NodeKind::Branch(children) => Ok(children),
            NodeKind::Leaf(_) => Err(ambiguous_path(&self.path)),
        }
    }
}

fn ambiguous_path(path: &VariantPath) -> ArrowError {
    ArrowError::InvalidArgumentError(format!(
        "Variant path '{path}' holds both scalar and object values"
    ))
}

/// A mapping from [`VariantPath`] to [`Subcolumn`].
///
/// The tree has at most one root. A root leaf (empty path) makes the variant
/// scalar-rooted; a root branch holds the decomposed fields. An empty tree
/// holds no data at all.
#[derive(Debug, Clone, Default)]
pub struct SubcolumnTree {
    root: Option<SubcolumnNode>,
}

impl SubcolumnTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the tree holds no node at all
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn root(&self) -> Option<&SubcolumnNode> {
        self.root.as_ref()
    }

    /// Makes `data` the root leaf. Returns false if the tree already has a root.
    pub fn create_root(&mut self, data: Subcolumn) -> bool {
        if self.root.is_some() {
            return false;
        }
        self.root = Some(SubcolumnNode::leaf(VariantPath::root(), data));
        true
    }

    /// Inserts `data` as a leaf at `path`, creating missing ancestors as branches.
    ///
    /// Returns false, leaving the tree unchanged, if `path` is empty (use
    /// [`Self::create_root`]), if a node already exists at `path`, or if an
    /// ancestor of `path` is a leaf.
    pub fn add(&mut self, path: &VariantPath, data: Subcolumn) -> bool {
        let Some((last, parents)) = path.elements().split_last() else {
            return false;
        };
        if !self.can_add(parents) {
            return false;
        }
        let mut node = self
            .root
            .get_or_insert_with(|| SubcolumnNode::branch(VariantPath::root()));
        for element in parents {
            let NodeKind::Branch(children) = &mut node.kind else {
                return false;
            };
            let child_path = node.path.clone().join(element.clone());
            node = children
                .entry(element.clone())
                .or_insert_with(|| SubcolumnNode::branch(child_path));
        }
        let NodeKind::Branch(children) = &mut node.kind else {
            return false;
        };
        if children.contains_key(last) {
            return false;
        }
        children.insert(last.clone(), SubcolumnNode::leaf(path.clone(), data));
        true
    }

    /// Returns true if no existing leaf lies on `parents`
    fn can_add(&self, parents: &[PathElement]) -> bool {
        let Some(mut node) = self.root.as_ref() else {
            return true;
        };
        for element in parents {
            match &node.kind {
                NodeKind::Leaf(_) => return false,
                NodeKind::Branch(children) => match children.get(element) {
                    Some(child) => node = child,
                    None => return true,
                },
            }
        }
        !node.is_leaf()
    }

    /// Looks up the node at exactly `path`
    pub fn find_exact(&self, path: &VariantPath) -> Option<&SubcolumnNode> {
        let mut node = self.root.as_ref()?;
        for element in path.elements() {
            node = node.child(element)?;
        }
        Some(node)
    }

    /// Fails if [`Self::get_or_create_leaf`] would fail for `path`, without
    /// touching the tree
    pub fn check_leaf_path(&self, path: &VariantPath) -> Result<(), ArrowError> {
        let Some(mut node) = self.root.as_ref() else {
            return Ok(());
        };
        for element in path.elements() {
            match &node.kind {
                NodeKind::Leaf(data) if is_nothing(data.least_common_type()) => return Ok(()),
                NodeKind::Leaf(_) => return Err(ambiguous_path(&node.path)),
                NodeKind::Branch(children) => match children.get(element) {
                    Some(child) => node = child,
                    None => return Ok(()),
                },
            }
        }
        match node.kind {
            NodeKind::Leaf(_) => Ok(()),
            NodeKind::Branch(_) => Err(ambiguous_path(&node.path)),
        }
    }

    /// Returns the leaf subcolumn at `path` for appending a row, creating it
    /// (back-filled with `num_rows` defaults) along with any missing ancestors.
    ///
    /// A leaf that so far holds only defaults is converted into a branch when
    /// a path continues below it. Any other mix of scalar and object data at
    /// one path is an error.
    pub fn get_or_create_leaf(
        &mut self,
        path: &VariantPath,
        num_rows: usize,
    ) -> Result<&mut Subcolumn, ArrowError> {
        let mut node = self.root.get_or_insert_with(|| {
            SubcolumnNode::leaf(VariantPath::root(), Subcolumn::with_defaults(num_rows))
        });
        for element in path.elements() {
            let child_path = node.path.clone().join(element.clone());
            node = node
                .children_for_insert()?
                .entry(element.clone())
                .or_insert_with(|| {
                    SubcolumnNode::leaf(child_path, Subcolumn::with_defaults(num_rows))
                });
        }
        match &mut node.kind {
            NodeKind::Leaf(data) => Ok(data),
            NodeKind::Branch(_) => Err(ambiguous_path(&node.path)),
        }
    }

    /// All leaves in depth-first insertion order
    pub fn leaves(&self) -> Vec<&SubcolumnNode> {
        let mut leaves = vec![];
        if let Some(root) = &self.root {
            root.collect_leaves(&mut leaves);
        }
        leaves
    }

    /// The subcolumns of all leaves in depth-first insertion order
    pub fn leaves_mut(&mut self) -> Vec<&mut Subcolumn> {
        let mut leaves = vec![];
        if let Some(root) = &mut self.root {
            root.collect_leaves_mut(&mut leaves);
        }
        leaves
    }

    pub fn num_leaves(&self) -> usize {
        self.leaves().len()
    }

    /// Finalizes every leaf subcolumn
    pub fn finalize(&mut self) -> Result<(), ArrowError> {
        self.leaves_mut()
            .into_iter()
            .try_for_each(|subcolumn| subcolumn.finalize())
    }

    pub fn is_finalized(&self) -> bool {
        self.leaves()
            .iter()
            .all(|leaf| leaf.data().is_some_and(Subcolumn::is_finalized))
    }

    /// Builds a new tree from `leaves`, inserting each subcolumn under its
    /// path (typically relative, as returned by [`SubcolumnNode::leaves_under`]).
    ///
    /// An empty path cannot be added as a keyed entry. When the rebuilt tree
    /// is empty and exactly one leaf was given, that leaf becomes the root,
    /// which is how a field without further structure turns into a
    /// scalar-rooted variant.
    pub fn rebuild_stripping_prefix(leaves: &[(&SubcolumnNode, VariantPath)]) -> Self {
        let mut tree = Self::new();
        for (node, path) in leaves {
            let Some(data) = node.data() else {
                continue;
            };
            tracing::debug!(
                path = %path,
                rows = data.len(),
                data_type = %data.least_common_type(),
                "add node"
            );
            if !tree.add(path, data.clone()) {
                tracing::debug!(path = %path, "failed to add node");
            }
        }
        if tree.is_empty() {
            if let [(node, _)] = leaves {
                if let Some(data) = node.data() {
                    tree.create_root(data.clone());
                }
            }
        }
        tree
    }
}
