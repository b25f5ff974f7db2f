//! Feature sets: an arena of composable, binary board-feature families.
//!
//! Feature sets form a DAG rather than a tree (a product of two sums may
//! reach a common leaf along multiple paths), so rather than pointer-shared
//! trees this module stores every node in a flat arena and refers to
//! children by [`FeatureSetId`] index. Tracker construction memoises over
//! the same ids (see [`crate::trackers`]) so a shared child never gets a
//! duplicate tracker.

pub mod local_shape;
pub mod shared;

use crate::error::ConfigError;
use local_shape::LocalShapeFeatureSet;
use shared::{build_share_table, ShareKind, ShareTable};

/// Index of a node within a [`FeatureSetArena`].
pub type FeatureSetId = usize;

#[derive(Debug, Clone)]
pub enum FeatureSetNode {
    LocalShape(LocalShapeFeatureSet),
    /// Equivalence classes over a local-shape child.
    Shared {
        child: FeatureSetId,
        kind: ShareKind,
        table: ShareTable,
    },
    /// Concatenation of children; parent index = child-local index + offset.
    Sum {
        children: Vec<FeatureSetId>,
        offsets: Vec<usize>,
        size: usize,
    },
    /// Cartesian product of two children: `ia + na * ib`.
    Product { a: FeatureSetId, b: FeatureSetId, size: usize },
}

/// Owns every feature-set node built for one run.
#[derive(Debug, Clone, Default)]
pub struct FeatureSetArena {
    nodes: Vec<FeatureSetNode>,
}

impl FeatureSetArena {
    pub fn new() -> FeatureSetArena {
        FeatureSetArena { nodes: Vec::new() }
    }

    pub fn node(&self, id: FeatureSetId) -> &FeatureSetNode {
        &self.nodes[id]
    }

    /// Number of nodes registered so far. Nodes are appended in dependency
    /// order, so `0..len()` is already a valid topological order.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_local_shape(&mut self, w: usize, h: usize, s: usize) -> FeatureSetId {
        self.nodes.push(FeatureSetNode::LocalShape(LocalShapeFeatureSet::new(w, h, s)));
        self.nodes.len() - 1
    }

    /// Adds a shared set over a local-shape child, building its share table.
    pub fn add_shared(
        &mut self,
        child: FeatureSetId,
        kind: ShareKind,
        ignore_empty: bool,
        ignore_self_inverse: bool,
    ) -> Result<FeatureSetId, ConfigError> {
        let table = match &self.nodes[child] {
            FeatureSetNode::LocalShape(ls) => build_share_table(ls, kind, ignore_empty, ignore_self_inverse),
            _ => {
                return Err(ConfigError::InvalidValue {
                    setting: "shared.child",
                    reason: "shared feature sets may only wrap a local-shape child".to_string(),
                })
            }
        };
        self.nodes.push(FeatureSetNode::Shared { child, kind, table });
        Ok(self.nodes.len() - 1)
    }

    pub fn add_sum(&mut self, children: Vec<FeatureSetId>) -> FeatureSetId {
        let mut offsets = Vec::with_capacity(children.len());
        let mut total = 0usize;
        for &c in &children {
            offsets.push(total);
            total += self.num_features(c);
        }
        self.nodes.push(FeatureSetNode::Sum { children, offsets, size: total });
        self.nodes.len() - 1
    }

    pub fn add_product(&mut self, a: FeatureSetId, b: FeatureSetId) -> FeatureSetId {
        let size = self.num_features(a) * self.num_features(b);
        self.nodes.push(FeatureSetNode::Product { a, b, size });
        self.nodes.len() - 1
    }

    pub fn num_features(&self, id: FeatureSetId) -> usize {
        match &self.nodes[id] {
            FeatureSetNode::LocalShape(ls) => ls.num_features(),
            FeatureSetNode::Shared { table, .. } => table.num_outputs(),
            FeatureSetNode::Sum { size, .. } => *size,
            FeatureSetNode::Product { size, .. } => *size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_offsets_accumulate_child_sizes() {
        let mut arena = FeatureSetArena::new();
        let a = arena.add_local_shape(1, 1, 5);
        let b = arena.add_local_shape(2, 1, 5);
        let sum = arena.add_sum(vec![a, b]);
        assert_eq!(
            arena.num_features(sum),
            arena.num_features(a) + arena.num_features(b)
        );
    }

    #[test]
    fn product_size_multiplies() {
        let mut arena = FeatureSetArena::new();
        let a = arena.add_local_shape(1, 1, 5);
        let b = arena.add_local_shape(1, 1, 5);
        let p = arena.add_product(a, b);
        assert_eq!(arena.num_features(p), arena.num_features(a) * arena.num_features(b));
    }

    #[test]
    fn shared_child_must_be_local_shape() {
        let mut arena = FeatureSetArena::new();
        let a = arena.add_local_shape(1, 1, 5);
        let b = arena.add_local_shape(1, 1, 5);
        let sum = arena.add_sum(vec![a, b]);
        assert!(arena.add_shared(sum, ShareKind::Ci, true, true).is_err());
    }
}
