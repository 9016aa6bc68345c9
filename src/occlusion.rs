//! The Occlusion Hierarchy (spec §4.6): a per-bucket KD-tree over sample
//! positions, aggregating each node's opaque-depth bound so whole
//! primitives can be culled without visiting every sample.

use crate::geom::Vec2;
use crate::kdtree::{KdTree, NodeId, NodeKind};

/// Per-node aggregate: the node's (x,y) footprint and the farthest opaque
/// depth among its descendant samples.
///
/// Spec §9 bugfix: the original source's `updateZValues` also propagates a
/// `min_z`, which culling never reads. Dropped here — only `max_z` is kept.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OcclusionAux {
    pub bound_min: Vec2<f32>,
    pub bound_max: Vec2<f32>,
    pub max_z: f32,
}

impl OcclusionAux {
    fn leaf(p: Vec2<f32>) -> Self {
        Self { bound_min: p, bound_max: p, max_z: f32::INFINITY }
    }

    fn combine(a: &Self, b: &Self) -> Self {
        Self {
            bound_min: Vec2::partial_min(a.bound_min, b.bound_min),
            bound_max: Vec2::partial_max(a.bound_max, b.bound_max),
            max_z: a.max_z.max(b.max_z),
        }
    }

    fn xy_intersects(&self, min: Vec2<f32>, max: Vec2<f32>) -> bool {
        self.bound_min.x <= max.x && self.bound_max.x >= min.x && self.bound_min.y <= max.y && self.bound_max.y >= min.y
    }
}

/// An axis-aligned query region used by `is_occluded`: a raster-space (x,y)
/// rectangle plus the near depth of whatever is being tested.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OcclusionQuery {
    pub min: Vec2<f32>,
    pub max: Vec2<f32>,
    pub z_min: f32,
}

/// Built lazily on first access per bucket (spec §4.6: "built once lazily
/// on first access").
pub struct OcclusionTree {
    tree: KdTree<OcclusionAux>,
    dirty: Vec<bool>,
}

impl OcclusionTree {
    pub fn build(positions: &[Vec2<f32>]) -> Self {
        let tree = KdTree::build(positions, |i| OcclusionAux::leaf(positions[i]), OcclusionAux::combine);
        let dirty = vec![false; tree.nodes.len()];
        Self { tree, dirty }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// `isOccluded(bound)` of spec §4.6: true iff every leaf whose (x,y)
    /// range intersects `query`'s footprint has `query.z_min >=
    /// leaf.max_opaque_z`. Recursion short-circuits on the first surviving
    /// (unoccluded) leaf and skips subtrees whose footprint doesn't
    /// intersect the query at all.
    pub fn is_occluded(&self, query: &OcclusionQuery) -> bool {
        match self.tree.root {
            Some(root) => self.is_occluded_rec(root, query),
            None => false,
        }
    }

    fn is_occluded_rec(&self, id: NodeId, query: &OcclusionQuery) -> bool {
        let node = self.tree.node(id);
        if !node.aux.xy_intersects(query.min, query.max) {
            return true;
        }
        match node.kind {
            NodeKind::Leaf { .. } => query.z_min >= node.aux.max_z,
            NodeKind::Split { left, right, .. } => {
                self.is_occluded_rec(left, query) && self.is_occluded_rec(right, query)
            }
        }
    }

    /// `updateFromSample(sampleId, newZ)` of spec §4.6: narrow the sample's
    /// leaf to `new_z` if it lowers the current bound, and mark every
    /// ancestor on the path to the root dirty. Ancestors are *not*
    /// recomputed here — `flush_updates` performs the batched sweep spec
    /// §4.6 describes, run once per MP rather than once per sample.
    pub fn update_from_sample(&mut self, item_index: usize, new_z: f32) {
        let leaf = self.tree.leaf_for_item(item_index);
        if new_z >= self.tree.node(leaf).aux.max_z {
            return;
        }
        self.tree.node_mut(leaf).aux.max_z = new_z;
        let mut cur = leaf;
        while let Some(parent) = self.tree.parent_of(cur) {
            self.dirty[parent.0 as usize] = true;
            cur = parent;
        }
    }

    /// Recompute every dirty interior node from its children, bottom-up.
    ///
    /// Relies on the arena invariant that a node's id is always greater
    /// than both of its children's ids (the builder pushes children before
    /// their parent), so a single ascending pass over dirty ids recomputes
    /// children strictly before the parents that depend on them.
    pub fn flush_updates(&mut self) {
        for id in 0..self.dirty.len() {
            if !self.dirty[id] {
                continue;
            }
            self.dirty[id] = false;
            if let NodeKind::Split { left, right, .. } = self.tree.node(NodeId(id as u32)).kind {
                let combined = OcclusionAux::combine(&self.tree.node(left).aux, &self.tree.node(right).aux);
                self.tree.node_mut(NodeId(id as u32)).aux = combined;
            }
        }
    }
}
