//! CSG (constructive solid geometry) trees, spec §4.4: "samples carry an
//! optional csg-node-id. At filter time (pre-resolve) each sample's list is
//! run through the CSG tree: leaf nodes map primitive contributions to
//! in/out booleans, interior nodes apply union/intersection/difference".
//!
//! A `Solid` block assigns every primitive bound inside it a fresh leaf id;
//! nesting `SolidBegin(op)/SolidEnd` blocks combines the leaves bound in
//! that block into one subtree under `op`. `SolidBuilder` mirrors that
//! scene-description-time nesting; the finished `CsgForest` is what
//! `resolve` consults per sample.

use std::collections::HashMap;

use crate::sample::SampleRecord;

/// The boolean operator a `Solid` block combines its children under.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolidOp {
    Union,
    Intersection,
    Difference,
}

/// A CSG tree: leaves reference a primitive's csg-node-id (assigned by
/// `SolidBuilder` at bind time); interior nodes combine two children by
/// `SolidOp`.
#[derive(Clone, Debug, PartialEq)]
pub enum CsgTree {
    Leaf(u32),
    Union(Box<CsgTree>, Box<CsgTree>),
    Intersection(Box<CsgTree>, Box<CsgTree>),
    Difference(Box<CsgTree>, Box<CsgTree>),
}

impl CsgTree {
    fn combine(op: SolidOp, a: CsgTree, b: CsgTree) -> CsgTree {
        match op {
            SolidOp::Union => CsgTree::Union(Box::new(a), Box::new(b)),
            SolidOp::Intersection => CsgTree::Intersection(Box::new(a), Box::new(b)),
            SolidOp::Difference => CsgTree::Difference(Box::new(a), Box::new(b)),
        }
    }

    /// Evaluate "is a point with this per-leaf inside/outside state inside
    /// the combined solid", given each leaf's current parity (spec: "leaf
    /// nodes map primitive contributions to in/out booleans").
    fn evaluate(&self, inside: &HashMap<u32, bool>) -> bool {
        match self {
            CsgTree::Leaf(id) => inside.get(id).copied().unwrap_or(false),
            CsgTree::Union(a, b) => a.evaluate(inside) || b.evaluate(inside),
            CsgTree::Intersection(a, b) => a.evaluate(inside) && b.evaluate(inside),
            CsgTree::Difference(a, b) => a.evaluate(inside) && !b.evaluate(inside),
        }
    }
}

/// Mirrors scene-description-time `SolidBegin(op)/SolidEnd` nesting: each
/// open block accumulates the subtrees of the primitives (and nested solid
/// blocks) bound inside it; `end` folds them together under the block's
/// operator and hands the result up to the enclosing block, or, at the
/// outermost level, finishes as one root of the forest.
#[derive(Default)]
pub struct SolidBuilder {
    next_leaf: u32,
    open: Vec<(SolidOp, Vec<CsgTree>)>,
    roots: Vec<CsgTree>,
    owner: HashMap<u32, usize>,
}

impl SolidBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        !self.open.is_empty()
    }

    pub fn depth(&self) -> u32 {
        self.open.len() as u32
    }

    /// `SolidBegin(op)`: open a new combination block.
    pub fn begin(&mut self, op: SolidOp) {
        self.open.push((op, Vec::new()));
    }

    /// Bind a primitive inside the currently open block, returning the
    /// fresh leaf id to attach to its attributes. Panics if no block is
    /// open — callers (the frame façade) only call this after checking
    /// `is_open`.
    pub fn bind_leaf(&mut self) -> u32 {
        let id = self.next_leaf;
        self.next_leaf += 1;
        let (_, children) = self.open.last_mut().expect("bind_leaf called with no open Solid block");
        children.push(CsgTree::Leaf(id));
        id
    }

    /// `SolidEnd`: fold the block's accumulated children together under its
    /// operator (pairwise, left to right, for blocks with more than two
    /// children) and hand the result to the enclosing block, or finish it
    /// as a forest root if this was the outermost block. A no-op if called
    /// with nothing open, mirroring `AttributeStack::end`'s tolerance of an
    /// unbalanced call.
    pub fn end(&mut self) {
        let Some((op, children)) = self.open.pop() else { return };
        let Some(combined) = fold(op, children) else { return };
        match self.open.last_mut() {
            Some((_, parent_children)) => parent_children.push(combined),
            None => {
                let root_idx = self.roots.len();
                register_leaves(&combined, root_idx, &mut self.owner);
                self.roots.push(combined);
            }
        }
    }

    /// Finish building: any still-open blocks are treated as implicitly
    /// closed (an unbalanced `SolidBegin` in the input is a scene-author
    /// error upstream of this core, not a reason to drop geometry).
    pub fn finish(mut self) -> CsgForest {
        while self.is_open() {
            self.end();
        }
        CsgForest { roots: self.roots, owner: self.owner }
    }
}

fn fold(op: SolidOp, mut children: Vec<CsgTree>) -> Option<CsgTree> {
    let mut iter = children.drain(..);
    let first = iter.next()?;
    Some(iter.fold(first, |acc, next| CsgTree::combine(op, acc, next)))
}

fn register_leaves(tree: &CsgTree, root_idx: usize, owner: &mut HashMap<u32, usize>) {
    match tree {
        CsgTree::Leaf(id) => {
            owner.insert(*id, root_idx);
        }
        CsgTree::Union(a, b) | CsgTree::Intersection(a, b) | CsgTree::Difference(a, b) => {
            register_leaves(a, root_idx, owner);
            register_leaves(b, root_idx, owner);
        }
    }
}

/// The finished set of CSG trees bound during a frame's world block, plus
/// the leaf-id -> root lookup `resolve` needs to find which tree (if any)
/// owns a given sample record.
#[derive(Default)]
pub struct CsgForest {
    roots: Vec<CsgTree>,
    owner: HashMap<u32, usize>,
}

impl CsgForest {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Resolve `list` (a depth-ordered run of sample records, spec §9's
    /// bugfix: the *entire* list, not one already truncated at the first
    /// `Occludes` hit) into the front-to-back sequence of *visible*
    /// surface crossings: records with no `csg_node_id`, or whose id this
    /// forest doesn't own, pass through unchanged; records that do belong
    /// to a tree are filtered down to just the crossings where the tree's
    /// combined inside/outside state flips from outside to inside, i.e.
    /// a genuine front surface of the boolean solid as seen from the
    /// camera.
    pub fn resolve(&self, list: &[SampleRecord]) -> Vec<SampleRecord> {
        if self.is_empty() {
            return list.to_vec();
        }

        let mut groups: HashMap<Option<usize>, Vec<SampleRecord>> = HashMap::new();
        for record in list {
            let key = record.csg_node_id.and_then(|id| self.owner.get(&id).copied());
            groups.entry(key).or_default().push(*record);
        }

        let mut out = Vec::with_capacity(list.len());
        for (key, records) in groups {
            match key.and_then(|i| self.roots.get(i)) {
                Some(tree) => out.extend(visible_crossings(tree, &records)),
                None => out.extend(records),
            }
        }
        out.sort_by(|a, b| a.data.z.partial_cmp(&b.data.z).unwrap());
        out
    }
}

/// Standard ray-CSG sweep: walk a tree's own depth-ordered hits, toggling
/// that leaf's inside/outside parity at each one, and keep exactly the
/// hits where the *combined* tree evaluates false just before and true
/// just after — the solid's visible front surfaces, nearest first.
fn visible_crossings(tree: &CsgTree, list: &[SampleRecord]) -> Vec<SampleRecord> {
    let mut inside: HashMap<u32, bool> = HashMap::new();
    let mut visible = Vec::new();
    for record in list {
        let Some(id) = record.csg_node_id else {
            visible.push(*record);
            continue;
        };
        let before = tree.evaluate(&inside);
        let flipped = !inside.get(&id).copied().unwrap_or(false);
        inside.insert(id, flipped);
        let after = tree.evaluate(&inside);
        if !before && after {
            visible.push(*record);
        }
    }
    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vec3;
    use crate::sample::{SampleData, SampleFlags};

    fn rec(z: f32, leaf: u32, ci: f32) -> SampleRecord {
        SampleRecord {
            data: SampleData { ci: Vec3::broadcast(ci), oi: Vec3::broadcast(1.0), z },
            flags: SampleFlags::VALID | SampleFlags::OCCLUDES,
            csg_node_id: Some(leaf),
        }
    }

    #[test]
    fn a_union_of_two_spheres_shows_the_nearest_entering_surface_of_either() {
        let mut builder = SolidBuilder::new();
        builder.begin(SolidOp::Union);
        let a = builder.bind_leaf();
        let b = builder.bind_leaf();
        builder.end();
        let forest = builder.finish();

        // Sphere a entered at z=1, exited at z=3; sphere b entered at z=2,
        // exited at z=4. The union's visible front surface is a's entry at
        // z=1 only (b's entry at z=2 is already inside the union via a).
        let list = vec![rec(1.0, a, 0.2), rec(2.0, b, 0.8), rec(3.0, a, 0.2), rec(4.0, b, 0.8)];
        let visible = forest.resolve(&list);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].data.z, 1.0);
    }

    #[test]
    fn an_intersection_shows_the_farther_of_the_two_entry_points() {
        let mut builder = SolidBuilder::new();
        builder.begin(SolidOp::Intersection);
        let a = builder.bind_leaf();
        let b = builder.bind_leaf();
        builder.end();
        let forest = builder.finish();

        let list = vec![rec(1.0, a, 0.2), rec(2.0, b, 0.8), rec(3.0, a, 0.2), rec(4.0, b, 0.8)];
        let visible = forest.resolve(&list);
        // Intersection only becomes true once both are inside, at b's
        // entry (z=2); it turns false again at a's exit (z=3), which is an
        // exit (true->false) rather than an entry, so it's dropped.
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].data.z, 2.0);
    }

    #[test]
    fn a_difference_hides_the_second_operands_surfaces_while_it_overlaps() {
        let mut builder = SolidBuilder::new();
        builder.begin(SolidOp::Difference);
        let a = builder.bind_leaf();
        let b = builder.bind_leaf();
        builder.end();
        let forest = builder.finish();

        // a from z=1..3, b (the cut-out) from z=2..4: a-b is visible from
        // 1..2 (entry at z=1) and, since b fully swallows the rest of a,
        // has no second visible entry.
        let list = vec![rec(1.0, a, 0.2), rec(2.0, b, 0.8), rec(3.0, a, 0.2), rec(4.0, b, 0.8)];
        let visible = forest.resolve(&list);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].data.z, 1.0);
    }

    #[test]
    fn records_outside_any_solid_pass_through_unchanged() {
        let mut builder = SolidBuilder::new();
        builder.begin(SolidOp::Union);
        builder.bind_leaf();
        builder.end();
        let forest = builder.finish();

        let ordinary = SampleRecord {
            data: SampleData { ci: Vec3::broadcast(0.5), oi: Vec3::broadcast(0.5), z: 0.5 },
            flags: SampleFlags::VALID,
            csg_node_id: None,
        };
        let resolved = forest.resolve(&[ordinary]);
        assert_eq!(resolved, vec![ordinary]);
    }

    #[test]
    fn nested_solid_blocks_compose_into_one_root() {
        let mut builder = SolidBuilder::new();
        builder.begin(SolidOp::Union);
        builder.bind_leaf();
        builder.begin(SolidOp::Difference);
        builder.bind_leaf();
        builder.bind_leaf();
        builder.end();
        builder.end();
        let forest = builder.finish();
        assert_eq!(forest.roots.len(), 1);
    }

    #[test]
    fn an_empty_forest_passes_every_record_through() {
        let forest = CsgForest::empty();
        let list = vec![rec(1.0, 7, 0.5)];
        assert_eq!(forest.resolve(&list), list);
    }
}
