//! A generic, arena-based KD-tree: indexed `Vec` storage, no pointers.
//!
//! Spec §9 re-architecture note: the reference source's winged-edge meshes
//! use pointer graphs with back-references; this crate follows the same
//! arena discipline for every indexed tree it needs, the occlusion
//! hierarchy (`crate::occlusion`) included. Nodes are addressed by `NodeId`
//! (a plain index into `nodes`), never by reference, so rebuilding or
//! batch-updating a subtree never fights the borrow checker.

use crate::geom::Vec2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    fn flip(self) -> Self {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Leaf { item: usize },
    Split { axis: Axis, value: f32, left: NodeId, right: NodeId },
}

#[derive(Clone, Debug)]
pub struct Node<A> {
    pub kind: NodeKind,
    pub aux: A,
}

/// A KD-tree over 2-D points, generic over the per-node auxiliary data `A`
/// (for the occlusion hierarchy, `A` is the `[min_z, max_z]` range; for
/// other future uses, callers aggregate whatever they need).
///
/// Besides the node arena, the tree keeps `parent[node]` and
/// `leaf_of[item]` lookup tables so `updateFromSample` (spec §4.6: "walks
/// up from the sample's leaf") is a plain index walk rather than a
/// root-to-leaf search.
#[derive(Clone, Debug)]
pub struct KdTree<A> {
    pub nodes: Vec<Node<A>>,
    pub root: Option<NodeId>,
    parent: Vec<Option<NodeId>>,
    leaf_of: Vec<NodeId>,
}

impl<A: Clone> KdTree<A> {
    /// Build a tree over `points`, subdividing alternately in x and y until
    /// each leaf holds exactly one point (spec §4.6), aggregating each
    /// node's auxiliary data bottom-up via `combine`.
    ///
    /// `leaf_aux(item_index) -> A` seeds leaves; `combine(left, right) -> A`
    /// folds two children's aux values into their parent's.
    pub fn build(
        points: &[Vec2<f32>],
        leaf_aux: impl Fn(usize) -> A,
        combine: impl Fn(&A, &A) -> A,
    ) -> Self {
        let mut nodes = Vec::with_capacity(points.len().saturating_mul(2));
        let mut indices: Vec<usize> = (0..points.len()).collect();
        let root = if indices.is_empty() {
            None
        } else {
            Some(build_recursive(points, &mut indices, Axis::X, &leaf_aux, &combine, &mut nodes))
        };

        let mut parent = vec![None; nodes.len()];
        let mut leaf_of = vec![NodeId(0); points.len()];
        if let Some(root) = root {
            link_parents(&nodes, root, None, &mut parent, &mut leaf_of);
        }

        Self { nodes, root, parent, leaf_of }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn node(&self, id: NodeId) -> &Node<A> {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node<A> {
        &mut self.nodes[id.0 as usize]
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parent[id.0 as usize]
    }

    /// The leaf node holding the point originally passed at `item_index`.
    pub fn leaf_for_item(&self, item_index: usize) -> NodeId {
        self.leaf_of[item_index]
    }

    /// Root-first path from the root down to `leaf`, built by repeated
    /// `parent_of` walks rather than a search.
    pub fn path_to(&self, leaf: NodeId) -> Vec<NodeId> {
        let mut path = vec![leaf];
        let mut cur = leaf;
        while let Some(p) = self.parent_of(cur) {
            path.push(p);
            cur = p;
        }
        path.reverse();
        path
    }
}

fn link_parents<A>(
    nodes: &[Node<A>],
    id: NodeId,
    parent_id: Option<NodeId>,
    parent: &mut [Option<NodeId>],
    leaf_of: &mut [NodeId],
) {
    parent[id.0 as usize] = parent_id;
    match nodes[id.0 as usize].kind {
        NodeKind::Leaf { item } => leaf_of[item] = id,
        NodeKind::Split { left, right, .. } => {
            link_parents(nodes, left, Some(id), parent, leaf_of);
            link_parents(nodes, right, Some(id), parent, leaf_of);
        }
    }
}

fn build_recursive<A: Clone>(
    points: &[Vec2<f32>],
    indices: &mut [usize],
    axis: Axis,
    leaf_aux: &impl Fn(usize) -> A,
    combine: &impl Fn(&A, &A) -> A,
    nodes: &mut Vec<Node<A>>,
) -> NodeId {
    if indices.len() == 1 {
        let item = indices[0];
        nodes.push(Node { kind: NodeKind::Leaf { item }, aux: leaf_aux(item) });
        return NodeId(nodes.len() as u32 - 1);
    }

    let key = |i: usize| match axis {
        Axis::X => points[i].x,
        Axis::Y => points[i].y,
    };
    indices.sort_by(|&a, &b| key(a).partial_cmp(&key(b)).unwrap());
    let mid = indices.len() / 2;
    let value = key(indices[mid]);
    let (left_idx, right_idx) = indices.split_at_mut(mid);

    let left = build_recursive(points, left_idx, axis.flip(), leaf_aux, combine, nodes);
    let right = build_recursive(points, right_idx, axis.flip(), leaf_aux, combine, nodes);
    let aux = combine(&nodes[left.0 as usize].aux.clone(), &nodes[right.0 as usize].aux.clone());
    nodes.push(Node { kind: NodeKind::Split { axis, value, left, right }, aux });
    NodeId(nodes.len() as u32 - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_over_n_points_has_n_leaves() {
        let pts = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.5, 0.5),
        ];
        let tree: KdTree<f32> = KdTree::build(&pts, |_| 0.0, |a, b| a.max(*b));
        let leaves = tree.nodes.iter().filter(|n| matches!(n.kind, NodeKind::Leaf { .. })).count();
        assert_eq!(leaves, pts.len());
    }

    #[test]
    fn aux_aggregates_max_bottom_up() {
        let pts = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0)];
        let zs = [1.0_f32, 5.0, 3.0];
        let tree: KdTree<f32> = KdTree::build(&pts, |i| zs[i], |a, b| a.max(*b));
        let root = tree.root.unwrap();
        assert_eq!(tree.node(root).aux, 5.0);
    }

    #[test]
    fn single_point_tree_is_one_leaf() {
        let pts = vec![Vec2::new(3.0, 4.0)];
        let tree: KdTree<f32> = KdTree::build(&pts, |_| 9.0, |a, b| a.max(*b));
        assert_eq!(tree.nodes.len(), 1);
        assert!(matches!(tree.node(tree.root.unwrap()).kind, NodeKind::Leaf { item: 0 }));
    }
}
