//! Interned binary trees over route index pairs.
//!
//! A tree describes how one route reaches another: a leaf is a single
//! change between adjacent routes, a branch joins a left part ending at some
//! route with a right part starting there. Trees live in a
//! [`PairTreeArena`] and are referred to by [`TreeId`]. Structurally equal
//! trees always get the same id, so sub-trees shared by many pairs are
//! stored once and equality is an id comparison.

use std::collections::{BTreeSet, HashMap};

use super::RouteIndexPair;

/// Handle of a tree in its arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(u32);

/// One interned tree node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PairTree {
    Leaf(RouteIndexPair),
    Branch { left: TreeId, right: TreeId },
}

/// Rewrites leaves into equivalent branches during [`PairTreeArena::visit`].
///
/// The visitor only sees pairs; interning stays with the arena.
pub trait TreeVisitor {
    /// Alternative two-part splits of `pair`. An empty list keeps the leaf.
    fn splits(&self, pair: RouteIndexPair) -> Vec<(RouteIndexPair, RouteIndexPair)>;
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    tree: PairTree,
    ends: RouteIndexPair,
    leaves: u32,
}

/// Owner of interned trees for one route index.
#[derive(Debug, Default)]
pub struct PairTreeArena {
    route_count: usize,
    slots: Vec<Slot>,
    leaves: HashMap<u64, TreeId>,
    branches: HashMap<(TreeId, TreeId), TreeId>,
}

impl PairTreeArena {
    pub fn new(route_count: usize) -> Self {
        Self {
            route_count,
            ..Self::default()
        }
    }

    /// Number of distinct trees.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The leaf for `pair`, created on first request.
    pub fn leaf(&mut self, pair: RouteIndexPair) -> TreeId {
        if let Some(id) = self.leaves.get(&pair.key()) {
            return *id;
        }
        let id = self.push(Slot {
            tree: PairTree::Leaf(pair),
            ends: pair,
            leaves: 1,
        });
        self.leaves.insert(pair.key(), id);
        id
    }

    /// The branch joining `left` and `right`, created on first request.
    ///
    /// `left` must end at the route where `right` starts.
    pub fn branch(&mut self, left: TreeId, right: TreeId) -> TreeId {
        if let Some(id) = self.branches.get(&(left, right)) {
            return *id;
        }
        let (l, r) = (self.slot(left), self.slot(right));
        debug_assert_eq!(l.ends.second(), r.ends.first(), "branch parts do not meet");
        let id = self.push(Slot {
            tree: PairTree::Branch { left, right },
            ends: RouteIndexPair::new(l.ends.first(), r.ends.second(), self.route_count),
            leaves: l.leaves + r.leaves,
        });
        self.branches.insert((left, right), id);
        id
    }

    pub fn get(&self, id: TreeId) -> Option<PairTree> {
        self.slots.get(id.0 as usize).map(|s| s.tree)
    }

    /// The pair a tree connects: first route of its leftmost leaf to the
    /// last route of its rightmost leaf.
    pub fn ends(&self, id: TreeId) -> Option<RouteIndexPair> {
        self.slots.get(id.0 as usize).map(|s| s.ends)
    }

    /// Number of leaves, which is the number of route changes described.
    pub fn hops(&self, id: TreeId) -> usize {
        self.slots.get(id.0 as usize).map_or(0, |s| s.leaves as usize)
    }

    /// Leaf pairs from left to right.
    pub fn flatten(&self, id: TreeId) -> Vec<RouteIndexPair> {
        let mut out = Vec::with_capacity(self.hops(id));
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            match self.get(next) {
                Some(PairTree::Leaf(pair)) => out.push(pair),
                Some(PairTree::Branch { left, right }) => {
                    stack.push(right);
                    stack.push(left);
                }
                None => {}
            }
        }
        out
    }

    /// Every tree obtained from `tree` by replacing each leaf with one of
    /// the visitor's splits (or keeping it when there are none).
    ///
    /// Splits whose parts do not chain from the leaf's first route to its
    /// second route are ignored.
    pub fn visit<V: TreeVisitor + ?Sized>(&mut self, tree: TreeId, visitor: &V) -> BTreeSet<TreeId> {
        match self.get(tree) {
            None => BTreeSet::new(),
            Some(PairTree::Leaf(pair)) => {
                let rewrites: Vec<_> = visitor
                    .splits(pair)
                    .into_iter()
                    .filter(|(a, b)| {
                        a.first() == pair.first()
                            && a.second() == b.first()
                            && b.second() == pair.second()
                    })
                    .collect();
                if rewrites.is_empty() {
                    return BTreeSet::from([tree]);
                }
                rewrites
                    .into_iter()
                    .map(|(a, b)| {
                        let (left, right) = (self.leaf(a), self.leaf(b));
                        self.branch(left, right)
                    })
                    .collect()
            }
            Some(PairTree::Branch { left, right }) => {
                let lefts = self.visit(left, visitor);
                let rights = self.visit(right, visitor);
                let mut out = BTreeSet::new();
                for l in &lefts {
                    for r in &rights {
                        out.insert(self.branch(*l, *r));
                    }
                }
                out
            }
        }
    }

    fn push(&mut self, slot: Slot) -> TreeId {
        let id = TreeId(self.slots.len() as u32);
        self.slots.push(slot);
        id
    }

    fn slot(&self, id: TreeId) -> Slot {
        self.slots[id.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost_index::RouteIndex;
    use crate::testing::rid;

    fn index(n: usize) -> RouteIndex {
        RouteIndex::new((0..n).map(|i| rid(&format!("R{i}"))))
    }

    #[test]
    fn leaves_are_interned() {
        let idx = index(4);
        let mut arena = PairTreeArena::new(idx.len());
        let a = arena.leaf(idx.pair(0, 1));
        let b = arena.leaf(idx.pair(0, 1));
        assert_eq!(a, b);
        assert_eq!(arena.len(), 1);
        assert_ne!(a, arena.leaf(idx.pair(1, 0)));
    }

    #[test]
    fn branches_are_interned() {
        let idx = index(4);
        let mut arena = PairTreeArena::new(idx.len());
        let left = arena.leaf(idx.pair(0, 1));
        let right = arena.leaf(idx.pair(1, 2));
        let first = arena.branch(left, right);
        let before = arena.len();

        let again = {
            let l = arena.leaf(idx.pair(0, 1));
            let r = arena.leaf(idx.pair(1, 2));
            arena.branch(l, r)
        };
        assert_eq!(first, again);
        assert_eq!(arena.len(), before);
        assert_eq!(arena.ends(first), Some(idx.pair(0, 2)));
        assert_eq!(arena.hops(first), 2);
    }

    #[test]
    fn shared_subtrees_stored_once() {
        let idx = index(5);
        let mut arena = PairTreeArena::new(idx.len());
        let l01 = arena.leaf(idx.pair(0, 1));
        let l12 = arena.leaf(idx.pair(1, 2));
        let l23 = arena.leaf(idx.pair(2, 3));
        let l24 = arena.leaf(idx.pair(2, 4));
        let prefix = arena.branch(l01, l12);
        let to3 = arena.branch(prefix, l23);
        let to4 = arena.branch(prefix, l24);

        assert_eq!(arena.get(to3), Some(PairTree::Branch { left: prefix, right: l23 }));
        assert_eq!(arena.get(to4), Some(PairTree::Branch { left: prefix, right: l24 }));
        // four leaves, one shared prefix, two tops
        assert_eq!(arena.len(), 7);
    }

    #[test]
    fn flatten_left_to_right() {
        let idx = index(4);
        let mut arena = PairTreeArena::new(idx.len());
        let l01 = arena.leaf(idx.pair(0, 1));
        let l12 = arena.leaf(idx.pair(1, 2));
        let l23 = arena.leaf(idx.pair(2, 3));
        let right = arena.branch(l12, l23);
        let tree = arena.branch(l01, right);
        assert_eq!(
            arena.flatten(tree),
            vec![idx.pair(0, 1), idx.pair(1, 2), idx.pair(2, 3)]
        );
        assert_eq!(arena.hops(tree), 3);
    }

    struct Via(Vec<u32>, usize);

    impl TreeVisitor for Via {
        fn splits(&self, pair: RouteIndexPair) -> Vec<(RouteIndexPair, RouteIndexPair)> {
            if pair.first() != 0 {
                return Vec::new();
            }
            self.0
                .iter()
                .map(|m| {
                    (
                        RouteIndexPair::new(pair.first(), *m, self.1),
                        RouteIndexPair::new(*m, pair.second(), self.1),
                    )
                })
                .collect()
        }
    }

    #[test]
    fn visit_enumerates_rewrites() {
        let idx = index(5);
        let mut arena = PairTreeArena::new(idx.len());
        let leaf = arena.leaf(idx.pair(0, 2));

        let rewrites = arena.visit(leaf, &Via(vec![1, 3], idx.len()));
        assert_eq!(rewrites.len(), 2);
        let flat: BTreeSet<_> = rewrites.iter().map(|t| arena.flatten(*t)).collect();
        assert!(flat.contains(&vec![idx.pair(0, 1), idx.pair(1, 2)]));
        assert!(flat.contains(&vec![idx.pair(0, 3), idx.pair(3, 2)]));
        // the original leaf is untouched
        assert_eq!(arena.get(leaf), Some(PairTree::Leaf(idx.pair(0, 2))));
    }

    #[test]
    fn visit_combines_both_sides() {
        let idx = index(5);
        let mut arena = PairTreeArena::new(idx.len());
        let l02 = arena.leaf(idx.pair(0, 2));
        let l24 = arena.leaf(idx.pair(2, 4));
        let tree = arena.branch(l02, l24);

        // only the left leaf starts at route 0
        let rewrites = arena.visit(tree, &Via(vec![1, 3], idx.len()));
        assert_eq!(rewrites.len(), 2);
        for t in &rewrites {
            assert_eq!(arena.hops(*t), 3);
            assert_eq!(arena.ends(*t), Some(idx.pair(0, 4)));
        }
    }

    #[test]
    fn visit_without_splits_returns_tree() {
        let idx = index(3);
        let mut arena = PairTreeArena::new(idx.len());
        let leaf = arena.leaf(idx.pair(1, 2));
        assert_eq!(arena.visit(leaf, &Via(vec![0], idx.len())), BTreeSet::from([leaf]));
    }

    #[test]
    fn non_chaining_splits_ignored() {
        struct Broken(usize);
        impl TreeVisitor for Broken {
            fn splits(&self, _: RouteIndexPair) -> Vec<(RouteIndexPair, RouteIndexPair)> {
                vec![(RouteIndexPair::new(0, 1, self.0), RouteIndexPair::new(2, 3, self.0))]
            }
        }
        let idx = index(4);
        let mut arena = PairTreeArena::new(idx.len());
        let leaf = arena.leaf(idx.pair(0, 3));
        assert_eq!(arena.visit(leaf, &Broken(4)), BTreeSet::from([leaf]));
    }
}
