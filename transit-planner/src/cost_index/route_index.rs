//! Dense route indices for one cost-index build.

use std::collections::HashMap;
use std::fmt;

use crate::domain::RouteId;

/// Routes numbered `0..len` in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteIndex {
    ids: Vec<RouteId>,
    positions: HashMap<RouteId, u32>,
}

impl RouteIndex {
    /// Number the given routes; duplicates are ignored.
    pub fn new(routes: impl IntoIterator<Item = RouteId>) -> Self {
        let mut ids: Vec<RouteId> = routes.into_iter().collect();
        ids.sort();
        ids.dedup();
        let positions = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i as u32))
            .collect();
        Self { ids, positions }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn index_of(&self, route: &RouteId) -> Option<u32> {
        self.positions.get(route).copied()
    }

    pub fn route_at(&self, index: u32) -> Option<&RouteId> {
        self.ids.get(index as usize)
    }

    /// Route ids in index order.
    pub fn ids(&self) -> &[RouteId] {
        &self.ids
    }

    /// The pair "reach `second` starting from `first`".
    pub fn pair(&self, first: u32, second: u32) -> RouteIndexPair {
        RouteIndexPair::new(first, second, self.ids.len())
    }

    /// Route ids of both ends of a pair.
    pub fn resolve(&self, pair: RouteIndexPair) -> Option<(RouteId, RouteId)> {
        Some((
            self.route_at(pair.first())?.clone(),
            self.route_at(pair.second())?.clone(),
        ))
    }
}

/// An ordered pair of dense route indices.
///
/// Pairs are only meaningful relative to the [`RouteIndex`] that made them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteIndexPair {
    first: u32,
    second: u32,
    key: u64,
}

impl RouteIndexPair {
    pub(super) fn new(first: u32, second: u32, route_count: usize) -> Self {
        Self {
            first,
            second,
            key: first as u64 * route_count as u64 + second as u64,
        }
    }

    pub fn first(&self) -> u32 {
        self.first
    }

    pub fn second(&self) -> u32 {
        self.second
    }

    /// `first * route_count + second`, unique within one index.
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn is_same_route(&self) -> bool {
        self.first == self.second
    }
}

impl fmt::Debug for RouteIndexPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.first, self.second)
    }
}
