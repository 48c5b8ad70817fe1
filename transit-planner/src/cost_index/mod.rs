//! Route-to-route change cost index.
//!
//! Answers "how many route changes does it take, at least, to get from route
//! A to route B" without searching the timetable. Two routes are adjacent
//! when some station is served by both, or when a walk link joins stations
//! served by each. The index expands adjacency breadth first and records,
//! for every reachable pair, the hop count and one shortest sequence of
//! changes as an interned [`PairTree`].
//!
//! The index is built from an already filtered [`TransitGraph`], so routes
//! excluded by the build filter never take part in a chain.

mod matrix;
mod pair_tree;
mod route_index;

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use matrix::{HopsMatrix, UNREACHABLE};
pub use pair_tree::{PairTree, PairTreeArena, TreeId, TreeVisitor};
pub use route_index::{RouteIndex, RouteIndexPair};

use crate::cache::{CacheError, DataCache};
use crate::domain::RouteId;
use crate::graph::{DecodeError, GraphNode, NodeId, RelationshipKind, TransitGraph};

/// Cost index settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostIndexConfig {
    /// Largest hop count the expansion looks for.
    pub max_depth: u8,
    /// Key of the persisted snapshot in the data cache.
    pub cache_key: String,
}

impl Default for CostIndexConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            cache_key: "route_cost_index".to_string(),
        }
    }
}

impl CostIndexConfig {
    fn depth_limit(&self) -> u8 {
        self.max_depth.clamp(1, UNREACHABLE - 1)
    }
}

/// Failure to load or save a cost index.
#[derive(Debug, thiserror::Error)]
pub enum CostIndexError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("persisted index covers different routes than the graph")]
    RouteMismatch,

    #[error("persisted hop matrix is inconsistent with its own adjacency")]
    MatrixMismatch,

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Persisted form of a [`RouteCostIndex`].
///
/// Only the matrix is stored. Trees are regenerated from the hop-1 entries
/// when loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostIndexSnapshot {
    pub routes: Vec<RouteId>,
    pub matrix: HopsMatrix,
    pub max_depth: u8,
    pub truncated: bool,
}

/// Minimum route changes between every pair of routes of one graph.
#[derive(Debug)]
pub struct RouteCostIndex {
    index: RouteIndex,
    matrix: HopsMatrix,
    arena: PairTreeArena,
    trees: HashMap<u64, TreeId>,
    max_depth: u8,
    truncated: bool,
}

impl RouteCostIndex {
    /// Build the index for the routes of `graph`.
    pub fn build(graph: &TransitGraph, config: &CostIndexConfig) -> Result<Self, DecodeError> {
        let index = RouteIndex::new(graph.routes().keys().cloned());
        let adjacency = adjacency(graph, &index)?;
        let built = Self::expand(index, &adjacency, config.depth_limit());
        info!(
            routes = built.index.len(),
            reachable_pairs = built.matrix.reachable_pairs(),
            trees = built.arena.len(),
            truncated = built.truncated,
            "built route cost index"
        );
        Ok(built)
    }

    fn expand(index: RouteIndex, adjacency: &[BTreeSet<u32>], max_depth: u8) -> Self {
        let n = index.len();
        let mut arena = PairTreeArena::new(n);
        let mut matrix = HopsMatrix::new(n);
        let mut trees = HashMap::new();

        let mut frontier = Vec::new();
        for (from, adjacent) in adjacency.iter().enumerate() {
            for to in adjacent {
                let pair = index.pair(from as u32, *to);
                trees.insert(pair.key(), arena.leaf(pair));
                matrix.set(pair.first(), pair.second(), 1);
                frontier.push(pair);
            }
        }

        let mut depth = 1;
        while !frontier.is_empty() && depth < max_depth {
            depth += 1;
            let mut next = Vec::new();
            for pair in &frontier {
                let Some(left) = trees.get(&pair.key()).copied() else {
                    continue;
                };
                for m in &adjacency[pair.second() as usize] {
                    if matrix.is_reachable(pair.first(), *m) {
                        continue;
                    }
                    let Some(right) = trees.get(&index.pair(pair.second(), *m).key()).copied()
                    else {
                        continue;
                    };
                    let found = index.pair(pair.first(), *m);
                    trees.insert(found.key(), arena.branch(left, right));
                    matrix.set(found.first(), found.second(), depth);
                    next.push(found);
                }
            }
            debug!(depth, discovered = next.len(), "expanded route pairs");
            frontier = next;
        }

        Self {
            index,
            matrix,
            arena,
            trees,
            max_depth,
            truncated: !frontier.is_empty(),
        }
    }

    pub fn route_index(&self) -> &RouteIndex {
        &self.index
    }

    pub fn matrix(&self) -> &HopsMatrix {
        &self.matrix
    }

    pub fn arena(&self) -> &PairTreeArena {
        &self.arena
    }

    /// True if expansion stopped at the depth limit with pairs still to find.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Minimum number of changes from `from` to `to`.
    ///
    /// Zero for the same route, [`UNREACHABLE`] when no chain exists or a
    /// route is not in the index.
    pub fn min_hops(&self, from: &RouteId, to: &RouteId) -> u8 {
        match (self.index.index_of(from), self.index.index_of(to)) {
            (Some(a), Some(b)) => self.matrix.get(a, b),
            _ => UNREACHABLE,
        }
    }

    /// The recorded shortest tree for a pair of distinct, connected routes.
    pub fn pair_tree(&self, from: &RouteId, to: &RouteId) -> Option<TreeId> {
        let pair = self.index_pair(from, to)?;
        self.trees.get(&pair.key()).copied()
    }

    /// The recorded shortest chain of changes as route id pairs.
    pub fn flatten(&self, from: &RouteId, to: &RouteId) -> Option<Vec<(RouteId, RouteId)>> {
        let tree = self.pair_tree(from, to)?;
        self.resolve_all(&self.arena.flatten(tree))
    }

    /// Apply `visitor` to the recorded tree of a pair and return every
    /// resulting chain.
    ///
    /// Rewrites happen in a scratch arena; the index itself is not changed.
    pub fn visit<V: TreeVisitor + ?Sized>(
        &self,
        from: &RouteId,
        to: &RouteId,
        visitor: &V,
    ) -> Vec<Vec<(RouteId, RouteId)>> {
        let Some(tree) = self.pair_tree(from, to) else {
            return Vec::new();
        };
        let mut scratch = PairTreeArena::new(self.index.len());
        let Some(root) = copy_tree(&self.arena, tree, &mut scratch) else {
            return Vec::new();
        };
        let rewritten = scratch.visit(root, visitor);
        self.chains(&scratch, rewritten)
    }

    /// Every distinct shortest chain of changes between two routes.
    ///
    /// Not used while searching; this enumerates all equally short
    /// alternatives and can be large on dense networks.
    pub fn decompositions(&self, from: &RouteId, to: &RouteId) -> Vec<Vec<(RouteId, RouteId)>> {
        let Some(pair) = self.index_pair(from, to) else {
            return Vec::new();
        };
        if !self.matrix.is_reachable(pair.first(), pair.second()) {
            return Vec::new();
        }
        let splitter = ShortestSplits {
            matrix: &self.matrix,
            route_count: self.index.len(),
        };
        let mut scratch = PairTreeArena::new(self.index.len());
        let mut current = BTreeSet::from([scratch.leaf(pair)]);
        loop {
            let mut next = BTreeSet::new();
            for tree in &current {
                next.extend(scratch.visit(*tree, &splitter));
            }
            if next == current {
                break;
            }
            current = next;
        }
        self.chains(&scratch, current)
    }

    /// Lower bound on the changes needed to get from `route` onto any of
    /// `destinations`.
    ///
    /// `None` when none of them can be reached. A truncated index reports
    /// pairs it never discovered as one more than its depth limit.
    pub fn lower_bound<'a>(
        &self,
        route: &RouteId,
        destinations: impl IntoIterator<Item = &'a RouteId>,
    ) -> Option<u8> {
        let best = destinations
            .into_iter()
            .map(|d| self.min_hops(route, d))
            .min()
            .unwrap_or(UNREACHABLE);
        if best != UNREACHABLE {
            Some(best)
        } else if self.truncated && self.index.index_of(route).is_some() {
            Some(self.max_depth.saturating_add(1))
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> CostIndexSnapshot {
        CostIndexSnapshot {
            routes: self.index.ids().to_vec(),
            matrix: self.matrix.clone(),
            max_depth: self.max_depth,
            truncated: self.truncated,
        }
    }

    /// Restore an index for `graph` from a snapshot.
    ///
    /// The snapshot must name exactly the graph's routes and its matrix must
    /// be what expanding its own hop-1 entries produces.
    pub fn from_snapshot(
        snapshot: CostIndexSnapshot,
        graph: &TransitGraph,
    ) -> Result<Self, CostIndexError> {
        let index = RouteIndex::new(snapshot.routes.iter().cloned());
        let expected = RouteIndex::new(graph.routes().keys().cloned());
        if index.len() != snapshot.routes.len() || index != expected {
            return Err(CostIndexError::RouteMismatch);
        }
        let n = index.len();
        if !snapshot.matrix.is_well_formed() || snapshot.matrix.size() != n {
            return Err(CostIndexError::MatrixMismatch);
        }

        let mut adjacency = vec![BTreeSet::new(); n];
        for (from, adjacent) in adjacency.iter_mut().enumerate() {
            for to in 0..n as u32 {
                if snapshot.matrix.get(from as u32, to) == 1 {
                    adjacent.insert(to);
                }
            }
        }
        let restored = Self::expand(index, &adjacency, snapshot.max_depth.clamp(1, UNREACHABLE - 1));
        if restored.matrix != snapshot.matrix || restored.truncated != snapshot.truncated {
            return Err(CostIndexError::MatrixMismatch);
        }
        Ok(restored)
    }

    pub fn save<C: DataCache>(&self, cache: &C, key: &str) -> Result<(), CostIndexError> {
        cache.save(key, &self.snapshot())?;
        Ok(())
    }

    pub fn load<C: DataCache>(
        cache: &C,
        key: &str,
        graph: &TransitGraph,
    ) -> Result<Self, CostIndexError> {
        let snapshot: CostIndexSnapshot = cache.load(key)?;
        Self::from_snapshot(snapshot, graph)
    }

    /// Load the persisted index, or build and persist a fresh one.
    ///
    /// Any load failure falls back to a rebuild. Only a failed build is an
    /// error; a failed save is logged.
    pub fn load_or_build<C: DataCache>(
        graph: &TransitGraph,
        config: &CostIndexConfig,
        cache: &C,
    ) -> Result<Self, CostIndexError> {
        let key = config.cache_key.as_str();
        if cache.has(key) {
            match Self::load(cache, key, graph) {
                Ok(index) if index.max_depth == config.depth_limit() => {
                    info!(key, routes = index.index.len(), "loaded route cost index");
                    return Ok(index);
                }
                Ok(index) => warn!(
                    key,
                    stored = index.max_depth,
                    configured = config.depth_limit(),
                    "persisted route cost index has another depth limit, rebuilding"
                ),
                Err(error) => warn!(key, %error, "could not load route cost index, rebuilding"),
            }
        }
        let index = Self::build(graph, config)?;
        if let Err(error) = index.save(cache, key) {
            warn!(key, %error, "could not save route cost index");
        }
        Ok(index)
    }

    fn index_pair(&self, from: &RouteId, to: &RouteId) -> Option<RouteIndexPair> {
        Some(self.index.pair(self.index.index_of(from)?, self.index.index_of(to)?))
    }

    fn resolve_all(&self, pairs: &[RouteIndexPair]) -> Option<Vec<(RouteId, RouteId)>> {
        pairs.iter().map(|p| self.index.resolve(*p)).collect()
    }

    fn chains(
        &self,
        arena: &PairTreeArena,
        trees: impl IntoIterator<Item = TreeId>,
    ) -> Vec<Vec<(RouteId, RouteId)>> {
        let flat: BTreeSet<Vec<RouteIndexPair>> =
            trees.into_iter().map(|t| arena.flatten(t)).collect();
        flat.iter().filter_map(|pairs| self.resolve_all(pairs)).collect()
    }
}

/// Splits a pair at every route that lies on some shortest chain.
struct ShortestSplits<'a> {
    matrix: &'a HopsMatrix,
    route_count: usize,
}

impl TreeVisitor for ShortestSplits<'_> {
    fn splits(&self, pair: RouteIndexPair) -> Vec<(RouteIndexPair, RouteIndexPair)> {
        let (a, b) = (pair.first(), pair.second());
        let total = self.matrix.get(a, b);
        if total == UNREACHABLE || total <= 1 {
            return Vec::new();
        }
        (0..self.route_count as u32)
            .filter(|c| {
                let (x, y) = (self.matrix.get(a, *c), self.matrix.get(*c, b));
                x != 0
                    && y != 0
                    && x != UNREACHABLE
                    && y != UNREACHABLE
                    && u16::from(x) + u16::from(y) == u16::from(total)
            })
            .map(|c| {
                (
                    RouteIndexPair::new(a, c, self.route_count),
                    RouteIndexPair::new(c, b, self.route_count),
                )
            })
            .collect()
    }
}

fn copy_tree(from: &PairTreeArena, tree: TreeId, into: &mut PairTreeArena) -> Option<TreeId> {
    Some(match from.get(tree)? {
        PairTree::Branch { left, right } => {
            let l = copy_tree(from, left, into)?;
            let r = copy_tree(from, right, into)?;
            into.branch(l, r)
        }
        PairTree::Leaf(pair) => into.leaf(pair),
    })
}

/// Route adjacency read from the graph: routes boarding at the same station,
/// and routes at the two ends of a walk.
fn adjacency(graph: &TransitGraph, index: &RouteIndex) -> Result<Vec<BTreeSet<u32>>, DecodeError> {
    let tx = graph.begin_read();
    let mut routes_at: HashMap<NodeId, BTreeSet<u32>> = HashMap::new();
    let mut walks = Vec::new();

    for station in graph.stations() {
        let Some(node) = graph.station_node(&station.id) else {
            continue;
        };
        let served = routes_at.entry(node).or_default();
        for rel in tx.outgoing(node)? {
            match rel.kind {
                kind if kind.is_board() => {
                    if let GraphNode::BoardingPoint { route, .. } = GraphNode::decode(tx.node(rel.end)?)? {
                        if let Some(i) = index.index_of(&route) {
                            served.insert(i);
                        }
                    }
                }
                RelationshipKind::Walk => walks.push((rel.start, rel.end)),
                _ => {}
            }
        }
    }

    let mut adjacency = vec![BTreeSet::new(); index.len()];
    let mut link = |a: &BTreeSet<u32>, b: &BTreeSet<u32>| {
        for i in a {
            for j in b {
                if i != j {
                    adjacency[*i as usize].insert(*j);
                }
            }
        }
    };
    for served in routes_at.values() {
        link(served, served);
    }
    let empty = BTreeSet::new();
    for (from, to) in walks {
        let a = routes_at.get(&from).unwrap_or(&empty);
        let b = routes_at.get(&to).unwrap_or(&empty);
        link(a, b);
        link(b, a);
    }
    Ok(adjacency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileDataCache;
    use crate::domain::TransportMode;
    use crate::filter::EntityFilter;
    use crate::graph::GraphConfig;
    use crate::testing::{aid, chain_network, rid, Network};
    use proptest::prelude::*;

    fn build(data: &crate::domain::TransitData, filter: EntityFilter) -> (TransitGraph, RouteCostIndex) {
        let graph = TransitGraph::build(data, filter, GraphConfig::default()).unwrap();
        let index = RouteCostIndex::build(&graph, &CostIndexConfig::default()).unwrap();
        (graph, index)
    }

    fn chain(pairs: &[(&str, &str)]) -> Vec<(RouteId, RouteId)> {
        pairs.iter().map(|(a, b)| (rid(a), rid(b))).collect()
    }

    /// R1 and R4 meet R2 and R3 at S; R2 and R3 both reach T where R5 runs.
    fn diamond() -> crate::domain::TransitData {
        let mut net = Network::new().agency("MET").daily("D");
        for (id, km) in [("P", 0.0), ("S", 1.0), ("T", 2.0), ("U", 3.0)] {
            net = net.station(id, km);
        }
        for r in ["R1", "R2", "R3", "R5"] {
            net = net.route(r, "MET", TransportMode::Tram);
        }
        net.trip("t1", "R1", "D", &[("P", "08:00"), ("S", "08:10")])
            .trip("t2", "R2", "D", &[("S", "08:20"), ("T", "08:30")])
            .trip("t3", "R3", "D", &[("S", "08:25"), ("T", "08:40")])
            .trip("t5", "R5", "D", &[("T", "08:50"), ("U", "09:00")])
            .build()
    }

    #[test]
    fn three_route_chain() {
        let (_, index) = build(&chain_network(), EntityFilter::include_all());
        assert_eq!(index.min_hops(&rid("R1"), &rid("R2")), 1);
        assert_eq!(index.min_hops(&rid("R1"), &rid("R3")), 2);
        assert_eq!(index.min_hops(&rid("R3"), &rid("R1")), 2);
        assert_eq!(index.min_hops(&rid("R2"), &rid("R2")), 0);
        assert_eq!(
            index.flatten(&rid("R1"), &rid("R3")),
            Some(chain(&[("R1", "R2"), ("R2", "R3")]))
        );
        assert!(!index.is_truncated());
    }

    #[test]
    fn flatten_length_matches_hops() {
        let (graph, index) = build(&diamond(), EntityFilter::include_all());
        for a in graph.routes().keys() {
            for b in graph.routes().keys() {
                let hops = index.min_hops(a, b);
                match index.flatten(a, b) {
                    Some(steps) => {
                        assert_eq!(steps.len(), hops as usize);
                        assert_eq!(&steps[0].0, a);
                        assert_eq!(&steps[steps.len() - 1].1, b);
                        for w in steps.windows(2) {
                            assert_eq!(w[0].1, w[1].0);
                        }
                    }
                    None => assert!(a == b || hops == UNREACHABLE),
                }
            }
        }
    }

    #[test]
    fn unknown_route_is_unreachable() {
        let (_, index) = build(&chain_network(), EntityFilter::include_all());
        assert_eq!(index.min_hops(&rid("R1"), &rid("R9")), UNREACHABLE);
        assert_eq!(index.min_hops(&rid("R9"), &rid("R9")), UNREACHABLE);
        assert_eq!(index.flatten(&rid("R1"), &rid("R9")), None);
    }

    #[test]
    fn disconnected_components_unreachable() {
        let data = Network::new()
            .agency("MET")
            .daily("D")
            .station("A", 0.0)
            .station("B", 1.0)
            .station("C", 5.0)
            .station("E", 6.0)
            .route("R1", "MET", TransportMode::Tram)
            .route("R2", "MET", TransportMode::Tram)
            .trip("t1", "R1", "D", &[("A", "08:00"), ("B", "08:05")])
            .trip("t2", "R2", "D", &[("C", "08:00"), ("E", "08:05")])
            .build();
        let (_, index) = build(&data, EntityFilter::include_all());
        assert_eq!(index.min_hops(&rid("R1"), &rid("R2")), UNREACHABLE);
        assert_eq!(index.lower_bound(&rid("R1"), [&rid("R2")]), None);
        assert!(index.decompositions(&rid("R1"), &rid("R2")).is_empty());
    }

    #[test]
    fn walk_links_make_routes_adjacent() {
        let data = Network::new()
            .agency("MET")
            .daily("D")
            .station("A", 0.0)
            .station("B", 1.0)
            .station("C", 1.2)
            .station("E", 2.0)
            .route("R1", "MET", TransportMode::Tram)
            .route("R2", "MET", TransportMode::Bus)
            .trip("t1", "R1", "D", &[("A", "08:00"), ("B", "08:05")])
            .trip("t2", "R2", "D", &[("C", "08:10"), ("E", "08:15")])
            .walk("B", "C", 4)
            .build();
        let (_, index) = build(&data, EntityFilter::include_all());
        assert_eq!(index.min_hops(&rid("R1"), &rid("R2")), 1);
        assert_eq!(index.min_hops(&rid("R2"), &rid("R1")), 1);
    }

    #[test]
    fn agency_filter_hides_excluded_routes() {
        let only_met = EntityFilter::builder().add_agency(aid("MET")).build();
        let (_, index) = build(&chain_network(), only_met);
        assert_eq!(index.min_hops(&rid("R1"), &rid("R2")), 1);
        assert_eq!(index.min_hops(&rid("R1"), &rid("R3")), UNREACHABLE);
        assert_eq!(index.min_hops(&rid("R3"), &rid("R2")), UNREACHABLE);

        // R1 and R2 share X but neither is run by the bus company
        let only_bus = EntityFilter::builder().add_agency(aid("BUS")).build();
        let (_, index) = build(&chain_network(), only_bus);
        assert_eq!(index.min_hops(&rid("R1"), &rid("R2")), UNREACHABLE);
    }

    #[test]
    fn hops_never_shrink_when_routes_filtered() {
        let (_, full) = build(&diamond(), EntityFilter::include_all());
        let filter = EntityFilter::builder()
            .add_route(rid("R1"))
            .add_route(rid("R3"))
            .add_route(rid("R5"))
            .build();
        let (graph, filtered) = build(&diamond(), filter);
        assert_eq!(graph.routes().len(), 3);
        for a in graph.routes().keys() {
            for b in graph.routes().keys() {
                assert!(filtered.min_hops(a, b) >= full.min_hops(a, b));
            }
        }
        assert_eq!(filtered.min_hops(&rid("R1"), &rid("R5")), 2);
    }

    #[test]
    fn decompositions_enumerate_alternatives() {
        let (_, index) = build(&diamond(), EntityFilter::include_all());
        assert_eq!(index.min_hops(&rid("R1"), &rid("R5")), 2);
        let all = index.decompositions(&rid("R1"), &rid("R5"));
        assert_eq!(
            all,
            vec![
                chain(&[("R1", "R2"), ("R2", "R5")]),
                chain(&[("R1", "R3"), ("R3", "R5")]),
            ]
        );
        // the recorded tree is one of them
        let recorded = index.flatten(&rid("R1"), &rid("R5")).unwrap();
        assert!(all.contains(&recorded));

        assert_eq!(
            index.decompositions(&rid("R1"), &rid("R2")),
            vec![chain(&[("R1", "R2")])]
        );
    }

    #[test]
    fn visit_rewrites_in_scratch_arena() {
        struct ViaR3<'a>(&'a RouteIndex);
        impl TreeVisitor for ViaR3<'_> {
            fn splits(&self, pair: RouteIndexPair) -> Vec<(RouteIndexPair, RouteIndexPair)> {
                let r3 = self.0.index_of(&rid("R3")).unwrap();
                let r2 = self.0.index_of(&rid("R2")).unwrap();
                if pair.second() == r2 {
                    vec![(self.0.pair(pair.first(), r3), self.0.pair(r3, r2))]
                } else {
                    Vec::new()
                }
            }
        }
        let (_, index) = build(&diamond(), EntityFilter::include_all());
        let trees_before = index.arena().len();
        let rewritten = index.visit(&rid("R1"), &rid("R2"), &ViaR3(index.route_index()));
        assert_eq!(rewritten, vec![chain(&[("R1", "R3"), ("R3", "R2")])]);
        assert_eq!(index.arena().len(), trees_before);
    }

    #[test]
    fn lower_bound_takes_nearest_destination() {
        let (_, index) = build(&chain_network(), EntityFilter::include_all());
        assert_eq!(index.lower_bound(&rid("R1"), [&rid("R3"), &rid("R2")]), Some(1));
        assert_eq!(index.lower_bound(&rid("R1"), [&rid("R1")]), Some(0));
        assert_eq!(index.lower_bound(&rid("R1"), std::iter::empty()), None);
    }

    #[test]
    fn truncated_index_stays_admissible() {
        let (graph, _) = build(&chain_network(), EntityFilter::include_all());
        let config = CostIndexConfig {
            max_depth: 1,
            ..CostIndexConfig::default()
        };
        let index = RouteCostIndex::build(&graph, &config).unwrap();
        assert!(index.is_truncated());
        assert_eq!(index.min_hops(&rid("R1"), &rid("R3")), UNREACHABLE);
        assert_eq!(index.lower_bound(&rid("R1"), [&rid("R3")]), Some(2));
    }

    #[test]
    fn persisted_index_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileDataCache::new(dir.path()).unwrap();
        let (graph, built) = build(&chain_network(), EntityFilter::include_all());
        built.save(&cache, "idx").unwrap();

        let loaded = RouteCostIndex::load(&cache, "idx", &graph).unwrap();
        for a in ["R1", "R2", "R3", "R9"] {
            for b in ["R1", "R2", "R3", "R9"] {
                assert_eq!(loaded.min_hops(&rid(a), &rid(b)), built.min_hops(&rid(a), &rid(b)));
                assert_eq!(loaded.flatten(&rid(a), &rid(b)), built.flatten(&rid(a), &rid(b)));
            }
        }
        assert_eq!(loaded.snapshot(), built.snapshot());
    }

    #[test]
    fn persisted_index_keeps_unreachable_pairs() {
        let data = Network::new()
            .agency("MET")
            .daily("D")
            .station("A", 0.0)
            .station("B", 1.0)
            .station("C", 5.0)
            .station("E", 6.0)
            .route("R1", "MET", TransportMode::Tram)
            .route("R2", "MET", TransportMode::Tram)
            .trip("t1", "R1", "D", &[("A", "08:00"), ("B", "08:05")])
            .trip("t2", "R2", "D", &[("C", "08:00"), ("E", "08:05")])
            .build();
        let dir = tempfile::tempdir().unwrap();
        let cache = FileDataCache::new(dir.path()).unwrap();
        let (graph, built) = build(&data, EntityFilter::include_all());
        built.save(&cache, "idx").unwrap();

        let loaded = RouteCostIndex::load(&cache, "idx", &graph).unwrap();
        assert_eq!(loaded.min_hops(&rid("R1"), &rid("R2")), UNREACHABLE);
        assert_eq!(loaded.min_hops(&rid("R2"), &rid("R1")), UNREACHABLE);
        assert_eq!(loaded.min_hops(&rid("R1"), &rid("R1")), 0);
        assert_eq!(loaded.lower_bound(&rid("R1"), [&rid("R2")]), None);
        assert_eq!(loaded.snapshot(), built.snapshot());
    }

    #[test]
    fn splits_with_long_legs_do_not_overflow() {
        let mut matrix = HopsMatrix::new(4);
        matrix.set(0, 1, 130);
        matrix.set(0, 2, 200);
        matrix.set(2, 1, 100);
        matrix.set(0, 3, 60);
        matrix.set(3, 1, 70);
        let splitter = ShortestSplits {
            matrix: &matrix,
            route_count: 4,
        };

        let splits = splitter.splits(RouteIndexPair::new(0, 1, 4));
        let via: Vec<_> = splits
            .iter()
            .map(|(left, right)| (left.first(), left.second(), right.second()))
            .collect();
        assert_eq!(via, vec![(0, 3, 1)]);
    }

    #[test]
    fn snapshot_for_other_graph_rejected() {
        let (_, built) = build(&chain_network(), EntityFilter::include_all());
        let (other, _) = build(
            &chain_network(),
            EntityFilter::builder().add_agency(aid("MET")).build(),
        );
        assert!(matches!(
            RouteCostIndex::from_snapshot(built.snapshot(), &other),
            Err(CostIndexError::RouteMismatch)
        ));
    }

    #[test]
    fn tampered_matrix_rejected() {
        let (graph, built) = build(&chain_network(), EntityFilter::include_all());
        let mut snapshot = built.snapshot();
        // R1 -> R3 claimed as 3 hops although the hop-1 entries give 2
        snapshot.matrix.set(0, 2, 3);
        assert!(matches!(
            RouteCostIndex::from_snapshot(snapshot, &graph),
            Err(CostIndexError::MatrixMismatch)
        ));
    }

    #[test]
    fn load_or_build_recovers_from_corrupt_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileDataCache::new(dir.path()).unwrap();
        let config = CostIndexConfig::default();
        std::fs::write(dir.path().join(format!("{}.json", config.cache_key)), "[1, 2").unwrap();

        let (graph, _) = build(&chain_network(), EntityFilter::include_all());
        let index = RouteCostIndex::load_or_build(&graph, &config, &cache).unwrap();
        assert_eq!(index.min_hops(&rid("R1"), &rid("R3")), 2);

        // the rebuilt index replaced the corrupt entry
        let reloaded = RouteCostIndex::load(&cache, &config.cache_key, &graph).unwrap();
        assert_eq!(reloaded.snapshot(), index.snapshot());
    }

    #[test]
    fn load_or_build_prefers_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileDataCache::new(dir.path()).unwrap();
        let config = CostIndexConfig::default();
        let (graph, built) = build(&chain_network(), EntityFilter::include_all());
        built.save(&cache, &config.cache_key).unwrap();

        let index = RouteCostIndex::load_or_build(&graph, &config, &cache).unwrap();
        assert_eq!(index.snapshot(), built.snapshot());
    }

    #[test]
    fn config_defaults_from_empty_json() {
        let config: CostIndexConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CostIndexConfig::default());
    }

    fn index_of(n: usize) -> RouteIndex {
        RouteIndex::new((0..n).map(|i| rid(&format!("R{i:02}"))))
    }

    fn adjacency_from(n: usize, edges: &[(usize, usize)], removed: &[bool]) -> Vec<BTreeSet<u32>> {
        let mut adj = vec![BTreeSet::new(); n];
        for (a, b) in edges {
            let (a, b) = (a % n, b % n);
            if a != b && !removed[a] && !removed[b] {
                adj[a].insert(b as u32);
            }
        }
        adj
    }

    fn shortest(adj: &[BTreeSet<u32>]) -> Vec<Vec<u32>> {
        let n = adj.len();
        let inf = u32::MAX / 2;
        let mut d = vec![vec![inf; n]; n];
        for (i, row) in d.iter_mut().enumerate() {
            row[i] = 0;
            for j in &adj[i] {
                row[*j as usize] = 1;
            }
        }
        for k in 0..n {
            for i in 0..n {
                for j in 0..n {
                    if d[i][k] + d[k][j] < d[i][j] {
                        d[i][j] = d[i][k] + d[k][j];
                    }
                }
            }
        }
        d
    }

    proptest! {
        #[test]
        fn expansion_finds_shortest_chains(
            n in 1usize..8,
            edges in prop::collection::vec((0usize..8, 0usize..8), 0..20),
        ) {
            let adj = adjacency_from(n, &edges, &vec![false; n]);
            let index = RouteCostIndex::expand(index_of(n), &adj, 16);
            let best = shortest(&adj);
            for a in 0..n as u32 {
                for b in 0..n as u32 {
                    let expected = best[a as usize][b as usize];
                    let hops = index.matrix.get(a, b);
                    if expected >= u32::MAX / 2 {
                        prop_assert_eq!(hops, UNREACHABLE);
                    } else {
                        prop_assert_eq!(hops as u32, expected);
                    }
                    if let Some(tree) = index.trees.get(&index.index.pair(a, b).key()) {
                        let flat = index.arena.flatten(*tree);
                        prop_assert_eq!(flat.len(), hops as usize);
                        for step in &flat {
                            prop_assert!(adj[step.first() as usize].contains(&step.second()));
                        }
                    }
                }
            }
        }

        #[test]
        fn removing_routes_never_shortens(
            n in 2usize..8,
            edges in prop::collection::vec((0usize..8, 0usize..8), 0..20),
            removed in prop::collection::vec(any::<bool>(), 8),
        ) {
            let full = RouteCostIndex::expand(index_of(n), &adjacency_from(n, &edges, &vec![false; n]), 16);
            let removed = &removed[..n];
            let part = RouteCostIndex::expand(index_of(n), &adjacency_from(n, &edges, removed), 16);
            for a in 0..n as u32 {
                for b in 0..n as u32 {
                    if !removed[a as usize] && !removed[b as usize] {
                        prop_assert!(part.matrix.get(a, b) >= full.matrix.get(a, b));
                    }
                }
            }
        }
    }
}
