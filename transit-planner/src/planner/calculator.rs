//! The route calculator: validated journey requests in, journeys out.
//!
//! A calculator owns the shared, read-only parts of the planner (graph,
//! cost index and node cache) and can serve any number of searches at
//! once. Each search opens its own read transaction, so positions given as
//! a latitude and longitude can be attached to the graph as overlay nodes
//! without affecting other searches.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::cost_index::RouteCostIndex;
use crate::domain::{
    DomainError, Journey, JourneyKey, LatLong, Location, RouteId, StationId, TimeOfDay,
};
use crate::graph::{
    DecodeError, GraphNode, GraphTransaction, NodeContentCache, NodeId, RelationshipKind,
    TransitGraph,
};
use crate::walkable::nearby_stations;

use super::config::SearchConfig;
use super::rank::rank_latest_departure;
use super::traversal::{LowerBounds, SearchContext, Traversal, TraversalQuery};

/// Error from planning a journey.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlanError {
    #[error("unknown station {0}")]
    UnknownStation(StationId),

    #[error("invalid journey request: {0}")]
    InvalidRequest(&'static str),

    /// The graph could not be read; never retried.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("could not assemble journey: {0}")]
    Journey(#[from] DomainError),
}

/// Request for journey search.
#[derive(Debug, Clone, PartialEq)]
pub struct JourneyRequest {
    pub start: Location,
    pub destination: Location,
    pub date: NaiveDate,
    /// Earliest departure, or latest arrival when `arrive_by` is set.
    pub time: TimeOfDay,
    pub arrive_by: bool,
    /// Overrides [`SearchConfig::max_changes`].
    pub max_changes: Option<usize>,
}

impl JourneyRequest {
    /// Leave `start` no earlier than `time`.
    pub fn depart_after(
        start: Location,
        destination: Location,
        date: NaiveDate,
        time: TimeOfDay,
    ) -> Self {
        Self {
            start,
            destination,
            date,
            time,
            arrive_by: false,
            max_changes: None,
        }
    }

    /// Reach `destination` no later than `time`.
    pub fn arrive_by(
        start: Location,
        destination: Location,
        date: NaiveDate,
        time: TimeOfDay,
    ) -> Self {
        Self {
            arrive_by: true,
            ..Self::depart_after(start, destination, date, time)
        }
    }

    pub fn with_max_changes(mut self, max_changes: usize) -> Self {
        self.max_changes = Some(max_changes);
        self
    }

    /// Check the request against the graph it will run on.
    pub fn validate(&self, graph: &TransitGraph) -> Result<(), PlanError> {
        if self.start == self.destination {
            return Err(PlanError::InvalidRequest(
                "start and destination are the same",
            ));
        }
        for location in [&self.start, &self.destination] {
            match location {
                Location::Station(id) if graph.station_node(id).is_none() => {
                    return Err(PlanError::UnknownStation(id.clone()));
                }
                Location::Position(pos) if !pos.is_valid() => {
                    return Err(PlanError::InvalidRequest("position is not a valid lat/long"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Plans journeys over one graph.
///
/// The graph, cost index and cache are shared; a calculator can be cloned
/// cheaply and used from several threads.
#[derive(Clone)]
pub struct RouteCalculator {
    graph: Arc<TransitGraph>,
    cost_index: Arc<RouteCostIndex>,
    cache: Arc<NodeContentCache>,
    config: SearchConfig,
}

impl RouteCalculator {
    pub fn new(
        graph: Arc<TransitGraph>,
        cost_index: Arc<RouteCostIndex>,
        cache: Arc<NodeContentCache>,
        config: SearchConfig,
    ) -> Self {
        Self {
            graph,
            cost_index,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn graph(&self) -> &TransitGraph {
        &self.graph
    }

    /// Fewest route changes between two routes, or
    /// [`UNREACHABLE`](crate::cost_index::UNREACHABLE).
    pub fn min_route_change_hops(&self, from: &RouteId, to: &RouteId) -> u8 {
        self.cost_index.min_hops(from, to)
    }

    /// Start a search for `request`.
    ///
    /// Journeys are produced lazily: depart-after searches yield them in
    /// order of arrival, arrive-by searches latest departure first. At most
    /// `max_results` distinct journeys are yielded.
    pub fn plan_journey(&self, request: &JourneyRequest) -> Result<Journeys<'_>, PlanError> {
        request.validate(&self.graph)?;
        if self.config.max_results == 0 {
            return Err(PlanError::InvalidRequest("max results must be at least one"));
        }
        let max_changes = request.max_changes.unwrap_or(self.config.max_changes);

        let mut tx = self.graph.begin_read();
        let start = self.start_node(&mut tx, &request.start)?;
        let (destination, destination_routes) =
            self.destination_node(&mut tx, &request.destination)?;

        let query = TraversalQuery {
            date: request.date,
            start: start.node,
            destinations: HashSet::from([destination.node]),
            destination_routes,
            max_changes,
            arrive_by: request.arrive_by.then(|| request.time.minutes()),
        };
        let ctx = SearchContext {
            graph: &self.graph,
            cache: &self.cache,
            cost_index: &self.cost_index,
            config: &self.config,
        };

        info!(
            start = %request.start,
            destination = %request.destination,
            date = %request.date,
            time = %request.time,
            arrive_by = request.arrive_by,
            max_changes,
            "planning journey"
        );

        let mut journeys = Journeys {
            tx,
            ctx,
            query,
            bounds: LowerBounds::default(),
            search: None,
            windows: VecDeque::new(),
            ready: VecDeque::new(),
            seen: HashSet::new(),
            remaining: self.config.max_results,
            done: !(start.reachable && destination.reachable),
        };
        if journeys.done {
            debug!("no stations within walking range");
            return Ok(journeys);
        }
        if request.arrive_by {
            journeys.windows = self.arrive_by_windows(request.time.minutes());
        } else {
            journeys.search = Some(Traversal::new(
                &journeys.query,
                request.time.minutes(),
                &self.config,
            ));
        }
        Ok(journeys)
    }

    /// Start times of the arrive-by searches, latest first.
    fn arrive_by_windows(&self, bound: i32) -> VecDeque<i32> {
        let step = self.config.max_initial_wait_mins.clamp(1, bound.max(1) as i64) as i32;
        let earliest = (bound as i64 - self.config.max_journey_mins).max(0) as i32;
        let mut windows = VecDeque::new();
        let mut start = bound - step;
        while start >= earliest {
            windows.push_back(start);
            start -= step;
        }
        if windows.back().is_none_or(|last| *last > earliest) {
            windows.push_back(earliest);
        }
        windows
    }

    fn start_node(
        &self,
        tx: &mut GraphTransaction<'_>,
        start: &Location,
    ) -> Result<Endpoint, PlanError> {
        match start {
            Location::Station(id) => self.station_endpoint(id),
            Location::Position(position) => {
                let node = tx.create_overlay_node(GraphNode::Query { position: *position }.to_raw());
                let mut reachable = false;
                for (station, minutes) in self.walkable_stations(position) {
                    if let Some(to) = self.graph.station_node(&station) {
                        tx.create_overlay_relationship(
                            RelationshipKind::Walk.tag(),
                            node,
                            to,
                            minutes,
                        )?;
                        reachable = true;
                    }
                }
                Ok(Endpoint { node, reachable })
            }
        }
    }

    fn destination_node(
        &self,
        tx: &mut GraphTransaction<'_>,
        destination: &Location,
    ) -> Result<(Endpoint, BTreeSet<RouteId>), PlanError> {
        match destination {
            Location::Station(id) => {
                let endpoint = self.station_endpoint(id)?;
                let mut routes = self.routes_at(id);
                for (near, _) in self.graph.walk_links().walkable_from(id) {
                    routes.extend(self.routes_at(&near));
                }
                Ok((endpoint, routes))
            }
            Location::Position(position) => {
                let node = tx.create_overlay_node(GraphNode::Query { position: *position }.to_raw());
                let mut routes = BTreeSet::new();
                let mut reachable = false;
                for (station, minutes) in self.walkable_stations(position) {
                    if let Some(from) = self.graph.station_node(&station) {
                        tx.create_overlay_relationship(
                            RelationshipKind::Walk.tag(),
                            from,
                            node,
                            minutes,
                        )?;
                        routes.extend(self.routes_at(&station));
                        reachable = true;
                    }
                }
                Ok((Endpoint { node, reachable }, routes))
            }
        }
    }

    fn station_endpoint(&self, id: &StationId) -> Result<Endpoint, PlanError> {
        let node = self
            .graph
            .station_node(id)
            .ok_or_else(|| PlanError::UnknownStation(id.clone()))?;
        Ok(Endpoint {
            node,
            reachable: true,
        })
    }

    fn walkable_stations(&self, position: &LatLong) -> Vec<(StationId, u32)> {
        nearby_stations(
            position,
            self.graph.stations(),
            self.config.walk_range_metres,
            self.config.walking_speed_mps,
        )
        .into_iter()
        .filter(|(_, minutes)| *minutes as i64 <= self.config.max_walk_mins)
        .collect()
    }

    fn routes_at(&self, station: &StationId) -> BTreeSet<RouteId> {
        self.graph
            .station(station)
            .map(|s| s.routes.clone())
            .unwrap_or_default()
    }
}

struct Endpoint {
    node: NodeId,
    /// False for a position with no station in walking range.
    reachable: bool,
}

/// Lazily computed journeys for one request. See
/// [`RouteCalculator::plan_journey`].
///
/// The iterator stops after the first error.
pub struct Journeys<'a> {
    tx: GraphTransaction<'a>,
    ctx: SearchContext<'a>,
    query: TraversalQuery,
    bounds: LowerBounds,
    search: Option<Traversal>,
    /// Pending arrive-by start windows, latest first.
    windows: VecDeque<i32>,
    ready: VecDeque<Journey>,
    seen: HashSet<JourneyKey>,
    remaining: usize,
    done: bool,
}

impl Journeys<'_> {
    fn advance(&mut self) -> Result<Option<Journey>, PlanError> {
        loop {
            if let Some(journey) = self.ready.pop_front() {
                return Ok(Some(journey));
            }
            if let Some(search) = self.search.as_mut() {
                return search.next_journey(&self.tx, &self.ctx, &self.query, &mut self.bounds);
            }
            let Some(window) = self.windows.pop_front() else {
                return Ok(None);
            };
            let mut traversal = Traversal::new(&self.query, window, self.ctx.config);
            let mut found = Vec::new();
            while let Some(journey) =
                traversal.next_journey(&self.tx, &self.ctx, &self.query, &mut self.bounds)?
            {
                found.push(journey);
            }
            debug!(window, found = found.len(), "arrive-by window searched");
            self.ready.extend(rank_latest_departure(found));
        }
    }
}

impl Iterator for Journeys<'_> {
    type Item = Result<Journey, PlanError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done && self.remaining > 0 {
            match self.advance() {
                Ok(Some(journey)) => {
                    if self.seen.insert(journey.key()) {
                        self.remaining -= 1;
                        return Some(Ok(journey));
                    }
                }
                Ok(None) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "calculator_tests.rs"]
mod tests;
