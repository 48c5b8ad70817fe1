//! The traversal state machine.
//!
//! A traversal explores the time-expanded graph best first by time of day,
//! so journeys are found in order of arrival. Each search state stands at a
//! node at an absolute time, measured in minutes from midnight at the start
//! of the query date. What may follow a state depends on the variant of its
//! node:
//!
//! ```text
//! Station      -BOARD->             BoardingPoint   filter, change budget
//! Station      -WALK->              Station | Query never two walks in a row
//! Boarding     -TO_SERVICE->        Service         calendar, service end
//! Service      -TO_HOUR->           Hour            wait window
//! Hour         -TO_MINUTE->         Minute          not before it departs
//! Minute       -GOES_TO->           RouteStation
//! RouteStation -DEPART->            Station
//! RouteStation -INTERCHANGE_DEPART->BoardingPoint
//! RouteStation -TO_SERVICE->        Service         stay on the same trip
//! ```
//!
//! A service can carry departures of the previous or next calendar day:
//! while descending it the state records a day offset of -1440, 0 or 1440
//! minutes, and every departure time below it is shifted by that offset.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

use chrono::{Duration, NaiveDate};
use tracing::{debug, trace};

use crate::cost_index::RouteCostIndex;
use crate::domain::{
    Journey, Location, MINUTES_PER_DAY, RouteId, Stage, StationId, StopCall, TimeOfDay,
    TransportMode, TripId, VehicleStage, WalkStage,
};
use crate::graph::{
    GraphNode, GraphTransaction, NodeContentCache, NodeId, Relationship, RelationshipKind,
    TransitGraph,
};

use super::PlanError;
use super::config::SearchConfig;

/// Latest absolute time a journey may reach; journeys are reported as times
/// of day relative to the query date.
const LAST_MINUTE: i32 = 2 * MINUTES_PER_DAY - 1;

/// Shared read-only collaborators of a search.
#[derive(Clone, Copy)]
pub(crate) struct SearchContext<'a> {
    pub graph: &'a TransitGraph,
    pub cache: &'a NodeContentCache,
    pub cost_index: &'a RouteCostIndex,
    pub config: &'a SearchConfig,
}

/// What one search looks for. Shared by all start windows of a request.
#[derive(Debug, Clone)]
pub(crate) struct TraversalQuery {
    pub date: NaiveDate,
    pub start: NodeId,
    pub destinations: HashSet<NodeId>,
    /// Routes a journey can finish on: alighting at a destination, or at a
    /// station one walk away from it.
    pub destination_routes: BTreeSet<RouteId>,
    pub max_changes: usize,
    /// Latest acceptable arrival, for arrive-by queries.
    pub arrive_by: Option<i32>,
}

/// Per-request memo of cost index lower bounds towards the destinations.
#[derive(Debug, Default)]
pub(crate) struct LowerBounds(HashMap<RouteId, Option<u8>>);

impl LowerBounds {
    fn get(
        &mut self,
        route: &RouteId,
        ctx: &SearchContext<'_>,
        query: &TraversalQuery,
    ) -> Option<u8> {
        *self.0.entry(route.clone()).or_insert_with(|| {
            ctx.cost_index
                .lower_bound(route, query.destination_routes.iter())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Riding {
    trip: TripId,
    offset: i32,
}

#[derive(Debug, Clone)]
struct State {
    node: NodeId,
    time: i32,
    /// Vehicles boarded so far, including the current one.
    boardings: usize,
    riding: Option<Riding>,
    /// Day offset of the service being descended.
    offset: i32,
    alighted_at: Option<i32>,
    /// Trip last alighted from; it may not be boarded again straight away.
    alighted_from: Option<TripId>,
    via: Option<RelationshipKind>,
    parent: Option<usize>,
}

impl State {
    fn after(&self, parent: usize, rel: &Relationship) -> State {
        State {
            node: rel.end,
            time: self.time + rel.cost as i32,
            via: Some(rel.kind),
            parent: Some(parent),
            ..self.clone()
        }
    }

    fn walked_here(&self) -> bool {
        self.via == Some(RelationshipKind::Walk)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VisitKey {
    node: NodeId,
    time: i32,
    boardings: usize,
    trip: Option<TripId>,
    walked: bool,
}

/// One best-first search from one start time.
pub(crate) struct Traversal {
    heap: BinaryHeap<Reverse<(i32, usize)>>,
    states: Vec<State>,
    visited: HashSet<VisitKey>,
    start_time: i32,
    limit: i32,
    expanded: usize,
}

impl Traversal {
    pub fn new(query: &TraversalQuery, start_time: i32, config: &SearchConfig) -> Self {
        let max_journey = config.max_journey_mins.clamp(0, MINUTES_PER_DAY as i64) as i32;
        let by_duration = start_time.saturating_add(max_journey);
        let limit = query
            .arrive_by
            .map_or(by_duration, |bound| bound.min(by_duration))
            .min(LAST_MINUTE);
        let mut traversal = Self {
            heap: BinaryHeap::new(),
            states: Vec::new(),
            visited: HashSet::new(),
            start_time,
            limit,
            expanded: 0,
        };
        traversal.push(State {
            node: query.start,
            time: start_time,
            boardings: 0,
            riding: None,
            offset: 0,
            alighted_at: None,
            alighted_from: None,
            via: None,
            parent: None,
        });
        traversal
    }

    /// Run until the next journey reaches a destination, or the search is
    /// exhausted.
    pub fn next_journey(
        &mut self,
        tx: &GraphTransaction<'_>,
        ctx: &SearchContext<'_>,
        query: &TraversalQuery,
        bounds: &mut LowerBounds,
    ) -> Result<Option<Journey>, PlanError> {
        while let Some(Reverse((_, idx))) = self.heap.pop() {
            let state = self.states[idx].clone();
            let node = ctx.cache.node_for(tx, state.node)?;

            if !matches!(*node, GraphNode::Service { .. } | GraphNode::Hour { .. }) {
                let key = VisitKey {
                    node: state.node,
                    time: state.time,
                    boardings: state.boardings,
                    trip: state.riding.as_ref().map(|r| r.trip.clone()),
                    walked: state.walked_here(),
                };
                if !self.visited.insert(key) {
                    continue;
                }
            }

            if state.parent.is_some() && query.destinations.contains(&state.node) {
                let journey = self.journey(idx, tx, ctx)?;
                debug!(
                    expanded = self.expanded,
                    arrival = %journey.arrival_time(),
                    changes = journey.change_count(),
                    "journey found"
                );
                return Ok(Some(journey));
            }

            self.expanded += 1;
            self.expand(idx, &state, &node, tx, ctx, query, bounds)?;
        }
        debug!(expanded = self.expanded, start = self.start_time, "search exhausted");
        Ok(None)
    }

    /// Nodes queued by the search so far.
    #[cfg(test)]
    pub(crate) fn reached(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.states.iter().map(|state| state.node)
    }

    #[allow(clippy::too_many_arguments)]
    fn expand(
        &mut self,
        idx: usize,
        state: &State,
        node: &GraphNode,
        tx: &GraphTransaction<'_>,
        ctx: &SearchContext<'_>,
        query: &TraversalQuery,
        bounds: &mut LowerBounds,
    ) -> Result<(), PlanError> {
        let config = ctx.config;
        let outgoing = tx.outgoing(state.node)?;
        match node {
            GraphNode::Station { interchange, .. } => {
                for rel in &outgoing {
                    match rel.kind {
                        kind if kind.is_board() => {
                            if state.boardings > query.max_changes {
                                continue;
                            }
                            if config.interchanges_only_at_designated
                                && state.boardings > 0
                                && !state.walked_here()
                                && !interchange
                            {
                                trace!(node = %state.node, "not a designated interchange");
                                continue;
                            }
                            self.push(State {
                                boardings: state.boardings + 1,
                                ..state.after(idx, rel)
                            });
                        }
                        RelationshipKind::Walk => self.walk(idx, state, rel, config),
                        _ => {}
                    }
                }
            }
            GraphNode::Query { .. } => {
                for rel in outgoing.iter().filter(|r| r.kind == RelationshipKind::Walk) {
                    self.walk(idx, state, rel, config);
                }
            }
            GraphNode::BoardingPoint { route, station } => {
                if !self.may_board(route, station, state, ctx, query, bounds) {
                    return Ok(());
                }
                for rel in outgoing.iter().filter(|r| r.kind == RelationshipKind::ToService) {
                    self.push(state.after(idx, rel));
                }
            }
            GraphNode::Service { calendar, .. } => {
                let Some(last_departure) = self.last_departure(&outgoing, tx, ctx)? else {
                    return Ok(());
                };
                let offsets = match &state.riding {
                    Some(riding) => vec![riding.offset],
                    None => vec![-MINUTES_PER_DAY, 0, MINUTES_PER_DAY],
                };
                let wait = self.wait_limit(state, config);
                for offset in offsets {
                    let Some(day) = query.date.checked_add_signed(Duration::minutes(offset as i64))
                    else {
                        continue;
                    };
                    if !calendar.runs_on(day) {
                        trace!(node = %state.node, %day, "service does not run");
                        continue;
                    }
                    if last_departure + offset < state.time {
                        continue;
                    }
                    for rel in outgoing.iter().filter(|r| r.kind == RelationshipKind::ToHour) {
                        let target = ctx.cache.node_for(tx, rel.end)?;
                        let GraphNode::Hour { hour } = *target else {
                            continue;
                        };
                        let first = hour as i32 * 60 + offset;
                        if first + 59 < state.time || first > state.time + wait {
                            continue;
                        }
                        self.push(State {
                            offset,
                            ..state.after(idx, rel)
                        });
                    }
                }
            }
            GraphNode::Hour { .. } => {
                let wait = self.wait_limit(state, config);
                for rel in outgoing.iter().filter(|r| r.kind == RelationshipKind::ToMinute) {
                    let target = ctx.cache.node_for(tx, rel.end)?;
                    let GraphNode::Minute { time, trip, .. } = &*target else {
                        continue;
                    };
                    let departs = time.minutes() + state.offset;
                    if departs < state.time {
                        continue;
                    }
                    match &state.riding {
                        Some(riding) if &riding.trip != trip => continue,
                        Some(_) => {}
                        None if state.alighted_from.as_ref() == Some(trip) => continue,
                        None => {
                            let change_ok = state
                                .alighted_at
                                .is_none_or(|at| (departs - at) as i64 >= config.min_change_mins);
                            if departs > state.time + wait || !change_ok {
                                continue;
                            }
                        }
                    }
                    self.push(State {
                        time: departs,
                        riding: Some(Riding {
                            trip: trip.clone(),
                            offset: state.offset,
                        }),
                        ..state.after(idx, rel)
                    });
                }
            }
            GraphNode::Minute { .. } => {
                for rel in &outgoing {
                    if let RelationshipKind::GoesTo(_) = rel.kind {
                        self.push(state.after(idx, rel));
                    }
                }
            }
            GraphNode::RouteStation { .. } => {
                for rel in &outgoing {
                    match rel.kind {
                        RelationshipKind::Depart => self.push(State {
                            riding: None,
                            alighted_at: Some(state.time),
                            alighted_from: state.riding.as_ref().map(|r| r.trip.clone()),
                            ..state.after(idx, rel)
                        }),
                        RelationshipKind::InterchangeDepart => {
                            if state.boardings > query.max_changes {
                                continue;
                            }
                            self.push(State {
                                riding: None,
                                alighted_at: Some(state.time),
                                alighted_from: state.riding.as_ref().map(|r| r.trip.clone()),
                                boardings: state.boardings + 1,
                                ..state.after(idx, rel)
                            });
                        }
                        RelationshipKind::ToService if state.riding.is_some() => {
                            self.push(state.after(idx, rel));
                        }
                        _ => {}
                    }
                }
            }
            GraphNode::ServiceEnd { .. } => {}
        }
        Ok(())
    }

    /// Filter and change budget checks for boarding a route.
    fn may_board(
        &self,
        route: &RouteId,
        station: &StationId,
        state: &State,
        ctx: &SearchContext<'_>,
        query: &TraversalQuery,
        bounds: &mut LowerBounds,
    ) -> bool {
        let filter = ctx.graph.filter();
        let agency_ok = ctx
            .graph
            .route(route)
            .is_some_and(|r| filter.include_agency(&r.agency));
        if !agency_ok || !filter.include_route_id(route) || !filter.include_station_id(station) {
            trace!(%route, %station, "excluded by filter");
            return false;
        }
        let changes = state.boardings.saturating_sub(1);
        match bounds.get(route, ctx, query) {
            Some(hops) if changes + hops as usize <= query.max_changes => true,
            hops => {
                trace!(%route, changes, ?hops, "change budget cannot reach destination");
                false
            }
        }
    }

    fn walk(&mut self, idx: usize, state: &State, rel: &Relationship, config: &SearchConfig) {
        if state.walked_here() || rel.cost as i64 > config.max_walk_mins {
            return;
        }
        self.push(State {
            alighted_from: None,
            ..state.after(idx, rel)
        });
    }

    fn wait_limit(&self, state: &State, config: &SearchConfig) -> i32 {
        let mins = if state.riding.is_none() && state.boardings <= 1 {
            config.max_initial_wait_mins
        } else {
            config.max_wait_mins
        };
        mins.clamp(0, MINUTES_PER_DAY as i64) as i32
    }

    fn last_departure(
        &self,
        outgoing: &[Relationship],
        tx: &GraphTransaction<'_>,
        ctx: &SearchContext<'_>,
    ) -> Result<Option<i32>, PlanError> {
        let Some(rel) = outgoing
            .iter()
            .find(|r| r.kind == RelationshipKind::ToServiceEnd)
        else {
            return Ok(None);
        };
        match *ctx.cache.node_for(tx, rel.end)? {
            GraphNode::ServiceEnd { last_departure } => Ok(Some(last_departure.minutes())),
            _ => Ok(None),
        }
    }

    fn push(&mut self, state: State) {
        if state.time > self.limit {
            return;
        }
        let idx = self.states.len();
        self.heap.push(Reverse((state.time, idx)));
        self.states.push(state);
    }

    /// Rebuild the journey ending at state `end` from its parent chain.
    fn journey(
        &self,
        end: usize,
        tx: &GraphTransaction<'_>,
        ctx: &SearchContext<'_>,
    ) -> Result<Journey, PlanError> {
        let mut chain = Vec::new();
        let mut cursor = Some(end);
        while let Some(i) = cursor {
            chain.push(i);
            cursor = self.states[i].parent;
        }
        chain.reverse();

        let mut stages = Vec::new();
        let mut open: Option<OpenStage> = None;
        let mut board_at: Option<StationId> = None;
        let mut previous: Option<(&State, Location)> = None;

        for i in chain {
            let state = &self.states[i];
            let node = ctx.cache.node_for(tx, state.node)?;

            if matches!(
                state.via,
                Some(RelationshipKind::Depart | RelationshipKind::InterchangeDepart)
            ) {
                if let Some(stage) = open.take() {
                    stages.push(Stage::Vehicle(stage.finish()?));
                }
            }

            match &*node {
                GraphNode::BoardingPoint { station, .. } => board_at = Some(station.clone()),
                GraphNode::Minute { trip, route, .. } => {
                    let at = time_of(state.time)?;
                    match open.as_mut() {
                        Some(stage) if &stage.trip == trip => {
                            if let Some(call) = stage.calls.last_mut() {
                                call.departure = at;
                            }
                        }
                        _ => {
                            if let Some(station) = board_at.take() {
                                let mode = ctx
                                    .graph
                                    .route(route)
                                    .map_or(TransportMode::Bus, |r| r.mode);
                                open = Some(OpenStage {
                                    route: route.clone(),
                                    trip: trip.clone(),
                                    mode,
                                    calls: vec![StopCall {
                                        station,
                                        arrival: at,
                                        departure: at,
                                    }],
                                });
                            }
                        }
                    }
                }
                GraphNode::RouteStation { station, .. } => {
                    if let (Some(stage), Some(RelationshipKind::GoesTo(mode))) =
                        (open.as_mut(), state.via)
                    {
                        let at = time_of(state.time)?;
                        stage.mode = mode;
                        stage.calls.push(StopCall {
                            station: station.clone(),
                            arrival: at,
                            departure: at,
                        });
                    }
                }
                _ => {}
            }

            let here = location_of(&node);
            if state.walked_here() {
                if let (Some((from_state, from)), Some(to)) = (previous.as_ref(), here.clone()) {
                    stages.push(Stage::Walk(WalkStage::new(
                        from.clone(),
                        to,
                        time_of(from_state.time)?,
                        Duration::minutes((state.time - from_state.time) as i64),
                    )));
                }
            }
            if let Some(location) = here {
                previous = Some((state, location));
            }
        }
        if let Some(stage) = open.take() {
            stages.push(Stage::Vehicle(stage.finish()?));
        }
        Ok(Journey::new(stages)?)
    }
}

/// A vehicle stage still being collected.
struct OpenStage {
    route: RouteId,
    trip: TripId,
    mode: TransportMode,
    calls: Vec<StopCall>,
}

impl OpenStage {
    fn finish(self) -> Result<VehicleStage, PlanError> {
        Ok(VehicleStage::new(self.route, self.trip, self.mode, self.calls)?)
    }
}

fn location_of(node: &GraphNode) -> Option<Location> {
    match node {
        GraphNode::Station { station, .. } => Some(Location::Station(station.clone())),
        GraphNode::Query { position } => Some(Location::Position(*position)),
        _ => None,
    }
}

fn time_of(minutes: i32) -> Result<TimeOfDay, PlanError> {
    TimeOfDay::from_minutes(minutes).ok_or(PlanError::InvalidRequest(
        "journey leaves the two-day time range",
    ))
}
