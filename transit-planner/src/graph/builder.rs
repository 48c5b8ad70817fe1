//! Builds the time-expanded graph from transit data.
//!
//! Layout per route `R` calling at station `S`:
//!
//! ```text
//! Station(S) -BOARD-> BoardingPoint(R,S) -TO_SERVICE-> Service -TO_HOUR-> Hour
//!     -TO_MINUTE-> Minute -GOES_TO-> RouteStation(R,S') -DEPART-> Station(S')
//! ```
//!
//! A route station also links to the services departing from it, so a
//! passenger can stay on board, and at interchange stations directly to the
//! boarding points of the other routes there. Each service node covers the
//! departures of one calendar service from one boarding point.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Duration;
use tracing::{debug, info};

use super::store::GraphStore;
use super::{GraphBuildError, GraphNode, NodeId, RelationshipKind, TransitGraph};
use crate::domain::{
    Route, RouteId, ServiceCalendar, ServiceId, Station, StationId, StopTime, TimeOfDay,
    TransitData, TransportMode, TripId, TripRecord,
};
use crate::filter::EntityFilter;
use crate::walkable::WalkableConnectionsBuilder;

/// Build-time configuration.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Walk links longer than this are left out of the graph (minutes).
    pub max_walk_mins: u32,

    /// Cost of the board relationships (minutes).
    pub board_cost_mins: u32,

    /// Cost of the depart relationships (minutes).
    pub depart_cost_mins: u32,
}

impl GraphConfig {
    pub fn max_walk(&self) -> Duration {
        Duration::minutes(self.max_walk_mins as i64)
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_walk_mins: 15,
            board_cost_mins: 0,
            depart_cost_mins: 0,
        }
    }
}

/// One departure of a trip from a boarding point.
struct Departure<'a> {
    time: TimeOfDay,
    trip: &'a TripId,
    next: &'a StationId,
    travel: u32,
}

/// Single-use builder for a [`TransitGraph`].
pub struct GraphBuilder<'a> {
    data: &'a TransitData,
    filter: EntityFilter,
    config: GraphConfig,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(data: &'a TransitData, filter: EntityFilter, config: GraphConfig) -> Self {
        Self {
            data,
            filter,
            config,
        }
    }

    /// Validate the input and build the graph.
    ///
    /// # Errors
    ///
    /// Fails if the filter names an unknown entity or the data refers to
    /// entities it does not define.
    pub fn build(self) -> Result<TransitGraph, GraphBuildError> {
        self.filter.validate(self.data)?;
        self.check_references()?;

        let routes: HashMap<RouteId, Route> = self
            .data
            .routes
            .iter()
            .filter(|r| self.filter.include_route(r))
            .map(|r| (r.id.clone(), r.clone()))
            .collect();

        let mut stations: BTreeMap<StationId, Station> = self
            .data
            .stations
            .iter()
            .map(|s| (s.id.clone(), Station::new(s.id.clone(), s.name.clone(), s.position)))
            .collect();

        let candidate_trips: Vec<&TripRecord> = self
            .data
            .trips
            .iter()
            .filter(|trip| routes.contains_key(&trip.route))
            .collect();

        assign_routes(
            &mut stations,
            &routes,
            candidate_trips.iter().map(|trip| {
                (
                    &trip.route,
                    trip.stops
                        .iter()
                        .filter(|s| self.filter.include_station_id(&s.station))
                        .collect(),
                )
            }),
        );
        stations.retain(|_, station| self.filter.include_station(station, &routes));

        // Calls at excluded stations are skipped; trips left with fewer than
        // two calls carry nobody anywhere.
        let mut trips: Vec<(&TripRecord, Vec<&StopTime>)> = Vec::new();
        for trip in candidate_trips {
            let stops: Vec<&StopTime> = trip
                .stops
                .iter()
                .filter(|s| stations.contains_key(&s.station))
                .collect();
            if stops.len() < 2 {
                debug!(trip = %trip.id, "trip has fewer than two included calls, skipping");
                continue;
            }
            trips.push((trip, stops));
        }
        assign_routes(
            &mut stations,
            &routes,
            trips.iter().map(|(trip, stops)| (&trip.route, stops.clone())),
        );

        let calendars: HashMap<&ServiceId, &ServiceCalendar> = self
            .data
            .services
            .iter()
            .map(|s| (&s.id, &s.calendar))
            .collect();

        let mut emitter = Emitter::default();

        let mut station_nodes = BTreeMap::new();
        for station in stations.values() {
            let id = emitter.node(GraphNode::Station {
                station: station.id.clone(),
                interchange: station.is_interchange(),
            });
            station_nodes.insert(station.id.clone(), id);
        }

        // Boarding points and route stations, one of each per route and station.
        let mut platforms: BTreeMap<(RouteId, StationId), (NodeId, NodeId)> = BTreeMap::new();
        for (trip, stops) in &trips {
            for stop in stops {
                let key = (trip.route.clone(), stop.station.clone());
                if platforms.contains_key(&key) {
                    continue;
                }
                let (route, station) = key.clone();
                let boarding = emitter.node(GraphNode::BoardingPoint {
                    route: route.clone(),
                    station: station.clone(),
                });
                let route_station = emitter.node(GraphNode::RouteStation { route, station });
                platforms.insert(key, (boarding, route_station));
            }
        }

        for ((_, station_id), (boarding, route_station)) in &platforms {
            let station_node = station_nodes[station_id];
            let board = if stations[station_id].is_interchange() {
                RelationshipKind::InterchangeBoard
            } else {
                RelationshipKind::Board
            };
            emitter.link(board, station_node, *boarding, self.config.board_cost_mins)?;
            emitter.link(
                RelationshipKind::Depart,
                *route_station,
                station_node,
                self.config.depart_cost_mins,
            )?;
        }

        // Departures grouped per boarding point and calendar service.
        let mut departures: BTreeMap<(&RouteId, &StationId, &ServiceId), Vec<Departure<'_>>> =
            BTreeMap::new();
        for (trip, stops) in &trips {
            for pair in stops.windows(2) {
                departures
                    .entry((&trip.route, &pair[0].station, &trip.service))
                    .or_default()
                    .push(Departure {
                        time: pair[0].departure,
                        trip: &trip.id,
                        next: &pair[1].station,
                        travel: (pair[1].arrival.minutes() - pair[0].departure.minutes()) as u32,
                    });
            }
        }

        for ((route_id, station_id, service_id), mut deps) in departures {
            let route = &routes[route_id];
            let key = (route_id.clone(), station_id.clone());
            let (boarding, route_station) = platforms[&key];

            let calendar = calendars
                .get(service_id)
                .map(|c| (*c).clone())
                .ok_or_else(|| GraphBuildError::UnknownReference {
                    kind: "service",
                    id: service_id.to_string(),
                    by: format!("route {route_id}"),
                })?;
            let service = emitter.node(GraphNode::Service {
                service: service_id.clone(),
                route: route_id.clone(),
                calendar,
            });
            emitter.link(RelationshipKind::ToService, boarding, service, 0)?;
            emitter.link(RelationshipKind::ToService, route_station, service, 0)?;

            deps.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.trip.cmp(b.trip)));
            if let Some(last) = deps.last() {
                let end = emitter.node(GraphNode::ServiceEnd {
                    last_departure: last.time,
                });
                emitter.link(RelationshipKind::ToServiceEnd, service, end, 0)?;
            }

            let mut hours: BTreeMap<u32, Vec<&Departure<'_>>> = BTreeMap::new();
            for dep in &deps {
                hours.entry(dep.time.hour()).or_default().push(dep);
            }
            for (hour, deps) in hours {
                let hour_node = emitter.node(GraphNode::Hour { hour });
                emitter.link(RelationshipKind::ToHour, service, hour_node, 0)?;
                for dep in deps {
                    let minute = emitter.node(GraphNode::Minute {
                        time: dep.time,
                        trip: dep.trip.clone(),
                        route: route_id.clone(),
                    });
                    emitter.link(RelationshipKind::ToMinute, hour_node, minute, 0)?;
                    let (_, arrive_at) = platforms[&(route_id.clone(), dep.next.clone())];
                    emitter.link(RelationshipKind::GoesTo(route.mode), minute, arrive_at, dep.travel)?;
                }
            }
        }

        // Direct route-to-route changes at interchanges.
        let change_cost = self.config.depart_cost_mins + self.config.board_cost_mins;
        for station in stations.values().filter(|s| s.is_interchange()) {
            for from in &station.routes {
                for to in station.routes.iter().filter(|r| *r != from) {
                    let (Some((_, alight)), Some((board, _))) = (
                        platforms.get(&(from.clone(), station.id.clone())),
                        platforms.get(&(to.clone(), station.id.clone())),
                    ) else {
                        continue;
                    };
                    emitter.link(RelationshipKind::InterchangeDepart, *alight, *board, change_cost)?;
                }
            }
        }

        let walk_links = WalkableConnectionsBuilder::new()
            .max_minutes(self.config.max_walk_mins)
            .add_records(&self.data.walk_links, |s| stations.contains_key(s))
            .build();
        for (from, to, minutes) in walk_links.iter() {
            emitter.link(
                RelationshipKind::Walk,
                station_nodes[from],
                station_nodes[to],
                minutes,
            )?;
        }

        info!(
            nodes = emitter.store.node_count(),
            relationships = emitter.store.relationship_count(),
            stations = stations.len(),
            routes = routes.len(),
            trips = trips.len(),
            walks = walk_links.len(),
            filter = %self.filter,
            "built transit graph"
        );

        Ok(TransitGraph::from_parts(
            emitter.store,
            self.filter,
            stations,
            routes,
            station_nodes,
            walk_links,
        ))
    }

    /// Every id the data refers to must be defined, and every trip must run
    /// forwards in time.
    fn check_references(&self) -> Result<(), GraphBuildError> {
        let unknown = |kind: &'static str, id: &dyn std::fmt::Display, by: String| {
            GraphBuildError::UnknownReference {
                kind,
                id: id.to_string(),
                by,
            }
        };

        for route in &self.data.routes {
            if !self.data.has_agency(&route.agency) {
                return Err(unknown("agency", &route.agency, format!("route {}", route.id)));
            }
        }

        let services: BTreeSet<&ServiceId> = self.data.services.iter().map(|s| &s.id).collect();
        for trip in &self.data.trips {
            let by = || format!("trip {}", trip.id);
            if self.data.route(&trip.route).is_none() {
                return Err(unknown("route", &trip.route, by()));
            }
            if !services.contains(&trip.service) {
                return Err(unknown("service", &trip.service, by()));
            }
            if trip.stops.len() < 2 {
                return Err(invalid_trip(&trip.id, "fewer than two calls"));
            }
            for stop in &trip.stops {
                if !self.data.has_station(&stop.station) {
                    return Err(unknown("station", &stop.station, by()));
                }
                if stop.departure < stop.arrival {
                    return Err(invalid_trip(&trip.id, "departs before it arrives"));
                }
            }
            if trip.stops.windows(2).any(|p| p[1].arrival < p[0].departure) {
                return Err(invalid_trip(&trip.id, "calls go backwards in time"));
            }
        }

        for link in &self.data.walk_links {
            for station in [&link.from, &link.to] {
                if !self.data.has_station(station) {
                    return Err(unknown("station", station, "walk link".to_string()));
                }
            }
        }

        Ok(())
    }
}

fn invalid_trip(trip: &TripId, reason: &'static str) -> GraphBuildError {
    GraphBuildError::InvalidTrip {
        trip: trip.to_string(),
        reason,
    }
}

/// Recompute each station's routes and modes from the given trip calls.
fn assign_routes<'s>(
    stations: &mut BTreeMap<StationId, Station>,
    routes: &HashMap<RouteId, Route>,
    trips: impl Iterator<Item = (&'s RouteId, Vec<&'s StopTime>)>,
) {
    for station in stations.values_mut() {
        station.routes.clear();
        station.modes.clear();
    }
    for (route_id, stops) in trips {
        let mode: Option<TransportMode> = routes.get(route_id).map(|r| r.mode);
        for stop in stops {
            if let Some(station) = stations.get_mut(&stop.station) {
                station.routes.insert(route_id.clone());
                station.modes.extend(mode);
            }
        }
    }
}

#[derive(Default)]
struct Emitter {
    store: GraphStore,
}

impl Emitter {
    fn node(&mut self, node: GraphNode) -> NodeId {
        self.store.create_node(node.to_raw())
    }

    fn link(
        &mut self,
        kind: RelationshipKind,
        start: NodeId,
        end: NodeId,
        cost: u32,
    ) -> Result<(), GraphBuildError> {
        self.store
            .create_relationship(kind.tag(), start, end, cost, kind.properties())?;
        Ok(())
    }
}
