//! Journey types.
//!
//! A `Journey` represents a complete trip from origin to destination,
//! made of vehicle stages and walks between locations.

use std::fmt;

use chrono::Duration;

use super::{DomainError, LatLong, RouteId, StationId, TimeOfDay, TransportMode, TripId};

/// Where a stage starts or ends: a station, or an arbitrary position.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Station(StationId),
    Position(LatLong),
}

impl Location {
    /// Returns the station id if this location is a station.
    pub fn as_station(&self) -> Option<&StationId> {
        match self {
            Location::Station(id) => Some(id),
            Location::Position(_) => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Station(id) => write!(f, "{id}"),
            Location::Position(pos) => write!(f, "{pos}"),
        }
    }
}

/// A scheduled call of a vehicle at a station.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StopCall {
    pub station: StationId,
    pub arrival: TimeOfDay,
    pub departure: TimeOfDay,
}

/// A ride on one vehicle trip from a boarding station to an alighting station.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleStage {
    route: RouteId,
    trip: TripId,
    mode: TransportMode,
    calls: Vec<StopCall>,
}

impl VehicleStage {
    /// Create a vehicle stage from its calls, boarding call first.
    ///
    /// # Errors
    ///
    /// Returns `Err` if fewer than two calls are given or the calls go
    /// backwards in time.
    pub fn new(
        route: RouteId,
        trip: TripId,
        mode: TransportMode,
        calls: Vec<StopCall>,
    ) -> Result<Self, DomainError> {
        if calls.len() < 2 {
            return Err(DomainError::InvalidStage("vehicle stage needs two calls"));
        }
        for pair in calls.windows(2) {
            if pair[1].arrival < pair[0].departure {
                return Err(DomainError::InvalidStage("calls go backwards in time"));
            }
        }
        Ok(Self {
            route,
            trip,
            mode,
            calls,
        })
    }

    pub fn route(&self) -> &RouteId {
        &self.route
    }

    pub fn trip(&self) -> &TripId {
        &self.trip
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// All calls from boarding to alighting, inclusive.
    pub fn calls(&self) -> &[StopCall] {
        &self.calls
    }

    /// Number of stops travelled.
    pub fn stop_count(&self) -> usize {
        self.calls.len() - 1
    }

    pub fn board_station(&self) -> &StationId {
        &self.calls[0].station
    }

    pub fn alight_station(&self) -> &StationId {
        &self.calls[self.calls.len() - 1].station
    }

    /// Scheduled departure from the boarding station.
    pub fn departure_time(&self) -> TimeOfDay {
        self.calls[0].departure
    }

    /// Expected arrival at the alighting station.
    pub fn arrival_time(&self) -> TimeOfDay {
        self.calls[self.calls.len() - 1].arrival
    }
}

/// A walk between two locations.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkStage {
    pub from: Location,
    pub to: Location,
    pub departure: TimeOfDay,
    pub duration: Duration,
}

impl WalkStage {
    pub fn new(from: Location, to: Location, departure: TimeOfDay, duration: Duration) -> Self {
        Self {
            from,
            to,
            departure,
            duration,
        }
    }

    /// Arrival at the end of the walk, saturating at the end of the range.
    pub fn arrival(&self) -> TimeOfDay {
        self.departure
            .checked_add(self.duration)
            .unwrap_or(self.departure)
    }
}

/// A stage of a journey: either a vehicle ride or a walk.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Vehicle(VehicleStage),
    Walk(WalkStage),
}

impl Stage {
    /// Returns where this stage starts.
    pub fn origin(&self) -> Location {
        match self {
            Stage::Vehicle(v) => Location::Station(v.board_station().clone()),
            Stage::Walk(w) => w.from.clone(),
        }
    }

    /// Returns where this stage ends.
    pub fn destination(&self) -> Location {
        match self {
            Stage::Vehicle(v) => Location::Station(v.alight_station().clone()),
            Stage::Walk(w) => w.to.clone(),
        }
    }

    pub fn departure_time(&self) -> TimeOfDay {
        match self {
            Stage::Vehicle(v) => v.departure_time(),
            Stage::Walk(w) => w.departure,
        }
    }

    pub fn arrival_time(&self) -> TimeOfDay {
        match self {
            Stage::Vehicle(v) => v.arrival_time(),
            Stage::Walk(w) => w.arrival(),
        }
    }

    pub fn as_vehicle(&self) -> Option<&VehicleStage> {
        match self {
            Stage::Vehicle(v) => Some(v),
            Stage::Walk(_) => None,
        }
    }

    pub fn as_walk(&self) -> Option<&WalkStage> {
        match self {
            Stage::Vehicle(_) => None,
            Stage::Walk(w) => Some(w),
        }
    }
}

/// Identity of a journey by its stops and timings, used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JourneyKey(Vec<(String, String, String, TimeOfDay, TimeOfDay)>);

/// A complete journey from origin to destination.
///
/// # Invariants
///
/// - At least one stage
/// - Consecutive stages connect (destination of one = origin of next)
/// - No stage departs before the previous stage arrives
#[derive(Debug, Clone, PartialEq)]
pub struct Journey {
    stages: Vec<Stage>,
}

impl Journey {
    /// Constructs a journey from stages.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the list is empty, consecutive stages do not meet,
    /// or a stage departs before its predecessor arrives.
    pub fn new(stages: Vec<Stage>) -> Result<Self, DomainError> {
        if stages.is_empty() {
            return Err(DomainError::EmptyJourney);
        }

        for window in stages.windows(2) {
            let prev_dest = window[0].destination();
            let next_origin = window[1].origin();
            if prev_dest != next_origin {
                return Err(DomainError::StagesNotConnected(prev_dest, next_origin));
            }
            if window[1].departure_time() < window[0].arrival_time() {
                return Err(DomainError::StagesOverlap);
            }
        }

        Ok(Journey { stages })
    }

    /// Returns all stages in order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Returns all vehicle stages in order.
    pub fn vehicle_stages(&self) -> impl Iterator<Item = &VehicleStage> {
        self.stages.iter().filter_map(|s| s.as_vehicle())
    }

    /// Returns all walks in order.
    pub fn walks(&self) -> impl Iterator<Item = &WalkStage> {
        self.stages.iter().filter_map(|s| s.as_walk())
    }

    /// Returns the number of changes (vehicle stages - 1, or 0).
    pub fn change_count(&self) -> usize {
        self.vehicle_stages().count().saturating_sub(1)
    }

    pub fn origin(&self) -> Location {
        self.stages[0].origin()
    }

    pub fn destination(&self) -> Location {
        self.stages[self.stages.len() - 1].destination()
    }

    /// Departure time of the first stage.
    pub fn departure_time(&self) -> TimeOfDay {
        self.stages[0].departure_time()
    }

    /// Arrival time of the last stage.
    pub fn arrival_time(&self) -> TimeOfDay {
        self.stages[self.stages.len() - 1].arrival_time()
    }

    /// Returns the total journey duration.
    pub fn total_duration(&self) -> Duration {
        self.arrival_time()
            .signed_duration_since(self.departure_time())
    }

    /// Returns the total walking time.
    pub fn total_walk_duration(&self) -> Duration {
        self.walks().map(|w| w.duration).sum()
    }

    /// Key that is equal for journeys with identical stops and timings.
    ///
    /// Consecutive vehicle stages on the same trip count as one ride.
    pub fn key(&self) -> JourneyKey {
        let mut parts: Vec<(String, String, String, TimeOfDay, TimeOfDay)> = Vec::new();
        let mut last_trip: Option<&TripId> = None;
        for stage in &self.stages {
            match stage {
                Stage::Vehicle(v) => {
                    if last_trip == Some(v.trip()) {
                        if let Some(part) = parts.last_mut() {
                            part.2 = v.alight_station().to_string();
                            part.4 = v.arrival_time();
                            continue;
                        }
                    }
                    last_trip = Some(v.trip());
                    parts.push((
                        v.trip().to_string(),
                        v.board_station().to_string(),
                        v.alight_station().to_string(),
                        v.departure_time(),
                        v.arrival_time(),
                    ));
                }
                Stage::Walk(w) => {
                    last_trip = None;
                    parts.push((
                        "walk".to_string(),
                        w.from.to_string(),
                        w.to.to_string(),
                        w.departure,
                        w.arrival(),
                    ));
                }
            }
        }
        JourneyKey(parts)
    }
}

impl fmt::Display for Journey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} -> {} ({} changes)",
            self.departure_time(),
            self.arrival_time(),
            self.change_count()
        )?;
        for stage in &self.stages {
            match stage {
                Stage::Vehicle(v) => writeln!(
                    f,
                    "  {} {} {} {} -> {} {} ({} stops)",
                    v.mode(),
                    v.route(),
                    v.departure_time(),
                    v.board_station(),
                    v.alight_station(),
                    v.arrival_time(),
                    v.stop_count()
                )?,
                Stage::Walk(w) => writeln!(
                    f,
                    "  walk {} {} -> {} ({} min)",
                    w.departure,
                    w.from,
                    w.to,
                    w.duration.num_minutes()
                )?,
            }
        }
        Ok(())
    }
}
