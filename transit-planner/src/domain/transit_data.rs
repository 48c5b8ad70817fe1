//! Transit network input as produced by the timetable import layer.
//!
//! The graph builder consumes a `TransitData` value; parsing GTFS or other
//! feeds into it happens elsewhere. The JSON form is used by the binary and
//! by test fixtures.

use std::collections::{BTreeMap, HashMap};

use super::{
    Agency, AgencyId, LatLong, Route, RouteId, ServiceCalendar, ServiceId, Station, StationId,
    TimeOfDay, TripId,
};

/// A stop as listed in the input, before route membership is derived.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StopRecord {
    pub id: StationId,
    pub name: String,
    pub position: LatLong,
}

/// A service calendar together with its id.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ServiceRecord {
    pub id: ServiceId,
    #[serde(flatten)]
    pub calendar: ServiceCalendar,
}

/// One call of a trip at a station.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StopTime {
    pub station: StationId,
    pub arrival: TimeOfDay,
    pub departure: TimeOfDay,
}

/// A scheduled vehicle trip along a route.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TripRecord {
    pub id: TripId,
    pub route: RouteId,
    pub service: ServiceId,
    pub stops: Vec<StopTime>,
}

/// A walking link between two stations (used in both directions).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WalkLinkRecord {
    pub from: StationId,
    pub to: StationId,
    pub minutes: u32,
}

/// The complete network handed to the graph builder.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TransitData {
    #[serde(default)]
    pub agencies: Vec<Agency>,
    #[serde(default)]
    pub stations: Vec<StopRecord>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub services: Vec<ServiceRecord>,
    #[serde(default)]
    pub trips: Vec<TripRecord>,
    #[serde(default)]
    pub walk_links: Vec<WalkLinkRecord>,
}

impl TransitData {
    /// Parse a network from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Look up a route by id.
    pub fn route(&self, id: &RouteId) -> Option<&Route> {
        self.routes.iter().find(|r| &r.id == id)
    }

    /// Routes keyed by id.
    pub fn routes_by_id(&self) -> HashMap<RouteId, Route> {
        self.routes.iter().map(|r| (r.id.clone(), r.clone())).collect()
    }

    /// Agency ids known to the network.
    pub fn has_agency(&self, id: &AgencyId) -> bool {
        self.agencies.iter().any(|a| &a.id == id)
    }

    pub fn has_station(&self, id: &StationId) -> bool {
        self.stations.iter().any(|s| &s.id == id)
    }

    /// Stations with their serving routes and modes derived from the trips.
    ///
    /// Trips referring to unknown routes or stations are ignored here; the
    /// graph builder reports them.
    pub fn derive_stations(&self) -> BTreeMap<StationId, Station> {
        let routes = self.routes_by_id();
        let mut stations: BTreeMap<StationId, Station> = self
            .stations
            .iter()
            .map(|s| (s.id.clone(), Station::new(s.id.clone(), s.name.clone(), s.position)))
            .collect();

        for trip in &self.trips {
            let Some(route) = routes.get(&trip.route) else {
                continue;
            };
            for stop in &trip.stops {
                if let Some(station) = stations.get_mut(&stop.station) {
                    station.routes.insert(route.id.clone());
                    station.modes.insert(route.mode);
                }
            }
        }

        stations
    }
}
