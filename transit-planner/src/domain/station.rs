//! Stations, routes and agencies.

use std::collections::BTreeSet;
use std::fmt;

use super::{AgencyId, RouteId, StationId};

/// Mean Earth radius in metres.
const EARTH_RADIUS_METRES: f64 = 6_371_000.0;

/// A geographic position in decimal degrees.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LatLong {
    pub lat: f64,
    pub lon: f64,
}

impl LatLong {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both coordinates are finite and in range.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance to `other` in metres (haversine).
    pub fn distance_metres(&self, other: &LatLong) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METRES * a.sqrt().asin()
    }
}

impl fmt::Display for LatLong {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lon)
    }
}

/// Vehicle type operating a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Tram,
    Bus,
    Train,
    Ferry,
    Subway,
}

impl TransportMode {
    /// Stable lowercase name, also used as a graph property value.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Tram => "tram",
            TransportMode::Bus => "bus",
            TransportMode::Train => "train",
            TransportMode::Ferry => "ferry",
            TransportMode::Subway => "subway",
        }
    }

    /// Inverse of [`TransportMode::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tram" => Some(TransportMode::Tram),
            "bus" => Some(TransportMode::Bus),
            "train" => Some(TransportMode::Train),
            "ferry" => Some(TransportMode::Ferry),
            "subway" => Some(TransportMode::Subway),
            _ => None,
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operator of routes.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Agency {
    pub id: AgencyId,
    pub name: String,
}

/// A route: an ordered line operated by one agency in one mode.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    pub agency: AgencyId,
    pub mode: TransportMode,
}

/// A station together with the routes and modes serving it.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub position: LatLong,
    pub routes: BTreeSet<RouteId>,
    pub modes: BTreeSet<TransportMode>,
}

impl Station {
    /// Create a station not yet served by any route.
    pub fn new(id: StationId, name: impl Into<String>, position: LatLong) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            routes: BTreeSet::new(),
            modes: BTreeSet::new(),
        }
    }

    /// True if `route` calls at this station.
    pub fn served_by(&self, route: &RouteId) -> bool {
        self.routes.contains(route)
    }

    /// True if more than one route calls here, so passengers can change.
    pub fn is_interchange(&self) -> bool {
        self.routes.len() > 1
    }
}
