//! Entity filter: which routes, stations and agencies take part in a graph.
//!
//! Filters let a reduced graph be built for tests or partial deployments.
//! An empty set for a category places no restriction on that category.
//! A filter is built additively through [`EntityFilterBuilder`] and is
//! immutable once built.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use crate::domain::{AgencyId, Route, RouteId, Station, StationId, TransitData};

/// A filter references an entity the network does not contain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("filter references unknown route {0}")]
    UnknownRoute(RouteId),

    #[error("filter references unknown station {0}")]
    UnknownStation(StationId),

    #[error("filter references unknown agency {0}")]
    UnknownAgency(AgencyId),
}

/// Immutable entity filter.
///
/// # Examples
///
/// ```
/// use transit_planner::domain::RouteId;
/// use transit_planner::filter::EntityFilter;
///
/// let everything = EntityFilter::include_all();
/// assert!(!everything.is_active());
///
/// let filter = EntityFilter::builder()
///     .add_route(RouteId::new("R1").unwrap())
///     .build();
/// assert!(filter.is_active());
/// assert!(filter.include_route_id(&RouteId::new("R1").unwrap()));
/// assert!(!filter.include_route_id(&RouteId::new("R2").unwrap()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EntityFilter {
    routes: BTreeSet<RouteId>,
    stations: BTreeSet<StationId>,
    agencies: BTreeSet<AgencyId>,
    active: bool,
}

impl EntityFilter {
    /// The no-op filter that includes everything.
    pub fn include_all() -> Self {
        Self::default()
    }

    /// Start building a restricting filter.
    pub fn builder() -> EntityFilterBuilder {
        EntityFilterBuilder::default()
    }

    /// True if any category is restricted.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Route-list check only; use [`EntityFilter::include_route`] when the
    /// agency is known.
    pub fn include_route_id(&self, route: &RouteId) -> bool {
        self.routes.is_empty() || self.routes.contains(route)
    }

    /// A route is included if it passes the route list and its agency passes
    /// the agency list.
    pub fn include_route(&self, route: &Route) -> bool {
        self.include_route_id(&route.id) && self.include_agency(&route.agency)
    }

    /// True iff at least one route of the set is included.
    pub fn include_routes<'a>(&self, routes: impl IntoIterator<Item = &'a Route>) -> bool {
        routes.into_iter().any(|r| self.include_route(r))
    }

    pub fn include_agency(&self, agency: &AgencyId) -> bool {
        self.agencies.is_empty() || self.agencies.contains(agency)
    }

    /// Station-list check only.
    pub fn include_station_id(&self, station: &StationId) -> bool {
        self.stations.is_empty() || self.stations.contains(station)
    }

    /// A station is included if it passes the station list and is served by
    /// at least one included route. An inactive filter includes every station,
    /// including ones no route serves.
    pub fn include_station(&self, station: &Station, routes: &HashMap<RouteId, Route>) -> bool {
        if !self.active {
            return true;
        }
        self.include_station_id(&station.id)
            && self.include_routes(station.routes.iter().filter_map(|id| routes.get(id)))
    }

    /// Check that every entity named by the filter exists in `data`.
    pub fn validate(&self, data: &TransitData) -> Result<(), FilterError> {
        if let Some(route) = self.routes.iter().find(|r| data.route(r).is_none()) {
            return Err(FilterError::UnknownRoute(route.clone()));
        }
        if let Some(station) = self.stations.iter().find(|s| !data.has_station(s)) {
            return Err(FilterError::UnknownStation(station.clone()));
        }
        if let Some(agency) = self.agencies.iter().find(|a| !data.has_agency(a)) {
            return Err(FilterError::UnknownAgency(agency.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for EntityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.active {
            return f.write_str("include all");
        }
        write!(
            f,
            "routes={} stations={} agencies={}",
            self.routes.len(),
            self.stations.len(),
            self.agencies.len()
        )
    }
}

/// Additive builder for [`EntityFilter`].
#[derive(Debug, Default)]
pub struct EntityFilterBuilder {
    inner: EntityFilter,
}

impl EntityFilterBuilder {
    pub fn add_route(mut self, route: RouteId) -> Self {
        self.inner.routes.insert(route);
        self.inner.active = true;
        self
    }

    pub fn add_station(mut self, station: StationId) -> Self {
        self.inner.stations.insert(station);
        self.inner.active = true;
        self
    }

    pub fn add_agency(mut self, agency: AgencyId) -> Self {
        self.inner.agencies.insert(agency);
        self.inner.active = true;
        self
    }

    pub fn build(self) -> EntityFilter {
        self.inner
    }
}
