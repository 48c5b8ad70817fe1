//! Domain types for the transit journey planner.
//!
//! This module contains the core domain model types that represent
//! validated transit data. All types enforce their invariants at construction
//! time, so code that receives these types can trust their validity.

mod calendar;
mod error;
mod ids;
mod journey;
mod station;
mod time;
mod transit_data;

pub use calendar::{DaysOfWeek, ServiceCalendar};
pub use error::DomainError;
pub use ids::{AgencyId, InvalidId, RouteId, ServiceId, StationId, TripId};
pub use journey::{Journey, JourneyKey, Location, Stage, StopCall, VehicleStage, WalkStage};
pub use station::{Agency, LatLong, Route, Station, TransportMode};
pub use time::{MINUTES_PER_DAY, TimeError, TimeOfDay};
pub use transit_data::{
    ServiceRecord, StopRecord, StopTime, TransitData, TripRecord, WalkLinkRecord,
};
