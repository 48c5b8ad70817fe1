//! Typed graph nodes.
//!
//! Every stored node carries a kind tag. Decoding maps the tag to exactly one
//! [`GraphNode`] variant and reads only the properties of that variant.

use std::fmt;

use chrono::NaiveDate;

use super::store::{PropertyValue, RawNode};
use super::DecodeError;
use crate::domain::{
    DaysOfWeek, LatLong, RouteId, ServiceCalendar, ServiceId, StationId, TimeOfDay, TripId,
};

mod props {
    pub const STATION: &str = "station";
    pub const INTERCHANGE: &str = "interchange";
    pub const ROUTE: &str = "route";
    pub const SERVICE: &str = "service";
    pub const DAYS: &str = "days";
    pub const START_DATE: &str = "start_date";
    pub const END_DATE: &str = "end_date";
    pub const ADDITIONS: &str = "additions";
    pub const REMOVALS: &str = "removals";
    pub const HOUR: &str = "hour";
    pub const TIME: &str = "time";
    pub const TRIP: &str = "trip";
    pub const LAT: &str = "lat";
    pub const LON: &str = "lon";
}

/// The kind tag of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Station,
    RouteStation,
    BoardingPoint,
    Service,
    Hour,
    Minute,
    ServiceEnd,
    Query,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Station => "STATION",
            NodeKind::RouteStation => "ROUTE_STATION",
            NodeKind::BoardingPoint => "BOARDING_POINT",
            NodeKind::Service => "SERVICE",
            NodeKind::Hour => "HOUR",
            NodeKind::Minute => "MINUTE",
            NodeKind::ServiceEnd => "SERVICE_END",
            NodeKind::Query => "QUERY",
        }
    }

    pub fn parse(tag: &str) -> Result<Self, DecodeError> {
        Ok(match tag {
            "STATION" => NodeKind::Station,
            "ROUTE_STATION" => NodeKind::RouteStation,
            "BOARDING_POINT" => NodeKind::BoardingPoint,
            "SERVICE" => NodeKind::Service,
            "HOUR" => NodeKind::Hour,
            "MINUTE" => NodeKind::Minute,
            "SERVICE_END" => NodeKind::ServiceEnd,
            "QUERY" => NodeKind::Query,
            other => return Err(DecodeError::UnknownNodeKind(other.to_string())),
        })
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded node of the time-expanded graph.
#[derive(Clone, Debug, PartialEq)]
pub enum GraphNode {
    Station {
        station: StationId,
        interchange: bool,
    },
    /// A station as visited by a route; vehicles arrive here.
    RouteStation { route: RouteId, station: StationId },
    /// Where passengers board a route at a station.
    BoardingPoint { route: RouteId, station: StationId },
    Service {
        service: ServiceId,
        route: RouteId,
        calendar: ServiceCalendar,
    },
    Hour { hour: u32 },
    Minute {
        time: TimeOfDay,
        trip: TripId,
        route: RouteId,
    },
    ServiceEnd { last_departure: TimeOfDay },
    Query { position: LatLong },
}

/// The natural identity of a node's entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeIdentity {
    Station(StationId),
    RouteStation(RouteId, StationId),
    BoardingPoint(RouteId, StationId),
    Service(ServiceId, RouteId),
    Hour(u32),
    Minute(TripId, TimeOfDay),
    ServiceEnd(TimeOfDay),
    Query,
}

impl GraphNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            GraphNode::Station { .. } => NodeKind::Station,
            GraphNode::RouteStation { .. } => NodeKind::RouteStation,
            GraphNode::BoardingPoint { .. } => NodeKind::BoardingPoint,
            GraphNode::Service { .. } => NodeKind::Service,
            GraphNode::Hour { .. } => NodeKind::Hour,
            GraphNode::Minute { .. } => NodeKind::Minute,
            GraphNode::ServiceEnd { .. } => NodeKind::ServiceEnd,
            GraphNode::Query { .. } => NodeKind::Query,
        }
    }

    pub fn identity(&self) -> NodeIdentity {
        match self {
            GraphNode::Station { station, .. } => NodeIdentity::Station(station.clone()),
            GraphNode::RouteStation { route, station } => {
                NodeIdentity::RouteStation(route.clone(), station.clone())
            }
            GraphNode::BoardingPoint { route, station } => {
                NodeIdentity::BoardingPoint(route.clone(), station.clone())
            }
            GraphNode::Service { service, route, .. } => {
                NodeIdentity::Service(service.clone(), route.clone())
            }
            GraphNode::Hour { hour } => NodeIdentity::Hour(*hour),
            GraphNode::Minute { time, trip, .. } => NodeIdentity::Minute(trip.clone(), *time),
            GraphNode::ServiceEnd { last_departure } => NodeIdentity::ServiceEnd(*last_departure),
            GraphNode::Query { .. } => NodeIdentity::Query,
        }
    }

    /// The route this node belongs to, for variants that have one.
    pub fn route(&self) -> Option<&RouteId> {
        match self {
            GraphNode::RouteStation { route, .. }
            | GraphNode::BoardingPoint { route, .. }
            | GraphNode::Service { route, .. }
            | GraphNode::Minute { route, .. } => Some(route),
            GraphNode::Station { .. }
            | GraphNode::Hour { .. }
            | GraphNode::ServiceEnd { .. }
            | GraphNode::Query { .. } => None,
        }
    }

    /// The station this node stands at, for variants that have one.
    pub fn station(&self) -> Option<&StationId> {
        match self {
            GraphNode::Station { station, .. }
            | GraphNode::RouteStation { station, .. }
            | GraphNode::BoardingPoint { station, .. } => Some(station),
            GraphNode::Service { .. }
            | GraphNode::Hour { .. }
            | GraphNode::Minute { .. }
            | GraphNode::ServiceEnd { .. }
            | GraphNode::Query { .. } => None,
        }
    }

    /// Encode into raw storage form.
    pub fn to_raw(&self) -> RawNode {
        let raw = RawNode::new(self.kind().as_str());
        match self {
            GraphNode::Station {
                station,
                interchange,
            } => raw
                .with(props::STATION, text(station.as_str()))
                .with(props::INTERCHANGE, PropertyValue::Bool(*interchange)),
            GraphNode::RouteStation { route, station }
            | GraphNode::BoardingPoint { route, station } => raw
                .with(props::ROUTE, text(route.as_str()))
                .with(props::STATION, text(station.as_str())),
            GraphNode::Service {
                service,
                route,
                calendar,
            } => raw
                .with(props::SERVICE, text(service.as_str()))
                .with(props::ROUTE, text(route.as_str()))
                .with(props::DAYS, PropertyValue::Int(calendar.days.bits() as i64))
                .with(props::START_DATE, PropertyValue::Date(calendar.start_date))
                .with(props::END_DATE, PropertyValue::Date(calendar.end_date))
                .with(
                    props::ADDITIONS,
                    PropertyValue::Dates(calendar.additions.iter().copied().collect()),
                )
                .with(
                    props::REMOVALS,
                    PropertyValue::Dates(calendar.removals.iter().copied().collect()),
                ),
            GraphNode::Hour { hour } => raw.with(props::HOUR, PropertyValue::Int(*hour as i64)),
            GraphNode::Minute { time, trip, route } => raw
                .with(props::TIME, PropertyValue::Int(time.minutes() as i64))
                .with(props::TRIP, text(trip.as_str()))
                .with(props::ROUTE, text(route.as_str())),
            GraphNode::ServiceEnd { last_departure } => raw.with(
                props::TIME,
                PropertyValue::Int(last_departure.minutes() as i64),
            ),
            GraphNode::Query { position } => raw
                .with(props::LAT, PropertyValue::Float(position.lat))
                .with(props::LON, PropertyValue::Float(position.lon)),
        }
    }

    /// Decode a raw node into its typed variant.
    pub fn decode(raw: &RawNode) -> Result<GraphNode, DecodeError> {
        let kind = NodeKind::parse(&raw.kind)?;
        let reader = Reader { raw, kind };
        Ok(match kind {
            NodeKind::Station => GraphNode::Station {
                station: reader.id(props::STATION)?,
                interchange: reader.boolean(props::INTERCHANGE)?,
            },
            NodeKind::RouteStation => GraphNode::RouteStation {
                route: reader.id(props::ROUTE)?,
                station: reader.id(props::STATION)?,
            },
            NodeKind::BoardingPoint => GraphNode::BoardingPoint {
                route: reader.id(props::ROUTE)?,
                station: reader.id(props::STATION)?,
            },
            NodeKind::Service => {
                let days = reader.int(props::DAYS)?;
                let mut calendar = ServiceCalendar::new(
                    DaysOfWeek::from_bits(u8::try_from(days).map_err(|_| {
                        DecodeError::InvalidProperty {
                            property: props::DAYS,
                            reason: format!("{days} is not a day bit-set"),
                        }
                    })?),
                    reader.date(props::START_DATE)?,
                    reader.date(props::END_DATE)?,
                );
                calendar.additions = reader.dates(props::ADDITIONS)?.into_iter().collect();
                calendar.removals = reader.dates(props::REMOVALS)?.into_iter().collect();
                GraphNode::Service {
                    service: reader.id(props::SERVICE)?,
                    route: reader.id(props::ROUTE)?,
                    calendar,
                }
            }
            NodeKind::Hour => {
                let hour = reader.int(props::HOUR)?;
                if !(0..48).contains(&hour) {
                    return Err(DecodeError::InvalidProperty {
                        property: props::HOUR,
                        reason: format!("{hour} is out of range"),
                    });
                }
                GraphNode::Hour { hour: hour as u32 }
            }
            NodeKind::Minute => GraphNode::Minute {
                time: reader.time(props::TIME)?,
                trip: reader.id(props::TRIP)?,
                route: reader.id(props::ROUTE)?,
            },
            NodeKind::ServiceEnd => GraphNode::ServiceEnd {
                last_departure: reader.time(props::TIME)?,
            },
            NodeKind::Query => GraphNode::Query {
                position: LatLong::new(reader.float(props::LAT)?, reader.float(props::LON)?),
            },
        })
    }
}

fn text(s: &str) -> PropertyValue {
    PropertyValue::Text(s.to_string())
}

/// Typed property access with errors naming the node kind.
struct Reader<'a> {
    raw: &'a RawNode,
    kind: NodeKind,
}

impl Reader<'_> {
    fn get(&self, property: &'static str) -> Result<&PropertyValue, DecodeError> {
        self.raw
            .get(property)
            .ok_or(DecodeError::MissingProperty {
                kind: self.kind.as_str(),
                property,
            })
    }

    fn invalid(property: &'static str, expected: &str) -> DecodeError {
        DecodeError::InvalidProperty {
            property,
            reason: format!("expected {expected}"),
        }
    }

    fn id<T>(&self, property: &'static str) -> Result<T, DecodeError>
    where
        T: TryFrom<String>,
        T::Error: fmt::Display,
    {
        match self.get(property)? {
            PropertyValue::Text(s) => T::try_from(s.clone()).map_err(|e| {
                DecodeError::InvalidProperty {
                    property,
                    reason: e.to_string(),
                }
            }),
            _ => Err(Self::invalid(property, "text")),
        }
    }

    fn int(&self, property: &'static str) -> Result<i64, DecodeError> {
        match self.get(property)? {
            PropertyValue::Int(v) => Ok(*v),
            _ => Err(Self::invalid(property, "integer")),
        }
    }

    fn float(&self, property: &'static str) -> Result<f64, DecodeError> {
        match self.get(property)? {
            PropertyValue::Float(v) => Ok(*v),
            _ => Err(Self::invalid(property, "float")),
        }
    }

    fn boolean(&self, property: &'static str) -> Result<bool, DecodeError> {
        match self.get(property)? {
            PropertyValue::Bool(v) => Ok(*v),
            _ => Err(Self::invalid(property, "boolean")),
        }
    }

    fn date(&self, property: &'static str) -> Result<NaiveDate, DecodeError> {
        match self.get(property)? {
            PropertyValue::Date(d) => Ok(*d),
            _ => Err(Self::invalid(property, "date")),
        }
    }

    fn dates(&self, property: &'static str) -> Result<Vec<NaiveDate>, DecodeError> {
        match self.get(property)? {
            PropertyValue::Dates(d) => Ok(d.clone()),
            _ => Err(Self::invalid(property, "date list")),
        }
    }

    fn time(&self, property: &'static str) -> Result<TimeOfDay, DecodeError> {
        let minutes = self.int(property)?;
        i32::try_from(minutes)
            .ok()
            .and_then(TimeOfDay::from_minutes)
            .ok_or_else(|| DecodeError::InvalidProperty {
                property,
                reason: format!("{minutes} minutes is not a time of day"),
            })
    }
}
