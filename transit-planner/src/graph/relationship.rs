//! Typed graph relationships.

use std::fmt;

use super::store::{PropertyValue, Properties, RawRelationship};
use super::{DecodeError, NodeId, RelationshipId};
use crate::domain::TransportMode;

const MODE: &str = "mode";

/// The kind of a relationship.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// Station to boarding point.
    Board,
    /// Station to boarding point at an interchange station.
    InterchangeBoard,
    /// Route station back to its station.
    Depart,
    /// Route station directly to another route's boarding point.
    InterchangeDepart,
    /// Boarding point or route station to a service.
    ToService,
    ToHour,
    ToMinute,
    ToServiceEnd,
    /// Vehicle movement from a departure minute to the next route station.
    GoesTo(TransportMode),
    Walk,
}

impl RelationshipKind {
    /// The stored type tag.
    pub fn tag(&self) -> &'static str {
        match self {
            RelationshipKind::Board => "BOARD",
            RelationshipKind::InterchangeBoard => "INTERCHANGE_BOARD",
            RelationshipKind::Depart => "DEPART",
            RelationshipKind::InterchangeDepart => "INTERCHANGE_DEPART",
            RelationshipKind::ToService => "TO_SERVICE",
            RelationshipKind::ToHour => "TO_HOUR",
            RelationshipKind::ToMinute => "TO_MINUTE",
            RelationshipKind::ToServiceEnd => "TO_SERVICE_END",
            RelationshipKind::GoesTo(_) => "GOES_TO",
            RelationshipKind::Walk => "WALK",
        }
    }

    /// Properties that must be stored alongside the tag.
    pub fn properties(&self) -> Properties {
        let mut props = Properties::new();
        if let RelationshipKind::GoesTo(mode) = self {
            props.insert(MODE.to_string(), PropertyValue::Text(mode.as_str().to_string()));
        }
        props
    }

    /// True for the two boarding kinds.
    pub fn is_board(&self) -> bool {
        matches!(self, RelationshipKind::Board | RelationshipKind::InterchangeBoard)
    }

    fn decode(raw: &RawRelationship) -> Result<Self, DecodeError> {
        Ok(match raw.kind.as_str() {
            "BOARD" => RelationshipKind::Board,
            "INTERCHANGE_BOARD" => RelationshipKind::InterchangeBoard,
            "DEPART" => RelationshipKind::Depart,
            "INTERCHANGE_DEPART" => RelationshipKind::InterchangeDepart,
            "TO_SERVICE" => RelationshipKind::ToService,
            "TO_HOUR" => RelationshipKind::ToHour,
            "TO_MINUTE" => RelationshipKind::ToMinute,
            "TO_SERVICE_END" => RelationshipKind::ToServiceEnd,
            "WALK" => RelationshipKind::Walk,
            "GOES_TO" => {
                let mode = match raw.properties.get(MODE) {
                    Some(PropertyValue::Text(s)) => TransportMode::parse(s).ok_or_else(|| {
                        DecodeError::InvalidProperty {
                            property: MODE,
                            reason: format!("unknown transport mode {s:?}"),
                        }
                    })?,
                    Some(_) => {
                        return Err(DecodeError::InvalidProperty {
                            property: MODE,
                            reason: "expected text".to_string(),
                        });
                    }
                    None => {
                        return Err(DecodeError::MissingProperty {
                            kind: "GOES_TO",
                            property: MODE,
                        });
                    }
                };
                RelationshipKind::GoesTo(mode)
            }
            other => return Err(DecodeError::UnknownRelationshipKind(other.to_string())),
        })
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipKind::GoesTo(mode) => write!(f, "GOES_TO({mode})"),
            other => f.write_str(other.tag()),
        }
    }
}

/// A decoded relationship.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub id: RelationshipId,
    pub kind: RelationshipKind,
    pub start: NodeId,
    pub end: NodeId,
    /// Traversal cost in minutes.
    pub cost: u32,
}

impl Relationship {
    pub fn decode(id: RelationshipId, raw: &RawRelationship) -> Result<Self, DecodeError> {
        Ok(Self {
            id,
            kind: RelationshipKind::decode(raw)?,
            start: raw.start,
            end: raw.end,
            cost: raw.cost,
        })
    }
}
