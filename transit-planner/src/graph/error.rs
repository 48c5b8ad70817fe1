//! Graph error types.
//!
//! Decode errors mean the stored graph does not match the model this crate
//! expects. They are fatal and never retried.

use super::{NodeId, NodeKind, RelationshipId};
use crate::filter::FilterError;

/// Data-integrity failure while decoding raw graph storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown node kind tag {0:?}")]
    UnknownNodeKind(String),

    #[error("unknown relationship kind tag {0:?}")]
    UnknownRelationshipKind(String),

    #[error("{kind} node is missing required property {property:?}")]
    MissingProperty {
        kind: &'static str,
        property: &'static str,
    },

    #[error("property {property:?} is invalid: {reason}")]
    InvalidProperty {
        property: &'static str,
        reason: String,
    },

    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("relationship {0} does not exist")]
    UnknownRelationship(RelationshipId),

    #[error("expected {expected} node, found {found}")]
    WrongVariant {
        expected: &'static str,
        found: NodeKind,
    },
}

/// Failure while building the graph from transit data.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GraphBuildError {
    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),

    #[error("{kind} {id} referenced by {by} does not exist")]
    UnknownReference {
        kind: &'static str,
        id: String,
        by: String,
    },

    #[error("trip {trip} is invalid: {reason}")]
    InvalidTrip { trip: String, reason: &'static str },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DecodeError::UnknownNodeKind("PLATFORM".into());
        assert_eq!(err.to_string(), "unknown node kind tag \"PLATFORM\"");

        let err = DecodeError::MissingProperty {
            kind: "MINUTE",
            property: "time",
        };
        assert_eq!(
            err.to_string(),
            "MINUTE node is missing required property \"time\""
        );

        let err = GraphBuildError::UnknownReference {
            kind: "route",
            id: "R9".into(),
            by: "trip T1".into(),
        };
        assert_eq!(err.to_string(), "route R9 referenced by trip T1 does not exist");
    }
}
