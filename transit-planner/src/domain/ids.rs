//! Identifier types for transit entities.

use std::fmt;

/// Error returned when constructing an identifier from an invalid string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} id: {reason}")]
pub struct InvalidId {
    kind: &'static str,
    reason: &'static str,
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier.
            ///
            /// Returns an error if the string is empty or only whitespace.
            pub fn new(s: impl Into<String>) -> Result<Self, InvalidId> {
                let s = s.into();
                if s.trim().is_empty() {
                    return Err(InvalidId {
                        kind: $kind,
                        reason: "cannot be empty",
                    });
                }
                Ok(Self(s))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidId;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Unique identifier of a station (a stop served by one or more routes).
    ///
    /// # Examples
    ///
    /// ```
    /// use transit_planner::domain::StationId;
    ///
    /// let id = StationId::new("9400ZZMAALT").unwrap();
    /// assert_eq!(id.as_str(), "9400ZZMAALT");
    ///
    /// assert!(StationId::new("").is_err());
    /// ```
    StationId,
    "station"
);

string_id!(
    /// Unique identifier of a route.
    RouteId,
    "route"
);

string_id!(
    /// Unique identifier of an operating agency.
    AgencyId,
    "agency"
);

string_id!(
    /// Unique identifier of a service calendar.
    ServiceId,
    "service"
);

string_id!(
    /// Unique identifier of a single scheduled vehicle trip.
    TripId,
    "trip"
);


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Roundtrip: new then as_str returns the original
        #[test]
        fn roundtrip(s in "[A-Za-z0-9_-]{1,20}") {
            let id = RouteId::new(s.clone()).unwrap();
            prop_assert_eq!(id.as_str(), s.as_str());
        }

        /// Serde roundtrip preserves the identifier
        #[test]
        fn serde_roundtrip(s in "[A-Za-z0-9]{1,12}") {
            let id = StationId::new(s).unwrap();
            let json = serde_json::to_string(&id).unwrap();
            let back: StationId = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(back, id);
        }
    }
}
