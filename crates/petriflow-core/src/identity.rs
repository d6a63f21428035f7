//! Identity types for places, transitions and arcs
//!
//! All identifiers are string-based so they can be referenced directly from
//! net documents and rate expressions.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create a new identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a place
    PlaceId
);

string_id!(
    /// Identifier of a transition
    TransitionId
);

string_id!(
    /// Identifier of an arc
    ArcId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_id() {
        let id = PlaceId::new("P1");
        assert_eq!(id.as_str(), "P1");
        assert_eq!(format!("{}", id), "P1");
    }

    #[test]
    fn test_ids_are_distinct_types() {
        let t: TransitionId = "T1".into();
        let a: ArcId = String::from("A1").into();
        assert_eq!(t.as_ref(), "T1");
        assert_eq!(a.as_ref(), "A1");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = PlaceId::new("glucose");
        let text = ron::to_string(&id).unwrap();
        assert_eq!(text, "\"glucose\"");
    }
}
