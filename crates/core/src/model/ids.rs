use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when an identifier cannot be parsed from text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to parse {kind} from {raw:?}")]
pub struct ParseIdError {
    kind: &'static str,
    raw: String,
}

impl ParseIdError {
    /// Name of the identifier type that failed to parse.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value
            #[must_use]
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map($name::new)
                    .map_err(|_| ParseIdError {
                        kind: stringify!($name),
                        raw: s.to_owned(),
                    })
            }
        }
    };
}

numeric_id!(
    /// Identifies a learner. Supplied by the caller on every operation.
    LearnerId
);

numeric_id!(
    /// Identifies a flashcard.
    CardId
);

numeric_id!(
    /// Identifies a flashcard set.
    SetId
);

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_id_display_and_debug() {
        let id = CardId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "CardId(42)");
    }

    #[test]
    fn learner_id_from_str_trims() {
        let id: LearnerId = " 7 ".parse().unwrap();
        assert_eq!(id, LearnerId::new(7));
    }

    #[test]
    fn set_id_from_str_invalid_reports_kind() {
        let err = "not-a-number".parse::<SetId>().unwrap_err();
        assert_eq!(err.kind(), "SetId");
        assert!(err.to_string().contains("not-a-number"));
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&CardId::new(999)).unwrap();
        assert_eq!(json, "999");
        let back: CardId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CardId::new(999));
    }
}
