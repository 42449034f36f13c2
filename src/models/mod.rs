//! Core data models for the tracker.
//!
//! Records are plain structs mirroring the SQLite rows. Write payloads are
//! separate `*Input` structs that carry their own `validate()`; the store
//! calls it before any SQL runs.

use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A fixed set of text values stored in a TEXT column.
///
/// Generates serde, `Display`, `FromStr` and the rusqlite conversions so the
/// enum can be bound and read directly.
macro_rules! choice_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => ($value:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $value)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl $crate::models::Choice for $name {
            fn all() -> &'static [Self] {
                Self::ALL
            }

            fn value(&self) -> &'static str {
                self.as_str()
            }

            fn display_label(&self) -> &'static str {
                self.label()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownChoice;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($value => Ok($name::$variant),)+
                    other => Err($crate::models::UnknownChoice {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

pub mod boards;
pub mod planning;
pub mod scripts;
pub mod systems;
pub mod workflows;

pub use boards::*;
pub use planning::*;
pub use scripts::*;
pub use systems::*;
pub use workflows::*;

/// Implemented by every `choice_enum!` type.
pub trait Choice: Copy + 'static {
    fn all() -> &'static [Self];
    fn value(&self) -> &'static str;
    fn display_label(&self) -> &'static str;
}

/// A stored value that is not one of the known choices.
#[derive(Debug, Clone, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownChoice {
    pub kind: &'static str,
    pub value: String,
}

/// A `{value, label}` pair used by list filters and dashboard breakdowns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChoiceCount {
    pub value: String,
    pub label: String,
    pub count: i64,
}

/// Minimal `{id, name}` reference embedded in denormalised responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TrackerError::Validation(format!("{field} is required")));
    }
    Ok(())
}

pub(crate) fn require_non_negative(field: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(TrackerError::Validation(format!(
            "{field} must be a non-negative number"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_round_trip_through_str() {
        let status: SystemStatus = "deprecation".parse().unwrap();
        assert_eq!(status, SystemStatus::Deprecation);
        assert_eq!(status.to_string(), "deprecation");
        assert_eq!(status.label(), "Scheduled for Deprecation");
    }

    #[test]
    fn test_unknown_choice() {
        let err = "retired".parse::<SystemStatus>().unwrap_err();
        assert_eq!(err.to_string(), "unknown SystemStatus value 'retired'");
    }

    #[test]
    fn test_choice_serde_uses_stored_value() {
        let json = serde_json::to_string(&CardStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let back: CardStatus = serde_json::from_str("\"in-progress\"").unwrap();
        assert_eq!(back, CardStatus::InProgress);
    }

    #[test]
    fn test_require_text() {
        assert!(require_text("name", "  ").is_err());
        assert!(require_text("name", "Banner").is_ok());
    }

    #[test]
    fn test_require_non_negative() {
        assert!(require_non_negative("cost", None).is_ok());
        assert!(require_non_negative("cost", Some(0.0)).is_ok());
        assert!(require_non_negative("cost", Some(-1.0)).is_err());
        assert!(require_non_negative("cost", Some(f64::NAN)).is_err());
    }
}
