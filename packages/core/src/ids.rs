//! Identifier newtypes, ULID-backed so they sort by creation time.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

/// Error returned when an identifier string is not a valid ULID.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} id {value:?}: {reason}")]
pub struct IdParseError {
    pub kind: &'static str,
    pub value: String,
    pub reason: String,
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Create a new unique identifier.
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Parse an identifier from its string form.
            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                Ulid::from_string(s).map(Self).map_err(|e| IdParseError {
                    kind: $kind,
                    value: s.to_string(),
                    reason: e.to_string(),
                })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a task definition.
    TaskId,
    "task"
);

define_id!(
    /// Unique identifier for a workflow definition.
    WorkflowId,
    "workflow"
);

define_id!(
    /// Unique identifier for a job.
    JobId,
    "job"
);
