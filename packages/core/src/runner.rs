//! Runner liveness records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a runner process. Free-form, chosen by the runner.
pub type RunnerId = String;

/// A runner and the last time it reported itself alive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Runner {
    pub id: RunnerId,
    pub active_at: DateTime<Utc>,
}

impl Runner {
    /// Check whether the runner reported within `max_idle` of `now`.
    pub fn is_alive(&self, now: DateTime<Utc>, max_idle: chrono::Duration) -> bool {
        now - self.active_at <= max_idle
    }
}
