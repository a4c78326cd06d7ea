//! Runner process configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use wf_backend::BackendConfig;
use wf_core::RunnerId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid runner config: {0}")]
    Invalid(String),
}

/// Runner configuration, usually read from a JSON file.
///
/// ```json
/// {
///   "identifier": "runner-1",
///   "slots": 4,
///   "poll_interval_ms": 250,
///   "heartbeat_ms": 5000,
///   "log_level": "debug",
///   "backend": { "endpoint": "redis://127.0.0.1:6379/0" }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Unique runner id. Generated when not configured.
    pub identifier: RunnerId,
    /// Maximum jobs claimed per poll.
    pub slots: usize,
    /// Delay between polls; 0 disables the ticker.
    pub poll_interval_ms: u64,
    /// Delay between liveness reports; 0 disables them.
    pub heartbeat_ms: u64,
    /// Max level for the log subscriber.
    pub log_level: String,
    pub backend: BackendConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            identifier: format!("runner-{}", ulid::Ulid::new().to_string().to_lowercase()),
            slots: 5,
            poll_interval_ms: 250,
            heartbeat_ms: 5000,
            log_level: "info".to_string(),
            backend: BackendConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Create a config with the given identifier and defaults otherwise.
    pub fn new(identifier: impl Into<RunnerId>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    /// Set the number of slots.
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    /// Set the poll interval in milliseconds.
    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set the heartbeat interval in milliseconds.
    pub fn with_heartbeat_ms(mut self, ms: u64) -> Self {
        self.heartbeat_ms = ms;
        self
    }

    /// Set the backend config.
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// Read and validate a JSON config file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the config for values the runner cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.identifier.trim().is_empty() {
            return Err(ConfigError::Invalid("identifier must not be empty".to_string()));
        }
        if self.slots == 0 {
            return Err(ConfigError::Invalid("slots must be at least 1".to_string()));
        }
        self.level()?;
        Ok(())
    }

    /// Parsed log level.
    pub fn level(&self) -> Result<tracing::Level, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("unknown log_level {}", self.log_level)))
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        non_zero_ms(self.poll_interval_ms)
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        non_zero_ms(self.heartbeat_ms)
    }
}

fn non_zero_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn reads_config_file() -> Result<(), ConfigError> {
        let mut file = tempfile::NamedTempFile::new()?;
        write!(
            file,
            r#"{{
                "identifier": "runner-1",
                "slots": 2,
                "poll_interval_ms": 0,
                "log_level": "debug",
                "backend": {{ "endpoint": "mem://", "key_prefix": "wf" }}
            }}"#
        )?;

        let config = RunnerConfig::from_file(file.path()).await?;
        assert_eq!(config.identifier, "runner-1");
        assert_eq!(config.slots, 2);
        assert_eq!(config.poll_interval(), None);
        assert_eq!(config.heartbeat_interval(), Some(Duration::from_secs(5)));
        assert_eq!(config.level()?, tracing::Level::DEBUG);
        assert_eq!(config.backend.key_prefix.as_deref(), Some("wf"));
        assert_eq!(config.backend.concurrency, 10);
        Ok(())
    }

    #[tokio::test]
    async fn rejects_bad_files() -> Result<(), ConfigError> {
        let dir = tempfile::tempdir()?;

        let missing = RunnerConfig::from_file(dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(ConfigError::Io(_))));

        let garbled = dir.path().join("garbled.json");
        std::fs::write(&garbled, "{ not json")?;
        assert!(matches!(
            RunnerConfig::from_file(&garbled).await,
            Err(ConfigError::Json(_))
        ));

        let zero_slots = dir.path().join("zero.json");
        std::fs::write(&zero_slots, r#"{"slots": 0}"#)?;
        assert!(matches!(
            RunnerConfig::from_file(&zero_slots).await,
            Err(ConfigError::Invalid(_))
        ));

        let bad_level = dir.path().join("level.json");
        std::fs::write(&bad_level, r#"{"log_level": "chatty"}"#)?;
        assert!(matches!(
            RunnerConfig::from_file(&bad_level).await,
            Err(ConfigError::Invalid(_))
        ));
        Ok(())
    }

    #[test]
    fn generated_identifiers_differ() {
        assert_ne!(RunnerConfig::default().identifier, RunnerConfig::default().identifier);
    }
}
