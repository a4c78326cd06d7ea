//! Backend configuration.

use serde::Deserialize;

use crate::BackendError;

/// Default bound on concurrent store calls during cascades and scans.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Store endpoint: `mem://` or `redis://[:<password>@]<host>:<port>[/<db>]`
    pub endpoint: String,
    /// Optional prefix applied to every store key.
    pub key_prefix: Option<String>,
    /// Maximum in-flight store calls for fan-out operations.
    pub concurrency: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "mem://".to_string(),
            key_prefix: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl BackendConfig {
    /// Create a config for the in-process store.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Create a config for a Redis server.
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            endpoint: url.into(),
            ..Default::default()
        }
    }

    /// Set the key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Set the fan-out bound. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Put a password into the endpoint's userinfo.
    pub fn with_password(mut self, password: impl AsRef<str>) -> Self {
        if let Some((scheme, rest)) = self.endpoint.split_once("://") {
            let host = rest.rsplit_once('@').map_or(rest, |(_, host)| host);
            self.endpoint = format!("{scheme}://:{}@{host}", password.as_ref());
        }
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `WF_BACKEND_URL` (default: `mem://`)
    /// - `WF_KEY_PREFIX` (optional)
    /// - `WF_CONCURRENCY` (default: 10)
    pub fn from_env() -> Result<Self, BackendError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BackendError> {
        let var = |name: &str| lookup(name).and_then(non_empty);

        let mut cfg = match var("WF_BACKEND_URL") {
            Some(url) if url.contains("://") => Self::redis(url),
            Some(other) => {
                return Err(BackendError::InvalidConfig(format!(
                    "unsupported WF_BACKEND_URL={other} (expected mem:// or redis://...)"
                )));
            }
            None => Self::memory(),
        };

        cfg.key_prefix = var("WF_KEY_PREFIX");

        if let Some(raw) = var("WF_CONCURRENCY") {
            let concurrency = raw.parse::<usize>().map_err(|_| {
                BackendError::InvalidConfig(format!("WF_CONCURRENCY={raw} is not a number"))
            })?;
            cfg = cfg.with_concurrency(concurrency);
        }

        Ok(cfg)
    }
}

fn non_empty(s: String) -> Option<String> {
    let s = s.trim().to_string();
    if s.is_empty() { None } else { Some(s) }
}
