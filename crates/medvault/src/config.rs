//! Vault configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use medvault_core::{DEFAULT_ACTIVITY_CAPACITY, DEFAULT_ISSUER};
use medvault_perms::{DuplicatePolicy, DEFAULT_SHARE_TTL_MS};
use medvault_session::SessionConfig;

use crate::error::{Result, VaultError};

/// Configuration for the vault.
///
/// Every field has a default, so a partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// What a second request-access call does while one is pending.
    pub duplicate_requests: DuplicatePolicy,
    /// Lifetime of issued share links.
    pub share_link_ttl_ms: i64,
    /// Origin that share links point at.
    pub share_base_url: String,
    /// Retained activity entries.
    pub activity_capacity: usize,
    /// Issuer recorded when a verification names none.
    pub default_issuer: String,
    /// Refuse protected operations on chains outside the supported set.
    pub require_supported_network: bool,
    /// Wallet session settings.
    pub session: SessionSettings,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            duplicate_requests: DuplicatePolicy::default(),
            share_link_ttl_ms: DEFAULT_SHARE_TTL_MS,
            share_base_url: "http://localhost:3000".to_string(),
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
            default_issuer: DEFAULT_ISSUER.to_string(),
            require_supported_network: false,
            session: SessionSettings::default(),
        }
    }
}

impl VaultConfig {
    /// Parse from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| VaultError::Config(e.to_string()))
    }

    pub fn with_duplicate_requests(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_requests = policy;
        self
    }

    pub fn with_share_base_url(mut self, url: impl Into<String>) -> Self {
        self.share_base_url = url.into();
        self
    }

    pub fn with_share_link_ttl(mut self, ttl: Duration) -> Self {
        self.share_link_ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        self
    }

    pub fn with_activity_capacity(mut self, capacity: usize) -> Self {
        self.activity_capacity = capacity;
        self
    }

    pub fn with_default_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.default_issuer = issuer.into();
        self
    }

    pub fn with_require_supported_network(mut self, require: bool) -> Self {
        self.require_supported_network = require;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.session.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// Serializable subset of [`SessionConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub connect_timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 30_000,
        }
    }
}

impl SessionSettings {
    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
    }
}
