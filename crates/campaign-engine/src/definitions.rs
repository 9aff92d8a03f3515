//! Campaign definition sources.
//!
//! The engine never parses configuration itself; it asks a
//! [`CampaignDefinitions`] collaborator for a fully typed [`CampaignConfig`]
//! at start time. Two sources ship here: a JSON file read fresh on every
//! start (edits take effect on the next `start` without a restart) and an
//! in-memory map for tests and embedders that build configs in code.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::debug;

use crate::config::CampaignConfig;
use crate::error::{DialerError, Result};

/// External source of campaign definitions, looked up by requested name.
#[async_trait]
pub trait CampaignDefinitions: Send + Sync {
    /// Load the definition for `name`.
    ///
    /// Errors: `ConfigNotFound` when the source itself is missing or empty,
    /// `CampaignNotFound` when the source has no entry for `name`,
    /// `IncompleteConfig` when the entry exists but a required field is
    /// absent or malformed.
    async fn load(&self, name: &str) -> Result<CampaignConfig>;
}

/// In-memory definition source.
#[derive(Default)]
pub struct StaticDefinitions {
    campaigns: RwLock<HashMap<String, CampaignConfig>>,
}

impl StaticDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its requested name.
    pub fn insert(&self, requested_name: &str, config: CampaignConfig) {
        self.campaigns
            .write()
            .insert(requested_name.to_string(), config);
    }

    pub fn remove(&self, requested_name: &str) {
        self.campaigns.write().remove(requested_name);
    }
}

#[async_trait]
impl CampaignDefinitions for StaticDefinitions {
    async fn load(&self, name: &str) -> Result<CampaignConfig> {
        let campaigns = self.campaigns.read();
        if campaigns.is_empty() {
            return Err(DialerError::config_not_found("no campaigns registered"));
        }
        campaigns
            .get(name)
            .cloned()
            .ok_or_else(|| DialerError::campaign_not_found(name))
    }
}

/// On-disk file shape: a top-level `campaigns` map keyed by requested name.
#[derive(Deserialize)]
struct DefinitionsFile {
    campaigns: HashMap<String, serde_json::Value>,
}

/// JSON-backed definition source.
///
/// The file is re-read on every `load`, matching the behavior of a dialer
/// that re-opens its configuration per campaign start. A missing or
/// unreadable file is `ConfigNotFound`; a present entry that fails typed
/// deserialization is `IncompleteConfig` naming the offending field.
pub struct JsonFileDefinitions {
    path: PathBuf,
}

impl JsonFileDefinitions {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl CampaignDefinitions for JsonFileDefinitions {
    async fn load(&self, name: &str) -> Result<CampaignConfig> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DialerError::config_not_found(format!("{}: {}", self.path.display(), e))
        })?;

        let file: DefinitionsFile = serde_json::from_str(&raw).map_err(|e| {
            DialerError::config_not_found(format!("{}: {}", self.path.display(), e))
        })?;
        if file.campaigns.is_empty() {
            return Err(DialerError::config_not_found(format!(
                "{}: campaigns section is empty",
                self.path.display()
            )));
        }

        let entry = file
            .campaigns
            .get(name)
            .ok_or_else(|| DialerError::campaign_not_found(name))?;

        // Typed deserialization is the all-fields-present check.
        let config: CampaignConfig = serde_json::from_value(entry.clone())
            .map_err(|e| DialerError::incomplete_config(format!("campaign '{name}': {e}")))?;
        debug!("loaded campaign definition '{}' from {}", name, self.path.display());
        Ok(config)
    }
}
