use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::{MemoryStore, StorageBackend, VersionedStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: BackendKind,
    /// Author used when a caller does not pass one of its own.
    pub author: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Latest tree only, no history. Publish and status are unavailable.
    Memory,
    /// Full commit history with branches.
    Versioned,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Versioned,
            author: "anonymous".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        // Load environment variables from a .env file if one exists
        dotenvy::dotenv().ok();

        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // Add environment variables with prefix "SPINDLE_"
        config = config.add_source(
            config::Environment::with_prefix("SPINDLE")
                .separator("_")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Instantiate the configured storage backend.
    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        match self.storage.backend {
            BackendKind::Memory => Arc::new(MemoryStore::new()),
            BackendKind::Versioned => Arc::new(VersionedStore::new()),
        }
    }
}
