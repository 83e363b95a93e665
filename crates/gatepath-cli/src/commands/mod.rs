//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use gatepath_core::engine::ProgressEngine;
use gatepath_core::error::EngineError;
use gatepath_core::traits::Stores;
use gatepath_store::{load_config_from, GatepathConfig, MemoryStore};

pub mod attempt;
pub mod checkpoint;
pub mod finalize;
pub mod history;
pub mod import;
pub mod init;
pub mod phase;
pub mod profile;
pub mod recompute;
pub mod snapshot;

/// Config, store and engine for one CLI invocation.
pub struct Session {
    pub config: GatepathConfig,
    pub store: Arc<MemoryStore>,
    pub engine: ProgressEngine,
}

impl Session {
    pub fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config_from(config_path)?;
        tracing::debug!("using data file {}", config.data_path.display());
        let store = Arc::new(MemoryStore::load_or_default(&config.data_path)?);
        let engine = ProgressEngine::new(Stores::shared(store.clone()), config.engine_config())?;
        Ok(Self {
            config,
            store,
            engine,
        })
    }

    /// Persist the store back to the data file.
    pub async fn save(&self) -> Result<()> {
        self.store.save_json(&self.config.data_path).await
    }
}

/// Convert an engine error into the message a user should see.
pub fn surface(err: EngineError) -> anyhow::Error {
    anyhow::anyhow!(err.to_body().error)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
