//! Storage port: the only way the session layer touches persistent state.
//!
//! Every adapter is a flat string-to-string map, the same shape as browser
//! local storage. Operations are synchronous and complete before returning.
//! Adapters that touch the network or disk wrap the call in [`run_blocking`]
//! so a multi-threaded runtime moves its other tasks off the current worker.

use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::info;

use crate::config::{Config, StorageBackend};

pub mod file;
pub mod memory;
pub mod redis;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use self::redis::RedisStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Failed to encode storage file: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Flat key-value store shared by every identity on this profile.
pub trait KeyValueStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrites unconditionally.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// No-op if the key is absent.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    fn list_keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Runs blocking storage I/O. On a multi-threaded tokio runtime the current
/// worker hands its queued tasks to other workers first. Elsewhere (no
/// runtime, or a current-thread runtime) `f` runs inline.
pub(crate) fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Opens the adapter selected by `STORAGE_BACKEND`.
pub fn open_storage(config: &Config) -> Result<Arc<dyn KeyValueStorage>> {
    let storage: Arc<dyn KeyValueStorage> = match config.storage_backend {
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
        StorageBackend::File => Arc::new(
            FileStorage::open(&config.storage_path).with_context(|| {
                format!(
                    "failed to open storage file {}",
                    config.storage_path.display()
                )
            })?,
        ),
        StorageBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .context("REDIS_URL is required for the redis storage backend")?;
            Arc::new(
                RedisStorage::connect(url, &config.storage_profile)
                    .context("failed to connect to Redis")?,
            )
        }
    };
    info!("Session storage opened ({:?})", config.storage_backend);
    Ok(storage)
}
