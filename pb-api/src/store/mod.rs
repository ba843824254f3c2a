//! Analysis record storage
//!
//! Handlers only see [`AnalysisStore`]. Which implementation backs it is a
//! startup decision made from configuration (see `open_store`), never a
//! per-request connection probe.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use pb_common::config::{StorageBackend, StorageConfig};
use pb_common::models::AnalysisRecord;
use pb_common::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::pagination::HistoryWindow;

/// One page of a user's records plus the user's total record count
#[derive(Debug, Clone, Default)]
pub struct HistorySlice {
    /// Newest first
    pub records: Vec<AnalysisRecord>,
    pub total: u64,
}

/// Insert-only store of analysis records.
///
/// Both implementations order a user's records by `uploaded_at` descending,
/// ties broken by insertion order (most recent insert first).
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Backend identity (reported by /health and the save response)
    fn backend(&self) -> StorageBackend;

    /// Durably record a new analysis
    async fn insert(&self, record: AnalysisRecord) -> Result<()>;

    /// Page through a user's records
    async fn query_by_user(&self, user_id: &str, window: HistoryWindow) -> Result<HistorySlice>;
}

/// Open the configured store.
///
/// If SQLite cannot be opened and `fallback_to_memory` is set, logs a warning
/// and returns an in-memory store instead.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn AnalysisStore>> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory analysis store (records are lost on restart)");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Sqlite => {
            let db_path = config.database_path();
            match SqliteStore::open(&db_path).await {
                Ok(store) => {
                    info!("Using SQLite analysis store: {}", db_path.display());
                    Ok(Arc::new(store))
                }
                Err(e) if config.fallback_to_memory => {
                    warn!(
                        error = %e,
                        "Failed to open database {}, falling back to in-memory store",
                        db_path.display()
                    );
                    Ok(Arc::new(MemoryStore::new()))
                }
                Err(e) => Err(e),
            }
        }
    }
}
