//! In-memory analysis store
//!
//! Process-lifetime container used when no durable database is configured or
//! the database could not be opened. Records are lost on restart.

use async_trait::async_trait;
use pb_common::config::StorageBackend;
use pb_common::models::AnalysisRecord;
use pb_common::Result;
use std::cmp::Reverse;
use tokio::sync::RwLock;

use super::{AnalysisStore, HistorySlice};
use crate::pagination::HistoryWindow;

/// Append-only record list in insertion order
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<AnalysisRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all users
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    fn backend(&self) -> StorageBackend {
        StorageBackend::Memory
    }

    async fn insert(&self, record: AnalysisRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn query_by_user(&self, user_id: &str, window: HistoryWindow) -> Result<HistorySlice> {
        let records = self.records.read().await;

        // Insertion index breaks uploaded_at ties, same as rowid in SQLite
        let mut matching: Vec<(usize, &AnalysisRecord)> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.user_id == user_id)
            .collect();
        matching.sort_by_key(|(index, r)| (Reverse(r.uploaded_at), Reverse(*index)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(window.skip as usize)
            .take(window.limit as usize)
            .map(|(_, r)| r.clone())
            .collect();

        Ok(HistorySlice {
            records: page,
            total,
        })
    }
}
