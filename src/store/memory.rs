// SPDX-License-Identifier: GPL-3.0-only

//! In-memory record store
//!
//! Keeps entities ordered by (partition key, row key), the same order the
//! table service returns them in.

use super::{EntityStream, RecordStore, TableEntity};
use crate::errors::InfrastructureError;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// In-memory store for tests and local development
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    entities: RwLock<BTreeMap<(String, String), TableEntity>>,
    writes: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Total number of stored entities across all partitions
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up one entity
    pub fn get(&self, partition_key: &str, row_key: &str) -> Option<TableEntity> {
        self.read()
            .get(&(partition_key.to_string(), row_key.to_string()))
            .cloned()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<(String, String), TableEntity>> {
        self.entities.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn upsert_replace(&self, entity: TableEntity) -> Result<(), InfrastructureError> {
        let key = (entity.partition_key.clone(), entity.row_key.clone());
        trace!(partition = %key.0, row = %key.1, "Replacing entity");

        let mut entities = self.entities.write().unwrap_or_else(|e| e.into_inner());
        entities.insert(key, entity);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn scan<'a>(&'a self, partition_key: &'a str) -> EntityStream<'a> {
        // Snapshot the partition so the scan does not hold the lock
        let matching: Vec<_> = self
            .read()
            .values()
            .filter(|e| e.partition_key == partition_key)
            .cloned()
            .map(Ok)
            .collect();

        stream::iter(matching).boxed()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
