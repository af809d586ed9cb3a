// SPDX-License-Identifier: GPL-3.0-only

//! Record store abstraction
//!
//! A key-value table keyed by a partition key plus a row key that is unique
//! within the partition. Two operations are needed by the directory service:
//! replace-or-insert of a single entity and a lazy scan of one partition.
//!
//! ```text
//! ┌──────────────────────┐
//! │ AssetDirectoryService│
//! └──────────┬───────────┘
//!            ▼
//! ┌──────────────────────┐
//! │  RecordStore trait   │
//! └──────────┬───────────┘
//!       ┌────┴─────┐
//!       ▼          ▼
//!   ┌──────┐   ┌────────┐
//!   │Memory│   │ Table  │  ← table storage REST service
//!   └──────┘   └────────┘
//! ```

pub mod memory;
pub mod table;

pub use memory::MemoryRecordStore;
pub use table::TableRecordStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::errors::InfrastructureError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

/// Lazy, finite, non-restartable sequence of entities
pub type EntityStream<'a> = BoxStream<'a, Result<TableEntity, InfrastructureError>>;

/// One row of the table
///
/// Serializes to the flat shape the table service uses on the wire:
/// `PartitionKey`, `RowKey` and the remaining properties side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntity {
    #[serde(rename = "PartitionKey")]
    pub partition_key: String,
    #[serde(rename = "RowKey")]
    pub row_key: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl TableEntity {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            properties: Map::new(),
        }
    }

    /// Builder-style property setter
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Read a property as a string
    ///
    /// Missing or non-string properties read as an empty string.
    pub fn string(&self, name: &str) -> String {
        match self.properties.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// Storage backend trait
///
/// Implementations must make `upsert_replace` atomic for a single entity:
/// after it returns, the stored entity equals `entity` exactly, with no
/// properties carried over from a previous version.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Replace the entity at (partition key, row key), inserting if absent
    async fn upsert_replace(&self, entity: TableEntity) -> Result<(), InfrastructureError>;

    /// Stream every entity whose partition key equals `partition_key`
    ///
    /// Order is store-defined. The caller applies any cap or sort.
    fn scan<'a>(&'a self, partition_key: &'a str) -> EntityStream<'a>;

    /// Prepare the backing table so later calls can succeed
    async fn ensure_ready(&self) -> Result<(), InfrastructureError> {
        Ok(())
    }

    /// Short backend name for logging
    fn name(&self) -> &'static str;
}

/// Open the configured store and make sure its table exists
///
/// Fails fast when the table backend has no connection string.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn RecordStore>, InfrastructureError> {
    let store: Arc<dyn RecordStore> = match (config.backend, config.validate()?) {
        (StoreBackend::Table, Some(account)) => {
            Arc::new(TableRecordStore::new(account, config.table_name.clone())?)
        }
        _ => Arc::new(MemoryRecordStore::new()),
    };
    store.ensure_ready().await?;
    info!(backend = store.name(), "Record store ready");
    Ok(store)
}
