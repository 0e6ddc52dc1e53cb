// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Partition discovery.
//!
//! The engine topology is the authoritative source of partition ids. Once a
//! topology answer has been seen it is cached for the life of the process,
//! because a later topology outage must not shrink the worker set. When the
//! topology has never answered, partition ids already present in the store
//! serve as a fallback so a restarted importer can resume without the
//! engine; the fallback is taken as-is, with no retries of its own.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use flowsight_store::{DocumentStore, Filter};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::ImporterConfig;
use crate::entity::PROCESS_INSTANCE_INDEX;
use crate::error::Result;

/// A source of partition ids; `None` means the source cannot answer right
/// now.
#[async_trait]
pub trait PartitionSource: Send + Sync {
    /// Partition ids known to this source.
    async fn partition_ids(&self) -> Option<BTreeSet<i32>>;
}

/// Fallback source deriving partition ids from documents already imported.
pub struct StorePartitionSource {
    store: Arc<dyn DocumentStore>,
}

impl StorePartitionSource {
    /// Create a source over the given store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PartitionSource for StorePartitionSource {
    async fn partition_ids(&self) -> Option<BTreeSet<i32>> {
        let documents = self
            .store
            .search(PROCESS_INSTANCE_INDEX, &Filter::All)
            .await
            .ok()?;
        let ids: BTreeSet<i32> = documents
            .iter()
            .filter_map(|doc| doc.get("partitionId"))
            .filter_map(Value::as_i64)
            .map(|id| id as i32)
            .collect();
        (!ids.is_empty()).then_some(ids)
    }
}

/// Resolves the partition set this node imports, preferring the topology
/// and remembering its first answer permanently.
pub struct PartitionHolder {
    topology: Arc<dyn PartitionSource>,
    store_fallback: Arc<dyn PartitionSource>,
    config: ImporterConfig,
    authoritative: Mutex<Option<BTreeSet<i32>>>,
}

impl PartitionHolder {
    /// Create a holder over a topology source and a store-derived fallback.
    pub fn new(
        topology: Arc<dyn PartitionSource>,
        store_fallback: Arc<dyn PartitionSource>,
        config: ImporterConfig,
    ) -> Self {
        Self {
            topology,
            store_fallback,
            config,
            authoritative: Mutex::new(None),
        }
    }

    /// Partition ids this node owns.
    ///
    /// The topology answer wins and is cached permanently. Without it, a
    /// cached answer from an earlier call is reused, then the store
    /// fallback is consulted once. When every source is silent the topology
    /// is retried a bounded number of times before returning the empty set.
    pub async fn partition_ids(&self) -> Result<BTreeSet<i32>> {
        let mut cached = self.authoritative.lock().await;
        let mut retries = 0;

        loop {
            if let Some(ids) = self.topology.partition_ids().await {
                let owned = self.owned_by_this_node(&ids);
                info!(total = ids.len(), owned = owned.len(), "Topology reported partitions");
                *cached = Some(owned.clone());
                return Ok(owned);
            }

            if let Some(ids) = cached.as_ref() {
                return Ok(ids.clone());
            }

            if let Some(ids) = self.store_fallback.partition_ids().await {
                let owned = self.owned_by_this_node(&ids);
                warn!(
                    owned = owned.len(),
                    "Topology unavailable, using partitions derived from the store"
                );
                return Ok(owned);
            }

            if retries >= self.config.partition_max_retries {
                warn!(retries, "No partition source available, giving up for now");
                return Ok(BTreeSet::new());
            }
            retries += 1;
            tokio::time::sleep(self.config.partition_retry_delay).await;
        }
    }

    /// Shard the partition set across importer nodes by modulo.
    fn owned_by_this_node(&self, ids: &BTreeSet<i32>) -> BTreeSet<i32> {
        ids.iter()
            .copied()
            .filter(|id| (*id as u32) % self.config.node_count == self.config.node_id)
            .collect()
    }
}
