// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pull-style access to the engine's exported event log.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::record::{Record, ValueType};

/// A replayable, partitioned record source.
///
/// Fetches are by (partition, value type, position) and must return the
/// same records for the same range, in ascending position order.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Records of `value_type` on `partition_id` with a position strictly
    /// greater than `after_position`, at most `limit` of them.
    async fn fetch(
        &self,
        partition_id: i32,
        value_type: ValueType,
        after_position: i64,
        limit: usize,
    ) -> Result<Vec<Record>>;
}

/// In-memory record source, used by tests and local development.
#[derive(Default)]
pub struct MemoryLog {
    partitions: RwLock<HashMap<i32, Vec<Record>>>,
}

impl MemoryLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record to its partition.
    pub async fn append(&self, record: Record) {
        self.partitions
            .write()
            .await
            .entry(record.partition_id)
            .or_default()
            .push(record);
    }

    /// Append a batch of records.
    pub async fn append_all(&self, records: impl IntoIterator<Item = Record>) {
        for record in records {
            self.append(record).await;
        }
    }
}

#[async_trait]
impl RecordSource for MemoryLog {
    async fn fetch(
        &self,
        partition_id: i32,
        value_type: ValueType,
        after_position: i64,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let partitions = self.partitions.read().await;
        let mut records: Vec<Record> = partitions
            .get(&partition_id)
            .into_iter()
            .flatten()
            .filter(|r| r.value_type() == value_type && r.position > after_position)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.position);
        records.truncate(limit);
        Ok(records)
    }
}
