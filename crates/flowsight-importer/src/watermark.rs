// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Import watermarks.
//!
//! One document per (partition, value type) records the position of the
//! last record whose writes are durable. The watermark advances only after
//! the cycle's batch lands, so a crash replays from the last durable
//! position and idempotent handlers absorb the duplicates. Writes go
//! through the batch engine: a watermark that fails to land must surface
//! as a cycle error, not as a silent success.

use std::sync::Arc;

use flowsight_store::{BatchEngine, BatchRequest, DocumentStore};
use serde_json::Value;

use crate::entity::{ImportPositionEntity, IMPORT_POSITION_INDEX};
use crate::error::Result;
use crate::record::ValueType;

/// Reads and advances per-(partition, value type) watermarks.
#[derive(Clone)]
pub struct WatermarkStore {
    store: Arc<dyn DocumentStore>,
    engine: BatchEngine,
}

impl WatermarkStore {
    /// Create a watermark store reading from the given document store and
    /// writing through the given engine.
    pub fn new(store: Arc<dyn DocumentStore>, engine: BatchEngine) -> Self {
        Self { store, engine }
    }

    fn document_id(partition_id: i32, value_type: ValueType) -> String {
        format!("{partition_id}-{value_type}")
    }

    /// Last durably applied position; 0 when no watermark exists yet.
    pub async fn last_position(&self, partition_id: i32, value_type: ValueType) -> Result<i64> {
        let id = Self::document_id(partition_id, value_type);
        let document = self.store.get(IMPORT_POSITION_INDEX, &id).await?;
        Ok(document
            .as_ref()
            .and_then(|doc| doc.get("position"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    /// Persist the watermark after a cycle's batch has landed.
    pub async fn store_position(
        &self,
        partition_id: i32,
        value_type: ValueType,
        position: i64,
    ) -> Result<()> {
        let id = Self::document_id(partition_id, value_type);
        let entity = ImportPositionEntity {
            id: id.clone(),
            partition_id,
            value_type,
            position,
        };
        let document = serde_json::to_value(&entity)?;
        let fields = document
            .as_object()
            .cloned()
            .unwrap_or_default();

        let mut batch = BatchRequest::new();
        batch.upsert(IMPORT_POSITION_INDEX, id, document, fields);
        self.engine.submit(batch).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowsight_store::{
        BatchResponse, Filter, MemoryDocumentStore, OperationOutcome, StoreError,
    };
    use std::time::Duration;

    fn watermarks_over(store: Arc<dyn DocumentStore>) -> WatermarkStore {
        let engine = BatchEngine::new(store.clone(), 3, Duration::from_millis(1));
        WatermarkStore::new(store, engine)
    }

    /// Store double rejecting every write permanently.
    struct RejectingStore;

    #[async_trait]
    impl DocumentStore for RejectingStore {
        async fn get(
            &self,
            _index: &str,
            _id: &str,
        ) -> std::result::Result<Option<Value>, StoreError> {
            Ok(None)
        }

        async fn search(
            &self,
            _index: &str,
            _filter: &Filter,
        ) -> std::result::Result<Vec<Value>, StoreError> {
            Ok(Vec::new())
        }

        async fn execute_batch(
            &self,
            batch: &BatchRequest,
        ) -> std::result::Result<BatchResponse, StoreError> {
            Ok(BatchResponse {
                outcomes: batch
                    .operations()
                    .iter()
                    .map(|_| OperationOutcome::Failed {
                        transient: false,
                        reason: "mapping conflict".to_string(),
                    })
                    .collect(),
            })
        }
    }

    #[tokio::test]
    async fn test_missing_watermark_defaults_to_zero() {
        let store = Arc::new(MemoryDocumentStore::new());
        let watermarks = watermarks_over(store);
        let position = watermarks
            .last_position(1, ValueType::ProcessInstance)
            .await
            .unwrap();
        assert_eq!(position, 0);
    }

    #[tokio::test]
    async fn test_rejected_write_surfaces_as_error() {
        let watermarks = watermarks_over(Arc::new(RejectingStore));
        let result = watermarks
            .store_position(1, ValueType::ProcessInstance, 5)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_store_then_read_back() {
        let store = Arc::new(MemoryDocumentStore::new());
        let watermarks = watermarks_over(store);

        watermarks
            .store_position(1, ValueType::Incident, 42)
            .await
            .unwrap();
        watermarks
            .store_position(1, ValueType::Incident, 97)
            .await
            .unwrap();

        let position = watermarks.last_position(1, ValueType::Incident).await.unwrap();
        assert_eq!(position, 97);
        // Other pairs are unaffected
        assert_eq!(
            watermarks.last_position(1, ValueType::Variable).await.unwrap(),
            0
        );
        assert_eq!(
            watermarks.last_position(2, ValueType::Incident).await.unwrap(),
            0
        );
    }
}
