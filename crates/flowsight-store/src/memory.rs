// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory reference backend.
//!
//! Backs tests and embedders that do not need a networked document store.
//! Documents live in per-index ordered maps so search results are
//! deterministic; routing keys are recorded so co-location can be asserted.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::batch::{BatchRequest, BatchResponse, OperationOutcome};
use crate::error::{Result, StoreError};
use crate::filter::Filter;
use crate::{BatchOperation, DocumentStore};

#[derive(Debug, Default)]
struct IndexState {
    documents: BTreeMap<String, Value>,
    routing: HashMap<String, String>,
}

/// In-memory document store.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    indices: RwLock<HashMap<String, IndexState>>,
}

impl MemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routing key recorded for a document, if any.
    pub async fn routing_of(&self, index: &str, id: &str) -> Option<String> {
        let indices = self.indices.read().await;
        indices.get(index)?.routing.get(id).cloned()
    }

    /// Number of documents in an index.
    pub async fn document_count(&self, index: &str) -> usize {
        let indices = self.indices.read().await;
        indices.get(index).map_or(0, |i| i.documents.len())
    }

    /// Snapshot of a whole index, keyed by document id.
    ///
    /// Test helper for byte-for-byte idempotency comparisons.
    pub async fn dump(&self, index: &str) -> BTreeMap<String, Value> {
        let indices = self.indices.read().await;
        indices
            .get(index)
            .map(|i| i.documents.clone())
            .unwrap_or_default()
    }

    fn apply(
        indices: &mut HashMap<String, IndexState>,
        operation: &BatchOperation,
    ) -> Result<()> {
        match operation {
            BatchOperation::Add {
                index,
                id,
                document,
            } => {
                let state = indices.entry(index.clone()).or_default();
                // Duplicate add is a no-op: append-only indices are replay-safe
                state
                    .documents
                    .entry(id.clone())
                    .or_insert_with(|| document.clone());
                Ok(())
            }
            BatchOperation::Upsert {
                index,
                id,
                document,
                fields,
            } => {
                let state = indices.entry(index.clone()).or_default();
                Self::merge(state, index, id, document, fields)
            }
            BatchOperation::UpsertWithRouting {
                index,
                id,
                document,
                fields,
                routing,
            } => {
                let state = indices.entry(index.clone()).or_default();
                state.routing.insert(id.clone(), routing.clone());
                Self::merge(state, index, id, document, fields)
            }
            BatchOperation::Delete { index, id } => {
                if let Some(state) = indices.get_mut(index) {
                    state.documents.remove(id);
                    state.routing.remove(id);
                }
                Ok(())
            }
        }
    }

    fn merge(
        state: &mut IndexState,
        index: &str,
        id: &str,
        document: &Value,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        match state.documents.get_mut(id) {
            None => {
                state.documents.insert(id.to_string(), document.clone());
                Ok(())
            }
            Some(existing) => {
                let object = existing
                    .as_object_mut()
                    .ok_or_else(|| StoreError::NotAnObject {
                        index: index.to_string(),
                        id: id.to_string(),
                    })?;
                for (field, value) in fields {
                    object.insert(field.clone(), value.clone());
                }
                Ok(())
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>> {
        let indices = self.indices.read().await;
        Ok(indices
            .get(index)
            .and_then(|state| state.documents.get(id))
            .cloned())
    }

    async fn search(&self, index: &str, filter: &Filter) -> Result<Vec<Value>> {
        let indices = self.indices.read().await;
        Ok(indices
            .get(index)
            .map(|state| {
                state
                    .documents
                    .values()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn execute_batch(&self, batch: &BatchRequest) -> Result<BatchResponse> {
        let mut indices = self.indices.write().await;
        let mut outcomes = Vec::with_capacity(batch.len());
        for operation in batch.operations() {
            match Self::apply(&mut indices, operation) {
                Ok(()) => outcomes.push(OperationOutcome::Ok),
                Err(e) => outcomes.push(OperationOutcome::Failed {
                    transient: false,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(BatchResponse { outcomes })
    }
}
