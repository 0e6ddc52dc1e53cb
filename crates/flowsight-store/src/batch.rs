// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Batch write operations and per-operation results.
//!
//! A [`BatchRequest`] accumulates the writes declared by import handlers
//! during one flush cycle and is submitted as a whole. Each operation
//! targets exactly one document.

use serde_json::{Map, Value};

/// A single write operation against one document.
#[derive(Debug, Clone)]
pub enum BatchOperation {
    /// Create an append-only document. A duplicate id is a no-op success,
    /// which is what makes replay of append-only records idempotent.
    Add {
        /// Target index.
        index: String,
        /// Document id.
        id: String,
        /// Full document to create.
        document: Value,
    },

    /// Create-if-absent from `document`, else merge only `fields` into the
    /// existing document. Fields not named are left untouched, so handlers
    /// owning different fields of the same document never clobber each
    /// other.
    Upsert {
        /// Target index.
        index: String,
        /// Document id.
        id: String,
        /// Full document used when the id is absent.
        document: Value,
        /// Field map merged when the id is present.
        fields: Map<String, Value>,
    },

    /// Same as `Upsert`, but the write is routed to the shard holding the
    /// named parent document. Used for child rows that must co-locate with
    /// their parent for join queries.
    UpsertWithRouting {
        /// Target index.
        index: String,
        /// Document id.
        id: String,
        /// Full document used when the id is absent.
        document: Value,
        /// Field map merged when the id is present.
        fields: Map<String, Value>,
        /// Id of the parent document whose shard receives the write.
        routing: String,
    },

    /// Remove a document. A missing id is a no-op success.
    Delete {
        /// Target index.
        index: String,
        /// Document id.
        id: String,
    },
}

impl BatchOperation {
    /// Target index of this operation.
    pub fn index(&self) -> &str {
        match self {
            Self::Add { index, .. }
            | Self::Upsert { index, .. }
            | Self::UpsertWithRouting { index, .. }
            | Self::Delete { index, .. } => index,
        }
    }

    /// Target document id of this operation.
    pub fn id(&self) -> &str {
        match self {
            Self::Add { id, .. }
            | Self::Upsert { id, .. }
            | Self::UpsertWithRouting { id, .. }
            | Self::Delete { id, .. } => id,
        }
    }

    /// Short operation kind name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Upsert { .. } => "upsert",
            Self::UpsertWithRouting { .. } => "upsert-with-routing",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Accumulated write operations for one flush cycle.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    operations: Vec<BatchOperation>,
}

impl BatchRequest {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a batch from already-collected operations.
    pub fn from_operations(operations: Vec<BatchOperation>) -> Self {
        Self { operations }
    }

    /// Declare an append-only create.
    pub fn add(&mut self, index: impl Into<String>, id: impl Into<String>, document: Value) {
        self.operations.push(BatchOperation::Add {
            index: index.into(),
            id: id.into(),
            document,
        });
    }

    /// Declare a field-level upsert.
    pub fn upsert(
        &mut self,
        index: impl Into<String>,
        id: impl Into<String>,
        document: Value,
        fields: Map<String, Value>,
    ) {
        self.operations.push(BatchOperation::Upsert {
            index: index.into(),
            id: id.into(),
            document,
            fields,
        });
    }

    /// Declare a field-level upsert routed to a parent document's shard.
    pub fn upsert_with_routing(
        &mut self,
        index: impl Into<String>,
        id: impl Into<String>,
        document: Value,
        fields: Map<String, Value>,
        routing: impl Into<String>,
    ) {
        self.operations.push(BatchOperation::UpsertWithRouting {
            index: index.into(),
            id: id.into(),
            document,
            fields,
            routing: routing.into(),
        });
    }

    /// Declare a document deletion.
    pub fn delete(&mut self, index: impl Into<String>, id: impl Into<String>) {
        self.operations.push(BatchOperation::Delete {
            index: index.into(),
            id: id.into(),
        });
    }

    /// Append a pre-built operation.
    pub fn push(&mut self, operation: BatchOperation) {
        self.operations.push(operation);
    }

    /// Whether the batch holds no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Number of operations in the batch.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// The accumulated operations, in declaration order.
    pub fn operations(&self) -> &[BatchOperation] {
        &self.operations
    }

    /// Consume the batch, yielding its operations.
    pub fn into_operations(self) -> Vec<BatchOperation> {
        self.operations
    }
}

/// Outcome of a single operation within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The operation was applied.
    Ok,
    /// The operation failed.
    Failed {
        /// Whether resubmitting the same operation may succeed.
        transient: bool,
        /// Store-reported reason.
        reason: String,
    },
}

impl OperationOutcome {
    /// Whether the operation was applied.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Per-operation outcomes for one submitted batch, positionally aligned
/// with the request.
#[derive(Debug, Clone)]
pub struct BatchResponse {
    /// Outcome of each operation, in request order.
    pub outcomes: Vec<OperationOutcome>,
}

impl BatchResponse {
    /// A response marking every operation of a request as applied.
    pub fn all_ok(len: usize) -> Self {
        Self {
            outcomes: vec![OperationOutcome::Ok; len],
        }
    }

    /// Whether every operation was applied.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(OperationOutcome::is_ok)
    }

    /// Indexes of operations that failed.
    pub fn failed_indexes(&self) -> Vec<usize> {
        self.outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| !o.is_ok())
            .map(|(i, _)| i)
            .collect()
    }
}
