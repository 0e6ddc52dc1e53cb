// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flowsight Store - Document Store Abstraction
//!
//! This crate defines the document store seam used by the flowsight import
//! pipeline, plus the batch/merge engine that submits accumulated writes.
//!
//! The store itself is pluggable: any backend that can get a document by id,
//! run the small set of [`Filter`] forms, and apply a [`BatchRequest`] can
//! back the pipeline. [`MemoryDocumentStore`] is the reference backend used
//! by tests and embedders.
//!
//! # Write semantics
//!
//! All writes go through a [`BatchRequest`] holding one of four operation
//! kinds per target document:
//!
//! | Operation | Semantics |
//! |-----------|-----------|
//! | `add` | Create an append-only document; a duplicate id is a no-op |
//! | `upsert` | Create from the full document if absent, else merge only the supplied field map |
//! | `upsert` with routing | Same, but the write is routed to the shard of a named parent document |
//! | `delete` | Remove a document; a missing id is a no-op |
//!
//! Operations against the same document id apply in declaration order within
//! one batch. The store reports per-operation success/failure; the
//! [`BatchEngine`] resubmits only the failed sub-operations with a bounded,
//! doubling backoff before surfacing a cycle failure.
//!
//! # Modules
//!
//! - [`batch`]: Batch operations, requests, and per-operation results
//! - [`engine`]: Retrying batch submission
//! - [`error`]: Error types for store operations
//! - [`filter`]: Structured filters for targeted reads
//! - [`memory`]: In-memory reference backend

#![deny(missing_docs)]

/// Batch operations, requests, and per-operation results.
pub mod batch;

/// Retrying batch submission on top of a [`DocumentStore`].
pub mod engine;

/// Error types for store operations.
pub mod error;

/// Structured filters for targeted reads.
pub mod filter;

/// In-memory reference backend.
pub mod memory;

pub use self::batch::{BatchOperation, BatchRequest, BatchResponse, OperationOutcome};
pub use self::engine::BatchEngine;
pub use self::error::{Result, StoreError};
pub use self::filter::Filter;
pub use self::memory::MemoryDocumentStore;

use async_trait::async_trait;
use serde_json::Value;

/// Document store interface used by the import pipeline.
///
/// Implementations must apply operations of one batch against the same
/// document id in declaration order, and must report one
/// [`OperationOutcome`] per submitted operation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a single document by index and id.
    async fn get(&self, index: &str, id: &str) -> Result<Option<Value>>;

    /// Return all documents of an index matching the filter.
    ///
    /// Result order must be deterministic for a given store state.
    async fn search(&self, index: &str, filter: &Filter) -> Result<Vec<Value>>;

    /// Apply a batch of write operations, reporting per-operation outcomes.
    ///
    /// The response is positionally aligned with the request: result `i`
    /// belongs to operation `i`.
    async fn execute_batch(&self, batch: &BatchRequest) -> Result<BatchResponse>;
}
