// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Import pipeline turning the workflow engine's exported event log into
//! queryable documents.
//!
//! The engine appends records to a partitioned, replayable log. One worker
//! per (partition, value type) pair pulls records past its watermark,
//! routes them through the registered [`handler::ImportHandler`]s, and
//! flushes the resulting writes as a single batch. Everything downstream of
//! the log is built for at-least-once delivery: entity ids are
//! deterministic functions of the record, updates are idempotent, and
//! documents shared between handlers are written as disjoint field sets so
//! the writes commute.
//!
//! Incident state is the one thing that cannot be materialized in a single
//! pass, because an incident marks every ancestor scope in the execution
//! tree and those ancestors may not exist yet. The primary import only
//! enqueues work items; [`post_import::IncidentPropagator`] drains the
//! queue after the cycle's batch is durable.
//!
//! ```text
//! RecordSource ──fetch──> ImportScheduler ──route──> HandlerRegistry
//!                                                        │ flush
//!                                                        v
//!                          IncidentPropagator <── DocumentStore (batch)
//! ```

#![deny(missing_docs)]

pub mod config;
pub mod entity;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod partition;
pub mod post_import;
pub mod reader;
pub mod record;
pub mod scheduler;
pub mod tree_path;
pub mod watermark;

pub use config::ImporterConfig;
pub use error::{ImportError, Result};
pub use handler::{HandlerRegistry, ImportContext, ImportHandler};
pub use partition::{PartitionHolder, PartitionSource};
pub use post_import::IncidentPropagator;
pub use reader::{MemoryLog, RecordSource};
pub use record::{Record, ValueType};
pub use scheduler::{ImportScheduler, ImportSchedulerHandle};
pub use watermark::WatermarkStore;
