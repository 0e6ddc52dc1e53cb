// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for flowsight-importer.

use flowsight_store::StoreError;
use thiserror::Error;

/// Import pipeline errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ImportError {
    /// Document store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A record is missing data a handler requires.
    #[error("Malformed record at partition {partition_id} position {position}: {reason}")]
    MalformedRecord {
        /// Partition the record came from.
        partition_id: i32,
        /// Position of the record within its partition.
        position: i64,
        /// What the handler could not make sense of.
        reason: String,
    },

    /// Record source fetch failed.
    #[error("Record source error: {0}")]
    Source(String),

    /// Configuration loading failed.
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ImportError {
    /// Whether this error must fail the whole flush cycle.
    ///
    /// Store and source failures are cycle failures: the watermark must not
    /// advance past records whose effects may not be durable. Everything
    /// else is a per-record problem; the record is logged and skipped for
    /// the handler that raised it.
    pub fn is_cycle_failure(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Source(_))
    }
}

/// Result type using ImportError.
pub type Result<T> = std::result::Result<T, ImportError>;
