// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for flowsight-store.

use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A document targeted by a field merge is not a JSON object.
    #[error("document '{id}' in index '{index}' is not a JSON object")]
    NotAnObject {
        /// Index holding the document.
        index: String,
        /// Id of the offending document.
        id: String,
    },

    /// A batch still had failing operations after the retry budget.
    #[error("batch failed after {attempts} attempt(s): {failures} operation(s) still failing")]
    BatchExhausted {
        /// Number of submission attempts made.
        attempts: u32,
        /// Number of operations that never succeeded.
        failures: usize,
    },

    /// The store rejected an operation permanently (retrying cannot help).
    #[error("batch operation rejected: {0}")]
    Rejected(String),

    /// The store is currently unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type using StoreError.
pub type Result<T> = std::result::Result<T, StoreError>;
