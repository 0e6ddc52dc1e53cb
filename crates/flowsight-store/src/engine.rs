// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Retrying batch submission.
//!
//! The engine submits one flush cycle's [`BatchRequest`] and, on a partial
//! failure, resubmits only the failed sub-operations. Retries are bounded;
//! a permanently rejected operation or an exhausted budget surfaces as an
//! error so the caller does not advance its watermark for the cycle.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::batch::{BatchOperation, BatchRequest, OperationOutcome};
use crate::error::{Result, StoreError};
use crate::DocumentStore;

/// Submits batches with bounded retries of failed sub-operations.
#[derive(Clone)]
pub struct BatchEngine {
    store: Arc<dyn DocumentStore>,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for BatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchEngine")
            .field("store", &"...")
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl BatchEngine {
    /// Create an engine over a store with the given retry budget.
    ///
    /// `max_retries` counts resubmissions after the initial attempt; the
    /// delay doubles between attempts.
    pub fn new(store: Arc<dyn DocumentStore>, max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            store,
            max_retries,
            retry_delay,
        }
    }

    /// Submit a batch, retrying failed sub-operations until they succeed,
    /// a permanent rejection is reported, or the retry budget is spent.
    pub async fn submit(&self, batch: BatchRequest) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let total = batch.len();
        let mut pending: Vec<BatchOperation> = batch.into_operations();
        let mut attempts: u32 = 0;
        let mut delay = self.retry_delay;

        loop {
            attempts += 1;
            let request = BatchRequest::from_operations(pending);
            let response = self.store.execute_batch(&request).await?;

            let mut failed = Vec::new();
            for (operation, outcome) in request
                .into_operations()
                .into_iter()
                .zip(response.outcomes)
            {
                match outcome {
                    OperationOutcome::Ok => {}
                    OperationOutcome::Failed { transient: false, reason } => {
                        warn!(
                            index = operation.index(),
                            id = operation.id(),
                            kind = operation.kind(),
                            %reason,
                            "Batch operation permanently rejected"
                        );
                        return Err(StoreError::Rejected(reason));
                    }
                    OperationOutcome::Failed { transient: true, reason } => {
                        debug!(
                            index = operation.index(),
                            id = operation.id(),
                            kind = operation.kind(),
                            %reason,
                            "Batch operation failed, will retry"
                        );
                        failed.push(operation);
                    }
                }
            }

            if failed.is_empty() {
                debug!(operations = total, attempts, "Batch applied");
                return Ok(());
            }

            if attempts > self.max_retries {
                warn!(
                    failures = failed.len(),
                    attempts, "Batch retry budget exhausted"
                );
                return Err(StoreError::BatchExhausted {
                    attempts,
                    failures: failed.len(),
                });
            }

            warn!(
                failures = failed.len(),
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "Resubmitting failed batch operations"
            );
            tokio::time::sleep(delay).await;
            delay *= 2;
            pending = failed;
        }
    }
}
