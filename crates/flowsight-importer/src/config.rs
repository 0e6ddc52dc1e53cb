// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::time::Duration;

/// Importer configuration.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    /// Maximum records fetched per flush cycle.
    pub batch_size: usize,
    /// Resubmissions of failed batch sub-operations before a cycle fails.
    pub max_flush_retries: u32,
    /// Initial delay between batch resubmissions (doubles per attempt).
    pub flush_retry_delay: Duration,
    /// Serialized variable length above which only a preview is stored.
    pub variable_preview_size: usize,
    /// Retries when both partition sources are unavailable.
    pub partition_max_retries: u32,
    /// Delay between partition source retries.
    pub partition_retry_delay: Duration,
    /// Worker sleep when a fetch returns no records.
    pub idle_delay: Duration,
    /// Id of this importer node when sharded across processes.
    pub node_id: u32,
    /// Total importer nodes sharing the partitions.
    pub node_count: u32,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_flush_retries: 3,
            flush_retry_delay: Duration::from_millis(200),
            variable_preview_size: 8191,
            partition_max_retries: 10,
            partition_retry_delay: Duration::from_secs(1),
            idle_delay: Duration::from_millis(500),
            node_id: 0,
            node_count: 1,
        }
    }
}

impl ImporterConfig {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional (with defaults):
    /// - `FLOWSIGHT_BATCH_SIZE`: records per flush cycle (default: 50)
    /// - `FLOWSIGHT_MAX_FLUSH_RETRIES`: batch resubmissions (default: 3)
    /// - `FLOWSIGHT_FLUSH_RETRY_DELAY_MS`: initial resubmit delay (default: 200)
    /// - `FLOWSIGHT_VARIABLE_PREVIEW_SIZE`: truncation threshold (default: 8191)
    /// - `FLOWSIGHT_PARTITION_MAX_RETRIES`: partition source retries (default: 10)
    /// - `FLOWSIGHT_PARTITION_RETRY_DELAY_MS`: partition retry delay (default: 1000)
    /// - `FLOWSIGHT_IDLE_DELAY_MS`: idle sleep on empty fetch (default: 500)
    /// - `FLOWSIGHT_NODE_ID`: this node's id (default: 0)
    /// - `FLOWSIGHT_NODE_COUNT`: total importer nodes (default: 1)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            batch_size: parse_var("FLOWSIGHT_BATCH_SIZE", defaults.batch_size)?,
            max_flush_retries: parse_var("FLOWSIGHT_MAX_FLUSH_RETRIES", defaults.max_flush_retries)?,
            flush_retry_delay: Duration::from_millis(parse_var(
                "FLOWSIGHT_FLUSH_RETRY_DELAY_MS",
                defaults.flush_retry_delay.as_millis() as u64,
            )?),
            variable_preview_size: parse_var(
                "FLOWSIGHT_VARIABLE_PREVIEW_SIZE",
                defaults.variable_preview_size,
            )?,
            partition_max_retries: parse_var(
                "FLOWSIGHT_PARTITION_MAX_RETRIES",
                defaults.partition_max_retries,
            )?,
            partition_retry_delay: Duration::from_millis(parse_var(
                "FLOWSIGHT_PARTITION_RETRY_DELAY_MS",
                defaults.partition_retry_delay.as_millis() as u64,
            )?),
            idle_delay: Duration::from_millis(parse_var(
                "FLOWSIGHT_IDLE_DELAY_MS",
                defaults.idle_delay.as_millis() as u64,
            )?),
            node_id: parse_var("FLOWSIGHT_NODE_ID", defaults.node_id)?,
            node_count: parse_var("FLOWSIGHT_NODE_COUNT", defaults.node_count)?,
        };

        if config.node_count == 0 {
            return Err(ConfigError::Invalid(
                "FLOWSIGHT_NODE_COUNT",
                "must be at least 1",
            ));
        }
        if config.node_id >= config.node_count {
            return Err(ConfigError::Invalid(
                "FLOWSIGHT_NODE_ID",
                "must be less than FLOWSIGHT_NODE_COUNT",
            ));
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::Invalid(name, "must be a non-negative integer")),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
