// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hierarchy paths for execution scopes.
//!
//! A root scope's path is `PI_<processInstanceKey>`; every nested scope
//! appends `/` + its own instance key to its parent scope's path. The
//! segment count is `level + 1`. The string format is load-bearing: the
//! incident propagator prefix-matches it and the query layer parses it for
//! breadcrumbs, so it must not change.

use std::collections::HashMap;

use flowsight_store::DocumentStore;
use serde_json::Value;
use tracing::warn;

use crate::entity::FLOW_NODE_INSTANCE_INDEX;
use crate::error::Result;
use crate::record::ProcessInstanceRecordValue;

/// Path of a root process scope.
pub fn process_instance_path(process_instance_key: i64) -> String {
    format!("PI_{process_instance_key}")
}

/// Path of a scope nested directly under `parent_path`.
pub fn child_path(parent_path: &str, key: i64) -> String {
    format!("{parent_path}/{key}")
}

/// Depth encoded by a path; the root scope is level 0.
pub fn level_of(path: &str) -> u32 {
    path.matches('/').count() as u32
}

/// One `/`-delimited segment of a tree path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathSegment {
    /// A process instance scope (`PI_<key>`).
    ProcessInstance(i64),
    /// A flow node instance scope (bare key).
    FlowNode(i64),
}

/// Parse a path into its segments, root first.
///
/// Unparsable segments are dropped; they cannot be addressed anyway.
pub fn parse_segments(path: &str) -> Vec<PathSegment> {
    path.split('/')
        .filter_map(|segment| {
            if let Some(raw) = segment.strip_prefix("PI_") {
                raw.parse().ok().map(PathSegment::ProcessInstance)
            } else {
                segment.parse().ok().map(PathSegment::FlowNode)
            }
        })
        .collect()
}

/// Per-flush-cycle cache of scope key to tree path.
///
/// A child activating in the same batch as its parent scope resolves from
/// the cache; otherwise the parent is read back from the store. The cache
/// is discarded at the end of the cycle so no entity state survives across
/// cycles.
#[derive(Debug, Default)]
pub struct TreePathCache {
    paths: HashMap<i64, String>,
}

impl TreePathCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly computed path for a scope key.
    pub fn insert(&mut self, scope_key: i64, path: String) {
        self.paths.insert(scope_key, path);
    }

    /// Cached path for a scope key.
    pub fn get(&self, scope_key: i64) -> Option<&str> {
        self.paths.get(&scope_key).map(String::as_str)
    }

    /// Resolve the tree path of the flow node instance described by a
    /// process instance record (envelope key `key`).
    ///
    /// The parent scope's path comes from the cache, the store, or - when a
    /// scope truly cannot be resolved - degrades to the process root so the
    /// instance stays addressable.
    pub async fn resolve(
        &mut self,
        store: &dyn DocumentStore,
        value: &ProcessInstanceRecordValue,
        key: i64,
    ) -> Result<String> {
        let parent_path = self
            .parent_path(store, value)
            .await?
            .unwrap_or_else(|| {
                warn!(
                    flow_node_instance_key = key,
                    flow_scope_key = ?value.flow_scope_key,
                    "Parent scope not resolvable, degrading to process root"
                );
                process_instance_path(value.process_instance_key)
            });
        let path = child_path(&parent_path, key);
        self.insert(key, path.clone());
        Ok(path)
    }

    async fn parent_path(
        &self,
        store: &dyn DocumentStore,
        value: &ProcessInstanceRecordValue,
    ) -> Result<Option<String>> {
        let scope_key = match value.flow_scope_key {
            // Direct child of the process scope
            Some(scope) if scope != value.process_instance_key => scope,
            _ => return Ok(Some(process_instance_path(value.process_instance_key))),
        };

        if let Some(path) = self.get(scope_key) {
            return Ok(Some(path.to_string()));
        }

        let parent = store
            .get(FLOW_NODE_INSTANCE_INDEX, &scope_key.to_string())
            .await?;
        Ok(parent
            .as_ref()
            .and_then(|doc| doc.get("treePath"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}
