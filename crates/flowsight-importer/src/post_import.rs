// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Incident propagation across the execution tree.
//!
//! Incident flags cannot be written during the primary import because the
//! affected ancestors may not be materialized yet. The primary import only
//! enqueues work items; this pass runs after the cycle's batch is durable,
//! reads the queue in position order, and flips (or reverts) the `INCIDENT`
//! state on every scope along the incident's tree path. Consumed entries
//! are deleted in the same batch, so a crash before the batch lands replays
//! the entries and converges to the same state. An entry whose scopes are
//! not all materialized yet is kept queued and retried on a later pass.

use std::collections::HashSet;
use std::sync::Arc;

use flowsight_store::{BatchEngine, BatchOperation, BatchRequest, DocumentStore, Filter};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::entity::{
    PostImporterQueueEntity, FLOW_NODE_INSTANCE_INDEX, INCIDENT_INDEX, LIST_VIEW_INDEX,
    POST_IMPORTER_QUEUE_INDEX, PROCESS_INSTANCE_INDEX,
};
use crate::error::Result;
use crate::record::IncidentIntent;
use crate::tree_path::{parse_segments, PathSegment};

/// Applies queued incident transitions to every scope on the incident's
/// tree path.
pub struct IncidentPropagator {
    store: Arc<dyn DocumentStore>,
    engine: BatchEngine,
}

impl IncidentPropagator {
    /// Create a propagator writing through the given engine.
    pub fn new(store: Arc<dyn DocumentStore>, engine: BatchEngine) -> Self {
        Self { store, engine }
    }

    /// Drain and apply all queued entries for a partition, in position
    /// order.
    pub async fn process_pending(&self, partition_id: i32) -> Result<()> {
        let documents = self
            .store
            .search(
                POST_IMPORTER_QUEUE_INDEX,
                &Filter::term("partitionId", partition_id),
            )
            .await?;
        if documents.is_empty() {
            return Ok(());
        }

        let mut entries = Vec::with_capacity(documents.len());
        for document in documents {
            let entry: PostImporterQueueEntity = serde_json::from_value(document)?;
            entries.push(entry);
        }
        entries.sort_by_key(|entry| entry.position);

        // An entry whose scopes are not all materialized yet stays queued;
        // later entries for the same incident must wait behind it so the
        // transitions apply in order.
        let mut deferred: HashSet<i64> = HashSet::new();
        let mut batch = BatchRequest::new();
        for entry in &entries {
            if deferred.contains(&entry.key) {
                continue;
            }
            let complete = match entry.intent {
                IncidentIntent::Created => self.apply_created(entry, &mut batch).await?,
                IncidentIntent::Resolved => self.apply_resolved(entry, &mut batch).await?,
            };
            if complete {
                batch.delete(POST_IMPORTER_QUEUE_INDEX, entry.id.clone());
            } else {
                deferred.insert(entry.key);
            }
        }

        debug!(
            partition_id,
            entries = entries.len(),
            operations = batch.len(),
            "Applying incident propagation"
        );
        self.engine.submit(batch).await?;
        Ok(())
    }

    /// Flip every scope on the incident's path to INCIDENT, remembering the
    /// state it had so a later resolution can restore it. A scope that is
    /// already INCIDENT (another incident beneath it) keeps its remembered
    /// state.
    ///
    /// Returns `false` while the owning flow node instance or some scope on
    /// its path is not materialized yet (those records live on a different
    /// value-type stream); the entry is then retried on a later pass.
    async fn apply_created(
        &self,
        entry: &PostImporterQueueEntity,
        batch: &mut BatchRequest,
    ) -> Result<bool> {
        let Some(incident) = self.load(INCIDENT_INDEX, &entry.key.to_string(), batch).await? else {
            warn!(incident_key = entry.key, "Queued incident not found, dropping entry");
            return Ok(true);
        };
        // The cycle that enqueued this entry may also have resolved the
        // incident; marking from the stale entry would strand the path in
        // INCIDENT with no revert to follow
        if string_field(&incident, "state") != "ACTIVE" {
            debug!(incident_key = entry.key, "Incident no longer active, dropping entry");
            return Ok(true);
        }
        let owner_key = incident.get("flowNodeInstanceKey").and_then(Value::as_i64);
        let Some(tree_path) = self.owner_path(owner_key, batch).await? else {
            warn!(incident_key = entry.key, "Incident owner not materialized yet");
            return Ok(false);
        };
        // The authoritative path is only known once the owner exists;
        // backfill it so sibling-incident prefix queries see the real tree
        if string_field(&incident, "treePath") != tree_path {
            let mut fields = Map::new();
            fields.insert("treePath".to_string(), json!(tree_path));
            batch.upsert(
                INCIDENT_INDEX,
                entry.key.to_string(),
                merged(&incident, &fields),
                fields,
            );
        }

        let mut complete = true;
        let mut routing_pi = entry.process_instance_key;
        for segment in parse_segments(&tree_path) {
            let found = match segment {
                PathSegment::ProcessInstance(key) => {
                    routing_pi = key;
                    self.mark_process_instance(key, batch).await?
                }
                PathSegment::FlowNode(key) => {
                    let incident_key = (owner_key == Some(key)).then_some(entry.key);
                    self.mark_flow_node(key, routing_pi, incident_key, batch).await?
                }
            };
            complete &= found;
        }
        Ok(complete)
    }

    /// Revert each scope on the resolved incident's path that no longer has
    /// any other active incident beneath it.
    async fn apply_resolved(
        &self,
        entry: &PostImporterQueueEntity,
        batch: &mut BatchRequest,
    ) -> Result<bool> {
        let Some(incident) = self.load(INCIDENT_INDEX, &entry.key.to_string(), batch).await? else {
            warn!(incident_key = entry.key, "Queued incident not found, dropping entry");
            return Ok(true);
        };
        let owner_key = incident.get("flowNodeInstanceKey").and_then(Value::as_i64);
        // An owner that disappeared leaves the stored path; scopes that were
        // never materialized were never marked, so the reverts are no-ops
        let tree_path = match self.owner_path(owner_key, batch).await? {
            Some(path) => path,
            None => string_field(&incident, "treePath"),
        };

        let mut routing_pi = entry.process_instance_key;
        let mut node_path = String::new();
        for segment in parse_segments(&tree_path) {
            let raw = match segment {
                PathSegment::ProcessInstance(key) => {
                    routing_pi = key;
                    format!("PI_{key}")
                }
                PathSegment::FlowNode(key) => key.to_string(),
            };
            if node_path.is_empty() {
                node_path = raw;
            } else {
                node_path = format!("{node_path}/{raw}");
            }

            if self.has_other_active_incident(&node_path, entry.key).await? {
                continue;
            }
            match segment {
                PathSegment::ProcessInstance(key) => {
                    self.revert_process_instance(key, batch).await?;
                }
                PathSegment::FlowNode(key) => {
                    let clear_incident_key = owner_key == Some(key);
                    self.revert_flow_node(key, routing_pi, clear_incident_key, batch).await?;
                }
            }
        }
        Ok(true)
    }

    /// Read a document, preferring a write already declared earlier in this
    /// pass's batch; the store will not see those writes until the batch
    /// lands.
    async fn load(
        &self,
        index: &str,
        id: &str,
        batch: &BatchRequest,
    ) -> Result<Option<Value>> {
        if let Some(document) = pending_write(batch, index, id) {
            return Ok(Some(document));
        }
        Ok(self.store.get(index, id).await?)
    }

    /// Current tree path of the incident's owning flow node instance, `None`
    /// while the owner is not materialized.
    async fn owner_path(
        &self,
        owner_key: Option<i64>,
        batch: &BatchRequest,
    ) -> Result<Option<String>> {
        let Some(owner_key) = owner_key else {
            return Ok(None);
        };
        let owner = self
            .load(FLOW_NODE_INSTANCE_INDEX, &owner_key.to_string(), batch)
            .await?;
        Ok(owner
            .as_ref()
            .map(|doc| string_field(doc, "treePath"))
            .filter(|path| !path.is_empty()))
    }

    /// Whether any active incident other than `resolved_key` still lives at
    /// or below the scope addressed by `node_path`.
    async fn has_other_active_incident(
        &self,
        node_path: &str,
        resolved_key: i64,
    ) -> Result<bool> {
        let candidates = self
            .store
            .search(
                INCIDENT_INDEX,
                &Filter::and([
                    Filter::prefix("treePath", node_path),
                    Filter::term("state", "ACTIVE"),
                    Filter::ne("key", resolved_key),
                ]),
            )
            .await?;
        // Prefix matching is textual; "PI_1/20" must not count for "PI_1/2"
        let boundary = format!("{node_path}/");
        Ok(candidates.iter().any(|doc| {
            let path = string_field(doc, "treePath");
            path == node_path || path.starts_with(&boundary)
        }))
    }

    async fn mark_process_instance(&self, key: i64, batch: &mut BatchRequest) -> Result<bool> {
        let id = key.to_string();
        let Some(document) = self.load(PROCESS_INSTANCE_INDEX, &id, batch).await? else {
            warn!(process_instance_key = key, "Scope on incident path not materialized yet");
            return Ok(false);
        };

        let mut fields = Map::new();
        fields.insert("state".to_string(), json!("INCIDENT"));
        let state = string_field(&document, "state");
        if state != "INCIDENT" {
            fields.insert("preIncidentState".to_string(), json!(state));
        }
        batch.upsert(PROCESS_INSTANCE_INDEX, id.clone(), merged(&document, &fields), fields);

        let flag = flag_fields(&id, true);
        batch.upsert(LIST_VIEW_INDEX, id.clone(), json!({"id": id, "incident": true}), flag);
        Ok(true)
    }

    async fn mark_flow_node(
        &self,
        key: i64,
        routing_pi: i64,
        incident_key: Option<i64>,
        batch: &mut BatchRequest,
    ) -> Result<bool> {
        let id = key.to_string();
        let Some(document) = self.load(FLOW_NODE_INSTANCE_INDEX, &id, batch).await? else {
            warn!(flow_node_instance_key = key, "Scope on incident path not materialized yet");
            return Ok(false);
        };

        let mut fields = Map::new();
        fields.insert("state".to_string(), json!("INCIDENT"));
        let state = string_field(&document, "state");
        if state != "INCIDENT" {
            fields.insert("preIncidentState".to_string(), json!(state));
        }
        if let Some(incident_key) = incident_key {
            fields.insert("incidentKey".to_string(), json!(incident_key));
        }
        batch.upsert(FLOW_NODE_INSTANCE_INDEX, id.clone(), merged(&document, &fields), fields);

        let flag = flag_fields(&id, true);
        batch.upsert_with_routing(
            LIST_VIEW_INDEX,
            id.clone(),
            json!({"id": id, "incident": true}),
            flag,
            routing_pi.to_string(),
        );
        Ok(true)
    }

    async fn revert_process_instance(&self, key: i64, batch: &mut BatchRequest) -> Result<()> {
        let id = key.to_string();
        let Some(document) = self.load(PROCESS_INSTANCE_INDEX, &id, batch).await? else {
            return Ok(());
        };
        if string_field(&document, "state") != "INCIDENT" {
            return Ok(());
        }

        let restored = document
            .get("preIncidentState")
            .and_then(Value::as_str)
            .unwrap_or("ACTIVE")
            .to_string();
        let mut fields = Map::new();
        fields.insert("state".to_string(), json!(restored));
        fields.insert("preIncidentState".to_string(), Value::Null);
        batch.upsert(PROCESS_INSTANCE_INDEX, id.clone(), merged(&document, &fields), fields);

        let flag = flag_fields(&id, false);
        batch.upsert(LIST_VIEW_INDEX, id.clone(), json!({"id": id, "incident": false}), flag);
        Ok(())
    }

    async fn revert_flow_node(
        &self,
        key: i64,
        routing_pi: i64,
        clear_incident_key: bool,
        batch: &mut BatchRequest,
    ) -> Result<()> {
        let id = key.to_string();
        let Some(document) = self.load(FLOW_NODE_INSTANCE_INDEX, &id, batch).await? else {
            return Ok(());
        };
        if string_field(&document, "state") != "INCIDENT" {
            return Ok(());
        }

        let restored = document
            .get("preIncidentState")
            .and_then(Value::as_str)
            .unwrap_or("ACTIVE")
            .to_string();
        let mut fields = Map::new();
        fields.insert("state".to_string(), json!(restored));
        fields.insert("preIncidentState".to_string(), Value::Null);
        if clear_incident_key {
            fields.insert("incidentKey".to_string(), Value::Null);
        }
        batch.upsert(FLOW_NODE_INSTANCE_INDEX, id.clone(), merged(&document, &fields), fields);

        let flag = flag_fields(&id, false);
        batch.upsert_with_routing(
            LIST_VIEW_INDEX,
            id.clone(),
            json!({"id": id, "incident": false}),
            flag,
            routing_pi.to_string(),
        );
        Ok(())
    }
}

/// Latest full document written for (index, id) earlier in this pass's
/// batch, if any.
fn pending_write(batch: &BatchRequest, index: &str, id: &str) -> Option<Value> {
    batch
        .operations()
        .iter()
        .rev()
        .find(|op| op.index() == index && op.id() == id)
        .and_then(|op| match op {
            BatchOperation::Add { document, .. }
            | BatchOperation::Upsert { document, .. }
            | BatchOperation::UpsertWithRouting { document, .. } => Some(document.clone()),
            BatchOperation::Delete { .. } => None,
        })
}

fn string_field(document: &Value, field: &str) -> String {
    document
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Existing document with the upsert's field map already applied, used as
/// the create-if-absent fallback.
fn merged(document: &Value, fields: &Map<String, Value>) -> Value {
    let mut merged = document.clone();
    if let Some(object) = merged.as_object_mut() {
        for (name, value) in fields {
            object.insert(name.clone(), value.clone());
        }
    }
    merged
}

fn flag_fields(id: &str, incident: bool) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("id".to_string(), json!(id));
    fields.insert("incident".to_string(), json!(incident));
    fields
}
