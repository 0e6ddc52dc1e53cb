// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Handler contract and registry.
//!
//! Each record-to-entity transformer implements [`ImportHandler`]:
//! deterministic id generation, load-or-create, an idempotent mutation, and
//! a flush declaration. A blanket dispatch wrapper erases the entity type
//! behind the object-safe [`RecordHandler`], and [`HandlerRegistry`] routes
//! records by value type plus a per-handler predicate - a lookup and a
//! predicate call, no inheritance.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use flowsight_store::{BatchOperation, BatchRequest, DocumentStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::config::ImporterConfig;
use crate::error::{ImportError, Result};
use crate::record::{Record, ValueType};
use crate::tree_path::TreePathCache;

/// Shared per-cycle state passed to handlers.
///
/// The tree path cache is fresh each flush cycle; no entity state is kept
/// across cycles.
pub struct ImportContext<'a> {
    /// Document store, read-only for handlers (writes go through the batch).
    pub store: &'a dyn DocumentStore,
    /// Scope key to tree path cache for this cycle.
    pub tree_paths: &'a mut TreePathCache,
    /// Importer configuration (thresholds).
    pub config: &'a ImporterConfig,
}

/// Contract every record-to-entity transformer implements.
///
/// `generate_ids` must be pure and deterministic given only the record -
/// that is what makes replay idempotent. `update_entity` must not depend on
/// previously observed records beyond what is already stored in the entity
/// it is given.
#[async_trait]
pub trait ImportHandler: Send + Sync {
    /// Entity this handler materializes.
    type Entity: Serialize + DeserializeOwned + Send;

    /// Record value type this handler consumes.
    fn value_type(&self) -> ValueType;

    /// Index the entity is written to.
    fn index_name(&self) -> &'static str;

    /// Whether this handler applies to the record (may filter by intent or
    /// payload sub-fields).
    fn handles_record(&self, record: &Record) -> bool;

    /// Deterministic entity id(s) for the record. Usually one; zero when
    /// the record addresses a scope this handler does not materialize.
    fn generate_ids(&self, record: &Record) -> Vec<String>;

    /// Fresh zero-value entity stamped with its id.
    fn create_new_entity(&self, id: String) -> Self::Entity;

    /// Apply the record to the entity. Applying the same record twice must
    /// produce the same entity state.
    async fn update_entity(
        &self,
        ctx: &mut ImportContext<'_>,
        record: &Record,
        entity: &mut Self::Entity,
    ) -> Result<()>;

    /// Declare the flush operation (add / upsert / routed upsert) for the
    /// mutated entity.
    fn flush(&self, entity: Self::Entity, batch: &mut BatchRequest) -> Result<()>;
}

/// Object-safe dispatch interface over [`ImportHandler`].
#[async_trait]
pub trait RecordHandler: Send + Sync {
    /// Record value type this handler consumes.
    fn value_type(&self) -> ValueType;

    /// Whether this handler applies to the record.
    fn handles_record(&self, record: &Record) -> bool;

    /// Load-or-create, mutate, and declare the flush for the record.
    async fn handle(
        &self,
        ctx: &mut ImportContext<'_>,
        record: &Record,
        batch: &mut BatchRequest,
    ) -> Result<()>;
}

/// Blanket dispatch wrapper implementing load-or-create around a concrete
/// handler.
struct Dispatch<H>(H);

#[async_trait]
impl<H: ImportHandler> RecordHandler for Dispatch<H> {
    fn value_type(&self) -> ValueType {
        self.0.value_type()
    }

    fn handles_record(&self, record: &Record) -> bool {
        self.0.handles_record(record)
    }

    async fn handle(
        &self,
        ctx: &mut ImportContext<'_>,
        record: &Record,
        batch: &mut BatchRequest,
    ) -> Result<()> {
        let index = self.0.index_name();
        for id in self.0.generate_ids(record) {
            // An earlier record in this cycle may have flushed the same
            // entity; the store won't see that write until the batch lands,
            // so the batch itself is the freshest source
            let document = match pending_document(batch, index, &id) {
                Some(document) => Some(document),
                None => ctx.store.get(index, &id).await?,
            };
            let mut entity = match document {
                Some(document) => serde_json::from_value(document)?,
                None => self.0.create_new_entity(id),
            };
            self.0.update_entity(ctx, record, &mut entity).await?;
            self.0.flush(entity, batch)?;
        }
        Ok(())
    }
}

/// Latest full document flushed for (index, id) earlier in this cycle's
/// batch, if any.
fn pending_document(batch: &BatchRequest, index: &str, id: &str) -> Option<Value> {
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

/// Registry of handlers keyed by record value type.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ValueType, Vec<Arc<dyn RecordHandler>>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its value type.
    pub fn register<H: ImportHandler + 'static>(&mut self, handler: H) {
        self.handlers
            .entry(handler.value_type())
            .or_default()
            .push(Arc::new(Dispatch(handler)));
    }

    /// Handlers registered for a value type.
    pub fn handlers_for(&self, value_type: ValueType) -> &[Arc<dyn RecordHandler>] {
        self.handlers
            .get(&value_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Value types with at least one registered handler, in scheduling
    /// order.
    pub fn value_types(&self) -> Vec<ValueType> {
        ValueType::ALL
            .into_iter()
            .filter(|vt| self.handlers.contains_key(vt))
            .collect()
    }

    /// Route one record to all matching handlers.
    ///
    /// A store or source failure aborts the cycle; any other handler error
    /// is logged and skips the record for that handler only, never for the
    /// whole batch.
    pub async fn import_record(
        &self,
        ctx: &mut ImportContext<'_>,
        record: &Record,
        batch: &mut BatchRequest,
    ) -> Result<()> {
        for handler in self.handlers_for(record.value_type()) {
            if !handler.handles_record(record) {
                continue;
            }
            if let Err(e) = handler.handle(ctx, record, batch).await {
                if e.is_cycle_failure() {
                    return Err(e);
                }
                warn!(
                    partition_id = record.partition_id,
                    position = record.position,
                    value_type = %record.value_type(),
                    error = %e,
                    "Handler skipped record"
                );
            }
        }
        Ok(())
    }
}

/// Pick the named fields from an entity's serialized form.
///
/// Upserting a field map (instead of the whole document) is what lets
/// handlers owning different fields of the same document commute.
pub fn owned_fields<T: Serialize>(entity: &T, names: &[&str]) -> Result<Map<String, Value>> {
    let value = serde_json::to_value(entity)?;
    let object = value.as_object().ok_or_else(|| {
        ImportError::Other("entity did not serialize to a JSON object".to_string())
    })?;
    Ok(names
        .iter()
        .filter_map(|name| {
            object
                .get(*name)
                .map(|v| (name.to_string(), v.clone()))
        })
        .collect())
}

/// Serialize an entity into its full document form.
pub fn document_of<T: Serialize>(entity: &T) -> Result<Value> {
    Ok(serde_json::to_value(entity)?)
}
