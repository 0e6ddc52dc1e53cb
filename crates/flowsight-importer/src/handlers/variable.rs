// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Variable snapshots keyed by scope and name.

use async_trait::async_trait;
use flowsight_store::BatchRequest;

use crate::entity::{VariableEntity, VARIABLE_INDEX};
use crate::error::Result;
use crate::handler::{document_of, owned_fields, ImportContext, ImportHandler};
use crate::record::{Record, RecordValue, ValueType};

const OWNED_FIELDS: &[&str] = &[
    "id",
    "key",
    "scopeKey",
    "processInstanceKey",
    "name",
    "value",
    "isPreview",
    "fullValue",
    "position",
    "tenantId",
];

/// Materializes one [`VariableEntity`] per (scope, name) pair; updates to
/// the same pair overwrite in place. Values above the configured preview
/// threshold are truncated with the full value kept alongside.
pub struct VariableHandler;

#[async_trait]
impl ImportHandler for VariableHandler {
    type Entity = VariableEntity;

    fn value_type(&self) -> ValueType {
        ValueType::Variable
    }

    fn index_name(&self) -> &'static str {
        VARIABLE_INDEX
    }

    fn handles_record(&self, _record: &Record) -> bool {
        true
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::Variable(v) => vec![format!("{}-{}", v.scope_key, v.name)],
            _ => Vec::new(),
        }
    }

    fn create_new_entity(&self, id: String) -> Self::Entity {
        VariableEntity::new(id)
    }

    async fn update_entity(
        &self,
        ctx: &mut ImportContext<'_>,
        record: &Record,
        entity: &mut Self::Entity,
    ) -> Result<()> {
        let RecordValue::Variable(value) = &record.value else {
            return Ok(());
        };

        entity.key = record.key;
        entity.scope_key = value.scope_key;
        entity.process_instance_key = value.process_instance_key;
        entity.name = value.name.clone();
        entity.tenant_id = value.tenant_id.clone();
        entity.position = record.position;

        let threshold = ctx.config.variable_preview_size;
        if value.value.chars().count() > threshold {
            entity.value = value.value.chars().take(threshold).collect();
            entity.is_preview = true;
            entity.full_value = Some(value.value.clone());
        } else {
            entity.value = value.value.clone();
            entity.is_preview = false;
            entity.full_value = None;
        }

        Ok(())
    }

    fn flush(&self, entity: Self::Entity, batch: &mut BatchRequest) -> Result<()> {
        let fields = owned_fields(&entity, OWNED_FIELDS)?;
        let id = entity.id.clone();
        batch.upsert(VARIABLE_INDEX, id, document_of(&entity)?, fields);
        Ok(())
    }
}
