// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Incident documents from incident records.

use async_trait::async_trait;
use flowsight_store::BatchRequest;
use serde_json::Value;

use crate::entity::{IncidentEntity, IncidentState, FLOW_NODE_INSTANCE_INDEX, INCIDENT_INDEX};
use crate::error::Result;
use crate::handler::{document_of, owned_fields, ImportContext, ImportHandler};
use crate::record::{IncidentIntent, Record, RecordValue, ValueType};

/// Fields this handler owns on the incident document. The whole document,
/// in this case; the propagator only reads incidents.
const OWNED_FIELDS: &[&str] = &[
    "id",
    "key",
    "processInstanceKey",
    "flowNodeId",
    "flowNodeInstanceKey",
    "jobKey",
    "errorType",
    "errorMessage",
    "state",
    "creationTime",
    "treePath",
    "tenantId",
];

/// Materializes [`IncidentEntity`] documents. Resolved incidents are kept
/// with state RESOLVED, never deleted.
pub struct IncidentHandler;

#[async_trait]
impl ImportHandler for IncidentHandler {
    type Entity = IncidentEntity;

    fn value_type(&self) -> ValueType {
        ValueType::Incident
    }

    fn index_name(&self) -> &'static str {
        INCIDENT_INDEX
    }

    fn handles_record(&self, _record: &Record) -> bool {
        true
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        vec![record.key.to_string()]
    }

    fn create_new_entity(&self, id: String) -> Self::Entity {
        IncidentEntity::new(id)
    }

    async fn update_entity(
        &self,
        ctx: &mut ImportContext<'_>,
        record: &Record,
        entity: &mut Self::Entity,
    ) -> Result<()> {
        let RecordValue::Incident(value) = &record.value else {
            return Ok(());
        };

        entity.key = record.key;
        entity.process_instance_key = value.process_instance_key;
        entity.flow_node_id = value.flow_node_id.clone();
        entity.flow_node_instance_key = value.flow_node_instance_key;
        entity.job_key = value.job_key;
        entity.error_type = value.error_type;
        entity.error_message = value.error_message.trim().to_string();
        entity.tenant_id = value.tenant_id.clone();

        if let Some(path) = self.owner_tree_path(ctx, value).await? {
            entity.tree_path = path;
        }

        match value.intent {
            IncidentIntent::Created => {
                entity.state = IncidentState::Active;
                entity.creation_time.get_or_insert(record.timestamp);
            }
            IncidentIntent::Resolved => {
                entity.state = IncidentState::Resolved;
            }
        }

        Ok(())
    }

    fn flush(&self, entity: Self::Entity, batch: &mut BatchRequest) -> Result<()> {
        let fields = owned_fields(&entity, OWNED_FIELDS)?;
        let id = entity.id.clone();
        batch.upsert(INCIDENT_INDEX, id, document_of(&entity)?, fields);
        Ok(())
    }
}

impl IncidentHandler {
    /// Tree path of the owning flow node instance, read back from the store.
    /// `None` while the owner has not been imported yet; the propagator
    /// resolves and backfills the path once the owner exists, so the entity
    /// never carries a guessed path that would hide intermediate ancestors.
    async fn owner_tree_path(
        &self,
        ctx: &mut ImportContext<'_>,
        value: &crate::record::IncidentRecordValue,
    ) -> Result<Option<String>> {
        let owner = ctx
            .store
            .get(
                FLOW_NODE_INSTANCE_INDEX,
                &value.flow_node_instance_key.to_string(),
            )
            .await?;
        Ok(owner
            .as_ref()
            .and_then(|doc| doc.get("treePath"))
            .and_then(Value::as_str)
            .filter(|path| !path.is_empty())
            .map(str::to_string))
    }
}
