// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flow node instance tree from element lifecycle records.

use async_trait::async_trait;
use flowsight_store::BatchRequest;

use crate::entity::{FlowNodeInstanceEntity, FlowNodeState, FLOW_NODE_INSTANCE_INDEX};
use crate::error::Result;
use crate::handler::{document_of, owned_fields, ImportContext, ImportHandler};
use crate::record::{ElementType, ProcessInstanceIntent, Record, RecordValue, ValueType};
use crate::tree_path;

/// Fields this handler owns on the flow node instance document.
///
/// `incidentKey`, `preIncidentState`, and INCIDENT state flips belong to
/// the incident propagator.
const OWNED_FIELDS: &[&str] = &[
    "id",
    "key",
    "processInstanceKey",
    "processDefinitionKey",
    "flowNodeId",
    "flowNodeType",
    "tenantId",
    "state",
    "startDate",
    "endDate",
    "treePath",
    "level",
];

/// Materializes [`FlowNodeInstanceEntity`] documents from lifecycle records
/// of non-process element scopes.
pub struct FlowNodeInstanceHandler;

#[async_trait]
impl ImportHandler for FlowNodeInstanceHandler {
    type Entity = FlowNodeInstanceEntity;

    fn value_type(&self) -> ValueType {
        ValueType::ProcessInstance
    }

    fn index_name(&self) -> &'static str {
        FLOW_NODE_INSTANCE_INDEX
    }

    fn handles_record(&self, record: &Record) -> bool {
        matches!(
            &record.value,
            RecordValue::ProcessInstance(v)
                if v.element_type != ElementType::Process
                    && v.element_type != ElementType::SequenceFlow
                    && v.intent != ProcessInstanceIntent::SequenceFlowTaken
        )
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        vec![record.key.to_string()]
    }

    fn create_new_entity(&self, id: String) -> Self::Entity {
        FlowNodeInstanceEntity::new(id)
    }

    async fn update_entity(
        &self,
        ctx: &mut ImportContext<'_>,
        record: &Record,
        entity: &mut Self::Entity,
    ) -> Result<()> {
        let RecordValue::ProcessInstance(value) = &record.value else {
            return Ok(());
        };

        entity.key = record.key;
        entity.process_instance_key = value.process_instance_key;
        entity.process_definition_key = value.process_definition_key;
        entity.flow_node_id = value.element_id.clone();
        entity.flow_node_type = Some(value.element_type);
        entity.tenant_id = value.tenant_id.clone();

        if entity.tree_path.is_empty() {
            entity.tree_path = ctx.tree_paths.resolve(ctx.store, value, record.key).await?;
        } else {
            // Loaded from the store; children in this cycle still need it
            ctx.tree_paths.insert(record.key, entity.tree_path.clone());
        }
        entity.level = tree_path::level_of(&entity.tree_path);

        match value.intent {
            ProcessInstanceIntent::ElementActivating
            | ProcessInstanceIntent::ElementActivated => {
                entity.state = FlowNodeState::Active;
                entity.start_date.get_or_insert(record.timestamp);
            }
            ProcessInstanceIntent::ElementCompleted => {
                entity.state = FlowNodeState::Completed;
                entity.end_date = Some(record.timestamp);
            }
            ProcessInstanceIntent::ElementTerminated => {
                entity.state = FlowNodeState::Terminated;
                entity.end_date = Some(record.timestamp);
            }
            ProcessInstanceIntent::SequenceFlowTaken => {}
        }

        Ok(())
    }

    fn flush(&self, entity: Self::Entity, batch: &mut BatchRequest) -> Result<()> {
        let fields = owned_fields(&entity, OWNED_FIELDS)?;
        let id = entity.id.clone();
        batch.upsert(FLOW_NODE_INSTANCE_INDEX, id, document_of(&entity)?, fields);
        Ok(())
    }
}
