// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process instance summaries from process-level lifecycle records.

use async_trait::async_trait;
use flowsight_store::BatchRequest;

use crate::entity::{ProcessInstanceEntity, ProcessInstanceState, PROCESS_INSTANCE_INDEX};
use crate::handler::{document_of, owned_fields, ImportContext, ImportHandler};
use crate::record::{
    ElementType, ProcessInstanceIntent, Record, RecordValue, ValueType,
};
use crate::tree_path;
use crate::error::Result;

/// Fields this handler owns on the process instance document.
///
/// `preIncidentState` (and `state` flips to INCIDENT) belong to the
/// incident propagator.
const OWNED_FIELDS: &[&str] = &[
    "id",
    "key",
    "partitionId",
    "processDefinitionKey",
    "bpmnProcessId",
    "version",
    "tenantId",
    "state",
    "startDate",
    "endDate",
    "parentProcessInstanceKey",
    "parentFlowNodeInstanceKey",
    "treePath",
];

/// Materializes [`ProcessInstanceEntity`] documents from lifecycle records
/// of the process-level scope.
pub struct ProcessInstanceHandler;

#[async_trait]
impl ImportHandler for ProcessInstanceHandler {
    type Entity = ProcessInstanceEntity;

    fn value_type(&self) -> ValueType {
        ValueType::ProcessInstance
    }

    fn index_name(&self) -> &'static str {
        PROCESS_INSTANCE_INDEX
    }

    fn handles_record(&self, record: &Record) -> bool {
        matches!(
            &record.value,
            RecordValue::ProcessInstance(v)
                if v.element_type == ElementType::Process
                    && v.intent != ProcessInstanceIntent::SequenceFlowTaken
        )
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::ProcessInstance(v) => vec![v.process_instance_key.to_string()],
            _ => Vec::new(),
        }
    }

    fn create_new_entity(&self, id: String) -> Self::Entity {
        ProcessInstanceEntity::new(id)
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

        entity.key = value.process_instance_key;
        entity.partition_id = record.partition_id;
        entity.process_definition_key = value.process_definition_key;
        entity.bpmn_process_id = value.bpmn_process_id.clone();
        entity.version = value.version;
        entity.tenant_id = value.tenant_id.clone();
        entity.parent_process_instance_key = value.parent_process_instance_key;
        entity.parent_flow_node_instance_key = value.parent_element_instance_key;

        if entity.tree_path.is_empty() {
            entity.tree_path = self.build_tree_path(ctx, value).await?;
        }

        match value.intent {
            ProcessInstanceIntent::ElementActivating
            | ProcessInstanceIntent::ElementActivated => {
                entity.state = ProcessInstanceState::Active;
                entity.start_date.get_or_insert(record.timestamp);
            }
            ProcessInstanceIntent::ElementCompleted => {
                entity.state = ProcessInstanceState::Completed;
                entity.end_date = Some(record.timestamp);
            }
            ProcessInstanceIntent::ElementTerminated => {
                entity.state = ProcessInstanceState::Canceled;
                entity.end_date = Some(record.timestamp);
            }
            ProcessInstanceIntent::SequenceFlowTaken => {}
        }

        Ok(())
    }

    fn flush(&self, entity: Self::Entity, batch: &mut BatchRequest) -> Result<()> {
        let fields = owned_fields(&entity, OWNED_FIELDS)?;
        let id = entity.id.clone();
        batch.upsert(PROCESS_INSTANCE_INDEX, id, document_of(&entity)?, fields);
        Ok(())
    }
}

impl ProcessInstanceHandler {
    /// Root instances get `PI_<key>`; call-activity children extend the
    /// calling element instance's path with `/PI_<key>`.
    async fn build_tree_path(
        &self,
        ctx: &mut ImportContext<'_>,
        value: &crate::record::ProcessInstanceRecordValue,
    ) -> Result<String> {
        let own = tree_path::process_instance_path(value.process_instance_key);
        let Some(parent_fni) = value.parent_element_instance_key else {
            return Ok(own);
        };

        // The calling element may have been materialized earlier in this
        // same cycle, in which case only the cache has its path
        if let Some(parent_path) = ctx.tree_paths.get(parent_fni) {
            return Ok(format!("{parent_path}/{own}"));
        }

        let parent = ctx
            .store
            .get(crate::entity::FLOW_NODE_INSTANCE_INDEX, &parent_fni.to_string())
            .await?;
        Ok(parent
            .as_ref()
            .and_then(|doc| doc.get("treePath"))
            .and_then(serde_json::Value::as_str)
            .map(|parent_path| format!("{parent_path}/{own}"))
            .unwrap_or(own))
    }
}
