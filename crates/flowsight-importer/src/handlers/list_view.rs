// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Denormalized list view: one parent row per process instance plus routed
//! activity and variable child rows.
//!
//! Several handlers write disjoint field sets of the same activity row
//! (state from lifecycle records, error message from incident records, job
//! flags from job records). Partial-field upserts are what keep those
//! writes commutative; the `incident` flags themselves belong to the
//! propagation pass.

use async_trait::async_trait;
use flowsight_store::BatchRequest;

use crate::entity::{
    ListViewActivity, ListViewProcessInstance, ListViewVariable, FlowNodeState,
    ProcessInstanceState, LIST_VIEW_INDEX,
};
use crate::error::Result;
use crate::handler::{document_of, owned_fields, ImportContext, ImportHandler};
use crate::record::{
    ElementType, JobIntent, ProcessInstanceIntent, Record, RecordValue, ValueType,
};

/// Fields of the parent row owned by lifecycle records; the `incident`
/// flag belongs to the propagator.
const PROCESS_INSTANCE_FIELDS: &[&str] = &[
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
    "joinRelation",
];

/// Activity row fields owned by lifecycle records.
const ACTIVITY_FIELDS: &[&str] = &[
    "id",
    "key",
    "processInstanceKey",
    "activityId",
    "activityType",
    "activityState",
    "joinRelation",
];

/// Activity row fields owned by incident records.
const ACTIVITY_INCIDENT_FIELDS: &[&str] =
    &["id", "processInstanceKey", "errorMessage", "joinRelation"];

/// Activity row fields owned by job records.
const ACTIVITY_JOB_FIELDS: &[&str] =
    &["id", "processInstanceKey", "jobFailedWithRetriesLeft", "joinRelation"];

/// Parent row of the list view, one per process instance.
pub struct ListViewProcessInstanceHandler;

#[async_trait]
impl ImportHandler for ListViewProcessInstanceHandler {
    type Entity = ListViewProcessInstance;

    fn value_type(&self) -> ValueType {
        ValueType::ProcessInstance
    }

    fn index_name(&self) -> &'static str {
        LIST_VIEW_INDEX
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
        ListViewProcessInstance::new(id)
    }

    async fn update_entity(
        &self,
        _ctx: &mut ImportContext<'_>,
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
        let fields = owned_fields(&entity, PROCESS_INSTANCE_FIELDS)?;
        let id = entity.id.clone();
        batch.upsert(LIST_VIEW_INDEX, id, document_of(&entity)?, fields);
        Ok(())
    }
}

/// Activity child row lifecycle fields, routed to the parent instance.
pub struct ListViewFlowNodeHandler;

#[async_trait]
impl ImportHandler for ListViewFlowNodeHandler {
    type Entity = ListViewActivity;

    fn value_type(&self) -> ValueType {
        ValueType::ProcessInstance
    }

    fn index_name(&self) -> &'static str {
        LIST_VIEW_INDEX
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
        ListViewActivity::new(id)
    }

    async fn update_entity(
        &self,
        _ctx: &mut ImportContext<'_>,
        record: &Record,
        entity: &mut Self::Entity,
    ) -> Result<()> {
        let RecordValue::ProcessInstance(value) = &record.value else {
            return Ok(());
        };

        entity.key = record.key;
        entity.process_instance_key = value.process_instance_key;
        entity.activity_id = value.element_id.clone();
        entity.activity_type = Some(value.element_type);

        match value.intent {
            ProcessInstanceIntent::ElementActivating
            | ProcessInstanceIntent::ElementActivated => {
                entity.activity_state = FlowNodeState::Active;
            }
            ProcessInstanceIntent::ElementCompleted => {
                entity.activity_state = FlowNodeState::Completed;
            }
            ProcessInstanceIntent::ElementTerminated => {
                entity.activity_state = FlowNodeState::Terminated;
            }
            ProcessInstanceIntent::SequenceFlowTaken => {}
        }

        Ok(())
    }

    fn flush(&self, entity: Self::Entity, batch: &mut BatchRequest) -> Result<()> {
        let fields = owned_fields(&entity, ACTIVITY_FIELDS)?;
        let id = entity.id.clone();
        let routing = entity.process_instance_key.to_string();
        batch.upsert_with_routing(LIST_VIEW_INDEX, id, document_of(&entity)?, fields, routing);
        Ok(())
    }
}

/// Error message field of the activity row, fed by incident records.
pub struct ListViewIncidentHandler;

#[async_trait]
impl ImportHandler for ListViewIncidentHandler {
    type Entity = ListViewActivity;

    fn value_type(&self) -> ValueType {
        ValueType::Incident
    }

    fn index_name(&self) -> &'static str {
        LIST_VIEW_INDEX
    }

    fn handles_record(&self, _record: &Record) -> bool {
        true
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::Incident(v) => vec![v.flow_node_instance_key.to_string()],
            _ => Vec::new(),
        }
    }

    fn create_new_entity(&self, id: String) -> Self::Entity {
        ListViewActivity::new(id)
    }

    async fn update_entity(
        &self,
        _ctx: &mut ImportContext<'_>,
        record: &Record,
        entity: &mut Self::Entity,
    ) -> Result<()> {
        let RecordValue::Incident(value) = &record.value else {
            return Ok(());
        };
        entity.process_instance_key = value.process_instance_key;
        entity.error_message = match value.intent {
            crate::record::IncidentIntent::Created => {
                Some(value.error_message.trim().to_string())
            }
            crate::record::IncidentIntent::Resolved => None,
        };
        Ok(())
    }

    fn flush(&self, entity: Self::Entity, batch: &mut BatchRequest) -> Result<()> {
        let fields = owned_fields(&entity, ACTIVITY_INCIDENT_FIELDS)?;
        let id = entity.id.clone();
        let routing = entity.process_instance_key.to_string();
        batch.upsert_with_routing(LIST_VIEW_INDEX, id, document_of(&entity)?, fields, routing);
        Ok(())
    }
}

/// Variable child rows, routed to the parent instance.
pub struct ListViewVariableHandler;

#[async_trait]
impl ImportHandler for ListViewVariableHandler {
    type Entity = ListViewVariable;

    fn value_type(&self) -> ValueType {
        ValueType::Variable
    }

    fn index_name(&self) -> &'static str {
        LIST_VIEW_INDEX
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
        ListViewVariable::new(id)
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
        entity.process_instance_key = value.process_instance_key;
        entity.scope_key = value.scope_key;
        entity.var_name = value.name.clone();
        entity.var_value = if value.value.chars().count() > ctx.config.variable_preview_size {
            value.value.chars().take(ctx.config.variable_preview_size).collect()
        } else {
            value.value.clone()
        };
        Ok(())
    }

    fn flush(&self, entity: Self::Entity, batch: &mut BatchRequest) -> Result<()> {
        let fields = owned_fields(
            &entity,
            &["id", "key", "processInstanceKey", "scopeKey", "varName", "varValue", "joinRelation"],
        )?;
        let id = entity.id.clone();
        let routing = entity.process_instance_key.to_string();
        batch.upsert_with_routing(LIST_VIEW_INDEX, id, document_of(&entity)?, fields, routing);
        Ok(())
    }
}

/// Job failure flag of the activity row, fed by job records.
pub struct ListViewJobHandler;

#[async_trait]
impl ImportHandler for ListViewJobHandler {
    type Entity = ListViewActivity;

    fn value_type(&self) -> ValueType {
        ValueType::Job
    }

    fn index_name(&self) -> &'static str {
        LIST_VIEW_INDEX
    }

    fn handles_record(&self, _record: &Record) -> bool {
        true
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::Job(v) => vec![v.element_instance_key.to_string()],
            _ => Vec::new(),
        }
    }

    fn create_new_entity(&self, id: String) -> Self::Entity {
        ListViewActivity::new(id)
    }

    async fn update_entity(
        &self,
        _ctx: &mut ImportContext<'_>,
        record: &Record,
        entity: &mut Self::Entity,
    ) -> Result<()> {
        let RecordValue::Job(value) = &record.value else {
            return Ok(());
        };
        entity.process_instance_key = value.process_instance_key;
        entity.job_failed_with_retries_left =
            value.intent == JobIntent::Failed && value.retries > 0;
        Ok(())
    }

    fn flush(&self, entity: Self::Entity, batch: &mut BatchRequest) -> Result<()> {
        let fields = owned_fields(&entity, ACTIVITY_JOB_FIELDS)?;
        let id = entity.id.clone();
        let routing = entity.process_instance_key.to_string();
        batch.upsert_with_routing(LIST_VIEW_INDEX, id, document_of(&entity)?, fields, routing);
        Ok(())
    }
}
