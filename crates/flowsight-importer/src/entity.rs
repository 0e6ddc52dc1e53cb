// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Materialized entities written to the document store.
//!
//! All entities serialize as camelCase JSON documents. Handlers own disjoint
//! sets of fields per document; concurrent partial updates are merged by the
//! store, never re-read-then-rewritten by the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{ElementType, IncidentErrorType, IncidentIntent, ValueType};

/// Index holding process instance summaries.
pub const PROCESS_INSTANCE_INDEX: &str = "process-instance";
/// Index holding the flow node instance tree.
pub const FLOW_NODE_INSTANCE_INDEX: &str = "flow-node-instance";
/// Index holding incident records.
pub const INCIDENT_INDEX: &str = "incident";
/// Index holding variable snapshots.
pub const VARIABLE_INDEX: &str = "variable";
/// Index holding decision instances.
pub const DECISION_INSTANCE_INDEX: &str = "decision-instance";
/// Append-only index of taken sequence flows.
pub const SEQUENCE_FLOW_INDEX: &str = "sequence-flow";
/// Denormalized per-process-instance list view.
pub const LIST_VIEW_INDEX: &str = "list-view";
/// Secondary work queue for incident propagation.
pub const POST_IMPORTER_QUEUE_INDEX: &str = "post-importer-queue";
/// Per-(partition, value-type) import watermarks.
pub const IMPORT_POSITION_INDEX: &str = "import-position";

/// Process instance lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessInstanceState {
    /// Instance is executing.
    #[default]
    Active,
    /// Instance completed.
    Completed,
    /// Instance was canceled.
    Canceled,
    /// Instance carries at least one active incident.
    Incident,
}

/// Flow node instance lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowNodeState {
    /// Element scope is executing.
    #[default]
    Active,
    /// Element scope completed.
    Completed,
    /// Element scope was terminated.
    Terminated,
    /// Element scope carries (or is an ancestor of) an active incident.
    Incident,
}

/// Incident states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentState {
    /// Incident is open.
    #[default]
    Active,
    /// Incident was resolved; the record is preserved for history.
    Resolved,
}

/// Decision instance states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionInstanceState {
    /// Evaluation succeeded.
    #[default]
    Evaluated,
    /// Evaluation failed.
    Failed,
}

/// Materialized process instance summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstanceEntity {
    /// Document id (the instance key).
    pub id: String,
    /// Engine-assigned instance key.
    pub key: i64,
    /// Partition the instance's records arrive on.
    pub partition_id: i32,
    /// Key of the deployed process definition.
    pub process_definition_key: i64,
    /// BPMN process id of the definition.
    pub bpmn_process_id: String,
    /// Version of the deployed process definition.
    pub version: i32,
    /// Tenant owning the instance.
    pub tenant_id: String,
    /// Lifecycle state.
    pub state: ProcessInstanceState,
    /// When the instance started.
    pub start_date: Option<DateTime<Utc>>,
    /// When the instance ended.
    pub end_date: Option<DateTime<Utc>>,
    /// Calling process instance for call-activity children.
    pub parent_process_instance_key: Option<i64>,
    /// Calling call-activity element instance for call-activity children.
    pub parent_flow_node_instance_key: Option<i64>,
    /// Hierarchy path; `PI_<key>` for root instances.
    pub tree_path: String,
    /// State to restore when the last incident beneath resolves.
    pub pre_incident_state: Option<ProcessInstanceState>,
}

impl ProcessInstanceEntity {
    /// Fresh zero-value entity stamped with its id.
    pub fn new(id: String) -> Self {
        Self {
            id,
            key: 0,
            partition_id: 0,
            process_definition_key: 0,
            bpmn_process_id: String::new(),
            version: 0,
            tenant_id: String::new(),
            state: ProcessInstanceState::Active,
            start_date: None,
            end_date: None,
            parent_process_instance_key: None,
            parent_flow_node_instance_key: None,
            tree_path: String::new(),
            pre_incident_state: None,
        }
    }
}

/// Materialized flow node instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNodeInstanceEntity {
    /// Document id (the element instance key).
    pub id: String,
    /// Engine-assigned element instance key.
    pub key: i64,
    /// Owning process instance.
    pub process_instance_key: i64,
    /// Key of the deployed process definition.
    pub process_definition_key: i64,
    /// BPMN element id.
    pub flow_node_id: String,
    /// BPMN element type.
    pub flow_node_type: Option<ElementType>,
    /// Tenant owning the instance.
    pub tenant_id: String,
    /// Lifecycle state.
    pub state: FlowNodeState,
    /// When the element scope was entered.
    pub start_date: Option<DateTime<Utc>>,
    /// When the element scope ended.
    pub end_date: Option<DateTime<Utc>>,
    /// Incident held directly by this element instance.
    pub incident_key: Option<i64>,
    /// Hierarchy path: parent scope's path + `/` + this instance's key.
    pub tree_path: String,
    /// Depth in the execution tree; the root scope is level 0.
    pub level: u32,
    /// State to restore when the last incident beneath resolves.
    pub pre_incident_state: Option<FlowNodeState>,
}

impl FlowNodeInstanceEntity {
    /// Fresh zero-value entity stamped with its id.
    pub fn new(id: String) -> Self {
        Self {
            id,
            key: 0,
            process_instance_key: 0,
            process_definition_key: 0,
            flow_node_id: String::new(),
            flow_node_type: None,
            tenant_id: String::new(),
            state: FlowNodeState::Active,
            start_date: None,
            end_date: None,
            incident_key: None,
            tree_path: String::new(),
            level: 0,
            pre_incident_state: None,
        }
    }
}

/// Materialized incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentEntity {
    /// Document id (the incident key).
    pub id: String,
    /// Engine-assigned incident key.
    pub key: i64,
    /// Owning process instance.
    pub process_instance_key: i64,
    /// BPMN element id the incident occurred on.
    pub flow_node_id: String,
    /// Element instance the incident occurred on.
    pub flow_node_instance_key: i64,
    /// Failing job, when the incident came from a job.
    pub job_key: Option<i64>,
    /// Engine-classified error type.
    pub error_type: IncidentErrorType,
    /// Error message, trimmed of leading/trailing whitespace.
    pub error_message: String,
    /// Incident state.
    pub state: IncidentState,
    /// When the incident was raised.
    pub creation_time: Option<DateTime<Utc>>,
    /// Tree path of the owning flow node instance; propagation queries
    /// prefix-match against it.
    pub tree_path: String,
    /// Tenant owning the instance.
    pub tenant_id: String,
}

impl IncidentEntity {
    /// Fresh zero-value entity stamped with its id.
    pub fn new(id: String) -> Self {
        Self {
            id,
            key: 0,
            process_instance_key: 0,
            flow_node_id: String::new(),
            flow_node_instance_key: 0,
            job_key: None,
            error_type: IncidentErrorType::JobNoRetries,
            error_message: String::new(),
            state: IncidentState::Active,
            creation_time: None,
            tree_path: String::new(),
            tenant_id: String::new(),
        }
    }
}

/// Materialized variable snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableEntity {
    /// Document id (`<scopeKey>-<name>`).
    pub id: String,
    /// Engine-assigned variable key.
    pub key: i64,
    /// Scope owning the variable's visibility.
    pub scope_key: i64,
    /// Owning process instance.
    pub process_instance_key: i64,
    /// Variable name.
    pub name: String,
    /// Stored value; a bounded preview when the serialized value exceeds
    /// the configured threshold.
    pub value: String,
    /// Whether `value` is a truncated preview.
    pub is_preview: bool,
    /// Full value, populated only when `value` is a preview.
    pub full_value: Option<String>,
    /// Source record position; replays rewrite identical values.
    pub position: i64,
    /// Tenant owning the instance.
    pub tenant_id: String,
}

impl VariableEntity {
    /// Fresh zero-value entity stamped with its id.
    pub fn new(id: String) -> Self {
        Self {
            id,
            key: 0,
            scope_key: 0,
            process_instance_key: 0,
            name: String::new(),
            value: String::new(),
            is_preview: false,
            full_value: None,
            position: 0,
            tenant_id: String::new(),
        }
    }
}

/// Materialized decision instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionInstanceEntity {
    /// Document id (`<recordKey>-<evaluationIndex>`).
    pub id: String,
    /// Engine-assigned evaluation key.
    pub key: i64,
    /// Evaluation outcome.
    pub state: DecisionInstanceState,
    /// Decision id from the DMN model.
    pub decision_id: String,
    /// Decision name from the DMN model.
    pub decision_name: String,
    /// Key of the deployed decision requirements graph.
    pub decision_requirements_key: i64,
    /// Serialized evaluation output.
    pub result: Option<String>,
    /// Why the evaluation failed.
    pub evaluation_failure: Option<String>,
    /// Owning process instance.
    pub process_instance_key: i64,
    /// Element instance that triggered the evaluation.
    pub flow_node_instance_key: i64,
    /// When the evaluation happened.
    pub evaluation_date: Option<DateTime<Utc>>,
    /// Tenant owning the instance.
    pub tenant_id: String,
}

impl DecisionInstanceEntity {
    /// Fresh zero-value entity stamped with its id.
    pub fn new(id: String) -> Self {
        Self {
            id,
            key: 0,
            state: DecisionInstanceState::Evaluated,
            decision_id: String::new(),
            decision_name: String::new(),
            decision_requirements_key: 0,
            result: None,
            evaluation_failure: None,
            process_instance_key: 0,
            flow_node_instance_key: 0,
            evaluation_date: None,
            tenant_id: String::new(),
        }
    }
}

/// Append-only record of a taken sequence flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceFlowEntity {
    /// Document id (`<processInstanceKey>_<elementId>`).
    pub id: String,
    /// Owning process instance.
    pub process_instance_key: i64,
    /// BPMN id of the sequence flow.
    pub activity_id: String,
    /// Tenant owning the instance.
    pub tenant_id: String,
}

impl SequenceFlowEntity {
    /// Fresh zero-value entity stamped with its id.
    pub fn new(id: String) -> Self {
        Self {
            id,
            process_instance_key: 0,
            activity_id: String::new(),
            tenant_id: String::new(),
        }
    }
}

/// Join relation of the list view's process instance row.
pub const JOIN_PROCESS_INSTANCE: &str = "processInstance";
/// Join relation of list view activity rows.
pub const JOIN_ACTIVITY: &str = "activity";
/// Join relation of list view variable rows.
pub const JOIN_VARIABLE: &str = "variable";

/// List view process instance row.
///
/// Deserializes with defaults because the incident propagator may create
/// the row with only its own fields before the primary import fills it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListViewProcessInstance {
    /// Document id (the instance key).
    pub id: String,
    /// Engine-assigned instance key.
    pub key: i64,
    /// Partition the instance's records arrive on.
    pub partition_id: i32,
    /// Key of the deployed process definition.
    pub process_definition_key: i64,
    /// BPMN process id of the definition.
    pub bpmn_process_id: String,
    /// Version of the deployed process definition.
    pub version: i32,
    /// Tenant owning the instance.
    pub tenant_id: String,
    /// Lifecycle state.
    pub state: ProcessInstanceState,
    /// When the instance started.
    pub start_date: Option<DateTime<Utc>>,
    /// When the instance ended.
    pub end_date: Option<DateTime<Utc>>,
    /// Whether an active incident exists anywhere in the instance.
    pub incident: bool,
    /// Parent/child discriminator for join queries.
    pub join_relation: String,
}

impl Default for ListViewProcessInstance {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl ListViewProcessInstance {
    /// Fresh zero-value row stamped with its id.
    pub fn new(id: String) -> Self {
        Self {
            id,
            key: 0,
            partition_id: 0,
            process_definition_key: 0,
            bpmn_process_id: String::new(),
            version: 0,
            tenant_id: String::new(),
            state: ProcessInstanceState::Active,
            start_date: None,
            end_date: None,
            incident: false,
            join_relation: JOIN_PROCESS_INSTANCE.to_string(),
        }
    }
}

/// List view activity row, routed to its owning process instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListViewActivity {
    /// Document id (the element instance key).
    pub id: String,
    /// Engine-assigned element instance key.
    pub key: i64,
    /// Owning process instance (also the routing key).
    pub process_instance_key: i64,
    /// BPMN element id.
    pub activity_id: String,
    /// BPMN element type.
    pub activity_type: Option<ElementType>,
    /// Lifecycle state.
    pub activity_state: FlowNodeState,
    /// Whether this activity holds or is an ancestor of an active incident.
    pub incident: bool,
    /// Error message of the incident held directly by this activity.
    pub error_message: Option<String>,
    /// Whether a job failed here with retries left.
    pub job_failed_with_retries_left: bool,
    /// Parent/child discriminator for join queries.
    pub join_relation: String,
}

impl Default for ListViewActivity {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl ListViewActivity {
    /// Fresh zero-value row stamped with its id.
    pub fn new(id: String) -> Self {
        Self {
            id,
            key: 0,
            process_instance_key: 0,
            activity_id: String::new(),
            activity_type: None,
            activity_state: FlowNodeState::Active,
            incident: false,
            error_message: None,
            job_failed_with_retries_left: false,
            join_relation: JOIN_ACTIVITY.to_string(),
        }
    }
}

/// List view variable row, routed to its owning process instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListViewVariable {
    /// Document id (`<scopeKey>-<name>`).
    pub id: String,
    /// Engine-assigned variable key.
    pub key: i64,
    /// Owning process instance (also the routing key).
    pub process_instance_key: i64,
    /// Scope owning the variable's visibility.
    pub scope_key: i64,
    /// Variable name.
    pub var_name: String,
    /// Variable value (preview-truncated like the variable index).
    pub var_value: String,
    /// Parent/child discriminator for join queries.
    pub join_relation: String,
}

impl Default for ListViewVariable {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl ListViewVariable {
    /// Fresh zero-value row stamped with its id.
    pub fn new(id: String) -> Self {
        Self {
            id,
            key: 0,
            process_instance_key: 0,
            scope_key: 0,
            var_name: String::new(),
            var_value: String::new(),
            join_relation: JOIN_VARIABLE.to_string(),
        }
    }
}

/// Secondary work item for incident propagation.
///
/// Created per incident intent transition during the primary import,
/// consumed and deleted by the post-import pass once the cycle's primary
/// records are durable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostImporterQueueEntity {
    /// Document id (`<partition>-<position>`).
    pub id: String,
    /// Incident key the entry refers to.
    pub key: i64,
    /// Incident intent that triggered the entry.
    pub intent: IncidentIntent,
    /// Partition of the triggering record.
    pub partition_id: i32,
    /// Position of the triggering record.
    pub position: i64,
    /// Owning process instance.
    pub process_instance_key: i64,
}

impl PostImporterQueueEntity {
    /// Fresh zero-value entity stamped with its id.
    pub fn new(id: String) -> Self {
        Self {
            id,
            key: 0,
            intent: IncidentIntent::Created,
            partition_id: 0,
            position: 0,
            process_instance_key: 0,
        }
    }
}

/// Per-(partition, value-type) import watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPositionEntity {
    /// Document id (`<partition>-<valueType>`).
    pub id: String,
    /// Partition the watermark belongs to.
    pub partition_id: i32,
    /// Value type the watermark belongs to.
    pub value_type: ValueType,
    /// Last durably applied record position.
    pub position: i64,
}
