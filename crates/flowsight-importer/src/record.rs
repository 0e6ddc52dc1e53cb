// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Record model for the upstream engine's exported event log.
//!
//! The log is pull-style and replayable: a partition's records carry
//! monotonically increasing positions and the same range can be re-fetched.
//! Each record is an envelope (partition, position, key, timestamp) around
//! a type-specific payload.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record value types the importer consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    /// Process/element lifecycle records (activation, completion, ...).
    ProcessInstance,
    /// Incident creation and resolution records.
    Incident,
    /// Variable creation and update records.
    Variable,
    /// Decision evaluation records.
    Decision,
    /// Job lifecycle records.
    Job,
}

impl ValueType {
    /// All value types, in scheduling order.
    pub const ALL: [ValueType; 5] = [
        ValueType::ProcessInstance,
        ValueType::Incident,
        ValueType::Variable,
        ValueType::Decision,
        ValueType::Job,
    ];

    /// Stable lowercase name, used in watermark document ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessInstance => "process-instance",
            Self::Incident => "incident",
            Self::Variable => "variable",
            Self::Decision => "decision",
            Self::Job => "job",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// BPMN element types carried by process instance records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    /// The process-level scope itself.
    Process,
    /// Embedded subprocess scope.
    SubProcess,
    /// Multi-instance body scope (its per-iteration children nest below it).
    MultiInstanceBody,
    /// Service task.
    ServiceTask,
    /// User task.
    UserTask,
    /// Call activity (spawns a child process instance).
    CallActivity,
    /// Parallel gateway.
    ParallelGateway,
    /// Exclusive gateway.
    ExclusiveGateway,
    /// Start event.
    StartEvent,
    /// End event.
    EndEvent,
    /// Boundary event.
    BoundaryEvent,
    /// Sequence flow (only seen with the `SequenceFlowTaken` intent).
    SequenceFlow,
}

/// Intents of process instance records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessInstanceIntent {
    /// Element scope is being entered.
    ElementActivating,
    /// Element scope is active.
    ElementActivated,
    /// Element scope completed.
    ElementCompleted,
    /// Element scope was terminated.
    ElementTerminated,
    /// A sequence flow was taken.
    SequenceFlowTaken,
}

/// Intents of incident records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentIntent {
    /// Incident raised.
    Created,
    /// Incident resolved.
    Resolved,
}

/// Intents of variable records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableIntent {
    /// Variable created in its scope.
    Created,
    /// Variable value updated.
    Updated,
}

/// Intents of decision evaluation records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionIntent {
    /// Decision evaluated successfully.
    Evaluated,
    /// Decision evaluation failed.
    Failed,
}

/// Intents of job records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobIntent {
    /// Job created for a service task.
    Created,
    /// Job completed by a worker.
    Completed,
    /// Job failed (may leave retries).
    Failed,
}

/// Engine-reported incident error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentErrorType {
    /// A job ran out of retries.
    JobNoRetries,
    /// An expression could not be evaluated.
    ExtractValueError,
    /// Input/output mapping failed.
    IoMappingError,
    /// An error event had no catching handler.
    UnhandledErrorEvent,
    /// A called process could not be created.
    CallActivityError,
    /// A gateway condition could not be evaluated.
    ConditionError,
}

/// Payload of process instance records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstanceRecordValue {
    /// State transition this record reports.
    pub intent: ProcessInstanceIntent,
    /// BPMN element id.
    pub element_id: String,
    /// BPMN element type.
    pub element_type: ElementType,
    /// BPMN process id of the definition.
    pub bpmn_process_id: String,
    /// Key of the deployed process definition.
    pub process_definition_key: i64,
    /// Version of the deployed process definition.
    pub version: i32,
    /// Tenant owning the instance.
    pub tenant_id: String,
    /// Key of the owning process instance.
    pub process_instance_key: i64,
    /// Key of the directly enclosing scope; `None` for the process scope.
    pub flow_scope_key: Option<i64>,
    /// Calling process instance for call-activity children.
    pub parent_process_instance_key: Option<i64>,
    /// Calling call-activity element instance for call-activity children.
    pub parent_element_instance_key: Option<i64>,
}

/// Payload of incident records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecordValue {
    /// State transition this record reports.
    pub intent: IncidentIntent,
    /// Engine-classified error type.
    pub error_type: IncidentErrorType,
    /// Raw error message (may carry surrounding whitespace).
    pub error_message: String,
    /// BPMN element id the incident occurred on.
    pub flow_node_id: String,
    /// Element instance the incident occurred on.
    pub flow_node_instance_key: i64,
    /// Failing job, when the incident came from a job.
    pub job_key: Option<i64>,
    /// Owning process instance.
    pub process_instance_key: i64,
    /// Key of the deployed process definition.
    pub process_definition_key: i64,
    /// BPMN process id of the definition.
    pub bpmn_process_id: String,
    /// Tenant owning the instance.
    pub tenant_id: String,
}

/// Payload of variable records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecordValue {
    /// State transition this record reports.
    pub intent: VariableIntent,
    /// Variable name.
    pub name: String,
    /// Serialized variable value.
    pub value: String,
    /// Scope owning the variable's visibility (element or process instance).
    pub scope_key: i64,
    /// Owning process instance.
    pub process_instance_key: i64,
    /// Key of the deployed process definition.
    pub process_definition_key: i64,
    /// BPMN process id of the definition.
    pub bpmn_process_id: String,
    /// Tenant owning the instance.
    pub tenant_id: String,
}

/// Payload of decision evaluation records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecordValue {
    /// State transition this record reports.
    pub intent: DecisionIntent,
    /// Decision id from the DMN model.
    pub decision_id: String,
    /// Decision name from the DMN model.
    pub decision_name: String,
    /// Key of the deployed decision.
    pub decision_key: i64,
    /// Key of the deployed decision requirements graph.
    pub decision_requirements_key: i64,
    /// Serialized evaluation output (absent on failure).
    pub result: Option<String>,
    /// Why the evaluation failed (absent on success).
    pub evaluation_failure_message: Option<String>,
    /// Owning process instance.
    pub process_instance_key: i64,
    /// Element instance that triggered the evaluation.
    pub flow_node_instance_key: i64,
    /// Tenant owning the instance.
    pub tenant_id: String,
}

/// Payload of job records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecordValue {
    /// State transition this record reports.
    pub intent: JobIntent,
    /// Job type (worker subscription key).
    pub job_type: String,
    /// Retries left after this transition.
    pub retries: i32,
    /// Element instance the job belongs to.
    pub element_instance_key: i64,
    /// Owning process instance.
    pub process_instance_key: i64,
    /// Worker-reported error message on failure.
    pub error_message: Option<String>,
}

/// Type-specific record payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordValue {
    /// Process/element lifecycle payload.
    ProcessInstance(ProcessInstanceRecordValue),
    /// Incident payload.
    Incident(IncidentRecordValue),
    /// Variable payload.
    Variable(VariableRecordValue),
    /// Decision evaluation payload.
    Decision(DecisionRecordValue),
    /// Job payload.
    Job(JobRecordValue),
}

/// One record of the partitioned event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Partition the record was written to.
    pub partition_id: i32,
    /// Monotonically increasing position within the partition.
    pub position: i64,
    /// Engine-assigned key of the subject entity.
    pub key: i64,
    /// Wall-clock time the engine wrote the record.
    pub timestamp: DateTime<Utc>,
    /// Type-specific payload.
    pub value: RecordValue,
}

impl Record {
    /// Value type of the payload.
    pub fn value_type(&self) -> ValueType {
        match &self.value {
            RecordValue::ProcessInstance(_) => ValueType::ProcessInstance,
            RecordValue::Incident(_) => ValueType::Incident,
            RecordValue::Variable(_) => ValueType::Variable,
            RecordValue::Decision(_) => ValueType::Decision,
            RecordValue::Job(_) => ValueType::Job,
        }
    }
}
