// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for flowsight-importer integration tests.
//!
//! Provides a TestContext bundling an in-memory log, an in-memory store,
//! and a fully registered scheduler, plus record builders.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use flowsight_store::MemoryDocumentStore;

use flowsight_importer::config::ImporterConfig;
use flowsight_importer::handler::HandlerRegistry;
use flowsight_importer::handlers;
use flowsight_importer::partition::{PartitionHolder, PartitionSource};
use flowsight_importer::reader::MemoryLog;
use flowsight_importer::record::{
    DecisionIntent, DecisionRecordValue, ElementType, IncidentErrorType, IncidentIntent,
    IncidentRecordValue, JobIntent, JobRecordValue, ProcessInstanceIntent,
    ProcessInstanceRecordValue, Record, RecordValue, ValueType, VariableIntent,
    VariableRecordValue,
};
use flowsight_importer::scheduler::ImportScheduler;

/// Partition source answering with a fixed set.
pub struct FixedPartitions(pub BTreeSet<i32>);

#[async_trait]
impl PartitionSource for FixedPartitions {
    async fn partition_ids(&self) -> Option<BTreeSet<i32>> {
        Some(self.0.clone())
    }
}

/// Test context bundling log, store, and scheduler.
pub struct TestContext {
    pub log: Arc<MemoryLog>,
    pub store: Arc<MemoryDocumentStore>,
    pub scheduler: ImportScheduler,
    pub config: ImporterConfig,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(fast_config())
    }

    pub fn with_config(config: ImporterConfig) -> Self {
        init_tracing();
        let log = Arc::new(MemoryLog::new());
        let store = Arc::new(MemoryDocumentStore::new());
        let mut registry = HandlerRegistry::new();
        handlers::register_defaults(&mut registry);
        let topology = Arc::new(FixedPartitions(BTreeSet::from([1])));
        let partitions = Arc::new(PartitionHolder::new(
            topology.clone(),
            topology,
            config.clone(),
        ));
        let scheduler = ImportScheduler::new(
            log.clone(),
            store.clone(),
            Arc::new(registry),
            partitions,
            config.clone(),
        );
        Self {
            log,
            store,
            scheduler,
            config,
        }
    }

    /// Run import cycles for every value type until the partition is fully
    /// drained.
    pub async fn drain(&self, partition_id: i32) {
        loop {
            let mut applied = 0;
            for value_type in ValueType::ALL {
                applied += self
                    .scheduler
                    .import_cycle(partition_id, value_type)
                    .await
                    .unwrap();
            }
            if applied == 0 {
                break;
            }
        }
    }
}

pub fn fast_config() -> ImporterConfig {
    ImporterConfig {
        flush_retry_delay: Duration::from_millis(1),
        partition_retry_delay: Duration::from_millis(1),
        idle_delay: Duration::from_millis(5),
        ..ImporterConfig::default()
    }
}

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Process-scope lifecycle record.
pub fn process_record(position: i64, pik: i64, intent: ProcessInstanceIntent) -> Record {
    Record {
        partition_id: 1,
        position,
        key: pik,
        timestamp: Utc::now(),
        value: RecordValue::ProcessInstance(ProcessInstanceRecordValue {
            intent,
            element_id: "order-process".to_string(),
            element_type: ElementType::Process,
            bpmn_process_id: "order-process".to_string(),
            process_definition_key: 7,
            version: 1,
            tenant_id: "default".to_string(),
            process_instance_key: pik,
            flow_scope_key: None,
            parent_process_instance_key: None,
            parent_element_instance_key: None,
        }),
    }
}

/// Element-scope lifecycle record nested under `flow_scope_key`.
pub fn flow_node_record(
    position: i64,
    key: i64,
    pik: i64,
    flow_scope_key: i64,
    element_type: ElementType,
    intent: ProcessInstanceIntent,
) -> Record {
    Record {
        partition_id: 1,
        position,
        key,
        timestamp: Utc::now(),
        value: RecordValue::ProcessInstance(ProcessInstanceRecordValue {
            intent,
            element_id: format!("element-{key}"),
            element_type,
            bpmn_process_id: "order-process".to_string(),
            process_definition_key: 7,
            version: 1,
            tenant_id: "default".to_string(),
            process_instance_key: pik,
            flow_scope_key: Some(flow_scope_key),
            parent_process_instance_key: None,
            parent_element_instance_key: None,
        }),
    }
}

/// Sequence-flow-taken record.
pub fn sequence_flow_record(position: i64, pik: i64, element_id: &str) -> Record {
    Record {
        partition_id: 1,
        position,
        key: position,
        timestamp: Utc::now(),
        value: RecordValue::ProcessInstance(ProcessInstanceRecordValue {
            intent: ProcessInstanceIntent::SequenceFlowTaken,
            element_id: element_id.to_string(),
            element_type: ElementType::SequenceFlow,
            bpmn_process_id: "order-process".to_string(),
            process_definition_key: 7,
            version: 1,
            tenant_id: "default".to_string(),
            process_instance_key: pik,
            flow_scope_key: Some(pik),
            parent_process_instance_key: None,
            parent_element_instance_key: None,
        }),
    }
}

/// Incident record on a flow node instance.
pub fn incident_record(
    position: i64,
    key: i64,
    fni_key: i64,
    pik: i64,
    intent: IncidentIntent,
    error_message: &str,
) -> Record {
    Record {
        partition_id: 1,
        position,
        key,
        timestamp: Utc::now(),
        value: RecordValue::Incident(IncidentRecordValue {
            intent,
            error_type: IncidentErrorType::JobNoRetries,
            error_message: error_message.to_string(),
            flow_node_id: format!("element-{fni_key}"),
            flow_node_instance_key: fni_key,
            job_key: None,
            process_instance_key: pik,
            process_definition_key: 7,
            bpmn_process_id: "order-process".to_string(),
            tenant_id: "default".to_string(),
        }),
    }
}

/// Variable record in a scope.
pub fn variable_record(
    position: i64,
    scope_key: i64,
    pik: i64,
    name: &str,
    value: &str,
) -> Record {
    Record {
        partition_id: 1,
        position,
        key: position,
        timestamp: Utc::now(),
        value: RecordValue::Variable(VariableRecordValue {
            intent: VariableIntent::Created,
            name: name.to_string(),
            value: value.to_string(),
            scope_key,
            process_instance_key: pik,
            process_definition_key: 7,
            bpmn_process_id: "order-process".to_string(),
            tenant_id: "default".to_string(),
        }),
    }
}

/// Decision evaluation record.
pub fn decision_record(position: i64, key: i64, pik: i64, intent: DecisionIntent) -> Record {
    Record {
        partition_id: 1,
        position,
        key,
        timestamp: Utc::now(),
        value: RecordValue::Decision(DecisionRecordValue {
            intent,
            decision_id: "approve-order".to_string(),
            decision_name: "Approve order".to_string(),
            decision_key: 40,
            decision_requirements_key: 41,
            result: matches!(intent, DecisionIntent::Evaluated)
                .then(|| "\"approved\"".to_string()),
            evaluation_failure_message: matches!(intent, DecisionIntent::Failed)
                .then(|| "missing input".to_string()),
            process_instance_key: pik,
            flow_node_instance_key: 300,
            tenant_id: "default".to_string(),
        }),
    }
}

/// Job lifecycle record on an element instance.
pub fn job_record(
    position: i64,
    element_instance_key: i64,
    pik: i64,
    intent: JobIntent,
    retries: i32,
) -> Record {
    Record {
        partition_id: 1,
        position,
        key: position,
        timestamp: Utc::now(),
        value: RecordValue::Job(JobRecordValue {
            intent,
            job_type: "charge".to_string(),
            retries,
            element_instance_key,
            process_instance_key: pik,
            error_message: matches!(intent, JobIntent::Failed).then(|| "charge failed".to_string()),
        }),
    }
}
