// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Append-only log of taken sequence flows.

use async_trait::async_trait;
use flowsight_store::BatchRequest;

use crate::entity::{SequenceFlowEntity, SEQUENCE_FLOW_INDEX};
use crate::error::Result;
use crate::handler::{document_of, ImportContext, ImportHandler};
use crate::record::{ProcessInstanceIntent, Record, RecordValue, ValueType};

/// Records every taken sequence flow once per (instance, flow) pair.
pub struct SequenceFlowHandler;

#[async_trait]
impl ImportHandler for SequenceFlowHandler {
    type Entity = SequenceFlowEntity;

    fn value_type(&self) -> ValueType {
        ValueType::ProcessInstance
    }

    fn index_name(&self) -> &'static str {
        SEQUENCE_FLOW_INDEX
    }

    fn handles_record(&self, record: &Record) -> bool {
        matches!(
            &record.value,
            RecordValue::ProcessInstance(v)
                if v.intent == ProcessInstanceIntent::SequenceFlowTaken
        )
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        match &record.value {
            RecordValue::ProcessInstance(v) => {
                vec![format!("{}_{}", v.process_instance_key, v.element_id)]
            }
            _ => Vec::new(),
        }
    }

    fn create_new_entity(&self, id: String) -> Self::Entity {
        SequenceFlowEntity::new(id)
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
        entity.process_instance_key = value.process_instance_key;
        entity.activity_id = value.element_id.clone();
        entity.tenant_id = value.tenant_id.clone();
        Ok(())
    }

    fn flush(&self, entity: Self::Entity, batch: &mut BatchRequest) -> Result<()> {
        // Add, not upsert: a replayed duplicate is a no-op in the store
        let id = entity.id.clone();
        batch.add(SEQUENCE_FLOW_INDEX, id, document_of(&entity)?);
        Ok(())
    }
}
