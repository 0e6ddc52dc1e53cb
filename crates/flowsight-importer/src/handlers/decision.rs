// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Decision instances from evaluation records.

use async_trait::async_trait;
use flowsight_store::BatchRequest;

use crate::entity::{DecisionInstanceEntity, DecisionInstanceState, DECISION_INSTANCE_INDEX};
use crate::error::Result;
use crate::handler::{document_of, ImportContext, ImportHandler};
use crate::record::{DecisionIntent, Record, RecordValue, ValueType};

/// Materializes one [`DecisionInstanceEntity`] per evaluation record.
///
/// Evaluations are immutable once written, so the flush is an add. The id
/// carries an evaluation index suffix; a single evaluation per record means
/// it is always `-1`.
pub struct DecisionInstanceHandler;

#[async_trait]
impl ImportHandler for DecisionInstanceHandler {
    type Entity = DecisionInstanceEntity;

    fn value_type(&self) -> ValueType {
        ValueType::Decision
    }

    fn index_name(&self) -> &'static str {
        DECISION_INSTANCE_INDEX
    }

    fn handles_record(&self, _record: &Record) -> bool {
        true
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        vec![format!("{}-1", record.key)]
    }

    fn create_new_entity(&self, id: String) -> Self::Entity {
        DecisionInstanceEntity::new(id)
    }

    async fn update_entity(
        &self,
        _ctx: &mut ImportContext<'_>,
        record: &Record,
        entity: &mut Self::Entity,
    ) -> Result<()> {
        let RecordValue::Decision(value) = &record.value else {
            return Ok(());
        };

        entity.key = record.key;
        entity.decision_id = value.decision_id.clone();
        entity.decision_name = value.decision_name.clone();
        entity.decision_requirements_key = value.decision_requirements_key;
        entity.result = value.result.clone();
        entity.evaluation_failure = value.evaluation_failure_message.clone();
        entity.process_instance_key = value.process_instance_key;
        entity.flow_node_instance_key = value.flow_node_instance_key;
        entity.evaluation_date = Some(record.timestamp);
        entity.tenant_id = value.tenant_id.clone();
        entity.state = match value.intent {
            DecisionIntent::Evaluated => DecisionInstanceState::Evaluated,
            DecisionIntent::Failed => DecisionInstanceState::Failed,
        };

        Ok(())
    }

    fn flush(&self, entity: Self::Entity, batch: &mut BatchRequest) -> Result<()> {
        let id = entity.id.clone();
        batch.add(DECISION_INSTANCE_INDEX, id, document_of(&entity)?);
        Ok(())
    }
}
