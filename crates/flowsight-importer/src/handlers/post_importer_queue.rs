// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Work queue entries feeding the incident propagation pass.

use async_trait::async_trait;
use flowsight_store::BatchRequest;

use crate::entity::{PostImporterQueueEntity, POST_IMPORTER_QUEUE_INDEX};
use crate::error::Result;
use crate::handler::{document_of, ImportContext, ImportHandler};
use crate::record::{Record, RecordValue, ValueType};

/// Enqueues one propagation work item per incident intent transition.
///
/// The id is `<partition>-<position>`, so a replayed record maps to the same
/// entry and the add becomes a no-op. Entries are deleted by the propagator
/// once applied.
pub struct PostImporterQueueHandler;

#[async_trait]
impl ImportHandler for PostImporterQueueHandler {
    type Entity = PostImporterQueueEntity;

    fn value_type(&self) -> ValueType {
        ValueType::Incident
    }

    fn index_name(&self) -> &'static str {
        POST_IMPORTER_QUEUE_INDEX
    }

    fn handles_record(&self, _record: &Record) -> bool {
        true
    }

    fn generate_ids(&self, record: &Record) -> Vec<String> {
        vec![format!("{}-{}", record.partition_id, record.position)]
    }

    fn create_new_entity(&self, id: String) -> Self::Entity {
        PostImporterQueueEntity::new(id)
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
        entity.key = record.key;
        entity.intent = value.intent;
        entity.partition_id = record.partition_id;
        entity.position = record.position;
        entity.process_instance_key = value.process_instance_key;
        Ok(())
    }

    fn flush(&self, entity: Self::Entity, batch: &mut BatchRequest) -> Result<()> {
        let id = entity.id.clone();
        batch.add(POST_IMPORTER_QUEUE_INDEX, id, document_of(&entity)?);
        Ok(())
    }
}
