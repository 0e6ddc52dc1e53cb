// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Concrete record-to-entity handlers, one per (record value type, entity)
//! pair.

pub mod decision;
pub mod flow_node_instance;
pub mod incident;
pub mod list_view;
pub mod post_importer_queue;
pub mod process_instance;
pub mod sequence_flow;
pub mod variable;

pub use self::decision::DecisionInstanceHandler;
pub use self::flow_node_instance::FlowNodeInstanceHandler;
pub use self::incident::IncidentHandler;
pub use self::list_view::{
    ListViewFlowNodeHandler, ListViewIncidentHandler, ListViewJobHandler,
    ListViewProcessInstanceHandler, ListViewVariableHandler,
};
pub use self::post_importer_queue::PostImporterQueueHandler;
pub use self::process_instance::ProcessInstanceHandler;
pub use self::sequence_flow::SequenceFlowHandler;
pub use self::variable::VariableHandler;

use crate::handler::HandlerRegistry;

/// Register the full default handler set.
pub fn register_defaults(registry: &mut HandlerRegistry) {
    registry.register(ProcessInstanceHandler);
    registry.register(FlowNodeInstanceHandler);
    registry.register(SequenceFlowHandler);
    registry.register(IncidentHandler);
    registry.register(PostImporterQueueHandler);
    registry.register(VariableHandler);
    registry.register(DecisionInstanceHandler);
    registry.register(ListViewProcessInstanceHandler);
    registry.register(ListViewFlowNodeHandler);
    registry.register(ListViewIncidentHandler);
    registry.register(ListViewVariableHandler);
    registry.register(ListViewJobHandler);
}
