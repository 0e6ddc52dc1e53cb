// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end import of a process instance's record stream.

mod common;

use common::*;
use flowsight_importer::entity::{
    DECISION_INSTANCE_INDEX, FLOW_NODE_INSTANCE_INDEX, IMPORT_POSITION_INDEX, LIST_VIEW_INDEX,
    PROCESS_INSTANCE_INDEX, SEQUENCE_FLOW_INDEX, VARIABLE_INDEX,
};
use flowsight_importer::record::{DecisionIntent, ElementType, ProcessInstanceIntent};
use flowsight_store::{BatchRequest, DocumentStore, Filter};

async fn seed_order_process(ctx: &TestContext) {
    ctx.log
        .append_all([
            process_record(1, 100, ProcessInstanceIntent::ElementActivating),
            flow_node_record(
                2,
                200,
                100,
                100,
                ElementType::SubProcess,
                ProcessInstanceIntent::ElementActivating,
            ),
            flow_node_record(
                3,
                300,
                100,
                200,
                ElementType::ServiceTask,
                ProcessInstanceIntent::ElementActivating,
            ),
            sequence_flow_record(4, 100, "flow-to-task"),
            flow_node_record(
                5,
                300,
                100,
                200,
                ElementType::ServiceTask,
                ProcessInstanceIntent::ElementCompleted,
            ),
            flow_node_record(
                6,
                200,
                100,
                100,
                ElementType::SubProcess,
                ProcessInstanceIntent::ElementCompleted,
            ),
            process_record(7, 100, ProcessInstanceIntent::ElementCompleted),
            variable_record(8, 100, 100, "order", "{\"total\":42}"),
            decision_record(9, 800, 100, DecisionIntent::Evaluated),
        ])
        .await;
}

#[tokio::test]
async fn test_full_stream_materializes_all_indexes() {
    let ctx = TestContext::new();
    seed_order_process(&ctx).await;
    ctx.drain(1).await;

    let instance = ctx
        .store
        .get(PROCESS_INSTANCE_INDEX, "100")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(instance["state"], "COMPLETED");
    assert_eq!(instance["treePath"], "PI_100");
    assert_eq!(instance["bpmnProcessId"], "order-process");
    assert!(instance["startDate"].is_string());
    assert!(instance["endDate"].is_string());

    let subprocess = ctx
        .store
        .get(FLOW_NODE_INSTANCE_INDEX, "200")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subprocess["treePath"], "PI_100/200");
    assert_eq!(subprocess["level"], 1);
    assert_eq!(subprocess["state"], "COMPLETED");

    let task = ctx
        .store
        .get(FLOW_NODE_INSTANCE_INDEX, "300")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task["treePath"], "PI_100/200/300");
    assert_eq!(task["level"], 2);
    assert_eq!(task["flowNodeType"], "SERVICE_TASK");

    let flow = ctx
        .store
        .get(SEQUENCE_FLOW_INDEX, "100_flow-to-task")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(flow["activityId"], "flow-to-task");

    let variable = ctx
        .store
        .get(VARIABLE_INDEX, "100-order")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(variable["value"], "{\"total\":42}");
    assert_eq!(variable["isPreview"], false);

    let decision = ctx
        .store
        .get(DECISION_INSTANCE_INDEX, "800-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(decision["state"], "EVALUATED");

    // List view: parent row plus routed children
    let parent = ctx.store.get(LIST_VIEW_INDEX, "100").await.unwrap().unwrap();
    assert_eq!(parent["joinRelation"], "processInstance");
    assert_eq!(parent["incident"], false);
    let activity = ctx.store.get(LIST_VIEW_INDEX, "300").await.unwrap().unwrap();
    assert_eq!(activity["joinRelation"], "activity");
    assert_eq!(activity["activityState"], "COMPLETED");
    assert_eq!(
        ctx.store.routing_of(LIST_VIEW_INDEX, "300").await,
        Some("100".to_string())
    );
    assert_eq!(
        ctx.store.routing_of(LIST_VIEW_INDEX, "100-order").await,
        Some("100".to_string())
    );
}

#[tokio::test]
async fn test_replaying_the_whole_log_changes_nothing() {
    let ctx = TestContext::new();
    seed_order_process(&ctx).await;
    ctx.drain(1).await;

    let indexes = [
        PROCESS_INSTANCE_INDEX,
        FLOW_NODE_INSTANCE_INDEX,
        SEQUENCE_FLOW_INDEX,
        VARIABLE_INDEX,
        DECISION_INSTANCE_INDEX,
        LIST_VIEW_INDEX,
    ];
    let mut snapshots = Vec::new();
    for index in indexes {
        snapshots.push(ctx.store.dump(index).await);
    }

    // Wipe the watermarks so the next drain re-reads the log from zero
    let positions = ctx
        .store
        .search(IMPORT_POSITION_INDEX, &Filter::All)
        .await
        .unwrap();
    let mut batch = BatchRequest::new();
    for doc in &positions {
        batch.delete(IMPORT_POSITION_INDEX, doc["id"].as_str().unwrap());
    }
    ctx.store.execute_batch(&batch).await.unwrap();

    ctx.drain(1).await;

    for (index, snapshot) in indexes.into_iter().zip(snapshots) {
        assert_eq!(ctx.store.dump(index).await, snapshot, "index {index} diverged");
    }
}

#[tokio::test]
async fn test_call_activity_child_instance_extends_parent_path() {
    let ctx = TestContext::new();
    // Parent instance 100 with a call activity 400, spawning child
    // instance 500 with its own task 600
    let mut child_activating = process_record(10, 500, ProcessInstanceIntent::ElementActivating);
    if let flowsight_importer::record::RecordValue::ProcessInstance(ref mut v) =
        child_activating.value
    {
        v.parent_process_instance_key = Some(100);
        v.parent_element_instance_key = Some(400);
    }
    ctx.log
        .append_all([
            process_record(1, 100, ProcessInstanceIntent::ElementActivating),
            flow_node_record(
                2,
                400,
                100,
                100,
                ElementType::CallActivity,
                ProcessInstanceIntent::ElementActivating,
            ),
            child_activating,
            flow_node_record(
                11,
                600,
                500,
                500,
                ElementType::ServiceTask,
                ProcessInstanceIntent::ElementActivating,
            ),
        ])
        .await;
    ctx.drain(1).await;

    let child = ctx
        .store
        .get(PROCESS_INSTANCE_INDEX, "500")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(child["treePath"], "PI_100/400/PI_500");
    assert_eq!(child["parentProcessInstanceKey"], 100);
    assert_eq!(child["parentFlowNodeInstanceKey"], 400);

    let task = ctx
        .store
        .get(FLOW_NODE_INSTANCE_INDEX, "600")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task["treePath"], "PI_500/600");
}

#[tokio::test]
async fn test_variable_above_threshold_is_preview_truncated() {
    let mut config = fast_config();
    config.variable_preview_size = 5;
    let ctx = TestContext::with_config(config);
    ctx.log
        .append_all([variable_record(1, 100, 100, "payload", "1234567890")])
        .await;
    ctx.drain(1).await;

    let variable = ctx
        .store
        .get(VARIABLE_INDEX, "100-payload")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(variable["value"], "12345");
    assert_eq!(variable["isPreview"], true);
    assert_eq!(variable["fullValue"], "1234567890");

    let row = ctx
        .store
        .get(LIST_VIEW_INDEX, "100-payload")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row["varValue"], "12345");
}
