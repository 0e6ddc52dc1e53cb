// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Incident propagation through the full import pipeline.

mod common;

use common::*;
use flowsight_importer::entity::{
    FLOW_NODE_INSTANCE_INDEX, INCIDENT_INDEX, LIST_VIEW_INDEX, POST_IMPORTER_QUEUE_INDEX,
    PROCESS_INSTANCE_INDEX,
};
use flowsight_importer::record::{ElementType, IncidentIntent, ProcessInstanceIntent, ValueType};
use flowsight_store::{DocumentStore, Filter};
use serde_json::json;

/// PI 100 > subprocess 200 > tasks 300 and 310.
async fn seed_tree(ctx: &TestContext) {
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
            flow_node_record(
                4,
                310,
                100,
                200,
                ElementType::UserTask,
                ProcessInstanceIntent::ElementActivating,
            ),
        ])
        .await;
}

async fn state_of(ctx: &TestContext, index: &str, id: &str) -> String {
    let doc = ctx.store.get(index, id).await.unwrap().unwrap();
    doc["state"].as_str().unwrap_or_default().to_string()
}

async fn lv_incident(ctx: &TestContext, id: &str) -> bool {
    let doc = ctx.store.get(LIST_VIEW_INDEX, id).await.unwrap().unwrap();
    doc["incident"].as_bool().unwrap()
}

#[tokio::test]
async fn test_incident_marks_and_resolution_reverts_three_levels() {
    let ctx = TestContext::new();
    seed_tree(&ctx).await;
    ctx.log
        .append_all([incident_record(10, 500, 300, 100, IncidentIntent::Created, "boom")])
        .await;
    ctx.drain(1).await;

    assert_eq!(state_of(&ctx, PROCESS_INSTANCE_INDEX, "100").await, "INCIDENT");
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "200").await, "INCIDENT");
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "300").await, "INCIDENT");
    // Siblings off the path are untouched
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "310").await, "ACTIVE");
    assert!(lv_incident(&ctx, "100").await);
    assert!(lv_incident(&ctx, "200").await);
    assert!(lv_incident(&ctx, "300").await);
    assert!(!lv_incident(&ctx, "310").await);

    let owner = ctx
        .store
        .get(FLOW_NODE_INSTANCE_INDEX, "300")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner["incidentKey"], json!(500));
    // List view activity row carries the trimmed error message
    let row = ctx.store.get(LIST_VIEW_INDEX, "300").await.unwrap().unwrap();
    assert_eq!(row["errorMessage"], "boom");

    ctx.log
        .append_all([incident_record(11, 500, 300, 100, IncidentIntent::Resolved, "boom")])
        .await;
    ctx.drain(1).await;

    assert_eq!(state_of(&ctx, PROCESS_INSTANCE_INDEX, "100").await, "ACTIVE");
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "200").await, "ACTIVE");
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "300").await, "ACTIVE");
    assert!(!lv_incident(&ctx, "100").await);
    assert!(!lv_incident(&ctx, "300").await);

    // The incident document survives as history
    assert_eq!(state_of(&ctx, INCIDENT_INDEX, "500").await, "RESOLVED");
    // The queue is drained
    let remaining = ctx
        .store
        .search(POST_IMPORTER_QUEUE_INDEX, &Filter::All)
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn test_sibling_incident_keeps_shared_ancestors_marked() {
    let ctx = TestContext::new();
    seed_tree(&ctx).await;
    ctx.log
        .append_all([
            incident_record(10, 500, 300, 100, IncidentIntent::Created, "boom"),
            incident_record(11, 501, 310, 100, IncidentIntent::Created, "kaput"),
        ])
        .await;
    ctx.drain(1).await;

    ctx.log
        .append_all([incident_record(12, 500, 300, 100, IncidentIntent::Resolved, "boom")])
        .await;
    ctx.drain(1).await;

    // 300 reverts, the shared subprocess and root stay marked for 501
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "300").await, "ACTIVE");
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "310").await, "INCIDENT");
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "200").await, "INCIDENT");
    assert_eq!(state_of(&ctx, PROCESS_INSTANCE_INDEX, "100").await, "INCIDENT");

    ctx.log
        .append_all([incident_record(13, 501, 310, 100, IncidentIntent::Resolved, "kaput")])
        .await;
    ctx.drain(1).await;

    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "310").await, "ACTIVE");
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "200").await, "ACTIVE");
    assert_eq!(state_of(&ctx, PROCESS_INSTANCE_INDEX, "100").await, "ACTIVE");
}

#[tokio::test]
async fn test_completed_scope_reverts_to_its_pre_incident_state() {
    let ctx = TestContext::new();
    seed_tree(&ctx).await;
    ctx.drain(1).await;

    // Subprocess completes, then an incident lands on a retry of task 300
    ctx.log
        .append_all([
            flow_node_record(
                5,
                200,
                100,
                100,
                ElementType::SubProcess,
                ProcessInstanceIntent::ElementCompleted,
            ),
        ])
        .await;
    ctx.drain(1).await;
    ctx.log
        .append_all([incident_record(10, 500, 300, 100, IncidentIntent::Created, "boom")])
        .await;
    ctx.drain(1).await;
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "200").await, "INCIDENT");

    ctx.log
        .append_all([incident_record(11, 500, 300, 100, IncidentIntent::Resolved, "boom")])
        .await;
    ctx.drain(1).await;

    // The subprocess restores COMPLETED, not ACTIVE
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "200").await, "COMPLETED");
    let doc = ctx
        .store
        .get(FLOW_NODE_INSTANCE_INDEX, "200")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc["preIncidentState"], json!(null));
}

#[tokio::test]
async fn test_incident_stream_arriving_first_converges() {
    let ctx = TestContext::new();
    // The incident value-type stream is imported before any lifecycle
    // records exist
    ctx.log
        .append_all([incident_record(10, 500, 300, 100, IncidentIntent::Created, "boom")])
        .await;
    ctx.scheduler.import_cycle(1, ValueType::Incident).await.unwrap();

    // The queue entry waits for the tree
    let remaining = ctx
        .store
        .search(POST_IMPORTER_QUEUE_INDEX, &Filter::All)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);

    seed_tree(&ctx).await;
    ctx.drain(1).await;

    assert_eq!(state_of(&ctx, PROCESS_INSTANCE_INDEX, "100").await, "INCIDENT");
    // The intermediate subprocess is marked too: the owner's real path is
    // resolved at propagation time, not guessed at import time
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "200").await, "INCIDENT");
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "300").await, "INCIDENT");
    let incident = ctx.store.get(INCIDENT_INDEX, "500").await.unwrap().unwrap();
    assert_eq!(incident["treePath"], "PI_100/200/300");
    let remaining = ctx
        .store
        .search(POST_IMPORTER_QUEUE_INDEX, &Filter::All)
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn test_created_and_resolved_in_one_cycle_converge_to_active() {
    let ctx = TestContext::new();
    seed_tree(&ctx).await;
    ctx.drain(1).await;

    // Both incident transitions land in a single import cycle
    ctx.log
        .append_all([
            incident_record(10, 500, 300, 100, IncidentIntent::Created, "boom"),
            incident_record(11, 500, 300, 100, IncidentIntent::Resolved, "boom"),
        ])
        .await;
    ctx.drain(1).await;

    assert_eq!(state_of(&ctx, PROCESS_INSTANCE_INDEX, "100").await, "ACTIVE");
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "200").await, "ACTIVE");
    assert_eq!(state_of(&ctx, FLOW_NODE_INSTANCE_INDEX, "300").await, "ACTIVE");
    assert!(!lv_incident(&ctx, "100").await);
    assert!(!lv_incident(&ctx, "300").await);
    assert_eq!(state_of(&ctx, INCIDENT_INDEX, "500").await, "RESOLVED");
    let remaining = ctx
        .store
        .search(POST_IMPORTER_QUEUE_INDEX, &Filter::All)
        .await
        .unwrap();
    assert!(remaining.is_empty());
}
