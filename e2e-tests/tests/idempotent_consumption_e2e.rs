//! Duplicate, unknown-type, and unknown-version behavior end to end.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use event_bus::{
    subject_for, BusMessage, EventBus, InMemoryBus, TracingReporter, EVENT_ID_HEADER,
};
use event_consumer::{
    typed_handler, ConsumerConfig, ConsumerWorker, Dispatcher, DispatcherConfig,
    HandlerRegistry, InMemoryProcessedStore,
};
use event_contracts::{topics, TaskCreatedV1};
use uuid::Uuid;

async fn publish_raw(bus: &InMemoryBus, event_type: &str, key: &str, envelope: serde_json::Value) {
    let event_id = envelope["eventId"].as_str().unwrap_or_default().to_string();
    let message = BusMessage::new(
        subject_for(event_type, key),
        key,
        serde_json::to_vec(&envelope).unwrap(),
    )
    .with_header(EVENT_ID_HEADER, event_id);
    bus.publish(message).await.unwrap();
}

fn task_envelope(event_id: Uuid, version: &str, task_id: i64, title: &str) -> serde_json::Value {
    serde_json::json!({
        "eventId": event_id.to_string(),
        "eventType": "task.created",
        "sourceService": "task-service",
        "timestamp": "2026-03-01T12:00:00Z",
        "version": version,
        "data": {
            "taskId": task_id,
            "title": title,
            "userId": 7,
            "projectId": 42,
            "status": "TODO",
            "priority": "HIGH",
            "createdAt": "2026-03-01T12:00:00Z"
        }
    })
}

struct Rig {
    bus: Arc<InMemoryBus>,
    handle: event_consumer::ConsumerHandle,
    invocations: Arc<AtomicU32>,
}

async fn start_rig() -> Rig {
    let bus = Arc::new(InMemoryBus::new());
    let invocations = Arc::new(AtomicU32::new(0));

    let count = invocations.clone();
    let mut registry = HandlerRegistry::new();
    registry.register(
        topics::TASK_CREATED,
        typed_handler(move |_ctx, _task: TaskCreatedV1| {
            let count = count.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    );
    let registry = Arc::new(registry);

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(event_contracts::catalog()),
        registry.clone(),
        Arc::new(InMemoryProcessedStore::new()),
        Arc::new(TracingReporter),
        DispatcherConfig::default(),
    ));
    let handle = ConsumerWorker::new(
        bus.clone(),
        dispatcher,
        registry,
        ConsumerConfig::new("task-readers"),
    )
    .start()
    .await
    .unwrap();

    Rig {
        bus,
        handle,
        invocations,
    }
}

#[tokio::test]
async fn redelivered_event_is_processed_once() {
    let rig = start_rig().await;
    let event_id = Uuid::new_v4();

    let envelope = task_envelope(event_id, "1.0", 3, "Write launch checklist");
    publish_raw(&rig.bus, "task.created", "3", envelope.clone()).await;
    publish_raw(&rig.bus, "task.created", "3", envelope).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    rig.handle.shutdown().await;

    assert_eq!(rig.invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn same_event_id_with_altered_payload_is_still_a_duplicate() {
    let rig = start_rig().await;
    let event_id = Uuid::new_v4();

    publish_raw(
        &rig.bus,
        "task.created",
        "3",
        task_envelope(event_id, "1.0", 3, "Original title"),
    )
    .await;
    // A producer bug re-sent the id with different content; identity wins.
    publish_raw(
        &rig.bus,
        "task.created",
        "3",
        task_envelope(event_id, "1.0", 3, "Tampered title"),
    )
    .await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    rig.handle.shutdown().await;

    assert_eq!(rig.invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn incompatible_version_is_skipped_without_stopping_the_stream() {
    let rig = start_rig().await;

    publish_raw(
        &rig.bus,
        "task.created",
        "1",
        task_envelope(Uuid::new_v4(), "9.0", 1, "From the future"),
    )
    .await;
    publish_raw(
        &rig.bus,
        "task.created",
        "2",
        task_envelope(Uuid::new_v4(), "1.0", 2, "Current schema"),
    )
    .await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    rig.handle.shutdown().await;

    // Only the compatible event was handled; the stream kept moving.
    assert_eq!(rig.invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn foreign_event_type_is_acked_and_ignored() {
    let rig = start_rig().await;

    // Subject/type drift: a producer put an event this platform has never
    // heard of on a subject we watch. It must be acknowledged and ignored.
    let envelope = serde_json::json!({
        "eventId": Uuid::new_v4().to_string(),
        "eventType": "order.created",
        "sourceService": "order-service",
        "timestamp": "2026-03-01T12:00:00Z",
        "version": "1.0",
        "data": { "orderId": 1 }
    });
    publish_raw(&rig.bus, "task.created", "1", envelope).await;
    publish_raw(
        &rig.bus,
        "task.created",
        "2",
        task_envelope(Uuid::new_v4(), "1.0", 2, "Still flows"),
    )
    .await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    rig.handle.shutdown().await;

    assert_eq!(rig.invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_payload_is_not_dispatched() {
    let rig = start_rig().await;

    let envelope = serde_json::json!({
        "eventId": Uuid::new_v4().to_string(),
        "eventType": "task.created",
        "sourceService": "task-service",
        "timestamp": "2026-03-01T12:00:00Z",
        "version": "1.0",
        "data": { "taskId": "not-a-number" }
    });
    publish_raw(&rig.bus, "task.created", "3", envelope).await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    rig.handle.shutdown().await;

    assert_eq!(rig.invocations.load(Ordering::SeqCst), 0);
}
