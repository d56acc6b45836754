//! Full publish-to-handler pipeline over the in-memory bus.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use event_bus::{EventPublisher, InMemoryBus, TracingReporter};
use event_consumer::{
    typed_handler, ConsumerConfig, ConsumerWorker, Dispatcher, DispatcherConfig,
    HandlerRegistry, InMemoryProcessedStore,
};
use event_contracts::{topics, ProjectCreatedV1};

fn project(project_id: i64, name: &str, owner_id: i64) -> ProjectCreatedV1 {
    ProjectCreatedV1 {
        project_id,
        name: name.into(),
        description: None,
        owner_id,
        status: "ACTIVE".into(),
        priority: "HIGH".into(),
        start_date: None,
        end_date: None,
        created_at: "2026-03-01T12:00:00Z".parse().unwrap(),
    }
}

#[tokio::test]
async fn published_event_reaches_the_subscribed_handler_once() {
    let bus = Arc::new(InMemoryBus::new());
    let catalog = Arc::new(event_contracts::catalog());
    let reporter = Arc::new(TracingReporter);

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let mut registry = HandlerRegistry::new();
    registry.register(
        topics::PROJECT_CREATED,
        typed_handler(move |ctx, event: ProjectCreatedV1| {
            let sink = sink.clone();
            async move {
                sink.lock()
                    .unwrap()
                    .push((ctx.event_id, ctx.version.clone(), event));
                Ok(())
            }
        }),
    );
    let registry = Arc::new(registry);

    let dispatcher = Arc::new(Dispatcher::new(
        catalog.clone(),
        registry.clone(),
        Arc::new(InMemoryProcessedStore::new()),
        reporter.clone(),
        DispatcherConfig::default(),
    ));
    let handle = ConsumerWorker::new(
        bus.clone(),
        dispatcher,
        registry,
        ConsumerConfig::new("project-readers"),
    )
    .start()
    .await
    .unwrap();

    let publisher = EventPublisher::new(bus, catalog, "project-service", reporter);

    // Completion callback observes broker acceptance with a sequence.
    let (ack_tx, ack_rx) = tokio::sync::oneshot::channel();
    publisher
        .publish_with_callback(project(42, "Launch", 7), move |result| {
            ack_tx.send(result.map(|a| a.sequence)).ok();
        })
        .unwrap();

    let sequence = tokio::time::timeout(Duration::from_secs(2), ack_rx)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(sequence > 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.shutdown().await;

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let (_, version, event) = &received[0];
    assert_eq!(version, "1.0");
    assert_eq!(event.project_id, 42);
    assert_eq!(event.name, "Launch");
    assert_eq!(event.owner_id, 7);
}

#[tokio::test]
async fn each_publication_gets_a_distinct_event_id() {
    let bus = Arc::new(InMemoryBus::new());
    let catalog = Arc::new(event_contracts::catalog());
    let reporter = Arc::new(TracingReporter);

    let seen_ids = Arc::new(Mutex::new(Vec::new()));
    let invocations = Arc::new(AtomicU32::new(0));

    let ids = seen_ids.clone();
    let count = invocations.clone();
    let mut registry = HandlerRegistry::new();
    registry.register(
        topics::PROJECT_CREATED,
        typed_handler(move |ctx, _event: ProjectCreatedV1| {
            let ids = ids.clone();
            let count = count.clone();
            async move {
                ids.lock().unwrap().push(ctx.event_id);
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    );
    let registry = Arc::new(registry);

    let dispatcher = Arc::new(Dispatcher::new(
        catalog.clone(),
        registry.clone(),
        Arc::new(InMemoryProcessedStore::new()),
        reporter.clone(),
        DispatcherConfig::default(),
    ));
    let handle = ConsumerWorker::new(
        bus.clone(),
        dispatcher,
        registry,
        ConsumerConfig::new("project-readers"),
    )
    .start()
    .await
    .unwrap();

    let publisher = EventPublisher::new(bus, catalog, "project-service", reporter);
    // Identical payloads are still independent occurrences.
    publisher.publish(project(42, "Launch", 7)).unwrap();
    publisher.publish(project(42, "Launch", 7)).unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    handle.shutdown().await;

    assert_eq!(invocations.load(Ordering::SeqCst), 2);
    let ids = seen_ids.lock().unwrap();
    assert_ne!(ids[0], ids[1]);
}
