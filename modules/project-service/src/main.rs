use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use event_bus::{EventBus, EventPublisher, InMemoryBus, NatsBus, TracingReporter};
use event_consumer::{
    ConsumerConfig, ConsumerWorker, Dispatcher, DispatcherConfig, InMemoryProcessedStore,
};
use project_service::{handlers, Config, ProjectEventPublisher, ProjectRosterStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env().expect("Invalid configuration");

    let bus: Arc<dyn EventBus> = match config.bus_type.as_str() {
        "nats" => {
            let nats = NatsBus::connect(&config.nats_url, Default::default())
                .await
                .expect("Failed to connect to NATS");
            tracing::info!(url = %config.nats_url, "Connected to NATS");
            Arc::new(nats)
        }
        _ => {
            tracing::info!("Using in-memory event bus");
            Arc::new(InMemoryBus::new())
        }
    };

    let catalog = Arc::new(event_contracts::catalog());
    let reporter = Arc::new(TracingReporter);
    let roster = Arc::new(ProjectRosterStore::new());

    let _publisher = ProjectEventPublisher::new(EventPublisher::new(
        bus.clone(),
        catalog.clone(),
        "project-service",
        reporter.clone(),
    ));

    let registry = Arc::new(handlers::build_registry(roster));
    let dispatcher = Arc::new(Dispatcher::new(
        catalog,
        registry.clone(),
        Arc::new(InMemoryProcessedStore::new()),
        reporter,
        DispatcherConfig {
            handler_timeout: config.handler_timeout,
            ..Default::default()
        },
    ));

    let mut consumer_config = ConsumerConfig::new(config.consumer_group.clone());
    consumer_config.partitions = config.partitions;
    let handle = ConsumerWorker::new(bus, dispatcher, registry, consumer_config)
        .start()
        .await
        .expect("Failed to start consumer");

    tracing::info!(group = %config.consumer_group, "Project service consuming events");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
    tracing::info!("Shutdown signal received, draining consumer");
    handle.shutdown().await;
}
