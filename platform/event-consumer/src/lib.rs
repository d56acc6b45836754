//! Idempotent event consumption for taskboard services.
//!
//! Sits on top of [`event_bus`]: a service registers typed handlers in a
//! [`HandlerRegistry`], and a [`ConsumerWorker`] pulls deliveries from the
//! bus, validates them against the service's [`EventCatalog`](event_bus::EventCatalog),
//! suppresses duplicates through a [`ProcessedStore`], and invokes the
//! handlers with bounded retry. The transport delivers at least once; this
//! crate turns that into effectively-once processing.
//!
//! ```no_run
//! use std::sync::Arc;
//! use event_bus::{EventCatalog, InMemoryBus, TracingReporter};
//! use event_consumer::{
//!     ConsumerConfig, ConsumerWorker, Dispatcher, DispatcherConfig, HandlerRegistry,
//!     InMemoryProcessedStore, typed_handler,
//! };
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct TaskCreatedV1 { task_id: i64, user_id: i64 }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = Arc::new(InMemoryBus::new());
//! let catalog = Arc::new(
//!     EventCatalog::builder()
//!         .event::<TaskCreatedV1>("task.created", "1.0")
//!         .build(),
//! );
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(
//!     "task.created",
//!     typed_handler(|_ctx, task: TaskCreatedV1| async move {
//!         tracing::info!(task.task_id, "task created");
//!         Ok(())
//!     }),
//! );
//! let registry = Arc::new(registry);
//!
//! let dispatcher = Arc::new(Dispatcher::new(
//!     catalog,
//!     registry.clone(),
//!     Arc::new(InMemoryProcessedStore::new()),
//!     Arc::new(TracingReporter),
//!     DispatcherConfig::default(),
//! ));
//! let handle = ConsumerWorker::new(bus, dispatcher, registry, ConsumerConfig::new("task-stats"))
//!     .start()
//!     .await?;
//! # handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod idempotency;
pub mod registry;
pub mod worker;

pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherConfig, RedeliverReason, SkipReason};
pub use idempotency::{
    InMemoryProcessedStore, ProcessedOutcome, ProcessedRecord, RetentionConfig, StoreError,
    ProcessedStore,
};
pub use registry::{typed_handler, EventContext, EventHandler, HandlerError, HandlerRegistry};
pub use worker::{ConsumerConfig, ConsumerHandle, ConsumerWorker};
