//! Long-running consumer loop.
//!
//! One subscription per registered event type, all feeding a fixed set of
//! partition workers. Deliveries are routed to a partition by hashing the
//! aggregate key, so events for the same aggregate are dispatched strictly
//! in delivery order while different aggregates proceed in parallel.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use event_bus::{pattern_for, BusResult, Delivery, EventBus};

use crate::dispatcher::Dispatcher;
use crate::registry::HandlerRegistry;

/// Consumer group identity and concurrency settings.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Durable group name; all instances sharing it split the work.
    pub group: String,
    /// Number of partition workers. Per-key ordering holds at any setting.
    pub partitions: usize,
    /// Buffered deliveries per partition before the pump backpressures.
    pub channel_capacity: usize,
    /// How long shutdown waits for in-flight dispatches to finish.
    pub drain_grace: Duration,
}

impl ConsumerConfig {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            partitions: 4,
            channel_capacity: 64,
            drain_grace: Duration::from_secs(10),
        }
    }
}

/// Subscribes to every event type the registry handles and runs the
/// dispatch loop until shut down.
pub struct ConsumerWorker {
    bus: Arc<dyn EventBus>,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<HandlerRegistry>,
    config: ConsumerConfig,
}

impl ConsumerWorker {
    pub fn new(
        bus: Arc<dyn EventBus>,
        dispatcher: Arc<Dispatcher>,
        registry: Arc<HandlerRegistry>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            bus,
            dispatcher,
            registry,
            config,
        }
    }

    /// Open all subscriptions and spawn the pump and partition tasks.
    ///
    /// Fails fast if any subscription cannot be established; a consumer
    /// listening to half its event types would silently lose the rest.
    pub async fn start(self) -> BusResult<ConsumerHandle> {
        let partitions = self.config.partitions.max(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut senders = Vec::with_capacity(partitions);
        let mut workers = Vec::with_capacity(partitions);
        for partition in 0..partitions {
            let (tx, mut rx) = mpsc::channel::<Delivery>(self.config.channel_capacity);
            senders.push(tx);

            let dispatcher = self.dispatcher.clone();
            workers.push(tokio::spawn(async move {
                // Ends when every pump has dropped its sender clones.
                while let Some(delivery) = rx.recv().await {
                    let outcome = dispatcher.dispatch(&delivery).await;
                    tracing::debug!(
                        partition,
                        subject = %delivery.message.subject,
                        ?outcome,
                        "Dispatch complete"
                    );
                }
                tracing::debug!(partition, "Partition worker drained");
            }));
        }

        let mut pumps = Vec::new();
        let event_types: Vec<String> = self.registry.event_types().map(str::to_string).collect();
        for event_type in event_types {
            let pattern = pattern_for(&event_type);
            let mut stream = self.bus.subscribe(&pattern, &self.config.group).await?;
            tracing::info!(
                event_type = %event_type,
                pattern = %pattern,
                group = %self.config.group,
                "Subscribed"
            );

            let senders = senders.clone();
            let mut shutdown = shutdown_rx.clone();
            pumps.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        maybe = stream.next() => {
                            let Some(delivery) = maybe else {
                                tracing::warn!(event_type = %event_type, "Subscription stream ended");
                                break;
                            };
                            let partition = partition_for(&delivery.message.key, senders.len());
                            if senders[partition].send(delivery).await.is_err() {
                                break;
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }
        drop(senders);

        Ok(ConsumerHandle {
            shutdown_tx,
            pumps,
            workers,
            drain_grace: self.config.drain_grace,
        })
    }
}

fn partition_for(key: &str, partitions: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % partitions as u64) as usize
}

/// Handle to a running consumer; dropping it does not stop the loop.
pub struct ConsumerHandle {
    shutdown_tx: watch::Sender<bool>,
    pumps: Vec<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
    drain_grace: Duration,
}

impl ConsumerHandle {
    /// Stop accepting new deliveries, then drain in-flight ones.
    ///
    /// Messages still queued when the grace period expires are simply not
    /// acked and come back on redelivery.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        for pump in self.pumps {
            let _ = pump.await;
        }

        let drain = async {
            for worker in self.workers {
                let _ = worker.await;
            }
        };
        if tokio::time::timeout(self.drain_grace, drain).await.is_err() {
            tracing::warn!("Shutdown grace period expired with dispatches still in flight");
        } else {
            tracing::info!("Consumer drained and stopped");
        }
    }
}
