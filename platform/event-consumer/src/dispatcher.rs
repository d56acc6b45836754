//! The dispatch path for one delivered message.
//!
//! Per-message pipeline:
//! `Received -> Validated -> DuplicateCheck -> {Skipped | Dispatched} ->
//! {Committed | Redelivered}`.
//!
//! Terminal states are `Committed` (idempotency record written, acked) and
//! `Skipped` (acked without side effect). A `Redeliver` outcome is not
//! terminal: the message is nak'd and re-enters on the transport's next
//! delivery attempt. Failures that concern a single message never stop the
//! dispatch loop.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use event_bus::catalog::{CatalogError, EventCatalog};
use event_bus::consumer_retry::RetryPolicy;
use event_bus::reporter::{ErrorReporter, FailureReason};
use event_bus::{Delivery, EventEnvelope};

use crate::idempotency::{ProcessedOutcome, ProcessedStore};
use crate::registry::{EventContext, HandlerRegistry};

/// Why a message was acknowledged without invoking its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The event id is already in the processed ledger.
    Duplicate,
    /// The event type is not in this process's catalog (cross-service drift).
    UnknownEventType,
    /// Known type, but a version this process cannot parse.
    IncompatibleVersion,
    /// No handler registered; unsubscribed types are expected.
    NoHandler,
}

/// Why a message was handed back for redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeliverReason {
    /// The outer envelope did not parse; dead-lettering is the transport's
    /// call, never a silent drop.
    MalformedEnvelope,
    HandlerFailed,
    HandlerTimedOut,
    /// The processed ledger could not be read or written; without it the
    /// idempotence guarantee is gone, so the message must come back.
    StoreUnavailable,
}

/// Terminal-or-retry outcome for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler succeeded, ledger written, message acked.
    Committed,
    /// Acked without side effect.
    Skipped(SkipReason),
    /// Nak'd; the message re-enters on the next delivery attempt.
    Redeliver(RedeliverReason),
}

impl DispatchOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Redeliver(_))
    }
}

/// Dispatch tuning knobs.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Bound on a single handler invocation; exceeding it is a handler
    /// failure, not process-fatal.
    pub handler_timeout: Duration,
    /// In-place retry before the message is handed back to the transport.
    pub retry: RetryPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

enum InvokeError {
    Timeout(u64),
    Handler(String),
}

impl std::fmt::Display for InvokeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout(ms) => write!(f, "handler exceeded {ms}ms"),
            Self::Handler(e) => write!(f, "{e}"),
        }
    }
}

/// Routes each delivered envelope to its handler under idempotency
/// protection.
pub struct Dispatcher {
    catalog: Arc<EventCatalog>,
    registry: Arc<HandlerRegistry>,
    store: Arc<dyn ProcessedStore>,
    reporter: Arc<dyn ErrorReporter>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        catalog: Arc<EventCatalog>,
        registry: Arc<HandlerRegistry>,
        store: Arc<dyn ProcessedStore>,
        reporter: Arc<dyn ErrorReporter>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            catalog,
            registry,
            store,
            reporter,
            config,
        }
    }

    /// Process one delivery end to end, including the ack/nak decision.
    pub async fn dispatch(&self, delivery: &Delivery) -> DispatchOutcome {
        let envelope: EventEnvelope<serde_json::Value> =
            match serde_json::from_slice(&delivery.message.payload) {
                Ok(envelope) => envelope,
                Err(e) => {
                    self.reporter
                        .report(
                            &delivery.message.subject,
                            None,
                            &FailureReason::MalformedEnvelope(e.to_string()),
                        )
                        .await;
                    self.nak(delivery).await;
                    return DispatchOutcome::Redeliver(RedeliverReason::MalformedEnvelope);
                }
            };

        let span = tracing::info_span!(
            "dispatch_event",
            event_id = %envelope.event_id,
            event_type = %envelope.event_type,
            source_service = %envelope.source_service,
            version = %envelope.version,
            key = %delivery.message.key,
            attempt = delivery.attempt,
        );
        self.dispatch_parsed(delivery, envelope).instrument(span).await
    }

    async fn dispatch_parsed(
        &self,
        delivery: &Delivery,
        envelope: EventEnvelope<serde_json::Value>,
    ) -> DispatchOutcome {
        // Unknown types are acknowledged: other services evolve independently
        // and this process simply does not subscribe to everything they emit.
        if !self.catalog.contains(&envelope.event_type) {
            tracing::info!("Unregistered event type, acknowledging without dispatch");
            self.ack(delivery).await;
            return DispatchOutcome::Skipped(SkipReason::UnknownEventType);
        }

        if let Err(e) =
            self.catalog
                .check_payload(&envelope.event_type, &envelope.version, &envelope.data)
        {
            match e {
                CatalogError::UnsupportedVersion { .. }
                | CatalogError::IncompatiblePayload { .. } => {
                    tracing::warn!(error = %e, "Incompatible event version, skipping");
                    self.reporter
                        .report(
                            &envelope.event_type,
                            Some(envelope.event_id),
                            &FailureReason::IncompatibleVersion {
                                version: envelope.version.clone(),
                            },
                        )
                        .await;
                    self.ack(delivery).await;
                    return DispatchOutcome::Skipped(SkipReason::IncompatibleVersion);
                }
                CatalogError::UnknownEventType(_) => {
                    // Unreachable: contains() was checked above.
                    self.ack(delivery).await;
                    return DispatchOutcome::Skipped(SkipReason::UnknownEventType);
                }
            }
        }

        match self.store.has_processed(envelope.event_id).await {
            Ok(true) => {
                tracing::debug!("Duplicate delivery suppressed");
                self.ack(delivery).await;
                return DispatchOutcome::Skipped(SkipReason::Duplicate);
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!(error = %e, "Processed-event ledger unavailable");
                self.nak(delivery).await;
                return DispatchOutcome::Redeliver(RedeliverReason::StoreUnavailable);
            }
        }

        let handler = match self.registry.get(&envelope.event_type) {
            Some(handler) => handler.clone(),
            None => {
                tracing::debug!("No handler registered, acknowledging");
                self.ack(delivery).await;
                return DispatchOutcome::Skipped(SkipReason::NoHandler);
            }
        };

        let ctx = EventContext {
            event_id: envelope.event_id,
            event_type: envelope.event_type.clone(),
            source_service: envelope.source_service.clone(),
            timestamp: envelope.timestamp,
            version: envelope.version.clone(),
            key: delivery.message.key.clone(),
            attempt: delivery.attempt,
        };

        let timeout = self.config.handler_timeout;
        let timeout_ms = timeout.as_millis() as u64;
        let context = format!("dispatch:{}", envelope.event_type);
        let invoke = self
            .config
            .retry
            .run(&context, || {
                let handler = handler.clone();
                let ctx = ctx.clone();
                let data = &envelope.data;
                async move {
                    match tokio::time::timeout(timeout, handler.handle(&ctx, data)).await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(InvokeError::Handler(e.to_string())),
                        Err(_) => Err(InvokeError::Timeout(timeout_ms)),
                    }
                }
            })
            .await;

        if let Err(e) = invoke {
            let (reason, outcome) = match &e {
                InvokeError::Timeout(ms) => (
                    FailureReason::HandlerTimeout { timeout_ms: *ms },
                    RedeliverReason::HandlerTimedOut,
                ),
                InvokeError::Handler(msg) => (
                    FailureReason::HandlerFailure(msg.clone()),
                    RedeliverReason::HandlerFailed,
                ),
            };
            tracing::error!(error = %e, "Handler failed, leaving message for redelivery");
            self.reporter
                .report(&envelope.event_type, Some(envelope.event_id), &reason)
                .await;
            self.nak(delivery).await;
            return DispatchOutcome::Redeliver(outcome);
        }

        match self
            .store
            .mark_processed(envelope.event_id, ProcessedOutcome::Applied)
            .await
        {
            Ok(true) => {
                self.ack(delivery).await;
                DispatchOutcome::Committed
            }
            Ok(false) => {
                // Another worker won the mark race; count this delivery as
                // the duplicate it turned out to be.
                tracing::debug!("Lost mark race to a concurrent worker");
                self.ack(delivery).await;
                DispatchOutcome::Skipped(SkipReason::Duplicate)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to record processed event");
                self.nak(delivery).await;
                DispatchOutcome::Redeliver(RedeliverReason::StoreUnavailable)
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) {
        if let Err(e) = delivery.ack().await {
            tracing::warn!(subject = %delivery.message.subject, error = %e, "Ack failed");
        }
    }

    async fn nak(&self, delivery: &Delivery) {
        if let Err(e) = delivery.nak().await {
            tracing::warn!(subject = %delivery.message.subject, error = %e, "Nak failed");
        }
    }
}
