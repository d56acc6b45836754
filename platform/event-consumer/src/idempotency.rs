//! Idempotency tracker: the ledger of events already applied.
//!
//! At-least-once delivery means redelivery is normal; the tracker is the
//! single piece of state shared across dispatch workers that turns redelivery
//! into a no-op. The check-then-mark sequence behaves as a compare-and-set
//! keyed by event id: the first worker to mark wins, any concurrent worker
//! observes `false` and treats the event as a duplicate.
//!
//! Records are first-write-wins and retained for a bounded TTL that must
//! cover the broker's maximum redelivery window.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

/// How the first successful processing of an event concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProcessedOutcome {
    /// The handler ran and applied its side effects.
    Applied,
    /// The event was consciously skipped (e.g. no subscription).
    Skipped,
}

/// Ledger entry for one event id. Never updated after first write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessedRecord {
    pub processed_at: DateTime<Utc>,
    pub outcome: ProcessedOutcome,
}

/// Errors from the backing store (external persistence surfaces here).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("processed-event store unavailable: {0}")]
    Unavailable(String),
}

/// Access pattern for the processed-event ledger.
///
/// Services back this with their own persistence layer; the core only
/// defines the contract. Implementations must be safe under concurrent
/// check-and-mark from multiple dispatch workers.
#[async_trait]
pub trait ProcessedStore: Send + Sync {
    async fn has_processed(&self, event_id: Uuid) -> Result<bool, StoreError>;

    /// Record the first successful processing of `event_id`.
    ///
    /// Returns `true` if this call created the record, `false` if another
    /// worker already recorded it (the caller lost the race and must not
    /// apply side effects again; at this point they already have, which is
    /// why dispatch checks `has_processed` first and handlers stay
    /// idempotent per aggregate).
    async fn mark_processed(
        &self,
        event_id: Uuid,
        outcome: ProcessedOutcome,
    ) -> Result<bool, StoreError>;
}

/// Retention settings for [`InMemoryProcessedStore`].
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// How long records are kept; must exceed the broker redelivery window.
    pub ttl: Duration,
    /// How often expired records are swept out.
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            sweep_interval: Duration::from_secs(10 * 60),
        }
    }
}

/// In-memory ledger with TTL-bounded retention.
///
/// The default store for tests and for services whose redelivery window is
/// short enough that process-local memory suffices. Expired records are
/// swept opportunistically during writes.
pub struct InMemoryProcessedStore {
    records: Mutex<HashMap<Uuid, ProcessedRecord>>,
    next_sweep: Mutex<DateTime<Utc>>,
    config: RetentionConfig,
}

impl InMemoryProcessedStore {
    pub fn new() -> Self {
        Self::with_config(RetentionConfig::default())
    }

    pub fn with_config(config: RetentionConfig) -> Self {
        let sweep_interval = ChronoDuration::from_std(config.sweep_interval)
            .unwrap_or_else(|_| ChronoDuration::minutes(10));
        Self {
            records: Mutex::new(HashMap::new()),
            next_sweep: Mutex::new(Utc::now() + sweep_interval),
            config,
        }
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep_if_due(&self, records: &mut HashMap<Uuid, ProcessedRecord>) {
        let now = Utc::now();
        let mut next_sweep = self
            .next_sweep
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if now < *next_sweep {
            return;
        }

        let ttl = ChronoDuration::from_std(self.config.ttl)
            .unwrap_or_else(|_| ChronoDuration::minutes(60));
        let cutoff = now - ttl;
        let before = records.len();
        records.retain(|_, record| record.processed_at > cutoff);

        let sweep_interval = ChronoDuration::from_std(self.config.sweep_interval)
            .unwrap_or_else(|_| ChronoDuration::minutes(10));
        *next_sweep = now + sweep_interval;

        let removed = before - records.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = records.len(), "Swept expired processed events");
        }
    }
}

impl Default for InMemoryProcessedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessedStore for InMemoryProcessedStore {
    async fn has_processed(&self, event_id: Uuid) -> Result<bool, StoreError> {
        let records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(records.contains_key(&event_id))
    }

    async fn mark_processed(
        &self,
        event_id: Uuid,
        outcome: ProcessedOutcome,
    ) -> Result<bool, StoreError> {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        self.sweep_if_due(&mut records);

        match records.entry(event_id) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(false),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(ProcessedRecord {
                    processed_at: Utc::now(),
                    outcome,
                });
                Ok(true)
            }
        }
    }
}
