//! # Event Envelope
//!
//! Platform-wide envelope wrapping every cross-service event.
//!
//! ## Wire format
//!
//! JSON with camelCase keys, matching what every producing service emits:
//!
//! ```json
//! {"eventId":"...","eventType":"project.created","sourceService":"project-service",
//!  "timestamp":"2026-01-01T00:00:00Z","version":"1.0","data":{...}}
//! ```
//!
//! ## Fields
//!
//! - `event_id`: unique identifier, the idempotency key
//! - `event_type`: catalog tag resolving the payload schema
//! - `source_service`: producing service, diagnostics only
//! - `timestamp`: producer clock, not authoritative for ordering
//! - `version`: payload schema version, evolves independently of the envelope
//! - `data`: event-specific payload (generic type parameter)
//!
//! An envelope is never mutated after creation. Broker redelivery carries the
//! same `event_id`; the producer never mints a fresh envelope for a retry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standard event envelope following the platform event contract
///
/// # Type Parameter
///
/// * `T` - The event-specific payload type
///
/// # Examples
///
/// ```rust
/// use event_bus::EventEnvelope;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct ProjectCreated {
///     project_id: i64,
///     name: String,
///     owner_id: i64,
/// }
///
/// let envelope = EventEnvelope::new(
///     "project.created",
///     "project-service",
///     "1.0",
///     ProjectCreated { project_id: 42, name: "Launch".into(), owner_id: 7 },
/// );
/// assert_eq!(envelope.event_type, "project.created");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope<T> {
    /// Unique event identifier (idempotency key)
    pub event_id: Uuid,

    /// Catalog tag, e.g. `"project.created"`
    pub event_type: String,

    /// Service that produced the event; never a basis for trust
    pub source_service: String,

    /// Producer-side creation time, UTC
    pub timestamp: DateTime<Utc>,

    /// Payload schema version, `"1.0"`-style
    pub version: String,

    /// Event-specific payload
    pub data: T,
}

impl<T> EventEnvelope<T> {
    /// Create a new envelope with a fresh event id and the current time.
    pub fn new(
        event_type: impl Into<String>,
        source_service: impl Into<String>,
        version: impl Into<String>,
        data: T,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            source_service: source_service.into(),
            timestamp: Utc::now(),
            version: version.into(),
            data,
        }
    }

    /// Create an envelope with an explicit event id (useful for testing
    /// duplicate-delivery behavior).
    pub fn with_event_id(
        event_id: Uuid,
        event_type: impl Into<String>,
        source_service: impl Into<String>,
        version: impl Into<String>,
        data: T,
    ) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            source_service: source_service.into(),
            timestamp: Utc::now(),
            version: version.into(),
            data,
        }
    }

    /// Replace the payload, keeping every identity field.
    pub fn map_data<U>(self, f: impl FnOnce(T) -> U) -> EventEnvelope<U> {
        EventEnvelope {
            event_id: self.event_id,
            event_type: self.event_type,
            source_service: self.source_service,
            timestamp: self.timestamp,
            version: self.version,
            data: f(self.data),
        }
    }
}

/// Validate envelope fields on a raw JSON value.
///
/// Used at the transport boundary before the payload schema is known.
///
/// # Validation Rules
///
/// - `eventId`: present, parseable as a UUID
/// - `eventType`: present, non-empty
/// - `sourceService`: present, non-empty
/// - `timestamp`: present
/// - `version`: present, non-empty
///
/// # Errors
///
/// Returns a descriptive error string if validation fails.
pub fn validate_envelope_fields(envelope: &serde_json::Value) -> Result<(), String> {
    let event_id = envelope
        .get("eventId")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid eventId")?;
    Uuid::parse_str(event_id).map_err(|_| format!("eventId is not a UUID: {event_id}"))?;

    let event_type = envelope
        .get("eventType")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid eventType")?;
    if event_type.is_empty() {
        return Err("eventType cannot be empty".to_string());
    }

    let source_service = envelope
        .get("sourceService")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid sourceService")?;
    if source_service.is_empty() {
        return Err("sourceService cannot be empty".to_string());
    }

    envelope
        .get("timestamp")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid timestamp")?;

    let version = envelope
        .get("version")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid version")?;
    if version.is_empty() {
        return Err("version cannot be empty".to_string());
    }

    Ok(())
}
