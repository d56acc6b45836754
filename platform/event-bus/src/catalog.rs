//! # Event Catalog
//!
//! The closed set of event types a process knows, each with its payload
//! schema per version. Built once at startup, shared as `Arc`, never mutated
//! at runtime.
//!
//! ## Versioning
//!
//! `(event_type, version)` resolves the payload schema unambiguously.
//! Evolution is additive: registering `1.1` beside `1.0` never disturbs
//! consumers of `1.0`, and a schema type whose new fields are optional can be
//! registered for both versions. A live message carrying a version this
//! process never registered is a skip, not a crash; the dispatcher
//! acknowledges it and moves on.

use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

/// Schema check for one `(event_type, version)` pair.
type PayloadCheck = Arc<dyn Fn(&serde_json::Value) -> Result<(), serde_json::Error> + Send + Sync>;

/// Catalog/configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The event type was never registered. Fatal at startup for a service
    /// wired to produce it; a per-message skip when met live.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The type is known but no schema is registered for this exact version.
    #[error("unsupported version {version} for event type {event_type}")]
    UnsupportedVersion {
        event_type: String,
        version: String,
    },

    /// The payload does not parse under the registered schema.
    #[error("incompatible payload for {event_type} v{version}: {source}")]
    IncompatiblePayload {
        event_type: String,
        version: String,
        #[source]
        source: serde_json::Error,
    },
}

struct CatalogEntry {
    current_version: String,
    checks: HashMap<String, PayloadCheck>,
}

/// Registry of known event types and their versioned payload schemas.
pub struct EventCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl EventCatalog {
    pub fn builder() -> EventCatalogBuilder {
        EventCatalogBuilder {
            entries: HashMap::new(),
        }
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.entries.contains_key(event_type)
    }

    /// Version a producer of this type must stamp on new envelopes.
    pub fn current_version(&self, event_type: &str) -> Result<&str, CatalogError> {
        self.entries
            .get(event_type)
            .map(|e| e.current_version.as_str())
            .ok_or_else(|| CatalogError::UnknownEventType(event_type.to_string()))
    }

    /// Check that a payload parses under the schema registered for the exact
    /// `(event_type, version)` pair.
    pub fn check_payload(
        &self,
        event_type: &str,
        version: &str,
        data: &serde_json::Value,
    ) -> Result<(), CatalogError> {
        let entry = self
            .entries
            .get(event_type)
            .ok_or_else(|| CatalogError::UnknownEventType(event_type.to_string()))?;

        let check = entry
            .checks
            .get(version)
            .ok_or_else(|| CatalogError::UnsupportedVersion {
                event_type: event_type.to_string(),
                version: version.to_string(),
            })?;

        check(data).map_err(|source| CatalogError::IncompatiblePayload {
            event_type: event_type.to_string(),
            version: version.to_string(),
            source,
        })
    }

    /// Registered versions for a type, unordered.
    pub fn versions(&self, event_type: &str) -> Result<Vec<&str>, CatalogError> {
        self.entries
            .get(event_type)
            .map(|e| e.checks.keys().map(String::as_str).collect())
            .ok_or_else(|| CatalogError::UnknownEventType(event_type.to_string()))
    }

    pub fn event_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for EventCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        types.sort_unstable();
        f.debug_struct("EventCatalog").field("types", &types).finish()
    }
}

/// Builder for [`EventCatalog`]. Registration happens at process start; the
/// built catalog is immutable.
pub struct EventCatalogBuilder {
    entries: HashMap<String, CatalogEntry>,
}

impl EventCatalogBuilder {
    /// Register payload type `T` as the schema for `(event_type, version)`.
    ///
    /// The most recently registered version of a type becomes its current
    /// version, so register versions oldest-first. Registering the same type
    /// `T` for several versions is the additive-evolution case: a `1.1`
    /// payload that only adds optional fields still parses as `T`.
    pub fn event<T>(mut self, event_type: &str, version: &str) -> Self
    where
        T: DeserializeOwned + 'static,
    {
        let check: PayloadCheck = Arc::new(|data: &serde_json::Value| {
            serde_json::from_value::<T>(data.clone()).map(|_| ())
        });

        let entry = self
            .entries
            .entry(event_type.to_string())
            .or_insert_with(|| CatalogEntry {
                current_version: version.to_string(),
                checks: HashMap::new(),
            });
        entry.current_version = version.to_string();
        entry.checks.insert(version.to_string(), check);
        self
    }

    pub fn build(self) -> EventCatalog {
        EventCatalog {
            entries: self.entries,
        }
    }
}
