//! Structured outcome events and the telemetry/billing seam.
//!
//! Every security-relevant rejection is recorded as an event before the
//! sanitized error reaches the caller, preserving an audit trail that does
//! not depend on the caller logging anything. Events are append-only; the
//! core never reads them back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use tracing::info;

/// Outcome classification of an ingestion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Success,
    SecurityBlockedContentType,
    SecurityBlockedSize,
    SecurityBlockedAddress,
    Error,
}

/// One ingestion outcome record. Only the fields relevant to the kind are
/// populated; the rest serialize away.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionEvent {
    pub event: EventKind,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempted_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Error class name only — never a message, which may contain paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<String>,
}

impl IngestionEvent {
    fn new(event: EventKind) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
            file_size: None,
            markdown_length: None,
            file_type: None,
            content_type: None,
            attempted_bytes: None,
            max_bytes: None,
            url: None,
            error_class: None,
        }
    }

    pub fn success(file_size: u64, markdown_length: u64, file_type: &str) -> Self {
        Self {
            file_size: Some(file_size),
            markdown_length: Some(markdown_length),
            file_type: Some(file_type.to_string()),
            ..Self::new(EventKind::Success)
        }
    }

    pub fn blocked_content_type(content_type: &str, url: Option<&str>) -> Self {
        Self {
            content_type: Some(content_type.to_string()),
            url: url.map(str::to_string),
            ..Self::new(EventKind::SecurityBlockedContentType)
        }
    }

    pub fn blocked_size(attempted: u64, max: u64, url: Option<&str>) -> Self {
        Self {
            attempted_bytes: Some(attempted),
            max_bytes: Some(max),
            url: url.map(str::to_string),
            ..Self::new(EventKind::SecurityBlockedSize)
        }
    }

    pub fn blocked_address(url: Option<&str>) -> Self {
        Self {
            url: url.map(str::to_string),
            ..Self::new(EventKind::SecurityBlockedAddress)
        }
    }

    pub fn error(error_class: &str, url: Option<&str>) -> Self {
        Self {
            error_class: Some(error_class.to_string()),
            url: url.map(str::to_string),
            ..Self::new(EventKind::Error)
        }
    }
}

/// Telemetry and billing collaborators: append-only event recording plus a
/// billable-event charge fired once per successful conversion.
pub trait Telemetry: Send + Sync {
    fn record(&self, event: IngestionEvent);
    fn charge(&self, event_name: &str);
}

/// Production sink: one JSON line per event on the `mdgate::events` target.
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn record(&self, event: IngestionEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "mdgate::events", %json, "event"),
            Err(e) => info!(target: "mdgate::events", error = %e, "unserializable event"),
        }
    }

    fn charge(&self, event_name: &str) {
        info!(target: "mdgate::events", event_name, "charge");
    }
}

/// Collecting sink for tests: everything recorded is retained for assertions.
#[derive(Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<IngestionEvent>>,
    charges: Mutex<Vec<String>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<IngestionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn charges(&self) -> Vec<String> {
        self.charges.lock().unwrap().clone()
    }
}

impl Telemetry for MemoryTelemetry {
    fn record(&self, event: IngestionEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn charge(&self, event_name: &str) {
        self.charges.lock().unwrap().push(event_name.to_string());
    }
}
