//! Ingestion orchestration.
//!
//! Coordinates the full pipeline for one request: input-shape validation →
//! URL fetch or base64 decode → secure staging → conversion → telemetry →
//! result or sanitized error. The staging directory is released exactly once
//! per request regardless of which stage failed; the `Drop` backstop inside
//! [`crate::staging::StagedFile`] covers early error returns and panics.
//!
//! No stage retries. A failed download, decode, or conversion is terminal for
//! the request; retry policy belongs to the caller.

use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use crate::config::Config;
use crate::convert::Converter;
use crate::decode;
use crate::error::IngestError;
use crate::events::{IngestionEvent, Telemetry};
use crate::fetch::{self, Download};
use crate::staging;
use crate::validate;

/// Wire-shape of the `convert_to_markdown` tool input. Exactly one of the two
/// fields must be set.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IngestRequest {
    pub file_url: Option<String>,
    pub file_base64: Option<String>,
}

/// The public entry point of the pipeline. Holds the process-wide immutable
/// configuration and the injected converter and telemetry collaborators;
/// individual requests share no mutable state.
pub struct Ingestor {
    config: Arc<Config>,
    converter: Arc<dyn Converter>,
    telemetry: Arc<dyn Telemetry>,
}

impl Ingestor {
    pub fn new(
        config: Arc<Config>,
        converter: Arc<dyn Converter>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            config,
            converter,
            telemetry,
        }
    }

    /// Runs one ingestion request to completion, returning the extracted
    /// Markdown or a sanitized error.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<String, IngestError> {
        // Shape check happens before any network or disk activity, and a
        // malformed request produces no telemetry event.
        let (url, payload) = match (&request.file_url, &request.file_base64) {
            (Some(url), None) => (Some(url.as_str()), None),
            (None, Some(payload)) => (None, Some(payload.as_str())),
            _ => return Err(IngestError::Input),
        };

        let download = match self.acquire(url, payload).await {
            Ok(download) => download,
            Err(e) => {
                self.telemetry.record(event_for_error(&e, url));
                return Err(e);
            }
        };

        let file_size = download.bytes.len() as u64;
        let staged = match staging::stage(&download) {
            Ok(staged) => staged,
            Err(e) => {
                self.telemetry.record(event_for_error(&e, url));
                return Err(e);
            }
        };

        let converted = self.converter.convert(staged.path(), download.extension);
        staged.release();

        match converted {
            Ok(markdown) => {
                info!(
                    size = file_size,
                    markdown_length = markdown.len(),
                    file_type = download.extension,
                    "conversion succeeded"
                );
                self.telemetry.record(IngestionEvent::success(
                    file_size,
                    markdown.len() as u64,
                    download.extension,
                ));
                self.telemetry.charge("document-conversion");
                Ok(markdown)
            }
            Err(e) => {
                let err = IngestError::Conversion { class: e.class() };
                self.telemetry.record(event_for_error(&err, url));
                Err(err)
            }
        }
    }

    /// Routes to the fetcher or the decoder. The two sources are exclusive;
    /// the shape check has already established which one applies.
    async fn acquire(
        &self,
        url: Option<&str>,
        payload: Option<&str>,
    ) -> Result<Download, IngestError> {
        match (url, payload) {
            (Some(url), None) => {
                let validated = validate::validate_url(url, &self.config.security).await?;
                fetch::fetch(&validated, &self.config.limits).await
            }
            (None, Some(payload)) => decode::decode(payload, &self.config.limits),
            _ => Err(IngestError::Input),
        }
    }
}

/// Maps a pipeline failure to its audit event. Security blocks get their
/// dedicated kinds; everything else is a generic `error` event carrying only
/// the error class.
fn event_for_error(error: &IngestError, url: Option<&str>) -> IngestionEvent {
    match error {
        IngestError::ForbiddenAddress => IngestionEvent::blocked_address(url),
        IngestError::BlockedContentType { content_type } => {
            IngestionEvent::blocked_content_type(content_type, url)
        }
        IngestError::SizeLimit { attempted, max } => {
            IngestionEvent::blocked_size(*attempted, *max, url)
        }
        // The converter's own class is the interesting bit for the audit trail.
        IngestError::Conversion { class } => IngestionEvent::error(class, url),
        other => IngestionEvent::error(other.class(), url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn security_blocks_map_to_dedicated_kinds() {
        let e = event_for_error(
            &IngestError::BlockedContentType {
                content_type: "application/octet-stream".to_string(),
            },
            Some("http://example.com/f"),
        );
        assert_eq!(e.event, EventKind::SecurityBlockedContentType);
        assert_eq!(e.content_type.as_deref(), Some("application/octet-stream"));

        let e = event_for_error(
            &IngestError::SizeLimit {
                attempted: 200,
                max: 100,
            },
            None,
        );
        assert_eq!(e.event, EventKind::SecurityBlockedSize);
        assert_eq!(e.attempted_bytes, Some(200));
        assert_eq!(e.max_bytes, Some(100));

        let e = event_for_error(
            &IngestError::ForbiddenAddress,
            Some("http://localhost/x"),
        );
        assert_eq!(e.event, EventKind::SecurityBlockedAddress);
    }

    #[test]
    fn other_failures_map_to_error_events_with_class_only() {
        let e = event_for_error(&IngestError::Encoding, None);
        assert_eq!(e.event, EventKind::Error);
        assert_eq!(e.error_class.as_deref(), Some("encoding"));

        let e = event_for_error(&IngestError::Conversion { class: "pdf" }, None);
        assert_eq!(e.error_class.as_deref(), Some("pdf"));
    }

    #[test]
    fn request_deserializes_camel_case() {
        let req: IngestRequest =
            serde_json::from_str(r#"{"fileUrl": "http://example.com/a.pdf"}"#).unwrap();
        assert_eq!(req.file_url.as_deref(), Some("http://example.com/a.pdf"));
        assert!(req.file_base64.is_none());
    }
}
