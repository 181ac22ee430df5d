//! Bounded streaming download.
//!
//! Issues a single GET (redirects followed) under a connect timeout and a
//! total timeout, gates the declared `Content-Type` against a fixed whitelist,
//! and accumulates the body chunk by chunk with a size check after **every**
//! chunk. Crossing the ceiling aborts the stream immediately — the check must
//! never wait for the download to complete.

use std::time::Duration;

use futures_util::StreamExt;
use tracing::debug;
use url::Url;

use crate::config::LimitsConfig;
use crate::error::IngestError;

/// Declared content types accepted for download, each mapped to the staging
/// extension handed to the converter.
const ALLOWED_CONTENT_TYPES: &[(&str, &str)] = &[
    ("application/pdf", "pdf"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "pptx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    ("application/vnd.ms-excel", "xls"),
    ("application/vnd.ms-powerpoint", "ppt"),
    ("application/msword", "doc"),
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("text/html", "html"),
    ("text/plain", "txt"),
    ("text/csv", "csv"),
    ("application/zip", "zip"),
];

/// Fallback extension when no content-type signal exists (absent header or
/// inline payload). The original service assumes PDF, the most common input.
pub const DEFAULT_EXTENSION: &str = "pdf";

/// A validated, fully accumulated byte payload ready for staging.
#[derive(Debug)]
pub struct Download {
    pub bytes: Vec<u8>,
    /// Declared media type, if the upstream sent one.
    pub content_type: Option<String>,
    /// Staging extension resolved from the content type.
    pub extension: &'static str,
}

/// Maps a declared media type to its staging extension, or `None` when the
/// type is outside the whitelist.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    ALLOWED_CONTENT_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .map(|(_, ext)| *ext)
}

/// Normalizes a `Content-Type` header value: parameters after `;` dropped,
/// lower-cased, trimmed.
fn media_type(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Downloads `url` under the configured ceilings.
///
/// The URL must already have passed [`crate::validate::validate_url`]; this
/// function performs no address classification of its own.
pub async fn fetch(url: &Url, limits: &LimitsConfig) -> Result<Download, IngestError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(limits.connect_timeout_secs))
        .timeout(Duration::from_secs(limits.total_timeout_secs))
        .build()
        .map_err(|_| IngestError::Network)?;

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(classify_reqwest_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(IngestError::HttpStatus {
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(media_type);

    // Absent header is permissive; a declared type outside the whitelist is not.
    let extension = match content_type.as_deref() {
        Some(ct) => extension_for(ct).ok_or_else(|| IngestError::BlockedContentType {
            content_type: ct.to_string(),
        })?,
        None => DEFAULT_EXTENSION,
    };

    let max_bytes = limits.max_file_size_bytes;

    // Honest upstreams announce oversized bodies up front; reject those
    // without reading a single chunk. Liars are caught by the per-chunk check.
    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(IngestError::SizeLimit {
                attempted: len,
                max: max_bytes,
            });
        }
    }

    let mut bytes: Vec<u8> = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(classify_reqwest_error)?;
        let attempted = bytes.len() as u64 + chunk.len() as u64;
        if attempted > max_bytes {
            // Dropping the stream here closes the connection; the remainder
            // of the body is never read.
            return Err(IngestError::SizeLimit {
                attempted,
                max: max_bytes,
            });
        }
        bytes.extend_from_slice(&chunk);
    }

    debug!(url = %url, size = bytes.len(), content_type = ?content_type, "download complete");

    Ok(Download {
        bytes,
        content_type,
        extension,
    })
}

fn classify_reqwest_error(e: reqwest::Error) -> IngestError {
    if e.is_timeout() {
        debug!(error = %e, "download timed out");
        IngestError::Timeout
    } else {
        debug!(error = %e, "download failed");
        IngestError::Network
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_maps_to_extensions() {
        assert_eq!(extension_for("application/pdf"), Some("pdf"));
        assert_eq!(
            extension_for(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            Some("docx")
        );
        assert_eq!(extension_for("text/csv"), Some("csv"));
        assert_eq!(extension_for("application/zip"), Some("zip"));
        assert_eq!(extension_for("application/octet-stream"), None);
        assert_eq!(extension_for("application/x-sh"), None);
    }

    #[test]
    fn media_type_drops_parameters_and_case() {
        assert_eq!(media_type("text/HTML; charset=UTF-8"), "text/html");
        assert_eq!(media_type("application/pdf"), "application/pdf");
        assert_eq!(media_type("  Text/Plain ;boundary=x"), "text/plain");
    }
}
