//! Error taxonomy for the ingestion pipeline.
//!
//! Every variant's `Display` text is the sanitized, user-facing message — it is
//! the only string that crosses the caller boundary: no resolved IPs, no
//! filesystem paths, no upstream response bodies. Structured detail needed for
//! the audit trail lives in variant fields and is consumed by telemetry only.

use thiserror::Error;

/// Failure modes of a single ingestion request.
///
/// All failures are terminal for the request; nothing in the pipeline retries.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Request shape violation: neither or both of `fileUrl`/`fileBase64` set.
    #[error("either a URL or inline payload must be provided, but not both")]
    Input,

    /// URL failed to parse or lacks a scheme/hostname.
    #[error("invalid URL")]
    InvalidUrl,

    /// Scheme outside the {http, https} whitelist (e.g. `file`, `ftp`).
    #[error("URL scheme not allowed")]
    SchemeNotAllowed,

    /// DNS resolution returned no addresses.
    #[error("cannot resolve hostname")]
    Resolution,

    /// A resolved address fell in a deny-listed range. The offending host and
    /// address are logged server-side at the block site, never echoed here.
    #[error("access to private or internal addresses is forbidden")]
    ForbiddenAddress,

    /// Connect or total download timeout exceeded.
    #[error("download timed out")]
    Timeout,

    /// Network-level failure that is neither a timeout nor an HTTP status.
    #[error("failed to download file")]
    Network,

    /// Upstream returned a non-2xx status. The status code is safe to surface;
    /// the response body is not and is never read.
    #[error("failed to download file: HTTP {status}")]
    HttpStatus { status: u16 },

    /// Declared `Content-Type` is outside the download whitelist.
    #[error("content type is not supported")]
    BlockedContentType { content_type: String },

    /// Cumulative size crossed the configured ceiling (mid-stream for
    /// downloads, pre-decode for inline payloads).
    #[error("file size exceeds the maximum allowed")]
    SizeLimit { attempted: u64, max: u64 },

    /// Inline payload is not valid base64.
    #[error("invalid base64 encoding")]
    Encoding,

    /// Temporary-storage staging failed. Underlying I/O detail is logged,
    /// not surfaced.
    #[error("internal storage error")]
    Staging,

    /// The external converter rejected the staged file. Only the converter
    /// error's class is recorded; its message may contain paths.
    #[error("document conversion failed; verify the file format is supported")]
    Conversion { class: &'static str },
}

impl IngestError {
    /// Short machine-readable class name, used in telemetry events and in the
    /// HTTP error body's `code` field.
    pub fn class(&self) -> &'static str {
        match self {
            IngestError::Input => "input",
            IngestError::InvalidUrl => "invalid_url",
            IngestError::SchemeNotAllowed => "scheme_not_allowed",
            IngestError::Resolution => "resolution",
            IngestError::ForbiddenAddress => "forbidden_address",
            IngestError::Timeout => "timeout",
            IngestError::Network => "network",
            IngestError::HttpStatus { .. } => "http_status",
            IngestError::BlockedContentType { .. } => "blocked_content_type",
            IngestError::SizeLimit { .. } => "size_limit",
            IngestError::Encoding => "encoding",
            IngestError::Staging => "staging",
            IngestError::Conversion { .. } => "conversion",
        }
    }

    /// Whether this failure is a security-policy rejection (deny-listed
    /// address, disallowed content type, size ceiling).
    pub fn is_security_block(&self) -> bool {
        matches!(
            self,
            IngestError::ForbiddenAddress
                | IngestError::BlockedContentType { .. }
                | IngestError::SizeLimit { .. }
        )
    }
}
