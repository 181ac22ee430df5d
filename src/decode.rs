//! Inline base64 payload decoding.
//!
//! The raw text length is checked against the ceiling **before** decoding:
//! decoding an attacker-sized payload first would itself be a resource
//! exhaustion vector. Decoding is strict — invalid characters fail rather
//! than being skipped.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::config::LimitsConfig;
use crate::error::IngestError;
use crate::fetch::{Download, DEFAULT_EXTENSION};

/// Decodes an inline base64 payload into a [`Download`].
///
/// Inline payloads carry no content-type signal, so the staging extension is
/// always [`DEFAULT_EXTENSION`].
pub fn decode(payload: &str, limits: &LimitsConfig) -> Result<Download, IngestError> {
    let len = payload.len() as u64;
    if len > limits.max_base64_bytes {
        return Err(IngestError::SizeLimit {
            attempted: len,
            max: limits.max_base64_bytes,
        });
    }

    let bytes = STANDARD.decode(payload).map_err(|_| IngestError::Encoding)?;

    Ok(Download {
        bytes,
        content_type: None,
        extension: DEFAULT_EXTENSION,
    })
}
