//! Secure temporary staging of validated payloads.
//!
//! Each request gets its own freshly created directory (restrictive
//! permissions, recognizable prefix) rather than a file in the shared temp
//! namespace, which closes symlink and predictable-name races. The filename
//! inside it is 16 bytes of cryptographic randomness, hex-encoded.
//!
//! Cleanup is guaranteed on every exit path: callers invoke
//! [`StagedFile::release`] on the normal path, and the `TempDir` held inside
//! removes the directory on drop for early returns and panics. Removal
//! failures are logged as warnings and never surfaced — cleanup trouble must
//! not mask the request's primary result.

use std::path::{Path, PathBuf};

use rand::RngCore;
use tempfile::TempDir;
use tracing::warn;

use crate::error::IngestError;
use crate::fetch::Download;

const STAGING_PREFIX: &str = "mdgate-";

/// A staged payload, exclusively owned by the request that created it.
pub struct StagedFile {
    dir: TempDir,
    path: PathBuf,
}

impl StagedFile {
    /// Full path of the staged file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the staging directory and its contents. Idempotent from the
    /// caller's perspective: after this the directory is gone, and dropping
    /// without calling it removes the directory too.
    pub fn release(self) {
        if let Err(e) = self.dir.close() {
            warn!(error = %e, "failed to remove staging directory");
        }
    }
}

/// Writes `download` into a fresh private directory under an unpredictable
/// filename, returning the handle that owns the directory's lifetime.
pub fn stage(download: &Download) -> Result<StagedFile, IngestError> {
    let dir = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir()
        .map_err(|e| {
            warn!(error = %e, "failed to create staging directory");
            IngestError::Staging
        })?;

    let mut name_bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut name_bytes);
    let file_name = format!("{}.{}", hex::encode(name_bytes), download.extension);

    let path = dir.path().join(&file_name);
    std::fs::write(&path, &download.bytes).map_err(|e| {
        warn!(error = %e, "failed to write staged file");
        IngestError::Staging
    })?;

    Ok(StagedFile { dir, path })
}
