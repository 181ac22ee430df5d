//! Candidate URL validation.
//!
//! Scheme and hostname checks run before any DNS resolution, so a `file://`
//! or `ftp://` URL never touches the resolver. IP-literal hosts (including
//! bracketed IPv6 literals) are classified directly; domain names are handed
//! to [`crate::netguard`] for resolution and deny-list classification.

use std::net::IpAddr;

use url::{Host, Url};

use crate::config::SecurityConfig;
use crate::error::IngestError;
use crate::netguard;

const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Parses and validates `raw`, returning the parsed URL on success.
pub async fn validate_url(raw: &str, security: &SecurityConfig) -> Result<Url, IngestError> {
    let url = Url::parse(raw).map_err(|_| IngestError::InvalidUrl)?;

    if !ALLOWED_SCHEMES.contains(&url.scheme()) {
        return Err(IngestError::SchemeNotAllowed);
    }

    match url.host() {
        Some(Host::Ipv4(v4)) => netguard::classify(IpAddr::V4(v4), security.allow_loopback)?,
        Some(Host::Ipv6(v6)) => netguard::classify(IpAddr::V6(v6), security.allow_loopback)?,
        Some(Host::Domain(domain)) => {
            let port = url.port_or_known_default().unwrap_or(80);
            netguard::resolve_and_classify(domain, port, security.allow_loopback).await?;
        }
        None => return Err(IngestError::InvalidUrl),
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn security() -> SecurityConfig {
        SecurityConfig::default()
    }

    #[tokio::test]
    async fn rejects_file_scheme_before_resolution() {
        // /etc/passwd is no hostname; the scheme check must fire first.
        let err = validate_url("file:///etc/passwd", &security())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::SchemeNotAllowed));
    }

    #[tokio::test]
    async fn rejects_ftp_scheme() {
        let err = validate_url("ftp://example.com/file.pdf", &security())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::SchemeNotAllowed));
    }

    #[tokio::test]
    async fn rejects_unparseable_url() {
        let err = validate_url("http//missing-colon", &security())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidUrl));
    }

    #[tokio::test]
    async fn blocks_loopback_regardless_of_path_and_query() {
        for raw in [
            "http://127.0.0.1/x.pdf",
            "http://127.0.0.1:8080/deep/path?q=1",
            "https://[::1]/file.pdf",
        ] {
            let err = validate_url(raw, &security()).await.unwrap_err();
            assert!(
                matches!(err, IngestError::ForbiddenAddress),
                "expected block for {raw}"
            );
        }
    }

    #[tokio::test]
    async fn classifies_ipv6_literals_without_resolution() {
        // Bracketed literals never reach the resolver; deny-listed ranges
        // come back as blocks, not resolution failures.
        for raw in ["https://[::1]/file.pdf", "http://[fd00::1]:8080/x"] {
            let err = validate_url(raw, &security()).await.unwrap_err();
            assert!(
                matches!(err, IngestError::ForbiddenAddress),
                "expected block for {raw}"
            );
        }
        assert!(validate_url("https://[2606:4700::1111]/doc.pdf", &security())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn blocks_metadata_endpoint() {
        let err = validate_url("http://169.254.169.254/latest/meta-data/", &security())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::ForbiddenAddress));
    }

    #[tokio::test]
    async fn loopback_override_admits_local_urls() {
        let security = SecurityConfig {
            allow_loopback: true,
        };
        assert!(validate_url("http://127.0.0.1:9999/x.pdf", &security)
            .await
            .is_ok());
    }
}
