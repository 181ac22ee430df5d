//! Hostname resolution and SSRF address classification.
//!
//! Resolution happens once, before the fetch establishes any connection.
//! Every resolved address is checked against a fixed deny-list of ranges:
//! loopback, RFC 1918 private blocks, link-local / cloud-metadata, and their
//! IPv6 equivalents. A match fails the request with a generic error; the
//! offending host and address are logged server-side only.
//!
//! Known gap: the classified address is not pinned for the subsequent TCP
//! connect, so a DNS-rebinding attacker that re-resolves between validation
//! and connect is not stopped. See DESIGN.md.

use std::net::{IpAddr, Ipv6Addr};

use tokio::net::lookup_host;
use tracing::warn;

use crate::error::IngestError;

/// Returns true when the address falls in a deny-listed range.
///
/// IPv4: 127.0.0.0/8, 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16,
/// 169.254.0.0/16. IPv6: ::1/128, fc00::/7, fe80::/10, plus IPv4-mapped
/// addresses re-checked as IPv4.
pub fn is_forbidden(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_forbidden(IpAddr::V4(v4));
            }
            v6.is_loopback()
                || v6.is_unspecified()
                || is_unique_local(&v6)
                || is_v6_link_local(&v6)
        }
    }
}

// fc00::/7
fn is_unique_local(v6: &Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xfe00) == 0xfc00
}

// fe80::/10
fn is_v6_link_local(v6: &Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xffc0) == 0xfe80
}

/// Classifies a single address against the deny-list.
///
/// With `allow_loopback`, loopback addresses (and only loopback) pass —
/// private, link-local, and metadata ranges stay blocked. IP-literal hosts
/// use this directly; no DNS is involved for them.
pub fn classify(ip: IpAddr, allow_loopback: bool) -> Result<(), IngestError> {
    if allow_loopback && is_loopback(ip) {
        return Ok(());
    }
    if is_forbidden(ip) {
        warn!(address = %ip, "blocked deny-listed address");
        return Err(IngestError::ForbiddenAddress);
    }
    Ok(())
}

/// Resolves `host` and classifies every returned address.
///
/// Fails with [`IngestError::Resolution`] when nothing resolves and
/// [`IngestError::ForbiddenAddress`] when any address is deny-listed.
pub async fn resolve_and_classify(
    host: &str,
    port: u16,
    allow_loopback: bool,
) -> Result<Vec<IpAddr>, IngestError> {
    let addrs = lookup_host((host, port)).await.map_err(|e| {
        warn!(host, error = %e, "hostname resolution failed");
        IngestError::Resolution
    })?;

    let ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
    if ips.is_empty() {
        return Err(IngestError::Resolution);
    }

    for ip in &ips {
        if let Err(e) = classify(*ip, allow_loopback) {
            warn!(host, "hostname resolved to a deny-listed address");
            return Err(e);
        }
    }

    Ok(ips)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback()),
    }
}
