//! URL validator (C3): rejects non-HTTP(S) schemes and addresses resolving
//! to private/loopback/link-local ranges.
//!
//! Grounded on the teacher's `web_fetch.rs::{is_private_ip, validate_url}`
//! almost verbatim, generalized per spec §4.4 step 1 with the ranges the
//! teacher's fetch skill didn't need to block: the IPv4 current-network
//! block (`0.0.0.0/8`), the IPv4 broadcast address, IPv4-mapped IPv6
//! variants of any blocked IPv4 range, and the `localhost` / `*.localhost`
//! / `localhost.*` hostname literals. DNS resolution is async
//! (`tokio::net::lookup_host`) rather than the teacher's blocking
//! `to_socket_addrs`, since the dispatcher runs inside the tokio scheduler
//! loop.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use reqwest::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsrfRejection(pub String);

impl std::fmt::Display for SsrfRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn reject(msg: impl Into<String>) -> SsrfRejection {
    SsrfRejection(msg.into())
}

/// P8: monotone in the deny list — adding more blocked ranges here can only
/// reject more URLs, never fewer.
fn is_blocked_v4(ip: &Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local() // includes cloud metadata 169.254.169.254
        || ip.is_broadcast()
        || ip.is_unspecified()
        || is_current_network(ip)
}

/// 0.0.0.0/8 — "this network" (RFC 791 §3.2).
fn is_current_network(ip: &Ipv4Addr) -> bool {
    ip.octets()[0] == 0
}

fn is_blocked_v6(ip: &Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    if is_unique_local(ip) || is_link_local(ip) {
        return true;
    }
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_blocked_v4(&mapped);
    }
    false
}

/// fc00::/7 unique-local (in practice fd00::/8).
fn is_unique_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xFE00) == 0xFC00
}

/// fe80::/10 link-local.
fn is_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xFFC0) == 0xFE80
}

fn is_blocked_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_blocked_v4(v4),
        IpAddr::V6(v6) => is_blocked_v6(v6),
    }
}

fn is_localhost_literal(host: &str) -> bool {
    let lower = host.to_ascii_lowercase();
    lower == "localhost" || lower.ends_with(".localhost") || lower.starts_with("localhost.")
}

/// Validates a URL for SSRF safety before dispatch. Async because a
/// non-literal hostname requires DNS resolution.
pub async fn validate_url(raw_url: &str) -> Result<(), SsrfRejection> {
    let parsed = Url::parse(raw_url).map_err(|e| reject(format!("invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(reject(format!("blocked scheme: {other}:// (only http/https allowed)"))),
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| reject("URL has no host"))?;

    if is_localhost_literal(host) {
        return Err(reject(format!("blocked hostname literal: {host}")));
    }

    if let Ok(literal_ip) = host.parse::<IpAddr>() {
        if is_blocked_ip(&literal_ip) {
            return Err(reject(format!(
                "blocked request to private/internal address: {literal_ip}"
            )));
        }
        return Ok(());
    }

    let port = parsed.port_or_known_default().unwrap_or(80);
    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| reject(format!("DNS resolution failed for {host}: {e}")))?
        .map(|sa| sa.ip())
        .collect();

    if addrs.is_empty() {
        return Err(reject(format!("DNS resolution returned no addresses for {host}")));
    }

    for addr in &addrs {
        if is_blocked_ip(addr) {
            return Err(reject(format!(
                "blocked request to private/internal address: {host} resolves to {addr}"
            )));
        }
    }

    Ok(())
}
