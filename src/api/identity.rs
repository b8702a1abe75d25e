//! Caller identity for rate limiting
//!
//! The identity is the client IP address as seen through the configured
//! proxy chain:
//! - `cloudflare` trusts CF-Connecting-IP
//! - `standard` walks Forwarded / X-Forwarded-For right to left, skipping
//!   trusted proxies
//! - `none` uses the socket peer address
//!
//! When no address can be determined every such caller shares the
//! [`UNKNOWN_IDENTITY`] bucket.

use axum::http::HeaderMap;
use std::net::IpAddr;

use crate::config::{ProxyConfig, TrustedProxyMode};

pub const UNKNOWN_IDENTITY: &str = "unknown";

pub fn caller_identity(
    headers: &HeaderMap,
    socket_ip: Option<IpAddr>,
    config: &ProxyConfig,
) -> String {
    extract_client_ip(headers, socket_ip, config)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
}

/// Extract the client IP address from request metadata
///
/// # Arguments
/// * `headers` - HTTP request headers
/// * `socket_ip` - Peer address, when the server was started with connect info
/// * `config` - Proxy trust settings
///
/// # Returns
/// The client IP according to the trust mode, falling back to the socket
/// address, or `None` when neither is available
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_ip: Option<IpAddr>,
    config: &ProxyConfig,
) -> Option<IpAddr> {
    match config.mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).or(socket_ip),
        TrustedProxyMode::Standard => extract_standard_ip(headers, config).or(socket_ip),
        TrustedProxyMode::None => socket_ip,
    }
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Prefer RFC 7239 Forwarded, then X-Forwarded-For
fn extract_standard_ip(headers: &HeaderMap, config: &ProxyConfig) -> Option<IpAddr> {
    let chain = forwarded_chain(headers).or_else(|| x_forwarded_for_chain(headers))?;
    first_untrusted_from_right(&chain, config)
}

/// `for=` addresses of a Forwarded header, in hop order
fn forwarded_chain(headers: &HeaderMap) -> Option<Vec<IpAddr>> {
    let forwarded = headers.get("forwarded")?.to_str().ok()?;

    let chain: Vec<IpAddr> = forwarded
        .split(',')
        .flat_map(|element| element.split(';'))
        .filter_map(|param| {
            let value = param.trim();
            let value = value
                .strip_prefix("for=")
                .or_else(|| value.strip_prefix("For="))?;
            parse_forwarded_node(value)
        })
        .collect();

    (!chain.is_empty()).then_some(chain)
}

/// Accepts `192.0.2.60`, `"192.0.2.60:4711"` and `"[2001:db8::1]:4711"`
fn parse_forwarded_node(value: &str) -> Option<IpAddr> {
    let value = value.trim_matches('"');
    if let Some(rest) = value.strip_prefix('[') {
        return rest.split(']').next()?.parse().ok();
    }
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }
    value.split(':').next()?.parse().ok()
}

fn x_forwarded_for_chain(headers: &HeaderMap) -> Option<Vec<IpAddr>> {
    let xff = headers.get("x-forwarded-for")?.to_str().ok()?;

    let chain: Vec<IpAddr> = xff
        .split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    (!chain.is_empty()).then_some(chain)
}

/// Rightmost hop that is not a trusted proxy; the leftmost hop if all are trusted
fn first_untrusted_from_right(chain: &[IpAddr], config: &ProxyConfig) -> Option<IpAddr> {
    chain
        .iter()
        .rev()
        .find(|ip| !config.trusted_proxies.iter().any(|net| net.contains(*ip)))
        .or_else(|| chain.first())
        .copied()
}
