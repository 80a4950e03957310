//! Canonical form of a URL used as the crawl's dedup key.
//!
//! Scheme and host are lowercased, a port equal to the scheme default is
//! dropped, an empty path becomes `/` and the fragment is discarded. Path,
//! parameters and query are kept byte-for-byte, so this works on the raw
//! string and only uses [`Url`] to reject input that does not parse.

use crate::error::{Result, ScanError};
use url::Url;

/// Default port for the schemes the crawler can fetch.
pub fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Canonicalize `raw` into a comparable string.
pub fn normalize(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let parsed =
        Url::parse(raw).map_err(|e| ScanError::MalformedUrl(format!("{}: {}", raw, e)))?;

    let Some((scheme, rest)) = raw.split_once(':') else {
        return Err(ScanError::MalformedUrl(raw.to_string()));
    };
    let scheme = scheme.to_ascii_lowercase();
    let rest = rest.split('#').next().unwrap_or_default();

    let Some(after_slashes) = rest.strip_prefix("//") else {
        if parsed.has_host() {
            // "http:example.org" style input; let the parser lay it out
            let mut parsed = parsed;
            parsed.set_fragment(None);
            return Ok(parsed.to_string());
        }
        return Ok(format!("{}:{}", scheme, rest));
    };

    let authority_end = after_slashes
        .find(['/', '?', '\\'])
        .unwrap_or(after_slashes.len());
    let (authority, tail) = after_slashes.split_at(authority_end);

    let (userinfo, host_port) = match authority.rfind('@') {
        Some(at) => authority.split_at(at + 1),
        None => ("", authority),
    };
    let (host, port) = split_port(host_port);

    let mut normalized = String::with_capacity(raw.len());
    normalized.push_str(&scheme);
    normalized.push_str("://");
    normalized.push_str(userinfo);
    normalized.push_str(&host.to_ascii_lowercase());

    if let Some(port) = port {
        let is_default = port
            .parse::<u16>()
            .ok()
            .zip(default_port(&scheme))
            .is_some_and(|(port, default)| port == default);
        if !port.is_empty() && !is_default {
            normalized.push(':');
            normalized.push_str(port);
        }
    }

    if !tail.starts_with('/') && !tail.starts_with('\\') {
        normalized.push('/');
    }
    normalized.push_str(tail);

    Ok(normalized)
}

/// Split `host[:port]`, leaving bracketed IPv6 literals intact.
fn split_port(host_port: &str) -> (&str, Option<&str>) {
    let search_from = host_port.rfind(']').unwrap_or(0);
    match host_port[search_from..].rfind(':') {
        Some(idx) => {
            let idx = search_from + idx;
            (&host_port[..idx], Some(&host_port[idx + 1..]))
        }
        None => (host_port, None),
    }
}
