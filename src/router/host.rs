//! Host helpers - normalization, IP detection, label reversal

use std::net::IpAddr;

/// Effective host of a request: URI host first, else the Host header, port stripped
///
/// Returns `None` when neither carries a host.
pub fn normalize_host(uri: &http::Uri, host_header: Option<&str>) -> Option<String> {
    let raw = uri
        .host()
        .filter(|h| !h.is_empty())
        .or(host_header)?
        .trim();
    let host = strip_port(raw).trim_end_matches('.');
    if host.is_empty() {
        return None;
    }
    Some(host.to_ascii_lowercase())
}

/// Drop a trailing `:port`, unwrapping bracketed IPv6 literals
pub fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return match rest.find(']') {
            Some(end) => &rest[..end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        // a bare IPv6 literal has more than one colon and no port
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

/// Whether the host is a literal IPv4 or IPv6 address
pub fn is_ip_literal(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok()
}

/// `foo.bar.example` -> `example.bar.foo`, with the legacy `mu.micro` prefix
/// rewritten to `go.micro`
pub fn reverse_labels(host: &str) -> String {
    let mut labels: Vec<&str> = host.split('.').collect();
    labels.reverse();
    let namespace = labels.join(".");
    if namespace.starts_with("mu.micro") {
        namespace.replacen("mu.micro", "go.micro", 1)
    } else {
        namespace
    }
}

/// Labels of `host` in front of `base`, if `host` is a proper subdomain of it
pub(crate) fn subdomain_of<'a>(host: &'a str, base: &str) -> Option<&'a str> {
    host.strip_suffix(base)?
        .strip_suffix('.')
        .filter(|labels| !labels.is_empty())
}

/// Tenant of `<service>.<tenant>.<base>`; `None` for hosts with fewer labels
pub(crate) fn tenant_of(host: &str, base: &str) -> Option<String> {
    let labels = subdomain_of(host, base)?;
    let (_, tenant) = labels.split_once('.')?;
    if tenant.is_empty() {
        return None;
    }
    Some(tenant.to_string())
}
