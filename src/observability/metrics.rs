//! Dispatch metrics - in-process counters and gauges
//!
//! Rendered as Prometheus text on the dashboard's `/metrics` route.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;

/// How a request left the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Served by the local dashboard
    Dashboard,
    /// Forwarded to a service
    Forwarded,
    /// Resolution failed, nothing forwarded
    Neutralized,
    Unauthorized,
    Forbidden,
    /// Authorization collaborator failed
    AuthError,
    /// Forwarding failed after a successful rewrite
    UpstreamError,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Forwarded => "forwarded",
            Self::Neutralized => "neutralized",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::AuthError => "auth_error",
            Self::UpstreamError => "upstream_error",
        }
    }
}

/// Point-in-time view of all metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    /// Responses by status class (2xx, 3xx, 4xx, 5xx)
    pub status_classes: BTreeMap<String, u64>,
    pub total_response_bytes: u64,
    pub active_connections: i64,
    pub outcomes: BTreeMap<String, u64>,
    /// Resolution failures by kind (invalid_path, not_found, directory)
    pub resolve_failures: BTreeMap<String, u64>,
    pub service_requests: BTreeMap<String, u64>,
    /// Cumulative upstream latency per service in microseconds
    pub service_latency_us: BTreeMap<String, u64>,
    /// Error responses (4xx + 5xx) per service
    pub service_errors: BTreeMap<String, u64>,
}

/// Metrics collector shared by every connection
pub struct DispatchMetrics {
    total_requests: AtomicU64,
    status_2xx: AtomicU64,
    status_3xx: AtomicU64,
    status_4xx: AtomicU64,
    status_5xx: AtomicU64,
    total_response_bytes: AtomicU64,
    active_connections: AtomicI64,
    outcomes: RwLock<BTreeMap<String, u64>>,
    resolve_failures: RwLock<BTreeMap<String, u64>>,
    service_requests: RwLock<BTreeMap<String, u64>>,
    service_latency_us: RwLock<BTreeMap<String, u64>>,
    service_errors: RwLock<BTreeMap<String, u64>>,
}

fn bump(map: &RwLock<BTreeMap<String, u64>>, key: &str, by: u64) {
    let mut map = map.write().unwrap_or_else(|e| e.into_inner());
    *map.entry(key.to_string()).or_insert(0) += by;
}

fn read(map: &RwLock<BTreeMap<String, u64>>) -> BTreeMap<String, u64> {
    map.read().unwrap_or_else(|e| e.into_inner()).clone()
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            status_2xx: AtomicU64::new(0),
            status_3xx: AtomicU64::new(0),
            status_4xx: AtomicU64::new(0),
            status_5xx: AtomicU64::new(0),
            total_response_bytes: AtomicU64::new(0),
            active_connections: AtomicI64::new(0),
            outcomes: RwLock::new(BTreeMap::new()),
            resolve_failures: RwLock::new(BTreeMap::new()),
            service_requests: RwLock::new(BTreeMap::new()),
            service_latency_us: RwLock::new(BTreeMap::new()),
            service_errors: RwLock::new(BTreeMap::new()),
        }
    }

    /// Record a completed request
    pub fn record_request(&self, status: u16, response_bytes: u64, outcome: Outcome) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_bytes
            .fetch_add(response_bytes, Ordering::Relaxed);

        let class = match status / 100 {
            2 => &self.status_2xx,
            3 => &self.status_3xx,
            4 => &self.status_4xx,
            5 => &self.status_5xx,
            _ => return bump(&self.outcomes, outcome.as_str(), 1),
        };
        class.fetch_add(1, Ordering::Relaxed);
        bump(&self.outcomes, outcome.as_str(), 1);
    }

    /// Record a resolution failure by kind
    pub fn record_resolve_failure(&self, kind: &str) {
        bump(&self.resolve_failures, kind, 1);
    }

    /// Record a request handled for a service, with its status and latency
    pub fn record_service(&self, service: &str, status: u16, latency_us: u64) {
        bump(&self.service_requests, service, 1);
        bump(&self.service_latency_us, service, latency_us);
        if status >= 400 {
            bump(&self.service_errors, service, 1);
        }
    }

    pub fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> i64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Take a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let status_classes = [
            ("2xx", &self.status_2xx),
            ("3xx", &self.status_3xx),
            ("4xx", &self.status_4xx),
            ("5xx", &self.status_5xx),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.load(Ordering::Relaxed)))
        .collect();

        MetricsSnapshot {
            total_requests: self.total_requests(),
            status_classes,
            total_response_bytes: self.total_response_bytes.load(Ordering::Relaxed),
            active_connections: self.active_connections(),
            outcomes: read(&self.outcomes),
            resolve_failures: read(&self.resolve_failures),
            service_requests: read(&self.service_requests),
            service_latency_us: read(&self.service_latency_us),
            service_errors: read(&self.service_errors),
        }
    }

    /// Render metrics in Prometheus text exposition format
    pub fn render_prometheus(&self) -> String {
        let snap = self.snapshot();
        let mut out = String::new();

        scalar(&mut out, "dispatch_requests_total", "Total number of requests", "counter", snap.total_requests as i64);
        labelled(
            &mut out,
            "dispatch_responses_total",
            "Total responses by status class",
            "status_class",
            &snap.status_classes,
        );
        scalar(
            &mut out,
            "dispatch_response_bytes_total",
            "Total response bytes",
            "counter",
            snap.total_response_bytes as i64,
        );
        scalar(
            &mut out,
            "dispatch_active_connections",
            "Current active connections",
            "gauge",
            snap.active_connections,
        );
        labelled(&mut out, "dispatch_outcomes_total", "Requests by outcome", "outcome", &snap.outcomes);
        labelled(
            &mut out,
            "dispatch_resolve_failures_total",
            "Resolution failures by kind",
            "kind",
            &snap.resolve_failures,
        );
        labelled(
            &mut out,
            "dispatch_service_requests_total",
            "Requests per service",
            "service",
            &snap.service_requests,
        );
        labelled(
            &mut out,
            "dispatch_service_latency_microseconds_total",
            "Cumulative latency per service in microseconds",
            "service",
            &snap.service_latency_us,
        );
        labelled(
            &mut out,
            "dispatch_service_errors_total",
            "Error responses (4xx+5xx) per service",
            "service",
            &snap.service_errors,
        );

        out
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn scalar(out: &mut String, name: &str, help: &str, kind: &str, value: i64) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
    let _ = writeln!(out, "{} {}", name, value);
}

fn labelled(out: &mut String, name: &str, help: &str, label: &str, values: &BTreeMap<String, u64>) {
    if values.is_empty() {
        return;
    }
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} counter", name);
    for (key, count) in values {
        let _ = writeln!(out, "{}{{{}=\"{}\"}} {}", name, label, key.replace('"', "\\\""), count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let m = DispatchMetrics::new();
        assert_eq!(m.total_requests(), 0);
        assert_eq!(m.active_connections(), 0);
        assert!(m.snapshot().outcomes.is_empty());
    }

    #[test]
    fn test_record_request_status_classes() {
        let m = DispatchMetrics::new();
        m.record_request(200, 10, Outcome::Forwarded);
        m.record_request(302, 0, Outcome::Unauthorized);
        m.record_request(401, 5, Outcome::Unauthorized);
        m.record_request(502, 5, Outcome::Neutralized);
        m.record_request(502, 5, Outcome::Neutralized);

        let snap = m.snapshot();
        assert_eq!(snap.total_requests, 5);
        assert_eq!(snap.total_response_bytes, 25);
        assert_eq!(snap.status_classes["2xx"], 1);
        assert_eq!(snap.status_classes["3xx"], 1);
        assert_eq!(snap.status_classes["4xx"], 1);
        assert_eq!(snap.status_classes["5xx"], 2);
        assert_eq!(snap.outcomes["neutralized"], 2);
        assert_eq!(snap.outcomes["unauthorized"], 2);
    }

    #[test]
    fn test_unknown_status_class_still_counts_outcome() {
        let m = DispatchMetrics::new();
        m.record_request(101, 0, Outcome::Forwarded);
        let snap = m.snapshot();
        assert_eq!(snap.total_requests, 1);
        assert_eq!(snap.outcomes["forwarded"], 1);
        assert_eq!(snap.status_classes.values().sum::<u64>(), 0);
    }

    #[test]
    fn test_connections() {
        let m = DispatchMetrics::new();
        m.inc_connections();
        m.inc_connections();
        m.dec_connections();
        assert_eq!(m.active_connections(), 1);
    }

    #[test]
    fn test_service_metrics() {
        let m = DispatchMetrics::new();
        m.record_service("acme.catalog", 200, 120);
        m.record_service("acme.catalog", 503, 80);
        let snap = m.snapshot();
        assert_eq!(snap.service_requests["acme.catalog"], 2);
        assert_eq!(snap.service_latency_us["acme.catalog"], 200);
        assert_eq!(snap.service_errors["acme.catalog"], 1);
    }

    #[test]
    fn test_resolve_failures_by_kind() {
        let m = DispatchMetrics::new();
        m.record_resolve_failure("not_found");
        m.record_resolve_failure("directory");
        m.record_resolve_failure("not_found");
        let snap = m.snapshot();
        assert_eq!(snap.resolve_failures["not_found"], 2);
        assert_eq!(snap.resolve_failures["directory"], 1);
    }

    #[test]
    fn test_prometheus_format() {
        let m = DispatchMetrics::new();
        m.record_request(200, 42, Outcome::Dashboard);
        m.record_service("catalog", 200, 10);
        let out = m.render_prometheus();
        assert!(out.contains("# TYPE dispatch_requests_total counter"));
        assert!(out.contains("dispatch_requests_total 1"));
        assert!(out.contains("dispatch_responses_total{status_class=\"2xx\"} 1"));
        assert!(out.contains("dispatch_active_connections 0"));
        assert!(out.contains("dispatch_outcomes_total{outcome=\"dashboard\"} 1"));
        assert!(out.contains("dispatch_service_requests_total{service=\"catalog\"} 1"));
        assert!(!out.contains("dispatch_resolve_failures_total"));
    }

    #[test]
    fn test_snapshot_serialization() {
        let m = DispatchMetrics::new();
        m.record_request(403, 0, Outcome::Forbidden);
        let json = serde_json::to_value(m.snapshot()).unwrap();
        assert_eq!(json["total_requests"], 1);
        assert_eq!(json["outcomes"]["forbidden"], 1);
    }
}
