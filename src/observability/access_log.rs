//! Structured access log - one JSON entry per dispatched request

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A single access log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// RFC 3339 timestamp
    pub timestamp: String,
    pub client_ip: String,
    pub method: String,
    pub path: String,
    /// Effective host after normalization
    pub host: Option<String>,
    pub status: u16,
    pub response_bytes: u64,
    pub duration_ms: u64,
    /// How the request was routed: dashboard, path or subdomain
    pub route: String,
    /// dashboard, forwarded, neutralized, unauthorized, ...
    pub outcome: String,
    /// Resolved service name
    pub service: Option<String>,
    /// Address the request was forwarded to
    pub upstream: Option<String>,
    pub user_agent: Option<String>,
}

/// Access log emitter
#[derive(Default)]
pub struct AccessLog {
    total_entries: AtomicU64,
}

impl AccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing a request
    pub fn start_request(&self) -> RequestTracker {
        RequestTracker {
            start: Instant::now(),
        }
    }

    /// Record and emit a log entry
    pub fn record(&self, entry: &AccessLogEntry) {
        self.total_entries.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            target: "access_log",
            client_ip = entry.client_ip,
            method = entry.method,
            path = entry.path,
            status = entry.status,
            duration_ms = entry.duration_ms,
            outcome = entry.outcome,
            service = entry.service.as_deref().unwrap_or("-"),
            upstream = entry.upstream.as_deref().unwrap_or("-"),
            "{}",
            serde_json::to_string(entry).unwrap_or_default()
        );
    }

    pub fn total_entries(&self) -> u64 {
        self.total_entries.load(Ordering::Relaxed)
    }
}

/// Times one request
pub struct RequestTracker {
    start: Instant,
}

impl RequestTracker {
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Stamp an entry with the current time and the elapsed duration
    pub fn finish(&self, mut entry: AccessLogEntry) -> AccessLogEntry {
        entry.timestamp = chrono::Utc::now().to_rfc3339();
        entry.duration_ms = self.elapsed_ms();
        entry
    }
}
