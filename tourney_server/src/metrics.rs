//! Prometheus metrics for the ledger service.
//!
//! Metrics are exposed in Prometheus text format when a scrape address is
//! configured; otherwise the macros below record into a no-op recorder.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: Request counts and durations
//! - **Tournament Metrics**: Join and settlement outcomes
//! - **Ledger Metrics**: Points credited and debited
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use tourney_server::metrics;
//! use std::net::SocketAddr;
//!
//! // Initialize metrics exporter
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! // Record HTTP request
//! metrics::http_requests_total("POST", "/tournament/v0/user/fund", 200);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Sets up a Prometheus scrape endpoint on the specified address.
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
///
/// # Returns
///
/// Result indicating success or error message
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
///
/// Increments the total HTTP request counter with method, path, and status labels.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Tournament Metrics
// ============================================================================

/// Count a join attempt by outcome (`ok` or the failure status).
pub fn tournament_joins_total(result: &str) {
    metrics::counter!("tournament_joins_total",
        "result" => result.to_string()
    )
    .increment(1);
}

/// Count a settlement attempt by outcome (`ok` or the failure status).
pub fn tournament_settlements_total(result: &str) {
    metrics::counter!("tournament_settlements_total",
        "result" => result.to_string()
    )
    .increment(1);
}

// ============================================================================
// Ledger Metrics
// ============================================================================

/// Add points moved by committed operations (`credit` or `debit`).
pub fn points_moved_total(kind: &str, points: i64) {
    if points > 0 {
        metrics::counter!("points_moved_total",
            "kind" => kind.to_string()
        )
        .increment(points as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_exporter_is_noop() {
        http_requests_total("GET", "/health", 200);
        http_request_duration_ms("GET", "/health", 1.5);
        tournament_joins_total("ok");
        tournament_settlements_total("409");
        points_moved_total("credit", 30);
        points_moved_total("debit", 0);
    }
}
