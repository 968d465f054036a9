//! Prometheus metrics
//!
//! The exporter is optional. Without it the `metrics` macros record into a
//! no-op recorder, so every helper here is safe to call unconditionally.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Start the Prometheus exporter on `host:port` (`/metrics`)
pub fn init_metrics(host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    PrometheusBuilder::new().with_http_listener(addr).install()?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// HTTP server metrics
///
/// * `server_requests_total`
/// * `server_requests_by_status{status}`
/// * `server_request_duration_seconds`
/// * `server_active_connections`
#[derive(Clone)]
pub struct ServerMetrics {
    requests_total: Counter,
    request_duration: Histogram,
    active_connections: Gauge,
    server_name: String,
}

impl ServerMetrics {
    pub fn new(server_name: &str) -> Self {
        let name = server_name.to_string();

        Self {
            requests_total: counter!("server_requests_total", "server" => name.clone()),
            request_duration: histogram!("server_request_duration_seconds", "server" => name.clone()),
            active_connections: gauge!("server_active_connections", "server" => name.clone()),
            server_name: name,
        }
    }

    /// Record a completed request
    pub fn record_request(&self, duration: Duration, status_code: u16) {
        self.requests_total.increment(1);
        counter!(
            "server_requests_by_status",
            "server" => self.server_name.clone(),
            "status" => status_code.to_string()
        )
        .increment(1);
        self.request_duration.record(duration.as_secs_f64());
    }

    pub fn connection_opened(&self) {
        self.active_connections.increment(1.0);
    }

    pub fn connection_closed(&self) {
        self.active_connections.decrement(1.0);
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }
}

/// Records the request duration when dropped
pub struct RequestMetricsGuard<'a> {
    metrics: &'a ServerMetrics,
    start: Instant,
    status_code: u16,
}

impl<'a> RequestMetricsGuard<'a> {
    pub fn new(metrics: &'a ServerMetrics) -> Self {
        metrics.connection_opened();
        Self {
            metrics,
            start: Instant::now(),
            status_code: 200,
        }
    }

    /// Set the status code (call before drop)
    pub fn set_status(&mut self, code: u16) {
        self.status_code = code;
    }
}

impl Drop for RequestMetricsGuard<'_> {
    fn drop(&mut self) {
        self.metrics.connection_closed();
        self.metrics
            .record_request(self.start.elapsed(), self.status_code);
    }
}

/// Exchange-level counters
///
/// * `exchange_orders_total{type}` accepted orders
/// * `exchange_trades_total` executed slices
/// * `exchange_rejections_total{reason}` refused requests
/// * `exchange_users_total` created users
#[derive(Clone)]
pub struct ExchangeMetrics {
    trades_total: Counter,
    users_total: Counter,
}

impl ExchangeMetrics {
    pub fn new() -> Self {
        Self {
            trades_total: counter!("exchange_trades_total"),
            users_total: counter!("exchange_users_total"),
        }
    }

    pub fn order_accepted(&self, side: &str) {
        counter!("exchange_orders_total", "type" => side.to_string()).increment(1);
    }

    pub fn trade_executed(&self) {
        self.trades_total.increment(1);
    }

    pub fn user_created(&self) {
        self.users_total.increment(1);
    }

    pub fn rejected(&self, reason: &'static str) {
        counter!("exchange_rejections_total", "reason" => reason).increment(1);
    }
}

impl Default for ExchangeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
