//! Prometheus-compatible counters for the HTTP surfaces.

use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    http_requests_total: AtomicU64,
    /// Requests rejected for a missing or wrong key.
    auth_rejections_total: AtomicU64,
    a2a_deliveries_total: AtomicU64,
    a2a_failures_total: AtomicU64,
    executions_total: AtomicU64,
    execution_failures_total: AtomicU64,
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                http_requests_total: AtomicU64::new(0),
                auth_rejections_total: AtomicU64::new(0),
                a2a_deliveries_total: AtomicU64::new(0),
                a2a_failures_total: AtomicU64::new(0),
                executions_total: AtomicU64::new(0),
                execution_failures_total: AtomicU64::new(0),
                started_at: Instant::now(),
            }),
        }
    }

    pub fn inc_http_requests(&self) {
        self.inner
            .http_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_auth_rejections(&self) {
        self.inner
            .auth_rejections_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_a2a_deliveries(&self) {
        self.inner
            .a2a_deliveries_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_a2a_failures(&self) {
        self.inner.a2a_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_executions(&self) {
        self.inner.executions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_execution_failures(&self) {
        self.inner
            .execution_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    /// Render the server façade's metrics in Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let m = &self.inner;
        let mut out = self.render_common();
        write_metric(
            &mut out,
            "endercom_auth_rejections_total",
            "counter",
            "Requests rejected for a missing or invalid key.",
            m.auth_rejections_total.load(Ordering::Relaxed),
        );
        write_metric(
            &mut out,
            "endercom_a2a_deliveries_total",
            "counter",
            "Direct deliveries answered by the handler.",
            m.a2a_deliveries_total.load(Ordering::Relaxed),
        );
        write_metric(
            &mut out,
            "endercom_a2a_failures_total",
            "counter",
            "Direct deliveries whose handler failed.",
            m.a2a_failures_total.load(Ordering::Relaxed),
        );
        out
    }

    /// Render a function endpoint's metrics.
    pub fn render_function_prometheus(&self) -> String {
        let m = &self.inner;
        let mut out = self.render_common();
        write_metric(
            &mut out,
            "endercom_function_executions_total",
            "counter",
            "Function executions that returned output.",
            m.executions_total.load(Ordering::Relaxed),
        );
        write_metric(
            &mut out,
            "endercom_function_failures_total",
            "counter",
            "Function executions that failed.",
            m.execution_failures_total.load(Ordering::Relaxed),
        );
        out
    }

    fn render_common(&self) -> String {
        let mut out = String::new();
        write_metric(
            &mut out,
            "endercom_uptime_seconds",
            "gauge",
            "Time since the server started.",
            self.uptime_secs(),
        );
        write_metric(
            &mut out,
            "endercom_http_requests_total",
            "counter",
            "Total HTTP requests served.",
            self.inner.http_requests_total.load(Ordering::Relaxed),
        );
        out
    }
}

fn write_metric(out: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    if !out.is_empty() {
        out.push('\n');
    }
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
    let _ = writeln!(out, "{name} {value}");
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counter_increments() {
        let m = Metrics::new();
        m.inc_http_requests();
        m.inc_http_requests();
        m.inc_a2a_failures();
        let output = m.render_prometheus();
        assert!(output.contains("endercom_http_requests_total 2"));
        assert!(output.contains("endercom_a2a_failures_total 1"));
        assert!(output.contains("endercom_auth_rejections_total 0"));
    }

    #[test]
    fn test_metrics_prometheus_format() {
        let output = Metrics::new().render_prometheus();
        assert!(output.contains("# TYPE endercom_uptime_seconds gauge"));
        assert!(output.contains("# TYPE endercom_a2a_deliveries_total counter"));
        assert!(!output.contains("endercom_function_"));
    }

    #[test]
    fn test_function_metrics_omit_facade_counters() {
        let m = Metrics::new();
        m.inc_executions();
        m.inc_execution_failures();
        let output = m.render_function_prometheus();
        assert!(output.contains("endercom_function_executions_total 1"));
        assert!(output.contains("endercom_function_failures_total 1"));
        assert!(output.contains("endercom_http_requests_total 0"));
        assert!(!output.contains("endercom_a2a_"));
    }
}
