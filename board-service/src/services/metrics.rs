//! Metrics collection and Prometheus export.
//!
//! Installs the global recorder and renders the /metrics payload.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics recorder.
///
/// Safe to call more than once; only the first call installs a recorder.
pub fn init_metrics() {
    METRICS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if let Err(e) = metrics::set_global_recorder(recorder) {
            tracing::warn!(error = %e, "Metrics recorder already installed");
        }
        handle
    });
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub(crate) fn record_write(op: &'static str) {
    metrics::counter!("board_writes_total", "op" => op).increment(1);
}

pub(crate) fn record_conflict(op: &'static str) {
    metrics::counter!("board_write_conflicts_total", "op" => op).increment(1);
}

pub(crate) fn record_compaction(kind: &'static str) {
    metrics::counter!("ordering_compactions_total", "kind" => kind).increment(1);
}
