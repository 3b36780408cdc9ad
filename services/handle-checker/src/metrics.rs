//! Prometheus metrics snapshot
//!
//! The engine emits through the `metrics` facade (see
//! `handle_pool::metrics`). This module installs the recorder that collects
//! those series and writes the text exposition to a file at end of run.

use std::path::Path;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

use crate::error::{Error, Result};

/// Bucket boundaries for probe latency: 5ms up to 60s.
const PROBE_DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// Builder with the probe-duration histogram rendered as buckets rather
/// than the default summary.
fn builder() -> std::result::Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(handle_pool::metrics::PROBE_DURATION_METRIC.to_string()),
        PROBE_DURATION_BUCKETS,
    )
}

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> std::result::Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Write the current text exposition to `path`, replacing any previous file.
pub async fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    tokio::fs::write(path, handle.render())
        .await
        .map_err(|source| Error::MetricsSnapshot {
            path: path.to_path_buf(),
            source,
        })
}
