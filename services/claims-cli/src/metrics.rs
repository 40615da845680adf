//! Prometheus exposition for the gateway counters
//!
//! The gateway crate emits through the `metrics` facade; this installs the
//! process-wide recorder so those counters can be rendered after a command.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_counters_render_through_prometheus() {
        // Local recorder; install_recorder() can only succeed once per process
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = metrics::set_default_local_recorder(&recorder);

        claims_gateway::metrics::record_dispatch("success");
        claims_gateway::metrics::record_retry();

        let output = handle.render();
        assert!(output.contains("gateway_requests_total"), "got: {output}");
        assert!(output.contains("outcome=\"success\""), "got: {output}");
        assert!(output.contains("gateway_retries_total"), "got: {output}");
    }
}
