//! Sync metrics
//!
//! Prometheus counters for the writes the syncer performs and the errors it
//! hits, registered in a crate-owned registry served by the binary.

use crate::error::{Error, Result};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

/// Metrics handle shared by the reconciler and the metrics endpoint
#[derive(Clone)]
pub struct SyncMetrics {
    registry: Registry,
    actions: IntCounterVec,
    errors: IntCounterVec,
    reconcile_duration: Histogram,
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics registration failed: {}", e))
}

impl SyncMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let actions = IntCounterVec::new(
            Opts::new(
                "volume_syncer_actions_total",
                "Writes performed against either control plane",
            ),
            &["action"],
        )
        .map_err(metrics_error)?;
        let errors = IntCounterVec::new(
            Opts::new("volume_syncer_errors_total", "Failed reconciliations by error kind"),
            &["kind"],
        )
        .map_err(metrics_error)?;
        let reconcile_duration = Histogram::with_opts(HistogramOpts::new(
            "volume_syncer_reconcile_duration_seconds",
            "Duration of a single pair reconciliation",
        ))
        .map_err(metrics_error)?;

        registry
            .register(Box::new(actions.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(errors.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(reconcile_duration.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            actions,
            errors,
            reconcile_duration,
        })
    }

    pub fn record_action(&self, action: &str) {
        self.actions.with_label_values(&[action]).inc();
    }

    pub fn record_error(&self, error: &Error) {
        self.errors.with_label_values(&[error.kind()]).inc();
    }

    pub fn observe_duration(&self, seconds: f64) {
        self.reconcile_duration.observe(seconds);
    }

    pub fn action_count(&self, action: &str) -> u64 {
        self.actions.with_label_values(&[action]).get()
    }

    pub fn error_count(&self, kind: &str) -> u64 {
        self.errors.with_label_values(&[kind]).get()
    }

    /// Text exposition format for `/metrics`
    pub fn encode(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_exported() {
        let metrics = SyncMetrics::new().unwrap();
        metrics.record_action("create_physical");
        metrics.record_action("create_physical");
        metrics.record_error(&Error::Configuration("bad".into()));

        assert_eq!(metrics.action_count("create_physical"), 2);
        assert_eq!(metrics.error_count("configuration"), 1);

        let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
        assert!(text.contains("volume_syncer_actions_total{action=\"create_physical\"} 2"));
    }
}
