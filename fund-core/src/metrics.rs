//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `{namespace}_validations_total{operation,outcome}` - Validation calls by result
//! - `{namespace}_group_pointers` - Histogram of asset group pointers per call

use crate::Result;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Validation calls by operation and outcome
    pub validations_total: IntCounterVec,

    /// Pointer list length by operation
    pub group_pointers: HistogramVec,

    registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create a collector on its own registry
    pub fn new(namespace: &str) -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let validations_total = IntCounterVec::new(
            Opts::new("validations_total", "Validation calls by operation and outcome")
                .namespace(namespace),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(validations_total.clone()))?;

        let group_pointers = HistogramVec::new(
            HistogramOpts::new("group_pointers", "Asset group pointers per validation call")
                .namespace(namespace)
                .buckets(vec![0.0, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0]),
            &["operation"],
        )?;
        registry.register(Box::new(group_pointers.clone()))?;

        Ok(Self {
            validations_total,
            group_pointers,
            registry,
        })
    }

    /// Record the outcome of one validation call
    pub fn record(&self, operation: &str, accepted: bool) {
        let outcome = if accepted { "accepted" } else { "rejected" };
        self.validations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Record how many pointers a call carried
    pub fn observe_pointers(&self, operation: &str, pointers: usize) {
        self.group_pointers
            .with_label_values(&[operation])
            .observe(pointers as f64);
    }

    /// Count recorded for `operation` and `outcome`
    pub fn count(&self, operation: &str, outcome: &str) -> u64 {
        self.validations_total
            .with_label_values(&[operation, outcome])
            .get()
    }

    /// Render the registry in the text exposition format
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::Error::Metrics(e.to_string()))
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
