//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `lending_instructions_total{instruction,outcome}` - Submitted instructions
//! - `lending_apply_duration_seconds` - Histogram of apply + commit latencies
//! - `lending_active_loans` - Loans currently Funded or Active

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Instructions by name and outcome
    pub instructions_total: IntCounterVec,

    /// Apply duration histogram
    pub apply_duration: Histogram,

    /// Loans holding lender funds (escrow or borrower)
    pub active_loans: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("active_loans", &self.active_loans.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector on a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let instructions_total = IntCounterVec::new(
            Opts::new("lending_instructions_total", "Submitted instructions by outcome"),
            &["instruction", "outcome"],
        )?;
        registry.register(Box::new(instructions_total.clone()))?;

        let apply_duration = Histogram::with_opts(
            HistogramOpts::new(
                "lending_apply_duration_seconds",
                "Histogram of apply + commit latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250]),
        )?;
        registry.register(Box::new(apply_duration.clone()))?;

        let active_loans =
            IntGauge::new("lending_active_loans", "Loans currently Funded or Active")?;
        registry.register(Box::new(active_loans.clone()))?;

        Ok(Self {
            instructions_total,
            apply_duration,
            active_loans,
            registry,
        })
    }

    /// Record an applied instruction
    pub fn record_applied(&self, instruction: &str, duration_seconds: f64) {
        self.instructions_total
            .with_label_values(&[instruction, "applied"])
            .inc();
        self.apply_duration.observe(duration_seconds);
    }

    /// Record a rejected instruction
    pub fn record_rejected(&self, instruction: &str) {
        self.instructions_total
            .with_label_values(&[instruction, "rejected"])
            .inc();
    }

    /// Count of `instruction` with `outcome`
    pub fn instruction_count(&self, instruction: &str, outcome: &str) -> u64 {
        self.instructions_total
            .with_label_values(&[instruction, outcome])
            .get()
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every metric
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
