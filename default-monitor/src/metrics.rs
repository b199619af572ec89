//! Monitor metrics
//!
//! - `monitor_cycles_total` - Completed cycles
//! - `monitor_defaults_processed_total` - Loans moved to Defaulted
//! - `monitor_errors_total` - Fetch and per-loan failures
//! - `monitor_cycle_duration_seconds` - Histogram of cycle durations

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::fmt;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Completed cycles
    pub cycles_total: IntCounter,

    /// Defaults submitted and applied
    pub defaults_processed: IntCounter,

    /// Errors
    pub errors_total: IntCounter,

    /// Cycle duration histogram
    pub cycle_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("cycles_total", &self.cycles_total.get())
            .field("defaults_processed", &self.defaults_processed.get())
            .field("errors_total", &self.errors_total.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector on a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let cycles_total = IntCounter::new("monitor_cycles_total", "Completed monitor cycles")?;
        registry.register(Box::new(cycles_total.clone()))?;

        let defaults_processed = IntCounter::new(
            "monitor_defaults_processed_total",
            "Loans marked defaulted by the monitor",
        )?;
        registry.register(Box::new(defaults_processed.clone()))?;

        let errors_total =
            IntCounter::new("monitor_errors_total", "Monitor fetch and submit errors")?;
        registry.register(Box::new(errors_total.clone()))?;

        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new("monitor_cycle_duration_seconds", "Histogram of cycle durations")
                .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )?;
        registry.register(Box::new(cycle_duration.clone()))?;

        Ok(Self {
            cycles_total,
            defaults_processed,
            errors_total,
            cycle_duration,
            registry,
        })
    }

    /// Record a finished cycle
    pub fn record_cycle(&self, processed: u64, errors: u64, duration_seconds: f64) {
        self.cycles_total.inc();
        self.defaults_processed.inc_by(processed);
        self.errors_total.inc_by(errors);
        self.cycle_duration.observe(duration_seconds);
    }

    /// Text exposition of every metric
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_cycle() {
        let metrics = Metrics::new().unwrap();
        metrics.record_cycle(2, 1, 0.02);
        metrics.record_cycle(0, 0, 0.01);

        assert_eq!(metrics.cycles_total.get(), 2);
        assert_eq!(metrics.defaults_processed.get(), 2);
        assert_eq!(metrics.errors_total.get(), 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("monitor_defaults_processed_total 2"));
    }
}
