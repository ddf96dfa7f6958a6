//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Flow counters
    pub flows_started: IntCounterVec,
    pub flows_succeeded: IntCounterVec,
    pub flows_failed: IntCounterVec,

    // Pipeline counters
    pub simulation_fallbacks: IntCounter,
    pub submissions_rejected: IntCounter,
    pub poll_attempts: IntCounter,
    pub poll_timeouts: IntCounter,

    // Gauges
    pub active_flows: IntGauge,

    // Histograms
    pub rpc_latency: Histogram,
    pub flow_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let flows_started = IntCounterVec::new(
            Opts::new("flows_started_total", "Flows started, by flow name"),
            &["flow"],
        )?;

        let flows_succeeded = IntCounterVec::new(
            Opts::new("flows_succeeded_total", "Flows that completed, by flow name"),
            &["flow"],
        )?;

        let flows_failed = IntCounterVec::new(
            Opts::new(
                "flows_failed_total",
                "Flows that ended in error, by flow name and error category",
            ),
            &["flow", "category"],
        )?;

        let simulation_fallbacks = IntCounter::with_opts(Opts::new(
            "simulation_fallbacks_total",
            "Simulations answered through the raw JSON fallback",
        ))?;

        let submissions_rejected = IntCounter::with_opts(Opts::new(
            "submissions_rejected_total",
            "Envelopes rejected at submission",
        ))?;

        let poll_attempts = IntCounter::with_opts(Opts::new(
            "poll_attempts_total",
            "getTransaction status queries",
        ))?;

        let poll_timeouts = IntCounter::with_opts(Opts::new(
            "poll_timeouts_total",
            "Confirmations abandoned after the attempt ceiling",
        ))?;

        let active_flows = IntGauge::with_opts(Opts::new(
            "active_flows",
            "Flows currently in progress",
        ))?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        )?;

        let flow_latency = Histogram::with_opts(
            HistogramOpts::new("flow_latency_seconds", "End-to-end flow latency")
                .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(flows_started.clone()))?;
        registry.register(Box::new(flows_succeeded.clone()))?;
        registry.register(Box::new(flows_failed.clone()))?;
        registry.register(Box::new(simulation_fallbacks.clone()))?;
        registry.register(Box::new(submissions_rejected.clone()))?;
        registry.register(Box::new(poll_attempts.clone()))?;
        registry.register(Box::new(poll_timeouts.clone()))?;
        registry.register(Box::new(active_flows.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;
        registry.register(Box::new(flow_latency.clone()))?;

        Ok(Self {
            registry,
            flows_started,
            flows_succeeded,
            flows_failed,
            simulation_fallbacks,
            submissions_rejected,
            poll_attempts,
            poll_timeouts,
            active_flows,
            rpc_latency,
            flow_latency,
        })
    }

    /// Render all metrics in the Prometheus text format
    pub fn export_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
