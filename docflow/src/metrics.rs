//! Prometheus metrics, following the grounding repo's `metrics.rs`
//! modules (e.g. `pageserver::metrics`): one process-wide `Registry`,
//! counters and histograms registered once at startup and cloned cheaply
//! via their own internal `Arc`, exposed through `GET /metrics`.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub jobs_submitted_total: IntCounterVec,
    pub jobs_completed_total: IntCounterVec,
    pub jobs_failed_total: IntCounterVec,
    pub processing_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let jobs_submitted_total = IntCounterVec::new(
            Opts::new("docflow_jobs_submitted_total", "Jobs admitted, by kind"),
            &["kind"],
        )
        .expect("valid metric");
        let jobs_completed_total = IntCounterVec::new(
            Opts::new("docflow_jobs_completed_total", "Jobs completed, by kind"),
            &["kind"],
        )
        .expect("valid metric");
        let jobs_failed_total = IntCounterVec::new(
            Opts::new("docflow_jobs_failed_total", "Jobs failed, by kind and error_kind"),
            &["kind", "error_kind"],
        )
        .expect("valid metric");
        let processing_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "docflow_processing_duration_seconds",
                "Wall-clock processing time per job, by kind",
            ),
            &["kind"],
        )
        .expect("valid metric");

        registry.register(Box::new(jobs_submitted_total.clone())).expect("register");
        registry.register(Box::new(jobs_completed_total.clone())).expect("register");
        registry.register(Box::new(jobs_failed_total.clone())).expect("register");
        registry
            .register(Box::new(processing_duration_seconds.clone()))
            .expect("register");

        Metrics {
            registry,
            jobs_submitted_total,
            jobs_completed_total,
            jobs_failed_total,
            processing_duration_seconds,
        }
    }

    /// Renders the current registry in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf).expect("encode metrics");
        String::from_utf8(buf).expect("prometheus text is utf8")
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
