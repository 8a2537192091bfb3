//! Prometheus detection metrics.
//!
//! Recording never affects detection results.

use std::time::Duration;

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder,
};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub detections: IntCounter,
    pub unmatched: IntCounter,
    pub detection_latency: Histogram,
    pub initialize_duration: Gauge,
    /// Mirrors of the process-wide scratch arena counters.
    pub scratch_reuses: IntGauge,
    pub scratch_fallbacks: IntGauge,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let detections = IntCounter::new("uaprobe_detections_total", "Total detect calls")?;
        let unmatched = IntCounter::new(
            "uaprobe_unmatched_total",
            "Detect calls answered with the default profile",
        )?;
        let detection_latency = Histogram::with_opts(
            HistogramOpts::new("uaprobe_detection_latency_ns", "Time spent in detect")
                .buckets(vec![1_000.0, 10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0]),
        )?;
        let initialize_duration = Gauge::new(
            "uaprobe_initialize_duration_ms",
            "Duration of the last successful initialize",
        )?;
        let scratch_reuses = IntGauge::new(
            "uaprobe_scratch_reuses",
            "Matcher calls served by a thread's resident scratch arena",
        )?;
        let scratch_fallbacks = IntGauge::new(
            "uaprobe_scratch_fallbacks",
            "Nested matcher calls that needed a temporary scratch arena",
        )?;

        registry.register(Box::new(detections.clone()))?;
        registry.register(Box::new(unmatched.clone()))?;
        registry.register(Box::new(detection_latency.clone()))?;
        registry.register(Box::new(initialize_duration.clone()))?;
        registry.register(Box::new(scratch_reuses.clone()))?;
        registry.register(Box::new(scratch_fallbacks.clone()))?;

        Ok(Self {
            registry,
            detections,
            unmatched,
            detection_latency,
            initialize_duration,
            scratch_reuses,
            scratch_fallbacks,
        })
    }

    pub fn record_detection(&self, elapsed: Duration, matched: bool) {
        self.detections.inc();
        if !matched {
            self.unmatched.inc();
        }
        self.detection_latency.observe(elapsed.as_nanos() as f64);
    }

    pub fn record_initialize(&self, elapsed: Duration) {
        self.initialize_duration.set(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn record_scratch(&self, reuses: usize, fallbacks: usize) {
        self.scratch_reuses.set(reuses as i64);
        self.scratch_fallbacks.set(fallbacks as i64);
    }

    /// Text exposition of every registered metric.
    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::<u8>::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_detections() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.record_detection(Duration::from_micros(3), true);
        metrics.record_detection(Duration::from_micros(40), false);
        metrics.record_initialize(Duration::from_millis(12));

        assert_eq!(metrics.detections.get(), 2);
        assert_eq!(metrics.unmatched.get(), 1);
        assert_eq!(metrics.detection_latency.get_sample_count(), 2);

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("uaprobe_detections_total 2"));
        assert!(text.contains("uaprobe_initialize_duration_ms 12"));
    }

    #[test]
    fn test_scratch_counters_are_exported() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.record_scratch(41, 2);
        metrics.record_scratch(42, 2);
        assert_eq!(metrics.scratch_reuses.get(), 42);

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("uaprobe_scratch_reuses 42"));
        assert!(text.contains("uaprobe_scratch_fallbacks 2"));
    }

    #[test]
    fn test_recorders_are_independent() {
        let a = MetricsRecorder::new().unwrap();
        let b = MetricsRecorder::new().unwrap();
        a.record_detection(Duration::from_micros(1), true);
        assert_eq!(b.detections.get(), 0);
    }
}
