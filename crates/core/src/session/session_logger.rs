use std::collections::HashMap;
use std::time::Instant;

/// Observer for the detection worker.
///
/// The worker reports stage timings and per-cycle metrics here; front ends
/// pick whether that goes to the log or nowhere.
pub trait SessionLogger: Send {
    /// Called once per finished detection cycle, successful or not.
    fn cycle(&mut self, completed: usize);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. face count).
    fn metric(&mut self, name: &str, value: f64);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything. Used by the desktop app and by tests.
pub struct NullSessionLogger;

impl SessionLogger for NullSessionLogger {
    fn cycle(&mut self, _completed: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
}

/// Collects timings and metrics and writes a summary through `log` when the
/// session shuts down. Progress lines are throttled to every
/// `throttle_cycles` cycles.
pub struct LogSessionLogger {
    throttle_cycles: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    cycles: usize,
}

impl LogSessionLogger {
    pub fn new(throttle_cycles: usize) -> Self {
        Self {
            throttle_cycles: throttle_cycles.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            cycles: 0,
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let cycles = self.cycles;
        let mut lines = vec![format!(
            "Session summary ({cycles} detections, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let max_ms = durations.iter().copied().fold(0.0, f64::max);
            lines.push(format!(
                "  {stage:10}: avg {:6.1}ms  max {max_ms:6.1}ms",
                average(durations)
            ));
        }

        let mut metric_names: Vec<_> = self.metrics.keys().collect();
        metric_names.sort();
        for name in metric_names {
            lines.push(format!("  {name}: avg {:.1}", average(&self.metrics[name])));
        }

        if cycles > 0 && elapsed_ms > 0.0 {
            let rate = cycles as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Detection rate: {rate:.1}/s"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }
}

impl Default for LogSessionLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl SessionLogger for LogSessionLogger {
    fn cycle(&mut self, completed: usize) {
        self.cycles = completed;
        if completed % self.throttle_cycles == 0 {
            log::info!("Detections completed: {completed}");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullSessionLogger;
        logger.cycle(1);
        logger.timing("detect", 5.0);
        logger.metric("faces", 3.0);
        logger.summary();
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = LogSessionLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("assemble", 1.0);

        let detect = logger.timings_for("detect").unwrap();
        assert_eq!(detect.len(), 2);
        assert_relative_eq!(average(detect), 25.0);
        assert_eq!(logger.timings_for("assemble").unwrap().len(), 1);
        assert!(logger.timings_for("missing").is_none());
    }

    #[test]
    fn test_summary_includes_stages_and_metrics() {
        let mut logger = LogSessionLogger::new(10);
        logger.cycle(4);
        logger.timing("detect", 12.0);
        logger.metric("faces", 1.0);
        logger.metric("faces", 2.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Session summary (4 detections"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("faces: avg 1.5"));
    }

    #[test]
    fn test_summary_reports_stage_max() {
        let mut logger = LogSessionLogger::new(10);
        logger.timing("detect", 10.0);
        logger.timing("detect", 30.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("avg   20.0ms"));
        assert!(summary.contains("max   30.0ms"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(LogSessionLogger::default().summary_string().is_none());
    }

    #[test]
    fn test_cycle_tracks_latest_count() {
        let mut logger = LogSessionLogger::new(2);
        for i in 1..=5 {
            logger.cycle(i);
        }
        assert_eq!(logger.cycles, 5);
    }
}
