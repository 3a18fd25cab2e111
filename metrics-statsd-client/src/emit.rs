use std::time::Duration;

use quanta::Instant;

use crate::format::LineFormatter;

/// Returns `true` if a metric sampled at `sample_rate` should be sent this time.
fn should_sample(sample_rate: f64) -> bool {
    sample_rate >= 1.0 || rand::random::<f64>() < sample_rate
}

/// Convenience methods for emitting formatted metrics.
///
/// Implemented by [`StatsdClient`][crate::StatsdClient], which sends each metric immediately, and by
/// [`Pipeline`][crate::Pipeline], which batches them.
pub trait MetricEmitter {
    /// Returns the formatter used to build metric lines.
    fn formatter(&self) -> &LineFormatter;

    /// Emits a single formatted line.
    fn emit_line(&mut self, line: String);

    /// Emits lines that belong together, in order.
    fn emit_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            self.emit_line(line);
        }
    }

    /// Increments a counter by one.
    fn incr(&mut self, name: &str) {
        self.count(name, 1);
    }

    /// Decrements a counter by one.
    fn decr(&mut self, name: &str) {
        self.count(name, -1);
    }

    /// Changes a counter by `value`.
    fn count(&mut self, name: &str, value: i64) {
        self.count_sampled(name, value, 1.0);
    }

    /// Changes a counter by `value`, sending it only for a `sample_rate` fraction of calls.
    fn count_sampled(&mut self, name: &str, value: i64, sample_rate: f64) {
        if should_sample(sample_rate) {
            let line = self.formatter().counter(name, value, sample_rate);
            self.emit_line(line);
        }
    }

    /// Sets a gauge to `value`.
    ///
    /// Negative values are sent as a reset to zero followed by the value, in one batch.
    fn gauge(&mut self, name: &str, value: f64) {
        if value.is_sign_negative() && value != 0.0 {
            let formatter = self.formatter();
            let lines = vec![formatter.gauge(name, 0.0, 1.0), formatter.gauge(name, value, 1.0)];
            self.emit_lines(lines);
        } else {
            let line = self.formatter().gauge(name, value, 1.0);
            self.emit_line(line);
        }
    }

    /// Changes a gauge by `delta`.
    fn gauge_delta(&mut self, name: &str, delta: f64) {
        let line = self.formatter().gauge_delta(name, delta, 1.0);
        self.emit_line(line);
    }

    /// Records a timing.
    fn timing(&mut self, name: &str, elapsed: Duration) {
        self.timing_sampled(name, elapsed, 1.0);
    }

    /// Records a timing, sending it only for a `sample_rate` fraction of calls.
    fn timing_sampled(&mut self, name: &str, elapsed: Duration, sample_rate: f64) {
        if should_sample(sample_rate) {
            let line = self.formatter().timing(name, elapsed, sample_rate);
            self.emit_line(line);
        }
    }

    /// Runs `f` and records how long it took.
    fn time<F, R>(&mut self, name: &str, f: F) -> R
    where
        Self: Sized,
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.timing(name, Instant::now().saturating_duration_since(start));
        result
    }

    /// Adds `value` to a set.
    fn set(&mut self, name: &str, value: &str) {
        let line = self.formatter().set(name, value, 1.0);
        self.emit_line(line);
    }
}
