use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MetricType {
    Counter,
    Gauge,
    Timer,
    Set,
}

impl MetricType {
    fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "|c",
            MetricType::Gauge => "|g",
            MetricType::Timer => "|ms",
            MetricType::Set => "|s",
        }
    }
}

/// Formats StatsD metric lines.
///
/// Lines have the form `<prefix>.<name>:<value>|<type>[|@<rate>]`, where the prefix is optional and the sample rate is
/// only written when it is below 1.
#[derive(Clone, Debug, Default)]
pub struct LineFormatter {
    prefix: Option<String>,
}

impl LineFormatter {
    /// Creates a new `LineFormatter` with the given metric name prefix.
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Returns the metric name prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Formats a counter line.
    pub fn counter(&self, name: &str, value: i64, sample_rate: f64) -> String {
        let mut int_writer = itoa::Buffer::new();
        self.line(name, int_writer.format(value), MetricType::Counter, sample_rate)
    }

    /// Formats a gauge line setting the gauge to `value`.
    ///
    /// StatsD reads a leading sign as a relative change, so negative absolute values have to be sent as a reset to zero
    /// followed by the value; see [`MetricEmitter::gauge`][crate::MetricEmitter::gauge].
    pub fn gauge(&self, name: &str, value: f64, sample_rate: f64) -> String {
        let mut float_writer = ryu::Buffer::new();
        self.line(name, float_writer.format(value), MetricType::Gauge, sample_rate)
    }

    /// Formats a gauge line changing the gauge by `delta`.
    pub fn gauge_delta(&self, name: &str, delta: f64, sample_rate: f64) -> String {
        let mut float_writer = ryu::Buffer::new();
        let formatted = float_writer.format(delta);
        if delta.is_sign_negative() {
            self.line(name, formatted, MetricType::Gauge, sample_rate)
        } else {
            self.line(name, &format!("+{formatted}"), MetricType::Gauge, sample_rate)
        }
    }

    /// Formats a timer line, in milliseconds.
    pub fn timing(&self, name: &str, elapsed: Duration, sample_rate: f64) -> String {
        let mut float_writer = ryu::Buffer::new();
        let millis = elapsed.as_nanos() as f64 / 1_000_000.0;
        self.line(name, float_writer.format(millis), MetricType::Timer, sample_rate)
    }

    /// Formats a set line.
    pub fn set(&self, name: &str, value: &str, sample_rate: f64) -> String {
        self.line(name, value, MetricType::Set, sample_rate)
    }

    fn line(&self, name: &str, value: &str, metric_type: MetricType, sample_rate: f64) -> String {
        let mut line = String::with_capacity(
            self.prefix.as_ref().map_or(0, |p| p.len() + 1) + name.len() + value.len() + 16,
        );

        if let Some(prefix) = &self.prefix {
            line.push_str(prefix);
            line.push('.');
        }

        line.push_str(name);
        line.push(':');
        line.push_str(value);
        line.push_str(metric_type.as_str());

        if sample_rate < 1.0 {
            let mut float_writer = ryu::Buffer::new();
            line.push_str("|@");
            line.push_str(float_writer.format(sample_rate));
        }

        line
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::LineFormatter;

    #[test]
    fn counter() {
        let plain = LineFormatter::default();
        let prefixed = LineFormatter::new(Some("app".to_string()));

        assert_eq!(plain.counter("requests", 1, 1.0), "requests:1|c");
        assert_eq!(plain.counter("requests", -3, 1.0), "requests:-3|c");
        assert_eq!(plain.counter("requests", 5, 0.5), "requests:5|c|@0.5");
        assert_eq!(prefixed.counter("requests", 1, 1.0), "app.requests:1|c");
        assert_eq!(prefixed.prefix(), Some("app"));
    }

    #[test]
    fn gauge() {
        let formatter = LineFormatter::default();

        assert_eq!(formatter.gauge("queue_depth", 42.0, 1.0), "queue_depth:42.0|g");
        assert_eq!(formatter.gauge("ratio", 0.25, 0.1), "ratio:0.25|g|@0.1");
        assert_eq!(formatter.gauge_delta("queue_depth", 3.0, 1.0), "queue_depth:+3.0|g");
        assert_eq!(formatter.gauge_delta("queue_depth", -3.0, 1.0), "queue_depth:-3.0|g");
        assert_eq!(formatter.gauge_delta("queue_depth", 0.0, 1.0), "queue_depth:+0.0|g");
    }

    #[test]
    fn timing_and_set() {
        let formatter = LineFormatter::new(Some("svc".to_string()));

        assert_eq!(formatter.timing("latency", Duration::from_millis(250), 1.0), "svc.latency:250.0|ms");
        assert_eq!(formatter.timing("latency", Duration::from_micros(1500), 1.0), "svc.latency:1.5|ms");
        assert_eq!(formatter.set("users", "alice", 1.0), "svc.users:alice|s");
    }
}
