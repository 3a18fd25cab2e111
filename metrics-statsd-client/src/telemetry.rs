use metrics::{counter, Counter};

use crate::client::DropReason;

/// Running totals of what the client has sent and dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Number of packets handed to the transport successfully.
    pub packets_sent: u64,

    /// Number of packets dropped because of a resolution or transmission failure.
    pub packets_dropped: u64,

    /// Number of bytes handed to the transport successfully.
    pub bytes_sent: u64,

    /// Number of bytes dropped because of a resolution or transmission failure.
    pub bytes_dropped: u64,

    /// Number of packets dropped because the remote address could not be resolved.
    pub resolution_failures: u64,
}

/// Client telemetry.
///
/// `Telemetry` always tracks [`TransportStats`] locally, and can optionally mirror them to the installed `metrics`
/// recorder under the `statsd.client` namespace.
pub(crate) struct Telemetry {
    stats: TransportStats,
    enabled: bool,
    counters: Option<TelemetryCounters>,
}

struct TelemetryCounters {
    packets_sent: Counter,
    packets_dropped: Counter,
    bytes_sent: Counter,
    bytes_dropped: Counter,
    resolution_failures: Counter,
}

impl TelemetryCounters {
    fn new() -> Self {
        Self {
            packets_sent: counter!("statsd.client.packets_sent", "client_transport" => "udp"),
            packets_dropped: counter!("statsd.client.packets_dropped", "client_transport" => "udp"),
            bytes_sent: counter!("statsd.client.bytes_sent", "client_transport" => "udp"),
            bytes_dropped: counter!("statsd.client.bytes_dropped", "client_transport" => "udp"),
            resolution_failures: counter!("statsd.client.resolution_failures", "client_transport" => "udp"),
        }
    }
}

impl Telemetry {
    pub fn new(enabled: bool) -> Self {
        Self { stats: TransportStats::default(), enabled, counters: None }
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    // Counters are registered on first use rather than at construction, so that they land in whatever recorder is
    // installed by the time metrics actually flow.
    fn counters(&mut self) -> Option<&TelemetryCounters> {
        if !self.enabled {
            return None;
        }

        Some(self.counters.get_or_insert_with(TelemetryCounters::new))
    }

    pub fn track_packet_sent(&mut self, len: usize) {
        self.stats.packets_sent += 1;
        self.stats.bytes_sent += len as u64;

        if let Some(counters) = self.counters() {
            counters.packets_sent.increment(1);
            counters.bytes_sent.increment(len as u64);
        }
    }

    pub fn track_packet_dropped(&mut self, len: usize, reason: &DropReason) {
        let resolution_failure = matches!(reason, DropReason::Resolution(_));

        self.stats.packets_dropped += 1;
        self.stats.bytes_dropped += len as u64;
        if resolution_failure {
            self.stats.resolution_failures += 1;
        }

        if let Some(counters) = self.counters() {
            counters.packets_dropped.increment(1);
            counters.bytes_dropped.increment(len as u64);
            if resolution_failure {
                counters.resolution_failures.increment(1);
            }
        }
    }
}
