use std::{fmt, io, net::SocketAddr};

use thiserror::Error;
use tracing::debug;

use crate::{
    family::AddressFamily,
    format::LineFormatter,
    pipeline::Pipeline,
    resolver::{AddressResolver, ResolveError},
    sink::DatagramSink,
    telemetry::{Telemetry, TransportStats},
    MetricEmitter,
};

/// Why a packet was dropped instead of sent.
#[derive(Debug, Error)]
pub enum DropReason {
    /// The remote address could not be resolved.
    #[error("failed to resolve remote address: {0}")]
    Resolution(#[from] ResolveError),

    /// The transport failed to send the packet.
    #[error("failed to transmit packet: {0}")]
    Transmission(#[from] io::Error),
}

/// Outcome of sending a single packet.
///
/// Sending is best-effort: failures never surface as errors, and are reported here only so that callers who care can
/// inspect them.
#[derive(Debug)]
pub enum SendOutcome {
    /// The packet was handed to the transport.
    Sent {
        /// Number of bytes sent.
        bytes: usize,
    },

    /// The packet was dropped.
    Dropped(DropReason),
}

impl SendOutcome {
    /// Returns `true` if the packet was sent.
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent { .. })
    }

    /// Returns the reason the packet was dropped, if it was.
    pub fn drop_reason(&self) -> Option<&DropReason> {
        match self {
            SendOutcome::Sent { .. } => None,
            SendOutcome::Dropped(reason) => Some(reason),
        }
    }
}

/// Where packets are sent.
pub(crate) enum Target {
    // Resolved once at build time and never refreshed.
    Fixed(SocketAddr),

    // Refreshed whenever the DNS TTL of the cached answer has passed.
    Resolving(AddressResolver),
}

impl Target {
    fn current_address(&mut self) -> Result<SocketAddr, ResolveError> {
        match self {
            Target::Fixed(addr) => Ok(*addr),
            Target::Resolving(resolver) => resolver.current_address(),
        }
    }
}

/// A StatsD client sending metric lines over UDP.
///
/// Lines are either sent one per packet with [`send`][Self::send], or batched into as few packets as possible through a
/// [`Pipeline`] created with [`pipeline`][Self::pipeline]. Either way, delivery is fire-and-forget: resolution and
/// transmission failures drop the packet, are counted in [`stats`][Self::stats], and are never returned as errors.
///
/// The client has a single owner. Sending takes `&mut self` because it may update the cached remote address; to send
/// from several threads, wrap the client in a `Mutex`.
pub struct StatsdClient {
    target: Target,
    family: AddressFamily,
    sink: Box<dyn DatagramSink>,
    formatter: LineFormatter,
    max_packet_size: usize,
    telemetry: Telemetry,
}

impl StatsdClient {
    /// Creates a [`StatsdClientBuilder`][crate::StatsdClientBuilder] with the default configuration.
    pub fn builder() -> crate::StatsdClientBuilder {
        crate::StatsdClientBuilder::default()
    }

    pub(crate) fn new(
        target: Target,
        family: AddressFamily,
        sink: Box<dyn DatagramSink>,
        formatter: LineFormatter,
        max_packet_size: usize,
        telemetry: Telemetry,
    ) -> Self {
        Self { target, family, sink, formatter, max_packet_size, telemetry }
    }

    /// Returns the maximum packet size used when batching.
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Returns the address family of the remote server.
    pub fn address_family(&self) -> AddressFamily {
        self.family
    }

    /// Returns `true` if the client re-resolves the remote address according to DNS TTLs.
    pub fn respects_ttl(&self) -> bool {
        matches!(self.target, Target::Resolving(_))
    }

    /// Returns the totals of packets and bytes sent and dropped so far.
    pub fn stats(&self) -> TransportStats {
        self.telemetry.stats()
    }

    /// Sends a single metric line as its own packet.
    pub fn send(&mut self, line: &str) -> SendOutcome {
        self.raw_send(line.as_bytes())
    }

    /// Starts a batch of metric lines.
    ///
    /// The returned pipeline packs lines into packets of at most [`max_packet_size`][Self::max_packet_size] bytes and
    /// sends them when flushed, or when dropped.
    pub fn pipeline(&mut self) -> Pipeline<'_> {
        Pipeline::new(self)
    }

    /// Sends `packet` to the current remote address.
    ///
    /// If the client respects DNS TTLs, the remote address is resolved again first when the cached one has expired.
    /// Resolution and transmission errors are absorbed: the packet is dropped and the reason returned.
    pub fn raw_send(&mut self, packet: &[u8]) -> SendOutcome {
        let result = match self.target.current_address() {
            Ok(addr) => self.sink.send_to(packet, addr).map_err(DropReason::from),
            Err(e) => Err(DropReason::from(e)),
        };

        match result {
            Ok(bytes) => {
                self.telemetry.track_packet_sent(bytes);
                SendOutcome::Sent { bytes }
            }
            Err(reason) => {
                debug!(error = %reason, packet_len = packet.len(), "Dropped packet.");
                self.telemetry.track_packet_dropped(packet.len(), &reason);
                SendOutcome::Dropped(reason)
            }
        }
    }
}

impl MetricEmitter for StatsdClient {
    fn formatter(&self) -> &LineFormatter {
        &self.formatter
    }

    fn emit_line(&mut self, line: String) {
        self.send(&line);
    }

    fn emit_lines(&mut self, lines: Vec<String>) {
        let mut pipeline = self.pipeline();
        for line in lines {
            pipeline.append(line);
        }
    }
}

impl fmt::Debug for StatsdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsdClient")
            .field("family", &self.family)
            .field("respects_ttl", &self.respects_ttl())
            .field("prefix", &self.formatter.prefix())
            .field("max_packet_size", &self.max_packet_size)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
