use std::{
    io,
    net::{SocketAddr, ToSocketAddrs as _},
};

use quanta::Clock;
use thiserror::Error;
use tracing::debug;

use crate::{
    client::{StatsdClient, Target},
    family::AddressFamily,
    format::LineFormatter,
    resolver::{AddressResolver, Lookup, SystemLookup},
    sink::{self, DatagramSink},
    telemetry::Telemetry,
};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8125;
const DEFAULT_MAX_PACKET_SIZE: usize = 512;

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Errors that could occur while building a StatsD client.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The maximum packet size is zero or larger than a UDP datagram can carry.
    #[error("invalid maximum packet size {size} (must be between 1 and {max})", max = MAX_DATAGRAM_SIZE)]
    InvalidMaximumPacketSize {
        /// The rejected size.
        size: usize,
    },

    /// The remote address could not be resolved.
    #[error("failed to resolve remote address '{host}:{port}': {reason}")]
    Resolution {
        /// Host that was resolved.
        host: String,

        /// Port that was resolved.
        port: u16,

        /// Details about the resolution failure.
        reason: String,
    },

    /// The local socket could not be opened.
    #[error("failed to open datagram socket: {0}")]
    Socket(#[source] io::Error),
}

/// Builder for a [`StatsdClient`].
pub struct StatsdClientBuilder {
    host: String,
    port: u16,
    prefix: Option<String>,
    max_packet_size: usize,
    family: AddressFamily,
    respect_ttl: bool,
    telemetry: bool,
    lookup: Option<Box<dyn Lookup>>,
    clock: Option<Clock>,
    sink: Option<Box<dyn DatagramSink>>,
}

impl StatsdClientBuilder {
    /// Set the remote address to send metrics to.
    ///
    /// The host can either be a name, or a literal address of the configured family.
    ///
    /// Defaults to `localhost:8125`.
    #[must_use]
    pub fn with_remote_address<H>(mut self, host: H, port: u16) -> Self
    where
        H: Into<String>,
    {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Set the prefix prepended, followed by a dot, to all metric names.
    ///
    /// Defaults to no prefix.
    #[must_use]
    pub fn with_prefix<P>(mut self, prefix: P) -> Self
    where
        P: Into<String>,
    {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the maximum packet size used when batching metrics.
    ///
    /// Batched lines are packed so that a packet holding more than one line stays below this size. A single line
    /// larger than this size is still sent whole, on its own.
    ///
    /// This should be set to a value that the network path to the StatsD server can carry without fragmentation.
    ///
    /// Defaults to 512 bytes.
    #[must_use]
    pub fn with_maximum_packet_size(mut self, max_packet_size: usize) -> Self {
        self.max_packet_size = max_packet_size;
        self
    }

    /// Sets whether or not to reach the remote server over IPv6.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_ipv6(mut self, ipv6: bool) -> Self {
        self.family = AddressFamily::from_ipv6(ipv6);
        self
    }

    /// Sets whether or not to re-resolve the remote address when its DNS TTL expires.
    ///
    /// When disabled, the remote address is resolved once when the client is built and used for the lifetime of the
    /// client. When enabled, the address is resolved by querying `A` (or `AAAA`) records, and queried again on the
    /// first send after the records expire.
    ///
    /// Literal addresses are never re-resolved.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_respect_ttl(mut self, respect_ttl: bool) -> Self {
        self.respect_ttl = respect_ttl;
        self
    }

    /// Sets whether or not to enable telemetry for the client.
    ///
    /// When enabled, the number of packets and bytes sent and dropped are additionally reported as counters to the
    /// installed `metrics` recorder, under the `statsd.client` namespace.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: bool) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Set the lookup backend used when respecting DNS TTLs.
    ///
    /// Only used when [`with_respect_ttl`][Self::with_respect_ttl] is enabled; otherwise the remote address is
    /// resolved once through the system's generic address lookup and this backend is ignored.
    ///
    /// Defaults to [`SystemLookup`].
    #[must_use]
    pub fn with_lookup<L>(mut self, lookup: L) -> Self
    where
        L: Lookup + 'static,
    {
        self.lookup = Some(Box::new(lookup));
        self
    }

    /// Set the clock used to track DNS TTL expiration.
    ///
    /// Only used when [`with_respect_ttl`][Self::with_respect_ttl] is enabled.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the transport used to send packets.
    ///
    /// Defaults to a UDP socket bound to an ephemeral port.
    #[must_use]
    pub fn with_datagram_sink<S>(mut self, sink: S) -> Self
    where
        S: DatagramSink + 'static,
    {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Builds the client.
    ///
    /// The remote address is resolved immediately, and the local socket is opened.
    ///
    /// # Errors
    ///
    /// If the maximum packet size is invalid, if the remote address cannot be resolved, or if the socket cannot be
    /// opened, an error will be returned.
    pub fn build(self) -> Result<StatsdClient, BuildError> {
        if self.max_packet_size == 0 || self.max_packet_size > MAX_DATAGRAM_SIZE {
            return Err(BuildError::InvalidMaximumPacketSize { size: self.max_packet_size });
        }

        let target = if self.respect_ttl {
            let lookup: Box<dyn Lookup> = match self.lookup {
                Some(lookup) => lookup,
                None => Box::new(SystemLookup::new()),
            };
            let mut resolver = AddressResolver::with_lookup(self.host.as_str(), self.port, self.family, lookup);
            if let Some(clock) = self.clock {
                resolver = resolver.with_clock(clock);
            }

            resolver.current_address().map_err(|e| BuildError::Resolution {
                host: self.host.clone(),
                port: self.port,
                reason: e.to_string(),
            })?;
            Target::Resolving(resolver)
        } else {
            if self.lookup.is_some() || self.clock.is_some() {
                debug!("Lookup backend and clock are ignored when DNS TTLs are not respected.");
            }
            Target::Fixed(resolve_once(&self.host, self.port, self.family)?)
        };

        let sink: Box<dyn DatagramSink> = match self.sink {
            Some(sink) => sink,
            None => Box::new(sink::bind_udp(self.family).map_err(BuildError::Socket)?),
        };

        debug!(
            host = %self.host,
            port = self.port,
            family = %self.family,
            respect_ttl = self.respect_ttl,
            max_packet_size = self.max_packet_size,
            "Built StatsD client."
        );

        Ok(StatsdClient::new(
            target,
            self.family,
            sink,
            LineFormatter::new(self.prefix),
            self.max_packet_size,
            Telemetry::new(self.telemetry),
        ))
    }
}

impl Default for StatsdClientBuilder {
    fn default() -> Self {
        StatsdClientBuilder {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            prefix: None,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            family: AddressFamily::Ipv4,
            respect_ttl: false,
            telemetry: false,
            lookup: None,
            clock: None,
            sink: None,
        }
    }
}

/// Resolves `host` once through the system's generic address lookup, keeping the first address of `family`.
fn resolve_once(host: &str, port: u16, family: AddressFamily) -> Result<SocketAddr, BuildError> {
    let resolution_error = |reason: String| BuildError::Resolution { host: host.to_string(), port, reason };

    (host, port)
        .to_socket_addrs()
        .map_err(|e| resolution_error(e.to_string()))?
        .find(|addr| family.contains(&addr.ip()))
        .ok_or_else(|| resolution_error(format!("no {family} address found")))
}
