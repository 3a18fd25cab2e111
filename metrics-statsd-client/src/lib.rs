//! A fire-and-forget client for sending metrics to a [StatsD][statsd]-compatible server over UDP.
//!
//! [statsd]: https://github.com/statsd/statsd
//!
//! # Usage
//!
//! ```no_run
//! # use metrics_statsd_client::{MetricEmitter, StatsdClientBuilder};
//! // First, create a builder.
//! //
//! // The builder can configure the remote address, the metric name prefix, the maximum size of batched packets, and
//! // whether or not DNS TTLs are honored when resolving the remote address.
//! let mut client = StatsdClientBuilder::default()
//!     .with_remote_address("statsd.internal", 8125)
//!     .with_prefix("my_app")
//!     .with_respect_ttl(true)
//!     .build()
//!     .expect("failed to build StatsD client");
//!
//! // Metrics can be sent one packet at a time...
//! client.incr("requests");
//!
//! // ...or batched into as few packets as possible. The pipeline is flushed when it goes out of scope.
//! let mut pipeline = client.pipeline();
//! pipeline.incr("requests");
//! pipeline.gauge("queue_depth", 12.0);
//! pipeline.append("my_app.raw_line:1|c");
//! ```
//!
//! # Features
//!
//! ## Best-effort delivery
//!
//! StatsD over UDP is lossy by nature, and the client treats it that way: when the remote address cannot be resolved,
//! or the socket fails to send, the packet is dropped and the caller carries on. Each send still reports a
//! [`SendOutcome`] so that failures can be inspected, and running totals are available through
//! [`StatsdClient::stats`].
//!
//! Only building the client can fail, since a client without a usable remote address is useless.
//!
//! ## Batching
//!
//! A [`Pipeline`] buffers metric lines and packs them, in order, into newline-delimited packets below the configured
//! maximum packet size. A line that is larger than the maximum packet size on its own is still sent, alone in its
//! packet.
//!
//! ## DNS TTLs
//!
//! By default, the remote address is resolved once when the client is built. With
//! [`with_respect_ttl`][StatsdClientBuilder::with_respect_ttl], the address is instead re-resolved on the first send
//! after the DNS records expire, which allows following a StatsD server whose address changes. Expiration is checked
//! lazily; there is no background refresh.
//!
//! ## Telemetry
//!
//! The client can report its own packet and byte counts as [`metrics`] counters under the `statsd.client` namespace.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, StatsdClientBuilder, MAX_DATAGRAM_SIZE};

mod client;
pub use self::client::{DropReason, SendOutcome, StatsdClient};

mod emit;
pub use self::emit::MetricEmitter;

mod family;
pub use self::family::AddressFamily;

mod format;
pub use self::format::LineFormatter;

mod pipeline;
pub use self::pipeline::{FlushResult, Pipeline};

mod resolver;
pub use self::resolver::{AddressResolver, Answer, Lookup, ResolveError, SystemLookup};

mod sink;
pub use self::sink::DatagramSink;

mod telemetry;
pub use self::telemetry::TransportStats;

#[cfg(test)]
mod test_util;
mod writer;
