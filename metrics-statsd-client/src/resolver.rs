use std::{
    fmt, io,
    net::{IpAddr, SocketAddr},
    sync::mpsc,
    thread,
    time::Duration,
};

use hickory_resolver::{proto::rr::RecordType, Resolver};
use quanta::{Clock, Instant};
use thiserror::Error;
use tracing::debug;

use crate::family::AddressFamily;

/// Errors that could occur while resolving the remote address.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The resolution service could not be queried, or the query failed.
    #[error("failed to query {record_type} records for '{host}': {reason}")]
    Query {
        /// Host that was queried.
        host: String,

        /// Record type that was queried.
        record_type: RecordType,

        /// Details about the failure.
        reason: String,
    },

    /// The query succeeded but returned no usable address.
    #[error("no {record_type} records found for '{host}'")]
    NoRecords {
        /// Host that was queried.
        host: String,

        /// Record type that was queried.
        record_type: RecordType,
    },
}

/// Addresses returned by a [`Lookup`], along with how long they remain valid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Answer {
    addrs: Vec<IpAddr>,
    ttl: Duration,
}

impl Answer {
    /// Creates a new `Answer`.
    pub fn new(addrs: Vec<IpAddr>, ttl: Duration) -> Self {
        Self { addrs, ttl }
    }

    /// Returns the first address in the answer, if any.
    pub fn first(&self) -> Option<IpAddr> {
        self.addrs.first().copied()
    }

    /// Returns all addresses in the answer, in the order they were returned.
    pub fn addrs(&self) -> &[IpAddr] {
        &self.addrs
    }

    /// Returns the time-to-live of the answer.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// A name resolution backend.
///
/// Implementations query `host` for the record type matching `family` and report the expiration of the records as a
/// time-to-live relative to the moment of the query.
pub trait Lookup: Send {
    /// Queries the address records of `host` for the given family.
    ///
    /// # Errors
    ///
    /// If the query cannot be performed, or fails, an error is returned.
    fn query(&mut self, host: &str, family: AddressFamily) -> Result<Answer, ResolveError>;
}

impl<L> Lookup for Box<L>
where
    L: Lookup + ?Sized,
{
    fn query(&mut self, host: &str, family: AddressFamily) -> Result<Answer, ResolveError> {
        (**self).query(host, family)
    }
}

type Reply = Result<Answer, ResolveError>;

struct Request {
    host: String,
    family: AddressFamily,
    reply: mpsc::Sender<Reply>,
}

/// [`Lookup`] backed by the system resolver configuration (`/etc/resolv.conf` and friends).
///
/// Queries run on a dedicated background thread that owns the underlying resolver, so lookups are safe to perform
/// from threads that are driving an asynchronous runtime. The thread, and the resolver, are only created on the first
/// query, so literal targets never read the system configuration.
#[derive(Default)]
pub struct SystemLookup {
    worker: Option<mpsc::Sender<Request>>,
}

impl SystemLookup {
    /// Creates a new `SystemLookup`.
    pub fn new() -> Self {
        Self::default()
    }

    fn worker(&mut self) -> io::Result<&mpsc::Sender<Request>> {
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => spawn_worker()?,
        };

        Ok(self.worker.insert(worker))
    }
}

impl Lookup for SystemLookup {
    fn query(&mut self, host: &str, family: AddressFamily) -> Result<Answer, ResolveError> {
        let record_type = family.record_type();
        let query_error = |reason: String| ResolveError::Query { host: host.to_string(), record_type, reason };

        let worker = self.worker().map_err(|e| query_error(format!("failed to spawn resolver thread: {e}")))?;
        let (reply_tx, reply_rx) = mpsc::channel();
        let request = Request { host: host.to_string(), family, reply: reply_tx };
        let reply = worker.send(request).ok().and_then(|()| reply_rx.recv().ok());

        match reply {
            Some(reply) => reply,
            None => {
                // The thread is gone; spawn a fresh one on the next query.
                self.worker = None;
                Err(query_error("resolver thread exited unexpectedly".to_string()))
            }
        }
    }
}

fn spawn_worker() -> io::Result<mpsc::Sender<Request>> {
    let (requests_tx, requests_rx) = mpsc::channel();
    thread::Builder::new().name("statsd-client-resolver".to_string()).spawn(move || run_worker(&requests_rx))?;

    debug!("Spawned resolver thread.");

    Ok(requests_tx)
}

fn run_worker(requests: &mpsc::Receiver<Request>) {
    let mut resolver = None;
    for request in requests {
        let reply = query_system(&mut resolver, &request.host, request.family);

        // The requester may have given up; nothing to do then.
        let _ = request.reply.send(reply);
    }
}

fn query_system(slot: &mut Option<Resolver>, host: &str, family: AddressFamily) -> Result<Answer, ResolveError> {
    let record_type = family.record_type();
    let query_error = |reason: String| ResolveError::Query { host: host.to_string(), record_type, reason };

    let resolver = match slot.take() {
        Some(resolver) => resolver,
        None => Resolver::from_system_conf()
            .map_err(|e| query_error(format!("failed to load system resolver configuration: {e}")))?,
    };
    let lookup = slot.insert(resolver).lookup(host, record_type).map_err(|e| query_error(e.to_string()))?;

    let ttl = lookup.valid_until().saturating_duration_since(std::time::Instant::now());
    let addrs = lookup
        .iter()
        .filter_map(|rdata| rdata.ip_addr())
        .filter(|ip| family.contains(ip))
        .collect();

    Ok(Answer::new(addrs, ttl))
}

/// A resolved address and the instant it stops being valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CachedAddress {
    ip: IpAddr,

    // `None` for literal addresses, which never expire.
    expires_at: Option<Instant>,
}

impl CachedAddress {
    const fn literal(ip: IpAddr) -> Self {
        Self { ip, expires_at: None }
    }

    const fn expiring(ip: IpAddr, expires_at: Instant) -> Self {
        Self { ip, expires_at: Some(expires_at) }
    }

    fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            None => false,
            Some(expires_at) => now > expires_at,
        }
    }
}

/// Resolves a host and port to a socket address, re-resolving once the DNS TTL of the previous answer has passed.
///
/// Literal addresses are cached at construction and never expire. Names are resolved lazily: nothing is queried until
/// the first call to [`current_address`][Self::current_address], and afterwards only when the cached answer has
/// expired. There is no background refresh.
///
/// The resolver has a single owner: every method that can update the cache takes `&mut self`. Callers that need to
/// share a resolver across threads must wrap it (or the client owning it) in a lock.
pub struct AddressResolver {
    host: String,
    port: u16,
    family: AddressFamily,
    lookup: Box<dyn Lookup>,
    clock: Clock,
    cached: Option<CachedAddress>,
}

impl AddressResolver {
    /// Creates a new `AddressResolver` using the system resolver.
    pub fn new<H>(host: H, port: u16, family: AddressFamily) -> Self
    where
        H: Into<String>,
    {
        Self::with_lookup(host, port, family, SystemLookup::new())
    }

    /// Creates a new `AddressResolver` using the given lookup backend.
    pub fn with_lookup<H, L>(host: H, port: u16, family: AddressFamily, lookup: L) -> Self
    where
        H: Into<String>,
        L: Lookup + 'static,
    {
        let host = host.into();
        let cached = family.parse_literal(&host).map(CachedAddress::literal);

        Self { host, port, family, lookup: Box::new(lookup), clock: Clock::new(), cached }
    }

    /// Sets the clock used to track expiration.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the host this resolver targets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the port this resolver targets.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the address family.
    pub fn address_family(&self) -> AddressFamily {
        self.family
    }

    /// Returns `true` if the host is a literal address.
    pub fn is_literal(&self) -> bool {
        matches!(self.cached, Some(CachedAddress { expires_at: None, .. }))
    }

    /// Returns `true` if the cached address must be resolved again before use.
    pub fn expired(&self) -> bool {
        self.is_expired(self.clock.now())
    }

    /// Returns `true` if the cached address must be resolved again before use, as of `now`.
    ///
    /// Literal addresses are never expired. Otherwise, the address is expired if nothing has been resolved yet, or if
    /// `now` is past the expiration of the last answer.
    pub fn is_expired(&self, now: Instant) -> bool {
        match &self.cached {
            None => true,
            Some(cached) => cached.is_expired(now),
        }
    }

    /// Returns the cached address, resolving it first if it has expired.
    ///
    /// # Errors
    ///
    /// If resolution is needed and fails, an error is returned. The previously cached address is never used as a
    /// fallback.
    pub fn current_address(&mut self) -> Result<SocketAddr, ResolveError> {
        match self.cached {
            Some(cached) if !cached.is_expired(self.clock.now()) => Ok(SocketAddr::new(cached.ip, self.port)),
            _ => self.refresh(),
        }
    }

    /// Resolves the host again, replacing the cached address and its expiration.
    ///
    /// Literal addresses are returned as-is without querying.
    ///
    /// # Errors
    ///
    /// If the query fails, or returns no address of the configured family, an error is returned.
    pub fn refresh(&mut self) -> Result<SocketAddr, ResolveError> {
        if let Some(cached @ CachedAddress { expires_at: None, .. }) = self.cached {
            return Ok(SocketAddr::new(cached.ip, self.port));
        }

        let answer = self.lookup.query(&self.host, self.family)?;
        let ip = answer.first().ok_or_else(|| ResolveError::NoRecords {
            host: self.host.clone(),
            record_type: self.family.record_type(),
        })?;

        let expires_at = self.clock.now() + answer.ttl();
        self.cached = Some(CachedAddress::expiring(ip, expires_at));

        debug!(host = %self.host, %ip, ttl = ?answer.ttl(), family = %self.family, "Resolved remote address.");

        Ok(SocketAddr::new(ip, self.port))
    }
}

impl fmt::Debug for AddressResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressResolver")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("family", &self.family)
            .field("cached", &self.cached)
            .finish_non_exhaustive()
    }
}
