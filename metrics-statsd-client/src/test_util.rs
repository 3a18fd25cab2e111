//! Test doubles for the resolution and transport seams.

use std::{
    collections::VecDeque,
    io,
    net::{IpAddr, SocketAddr},
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    family::AddressFamily,
    resolver::{Answer, Lookup, ResolveError},
    sink::DatagramSink,
};

/// A value shared between a test double and the test observing it.
#[derive(Clone, Default)]
pub(crate) struct Shared<T>(Arc<Mutex<T>>);

impl<T: Clone> Shared<T> {
    pub fn get(&self) -> T {
        self.0.lock().unwrap().clone()
    }

    pub fn set(&self, value: T) {
        *self.0.lock().unwrap() = value;
    }

    fn update<F: FnOnce(&mut T)>(&self, f: F) {
        f(&mut self.0.lock().unwrap());
    }
}

/// A lookup returning pre-scripted answers, in order.
///
/// Once the script runs out, every query fails.
#[derive(Default)]
pub(crate) struct ScriptedLookup {
    script: VecDeque<Option<Answer>>,
    queries: Shared<usize>,
    families: Shared<Vec<AddressFamily>>,
}

impl ScriptedLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, addrs: Vec<IpAddr>, ttl: Duration) -> Self {
        self.script.push_back(Some(Answer::new(addrs, ttl)));
        self
    }

    pub fn failure(mut self) -> Self {
        self.script.push_back(None);
        self
    }

    pub fn query_count(&self) -> Shared<usize> {
        self.queries.clone()
    }

    pub fn queried_families(&self) -> Shared<Vec<AddressFamily>> {
        self.families.clone()
    }
}

impl Lookup for ScriptedLookup {
    fn query(&mut self, host: &str, family: AddressFamily) -> Result<Answer, ResolveError> {
        self.queries.update(|n| *n += 1);
        self.families.update(|families| families.push(family));

        match self.script.pop_front().flatten() {
            Some(answer) => Ok(answer),
            None => Err(ResolveError::Query {
                host: host.to_string(),
                record_type: family.record_type(),
                reason: "scripted failure".to_string(),
            }),
        }
    }
}

/// A sink that records every datagram, and can be switched into failing mode.
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    sent: Shared<Vec<(String, SocketAddr)>>,
    failing: Shared<bool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    /// Returns the payloads sent so far.
    pub fn payloads(&self) -> Vec<String> {
        self.sent.get().into_iter().map(|(payload, _)| payload).collect()
    }

    /// Returns the destination addresses of the datagrams sent so far.
    pub fn destinations(&self) -> Vec<SocketAddr> {
        self.sent.get().into_iter().map(|(_, addr)| addr).collect()
    }
}

impl DatagramSink for RecordingSink {
    fn send_to(&self, payload: &[u8], addr: SocketAddr) -> io::Result<usize> {
        if self.failing.get() {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "sink is failing"));
        }

        let len = payload.len();
        let payload = String::from_utf8(payload.to_vec()).expect("payload is not valid UTF-8");
        self.sent.update(|sent| sent.push((payload, addr)));
        Ok(len)
    }
}
