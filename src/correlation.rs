use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Client side of a TCP connection, as seen both on the wire and by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientKey {
    pub ip: IpAddr,
    pub port: u16,
}

impl ClientKey {
    /// IPv4-mapped IPv6 addresses are folded to IPv4 so that a dual-stack
    /// listener and the IPv4 capture path agree on the key.
    #[must_use]
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip: ip.to_canonical(), port }
    }
}

impl From<SocketAddr> for ClientKey {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SocketAddr::new(self.ip, self.port))
    }
}

/// A captured handshake waiting to be claimed by an accepted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationEntry {
    pub captured_at: Instant,
    pub client_hello: Vec<u8>,
}

/// Shared map from client address to the first ClientHello captured from it.
///
/// The capture loop is the single writer; every connection thread reads.
/// At most one entry exists per key: a later capture for a key that is still
/// present is discarded, and entries leave only through [`sweep`](Self::sweep).
#[derive(Debug, Default)]
pub struct CorrelationStore {
    entries: RwLock<HashMap<ClientKey, CorrelationEntry>>,
}

impl CorrelationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `client_hello` for `key` unless an entry already exists.
    ///
    /// Returns `true` when the entry was created.
    pub fn try_insert(&self, key: ClientKey, captured_at: Instant, client_hello: &[u8]) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(CorrelationEntry { captured_at, client_hello: client_hello.to_vec() });
                true
            }
        }
    }

    /// Captured handshake bytes for `key`. The entry stays in place.
    #[must_use]
    pub fn get(&self, key: &ClientKey) -> Option<Vec<u8>> {
        self.get_entry(key).map(|entry| entry.client_hello)
    }

    #[must_use]
    pub fn get_entry(&self, key: &ClientKey) -> Option<CorrelationEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    /// Remove every entry captured more than `max_age` ago. Returns how many were removed.
    pub fn sweep(&self, max_age: Duration) -> usize {
        self.sweep_at(Instant::now(), max_age)
    }

    /// [`sweep`](Self::sweep) against an explicit clock reading.
    pub fn sweep_at(&self, now: Instant, max_age: Duration) -> usize {
        // A clock younger than `max_age` means nothing can have expired yet.
        let Some(cutoff) = now.checked_sub(max_age) else {
            debug!("Clock is younger than {max_age:?}, nothing to sweep");
            return 0;
        };

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, entry| {
            let keep = entry.captured_at >= cutoff;
            if !keep {
                debug!("Removing {key} from correlation store");
            }
            keep
        });
        before - entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
