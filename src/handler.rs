use crate::correlation::{ClientKey, CorrelationStore};
use crate::output::{FingerprintFields, FingerprintReport};
use crate::tls_process::parse_client_hello;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Joins an accepted connection with the handshake captured for its peer.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    store: Arc<CorrelationStore>,
}

impl ConnectionHandler {
    pub fn new(store: Arc<CorrelationStore>) -> Self {
        Self { store }
    }

    /// Build the report for `peer`. Never fails: a correlation miss or an
    /// unparsable handshake yields a report without fingerprint fields.
    pub fn handle(&self, peer: SocketAddr, agent: &str) -> FingerprintReport {
        let key = ClientKey::from(peer);
        let mut report = FingerprintReport::empty(key, agent);

        let Some(client_hello) = self.store.get(&key) else {
            debug!("No captured handshake for {key}");
            return report;
        };

        report.client_hello = Some(hex::encode(&client_hello));
        report.fingerprint = parse_client_hello(&client_hello).map(|fp| {
            debug!("Fingerprint for {key}: {fp}");
            FingerprintFields::from(&fp)
        });
        report
    }
}
