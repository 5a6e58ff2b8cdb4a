use crate::correlation::ClientKey;
use crate::fingerprint_hash::FingerprintId;
use crate::tls::ClientHelloFingerprint;
use serde::Serialize;
use std::fmt;
use std::fmt::Formatter;

/// Result record produced for one accepted connection.
///
/// Always produced: a correlation miss or an unparsable handshake only leaves
/// the handshake and fingerprint parts empty.
#[derive(Debug, Clone, Serialize)]
pub struct FingerprintReport {
    /// Peer address as seen by the listener
    pub addr: String,
    pub port: u16,
    /// `User-Agent` sent by the client, empty if none
    pub agent: String,
    /// Captured handshake bytes, hex encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_hello: Option<String>,
    #[serde(flatten)]
    pub fingerprint: Option<FingerprintFields>,
}

impl FingerprintReport {
    /// Report for `peer` with nothing correlated yet.
    #[must_use]
    pub fn empty(peer: ClientKey, agent: &str) -> Self {
        Self {
            addr: peer.ip.to_string(),
            port: peer.port,
            agent: agent.to_string(),
            client_hello: None,
            fingerprint: None,
        }
    }

    pub fn has_fingerprint(&self) -> bool {
        self.fingerprint.is_some()
    }

    /// Serialize as a single JSON object.
    ///
    /// # Errors
    /// Returns `FingerprintError::Serialize` if serialization fails.
    pub fn to_json(&self) -> Result<String, crate::error::FingerprintError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decoded ClientHello fields plus the three identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FingerprintFields {
    pub tls_version: u16,
    pub ch_version: u16,
    pub cipher_suites: Vec<u8>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<u8>,
    pub extensions_norm: Vec<u8>,
    pub curves: Vec<u8>,
    pub pt_fmts: Vec<u8>,
    pub sig_algs: Vec<u8>,
    pub alpn: Vec<u8>,
    pub key_share: Vec<u8>,
    pub psk_key_exchange_modes: Vec<u8>,
    pub supported_versions: Vec<u8>,
    pub cert_compression_algs: Vec<u8>,
    pub record_size_limit: Vec<u8>,
    pub sni: String,
    /// Extended identifier
    pub nid: FingerprintId,
    pub id: String,
    pub norm_nid: FingerprintId,
    pub norm_id: String,
    pub legacy_nid: FingerprintId,
    pub legacy_id: String,
}

impl From<&ClientHelloFingerprint> for FingerprintFields {
    fn from(fp: &ClientHelloFingerprint) -> Self {
        let nid = fp.fingerprint();
        let norm_nid = fp.fingerprint_normalized();
        let legacy_nid = fp.fingerprint_v1();

        Self {
            tls_version: fp.tls_version(),
            ch_version: fp.ch_version(),
            cipher_suites: fp.cipher_suites().to_vec(),
            compression_methods: fp.comp_methods().to_vec(),
            extensions: fp.extensions().to_vec(),
            extensions_norm: fp.extensions_norm().to_vec(),
            curves: fp.elliptic_curves().to_vec(),
            pt_fmts: fp.ec_point_formats().to_vec(),
            sig_algs: fp.signature_algorithms().to_vec(),
            alpn: fp.alpn_protocols().to_vec(),
            key_share: fp.key_share().to_vec(),
            psk_key_exchange_modes: fp.psk_key_exchange_modes().to_vec(),
            supported_versions: fp.supported_versions().to_vec(),
            cert_compression_algs: fp.cert_compression_algs().to_vec(),
            record_size_limit: fp.record_size_limit().to_vec(),
            sni: fp.server_name().unwrap_or_default().to_string(),
            nid,
            id: nid.to_hex(),
            norm_nid,
            norm_id: norm_nid.to_hex(),
            legacy_nid,
            legacy_id: legacy_nid.to_hex(),
        }
    }
}

impl fmt::Display for FingerprintReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Some(fp) = &self.fingerprint else {
            return write!(
                f,
                ".-[ {}/{} (tls client) ]-\n\
                |\n\
                | agent    = {}\n\
                | hello    = {}\n\
                `----\n",
                self.addr,
                self.port,
                self.agent,
                if self.client_hello.is_some() { "unparsable" } else { "not captured" },
            );
        };

        write!(
            f,
            ".-[ {}/{} (tls client) ]-\n\
            |\n\
            | agent    = {}\n\
            | version  = {:04x}/{:04x}\n\
            | sni      = {}\n\
            | id       = {} ({})\n\
            | norm_id  = {} ({})\n\
            | v1_id    = {} ({})\n\
            `----\n",
            self.addr,
            self.port,
            self.agent,
            fp.tls_version,
            fp.ch_version,
            if fp.sni.is_empty() { "none" } else { fp.sni.as_str() },
            fp.id,
            fp.nid.value(),
            fp.norm_id,
            fp.norm_nid.value(),
            fp.legacy_id,
            fp.legacy_nid.value(),
        )
    }
}
