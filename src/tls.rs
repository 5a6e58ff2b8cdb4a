use crate::fingerprint_hash::FingerprintId;
use std::fmt;
use std::sync::OnceLock;

/// TLS record content type for handshake messages.
pub const TLS_HANDSHAKE: u8 = 0x16;

/// Handshake message type of a ClientHello.
pub const TLS_CLIENT_HELLO: u8 = 0x01;

/// ClientHello extensions that carry a payload into the fingerprint.
///
/// Every other code only contributes its type to the extension list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionType {
    ServerName,
    SupportedGroups,
    EcPointFormats,
    SignatureAlgorithms,
    Alpn,
    CompressCertificate,
    RecordSizeLimit,
    SupportedVersions,
    PskKeyExchangeModes,
    KeyShare,
    Other(u16),
}

impl From<u16> for ExtensionType {
    fn from(code: u16) -> Self {
        match code {
            0x0000 => ExtensionType::ServerName,
            0x000a => ExtensionType::SupportedGroups,
            0x000b => ExtensionType::EcPointFormats,
            0x000d => ExtensionType::SignatureAlgorithms,
            0x0010 => ExtensionType::Alpn,
            0x001b => ExtensionType::CompressCertificate,
            0x001c => ExtensionType::RecordSizeLimit,
            0x002b => ExtensionType::SupportedVersions,
            0x002d => ExtensionType::PskKeyExchangeModes,
            0x0033 => ExtensionType::KeyShare,
            other => ExtensionType::Other(other),
        }
    }
}

/// Decoded ClientHello fields, before the derived values are attached.
///
/// Lists of 16-bit values are stored flattened to big-endian bytes, exactly as
/// they are fed into the fingerprint hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientHelloParts {
    /// Version from the record layer header
    pub tls_version: u16,
    /// Legacy version from the ClientHello body
    pub ch_version: u16,
    /// Cipher suites, GREASE-normalized
    pub cipher_suites: Vec<u8>,
    pub comp_methods: Vec<u8>,
    /// Extension type codes in wire order, GREASE-normalized
    pub extensions: Vec<u8>,
    pub elliptic_curves: Vec<u8>,
    pub ec_point_formats: Vec<u8>,
    pub signature_algorithms: Vec<u8>,
    pub alpn_protocols: Vec<u8>,
    /// Interleaved (named group, key exchange length) pairs
    pub key_share: Vec<u8>,
    pub psk_key_exchange_modes: Vec<u8>,
    pub supported_versions: Vec<u8>,
    pub cert_compression_algs: Vec<u8>,
    pub record_size_limit: Vec<u8>,
    pub server_name: Option<String>,
}

/// Fingerprint of one TLS ClientHello.
///
/// Immutable once built: `extensions_norm` is derived at construction and the
/// extended identifier is memoized on first use.
#[derive(Debug, Clone)]
pub struct ClientHelloFingerprint {
    parts: ClientHelloParts,
    extensions_norm: Vec<u8>,
    pub(crate) cached_id: OnceLock<FingerprintId>,
}

impl ClientHelloFingerprint {
    #[must_use]
    pub fn from_parts(parts: ClientHelloParts) -> Self {
        let extensions_norm = sort_extensions(&parts.extensions);
        Self { parts, extensions_norm, cached_id: OnceLock::new() }
    }

    #[must_use]
    pub fn parts(&self) -> &ClientHelloParts {
        &self.parts
    }

    #[must_use]
    pub fn into_parts(self) -> ClientHelloParts {
        self.parts
    }

    pub fn tls_version(&self) -> u16 {
        self.parts.tls_version
    }

    pub fn ch_version(&self) -> u16 {
        self.parts.ch_version
    }

    pub fn cipher_suites(&self) -> &[u8] {
        &self.parts.cipher_suites
    }

    pub fn comp_methods(&self) -> &[u8] {
        &self.parts.comp_methods
    }

    pub fn extensions(&self) -> &[u8] {
        &self.parts.extensions
    }

    /// Extension codes sorted ascending, independent of wire order.
    pub fn extensions_norm(&self) -> &[u8] {
        &self.extensions_norm
    }

    pub fn elliptic_curves(&self) -> &[u8] {
        &self.parts.elliptic_curves
    }

    pub fn ec_point_formats(&self) -> &[u8] {
        &self.parts.ec_point_formats
    }

    pub fn signature_algorithms(&self) -> &[u8] {
        &self.parts.signature_algorithms
    }

    pub fn alpn_protocols(&self) -> &[u8] {
        &self.parts.alpn_protocols
    }

    pub fn key_share(&self) -> &[u8] {
        &self.parts.key_share
    }

    pub fn psk_key_exchange_modes(&self) -> &[u8] {
        &self.parts.psk_key_exchange_modes
    }

    pub fn supported_versions(&self) -> &[u8] {
        &self.parts.supported_versions
    }

    pub fn cert_compression_algs(&self) -> &[u8] {
        &self.parts.cert_compression_algs
    }

    pub fn record_size_limit(&self) -> &[u8] {
        &self.parts.record_size_limit
    }

    pub fn server_name(&self) -> Option<&str> {
        self.parts.server_name.as_deref()
    }

    /// Extension codes in wire order as u16 values.
    #[must_use]
    pub fn extension_codes(&self) -> Vec<u16> {
        u16_values(&self.parts.extensions)
    }
}

impl PartialEq for ClientHelloFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for ClientHelloFingerprint {}

impl fmt::Display for ClientHelloFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}/{:04x} ciphers={} exts={} sni={}",
            self.parts.tls_version,
            self.parts.ch_version,
            hex::encode(&self.parts.cipher_suites),
            hex::encode(&self.parts.extensions),
            self.server_name().unwrap_or("none"),
        )
    }
}

fn u16_values(bytes: &[u8]) -> Vec<u16> {
    bytes.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect()
}

/// Stable ascending sort of big-endian u16 codes. A dangling odd byte stays last.
fn sort_extensions(extensions: &[u8]) -> Vec<u8> {
    let mut codes = u16_values(extensions);
    codes.sort();
    let mut sorted: Vec<u8> = codes.iter().flat_map(|code| code.to_be_bytes()).collect();
    sorted.extend_from_slice(extensions.chunks_exact(2).remainder());
    sorted
}
