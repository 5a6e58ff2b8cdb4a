use crate::cursor::ByteCursor;
use crate::error::FingerprintError;
use crate::grease;
use crate::tls::{
    ClientHelloFingerprint, ClientHelloParts, ExtensionType, TLS_CLIENT_HELLO, TLS_HANDSHAKE,
};
use tracing::debug;

const RANDOM_LEN: usize = 32;

/// Parse a TLS record holding a ClientHello into its fingerprint.
///
/// Returns `None` for an empty buffer, a record that is not a handshake, a
/// handshake that is not a ClientHello, or any declared length running past
/// the end of `data`. Never returns a partially decoded value.
///
/// # Example
/// ```
/// use clienthello_fp::tls_process::parse_client_hello;
///
/// assert!(parse_client_hello(&[0x17, 0x03, 0x03]).is_none());
/// ```
#[must_use]
pub fn parse_client_hello(data: &[u8]) -> Option<ClientHelloFingerprint> {
    match try_parse_client_hello(data) {
        Ok(fingerprint) => Some(fingerprint),
        Err(e) => {
            debug!("Could not parse ClientHello ({} bytes): {e}", data.len());
            None
        }
    }
}

/// Same as [`parse_client_hello`] but reports why parsing failed.
pub fn try_parse_client_hello(data: &[u8]) -> Result<ClientHelloFingerprint, FingerprintError> {
    if data.is_empty() {
        return Err(FingerprintError::Parse("empty buffer".to_string()));
    }

    let mut cursor = ByteCursor::new(data);

    let content_type = cursor.read_u8("record type")?;
    if content_type != TLS_HANDSHAKE {
        return Err(FingerprintError::UnsupportedProtocol(format!(
            "record type 0x{content_type:02x} is not a handshake"
        )));
    }
    let tls_version = cursor.read_u16("record version")?;
    // Record and handshake lengths are advisory; every field below is bounded by its own length.
    let _record_len = cursor.read_u16("record length")?;

    let handshake_type = cursor.read_u8("handshake type")?;
    if handshake_type != TLS_CLIENT_HELLO {
        return Err(FingerprintError::UnsupportedProtocol(format!(
            "handshake type 0x{handshake_type:02x} is not a ClientHello"
        )));
    }
    let _handshake_len = cursor.read_u24("handshake length")?;

    let ch_version = cursor.read_u16("client version")?;
    cursor.skip(RANDOM_LEN, "random")?;

    let session_id_len = cursor.read_u8("session id length")?;
    cursor.skip(usize::from(session_id_len), "session id")?;

    let cipher_suites_len = cursor.read_u16("cipher suites length")?;
    let cipher_suites = cursor.read_bytes(usize::from(cipher_suites_len), "cipher suites")?;

    let comp_len = cursor.read_u8("compression methods length")?;
    let comp_methods = cursor.read_bytes(usize::from(comp_len), "compression methods")?;

    let mut parts = ClientHelloParts {
        tls_version,
        ch_version,
        cipher_suites: grease::normalize_u16_bytes(cipher_suites),
        comp_methods: comp_methods.to_vec(),
        ..ClientHelloParts::default()
    };

    // A ClientHello may end right after the compression methods.
    if !cursor.is_empty() {
        let extensions_len = cursor.read_u16("extensions length")?;
        let mut block = cursor.sub_cursor(usize::from(extensions_len), "extensions")?;
        let mut extension_types = Vec::new();

        while !block.is_empty() {
            let code = block.read_u16("extension type")?;
            let body_len = block.read_u16("extension length")?;
            let body = block.read_bytes(usize::from(body_len), "extension body")?;

            extension_types.push(code);
            decode_extension(ExtensionType::from(code), body, &mut parts)?;
        }

        parts.extensions = grease::normalize_u16_values(&extension_types);
    }

    debug!(
        "Parsed ClientHello: record=0x{:04x}, client=0x{:04x}, {} cipher bytes, {} extension bytes",
        parts.tls_version,
        parts.ch_version,
        parts.cipher_suites.len(),
        parts.extensions.len()
    );

    Ok(ClientHelloFingerprint::from_parts(parts))
}

/// Decode one extension body into the matching fingerprint field.
///
/// Several payloads are kept with their inner length prefix included; the
/// published identifiers were minted over those exact bytes.
fn decode_extension(
    extension: ExtensionType,
    body: &[u8],
    parts: &mut ClientHelloParts,
) -> Result<(), FingerprintError> {
    match extension {
        ExtensionType::ServerName => parts.server_name = decode_server_name(body)?,
        // The inner list length is read as if it were a group.
        ExtensionType::SupportedGroups => parts.elliptic_curves = grease::normalize_u16_bytes(body),
        ExtensionType::EcPointFormats => parts.ec_point_formats = body.to_vec(),
        ExtensionType::SignatureAlgorithms => parts.signature_algorithms = body.to_vec(),
        ExtensionType::Alpn => parts.alpn_protocols = body.to_vec(),
        ExtensionType::KeyShare => parts.key_share = decode_key_share(body)?,
        ExtensionType::PskKeyExchangeModes => {
            parts.psk_key_exchange_modes = skip_list_length(body).to_vec();
        }
        ExtensionType::SupportedVersions => {
            parts.supported_versions = grease::normalize_u16_bytes(skip_list_length(body));
        }
        ExtensionType::CompressCertificate => parts.cert_compression_algs = body.to_vec(),
        ExtensionType::RecordSizeLimit => parts.record_size_limit = body.to_vec(),
        ExtensionType::Other(_) => {}
    }
    Ok(())
}

/// Drop the leading one-byte list length.
fn skip_list_length(body: &[u8]) -> &[u8] {
    body.get(1..).unwrap_or_default()
}

fn decode_server_name(body: &[u8]) -> Result<Option<String>, FingerprintError> {
    if body.is_empty() {
        return Ok(None);
    }

    let mut cursor = ByteCursor::new(body);
    let _list_len = cursor.read_u16("server name list length")?;
    let _name_type = cursor.read_u8("server name type")?;
    let name_len = cursor.read_u16("server name length")?;
    let name = cursor.read_bytes(usize::from(name_len), "server name")?;

    String::from_utf8(name.to_vec())
        .map(Some)
        .map_err(|e| FingerprintError::Parse(format!("server name is not valid UTF-8: {e}")))
}

/// Collect (named group, key exchange length) pairs; key material is skipped.
///
/// The leading overall length is not used as a bound. The walk stops once
/// fewer than four bytes remain, and a key length running past the body
/// simply ends it.
fn decode_key_share(body: &[u8]) -> Result<Vec<u8>, FingerprintError> {
    let mut entries = ByteCursor::new(body.get(2..).unwrap_or_default());
    let mut pairs = Vec::new();

    while entries.remaining() >= 4 {
        let group = entries.read_u16("key share group")?;
        let key_len = entries.read_u16("key exchange length")?;
        pairs.extend_from_slice(&grease::normalize(group).to_be_bytes());
        pairs.extend_from_slice(&key_len.to_be_bytes());

        let skip = usize::from(key_len).min(entries.remaining());
        entries.skip(skip, "key exchange")?;
    }

    Ok(pairs)
}
