//! Fingerprint identifiers derived from a [`ClientHelloFingerprint`].
//!
//! Each variant hashes a fixed sequence of fields with SHA-1, every field
//! framed as a 4-byte big-endian length followed by its bytes, and keeps the
//! first 8 digest bytes as a big-endian signed 64-bit integer.
use crate::tls::ClientHelloFingerprint;
use serde::{Serialize, Serializer};
use sha1::{Digest, Sha1};
use std::fmt;

/// Which field set an identifier is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FingerprintVariant {
    /// Version pair, ciphers, compression, extensions, curves, point formats,
    /// signature algorithms, ALPN.
    Legacy,
    /// Legacy fields plus key share, PSK modes, supported versions,
    /// certificate compression and record size limit.
    Extended,
    /// Extended fields with extensions in sorted order.
    Normalized,
}

impl FingerprintVariant {
    pub fn name(&self) -> &'static str {
        match self {
            FingerprintVariant::Legacy => "legacy",
            FingerprintVariant::Extended => "extended",
            FingerprintVariant::Normalized => "normalized",
        }
    }
}

impl fmt::Display for FingerprintVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 64-bit fingerprint identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FingerprintId(i64);

impl FingerprintId {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Signed numeric form.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Fixed-width big-endian hex form, 16 lowercase digits.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl From<i64> for FingerprintId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for FingerprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for FingerprintId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

/// Compute the identifier of `fingerprint` for `variant`, bypassing the memo.
#[must_use]
pub fn compute(fingerprint: &ClientHelloFingerprint, variant: FingerprintVariant) -> FingerprintId {
    let digest = Sha1::digest(digest_input(fingerprint, variant));
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    FingerprintId(i64::from_be_bytes(head))
}

/// The exact byte sequence hashed for `variant`.
#[must_use]
pub fn digest_input(fingerprint: &ClientHelloFingerprint, variant: FingerprintVariant) -> Vec<u8> {
    let extensions = match variant {
        FingerprintVariant::Normalized => fingerprint.extensions_norm(),
        FingerprintVariant::Legacy | FingerprintVariant::Extended => fingerprint.extensions(),
    };

    let mut input = Vec::with_capacity(256);
    input.extend_from_slice(&fingerprint.tls_version().to_be_bytes());
    input.extend_from_slice(&fingerprint.ch_version().to_be_bytes());

    let legacy_fields = [
        fingerprint.cipher_suites(),
        fingerprint.comp_methods(),
        extensions,
        fingerprint.elliptic_curves(),
        fingerprint.ec_point_formats(),
        fingerprint.signature_algorithms(),
        fingerprint.alpn_protocols(),
    ];
    for field in legacy_fields {
        push_framed(&mut input, field);
    }

    if variant != FingerprintVariant::Legacy {
        let extended_fields = [
            fingerprint.key_share(),
            fingerprint.psk_key_exchange_modes(),
            fingerprint.supported_versions(),
            fingerprint.cert_compression_algs(),
            fingerprint.record_size_limit(),
        ];
        for field in extended_fields {
            push_framed(&mut input, field);
        }
    }

    input
}

fn push_framed(input: &mut Vec<u8>, field: &[u8]) {
    // Fields are bounded by 16-bit wire lengths, so they always fit.
    let len = u32::try_from(field.len()).unwrap_or(u32::MAX);
    input.extend_from_slice(&len.to_be_bytes());
    input.extend_from_slice(field);
}

impl ClientHelloFingerprint {
    /// Current identifier (extended variant), computed once and memoized.
    pub fn fingerprint(&self) -> FingerprintId {
        *self.cached_id.get_or_init(|| compute(self, FingerprintVariant::Extended))
    }

    /// Legacy identifier, without key share and later fields.
    pub fn fingerprint_v1(&self) -> FingerprintId {
        compute(self, FingerprintVariant::Legacy)
    }

    /// Extended identifier, always recomputed.
    pub fn fingerprint_v2(&self) -> FingerprintId {
        compute(self, FingerprintVariant::Extended)
    }

    /// Extended identifier over the sorted extension list.
    pub fn fingerprint_normalized(&self) -> FingerprintId {
        compute(self, FingerprintVariant::Normalized)
    }

    /// Whether [`fingerprint`](Self::fingerprint) has already been computed.
    pub fn is_fingerprint_cached(&self) -> bool {
        self.cached_id.get().is_some()
    }
}
