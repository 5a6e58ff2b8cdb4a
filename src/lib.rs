#![forbid(unsafe_code)]

//! Passive TLS ClientHello fingerprinting.
//!
//! Handshakes are captured off the wire, keyed by client address and port,
//! and joined with the TLS connections the same host accepts. Each ClientHello
//! is reduced to its GREASE-normalized fields and hashed into three 64-bit
//! identifiers (legacy, extended and normalized).

pub mod capture;
pub mod config;
pub mod correlation;
pub mod cursor;
pub mod datalink_parser;
pub mod error;
pub mod fingerprint_hash;
pub mod grease;
pub mod handler;
pub mod observation;
pub mod output;
pub mod server;
pub mod tls;
pub mod tls_process;

pub use capture::{CaptureIngest, CaptureSettings, CaptureSource, IngestOutcome};
pub use config::ServiceConfig;
pub use correlation::{ClientKey, CorrelationStore};
pub use error::FingerprintError;
pub use fingerprint_hash::{FingerprintId, FingerprintVariant};
pub use handler::ConnectionHandler;
pub use output::{FingerprintFields, FingerprintReport};
pub use tls::{ClientHelloFingerprint, ClientHelloParts};
pub use tls_process::{parse_client_hello, try_parse_client_hello};
