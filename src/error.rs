use thiserror::Error;

/// Error handling for ClientHello parsing, packet capture and the fingerprint service.
#[derive(Error, Debug)]
pub enum FingerprintError {
    /// An error occurred while parsing data.
    ///
    /// Raised when a declared length runs past the available bytes or a field
    /// cannot be decoded. The associated string says which field failed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An unsupported protocol was encountered.
    ///
    /// Raised when a record is not a TLS handshake or the handshake is not a ClientHello.
    #[error("Unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// The service was started with incomplete or inconsistent settings.
    #[error("Misconfiguration: {0}")]
    MissConfiguration(String),

    /// A capture file could not be opened or read.
    #[error("Pcap error: {0}")]
    Pcap(String),

    /// A socket, file or thread operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// rustls rejected the certificate, key or a handshake.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// A report could not be encoded as JSON.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
