use crate::error::FingerprintError;
use std::path::PathBuf;
use std::time::Duration;

/// Default port the TLS listener binds and the capture path watches.
pub const DEFAULT_PORT: u16 = 8443;

/// How long a captured ClientHello stays available for correlation.
pub const DEFAULT_CORRELATION_WINDOW: Duration = Duration::from_secs(30);

/// How often the capture loop sweeps expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(120);

/// Settings for the fingerprint service.
///
/// Every value is plain data; how it was obtained (flags, environment, file)
/// is up to the caller.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on; empty means all interfaces
    pub host: String,
    pub port: u16,
    /// Interface to capture on
    pub interface: Option<String>,
    /// Replay a pcap file instead of capturing live
    pub pcap: Option<PathBuf>,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub correlation_window: Duration,
    pub sweep_interval: Duration,
    /// Read/write timeout applied to each accepted connection
    pub request_timeout: Duration,
    /// Upper bound on the request head read from a client
    pub max_request_size: usize,
    pub verbose: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            interface: None,
            pcap: None,
            cert_path: PathBuf::new(),
            key_path: PathBuf::new(),
            correlation_window: DEFAULT_CORRELATION_WINDOW,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            request_timeout: Duration::from_secs(10),
            max_request_size: 8 * 1024,
            verbose: false,
        }
    }
}

impl ServiceConfig {
    /// Check that the settings describe a runnable service.
    ///
    /// # Errors
    /// Returns `FingerprintError::MissConfiguration` when no capture source is
    /// set, when both are set, when certificate or key is missing, or when a
    /// duration is zero.
    pub fn validate(&self) -> Result<(), FingerprintError> {
        match (&self.interface, &self.pcap) {
            (None, None) => {
                return Err(FingerprintError::MissConfiguration(
                    "No interface specified".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(FingerprintError::MissConfiguration(
                    "Capture interface and pcap file are mutually exclusive".to_string(),
                ))
            }
            _ => {}
        }
        if self.interface.as_deref().is_some_and(str::is_empty) {
            return Err(FingerprintError::MissConfiguration("No interface specified".to_string()));
        }
        if self.cert_path.as_os_str().is_empty() || self.key_path.as_os_str().is_empty() {
            return Err(FingerprintError::MissConfiguration(
                "Both a certificate file and a key file are required".to_string(),
            ));
        }
        if self.correlation_window.is_zero() || self.sweep_interval.is_zero() {
            return Err(FingerprintError::MissConfiguration(
                "Correlation window and sweep interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` for the listener, with an empty host meaning every interface.
    #[must_use]
    pub fn listen_address(&self) -> String {
        let host = if self.host.is_empty() { "0.0.0.0" } else { self.host.as_str() };
        if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]:{}", self.port)
        } else {
            format!("{host}:{}", self.port)
        }
    }
}
