use crate::config::ServiceConfig;
use crate::correlation::{ClientKey, CorrelationStore};
use crate::datalink_parser::{parse_packet, DatalinkFormat, IpPacket};
use crate::error::FingerprintError;
use crate::tls::TLS_HANDSHAKE;
use pcap_file::pcap::PcapReader;
use pnet::datalink::{self, Config};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::Packet;
use std::fs::File;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Poll interval of the live capture, so cancellation and sweeps run while idle.
const LIVE_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Parameters of the capture ingestion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Only TCP segments sent to this port are considered
    pub listen_port: u16,
    /// Entries older than this are removed by a sweep
    pub correlation_window: Duration,
    /// Minimum time between two sweeps
    pub sweep_interval: Duration,
}

impl From<&ServiceConfig> for CaptureSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            listen_port: config.port,
            correlation_window: config.correlation_window,
            sweep_interval: config.sweep_interval,
        }
    }
}

/// What happened to a single captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First handshake seen from this client; stored.
    Inserted(ClientKey),
    /// A handshake from a client that already has an entry; discarded.
    Duplicate(ClientKey),
    /// Segment to the listening port whose payload is not a handshake record.
    NotHandshake(ClientKey),
    /// Not IP, not TCP, another port, or no payload.
    Ignored,
}

/// Where captured frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    Interface(String),
    Pcap(PathBuf),
}

impl CaptureSource {
    /// The interface or pcap file named in `config`, interface first.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Option<Self> {
        match (&config.interface, &config.pcap) {
            (Some(interface), _) => Some(Self::Interface(interface.clone())),
            (None, Some(pcap)) => Some(Self::Pcap(pcap.clone())),
            (None, None) => None,
        }
    }
}

enum CaptureEvent {
    Frame(Vec<u8>),
    Idle,
}

/// Feeds captured ClientHello records into a [`CorrelationStore`].
///
/// Capture is best effort: frames that cannot be decoded are dropped and a
/// ClientHello split over several segments is stored as its first segment only.
pub struct CaptureIngest {
    store: Arc<CorrelationStore>,
    settings: CaptureSettings,
    next_sweep: Instant,
}

impl CaptureIngest {
    pub fn new(store: Arc<CorrelationStore>, settings: CaptureSettings) -> Self {
        let next_sweep = Instant::now() + settings.sweep_interval;
        Self { store, settings, next_sweep }
    }

    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }

    pub fn settings(&self) -> CaptureSettings {
        self.settings
    }

    /// Ingest one link-layer frame, then sweep if the sweep interval has elapsed.
    pub fn ingest_frame(&mut self, frame: &[u8], format: DatalinkFormat) -> IngestOutcome {
        let now = Instant::now();
        let outcome = self.ingest_frame_at(frame, format, now);
        self.maybe_sweep(now);
        outcome
    }

    /// Ingest one frame captured at `captured_at`, without sweeping.
    pub fn ingest_frame_at(
        &self,
        frame: &[u8],
        format: DatalinkFormat,
        captured_at: Instant,
    ) -> IngestOutcome {
        match parse_packet(frame, format) {
            IpPacket::Ipv4(ipv4) => {
                if ipv4.get_next_level_protocol() != IpNextHeaderProtocols::Tcp {
                    return IngestOutcome::Ignored;
                }
                self.ingest_tcp(IpAddr::V4(ipv4.get_source()), ipv4.payload(), captured_at)
            }
            IpPacket::Ipv6(ipv6) => {
                if ipv6.get_next_header() != IpNextHeaderProtocols::Tcp {
                    return IngestOutcome::Ignored;
                }
                self.ingest_tcp(IpAddr::V6(ipv6.get_source()), ipv6.payload(), captured_at)
            }
            IpPacket::None => IngestOutcome::Ignored,
        }
    }

    fn ingest_tcp(&self, source: IpAddr, segment: &[u8], captured_at: Instant) -> IngestOutcome {
        let Some(tcp) = TcpPacket::new(segment) else {
            return IngestOutcome::Ignored;
        };
        if tcp.get_destination() != self.settings.listen_port {
            return IngestOutcome::Ignored;
        }

        let key = ClientKey::new(source, tcp.get_source());
        let payload = tcp.payload();
        match payload.first() {
            None => IngestOutcome::Ignored,
            Some(&TLS_HANDSHAKE) => {
                if self.store.try_insert(key, captured_at, payload) {
                    debug!("Handshake found for {key} ({} bytes)", payload.len());
                    IngestOutcome::Inserted(key)
                } else {
                    IngestOutcome::Duplicate(key)
                }
            }
            Some(first) => {
                debug!("Segment from {key} starts with 0x{first:02x}, not a handshake");
                IngestOutcome::NotHandshake(key)
            }
        }
    }

    /// Sweep expired entries if the sweep interval has elapsed at `now`.
    ///
    /// Returns the number of removed entries when a sweep ran.
    pub fn maybe_sweep(&mut self, now: Instant) -> Option<usize> {
        if now < self.next_sweep {
            return None;
        }
        let removed = self.store.sweep_at(now, self.settings.correlation_window);
        self.next_sweep = now + self.settings.sweep_interval;
        debug!("Swept {removed} expired entries, {} left", self.store.len());
        Some(removed)
    }

    /// Run the capture from `source` on its own thread.
    ///
    /// A capture that fails raises `cancel_signal` and returns the failure
    /// from the thread.
    ///
    /// # Errors
    /// Returns `FingerprintError::Io` if the thread cannot be spawned.
    pub fn spawn(
        mut self,
        source: CaptureSource,
        cancel_signal: Arc<AtomicBool>,
    ) -> Result<thread::JoinHandle<Result<(), FingerprintError>>, FingerprintError> {
        let handle = thread::Builder::new().name("capture".to_string()).spawn(move || {
            let result = match &source {
                CaptureSource::Interface(name) => {
                    self.run_live(name, Some(Arc::clone(&cancel_signal)))
                }
                CaptureSource::Pcap(path) => self.run_pcap(path, Some(Arc::clone(&cancel_signal))),
            };
            match &result {
                Ok(()) => info!("Capture stopped"),
                Err(e) => {
                    error!("Capture failed: {e}");
                    cancel_signal.store(true, Ordering::Relaxed);
                }
            }
            result
        })?;
        Ok(handle)
    }

    /// Capture on the named interface until the cancel signal is raised.
    ///
    /// # Errors
    /// - If the network interface cannot be found or a channel cannot be created.
    pub fn run_live(
        &mut self,
        interface_name: &str,
        cancel_signal: Option<Arc<AtomicBool>>,
    ) -> Result<(), FingerprintError> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == interface_name)
            .ok_or_else(|| {
                FingerprintError::MissConfiguration(format!(
                    "Could not find network interface: {interface_name}"
                ))
            })?;

        info!("Capturing on interface {} (port {})", interface.name, self.settings.listen_port);

        let config = Config {
            promiscuous: true,
            read_timeout: Some(LIVE_READ_TIMEOUT),
            ..Config::default()
        };

        let (_tx, mut rx) = match datalink::channel(&interface, config) {
            Ok(datalink::Channel::Ethernet(tx, rx)) => (tx, rx),
            Ok(_) => {
                return Err(FingerprintError::MissConfiguration("Unhandled channel type".to_string()))
            }
            Err(e) => {
                return Err(FingerprintError::MissConfiguration(format!(
                    "Unable to create channel: {e}"
                )))
            }
        };

        self.process_with(
            move || match rx.next() {
                Ok(frame) => Some(Ok(CaptureEvent::Frame(frame.to_vec()))),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) =>
                {
                    Some(Ok(CaptureEvent::Idle))
                }
                Err(e) => Some(Err(FingerprintError::Io(e))),
            },
            DatalinkFormat::Ethernet,
            cancel_signal,
        )
    }

    /// Replay a pcap file through the same ingestion path as a live capture.
    ///
    /// # Errors
    /// - If the file cannot be opened, is not a pcap file, or uses an unsupported link type.
    pub fn run_pcap(
        &mut self,
        pcap_path: &Path,
        cancel_signal: Option<Arc<AtomicBool>>,
    ) -> Result<(), FingerprintError> {
        let file = File::open(pcap_path).map_err(|e| {
            FingerprintError::Pcap(format!("Failed to open {}: {e}", pcap_path.display()))
        })?;
        let mut reader = PcapReader::new(file)
            .map_err(|e| FingerprintError::Pcap(format!("Failed to create PCAP reader: {e}")))?;

        let datalink = reader.header().datalink;
        let format = DatalinkFormat::from_pcap(datalink).ok_or_else(|| {
            FingerprintError::UnsupportedProtocol(format!("pcap link type {datalink:?}"))
        })?;

        info!("Replaying {} ({format:?})", pcap_path.display());

        let mut failed = false;
        self.process_with(
            move || {
                if failed {
                    return None;
                }
                match reader.next_packet() {
                    Some(Ok(packet)) => Some(Ok(CaptureEvent::Frame(packet.data.to_vec()))),
                    Some(Err(e)) => {
                        failed = true;
                        Some(Err(FingerprintError::Pcap(format!("Error reading PCAP packet: {e}"))))
                    }
                    None => None,
                }
            },
            format,
            cancel_signal,
        )
    }

    fn process_with<F>(
        &mut self,
        mut next_event: F,
        format: DatalinkFormat,
        cancel_signal: Option<Arc<AtomicBool>>,
    ) -> Result<(), FingerprintError>
    where
        F: FnMut() -> Option<Result<CaptureEvent, FingerprintError>>,
    {
        while let Some(event) = next_event() {
            if let Some(ref cancel) = cancel_signal {
                if cancel.load(Ordering::Relaxed) {
                    debug!("Cancellation signal received, stopping capture");
                    break;
                }
            }

            match event {
                Ok(CaptureEvent::Frame(frame)) => {
                    self.ingest_frame(&frame, format);
                }
                Ok(CaptureEvent::Idle) => {
                    self.maybe_sweep(Instant::now());
                }
                Err(e) => {
                    error!("Failed to read packet: {e}");
                }
            }
        }
        Ok(())
    }
}
