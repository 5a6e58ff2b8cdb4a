use clap::Parser;
use clienthello_fp::capture::{CaptureIngest, CaptureSettings, CaptureSource};
use clienthello_fp::config::{
    ServiceConfig, DEFAULT_CORRELATION_WINDOW, DEFAULT_PORT, DEFAULT_SWEEP_INTERVAL,
};
use clienthello_fp::correlation::CorrelationStore;
use clienthello_fp::error::FingerprintError;
use clienthello_fp::handler::ConnectionHandler;
use clienthello_fp::observation::{ObservationRecorder, TracingSink};
use clienthello_fp::server::{load_tls_config, FingerprintServer};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, Level};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Fingerprints the TLS ClientHello of every client connecting to this server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Host to listen on (all interfaces when empty)
    #[arg(short = 't', long, default_value = "")]
    host: String,

    /// Port to listen on, also the port watched by the capture
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Network interface to capture handshakes on
    #[arg(short, long)]
    interface: Option<String>,

    /// Replay handshakes from a pcap file instead of capturing live
    #[arg(long, conflicts_with = "interface")]
    pcap: Option<PathBuf>,

    /// PEM private key for the listener
    #[arg(short = 'k', long = "keyfile")]
    keyfile: Option<PathBuf>,

    /// PEM certificate chain for the listener
    #[arg(short = 'c', long = "certfile")]
    certfile: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    /// Log file path
    #[arg(short = 'l', long = "log-file")]
    log_file: Option<String>,

    /// Seconds a captured handshake stays available
    #[arg(long = "window-secs", default_value_t = DEFAULT_CORRELATION_WINDOW.as_secs())]
    window_secs: u64,

    /// Seconds between sweeps of expired handshakes
    #[arg(long = "sweep-secs", default_value_t = DEFAULT_SWEEP_INTERVAL.as_secs())]
    sweep_secs: u64,
}

impl Args {
    fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            host: self.host.clone(),
            port: self.port,
            interface: self.interface.clone(),
            pcap: self.pcap.clone(),
            cert_path: self.certfile.clone().unwrap_or_default(),
            key_path: self.keyfile.clone().unwrap_or_default(),
            correlation_window: Duration::from_secs(self.window_secs),
            sweep_interval: Duration::from_secs(self.sweep_secs),
            verbose: self.verbose,
            ..ServiceConfig::default()
        }
    }
}

fn initialize_logging(log_file: Option<String>, verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let console_writer = std::io::stdout.with_max_level(level);

    let file_appender = if let Some(log_file) = log_file {
        RollingFileAppender::new(Rotation::NEVER, ".", log_file).with_max_level(level)
    } else {
        RollingFileAppender::new(Rotation::NEVER, ".", "clienthello-fp.log").with_max_level(level)
    };

    let writer = console_writer.and(file_appender);

    let subscriber = fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::from_level(level).into())
                .from_env_lossy(),
        )
        .with_writer(writer)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set subscriber: {e}");
        std::process::exit(1);
    }
}

fn run(config: ServiceConfig, cancel_signal: Arc<AtomicBool>) -> Result<(), FingerprintError> {
    config.validate()?;

    let tls_config = load_tls_config(&config.cert_path, &config.key_path)?;
    let store = Arc::new(CorrelationStore::new());

    let source = CaptureSource::from_config(&config).ok_or_else(|| {
        FingerprintError::MissConfiguration("No interface specified".to_string())
    })?;
    let ingest = CaptureIngest::new(Arc::clone(&store), CaptureSettings::from(&config));
    let capture = ingest.spawn(source, Arc::clone(&cancel_signal))?;

    let mut recorder = ObservationRecorder::spawn(TracingSink)?;
    let server = FingerprintServer::bind(&config, tls_config, ConnectionHandler::new(store))?
        .with_observations(recorder.sender());

    let served = server.serve(Arc::clone(&cancel_signal));

    // Connection threads hold recorder senders until they finish.
    drop(server);
    let captured = match capture.join() {
        Ok(result) => result,
        Err(_) => {
            error!("Capture thread panicked");
            Ok(())
        }
    };
    let recorded = recorder.shutdown();
    info!("Recorded {recorded} observations");
    served.and(captured)
}

fn main() {
    let args = Args::parse();
    initialize_logging(args.log_file.clone(), args.verbose);

    info!("Starting ClientHello fingerprint server");

    let cancel_signal = Arc::new(AtomicBool::new(false));
    let ctrl_c_signal = cancel_signal.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received signal, initiating graceful shutdown...");
        ctrl_c_signal.store(true, Ordering::Relaxed);
    }) {
        error!("Error setting signal handler: {e}");
        return;
    }

    if let Err(e) = run(args.service_config(), cancel_signal) {
        error!("{e}");
        std::process::exit(1);
    }

    info!("Shutdown completed");
}
