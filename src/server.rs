use crate::config::ServiceConfig;
use crate::error::FingerprintError;
use crate::handler::ConnectionHandler;
use crate::observation::{Observation, ObservationSender};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const MAX_REQUEST_HEADERS: usize = 64;
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Load a PEM certificate chain and private key into a rustls server config.
///
/// # Errors
/// - If either file cannot be read, holds no certificate or key, or rustls
///   rejects the pair.
pub fn load_tls_config(
    cert_path: &Path,
    key_path: &Path,
) -> Result<Arc<ServerConfig>, FingerprintError> {
    let mut cert_reader = BufReader::new(File::open(cert_path)?);
    let certs: Vec<CertificateDer<'static>> =
        rustls_pemfile::certs(&mut cert_reader).collect::<Result<_, _>>()?;
    if certs.is_empty() {
        return Err(FingerprintError::MissConfiguration(format!(
            "No certificate found in {}",
            cert_path.display()
        )));
    }

    let mut key_reader = BufReader::new(File::open(key_path)?);
    let key: PrivateKeyDer<'static> =
        rustls_pemfile::private_key(&mut key_reader)?.ok_or_else(|| {
            FingerprintError::MissConfiguration(format!(
                "No private key found in {}",
                key_path.display()
            ))
        })?;

    let config =
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
    Ok(Arc::new(config))
}

/// TLS listener answering every request with the caller's fingerprint report.
pub struct FingerprintServer {
    listener: TcpListener,
    tls_config: Arc<ServerConfig>,
    handler: ConnectionHandler,
    observations: Option<ObservationSender>,
    request_timeout: Duration,
    max_request_size: usize,
}

impl FingerprintServer {
    /// Bind the listening socket described by `config`.
    ///
    /// # Errors
    /// - If the address cannot be bound.
    pub fn bind(
        config: &ServiceConfig,
        tls_config: Arc<ServerConfig>,
        handler: ConnectionHandler,
    ) -> Result<Self, FingerprintError> {
        let address = config.listen_address();
        let listener = TcpListener::bind(&address)?;
        info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            tls_config,
            handler,
            observations: None,
            request_timeout: config.request_timeout,
            max_request_size: config.max_request_size,
        })
    }

    /// Forward an observation for every fingerprinted request with a user agent.
    #[must_use]
    pub fn with_observations(mut self, sender: ObservationSender) -> Self {
        self.observations = Some(sender);
        self
    }

    /// # Errors
    /// - If the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr, FingerprintError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `cancel_signal` is raised, one thread per connection.
    ///
    /// # Errors
    /// - If the listener cannot be switched to non-blocking mode.
    pub fn serve(&self, cancel_signal: Arc<AtomicBool>) -> Result<(), FingerprintError> {
        self.listener.set_nonblocking(true)?;

        while !cancel_signal.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, peer)) => self.spawn_connection(stream, peer),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Failed to accept connection: {e}");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        debug!("Cancellation signal received, no longer accepting connections");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let connection = Connection {
            tls_config: Arc::clone(&self.tls_config),
            handler: self.handler.clone(),
            observations: self.observations.clone(),
            request_timeout: self.request_timeout,
            max_request_size: self.max_request_size,
        };

        let spawned = thread::Builder::new()
            .name(format!("conn-{peer}"))
            .spawn(move || {
                if let Err(e) = connection.serve(stream, peer) {
                    warn!("Connection from {peer} failed: {e}");
                }
            });
        if let Err(e) = spawned {
            error!("Failed to spawn connection thread for {peer}: {e}");
        }
    }
}

struct Connection {
    tls_config: Arc<ServerConfig>,
    handler: ConnectionHandler,
    observations: Option<ObservationSender>,
    request_timeout: Duration,
    max_request_size: usize,
}

impl Connection {
    fn serve(self, stream: TcpStream, peer: SocketAddr) -> Result<(), FingerprintError> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.request_timeout))?;
        stream.set_write_timeout(Some(self.request_timeout))?;
        debug!("Connection from {peer}");

        let conn = ServerConnection::new(self.tls_config)?;
        let mut tls = StreamOwned::new(conn, stream);
        while tls.conn.is_handshaking() {
            tls.conn.complete_io(&mut tls.sock)?;
        }

        let head = read_request_head(&mut tls, self.max_request_size)?;
        let agent = user_agent(&head);
        let report = self.handler.handle(peer, &agent);
        debug!("{report}");

        if let (Some(sender), Some(observation)) =
            (&self.observations, Observation::from_report(&report))
        {
            if !sender.submit(observation) {
                debug!("Observation recorder is gone, dropping observation for {peer}");
            }
        }

        let body = report.to_json()?;
        tls.write_all(http_response(&body).as_bytes())?;
        tls.conn.send_close_notify();
        tls.flush()?;

        info!(
            "Served {peer}: fingerprint={}",
            report.fingerprint.as_ref().map_or_else(|| "none".to_string(), |fp| fp.id.clone())
        );
        Ok(())
    }
}

/// Read until the end of the request head, EOF, a timeout, or `max_len` bytes.
pub fn read_request_head<R: Read>(reader: &mut R, max_len: usize) -> Result<Vec<u8>, FingerprintError> {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];

    while head.len() < max_len && !contains_terminator(&head) {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => head.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::UnexpectedEof
                ) =>
            {
                debug!("Request head ended early: {e}");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    head.truncate(max_len);
    Ok(head)
}

fn contains_terminator(buf: &[u8]) -> bool {
    buf.windows(HEAD_TERMINATOR.len()).any(|window| window == HEAD_TERMINATOR)
}

/// `User-Agent` header of an HTTP request head, or an empty string.
pub fn user_agent(head: &[u8]) -> String {
    let mut headers = [httparse::EMPTY_HEADER; MAX_REQUEST_HEADERS];
    let mut request = httparse::Request::new(&mut headers);
    if let Err(e) = request.parse(head) {
        debug!("Unparsable request head: {e}");
        return String::new();
    }

    request
        .headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case("user-agent"))
        .map(|header| String::from_utf8_lossy(header.value).into_owned())
        .unwrap_or_default()
}

/// Full HTTP/1.1 response carrying a JSON body.
pub fn http_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
        Content-type: application/json\r\n\
        Content-Length: {}\r\n\
        Access-Control-Allow-Origin: *\r\n\
        Connection: close\r\n\
        \r\n\
        {body}",
        body.len()
    )
}
