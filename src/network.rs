//! TCP / TLS byte stream
//!
//! The connection is a plain `TcpStream` or a rustls client session wrapped
//! over one. A background thread reads the socket and forwards chunks over
//! an mpsc channel; the session controller drains the channel, runs the
//! framer and interpreter to completion per chunk, and writes replies back.
//!
//! Certificate handling drives the encryption indicator: a handshake under
//! default validation reports `Encrypted`; if the user disabled certificate
//! verification the handshake proceeds with a permissive verifier and the
//! connection reports `SemiEncrypted`.

use std::io::{Read, Result as IoResult, Write};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore};

use crate::error::{NetworkError, NetworkResult};

/// Socket encryption state, surfaced on the status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encryption {
    #[default]
    Unencrypted,
    /// TLS established with certificate validation disabled by the user
    SemiEncrypted,
    /// TLS established under default validation
    Encrypted,
}

/// A rustls client session over its TCP stream
struct OwnedTlsStream {
    conn: ClientConnection,
    stream: TcpStream,
}

impl Read for OwnedTlsStream {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let mut s = rustls::Stream::new(&mut self.conn, &mut self.stream);
        s.read(buf)
    }
}

impl Write for OwnedTlsStream {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        let mut s = rustls::Stream::new(&mut self.conn, &mut self.stream);
        s.write(buf)
    }

    fn flush(&mut self) -> IoResult<()> {
        let mut s = rustls::Stream::new(&mut self.conn, &mut self.stream);
        s.flush()
    }
}

enum StreamType {
    Plain(TcpStream),
    Tls(OwnedTlsStream),
}

impl Read for StreamType {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        match self {
            StreamType::Plain(t) => t.read(buf),
            StreamType::Tls(t) => t.read(buf),
        }
    }
}

impl Write for StreamType {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        match self {
            StreamType::Plain(t) => t.write(buf),
            StreamType::Tls(t) => t.write(buf),
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        match self {
            StreamType::Plain(t) => t.flush(),
            StreamType::Tls(t) => t.flush(),
        }
    }
}

/// Events the reader thread delivers to the session
#[derive(Debug)]
pub enum NetworkEvent {
    /// Bytes from the host
    Data(Vec<u8>),
    /// The peer closed the connection or the read failed
    Closed(Option<String>),
}

/// An established connection to a host
pub struct Connection {
    writer: Arc<Mutex<StreamType>>,
    events: Receiver<NetworkEvent>,
    encryption: Encryption,
    closed: Arc<Mutex<bool>>,
}

/// Connection parameters
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub verify_certificates: bool,
    pub connect_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 23,
            secure: false,
            verify_certificates: true,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl Connection {
    /// Open a connection, completing the TLS handshake when requested
    pub fn open(options: &ConnectOptions) -> NetworkResult<Self> {
        let address = format!("{}:{}", options.host, options.port);

        let tcp = TcpStream::connect(&address).map_err(|e| match e.kind() {
            std::io::ErrorKind::ConnectionRefused => NetworkError::ConnectionRefused {
                host: options.host.clone(),
                port: options.port,
            },
            _ => NetworkError::ConnectionLost {
                reason: e.to_string(),
            },
        })?;

        tcp.set_nodelay(true).ok();

        let (stream, encryption) = if options.secure {
            let config = if options.verify_certificates {
                build_verified_config()?
            } else {
                build_permissive_config()
            };

            let server_name = ServerName::try_from(options.host.clone()).map_err(|e| {
                NetworkError::InvalidAddress {
                    address: format!("{}: {e}", options.host),
                }
            })?;

            let conn = ClientConnection::new(Arc::new(config), server_name).map_err(|e| {
                NetworkError::TlsHandshakeFailed {
                    reason: e.to_string(),
                }
            })?;

            let mut tls = OwnedTlsStream { conn, stream: tcp };

            // Drive the handshake to completion so certificate problems
            // surface here, not on the first read
            while tls.conn.is_handshaking() {
                tls.conn
                    .complete_io(&mut tls.stream)
                    .map_err(|e| NetworkError::TlsHandshakeFailed {
                        reason: e.to_string(),
                    })?;
            }

            let encryption = if options.verify_certificates {
                Encryption::Encrypted
            } else {
                Encryption::SemiEncrypted
            };

            (StreamType::Tls(tls), encryption)
        } else {
            (StreamType::Plain(tcp), Encryption::Unencrypted)
        };

        let writer = Arc::new(Mutex::new(stream));
        let closed = Arc::new(Mutex::new(false));
        let (tx, rx) = mpsc::channel();

        Self::start_reader(Arc::clone(&writer), tx, Arc::clone(&closed));

        debug!("connected to {address} ({encryption:?})");

        Ok(Self {
            writer,
            events: rx,
            encryption,
            closed,
        })
    }

    /// Background reader: socket chunks become channel events
    fn start_reader(
        stream: Arc<Mutex<StreamType>>,
        tx: Sender<NetworkEvent>,
        closed: Arc<Mutex<bool>>,
    ) {
        thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                if *closed.lock().unwrap() {
                    break;
                }

                let result = {
                    let mut guard = stream.lock().unwrap();
                    // Short timeout so a close request is noticed promptly
                    match &*guard {
                        StreamType::Plain(t) => {
                            t.set_read_timeout(Some(Duration::from_millis(200))).ok();
                        }
                        StreamType::Tls(t) => {
                            t.stream.set_read_timeout(Some(Duration::from_millis(200))).ok();
                        }
                    }
                    guard.read(&mut buf)
                };

                match result {
                    Ok(0) => {
                        let _ = tx.send(NetworkEvent::Closed(None));
                        break;
                    }
                    Ok(n) => {
                        if tx.send(NetworkEvent::Data(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                    Err(e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        continue;
                    }
                    Err(e) => {
                        warn!("socket read failed: {e}");
                        let _ = tx.send(NetworkEvent::Closed(Some(e.to_string())));
                        break;
                    }
                }
            }
        });
    }

    pub fn encryption(&self) -> Encryption {
        self.encryption
    }

    /// Channel of reader-thread events
    pub fn events(&self) -> &Receiver<NetworkEvent> {
        &self.events
    }

    /// Write bytes to the host
    pub fn send(&self, data: &[u8]) -> NetworkResult<()> {
        let mut guard = self.writer.lock().unwrap();
        guard
            .write_all(data)
            .and_then(|_| guard.flush())
            .map_err(|e| NetworkError::ConnectionLost {
                reason: e.to_string(),
            })
    }

    /// Stop the reader thread and drop the socket
    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
        if let Ok(guard) = self.writer.lock() {
            match &*guard {
                StreamType::Plain(t) => {
                    t.shutdown(std::net::Shutdown::Both).ok();
                }
                StreamType::Tls(t) => {
                    t.stream.shutdown(std::net::Shutdown::Both).ok();
                }
            }
        }
    }
}

/// Client config validating against the system roots plus webpki's bundle
fn build_verified_config() -> NetworkResult<ClientConfig> {
    let mut root_store = RootCertStore::empty();

    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    match rustls_native_certs::load_native_certs() {
        Ok(certs) => {
            for cert in certs {
                if let Err(e) = root_store.add(cert) {
                    debug!("skipping unusable native certificate: {e}");
                }
            }
        }
        Err(e) => {
            // The webpki bundle still applies; native roots are best effort
            warn!("native certificate store unavailable: {e}");
        }
    }

    Ok(ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth())
}

/// Client config that accepts any certificate (user disabled verification)
fn build_permissive_config() -> ClientConfig {
    let mut config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
        .with_no_client_auth();
    config.enable_sni = true;
    config
}

/// Verifier behind the user's "do not verify certificates" switch
#[derive(Debug)]
struct AcceptAnyServerCert;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
