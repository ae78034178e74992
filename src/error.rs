//! Error handling for tn3270r
//!
//! This module provides the structured error types the emulation core can
//! produce. Every error here is recoverable by reconnecting; none is fatal to
//! the process.

use std::fmt;
use std::io;
use std::error::Error as StdError;

/// Top-level error type for tn3270r operations
#[derive(Debug)]
pub enum TN3270Error {
    /// Network connection errors
    Network(NetworkError),
    /// Telnet negotiation and framing errors
    Telnet(TelnetError),
    /// 3270 data stream parsing errors
    Protocol(ProtocolError),
    /// Rejected keyboard input
    Input(InputError),
    /// Configuration / profile errors
    Config(ConfigError),
}

/// Network connection related errors
#[derive(Debug)]
pub enum NetworkError {
    /// Connection refused by remote host
    ConnectionRefused { host: String, port: u16 },
    /// Invalid host address (including a malformed lu@host:port string)
    InvalidAddress { address: String },
    /// Connection lost during operation
    ConnectionLost { reason: String },
    /// Peer closed the connection
    PeerDisconnect,
    /// TLS handshake failed under default certificate validation
    TlsHandshakeFailed { reason: String },
    /// Certificate chain failed validation
    CertificateInvalid { reason: String },
}

/// Telnet negotiation and framing errors
#[derive(Debug)]
pub enum TelnetError {
    /// The host refused an option we require; the session continues in the
    /// preceding negotiation state
    NegotiationRejected { option: u8 },
    /// Subnegotiation data did not match any handler
    MalformedSubnegotiation { option: u8, data: Vec<u8> },
}

/// 3270 data stream parsing errors
#[derive(Debug)]
pub enum ProtocolError {
    /// First byte of a record is not a recognised command; the record is
    /// discarded
    UnknownCommand { code: u8 },
    /// Unrecognised order inside a recognised command; the remainder of the
    /// record is discarded but prior mutations stand
    UnknownOrder { code: u8, offset: usize },
    /// Buffer address beyond the end of the screen; clamped to N-1
    AddressOutOfRange { address: usize, buffer_size: usize },
    /// Record ended mid-order or a structured field declared more bytes than
    /// remain
    TruncatedRecord { expected: usize, remaining: usize },
    /// Structured field id with no handler
    UnknownStructuredField { id: u8 },
}

/// Rejected keyboard input
///
/// These reject the user action, leave the keyboard unlocked and do not
/// disturb the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    /// Insert mode found no null in the field to absorb the shift
    InsertOverflow,
    /// Target cell is protected
    InputIntoProtected,
    /// Target cell is a field attribute byte
    CursorAtFieldStart,
    /// Key arrived while the keyboard is locked
    KeyboardLocked,
}

/// Configuration / profile errors
#[derive(Debug)]
pub enum ConfigError {
    /// Profile or theme file could not be read or written
    FileError { path: String, error: String },
    /// Stored profile failed to deserialise
    InvalidProfile { name: String, reason: String },
    /// Attempted to modify the reserved "Factory" theme
    FactoryThemeReadOnly { theme: String },
}

impl fmt::Display for TN3270Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TN3270Error::Network(err) => write!(f, "Network error: {err}"),
            TN3270Error::Telnet(err) => write!(f, "Telnet error: {err}"),
            TN3270Error::Protocol(err) => write!(f, "Protocol error: {err}"),
            TN3270Error::Input(err) => write!(f, "Input rejected: {err}"),
            TN3270Error::Config(err) => write!(f, "Configuration error: {err}"),
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::ConnectionRefused { host, port } =>
                write!(f, "Connection refused to {host}:{port}"),
            NetworkError::InvalidAddress { address } =>
                write!(f, "Invalid network address: {address}"),
            NetworkError::ConnectionLost { reason } =>
                write!(f, "Connection lost: {reason}"),
            NetworkError::PeerDisconnect =>
                write!(f, "Host closed the connection"),
            NetworkError::TlsHandshakeFailed { reason } =>
                write!(f, "TLS handshake failed: {reason}"),
            NetworkError::CertificateInvalid { reason } =>
                write!(f, "Certificate validation failed: {reason}"),
        }
    }
}

impl fmt::Display for TelnetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelnetError::NegotiationRejected { option } =>
                write!(f, "Option {option} rejected by host"),
            TelnetError::MalformedSubnegotiation { option, data } =>
                write!(f, "Malformed subnegotiation for option {option}: {data:?}"),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::UnknownCommand { code } =>
                write!(f, "Unrecognised 3270 command 0x{code:02X}"),
            ProtocolError::UnknownOrder { code, offset } =>
                write!(f, "Unrecognised order 0x{code:02X} at offset {offset}"),
            ProtocolError::AddressOutOfRange { address, buffer_size } =>
                write!(f, "Buffer address {address} exceeds screen size {buffer_size}"),
            ProtocolError::TruncatedRecord { expected, remaining } =>
                write!(f, "Truncated record: needed {expected} bytes, {remaining} remain"),
            ProtocolError::UnknownStructuredField { id } =>
                write!(f, "Unimplemented structured field 0x{id:02X}"),
        }
    }
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::InsertOverflow => write!(f, "no room to insert in field"),
            InputError::InputIntoProtected => write!(f, "cell is protected"),
            InputError::CursorAtFieldStart => write!(f, "cell is a field attribute"),
            InputError::KeyboardLocked => write!(f, "keyboard is locked"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileError { path, error } =>
                write!(f, "Configuration file error '{path}': {error}"),
            ConfigError::InvalidProfile { name, reason } =>
                write!(f, "Invalid profile '{name}': {reason}"),
            ConfigError::FactoryThemeReadOnly { theme } =>
                write!(f, "Theme '{theme}' is read-only"),
        }
    }
}

impl StdError for TN3270Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TN3270Error::Network(err) => Some(err),
            TN3270Error::Telnet(err) => Some(err),
            TN3270Error::Protocol(err) => Some(err),
            TN3270Error::Input(err) => Some(err),
            TN3270Error::Config(err) => Some(err),
        }
    }
}

impl StdError for NetworkError {}
impl StdError for TelnetError {}
impl StdError for ProtocolError {}
impl StdError for InputError {}
impl StdError for ConfigError {}

impl From<NetworkError> for TN3270Error {
    fn from(err: NetworkError) -> Self {
        TN3270Error::Network(err)
    }
}

impl From<TelnetError> for TN3270Error {
    fn from(err: TelnetError) -> Self {
        TN3270Error::Telnet(err)
    }
}

impl From<ProtocolError> for TN3270Error {
    fn from(err: ProtocolError) -> Self {
        TN3270Error::Protocol(err)
    }
}

impl From<InputError> for TN3270Error {
    fn from(err: InputError) -> Self {
        TN3270Error::Input(err)
    }
}

impl From<ConfigError> for TN3270Error {
    fn from(err: ConfigError) -> Self {
        TN3270Error::Config(err)
    }
}

impl From<io::Error> for TN3270Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => TN3270Error::Network(NetworkError::ConnectionRefused {
                host: "unknown".to_string(),
                port: 0,
            }),
            io::ErrorKind::UnexpectedEof => TN3270Error::Network(NetworkError::PeerDisconnect),
            io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset => {
                TN3270Error::Network(NetworkError::ConnectionLost {
                    reason: err.to_string(),
                })
            },
            _ => TN3270Error::Network(NetworkError::ConnectionLost {
                reason: format!("IO Error: {err}"),
            }),
        }
    }
}

/// Result type alias for tn3270r operations
pub type TN3270Result<T> = Result<T, TN3270Error>;

pub type NetworkResult<T> = Result<T, NetworkError>;
pub type TelnetResult<T> = Result<T, TelnetError>;
pub type ProtocolResult<T> = Result<T, ProtocolError>;
pub type InputResult<T> = Result<T, InputError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TN3270Error::Protocol(ProtocolError::UnknownCommand { code: 0xAB });
        assert_eq!(err.to_string(), "Protocol error: Unrecognised 3270 command 0xAB");
    }

    #[test]
    fn test_input_error_equality() {
        assert_eq!(InputError::InsertOverflow, InputError::InsertOverflow);
        assert_ne!(InputError::InsertOverflow, InputError::InputIntoProtected);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let err: TN3270Error = io_err.into();
        assert!(matches!(err, TN3270Error::Network(NetworkError::PeerDisconnect)));
    }
}
