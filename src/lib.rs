//! tn3270r: IBM 3270 terminal emulation core
//!
//! The pieces that turn a mainframe byte stream into a formatted character-
//! cell display and user input back into a conforming inbound data stream:
//! Telnet/TN3270E negotiation and framing, the outbound data-stream
//! interpreter, the cell-ring screen buffer with its field attributes, and
//! the keyboard policy layer. Rendering, dialogs and persistence UIs are
//! external collaborators.

/// EBCDIC code page translation (IBM-037/285/1047 and the GE page)
pub mod codepage;

/// LIB3270: the 3270 protocol core - codes, cells, display buffer and the
/// data-stream interpreter
pub mod lib3270;

/// Telnet option negotiation, TN3270E and record framing
pub mod telnet_negotiation;

/// Keyboard lock discipline, function registry and key routing
pub mod keyboard;

/// Session controller wiring network, interpreter, screens and keyboard
pub mod session;

/// TCP/TLS byte stream with encryption-state reporting
pub mod network;

/// Persisted session definitions
pub mod session_profile;

/// Colour and keyboard themes
pub mod theme;

/// Structured error types
pub mod error;

// Re-export the main session type for easier access across modules
pub use session::Session;
