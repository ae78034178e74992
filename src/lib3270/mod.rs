//! IBM 3270 protocol implementation
//!
//! Block-oriented terminal protocol used by IBM mainframe systems, per
//! RFC 1576/2355 and the 3270 Data Stream Programmer's Reference
//! (GA23-0059). The host addresses a cell ring directly with buffer
//! addresses; formatting is carried by field attributes embedded in the ring
//! and by structured fields.
//!
//! # Architecture
//!
//! - [`codes`] - command codes, order codes, AID keys and attribute bytes
//! - [`cell`] - one character position and its attributes
//! - [`display`] - the screen buffer, field walks, editing, inbound
//!   serialisation and buffer addressing
//! - [`protocol`] - outbound data-stream parsing and execution, structured
//!   fields and the Query Reply

pub mod cell;
pub mod codes;
pub mod display;
pub mod protocol;

// Re-exports for easy access
pub use cell::{Cell, CharAttr, Colour};
pub use codes::{AidKey, CommandCode, OrderCode};
pub use display::{Display3270, TerminalModel};
pub use protocol::{DisplayMetrics, ProtocolProcessor3270, RecordOutcome};
