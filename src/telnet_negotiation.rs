//! Telnet option negotiation and record framing for TN3270/TN3270E
//!
//! A cooperative byte-at-a-time state machine. Data bytes accumulate into a
//! record until `IAC EOR`; negotiation commands and subnegotiations are
//! answered inline. The machine's current state is part of the observable
//! contract (inspectable for tests, logging and reconnect), which is why this
//! is an explicit state enum rather than a coroutine parser.
//!
//! When the host negotiates TN3270E, outbound records arrive with a 5-byte
//! header which is stripped before delivery, and client records are sent
//! with the same header prepended.

use log::{debug, warn};

use crate::lib3270::codes::*;
use crate::lib3270::display::TerminalModel;

/// Telnet command bytes (RFC 854)
pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const SE: u8 = 240;
pub const EOR_MARK: u8 = 239;
pub const NOP: u8 = 241;
pub const IP: u8 = 244;

/// Telnet options this client understands
pub const TELOPT_BINARY: u8 = 0;
pub const TELOPT_TTYPE: u8 = 24;
pub const TELOPT_EOR: u8 = 25;
pub const TELOPT_TN3270E: u8 = 40;

/// TERMINAL-TYPE subnegotiation qualifiers (RFC 1091)
pub const TELQUAL_IS: u8 = 0;
pub const TELQUAL_SEND: u8 = 1;

/// Framer states: what the next byte means
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelnetState {
    /// Plain record data
    Data,
    /// Seen IAC
    Iac,
    /// Seen IAC DO; next byte is the option
    IacDo,
    /// Seen IAC DONT
    IacDont,
    /// Seen IAC WILL
    IacWill,
    /// Seen IAC WONT
    IacWont,
    /// Inside a subnegotiation
    Sb,
    /// Seen IAC inside a subnegotiation
    SbIac,
}

/// What one call to [`TelnetFramer::feed`] produced
#[derive(Debug, Default)]
pub struct FramerEvents {
    /// Complete outbound 3270 records, TN3270E header already stripped
    pub records: Vec<Vec<u8>>,
    /// Negotiation bytes to transmit back to the host
    pub response: Vec<u8>,
}

/// Telnet / TN3270E framing state machine
#[derive(Debug)]
pub struct TelnetFramer {
    state: TelnetState,

    /// Record being assembled up to IAC EOR
    record: Vec<u8>,

    /// Subnegotiation buffer between IAC SB and IAC SE
    subneg: Vec<u8>,

    /// TN3270E negotiated: strip/prepend the 5-byte header
    tn3270e: bool,

    /// Terminal type offered in TTYPE / DEVICE-TYPE negotiation
    terminal_type: &'static str,

    /// LU name appended to the terminal type when configured
    lu_name: Option<String>,

    /// Device name assigned by the host (TN3270E DEVICE-TYPE IS ... CONNECT)
    device_name: Option<String>,

    /// Functions agreed with the host; we request none, so an empty list is
    /// the expected steady state
    functions: Vec<u8>,
}

impl TelnetFramer {
    pub fn new(model: TerminalModel, lu_name: Option<String>) -> Self {
        Self {
            state: TelnetState::Data,
            record: Vec::new(),
            subneg: Vec::new(),
            tn3270e: false,
            terminal_type: model.terminal_type(),
            lu_name,
            device_name: None,
            functions: Vec::new(),
        }
    }

    pub fn state(&self) -> TelnetState {
        self.state
    }

    pub fn is_tn3270e(&self) -> bool {
        self.tn3270e
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    /// Drop any partial record and return to the ground state (reconnect)
    pub fn reset(&mut self) {
        self.state = TelnetState::Data;
        self.record.clear();
        self.subneg.clear();
        self.tn3270e = false;
        self.device_name = None;
        self.functions.clear();
    }

    /// Consume bytes from the host
    ///
    /// Returns the completed records and any negotiation replies that must
    /// be written back to the socket.
    pub fn feed(&mut self, data: &[u8]) -> FramerEvents {
        let mut events = FramerEvents::default();

        for &byte in data {
            self.feed_byte(byte, &mut events);
        }

        events
    }

    fn feed_byte(&mut self, byte: u8, events: &mut FramerEvents) {
        match self.state {
            TelnetState::Data => {
                if byte == IAC {
                    self.state = TelnetState::Iac;
                } else {
                    self.record.push(byte);
                }
            }

            TelnetState::Iac => match byte {
                // Doubled IAC is a literal 0xFF data byte
                IAC => {
                    self.record.push(IAC);
                    self.state = TelnetState::Data;
                }
                DO => self.state = TelnetState::IacDo,
                DONT => self.state = TelnetState::IacDont,
                WILL => self.state = TelnetState::IacWill,
                WONT => self.state = TelnetState::IacWont,
                SB => {
                    self.subneg.clear();
                    self.state = TelnetState::Sb;
                }
                SE => {
                    warn!("IAC SE with no subnegotiation in progress");
                    self.state = TelnetState::Data;
                }
                EOR_MARK => {
                    self.complete_record(events);
                    self.state = TelnetState::Data;
                }
                NOP => self.state = TelnetState::Data,
                other => {
                    debug!("ignoring telnet command 0x{other:02X}");
                    self.state = TelnetState::Data;
                }
            },

            TelnetState::IacDo => {
                match byte {
                    TELOPT_TN3270E => {
                        self.tn3270e = true;
                        debug!("TN3270E on");
                        events.response.extend_from_slice(&[IAC, WILL, byte]);
                    }
                    TELOPT_TTYPE | TELOPT_BINARY | TELOPT_EOR => {
                        events.response.extend_from_slice(&[IAC, WILL, byte]);
                    }
                    other => {
                        debug!("refusing DO option {other}");
                        events.response.extend_from_slice(&[IAC, WONT, byte]);
                    }
                }
                self.state = TelnetState::Data;
            }

            TelnetState::IacDont => {
                if byte == TELOPT_TN3270E {
                    // Host withdrew TN3270E: continue as plain telnet-3270
                    self.tn3270e = false;
                    debug!("TN3270E off");
                }
                self.state = TelnetState::Data;
            }

            TelnetState::IacWill => {
                match byte {
                    TELOPT_BINARY | TELOPT_EOR => {
                        events.response.extend_from_slice(&[IAC, DO, byte]);
                    }
                    other => {
                        debug!("refusing WILL option {other}");
                        events.response.extend_from_slice(&[IAC, DONT, byte]);
                    }
                }
                self.state = TelnetState::Data;
            }

            TelnetState::IacWont => {
                // The host declining an option needs no reply from us
                self.state = TelnetState::Data;
            }

            TelnetState::Sb => {
                if byte == IAC {
                    self.state = TelnetState::SbIac;
                } else {
                    self.subneg.push(byte);
                }
            }

            TelnetState::SbIac => match byte {
                // Escaped 0xFF inside the subnegotiation
                IAC => {
                    self.subneg.push(IAC);
                    self.state = TelnetState::Sb;
                }
                SE => {
                    self.process_subnegotiation(events);
                    self.subneg.clear();
                    self.state = TelnetState::Data;
                }
                other => {
                    warn!("unexpected 0x{other:02X} after IAC in subnegotiation");
                    self.subneg.clear();
                    self.state = TelnetState::Data;
                }
            },
        }
    }

    /// A record ended with IAC EOR; strip the TN3270E header if one applies
    fn complete_record(&mut self, events: &mut FramerEvents) {
        let record = std::mem::take(&mut self.record);

        if !self.tn3270e {
            if !record.is_empty() {
                events.records.push(record);
            }
            return;
        }

        if record.len() < 5 {
            warn!("TN3270E record shorter than its header ({} bytes)", record.len());
            return;
        }

        let data_type = record[0];
        if data_type != TN3270E_DATATYPE_3270_DATA {
            // SCS, responses and the rest are out of scope; drop the record
            debug!("dropping TN3270E record of data type 0x{data_type:02X}");
            return;
        }

        events.records.push(record[5..].to_vec());
    }

    fn process_subnegotiation(&mut self, events: &mut FramerEvents) {
        if self.subneg.is_empty() {
            return;
        }

        match self.subneg[0] {
            TELOPT_TTYPE => {
                if self.subneg.get(1) == Some(&TELQUAL_SEND) {
                    let mut response = vec![IAC, SB, TELOPT_TTYPE, TELQUAL_IS];
                    response.extend_from_slice(self.terminal_type.as_bytes());
                    if let Some(lu) = &self.lu_name {
                        response.push(b'@');
                        response.extend_from_slice(lu.as_bytes());
                    }
                    response.extend_from_slice(&[IAC, SE]);
                    events.response.extend_from_slice(&response);
                } else {
                    debug!("TTYPE subnegotiation without SEND: {:?}", self.subneg);
                }
            }

            TELOPT_TN3270E => self.process_tn3270e(events),

            other => {
                debug!("subnegotiation for unhandled option {other}: {:?}", self.subneg);
            }
        }
    }

    fn process_tn3270e(&mut self, events: &mut FramerEvents) {
        let op = self.subneg.get(1).copied();
        let qual = self.subneg.get(2).copied();

        match (op, qual) {
            // Host asks which device we are: offer our terminal type, then
            // request no extended functions (header-only operation)
            (Some(TN3270E_SEND), Some(TN3270E_DEVICE_TYPE)) => {
                let mut response = vec![IAC, SB, TELOPT_TN3270E, TN3270E_DEVICE_TYPE, TN3270E_REQUEST];
                response.extend_from_slice(self.terminal_type.as_bytes());
                if let Some(lu) = &self.lu_name {
                    response.push(TN3270E_CONNECT);
                    response.extend_from_slice(lu.as_bytes());
                }
                response.extend_from_slice(&[IAC, SE]);

                response.extend_from_slice(&[
                    IAC, SB, TELOPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_REQUEST, IAC, SE,
                ]);

                events.response.extend_from_slice(&response);
            }

            // Host accepted a device type; remember the device name if the
            // CONNECT clause carries one
            (Some(TN3270E_DEVICE_TYPE), Some(TN3270E_IS)) => {
                let rest = &self.subneg[3..];
                if let Some(connect_at) = rest.iter().position(|&b| b == TN3270E_CONNECT) {
                    let name = String::from_utf8_lossy(&rest[connect_at + 1..]).into_owned();
                    debug!("TN3270E device name {name}");
                    self.device_name = Some(name);
                }
            }

            // Host proposes extended functions: agree to the subset we
            // support, which is none
            (Some(TN3270E_FUNCTIONS), Some(TN3270E_REQUEST)) => {
                let supported: Vec<u8> = self.subneg[3..]
                    .iter()
                    .copied()
                    .filter(|f| self.functions.contains(f))
                    .collect();
                let mut response = vec![IAC, SB, TELOPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_IS];
                response.extend_from_slice(&supported);
                response.extend_from_slice(&[IAC, SE]);
                events.response.extend_from_slice(&response);
            }

            (Some(TN3270E_FUNCTIONS), Some(TN3270E_IS)) => {
                self.functions = self.subneg[3..].to_vec();
                debug!("TN3270E functions agreed: {:?}", self.functions);
            }

            _ => {
                debug!("unhandled TN3270E subnegotiation: {:?}", self.subneg);
            }
        }
    }

    /// Wrap an inbound payload for transmission
    ///
    /// Under TN3270E the 5-byte header (3270-DATA, no flags, sequence zero)
    /// is prepended. The record terminator IAC EOR follows the payload. The
    /// payload's own 0xFF doubling is the inbound builder's responsibility.
    pub fn encode_outbound(&self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + 7);
        if self.tn3270e {
            out.extend_from_slice(&[TN3270E_DATATYPE_3270_DATA, 0x00, 0x00, 0x00, 0x00]);
        }
        out.extend_from_slice(payload);
        out.extend_from_slice(&[IAC, EOR_MARK]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framer() -> TelnetFramer {
        TelnetFramer::new(TerminalModel::Model2, None)
    }

    #[test]
    fn test_record_assembly() {
        let mut f = framer();
        let events = f.feed(&[0xF1, 0xC3, 0x11, 0x40, 0x40, IAC, EOR_MARK]);
        assert_eq!(events.records, vec![vec![0xF1, 0xC3, 0x11, 0x40, 0x40]]);
        assert_eq!(f.state(), TelnetState::Data);
    }

    #[test]
    fn test_doubled_iac_is_literal() {
        let mut f = framer();
        let events = f.feed(&[0x01, IAC, IAC, 0x02, IAC, EOR_MARK]);
        assert_eq!(events.records, vec![vec![0x01, 0xFF, 0x02]]);
    }

    #[test]
    fn test_multiple_records_in_one_read() {
        let mut f = framer();
        let events = f.feed(&[0x01, IAC, EOR_MARK, 0x02, IAC, EOR_MARK]);
        assert_eq!(events.records, vec![vec![0x01], vec![0x02]]);
    }

    #[test]
    fn test_record_split_across_reads() {
        let mut f = framer();
        assert!(f.feed(&[0x01, 0x02]).records.is_empty());
        assert!(f.feed(&[IAC]).records.is_empty());
        let events = f.feed(&[EOR_MARK]);
        assert_eq!(events.records, vec![vec![0x01, 0x02]]);
    }

    #[test]
    fn test_do_supported_options() {
        for opt in [TELOPT_BINARY, TELOPT_EOR, TELOPT_TTYPE] {
            let mut f = framer();
            let events = f.feed(&[IAC, DO, opt]);
            assert_eq!(events.response, vec![IAC, WILL, opt]);
        }
    }

    #[test]
    fn test_do_unknown_option_refused() {
        let mut f = framer();
        let events = f.feed(&[IAC, DO, 39]);
        assert_eq!(events.response, vec![IAC, WONT, 39]);
    }

    #[test]
    fn test_will_binary_eor_accepted() {
        let mut f = framer();
        let events = f.feed(&[IAC, WILL, TELOPT_BINARY, IAC, WILL, TELOPT_EOR]);
        assert_eq!(
            events.response,
            vec![IAC, DO, TELOPT_BINARY, IAC, DO, TELOPT_EOR]
        );
    }

    #[test]
    fn test_will_unknown_option_refused() {
        let mut f = framer();
        let events = f.feed(&[IAC, WILL, 1]);
        assert_eq!(events.response, vec![IAC, DONT, 1]);
    }

    #[test]
    fn test_ttype_send() {
        let mut f = framer();
        let events = f.feed(&[IAC, SB, TELOPT_TTYPE, TELQUAL_SEND, IAC, SE]);
        let mut expected = vec![IAC, SB, TELOPT_TTYPE, TELQUAL_IS];
        expected.extend_from_slice(b"IBM-3279-2-E");
        expected.extend_from_slice(&[IAC, SE]);
        assert_eq!(events.response, expected);
    }

    #[test]
    fn test_ttype_send_with_lu_name() {
        let mut f = TelnetFramer::new(TerminalModel::Model2, Some("LU0042".to_string()));
        let events = f.feed(&[IAC, SB, TELOPT_TTYPE, TELQUAL_SEND, IAC, SE]);
        let mut expected = vec![IAC, SB, TELOPT_TTYPE, TELQUAL_IS];
        expected.extend_from_slice(b"IBM-3279-2-E@LU0042");
        expected.extend_from_slice(&[IAC, SE]);
        assert_eq!(events.response, expected);
    }

    #[test]
    fn test_tn3270e_negotiation_sequence() {
        let mut f = framer();

        // Host: IAC DO TN3270E -> we agree and the mode switches on
        let events = f.feed(&[IAC, DO, TELOPT_TN3270E]);
        assert_eq!(events.response, vec![IAC, WILL, TELOPT_TN3270E]);
        assert!(f.is_tn3270e());

        // Host: SEND DEVICE-TYPE -> DEVICE-TYPE REQUEST + FUNCTIONS REQUEST
        let events = f.feed(&[
            IAC, SB, TELOPT_TN3270E, TN3270E_SEND, TN3270E_DEVICE_TYPE, IAC, SE,
        ]);
        let mut expected = vec![IAC, SB, TELOPT_TN3270E, TN3270E_DEVICE_TYPE, TN3270E_REQUEST];
        expected.extend_from_slice(b"IBM-3279-2-E");
        expected.extend_from_slice(&[IAC, SE]);
        expected.extend_from_slice(&[
            IAC, SB, TELOPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_REQUEST, IAC, SE,
        ]);
        assert_eq!(events.response, expected);
    }

    #[test]
    fn test_tn3270e_device_name_remembered() {
        let mut f = framer();
        f.feed(&[IAC, DO, TELOPT_TN3270E]);

        let mut sub = vec![IAC, SB, TELOPT_TN3270E, TN3270E_DEVICE_TYPE, TN3270E_IS];
        sub.extend_from_slice(b"IBM-3279-2-E");
        sub.push(TN3270E_CONNECT);
        sub.extend_from_slice(b"TCP00042");
        sub.extend_from_slice(&[IAC, SE]);
        f.feed(&sub);

        assert_eq!(f.device_name(), Some("TCP00042"));
    }

    #[test]
    fn test_tn3270e_functions_request_answered_empty() {
        let mut f = framer();
        f.feed(&[IAC, DO, TELOPT_TN3270E]);

        // Host proposes BIND-IMAGE and SYSREQ; we support neither
        let events = f.feed(&[
            IAC, SB, TELOPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_REQUEST, 0x00, 0x04, IAC, SE,
        ]);
        assert_eq!(
            events.response,
            vec![IAC, SB, TELOPT_TN3270E, TN3270E_FUNCTIONS, TN3270E_IS, IAC, SE]
        );
    }

    #[test]
    fn test_tn3270e_header_stripped() {
        let mut f = framer();
        f.feed(&[IAC, DO, TELOPT_TN3270E]);

        let events = f.feed(&[0x00, 0x00, 0x00, 0x00, 0x00, 0xF1, 0xC3, IAC, EOR_MARK]);
        assert_eq!(events.records, vec![vec![0xF1, 0xC3]]);
    }

    #[test]
    fn test_tn3270e_non_3270_data_dropped() {
        let mut f = framer();
        f.feed(&[IAC, DO, TELOPT_TN3270E]);

        // NVT-DATA record
        let events = f.feed(&[0x05, 0x00, 0x00, 0x00, 0x00, 0x41, IAC, EOR_MARK]);
        assert!(events.records.is_empty());
    }

    #[test]
    fn test_dont_tn3270e_reverts_to_plain() {
        let mut f = framer();
        f.feed(&[IAC, DO, TELOPT_TN3270E]);
        assert!(f.is_tn3270e());
        f.feed(&[IAC, DONT, TELOPT_TN3270E]);
        assert!(!f.is_tn3270e());

        let events = f.feed(&[0xF1, 0xC3, IAC, EOR_MARK]);
        assert_eq!(events.records, vec![vec![0xF1, 0xC3]]);
    }

    #[test]
    fn test_encode_outbound_plain() {
        let f = framer();
        assert_eq!(f.encode_outbound(&[0x7D, 0x40, 0x40]), vec![0x7D, 0x40, 0x40, IAC, EOR_MARK]);
    }

    #[test]
    fn test_encode_outbound_tn3270e() {
        let mut f = framer();
        f.feed(&[IAC, DO, TELOPT_TN3270E]);
        assert_eq!(
            f.encode_outbound(&[0x7D]),
            vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x7D, IAC, EOR_MARK]
        );
    }

    #[test]
    fn test_subnegotiation_with_escaped_iac() {
        let mut f = framer();
        // An unhandled option's subnegotiation carrying a doubled IAC must
        // not desynchronise the machine
        let events = f.feed(&[IAC, SB, 39, IAC, IAC, 0x01, IAC, SE, 0xC1, IAC, EOR_MARK]);
        assert_eq!(events.records, vec![vec![0xC1]]);
    }

    #[test]
    fn test_reset_clears_partial_record() {
        let mut f = framer();
        f.feed(&[0x01, 0x02]);
        f.reset();
        let events = f.feed(&[0x03, IAC, EOR_MARK]);
        assert_eq!(events.records, vec![vec![0x03]]);
    }
}
