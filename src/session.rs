//! Session controller
//!
//! A session owns one primary/alternate screen pair, the Telnet framer, the
//! protocol processor and the keyboard, and wires them together: network
//! bytes flow through the framer into the processor, which mutates the
//! active screen and may queue inbound replies; keyboard functions mutate
//! the screen or submit an AID, and the resulting frames go back out through
//! the framer.
//!
//! Everything runs to completion per event on one logical thread. The screen
//! pair is owned here and borrowed exclusively by whichever producer is
//! currently running.

use log::{debug, warn};

use crate::error::{InputResult, NetworkResult, TN3270Result};
use crate::codepage::CodePage;
use crate::keyboard::{AppFunction, Keyboard, KeyOutcome, KeyboardLock};
use crate::lib3270::display::{Display3270, ScreenPair};
use crate::lib3270::protocol::{DisplayMetrics, ProtocolProcessor3270};
use crate::network::{ConnectOptions, Connection, Encryption, NetworkEvent};
use crate::session_profile::SessionProfile;
use crate::telnet_negotiation::{TelnetFramer, IAC, IP};

/// Status surface for the rendering collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicators {
    pub lock: KeyboardLock,
    pub insert_mode: bool,
    /// Cursor as (column, row)
    pub cursor: (usize, usize),
    pub encryption: Encryption,
    pub connected: bool,
}

/// Connection lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    NotConnected { reason: Option<String> },
    Connected,
}

/// One terminal session
pub struct Session {
    id: String,
    profile: SessionProfile,

    screens: ScreenPair,
    framer: TelnetFramer,
    processor: ProtocolProcessor3270,
    keyboard: Keyboard,

    connection: Option<Connection>,
    status: SessionStatus,

    /// The host requested the alarm; cleared when the collaborator reads it
    alarm_pending: bool,
}

impl Session {
    pub fn new(profile: SessionProfile) -> Self {
        let mut screens = ScreenPair::new(profile.model);
        let mut codepage = CodePage::default();
        if !codepage.set_code_page(&profile.codepage) {
            warn!("unknown code page '{}', using {}", profile.codepage, codepage.name());
        }
        screens.set_codepage(codepage);

        let framer = TelnetFramer::new(profile.model, profile.lu_name.clone());

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            profile,
            screens,
            framer,
            processor: ProtocolProcessor3270::new(),
            keyboard: Keyboard::new(),
            connection: None,
            status: SessionStatus::NotConnected { reason: None },
            alarm_pending: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn profile(&self) -> &SessionProfile {
        &self.profile
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn screen(&self) -> &Display3270 {
        self.screens.active()
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    /// Physical display characteristics for the Query Reply
    pub fn set_display_metrics(&mut self, metrics: DisplayMetrics) {
        self.processor.set_metrics(metrics);
    }

    /// Activate a keyboard theme's bindings
    pub fn set_keyboard_theme(&mut self, theme: &crate::theme::KeyboardTheme) {
        self.keyboard.set_bindings(theme.bindings.clone());
    }

    pub fn indicators(&self) -> Indicators {
        Indicators {
            lock: self.keyboard.lock_state(),
            insert_mode: self.keyboard.insert_mode(),
            cursor: self.screens.active().cursor_xy(),
            encryption: self
                .connection
                .as_ref()
                .map(Connection::encryption)
                .unwrap_or_default(),
            connected: matches!(self.status, SessionStatus::Connected),
        }
    }

    /// Whether the host rang the alarm since the last check
    pub fn take_alarm(&mut self) -> bool {
        std::mem::take(&mut self.alarm_pending)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the connection described by the profile
    pub fn connect(&mut self) -> NetworkResult<()> {
        let options = ConnectOptions {
            host: self.profile.host.clone(),
            port: self.profile.port,
            secure: self.profile.secure,
            verify_certificates: self.profile.verify_certificates,
            ..Default::default()
        };

        match Connection::open(&options) {
            Ok(conn) => {
                self.connection = Some(conn);
                self.status = SessionStatus::Connected;
                self.keyboard.reset_state();
                Ok(())
            }
            Err(e) => {
                self.status = SessionStatus::NotConnected {
                    reason: Some(e.to_string()),
                };
                Err(e)
            }
        }
    }

    /// Close the session
    ///
    /// Any partially assembled record is abandoned, negotiation state is
    /// dropped, and the screen is preserved for the user to read until they
    /// dismiss or reconnect.
    pub fn disconnect(&mut self, reason: Option<String>) {
        if let Some(conn) = self.connection.take() {
            conn.close();
        }
        self.framer.reset();
        self.keyboard.reset_state();
        self.status = SessionStatus::NotConnected { reason };
    }

    /// Drain pending network events; call when the socket signals readiness
    /// or on the UI tick
    pub fn poll(&mut self) {
        // Collect first: processing borrows self mutably
        let mut chunks = Vec::new();
        let mut closed: Option<Option<String>> = None;

        if let Some(conn) = &self.connection {
            while let Ok(event) = conn.events().try_recv() {
                match event {
                    NetworkEvent::Data(data) => chunks.push(data),
                    NetworkEvent::Closed(reason) => {
                        closed = Some(reason);
                        break;
                    }
                }
            }
        }

        for chunk in chunks {
            self.handle_bytes(&chunk);
        }

        if let Some(reason) = closed {
            let reason = reason.unwrap_or_else(|| "Host closed the connection".to_string());
            self.disconnect(Some(reason));
        }
    }

    // ------------------------------------------------------------------
    // Host to user
    // ------------------------------------------------------------------

    /// Feed raw socket bytes through the framer and interpreter
    ///
    /// Exposed for tests and for drivers that own their own socket; `poll`
    /// calls this for connected sessions.
    pub fn handle_bytes(&mut self, data: &[u8]) {
        let events = self.framer.feed(data);

        if !events.response.is_empty() {
            self.transmit_raw(&events.response);
        }

        for record in events.records {
            self.handle_record(&record);
        }
    }

    fn handle_record(&mut self, record: &[u8]) {
        match self.processor.process_record(record, &mut self.screens) {
            Ok(outcome) => {
                if let Some(error) = outcome.error {
                    warn!("record error, prior mutations kept: {error}");
                }
                if outcome.alarm {
                    self.alarm_pending = true;
                }
                if outcome.keyboard_restore {
                    self.keyboard.unlock_from_host();
                }
                for reply in outcome.replies {
                    let frame = self.framer.encode_outbound(&reply);
                    self.transmit_raw(&frame);
                }
            }
            Err(e) => {
                // Whole record discarded; resynchronise on the next EOR
                warn!("record discarded: {e}");
            }
        }
    }

    // ------------------------------------------------------------------
    // User to host
    // ------------------------------------------------------------------

    /// Type a printable character at the cursor
    pub fn type_char(&mut self, ch: char) -> InputResult<()> {
        self.keyboard.type_char(ch, self.screens.active_mut())
    }

    /// Invoke a user-facing function by enum
    ///
    /// Functions owned by the rendering collaborator (Copy, Info, ...) are
    /// handed back for it to act on.
    pub fn press(&mut self, function: AppFunction) -> Option<AppFunction> {
        match self.keyboard.press(function, self.screens.active_mut()) {
            KeyOutcome::Handled => None,
            KeyOutcome::Inbound(payload) => {
                let frame = self.framer.encode_outbound(&payload);
                self.transmit_raw(&frame);
                None
            }
            KeyOutcome::Attention => {
                debug!("ATTN");
                self.transmit_raw(&[IAC, IP]);
                None
            }
            KeyOutcome::Local(f) => Some(f),
        }
    }

    /// Invoke a function by its key-sequence binding
    pub fn press_sequence(&mut self, sequence: &str) -> Option<AppFunction> {
        let function = self.keyboard.function_for(sequence)?;
        self.press(function)
    }

    // ------------------------------------------------------------------
    // Ticks
    // ------------------------------------------------------------------

    /// Character-blink timer fired
    pub fn blink_tick(&mut self) {
        self.screens.active_mut().blink_tick();
    }

    /// Cursor-blink timer fired
    pub fn cursor_blink_tick(&mut self) {
        self.screens.active_mut().cursor_blink_tick();
    }

    // ------------------------------------------------------------------

    fn transmit_raw(&mut self, data: &[u8]) {
        if let Some(conn) = &self.connection {
            if let Err(e) = conn.send(data) {
                warn!("transmit failed: {e}");
                self.disconnect(Some(e.to_string()));
            }
        } else {
            debug!("not connected; {} bytes dropped", data.len());
        }
    }

    /// Load a different code page into both screens
    pub fn set_code_page(&mut self, name: &str) -> TN3270Result<()> {
        let mut codepage = CodePage::default();
        if !codepage.set_code_page(name) {
            return Err(crate::error::ConfigError::InvalidProfile {
                name: self.profile.name.clone(),
                reason: format!("unknown code page '{name}'"),
            }
            .into());
        }
        self.profile.codepage = name.to_string();
        self.screens.set_codepage(codepage);
        Ok(())
    }
}
