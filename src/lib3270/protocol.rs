//! 3270 outbound data-stream interpretation
//!
//! A record (one Telnet EOR-delimited block, TN3270E header already
//! stripped) is handled in two passes: [`DataStreamParser`] decodes the
//! command, WCC and order stream into tagged values, then
//! [`ProtocolProcessor3270`] executes them against the screen pair. The
//! split keeps the bit-level decoding testable with literal byte inputs,
//! separate from the semantic mutation.

use log::{debug, info, warn};

use super::codes::*;
use super::display::{addressing, Display3270, ScreenPair};
use crate::error::{ProtocolError, ProtocolResult};

/// Write Control Character bit decomposition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Wcc {
    pub reset: bool,
    pub reset_mdt: bool,
    pub restore_keyboard: bool,
    pub alarm: bool,
}

impl From<u8> for Wcc {
    fn from(wcc: u8) -> Self {
        Self {
            reset: (wcc >> 6) & 1 != 0,
            reset_mdt: wcc & 1 != 0,
            restore_keyboard: (wcc >> 1) & 1 != 0,
            alarm: (wcc >> 2) & 1 != 0,
        }
    }
}

/// One decoded order (or data byte) from an outbound record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    StartField { attr: u8 },
    StartFieldExtended { pairs: Vec<(u8, u8)> },
    SetBufferAddress { address: usize },
    SetAttribute { attr_type: u8, value: u8 },
    InsertCursor,
    ProgramTab,
    RepeatToAddress { address: usize, ch: u8, graphic: bool },
    EraseUnprotectedToAddress { address: usize },
    GraphicEscape { ch: u8 },
    ModifyField { pairs: Vec<(u8, u8)> },
    Data { ch: u8 },
}

/// Physical display characteristics supplied by the rendering collaborator
///
/// Only the Usable Area query reply needs these; a headless session reports
/// zeros with the conventional 9x12 character cell.
#[derive(Debug, Clone, Copy)]
pub struct DisplayMetrics {
    pub width_mm: u16,
    pub height_mm: u16,
    pub width_px: u16,
    pub height_px: u16,
    pub cell_width: u16,
    pub cell_height: u16,
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        Self {
            width_mm: 0,
            height_mm: 0,
            width_px: 0,
            height_px: 0,
            cell_width: 9,
            cell_height: 12,
        }
    }
}

/// What executing one record produced
#[derive(Debug, Default)]
pub struct RecordOutcome {
    /// Inbound frames to transmit, in order
    pub replies: Vec<Vec<u8>>,
    /// WCC restore bit (or EAU): unlock the keyboard
    pub keyboard_restore: bool,
    /// WCC alarm bit
    pub alarm: bool,
    /// Error that truncated order processing; prior mutations stand
    pub error: Option<ProtocolError>,
}

/// 3270 protocol processor
///
/// Executes parsed records against the session's screen pair. The outbound
/// stream's buffer position is the screen cursor: glyph placement advances
/// it ring-wise, and an Insert Cursor order overrides where it rests when
/// the record completes.
#[derive(Debug)]
pub struct ProtocolProcessor3270 {
    metrics: DisplayMetrics,
}

impl ProtocolProcessor3270 {
    pub fn new() -> Self {
        Self {
            metrics: DisplayMetrics::default(),
        }
    }

    pub fn with_metrics(metrics: DisplayMetrics) -> Self {
        Self { metrics }
    }

    pub fn set_metrics(&mut self, metrics: DisplayMetrics) {
        self.metrics = metrics;
    }

    /// Process one complete outbound record
    ///
    /// An unrecognised command discards the whole record. Order-level errors
    /// stop the record but keep the mutations made before the error, which
    /// is reported in the outcome.
    pub fn process_record(
        &mut self,
        data: &[u8],
        screens: &mut ScreenPair,
    ) -> ProtocolResult<RecordOutcome> {
        if data.is_empty() {
            return Err(ProtocolError::TruncatedRecord { expected: 1, remaining: 0 });
        }

        let command = CommandCode::from_u8(data[0]).ok_or(ProtocolError::UnknownCommand {
            code: data[0],
        })?;

        debug!("outbound record: {command:?}, {} bytes", data.len());

        // A new write command supersedes any sticky character attributes
        screens.active_mut().reset_char_attr();

        match command {
            CommandCode::Write => self.execute_write(&data[1..], screens, false, None),
            CommandCode::EraseWrite => self.execute_write(&data[1..], screens, true, Some(false)),
            CommandCode::EraseWriteAlternate => {
                self.execute_write(&data[1..], screens, true, Some(true))
            }
            CommandCode::ReadBuffer => {
                let mut reply = Vec::new();
                screens.active().read_buffer(&mut reply);
                Ok(RecordOutcome {
                    replies: vec![reply],
                    ..Default::default()
                })
            }
            CommandCode::ReadModified => {
                let display = screens.active_mut();
                let aid = AidKey::from_u8(display.last_aid()).unwrap_or(AidKey::NoAid);
                let reply = display.process_aid(aid, aid.is_short_read());
                Ok(RecordOutcome {
                    replies: vec![reply],
                    ..Default::default()
                })
            }
            CommandCode::EraseAllUnprotected => {
                screens.active_mut().erase_all_unprotected();
                Ok(RecordOutcome {
                    keyboard_restore: true,
                    ..Default::default()
                })
            }
            CommandCode::WriteStructuredField => self.execute_wsf(&data[1..], screens),
        }
    }

    /// Write / Erase Write / Erase Write Alternate
    fn execute_write(
        &mut self,
        data: &[u8],
        screens: &mut ScreenPair,
        erase: bool,
        select_alternate: Option<bool>,
    ) -> ProtocolResult<RecordOutcome> {
        if let Some(alternate) = select_alternate {
            screens.select(alternate);
        }

        let buffer_size = screens.active().buffer_size();
        let mut parser = DataStreamParser::new(data, buffer_size);

        let wcc = Wcc::from(parser.next_byte().ok_or(ProtocolError::TruncatedRecord {
            expected: 1,
            remaining: 0,
        })?);

        if erase {
            screens.active_mut().clear();
        }

        let display = screens.active_mut();

        if wcc.reset_mdt {
            display.reset_mdts();
        }

        let orders = parser.parse_orders();

        let mut outcome = RecordOutcome {
            keyboard_restore: wcc.restore_keyboard,
            alarm: wcc.alarm,
            error: orders.error,
            ..Default::default()
        };

        self.execute_orders(&orders.orders, display, &mut outcome);

        Ok(outcome)
    }

    /// Apply a decoded order stream to a display
    ///
    /// The cursor rests where the stream left it unless an Insert Cursor
    /// order marked a position.
    fn execute_orders(
        &mut self,
        orders: &[Order],
        display: &mut Display3270,
        outcome: &mut RecordOutcome,
    ) {
        let n = display.buffer_size();
        let mut pos = display.cursor_pos();
        let mut insert_cursor: Option<usize> = None;

        // Set right after the write command or an SBA; Program Tab in this
        // state stops at the end of the screen instead of wrapping
        let mut just_addressed = true;

        for order in orders {
            let was_just_addressed = just_addressed;
            just_addressed = false;

            match order {
                Order::StartField { attr } => {
                    display.set_field(pos, *attr, false);
                    pos = (pos + 1) % n;
                }
                Order::StartFieldExtended { pairs } => {
                    self.execute_sfe(pairs, pos, display);
                    pos = (pos + 1) % n;
                }
                Order::SetBufferAddress { address } => {
                    pos = self.clamp_address(*address, n, outcome);
                    just_addressed = true;
                }
                Order::SetAttribute { attr_type, value } => {
                    display.set_char_attr(*attr_type, *value);
                }
                Order::InsertCursor => {
                    insert_cursor = Some(pos);
                }
                Order::ProgramTab => {
                    pos = self.program_tab_target(display, pos, was_just_addressed);
                }
                Order::RepeatToAddress { address, ch, graphic } => {
                    let end = self.clamp_address(*address, n, outcome);
                    self.execute_repeat(display, pos, end, *ch, *graphic);
                    pos = end;
                }
                Order::EraseUnprotectedToAddress { address } => {
                    let end = self.clamp_address(*address, n, outcome);
                    display.erase_unprotected(pos, end);
                    outcome.keyboard_restore = true;
                }
                Order::GraphicEscape { ch } => {
                    display.set_graphic_escape();
                    display.set_char(pos, *ch, false);
                    pos = (pos + 1) % n;
                }
                Order::ModifyField { pairs } => {
                    if self.execute_modify_field(pairs, pos, display) {
                        pos = (pos + 1) % n;
                    }
                }
                Order::Data { ch } => {
                    display.set_char(pos, *ch, false);
                    pos = (pos + 1) % n;
                }
            }
        }

        display.set_cursor(insert_cursor.unwrap_or(pos));
    }

    /// Start Field Extended: reset the cell's extended state, start the
    /// field from the 3270 attribute pair, then apply the remaining pairs
    fn execute_sfe(&mut self, pairs: &[(u8, u8)], pos: usize, display: &mut Display3270) {
        display.reset_extended(pos);

        let base_attr = pairs
            .iter()
            .find(|(ty, _)| *ty == XA_3270)
            .map(|(_, value)| *value)
            .unwrap_or(0);
        display.set_field(pos, base_attr, true);

        for (ty, value) in pairs {
            match *ty {
                XA_3270 => {}
                XA_FG_COLOUR | XA_BG_COLOUR => display.set_extended_colour(pos, *value),
                XA_HIGHLIGHT => match *value {
                    HILITE_DEFAULT | HILITE_NORMAL => display.reset_extended_hilite(pos),
                    HILITE_BLINK => display.set_extended_blink(pos),
                    HILITE_REVERSE => display.set_extended_reverse(pos),
                    HILITE_USCORE => display.set_extended_uscore(pos),
                    _ => warn!("SFE highlight value 0x{value:02X} ignored"),
                },
                _ => debug!("SFE pair 0x{ty:02X}/0x{value:02X} ignored"),
            }
        }

        // Pairs applied after the field started must reach the field's cells
        display.cascade_attrs(pos);
    }

    /// Modify Field: adjust the field attribute at the current position
    ///
    /// The stream position must sit on a field attribute; otherwise the
    /// order is ignored. Returns whether the position should advance past
    /// the attribute.
    fn execute_modify_field(&mut self, pairs: &[(u8, u8)], pos: usize, display: &mut Display3270) -> bool {
        if !display.cell(pos).is_field_start() {
            warn!("MF at {pos} which is not a field attribute; ignored");
            return false;
        }

        for (ty, value) in pairs {
            match *ty {
                XA_3270 => display.set_field(pos, *value, true),
                XA_FG_COLOUR | XA_BG_COLOUR => display.set_extended_colour(pos, *value),
                XA_HIGHLIGHT => match *value {
                    HILITE_DEFAULT | HILITE_NORMAL => display.reset_extended_hilite(pos),
                    HILITE_BLINK => display.set_extended_blink(pos),
                    HILITE_REVERSE => display.set_extended_reverse(pos),
                    HILITE_USCORE => display.set_extended_uscore(pos),
                    _ => warn!("MF highlight value 0x{value:02X} ignored"),
                },
                _ => debug!("MF pair 0x{ty:02X}/0x{value:02X} ignored"),
            }
        }

        display.cascade_attrs(pos);
        true
    }

    /// Program Tab target position
    ///
    /// Immediately after a write command or SBA the tab stops at the end of
    /// the screen (position 0) instead of wrapping.
    fn program_tab_target(&self, display: &Display3270, from: usize, just_addressed: bool) -> usize {
        let n = display.buffer_size();

        if just_addressed {
            for pos in from..n {
                let nxt = (pos + 1) % n;
                if display.cell(pos).is_field_start()
                    && !display.cell(pos).is_protected()
                    && !display.cell(nxt).is_field_start()
                {
                    return nxt;
                }
            }
            0
        } else if let Some(nf) = display.find_next_unprotected_field(from) {
            (nf + 1) % n
        } else {
            from
        }
    }

    /// Repeat to Address: fill from `start` up to (not including) the
    /// target, wrap-aware
    fn execute_repeat(&mut self, display: &mut Display3270, start: usize, end: usize, ch: u8, graphic: bool) {
        let n = display.buffer_size();
        let end_unwrapped = if end < start { end + n } else { end };

        for i in start..end_unwrapped {
            if graphic {
                display.set_graphic_escape();
            }
            display.set_char(i % n, ch, false);
        }
    }

    /// Write Structured Field: a sequence of (length, id, payload) fields
    fn execute_wsf(
        &mut self,
        data: &[u8],
        screens: &mut ScreenPair,
    ) -> ProtocolResult<RecordOutcome> {
        let mut outcome = RecordOutcome::default();
        let mut pos = 0;

        while pos < data.len() {
            if pos + 3 > data.len() {
                outcome.error = Some(ProtocolError::TruncatedRecord {
                    expected: 3,
                    remaining: data.len() - pos,
                });
                break;
            }

            let length = ((data[pos] as usize) << 8) | data[pos + 1] as usize;
            let id = data[pos + 2];

            if length < 3 || pos + length > data.len() {
                outcome.error = Some(ProtocolError::TruncatedRecord {
                    expected: length,
                    remaining: data.len() - pos,
                });
                break;
            }

            let payload = &data[pos + 3..pos + length];
            pos += length;

            match id {
                WSF_RESET_PARTITION => {
                    info!("Reset Partition (not implemented)");
                }
                WSF_READ_PARTITION => {
                    if payload.len() >= 2 {
                        let partition = payload[0];
                        let query_type = payload[1];
                        debug!("Read Partition {partition}, type 0x{query_type:02X}");
                        outcome.replies.push(self.build_query_reply(screens));
                    }
                }
                WSF_OUTBOUND_3270DS => {
                    self.execute_outbound_3270ds(payload, screens, &mut outcome);
                }
                other => {
                    // Length framing lets us step over fields we don't know
                    warn!("{}", ProtocolError::UnknownStructuredField { id: other });
                }
            }
        }

        Ok(outcome)
    }

    /// Outbound 3270DS: a partition byte followed by an embedded write
    /// command whose orders run through the normal executor
    fn execute_outbound_3270ds(
        &mut self,
        payload: &[u8],
        screens: &mut ScreenPair,
        outcome: &mut RecordOutcome,
    ) {
        if payload.len() < 2 {
            outcome.error = Some(ProtocolError::TruncatedRecord {
                expected: 2,
                remaining: payload.len(),
            });
            return;
        }

        let partition = payload[0];
        debug!("Outbound 3270DS for partition {partition}");

        match CommandCode::from_u8(payload[1]) {
            Some(CommandCode::Write) => match self.execute_write(&payload[2..], screens, false, None) {
                Ok(inner) => {
                    outcome.replies.extend(inner.replies);
                    outcome.keyboard_restore |= inner.keyboard_restore;
                    outcome.alarm |= inner.alarm;
                    if outcome.error.is_none() {
                        outcome.error = inner.error;
                    }
                }
                Err(e) => outcome.error = Some(e),
            },
            other => {
                warn!("Outbound 3270DS with unsupported command {other:?}");
                outcome.error = Some(ProtocolError::UnknownCommand { code: payload[1] });
            }
        }
    }

    // ------------------------------------------------------------------
    // Query Reply
    // ------------------------------------------------------------------

    /// Build the Query Reply bundle for Read Partition (Query)
    ///
    /// AID 0x88, the cursor address, then one structured-field record per
    /// capability. Geometry comes from the alternate screen; physical sizes
    /// from the display metrics.
    pub fn build_query_reply(&self, screens: &ScreenPair) -> Vec<u8> {
        let alternate = screens.alternate();
        let alt_cols = alternate.cols() as u16;
        let alt_rows = alternate.rows() as u16;
        let alt_size = alternate.buffer_size() as u16;

        let mut reply = vec![AID_SF];
        screens.active().push_address(&mut reply, 0);

        // Summary: the reply ids this bundle carries
        push_record(&mut reply, &[
            SF_QUERY_REPLY, QR_SUMMARY,
            QR_SUMMARY, QR_USABLE_AREA, QR_ALPHANUMERIC_PARTS, QR_CHARSETS,
            QR_COLOUR, QR_HIGHLIGHT, QR_REPLY_MODES, QR_DDM, QR_RPQ_NAMES,
            QR_IMPLICIT_PARTS,
        ]);

        // Usable Area
        let m = &self.metrics;
        push_record(&mut reply, &[
            SF_QUERY_REPLY, QR_USABLE_AREA,
            0x01,                                   // 12/14-bit addressing allowed
            0x00,                                   // cell units, fixed cells
            (alt_cols >> 8) as u8, alt_cols as u8,  // usable width
            (alt_rows >> 8) as u8, alt_rows as u8,  // usable height
            0x01,                                   // size units in mm
            (m.width_mm >> 8) as u8, m.width_mm as u8,     // Xr numerator
            (m.width_px >> 8) as u8, m.width_px as u8,     // Xr denominator
            (m.height_mm >> 8) as u8, m.height_mm as u8,   // Yr numerator
            (m.height_px >> 8) as u8, m.height_px as u8,   // Yr denominator
            (m.cell_width >> 8) as u8, m.cell_width as u8, // X units per cell
            (m.cell_height >> 8) as u8, m.cell_height as u8, // Y units per cell
            (alt_size >> 8) as u8, alt_size as u8,  // buffer size
        ]);

        // Alphanumeric Partitions: a single partition covering the screen
        push_record(&mut reply, &[
            SF_QUERY_REPLY, QR_ALPHANUMERIC_PARTS,
            0x00,
            (alt_size >> 8) as u8, alt_size as u8,
            0x00,
        ]);

        // Character Sets: graphic escape supported, default cell geometry,
        // char set 7 (local id 0x10) and the GE set 2 (CGCSID 0x02B9...)
        push_record(&mut reply, &[
            SF_QUERY_REPLY, QR_CHARSETS,
            0x82,                          // GE supported
            0x00,
            m.cell_width as u8, m.cell_height as u8,
            0x00, 0x00, 0x00, 0x00,        // no LOAD PS
            0x07, 0x00, 0x10, 0x00,
            0x02, 0xB9, 0x00, 0x25, 0x01, 0x10, 0xF1, 0x03, 0xC3, 0x01, 0x36,
        ]);

        // Colour: eight colours plus the default mapping
        push_record(&mut reply, &[
            SF_QUERY_REPLY, QR_COLOUR,
            0x00,
            0x08,
            0x00, 0xF4,
            0xF1, 0xF1,
            0xF2, 0xF2,
            0xF3, 0xF3,
            0xF4, 0xF4,
            0xF5, 0xF5,
            0xF6, 0xF6,
            0xF7, 0xF7,
        ]);

        // Highlight: default, blink, reverse, underscore
        push_record(&mut reply, &[
            SF_QUERY_REPLY, QR_HIGHLIGHT,
            0x04,
            0x00, 0xF0,
            0xF1, 0xF1,
            0xF2, 0xF2,
            0xF4, 0xF4,
        ]);

        // Reply Modes: field, extended field, character
        push_record(&mut reply, &[
            SF_QUERY_REPLY, QR_REPLY_MODES,
            0x00, 0x01, 0x02,
        ]);

        // DDM: 4k limits, one subset
        push_record(&mut reply, &[
            SF_QUERY_REPLY, QR_DDM,
            0x00, 0x00,
            0x10, 0x00,
            0x10, 0x00,
            0x01, 0x01,
        ]);

        // RPQ Names: device id and model zero, name "t3270"
        push_record(&mut reply, &[
            SF_QUERY_REPLY, QR_RPQ_NAMES,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x06,
            0xA3, 0xF3, 0xF2, 0xF7, 0xF0,
        ]);

        // Implicit Partitions: default 24x80 and the alternate geometry
        push_record(&mut reply, &[
            SF_QUERY_REPLY, QR_IMPLICIT_PARTS,
            0x00, 0x00,
            0x0B,
            0x01,
            0x00,
            0x00, 0x50,
            0x00, 0x18,
            (alt_cols >> 8) as u8, alt_cols as u8,
            (alt_rows >> 8) as u8, alt_rows as u8,
        ]);

        reply
    }

    // ------------------------------------------------------------------

    fn clamp_address(&self, address: usize, buffer_size: usize, outcome: &mut RecordOutcome) -> usize {
        if address >= buffer_size {
            warn!("address {address} beyond screen ({buffer_size} cells), clamped");
            if outcome.error.is_none() {
                outcome.error = Some(ProtocolError::AddressOutOfRange {
                    address,
                    buffer_size,
                });
            }
            buffer_size - 1
        } else {
            address
        }
    }
}

impl Default for ProtocolProcessor3270 {
    fn default() -> Self {
        Self::new()
    }
}

/// Append a structured-field record: 2-byte length (inclusive) then payload
fn push_record(buffer: &mut Vec<u8>, payload: &[u8]) {
    let length = payload.len() + 2;
    buffer.push((length >> 8) as u8);
    buffer.push(length as u8);
    buffer.extend_from_slice(payload);
}

/// Decoded order stream with the error (if any) that ended it
pub struct ParsedOrders {
    pub orders: Vec<Order>,
    pub error: Option<ProtocolError>,
}

/// Data stream parser for the order stream following a WCC
pub struct DataStreamParser<'a> {
    data: &'a [u8],
    pos: usize,
    buffer_size: usize,
}

impl<'a> DataStreamParser<'a> {
    pub fn new(data: &'a [u8], buffer_size: usize) -> Self {
        Self {
            data,
            pos: 0,
            buffer_size,
        }
    }

    pub fn next_byte(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    /// Decode orders and data bytes until the end of the record
    ///
    /// Stops at the first malformed or unrecognised order, reporting it
    /// alongside the orders decoded so far.
    pub fn parse_orders(&mut self) -> ParsedOrders {
        let mut orders = Vec::new();

        while self.pos < self.data.len() {
            let offset = self.pos;
            let byte = self.data[self.pos];
            self.pos += 1;

            let order = match OrderCode::from_u8(byte) {
                Some(OrderCode::StartField) => match self.next_byte() {
                    Some(attr) => Ok(Order::StartField { attr }),
                    None => Err(ProtocolError::TruncatedRecord { expected: 1, remaining: 0 }),
                },
                Some(OrderCode::StartFieldExtended) => {
                    self.parse_pairs().map(|pairs| Order::StartFieldExtended { pairs })
                }
                Some(OrderCode::SetBufferAddress) => {
                    self.parse_address().map(|address| Order::SetBufferAddress { address })
                }
                Some(OrderCode::SetAttribute) => match (self.next_byte(), self.next_byte()) {
                    (Some(attr_type), Some(value)) => Ok(Order::SetAttribute { attr_type, value }),
                    _ => Err(ProtocolError::TruncatedRecord { expected: 2, remaining: 0 }),
                },
                Some(OrderCode::InsertCursor) => Ok(Order::InsertCursor),
                Some(OrderCode::ProgramTab) => Ok(Order::ProgramTab),
                Some(OrderCode::RepeatToAddress) => self.parse_repeat(),
                Some(OrderCode::EraseUnprotectedToAddress) => self
                    .parse_address()
                    .map(|address| Order::EraseUnprotectedToAddress { address }),
                Some(OrderCode::GraphicEscape) => match self.next_byte() {
                    Some(ch) => Ok(Order::GraphicEscape { ch }),
                    None => Err(ProtocolError::TruncatedRecord { expected: 1, remaining: 0 }),
                },
                Some(OrderCode::ModifyField) => {
                    self.parse_pairs().map(|pairs| Order::ModifyField { pairs })
                }
                None => {
                    // Bytes below the EBCDIC space that are not orders and
                    // not nulls are invalid in the data stream
                    if byte != CHAR_NULL && byte < CHAR_SPACE {
                        Err(ProtocolError::UnknownOrder { code: byte, offset })
                    } else {
                        Ok(Order::Data { ch: byte })
                    }
                }
            };

            match order {
                Ok(order) => orders.push(order),
                Err(error) => {
                    return ParsedOrders {
                        orders,
                        error: Some(error),
                    }
                }
            }
        }

        ParsedOrders {
            orders,
            error: None,
        }
    }

    /// Two-byte buffer address in whichever width the screen uses
    fn parse_address(&mut self) -> ProtocolResult<usize> {
        match (self.next_byte(), self.next_byte()) {
            (Some(b1), Some(b2)) => Ok(addressing::decode_address(b1, b2, self.buffer_size)),
            _ => Err(ProtocolError::TruncatedRecord {
                expected: 2,
                remaining: self.data.len() - self.pos,
            }),
        }
    }

    /// Count byte followed by count x (type, value)
    fn parse_pairs(&mut self) -> ProtocolResult<Vec<(u8, u8)>> {
        let count = self.next_byte().ok_or(ProtocolError::TruncatedRecord {
            expected: 1,
            remaining: 0,
        })? as usize;

        if self.pos + count * 2 > self.data.len() {
            return Err(ProtocolError::TruncatedRecord {
                expected: count * 2,
                remaining: self.data.len() - self.pos,
            });
        }

        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let ty = self.data[self.pos];
            let value = self.data[self.pos + 1];
            self.pos += 2;
            pairs.push((ty, value));
        }
        Ok(pairs)
    }

    /// RA operand: target address then the repeat character, which may be
    /// GE-prefixed
    fn parse_repeat(&mut self) -> ProtocolResult<Order> {
        let address = self.parse_address()?;
        let ch = self.next_byte().ok_or(ProtocolError::TruncatedRecord {
            expected: 1,
            remaining: 0,
        })?;

        if ch == ORDER_GE {
            let ch = self.next_byte().ok_or(ProtocolError::TruncatedRecord {
                expected: 1,
                remaining: 0,
            })?;
            Ok(Order::RepeatToAddress { address, ch, graphic: true })
        } else {
            Ok(Order::RepeatToAddress { address, ch, graphic: false })
        }
    }
}
