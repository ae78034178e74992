//! TN3270 display buffer management
//!
//! [`Display3270`] is the screen: a ring of [`Cell`]s addressed 0..N-1 where
//! N = rows x cols. Field attributes live in field-start cells scattered
//! through the ring; every other cell carries an index back to its governing
//! field start. All host-side mutation (orders) and keyboard-side editing
//! funnel through here, as does the inbound serialisation for Read Modified
//! and Read Buffer.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::cell::{Cell, CharAttr, Colour};
use super::codes::*;
use crate::codepage::CodePage;
use crate::error::{InputError, InputResult};

/// Terminal models and their screen geometry
///
/// The primary screen is always 24x80; the alternate screen takes the
/// model's geometry. Dynamic carries a user-configured size (capped at the
/// 16k cells reachable with 16-bit addressing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalModel {
    /// 24 rows x 80 columns
    Model2,
    /// 32 rows x 80 columns
    Model3,
    /// 43 rows x 80 columns
    Model4,
    /// 27 rows x 132 columns
    Model5,
    /// User-defined geometry
    Dynamic { rows: u16, cols: u16 },
}

impl TerminalModel {
    pub fn rows(&self) -> usize {
        match self {
            Self::Model2 => 24,
            Self::Model3 => 32,
            Self::Model4 => 43,
            Self::Model5 => 27,
            Self::Dynamic { rows, .. } => *rows as usize,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            Self::Model2 => 80,
            Self::Model3 => 80,
            Self::Model4 => 80,
            Self::Model5 => 132,
            Self::Dynamic { cols, .. } => *cols as usize,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.rows() * self.cols()
    }

    /// Terminal type string offered during TTYPE / TN3270E DEVICE-TYPE
    /// negotiation
    pub fn terminal_type(&self) -> &'static str {
        match self {
            Self::Model2 => "IBM-3279-2-E",
            Self::Model3 => "IBM-3279-3-E",
            Self::Model4 => "IBM-3279-4-E",
            Self::Model5 => "IBM-3279-5-E",
            Self::Dynamic { .. } => "IBM-DYNAMIC",
        }
    }
}

impl Default for TerminalModel {
    fn default() -> Self {
        Self::Model2
    }
}

/// The sticky character-attribute record established by SA orders
///
/// Each slot is independent; a slot left at default means the field value
/// applies. The record survives until a new write command or Clear resets it.
#[derive(Debug, Clone)]
struct CharAttrPending {
    underscore: bool,
    underscore_default: bool,

    reverse: bool,
    reverse_default: bool,

    blink: bool,
    blink_default: bool,

    colour: Colour,
    colour_default: bool,
}

impl Default for CharAttrPending {
    fn default() -> Self {
        Self {
            underscore: false,
            underscore_default: true,
            reverse: false,
            reverse_default: true,
            blink: false,
            blink_default: true,
            colour: Colour::Green,
            colour_default: true,
        }
    }
}

/// 3270 display buffer
#[derive(Debug)]
pub struct Display3270 {
    rows: usize,
    cols: usize,
    /// rows * cols, the ring modulus
    buffer_size: usize,

    cells: Vec<Cell>,

    cursor_pos: usize,

    /// Last attention key sent inbound; replayed by Read Modified
    last_aid: u8,

    /// True until the first SF/SFE defines a field
    unformatted: bool,

    /// Next character placement takes its glyph from the GE code page
    ge_active: bool,

    char_attr: CharAttrPending,
    use_char_attr: bool,

    codepage: CodePage,

    // Blink-tick visibility; toggled by the periodic ticks, read by the
    // rendering collaborator
    blink_visible: bool,
    cursor_visible: bool,
}

impl Display3270 {
    /// Create a 24x80 primary screen
    pub fn new() -> Self {
        Self::with_size(24, 80)
    }

    /// Create a screen with explicit geometry
    pub fn with_size(rows: usize, cols: usize) -> Self {
        let buffer_size = rows * cols;
        Self {
            rows,
            cols,
            buffer_size,
            cells: vec![Cell::default(); buffer_size],
            cursor_pos: 0,
            last_aid: AID_NO_AID,
            unformatted: true,
            ge_active: false,
            char_attr: CharAttrPending::default(),
            use_char_attr: false,
            codepage: CodePage::default(),
            blink_visible: true,
            cursor_visible: true,
        }
    }

    /// Create the alternate screen for a terminal model
    pub fn for_model(model: TerminalModel) -> Self {
        Self::with_size(model.rows(), model.cols())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn cell(&self, pos: usize) -> &Cell {
        &self.cells[pos % self.buffer_size]
    }

    pub fn cursor_pos(&self) -> usize {
        self.cursor_pos
    }

    /// Cursor as (col, row)
    pub fn cursor_xy(&self) -> (usize, usize) {
        (self.cursor_pos % self.cols, self.cursor_pos / self.cols)
    }

    pub fn last_aid(&self) -> u8 {
        self.last_aid
    }

    pub fn is_unformatted(&self) -> bool {
        self.unformatted
    }

    pub fn codepage(&self) -> &CodePage {
        &self.codepage
    }

    pub fn set_codepage(&mut self, codepage: CodePage) {
        self.codepage = codepage;
    }

    /// Reset every cell, the sticky attribute record and the cursor
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.reset();
        }
        self.reset_char_attr();
        self.ge_active = false;
        self.unformatted = true;
        self.cursor_pos = 0;
    }

    // ------------------------------------------------------------------
    // Sticky character attributes (SA order)
    // ------------------------------------------------------------------

    /// Apply an SA order pair to the pending character-attribute record
    pub fn set_char_attr(&mut self, attr_type: u8, value: u8) {
        match attr_type {
            XA_DEFAULT => {
                self.char_attr.blink_default = true;
                self.char_attr.reverse_default = true;
                self.char_attr.underscore_default = true;
                self.char_attr.colour_default = true;
            }
            XA_HIGHLIGHT => match value {
                HILITE_DEFAULT | HILITE_NORMAL => {
                    self.char_attr.underscore = false;
                    self.char_attr.reverse = false;
                    self.char_attr.blink = false;
                }
                HILITE_BLINK => {
                    self.char_attr.blink = true;
                    self.char_attr.underscore = false;
                    self.char_attr.reverse = false;
                    self.char_attr.blink_default = false;
                }
                HILITE_REVERSE => {
                    self.char_attr.blink = false;
                    self.char_attr.underscore = false;
                    self.char_attr.reverse = true;
                    self.char_attr.reverse_default = false;
                }
                HILITE_USCORE => {
                    self.char_attr.blink = false;
                    self.char_attr.reverse = false;
                    self.char_attr.underscore = true;
                    self.char_attr.underscore_default = false;
                }
                _ => warn!("SA highlight value 0x{value:02X} not implemented"),
            },
            XA_FG_COLOUR | XA_BG_COLOUR => {
                if value == XA_DEFAULT {
                    self.char_attr.colour_default = true;
                } else {
                    self.char_attr.colour = Colour::from_wire(value);
                    self.char_attr.colour_default = false;
                }
            }
            _ => warn!("SA attribute type 0x{attr_type:02X} not implemented"),
        }

        self.use_char_attr = true;
    }

    /// Reset the pending record; a new write command or Clear does this
    pub fn reset_char_attr(&mut self) {
        self.char_attr = CharAttrPending::default();
        self.use_char_attr = false;
    }

    /// The next placed character comes from the graphic-escape page
    pub fn set_graphic_escape(&mut self) {
        self.ge_active = true;
    }

    // ------------------------------------------------------------------
    // Character and field placement
    // ------------------------------------------------------------------

    /// Place a glyph
    ///
    /// Removes any field start at `pos` (repointing the orphaned cells to the
    /// previously governing field), applies the pending character attributes
    /// for host-side placements, and inherits display/protection and colour
    /// from the governing field. `from_kb` marks keyboard-originated
    /// placements, which never pick up the sticky attribute record.
    pub fn set_char(&mut self, pos: usize, c: u8, from_kb: bool) {
        let pos = pos % self.buffer_size;

        let mut field_attr = self.cells[pos].field_ref().unwrap_or(pos);

        if self.cells[pos].is_field_start() {
            self.cells[pos].set_field_start(false);
            let prev = self.find_field(pos);
            let new_ref = if prev == pos { None } else { Some(prev) };
            self.cells[pos].set_field_ref(new_ref);
            field_attr = new_ref.unwrap_or(pos);

            // The cells that belonged to the removed field inherit the
            // previously governing field start
            let mut i = (pos + 1) % self.buffer_size;
            while i != pos && !self.cells[i].is_field_start() {
                self.cells[i].set_field_ref(new_ref);
                i = (i + 1) % self.buffer_size;
            }

            self.unformatted = !self.cells.iter().any(|c| c.is_field_start());
        }

        self.cells[pos].reset_char_attrs();

        if !from_kb && self.use_char_attr {
            if !self.char_attr.colour_default {
                self.cells[pos].set_char_attr(CharAttr::Colour, true);
            }
            if !self.char_attr.blink_default
                || !self.char_attr.reverse_default
                || !self.char_attr.underscore_default
            {
                self.cells[pos].set_char_attr(CharAttr::Extended, true);
            }
        }

        // Display and protection always come from the field attribute
        let field_display = self.cells[field_attr].is_display();
        let field_protected = if field_attr == pos {
            false
        } else {
            self.cells[field_attr].is_protected()
        };
        self.cells[pos].set_display(field_display);
        self.cells[pos].set_protected(field_protected);

        self.cells[pos].set_graphic(self.ge_active);
        self.cells[pos].set_char(c);
        self.ge_active = false;

        // Colour: character attribute wins while active, else the field's
        if self.cells[pos].has_char_attr(CharAttr::Colour) && !self.char_attr.colour_default {
            let colour = self.char_attr.colour;
            self.cells[pos].set_colour(colour);
        } else {
            let colour = self.cells[field_attr].colour();
            self.cells[pos].set_colour(colour);
        }

        if self.cells[pos].has_char_attr(CharAttr::Extended) {
            let (uscore, reverse, blink) = (
                if self.char_attr.underscore_default {
                    self.cells[field_attr].is_underscore()
                } else {
                    self.char_attr.underscore
                },
                if self.char_attr.reverse_default {
                    self.cells[field_attr].is_reverse()
                } else {
                    self.char_attr.reverse
                },
                if self.char_attr.blink_default {
                    self.cells[field_attr].is_blink()
                } else {
                    self.char_attr.blink
                },
            );
            self.cells[pos].set_underscore(uscore);
            self.cells[pos].set_reverse(reverse);
            self.cells[pos].set_blink(blink);
        } else {
            let uscore = self.cells[field_attr].is_underscore();
            let reverse = self.cells[field_attr].is_reverse();
            let blink = self.cells[field_attr].is_blink();
            self.cells[pos].set_underscore(uscore);
            self.cells[pos].set_reverse(reverse);
            self.cells[pos].set_blink(blink);
        }
    }

    /// Start Field / Start Field Extended
    ///
    /// Field attribute byte layout:
    ///
    /// Bit | Function
    /// --- | --------
    /// 0,1 | make the attribute a valid EBCDIC character
    ///   2 | protected
    ///   3 | numeric
    /// 4,5 | 00 display/non-pen, 01 display/pen, 10 intensified/pen,
    ///     | 11 non-display/non-pen
    ///   6 | reserved
    ///   7 | MDT
    ///
    /// The cell's attributes then cascade forward to the next field start.
    pub fn set_field(&mut self, pos: usize, c: u8, sfe: bool) {
        let pos = pos % self.buffer_size;

        self.unformatted = false;

        let prot = (c >> 5) & 1 != 0;
        let num = (c >> 4) & 1 != 0;
        let disp = (c >> 2) & 3 != 3;
        let pensel = matches!((c >> 2) & 3, 1 | 2);
        let intens = (c >> 2) & 3 == 2;
        let mdt = c & 1 != 0;

        let cell = &mut self.cells[pos];
        cell.set_protected(prot);
        cell.set_numeric(num);
        cell.set_display(disp);
        cell.set_pen_select(pensel);
        cell.set_intensified(intens);
        cell.set_mdt(mdt);
        cell.set_extended(sfe);
        cell.set_field_start(true);
        cell.set_field_ref(None);

        // Field attributes display as nulls and carry no highlighting of
        // their own
        cell.set_char(CHAR_NULL);
        cell.set_underscore(false);
        cell.set_reverse(false);
        cell.set_blink(false);

        cell.set_colour(Colour::field_default(prot, intens));

        self.cascade_attrs(pos);
    }

    /// Copy a field start's attributes to the cells in its field
    ///
    /// Every cell up to the next field start inherits the field bits and the
    /// field colour (cells holding a colour character attribute keep their
    /// own), and gets its back-reference set.
    pub fn cascade_attrs(&mut self, pos: usize) {
        let pos = pos % self.buffer_size;

        let prot = self.cells[pos].is_protected();
        let mdt = self.cells[pos].is_mdt_on();
        let num = self.cells[pos].is_numeric();
        let pensel = self.cells[pos].is_pen_select();
        let blink = self.cells[pos].is_blink();
        let disp = self.cells[pos].is_display();
        let under = self.cells[pos].is_underscore();
        let rev = self.cells[pos].is_reverse();
        let col = self.cells[pos].colour();

        let mut i = (pos + 1) % self.buffer_size;
        while i != pos && !self.cells[i].is_field_start() {
            let cell_col = if self.cells[i].has_char_attr(CharAttr::Colour) {
                self.cells[i].colour()
            } else {
                col
            };
            self.cells[i].set_attrs(prot, mdt, num, pensel, blink, disp, under, rev, cell_col);
            self.cells[i].set_field_ref(Some(pos));
            i = (i + 1) % self.buffer_size;
        }
    }

    /// Reset extended attributes at a position ahead of an SFE
    ///
    /// There is no way to know which attribute pairs an SFE will carry, so
    /// any existing settings are cleared first.
    pub fn reset_extended(&mut self, pos: usize) {
        let pos = pos % self.buffer_size;
        self.reset_extended_hilite(pos);

        let cell = &mut self.cells[pos];
        cell.set_colour(Colour::Blue);
        cell.set_display(true);
        cell.set_numeric(false);
        cell.set_mdt(false);
        cell.set_pen_select(false);
        cell.set_protected(false);
    }

    pub fn reset_extended_hilite(&mut self, pos: usize) {
        let cell = &mut self.cells[pos % self.buffer_size];
        cell.set_underscore(false);
        cell.set_blink(false);
        cell.set_reverse(false);
    }

    pub fn set_extended_colour(&mut self, pos: usize, value: u8) {
        if value == XA_DEFAULT {
            return;
        }
        self.cells[pos % self.buffer_size].set_colour(Colour::from_wire(value));
    }

    /// Blink, reverse and underscore are mutually exclusive
    pub fn set_extended_blink(&mut self, pos: usize) {
        let cell = &mut self.cells[pos % self.buffer_size];
        cell.set_reverse(false);
        cell.set_underscore(false);
        cell.set_blink(true);
    }

    pub fn set_extended_reverse(&mut self, pos: usize) {
        let cell = &mut self.cells[pos % self.buffer_size];
        cell.set_blink(false);
        cell.set_underscore(false);
        cell.set_reverse(true);
    }

    pub fn set_extended_uscore(&mut self, pos: usize) {
        let cell = &mut self.cells[pos % self.buffer_size];
        cell.set_blink(false);
        cell.set_reverse(false);
        cell.set_underscore(true);
    }

    // ------------------------------------------------------------------
    // MDT handling
    // ------------------------------------------------------------------

    /// Set or clear the Modified Data Tag for the field containing `pos`
    ///
    /// Setting routes to the governing field start. Clearing only takes
    /// effect when `pos` is the field start itself.
    pub fn set_mdt(&mut self, pos: usize, mdt: bool) {
        let pos = pos % self.buffer_size;
        if mdt {
            let target = if self.cells[pos].is_field_start() {
                pos
            } else {
                match self.cells[pos].field_ref() {
                    Some(f) => f,
                    None => return, // unformatted screen has no MDT to set
                }
            };
            self.cells[target].set_mdt(true);
        } else if self.cells[pos].is_field_start() {
            self.cells[pos].set_mdt(false);
        }
    }

    /// Clear every field start's MDT (WCC reset-MDT bit)
    pub fn reset_mdts(&mut self) {
        for cell in &mut self.cells {
            if cell.is_field_start() && cell.is_mdt_on() {
                cell.set_mdt(false);
            }
        }
    }

    // ------------------------------------------------------------------
    // Field lookups
    // ------------------------------------------------------------------

    /// The field start governing `pos`, or `pos` itself when the screen has
    /// no field there
    pub fn find_field(&self, pos: usize) -> usize {
        let pos = pos % self.buffer_size;
        let mut offset = pos;
        for _ in 0..self.buffer_size {
            if self.cells[offset].is_field_start() {
                return offset;
            }
            offset = if offset == 0 { self.buffer_size - 1 } else { offset - 1 };
        }
        pos
    }

    /// The next field start after `pos` in ring order, or `pos` when no field
    /// exists
    pub fn find_next_field(&self, pos: usize) -> usize {
        let pos = pos % self.buffer_size;
        for i in 1..=self.buffer_size {
            let tmp = (pos + i) % self.buffer_size;
            if self.cells[tmp].is_field_start() {
                return tmp;
            }
        }
        pos
    }

    /// The next unprotected field start at or after `pos`
    ///
    /// Two adjacent field starts cannot form an input field, so a candidate
    /// is skipped when the following cell is itself a field start.
    pub fn find_next_unprotected_field(&self, pos: usize) -> Option<usize> {
        let pos = pos % self.buffer_size;
        for i in 0..self.buffer_size {
            let tmp = (pos + i) % self.buffer_size;
            let nxt = (tmp + 1) % self.buffer_size;
            if self.cells[tmp].is_field_start()
                && !self.cells[tmp].is_protected()
                && !self.cells[nxt].is_field_start()
            {
                return Some(tmp);
            }
        }
        None
    }

    /// The previous unprotected field start strictly before `pos - 1`
    pub fn find_prev_unprotected_field(&self, pos: usize) -> Option<usize> {
        let pos = pos % self.buffer_size;
        for i in 2..=self.buffer_size {
            let tmp = (pos + self.buffer_size * 2 - i) % self.buffer_size;
            let nxt = (tmp + 1) % self.buffer_size;
            if self.cells[tmp].is_field_start()
                && !self.cells[tmp].is_protected()
                && !self.cells[nxt].is_field_start()
            {
                return Some(tmp);
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Host-side erasure
    // ------------------------------------------------------------------

    /// Erase unprotected cells between two addresses (EUA order)
    ///
    /// `end` wraps when it is less than `start`. Protected cells and field
    /// starts are skipped.
    pub fn erase_unprotected(&mut self, start: usize, end: usize) {
        let start = start % self.buffer_size;
        let end = end % self.buffer_size;
        let end = if end < start { end + self.buffer_size } else { end };

        for i in start..end {
            let idx = i % self.buffer_size;
            if self.cells[idx].is_field_start() || self.cells[idx].is_protected() {
                continue;
            }
            self.cells[idx].set_char(CHAR_SPACE);
        }
    }

    /// Erase All Unprotected command: null every unprotected input cell and
    /// drop the MDTs
    pub fn erase_all_unprotected(&mut self) {
        for i in 0..self.buffer_size {
            if self.cells[i].is_field_start() || self.cells[i].is_protected() {
                continue;
            }
            self.cells[i].set_char(CHAR_NULL);
        }
        self.reset_mdts();
    }

    // ------------------------------------------------------------------
    // Keyboard-side editing
    // ------------------------------------------------------------------

    /// Insert or overtype a character at the cursor
    ///
    /// In insert mode the cells from the cursor to the first null in the
    /// field shift right by one; a field with no null left rejects the
    /// insert. The field's MDT is set and the cursor advances, tabbing past
    /// an auto-skip field.
    pub fn insert_char(&mut self, ch: char, insert_mode: bool) -> InputResult<()> {
        let pos = self.cursor_pos;

        if self.cells[pos].is_field_start() {
            return Err(InputError::CursorAtFieldStart);
        }
        if self.cells[pos].is_protected() {
            return Err(InputError::InputIntoProtected);
        }

        if insert_mode {
            // Find the first null in the field at or after the cursor
            let mut end_pos = None;
            for i in pos..pos + self.buffer_size {
                let offset = i % self.buffer_size;
                if self.cells[offset].is_protected() || self.cells[offset].is_field_start() {
                    break;
                }
                if self.cells[offset].ebcdic() == CHAR_NULL {
                    end_pos = Some(i);
                    break;
                }
            }
            let end_pos = end_pos.ok_or(InputError::InsertOverflow)?;

            // Shift (cursor..=first_null] right by one cell
            for fld in (pos + 1..=end_pos).rev() {
                let offset = fld % self.buffer_size;
                let prev = (fld - 1) % self.buffer_size;
                let source = self.cells[prev].clone();
                self.cells[offset].copy_content(&source);
            }
        }

        self.set_mdt(pos, true);

        let ebcdic = self.codepage.to_ebcdic(ch);
        self.set_char(pos, ebcdic, true);

        self.set_cursor((pos + 1) % self.buffer_size);

        if self.cells[self.cursor_pos].is_auto_skip() {
            self.tab(0);
        }

        Ok(())
    }

    /// Delete the character at the cursor, closing the gap to the end of the
    /// field
    pub fn delete_char(&mut self) -> InputResult<()> {
        let pos = self.cursor_pos;

        if self.cells[pos].is_field_start() {
            return Err(InputError::CursorAtFieldStart);
        }
        if self.cells[pos].is_protected() {
            return Err(InputError::InputIntoProtected);
        }

        let next_field = self.find_next_field(pos);
        let end_pos = if next_field <= pos {
            next_field + self.buffer_size
        } else {
            next_field
        };

        for fld in pos..end_pos - 1 {
            let offset = fld % self.buffer_size;
            if self.cells[offset].ebcdic() == CHAR_NULL {
                break;
            }
            let next = (fld + 1) % self.buffer_size;
            let source = self.cells[next].clone();
            self.cells[offset].copy_content(&source);
        }

        self.cells[(end_pos - 1) % self.buffer_size].set_char(CHAR_NULL);
        self.set_mdt(pos, true);

        Ok(())
    }

    /// Null the cells from the cursor to the end of the current field
    pub fn erase_eof(&mut self) -> InputResult<()> {
        let pos = self.cursor_pos;

        if self.cells[pos].is_field_start() {
            return Err(InputError::CursorAtFieldStart);
        }
        if self.cells[pos].is_protected() {
            return Err(InputError::InputIntoProtected);
        }

        let next_field = self.find_next_field(pos);
        let end_pos = if next_field <= pos {
            next_field + self.buffer_size
        } else {
            next_field
        };

        for i in pos..end_pos {
            self.cells[i % self.buffer_size].set_char(CHAR_NULL);
        }

        self.set_mdt(pos, true);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cursor motion
    // ------------------------------------------------------------------

    pub fn set_cursor(&mut self, pos: usize) {
        self.cursor_pos = pos % self.buffer_size;
    }

    /// Relative cursor motion with ring wrap in both directions
    pub fn move_cursor(&mut self, dx: isize, dy: isize) {
        let n = self.buffer_size as isize;
        let mut pos = self.cursor_pos as isize + dy * self.cols as isize + dx;
        pos %= n;
        if pos < 0 {
            pos += n;
        }
        self.cursor_pos = pos as usize;
    }

    /// Move to the next unprotected field, skipping the attribute byte
    pub fn tab(&mut self, offset: usize) {
        if let Some(nf) = self.find_next_unprotected_field(self.cursor_pos + offset) {
            self.set_cursor(nf + 1);
        }
    }

    /// Move to the previous unprotected field, skipping the attribute byte
    pub fn backtab(&mut self) {
        if let Some(pf) = self.find_prev_unprotected_field(self.cursor_pos) {
            self.set_cursor(pf + 1);
        }
    }

    /// Move to the first input field on the screen
    ///
    /// Searching starts at the last position in case that is a field start
    /// and position 0 is the first input cell.
    pub fn home(&mut self) {
        if let Some(nf) = self.find_next_unprotected_field(self.buffer_size - 1) {
            self.set_cursor(nf + 1);
        }
    }

    /// Move to the first input field after the start of the next line
    pub fn newline(&mut self) {
        let mut row = self.cursor_pos / self.cols + 1;
        if row >= self.rows {
            row = 0;
        }
        self.cursor_pos = row * self.cols;
        self.tab(0);
    }

    /// Backspace one character, stopping at the field start
    pub fn backspace(&mut self) {
        if self.cells[self.cursor_pos].is_protected() {
            return;
        }
        let prev = if self.cursor_pos == 0 {
            self.buffer_size - 1
        } else {
            self.cursor_pos - 1
        };
        if self.cells[prev].is_field_start() {
            return;
        }
        self.set_cursor(prev);
    }

    /// Move to the end of the text in the current input field
    pub fn endline(&mut self) {
        if self.cells[self.cursor_pos].is_protected() {
            return;
        }

        let mut end_field = self.cursor_pos;
        let mut letter = false;

        for i in self.cursor_pos..self.cursor_pos + self.buffer_size {
            let offset = i % self.buffer_size;
            if self.cells[offset].is_protected() || self.cells[offset].is_field_start() {
                break;
            }
            let ch = self.cells[offset].ebcdic();
            if letter && (ch == CHAR_NULL || ch == CHAR_SPACE) {
                end_field = offset;
                letter = false;
            }
            if ch != CHAR_NULL && ch != CHAR_SPACE {
                letter = true;
            }
        }

        self.set_cursor(end_field);
    }

    // ------------------------------------------------------------------
    // Inbound serialisation
    // ------------------------------------------------------------------

    /// Process an attention key and build the inbound payload
    ///
    /// Short-read AIDs (Clear, PA keys) return only the AID byte. Clear also
    /// clears the screen and homes the cursor.
    pub fn process_aid(&mut self, aid: AidKey, short_read: bool) -> Vec<u8> {
        let mut buffer = vec![aid.to_u8()];

        self.last_aid = aid.to_u8();

        if !short_read {
            self.push_address(&mut buffer, self.cursor_pos);
            self.modified_fields(&mut buffer);
        }

        if aid == AidKey::Clear {
            self.set_cursor(0);
            self.clear();
        }

        debug!("AID 0x{:02X}, {} inbound bytes", self.last_aid, buffer.len());
        buffer
    }

    /// Append every modified field as SBA + address + non-null data bytes
    ///
    /// An unformatted screen returns its entire non-null content with no
    /// addressing.
    pub fn modified_fields(&self, buffer: &mut Vec<u8>) {
        if self.unformatted {
            for cell in &self.cells {
                if cell.ebcdic() != CHAR_NULL {
                    buffer.push(cell.ebcdic());
                }
            }
            return;
        }

        for i in 0..self.buffer_size {
            if !self.cells[i].is_field_start()
                || self.cells[i].is_protected()
                || !self.cells[i].is_mdt_on()
            {
                continue;
            }

            buffer.push(ORDER_SBA);
            let first = (i + 1) % self.buffer_size;
            self.push_address(buffer, first);

            let mut pos = first;
            while !self.cells[pos].is_field_start() {
                let b = self.cells[pos].ebcdic();
                if b != CHAR_NULL {
                    buffer.push(b);
                }
                pos = (pos + 1) % self.buffer_size;
                if pos == first {
                    // Single field spanning the whole ring
                    break;
                }
            }
        }
    }

    /// Serialise the whole screen for a Read Buffer reply
    ///
    /// Field starts are written as SF plus an attribute byte rebuilt from the
    /// field bits; data cells as their raw EBCDIC. 0xFF is doubled wherever
    /// it appears.
    pub fn read_buffer(&self, buffer: &mut Vec<u8>) {
        buffer.push(self.last_aid);
        self.push_address(buffer, self.cursor_pos);

        for cell in &self.cells {
            if cell.is_field_start() {
                buffer.push(ORDER_SF);

                // Two-bit display/pen code: 00 display, 01 display+pen,
                // 10 intensified, 11 non-display
                let dp: u8 = if cell.is_display() && !cell.is_pen_select() {
                    0b00
                } else if cell.is_display() && !cell.is_intensified() {
                    0b01
                } else if cell.is_intensified() {
                    0b10
                } else {
                    0b11
                };

                let index = (cell.is_protected() as u8) << 5
                    | (cell.is_numeric() as u8) << 4
                    | dp << 2
                    | cell.is_mdt_on() as u8;

                let byte = addressing::TWELVE_BIT[index as usize];
                buffer.push(byte);
                if byte == 0xFF {
                    buffer.push(byte);
                }
            } else {
                let b = cell.ebcdic();
                buffer.push(b);
                if b == 0xFF {
                    buffer.push(b);
                }
            }
        }
    }

    /// Append a buffer address using the width `N` demands, doubling any
    /// 0xFF byte
    pub fn push_address(&self, buffer: &mut Vec<u8>, pos: usize) {
        let (byte1, byte2) = addressing::encode_address(pos, self.buffer_size);

        buffer.push(byte1);
        if byte1 == 0xFF {
            buffer.push(byte1);
        }
        buffer.push(byte2);
        if byte2 == 0xFF {
            buffer.push(byte2);
        }
    }

    // ------------------------------------------------------------------
    // Blink ticks
    // ------------------------------------------------------------------

    /// Character-blink tick: toggle visibility of blinking cells
    pub fn blink_tick(&mut self) {
        self.blink_visible = !self.blink_visible;
    }

    /// Cursor-blink tick
    pub fn cursor_blink_tick(&mut self) {
        self.cursor_visible = !self.cursor_visible;
    }

    pub fn blink_visible(&self) -> bool {
        self.blink_visible
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    /// Force the cursor visible (blink switched off mid-cycle)
    pub fn show_cursor(&mut self) {
        self.cursor_visible = true;
    }

    // ------------------------------------------------------------------
    // Debug renderings
    // ------------------------------------------------------------------

    /// One screen row as translated text; field starts render as blanks
    pub fn render_row(&self, row: usize) -> Option<String> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        let mut result = String::with_capacity(self.cols);
        for i in start..start + self.cols {
            let cell = &self.cells[i];
            if cell.is_field_start() || !cell.is_display() {
                result.push(' ');
            } else if cell.is_graphic() {
                result.push(self.codepage.graphic_to_unicode(cell.ebcdic()));
            } else {
                let ch = self.codepage.to_unicode(cell.ebcdic());
                result.push(if ch == '\0' { ' ' } else { ch });
            }
        }
        Some(result)
    }

    /// Positions and protection of every field start, for diagnostics
    pub fn field_list(&self) -> Vec<(usize, bool)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_field_start())
            .map(|(i, c)| (i, c.is_protected()))
            .collect()
    }
}

impl Default for Display3270 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Display3270 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in 0..self.rows {
            writeln!(f, "{}", self.render_row(row).unwrap_or_default())?;
        }
        Ok(())
    }
}

/// The primary/alternate screen pair a session owns
///
/// The primary screen is always 24x80; the alternate takes the terminal
/// model's geometry. Erase/Write selects the primary, Erase/Write Alternate
/// the alternate.
#[derive(Debug)]
pub struct ScreenPair {
    primary: Display3270,
    alternate: Display3270,
    using_alternate: bool,
}

impl ScreenPair {
    pub fn new(model: TerminalModel) -> Self {
        Self {
            primary: Display3270::new(),
            alternate: Display3270::for_model(model),
            using_alternate: false,
        }
    }

    pub fn active(&self) -> &Display3270 {
        if self.using_alternate {
            &self.alternate
        } else {
            &self.primary
        }
    }

    pub fn active_mut(&mut self) -> &mut Display3270 {
        if self.using_alternate {
            &mut self.alternate
        } else {
            &mut self.primary
        }
    }

    pub fn alternate(&self) -> &Display3270 {
        &self.alternate
    }

    pub fn is_alternate(&self) -> bool {
        self.using_alternate
    }

    /// Switch screens; the newly selected screen keeps its content (Erase
    /// Write clears separately)
    pub fn select(&mut self, alternate: bool) {
        self.using_alternate = alternate;
    }

    pub fn set_codepage(&mut self, codepage: CodePage) {
        self.primary.set_codepage(codepage.clone());
        self.alternate.set_codepage(codepage);
    }
}

/// Buffer addressing for the 3270 data stream
///
/// The wire width depends on the screen size: 12-bit addresses map each
/// 6-bit half through a table of printable EBCDIC bytes, 14-bit addresses
/// carry the high six bits raw, and screens of 16k cells or more use plain
/// big-endian 16-bit.
pub mod addressing {
    /// Canonical encoding of the 64 possible 6-bit values in a 12-bit
    /// address
    pub const TWELVE_BIT: [u8; 64] = [
        0x40, 0xC1, 0xC2, 0xC3, 0xC4, 0xC5, 0xC6, 0xC7,
        0xC8, 0xC9, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F,
        0x50, 0xD1, 0xD2, 0xD3, 0xD4, 0xD5, 0xD6, 0xD7,
        0xD8, 0xD9, 0x5A, 0x5B, 0x5C, 0x5D, 0x5E, 0x5F,
        0x60, 0x61, 0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7,
        0xE8, 0xE9, 0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F,
        0xF0, 0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7,
        0xF8, 0xF9, 0x7A, 0x7B, 0x7C, 0x7D, 0x7E, 0x7F,
    ];

    /// Decode a 2-byte buffer address
    ///
    /// Screens with 16k cells or more always use the 16-bit form. Below
    /// that, the top two bits of the first byte distinguish 12-bit
    /// (0b01/0b11) from 14-bit (0b00); 0b10 is reserved and decodes to 0.
    pub fn decode_address(byte1: u8, byte2: u8, buffer_size: usize) -> usize {
        if buffer_size >= 16384 {
            return ((byte1 as usize) << 8) | byte2 as usize;
        }
        match (byte1 >> 6) & 3 {
            0b01 | 0b11 => (((byte1 & 63) as usize) << 6) + (byte2 & 63) as usize,
            0b00 => (((byte1 & 63) as usize) << 8) + byte2 as usize,
            _ => 0, // reserved
        }
    }

    /// Encode a buffer address in the width the screen size demands
    pub fn encode_address(pos: usize, buffer_size: usize) -> (u8, u8) {
        if buffer_size < 4096 {
            (
                TWELVE_BIT[(pos >> 6) & 0x3F],
                TWELVE_BIT[pos & 0x3F],
            )
        } else if buffer_size < 16384 {
            (((pos >> 8) & 0x3F) as u8, (pos & 0xFF) as u8)
        } else {
            (((pos >> 8) & 0xFF) as u8, (pos & 0xFF) as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ebcdic(s: &str) -> Vec<u8> {
        let cp = CodePage::default();
        s.chars().map(|c| cp.to_ebcdic(c)).collect()
    }

    #[test]
    fn test_model_geometry() {
        assert_eq!(TerminalModel::Model2.buffer_size(), 1920);
        assert_eq!(TerminalModel::Model4.rows(), 43);
        assert_eq!(TerminalModel::Model5.cols(), 132);
        let dynamic = TerminalModel::Dynamic { rows: 62, cols: 160 };
        assert_eq!(dynamic.buffer_size(), 9920);
        assert_eq!(dynamic.terminal_type(), "IBM-DYNAMIC");
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut display = Display3270::new();
        display.set_field(10, ATTR_PROTECTED, false);
        display.set_char(11, 0xC1, false);
        display.set_cursor(40);
        display.clear();
        assert!(display.is_unformatted());
        assert_eq!(display.cursor_pos(), 0);
        assert_eq!(display.cell(11).ebcdic(), CHAR_NULL);
        assert!(!display.cell(10).is_field_start());
    }

    #[test]
    fn test_set_field_cascades_refs() {
        let mut display = Display3270::new();
        display.set_field(5, ATTR_PROTECTED, false);
        display.set_field(20, 0x00, false);
        for pos in 6..20 {
            assert_eq!(display.cell(pos).field_ref(), Some(5), "pos {pos}");
            assert!(display.cell(pos).is_protected());
        }
        assert_eq!(display.cell(21).field_ref(), Some(20));
        assert!(!display.cell(21).is_protected());
        // Field starts carry no back-reference
        assert_eq!(display.cell(5).field_ref(), None);
        assert_eq!(display.cell(20).field_ref(), None);
    }

    #[test]
    fn test_set_field_colour_defaults() {
        let mut display = Display3270::new();
        display.set_field(0, ATTR_PROTECTED | 0x08, false); // protected, intensified
        assert_eq!(display.cell(0).colour(), Colour::ProtectedIntensified);
        display.set_field(10, 0x00, false);
        assert_eq!(display.cell(10).colour(), Colour::UnprotectedNormal);
    }

    #[test]
    fn test_overwriting_field_start_repoints_orphans() {
        let mut display = Display3270::new();
        display.set_field(5, ATTR_PROTECTED, false);
        display.set_field(10, 0x00, false);
        // Kill the field at 10; its cells fall back to the field at 5
        display.set_char(10, 0xC1, false);
        assert!(!display.cell(10).is_field_start());
        assert_eq!(display.cell(10).field_ref(), Some(5));
        assert_eq!(display.cell(11).field_ref(), Some(5));
        assert_eq!(display.cell(100).field_ref(), Some(5));
    }

    #[test]
    fn test_overwriting_only_field_start_unformats() {
        let mut display = Display3270::new();
        display.set_field(5, 0x00, false);
        display.set_char(5, 0xC1, false);
        assert!(display.is_unformatted());
        assert_eq!(display.cell(6).field_ref(), None);
    }

    #[test]
    fn test_sticky_colour_attr() {
        let mut display = Display3270::new();
        display.set_field(0, 0x00, false);
        display.set_char_attr(XA_FG_COLOUR, 0xF2); // red
        display.set_char(1, 0xC1, false);
        assert_eq!(display.cell(1).colour(), Colour::Red);
        assert!(display.cell(1).has_char_attr(CharAttr::Colour));

        // Reset: next write inherits the field colour again
        display.reset_char_attr();
        display.set_char(2, 0xC2, false);
        assert_eq!(display.cell(2).colour(), Colour::UnprotectedNormal);
        assert!(!display.cell(2).has_char_attr(CharAttr::Colour));

        // The override on cell 1 persists until overwritten
        assert_eq!(display.cell(1).colour(), Colour::Red);
        display.set_char(1, 0xC3, false);
        assert_eq!(display.cell(1).colour(), Colour::UnprotectedNormal);
    }

    #[test]
    fn test_keyboard_placement_ignores_sticky_attrs() {
        let mut display = Display3270::new();
        display.set_field(0, 0x00, false);
        display.set_char_attr(XA_FG_COLOUR, 0xF2);
        display.set_cursor(1);
        display.insert_char('A', false).unwrap();
        assert!(!display.cell(1).has_char_attr(CharAttr::Colour));
        assert_eq!(display.cell(1).colour(), Colour::UnprotectedNormal);
    }

    #[test]
    fn test_find_next_unprotected_skips_adjacent_field_starts() {
        let mut display = Display3270::new();
        display.set_field(10, 0x00, false); // unprotected but...
        display.set_field(11, 0x00, false); // ...immediately followed by a field
        display.set_field(30, 0x00, false);
        assert_eq!(display.find_next_unprotected_field(0), Some(11));
        assert_eq!(display.find_next_unprotected_field(12), Some(30));
    }

    #[test]
    fn test_find_field_walks_backward() {
        let mut display = Display3270::new();
        display.set_field(100, 0x00, false);
        assert_eq!(display.find_field(150), 100);
        assert_eq!(display.find_field(100), 100);
        // Wraps past 0
        assert_eq!(display.find_field(50), 100);
    }

    #[test]
    fn test_insert_overtype() {
        let mut display = Display3270::new();
        display.set_field(10, 0x00, false);
        display.set_cursor(11);
        display.insert_char('A', false).unwrap();
        let a = ebcdic("A")[0];
        assert_eq!(display.cell(11).ebcdic(), a);
        assert_eq!(display.cursor_pos(), 12);
        assert!(display.cell(10).is_mdt_on());
    }

    #[test]
    fn test_insert_mode_shifts_right() {
        let mut display = Display3270::new();
        display.set_field(10, 0x00, false);
        display.set_field(20, ATTR_PROTECTED, false);
        let ab = ebcdic("AB");
        display.set_char(11, ab[0], false);
        display.set_char(12, ab[1], false);

        display.set_cursor(12);
        display.insert_char('X', true).unwrap();

        assert_eq!(display.cell(11).ebcdic(), ab[0]);
        assert_eq!(display.cell(12).ebcdic(), ebcdic("X")[0]);
        assert_eq!(display.cell(13).ebcdic(), ab[1]);
        assert!(display.cell(10).is_mdt_on());
    }

    #[test]
    fn test_insert_overflow_rejected() {
        let mut display = Display3270::new();
        display.set_field(10, 0x00, false);
        display.set_field(20, ATTR_PROTECTED, false);
        for pos in 11..20 {
            display.set_char(pos, 0xC1, false);
        }
        display.set_cursor(12);
        let before: Vec<u8> = (11..20).map(|p| display.cell(p).ebcdic()).collect();
        assert_eq!(display.insert_char('X', true), Err(InputError::InsertOverflow));
        let after: Vec<u8> = (11..20).map(|p| display.cell(p).ebcdic()).collect();
        assert_eq!(before, after);
        assert!(!display.cell(10).is_mdt_on());
    }

    #[test]
    fn test_insert_into_protected_rejected() {
        let mut display = Display3270::new();
        display.set_field(10, ATTR_PROTECTED, false);
        display.set_cursor(11);
        assert_eq!(display.insert_char('A', false), Err(InputError::InputIntoProtected));
        display.set_cursor(10);
        assert_eq!(display.insert_char('A', false), Err(InputError::CursorAtFieldStart));
    }

    #[test]
    fn test_delete_char_shifts_left() {
        let mut display = Display3270::new();
        display.set_field(10, 0x00, false);
        display.set_field(20, ATTR_PROTECTED, false);
        let abc = ebcdic("ABC");
        for (i, b) in abc.iter().enumerate() {
            display.set_char(11 + i, *b, false);
        }
        display.set_cursor(11);
        display.delete_char().unwrap();
        assert_eq!(display.cell(11).ebcdic(), abc[1]);
        assert_eq!(display.cell(12).ebcdic(), abc[2]);
        assert_eq!(display.cell(13).ebcdic(), CHAR_NULL);
        assert!(display.cell(10).is_mdt_on());
    }

    #[test]
    fn test_erase_eof() {
        let mut display = Display3270::new();
        display.set_field(10, 0x00, false);
        display.set_field(20, ATTR_PROTECTED, false);
        for pos in 11..20 {
            display.set_char(pos, 0xC1, false);
        }
        display.set_cursor(14);
        display.erase_eof().unwrap();
        assert_eq!(display.cell(13).ebcdic(), 0xC1);
        for pos in 14..20 {
            assert_eq!(display.cell(pos).ebcdic(), CHAR_NULL);
        }
        assert!(display.cell(10).is_mdt_on());
    }

    #[test]
    fn test_auto_skip_tabs_cursor() {
        let mut display = Display3270::new();
        // Input field 10..12, then an auto-skip field, then another input field
        display.set_field(10, 0x00, false);
        display.set_field(12, ATTR_PROTECTED | ATTR_NUMERIC, false);
        display.set_field(30, 0x00, false);
        display.set_cursor(11);
        display.insert_char('A', false).unwrap();
        // Position 12 is auto-skip: cursor lands after the next input field
        assert_eq!(display.cursor_pos(), 31);
    }

    #[test]
    fn test_mdt_routing() {
        let mut display = Display3270::new();
        display.set_field(10, 0x00, false);
        display.set_mdt(15, true);
        assert!(display.cell(10).is_mdt_on());
        // Clearing from a member cell does nothing
        display.set_mdt(15, false);
        assert!(display.cell(10).is_mdt_on());
        // Clearing from the field start works
        display.set_mdt(10, false);
        assert!(!display.cell(10).is_mdt_on());
    }

    #[test]
    fn test_move_cursor_wraps() {
        let mut display = Display3270::new();
        display.set_cursor(0);
        display.move_cursor(-1, 0);
        assert_eq!(display.cursor_pos(), 1919);
        display.move_cursor(1, 0);
        assert_eq!(display.cursor_pos(), 0);
        display.move_cursor(0, -1);
        assert_eq!(display.cursor_pos(), 1920 - 80);
    }

    #[test]
    fn test_backspace_stops_at_field_start() {
        let mut display = Display3270::new();
        display.set_field(10, 0x00, false);
        display.set_cursor(11);
        display.backspace();
        assert_eq!(display.cursor_pos(), 11);
        display.set_cursor(12);
        display.backspace();
        assert_eq!(display.cursor_pos(), 11);
    }

    #[test]
    fn test_erase_unprotected_wraps_and_skips() {
        let mut display = Display3270::new();
        display.set_field(10, ATTR_PROTECTED, false);
        display.set_field(20, 0x00, false);
        display.set_char(15, 0xC1, false);
        display.set_char(25, 0xC2, false);
        display.erase_unprotected(0, 100);
        // Protected cell keeps its data
        assert_eq!(display.cell(15).ebcdic(), 0xC1);
        // Unprotected cell is blanked to EBCDIC space
        assert_eq!(display.cell(25).ebcdic(), CHAR_SPACE);
    }

    #[test]
    fn test_process_aid_short_read() {
        let mut display = Display3270::new();
        display.set_cursor(5);
        let buf = display.process_aid(AidKey::PA1, true);
        assert_eq!(buf, vec![AID_PA1]);
        assert_eq!(display.last_aid(), AID_PA1);
    }

    #[test]
    fn test_process_aid_clear_clears_screen() {
        let mut display = Display3270::new();
        display.set_field(10, 0x00, false);
        display.set_cursor(42);
        let buf = display.process_aid(AidKey::Clear, true);
        assert_eq!(buf, vec![AID_CLEAR]);
        assert!(display.is_unformatted());
        assert_eq!(display.cursor_pos(), 0);
    }

    #[test]
    fn test_addressing_12bit_round_trip() {
        use addressing::*;
        for pos in [0usize, 1, 80, 100, 1919, 4095] {
            let (b1, b2) = encode_address(pos, 1920);
            assert_eq!(decode_address(b1, b2, 1920), pos, "pos {pos}");
        }
        // Address 0 is the classic 0x40 0x40
        assert_eq!(encode_address(0, 1920), (0x40, 0x40));
    }

    #[test]
    fn test_addressing_14bit_round_trip() {
        use addressing::*;
        for pos in [0usize, 4095, 4096, 9919, 16383] {
            let (b1, b2) = encode_address(pos, 9920);
            assert_eq!(decode_address(b1, b2, 9920), pos, "pos {pos}");
        }
    }

    #[test]
    fn test_addressing_16bit_round_trip() {
        use addressing::*;
        for pos in [0usize, 255, 16384, 20000] {
            let (b1, b2) = encode_address(pos, 24000);
            assert_eq!(decode_address(b1, b2, 24000), pos, "pos {pos}");
        }
    }

    #[test]
    fn test_push_address_doubles_ff() {
        // On a 14-bit screen, position 0x3FFF has low byte 0xFF
        let display = Display3270::with_size(62, 160); // 9920 cells
        let mut buf = Vec::new();
        display.push_address(&mut buf, 0x12FF);
        assert_eq!(buf, vec![0x12, 0xFF, 0xFF]);
    }

    #[test]
    fn test_render_row() {
        let mut display = Display3270::new();
        let hello = ebcdic("HELLO");
        for (i, b) in hello.iter().enumerate() {
            display.set_char(i, *b, false);
        }
        let row = display.render_row(0).unwrap();
        assert!(row.starts_with("HELLO"));
    }
}
