//! Screen cell representation
//!
//! A [`Cell`] is one character position in the screen ring: the stored EBCDIC
//! glyph plus the field, extended and character attributes that govern how it
//! displays. Cells that are field starts carry the attributes for their whole
//! field; every other cell carries a back-reference to its governing field
//! start as an arena index.

use serde::{Deserialize, Serialize};

/// 3270 colours and the four field-default colour roles
///
/// The low three bits of a wire colour byte select one of the eight base
/// colours. The four roles are assigned to field starts from their
/// (protected, intensified) combination and resolved to concrete colours by
/// the colour theme at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Colour {
    Black,
    Blue,
    Red,
    Magenta,
    Green,
    Cyan,
    Yellow,
    Neutral,

    UnprotectedNormal,
    ProtectedNormal,
    UnprotectedIntensified,
    ProtectedIntensified,
}

impl Colour {
    /// Map a wire colour value (0xF0..0xF7 or raw 0..7) to a base colour
    pub fn from_wire(value: u8) -> Self {
        match value & 7 {
            0 => Colour::Black,
            1 => Colour::Blue,
            2 => Colour::Red,
            3 => Colour::Magenta,
            4 => Colour::Green,
            5 => Colour::Cyan,
            6 => Colour::Yellow,
            _ => Colour::Neutral,
        }
    }

    /// The default colour role for a field start
    pub fn field_default(protected: bool, intensified: bool) -> Self {
        match (protected, intensified) {
            (false, false) => Colour::UnprotectedNormal,
            (true, false) => Colour::ProtectedNormal,
            (false, true) => Colour::UnprotectedIntensified,
            (true, true) => Colour::ProtectedIntensified,
        }
    }
}

/// Attributes that can carry a per-cell (character-level) override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharAttr {
    Extended,
    Colour,
    Charset,
    Transparency,
}

/// The set of character-level overrides present on a cell
///
/// A cell written while an SA order is in effect records here which of its
/// attributes are its own rather than inherited from the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharAttrSet {
    extended: bool,
    colour: bool,
    charset: bool,
    transparency: bool,
}

impl CharAttrSet {
    pub fn has(&self, attr: CharAttr) -> bool {
        match attr {
            CharAttr::Extended => self.extended,
            CharAttr::Colour => self.colour,
            CharAttr::Charset => self.charset,
            CharAttr::Transparency => self.transparency,
        }
    }

    pub fn set(&mut self, attr: CharAttr, on: bool) {
        match attr {
            CharAttr::Extended => self.extended = on,
            CharAttr::Colour => self.colour = on,
            CharAttr::Charset => self.charset = on,
            CharAttr::Transparency => self.transparency = on,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// One character position in the screen ring
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Stored glyph (EBCDIC; null = empty)
    ebcdic: u8,

    /// Glyph is taken from the graphic-escape code page
    graphic: bool,

    /// This cell is a Field Attribute byte
    field_start: bool,

    /// Index of the governing field start; None when this cell is itself the
    /// field start or the screen is unformatted
    field_ref: Option<usize>,

    // Field attribute bits (authoritative on field starts, cascaded copies
    // elsewhere)
    numeric: bool,
    mdt: bool,
    protected: bool,
    display: bool,
    pen_selectable: bool,
    intensified: bool,
    extended: bool,

    // Extended highlighting
    underscore: bool,
    reverse: bool,
    blink: bool,

    colour: Colour,

    char_attrs: CharAttrSet,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ebcdic: 0x00,
            graphic: false,
            field_start: false,
            field_ref: None,
            numeric: false,
            mdt: false,
            protected: false,
            display: true,
            pen_selectable: false,
            intensified: false,
            extended: false,
            underscore: false,
            reverse: false,
            blink: false,
            colour: Colour::Green,
            char_attrs: CharAttrSet::default(),
        }
    }
}

impl Cell {
    pub fn ebcdic(&self) -> u8 {
        self.ebcdic
    }

    pub fn set_char(&mut self, ebcdic: u8) {
        self.ebcdic = ebcdic;
    }

    pub fn is_graphic(&self) -> bool {
        self.graphic
    }

    pub fn set_graphic(&mut self, ge: bool) {
        self.graphic = ge;
    }

    pub fn is_field_start(&self) -> bool {
        self.field_start
    }

    pub fn set_field_start(&mut self, fs: bool) {
        self.field_start = fs;
    }

    pub fn field_ref(&self) -> Option<usize> {
        self.field_ref
    }

    pub fn set_field_ref(&mut self, field: Option<usize>) {
        self.field_ref = field;
    }

    /// Protected + numeric on a field start means the cursor skips over the
    /// field instead of entering it
    pub fn is_auto_skip(&self) -> bool {
        self.protected && self.numeric
    }

    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    pub fn set_numeric(&mut self, num: bool) {
        self.numeric = num;
    }

    pub fn is_mdt_on(&self) -> bool {
        self.mdt
    }

    pub fn set_mdt(&mut self, mdt: bool) {
        self.mdt = mdt;
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    /// Whether input is rejected here: field-start cells never accept input
    /// regardless of their protected bit
    pub fn rejects_input(&self) -> bool {
        self.protected || self.field_start
    }

    pub fn set_protected(&mut self, prot: bool) {
        self.protected = prot;
    }

    pub fn is_display(&self) -> bool {
        self.display
    }

    pub fn set_display(&mut self, display: bool) {
        self.display = display;
    }

    pub fn is_pen_select(&self) -> bool {
        self.pen_selectable
    }

    pub fn set_pen_select(&mut self, pen: bool) {
        self.pen_selectable = pen;
    }

    pub fn is_intensified(&self) -> bool {
        self.intensified
    }

    pub fn set_intensified(&mut self, intens: bool) {
        self.intensified = intens;
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn set_extended(&mut self, ext: bool) {
        self.extended = ext;
    }

    pub fn is_underscore(&self) -> bool {
        self.underscore
    }

    pub fn set_underscore(&mut self, uscore: bool) {
        self.underscore = uscore;
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    pub fn is_blink(&self) -> bool {
        self.blink
    }

    pub fn set_blink(&mut self, blink: bool) {
        self.blink = blink;
    }

    pub fn colour(&self) -> Colour {
        self.colour
    }

    pub fn set_colour(&mut self, colour: Colour) {
        self.colour = colour;
    }

    pub fn has_char_attr(&self, attr: CharAttr) -> bool {
        self.char_attrs.has(attr)
    }

    pub fn set_char_attr(&mut self, attr: CharAttr, on: bool) {
        self.char_attrs.set(attr, on);
    }

    pub fn reset_char_attrs(&mut self) {
        self.char_attrs.clear();
    }

    /// Bulk attribute update used by the field cascade
    #[allow(clippy::too_many_arguments)]
    pub fn set_attrs(
        &mut self,
        protected: bool,
        mdt: bool,
        numeric: bool,
        pen_selectable: bool,
        blink: bool,
        display: bool,
        underscore: bool,
        reverse: bool,
        colour: Colour,
    ) {
        self.protected = protected;
        self.mdt = mdt;
        self.numeric = numeric;
        self.pen_selectable = pen_selectable;
        self.blink = blink;
        self.display = display;
        self.underscore = underscore;
        self.reverse = reverse;
        self.colour = colour;
    }

    /// Copy display content from another cell (insert/delete shifting within
    /// a field); field membership of the target is untouched
    pub fn copy_content(&mut self, other: &Cell) {
        self.ebcdic = other.ebcdic;
        self.graphic = other.graphic;
        self.colour = other.colour;
        self.underscore = other.underscore;
        self.reverse = other.reverse;
        self.blink = other.blink;
        self.char_attrs = other.char_attrs;
    }

    /// Reset to the cleared-screen state
    pub fn reset(&mut self) {
        *self = Cell::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colour_from_wire() {
        assert_eq!(Colour::from_wire(0xF1), Colour::Blue);
        assert_eq!(Colour::from_wire(0xF7), Colour::Neutral);
        assert_eq!(Colour::from_wire(0x02), Colour::Red);
    }

    #[test]
    fn test_field_default_colours() {
        assert_eq!(Colour::field_default(false, false), Colour::UnprotectedNormal);
        assert_eq!(Colour::field_default(true, false), Colour::ProtectedNormal);
        assert_eq!(Colour::field_default(false, true), Colour::UnprotectedIntensified);
        assert_eq!(Colour::field_default(true, true), Colour::ProtectedIntensified);
    }

    #[test]
    fn test_field_start_rejects_input() {
        let mut cell = Cell::default();
        assert!(!cell.rejects_input());
        cell.set_field_start(true);
        assert!(cell.rejects_input());
        assert!(!cell.is_protected());
        cell.set_field_start(false);
        cell.set_protected(true);
        assert!(cell.rejects_input());
    }

    #[test]
    fn test_auto_skip() {
        let mut cell = Cell::default();
        cell.set_protected(true);
        assert!(!cell.is_auto_skip());
        cell.set_numeric(true);
        assert!(cell.is_auto_skip());
    }

    #[test]
    fn test_char_attr_set() {
        let mut attrs = CharAttrSet::default();
        assert!(!attrs.has(CharAttr::Colour));
        attrs.set(CharAttr::Colour, true);
        attrs.set(CharAttr::Extended, true);
        assert!(attrs.has(CharAttr::Colour));
        assert!(attrs.has(CharAttr::Extended));
        attrs.clear();
        assert!(!attrs.has(CharAttr::Colour));
    }

    #[test]
    fn test_copy_content_preserves_field_membership() {
        let mut a = Cell::default();
        a.set_field_ref(Some(10));
        let mut b = Cell::default();
        b.set_char(0xC1);
        b.set_colour(Colour::Red);
        a.copy_content(&b);
        assert_eq!(a.ebcdic(), 0xC1);
        assert_eq!(a.colour(), Colour::Red);
        assert_eq!(a.field_ref(), Some(10));
    }
}
