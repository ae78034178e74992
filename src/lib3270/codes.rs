//! TN3270 protocol constants and codes
//!
//! Command codes, order codes, AID (Attention Identifier) keys, WCC bits and
//! attribute type bytes as specified in RFC 1576/2355 and the IBM 3270 Data
//! Stream Programmer's Reference (GA23-0059).
//!
//! Commands arrive in one of two encodings: the Telnet encoding used by most
//! hosts, and the channel (CCW) encoding some gateways pass through verbatim.
//! Both are accepted everywhere a command byte is read.

/// 3270 Command Codes (Telnet encoding)
pub const CMD_W: u8 = 0xF1;    // Write
pub const CMD_EW: u8 = 0xF5;   // Erase/Write
pub const CMD_EWA: u8 = 0x7E;  // Erase/Write Alternate
pub const CMD_RB: u8 = 0xF2;   // Read Buffer
pub const CMD_RM: u8 = 0xF6;   // Read Modified
pub const CMD_EAU: u8 = 0x6F;  // Erase All Unprotected
pub const CMD_WSF: u8 = 0xF3;  // Write Structured Field

/// 3270 Command Codes (CCW encoding)
pub const CMD_CCW_W: u8 = 0x01;
pub const CMD_CCW_EW: u8 = 0x05;
pub const CMD_CCW_EWA: u8 = 0x0D;
pub const CMD_CCW_RB: u8 = 0x02;
pub const CMD_CCW_RM: u8 = 0x06;
pub const CMD_CCW_EAU: u8 = 0x0F;
pub const CMD_CCW_WSF: u8 = 0x11;

/// 3270 Order Codes
/// These are embedded in the data stream to control formatting
pub const ORDER_SF: u8 = 0x1D;   // Start Field
pub const ORDER_SFE: u8 = 0x29;  // Start Field Extended
pub const ORDER_SBA: u8 = 0x11;  // Set Buffer Address
pub const ORDER_SA: u8 = 0x28;   // Set Attribute
pub const ORDER_MF: u8 = 0x2C;   // Modify Field
pub const ORDER_IC: u8 = 0x13;   // Insert Cursor
pub const ORDER_PT: u8 = 0x05;   // Program Tab
pub const ORDER_RA: u8 = 0x3C;   // Repeat to Address
pub const ORDER_EUA: u8 = 0x12;  // Erase Unprotected to Address
pub const ORDER_GE: u8 = 0x08;   // Graphic Escape

/// Reserved EBCDIC characters
pub const CHAR_NULL: u8 = 0x00;
pub const CHAR_SPACE: u8 = 0x40;

/// Write Control Character (WCC) bits
pub const WCC_RESET: u8 = 0x40;      // Reset bit
pub const WCC_ALARM: u8 = 0x04;      // Sound alarm
pub const WCC_RESTORE: u8 = 0x02;    // Restore (unlock) keyboard
pub const WCC_RESET_MDT: u8 = 0x01;  // Reset MDT bits

/// Write Structured Field subcommands
pub const WSF_RESET_PARTITION: u8 = 0x00;
pub const WSF_READ_PARTITION: u8 = 0x01;
pub const WSF_OUTBOUND_3270DS: u8 = 0x40;

/// Inbound structured field reply ids
pub const SF_QUERY_REPLY: u8 = 0x81;

pub const QR_SUMMARY: u8 = 0x80;
pub const QR_USABLE_AREA: u8 = 0x81;
pub const QR_ALPHANUMERIC_PARTS: u8 = 0x84;
pub const QR_CHARSETS: u8 = 0x85;     // advertises Graphic Escape support
pub const QR_COLOUR: u8 = 0x86;
pub const QR_HIGHLIGHT: u8 = 0x87;
pub const QR_REPLY_MODES: u8 = 0x88;
pub const QR_DDM: u8 = 0x95;
pub const QR_RPQ_NAMES: u8 = 0xA1;
pub const QR_IMPLICIT_PARTS: u8 = 0xA6;

/// Extended attribute type bytes (SFE / SA / MF pairs)
pub const XA_DEFAULT: u8 = 0x00;       // All character attributes to default
pub const XA_3270: u8 = 0xC0;          // 3270 field attribute
pub const XA_VALIDATION: u8 = 0xC1;    // Field validation
pub const XA_OUTLINE: u8 = 0xC2;       // Field outlining
pub const XA_HIGHLIGHT: u8 = 0x41;     // Highlighting
pub const XA_FG_COLOUR: u8 = 0x42;     // Foreground colour
pub const XA_CHARSET: u8 = 0x43;       // Character set
pub const XA_BG_COLOUR: u8 = 0x45;     // Background colour
pub const XA_TRANSPARENCY: u8 = 0x46;  // Transparency

/// Highlight attribute values
pub const HILITE_DEFAULT: u8 = 0x00;
pub const HILITE_NORMAL: u8 = 0xF0;
pub const HILITE_BLINK: u8 = 0xF1;
pub const HILITE_REVERSE: u8 = 0xF2;
pub const HILITE_USCORE: u8 = 0xF4;

/// Field attribute byte bits (SF order operand)
pub const ATTR_PROTECTED: u8 = 0x20;  // Bit 5: protected field
pub const ATTR_NUMERIC: u8 = 0x10;    // Bit 4: numeric field
pub const ATTR_DISPLAY: u8 = 0x0C;    // Bits 2-3: display/pen combination
pub const ATTR_MDT: u8 = 0x01;        // Bit 0: Modified Data Tag

/// AID (Attention Identifier) keys
pub const AID_NO_AID: u8 = 0x60;
pub const AID_ENTER: u8 = 0x7D;
pub const AID_SF: u8 = 0x88;  // structured field / SysReq
pub const AID_CLEAR: u8 = 0x6D;

pub const AID_F1: u8 = 0xF1;
pub const AID_F2: u8 = 0xF2;
pub const AID_F3: u8 = 0xF3;
pub const AID_F4: u8 = 0xF4;
pub const AID_F5: u8 = 0xF5;
pub const AID_F6: u8 = 0xF6;
pub const AID_F7: u8 = 0xF7;
pub const AID_F8: u8 = 0xF8;
pub const AID_F9: u8 = 0xF9;
pub const AID_F10: u8 = 0x7A;
pub const AID_F11: u8 = 0x7B;
pub const AID_F12: u8 = 0x7C;
pub const AID_F13: u8 = 0xC1;
pub const AID_F14: u8 = 0xC2;
pub const AID_F15: u8 = 0xC3;
pub const AID_F16: u8 = 0xC4;
pub const AID_F17: u8 = 0xC5;
pub const AID_F18: u8 = 0xC6;
pub const AID_F19: u8 = 0xC7;
pub const AID_F20: u8 = 0xC8;
pub const AID_F21: u8 = 0xC9;
pub const AID_F22: u8 = 0x4A;
pub const AID_F23: u8 = 0x4B;
pub const AID_F24: u8 = 0x4C;

pub const AID_PA1: u8 = 0x6C;
pub const AID_PA2: u8 = 0x6E;
pub const AID_PA3: u8 = 0x6B;

/// TN3270E subnegotiation operations (RFC 2355)
pub const TN3270E_ASSOCIATE: u8 = 0x00;
pub const TN3270E_CONNECT: u8 = 0x01;
pub const TN3270E_DEVICE_TYPE: u8 = 0x02;
pub const TN3270E_FUNCTIONS: u8 = 0x03;
pub const TN3270E_IS: u8 = 0x04;
pub const TN3270E_REASON: u8 = 0x05;
pub const TN3270E_REJECT: u8 = 0x06;
pub const TN3270E_REQUEST: u8 = 0x07;
pub const TN3270E_SEND: u8 = 0x08;

/// TN3270E header data types
pub const TN3270E_DATATYPE_3270_DATA: u8 = 0x00;
pub const TN3270E_DATATYPE_SCS_DATA: u8 = 0x01;
pub const TN3270E_DATATYPE_RESPONSE: u8 = 0x02;
pub const TN3270E_DATATYPE_BIND_IMAGE: u8 = 0x03;
pub const TN3270E_DATATYPE_UNBIND: u8 = 0x04;
pub const TN3270E_DATATYPE_NVT_DATA: u8 = 0x05;

/// Enum representation of 3270 command codes
///
/// `from_u8` accepts either wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Write,
    EraseWrite,
    EraseWriteAlternate,
    ReadBuffer,
    ReadModified,
    EraseAllUnprotected,
    WriteStructuredField,
}

impl CommandCode {
    /// Convert a byte value to a CommandCode enum
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CMD_W | CMD_CCW_W => Some(Self::Write),
            CMD_EW | CMD_CCW_EW => Some(Self::EraseWrite),
            CMD_EWA | CMD_CCW_EWA => Some(Self::EraseWriteAlternate),
            CMD_RB | CMD_CCW_RB => Some(Self::ReadBuffer),
            CMD_RM | CMD_CCW_RM => Some(Self::ReadModified),
            CMD_EAU | CMD_CCW_EAU => Some(Self::EraseAllUnprotected),
            CMD_WSF | CMD_CCW_WSF => Some(Self::WriteStructuredField),
            _ => None,
        }
    }

    /// Canonical (Telnet encoding) byte value
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Write => CMD_W,
            Self::EraseWrite => CMD_EW,
            Self::EraseWriteAlternate => CMD_EWA,
            Self::ReadBuffer => CMD_RB,
            Self::ReadModified => CMD_RM,
            Self::EraseAllUnprotected => CMD_EAU,
            Self::WriteStructuredField => CMD_WSF,
        }
    }
}

/// Enum representation of 3270 order codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCode {
    StartField,
    StartFieldExtended,
    SetBufferAddress,
    SetAttribute,
    ModifyField,
    InsertCursor,
    ProgramTab,
    RepeatToAddress,
    EraseUnprotectedToAddress,
    GraphicEscape,
}

impl OrderCode {
    /// Convert a byte value to an OrderCode enum
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            ORDER_SF => Some(Self::StartField),
            ORDER_SFE => Some(Self::StartFieldExtended),
            ORDER_SBA => Some(Self::SetBufferAddress),
            ORDER_SA => Some(Self::SetAttribute),
            ORDER_MF => Some(Self::ModifyField),
            ORDER_IC => Some(Self::InsertCursor),
            ORDER_PT => Some(Self::ProgramTab),
            ORDER_RA => Some(Self::RepeatToAddress),
            ORDER_EUA => Some(Self::EraseUnprotectedToAddress),
            ORDER_GE => Some(Self::GraphicEscape),
            _ => None,
        }
    }

    /// Convert OrderCode enum to byte value
    pub fn to_u8(self) -> u8 {
        match self {
            Self::StartField => ORDER_SF,
            Self::StartFieldExtended => ORDER_SFE,
            Self::SetBufferAddress => ORDER_SBA,
            Self::SetAttribute => ORDER_SA,
            Self::ModifyField => ORDER_MF,
            Self::InsertCursor => ORDER_IC,
            Self::ProgramTab => ORDER_PT,
            Self::RepeatToAddress => ORDER_RA,
            Self::EraseUnprotectedToAddress => ORDER_EUA,
            Self::GraphicEscape => ORDER_GE,
        }
    }
}

/// Enum representation of AID keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AidKey {
    NoAid,
    Enter,
    Clear,
    PA1,
    PA2,
    PA3,
    PF1, PF2, PF3, PF4, PF5, PF6,
    PF7, PF8, PF9, PF10, PF11, PF12,
    PF13, PF14, PF15, PF16, PF17, PF18,
    PF19, PF20, PF21, PF22, PF23, PF24,
    StructuredField,
}

impl AidKey {
    /// Convert a byte value to an AidKey enum
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            AID_NO_AID => Some(Self::NoAid),
            AID_ENTER => Some(Self::Enter),
            AID_CLEAR => Some(Self::Clear),
            AID_PA1 => Some(Self::PA1),
            AID_PA2 => Some(Self::PA2),
            AID_PA3 => Some(Self::PA3),
            AID_F1 => Some(Self::PF1),
            AID_F2 => Some(Self::PF2),
            AID_F3 => Some(Self::PF3),
            AID_F4 => Some(Self::PF4),
            AID_F5 => Some(Self::PF5),
            AID_F6 => Some(Self::PF6),
            AID_F7 => Some(Self::PF7),
            AID_F8 => Some(Self::PF8),
            AID_F9 => Some(Self::PF9),
            AID_F10 => Some(Self::PF10),
            AID_F11 => Some(Self::PF11),
            AID_F12 => Some(Self::PF12),
            AID_F13 => Some(Self::PF13),
            AID_F14 => Some(Self::PF14),
            AID_F15 => Some(Self::PF15),
            AID_F16 => Some(Self::PF16),
            AID_F17 => Some(Self::PF17),
            AID_F18 => Some(Self::PF18),
            AID_F19 => Some(Self::PF19),
            AID_F20 => Some(Self::PF20),
            AID_F21 => Some(Self::PF21),
            AID_F22 => Some(Self::PF22),
            AID_F23 => Some(Self::PF23),
            AID_F24 => Some(Self::PF24),
            AID_SF => Some(Self::StructuredField),
            _ => None,
        }
    }

    /// Convert AidKey enum to byte value
    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoAid => AID_NO_AID,
            Self::Enter => AID_ENTER,
            Self::Clear => AID_CLEAR,
            Self::PA1 => AID_PA1,
            Self::PA2 => AID_PA2,
            Self::PA3 => AID_PA3,
            Self::PF1 => AID_F1,
            Self::PF2 => AID_F2,
            Self::PF3 => AID_F3,
            Self::PF4 => AID_F4,
            Self::PF5 => AID_F5,
            Self::PF6 => AID_F6,
            Self::PF7 => AID_F7,
            Self::PF8 => AID_F8,
            Self::PF9 => AID_F9,
            Self::PF10 => AID_F10,
            Self::PF11 => AID_F11,
            Self::PF12 => AID_F12,
            Self::PF13 => AID_F13,
            Self::PF14 => AID_F14,
            Self::PF15 => AID_F15,
            Self::PF16 => AID_F16,
            Self::PF17 => AID_F17,
            Self::PF18 => AID_F18,
            Self::PF19 => AID_F19,
            Self::PF20 => AID_F20,
            Self::PF21 => AID_F21,
            Self::PF22 => AID_F22,
            Self::PF23 => AID_F23,
            Self::PF24 => AID_F24,
            Self::StructuredField => AID_SF,
        }
    }

    /// Short-read AIDs return only the AID byte, no cursor address or fields
    pub fn is_short_read(self) -> bool {
        matches!(self, Self::Clear | Self::PA1 | Self::PA2 | Self::PA3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_code_both_encodings() {
        assert_eq!(CommandCode::from_u8(CMD_EW), Some(CommandCode::EraseWrite));
        assert_eq!(CommandCode::from_u8(CMD_CCW_EW), Some(CommandCode::EraseWrite));
        assert_eq!(CommandCode::from_u8(CMD_EWA), Some(CommandCode::EraseWriteAlternate));
        assert_eq!(CommandCode::from_u8(CMD_CCW_EWA), Some(CommandCode::EraseWriteAlternate));
        assert_eq!(CommandCode::from_u8(0xAB), None);
    }

    #[test]
    fn test_order_code_conversion() {
        assert_eq!(OrderCode::from_u8(ORDER_SF), Some(OrderCode::StartField));
        assert_eq!(OrderCode::StartField.to_u8(), ORDER_SF);
        assert_eq!(OrderCode::from_u8(0xFF), None);
    }

    #[test]
    fn test_aid_key_conversion() {
        assert_eq!(AidKey::from_u8(AID_ENTER), Some(AidKey::Enter));
        assert_eq!(AidKey::Enter.to_u8(), AID_ENTER);
        assert_eq!(AidKey::from_u8(AID_F22), Some(AidKey::PF22));
        assert_eq!(AidKey::PF22.to_u8(), 0x4A);
    }

    #[test]
    fn test_short_read_aids() {
        assert!(AidKey::Clear.is_short_read());
        assert!(AidKey::PA1.is_short_read());
        assert!(AidKey::PA2.is_short_read());
        assert!(AidKey::PA3.is_short_read());
        assert!(!AidKey::Enter.is_short_read());
        assert!(!AidKey::PF3.is_short_read());
    }
}
