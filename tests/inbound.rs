//! Inbound (terminal to host) serialisation: modified-field reads, Read
//! Buffer and 0xFF doubling.

use tn3270r::codepage::CodePage;
use tn3270r::lib3270::codes::*;
use tn3270r::lib3270::display::{addressing, Display3270};

fn ebcdic(s: &str) -> Vec<u8> {
    let cp = CodePage::default();
    s.chars().map(|c| cp.to_ebcdic(c)).collect()
}

/// One input field at 10; the user types "ABC" and presses Enter. The
/// payload is AID, cursor address, then SBA + field address + data.
#[test]
fn modified_field_read_layout() {
    let mut display = Display3270::new();
    display.set_field(10, 0x00, false);
    display.set_field(20, ATTR_PROTECTED, false);

    display.set_cursor(11);
    for ch in ['A', 'B', 'C'] {
        display.insert_char(ch, false).unwrap();
    }
    assert_eq!(display.cursor_pos(), 14);

    let payload = display.process_aid(AidKey::Enter, false);

    let (c1, c2) = addressing::encode_address(14, 1920);
    let (f1, f2) = addressing::encode_address(11, 1920);
    let abc = ebcdic("ABC");

    let mut expected = vec![AID_ENTER, c1, c2, ORDER_SBA, f1, f2];
    expected.extend_from_slice(&abc);
    assert_eq!(payload, expected);
}

#[test]
fn unmodified_fields_are_not_read() {
    let mut display = Display3270::new();
    display.set_field(10, 0x00, false);
    display.set_field(20, 0x00, false);
    display.set_field(30, ATTR_PROTECTED, false);

    // Only the second field is touched
    display.set_cursor(21);
    display.insert_char('X', false).unwrap();

    let payload = display.process_aid(AidKey::Enter, false);

    let (f1, f2) = addressing::encode_address(21, 1920);
    assert_eq!(&payload[3..6], &[ORDER_SBA, f1, f2]);
    // Exactly one SBA in the stream
    assert_eq!(payload.iter().filter(|&&b| b == ORDER_SBA).count(), 1);
}

#[test]
fn nulls_are_skipped_spaces_are_not() {
    let mut display = Display3270::new();
    display.set_field(10, 0x00, false);
    display.set_field(20, ATTR_PROTECTED, false);

    display.set_char(11, 0xC1, false);
    display.set_char(12, CHAR_SPACE, false);
    display.set_char(13, 0xC2, false);
    // 14..19 stay null
    display.set_mdt(11, true);

    let payload = display.process_aid(AidKey::Enter, false);
    let tail = &payload[6..];
    assert_eq!(tail, &[0xC1, CHAR_SPACE, 0xC2]);
}

#[test]
fn unformatted_screen_returns_all_content() {
    let mut display = Display3270::new();
    display.set_char(0, 0xC1, false);
    display.set_char(100, 0xC2, false);

    let payload = display.process_aid(AidKey::Enter, false);
    // AID + cursor address + both bytes, no SBA
    assert_eq!(payload.len(), 5);
    assert_eq!(&payload[3..], &[0xC1, 0xC2]);
}

#[test]
fn short_read_is_aid_only() {
    let mut display = Display3270::new();
    display.set_field(10, 0x00, false);
    display.set_cursor(11);
    display.insert_char('A', false).unwrap();

    for (aid, byte) in [
        (AidKey::PA1, AID_PA1),
        (AidKey::PA2, AID_PA2),
        (AidKey::PA3, AID_PA3),
    ] {
        let payload = display.process_aid(aid, true);
        assert_eq!(payload, vec![byte]);
    }
}

/// On a 14-bit screen a cursor address with an 0xFF byte is doubled on the
/// wire; nothing else changes.
#[test]
fn address_ff_bytes_are_doubled() {
    let mut display = Display3270::with_size(62, 160); // 9920 cells, 14-bit
    display.set_cursor(0x12FF);

    let payload = display.process_aid(AidKey::Enter, false);
    assert_eq!(&payload[..4], &[AID_ENTER, 0x12, 0xFF, 0xFF]);
}

#[test]
fn read_buffer_reconstructs_field_attributes() {
    let mut display = Display3270::new();
    // Protected field with MDT set
    display.set_field(5, ATTR_PROTECTED | ATTR_MDT, false);
    display.set_char(6, 0xC8, false);

    let mut buffer = Vec::new();
    display.read_buffer(&mut buffer);

    // AID (none yet) + cursor + one cell per position
    assert_eq!(buffer[0], AID_NO_AID);
    // Field start becomes SF + attribute byte; index 0b100001 in the
    // 12-bit table is 0x61
    let sf_at = 3 + 5;
    assert_eq!(buffer[sf_at], ORDER_SF);
    assert_eq!(buffer[sf_at + 1], 0x61);
    assert_eq!(buffer[sf_at + 2], 0xC8);
    // Every data cell is present: 3 header bytes + 1920 cells + 1 extra for
    // the SF order byte
    assert_eq!(buffer.len(), 3 + 1920 + 1);
}

#[test]
fn read_buffer_preserves_aid_after_enter() {
    let mut display = Display3270::new();
    display.set_field(10, 0x00, false);
    display.set_cursor(11);
    display.insert_char('A', false).unwrap();
    display.process_aid(AidKey::Enter, false);

    let mut buffer = Vec::new();
    display.read_buffer(&mut buffer);
    assert_eq!(buffer[0], AID_ENTER);
}

#[test]
fn clear_aid_clears_screen_and_homes_cursor() {
    let mut display = Display3270::new();
    display.set_field(10, 0x00, false);
    display.set_cursor(11);
    display.insert_char('A', false).unwrap();

    let payload = display.process_aid(AidKey::Clear, true);
    assert_eq!(payload, vec![AID_CLEAR]);
    assert!(display.is_unformatted());
    assert_eq!(display.cursor_pos(), 0);
    assert_eq!(display.cell(11).ebcdic(), 0x00);
}
