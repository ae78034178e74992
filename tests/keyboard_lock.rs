//! Keyboard-lock discipline and the insert/overtype editing rules.

use tn3270r::error::InputError;
use tn3270r::keyboard::{AppFunction, Keyboard, KeyOutcome, KeyboardLock};
use tn3270r::lib3270::codes::*;
use tn3270r::lib3270::display::Display3270;

/// A screen with one input field at 10 and the next field at 20.
fn screen() -> Display3270 {
    let mut display = Display3270::new();
    display.set_field(10, 0x00, false);
    display.set_field(20, ATTR_PROTECTED, false);
    display.set_cursor(11);
    display
}

fn snapshot(display: &Display3270) -> Vec<u8> {
    (0..display.buffer_size()).map(|p| display.cell(p).ebcdic()).collect()
}

#[test]
fn aid_submission_enters_terminal_wait() {
    let mut kb = Keyboard::new();
    let mut display = screen();

    assert_eq!(kb.lock_state(), KeyboardLock::Unlocked);
    let outcome = kb.press(AppFunction::Enter, &mut display);
    assert!(matches!(outcome, KeyOutcome::Inbound(_)));
    assert_eq!(kb.lock_state(), KeyboardLock::TerminalWait);
}

/// While in TerminalWait no key other than Reset and the local functions
/// mutates the screen or produces outbound data.
#[test]
fn terminal_wait_drops_everything_else() {
    let mut kb = Keyboard::new();
    let mut display = screen();
    kb.press(AppFunction::Enter, &mut display);

    let before = snapshot(&display);
    let cursor_before = display.cursor_pos();

    for function in [
        AppFunction::Tab,
        AppFunction::Backtab,
        AppFunction::Home,
        AppFunction::Up,
        AppFunction::Down,
        AppFunction::EraseEOF,
        AppFunction::Delete,
        AppFunction::Backspace,
        AppFunction::F5,
        AppFunction::Clear,
        AppFunction::PA1,
        AppFunction::Enter,
    ] {
        let outcome = kb.press(function, &mut display);
        assert_eq!(outcome, KeyOutcome::Handled, "{function:?} leaked");
    }
    assert_eq!(kb.type_char('A', &mut display), Err(InputError::KeyboardLocked));

    assert_eq!(snapshot(&display), before);
    assert_eq!(display.cursor_pos(), cursor_before);
    assert_eq!(kb.lock_state(), KeyboardLock::TerminalWait);
}

#[test]
fn host_restore_reopens_input() {
    let mut kb = Keyboard::new();
    let mut display = screen();
    kb.press(AppFunction::Enter, &mut display);
    kb.unlock_from_host();

    assert!(kb.type_char('A', &mut display).is_ok());
    assert_ne!(display.cell(11).ebcdic(), 0x00);
}

/// Field 11..19 contains "AB" then nulls. Insert at position 12 shifts the
/// tail right and sets the MDT.
#[test]
fn insert_shifts_within_field() {
    let mut kb = Keyboard::new();
    let mut display = screen();

    kb.type_char('A', &mut display).unwrap();
    kb.type_char('B', &mut display).unwrap();
    display.set_cursor(12);

    kb.press(AppFunction::Insert, &mut display);
    assert!(kb.insert_mode());
    kb.type_char('X', &mut display).unwrap();

    let cp = tn3270r::codepage::CodePage::default();
    assert_eq!(display.cell(11).ebcdic(), cp.to_ebcdic('A'));
    assert_eq!(display.cell(12).ebcdic(), cp.to_ebcdic('X'));
    assert_eq!(display.cell(13).ebcdic(), cp.to_ebcdic('B'));
    assert_eq!(display.cell(14).ebcdic(), 0x00);
    assert!(display.cell(10).is_mdt_on());
}

/// A full field rejects the insert and nothing changes.
#[test]
fn insert_overflow_is_rejected_cleanly() {
    let mut kb = Keyboard::new();
    let mut display = screen();

    for pos in 11..20 {
        display.set_char(pos, 0xC1, false);
    }
    display.set_mdt(10, false);
    display.set_cursor(12);

    kb.press(AppFunction::Insert, &mut display);
    let before = snapshot(&display);

    assert_eq!(kb.type_char('X', &mut display), Err(InputError::InsertOverflow));
    assert_eq!(kb.last_error(), Some(InputError::InsertOverflow));

    // Screen untouched, keyboard still usable
    assert_eq!(snapshot(&display), before);
    assert_eq!(kb.lock_state(), KeyboardLock::Unlocked);
    assert!(!display.cell(10).is_mdt_on());
}

#[test]
fn typing_into_protected_field_is_rejected() {
    let mut kb = Keyboard::new();
    let mut display = screen();
    display.set_cursor(21); // inside the protected field

    assert_eq!(kb.type_char('A', &mut display), Err(InputError::InputIntoProtected));
    assert_eq!(kb.lock_state(), KeyboardLock::Unlocked);
}

#[test]
fn reset_does_not_break_terminal_wait() {
    let mut kb = Keyboard::new();
    let mut display = screen();
    kb.press(AppFunction::Enter, &mut display);

    kb.press(AppFunction::Reset, &mut display);
    assert_eq!(kb.lock_state(), KeyboardLock::TerminalWait);

    kb.unlock_from_host();
    kb.system_lock();
    kb.press(AppFunction::Reset, &mut display);
    assert_eq!(kb.lock_state(), KeyboardLock::Unlocked);
}

#[test]
fn clear_is_short_read_and_clears() {
    let mut kb = Keyboard::new();
    let mut display = screen();
    kb.type_char('A', &mut display).unwrap();

    match kb.press(AppFunction::Clear, &mut display) {
        KeyOutcome::Inbound(payload) => assert_eq!(payload, vec![AID_CLEAR]),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(display.is_unformatted());
}

#[test]
fn function_keys_carry_their_aids() {
    let cases = [
        (AppFunction::F1, AID_F1),
        (AppFunction::F10, AID_F10),
        (AppFunction::F13, AID_F13),
        (AppFunction::F24, AID_F24),
        (AppFunction::PA3, AID_PA3),
    ];
    for (function, aid) in cases {
        let mut kb = Keyboard::new();
        let mut display = screen();
        match kb.press(function, &mut display) {
            KeyOutcome::Inbound(payload) => assert_eq!(payload[0], aid, "{function:?}"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}

#[test]
fn motion_skips_field_attribute_positions() {
    let mut kb = Keyboard::new();
    let mut display = screen();

    // Tab from inside the field wraps to the same field (the only input
    // field) landing after the attribute byte
    kb.press(AppFunction::Tab, &mut display);
    assert_eq!(display.cursor_pos(), 11);
    assert!(!display.cell(display.cursor_pos()).is_field_start());

    kb.press(AppFunction::Home, &mut display);
    assert_eq!(display.cursor_pos(), 11);
}
