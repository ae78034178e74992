//! Keyboard input policy
//!
//! Translates user-facing functions into screen mutations and inbound
//! submissions, and enforces the 3270 keyboard-lock discipline: an AID
//! submission locks the keyboard until the host restores it (X Clock), and a
//! rejected action or host condition shows X System until an explicit Reset.
//!
//! The function registry is the single source of truth for every user-facing
//! function and the contexts it may be bound in; keyboard themes are plain
//! maps from key-sequence tokens to function names.

use std::collections::HashMap;

use log::debug;
use once_cell::sync::Lazy;

use crate::error::{InputError, InputResult};
use crate::lib3270::codes::AidKey;
use crate::lib3270::display::Display3270;

/// Keyboard lock states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyboardLock {
    /// Input accepted
    #[default]
    Unlocked,
    /// X System: unlocked only by an explicit Reset
    SystemLock,
    /// X Clock: unlocked when the host replies with keyboard-restore
    TerminalWait,
}

/// Contexts a function may be invoked from, as a bit set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contexts(u8);

impl Contexts {
    pub const KEYBOARD: Contexts = Contexts(0x01);
    pub const MENU: Contexts = Contexts(0x02);
    pub const TOOLBAR: Contexts = Contexts(0x04);
    pub const SCRIPT: Contexts = Contexts(0x08);
    pub const TOUCH: Contexts = Contexts(0x10);

    pub const fn union(self, other: Contexts) -> Contexts {
        Contexts(self.0 | other.0)
    }

    pub fn contains(self, other: Contexts) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Every user-facing function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppFunction {
    Enter,
    Reset,
    Up,
    Down,
    Left,
    Right,
    Backspace,
    Tab,
    Backtab,
    NewLine,
    Home,
    EndLine,
    EraseEOF,
    Insert,
    Delete,
    F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12,
    F13, F14, F15, F16, F17, F18, F19, F20, F21, F22, F23, F24,
    Attn,
    PA1,
    PA2,
    PA3,
    Clear,
    ToggleRuler,
    Copy,
    Paste,
    Info,
    Fields,
    DumpScreen,
}

impl AppFunction {
    /// The AID this function submits, if it is an attention key
    pub fn aid(self) -> Option<AidKey> {
        match self {
            Self::Enter => Some(AidKey::Enter),
            Self::Clear => Some(AidKey::Clear),
            Self::PA1 => Some(AidKey::PA1),
            Self::PA2 => Some(AidKey::PA2),
            Self::PA3 => Some(AidKey::PA3),
            Self::F1 => Some(AidKey::PF1),
            Self::F2 => Some(AidKey::PF2),
            Self::F3 => Some(AidKey::PF3),
            Self::F4 => Some(AidKey::PF4),
            Self::F5 => Some(AidKey::PF5),
            Self::F6 => Some(AidKey::PF6),
            Self::F7 => Some(AidKey::PF7),
            Self::F8 => Some(AidKey::PF8),
            Self::F9 => Some(AidKey::PF9),
            Self::F10 => Some(AidKey::PF10),
            Self::F11 => Some(AidKey::PF11),
            Self::F12 => Some(AidKey::PF12),
            Self::F13 => Some(AidKey::PF13),
            Self::F14 => Some(AidKey::PF14),
            Self::F15 => Some(AidKey::PF15),
            Self::F16 => Some(AidKey::PF16),
            Self::F17 => Some(AidKey::PF17),
            Self::F18 => Some(AidKey::PF18),
            Self::F19 => Some(AidKey::PF19),
            Self::F20 => Some(AidKey::PF20),
            Self::F21 => Some(AidKey::PF21),
            Self::F22 => Some(AidKey::PF22),
            Self::F23 => Some(AidKey::PF23),
            Self::F24 => Some(AidKey::PF24),
            _ => None,
        }
    }

    /// Functions usable while the keyboard is locked
    pub fn allowed_while_locked(self) -> bool {
        matches!(
            self,
            Self::Reset | Self::Copy | Self::Info | Self::Fields | Self::ToggleRuler
        )
    }
}

/// Registry entry: the function, its name, contexts and description
#[derive(Debug, Clone, Copy)]
pub struct FunctionInfo {
    pub function: AppFunction,
    pub name: &'static str,
    pub contexts: Contexts,
    pub description: &'static str,
}

const KB: Contexts = Contexts::KEYBOARD;
const KB_MENU: Contexts = Contexts::KEYBOARD.union(Contexts::MENU);
const KB_MENU_TB: Contexts = KB_MENU.union(Contexts::TOOLBAR);

static REGISTRY: Lazy<Vec<FunctionInfo>> = Lazy::new(|| {
    use AppFunction::*;
    vec![
        FunctionInfo { function: Enter, name: "Enter", contexts: KB, description: "Send the Enter key" },
        FunctionInfo { function: Reset, name: "Reset", contexts: KB, description: "Reset the keyboard" },
        FunctionInfo { function: Up, name: "Up", contexts: KB, description: "Move cursor up" },
        FunctionInfo { function: Down, name: "Down", contexts: KB, description: "Move cursor down" },
        FunctionInfo { function: Left, name: "Left", contexts: KB, description: "Move cursor left" },
        FunctionInfo { function: Right, name: "Right", contexts: KB, description: "Move cursor right" },
        FunctionInfo { function: Backspace, name: "Backspace", contexts: KB, description: "Delete character to the left" },
        FunctionInfo { function: Tab, name: "Tab", contexts: KB, description: "Move to next field" },
        FunctionInfo { function: Backtab, name: "Backtab", contexts: KB, description: "Move to previous field" },
        FunctionInfo { function: NewLine, name: "NewLine", contexts: KB, description: "Move to the first field on the next line" },
        FunctionInfo { function: Home, name: "Home", contexts: KB, description: "Move to the first field on screen" },
        FunctionInfo { function: EndLine, name: "EndLine", contexts: KB, description: "Move to the end of the field text" },
        FunctionInfo { function: EraseEOF, name: "EraseEOF", contexts: KB, description: "Erase to end of field" },
        FunctionInfo { function: Insert, name: "Insert", contexts: KB, description: "Toggle insert mode" },
        FunctionInfo { function: Delete, name: "Delete", contexts: KB, description: "Delete character at cursor" },
        FunctionInfo { function: F1, name: "F1", contexts: KB, description: "Function key 1" },
        FunctionInfo { function: F2, name: "F2", contexts: KB, description: "Function key 2" },
        FunctionInfo { function: F3, name: "F3", contexts: KB, description: "Function key 3" },
        FunctionInfo { function: F4, name: "F4", contexts: KB, description: "Function key 4" },
        FunctionInfo { function: F5, name: "F5", contexts: KB, description: "Function key 5" },
        FunctionInfo { function: F6, name: "F6", contexts: KB, description: "Function key 6" },
        FunctionInfo { function: F7, name: "F7", contexts: KB, description: "Function key 7" },
        FunctionInfo { function: F8, name: "F8", contexts: KB, description: "Function key 8" },
        FunctionInfo { function: F9, name: "F9", contexts: KB, description: "Function key 9" },
        FunctionInfo { function: F10, name: "F10", contexts: KB, description: "Function key 10" },
        FunctionInfo { function: F11, name: "F11", contexts: KB, description: "Function key 11" },
        FunctionInfo { function: F12, name: "F12", contexts: KB, description: "Function key 12" },
        FunctionInfo { function: F13, name: "F13", contexts: KB, description: "Function key 13" },
        FunctionInfo { function: F14, name: "F14", contexts: KB, description: "Function key 14" },
        FunctionInfo { function: F15, name: "F15", contexts: KB, description: "Function key 15" },
        FunctionInfo { function: F16, name: "F16", contexts: KB, description: "Function key 16" },
        FunctionInfo { function: F17, name: "F17", contexts: KB, description: "Function key 17" },
        FunctionInfo { function: F18, name: "F18", contexts: KB, description: "Function key 18" },
        FunctionInfo { function: F19, name: "F19", contexts: KB, description: "Function key 19" },
        FunctionInfo { function: F20, name: "F20", contexts: KB, description: "Function key 20" },
        FunctionInfo { function: F21, name: "F21", contexts: KB, description: "Function key 21" },
        FunctionInfo { function: F22, name: "F22", contexts: KB, description: "Function key 22" },
        FunctionInfo { function: F23, name: "F23", contexts: KB, description: "Function key 23" },
        FunctionInfo { function: F24, name: "F24", contexts: KB, description: "Function key 24" },
        FunctionInfo { function: Attn, name: "Attn", contexts: KB, description: "Attention key" },
        FunctionInfo { function: PA1, name: "PA1", contexts: KB, description: "Program Attention 1" },
        FunctionInfo { function: PA2, name: "PA2", contexts: KB, description: "Program Attention 2" },
        FunctionInfo { function: PA3, name: "PA3", contexts: KB, description: "Program Attention 3" },
        FunctionInfo { function: Clear, name: "Clear", contexts: KB, description: "Clear the screen" },
        FunctionInfo { function: ToggleRuler, name: "ToggleRuler", contexts: KB_MENU, description: "Toggle the ruler display" },
        FunctionInfo { function: Copy, name: "Copy", contexts: KB_MENU_TB, description: "Copy selection" },
        FunctionInfo { function: Paste, name: "Paste", contexts: KB_MENU_TB, description: "Paste from clipboard" },
        FunctionInfo { function: Info, name: "Info", contexts: KB_MENU, description: "Show cell information" },
        FunctionInfo { function: Fields, name: "Fields", contexts: KB_MENU, description: "Show field list" },
        FunctionInfo { function: DumpScreen, name: "DumpScreen", contexts: KB_MENU, description: "Dump the screen buffer" },
    ]
});

/// The function registry: name to function with allowed contexts
pub struct FunctionRegistry;

impl FunctionRegistry {
    pub fn all() -> &'static [FunctionInfo] {
        &REGISTRY
    }

    pub fn lookup(name: &str) -> Option<&'static FunctionInfo> {
        REGISTRY.iter().find(|f| f.name == name)
    }

    /// Names of the functions available in a context (populates binding
    /// editors, menus and toolbars)
    pub fn names_for(context: Contexts) -> Vec<&'static str> {
        REGISTRY
            .iter()
            .filter(|f| f.contexts.contains(context))
            .map(|f| f.name)
            .collect()
    }
}

/// Raw keys as the windowing collaborator reports them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawKey {
    LeftCtrl,
    RightCtrl,
    Other(String),
}

/// A press or release event feeding the sequence capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    Press(RawKey),
    Release(RawKey),
}

/// Turns raw key events into binding tokens
///
/// Left and right Ctrl are distinct binding targets: a Ctrl pressed and
/// released on its own yields `LCtrl` or `RCtrl`. Combining another key
/// before release collapses the chord to a plain `Ctrl+X` token.
#[derive(Debug, Default)]
pub struct SequenceCapture {
    held_ctrl: Option<RawKey>,
}

impl SequenceCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed an event; returns the completed binding token, if any
    pub fn event(&mut self, event: RawEvent) -> Option<String> {
        match event {
            RawEvent::Press(key @ (RawKey::LeftCtrl | RawKey::RightCtrl)) => {
                self.held_ctrl = Some(key);
                None
            }
            RawEvent::Release(RawKey::LeftCtrl) => {
                if self.held_ctrl.take() == Some(RawKey::LeftCtrl) {
                    Some("LCtrl".to_string())
                } else {
                    None
                }
            }
            RawEvent::Release(RawKey::RightCtrl) => {
                if self.held_ctrl.take() == Some(RawKey::RightCtrl) {
                    Some("RCtrl".to_string())
                } else {
                    None
                }
            }
            RawEvent::Press(RawKey::Other(key)) => {
                if self.held_ctrl.is_some() {
                    // The chord collapses; the eventual Ctrl release emits
                    // nothing further
                    self.held_ctrl = None;
                    Some(format!("Ctrl+{key}"))
                } else {
                    Some(key)
                }
            }
            RawEvent::Release(RawKey::Other(_)) => None,
        }
    }
}

/// What pressing a function produced
#[derive(Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Screen or mode changed locally, nothing to transmit
    Handled,
    /// An inbound frame to transmit to the host
    Inbound(Vec<u8>),
    /// Telnet-level attention (IAC IP)
    Attention,
    /// The rendering collaborator owns this function (Copy, Info, ...)
    Local(AppFunction),
}

/// Keyboard state machine and function router
#[derive(Debug, Default)]
pub struct Keyboard {
    lock: KeyboardLock,
    insert_mode: bool,
    /// Last rejected action, surfaced as a transient X System indicator
    last_error: Option<InputError>,
    /// Key-sequence token to function name, from the active keyboard theme
    bindings: HashMap<String, String>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_state(&self) -> KeyboardLock {
        self.lock
    }

    pub fn insert_mode(&self) -> bool {
        self.insert_mode
    }

    pub fn last_error(&self) -> Option<InputError> {
        self.last_error
    }

    /// Replace the active bindings from a keyboard theme
    pub fn set_bindings(&mut self, bindings: HashMap<String, String>) {
        self.bindings = bindings;
    }

    /// Resolve a key-sequence token to a function via the active theme
    pub fn function_for(&self, sequence: &str) -> Option<AppFunction> {
        let name = self.bindings.get(sequence)?;
        FunctionRegistry::lookup(name).map(|info| info.function)
    }

    /// Host restored the keyboard (WCC restore / EAU)
    pub fn unlock_from_host(&mut self) {
        if self.lock == KeyboardLock::TerminalWait {
            self.lock = KeyboardLock::Unlocked;
        }
    }

    /// Host raised an error condition (X System until Reset)
    pub fn system_lock(&mut self) {
        self.lock = KeyboardLock::SystemLock;
    }

    /// Session ended: drop lock and transient state
    pub fn reset_state(&mut self) {
        self.lock = KeyboardLock::Unlocked;
        self.insert_mode = false;
        self.last_error = None;
    }

    /// Type a printable character at the cursor
    pub fn type_char(&mut self, ch: char, display: &mut Display3270) -> InputResult<()> {
        if self.lock != KeyboardLock::Unlocked {
            debug!("key '{ch}' dropped: keyboard locked");
            return Err(InputError::KeyboardLocked);
        }

        match display.insert_char(ch, self.insert_mode) {
            Ok(()) => {
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                // Rejection surfaces an indicator but leaves the keyboard
                // usable and the screen untouched
                self.last_error = Some(e);
                Err(e)
            }
        }
    }

    /// Invoke a user-facing function
    pub fn press(&mut self, function: AppFunction, display: &mut Display3270) -> KeyOutcome {
        if self.lock != KeyboardLock::Unlocked && !function.allowed_while_locked() {
            debug!("{function:?} dropped: keyboard locked");
            return KeyOutcome::Handled;
        }

        if let Some(aid) = function.aid() {
            let payload = display.process_aid(aid, aid.is_short_read());
            self.lock = KeyboardLock::TerminalWait;
            return KeyOutcome::Inbound(payload);
        }

        match function {
            AppFunction::Reset => {
                // TerminalWait belongs to the host; Reset only clears X System
                if self.lock == KeyboardLock::SystemLock {
                    self.lock = KeyboardLock::Unlocked;
                }
                self.last_error = None;
                self.insert_mode = false;
                KeyOutcome::Handled
            }
            AppFunction::Up => {
                display.move_cursor(0, -1);
                KeyOutcome::Handled
            }
            AppFunction::Down => {
                display.move_cursor(0, 1);
                KeyOutcome::Handled
            }
            AppFunction::Left => {
                display.move_cursor(-1, 0);
                KeyOutcome::Handled
            }
            AppFunction::Right => {
                display.move_cursor(1, 0);
                KeyOutcome::Handled
            }
            AppFunction::Backspace => {
                display.backspace();
                KeyOutcome::Handled
            }
            AppFunction::Tab => {
                display.tab(0);
                KeyOutcome::Handled
            }
            AppFunction::Backtab => {
                display.backtab();
                KeyOutcome::Handled
            }
            AppFunction::NewLine => {
                display.newline();
                KeyOutcome::Handled
            }
            AppFunction::Home => {
                display.home();
                KeyOutcome::Handled
            }
            AppFunction::EndLine => {
                display.endline();
                KeyOutcome::Handled
            }
            AppFunction::EraseEOF => {
                if let Err(e) = display.erase_eof() {
                    self.last_error = Some(e);
                }
                KeyOutcome::Handled
            }
            AppFunction::Insert => {
                self.insert_mode = !self.insert_mode;
                KeyOutcome::Handled
            }
            AppFunction::Delete => {
                if let Err(e) = display.delete_char() {
                    self.last_error = Some(e);
                }
                KeyOutcome::Handled
            }
            AppFunction::Attn => KeyOutcome::Attention,
            AppFunction::ToggleRuler
            | AppFunction::Copy
            | AppFunction::Paste
            | AppFunction::Info
            | AppFunction::Fields
            | AppFunction::DumpScreen => KeyOutcome::Local(function),
            // AID functions and Reset handled above
            _ => KeyOutcome::Handled,
        }
    }
}
