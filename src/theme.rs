//! Colour and keyboard themes
//!
//! A colour theme resolves the eight 3270 colours and the four field-default
//! roles to RGB values; a keyboard theme maps key-sequence tokens to
//! function names from the registry. Both live in named collections where
//! "Factory" is reserved and read-only.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::keyboard::FunctionRegistry;
use crate::lib3270::cell::Colour;

/// Name of the built-in read-only theme
pub const FACTORY_THEME: &str = "Factory";

/// An RGB triple
pub type Rgb = [u8; 3];

/// Colour assignments for every displayable role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColourTheme {
    pub black: Rgb,
    pub blue: Rgb,
    pub red: Rgb,
    pub magenta: Rgb,
    pub green: Rgb,
    pub cyan: Rgb,
    pub yellow: Rgb,
    pub neutral: Rgb,

    pub unprotected_normal: Rgb,
    pub protected_normal: Rgb,
    pub unprotected_intensified: Rgb,
    pub protected_intensified: Rgb,
}

impl ColourTheme {
    /// The classic 3279 appearance
    pub fn factory() -> Self {
        Self {
            black: [0x00, 0x00, 0x00],
            blue: [0x80, 0x80, 0xFF],
            red: [0xFF, 0x00, 0x00],
            magenta: [0xFF, 0x00, 0xFF],
            green: [0x00, 0xFF, 0x00],
            cyan: [0x00, 0xFF, 0xFF],
            yellow: [0xFF, 0xFF, 0x00],
            neutral: [0xFF, 0xFF, 0xFF],

            unprotected_normal: [0x00, 0xFF, 0x00],
            protected_normal: [0x80, 0x80, 0xFF],
            unprotected_intensified: [0xFF, 0x00, 0x00],
            protected_intensified: [0xFF, 0xFF, 0xFF],
        }
    }

    /// The RGB value for a cell colour
    pub fn rgb(&self, colour: Colour) -> Rgb {
        match colour {
            Colour::Black => self.black,
            Colour::Blue => self.blue,
            Colour::Red => self.red,
            Colour::Magenta => self.magenta,
            Colour::Green => self.green,
            Colour::Cyan => self.cyan,
            Colour::Yellow => self.yellow,
            Colour::Neutral => self.neutral,
            Colour::UnprotectedNormal => self.unprotected_normal,
            Colour::ProtectedNormal => self.protected_normal,
            Colour::UnprotectedIntensified => self.unprotected_intensified,
            Colour::ProtectedIntensified => self.protected_intensified,
        }
    }
}

impl Default for ColourTheme {
    fn default() -> Self {
        Self::factory()
    }
}

/// A keyboard theme: key-sequence token to function name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyboardTheme {
    pub bindings: HashMap<String, String>,
}

impl KeyboardTheme {
    /// Default bindings, including the 3270 muscle-memory Ctrl pair: right
    /// Ctrl is Enter, left Ctrl is Reset
    pub fn factory() -> Self {
        let mut bindings = HashMap::new();
        for (seq, func) in [
            ("Enter", "NewLine"),
            ("RCtrl", "Enter"),
            ("LCtrl", "Reset"),
            ("Up", "Up"),
            ("Down", "Down"),
            ("Left", "Left"),
            ("Right", "Right"),
            ("Backspace", "Backspace"),
            ("Tab", "Tab"),
            ("Shift+Tab", "Backtab"),
            ("Home", "Home"),
            ("End", "EndLine"),
            ("EraseEOF", "EraseEOF"),
            ("Insert", "Insert"),
            ("Delete", "Delete"),
            ("Escape", "Clear"),
            ("PageUp", "PA1"),
            ("PageDown", "PA2"),
            ("Ctrl+C", "Copy"),
            ("Ctrl+V", "Paste"),
            ("Ctrl+I", "Info"),
            ("Ctrl+F", "Fields"),
            ("Ctrl+R", "ToggleRuler"),
        ] {
            bindings.insert(seq.to_string(), func.to_string());
        }
        for n in 1..=24 {
            bindings.insert(format!("F{n}"), format!("F{n}"));
        }
        Self { bindings }
    }

    /// Bind a key sequence, replacing any existing binding
    ///
    /// The function name must exist in the registry.
    pub fn bind(&mut self, sequence: &str, function: &str) -> bool {
        if FunctionRegistry::lookup(function).is_none() {
            return false;
        }
        self.bindings.insert(sequence.to_string(), function.to_string());
        true
    }

    pub fn unbind(&mut self, sequence: &str) {
        self.bindings.remove(sequence);
    }
}

/// A named collection of themes with a read-only "Factory" entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeSet<T> {
    themes: HashMap<String, T>,
}

impl<T: Clone> ThemeSet<T> {
    pub fn new(factory: T) -> Self {
        let mut themes = HashMap::new();
        themes.insert(FACTORY_THEME.to_string(), factory);
        Self { themes }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.themes.get(name)
    }

    /// The named theme, or Factory when the name is unknown
    pub fn get_or_factory(&self, name: &str) -> &T {
        self.themes.get(name).unwrap_or_else(|| &self.themes[FACTORY_THEME])
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.themes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn set(&mut self, name: &str, theme: T) -> ConfigResult<()> {
        if name == FACTORY_THEME {
            return Err(ConfigError::FactoryThemeReadOnly {
                theme: name.to_string(),
            });
        }
        self.themes.insert(name.to_string(), theme);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> ConfigResult<()> {
        if name == FACTORY_THEME {
            return Err(ConfigError::FactoryThemeReadOnly {
                theme: name.to_string(),
            });
        }
        self.themes.remove(name);
        Ok(())
    }
}
