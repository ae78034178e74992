//! Session profiles
//!
//! A profile records everything needed to reopen a session: the host (with
//! optional LU name), terminal model, code page, fonts and theme names, and
//! the display toggles. Profiles persist as JSON under the user's
//! configuration directory.

use std::fs;
use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::lib3270::display::TerminalModel;

/// Ruler display styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RulerStyle {
    #[default]
    CrossHair,
    Vertical,
    Horizontal,
}

/// A stored session definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionProfile {
    /// Unique profile identifier
    pub id: String,
    /// Display name
    pub name: String,

    pub host: String,
    pub port: u16,
    /// LU name requested during terminal-type negotiation
    pub lu_name: Option<String>,

    pub model: TerminalModel,
    pub codepage: String,
    pub font: String,

    pub colour_theme: String,
    pub keyboard_theme: String,

    pub cursor_blink: bool,
    /// Blink speed 0..4
    pub cursor_blink_speed: u8,
    pub ruler: bool,
    pub ruler_style: RulerStyle,
    /// Stretch the character grid to fill the window
    pub stretch: bool,

    pub secure: bool,
    pub verify_certificates: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl SessionProfile {
    pub fn new(name: &str, host: &str, port: u16) -> Self {
        let now = chrono::Utc::now();
        let (lu_name, host) = split_lu_name(host);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            host,
            port,
            lu_name,
            model: TerminalModel::Model2,
            codepage: "IBM-037".to_string(),
            font: "monospace".to_string(),
            colour_theme: crate::theme::FACTORY_THEME.to_string(),
            keyboard_theme: crate::theme::FACTORY_THEME.to_string(),
            cursor_blink: true,
            cursor_blink_speed: 2,
            ruler: false,
            ruler_style: RulerStyle::default(),
            stretch: false,
            secure: false,
            verify_certificates: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Parse an `lu@host:port` address into a profile
    pub fn from_address(name: &str, address: &str) -> ConfigResult<Self> {
        let (host_part, port) = match address.rsplit_once(':') {
            Some((h, p)) => {
                let port = p.parse::<u16>().map_err(|_| ConfigError::InvalidProfile {
                    name: name.to_string(),
                    reason: format!("bad port in '{address}'"),
                })?;
                (h.to_string(), port)
            }
            None => (address.to_string(), 23),
        };

        if host_part.is_empty() {
            return Err(ConfigError::InvalidProfile {
                name: name.to_string(),
                reason: format!("empty host in '{address}'"),
            });
        }

        Ok(Self::new(name, &host_part, port))
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now();
    }

    /// The address back in `lu@host:port` form
    pub fn address(&self) -> String {
        match &self.lu_name {
            Some(lu) => format!("{lu}@{}:{}", self.host, self.port),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

/// Split a leading `lu@` from a host string
fn split_lu_name(host: &str) -> (Option<String>, String) {
    match host.split_once('@') {
        Some((lu, rest)) if !lu.is_empty() => (Some(lu.to_string()), rest.to_string()),
        Some((_, rest)) => (None, rest.to_string()),
        None => (None, host.to_string()),
    }
}

/// Loads and saves the profile collection
pub struct ProfileStore {
    path: PathBuf,
    profiles: Vec<SessionProfile>,
}

impl ProfileStore {
    /// Store under the platform configuration directory
    pub fn open_default() -> ConfigResult<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::FileError {
                path: "<config dir>".to_string(),
                error: "no configuration directory".to_string(),
            })?
            .join("tn3270r");
        Self::open(dir.join("profiles.json"))
    }

    pub fn open(path: PathBuf) -> ConfigResult<Self> {
        let profiles = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| ConfigError::FileError {
                path: path.display().to_string(),
                error: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("failed to read {}: {e}", path.display());
                return Err(ConfigError::FileError {
                    path: path.display().to_string(),
                    error: e.to_string(),
                });
            }
        };
        Ok(Self { path, profiles })
    }

    pub fn profiles(&self) -> &[SessionProfile] {
        &self.profiles
    }

    pub fn find(&self, name: &str) -> Option<&SessionProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Insert or replace by name
    pub fn upsert(&mut self, mut profile: SessionProfile) {
        profile.touch();
        if let Some(existing) = self.profiles.iter_mut().find(|p| p.name == profile.name) {
            *existing = profile;
        } else {
            self.profiles.push(profile);
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.profiles.retain(|p| p.name != name);
    }

    pub fn save(&self) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::FileError {
                path: parent.display().to_string(),
                error: e.to_string(),
            })?;
        }
        let text = serde_json::to_string_pretty(&self.profiles).map_err(|e| ConfigError::FileError {
            path: self.path.display().to_string(),
            error: e.to_string(),
        })?;
        fs::write(&self.path, text).map_err(|e| ConfigError::FileError {
            path: self.path.display().to_string(),
            error: e.to_string(),
        })
    }
}
