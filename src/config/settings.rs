//! Persisted user settings
//!
//! Settings live in a single JSON document under the user's config
//! directory. Per-monitor grid profiles are keyed by GDI device name and are
//! created on first use. Nothing is written implicitly: callers persist with
//! [`SettingsStore::save`], except that creating a missing monitor profile
//! saves once so the new entry survives a restart.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Settings errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No configuration directory available")]
    NoConfigDir,
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Grid layout remembered for one monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorProfile {
    pub friendly_name: String,
    pub rows: u32,
    pub columns: u32,
}

impl MonitorProfile {
    pub const MIN_DIMENSION: u32 = 1;
    pub const MAX_DIMENSION: u32 = 12;

    pub fn new(friendly_name: impl Into<String>, rows: u32, columns: u32) -> Self {
        Self {
            friendly_name: friendly_name.into(),
            rows,
            columns,
        }
        .clamped()
    }

    /// Keeps rows and columns inside the supported range
    pub fn clamped(mut self) -> Self {
        self.rows = self.rows.clamp(Self::MIN_DIMENSION, Self::MAX_DIMENSION);
        self.columns = self.columns.clamp(Self::MIN_DIMENSION, Self::MAX_DIMENSION);
        self
    }
}

/// 8-bit straight-alpha colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Self = Self { r: 0, g: 0, b: 0, a: 0 };

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#RRGGBB` or `#RRGGBBAA`
    pub fn parse_hex(text: &str) -> Option<Self> {
        let hex = text.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            6 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, 0xff)),
            8 => Some(Self::new(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    /// Like [`Rgba::parse_hex`] but unreadable values become transparent
    pub fn from_hex_or_transparent(text: &str) -> Self {
        Self::parse_hex(text).unwrap_or_else(|| {
            tracing::warn!("Unreadable colour {text:?}, using transparent");
            Self::TRANSPARENT
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
    }
}

/// Overlay colours as hex strings, kept verbatim so hand edits round-trip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayColors {
    pub background: String,
    pub grid_line: String,
    pub selection_fill: String,
    pub selection_border: String,
    pub label: String,
}

impl Default for OverlayColors {
    fn default() -> Self {
        Self {
            background: "#10182040".into(),
            grid_line: "#FFFFFF80".into(),
            selection_fill: "#3C8CFF60".into(),
            selection_border: "#3C8CFFE0".into(),
            label: "#FFFFFFFF".into(),
        }
    }
}

/// Parsed form of [`OverlayColors`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayPalette {
    pub background: Rgba,
    pub grid_line: Rgba,
    pub selection_fill: Rgba,
    pub selection_border: Rgba,
    pub label: Rgba,
}

impl OverlayColors {
    pub fn palette(&self) -> OverlayPalette {
        OverlayPalette {
            background: Rgba::from_hex_or_transparent(&self.background),
            grid_line: Rgba::from_hex_or_transparent(&self.grid_line),
            selection_fill: Rgba::from_hex_or_transparent(&self.selection_fill),
            selection_border: Rgba::from_hex_or_transparent(&self.selection_border),
            label: Rgba::from_hex_or_transparent(&self.label),
        }
    }
}

impl Default for OverlayPalette {
    fn default() -> Self {
        OverlayColors::default().palette()
    }
}

/// Space and left Control, the keyboard stand-ins for the secondary button
pub const DEFAULT_TRIGGER_KEYS: [u32; 2] = [0x20, 0xA2];

/// Main application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Rows for monitors seen for the first time
    pub default_rows: u32,
    /// Columns for monitors seen for the first time
    pub default_columns: u32,
    /// Per-monitor profiles keyed by device name
    pub monitors: BTreeMap<String, MonitorProfile>,
    pub overlay: OverlayColors,
    /// Pause before the final placement of a gesture
    pub settle_delay_ms: u64,
    /// Virtual-key codes that act like the secondary button; empty disables
    /// the keyboard hook
    pub trigger_keys: Vec<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_rows: 2,
            default_columns: 3,
            monitors: BTreeMap::new(),
            overlay: OverlayColors::default(),
            settle_delay_ms: 50,
            trigger_keys: DEFAULT_TRIGGER_KEYS.to_vec(),
        }
    }
}

impl Settings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Default location: `<config_dir>/gridsnap/settings.json`
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join("gridsnap").join("settings.json"))
            .ok_or(SettingsError::NoConfigDir)
    }

    /// Reads settings from `path`
    pub fn load(path: &Path) -> SettingsResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Writes settings to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> SettingsResult<()> {
        let contents = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, contents).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn default_profile(&self, friendly_name: &str) -> MonitorProfile {
        MonitorProfile::new(friendly_name, self.default_rows, self.default_columns)
    }
}

/// Source of grid dimensions for gesture sessions
pub trait SettingsStore {
    /// Returns the profile for `device_id`, creating and persisting a default one if absent
    fn get_or_create_monitor_profile(&mut self, device_id: &str, friendly_name: &str) -> MonitorProfile;

    fn save(&self) -> SettingsResult<()>;
}

/// [`SettingsStore`] backed by a JSON file
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl JsonSettingsStore {
    /// Opens the store at `path`
    ///
    /// A missing file yields defaults. A corrupt file is logged and also
    /// yields defaults; it is only overwritten on the next save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = if path.exists() {
            match Settings::load(&path) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "Ignoring unreadable settings: {e}");
                    Settings::default()
                }
            }
        } else {
            tracing::info!(path = %path.display(), "No settings file, using defaults");
            Settings::default()
        };
        Self { path, settings }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get_or_create_monitor_profile(&mut self, device_id: &str, friendly_name: &str) -> MonitorProfile {
        if let Some(profile) = self.settings.monitors.get(device_id) {
            return profile.clone().clamped();
        }

        let profile = self.settings.default_profile(friendly_name);
        self.settings.monitors.insert(device_id.to_string(), profile.clone());
        tracing::info!(device_id, friendly_name, rows = profile.rows, columns = profile.columns, "Created monitor profile");
        if let Err(e) = self.save() {
            tracing::warn!("Could not persist new monitor profile: {e}");
        }
        profile
    }

    fn save(&self) -> SettingsResult<()> {
        self.settings.save(&self.path)
    }
}
