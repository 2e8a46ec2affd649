//! Flat settings store for the agent.
//!
//! Settings live in a single text file in the application root: `key=value`
//! lines for the recognized keys plus bare URL lines for the kiosk link
//! list. Mutating one key rewrites the whole file but preserves every other
//! line byte-for-byte, including unknown keys and URL entries. The file is
//! reloaded after every mutation.

use chrono::NaiveTime;
use std::path::{Path, PathBuf};

/// Name of the settings file inside the application root.
pub const SETTINGS_FILE: &str = "settings.txt";

/// Domain pattern a link must match to be accepted by `addlink`.
const ALLOWED_LINK_DOMAINS: [&str; 2] = ["youtube.com", "youtu.be"];

/// Operating mode of the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Normal operation: schedule evaluated, enforcement terminates.
    Live,
    /// Lockdown forced on, escape-blocking disabled, close allowed.
    Debug,
    /// Dry run: enforcement logs intended terminations only.
    Test,
}

impl Mode {
    /// Parse a mode value. Unrecognized values fall back to `Live`.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "debug" => Mode::Debug,
            "test" => Mode::Test,
            _ => Mode::Live,
        }
    }

    /// The value written to the settings file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Live => "live",
            Mode::Debug => "debug",
            Mode::Test => "test",
        }
    }
}

/// Settings errors.
#[derive(Debug)]
pub enum SettingsError {
    IoError(String),
    InvalidTime(String),
    InvalidLink(String),
    IndexOutOfRange(usize),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::IoError(e) => write!(f, "IO error: {e}"),
            SettingsError::InvalidTime(v) => write!(f, "Invalid time value: {v}"),
            SettingsError::InvalidLink(v) => write!(f, "Link not allowed: {v}"),
            SettingsError::IndexOutOfRange(n) => write!(f, "No link at position {n}"),
        }
    }
}

impl std::error::Error for SettingsError {}

/// Parsed view of the settings file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: Mode,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub api_token: String,
    pub links: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: Mode::Live,
            start_time: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            api_token: String::new(),
            links: Vec::new(),
        }
    }
}

impl Settings {
    /// Parse settings from raw file content. Unknown lines are ignored here
    /// (the store preserves them on rewrite).
    pub fn parse(content: &str) -> Self {
        let mut settings = Settings::default();
        for line in content.lines() {
            if let Some(value) = line.strip_prefix("mode=") {
                settings.mode = Mode::parse(value);
            } else if let Some(value) = line.strip_prefix("startTime=") {
                if let Some(t) = parse_time(value) {
                    settings.start_time = t;
                }
            } else if let Some(value) = line.strip_prefix("endTime=") {
                if let Some(t) = parse_time(value) {
                    settings.end_time = t;
                }
            } else if let Some(value) = line.strip_prefix("API_TOKEN=") {
                settings.api_token = value.trim().to_string();
            } else if is_link_line(line) {
                settings.links.push(line.trim().to_string());
            }
        }
        settings
    }
}

/// Parse an HH:mm time-of-day value.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").ok()
}

/// A URL line is any line whose trimmed form starts with `http`.
pub fn is_link_line(line: &str) -> bool {
    line.trim_start().starts_with("http")
}

/// Whether a URL matches the allowed domain pattern for `addlink`.
pub fn is_allowed_link(url: &str) -> bool {
    ALLOWED_LINK_DOMAINS.iter().any(|d| url.contains(d))
}

/// Handle to the settings file, responsible for all mutations.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Create a store for the settings file inside `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            path: root.join(SETTINGS_FILE),
        }
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current settings. A missing file yields defaults.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Settings::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(SettingsError::IoError(e.to_string())),
        }
    }

    /// Set `key=value`, preserving every other line byte-for-byte. A missing
    /// key is inserted at the top of the file.
    pub fn update_key(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        let mut lines = self.read_lines()?;
        let prefix = format!("{key}=");
        match lines.iter().position(|l| l.starts_with(&prefix)) {
            Some(index) => lines[index] = format!("{key}={value}"),
            None => lines.insert(0, format!("{key}={value}")),
        }
        self.write_lines(&lines)
    }

    /// Rewrite both time-of-day keys.
    pub fn set_window(&self, start: NaiveTime, end: NaiveTime) -> Result<(), SettingsError> {
        self.update_key("startTime", &start.format("%H:%M").to_string())?;
        self.update_key("endTime", &end.format("%H:%M").to_string())
    }

    /// Append a URL line. The URL must match the allowed domain pattern.
    pub fn append_link(&self, url: &str) -> Result<(), SettingsError> {
        if !is_allowed_link(url) {
            return Err(SettingsError::InvalidLink(url.to_string()));
        }
        let mut lines = self.read_lines()?;
        lines.push(url.trim().to_string());
        self.write_lines(&lines)
    }

    /// Remove the nth URL line (1-based, counted among URL lines only).
    pub fn remove_link(&self, index: usize) -> Result<(), SettingsError> {
        let lines = self.read_lines()?;
        let mut seen = 0usize;
        let mut remove_at = None;
        for (i, line) in lines.iter().enumerate() {
            if is_link_line(line) {
                seen += 1;
                if seen == index {
                    remove_at = Some(i);
                    break;
                }
            }
        }
        let at = remove_at.ok_or(SettingsError::IndexOutOfRange(index))?;
        let mut lines = lines;
        lines.remove(at);
        self.write_lines(&lines)
    }

    fn read_lines(&self) -> Result<Vec<String>, SettingsError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(SettingsError::IoError(e.to_string())),
        }
    }

    fn write_lines(&self, lines: &[String]) -> Result<(), SettingsError> {
        let mut content = lines.join("\n");
        content.push('\n');
        std::fs::write(&self.path, content).map_err(|e| SettingsError::IoError(e.to_string()))
    }
}
