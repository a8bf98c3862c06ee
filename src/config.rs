//! Configuration manager: discovers a `settings.ini` file and exposes its
//! key/value pairs behind a reader-writer lock.
//!
//! Deliberately not a hidden singleton — the driver constructs one
//! [`ConfigManager`] and threads it through to whatever needs it, per the
//! design note that configuration should be "an explicit handle passed
//! through". Readers take a shared lock ([`ConfigManager::read`]), a
//! mutator takes a unique one ([`ConfigManager::read_write`]), and
//! [`ConfigManager::try_read`] returns immediately rather than blocking if
//! a writer currently holds the lock.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::IoError;

const SETTINGS_FILE_NAME: &str = "settings.ini";

/// Directory name this crate's settings live under, `<name>-<major>.<minor>`
/// of the crate version (mirrors the original's `irritator-x.y` convention).
fn config_dir_name() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let mut parts = version.split('.');
    let major = parts.next().unwrap_or("0");
    let minor = parts.next().unwrap_or("0");
    format!("{}-{major}.{minor}", env!("CARGO_PKG_NAME"))
}

/// Walks the documented search order and returns the first directory that
/// exists, or the last candidate (CWD) if none do — callers are expected to
/// create it on first write.
///
/// Order: `$XDG_CONFIG_HOME/<name>-x.y/` → `$HOME/.config/<name>-x.y/` →
/// executable-relative → current working directory. On Windows the second
/// step is replaced by the local-appdata folder.
pub fn discover_config_dir() -> PathBuf {
    let dir_name = config_dir_name();

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = Path::new(&xdg).join(&dir_name);
        if candidate.is_dir() {
            return candidate;
        }
    }

    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = env::var("HOME") {
        let candidate = Path::new(&home).join(".config").join(&dir_name);
        if candidate.is_dir() {
            return candidate;
        }
    }

    #[cfg(target_os = "windows")]
    if let Ok(local_appdata) = env::var("LOCALAPPDATA") {
        let candidate = Path::new(&local_appdata).join(&dir_name);
        if candidate.is_dir() {
            return candidate;
        }
    }

    if let Ok(exe) = env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let candidate = exe_dir.join(&dir_name);
            if candidate.is_dir() {
                return candidate;
            }
        }
    }

    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// The settings file path under [`discover_config_dir`].
pub fn settings_path() -> PathBuf {
    discover_config_dir().join(SETTINGS_FILE_NAME)
}

/// Reader-writer-locked `key = value` settings, loaded from (and savable
/// back to) an INI-style file.
pub struct ConfigManager {
    variables: RwLock<BTreeMap<String, String>>,
    path: PathBuf,
}

impl ConfigManager {
    /// An empty manager bound to `path`, not yet loaded.
    pub fn new(path: PathBuf) -> Self {
        Self {
            variables: RwLock::new(BTreeMap::new()),
            path,
        }
    }

    /// Locates `settings.ini` via [`discover_config_dir`] and loads it if
    /// present; an absent file is not an error, the manager just starts
    /// empty.
    pub fn discover() -> Result<Self, IoError> {
        let path = settings_path();
        let manager = Self::new(path);
        manager.reload()?;
        Ok(manager)
    }

    /// Re-reads the backing file, replacing all current variables. A
    /// missing file is treated as an empty settings set, not an error.
    pub fn reload(&self) -> Result<(), IoError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(IoError::Open { path: self.path.clone(), source: e }),
        };
        let parsed = parse_ini(&text)?;
        *self.variables.write().unwrap() = parsed;
        Ok(())
    }

    /// Serializes the current variables back to the backing file, creating
    /// parent directories as needed.
    pub fn save(&self) -> Result<(), IoError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| IoError::Open { path: parent.to_path_buf(), source: e })?;
        }
        let text = write_ini(&self.variables.read().unwrap());
        fs::write(&self.path, text).map_err(IoError::Write)
    }

    /// Shared access to the variable map.
    pub fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.variables.read().unwrap()
    }

    /// Unique access to the variable map.
    pub fn read_write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.variables.write().unwrap()
    }

    /// Non-blocking shared access; `None` if a writer currently holds the
    /// lock.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, BTreeMap<String, String>>> {
        self.variables.try_read().ok()
    }

    /// Path this manager loads from and saves to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_ini(text: &str) -> Result<BTreeMap<String, String>, IoError> {
    let mut map = BTreeMap::new();
    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') || line.starts_with('[') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| IoError::Format(format!("settings.ini line {}: missing '='", line_no + 1)))?;
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}

fn write_ini(vars: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in vars {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_lines_and_skips_comments_and_sections() {
        let text = "; comment\n[section]\nfoo = bar\nbaz=1\n";
        let parsed = parse_ini(text).unwrap();
        assert_eq!(parsed.get("foo").map(String::as_str), Some("bar"));
        assert_eq!(parsed.get("baz").map(String::as_str), Some("1"));
    }

    #[test]
    fn malformed_line_is_a_format_error() {
        assert!(parse_ini("not-a-valid-line").is_err());
    }

    #[test]
    fn save_then_reload_round_trips_variables() {
        let dir = env::temp_dir().join(format!("qdevs-config-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(SETTINGS_FILE_NAME);
        let manager = ConfigManager::new(path.clone());
        manager.read_write().insert("seed".to_string(), "42".to_string());
        manager.save().unwrap();

        let reloaded = ConfigManager::new(path);
        reloaded.reload().unwrap();
        assert_eq!(reloaded.read().get("seed").map(String::as_str), Some("42"));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_reloads_to_empty_without_error() {
        let manager = ConfigManager::new(PathBuf::from("/nonexistent/path/settings.ini"));
        manager.reload().unwrap();
        assert!(manager.read().is_empty());
    }

    #[test]
    fn try_read_succeeds_when_uncontended() {
        let manager = ConfigManager::new(PathBuf::from("settings.ini"));
        assert!(manager.try_read().is_some());
    }
}
