//! Where the store keeps its files and which record layout it uses.
//!
//! Values come from the defaults, then the environment, then command-line
//! flags (applied by `main`).

use std::path::{Path, PathBuf};

use records::RecordLayout;
use tracing::warn;

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "MCMAN_DATA_DIR";
/// `1`/`true`/`yes` rejects out-of-range fields on save instead of truncating.
pub const STRICT_ENV: &str = "MCMAN_STRICT";

pub const MODLIST_FILE: &str = "modlist";
pub const CONFIG_FILE: &str = "config";
pub const VERSIONS_FILE: &str = "versions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub records: RecordLayout,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            records: RecordLayout::default(),
        }
    }
}

impl StoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Defaults overlaid with `MCMAN_DATA_DIR` and `MCMAN_STRICT`.
    pub fn from_env() -> Self {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    fn apply_env<F>(mut self, get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = get(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(raw) = get(STRICT_ENV) {
            match parse_flag(&raw) {
                Some(strict) => self.records.strict = strict,
                None => warn!(value = %raw, "ignoring unrecognised {STRICT_ENV}"),
            }
        }
        self
    }

    pub fn with_data_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.records = self.records.strict(strict);
        self
    }

    pub fn modlist_path(&self) -> PathBuf {
        self.data_dir.join(MODLIST_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn versions_path(&self) -> PathBuf {
        self.data_dir.join(VERSIONS_FILE)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
