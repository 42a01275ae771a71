use crate::error::AppError;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable names - single source of truth
pub mod env_vars {
    /// Program launched to initialize Obsidian's storage (e.g. a Flatpak wrapper).
    /// Defaults to `obsidian` resolved on PATH.
    pub const OBSIDIAN_BIN: &str = "OBSIDIAN_BIN";
}

/// Default values
pub mod defaults {
    pub const OBSIDIAN_BIN: &str = "obsidian";
    pub const NO_SANDBOX_FLAG: &str = "--no-sandbox";
    pub const OUTPUT_TAG: &str = "[OBSIDIAN]";
    /// Quiet period after which a launched Obsidian is assumed initialized
    pub const IDLE_TIMEOUT_SECS: u64 = 10;
    pub const LOG_FILTER: &str = "info";
}

/// Obsidian's config directory, relative to the user's home
const OBSIDIAN_CONFIG_DIR: &str = ".config/obsidian";

/// Chromium Local Storage database, relative to the Obsidian config directory
const LOCAL_STORAGE_SUBPATH: &str = "Local Storage/leveldb";

/// Resolve the current user's home directory
pub fn home_dir() -> Result<PathBuf, AppError> {
    dirs::home_dir().ok_or(AppError::HomeDirUnavailable)
}

/// Get the Obsidian config directory under `home`
pub fn obsidian_config_dir(home: &Path) -> PathBuf {
    home.join(OBSIDIAN_CONFIG_DIR)
}

/// Get the Local Storage LevelDB directory under `home`.
/// Not configurable: Obsidian always keeps it at this location.
pub fn local_storage_dir(home: &Path) -> PathBuf {
    obsidian_config_dir(home).join(LOCAL_STORAGE_SUBPATH)
}

/// Get the program used to launch Obsidian during bootstrap
pub fn obsidian_bin() -> String {
    env::var(env_vars::OBSIDIAN_BIN)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| defaults::OBSIDIAN_BIN.to_string())
}
