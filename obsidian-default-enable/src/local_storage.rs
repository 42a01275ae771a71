//! Obsidian's Chromium Local Storage database.
//!
//! Obsidian keeps per-origin key/value settings in a LevelDB directory under
//! its config folder. The "enable default plugins" flag for a vault is a
//! single key in that database.

use crate::workspace_id::WorkspaceId;
use rusty_leveldb::{Options, Status, DB};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Key prefix for the per-vault "enable default plugins" flag
pub const ENABLE_PLUGIN_KEY_PREFIX: &str = "_app://obsidian.md/enable-plugin-";

/// Stored value meaning "enabled"
pub const ENABLED_VALUE: &[u8] = b"true";

/// LevelDB's lock file inside the database directory
const LOCK_FILE: &str = "LOCK";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Local Storage at {} is locked; quit Obsidian and try again", .path.display())]
    Locked { path: PathBuf },

    #[error("Failed to lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open Local Storage at {}: {status}", .path.display())]
    Open { path: PathBuf, status: Status },

    #[error("Failed to write {key}: {status}")]
    Write { key: String, status: Status },

    #[error("Failed to flush Local Storage: {0}")]
    Flush(Status),
}

/// Build the Local Storage key for a workspace
pub fn enable_plugin_key(workspace_id: &WorkspaceId) -> String {
    format!("{}{}", ENABLE_PLUGIN_KEY_PREFIX, workspace_id.as_str())
}

/// Exclusive handle on the Local Storage database. Dropping it releases
/// the LevelDB lock.
pub struct LocalStorage {
    path: PathBuf,
    db: DB,
    // Declared after `db` so it is released last.
    _store_lock: Option<File>,
}

impl LocalStorage {
    /// Open the database at `path`.
    /// Fails if the store is locked (e.g. Obsidian is running) or corrupt.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let store_lock = acquire_store_lock(path)?;

        let db = DB::open(path, Options::default()).map_err(|status| StorageError::Open {
            path: path.to_path_buf(),
            status,
        })?;
        log::debug!("Opened Local Storage at {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            db,
            _store_lock: store_lock,
        })
    }

    /// Set the "enable default plugins" flag for `workspace_id`.
    /// Overwrites any previous value, so re-running is safe.
    pub fn enable_default_plugins(&mut self, workspace_id: &WorkspaceId) -> Result<(), StorageError> {
        let key = enable_plugin_key(workspace_id);

        self.db
            .put(key.as_bytes(), ENABLED_VALUE)
            .map_err(|status| StorageError::Write {
                key: key.clone(),
                status,
            })?;
        self.db.flush().map_err(StorageError::Flush)?;

        if log::log_enabled!(log::Level::Debug) {
            let stored = self.get(&key).unwrap_or_default();
            log::debug!(
                "Wrote {} = {} to {}",
                key,
                String::from_utf8_lossy(&stored),
                self.path.display()
            );
        }
        Ok(())
    }

    /// Read a raw value
    pub fn get(&mut self, key: &str) -> Option<Vec<u8>> {
        self.db.get(key.as_bytes()).map(|v| v.to_vec())
    }

    /// Flush pending writes and release the handle
    pub fn close(mut self) -> Result<(), StorageError> {
        self.db.flush().map_err(StorageError::Flush)
    }
}

/// Take the lock Chromium's LevelDB holds on `<dir>/LOCK` while Obsidian
/// runs. That is a POSIX record lock, which rusty-leveldb's `flock` does not
/// conflict with, so it is checked here with an open file description lock.
/// A directory that does not exist yet cannot be held by anyone.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn acquire_store_lock(dir: &Path) -> Result<Option<File>, StorageError> {
    use nix::errno::Errno;
    use nix::fcntl::{fcntl, FcntlArg};
    use std::fs::OpenOptions;
    use std::os::fd::AsRawFd;

    if !dir.is_dir() {
        return Ok(None);
    }

    let lock_path = dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|source| StorageError::Lock {
            path: lock_path.clone(),
            source,
        })?;

    let whole_file = libc::flock {
        l_type: libc::F_WRLCK as libc::c_short,
        l_whence: libc::SEEK_SET as libc::c_short,
        l_start: 0,
        l_len: 0,
        l_pid: 0,
    };

    match fcntl(file.as_raw_fd(), FcntlArg::F_OFD_SETLK(&whole_file)) {
        Ok(_) => Ok(Some(file)),
        Err(Errno::EAGAIN) | Err(Errno::EACCES) => Err(StorageError::Locked {
            path: dir.to_path_buf(),
        }),
        Err(errno) => Err(StorageError::Lock {
            path: lock_path,
            source: errno.into(),
        }),
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn acquire_store_lock(_dir: &Path) -> Result<Option<File>, StorageError> {
    Ok(None)
}
