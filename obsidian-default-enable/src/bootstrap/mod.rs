//! Storage bootstrap. Makes sure Obsidian has created its Local Storage.
//!
//! On a fresh install the LevelDB directory does not exist until Obsidian has
//! run once. In that case Obsidian is launched, its output relayed, and it is
//! stopped once the output has been idle for [`IDLE_TIMEOUT`].

pub mod relay;
pub mod supervisor;

pub use relay::StreamKind;
pub use supervisor::SupervisedExit;

use crate::config::{self, defaults};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Quiet period after which Obsidian is assumed to be initialized
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(defaults::IDLE_TIMEOUT_SECS);

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("Could not find {program}: {source}")]
    NotFound {
        program: String,
        #[source]
        source: which::Error,
    },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open the child's {0}")]
    MissingStream(StreamKind),

    #[error("Failed to wait for the child: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Failed to kill the child: {0}")]
    Kill(#[source] std::io::Error),

    #[error("Idle watchdog failed: {0}")]
    Watchdog(#[source] tokio::task::JoinError),

    #[error("Obsidian failed to initialize ({} is still missing)", .path.display())]
    StillMissing { path: PathBuf },
}

/// Result of [`ensure_initialized`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Storage was already present; nothing was launched
    AlreadyInitialized,
    /// Obsidian was launched and created the storage
    Initialized(SupervisedExit),
}

/// How to start Obsidian
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    program: String,
    args: Vec<String>,
}

impl Launcher {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `obsidian --no-sandbox`, or `$OBSIDIAN_BIN --no-sandbox` when set
    pub fn from_env() -> Self {
        Self::new(config::obsidian_bin(), [defaults::NO_SANDBOX_FLAG])
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Resolve the program on PATH and build the command
    fn command(&self) -> Result<Command, BootstrapError> {
        let path = which::which(&self.program).map_err(|source| BootstrapError::NotFound {
            program: self.program.clone(),
            source,
        })?;
        log::debug!("Resolved {} to {}", self.program, path.display());

        let mut cmd = Command::new(path);
        cmd.args(&self.args);
        Ok(cmd)
    }
}

/// Ensure `storage_dir` exists, launching Obsidian once if it does not.
pub async fn ensure_initialized(
    storage_dir: &Path,
    launcher: &Launcher,
    idle_timeout: Duration,
) -> Result<BootstrapOutcome, BootstrapError> {
    if storage_dir.exists() {
        log::debug!("Local Storage found at {}", storage_dir.display());
        return Ok(BootstrapOutcome::AlreadyInitialized);
    }

    log::info!("Obsidian is not initialized");
    log::info!("Running Obsidian once to initialize it");
    log::debug!("Launching {} {}", launcher.program(), launcher.args().join(" "));

    let cmd = launcher.command()?;
    let exit = supervisor::run_until_idle(cmd, idle_timeout).await?;

    if !storage_dir.exists() {
        return Err(BootstrapError::StillMissing {
            path: storage_dir.to_path_buf(),
        });
    }

    Ok(BootstrapOutcome::Initialized(exit))
}
