//! Top-level error for a run of the tool.
//!
//! Every variant is fatal: `main` logs it and exits with status 1.

use crate::bootstrap::BootstrapError;
use crate::local_storage::StorageError;
use crate::workspace_id::InvalidWorkspaceId;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Usage: obsidian-default-enable <workspace ID>")]
    Usage,

    #[error(transparent)]
    InvalidWorkspaceId(#[from] InvalidWorkspaceId),

    #[error("Could not resolve the user's home directory")]
    HomeDirUnavailable,

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
