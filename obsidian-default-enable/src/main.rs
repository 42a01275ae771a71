//! obsidian-default-enable: turn on Obsidian's default plugins for a vault.
//!
//! Usage: `obsidian-default-enable <workspace ID>`
//!
//! Writes `_app://obsidian.md/enable-plugin-<id>` = `true` into Obsidian's
//! Local Storage (`~/.config/obsidian/Local Storage/leveldb`). If that
//! database does not exist yet, Obsidian is launched once with
//! `--no-sandbox` and stopped after its output has been idle for 10s.
//!
//! Obsidian must not be running, since it holds the database lock.

mod bootstrap;
mod config;
mod error;
mod local_storage;
mod workspace_id;

use bootstrap::{BootstrapOutcome, Launcher};
use error::AppError;
use local_storage::LocalStorage;
use workspace_id::WorkspaceId;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config::defaults::LOG_FILTER),
    )
    .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if let Err(e) = run(&args).await {
        log::error!("{}", e);
        // RUST_LOG=off must not turn a failure into a silent exit 1.
        if !log::log_enabled!(log::Level::Error) {
            eprintln!("{}", e);
        }
        std::process::exit(1);
    }
}

async fn run(args: &[String]) -> Result<(), AppError> {
    let [raw_id] = args else {
        return Err(AppError::Usage);
    };
    let workspace_id: WorkspaceId = raw_id.parse()?;

    let home = config::home_dir()?;
    let storage_dir = config::local_storage_dir(&home);

    let launcher = Launcher::from_env();
    match bootstrap::ensure_initialized(&storage_dir, &launcher, bootstrap::IDLE_TIMEOUT).await? {
        BootstrapOutcome::AlreadyInitialized => {}
        BootstrapOutcome::Initialized(exit) => {
            log::debug!("Obsidian initialized Local Storage ({:?})", exit);
        }
    }

    // Dropped on every return path below, releasing the LevelDB lock
    // before main exits.
    let mut storage = LocalStorage::open(&storage_dir)?;
    storage.enable_default_plugins(&workspace_id)?;
    storage.close()?;

    log::info!("Enabled default plugins for workspace {}", workspace_id);
    Ok(())
}
