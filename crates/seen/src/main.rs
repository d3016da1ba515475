use std::sync::Arc;

use tracing::{error, info};

use seen::db::{default_database_path, Database};
use seen::{
    load_config, CommandInvoker, Config, ConfigError, Engine, EngineSettings, SeenError,
    SqliteJobStore,
};

const DEFAULT_CONFIG_PATH: &str = "seen.json";

fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", config_path, e);
            std::process::exit(2);
        }
    };

    if let Err(e) = seen::logging::init(&config.logging) {
        eprintln!("{}", e);
        std::process::exit(2);
    }

    if let Err(e) = run(&config) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(config: &Config) -> Result<(), SeenError> {
    let settings = EngineSettings::from_config(config);

    let db_path = match settings.database_path.clone().or_else(default_database_path) {
        Some(path) => path,
        None => {
            return Err(ConfigError::Validation {
                message: "no database_path configured and no home directory found".into(),
            }
            .into())
        }
    };
    let store = Arc::new(SqliteJobStore::new(Database::open(&db_path)?));
    let invoker = Arc::new(CommandInvoker::new(settings.invocation_timeout)?);

    info!(
        "Starting seen with {} workers, storage at {}, database at {}",
        settings.worker_count,
        settings.storage_directory.display(),
        db_path.display()
    );

    let engine = Engine::start(settings, store, invoker)?;
    engine.recover()?;

    let (tx, rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = tx.try_send(());
    })
    .map_err(|e| SeenError::Signal(e.to_string()))?;

    // Blocks until interrupted.
    let _ = rx.recv();

    info!("Received shutdown signal");
    engine.shutdown();
    engine.wait();
    info!("Shutdown complete");
    Ok(())
}
