use std::sync::Arc;

use tracing::{error, info};

use arbor::web::{AppState, WebServer};
use arbor::{storage, Config, Database, SqliteCatalog};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // Load configuration
    let mut config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = arbor::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        arbor::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> arbor::Result<()> {
    config.validate()?;

    info!("arbor - hierarchical storage catalog");

    let db = Database::open(&config.database.path).await?;
    info!("Catalog database opened at {}", config.database.path);

    let catalog = Arc::new(SqliteCatalog::new(&db));
    let blobs = storage::open_store(&config.storage).await?;

    let state = AppState::from_config(catalog, blobs, &config)?;
    let server = WebServer::new(&config.server, state)?;

    info!("Server configured on {}", server.addr());
    server.run().await?;

    info!("Server stopped");
    Ok(())
}
