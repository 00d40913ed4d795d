//! Climate ingestion adapter
//!
//! Receives Pub/Sub push deliveries of climate readings and writes each one as
//! a `climate_summary` row in Bigtable.
//!
//! # Configuration
//!
//! Environment (or `.env`, or the TOML file named by `CLIMATE_CONFIG`):
//! `PROJECT`, `INSTANCE`, `TABLE` (required), `PORT` (default 8080),
//! `BIGTABLE_ENDPOINT`, `ACCESS_TOKEN`, `STORE_TIMEOUT_SECS`, `LOG_LEVEL`,
//! `LOG_FILE`, `LOG_TIMESTAMPS`.
//!
//! # Example
//!
//! ```bash
//! PROJECT=demo INSTANCE=climate TABLE=readings ./climate_service
//!
//! curl -X POST http://localhost:8080/ \
//!   -H "Content-Type: application/json" \
//!   -d '{"message": {"data": "<base64 reading>", "id": "1"}, "subscription": "s"}'
//! ```

use climate_service::config::AdapterConfig;
use climate_service::ingest::Ingestor;
use climate_service::logging;
use climate_service::server::{self, AppState};
use climate_service::status::StatusTable;
use climate_service::store::BigtableTable;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AdapterConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init_logger(&config.log) {
        eprintln!("Unable to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        project = %config.project,
        instance = %config.instance,
        table = %config.table,
        endpoint = %config.bigtable_endpoint,
        "Climate ingestion adapter starting, version {}",
        env!("CARGO_PKG_VERSION")
    );

    let table = BigtableTable::new(
        &config.bigtable_endpoint,
        &config.project,
        &config.instance,
        &config.table,
        config.token_source(),
    )
    .with_timeout(config.store_timeout);

    let ingestor = Ingestor::new(StatusTable::standard(), Arc::new(table));
    let state = Arc::new(AppState::new(ingestor));

    if let Err(e) = server::serve(config.port, state).await {
        error!(error = %e, "Unable to start the service");
        return ExitCode::FAILURE;
    }

    info!("Server shutdown complete");
    ExitCode::SUCCESS
}
