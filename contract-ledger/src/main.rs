use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use contract_ledger::{
    config::{Config, StoreBackend},
    handlers, LedgerService, LedgerStore, MemoryLedgerStore, PgLedgerStore,
};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .json()
        .init();

    info!("Starting Contract Ledger...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().map_err(anyhow::Error::msg)?;

    info!("Configuration loaded successfully");

    let store: Arc<dyn LedgerStore> = match config.store.backend {
        StoreBackend::Postgres => {
            let db = PgLedgerStore::new(
                &config.database.url,
                config.database.max_connections,
                config.database.min_connections,
                config.database.acquire_timeout_secs,
            )
            .await
            .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to run migrations")?;
            info!("Database connected and migrated");
            Arc::new(db)
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory demo store, balances will not survive a restart");
            Arc::new(MemoryLedgerStore::seeded())
        }
    };

    let service = Arc::new(LedgerService::new(store, &config.reporting));
    let service_data = web::Data::new(service);
    let server_config = config.server.clone();

    info!(
        "Starting HTTP server on {}:{}",
        server_config.host, server_config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(service_data.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(handlers::configure_routes)
    })
    .workers(server_config.workers)
    .bind((server_config.host, server_config.port))?
    .run()
    .await?;

    Ok(())
}
