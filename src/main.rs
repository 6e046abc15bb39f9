use cardspawn::adapters::{LogTransport, MemoryLedger};
use cardspawn::catalog::Catalog;
use cardspawn::cli::output::{print_error, print_success, OutputMode};
use cardspawn::cli::{self, Cli, Commands};
use cardspawn::config::{AppConfig, StoreBackend};
use cardspawn::error::{CardError, Result};
use cardspawn::logging::{init_logging, init_logging_simple};
use cardspawn::services::CardServices;
use cardspawn::store::{DocumentStore, MemoryStore, PostgresStore};
use cardspawn::tenant::TenantRegistry;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mode = OutputMode::from_json_flag(cli.json);

    match &cli.command {
        Commands::Serve => {
            let config = load_config(&cli)?;
            init_logging(&config.logging);
            if let Err(e) = serve(config).await {
                error!("Engine stopped with error: {}", e);
                return Err(e);
            }
        }
        Commands::Catalog { tier, search } => {
            init_logging_simple();
            let config = load_config(&cli)?;
            let catalog = Catalog::load_from_path(&config.catalog.path)?;
            cli::catalog::list(&catalog, *tier, search.as_deref(), mode)?;
        }
        Commands::Series => {
            init_logging_simple();
            let config = load_config(&cli)?;
            let catalog = Catalog::load_from_path(&config.catalog.path)?;
            cli::catalog::series(&catalog, mode)?;
        }
        Commands::Price { tier, spawned, max } => {
            cli::catalog::price(*tier, *spawned, *max, mode)?;
        }
        Commands::Check => {
            init_logging_simple();
            let config = load_config(&cli)?;
            let catalog = Catalog::load_from_path(&config.catalog.path)?;
            print_success(&format!(
                "Configuration OK: {} tenant(s), {} collectibles, {:?} store",
                config.tenants.len(),
                catalog.len(),
                config.database.backend
            ));
        }
    }

    Ok(())
}

/// Load and validate configuration, reporting every problem at once
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let config = AppConfig::load_from(&cli.config_dir)?;
    if let Err(errors) = config.validate() {
        for problem in &errors {
            print_error(&format!("config: {}", problem));
        }
        return Err(CardError::InvalidInput(format!(
            "{} configuration error(s)",
            errors.len()
        )));
    }
    Ok(config)
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.database.backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store, state is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let store =
                PostgresStore::new(&config.database.url, config.database.max_connections).await?;
            store.migrate().await?;
            info!("Connected to PostgreSQL");
            Ok(Arc::new(store))
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    info!("Starting card engine");

    let catalog = Arc::new(Catalog::load_from_path(&config.catalog.path)?);
    let store = open_store(&config).await?;

    let services = CardServices::new(
        catalog,
        store,
        Arc::new(LogTransport),
        Arc::new(MemoryLedger::new()),
        config.spawn.clone(),
        config.market.clone(),
    );

    let registry = TenantRegistry::from_config(&config.tenants, services.clone()).await;
    if config.tenants.is_empty() {
        warn!("No tenants configured, only the sweeper will run");
    }
    registry
        .start_sweeper(Duration::from_secs(config.spawn.sweep_interval_secs))
        .await;

    info!(
        "Serving {} tenant(s): {}",
        registry.tenant_ids().len(),
        registry.tenant_ids().join(", ")
    );

    signal::ctrl_c().await?;
    info!("Shutdown signal received");
    registry.shutdown().await;
    Ok(())
}
