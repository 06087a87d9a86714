use points_ledger::{
    LedgerEngine,
    config::{self, database},
    core::run_sweeper,
    errors::Result,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    // 3. Load ledger policy
    let ledger_config = config::load_default_config()
        .inspect_err(|e| error!("Failed to load ledger configuration: {}", e))?;
    info!(
        points_divisor = %ledger_config.points_divisor,
        activation_delay_hours = ledger_config.activation_delay_hours,
        expiry_years = ledger_config.expiry_years,
        "Loaded ledger configuration"
    );

    // 4. Connect and make sure the schema exists
    let db = database::connect(&database::get_database_url())
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Run activation and expiry sweeps until Ctrl-C
    let interval = ledger_config.sweep_interval();
    let engine = LedgerEngine::new(db, ledger_config);
    run_sweeper(engine, interval, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
    })
    .await;

    Ok(())
}
