//! sowlink-dr - read-only report review service
//!
//! Serves the field verification report (JSON, CSV and HTML) from the
//! database sowlink-rc maintains. Never writes to the database.

use anyhow::{Context, Result};
use clap::Parser;
use sowlink_common::config::{load_toml_config, RootFolderInitializer, RootFolderResolver};
use sowlink_dr::{build_router, db, AppState};
use sowlink_rc::reporter::ReportThresholds;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sowlink-dr")]
#[command(about = "Serve the field verification report")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "SOWLINK_DR_PORT", default_value_t = 5731)]
    port: u16,

    /// Root folder holding the database (overrides SOWLINK_ROOT_FOLDER and TOML)
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting sowlink-dr v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new("sowlink-dr")
        .with_cli_arg(args.root_folder)
        .with_config(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder).with_config(&config);

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());

    let store = match db::connect_readonly(&db_path).await {
        Ok(store) => {
            info!("✓ Connected to database (read-only)");
            store
        }
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            return Err(e);
        }
    };

    let thresholds = ReportThresholds::from_config(&config.reconciliation);
    let app = build_router(AppState::new(store, thresholds));

    let addr = format!("127.0.0.1:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("sowlink-dr listening on http://{}", addr);
    info!("Report: http://{}/report.html", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
