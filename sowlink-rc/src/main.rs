//! sowlink-rc - batch import, reconciliation and report generation
//!
//! Every subcommand opens (creating if needed) the database in the resolved
//! root folder, does its work and exits. Failures to read input or reach the
//! database exit non-zero.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sowlink_common::config::{load_toml_config, RootFolderInitializer, RootFolderResolver};
use sowlink_common::RecordKind;
use sowlink_rc::ingest::{read_row_file, ColumnAliases};
use sowlink_rc::registry::{to_field_records, FieldRegistryClient};
use sowlink_rc::reporter::{csv::render_csv, export_rows, html::render_html};
use sowlink_rc::reconciler::ReplaceScope;
use sowlink_rc::{Reconciler, SqliteStore};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sowlink-rc")]
#[command(about = "Reconcile as-designed pole/drop records with as-built field records")]
#[command(version)]
struct Args {
    /// Root folder holding the database (overrides SOWLINK_ROOT_FOLDER and TOML)
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import design records from a JSON row file
    ImportDesign {
        #[arg(long)]
        project: String,
        /// Project display name
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "pole")]
        kind: RecordKind,
    },

    /// Import field records from a JSON row file
    ImportField {
        #[arg(long)]
        project: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "pole")]
        kind: RecordKind,
        /// Clear the project's field records of this kind first
        #[arg(long)]
        replace: bool,
    },

    /// Pull field records for a site from the Field Registry
    SyncField {
        #[arg(long)]
        project: String,
        /// Registry site code, e.g. LAW
        #[arg(long)]
        site: String,
        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<u32>,
        /// Clear all of the project's field records first
        #[arg(long)]
        replace: bool,
    },

    /// Match design records against field records
    Reconcile {
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        project: Option<String>,
        /// Every project in the database
        #[arg(long)]
        all: bool,
    },

    /// Record a confirmed design/field pairing
    Link {
        #[arg(long)]
        project: String,
        #[arg(long)]
        design: String,
        #[arg(long)]
        field: String,
    },

    /// Write the field verification report (HTML and CSV)
    Report {
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_toml_config(args.config.as_deref()).context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting sowlink-rc v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new("sowlink-rc")
        .with_cli_arg(args.root_folder.clone())
        .with_config(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder).with_config(&config);
    initializer.ensure_directory_exists()?;

    let db_path = initializer.database_path();
    info!("Database path: {}", db_path.display());
    let store = SqliteStore::open(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let aliases = ColumnAliases::with_overrides(&config.ingest.aliases)?;
    let reconciler = Reconciler::new(store, config.reconciliation.clone(), aliases);

    match args.command {
        Command::ImportDesign {
            project,
            name,
            file,
            kind,
        } => {
            let rows = read_row_file(&file)
                .with_context(|| format!("Failed to read row file {}", file.display()))?;
            if name.is_some() {
                reconciler.register_project(&project, name).await?;
            }
            let stats = reconciler.import_design_rows(&project, &rows, kind).await?;
            println!("{}", stats.display_string());
        }

        Command::ImportField {
            project,
            file,
            kind,
            replace,
        } => {
            let rows = read_row_file(&file)
                .with_context(|| format!("Failed to read row file {}", file.display()))?;
            let stats = reconciler
                .import_field_rows(&project, &rows, kind, replace)
                .await?;
            println!("{}", stats.display_string());
        }

        Command::SyncField {
            project,
            site,
            max_pages,
            replace,
        } => {
            let Some(registry) = &config.registry else {
                bail!("sync-field needs a [registry] section in the configuration");
            };
            let client = FieldRegistryClient::new(registry);
            let records = client
                .fetch_site(&site, max_pages)
                .await
                .context("Field Registry request failed")?;
            let fields = to_field_records(&project, &records);
            info!(
                "Registry returned {} records for {}, {} field records",
                records.len(),
                site,
                fields.len()
            );
            let scope = replace.then_some(ReplaceScope::Project);
            let stats = reconciler
                .import_field_records(&project, &fields, scope)
                .await?;
            println!("{}", stats.display_string());
        }

        Command::Reconcile { project, all } => {
            let runs = match (project, all) {
                (Some(project), _) => vec![reconciler.reconcile_project(&project).await?],
                (None, true) => reconciler.reconcile_all().await?,
                (None, false) => bail!("either --project or --all is required"),
            };
            for run in &runs {
                println!(
                    "{}: {} ({} designs, {} written, {} pruned, {} errors)",
                    run.project_id,
                    run.state.as_str(),
                    run.designs_processed,
                    run.results_written,
                    run.results_pruned,
                    run.errors
                );
            }
        }

        Command::Link {
            project,
            design,
            field,
        } => {
            let result = reconciler.link_manual(&project, &design, &field).await?;
            println!(
                "Linked {} -> {} ({})",
                result.design_label, result.field_label, result.match_type
            );
        }

        Command::Report { project, out_dir } => {
            let report = reconciler.generate_report(project.as_deref()).await?;
            std::fs::create_dir_all(&out_dir)
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;

            let date = report.generated_at.format("%Y-%m-%d");
            let html_path = out_dir.join(format!("field-verification-{}.html", date));
            let csv_path = out_dir.join(format!("field-verification-{}.csv", date));
            std::fs::write(&html_path, render_html(&report))?;
            std::fs::write(&csv_path, render_csv(&export_rows(&report)))?;

            info!("Report summary: {}", report.summary.display_string());
            println!("Wrote {}", html_path.display());
            println!("Wrote {}", csv_path.display());
        }
    }

    Ok(())
}
