mod db;
mod enrich;
mod error;
mod extract;
mod ingest;
mod registry;
mod render;
mod report;
mod settings;
mod snapshot;
mod value;
mod viewer;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::registry::Registry;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "dom6_ingest", about = "Dominions 6 inspector ingestion into SQLite")]
struct Cli {
    /// SQLite database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Folder holding one snapshot directory per category
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// JSON file mapping category -> ordered field list
    #[arg(long, global = true)]
    categories: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create category tables and snapshot folders
    Init,
    /// Render every entity in the inspector and upsert it
    Ingest {
        /// Inspector URL (default: http://localhost:8001/?loadEvents=1)
        #[arg(long)]
        url: Option<String>,
        /// Only these categories, in this order (e.g. spell,site)
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
        /// Wait for the inspector to answer HTTP before launching the browser
        #[arg(long)]
        wait_viewer: bool,
    },
    /// Row and snapshot counts per category
    Stats,
    /// Print the active category registry
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load().context("Failed to load settings")?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }
    if let Some(file) = cli.categories {
        settings.categories_file = Some(file);
    }

    let registry = match &settings.categories_file {
        Some(path) => Registry::load(path)?,
        None => Registry::builtin(),
    };

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn, &registry)?;
            snapshot::ensure_dirs(&settings.data_dir, &registry)?;
            println!(
                "Initialised {} tables in {:?}, snapshots under {:?}",
                registry.specs().len(),
                settings.db_path,
                settings.data_dir
            );
            Ok(())
        }
        Commands::Ingest { url, only, headful, wait_viewer } => {
            if let Some(url) = url {
                settings.viewer_url = url;
            }
            if headful {
                settings.headless = false;
            }
            let plan = if only.is_empty() { registry.names() } else { only };
            run_ingest(&settings, &registry, &plan, wait_viewer).await
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            let counts = db::row_counts(&conn, &registry)?;
            println!("{:<8} | {:>6} | {:>9}", "Table", "Rows", "Snapshots");
            println!("{}", "-".repeat(30));
            for (spec, c) in registry.specs().iter().zip(&counts) {
                let snaps = snapshot::count(&settings.data_dir, spec.category);
                println!("{:<8} | {:>6} | {:>9}", c.table, c.rows, snaps);
            }
            Ok(())
        }
        Commands::Categories => {
            for spec in registry.specs() {
                println!("{:<6} -> {:<7} ({})", spec.category, spec.table(), spec.fields.join(", "));
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

#[cfg(feature = "chromium")]
async fn run_ingest(
    settings: &Settings,
    registry: &Registry,
    plan: &[String],
    wait_viewer: bool,
) -> anyhow::Result<()> {
    use crate::enrich::EnrichTables;
    use crate::ingest::Ingestor;
    use crate::render::chromium::{ChromiumHost, ChromiumOptions};
    use crate::render::RenderHost;

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn, registry)?;
    snapshot::ensure_dirs(&settings.data_dir, registry)?;

    if wait_viewer {
        viewer::wait_until_reachable(
            &settings.viewer_url,
            settings.probe_attempts,
            settings.probe_delay(),
        )
        .await?;
    }

    let mut host = ChromiumHost::launch(&ChromiumOptions {
        headless: settings.headless,
        width: settings.viewport_width,
        height: settings.viewport_height,
        poll_interval: settings.poll_interval(),
    })
    .await?;
    host.navigate(&settings.viewer_url)
        .await
        .with_context(|| format!("could not open {}", settings.viewer_url))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing current entity");
            on_signal.cancel();
        }
    });

    let tables = EnrichTables::default();
    let options = settings.ingest_options();
    let report = Ingestor::new(&mut host, &conn, registry, &tables, &options, cancel)
        .run(plan)
        .await;

    if let Err(e) = host.close().await {
        warn!("{}", e);
    }
    info!("Ingestion finished: {} rows persisted", report.persisted());
    report.print();
    Ok(())
}

#[cfg(not(feature = "chromium"))]
async fn run_ingest(
    _settings: &Settings,
    _registry: &Registry,
    _plan: &[String],
    _wait_viewer: bool,
) -> anyhow::Result<()> {
    anyhow::bail!("built without the `chromium` feature; no render host available")
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
