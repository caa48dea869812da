//! CLI entry point for the Olho Vivo monitor.
//!
//! One subcommand per process role: the two collectors run as long-lived
//! loops, `merge`, `report` and `monitor` are one-shot jobs meant for cron.

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use olhovivo_monitor::analyzers::analyzer::{Source, run_merge, run_report};
use olhovivo_monitor::analyzers::bunching::BunchingStrategy;
use olhovivo_monitor::catalog::LineCatalog;
use olhovivo_monitor::collect::{PositionCollector, PredictionCollector};
use olhovivo_monitor::config::Config;
use olhovivo_monitor::db;
use olhovivo_monitor::fetch::{BasicClient, OlhoVivoClient};
use olhovivo_monitor::monitor::check_health;
use olhovivo_monitor::output::{print_json, print_pretty};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "olhovivo_monitor")]
#[command(about = "Collects and analyses SPTrans Olho Vivo bus data", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true, default_value = "config/config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database file and its tables
    InitDb,
    /// Poll vehicle positions of the target lines
    CollectPositions {
        /// Number of cycles to run (0 = forever)
        #[arg(short = 'n', long, default_value_t = 0)]
        num_cycles: usize,
    },
    /// Poll arrival predictions of the target lines
    CollectPredictions {
        /// Number of cycles to run (0 = forever)
        #[arg(short = 'n', long, default_value_t = 0)]
        num_cycles: usize,
    },
    /// Rebuild the analysis table from the raw tables
    Merge {
        #[arg(short, long, default_value = "reports")]
        out_dir: PathBuf,
    },
    /// Run the detectors and write the report files
    Report {
        #[arg(short, long, value_enum, default_value_t = Source::Merged)]
        source: Source,

        #[arg(short, long, default_value = "reports")]
        out_dir: PathBuf,

        /// Overrides `detectors.bunching_strategy`
        #[arg(long, value_enum)]
        strategy: Option<BunchingStrategy>,
    },
    /// Check that both collectors are still feeding the database
    Monitor,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/olhovivo_monitor.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("olhovivo_monitor.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %cli.config.display(), error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    match cli.command {
        Commands::InitDb => {
            let pool = db::connect(&config.database_path).await?;
            db::init(&pool).await?;
            info!("Database ready");
        }
        Commands::CollectPositions { num_cycles } => {
            let (token, catalog) = collector_setup(&config)?;
            let targets = catalog.target_line_codes(&config.target_line_ids);
            if targets.is_empty() {
                error!(ids = ?config.target_line_ids, "None of the target line ids is in the catalog");
                anyhow::bail!("no target line codes to filter on");
            }
            info!(codes = ?targets, "Target line codes loaded");

            let http = BasicClient::new(Duration::from_secs(config.positions.timeout_secs))?;
            let collector = PositionCollector::new(
                OlhoVivoClient::new(http, &config.base_url),
                open_store(&config).await?,
                token,
                targets,
                config.positions.clone(),
                config.stats_csv.clone(),
            );
            collector.run(num_cycles).await;
        }
        Commands::CollectPredictions { num_cycles } => {
            config.validate()?;
            let token = config.require_token()?.to_string();

            let http = BasicClient::new(Duration::from_secs(config.predictions.timeout_secs))?;
            let collector = PredictionCollector::new(
                OlhoVivoClient::new(http, &config.base_url),
                open_store(&config).await?,
                token,
                config.target_line_ids.clone(),
                config.predictions.clone(),
                config.stats_csv.clone(),
            );
            collector.run(num_cycles).await;
        }
        Commands::Merge { out_dir } => {
            let pool = open_store(&config).await?;
            let centroids = run_merge(&pool, &out_dir, Local::now().naive_local()).await?;
            print_json(&centroids)?;
        }
        Commands::Report {
            source,
            out_dir,
            strategy,
        } => {
            let pool = open_store(&config).await?;
            let catalog = LineCatalog::load_or_empty(&config.line_catalog_path);

            let mut detectors = config.detectors.clone();
            if let Some(strategy) = strategy {
                detectors.bunching_strategy = strategy;
            }

            let analysis = run_report(&pool, &detectors, &catalog, source, &out_dir).await?;
            info!(path = %out_dir.join("report.md").display(), "Report ready");
            println!("{}", analysis.report);
        }
        Commands::Monitor => {
            let stale_after = chrono::Duration::minutes(config.monitor.stale_after_minutes);
            let problems = match db::connect(&config.database_path).await {
                Ok(pool) => check_health(&pool, Local::now().naive_local(), stale_after).await,
                Err(e) => {
                    error!(error = %e, "Could not open the database");
                    return Err(e);
                }
            };

            print_pretty(&problems);
            if problems.is_empty() {
                info!("Pipeline healthy");
            } else {
                for problem in &problems {
                    warn!(%problem, "Pipeline problem");
                }
                anyhow::bail!("{} pipeline problem(s) found", problems.len());
            }
        }
    }

    Ok(())
}

/// Token and catalog are both required before a position collector starts.
fn collector_setup(config: &Config) -> Result<(String, LineCatalog)> {
    config.validate()?;
    let token = config.require_token()?.to_string();
    let catalog = LineCatalog::load(&config.line_catalog_path)?;
    Ok((token, catalog))
}

/// Opens the store and makes sure the schema is current.
async fn open_store(config: &Config) -> Result<sqlx::SqlitePool> {
    let pool = db::connect(&config.database_path).await?;
    db::init(&pool).await?;
    Ok(pool)
}
