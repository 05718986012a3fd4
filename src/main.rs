//! f1stats - Formula 1 statistics from the command line
//!
//! Fetches race data from an Ergast-compatible API, aggregates it into
//! podium, DNF, standings and head-to-head tables, and renders or exports
//! the results.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (network, config, missing data, etc.)
//!   2 - Usage error (invalid flags or values)

mod cli;
mod config;
mod dashboard;
mod models;
mod provider;
mod report;
mod stats;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use cli::{Action, Args, OutputFormat};
use config::{Config, CONFIG_FILE};
use dashboard::{next_event, season_range, Dashboard};
use provider::{ErgastProvider, ResponseCache};
use report::{console, csv_export};
use serde::Serialize;
use stats::StatsAggregator;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration first so its verbosity can drive logging
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("f1stats v{}", env!("CARGO_PKG_VERSION"));
    source.log();
    debug!("Arguments: {:?}", args);

    match run(args, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .f1stats.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize the data source, cache and report options.");
    Ok(())
}

/// Initialize logging based on verbosity settings. `RUST_LOG` takes precedence.
fn init_logging(level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Where the configuration came from. Reported once logging is up.
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    Unreadable(anyhow::Error),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => info!("Loaded default config from {}", CONFIG_FILE),
            ConfigSource::Builtin => debug!("No config file found, using defaults"),
            ConfigSource::Unreadable(e) => warn!("Failed to load config: {:#}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigSource::Builtin)),
        Err(e) => Ok((Config::default(), ConfigSource::Unreadable(e))),
    }
}

/// Print a result as JSON or as a rendered table.
fn emit<T: Serialize + ?Sized>(format: OutputFormat, value: &T, table: impl FnOnce() -> String) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", report::to_json(value)?),
        OutputFormat::Table => println!("{}", table()),
    }
    Ok(())
}

fn saved(path: &Path) {
    println!("💾 Saved {}", path.display());
}

async fn run(args: Args, config: Config) -> Result<()> {
    let cache = if config.cache.enabled {
        Some(ResponseCache::new(config.cache.dir.clone()))
    } else {
        info!("Response cache disabled");
        None
    };

    if args.clear_cache {
        let target = ResponseCache::new(config.cache.dir.clone());
        target.clear_all().context("Failed to clear the response cache")?;
        println!("🧹 Cleared cache at {}", target.base_dir().display());
    }

    let provider = ErgastProvider::new(config.provider_config(), cache)?;
    let dashboard = Dashboard::new(
        provider,
        StatsAggregator::new(config.aggregate_options()),
        config.general.concurrency,
    );

    let action = args.action().map_err(anyhow::Error::msg)?;
    let format = config.report.format;
    let out_dir = config.general.output_dir.clone();

    match action {
        Action::Schedule(season) => {
            let season = season.unwrap_or_else(|| Utc::now().year());
            let events = dashboard.schedule(season).await?;
            let today = Utc::now().date_naive();
            emit(format, &events, || {
                console::render_schedule(season, &events, next_event(&events, today))
            })?;
        }

        Action::Results { season, round } => {
            let results = dashboard.race_results(season, round).await?;
            emit(format, &results, || console::render_results(season, round, &results))?;
            if args.save_csv {
                let path = csv_export::export_path(&out_dir, &csv_export::race_results_file(season, round))?;
                csv_export::write_race_results(&results, &path)?;
                saved(&path);
            }
        }

        Action::FastestLap { season, round } => {
            let fastest = dashboard.fastest_lap(season, round).await?;
            emit(format, &fastest, || console::render_fastest_lap(&fastest))?;
        }

        Action::Podiums(season) => {
            let table = dashboard.podiums(season).await?;
            emit(format, &table, || console::render_stat_table("🥇 Podiums", &table))?;
            if args.save_csv {
                let path = csv_export::export_path(&out_dir, &csv_export::podiums_file(season))?;
                csv_export::write_stat_table(&table, &path)?;
                saved(&path);
            }
        }

        Action::Dnfs(season) => {
            let table = dashboard.dnfs(season).await?;
            emit(format, &table, || console::render_stat_table("💥 DNFs", &table))?;
            if args.save_csv {
                let path = csv_export::export_path(&out_dir, &csv_export::dnfs_file(season))?;
                csv_export::write_stat_table(&table, &path)?;
                saved(&path);
            }
        }

        Action::Standings(season) => {
            let standings = dashboard.standings(season).await?;
            emit(format, &standings, || console::render_standings(&standings))?;
            if args.save_csv {
                let path =
                    csv_export::export_path(&out_dir, &csv_export::driver_standings_file(season))?;
                csv_export::write_stat_table(&standings.drivers, &path)?;
                saved(&path);
                let path =
                    csv_export::export_path(&out_dir, &csv_export::team_standings_file(season))?;
                csv_export::write_stat_table(&standings.teams, &path)?;
                saved(&path);
            }
        }

        Action::Compare {
            driver_a,
            driver_b,
            start,
            end,
        } => {
            let report = dashboard.compare(&driver_a, &driver_b, start, end).await?;
            emit(format, &report, || console::render_comparison(&report))?;
            if args.save_csv {
                let (start, end) = season_range(start, end);
                let name = csv_export::comparison_file(&driver_a, &driver_b, start, end);
                let path = csv_export::export_path(&out_dir, &name)?;
                csv_export::write_comparison(&report, &path)?;
                saved(&path);
            }
        }

        Action::Summary { season, round } => {
            let summary = dashboard.summary(season, round).await?;
            emit(format, &summary, || console::render_summary(&summary))?;
        }

        Action::ExportSeason(season) => {
            println!("📦 Exporting the {} season...", season);
            let export = dashboard.season_export(season).await?;

            let path = csv_export::export_path(&out_dir, &csv_export::season_results_file(season))?;
            csv_export::write_season_results(&export.rows, &export.events, &path)?;
            saved(&path);

            let path = csv_export::export_path(&out_dir, &csv_export::driver_standings_file(season))?;
            csv_export::write_stat_table(&export.standings.drivers, &path)?;
            saved(&path);

            let path = csv_export::export_path(&out_dir, &csv_export::team_standings_file(season))?;
            csv_export::write_stat_table(&export.standings.teams, &path)?;
            saved(&path);

            if format == OutputFormat::Json {
                println!("{}", report::to_json(&export)?);
            }
        }

        Action::ExportHistory { start, end } => {
            let (start, end) = season_range(start, end);
            println!("📚 Exporting races from {} to {}...", start, end);
            let digests = dashboard.history(start, end, !args.quiet).await?;

            let path = csv_export::export_path(&out_dir, &csv_export::history_file(start, end))?;
            csv_export::write_history(&digests, &path)?;
            println!("✅ {} races exported.", digests.len());
            saved(&path);
        }
    }

    Ok(())
}
