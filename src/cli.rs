//! Command-line interface argument parsing.
//!
//! Flags map onto a single [`Action`]; option flags override the
//! `.f1stats.toml` configuration.

use chrono::{Datelike, Utc};
use clap::Parser;
use std::path::PathBuf;

/// First season of the world championship.
pub const FIRST_SEASON: i32 = 1950;

/// f1stats - Formula 1 statistics from the command line
///
/// Fetches schedules and race results from an Ergast-compatible API,
/// computes podium, DNF, standings and head-to-head statistics, and
/// exports them as tables, JSON or CSV.
///
/// Examples:
///   f1stats --schedule 2024
///   f1stats --results 2023 5 --save-csv
///   f1stats --compare VER HAM 2021 2023 --format json
///   f1stats --export-history 2010 2020
///   f1stats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Show the race calendar (defaults to the current season)
    #[arg(long, value_name = "YEAR", num_args = 0..=1)]
    pub schedule: Option<Option<i32>>,

    /// Show the classification of one race
    #[arg(long, num_args = 2, value_names = ["YEAR", "ROUND"])]
    pub results: Option<Vec<i32>>,

    /// Show the fastest lap of one race
    #[arg(long, num_args = 2, value_names = ["YEAR", "ROUND"])]
    pub fastest: Option<Vec<i32>>,

    /// Count podium finishes per driver for a season
    #[arg(long, value_name = "YEAR")]
    pub podiums: Option<i32>,

    /// Count retirements per driver for a season
    #[arg(long, value_name = "YEAR")]
    pub dnfs: Option<i32>,

    /// Driver and team standings for a season
    #[arg(long, value_name = "YEAR")]
    pub standings: Option<i32>,

    /// Compare two drivers across a range of seasons
    ///
    /// Example: --compare VER HAM 2021 2023
    #[arg(long, num_args = 4, value_names = ["DRIVER1", "DRIVER2", "START", "END"])]
    pub compare: Option<Vec<String>>,

    /// Summarize one Grand Prix
    #[arg(long, num_args = 2, value_names = ["YEAR", "ROUND"])]
    pub summary: Option<Vec<i32>>,

    /// Export a full season with cumulative points and standings to CSV
    #[arg(long, value_name = "YEAR")]
    pub export_season: Option<i32>,

    /// Export one line per race across a range of seasons to CSV
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    pub export_history: Option<Vec<i32>>,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Also save the displayed table as CSV
    #[arg(long)]
    pub save_csv: bool,

    /// Directory for CSV exports
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// List drivers with a zero count in podium and DNF tables
    #[arg(long)]
    pub include_zero: bool,

    /// Fail on the first malformed result row instead of skipping it
    #[arg(long)]
    pub strict: bool,

    /// Count disqualifications as DNFs
    #[arg(long)]
    pub count_dsq: bool,

    /// Bypass the on-disk response cache
    #[arg(long)]
    pub no_cache: bool,

    /// Delete the response cache before running
    #[arg(long)]
    pub clear_cache: bool,

    /// Response cache directory
    #[arg(long, value_name = "DIR", env = "F1STATS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Base URL of the Ergast-compatible API
    #[arg(long, value_name = "URL", env = "F1STATS_BASE_URL")]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Number of seasons fetched concurrently
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .f1stats.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .f1stats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for console results.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Bordered text tables (default)
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
}

/// The single command a run performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Schedule(Option<i32>),
    Results { season: i32, round: u32 },
    FastestLap { season: i32, round: u32 },
    Podiums(i32),
    Dnfs(i32),
    Standings(i32),
    Compare {
        driver_a: String,
        driver_b: String,
        start: i32,
        end: i32,
    },
    Summary { season: i32, round: u32 },
    ExportSeason(i32),
    ExportHistory { start: i32, end: i32 },
}

fn latest_season() -> i32 {
    Utc::now().year()
}

fn check_season(season: i32) -> Result<i32, String> {
    let latest = latest_season();
    if !(FIRST_SEASON..=latest + 1).contains(&season) {
        return Err(format!(
            "Season must be between {} and {}, got {}",
            FIRST_SEASON,
            latest + 1,
            season
        ));
    }
    Ok(season)
}

fn check_race(values: &[i32]) -> Result<(i32, u32), String> {
    let season = check_season(values[0])?;
    let round = u32::try_from(values[1])
        .ok()
        .filter(|r| (1..=30).contains(r))
        .ok_or_else(|| format!("Round must be between 1 and 30, got {}", values[1]))?;
    Ok((season, round))
}

fn check_driver(code: &str) -> Result<String, String> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("Driver code must be letters only, got '{}'", code));
    }
    Ok(code.to_uppercase())
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The requested action. No action flag means the current schedule.
    pub fn action(&self) -> Result<Action, String> {
        let mut actions = Vec::new();

        if let Some(season) = self.schedule {
            actions.push(Action::Schedule(season.map(check_season).transpose()?));
        }
        if let Some(ref values) = self.results {
            let (season, round) = check_race(values)?;
            actions.push(Action::Results { season, round });
        }
        if let Some(ref values) = self.fastest {
            let (season, round) = check_race(values)?;
            actions.push(Action::FastestLap { season, round });
        }
        if let Some(season) = self.podiums {
            actions.push(Action::Podiums(check_season(season)?));
        }
        if let Some(season) = self.dnfs {
            actions.push(Action::Dnfs(check_season(season)?));
        }
        if let Some(season) = self.standings {
            actions.push(Action::Standings(check_season(season)?));
        }
        if let Some(ref values) = self.compare {
            let parse_year = |text: &str| {
                text.trim()
                    .parse::<i32>()
                    .map_err(|_| format!("Invalid season '{}'", text))
                    .and_then(check_season)
            };
            actions.push(Action::Compare {
                driver_a: check_driver(&values[0])?,
                driver_b: check_driver(&values[1])?,
                start: parse_year(&values[2])?,
                end: parse_year(&values[3])?,
            });
        }
        if let Some(ref values) = self.summary {
            let (season, round) = check_race(values)?;
            actions.push(Action::Summary { season, round });
        }
        if let Some(season) = self.export_season {
            actions.push(Action::ExportSeason(check_season(season)?));
        }
        if let Some(ref values) = self.export_history {
            actions.push(Action::ExportHistory {
                start: check_season(values[0])?,
                end: check_season(values[1])?,
            });
        }

        match actions.len() {
            0 => Ok(Action::Schedule(None)),
            1 => Ok(actions.remove(0)),
            _ => Err("Only one action flag may be given per run".to_string()),
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        self.action()?;

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.no_cache && self.clear_cache {
            return Err("Cannot use both --no-cache and --clear-cache".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings. `--quiet` wins over
    /// a config file that asks for verbose output.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            schedule: None,
            results: None,
            fastest: None,
            podiums: None,
            dnfs: None,
            standings: None,
            compare: None,
            summary: None,
            export_season: None,
            export_history: None,
            format: None,
            save_csv: false,
            output_dir: None,
            include_zero: false,
            strict: false,
            count_dsq: false,
            no_cache: false,
            clear_cache: false,
            cache_dir: None,
            base_url: None,
            timeout: None,
            concurrency: None,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_default_action_is_current_schedule() {
        let args = make_args();
        assert_eq!(args.action().unwrap(), Action::Schedule(None));
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from(["f1stats", "--compare", "ver", "ham", "2021", "2023"])
            .unwrap();
        assert_eq!(
            args.action().unwrap(),
            Action::Compare {
                driver_a: "VER".to_string(),
                driver_b: "HAM".to_string(),
                start: 2021,
                end: 2023,
            }
        );

        let args = Args::try_parse_from(["f1stats", "--results", "2023", "5", "--save-csv"]).unwrap();
        assert_eq!(
            args.action().unwrap(),
            Action::Results {
                season: 2023,
                round: 5
            }
        );
        assert!(args.save_csv);
    }

    #[test]
    fn test_schedule_without_year() {
        let args = Args::try_parse_from(["f1stats", "--schedule"]).unwrap();
        assert_eq!(args.schedule, Some(None));
        assert_eq!(args.action().unwrap(), Action::Schedule(None));

        let args = Args::try_parse_from(["f1stats", "--schedule", "2022"]).unwrap();
        assert_eq!(args.action().unwrap(), Action::Schedule(Some(2022)));
    }

    #[test]
    fn test_validation_rejects_two_actions() {
        let mut args = make_args();
        args.podiums = Some(2023);
        args.dnfs = Some(2023);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_season_and_round_bounds() {
        let mut args = make_args();
        args.podiums = Some(1900);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.summary = Some(vec![2023, 0]);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.summary = Some(vec![2023, 3]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_bad_driver_code() {
        let mut args = make_args();
        args.compare = Some(vec![
            "VER".to_string(),
            "H4M".to_string(),
            "2021".to_string(),
            "2022".to_string(),
        ]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.base_url = Some("ftp://example.com".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
