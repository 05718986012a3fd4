//! Configuration file handling.
//!
//! Settings are read from `.f1stats.toml`; command-line flags override them.

use crate::cli::{Args, OutputFormat};
use crate::provider::ProviderConfig;
use crate::stats::{AggregateOptions, InclusionPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".f1stats.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    /// Data provider settings.
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Aggregation and output settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory for CSV exports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of seasons fetched concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Ergast-compatible API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries on transient failures.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Rows per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
            page_size: default_page_size(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.jolpi.ca/ergast/f1".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_page_size() -> usize {
    100 // the public API caps pages at 100 rows
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Lifetime of schedules and current-season results.
    #[serde(default = "default_current_ttl")]
    pub current_ttl_hours: i64,

    /// Lifetime of completed-season results.
    #[serde(default = "default_archive_ttl")]
    pub archive_ttl_hours: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            current_ttl_hours: default_current_ttl(),
            archive_ttl_hours: default_archive_ttl(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("f1_cache")
}

fn default_current_ttl() -> i64 {
    6
}

fn default_archive_ttl() -> i64 {
    24 * 30
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// List zero counts in podium and DNF tables.
    #[serde(default)]
    pub include_zero: bool,

    /// Fail on malformed rows instead of skipping them.
    #[serde(default)]
    pub strict: bool,

    /// Count disqualifications as DNFs.
    #[serde(default)]
    pub count_disqualified: bool,

    #[serde(default)]
    pub format: OutputFormat,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// Only explicitly given flags override the file.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref dir) = args.output_dir {
            self.general.output_dir = dir.clone();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if args.verbose {
            self.general.verbose = true;
        }

        if let Some(ref url) = args.base_url {
            self.provider.base_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.provider.timeout_seconds = timeout;
        }

        if args.no_cache {
            self.cache.enabled = false;
        }
        if let Some(ref dir) = args.cache_dir {
            self.cache.dir = dir.clone();
        }

        if args.include_zero {
            self.report.include_zero = true;
        }
        if args.strict {
            self.report.strict = true;
        }
        if args.count_dsq {
            self.report.count_disqualified = true;
        }
        if let Some(format) = args.format {
            self.report.format = format;
        }
    }

    /// Aggregation policies selected by this configuration.
    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            strict: self.report.strict,
            inclusion: if self.report.include_zero {
                InclusionPolicy::IncludeZero
            } else {
                InclusionPolicy::NonZeroOnly
            },
            dnf_includes_disqualified: self.report.count_disqualified,
        }
    }

    /// Provider connection settings.
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            base_url: self.provider.base_url.clone(),
            timeout_seconds: self.provider.timeout_seconds,
            retries: self.provider.retries,
            page_size: self.provider.page_size.clamp(1, 100),
            current_ttl_hours: self.cache.current_ttl_hours,
            archive_ttl_hours: self.cache.archive_ttl_hours,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
