//! HTTP client for Ergast-compatible F1 APIs.

use super::cache::{CacheCategory, ResponseCache};
use super::retry::{retry, RetryConfig};
use super::wire::{ErgastResponse, WireRace};
use super::{DataProvider, ProviderError};
use crate::models::{Event, RaceResult};
use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection settings for the API.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL, without a trailing slash.
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Retries after the first failed attempt.
    pub retries: u32,
    /// Rows requested per page.
    pub page_size: usize,
    /// Cache lifetime for the running season and for schedules.
    pub current_ttl_hours: i64,
    /// Cache lifetime for completed seasons.
    pub archive_ttl_hours: i64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.jolpi.ca/ergast/f1".to_string(),
            timeout_seconds: 30,
            retries: 3,
            page_size: 100,
            current_ttl_hours: 6,
            archive_ttl_hours: 24 * 30,
        }
    }
}

/// Fetches and normalizes data from an Ergast-compatible endpoint.
pub struct ErgastProvider {
    config: ProviderConfig,
    http_client: reqwest::Client,
    cache: Option<ResponseCache>,
    retry: RetryConfig,
    current_season: i32,
}

impl ErgastProvider {
    /// Create a provider. Pass `None` to bypass the on-disk cache.
    pub fn new(config: ProviderConfig, cache: Option<ResponseCache>) -> Result<Self> {
        info!("Using data provider at {}", config.base_url);
        if let Some(ref cache) = cache {
            debug!("Response cache at {}", cache.base_dir().display());
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("f1stats/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            retry: RetryConfig::with_retries(config.retries),
            config,
            http_client,
            cache,
            current_season: Utc::now().year(),
        })
    }

    fn schedule_path(season: i32) -> String {
        format!("{}.json", season)
    }

    fn results_path(season: i32, round: Option<u32>) -> String {
        match round {
            Some(round) => format!("{}/{}/results.json", season, round),
            None => format!("{}/results.json", season),
        }
    }

    fn page_url(&self, path: &str, offset: usize) -> String {
        format!(
            "{}/{}?limit={}&offset={}",
            self.config.base_url.trim_end_matches('/'),
            path,
            self.config.page_size,
            offset
        )
    }

    fn ttl(&self, category: CacheCategory, season: i32) -> chrono::Duration {
        let hours = if category == CacheCategory::Schedule || season >= self.current_season {
            self.config.current_ttl_hours
        } else {
            self.config.archive_ttl_hours
        };
        chrono::Duration::hours(hours)
    }

    fn cached<T: DeserializeOwned>(
        &self,
        category: CacheCategory,
        key: &str,
        season: i32,
    ) -> Option<T> {
        self.cache
            .as_ref()
            .and_then(|cache| cache.get(category, key, self.ttl(category, season)))
    }

    fn store<T: Serialize>(&self, category: CacheCategory, key: &str, data: &T) {
        if let Some(ref cache) = self.cache {
            if let Err(e) = cache.set(category, key, data) {
                warn!("Failed to cache {}: {:#}", key, e);
            }
        }
    }

    /// Fetch a single page, mapping transport failures to provider errors.
    async fn get_page(&self, url: &str) -> Result<ErgastResponse, ProviderError> {
        debug!("GET {}", url);

        let response = self.http_client.get(url).send().await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("request timed out after {}s", self.config.timeout_seconds)
            } else if e.is_connect() {
                "connection failed".to_string()
            } else {
                e.to_string()
            };
            ProviderError::Network {
                url: url.to_string(),
                message,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json::<ErgastResponse>()
            .await
            .map_err(|e| ProviderError::Decode {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    /// Fetch every page of an endpoint and merge the races.
    ///
    /// Result pages are cut by row, so one race can span two pages.
    async fn fetch_races(&self, path: &str) -> Result<Vec<WireRace>, ProviderError> {
        let mut races: Vec<WireRace> = Vec::new();
        let mut offset = 0;

        loop {
            let url = self.page_url(path, offset);
            let page = retry(&self.retry, &url, ProviderError::is_retryable, || {
                self.get_page(&url)
            })
            .await?;

            let total = page.mr_data.total_rows();
            let next = page.mr_data.next_offset();

            merge_page(&mut races, page.mr_data.race_table.races);

            if next >= total || next <= offset {
                break;
            }
            offset = next;
        }

        Ok(races)
    }
}

/// Append a page of races, joining a race split across the page boundary.
fn merge_page(races: &mut Vec<WireRace>, page: Vec<WireRace>) {
    for race in page {
        let continues_last = races
            .last()
            .is_some_and(|last| last.season == race.season && last.round == race.round);
        if !continues_last {
            races.push(race);
        } else if let Some(last) = races.last_mut() {
            last.results.extend(race.results);
        }
    }
}

impl DataProvider for ErgastProvider {
    async fn fetch_schedule(&self, season: i32) -> Result<Vec<Event>, ProviderError> {
        let key = format!("schedule_{}", season);
        if let Some(events) = self.cached::<Vec<Event>>(CacheCategory::Schedule, &key, season) {
            return Ok(events);
        }

        let path = Self::schedule_path(season);
        let races = self.fetch_races(&path).await?;
        let events = races
            .iter()
            .map(WireRace::to_event)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| ProviderError::Decode {
                url: self.page_url(&path, 0),
                message,
            })?;

        if events.is_empty() {
            return Err(ProviderError::NotFound {
                what: format!("the {} schedule", season),
            });
        }

        info!("Fetched {} events for {}", events.len(), season);
        self.store(CacheCategory::Schedule, &key, &events);
        Ok(events)
    }

    async fn fetch_results(
        &self,
        season: i32,
        round: Option<u32>,
    ) -> Result<Vec<RaceResult>, ProviderError> {
        let key = match round {
            Some(round) => format!("results_{}_r{}", season, round),
            None => format!("results_{}", season),
        };
        if let Some(rows) = self.cached::<Vec<RaceResult>>(CacheCategory::Results, &key, season) {
            return Ok(rows);
        }

        let path = Self::results_path(season, round);
        let races = self.fetch_races(&path).await?;

        let mut rows = Vec::new();
        for race in &races {
            let race_rows = race.to_results().map_err(|message| ProviderError::Decode {
                url: self.page_url(&path, 0),
                message,
            })?;
            rows.extend(race_rows);
        }

        if rows.is_empty() {
            let what = match round {
                Some(round) => format!("{} round {}", season, round),
                None => format!("season {}", season),
            };
            return Err(ProviderError::NotFound { what });
        }

        info!("Fetched {} result rows for {}", rows.len(), key);
        self.store(CacheCategory::Results, &key, &rows);
        Ok(rows)
    }
}
