//! Orchestration between the data provider and the aggregator.
//!
//! The dashboard fetches what a command needs, hands the rows to the
//! [`StatsAggregator`] and returns typed outputs for the report layer.

use crate::models::{
    DriverComparisonReport, Event, GrandPrixSummary, RaceDigest, RaceKey, RaceResult,
    SeasonResultRow, SeasonStatTable,
};
use crate::provider::{DataProvider, ProviderError};
use crate::stats::StatsAggregator;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use futures::{stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Driver and team championship tables of one season.
#[derive(Debug, Clone, Serialize)]
pub struct Standings {
    pub drivers: SeasonStatTable,
    pub teams: SeasonStatTable,
}

/// Summary of a race with its calendar entry, when the schedule has one.
#[derive(Debug, Clone, Serialize)]
pub struct RaceSummary {
    pub event: Option<Event>,
    pub summary: GrandPrixSummary,
}

/// Everything written by a season export.
#[derive(Debug, Clone, Serialize)]
pub struct SeasonExport {
    pub season: i32,
    pub events: Vec<Event>,
    pub rows: Vec<SeasonResultRow>,
    pub standings: Standings,
}

pub struct Dashboard<P> {
    provider: P,
    aggregator: StatsAggregator,
    concurrency: usize,
}

/// The first event dated after `today`.
pub fn next_event(events: &[Event], today: NaiveDate) -> Option<&Event> {
    events
        .iter()
        .filter(|e| e.date > today)
        .min_by_key(|e| (e.date, e.round))
}

/// Season bounds in ascending order.
pub fn season_range(start: i32, end: i32) -> (i32, i32) {
    if start <= end {
        (start, end)
    } else {
        debug!("Swapping reversed season range {}-{}", start, end);
        (end, start)
    }
}

impl<P: DataProvider> Dashboard<P> {
    pub fn new(provider: P, aggregator: StatsAggregator, concurrency: usize) -> Self {
        Self {
            provider,
            aggregator,
            concurrency: concurrency.max(1),
        }
    }

    /// Season calendar in round order.
    pub async fn schedule(&self, season: i32) -> Result<Vec<Event>> {
        let mut events = self
            .provider
            .fetch_schedule(season)
            .await
            .with_context(|| format!("Failed to load the {} schedule", season))?;
        events.sort_by_key(|e| e.round);
        Ok(events)
    }

    /// Classified finishers first, then unclassified entries.
    pub async fn race_results(&self, season: i32, round: u32) -> Result<Vec<RaceResult>> {
        let mut rows = self.round_results(season, round).await?;
        rows.sort_by(|a, b| {
            a.sort_position()
                .cmp(&b.sort_position())
                .then_with(|| a.driver_code.cmp(&b.driver_code))
        });
        Ok(rows)
    }

    pub async fn fastest_lap(&self, season: i32, round: u32) -> Result<RaceResult> {
        let rows = self.round_results(season, round).await?;
        let fastest = self
            .aggregator
            .fastest_lap(&rows, RaceKey::new(season, round))?;
        Ok(fastest.clone())
    }

    pub async fn podiums(&self, season: i32) -> Result<SeasonStatTable> {
        let rows = self.season_results(season).await?;
        Ok(self.aggregator.podium_counts(&rows)?)
    }

    pub async fn dnfs(&self, season: i32) -> Result<SeasonStatTable> {
        let rows = self.season_results(season).await?;
        Ok(self.aggregator.dnf_counts(&rows)?)
    }

    pub async fn standings(&self, season: i32) -> Result<Standings> {
        let rows = self.season_results(season).await?;
        Ok(Standings {
            drivers: self.aggregator.driver_standings(&rows)?,
            teams: self.aggregator.team_standings(&rows)?,
        })
    }

    /// Head-to-head over a range of seasons.
    ///
    /// Seasons that fail to load are logged and left out; the comparison
    /// reports them as having no data.
    pub async fn compare(
        &self,
        driver_a: &str,
        driver_b: &str,
        start: i32,
        end: i32,
    ) -> Result<DriverComparisonReport> {
        let (start, end) = season_range(start, end);
        let driver_a = driver_a.trim().to_uppercase();
        let driver_b = driver_b.trim().to_uppercase();

        let fetched = self.fetch_seasons(start, end, None).await;
        if fetched.is_empty() {
            bail!("No results could be loaded for seasons {}-{}", start, end);
        }

        let rows: Vec<RaceResult> = fetched.into_iter().flat_map(|(_, rows)| rows).collect();
        let seasons: BTreeSet<i32> = (start..=end).collect();

        let report = self
            .aggregator
            .compare_drivers(&driver_a, &rows, &driver_b, &rows, &seasons)?;
        for year in &seasons {
            let incomplete = report
                .season(*year)
                .map_or(true, |s| s.driver_a.is_no_data() || s.driver_b.is_no_data());
            if incomplete {
                info!(
                    "Incomplete data for {} vs {} in {}",
                    report.driver_a, report.driver_b, year
                );
            }
        }
        Ok(report)
    }

    /// Grand Prix summary, joined with the schedule entry when available.
    pub async fn summary(&self, season: i32, round: u32) -> Result<RaceSummary> {
        let rows = self.round_results(season, round).await?;
        let summary = self
            .aggregator
            .grand_prix_summary(&rows, RaceKey::new(season, round))?;

        let event = match self.provider.fetch_schedule(season).await {
            Ok(events) => events.into_iter().find(|e| e.round == round),
            Err(e) => {
                warn!("Schedule for {} unavailable: {}", season, e);
                None
            }
        };

        Ok(RaceSummary { event, summary })
    }

    /// Full season rows with running totals, plus both standings tables.
    pub async fn season_export(&self, season: i32) -> Result<SeasonExport> {
        let rows = self.season_results(season).await?;
        let events = match self.provider.fetch_schedule(season).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Schedule for {} unavailable: {}", season, e);
                Vec::new()
            }
        };

        Ok(SeasonExport {
            season,
            rows: self.aggregator.cumulative_points(&rows)?,
            standings: Standings {
                drivers: self.aggregator.driver_standings(&rows)?,
                teams: self.aggregator.team_standings(&rows)?,
            },
            events,
        })
    }

    /// One digest per race across a range of seasons.
    pub async fn history(
        &self,
        start: i32,
        end: i32,
        show_progress: bool,
    ) -> Result<Vec<RaceDigest>> {
        let (start, end) = season_range(start, end);

        let progress_bar = if show_progress {
            let pb = ProgressBar::new((end - start + 1) as u64);
            let style = ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} seasons",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-");
            pb.set_style(style);
            Some(pb)
        } else {
            None
        };

        let fetched = self.fetch_seasons(start, end, progress_bar.as_ref()).await;
        if let Some(pb) = progress_bar {
            pb.finish_with_message("History loaded");
        }
        if fetched.is_empty() {
            bail!("No results could be loaded for seasons {}-{}", start, end);
        }

        let mut digests = Vec::new();
        for (season, rows) in fetched {
            let events = match self.provider.fetch_schedule(season).await {
                Ok(events) => events,
                Err(e) => {
                    warn!("Schedule for {} unavailable: {}", season, e);
                    Vec::new()
                }
            };
            digests.extend(self.aggregator.race_digests(&events, &rows)?);
        }

        info!("Collected {} races between {} and {}", digests.len(), start, end);
        Ok(digests)
    }

    async fn round_results(&self, season: i32, round: u32) -> Result<Vec<RaceResult>> {
        self.provider
            .fetch_results(season, Some(round))
            .await
            .with_context(|| format!("Failed to load results for {} round {}", season, round))
    }

    async fn season_results(&self, season: i32) -> Result<Vec<RaceResult>> {
        self.provider
            .fetch_results(season, None)
            .await
            .with_context(|| format!("Failed to load results for {}", season))
    }

    /// Fetch whole seasons concurrently, in season order. Failures are skipped.
    async fn fetch_seasons(
        &self,
        start: i32,
        end: i32,
        progress: Option<&ProgressBar>,
    ) -> Vec<(i32, Vec<RaceResult>)> {
        let outcomes: Vec<(i32, Result<Vec<RaceResult>, ProviderError>)> =
            stream::iter(start..=end)
                .map(|season| async move {
                    let outcome = self.provider.fetch_results(season, None).await;
                    if let Some(pb) = progress {
                        pb.inc(1);
                    }
                    (season, outcome)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        outcomes
            .into_iter()
            .filter_map(|(season, outcome)| match outcome {
                Ok(rows) => Some((season, rows)),
                Err(e) => {
                    warn!("Skipping season {}: {}", season, e);
                    None
                }
            })
            .collect()
    }
}
