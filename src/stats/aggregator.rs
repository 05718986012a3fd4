//! Race result aggregation and statistics.
//!
//! Every operation here is a pure function over a borrowed slice of
//! [`RaceResult`] rows. Nothing is fetched, cached or written; the caller
//! hands in whatever the data provider returned and gets back an ordered,
//! provider-agnostic table.

use crate::models::{
    DriverComparisonReport, DriverSeasonStats, Event, GrandPrixSummary, Metric, RaceDigest,
    RaceKey, RaceResult, RaceStatus, SeasonComparison, SeasonResultRow, SeasonStatTable,
    SkippedRow, StatMetric, StatRow, StatSubject, StatValue,
};
use crate::stats::error::{StatsError, StatsResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

/// Whether drivers with a zero count appear in podium/DNF tables.
///
/// Drivers without any row in the input never appear, whichever policy is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionPolicy {
    #[default]
    NonZeroOnly,
    IncludeZero,
}

/// Knobs for the aggregator. All policies are explicit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Fail the whole operation on the first malformed row instead of skipping it.
    pub strict: bool,
    pub inclusion: InclusionPolicy,
    /// Count disqualifications as DNFs.
    pub dnf_includes_disqualified: bool,
}

/// Stateless statistics engine.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    options: AggregateOptions,
}

/// Input rows split into usable rows and rejected ones.
struct Screened<'a> {
    rows: Vec<&'a RaceResult>,
    skipped: Vec<SkippedRow>,
}

#[derive(Default)]
struct Tally {
    points: f64,
    wins: u32,
}

impl StatsAggregator {
    pub fn new(options: AggregateOptions) -> Self {
        Self { options }
    }

    /// Count top-three finishes per driver.
    pub fn podium_counts(&self, results: &[RaceResult]) -> StatsResult<SeasonStatTable> {
        let screened = self.screen(results)?;
        Ok(self.count_table(screened, StatMetric::Podiums, |r| r.is_podium()))
    }

    /// Count retirements per driver.
    pub fn dnf_counts(&self, results: &[RaceResult]) -> StatsResult<SeasonStatTable> {
        let screened = self.screen(results)?;
        Ok(self.count_table(screened, StatMetric::Dnfs, |r| self.is_dnf(r)))
    }

    /// The row holding the quickest recorded lap of a race.
    pub fn fastest_lap<'a>(
        &self,
        results: &'a [RaceResult],
        race: RaceKey,
    ) -> StatsResult<&'a RaceResult> {
        let screened = self.screen(results)?;
        let race_rows: Vec<&RaceResult> = screened
            .rows
            .into_iter()
            .filter(|r| r.race() == race)
            .collect();

        if race_rows.is_empty() {
            return Err(StatsError::not_found(race.to_string()));
        }

        quickest(race_rows.iter().copied())
            .ok_or_else(|| StatsError::not_found(format!("a recorded lap time in {}", race)))
    }

    /// Head-to-head comparison of two drivers over a set of seasons.
    ///
    /// For each season both drivers are measured over the same rounds: those
    /// present in both `results_a` and `results_b`. A driver without rows in
    /// those rounds gets [`Metric::NoData`], never zero.
    pub fn compare_drivers(
        &self,
        driver_a: &str,
        results_a: &[RaceResult],
        driver_b: &str,
        results_b: &[RaceResult],
        seasons: &BTreeSet<i32>,
    ) -> StatsResult<DriverComparisonReport> {
        if seasons.is_empty() {
            return Err(StatsError::not_found("any season (none requested)"));
        }

        let a = self.screen(results_a)?;
        let b = self.screen(results_b)?;

        for (driver, screened) in [(driver_a, &a), (driver_b, &b)] {
            let present = screened
                .rows
                .iter()
                .any(|r| r.driver_code == driver && seasons.contains(&r.season));
            if !present {
                return Err(StatsError::not_found(format!(
                    "driver {} in seasons {}",
                    driver,
                    season_list(seasons)
                )));
            }
        }

        let mut comparisons = Vec::with_capacity(seasons.len());
        for &season in seasons {
            let covered_a = rounds_in_season(&a.rows, season);
            let covered_b = rounds_in_season(&b.rows, season);
            let rounds: BTreeSet<u32> = covered_a.intersection(&covered_b).copied().collect();

            let entry = SeasonComparison {
                season,
                rounds: rounds.iter().copied().collect(),
                driver_a: self.driver_season(&a.rows, driver_a, season, &rounds),
                driver_b: self.driver_season(&b.rows, driver_b, season, &rounds),
            };

            debug!(
                "Compared {} vs {} in {} over {} rounds",
                driver_a,
                driver_b,
                season,
                entry.rounds.len()
            );
            comparisons.push(entry);
        }

        let mut skipped = a.skipped;
        if !std::ptr::eq(results_a, results_b) {
            skipped.extend(b.skipped);
        }

        Ok(DriverComparisonReport {
            driver_a: driver_a.to_string(),
            driver_b: driver_b.to_string(),
            seasons: comparisons,
            skipped,
        })
    }

    /// Winner, podium, fastest lap, team points and retirements of one race.
    pub fn grand_prix_summary(
        &self,
        results: &[RaceResult],
        race: RaceKey,
    ) -> StatsResult<GrandPrixSummary> {
        let screened = self.screen(results)?;
        let mut race_rows: Vec<&RaceResult> = screened
            .rows
            .into_iter()
            .filter(|r| r.race() == race)
            .collect();

        if race_rows.is_empty() {
            return Err(StatsError::not_found(race.to_string()));
        }

        race_rows.sort_by(|a, b| by_position(a, b));

        let winner = race_rows.iter().find(|r| r.is_win()).map(|r| (*r).clone());
        let podium: Vec<RaceResult> = race_rows
            .iter()
            .filter(|r| r.is_podium())
            .take(3)
            .map(|r| (*r).clone())
            .collect();
        let fastest_lap = quickest(race_rows.iter().copied()).cloned();

        let mut team_totals: BTreeMap<&str, f64> = BTreeMap::new();
        for row in &race_rows {
            *team_totals.entry(row.team_name.as_str()).or_default() += row.points;
        }
        let mut teams: Vec<(&str, f64)> = team_totals.into_iter().collect();
        teams.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let team_points = teams
            .into_iter()
            .enumerate()
            .map(|(i, (team, points))| StatRow {
                rank: i + 1,
                key: team.to_string(),
                value: StatValue::Points(points),
                wins: None,
            })
            .collect();

        let retirements = race_rows
            .iter()
            .filter(|r| r.status.as_ref().is_some_and(|s| !s.is_finish()))
            .map(|r| (*r).clone())
            .collect();

        Ok(GrandPrixSummary {
            race,
            winner,
            podium,
            fastest_lap,
            team_points,
            retirements,
            skipped: screened.skipped,
        })
    }

    /// Driver championship table over every round present.
    pub fn driver_standings(&self, results: &[RaceResult]) -> StatsResult<SeasonStatTable> {
        self.standings(results, StatSubject::Driver)
    }

    /// Constructor championship table over every round present.
    pub fn team_standings(&self, results: &[RaceResult]) -> StatsResult<SeasonStatTable> {
        self.standings(results, StatSubject::Team)
    }

    /// Every row in race order, annotated with the driver's running season total.
    pub fn cumulative_points(&self, results: &[RaceResult]) -> StatsResult<Vec<SeasonResultRow>> {
        let mut rows = self.screen(results)?.rows;
        rows.sort_by(|a, b| {
            a.race()
                .cmp(&b.race())
                .then_with(|| by_position(a, b))
        });

        let mut running: HashMap<(i32, &str), f64> = HashMap::new();
        Ok(rows
            .into_iter()
            .map(|row| {
                let total = running
                    .entry((row.season, row.driver_code.as_str()))
                    .or_default();
                *total += row.points;
                SeasonResultRow {
                    result: row.clone(),
                    cumulative_points: *total,
                }
            })
            .collect())
    }

    /// One digest per race that has result rows, joined with its schedule entry.
    pub fn race_digests(
        &self,
        events: &[Event],
        results: &[RaceResult],
    ) -> StatsResult<Vec<RaceDigest>> {
        let screened = self.screen(results)?;

        let mut by_race: BTreeMap<RaceKey, Vec<&RaceResult>> = BTreeMap::new();
        for row in screened.rows {
            by_race.entry(row.race()).or_default().push(row);
        }

        Ok(by_race
            .into_iter()
            .map(|(race, rows)| {
                let event = events.iter().find(|e| e.race() == race);
                let winner = rows.iter().find(|r| r.is_win());
                let fastest = quickest(rows.iter().copied());

                RaceDigest {
                    race,
                    name: event
                        .map(|e| e.name.clone())
                        .unwrap_or_else(|| format!("Round {}", race.round)),
                    date: event.map(|e| e.date),
                    circuit: event.map(|e| e.circuit.clone()).unwrap_or_default(),
                    country: event.map(|e| e.country.clone()).unwrap_or_default(),
                    winner: winner.map(|w| w.driver_name.clone()),
                    winning_team: winner.map(|w| w.team_name.clone()),
                    fastest_lap_driver: fastest.map(|f| f.driver_code.clone()),
                    fastest_lap_time: fastest.and_then(|f| f.fastest_lap_time),
                }
            })
            .collect())
    }

    fn standings(
        &self,
        results: &[RaceResult],
        subject: StatSubject,
    ) -> StatsResult<SeasonStatTable> {
        let screened = self.screen(results)?;
        let seasons = seasons_of(&screened.rows);

        let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
        for row in &screened.rows {
            let key = match subject {
                StatSubject::Driver => row.driver_code.as_str(),
                StatSubject::Team => row.team_name.as_str(),
            };
            let tally = tallies.entry(key).or_default();
            tally.points += row.points;
            if row.is_win() {
                tally.wins += 1;
            }
        }

        let mut entries: Vec<(&str, Tally)> = tallies.into_iter().collect();
        entries.sort_by(|a, b| {
            b.1.points
                .total_cmp(&a.1.points)
                .then_with(|| b.1.wins.cmp(&a.1.wins))
                .then_with(|| a.0.cmp(b.0))
        });

        let rows = entries
            .into_iter()
            .enumerate()
            .map(|(i, (key, tally))| StatRow {
                rank: i + 1,
                key: key.to_string(),
                value: StatValue::Points(tally.points),
                wins: Some(tally.wins),
            })
            .collect();

        Ok(SeasonStatTable {
            metric: StatMetric::Points,
            subject,
            seasons,
            rows,
            skipped: screened.skipped,
        })
    }

    fn count_table(
        &self,
        screened: Screened<'_>,
        metric: StatMetric,
        counts_toward: impl Fn(&RaceResult) -> bool,
    ) -> SeasonStatTable {
        let seasons = seasons_of(&screened.rows);

        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for row in &screened.rows {
            let count = counts.entry(row.driver_code.as_str()).or_insert(0);
            if counts_toward(*row) {
                *count += 1;
            }
        }

        let mut entries: Vec<(&str, u32)> = counts
            .into_iter()
            .filter(|(_, n)| self.options.inclusion == InclusionPolicy::IncludeZero || *n > 0)
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        debug!("Built {} table with {} rows", metric, entries.len());

        SeasonStatTable {
            metric,
            subject: StatSubject::Driver,
            seasons,
            rows: entries
                .into_iter()
                .enumerate()
                .map(|(i, (code, n))| StatRow {
                    rank: i + 1,
                    key: code.to_string(),
                    value: StatValue::Count(n),
                    wins: None,
                })
                .collect(),
            skipped: screened.skipped,
        }
    }

    fn driver_season(
        &self,
        rows: &[&RaceResult],
        driver: &str,
        season: i32,
        rounds: &BTreeSet<u32>,
    ) -> Metric<DriverSeasonStats> {
        let mut stats = DriverSeasonStats::default();
        for row in rows
            .iter()
            .filter(|r| r.driver_code == driver && r.season == season && rounds.contains(&r.round))
        {
            stats.races += 1;
            stats.points += row.points;
            if row.is_win() {
                stats.wins += 1;
            }
            if row.is_podium() {
                stats.podiums += 1;
            }
            if self.is_dnf(row) {
                stats.dnfs += 1;
            }
        }

        if stats.races == 0 {
            Metric::NoData
        } else {
            Metric::Present(stats)
        }
    }

    fn is_dnf(&self, row: &RaceResult) -> bool {
        match row.status {
            Some(RaceStatus::Retired(_)) => true,
            Some(RaceStatus::Disqualified) => self.options.dnf_includes_disqualified,
            _ => false,
        }
    }

    /// Apply the malformed-row policy to the input.
    fn screen<'a>(&self, results: &'a [RaceResult]) -> StatsResult<Screened<'a>> {
        if results.is_empty() {
            return Err(StatsError::not_found("any race (the result set is empty)"));
        }

        let mut rows = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();

        for (index, row) in results.iter().enumerate() {
            let Some(reason) = malformed_reason(row) else {
                rows.push(row);
                continue;
            };

            if self.options.strict {
                return Err(StatsError::MalformedInput {
                    index,
                    driver: row.driver_code.clone(),
                    race: row.race().to_string(),
                    reason,
                });
            }

            warn!(
                "Skipping result row #{} ({} {}): {}",
                index,
                row.driver_code,
                row.race(),
                reason
            );
            skipped.push(SkippedRow {
                index,
                driver_code: row.driver_code.clone(),
                race: row.race(),
                reason,
            });
        }

        if rows.is_empty() {
            return Err(StatsError::not_found(format!(
                "any well-formed row ({} rows skipped)",
                skipped.len()
            )));
        }

        Ok(Screened { rows, skipped })
    }
}

fn malformed_reason(row: &RaceResult) -> Option<String> {
    if row.driver_code.trim().is_empty() {
        return Some("missing driver code".to_string());
    }
    if let Some(ref text) = row.unreadable_points {
        return Some(format!("unreadable points '{}'", text));
    }
    if row.round == 0 {
        return Some("round must be 1 or greater".to_string());
    }
    if !row.points.is_finite() || row.points < 0.0 {
        return Some(format!("invalid points value {}", row.points));
    }
    if row.finish.is_none() && row.status.is_none() {
        return Some("no finishing position and no status".to_string());
    }
    None
}

/// Quickest recorded lap; ties go to the lower driver code.
fn quickest<'a>(rows: impl Iterator<Item = &'a RaceResult>) -> Option<&'a RaceResult> {
    rows.filter_map(|r| r.fastest_lap_time.map(|t| (t, r)))
        .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.driver_code.cmp(&b.1.driver_code)))
        .map(|(_, r)| r)
}

fn by_position(a: &RaceResult, b: &RaceResult) -> Ordering {
    a.sort_position()
        .cmp(&b.sort_position())
        .then_with(|| a.driver_code.cmp(&b.driver_code))
}

fn rounds_in_season(rows: &[&RaceResult], season: i32) -> BTreeSet<u32> {
    rows.iter()
        .filter(|r| r.season == season)
        .map(|r| r.round)
        .collect()
}

fn seasons_of(rows: &[&RaceResult]) -> Vec<i32> {
    let seasons: BTreeSet<i32> = rows.iter().map(|r| r.season).collect();
    seasons.into_iter().collect()
}

fn season_list(seasons: &BTreeSet<i32>) -> String {
    seasons
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FinishPosition, LapTime};
    use chrono::NaiveDate;

    fn create_result(
        season: i32,
        round: u32,
        code: &str,
        team: &str,
        position: Option<u32>,
        points: f64,
        status: &str,
    ) -> RaceResult {
        RaceResult {
            season,
            round,
            driver_code: code.to_string(),
            driver_name: format!("Driver {}", code),
            team_name: team.to_string(),
            finish: Some(match position {
                Some(p) => FinishPosition::Classified(p),
                None => FinishPosition::NotClassified,
            }),
            points,
            unreadable_points: None,
            status: Some(RaceStatus::parse(status)),
            fastest_lap_time: None,
            fastest_lap_number: None,
            grid: 1,
        }
    }

    fn with_lap(mut row: RaceResult, millis: u64) -> RaceResult {
        row.fastest_lap_time = Some(LapTime::from_millis(millis));
        row
    }

    /// Two rounds of 2023: VER wins both, HAM third then retires.
    fn scenario() -> Vec<RaceResult> {
        vec![
            create_result(2023, 1, "VER", "Red Bull", Some(1), 25.0, "Finished"),
            create_result(2023, 1, "HAM", "Mercedes", Some(3), 15.0, "Finished"),
            create_result(2023, 2, "VER", "Red Bull", Some(1), 25.0, "Finished"),
            create_result(2023, 2, "HAM", "Mercedes", None, 0.0, "Engine"),
        ]
    }

    fn pairs(table: &SeasonStatTable) -> Vec<(String, f64)> {
        table
            .rows
            .iter()
            .map(|r| (r.key.clone(), r.value.as_f64()))
            .collect()
    }

    #[test]
    fn test_scenario_podiums_dnfs_standings() {
        let agg = StatsAggregator::default();
        let results = scenario();

        let podiums = agg.podium_counts(&results).unwrap();
        assert_eq!(
            pairs(&podiums),
            vec![("VER".to_string(), 2.0), ("HAM".to_string(), 1.0)]
        );

        let dnfs = agg.dnf_counts(&results).unwrap();
        assert_eq!(pairs(&dnfs), vec![("HAM".to_string(), 1.0)]);

        let standings = agg.driver_standings(&results).unwrap();
        assert_eq!(
            pairs(&standings),
            vec![("VER".to_string(), 50.0), ("HAM".to_string(), 15.0)]
        );
        assert_eq!(standings.rows[0].wins, Some(2));
        assert_eq!(standings.seasons, vec![2023]);
    }

    #[test]
    fn test_include_zero_policy_lists_present_drivers_only() {
        let agg = StatsAggregator::new(AggregateOptions {
            inclusion: InclusionPolicy::IncludeZero,
            ..Default::default()
        });

        let dnfs = agg.dnf_counts(&scenario()).unwrap();
        assert_eq!(
            pairs(&dnfs),
            vec![("HAM".to_string(), 1.0), ("VER".to_string(), 0.0)]
        );
        assert!(dnfs.get("LEC").is_none());
    }

    #[test]
    fn test_podium_ties_break_by_driver_code() {
        let agg = StatsAggregator::default();
        let results = vec![
            create_result(2023, 1, "SAI", "Ferrari", Some(1), 25.0, "Finished"),
            create_result(2023, 1, "NOR", "McLaren", Some(2), 18.0, "Finished"),
            create_result(2023, 1, "ALO", "Aston Martin", Some(3), 15.0, "Finished"),
        ];

        let podiums = agg.podium_counts(&results).unwrap();
        let keys: Vec<&str> = podiums.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["ALO", "NOR", "SAI"]);
        assert_eq!(podiums.rows[2].rank, 3);
    }

    #[test]
    fn test_podium_counts_additive_over_disjoint_seasons() {
        let agg = StatsAggregator::default();
        let season_a = scenario();
        let season_b = vec![
            create_result(2022, 1, "LEC", "Ferrari", Some(1), 26.0, "Finished"),
            create_result(2022, 1, "VER", "Red Bull", None, 0.0, "Fuel pump"),
            create_result(2022, 1, "HAM", "Mercedes", Some(3), 15.0, "Finished"),
        ];

        let separate_a = agg.podium_counts(&season_a).unwrap();
        let separate_b = agg.podium_counts(&season_b).unwrap();

        let mut combined_input = season_a.clone();
        combined_input.extend(season_b.clone());
        let combined = agg.podium_counts(&combined_input).unwrap();

        for row in &combined.rows {
            let a = separate_a.get(&row.key).map(|r| r.value.as_f64()).unwrap_or(0.0);
            let b = separate_b.get(&row.key).map(|r| r.value.as_f64()).unwrap_or(0.0);
            assert_eq!(row.value.as_f64(), a + b, "mismatch for {}", row.key);
        }
        assert_eq!(combined.get("HAM").map(|r| r.value), Some(StatValue::Count(2)));
        assert_eq!(combined.seasons, vec![2022, 2023]);
    }

    #[test]
    fn test_dnf_excludes_lapped_and_dns_and_dsq_by_default() {
        let results = vec![
            create_result(2023, 1, "ALB", "Williams", Some(12), 0.0, "+1 Lap"),
            create_result(2023, 1, "SAR", "Williams", None, 0.0, "Did not start"),
            create_result(2023, 1, "GAS", "Alpine", None, 0.0, "Disqualified"),
            create_result(2023, 1, "OCO", "Alpine", None, 0.0, "Collision"),
        ];

        let agg = StatsAggregator::default();
        let dnfs = agg.dnf_counts(&results).unwrap();
        assert_eq!(pairs(&dnfs), vec![("OCO".to_string(), 1.0)]);

        let counting_dsq = StatsAggregator::new(AggregateOptions {
            dnf_includes_disqualified: true,
            ..Default::default()
        });
        let dnfs = counting_dsq.dnf_counts(&results).unwrap();
        assert_eq!(
            pairs(&dnfs),
            vec![("GAS".to_string(), 1.0), ("OCO".to_string(), 1.0)]
        );
    }

    #[test]
    fn test_fastest_lap_is_minimum_and_order_independent() {
        let agg = StatsAggregator::default();
        let mut results = vec![
            with_lap(create_result(2023, 5, "VER", "Red Bull", Some(1), 25.0, "Finished"), 91_200),
            with_lap(create_result(2023, 5, "PER", "Red Bull", Some(2), 19.0, "Finished"), 90_950),
            with_lap(create_result(2023, 5, "ALO", "Aston Martin", Some(3), 15.0, "Finished"), 90_950),
            create_result(2023, 5, "HAM", "Mercedes", Some(4), 12.0, "Finished"),
            with_lap(create_result(2023, 6, "HAM", "Mercedes", Some(1), 25.0, "Finished"), 80_000),
        ];

        let race = RaceKey::new(2023, 5);
        let fastest = agg.fastest_lap(&results, race).unwrap().clone();
        assert_eq!(fastest.driver_code, "ALO");

        for row in results.iter().filter(|r| r.race() == race) {
            if let Some(t) = row.fastest_lap_time {
                assert!(fastest.fastest_lap_time.unwrap() <= t);
            }
        }

        results.reverse();
        assert_eq!(agg.fastest_lap(&results, race).unwrap(), &fastest);
    }

    #[test]
    fn test_fastest_lap_without_lap_times_is_not_found() {
        let agg = StatsAggregator::default();
        let err = agg
            .fastest_lap(&scenario(), RaceKey::new(2023, 1))
            .unwrap_err();
        assert!(matches!(err, StatsError::DataNotFound { .. }));
        assert!(err.to_string().contains("2023 round 1"));

        let missing = agg
            .fastest_lap(&scenario(), RaceKey::new(2023, 9))
            .unwrap_err();
        assert_eq!(missing, StatsError::not_found("2023 round 9"));
    }

    #[test]
    fn test_compare_drivers_marks_absent_seasons_as_no_data() {
        let agg = StatsAggregator::default();
        let results = scenario();
        let seasons: BTreeSet<i32> = [2021, 2023].into_iter().collect();

        let report = agg
            .compare_drivers("VER", &results, "HAM", &results, &seasons)
            .unwrap();

        let empty = report.season(2021).unwrap();
        assert!(empty.rounds.is_empty());
        assert!(empty.driver_a.is_no_data());
        assert!(empty.driver_b.is_no_data());

        let full = report.season(2023).unwrap();
        assert_eq!(full.rounds, vec![1, 2]);
        let ver = full.driver_a.as_present().unwrap();
        let ham = full.driver_b.as_present().unwrap();
        assert_eq!((ver.points, ver.wins, ver.podiums, ver.dnfs), (50.0, 2, 2, 0));
        assert_eq!((ham.points, ham.wins, ham.podiums, ham.dnfs), (15.0, 0, 1, 1));
    }

    #[test]
    fn test_compare_drivers_uses_shared_coverage() {
        let agg = StatsAggregator::default();
        let results_a = scenario();
        // Only round 1 is available in the second source.
        let results_b: Vec<RaceResult> = scenario().into_iter().filter(|r| r.round == 1).collect();
        let seasons: BTreeSet<i32> = [2023].into_iter().collect();

        let report = agg
            .compare_drivers("VER", &results_a, "HAM", &results_b, &seasons)
            .unwrap();
        let season = report.season(2023).unwrap();
        assert_eq!(season.rounds, vec![1]);
        assert_eq!(season.driver_a.as_present().unwrap().points, 25.0);
        assert_eq!(season.driver_b.as_present().unwrap().races, 1);
    }

    #[test]
    fn test_compare_drivers_unknown_driver_is_named() {
        let agg = StatsAggregator::default();
        let results = scenario();
        let seasons: BTreeSet<i32> = [2023].into_iter().collect();

        let err = agg
            .compare_drivers("VER", &results, "XYZ", &results, &seasons)
            .unwrap_err();
        assert!(err.to_string().contains("XYZ"));

        let none = agg
            .compare_drivers("VER", &results, "HAM", &results, &BTreeSet::new())
            .unwrap_err();
        assert!(matches!(none, StatsError::DataNotFound { .. }));
    }

    #[test]
    fn test_standings_tie_break_wins_then_code() {
        let agg = StatsAggregator::default();
        let results = vec![
            create_result(2023, 1, "NOR", "McLaren", Some(2), 18.0, "Finished"),
            create_result(2023, 1, "PIA", "McLaren", Some(1), 25.0, "Finished"),
            create_result(2023, 2, "NOR", "McLaren", Some(1), 25.0, "Finished"),
            create_result(2023, 2, "PIA", "McLaren", Some(2), 18.0, "Finished"),
            create_result(2023, 1, "BOT", "Sauber", Some(4), 12.0, "Finished"),
            create_result(2023, 2, "ZHO", "Sauber", Some(4), 12.0, "Finished"),
            create_result(2023, 3, "ZHO", "Sauber", Some(9), 0.0, "Finished"),
            create_result(2023, 3, "BOT", "Sauber", Some(1), 0.0, "Finished"),
        ];

        let standings = agg.driver_standings(&results).unwrap();
        let keys: Vec<&str> = standings.rows.iter().map(|r| r.key.as_str()).collect();
        // NOR and PIA tie on points and wins; BOT beats ZHO on wins.
        assert_eq!(keys, vec!["NOR", "PIA", "BOT", "ZHO"]);
    }

    #[test]
    fn test_team_standings() {
        let agg = StatsAggregator::default();
        let standings = agg.team_standings(&scenario()).unwrap();

        assert_eq!(standings.subject, StatSubject::Team);
        assert_eq!(
            pairs(&standings),
            vec![("Red Bull".to_string(), 50.0), ("Mercedes".to_string(), 15.0)]
        );
        assert_eq!(standings.get("Red Bull").unwrap().wins, Some(2));
    }

    #[test]
    fn test_grand_prix_summary() {
        let agg = StatsAggregator::default();
        let results = vec![
            with_lap(create_result(2023, 3, "PER", "Red Bull", Some(2), 18.0, "Finished"), 82_100),
            with_lap(create_result(2023, 3, "VER", "Red Bull", Some(1), 26.0, "Finished"), 81_900),
            create_result(2023, 3, "ALO", "Aston Martin", Some(3), 15.0, "Finished"),
            create_result(2023, 3, "HAM", "Mercedes", Some(4), 12.0, "+1 Lap"),
            create_result(2023, 3, "RUS", "Mercedes", None, 0.0, "Power Unit"),
            create_result(2023, 4, "LEC", "Ferrari", Some(1), 25.0, "Finished"),
        ];

        let summary = agg
            .grand_prix_summary(&results, RaceKey::new(2023, 3))
            .unwrap();

        assert_eq!(summary.winner.as_ref().unwrap().driver_code, "VER");
        let podium: Vec<&str> = summary.podium.iter().map(|r| r.driver_code.as_str()).collect();
        assert_eq!(podium, vec!["VER", "PER", "ALO"]);
        assert_eq!(summary.fastest_lap.as_ref().unwrap().driver_code, "VER");
        assert_eq!(summary.team_points[0].key, "Red Bull");
        assert_eq!(summary.team_points[0].value, StatValue::Points(44.0));
        assert!(summary.team_points.iter().all(|t| t.key != "Ferrari"));
        assert_eq!(summary.retirements.len(), 1);
        assert_eq!(summary.retirements[0].driver_code, "RUS");

        let err = agg
            .grand_prix_summary(&results, RaceKey::new(2022, 3))
            .unwrap_err();
        assert!(err.to_string().contains("2022 round 3"));
    }

    #[test]
    fn test_summary_without_lap_data_has_no_fastest_lap() {
        let agg = StatsAggregator::default();
        let summary = agg
            .grand_prix_summary(&scenario(), RaceKey::new(2023, 2))
            .unwrap();
        assert!(summary.fastest_lap.is_none());
        assert_eq!(summary.retirements[0].driver_code, "HAM");
    }

    #[test]
    fn test_empty_input_is_not_found() {
        let agg = StatsAggregator::default();
        assert!(matches!(
            agg.podium_counts(&[]),
            Err(StatsError::DataNotFound { .. })
        ));
        assert!(matches!(
            agg.driver_standings(&[]),
            Err(StatsError::DataNotFound { .. })
        ));
    }

    #[test]
    fn test_malformed_rows_skipped_and_reported() {
        let agg = StatsAggregator::default();
        let mut results = scenario();
        let mut broken = create_result(2023, 2, "LEC", "Ferrari", None, 0.0, "Finished");
        broken.finish = None;
        broken.status = None;
        results.push(broken);
        let mut negative = create_result(2023, 2, "SAI", "Ferrari", Some(5), 10.0, "Finished");
        negative.points = -1.0;
        results.push(negative);

        let podiums = agg.podium_counts(&results).unwrap();
        assert_eq!(podiums.skipped.len(), 2);
        assert_eq!(podiums.skipped[0].index, 4);
        assert_eq!(podiums.skipped[0].driver_code, "LEC");
        assert!(podiums.get("LEC").is_none());
    }

    #[test]
    fn test_malformed_rows_fail_in_strict_mode() {
        let agg = StatsAggregator::new(AggregateOptions {
            strict: true,
            ..Default::default()
        });
        let mut results = scenario();
        results[1].driver_code = String::new();

        let err = agg.podium_counts(&results).unwrap_err();
        match err {
            StatsError::MalformedInput { index, reason, .. } => {
                assert_eq!(index, 1);
                assert!(reason.contains("driver code"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unreadable_points_are_skipped_or_fatal() {
        let mut results = scenario();
        results[1].unreadable_points = Some("abc".to_string());
        results[1].points = 0.0;

        let table = StatsAggregator::default().podium_counts(&results).unwrap();
        assert_eq!(table.skipped.len(), 1);
        assert_eq!(table.skipped[0].index, 1);
        assert!(table.skipped[0].reason.contains("abc"));

        let strict = StatsAggregator::new(AggregateOptions {
            strict: true,
            ..Default::default()
        });
        let err = strict.podium_counts(&results).unwrap_err();
        assert!(matches!(err, StatsError::MalformedInput { index: 1, .. }));
    }

    #[test]
    fn test_only_malformed_rows_is_not_found() {
        let agg = StatsAggregator::default();
        let mut row = create_result(2023, 0, "VER", "Red Bull", Some(1), 25.0, "Finished");
        row.round = 0;
        let err = agg.podium_counts(&[row]).unwrap_err();
        assert!(err.to_string().contains("1 rows skipped"));
    }

    #[test]
    fn test_cumulative_points() {
        let agg = StatsAggregator::default();
        let rows = agg.cumulative_points(&scenario()).unwrap();

        let ver: Vec<f64> = rows
            .iter()
            .filter(|r| r.result.driver_code == "VER")
            .map(|r| r.cumulative_points)
            .collect();
        assert_eq!(ver, vec![25.0, 50.0]);

        let ham_last = rows.iter().rev().find(|r| r.result.driver_code == "HAM").unwrap();
        assert_eq!(ham_last.cumulative_points, 15.0);
        assert_eq!(rows[0].result.driver_code, "VER");
    }

    #[test]
    fn test_race_digests_join_schedule() {
        let agg = StatsAggregator::default();
        let events = vec![Event {
            season: 2023,
            round: 1,
            name: "Bahrain Grand Prix".to_string(),
            circuit: "Bahrain International Circuit".to_string(),
            locality: "Sakhir".to_string(),
            country: "Bahrain".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 3, 5).unwrap(),
        }];
        let mut results = scenario();
        results[1] = with_lap(results[1].clone(), 93_996);

        let digests = agg.race_digests(&events, &results).unwrap();
        assert_eq!(digests.len(), 2);
        assert_eq!(digests[0].name, "Bahrain Grand Prix");
        assert_eq!(digests[0].winner.as_deref(), Some("Driver VER"));
        assert_eq!(digests[0].fastest_lap_driver.as_deref(), Some("HAM"));
        assert_eq!(digests[1].name, "Round 2");
        assert!(digests[1].fastest_lap_time.is_none());
    }
}
