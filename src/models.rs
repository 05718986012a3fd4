//! Data models for the statistics dashboard.
//!
//! This module contains the record types handed from the data provider to the
//! aggregator, and the derived tables the aggregator hands to the report layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifies a single Grand Prix within a season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RaceKey {
    pub season: i32,
    pub round: u32,
}

impl RaceKey {
    pub fn new(season: i32, round: u32) -> Self {
        Self { season, round }
    }
}

impl fmt::Display for RaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} round {}", self.season, self.round)
    }
}

/// Classified finishing position, or the marker for an unclassified entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishPosition {
    Classified(u32),
    NotClassified,
}

impl FinishPosition {
    /// Parse the provider's position text ("1", "R", "D", "W", ...).
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<u32>() {
            Ok(pos) if pos > 0 => FinishPosition::Classified(pos),
            _ => FinishPosition::NotClassified,
        }
    }

    /// The classified position, if any.
    pub fn position(&self) -> Option<u32> {
        match self {
            FinishPosition::Classified(pos) => Some(*pos),
            FinishPosition::NotClassified => None,
        }
    }

    pub fn is_podium(&self) -> bool {
        matches!(self, FinishPosition::Classified(1..=3))
    }

    pub fn is_win(&self) -> bool {
        matches!(self, FinishPosition::Classified(1))
    }
}

impl fmt::Display for FinishPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishPosition::Classified(pos) => write!(f, "{}", pos),
            FinishPosition::NotClassified => write!(f, "NC"),
        }
    }
}

/// Outcome of a race entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    /// Completed the full race distance.
    Finished,
    /// Classified finisher, lapped by the leader.
    Lapped(u32),
    /// Started but did not finish. Carries the reported reason.
    Retired(String),
    Disqualified,
    /// Entered but never took the start (DNS, withdrawn, failed to qualify).
    DidNotStart,
}

impl RaceStatus {
    /// Classify a provider status string.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let lower = text.to_lowercase();

        if lower == "finished" {
            return RaceStatus::Finished;
        }
        if lower == "lapped" {
            return RaceStatus::Lapped(1);
        }
        if let Some(rest) = lower.strip_prefix('+') {
            let laps = rest
                .split_whitespace()
                .next()
                .and_then(|n| n.parse::<u32>().ok());
            if let (Some(laps), true) = (laps, rest.contains("lap")) {
                return RaceStatus::Lapped(laps);
            }
        }
        if lower == "disqualified" || lower == "excluded" {
            return RaceStatus::Disqualified;
        }
        if lower.starts_with("did not")
            || lower.starts_with("withdr")
            || lower == "not qualified"
            || lower == "107% rule"
        {
            return RaceStatus::DidNotStart;
        }

        RaceStatus::Retired(text.to_string())
    }

    /// Whether the entry was classified as having completed the race.
    pub fn is_finish(&self) -> bool {
        matches!(self, RaceStatus::Finished | RaceStatus::Lapped(_))
    }
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceStatus::Finished => write!(f, "Finished"),
            RaceStatus::Lapped(1) => write!(f, "+1 Lap"),
            RaceStatus::Lapped(n) => write!(f, "+{} Laps", n),
            RaceStatus::Retired(reason) => write!(f, "{}", reason),
            RaceStatus::Disqualified => write!(f, "Disqualified"),
            RaceStatus::DidNotStart => write!(f, "Did not start"),
        }
    }
}

/// A lap time, kept at millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LapTime(Duration);

impl LapTime {
    pub fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Parse "m:ss.fff" or "ss.fff". Anything else, including values that
    /// overflow a millisecond count, yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (minutes, seconds) = match text.split_once(':') {
            Some((m, s)) => (digits(m)?, s),
            None => (0, text),
        };

        let (whole, frac) = seconds.split_once('.').unwrap_or((seconds, "0"));
        let whole = digits(whole)?;
        if whole >= 60 && minutes > 0 {
            return None;
        }

        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let frac = &frac[..frac.len().min(3)];
        let scale = 10u64.pow(3 - frac.len() as u32);
        let millis = digits(frac)? * scale;

        minutes
            .checked_mul(60)
            .and_then(|s| s.checked_add(whole))
            .and_then(|s| s.checked_mul(1000))
            .and_then(|ms| ms.checked_add(millis))
            .map(Self::from_millis)
    }
}

/// Unsigned decimal made of ASCII digits only, so no sign is accepted.
fn digits(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

impl fmt::Display for LapTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.0.as_millis();
        let minutes = total / 60_000;
        let seconds = (total % 60_000) / 1000;
        let millis = total % 1000;
        write!(f, "{}:{:02}.{:03}", minutes, seconds, millis)
    }
}

impl TryFrom<String> for LapTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        LapTime::parse(&value).ok_or_else(|| format!("invalid lap time: {}", value))
    }
}

impl From<LapTime> for String {
    fn from(value: LapTime) -> Self {
        value.to_string()
    }
}

/// One driver's result in one race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub season: i32,
    /// Round within the season (1-indexed).
    pub round: u32,
    /// Three-letter driver code, e.g. "VER".
    pub driver_code: String,
    pub driver_name: String,
    pub team_name: String,
    pub finish: Option<FinishPosition>,
    pub points: f64,
    /// Points text the provider could not read. `points` is 0 when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unreadable_points: Option<String>,
    pub status: Option<RaceStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fastest_lap_time: Option<LapTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fastest_lap_number: Option<u32>,
    /// Starting grid slot; 0 means a pit-lane start.
    pub grid: u32,
}

impl RaceResult {
    pub fn race(&self) -> RaceKey {
        RaceKey::new(self.season, self.round)
    }

    pub fn is_podium(&self) -> bool {
        self.finish.is_some_and(|f| f.is_podium())
    }

    pub fn is_win(&self) -> bool {
        self.finish.is_some_and(|f| f.is_win())
    }

    /// The classified position, for sorting (unclassified last).
    pub fn sort_position(&self) -> u32 {
        self.finish.and_then(|f| f.position()).unwrap_or(u32::MAX)
    }
}

/// A calendar entry from the season schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub season: i32,
    pub round: u32,
    pub name: String,
    pub circuit: String,
    pub locality: String,
    pub country: String,
    pub date: NaiveDate,
}

impl Event {
    pub fn race(&self) -> RaceKey {
        RaceKey::new(self.season, self.round)
    }
}

/// The statistic a table ranks by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatMetric {
    Podiums,
    Dnfs,
    Points,
}

impl fmt::Display for StatMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatMetric::Podiums => write!(f, "podiums"),
            StatMetric::Dnfs => write!(f, "dnfs"),
            StatMetric::Points => write!(f, "points"),
        }
    }
}

/// What the rows of a table are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatSubject {
    Driver,
    Team,
}

impl fmt::Display for StatSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatSubject::Driver => write!(f, "driver"),
            StatSubject::Team => write!(f, "team"),
        }
    }
}

/// A single aggregate value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Count(u32),
    Points(f64),
}

#[cfg(test)]
impl StatValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            StatValue::Count(n) => *n as f64,
            StatValue::Points(p) => *p,
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Count(n) => write!(f, "{}", n),
            StatValue::Points(p) => write!(f, "{}", format_points(*p)),
        }
    }
}

/// Points without a trailing ".0" for whole numbers.
pub fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{:.0}", points)
    } else {
        format!("{}", points)
    }
}

/// One ranked row of a stat table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRow {
    /// 1-based rank in the ordered table.
    pub rank: usize,
    /// Driver code or team name.
    pub key: String,
    pub value: StatValue,
    /// First-place finishes, carried by standings tables for the tie-break.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wins: Option<u32>,
}

/// A row the aggregator refused to use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    /// Position of the row in the input sequence.
    pub index: usize,
    pub driver_code: String,
    pub race: RaceKey,
    pub reason: String,
}

/// An ordered, derived table. Built fresh per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonStatTable {
    pub metric: StatMetric,
    pub subject: StatSubject,
    /// Seasons present in the input the table was built from.
    pub seasons: Vec<i32>,
    pub rows: Vec<StatRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedRow>,
}

#[cfg(test)]
impl SeasonStatTable {
    /// Look up a row by driver code or team name.
    pub fn get(&self, key: &str) -> Option<&StatRow> {
        self.rows.iter().find(|r| r.key == key)
    }
}

impl SeasonStatTable {
    /// Season context for exports, e.g. "2023" or "2021-2023".
    pub fn season_label(&self) -> String {
        match (self.seasons.first(), self.seasons.last()) {
            (Some(first), Some(last)) if first == last => first.to_string(),
            (Some(first), Some(last)) => format!("{}-{}", first, last),
            _ => String::new(),
        }
    }
}

/// An aggregate that is either present (possibly zero) or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Metric<T> {
    Present(T),
    NoData,
}

impl<T> Metric<T> {
    pub fn as_present(&self) -> Option<&T> {
        match self {
            Metric::Present(v) => Some(v),
            Metric::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Metric::NoData)
    }
}

/// One driver's totals over a set of races.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DriverSeasonStats {
    pub races: u32,
    pub points: f64,
    pub wins: u32,
    pub podiums: u32,
    pub dnfs: u32,
}

/// Both drivers measured over the same races of one season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonComparison {
    pub season: i32,
    /// Rounds covered by both drivers' source data.
    pub rounds: Vec<u32>,
    pub driver_a: Metric<DriverSeasonStats>,
    pub driver_b: Metric<DriverSeasonStats>,
}

/// Head-to-head report across seasons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverComparisonReport {
    pub driver_a: String,
    pub driver_b: String,
    pub seasons: Vec<SeasonComparison>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedRow>,
}

impl DriverComparisonReport {
    pub fn season(&self, season: i32) -> Option<&SeasonComparison> {
        self.seasons.iter().find(|s| s.season == season)
    }
}

/// Digest of a single Grand Prix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrandPrixSummary {
    pub race: RaceKey,
    pub winner: Option<RaceResult>,
    /// Top three, ordered by finishing position.
    pub podium: Vec<RaceResult>,
    pub fastest_lap: Option<RaceResult>,
    /// Points scored in this race, per team.
    pub team_points: Vec<StatRow>,
    pub retirements: Vec<RaceResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedRow>,
}

/// A result row annotated with the driver's running total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonResultRow {
    pub result: RaceResult,
    pub cumulative_points: f64,
}

/// One line per race for the history export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceDigest {
    pub race: RaceKey,
    pub name: String,
    pub date: Option<NaiveDate>,
    pub circuit: String,
    pub country: String,
    pub winner: Option<String>,
    pub winning_team: Option<String>,
    pub fastest_lap_driver: Option<String>,
    pub fastest_lap_time: Option<LapTime>,
}
