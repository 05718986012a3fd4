//! Ergast-format JSON payloads and their normalization into [`RaceResult`] rows.
//!
//! Every numeric field arrives as a string. Conversion happens here, once, so
//! nothing past the provider boundary deals with loosely-typed data.

use crate::models::{Event, FinishPosition, LapTime, RaceResult, RaceStatus};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct ErgastResponse {
    #[serde(rename = "MRData")]
    pub mr_data: MrData,
}

#[derive(Debug, Deserialize)]
pub struct MrData {
    pub limit: String,
    pub offset: String,
    pub total: String,
    #[serde(rename = "RaceTable")]
    pub race_table: RaceTable,
}

impl MrData {
    /// Total rows available across all pages.
    pub fn total_rows(&self) -> usize {
        self.total.parse().unwrap_or(0)
    }

    /// Offset of the first row after this page.
    pub fn next_offset(&self) -> usize {
        let offset: usize = self.offset.parse().unwrap_or(0);
        let limit: usize = self.limit.parse().unwrap_or(0);
        offset + limit
    }
}

#[derive(Debug, Deserialize)]
pub struct RaceTable {
    #[serde(rename = "Races", default)]
    pub races: Vec<WireRace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRace {
    pub season: String,
    pub round: String,
    pub race_name: String,
    #[serde(rename = "Circuit")]
    pub circuit: WireCircuit,
    pub date: String,
    #[serde(rename = "Results", default)]
    pub results: Vec<WireResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCircuit {
    pub circuit_name: String,
    #[serde(rename = "Location")]
    pub location: WireLocation,
}

#[derive(Debug, Deserialize)]
pub struct WireLocation {
    pub locality: String,
    pub country: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResult {
    #[serde(default)]
    pub position_text: Option<String>,
    #[serde(default)]
    pub points: Option<String>,
    #[serde(rename = "Driver")]
    pub driver: WireDriver,
    #[serde(rename = "Constructor", default)]
    pub constructor: Option<WireConstructor>,
    #[serde(default)]
    pub grid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "FastestLap", default)]
    pub fastest_lap: Option<WireFastestLap>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDriver {
    #[serde(default)]
    pub code: Option<String>,
    pub given_name: String,
    pub family_name: String,
}

impl WireDriver {
    /// The official code, or the first three letters of the family name.
    pub fn code(&self) -> String {
        if let Some(code) = self.code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            return code.to_uppercase();
        }
        self.family_name
            .chars()
            .filter(|c| c.is_alphabetic())
            .take(3)
            .collect::<String>()
            .to_uppercase()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }
}

#[derive(Debug, Deserialize)]
pub struct WireConstructor {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct WireFastestLap {
    #[serde(default)]
    pub lap: Option<String>,
    #[serde(rename = "Time", default)]
    pub time: Option<WireTime>,
}

#[derive(Debug, Deserialize)]
pub struct WireTime {
    pub time: String,
}

impl WireRace {
    fn key(&self) -> Result<(i32, u32), String> {
        let season = self
            .season
            .parse::<i32>()
            .map_err(|_| format!("invalid season '{}'", self.season))?;
        let round = self
            .round
            .parse::<u32>()
            .map_err(|_| format!("invalid round '{}'", self.round))?;
        Ok((season, round))
    }

    /// Convert into a schedule entry.
    pub fn to_event(&self) -> Result<Event, String> {
        let (season, round) = self.key()?;
        let date = NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map_err(|_| format!("invalid date '{}' for {} round {}", self.date, season, round))?;

        Ok(Event {
            season,
            round,
            name: self.race_name.clone(),
            circuit: self.circuit.circuit_name.clone(),
            locality: self.circuit.location.locality.clone(),
            country: self.circuit.location.country.clone(),
            date,
        })
    }

    /// Convert into result rows.
    ///
    /// Malformed rows (unreadable points, missing position or status) are
    /// passed on for the aggregator to judge.
    pub fn to_results(&self) -> Result<Vec<RaceResult>, String> {
        let (season, round) = self.key()?;
        let mut rows = Vec::with_capacity(self.results.len());

        for wire in &self.results {
            let code = wire.driver.code();
            let (points, unreadable_points) = match wire.points.as_deref().map(str::trim) {
                None | Some("") => (0.0, None),
                Some(text) => match text.parse::<f64>() {
                    Ok(p) if p.is_finite() => (p, None),
                    _ => {
                        debug!(
                            "Unreadable points '{}' for {} in {} round {}",
                            text, code, season, round
                        );
                        (0.0, Some(text.to_string()))
                    }
                },
            };

            let fastest = wire.fastest_lap.as_ref();
            rows.push(RaceResult {
                season,
                round,
                driver_code: code,
                driver_name: wire.driver.full_name(),
                team_name: wire
                    .constructor
                    .as_ref()
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                finish: wire.position_text.as_deref().map(FinishPosition::parse),
                points,
                unreadable_points,
                status: wire.status.as_deref().map(RaceStatus::parse),
                fastest_lap_time: fastest
                    .and_then(|f| f.time.as_ref())
                    .and_then(|t| LapTime::parse(&t.time)),
                fastest_lap_number: fastest
                    .and_then(|f| f.lap.as_deref())
                    .and_then(|l| l.parse().ok()),
                grid: wire
                    .grid
                    .as_deref()
                    .and_then(|g| g.parse().ok())
                    .unwrap_or(0),
            });
        }

        Ok(rows)
    }
}
