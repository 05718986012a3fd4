//! CSV exports.
//!
//! Each writer produces one fixed column layout. File names follow the
//! `<what>_<season>.csv` convention and land in the configured output directory.

use crate::models::{
    format_points, DriverComparisonReport, DriverSeasonStats, Event, Metric, RaceDigest,
    RaceResult, SeasonResultRow, SeasonStatTable, StatSubject,
};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub fn podiums_file(season: i32) -> String {
    format!("podiums_{}.csv", season)
}

pub fn dnfs_file(season: i32) -> String {
    format!("dnfs_{}.csv", season)
}

pub fn race_results_file(season: i32, round: u32) -> String {
    format!("race{}_results_{}.csv", round, season)
}

pub fn comparison_file(driver_a: &str, driver_b: &str, start: i32, end: i32) -> String {
    format!("comparison_{}_{}_{}_{}.csv", driver_a, driver_b, start, end)
}

pub fn season_results_file(season: i32) -> String {
    format!("full_season_{}_results.csv", season)
}

pub fn driver_standings_file(season: i32) -> String {
    format!("driver_standings_{}.csv", season)
}

pub fn team_standings_file(season: i32) -> String {
    format!("team_standings_{}.csv", season)
}

pub fn history_file(start: i32, end: i32) -> String {
    format!("all_f1_races_{}_to_{}.csv", start, end)
}

#[derive(Serialize)]
struct RaceResultRecord<'a> {
    season: i32,
    round: u32,
    position: String,
    driver: &'a str,
    name: &'a str,
    team: &'a str,
    grid: u32,
    points: String,
    status: String,
    fastest_lap: String,
}

#[derive(Serialize)]
struct SeasonRecord<'a> {
    round: u32,
    race: &'a str,
    driver: &'a str,
    name: &'a str,
    team: &'a str,
    position: String,
    points: String,
    status: String,
    cumulative_points: String,
}

#[derive(Serialize)]
struct HistoryRecord<'a> {
    season: i32,
    round: u32,
    name: &'a str,
    date: String,
    circuit: &'a str,
    country: &'a str,
    winner: &'a str,
    winning_team: &'a str,
    fastest_lap_driver: &'a str,
    fastest_lap_time: String,
}

/// Join a file name onto the output directory, creating the directory.
pub fn export_path(output_dir: &Path, file_name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).with_context(|| {
        format!("Failed to create output directory {}", output_dir.display())
    })?;
    Ok(output_dir.join(file_name))
}

fn finish<W: Write>(mut writer: csv::Writer<W>, path: &Path, rows: usize) -> Result<()> {
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {} rows to {}", rows, path.display());
    Ok(())
}

fn open(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))
}

/// `season,rank,<driver|team>,metric,value`
pub fn write_stat_table(table: &SeasonStatTable, path: &Path) -> Result<()> {
    let mut writer = open(path)?;
    let subject = match table.subject {
        StatSubject::Driver => "driver",
        StatSubject::Team => "team",
    };
    writer.write_record(["season", "rank", subject, "metric", "value"])?;

    let season = table.season_label();
    let metric = table.metric.to_string();
    for row in &table.rows {
        writer.write_record([
            season.as_str(),
            row.rank.to_string().as_str(),
            row.key.as_str(),
            metric.as_str(),
            row.value.to_string().as_str(),
        ])?;
    }

    finish(writer, path, table.rows.len())
}

fn comparison_values(metric: &Metric<DriverSeasonStats>) -> [(&'static str, String); 5] {
    let value = |f: fn(&DriverSeasonStats) -> String| match metric {
        Metric::Present(stats) => f(stats),
        Metric::NoData => "no data".to_string(),
    };
    [
        ("races", value(|s| s.races.to_string())),
        ("points", value(|s| format_points(s.points))),
        ("wins", value(|s| s.wins.to_string())),
        ("podiums", value(|s| s.podiums.to_string())),
        ("dnfs", value(|s| s.dnfs.to_string())),
    ]
}

/// `season,rounds,driver,metric,value`
pub fn write_comparison(report: &DriverComparisonReport, path: &Path) -> Result<()> {
    let mut writer = open(path)?;
    writer.write_record(["season", "rounds", "driver", "metric", "value"])?;

    let mut written = 0;
    for season in &report.seasons {
        let year = season.season.to_string();
        let rounds = season.rounds.len().to_string();
        for (driver, metric) in [
            (&report.driver_a, &season.driver_a),
            (&report.driver_b, &season.driver_b),
        ] {
            for (name, value) in comparison_values(metric) {
                writer.write_record([
                    year.as_str(),
                    rounds.as_str(),
                    driver.as_str(),
                    name,
                    value.as_str(),
                ])?;
                written += 1;
            }
        }
    }

    finish(writer, path, written)
}

/// `season,round,position,driver,name,team,grid,points,status,fastest_lap`
pub fn write_race_results(results: &[RaceResult], path: &Path) -> Result<()> {
    let mut writer = open(path)?;
    for r in results {
        writer.serialize(RaceResultRecord {
            season: r.season,
            round: r.round,
            position: r.finish.map(|f| f.to_string()).unwrap_or_default(),
            driver: &r.driver_code,
            name: &r.driver_name,
            team: &r.team_name,
            grid: r.grid,
            points: format_points(r.points),
            status: r.status.as_ref().map(|s| s.to_string()).unwrap_or_default(),
            fastest_lap: r.fastest_lap_time.map(|t| t.to_string()).unwrap_or_default(),
        })?;
    }
    finish(writer, path, results.len())
}

/// `round,race,driver,name,team,position,points,status,cumulative_points`
pub fn write_season_results(rows: &[SeasonResultRow], events: &[Event], path: &Path) -> Result<()> {
    let mut writer = open(path)?;
    for row in rows {
        let r = &row.result;
        let fallback = format!("Round {}", r.round);
        let race = events
            .iter()
            .find(|e| e.season == r.season && e.round == r.round)
            .map(|e| e.name.as_str())
            .unwrap_or(&fallback);

        writer.serialize(SeasonRecord {
            round: r.round,
            race,
            driver: &r.driver_code,
            name: &r.driver_name,
            team: &r.team_name,
            position: r.finish.map(|f| f.to_string()).unwrap_or_default(),
            points: format_points(r.points),
            status: r.status.as_ref().map(|s| s.to_string()).unwrap_or_default(),
            cumulative_points: format_points(row.cumulative_points),
        })?;
    }
    finish(writer, path, rows.len())
}

/// `season,round,name,date,circuit,country,winner,winning_team,fastest_lap_driver,fastest_lap_time`
pub fn write_history(digests: &[RaceDigest], path: &Path) -> Result<()> {
    let mut writer = open(path)?;
    for d in digests {
        writer.serialize(HistoryRecord {
            season: d.race.season,
            round: d.race.round,
            name: &d.name,
            date: d
                .date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            circuit: &d.circuit,
            country: &d.country,
            winner: d.winner.as_deref().unwrap_or("N/A"),
            winning_team: d.winning_team.as_deref().unwrap_or("N/A"),
            fastest_lap_driver: d.fastest_lap_driver.as_deref().unwrap_or("N/A"),
            fastest_lap_time: d
                .fastest_lap_time
                .map(|t| t.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
        })?;
    }
    finish(writer, path, digests.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        FinishPosition, LapTime, RaceKey, RaceStatus, SeasonComparison, StatMetric, StatRow,
        StatValue,
    };
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn result(code: &str, pos: Option<u32>, points: f64) -> RaceResult {
        RaceResult {
            season: 2023,
            round: 1,
            driver_code: code.to_string(),
            driver_name: format!("Driver {}", code),
            team_name: "Team, Ltd".to_string(),
            finish: Some(pos.map_or(FinishPosition::NotClassified, FinishPosition::Classified)),
            points,
            unreadable_points: None,
            status: Some(if pos.is_some() {
                RaceStatus::Finished
            } else {
                RaceStatus::Retired("Gearbox".to_string())
            }),
            fastest_lap_time: None,
            fastest_lap_number: None,
            grid: 4,
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_file_names() {
        assert_eq!(podiums_file(2023), "podiums_2023.csv");
        assert_eq!(race_results_file(2023, 5), "race5_results_2023.csv");
        assert_eq!(
            comparison_file("VER", "HAM", 2021, 2023),
            "comparison_VER_HAM_2021_2023.csv"
        );
        assert_eq!(history_file(2000, 2010), "all_f1_races_2000_to_2010.csv");
        assert_eq!(season_results_file(2022), "full_season_2022_results.csv");
    }

    #[test]
    fn test_export_path_creates_directory() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("nested/out");
        let path = export_path(&out, "x.csv").unwrap();
        assert!(out.is_dir());
        assert_eq!(path, out.join("x.csv"));
    }

    #[test]
    fn test_write_stat_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("podiums.csv");
        let table = SeasonStatTable {
            metric: StatMetric::Podiums,
            subject: StatSubject::Driver,
            seasons: vec![2023],
            rows: vec![
                StatRow {
                    rank: 1,
                    key: "VER".to_string(),
                    value: StatValue::Count(2),
                    wins: None,
                },
                StatRow {
                    rank: 2,
                    key: "HAM".to_string(),
                    value: StatValue::Count(1),
                    wins: None,
                },
            ],
            skipped: vec![],
        };

        write_stat_table(&table, &path).unwrap();
        assert_eq!(
            read_lines(&path),
            vec![
                "season,rank,driver,metric,value",
                "2023,1,VER,podiums,2",
                "2023,2,HAM,podiums,1",
            ]
        );
    }

    #[test]
    fn test_write_comparison_marks_no_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cmp.csv");
        let report = DriverComparisonReport {
            driver_a: "VER".to_string(),
            driver_b: "HAM".to_string(),
            seasons: vec![SeasonComparison {
                season: 2023,
                rounds: vec![1, 2],
                driver_a: Metric::Present(DriverSeasonStats {
                    races: 2,
                    points: 43.0,
                    wins: 1,
                    podiums: 2,
                    dnfs: 0,
                }),
                driver_b: Metric::NoData,
            }],
            skipped: vec![],
        };

        write_comparison(&report, &path).unwrap();
        let lines = read_lines(&path);
        assert_eq!(lines[0], "season,rounds,driver,metric,value");
        assert!(lines.contains(&"2023,2,VER,points,43".to_string()));
        assert!(lines.contains(&"2023,2,HAM,points,no data".to_string()));
        assert_eq!(lines.len(), 11);
    }

    #[test]
    fn test_write_race_results_quotes_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("race.csv");
        let mut winner = result("VER", Some(1), 25.0);
        winner.fastest_lap_time = LapTime::parse("1:32.608");

        write_race_results(&[winner, result("LEC", None, 0.0)], &path).unwrap();
        let lines = read_lines(&path);
        assert_eq!(
            lines[0],
            "season,round,position,driver,name,team,grid,points,status,fastest_lap"
        );
        assert_eq!(
            lines[1],
            "2023,1,1,VER,Driver VER,\"Team, Ltd\",4,25,Finished,1:32.608"
        );
        assert_eq!(lines[2], "2023,1,NC,LEC,Driver LEC,\"Team, Ltd\",4,0,Gearbox,");
    }

    #[test]
    fn test_write_season_results_uses_event_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("season.csv");
        let rows = vec![SeasonResultRow {
            result: result("VER", Some(1), 25.0),
            cumulative_points: 25.0,
        }];
        let events = vec![Event {
            season: 2023,
            round: 1,
            name: "Bahrain Grand Prix".to_string(),
            circuit: "Bahrain International Circuit".to_string(),
            locality: "Sakhir".to_string(),
            country: "Bahrain".to_string(),
            date: NaiveDate::from_ymd_opt(2023, 3, 5).unwrap(),
        }];

        write_season_results(&rows, &events, &path).unwrap();
        let lines = read_lines(&path);
        assert_eq!(
            lines[0],
            "round,race,driver,name,team,position,points,status,cumulative_points"
        );
        assert!(lines[1].starts_with("1,Bahrain Grand Prix,VER,"));
        assert!(lines[1].ends_with(",25"));
    }

    #[test]
    fn test_write_history_fills_missing_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history.csv");
        let digests = vec![RaceDigest {
            race: RaceKey::new(1950, 1),
            name: "British Grand Prix".to_string(),
            date: NaiveDate::from_ymd_opt(1950, 5, 13),
            circuit: "Silverstone Circuit".to_string(),
            country: "UK".to_string(),
            winner: Some("Nino Farina".to_string()),
            winning_team: Some("Alfa Romeo".to_string()),
            fastest_lap_driver: None,
            fastest_lap_time: None,
        }];

        write_history(&digests, &path).unwrap();
        let lines = read_lines(&path);
        assert_eq!(
            lines[0],
            "season,round,name,date,circuit,country,winner,winning_team,fastest_lap_driver,fastest_lap_time"
        );
        assert_eq!(
            lines[1],
            "1950,1,British Grand Prix,1950-05-13,Silverstone Circuit,UK,Nino Farina,Alfa Romeo,N/A,N/A"
        );
    }
}
