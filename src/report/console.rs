//! Plain-text tables for the terminal.

use comfy_table::{presets::UTF8_FULL, Cell, Table};
use crate::dashboard::{RaceSummary, Standings};
use crate::models::{
    format_points, DriverComparisonReport, DriverSeasonStats, Event, Metric, RaceResult,
    SeasonStatTable, SkippedRow, StatSubject,
};

/// Render a bordered grid table.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(headers.iter().map(Cell::new).collect::<Vec<_>>());
    for row in rows {
        table.add_row(row.iter().map(Cell::new).collect::<Vec<_>>());
    }
    format!("{}\n", table)
}

fn position_text(row: &RaceResult) -> String {
    row.finish.map(|f| f.to_string()).unwrap_or_default()
}

fn status_text(row: &RaceResult) -> String {
    row.status.as_ref().map(|s| s.to_string()).unwrap_or_default()
}

fn lap_text(row: &RaceResult) -> String {
    row.fastest_lap_time
        .map(|t| t.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Note listing rows the aggregator refused.
pub fn render_skipped(skipped: &[SkippedRow]) -> String {
    if skipped.is_empty() {
        return String::new();
    }

    let mut section = format!("\n⚠️  {} malformed row(s) skipped:\n", skipped.len());
    for row in skipped {
        section.push_str(&format!(
            "   - #{} {} ({}): {}\n",
            row.index, row.driver_code, row.race, row.reason
        ));
    }
    section
}

pub fn render_schedule(season: i32, events: &[Event], next: Option<&Event>) -> String {
    let rows: Vec<Vec<String>> = events
        .iter()
        .map(|e| {
            vec![
                e.round.to_string(),
                e.name.clone(),
                e.circuit.clone(),
                format!("{}, {}", e.locality, e.country),
                e.date.format("%Y-%m-%d").to_string(),
            ]
        })
        .collect();

    let mut output = format!("📅 {} Formula 1 Schedule\n\n", season);
    output.push_str(&render_table(
        &["Round", "Grand Prix", "Circuit", "Location", "Date"],
        &rows,
    ));

    match next {
        Some(event) => output.push_str(&format!(
            "\n🏁 Next race: {} (round {}) at {} on {}\n",
            event.name,
            event.round,
            event.circuit,
            event.date.format("%Y-%m-%d")
        )),
        None => output.push_str("\nNo upcoming races this season.\n"),
    }
    output
}

pub fn render_results(season: i32, round: u32, results: &[RaceResult]) -> String {
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            vec![
                position_text(r),
                r.driver_code.clone(),
                r.driver_name.clone(),
                r.team_name.clone(),
                r.grid.to_string(),
                format_points(r.points),
                status_text(r),
            ]
        })
        .collect();

    let mut output = format!("🏎️  Results: {} round {}\n\n", season, round);
    output.push_str(&render_table(
        &["Pos", "Code", "Driver", "Team", "Grid", "Points", "Status"],
        &rows,
    ));
    output
}

pub fn render_fastest_lap(row: &RaceResult) -> String {
    let mut output = format!("⏱️  Fastest lap: {} round {}\n\n", row.season, row.round);
    output.push_str(&format!("   Driver: {} ({})\n", row.driver_name, row.driver_code));
    output.push_str(&format!("   Team:   {}\n", row.team_name));
    output.push_str(&format!("   Time:   {}\n", lap_text(row)));
    if let Some(lap) = row.fastest_lap_number {
        output.push_str(&format!("   Lap:    {}\n", lap));
    }
    output
}

/// Podium, DNF or standings table.
pub fn render_stat_table(title: &str, table: &SeasonStatTable) -> String {
    let subject = match table.subject {
        StatSubject::Driver => "Driver",
        StatSubject::Team => "Team",
    };
    let with_wins = table.rows.iter().any(|r| r.wins.is_some());

    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| {
            let mut cells = vec![r.rank.to_string(), r.key.clone(), r.value.to_string()];
            if with_wins {
                cells.push(r.wins.unwrap_or(0).to_string());
            }
            cells
        })
        .collect();

    let metric = table.metric.to_string();
    let mut headers = vec!["Rank", subject, metric.as_str()];
    if with_wins {
        headers.push("wins");
    }

    let mut output = format!("{} ({})\n\n", title, table.season_label());
    if rows.is_empty() {
        output.push_str("No entries.\n");
    } else {
        output.push_str(&render_table(&headers, &rows));
    }
    output.push_str(&render_skipped(&table.skipped));
    output
}

pub fn render_standings(standings: &Standings) -> String {
    let mut output = render_stat_table("🏆 Driver standings", &standings.drivers);
    output.push('\n');
    output.push_str(&render_stat_table("🏗️  Team standings", &standings.teams));
    output
}

fn metric_cells(metric: &Metric<DriverSeasonStats>) -> Vec<String> {
    match metric.as_present() {
        Some(stats) => vec![
            stats.races.to_string(),
            format_points(stats.points),
            stats.wins.to_string(),
            stats.podiums.to_string(),
            stats.dnfs.to_string(),
        ],
        None => vec!["no data".to_string(); 5],
    }
}

pub fn render_comparison(report: &DriverComparisonReport) -> String {
    let mut rows = Vec::new();
    for season in &report.seasons {
        for (driver, metric) in [
            (&report.driver_a, &season.driver_a),
            (&report.driver_b, &season.driver_b),
        ] {
            let mut cells = vec![
                season.season.to_string(),
                season.rounds.len().to_string(),
                driver.clone(),
            ];
            cells.extend(metric_cells(metric));
            rows.push(cells);
        }
    }

    let mut output = format!("⚔️  {} vs {}\n\n", report.driver_a, report.driver_b);
    output.push_str(&render_table(
        &["Season", "Rounds", "Driver", "Races", "Points", "Wins", "Podiums", "DNFs"],
        &rows,
    ));
    output.push_str(&render_skipped(&report.skipped));
    output
}

pub fn render_summary(race_summary: &RaceSummary) -> String {
    let summary = &race_summary.summary;
    let mut output = String::new();

    match &race_summary.event {
        Some(event) => {
            output.push_str(&format!("🏁 {} {}\n", event.season, event.name));
            output.push_str(&format!(
                "   {} | {}, {} | {}\n\n",
                event.circuit,
                event.locality,
                event.country,
                event.date.format("%Y-%m-%d")
            ));
        }
        None => output.push_str(&format!("🏁 {}\n\n", summary.race)),
    }

    match &summary.winner {
        Some(winner) => output.push_str(&format!(
            "   Winner: {} ({})\n",
            winner.driver_name, winner.team_name
        )),
        None => output.push_str("   Winner: N/A\n"),
    }

    match &summary.fastest_lap {
        Some(row) => output.push_str(&format!(
            "   Fastest lap: {} {}\n",
            row.driver_code,
            lap_text(row)
        )),
        None => output.push_str("   Fastest lap: N/A\n"),
    }

    output.push_str("\nPodium\n");
    let podium: Vec<Vec<String>> = summary
        .podium
        .iter()
        .map(|r| {
            vec![
                position_text(r),
                r.driver_name.clone(),
                r.team_name.clone(),
                format_points(r.points),
            ]
        })
        .collect();
    output.push_str(&render_table(&["Pos", "Driver", "Team", "Points"], &podium));

    output.push_str("\nTeam points\n");
    let teams: Vec<Vec<String>> = summary
        .team_points
        .iter()
        .map(|r| vec![r.key.clone(), r.value.to_string()])
        .collect();
    output.push_str(&render_table(&["Team", "Points"], &teams));

    if !summary.retirements.is_empty() {
        output.push_str("\nRetirements\n");
        let retirements: Vec<Vec<String>> = summary
            .retirements
            .iter()
            .map(|r| vec![r.driver_name.clone(), r.team_name.clone(), status_text(r)])
            .collect();
        output.push_str(&render_table(&["Driver", "Team", "Status"], &retirements));
    }

    output.push_str(&render_skipped(&summary.skipped));
    output
}
