use std::collections::HashSet;
use std::path::PathBuf;

use fixture_dash::fixtures::{
    DifficultyMetric, FixtureFilter, FixtureRecord, Location, load_fixtures,
};
use fixture_dash::gameweek::GameweekConfig;
use fixture_dash::pivot::{PivotColumn, build_fixture_grid, cell_label, pivot, row_average};

fn fixture_rows() -> Vec<FixtureRecord> {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("fixtures.csv");
    load_fixtures(&path, &GameweekConfig::default())
        .expect("fixture file should load")
        .rows
}

fn laliga_forwards(rows: &[FixtureRecord], gameweeks: Vec<u32>) -> Vec<&FixtureRecord> {
    FixtureFilter {
        competitions: vec!["LaLiga".to_string()],
        positions: vec!["Forward".to_string()],
        gameweeks,
    }
    .apply(rows)
    .expect("filter should match")
}

fn record(team: &str, gw: u32, score: Option<f64>, location: Location, opponent: &str) -> FixtureRecord {
    FixtureRecord {
        team: team.to_string(),
        comp_slug: "laliga-es".to_string(),
        competition: "LaLiga".to_string(),
        opponent: opponent.to_string(),
        kickoff: None,
        location,
        position: "Forward".to_string(),
        score_mean: score,
        score_median: score.map(|s| s + 1.0),
        league_rank: None,
        source_gameweek: None,
        gameweek: Some(gw),
    }
}

#[test]
fn every_filtered_team_appears_once() {
    let rows = fixture_rows();
    let selected = laliga_forwards(&rows, vec![1, 2, 3]);
    let tables = pivot(&selected, DifficultyMetric::Mean, &[1, 2, 3]);

    let teams: Vec<&str> = tables.rows.iter().map(|r| r.team.as_str()).collect();
    let unique: HashSet<&str> = teams.iter().copied().collect();
    assert_eq!(teams.len(), unique.len());
    assert_eq!(unique, HashSet::from(["Alpha", "Beta", "Gamma", "Delta"]));
}

#[test]
fn rows_sort_by_rank_with_unranked_last() {
    let rows = fixture_rows();
    let selected = laliga_forwards(&rows, vec![1, 2, 3]);
    let grid = build_fixture_grid(&selected, DifficultyMetric::Mean, &[1, 2, 3]);
    let order: Vec<(&str, &str)> = grid
        .rows
        .iter()
        .map(|r| (r.rank.label.as_str(), r.team.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![("1", "Beta"), ("2", "Alpha"), ("3", "Delta"), ("-", "Gamma")]
    );
    assert_eq!(grid.headers, vec!["GW 1", "GW 2", "GW 3", "Avg"]);
}

#[test]
fn cells_carry_label_value_and_opponent() {
    let rows = fixture_rows();
    let selected = laliga_forwards(&rows, vec![1, 2, 3]);
    let grid = build_fixture_grid(&selected, DifficultyMetric::Mean, &[1, 2, 3]);

    let alpha = grid.row("Alpha").unwrap();
    let labels: Vec<&str> = alpha.cells.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["40.0 (H)", "60.0 (A)", "", "50.0"]);
    assert_eq!(alpha.cells[0].tooltip, "X");
    assert_eq!(alpha.cells[2].value, None);
    assert_eq!(alpha.cells[2].tooltip, "");
    assert_eq!(grid.average("Alpha"), Some(50.0));

    // A fixture with no score keeps its opponent but has no label.
    let delta = grid.row("Delta").unwrap();
    assert_eq!(delta.cells[2].label, "");
    assert_eq!(delta.cells[2].tooltip, "Gamma");
    assert_eq!(delta.cells[3].label, "");
    assert_eq!(grid.average("Delta"), None);
}

#[test]
fn median_metric_switches_values() {
    let rows = fixture_rows();
    let selected = laliga_forwards(&rows, vec![1, 2]);
    let grid = build_fixture_grid(&selected, DifficultyMetric::Median, &[1, 2]);
    let beta = grid.row("Beta").unwrap();
    assert_eq!(beta.cells[0].label, "50.0 (A)");
    assert_eq!(beta.cells[1].label, "44.0 (H)");
    assert_eq!(grid.average("Beta"), Some(47.0));
}

#[test]
fn average_ignores_missing_gameweeks() {
    let rows = vec![
        record("Alpha", 1, Some(40.0), Location::Home, "X"),
        record("Alpha", 3, Some(50.0), Location::Away, "Y"),
    ];
    let refs: Vec<&FixtureRecord> = rows.iter().collect();
    let tables = pivot(&refs, DifficultyMetric::Mean, &[1, 2, 3]);
    assert_eq!(tables.values[0], vec![Some(40.0), None, Some(50.0), Some(45.0)]);
    assert_eq!(tables.labels[0][3], "45.0");
    assert_eq!(tables.columns.last(), Some(&PivotColumn::Average));
}

#[test]
fn duplicate_team_gameweek_keeps_first_fixture() {
    let rows = vec![
        record("Alpha", 1, Some(40.0), Location::Home, "X"),
        record("Alpha", 1, Some(70.0), Location::Away, "Y"),
    ];
    let refs: Vec<&FixtureRecord> = rows.iter().collect();
    let tables = pivot(&refs, DifficultyMetric::Mean, &[1]);
    assert_eq!(tables.values[0][0], Some(40.0));
    assert_eq!(tables.labels[0][0], "40.0 (H)");
    assert_eq!(tables.opponents[0][0], "X");
}

#[test]
fn empty_gameweek_list_uses_observed_gameweeks() {
    let rows = vec![
        record("Alpha", 4, Some(40.0), Location::Home, "X"),
        record("Beta", 2, Some(30.0), Location::Away, "Y"),
    ];
    let refs: Vec<&FixtureRecord> = rows.iter().collect();
    let tables = pivot(&refs, DifficultyMetric::Mean, &[]);
    assert_eq!(
        tables.columns,
        vec![PivotColumn::Gameweek(2), PivotColumn::Gameweek(4), PivotColumn::Average]
    );
}

#[test]
fn helpers_format_and_average() {
    assert_eq!(cell_label(Some(47.26), Location::Away), "47.3 (A)");
    assert_eq!(cell_label(None, Location::Home), "");
    assert_eq!(row_average(&[Some(40.0), None, Some(50.0)]), Some(45.0));
    assert_eq!(row_average(&[None, None]), None);
}
