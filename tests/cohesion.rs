use std::path::PathBuf;

use fixture_dash::cohesion::{
    CohesionParams, cohesion_score, difficulty_term, display_rows, matchup_detail, position_label,
    rank_partners,
};
use fixture_dash::fixtures::{DifficultyMetric, FixtureRecord, Location, load_fixtures};
use fixture_dash::gameweek::GameweekConfig;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn laliga_rows() -> Vec<FixtureRecord> {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push("fixtures.csv");
    load_fixtures(&path, &GameweekConfig::default())
        .expect("fixture file should load")
        .rows
        .into_iter()
        .filter(|r| r.competition == "LaLiga")
        .collect()
}

fn record(team: &str, gw: u32, score: f64, location: Location, opponent: &str) -> FixtureRecord {
    FixtureRecord {
        team: team.to_string(),
        comp_slug: "laliga-es".to_string(),
        competition: "LaLiga".to_string(),
        opponent: opponent.to_string(),
        kickoff: None,
        location,
        position: "Forward".to_string(),
        score_mean: Some(score),
        score_median: Some(score),
        league_rank: None,
        source_gameweek: None,
        gameweek: Some(gw),
    }
}

fn record_in(position: &str, team: &str, gw: u32, score: f64, location: Location) -> FixtureRecord {
    FixtureRecord {
        position: position.to_string(),
        ..record(team, gw, score, location, "X")
    }
}

fn forwards() -> Vec<String> {
    vec!["Forward".to_string()]
}

#[test]
fn alpha_beta_worked_example() {
    let rows = vec![
        record("Alpha", 1, 40.0, Location::Home, "X"),
        record("Alpha", 2, 60.0, Location::Away, "Y"),
        record("Beta", 1, 55.0, Location::Away, "Z"),
        record("Beta", 2, 45.0, Location::Home, "W"),
    ];
    let score = cohesion_score(&rows, "Alpha", "Beta", &[1, 2], DifficultyMetric::Mean, &forwards())
        .expect("both teams play");

    assert_eq!(score.both_play_pct, 100.0);
    assert_eq!(score.primary_home_count, 1);
    assert_eq!(score.both_home_count, 0);
    assert_eq!(score.both_home_pct, 0.0);
    assert_eq!(score.combined_avg_difficulty, Some(50.0));
    assert!(approx(score.difficulty_term, 50.0 / 70.0));
    // 100 * 0.2 + 0 * 0.4 + (50 / 70) * 0.4
    assert!(approx(score.cohesion_score, 20.0 + 0.4 * 50.0 / 70.0));
    assert_eq!(score.overlap_count, 2);
}

#[test]
fn difficulty_term_guard() {
    assert!(approx(difficulty_term(Some(70.0)), 1.0));
    assert!(approx(difficulty_term(Some(35.0)), 0.5));
    assert_eq!(difficulty_term(Some(1.0)), 1.0);
    assert_eq!(difficulty_term(Some(0.5)), 1.0);
    assert_eq!(difficulty_term(None), 1.0);
}

#[test]
fn ranks_partners_by_score() {
    let rows = laliga_rows();
    let params = CohesionParams {
        primary: "Alpha",
        gameweeks: &[1, 2, 3],
        metric: DifficultyMetric::Mean,
        positions: &forwards(),
        top_n: 10,
        min_both_play_pct: 0.0,
    };
    let ranked = rank_partners(&rows, &params);
    let order: Vec<(usize, &str)> = ranked.iter().map(|s| (s.rank, s.partner.as_str())).collect();
    assert_eq!(order, vec![(1, "Gamma"), (2, "Beta"), (3, "Delta")]);

    let gamma = &ranked[0];
    assert!(approx(gamma.both_play_pct, 100.0 / 3.0));
    assert_eq!(gamma.both_home_pct, 100.0);
    assert_eq!(gamma.combined_avg_difficulty, Some(45.0));

    // Delta has no scores at all: the flat difficulty term applies.
    let delta = &ranked[2];
    assert_eq!(delta.both_play_pct, 0.0);
    assert_eq!(delta.combined_avg_difficulty, None);
    assert!(approx(delta.cohesion_score, 0.4));
}

#[test]
fn teams_without_fixtures_in_scope_never_rank() {
    let rows = laliga_rows();
    let params = CohesionParams {
        primary: "Alpha",
        gameweeks: &[1, 2],
        metric: DifficultyMetric::Mean,
        positions: &forwards(),
        top_n: 10,
        min_both_play_pct: 0.0,
    };
    let ranked = rank_partners(&rows, &params);
    let partners: Vec<&str> = ranked.iter().map(|s| s.partner.as_str()).collect();
    assert_eq!(partners, vec!["Gamma", "Beta"]);
    assert!(!partners.contains(&"Delta"));
    assert!(!partners.contains(&"Eta"));
    assert!(!partners.contains(&"Alpha"));
}

#[test]
fn min_both_play_and_top_n_trim_results() {
    let rows = laliga_rows();
    let positions = forwards();
    let mut params = CohesionParams {
        primary: "Alpha",
        gameweeks: &[1, 2, 3],
        metric: DifficultyMetric::Mean,
        positions: &positions,
        top_n: 10,
        min_both_play_pct: 50.0,
    };
    let ranked = rank_partners(&rows, &params);
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].partner, "Beta");
    assert_eq!(ranked[0].rank, 1);

    params.min_both_play_pct = 0.0;
    params.top_n = 2;
    assert_eq!(rank_partners(&rows, &params).len(), 2);
}

#[test]
fn ranking_is_deterministic() {
    let rows = laliga_rows();
    let positions = vec!["Defender".to_string(), "Forward".to_string()];
    let params = CohesionParams {
        primary: "Beta",
        gameweeks: &[1, 2, 3],
        metric: DifficultyMetric::Median,
        positions: &positions,
        top_n: 10,
        min_both_play_pct: 0.0,
    };
    let first = rank_partners(&rows, &params);
    for _ in 0..20 {
        assert_eq!(rank_partners(&rows, &params), first);
    }
    assert_eq!(first[0].position, "Defender, Forward");
}

#[test]
fn multiple_positions_pool_fixtures_and_difficulty() {
    let rows = laliga_rows();
    let positions = vec!["Defender".to_string(), "Forward".to_string()];
    let params = CohesionParams {
        primary: "Alpha",
        gameweeks: &[1, 2, 3],
        metric: DifficultyMetric::Mean,
        positions: &positions,
        top_n: 10,
        min_both_play_pct: 0.0,
    };
    let ranked = rank_partners(&rows, &params);
    let order: Vec<&str> = ranked.iter().map(|s| s.partner.as_str()).collect();
    assert_eq!(order, vec!["Gamma", "Beta", "Delta"]);

    // Alpha: 40, 60 (Forward) and 52 (Defender). Beta: 55, 45 and 38.
    let beta = &ranked[1];
    assert_eq!(beta.overlap_count, 2);
    assert!(approx(beta.both_play_pct, 200.0 / 3.0));
    assert_eq!(beta.both_home_pct, 0.0);
    let combined = (152.0 / 3.0 + 138.0 / 3.0) / 2.0;
    assert!(approx(beta.combined_avg_difficulty.unwrap(), combined));
    assert!(approx(beta.cohesion_score, 200.0 / 3.0 * 0.2 + combined / 70.0 * 0.4));

    // Gamma only has Forward rows; Alpha's pooled mean still includes 52.
    let gamma = &ranked[0];
    assert_eq!(gamma.overlap_count, 1);
    assert!(approx(gamma.combined_avg_difficulty.unwrap(), (152.0 / 3.0 + 40.0) / 2.0));
}

#[test]
fn any_selected_position_counts_as_playing() {
    let rows = vec![
        record_in("Forward", "Alpha", 1, 40.0, Location::Home),
        record_in("Forward", "Alpha", 2, 50.0, Location::Home),
        record_in("Defender", "Beta", 1, 60.0, Location::Home),
        record_in("Forward", "Beta", 2, 30.0, Location::Away),
    ];
    let both = vec!["Defender".to_string(), "Forward".to_string()];
    let score = cohesion_score(&rows, "Alpha", "Beta", &[1, 2], DifficultyMetric::Mean, &both).unwrap();
    assert_eq!(score.overlap_count, 2);
    assert_eq!(score.both_play_pct, 100.0);
    assert_eq!(score.primary_home_count, 2);
    assert_eq!(score.both_home_count, 1);
    assert_eq!(score.both_home_pct, 50.0);
    assert_eq!(score.combined_avg_difficulty, Some(45.0));

    let score = cohesion_score(&rows, "Alpha", "Beta", &[1, 2], DifficultyMetric::Mean, &forwards()).unwrap();
    assert_eq!(score.overlap_count, 1);
    assert_eq!(score.both_play_pct, 50.0);
    assert_eq!(score.combined_avg_difficulty, Some(37.5));
}

#[test]
fn equal_scores_keep_encounter_order() {
    let rows = vec![
        record("Alpha", 1, 40.0, Location::Home, "X"),
        record("Zulu", 1, 50.0, Location::Home, "Y"),
        record("Mike", 1, 50.0, Location::Home, "Z"),
        record("Kilo", 1, 50.0, Location::Home, "W"),
    ];
    let params = CohesionParams {
        primary: "Alpha",
        gameweeks: &[1],
        metric: DifficultyMetric::Mean,
        positions: &forwards(),
        top_n: 10,
        min_both_play_pct: 0.0,
    };
    let ranked = rank_partners(&rows, &params);
    assert!(ranked.windows(2).all(|w| w[0].cohesion_score == w[1].cohesion_score));
    let order: Vec<(usize, &str)> = ranked.iter().map(|s| (s.rank, s.partner.as_str())).collect();
    assert_eq!(order, vec![(1, "Zulu"), (2, "Mike"), (3, "Kilo")]);
}

#[test]
fn empty_positions_or_gameweeks_yield_nothing() {
    let rows = laliga_rows();
    let none: Vec<String> = Vec::new();
    let params = CohesionParams {
        primary: "Alpha",
        gameweeks: &[1, 2],
        metric: DifficultyMetric::Mean,
        positions: &none,
        top_n: 10,
        min_both_play_pct: 0.0,
    };
    assert!(rank_partners(&rows, &params).is_empty());

    let positions = forwards();
    let params = CohesionParams {
        gameweeks: &[],
        positions: &positions,
        ..params
    };
    assert!(rank_partners(&rows, &params).is_empty());
}

#[test]
fn matchup_detail_picks_easier_side() {
    let rows = laliga_rows();
    let detail = matchup_detail(&rows, "Alpha", "Gamma", &[3, 1, 2], DifficultyMetric::Mean, &forwards());
    let gws: Vec<u32> = detail.iter().map(|d| d.gameweek).collect();
    assert_eq!(gws, vec![1, 2, 3]);

    // GW1: Alpha 40 (H) vs Gamma 50 (H); tie-free, Alpha is easier.
    assert_eq!(detail[0].primary.opponent, "X");
    assert!(detail[0].both_home);
    assert_eq!(detail[0].best_choice, "Alpha");
    assert_eq!(detail[0].best_difficulty, Some(40.0));

    // GW2: only Alpha plays.
    assert_eq!(detail[1].partner.opponent, "-");
    assert_eq!(detail[1].best_choice, "Alpha");

    // GW3: only Gamma plays.
    assert_eq!(detail[2].primary.location, "-");
    assert_eq!(detail[2].best_choice, "Gamma");
    assert_eq!(detail[2].best_difficulty, Some(30.0));
}

#[test]
fn matchup_ties_go_to_partner() {
    let rows = vec![
        record("Alpha", 1, 50.0, Location::Home, "X"),
        record("Beta", 1, 50.0, Location::Away, "Y"),
    ];
    let detail = matchup_detail(&rows, "Alpha", "Beta", &[1], DifficultyMetric::Mean, &forwards());
    assert_eq!(detail[0].best_choice, "Beta");
    assert!(!detail[0].both_home);
}

#[test]
fn display_rows_round_to_one_decimal() {
    let rows = laliga_rows();
    let params = CohesionParams {
        primary: "Alpha",
        gameweeks: &[1, 2, 3],
        metric: DifficultyMetric::Mean,
        positions: &forwards(),
        top_n: 10,
        min_both_play_pct: 0.0,
    };
    let display = display_rows(&rank_partners(&rows, &params));
    assert_eq!(display[0].team, "Gamma");
    assert_eq!(display[0].both_play_pct, 33.3);
    assert_eq!(
        display[0].cells(),
        vec!["1", "Gamma", "Forward", "33.3", "100.0", "45.0", "46.9"]
    );
    assert_eq!(display[2].cells()[5], "-");
}

#[test]
fn position_labels() {
    assert_eq!(position_label(&["Forward".to_string()]), "Forward");
    assert_eq!(
        position_label(&["Midfielder".to_string(), "Defender".to_string()]),
        "Defender, Midfielder"
    );
    assert_eq!(position_label(&[]), "");
}
