use std::collections::HashSet;
use std::path::PathBuf;

use rand::Rng;

use fixture_dash::fixtures::load_fixtures;
use fixture_dash::gameweek::GameweekConfig;
use fixture_dash::players::{
    PlayerRecord, SoiTier, SoiWeights, StrengthMetric, build_player_grid, filter_players,
    load_players, normalize, player_strengths, soi, soi_score, soi_tier,
};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn player(name: &str) -> PlayerRecord {
    PlayerRecord {
        name: name.to_string(),
        club: "Alpha".to_string(),
        position: "Forward".to_string(),
        l5_score_avg: None,
        l15_score_avg: None,
        mean_opp_score: None,
        median_opp_score: None,
        l5_mins_sum: None,
        l15_mins_sum: None,
        average_score: None,
        count: None,
    }
}

#[test]
fn normalize_clips_and_inverts() {
    assert_eq!(normalize(Some(35.0), 70.0, false), Some(0.5));
    assert_eq!(normalize(Some(140.0), 70.0, false), Some(1.0));
    assert_eq!(normalize(Some(-10.0), 70.0, false), Some(0.0));
    assert_eq!(normalize(Some(15.0), 60.0, true), Some(0.75));
    assert_eq!(normalize(Some(90.0), 60.0, true), Some(0.0));
    assert_eq!(normalize(None, 70.0, false), None);
    assert_eq!(normalize(Some(f64::NAN), 70.0, false), None);
    assert_eq!(normalize(Some(f64::INFINITY), 70.0, false), None);
}

#[test]
fn strength_table_constants() {
    let expected = [
        (StrengthMetric::L5Form, 70.0, false),
        (StrengthMetric::L15Form, 70.0, false),
        (StrengthMetric::Next5Diff, 60.0, true),
        (StrengthMetric::L5Mins, 450.0, false),
        (StrengthMetric::L15Mins, 1350.0, false),
    ];
    for (metric, divisor, inverse) in expected {
        assert_eq!(metric.divisor(), divisor, "{metric:?}");
        assert_eq!(metric.inverse(), inverse, "{metric:?}");
    }
    assert!(approx(SoiWeights::default().total(), 1.0));
}

#[test]
fn non_finite_counters_warn_and_count_as_missing() {
    let mut p = player("Odd");
    p.l5_score_avg = Some(f64::INFINITY);
    p.l15_score_avg = Some(70.0);
    let mut warnings = Vec::new();
    let strengths = player_strengths(&p, &mut warnings);
    assert_eq!(strengths.get(StrengthMetric::L5Form), None);
    assert_eq!(strengths.get(StrengthMetric::L15Form), Some(1.0));
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].counter, StrengthMetric::L5Form.counter());
}

#[test]
fn soi_stays_in_unit_range_for_any_weights() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let terms: Vec<(f64, Option<f64>)> = (0..5)
            .map(|_| {
                let w = rng.gen_range(0.0..2.0);
                let s = if rng.gen_bool(0.2) { None } else { Some(rng.gen_range(0.0..=1.0)) };
                (w, s)
            })
            .collect();
        let score = soi_score(terms);
        assert!((0.0..=1.0).contains(&score), "{score}");
    }
}

#[test]
fn missing_strength_costs_exactly_its_weight() {
    let partial = soi_score([(0.6, Some(1.0)), (0.4, None)]);
    let full = soi_score([(0.6, Some(1.0)), (0.4, Some(1.0))]);
    assert!(approx(partial, 0.6));
    assert!(approx(full, 1.0));
    assert!(approx(full - partial, 0.4));
}

#[test]
fn soi_with_default_weights() {
    let mut p = player("Ana");
    p.l5_score_avg = Some(70.0);
    p.l15_score_avg = Some(35.0);
    p.mean_opp_score = Some(30.0);
    p.l5_mins_sum = Some(450.0);
    p.l15_mins_sum = Some(675.0);
    let mut warnings = Vec::new();
    let strengths = player_strengths(&p, &mut warnings);
    assert!(approx(soi(&strengths, &SoiWeights::default()), 0.7));
    assert!(warnings.is_empty());
}

#[test]
fn weight_overrides_keep_defaults_for_absent_keys() {
    let weights = SoiWeights::from_json_overrides(r#"{"l5_form": 0.5}"#).unwrap();
    assert_eq!(weights.l5_form, 0.5);
    assert_eq!(weights.l15_form, 0.25);
    assert!(SoiWeights::from_json_overrides(r#"{"l6_form": 0.5}"#).is_err());
}

#[test]
fn filter_players_by_position_schedule_and_team() {
    let fixtures = load_fixtures(&fixture_path("fixtures.csv"), &GameweekConfig::default())
        .unwrap()
        .rows;
    let players = load_players(&fixture_path("players.csv")).unwrap().rows;
    let laliga = vec!["LaLiga".to_string()];

    let picked = filter_players(&players, &fixtures, &[1, 2, 3], &laliga, "Forward", None);
    let names: Vec<&str> = picked.iter().map(|p| p.name.as_str()).collect();
    // Eta has no scheduled fixture and Epsilon plays elsewhere.
    assert_eq!(names, vec!["Ana Striker", "Ben Winger", "Cal Target"]);

    let only_beta: HashSet<String> = HashSet::from(["Beta".to_string()]);
    let picked = filter_players(&players, &fixtures, &[1, 2, 3], &laliga, "Forward", Some(&only_beta));
    assert_eq!(picked.len(), 1);
    assert_eq!(picked[0].name, "Ben Winger");

    let picked = filter_players(&players, &fixtures, &[3], &laliga, "Forward", None);
    let names: Vec<&str> = picked.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Cal Target"]);
}

#[test]
fn grid_sorts_by_soi_and_formats_cells() {
    let players = load_players(&fixture_path("players.csv")).unwrap().rows;
    let forwards: Vec<&PlayerRecord> = players.iter().filter(|p| p.position == "Forward").collect();
    let grid = build_player_grid(&forwards, &SoiWeights::default());

    let order: Vec<&str> = grid.rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(order[0], "Eve Forward");
    assert_eq!(*order.last().unwrap(), "Cal Target");
    assert!(grid.rows.windows(2).all(|w| w[0].soi >= w[1].soi));

    let ana = grid.rows.iter().find(|r| r.name == "Ana Striker").unwrap();
    let cells: Vec<String> = ana.metrics.iter().map(|m| m.display_text()).collect();
    assert_eq!(cells, vec!["1.00", "0.50", "0.50", "100%", "50%"]);

    let cal = grid.rows.iter().find(|r| r.name == "Cal Target").unwrap();
    assert_eq!(cal.soi, 0.0);
    assert!(cal.metrics.iter().all(|m| m.display_text() == "-"));
    assert_eq!(soi_tier(cal.soi), SoiTier::Low);
    assert_eq!(soi_tier(grid.rows[0].soi), SoiTier::High);
}

#[test]
fn grid_sort_is_stable_for_ties() {
    let a = player("First");
    let b = player("Second");
    let grid = build_player_grid(&[&a, &b], &SoiWeights::default());
    assert_eq!(grid.rows[0].name, "First");
    assert_eq!(grid.rows[1].name, "Second");
}
