use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing_subscriber::EnvFilter;

use fixture_dash::cohesion::{CohesionParams, display_rows, rank_partners};
use fixture_dash::config::AppConfig;
use fixture_dash::export::{ExportBundle, ExportFormat, export_bundle};
use fixture_dash::fixtures::{
    self, DifficultyMetric, FixtureFilter, FixtureRecord, load_fixtures, parse_gameweek_list,
};
use fixture_dash::pivot::build_fixture_grid;
use fixture_dash::players::{PlayerRecord, build_player_grid, filter_players, load_players};

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut config = AppConfig::from_env();
    if let Some(path) = parse_path_arg("--fixtures") {
        config.fixtures_path = path;
    }
    if let Some(path) = parse_path_arg("--players") {
        config.players_path = path;
    }
    let out_dir = parse_path_arg("--out").unwrap_or_else(|| config.export_dir.clone());
    let format = match parse_string_arg("--format") {
        Some(raw) => match ExportFormat::parse(&raw) {
            Some(f) => f,
            None => bail!("unknown --format {raw} (expected csv, xlsx or json)"),
        },
        None => ExportFormat::Csv,
    };
    let metric = match parse_string_arg("--metric") {
        Some(raw) => match DifficultyMetric::parse(&raw) {
            Some(m) => m,
            None => bail!("unknown --metric {raw} (expected mean or median)"),
        },
        None => DifficultyMetric::Mean,
    };
    let requested_gws = match parse_string_arg("--gameweeks") {
        Some(raw) => match parse_gameweek_list(&raw) {
            Some(gws) => gws,
            None => bail!("bad --gameweeks {raw} (expected e.g. 1-5 or 1,2,4)"),
        },
        None => Vec::new(),
    };
    let min_both_play = parse_f64_arg("--min-both-play").unwrap_or(0.0);
    let top_n = parse_usize_arg("--top").unwrap_or(config.cohesion_top_n);

    let dataset = load_fixtures(&config.fixtures_path, &config.gameweek)
        .with_context(|| format!("load fixtures from {}", config.fixtures_path.display()))?;
    let rows = &dataset.rows;

    let competitions = resolve_competitions(rows, &parse_list_arg("--competition"));
    let competition = competitions.first().map(String::as_str);
    let mut positions = parse_list_arg("--position");
    let Some(grid_position) = fixtures::grid_position(rows, competition, &positions) else {
        bail!("no positions found in {}", config.fixtures_path.display());
    };
    if positions.is_empty() {
        positions.push(grid_position.clone());
    } else if positions.len() > 1 {
        tracing::info!(position = %grid_position, "fixture grid uses the first position only");
    }
    let grid_positions = vec![grid_position];
    let gameweeks = if requested_gws.is_empty() {
        fixtures::gameweeks(rows, competition, &positions)
    } else {
        requested_gws
    };

    let filter = FixtureFilter {
        competitions: competitions.clone(),
        positions: grid_positions,
        gameweeks: gameweeks.clone(),
    };
    let fixture_grid = match filter.apply(rows) {
        Ok(selected) => Some(build_fixture_grid(&selected, metric, &gameweeks)),
        Err(err) => {
            println!("{err}");
            None
        }
    };

    let scoped: Vec<FixtureRecord> = rows
        .iter()
        .filter(|r| competitions.is_empty() || competitions.contains(&r.competition))
        .cloned()
        .collect();

    let primary = parse_string_arg("--team").or_else(|| fixtures::teams(&scoped).into_iter().next());
    let cohesion_rows = match &primary {
        Some(primary) => {
            let params = CohesionParams {
                primary,
                gameweeks: &gameweeks,
                metric,
                positions: &positions,
                top_n,
                min_both_play_pct: min_both_play,
            };
            display_rows(&rank_partners(&scoped, &params))
        }
        None => Vec::new(),
    };

    let player_grid = match load_players(&config.players_path) {
        Ok(players) => {
            let all_competitions = if competitions.is_empty() {
                fixtures::competitions(rows)
            } else {
                competitions.clone()
            };
            let mut picked: Vec<&PlayerRecord> = Vec::new();
            for position in &positions {
                picked.extend(filter_players(
                    &players.rows,
                    rows,
                    &gameweeks,
                    &all_competitions,
                    position,
                    None,
                ));
            }
            Some(build_player_grid(&picked, &config.soi_weights))
        }
        Err(err) if err.is_not_found() => {
            tracing::warn!(error = %err, "skipping player export");
            None
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("load players from {}", config.players_path.display())
            });
        }
    };

    let bundle = ExportBundle {
        fixtures: fixture_grid.as_ref(),
        players: player_grid.as_ref(),
        cohesion: (!cohesion_rows.is_empty()).then_some(cohesion_rows.as_slice()),
    };
    let written = export_bundle(&out_dir, format, bundle)?;

    println!(
        "Fixtures: {} teams x {} gameweeks ({})",
        fixture_grid.as_ref().map_or(0, |g| g.rows.len()),
        gameweeks.len(),
        metric.label()
    );
    println!(
        "Players: {}",
        player_grid.as_ref().map_or(0, |g| g.rows.len())
    );
    println!(
        "Cohesion: {} partners for {}",
        cohesion_rows.len(),
        primary.as_deref().unwrap_or("-")
    );
    for path in &written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

/// Accept either display names or slugs; slugs map to the display name used
/// in the loaded rows.
fn resolve_competitions(rows: &[FixtureRecord], requested: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for want in requested {
        let hit = rows
            .iter()
            .find(|r| r.competition.eq_ignore_ascii_case(want) || r.comp_slug.eq_ignore_ascii_case(want));
        let name = hit.map(|r| r.competition.clone()).unwrap_or_else(|| want.clone());
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

fn parse_string_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    for (idx, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix(&format!("{name}="))
            && !v.trim().is_empty()
        {
            return Some(v.trim().to_string());
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

/// Repeatable and comma-separated.
fn parse_list_arg(name: &str) -> Vec<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut out = Vec::new();
    for (idx, arg) in args.iter().enumerate() {
        let raw = if let Some(v) = arg.strip_prefix(&format!("{name}=")) {
            Some(v)
        } else if arg == name {
            args.get(idx + 1).map(String::as_str)
        } else {
            None
        };
        let Some(raw) = raw else {
            continue;
        };
        out.extend(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
    }
    out
}

fn parse_path_arg(name: &str) -> Option<PathBuf> {
    parse_string_arg(name).map(PathBuf::from)
}

fn parse_f64_arg(name: &str) -> Option<f64> {
    parse_string_arg(name)?.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_usize_arg(name: &str) -> Option<usize> {
    parse_string_arg(name)?.parse::<usize>().ok()
}
