use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::Weekday;
use once_cell::sync::Lazy;

use crate::color::{Palette, Rgb};
use crate::gameweek::GameweekConfig;
use crate::players::SoiWeights;

const DEFAULT_FIXTURES_PATH: &str = "data/Calculated Opponent Difficulty.csv";
const DEFAULT_PLAYERS_PATH: &str = "data/Player Metrics.csv";

pub const DIFFICULTY_CENTER: f64 = 48.0;
pub const COLOR_OPACITY: f64 = 2.0;
pub const STRENGTH_CENTER: f64 = 0.5;
pub const STRENGTH_INTENSITY: f64 = 0.8;
pub const NEXT5_INTENSITY: f64 = 1.0;
pub const COHESION_TOP_N: usize = 10;

static COMPETITION_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("primera-division-cl", "Primera Division"),
        ("laliga-es", "LaLiga"),
        ("bundesliga-de", "Bundesliga"),
        ("austrian-bundesliga", "Austrian Bundesliga"),
        ("serie-a-it", "Serie A"),
        ("campeonato-brasileiro-serie-a", "Brasil Serie A"),
    ])
});

/// Known slug wins; otherwise the source file's own competition name.
pub fn competition_display(slug: &str, fallback: &str) -> String {
    match COMPETITION_NAMES.get(slug.trim()) {
        Some(name) => (*name).to_string(),
        None => fallback.trim().to_string(),
    }
}

pub fn difficulty_palette() -> Palette {
    Palette {
        high: Rgb(34, 197, 94),
        low: Rgb(239, 68, 68),
        neutral: Rgb(255, 255, 255),
    }
}

pub fn strength_palette() -> Palette {
    difficulty_palette()
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub fixtures_path: PathBuf,
    pub players_path: PathBuf,
    pub difficulty_center: f64,
    pub color_opacity: f64,
    pub strength_center: f64,
    pub soi_weights: SoiWeights,
    pub gameweek: GameweekConfig,
    pub cohesion_top_n: usize,
    pub export_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fixtures_path: PathBuf::from(DEFAULT_FIXTURES_PATH),
            players_path: PathBuf::from(DEFAULT_PLAYERS_PATH),
            difficulty_center: DIFFICULTY_CENTER,
            color_opacity: COLOR_OPACITY,
            strength_center: STRENGTH_CENTER,
            soi_weights: SoiWeights::default(),
            gameweek: GameweekConfig::default(),
            cohesion_top_n: COHESION_TOP_N,
            export_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let fixtures_path = env_string("FIXTURES_PATH")
            .or_else(|| env_string("DATA_PATH"))
            .map(PathBuf::from)
            .unwrap_or(defaults.fixtures_path);
        let players_path = env_string("PLAYERS_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.players_path);

        let soi_weights = match env_string("SOI_WEIGHTS") {
            Some(raw) => match SoiWeights::from_json_overrides(&raw) {
                Ok(weights) => weights,
                Err(err) => {
                    tracing::warn!(error = %err, "ignoring invalid SOI_WEIGHTS");
                    defaults.soi_weights
                }
            },
            None => defaults.soi_weights,
        };

        let gw_defaults = defaults.gameweek;
        let gameweek = GameweekConfig {
            anchor_weekday: env_string("GW_ANCHOR_WEEKDAY")
                .and_then(|raw| raw.parse::<Weekday>().ok())
                .unwrap_or(gw_defaults.anchor_weekday),
            anchor_hour: env_parse::<u32>("GW_ANCHOR_HOUR")
                .filter(|h| *h < 24)
                .unwrap_or(gw_defaults.anchor_hour),
            utc_offset_hours: env_parse::<i32>("GW_UTC_OFFSET_HOURS")
                .filter(|h| (-23..=23).contains(h))
                .unwrap_or(gw_defaults.utc_offset_hours),
            spans_days: gw_defaults.spans_days,
            origin: env_parse::<u32>("GW_ORIGIN").unwrap_or(gw_defaults.origin),
        };

        Self {
            fixtures_path,
            players_path,
            difficulty_center: env_parse::<f64>("DIFFICULTY_CENTER")
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(defaults.difficulty_center),
            color_opacity: env_parse::<f64>("COLOR_OPACITY")
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(defaults.color_opacity),
            strength_center: env_parse::<f64>("STRENGTH_CENTER")
                .filter(|v| v.is_finite() && *v > 0.0)
                .unwrap_or(defaults.strength_center),
            soi_weights,
            gameweek,
            cohesion_top_n: env_parse::<usize>("COHESION_TOP_N")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.cohesion_top_n),
            export_dir: env_string("EXPORT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.export_dir),
        }
    }
}

/// `$XDG_CACHE_HOME/fixture_dash`, falling back to `~/.cache/fixture_dash`.
pub fn app_cache_dir() -> Option<PathBuf> {
    const CACHE_DIR: &str = "fixture_dash";
    if let Some(base) = env_string("XDG_CACHE_HOME") {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = env_string("HOME")?;
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn env_string(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|raw| raw.parse::<T>().ok())
}
