use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::error::{DataError, NormalizationWarning};
use crate::fixtures::{
    FixtureRecord, HeaderIndex, LoadReport, attach_path, csv_error, open_input, parse_number,
};

pub const COL_PLAYER_NAME: &str = "displayName";
pub const COL_CLUB: &str = "Club";
pub const COL_PLAYER_POSITION: &str = "Position";
pub const COL_L5_SCORE: &str = "Last_5_Score_Running_Avg";
pub const COL_L15_SCORE: &str = "Last_15_Score_Running_Avg";
pub const COL_MEAN_OPP: &str = "Mean_Opp_Score";
pub const COL_MEDIAN_OPP: &str = "Median_Opp_Score";
pub const COL_L5_MINS: &str = "Last_5_Mins_Played_Running_Sum";
pub const COL_L15_MINS: &str = "Last_15_Mins_Played_Running_Sum";
pub const COL_AVERAGE_SCORE: &str = "averageScore";
pub const COL_COUNT: &str = "Count";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRecord {
    pub name: String,
    pub club: String,
    pub position: String,
    pub l5_score_avg: Option<f64>,
    pub l15_score_avg: Option<f64>,
    pub mean_opp_score: Option<f64>,
    pub median_opp_score: Option<f64>,
    pub l5_mins_sum: Option<f64>,
    pub l15_mins_sum: Option<f64>,
    pub average_score: Option<f64>,
    pub count: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PlayerDataset {
    pub rows: Vec<PlayerRecord>,
    pub report: LoadReport,
}

pub fn load_players(path: &Path) -> Result<PlayerDataset, DataError> {
    let file = open_input(path)?;
    let source = path.display().to_string();
    parse_players(file, &source).map_err(|err| attach_path(err, path))
}

pub fn parse_players<R: Read>(reader: R, source: &str) -> Result<PlayerDataset, DataError> {
    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv.headers().map_err(|err| csv_error(err, source))?.clone();
    let index = HeaderIndex::new(&headers, source);

    let name = index.required(COL_PLAYER_NAME)?;
    let club = index.required(COL_CLUB)?;
    let position = index.required(COL_PLAYER_POSITION)?;
    // Counter columns are optional; an absent one leaves that strength missing.
    let l5_score = index.optional(COL_L5_SCORE);
    let l15_score = index.optional(COL_L15_SCORE);
    let mean_opp = index.optional(COL_MEAN_OPP);
    let median_opp = index.optional(COL_MEDIAN_OPP);
    let l5_mins = index.optional(COL_L5_MINS);
    let l15_mins = index.optional(COL_L15_MINS);
    let average_score = index.optional(COL_AVERAGE_SCORE);
    let count = index.optional(COL_COUNT);

    let mut report = LoadReport::default();
    let mut rows = Vec::new();
    for record in csv.records() {
        report.rows_read += 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(source, error = %err, "dropping unreadable player row");
                report.rows_dropped += 1;
                continue;
            }
        };
        if record.len() != headers.len() {
            report.rows_dropped += 1;
            continue;
        }
        let field = |idx: usize| record.get(idx).unwrap_or_default();
        let number = |idx: Option<usize>| idx.and_then(|idx| parse_number(field(idx)));
        if field(name).is_empty() {
            report.rows_dropped += 1;
            continue;
        }
        rows.push(PlayerRecord {
            name: field(name).to_string(),
            club: field(club).to_string(),
            position: field(position).to_string(),
            l5_score_avg: number(l5_score),
            l15_score_avg: number(l15_score),
            mean_opp_score: number(mean_opp),
            median_opp_score: number(median_opp),
            l5_mins_sum: number(l5_mins),
            l15_mins_sum: number(l15_mins),
            average_score: number(average_score),
            count: number(count),
        });
    }

    if report.rows_dropped > 0 {
        tracing::warn!(source, dropped = report.rows_dropped, "malformed player rows excluded");
    }
    if rows.is_empty() {
        return Err(DataError::EmptyDataset {
            file: source.to_string(),
        });
    }
    tracing::info!(source, rows = rows.len(), "players loaded");
    Ok(PlayerDataset { rows, report })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StrengthMetric {
    L5Form,
    L15Form,
    Next5Diff,
    L5Mins,
    L15Mins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayKind {
    Ratio,
    Percent,
}

impl StrengthMetric {
    pub const ALL: [StrengthMetric; 5] = [
        StrengthMetric::L5Form,
        StrengthMetric::L15Form,
        StrengthMetric::Next5Diff,
        StrengthMetric::L5Mins,
        StrengthMetric::L15Mins,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StrengthMetric::L5Form => "l5_form",
            StrengthMetric::L15Form => "l15_form",
            StrengthMetric::Next5Diff => "next_5_diff",
            StrengthMetric::L5Mins => "l5_mins",
            StrengthMetric::L15Mins => "l15_mins",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StrengthMetric::L5Form => "L5 Form",
            StrengthMetric::L15Form => "L15 Form",
            StrengthMetric::Next5Diff => "Next 5 Fixtures",
            StrengthMetric::L5Mins => "L5 Mins",
            StrengthMetric::L15Mins => "L15 Mins",
        }
    }

    pub fn tooltip(self) -> &'static str {
        match self {
            StrengthMetric::L5Form => "Last 5 games average score / 70",
            StrengthMetric::L15Form => "Last 15 games average score / 70",
            StrengthMetric::Next5Diff => "Upcoming fixture difficulty",
            StrengthMetric::L5Mins => "Last 5 games minutes / 450",
            StrengthMetric::L15Mins => "Last 15 games minutes / 1350",
        }
    }

    pub fn counter(self) -> &'static str {
        match self {
            StrengthMetric::L5Form => COL_L5_SCORE,
            StrengthMetric::L15Form => COL_L15_SCORE,
            StrengthMetric::Next5Diff => COL_MEAN_OPP,
            StrengthMetric::L5Mins => COL_L5_MINS,
            StrengthMetric::L15Mins => COL_L15_MINS,
        }
    }

    pub fn divisor(self) -> f64 {
        match self {
            StrengthMetric::L5Form | StrengthMetric::L15Form => 70.0,
            StrengthMetric::Next5Diff => 60.0,
            StrengthMetric::L5Mins => 450.0,
            StrengthMetric::L15Mins => 1350.0,
        }
    }

    /// Lower raw opponent difficulty means more opportunity.
    pub fn inverse(self) -> bool {
        matches!(self, StrengthMetric::Next5Diff)
    }

    pub fn display_kind(self) -> DisplayKind {
        match self {
            StrengthMetric::L5Mins | StrengthMetric::L15Mins => DisplayKind::Percent,
            _ => DisplayKind::Ratio,
        }
    }

    pub fn raw(self, player: &PlayerRecord) -> Option<f64> {
        match self {
            StrengthMetric::L5Form => player.l5_score_avg,
            StrengthMetric::L15Form => player.l15_score_avg,
            StrengthMetric::Next5Diff => player.mean_opp_score,
            StrengthMetric::L5Mins => player.l5_mins_sum,
            StrengthMetric::L15Mins => player.l15_mins_sum,
        }
    }
}

/// `clip(raw / divisor, 0, 1)`, inverted as `1 - x` when requested.
/// Non-finite input yields `None`.
pub fn normalize(raw: Option<f64>, divisor: f64, inverse: bool) -> Option<f64> {
    let raw = raw?;
    let scaled = raw / divisor;
    if !scaled.is_finite() {
        return None;
    }
    let clipped = scaled.clamp(0.0, 1.0);
    if inverse {
        Some((1.0 - clipped).clamp(0.0, 1.0))
    } else {
        Some(clipped)
    }
}

pub fn display_value(strength: Option<f64>, kind: DisplayKind) -> Option<f64> {
    let s = strength?;
    Some(match kind {
        DisplayKind::Ratio => (s * 100.0).round() / 100.0,
        DisplayKind::Percent => (s * 100.0).round(),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PlayerStrengths {
    pub values: [Option<f64>; 5],
}

impl PlayerStrengths {
    pub fn get(&self, metric: StrengthMetric) -> Option<f64> {
        self.values[metric_index(metric)]
    }

    pub fn set(&mut self, metric: StrengthMetric, value: Option<f64>) {
        self.values[metric_index(metric)] = value;
    }
}

fn metric_index(metric: StrengthMetric) -> usize {
    match metric {
        StrengthMetric::L5Form => 0,
        StrengthMetric::L15Form => 1,
        StrengthMetric::Next5Diff => 2,
        StrengthMetric::L5Mins => 3,
        StrengthMetric::L15Mins => 4,
    }
}

pub fn player_strengths(
    player: &PlayerRecord,
    warnings: &mut Vec<NormalizationWarning>,
) -> PlayerStrengths {
    let mut out = PlayerStrengths::default();
    for metric in StrengthMetric::ALL {
        let raw = metric.raw(player);
        if let Some(v) = raw
            && !v.is_finite()
        {
            warnings.push(NormalizationWarning {
                player: player.name.clone(),
                counter: metric.counter(),
                raw: v,
            });
        }
        out.set(metric, normalize(raw, metric.divisor(), metric.inverse()));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SoiWeights {
    pub l5_form: f64,
    pub l15_form: f64,
    pub next_5_diff: f64,
    pub l5_mins: f64,
    pub l15_mins: f64,
}

impl Default for SoiWeights {
    fn default() -> Self {
        Self {
            l5_form: 0.25,
            l15_form: 0.25,
            next_5_diff: 0.20,
            l5_mins: 0.15,
            l15_mins: 0.15,
        }
    }
}

impl SoiWeights {
    /// JSON object of weight overrides; absent keys keep their defaults.
    pub fn from_json_overrides(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn weight(&self, metric: StrengthMetric) -> f64 {
        match metric {
            StrengthMetric::L5Form => self.l5_form,
            StrengthMetric::L15Form => self.l15_form,
            StrengthMetric::Next5Diff => self.next_5_diff,
            StrengthMetric::L5Mins => self.l5_mins,
            StrengthMetric::L15Mins => self.l15_mins,
        }
    }

    pub fn total(&self) -> f64 {
        StrengthMetric::ALL.iter().map(|m| self.weight(*m)).sum()
    }
}

/// Raw weighted sum clipped to [0, 1]. A missing strength contributes zero and
/// stays in the blend, so gaps in a player's data lower the score instead of
/// being renormalized away.
pub fn soi_score(terms: impl IntoIterator<Item = (f64, Option<f64>)>) -> f64 {
    let sum: f64 = terms
        .into_iter()
        .map(|(weight, strength)| weight * strength.unwrap_or(0.0))
        .sum();
    if sum.is_nan() {
        return 0.0;
    }
    sum.clamp(0.0, 1.0)
}

pub fn soi(strengths: &PlayerStrengths, weights: &SoiWeights) -> f64 {
    soi_score(
        StrengthMetric::ALL
            .iter()
            .map(|m| (weights.weight(*m), strengths.get(*m))),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SoiTier {
    High,
    Medium,
    Low,
}

impl SoiTier {
    pub fn color(self) -> Rgb {
        match self {
            SoiTier::High => Rgb(0x22, 0xc5, 0x5e),
            SoiTier::Medium => Rgb(0xea, 0xb3, 0x08),
            SoiTier::Low => Rgb(0xef, 0x44, 0x44),
        }
    }
}

pub fn soi_tier(score: f64) -> SoiTier {
    if score >= 0.7 {
        SoiTier::High
    } else if score >= 0.4 {
        SoiTier::Medium
    } else {
        SoiTier::Low
    }
}

/// Twenty-cell bar followed by the percentage, e.g. `▓▓▓▓░░… 20%`.
pub fn soi_bar(score: f64) -> String {
    const WIDTH: usize = 20;
    let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
    let filled = ((score * WIDTH as f64).round() as usize).min(WIDTH);
    let pct = (score * 100.0).round() as u32;
    format!("{}{} {pct}%", "▓".repeat(filled), "░".repeat(WIDTH - filled))
}

/// Players of `position` whose club has a fixture in the selected gameweeks
/// and competitions, optionally narrowed to `teams`.
pub fn filter_players<'a>(
    players: &'a [PlayerRecord],
    fixtures: &[FixtureRecord],
    gameweeks: &[u32],
    competitions: &[String],
    position: &str,
    teams: Option<&HashSet<String>>,
) -> Vec<&'a PlayerRecord> {
    let playing: HashSet<&str> = fixtures
        .iter()
        .filter(|f| f.gameweek.is_some_and(|gw| gameweeks.contains(&gw)))
        .filter(|f| competitions.contains(&f.competition))
        .map(|f| f.team.as_str())
        .collect();

    players
        .iter()
        .filter(|p| p.position == position)
        .filter(|p| playing.contains(p.club.as_str()))
        .filter(|p| teams.is_none_or(|t| t.contains(&p.club)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricCell {
    pub metric: StrengthMetric,
    pub display: Option<f64>,
    pub strength: Option<f64>,
    pub tooltip: &'static str,
}

impl MetricCell {
    pub fn display_text(&self) -> String {
        match (self.display, self.metric.display_kind()) {
            (None, _) => "-".to_string(),
            (Some(v), DisplayKind::Percent) => format!("{v:.0}%"),
            (Some(v), DisplayKind::Ratio) => format!("{v:.2}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerGridRow {
    pub name: String,
    pub club: String,
    pub position: String,
    pub metrics: Vec<MetricCell>,
    pub soi: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlayerGrid {
    pub rows: Vec<PlayerGridRow>,
    #[serde(skip)]
    pub warnings: Vec<NormalizationWarning>,
}

impl PlayerGrid {
    pub fn headers() -> Vec<String> {
        let mut out = vec!["Player".to_string(), "Club".to_string()];
        out.extend(StrengthMetric::ALL.iter().map(|m| m.label().to_string()));
        out.push("SOI".to_string());
        out
    }
}

/// Normalize, score and sort (SOI descending, ties keep input order).
pub fn build_player_grid(players: &[&PlayerRecord], weights: &SoiWeights) -> PlayerGrid {
    let mut warnings = Vec::new();
    let mut rows: Vec<PlayerGridRow> = players
        .iter()
        .map(|p| {
            let strengths = player_strengths(p, &mut warnings);
            let metrics = StrengthMetric::ALL
                .iter()
                .map(|m| MetricCell {
                    metric: *m,
                    display: display_value(strengths.get(*m), m.display_kind()),
                    strength: strengths.get(*m),
                    tooltip: m.tooltip(),
                })
                .collect();
            PlayerGridRow {
                name: p.name.clone(),
                club: p.club.clone(),
                position: p.position.clone(),
                metrics,
                soi: soi(&strengths, weights),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.soi.total_cmp(&a.soi));

    for w in &warnings {
        tracing::warn!(warning = %w, "normalization");
    }
    PlayerGrid { rows, warnings }
}
