use std::collections::{BTreeSet, HashMap, HashSet};

use rayon::prelude::*;
use serde::Serialize;

use crate::fixtures::{DifficultyMetric, FixtureRecord, teams};

const WEIGHT_BOTH_PLAY: f64 = 0.20;
const WEIGHT_BOTH_HOME: f64 = 0.40;
const WEIGHT_DIFFICULTY: f64 = 0.40;
const DIFFICULTY_SCALE: f64 = 70.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CohesionParams<'a> {
    pub primary: &'a str,
    pub gameweeks: &'a [u32],
    pub metric: DifficultyMetric,
    pub positions: &'a [String],
    pub top_n: usize,
    pub min_both_play_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohesionScore {
    pub rank: usize,
    pub primary: String,
    pub partner: String,
    pub position: String,
    pub both_play_pct: f64,
    pub both_home_pct: f64,
    pub combined_avg_difficulty: Option<f64>,
    pub difficulty_term: f64,
    pub cohesion_score: f64,
    pub overlap_count: usize,
    pub both_home_count: usize,
    pub primary_home_count: usize,
}

/// One team's fixtures inside the selected gameweeks/positions, pooled across
/// positions.
#[derive(Debug, Clone, Default)]
struct TeamSlice {
    gameweeks: BTreeSet<u32>,
    home_gameweeks: BTreeSet<u32>,
    difficulty_sum: f64,
    difficulty_n: usize,
}

impl TeamSlice {
    fn is_empty(&self) -> bool {
        self.gameweeks.is_empty()
    }

    fn mean_difficulty(&self) -> Option<f64> {
        if self.difficulty_n == 0 {
            None
        } else {
            Some(self.difficulty_sum / self.difficulty_n as f64)
        }
    }
}

fn team_slices<'a>(
    fixtures: &'a [FixtureRecord],
    gameweeks: &HashSet<u32>,
    positions: &[String],
    metric: DifficultyMetric,
) -> HashMap<&'a str, TeamSlice> {
    let mut out: HashMap<&str, TeamSlice> = HashMap::new();
    for f in fixtures {
        let Some(gw) = f.gameweek.filter(|gw| gameweeks.contains(gw)) else {
            continue;
        };
        if !positions.contains(&f.position) {
            continue;
        }
        let slice = out.entry(f.team.as_str()).or_default();
        slice.gameweeks.insert(gw);
        if f.is_home() {
            slice.home_gameweeks.insert(gw);
        }
        if let Some(v) = f.difficulty(metric) {
            slice.difficulty_sum += v;
            slice.difficulty_n += 1;
        }
    }
    out
}

/// `combined / 70` when the combined average exceeds 1, otherwise a flat 1.
/// A missing combined average also takes the flat branch.
pub fn difficulty_term(combined_avg: Option<f64>) -> f64 {
    match combined_avg {
        Some(v) if v > 1.0 => v / DIFFICULTY_SCALE,
        _ => 1.0,
    }
}

pub fn position_label(positions: &[String]) -> String {
    if positions.len() > 1 {
        let mut sorted = positions.to_vec();
        sorted.sort();
        sorted.join(", ")
    } else {
        positions.first().cloned().unwrap_or_default()
    }
}

fn score_pair(
    primary: &str,
    partner: &str,
    a: &TeamSlice,
    b: &TeamSlice,
    selected_count: usize,
    position: &str,
) -> Option<CohesionScore> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let overlap_count = a.gameweeks.intersection(&b.gameweeks).count();
    let both_play_pct = if selected_count == 0 {
        0.0
    } else {
        overlap_count as f64 / selected_count as f64 * 100.0
    };

    let primary_home_count = a.home_gameweeks.len();
    let both_home_count = a.home_gameweeks.intersection(&b.home_gameweeks).count();
    let both_home_pct = if primary_home_count == 0 {
        0.0
    } else {
        both_home_count as f64 / primary_home_count as f64 * 100.0
    };

    // Mean of the two team means, not a pooled mean over rows.
    let combined_avg_difficulty = match (a.mean_difficulty(), b.mean_difficulty()) {
        (Some(x), Some(y)) => Some((x + y) / 2.0),
        _ => None,
    };
    let difficulty_term = difficulty_term(combined_avg_difficulty);

    let cohesion_score = both_play_pct * WEIGHT_BOTH_PLAY
        + both_home_pct * WEIGHT_BOTH_HOME
        + difficulty_term * WEIGHT_DIFFICULTY;

    Some(CohesionScore {
        rank: 0,
        primary: primary.to_string(),
        partner: partner.to_string(),
        position: position.to_string(),
        both_play_pct,
        both_home_pct,
        combined_avg_difficulty,
        difficulty_term,
        cohesion_score,
        overlap_count,
        both_home_count,
        primary_home_count,
    })
}

/// Score one ordered (primary, partner) pair. `None` when either team has no
/// fixture in the selected gameweeks/positions.
pub fn cohesion_score(
    fixtures: &[FixtureRecord],
    primary: &str,
    partner: &str,
    gameweeks: &[u32],
    metric: DifficultyMetric,
    positions: &[String],
) -> Option<CohesionScore> {
    let selected: HashSet<u32> = gameweeks.iter().copied().collect();
    let slices = team_slices(fixtures, &selected, positions, metric);
    let empty = TeamSlice::default();
    score_pair(
        primary,
        partner,
        slices.get(primary).unwrap_or(&empty),
        slices.get(partner).unwrap_or(&empty),
        selected.len(),
        &position_label(positions),
    )
}

/// Rank every other team by how well its schedule complements `primary`.
///
/// Candidates are scored in parallel; output order depends only on score and
/// the candidate's first appearance in `fixtures`.
pub fn rank_partners(fixtures: &[FixtureRecord], params: &CohesionParams<'_>) -> Vec<CohesionScore> {
    let selected: HashSet<u32> = params.gameweeks.iter().copied().collect();
    let slices = team_slices(fixtures, &selected, params.positions, params.metric);
    let empty = TeamSlice::default();
    let primary_slice = slices.get(params.primary).unwrap_or(&empty);
    let position = position_label(params.positions);

    let candidates: Vec<String> = teams(
        fixtures
            .iter()
            .filter(|f| params.positions.contains(&f.position)),
    )
    .into_iter()
    .filter(|t| t != params.primary)
    .collect();

    let mut scored: Vec<CohesionScore> = candidates
        .par_iter()
        .filter_map(|partner| {
            let slice = slices.get(partner.as_str())?;
            score_pair(
                params.primary,
                partner,
                primary_slice,
                slice,
                selected.len(),
                &position,
            )
        })
        .filter(|s| s.both_play_pct >= params.min_both_play_pct)
        .collect();

    scored.sort_by(|a, b| b.cohesion_score.total_cmp(&a.cohesion_score));
    scored.truncate(params.top_n);
    for (idx, s) in scored.iter_mut().enumerate() {
        s.rank = idx + 1;
    }
    tracing::debug!(
        primary = params.primary,
        candidates = candidates.len(),
        ranked = scored.len(),
        "cohesion ranking"
    );
    scored
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideDetail {
    pub opponent: String,
    pub location: String,
    pub difficulty: Option<f64>,
}

impl SideDetail {
    fn absent() -> Self {
        Self {
            opponent: "-".to_string(),
            location: "-".to_string(),
            difficulty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchupDetailRow {
    pub gameweek: u32,
    pub primary: SideDetail,
    pub partner: SideDetail,
    pub both_home: bool,
    pub best_choice: String,
    pub best_difficulty: Option<f64>,
}

fn side_detail(
    fixtures: &[FixtureRecord],
    team: &str,
    gameweek: u32,
    metric: DifficultyMetric,
    positions: &[String],
) -> SideDetail {
    let rows: Vec<&FixtureRecord> = fixtures
        .iter()
        .filter(|f| f.team == team && f.gameweek == Some(gameweek))
        .filter(|f| positions.contains(&f.position))
        .collect();
    let Some(first) = rows.first() else {
        return SideDetail::absent();
    };
    let values: Vec<f64> = rows.iter().filter_map(|f| f.difficulty(metric)).collect();
    let difficulty = if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    };
    SideDetail {
        opponent: first.opponent.clone(),
        location: first.location.marker().to_string(),
        difficulty,
    }
}

/// Week-by-week comparison of two schedules. The easier side (lower
/// difficulty) is the best choice; ties go to the partner.
pub fn matchup_detail(
    fixtures: &[FixtureRecord],
    primary: &str,
    partner: &str,
    gameweeks: &[u32],
    metric: DifficultyMetric,
    positions: &[String],
) -> Vec<MatchupDetailRow> {
    let mut gws = gameweeks.to_vec();
    gws.sort_unstable();
    gws.dedup();

    gws.into_iter()
        .map(|gw| {
            let a = side_detail(fixtures, primary, gw, metric, positions);
            let b = side_detail(fixtures, partner, gw, metric, positions);
            let both_home = a.location == "H" && b.location == "H";
            let (best_choice, best_difficulty) = match (a.difficulty, b.difficulty) {
                (Some(x), Some(y)) if x < y => (primary.to_string(), Some(x)),
                (Some(_), Some(y)) => (partner.to_string(), Some(y)),
                (Some(x), None) => (primary.to_string(), Some(x)),
                (None, Some(y)) => (partner.to_string(), Some(y)),
                (None, None) => ("-".to_string(), None),
            };
            MatchupDetailRow {
                gameweek: gw,
                primary: a,
                partner: b,
                both_home,
                best_choice,
                best_difficulty,
            }
        })
        .collect()
}

pub const COHESION_HEADERS: [&str; 7] = [
    "Rank",
    "Team Match",
    "Position",
    "Both Play %",
    "Both Home %",
    "Avg Difficulty",
    "Cohesion Score",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohesionDisplayRow {
    pub rank: usize,
    pub team: String,
    pub position: String,
    pub both_play_pct: f64,
    pub both_home_pct: f64,
    pub avg_difficulty: Option<f64>,
    pub cohesion_score: f64,
}

impl CohesionDisplayRow {
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.rank.to_string(),
            self.team.clone(),
            self.position.clone(),
            format!("{:.1}", self.both_play_pct),
            format!("{:.1}", self.both_home_pct),
            self.avg_difficulty
                .map(|v| format!("{v:.1}"))
                .unwrap_or_else(|| "-".to_string()),
            format!("{:.1}", self.cohesion_score),
        ]
    }
}

pub fn display_rows(scores: &[CohesionScore]) -> Vec<CohesionDisplayRow> {
    scores
        .iter()
        .map(|s| CohesionDisplayRow {
            rank: s.rank,
            team: s.partner.clone(),
            position: s.position.clone(),
            both_play_pct: round1(s.both_play_pct),
            both_home_pct: round1(s.both_home_pct),
            avg_difficulty: s.combined_avg_difficulty.map(round1),
            cohesion_score: round1(s.cohesion_score),
        })
        .collect()
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
