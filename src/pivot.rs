use std::collections::HashMap;

use serde::Serialize;

use crate::fixtures::{DifficultyMetric, FixtureRecord, Location, RankDisplay, rank_display};

pub const GW_PREFIX: &str = "GW";
pub const AVG_LABEL: &str = "Avg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PivotColumn {
    Gameweek(u32),
    Average,
}

impl PivotColumn {
    pub fn label(self) -> String {
        match self {
            PivotColumn::Gameweek(gw) => format!("{GW_PREFIX} {gw}"),
            PivotColumn::Average => AVG_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotRowKey {
    pub rank: Option<u32>,
    pub team: String,
}

/// Three parallel team × column grids. The last column is always the average.
#[derive(Debug, Clone, PartialEq)]
pub struct PivotTables {
    pub rows: Vec<PivotRowKey>,
    pub columns: Vec<PivotColumn>,
    pub values: Vec<Vec<Option<f64>>>,
    pub labels: Vec<Vec<String>>,
    pub opponents: Vec<Vec<String>>,
}

/// `"{value:.1} ({H|A})"`, or empty when there is no value.
pub fn cell_label(value: Option<f64>, location: Location) -> String {
    match value {
        Some(v) => format!("{v:.1} ({})", location.marker()),
        None => String::new(),
    }
}

pub fn row_average(values: &[Option<f64>]) -> Option<f64> {
    let mut sum = 0.0;
    let mut n = 0usize;
    for v in values.iter().flatten() {
        sum += v;
        n += 1;
    }
    if n == 0 { None } else { Some(sum / n as f64) }
}

/// Reshape fixture rows into team × gameweek grids.
///
/// Columns are `gameweeks` (ascending, deduplicated) or, when empty, every
/// gameweek present in `fixtures`. A team/gameweek with several fixtures keeps
/// the first one encountered. Every team in `fixtures` gets exactly one row,
/// ordered by league rank (unranked last) then name.
pub fn pivot(fixtures: &[&FixtureRecord], metric: DifficultyMetric, gameweeks: &[u32]) -> PivotTables {
    let mut gws: Vec<u32> = if gameweeks.is_empty() {
        fixtures.iter().filter_map(|f| f.gameweek).collect()
    } else {
        gameweeks.to_vec()
    };
    gws.sort_unstable();
    gws.dedup();
    let col_of: HashMap<u32, usize> = gws.iter().enumerate().map(|(i, gw)| (*gw, i)).collect();

    let mut keys: Vec<PivotRowKey> = Vec::new();
    let mut row_of: HashMap<&str, usize> = HashMap::new();
    for f in fixtures {
        if !row_of.contains_key(f.team.as_str()) {
            row_of.insert(f.team.as_str(), keys.len());
            keys.push(PivotRowKey {
                rank: f.league_rank,
                team: f.team.clone(),
            });
        }
    }

    let mut cells: Vec<Vec<Option<&FixtureRecord>>> = vec![vec![None; gws.len()]; keys.len()];
    for f in fixtures {
        let Some(col) = f.gameweek.and_then(|gw| col_of.get(&gw)).copied() else {
            continue;
        };
        let Some(row) = row_of.get(f.team.as_str()).copied() else {
            continue;
        };
        let slot = &mut cells[row][col];
        if slot.is_none() {
            *slot = Some(f);
        }
    }

    let mut order: Vec<usize> = (0..keys.len()).collect();
    order.sort_by(|a, b| {
        let ka = &keys[*a];
        let kb = &keys[*b];
        rank_display(ka.rank)
            .sort_key
            .cmp(&rank_display(kb.rank).sort_key)
            .then_with(|| ka.team.cmp(&kb.team))
    });

    let mut columns: Vec<PivotColumn> = gws.iter().map(|gw| PivotColumn::Gameweek(*gw)).collect();
    columns.push(PivotColumn::Average);

    let mut out = PivotTables {
        rows: Vec::with_capacity(keys.len()),
        columns,
        values: Vec::with_capacity(keys.len()),
        labels: Vec::with_capacity(keys.len()),
        opponents: Vec::with_capacity(keys.len()),
    };

    for idx in order {
        let row_cells = &cells[idx];
        let mut values: Vec<Option<f64>> = row_cells
            .iter()
            .map(|c| c.and_then(|f| f.difficulty(metric)))
            .collect();
        let mut labels: Vec<String> = row_cells
            .iter()
            .map(|c| match c {
                Some(f) => cell_label(f.difficulty(metric), f.location),
                None => String::new(),
            })
            .collect();
        let mut opponents: Vec<String> = row_cells
            .iter()
            .map(|c| c.map(|f| f.opponent.clone()).unwrap_or_default())
            .collect();

        let avg = row_average(&values);
        values.push(avg);
        labels.push(avg.map(|v| format!("{v:.1}")).unwrap_or_default());
        opponents.push(String::new());

        out.rows.push(keys[idx].clone());
        out.values.push(values);
        out.labels.push(labels);
        out.opponents.push(opponents);
    }

    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCell {
    pub label: String,
    pub value: Option<f64>,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureGridRow {
    pub rank: RankDisplay,
    pub team: String,
    pub cells: Vec<GridCell>,
}

/// Display-ready difficulty grid: rank, team, `GW n` columns, `Avg`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureGrid {
    pub metric: DifficultyMetric,
    pub columns: Vec<PivotColumn>,
    pub headers: Vec<String>,
    pub rows: Vec<FixtureGridRow>,
}

impl FixtureGrid {
    pub fn from_tables(tables: PivotTables, metric: DifficultyMetric) -> Self {
        let headers = tables.columns.iter().map(|c| c.label()).collect();
        let rows = tables
            .rows
            .into_iter()
            .zip(tables.values)
            .zip(tables.labels)
            .zip(tables.opponents)
            .map(|(((key, values), labels), opponents)| FixtureGridRow {
                rank: rank_display(key.rank),
                team: key.team,
                cells: values
                    .into_iter()
                    .zip(labels)
                    .zip(opponents)
                    .map(|((value, label), tooltip)| GridCell {
                        label,
                        value,
                        tooltip,
                    })
                    .collect(),
            })
            .collect();
        Self {
            metric,
            columns: tables.columns,
            headers,
            rows,
        }
    }

    pub fn row(&self, team: &str) -> Option<&FixtureGridRow> {
        self.rows.iter().find(|r| r.team == team)
    }

    pub fn average(&self, team: &str) -> Option<f64> {
        self.row(team)?.cells.last()?.value
    }
}

pub fn build_fixture_grid(
    fixtures: &[&FixtureRecord],
    metric: DifficultyMetric,
    gameweeks: &[u32],
) -> FixtureGrid {
    FixtureGrid::from_tables(pivot(fixtures, metric, gameweeks), metric)
}
