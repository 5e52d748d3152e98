use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::cohesion::{
    CohesionDisplayRow, CohesionParams, CohesionScore, MatchupDetailRow, display_rows,
    matchup_detail, rank_partners,
};
use crate::config::AppConfig;
use crate::dataset_cache::DatasetCache;
use crate::error::DataError;
use crate::export::{ExportBundle, ExportFormat, export_bundle};
use crate::fixtures::{self, DifficultyMetric, FixtureDataset, FixtureFilter, FixtureRecord};
use crate::pivot::{FixtureGrid, build_fixture_grid};
use crate::players::{PlayerDataset, PlayerGrid, build_player_grid, filter_players};

const MAX_LOGS: usize = 200;
const MIN_BOTH_PLAY_STEP: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Fixtures,
    Players,
    Cohesion,
}

impl Screen {
    pub fn next(self) -> Self {
        match self {
            Screen::Fixtures => Screen::Players,
            Screen::Players => Screen::Cohesion,
            Screen::Cohesion => Screen::Fixtures,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Screen::Fixtures => "FIXTURES",
            Screen::Players => "PLAYERS",
            Screen::Cohesion => "COHESION",
        }
    }
}

#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    cache: DatasetCache,
    pub fixtures: Option<Arc<FixtureDataset>>,
    pub players: Option<Arc<PlayerDataset>>,
    pub screen: Screen,
    pub help_overlay: bool,

    pub competitions: Vec<String>,
    pub competition_idx: usize,
    pub positions: Vec<String>,
    pub position_idx: usize,
    pub cohesion_positions: Vec<String>,
    pub metric: DifficultyMetric,
    pub available_gameweeks: Vec<u32>,
    pub gw_start: usize,
    pub gw_end: Option<usize>,
    pub teams: Vec<String>,
    pub primary_idx: usize,
    pub min_both_play: f64,
    pub restrict_to_partners: bool,
    pub selected: usize,
    pub selected_col: usize,

    pub fixture_grid: Option<FixtureGrid>,
    pub player_grid: Option<PlayerGrid>,
    pub cohesion: Vec<CohesionScore>,
    pub cohesion_rows: Vec<CohesionDisplayRow>,
    pub matchup: Vec<MatchupDetailRow>,
    pub empty_message: Option<String>,
    pub load_error: Option<String>,
    pub status: Option<String>,
    pub logs: VecDeque<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(AppConfig::from_env())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let mut state = Self {
            config,
            cache: DatasetCache::new(),
            fixtures: None,
            players: None,
            screen: Screen::Fixtures,
            help_overlay: false,
            competitions: Vec::new(),
            competition_idx: 0,
            positions: Vec::new(),
            position_idx: 0,
            cohesion_positions: Vec::new(),
            metric: DifficultyMetric::Mean,
            available_gameweeks: Vec::new(),
            gw_start: 0,
            gw_end: None,
            teams: Vec::new(),
            primary_idx: 0,
            min_both_play: 0.0,
            restrict_to_partners: false,
            selected: 0,
            selected_col: 0,
            fixture_grid: None,
            player_grid: None,
            cohesion: Vec::new(),
            cohesion_rows: Vec::new(),
            matchup: Vec::new(),
            empty_message: None,
            load_error: None,
            status: None,
            logs: VecDeque::new(),
        };
        state.load();
        state.recompute();
        state
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    /// Pull both datasets through the cache. A fixture failure blocks every
    /// screen; a player failure only empties the Players screen.
    pub fn load(&mut self) {
        let fixtures_path = self.config.fixtures_path.clone();
        match self.cache.fixtures(&fixtures_path, &self.config.gameweek) {
            Ok(data) => {
                self.push_log(format!(
                    "[INFO] Loaded {} fixtures ({} dropped, {} unscheduled)",
                    data.rows.len(),
                    data.report.rows_dropped,
                    data.report.unscheduled
                ));
                self.fixtures = Some(data);
                self.load_error = None;
            }
            Err(err) => {
                let msg = data_error_message(&err);
                tracing::warn!(error = %err, "fixture load failed");
                self.push_log(format!("[WARN] {msg}"));
                self.fixtures = None;
                self.load_error = Some(msg);
            }
        }

        let players_path = self.config.players_path.clone();
        match self.cache.players(&players_path) {
            Ok(data) => {
                self.push_log(format!("[INFO] Loaded {} players", data.rows.len()));
                self.players = Some(data);
            }
            Err(err) => {
                tracing::warn!(error = %err, "player load failed");
                self.push_log(format!("[WARN] {}", data_error_message(&err)));
                self.players = None;
            }
        }
    }

    pub fn reload(&mut self) {
        self.cache.clear();
        self.push_log("[INFO] Cache cleared, reloading");
        self.load();
        self.recompute();
    }

    pub fn current_competition(&self) -> Option<&str> {
        self.competitions.get(self.competition_idx).map(String::as_str)
    }

    pub fn current_position(&self) -> Option<&str> {
        self.positions.get(self.position_idx).map(String::as_str)
    }

    pub fn primary_team(&self) -> Option<&str> {
        self.teams.get(self.primary_idx).map(String::as_str)
    }

    pub fn selected_gameweeks(&self) -> Vec<u32> {
        let Some(end) = self.gw_end else {
            return Vec::new();
        };
        if self.available_gameweeks.is_empty() {
            return Vec::new();
        }
        let end = end.min(self.available_gameweeks.len() - 1);
        let start = self.gw_start.min(end);
        self.available_gameweeks[start..=end].to_vec()
    }

    /// Rebuild option lists and every derived table from the current filters.
    pub fn recompute(&mut self) {
        self.fixture_grid = None;
        self.player_grid = None;
        self.cohesion.clear();
        self.cohesion_rows.clear();
        self.matchup.clear();
        self.empty_message = None;

        let Some(data) = self.fixtures.clone() else {
            self.competitions.clear();
            self.positions.clear();
            self.available_gameweeks.clear();
            self.teams.clear();
            return;
        };
        let rows = &data.rows;

        self.competitions = fixtures::competitions(rows);
        self.competition_idx = clamp_index(self.competition_idx, self.competitions.len());
        let competition = self.current_competition().map(str::to_string);

        self.positions = fixtures::positions(rows, competition.as_deref());
        self.position_idx = clamp_index(self.position_idx, self.positions.len());
        let position = self.current_position().map(str::to_string);

        let positions = self.positions.clone();
        self.cohesion_positions.retain(|p| positions.contains(p));
        if self.cohesion_positions.is_empty()
            && let Some(p) = &position
        {
            self.cohesion_positions.push(p.clone());
        }

        let position_list: Vec<String> = position.iter().cloned().collect();
        self.available_gameweeks = fixtures::gameweeks(rows, competition.as_deref(), &position_list);
        self.clamp_gameweek_range();
        let selected_gws = self.selected_gameweeks();

        let competition_list: Vec<String> = competition.iter().cloned().collect();
        let comp_rows: Vec<FixtureRecord> = rows
            .iter()
            .filter(|r| competition.as_deref().is_none_or(|c| r.competition == c))
            .cloned()
            .collect();
        self.teams = fixtures::teams(&comp_rows);
        self.primary_idx = clamp_index(self.primary_idx, self.teams.len());

        let filter = FixtureFilter {
            competitions: competition_list.clone(),
            positions: position_list,
            gameweeks: selected_gws.clone(),
        };
        match filter.apply(rows) {
            Ok(selected) => {
                self.fixture_grid = Some(build_fixture_grid(&selected, self.metric, &selected_gws));
            }
            Err(err) => {
                self.empty_message = Some(err.to_string());
                self.push_log(format!("[INFO] {err}"));
            }
        }

        if let Some(primary) = self.primary_team().map(str::to_string) {
            let params = CohesionParams {
                primary: &primary,
                gameweeks: &selected_gws,
                metric: self.metric,
                positions: &self.cohesion_positions,
                top_n: self.config.cohesion_top_n,
                min_both_play_pct: self.min_both_play,
            };
            self.cohesion = rank_partners(&comp_rows, &params);
            self.cohesion_rows = display_rows(&self.cohesion);
            if self.screen == Screen::Cohesion
                && let Some(partner) = self.cohesion.get(self.selected)
            {
                self.matchup = matchup_detail(
                    &comp_rows,
                    &primary,
                    &partner.partner,
                    &selected_gws,
                    self.metric,
                    &self.cohesion_positions,
                );
            }
        }

        if let (Some(players), Some(position)) = (self.players.clone(), position) {
            let partner_set: Option<HashSet<String>> = self.restrict_to_partners.then(|| {
                let mut set: HashSet<String> = self.cohesion.iter().map(|c| c.partner.clone()).collect();
                if let Some(primary) = self.primary_team() {
                    set.insert(primary.to_string());
                }
                set
            });
            let picked = filter_players(
                &players.rows,
                rows,
                &selected_gws,
                &competition_list,
                &position,
                partner_set.as_ref(),
            );
            let grid = build_player_grid(&picked, &self.config.soi_weights);
            if !grid.warnings.is_empty() {
                let count = grid.warnings.len();
                self.push_log(format!("[WARN] {count} non-finite player metrics treated as missing"));
            }
            self.player_grid = Some(grid);
        }

        self.clamp_selection();
        tracing::debug!(
            competition = competition.as_deref().unwrap_or("-"),
            gameweeks = selected_gws.len(),
            partners = self.cohesion.len(),
            "recompute"
        );
    }

    fn clamp_gameweek_range(&mut self) {
        let len = self.available_gameweeks.len();
        if len == 0 {
            self.gw_start = 0;
            self.gw_end = None;
            return;
        }
        let end = self.gw_end.unwrap_or(len - 1).min(len - 1);
        self.gw_start = self.gw_start.min(end);
        self.gw_end = Some(end);
    }

    pub fn row_count(&self) -> usize {
        match self.screen {
            Screen::Fixtures => self.fixture_grid.as_ref().map_or(0, |g| g.rows.len()),
            Screen::Players => self.player_grid.as_ref().map_or(0, |g| g.rows.len()),
            Screen::Cohesion => self.cohesion_rows.len(),
        }
    }

    pub fn clamp_selection(&mut self) {
        self.selected = clamp_index(self.selected, self.row_count());
        let cols = self.fixture_grid.as_ref().map_or(0, |g| g.columns.len());
        self.selected_col = clamp_index(self.selected_col, cols);
    }

    pub fn select_col_next(&mut self) {
        self.selected_col += 1;
        self.clamp_selection();
    }

    pub fn select_col_prev(&mut self) {
        self.selected_col = self.selected_col.saturating_sub(1);
    }

    pub fn select_next(&mut self) {
        let total = self.row_count();
        if total == 0 {
            return;
        }
        self.selected = (self.selected + 1).min(total - 1);
        if self.screen == Screen::Cohesion {
            self.recompute();
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        if self.screen == Screen::Cohesion {
            self.recompute();
        }
    }

    pub fn cycle_screen(&mut self) {
        self.screen = self.screen.next();
        self.selected = 0;
        self.recompute();
    }

    pub fn cycle_competition(&mut self) {
        if self.competitions.is_empty() {
            return;
        }
        self.competition_idx = (self.competition_idx + 1) % self.competitions.len();
        self.position_idx = 0;
        self.cohesion_positions.clear();
        self.reset_gameweek_range();
        self.primary_idx = 0;
        self.recompute();
    }

    pub fn cycle_position(&mut self) {
        if self.positions.is_empty() {
            return;
        }
        self.position_idx = (self.position_idx + 1) % self.positions.len();
        self.cohesion_positions.clear();
        self.reset_gameweek_range();
        self.recompute();
    }

    /// Add or remove the current position from the cohesion position set.
    pub fn toggle_cohesion_position(&mut self) {
        let Some(position) = self.current_position().map(str::to_string) else {
            return;
        };
        if let Some(idx) = self.cohesion_positions.iter().position(|p| *p == position) {
            self.cohesion_positions.remove(idx);
        } else {
            self.cohesion_positions.push(position);
            self.cohesion_positions.sort();
        }
        self.recompute();
    }

    pub fn toggle_metric(&mut self) {
        self.metric = self.metric.toggle();
        self.recompute();
    }

    pub fn shift_gw_start(&mut self, delta: isize) {
        let Some(end) = self.gw_end else {
            return;
        };
        self.gw_start = self.gw_start.saturating_add_signed(delta).min(end);
        self.recompute();
    }

    pub fn shift_gw_end(&mut self, delta: isize) {
        let Some(end) = self.gw_end else {
            return;
        };
        let last = self.available_gameweeks.len().saturating_sub(1);
        self.gw_end = Some(end.saturating_add_signed(delta).clamp(self.gw_start, last));
        self.recompute();
    }

    fn reset_gameweek_range(&mut self) {
        self.gw_start = 0;
        self.gw_end = None;
    }

    pub fn cycle_team(&mut self, forward: bool) {
        let len = self.teams.len();
        if len == 0 {
            return;
        }
        self.primary_idx = if forward {
            (self.primary_idx + 1) % len
        } else {
            (self.primary_idx + len - 1) % len
        };
        self.recompute();
    }

    pub fn adjust_min_both_play(&mut self, up: bool) {
        let step = if up { MIN_BOTH_PLAY_STEP } else { -MIN_BOTH_PLAY_STEP };
        self.min_both_play = (self.min_both_play + step).clamp(0.0, 100.0);
        self.recompute();
    }

    pub fn toggle_restrict_to_partners(&mut self) {
        self.restrict_to_partners = !self.restrict_to_partners;
        self.recompute();
    }

    /// Opponent behind the selected fixture grid cell.
    pub fn selected_opponent(&self) -> Option<&str> {
        let grid = self.fixture_grid.as_ref()?;
        let cell = grid.rows.get(self.selected)?.cells.get(self.selected_col)?;
        (!cell.tooltip.is_empty()).then_some(cell.tooltip.as_str())
    }

    pub fn export(&mut self, format: ExportFormat) -> Result<Vec<PathBuf>> {
        let dir = self.config.export_dir.clone();
        let bundle = ExportBundle {
            fixtures: self.fixture_grid.as_ref(),
            players: self.player_grid.as_ref(),
            cohesion: (!self.cohesion_rows.is_empty()).then_some(self.cohesion_rows.as_slice()),
        };
        let written = export_bundle(&dir, format, bundle)?;
        Ok(written)
    }

    /// Export and report the outcome to the console.
    pub fn export_and_log(&mut self, format: ExportFormat) {
        match self.export(format) {
            Ok(paths) if paths.is_empty() => {
                self.push_log("[INFO] Nothing to export");
            }
            Ok(paths) => {
                let list = paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                self.status = Some(format!("Exported {}", list));
                self.push_log(format!("[INFO] Exported {list}"));
            }
            Err(err) => {
                tracing::warn!(error = %err, "export failed");
                self.status = Some("Export failed".to_string());
                self.push_log(format!("[WARN] Export failed: {err:#}"));
            }
        }
    }

    pub fn cache_loads(&self) -> usize {
        self.cache.loads()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_index(idx: usize, len: usize) -> usize {
    if len == 0 { 0 } else { idx.min(len - 1) }
}

fn data_error_message(err: &DataError) -> String {
    if err.is_not_found() {
        format!("{err} (set FIXTURES_PATH / PLAYERS_PATH or add them to .env)")
    } else {
        err.to_string()
    }
}
