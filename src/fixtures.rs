use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

use crate::config::competition_display;
use crate::error::{DataError, FilterEmptyError};
use crate::gameweek::{GameweekCalendar, GameweekConfig, assign_gameweeks};

pub const COL_TEAM: &str = "Name";
pub const COL_COMP_SLUG: &str = "Comp_Slug";
pub const COL_COMP_NAME: &str = "name (upcomingGames.competition)";
pub const COL_OPPONENT: &str = "Opponent";
pub const COL_DATE: &str = "Date";
pub const COL_LOCATION: &str = "Location";
pub const COL_POSITION: &str = "Position";
pub const COL_SCORE_MEAN: &str = "Score_mean";
pub const COL_SCORE_MEDIAN: &str = "Score_median";
pub const COL_RANK: &str = "Domestic League Ranking";
pub const COL_GAMEWEEK: &str = "Gameweek";

/// Sort key for teams without a domestic ranking.
pub const UNRANKED_SORT_KEY: u32 = 9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Location {
    Home,
    Away,
    Unknown,
}

impl Location {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "Home" => Location::Home,
            "Away" => Location::Away,
            _ => Location::Unknown,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Location::Home => "H",
            Location::Away => "A",
            Location::Unknown => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DifficultyMetric {
    Mean,
    Median,
}

impl DifficultyMetric {
    pub fn column(self) -> &'static str {
        match self {
            DifficultyMetric::Mean => COL_SCORE_MEAN,
            DifficultyMetric::Median => COL_SCORE_MEDIAN,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DifficultyMetric::Mean => "Score Mean",
            DifficultyMetric::Median => "Score Median",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            DifficultyMetric::Mean => DifficultyMetric::Median,
            DifficultyMetric::Median => DifficultyMetric::Mean,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mean" | "score_mean" => Some(DifficultyMetric::Mean),
            "median" | "score_median" => Some(DifficultyMetric::Median),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixtureRecord {
    pub team: String,
    pub comp_slug: String,
    pub competition: String,
    pub opponent: String,
    pub kickoff: Option<DateTime<Utc>>,
    pub location: Location,
    pub position: String,
    pub score_mean: Option<f64>,
    pub score_median: Option<f64>,
    pub league_rank: Option<u32>,
    pub source_gameweek: Option<u32>,
    pub gameweek: Option<u32>,
}

impl FixtureRecord {
    pub fn difficulty(&self, metric: DifficultyMetric) -> Option<f64> {
        match metric {
            DifficultyMetric::Mean => self.score_mean,
            DifficultyMetric::Median => self.score_median,
        }
    }

    pub fn is_home(&self) -> bool {
        self.location == Location::Home
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub unscheduled: usize,
}

#[derive(Debug, Clone)]
pub struct FixtureDataset {
    pub rows: Vec<FixtureRecord>,
    pub calendar: GameweekCalendar,
    pub report: LoadReport,
}

pub fn load_fixtures(path: &Path, cfg: &GameweekConfig) -> Result<FixtureDataset, DataError> {
    let file = open_input(path)?;
    let source = path.display().to_string();
    parse_fixtures(file, &source, cfg).map_err(|err| attach_path(err, path))
}

pub(crate) fn open_input(path: &Path) -> Result<File, DataError> {
    File::open(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            DataError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            DataError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

pub(crate) fn attach_path(err: DataError, path: &Path) -> DataError {
    match err {
        DataError::Io { source, .. } => DataError::Io {
            path: path.to_path_buf(),
            source,
        },
        DataError::Csv { source, .. } => DataError::Csv {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    }
}

/// Parse fixture rows from any reader and assign gameweeks.
pub fn parse_fixtures<R: Read>(
    reader: R,
    source: &str,
    cfg: &GameweekConfig,
) -> Result<FixtureDataset, DataError> {
    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv.headers().map_err(|err| csv_error(err, source))?.clone();
    let index = HeaderIndex::new(&headers, source);

    let team = index.required(COL_TEAM)?;
    let comp_slug = index.required(COL_COMP_SLUG)?;
    let comp_name = index.required(COL_COMP_NAME)?;
    let opponent = index.required(COL_OPPONENT)?;
    let date = index.required(COL_DATE)?;
    let location = index.required(COL_LOCATION)?;
    let position = index.required(COL_POSITION)?;
    let score_mean = index.required(COL_SCORE_MEAN)?;
    let score_median = index.required(COL_SCORE_MEDIAN)?;
    let rank = index.optional(COL_RANK);
    let gameweek = index.optional(COL_GAMEWEEK);

    let mut report = LoadReport::default();
    let mut rows = Vec::new();
    for record in csv.records() {
        report.rows_read += 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(source, error = %err, "dropping unreadable fixture row");
                report.rows_dropped += 1;
                continue;
            }
        };
        if record.len() != headers.len() {
            report.rows_dropped += 1;
            continue;
        }
        let field = |idx: usize| record.get(idx).unwrap_or_default();
        let name = field(team);
        if name.is_empty() {
            report.rows_dropped += 1;
            continue;
        }

        let slug = field(comp_slug);
        let kickoff = parse_datetime(field(date));
        if kickoff.is_none() {
            report.unscheduled += 1;
        }
        rows.push(FixtureRecord {
            team: name.to_string(),
            comp_slug: slug.to_string(),
            competition: competition_display(slug, field(comp_name)),
            opponent: field(opponent).to_string(),
            kickoff,
            location: Location::parse(field(location)),
            position: field(position).to_string(),
            score_mean: parse_number(field(score_mean)).filter(|v| v.is_finite()),
            score_median: parse_number(field(score_median)).filter(|v| v.is_finite()),
            league_rank: rank.and_then(|idx| parse_whole(field(idx))),
            source_gameweek: gameweek.and_then(|idx| parse_whole(field(idx))),
            gameweek: None,
        });
    }

    if report.rows_dropped > 0 {
        tracing::warn!(source, dropped = report.rows_dropped, "malformed fixture rows excluded");
    }
    if rows.is_empty() {
        return Err(DataError::EmptyDataset {
            file: source.to_string(),
        });
    }

    let timestamps: Vec<Option<DateTime<Utc>>> = rows.iter().map(|r| r.kickoff).collect();
    let reference = rows.iter().filter_map(|r| r.source_gameweek).min();
    let assignment = assign_gameweeks(&timestamps, reference, cfg, source)?;
    for (row, gw) in rows.iter_mut().zip(assignment.gameweeks) {
        row.gameweek = gw;
    }

    tracing::info!(
        source,
        rows = rows.len(),
        dropped = report.rows_dropped,
        unscheduled = report.unscheduled,
        gameweeks = assignment.calendar.interval_count(),
        "fixtures loaded"
    );

    Ok(FixtureDataset {
        rows,
        calendar: assignment.calendar,
        report,
    })
}

pub(crate) fn csv_error(err: csv::Error, source: &str) -> DataError {
    DataError::Csv {
        path: source.into(),
        source: err,
    }
}

pub(crate) struct HeaderIndex<'a> {
    by_name: HashMap<&'a str, usize>,
    source: &'a str,
}

impl<'a> HeaderIndex<'a> {
    pub(crate) fn new(headers: &'a csv::StringRecord, source: &'a str) -> Self {
        let mut by_name = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            // First occurrence wins for duplicated header names.
            by_name.entry(name.trim()).or_insert(idx);
        }
        Self { by_name, source }
    }

    pub(crate) fn required(&self, column: &str) -> Result<usize, DataError> {
        self.optional(column)
            .ok_or_else(|| DataError::MissingColumn {
                file: self.source.to_string(),
                column: column.to_string(),
            })
    }

    pub(crate) fn optional(&self, column: &str) -> Option<usize> {
        self.by_name.get(column).copied()
    }
}

pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    s.replace(',', "").parse::<f64>().ok()
}

fn parse_whole(raw: &str) -> Option<u32> {
    let v = parse_number(raw)?;
    if !v.is_finite() || v < 0.0 || v > u32::MAX as f64 {
        return None;
    }
    Some(v.round() as u32)
}

/// Accepts RFC 3339, offset-suffixed, naive (treated as UTC) and date-only stamps.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    const OFFSET_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S%z",
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M:%S%z",
    ];
    const NAIVE_FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];

    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    let naive = s.trim_end_matches('Z').trim_end_matches(" UTC");
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Rank columns for the grid: numeric sort key and display text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankDisplay {
    pub sort_key: u32,
    pub label: String,
}

pub fn rank_display(rank: Option<u32>) -> RankDisplay {
    match rank {
        Some(r) => RankDisplay {
            sort_key: r,
            label: r.to_string(),
        },
        None => RankDisplay {
            sort_key: UNRANKED_SORT_KEY,
            label: "-".to_string(),
        },
    }
}

/// User-selected slice of the fixture table. Empty lists mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureFilter {
    pub competitions: Vec<String>,
    pub positions: Vec<String>,
    pub gameweeks: Vec<u32>,
}

impl FixtureFilter {
    pub fn matches(&self, row: &FixtureRecord) -> bool {
        if !self.competitions.is_empty() && !self.competitions.contains(&row.competition) {
            return false;
        }
        if !self.positions.is_empty() && !self.positions.contains(&row.position) {
            return false;
        }
        if !self.gameweeks.is_empty() {
            let Some(gw) = row.gameweek else {
                return false;
            };
            if !self.gameweeks.contains(&gw) {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(
        &self,
        rows: &'a [FixtureRecord],
    ) -> Result<Vec<&'a FixtureRecord>, FilterEmptyError> {
        let out: Vec<&FixtureRecord> = rows.iter().filter(|r| self.matches(r)).collect();
        if out.is_empty() {
            return Err(FilterEmptyError::new(self.describe()));
        }
        Ok(out)
    }

    pub fn describe(&self) -> String {
        let list = |items: &[String]| {
            if items.is_empty() {
                "any".to_string()
            } else {
                items.join(", ")
            }
        };
        let gws = if self.gameweeks.is_empty() {
            "any".to_string()
        } else {
            self.gameweeks
                .iter()
                .map(|gw| format!("GW {gw}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "competition [{}], position [{}], gameweeks [{}]",
            list(&self.competitions),
            list(&self.positions),
            gws
        )
    }
}

pub fn competitions(rows: &[FixtureRecord]) -> Vec<String> {
    sorted_distinct(rows.iter().map(|r| r.competition.as_str()))
}

pub fn positions(rows: &[FixtureRecord], competition: Option<&str>) -> Vec<String> {
    sorted_distinct(
        rows.iter()
            .filter(|r| competition.is_none_or(|c| r.competition == c))
            .map(|r| r.position.as_str()),
    )
}

/// Position the fixture grid pivots on: the first requested one, else the
/// first position listed for `competition`. Grid rows are keyed by team, so a
/// grid never spans more than one position.
pub fn grid_position(
    rows: &[FixtureRecord],
    competition: Option<&str>,
    requested: &[String],
) -> Option<String> {
    requested
        .first()
        .cloned()
        .or_else(|| positions(rows, competition).into_iter().next())
}

pub fn gameweeks(rows: &[FixtureRecord], competition: Option<&str>, positions: &[String]) -> Vec<u32> {
    let mut out: Vec<u32> = rows
        .iter()
        .filter(|r| competition.is_none_or(|c| r.competition == c))
        .filter(|r| positions.is_empty() || positions.contains(&r.position))
        .filter_map(|r| r.gameweek)
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Teams in encounter order.
pub fn teams<'a>(rows: impl IntoIterator<Item = &'a FixtureRecord>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in rows {
        if seen.insert(row.team.as_str()) {
            out.push(row.team.clone());
        }
    }
    out
}

/// Widest range a single `lo-hi` token may cover.
pub const MAX_GAMEWEEK_SPAN: u32 = 200;

/// `"1-5"`, `"1,2,4"` or a mix such as `"1-3,7"`. `None` on any bad token or
/// on a range wider than [`MAX_GAMEWEEK_SPAN`].
pub fn parse_gameweek_list(raw: &str) -> Option<Vec<u32>> {
    let mut out = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            Some((lo, hi)) => {
                let lo: u32 = lo.trim().parse().ok()?;
                let hi: u32 = hi.trim().parse().ok()?;
                if lo > hi || hi - lo >= MAX_GAMEWEEK_SPAN {
                    return None;
                }
                out.extend(lo..=hi);
            }
            None => out.push(token.parse().ok()?),
        }
    }
    out.sort_unstable();
    out.dedup();
    if out.is_empty() { None } else { Some(out) }
}

fn sorted_distinct<'a>(items: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = items
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_timestamp_shapes() {
        let expected = parse_datetime("2024-08-10T14:00:00Z").unwrap();
        assert_eq!(parse_datetime("2024-08-10 14:00:00+00:00"), Some(expected));
        assert_eq!(parse_datetime("2024-08-10 16:00:00+02:00"), Some(expected));
        assert_eq!(parse_datetime("2024-08-10 14:00:00"), Some(expected));
        assert_eq!(parse_datetime("2024-08-10T14:00"), Some(expected));
        assert!(parse_datetime("2024-08-10").is_some());
        assert!(parse_datetime("not a date").is_none());
        assert!(parse_datetime("").is_none());
    }

    #[test]
    fn whole_numbers_accept_float_text() {
        assert_eq!(parse_whole("3.0"), Some(3));
        assert_eq!(parse_whole(""), None);
        assert_eq!(parse_whole("-2"), None);
    }
}
