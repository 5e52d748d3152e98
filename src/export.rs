use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;

use crate::cohesion::{COHESION_HEADERS, CohesionDisplayRow};
use crate::pivot::FixtureGrid;
use crate::players::PlayerGrid;

pub const FIXTURES_STEM: &str = "opponent_difficulty";
pub const PLAYERS_STEM: &str = "player_soi";
pub const COHESION_STEM: &str = "cohesion";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Json,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "xlsx" | "excel" => Some(ExportFormat::Xlsx),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Json => "json",
        }
    }
}

/// Visible columns only: rank, team, gameweek labels, average label.
pub fn fixture_grid_rows(grid: &FixtureGrid) -> Vec<Vec<String>> {
    let mut header = vec!["Rank".to_string(), "Name".to_string()];
    header.extend(grid.headers.iter().cloned());
    let mut out = vec![header];
    for row in &grid.rows {
        let mut line = vec![row.rank.label.clone(), row.team.clone()];
        line.extend(row.cells.iter().map(|c| c.label.clone()));
        out.push(line);
    }
    out
}

pub fn player_grid_rows(grid: &PlayerGrid) -> Vec<Vec<String>> {
    let mut out = vec![PlayerGrid::headers()];
    for row in &grid.rows {
        let mut line = vec![row.name.clone(), row.club.clone()];
        line.extend(row.metrics.iter().map(|m| m.display_text()));
        line.push(format!("{:.2}", row.soi));
        out.push(line);
    }
    out
}

pub fn cohesion_rows(rows: &[CohesionDisplayRow]) -> Vec<Vec<String>> {
    let mut out = vec![COHESION_HEADERS.iter().map(|h| h.to_string()).collect()];
    out.extend(rows.iter().map(|r| r.cells()));
    out
}

pub fn to_csv_string(rows: &[Vec<String>]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.write_record(row).context("write csv record")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("flush csv: {}", err.error()))?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}

pub fn write_csv(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let body = to_csv_string(rows)?;
    write_atomic(path, body.as_bytes())
}

pub fn write_xlsx(path: &Path, sheets: &[(&str, Vec<Vec<String>>)]) -> Result<()> {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*name)?;
        write_rows(sheet, rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("save workbook {}", path.display()))?;
    Ok(())
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize export")?;
    write_atomic(path, json.as_bytes())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create export dir {}", parent.display()))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

/// Tables available for export; absent ones are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportBundle<'a> {
    pub fixtures: Option<&'a FixtureGrid>,
    pub players: Option<&'a PlayerGrid>,
    pub cohesion: Option<&'a [CohesionDisplayRow]>,
}

pub fn export_bundle(dir: &Path, format: ExportFormat, bundle: ExportBundle<'_>) -> Result<Vec<PathBuf>> {
    let ext = format.extension();
    let mut written = Vec::new();

    if format == ExportFormat::Xlsx {
        let mut sheets = Vec::new();
        if let Some(grid) = bundle.fixtures {
            sheets.push(("Fixtures", fixture_grid_rows(grid)));
        }
        if let Some(grid) = bundle.players {
            sheets.push(("Players", player_grid_rows(grid)));
        }
        if let Some(rows) = bundle.cohesion {
            sheets.push(("Cohesion", cohesion_rows(rows)));
        }
        if sheets.is_empty() {
            return Ok(written);
        }
        fs::create_dir_all(dir).with_context(|| format!("create export dir {}", dir.display()))?;
        let path = dir.join(format!("{FIXTURES_STEM}.{ext}"));
        write_xlsx(&path, &sheets)?;
        written.push(path);
        return Ok(written);
    }

    if let Some(grid) = bundle.fixtures {
        let path = dir.join(format!("{FIXTURES_STEM}.{ext}"));
        match format {
            ExportFormat::Json => write_json(&path, grid)?,
            _ => write_csv(&path, &fixture_grid_rows(grid))?,
        }
        written.push(path);
    }
    if let Some(grid) = bundle.players {
        let path = dir.join(format!("{PLAYERS_STEM}.{ext}"));
        match format {
            ExportFormat::Json => write_json(&path, &grid.rows)?,
            _ => write_csv(&path, &player_grid_rows(grid))?,
        }
        written.push(path);
    }
    if let Some(rows) = bundle.cohesion {
        let path = dir.join(format!("{COHESION_STEM}.{ext}"));
        match format {
            ExportFormat::Json => write_json(&path, rows)?,
            _ => write_csv(&path, &cohesion_rows(rows))?,
        }
        written.push(path);
    }
    Ok(written)
}
