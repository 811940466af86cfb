use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use tracing::debug;

use crate::aggregate::Submission;
use crate::error::CensusError;
use crate::sheet::{Cell, Sheet};

pub const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// Workbooks in `dir`, sorted by file name. Office lock files (`~$...`) and
/// other files are skipped.
pub fn list_workbooks(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read input directory {}", dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && is_workbook(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

pub fn is_workbook(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    if name.starts_with("~$") {
        return false;
    }
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            WORKBOOK_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn load_submission(
    path: &Path,
    roster_sheet: &str,
    metadata_sheet: &str,
) -> Result<Submission, CensusError> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();
    debug!(path = %path.display(), sheets = ?names, "Opened workbook");

    let mut read = |name: &str| -> Result<Option<Sheet>, CensusError> {
        if !names.iter().any(|candidate| candidate == name) {
            return Ok(None);
        }
        let range = workbook.worksheet_range(name)?;
        Ok(Some(range_to_sheet(name, &range)))
    };

    Ok(Submission {
        filename: file_name(path),
        roster: read(roster_sheet)?,
        metadata: read(metadata_sheet)?,
    })
}

fn range_to_sheet(name: &str, range: &Range<Data>) -> Sheet {
    let rows = range
        .rows()
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();
    Sheet::new(name, rows)
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(text) => Cell::Text(text.clone()),
        Data::Float(value) => Cell::Number(*value),
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Bool(value) => Cell::Bool(*value),
        Data::DateTime(value) => match value.as_datetime() {
            Some(datetime) => Cell::Date(datetime.date()),
            None => Cell::Number(value.as_f64()),
        },
        Data::DateTimeIso(text) => Cell::Text(text.clone()),
        _ => Cell::Empty,
    }
}
