//! Loads album records from the metadata CSV.

use crate::error::{AlbumError, Result};
use crate::layout::is_safe_segment;
use crate::types::CollectionRecord;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

const REQUIRED_COLUMNS: [&str; 5] = ["collection_id", "title", "description", "creator", "date_range"];

pub fn load_records(path: &Path) -> Result<Vec<CollectionRecord>> {
    let file = std::fs::File::open(path).map_err(|e| {
        AlbumError::Record(format!("cannot open {}: {}", path.display(), e))
    })?;
    let records = parse_records(file)?;
    info!(path = %path.display(), count = records.len(), "Loaded collection records");
    Ok(records)
}

pub fn parse_records<R: Read>(reader: R) -> Result<Vec<CollectionRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let columns: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();
    for required in REQUIRED_COLUMNS {
        if !columns.contains_key(required) {
            return Err(AlbumError::Record(format!("missing required column '{}'", required)));
        }
    }

    // fast_id_N columns, ordered by N rather than by header position
    let fast_column = Regex::new(r"^fast_id_(\d+)$").expect("static regex");
    let mut subject_columns: Vec<(u32, usize)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let n = fast_column.captures(h)?.get(1)?.as_str().parse().ok()?;
            Some((n, i))
        })
        .collect();
    subject_columns.sort();
    debug!(subject_columns = subject_columns.len(), "Detected subject columns");

    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for (row, result) in csv_reader.records().enumerate() {
        let row_values = result?;
        let field = |name: &str| -> String {
            row_values
                .get(columns[name])
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let id = field("collection_id");
        // header is line 1
        let line = row + 2;
        if id.is_empty() {
            return Err(AlbumError::Record(format!("line {}: collection_id is empty", line)));
        }
        if !is_safe_segment(&id) {
            return Err(AlbumError::Record(format!(
                "line {}: collection_id '{}' must be a single path segment",
                line, id
            )));
        }
        if !seen.insert(id.clone()) {
            return Err(AlbumError::Record(format!(
                "line {}: collection_id '{}' appears more than once",
                line, id
            )));
        }

        let subject_refs = subject_columns
            .iter()
            .filter_map(|(_, i)| row_values.get(*i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();

        records.push(CollectionRecord {
            title: field("title"),
            description: field("description"),
            creator: field("creator"),
            date_range: field("date_range"),
            id,
            subject_refs,
        });
    }
    Ok(records)
}

/// Pick the record processed by this invocation.
pub fn select_record(records: Vec<CollectionRecord>, id: Option<&str>) -> Result<CollectionRecord> {
    match id {
        Some(id) => records
            .into_iter()
            .find(|r| r.id == id)
            .ok_or_else(|| AlbumError::Record(format!("no row with collection_id '{}'", id))),
        None => {
            if records.len() != 1 {
                let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
                return Err(AlbumError::Record(format!(
                    "expected exactly one row, found {}; choose one of {:?}",
                    records.len(),
                    ids
                )));
            }
            records
                .into_iter()
                .next()
                .ok_or_else(|| AlbumError::Record("no rows".into()))
        }
    }
}
