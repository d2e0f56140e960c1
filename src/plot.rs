//! Companion plotting tool integration
//!
//! The plotting tool keeps its own on-disk XML preferences file; the only
//! thing read from it is the data directory (first `dataPath` element).
//! A CSV-like text table of precipitation intensities is written there for
//! the tool to render.

use crate::error::{BoreasError, Result};
use std::path::{Path, PathBuf};

/// File name of the rain table inside the plot tool's data directory
pub const RAIN_TABLE_FILE: &str = "boreas.buienradar.csv";

/// Extract the data directory from the plot tool's preferences file
pub fn data_path_from_prefs(prefs_file: &Path) -> Result<PathBuf> {
    let contents = std::fs::read_to_string(prefs_file)?;
    let doc = roxmltree::Document::parse(&contents).map_err(|e| {
        BoreasError::decode(format!(
            "Could not properly interpret {}: {}",
            prefs_file.display(),
            e
        ))
    })?;

    let text = doc
        .descendants()
        .find(|n| n.has_tag_name("dataPath"))
        .and_then(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            BoreasError::decode(format!(
                "No dataPath element in {}",
                prefs_file.display()
            ))
        })?;

    Ok(PathBuf::from(text))
}

/// Write the rain table to the plot tool's data directory
///
/// Returns the path written to, so callers can log it.
pub fn write_rain_table(prefs_file: &str, rows: &str) -> Result<PathBuf> {
    let dir = data_path_from_prefs(Path::new(prefs_file))?;
    let path = dir.join(RAIN_TABLE_FILE);

    let mut table = String::with_capacity(rows.len() + 8);
    table.push_str("time,mm\n");
    table.push_str(rows);
    std::fs::write(&path, table)?;

    Ok(path)
}
