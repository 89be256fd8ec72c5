//! `csv-to-json`: header row plus records written as a JSON array of objects.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn csv_to_json(path: &Path) -> Result<PathBuf> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV: {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("Malformed CSV: {}", path.display()))?;
        let object: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect();
        rows.push(Value::Object(object));
    }

    let json_path = path.with_extension("json");
    let file = File::create(&json_path)
        .with_context(|| format!("Failed to create: {}", json_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &rows)?;
    writer.flush()?;

    info!("Converted {} rows to {}", rows.len(), json_path.display());
    Ok(json_path)
}
