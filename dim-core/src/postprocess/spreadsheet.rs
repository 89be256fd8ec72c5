//! `xlsx-to-csv`: first worksheet of a workbook written as a sibling `.csv`.

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::{Path, PathBuf};
use tracing::info;

pub fn spreadsheet_to_csv(path: &Path) -> Result<PathBuf> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("Workbook has no sheets: {}", path.display()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("Failed to read sheet '{}'", sheet))?;

    let csv_path = path.with_extension("csv");
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("Failed to create: {}", csv_path.display()))?;
    for row in range.rows() {
        writer.write_record(row.iter().map(cell_text))?;
    }
    writer.flush()?;

    info!("Converted sheet '{}' to {}", sheet, csv_path.display());
    Ok(csv_path)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::Float(3.0)), "3");
        assert_eq!(cell_text(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_text(&Data::String("東京".into())), "東京");
    }

    #[test]
    fn test_non_workbook_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("table.xlsx");
        std::fs::write(&path, b"plainly not a workbook").unwrap();
        assert!(spreadsheet_to_csv(&path).is_err());
        assert!(!temp.path().join("table.csv").exists());
    }
}
