//! Spreadsheet adapter
//!
//! Loads one sheet of an `.xlsx`/`.xls`/`.xlsm`/`.ods` workbook into a
//! `MatrixTable`: first row as header labels, every other row as data.

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use can_matrix_dbc::MatrixTable;
use std::path::Path;

/// Largest magnitude at which a float is still printed as an integer
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Text form of one cell
///
/// Integral floats lose their fraction (`8.0` -> `"8"`), so numeric cells read
/// the same as typed text.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < MAX_EXACT_INTEGER => {
            format!("{}", *f as i64)
        }
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

/// Read a sheet into a matrix table
pub fn read_matrix(path: &Path, sheet: &str) -> Result<MatrixTable> {
    log::info!("Opening workbook: {:?}", path);
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Failed to open workbook {:?}", path))?;

    let sheets = workbook.sheet_names();
    if !sheets.iter().any(|name| name == sheet) {
        bail!(
            "Sheet {:?} not found in {:?} (available: {})",
            sheet,
            path,
            sheets.join(", ")
        );
    }

    let range = workbook
        .worksheet_range(sheet)
        .with_context(|| format!("Failed to read sheet {:?}", sheet))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        bail!("Sheet {:?} is empty", sheet);
    };

    let headers: Vec<String> = header.iter().map(cell_text).collect();
    let data: Vec<Vec<String>> = rows.map(|row| row.iter().map(cell_text).collect()).collect();
    log::debug!("Sheet {:?}: {} columns, {} rows", sheet, headers.len(), data.len());

    MatrixTable::new(headers, data).with_context(|| format!("Sheet {:?} holds no matrix", sheet))
}
