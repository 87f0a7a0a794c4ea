//! In-memory tabular source
//!
//! A communication matrix as the converter sees it: one header row of column
//! labels and any number of data rows whose cells are plain text. Reading the
//! spreadsheet itself happens outside the library; adapters only need to
//! produce a `MatrixTable`.

use crate::types::{ConverterError, Result};

/// A header row plus data rows, every cell stored as trimmed text
///
/// Empty strings stand for absent cells. Rows shorter than the header are
/// padded, longer rows are truncated, fully empty rows are dropped but keep
/// their place in the row numbering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixTable {
    headers: Vec<String>,
    /// (spreadsheet row number, cells)
    rows: Vec<(usize, Vec<String>)>,
}

impl MatrixTable {
    /// Build a table from a header row and data rows
    ///
    /// Fails with a source error when the header is empty or there are no
    /// data rows left after dropping fully empty rows.
    pub fn new<H, R, C>(headers: H, rows: R) -> Result<Self>
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let headers: Vec<String> = headers
            .into_iter()
            .map(|h| Into::<String>::into(h).trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ConverterError::MissingHeader);
        }

        let width = headers.len();
        let rows: Vec<(usize, Vec<String>)> = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| {
                let mut cells: Vec<String> = row
                    .into_iter()
                    .take(width)
                    .map(|c| Into::<String>::into(c).trim().to_string())
                    .collect();
                cells.resize(width, String::new());
                // Header is spreadsheet row 1
                (index + 2, cells)
            })
            .filter(|(_, cells)| cells.iter().any(|c| !c.is_empty()))
            .collect();

        if rows.is_empty() {
            return Err(ConverterError::NoRows);
        }

        log::debug!("Matrix table: {} columns, {} data rows", width, rows.len());

        Ok(Self { headers, rows })
    }

    /// Column labels in source order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Iterate over data rows in source order
    pub fn rows(&self) -> impl Iterator<Item = MatrixRow<'_>> {
        self.rows.iter().map(|(number, cells)| MatrixRow {
            number: *number,
            cells,
        })
    }

    /// Index of the column with exactly this label
    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == label)
    }

    /// Check whether any data row has a non-empty cell in the given column
    pub fn column_has_data(&self, column: usize) -> bool {
        self.rows
            .iter()
            .any(|(_, row)| row.get(column).is_some_and(|c| !c.is_empty()))
    }
}

/// A borrowed data row
#[derive(Debug, Clone, Copy)]
pub struct MatrixRow<'a> {
    /// Spreadsheet row number (header = 1, first data row = 2)
    pub number: usize,
    cells: &'a [String],
}

impl<'a> MatrixRow<'a> {
    /// Non-empty cell text at `column`, `None` when absent or empty
    pub fn cell(&self, column: usize) -> Option<&'a str> {
        self.cells
            .get(column)
            .map(String::as_str)
            .filter(|c| !c.is_empty())
    }

    /// Cell text for an optional column
    pub fn cell_opt(&self, column: Option<usize>) -> Option<&'a str> {
        column.and_then(|c| self.cell(c))
    }
}
