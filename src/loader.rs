use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;

use crate::dataset::{Dataset, Row, Scalar};
use crate::error::{DatavisError, Result};

/// Turns the bytes of an uploaded file into rows
///
/// The first sheet becomes a list of rows keyed by the header line. Cells
/// that are empty are left out of their row, so the column list of a dataset
/// is whatever the first row actually holds.
pub trait SheetParser {
    fn parse(&self, bytes: &[u8]) -> Result<Dataset>;
}

/// Parser for comma-separated files
///
/// # Examples
/// ```
/// use datavis::loader::{CsvParser, SheetParser};
///
/// let rows = CsvParser.parse(b"Region,Sales\nEast,10\n").unwrap();
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0]["Sales"].to_string(), "10");
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct CsvParser;

impl SheetParser for CsvParser {
    fn parse(&self, bytes: &[u8]) -> Result<Dataset> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| DatavisError::Parse(format!("File is not valid UTF-8: {}", e)))?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut lines = text.lines().filter(|line| !line.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| DatavisError::Parse("File is empty".to_string()))?;
        let headers = parse_csv_row(header)?;

        let mut rows = Vec::new();
        for line in lines {
            let fields = parse_csv_row(line)?;
            let row: Row = headers
                .iter()
                .zip(fields)
                .filter(|(name, value)| !name.is_empty() && !value.is_empty())
                .map(|(name, value)| (name.clone(), to_scalar(value)))
                .collect();
            if !row.is_empty() {
                rows.push(row);
            }
        }

        Ok(rows)
    }
}

/// Parser for spreadsheet workbooks (.xlsx, .xlsm, .xlsb, .xls, .ods)
///
/// Reads the first sheet. Its first row holds the column names; int and
/// float cells become numbers, empty and error cells are left out.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExcelParser;

impl SheetParser for ExcelParser {
    fn parse(&self, bytes: &[u8]) -> Result<Dataset> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| DatavisError::Parse(format!("Could not read workbook: {}", e)))?;

        let first = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| DatavisError::Parse("No sheets found in Excel file".to_string()))?;
        let range = workbook
            .worksheet_range(&first)
            .map_err(|e| DatavisError::Parse(format!("Could not read sheet {}: {}", first, e)))?;

        let mut rows = range.rows();
        let Some(header) = rows.next() else {
            return Ok(Vec::new());
        };
        let headers: Vec<String> = header.iter().map(|cell| cell.to_string()).collect();

        let mut dataset = Vec::new();
        for cells in rows {
            let row: Row = headers
                .iter()
                .zip(cells)
                .filter(|(name, _)| !name.is_empty())
                .filter_map(|(name, cell)| cell_scalar(cell).map(|v| (name.clone(), v)))
                .collect();
            if !row.is_empty() {
                dataset.push(row);
            }
        }

        Ok(dataset)
    }
}

/// Parser matching the upload's file extension, CSV when unknown
pub fn parser_for(file_name: &str) -> &'static dyn SheetParser {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => &ExcelParser,
        _ => &CsvParser,
    }
}

fn cell_scalar(cell: &Data) -> Option<Scalar> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::Int(i) => Some(Scalar::Number(*i as f64)),
        Data::Float(f) => Some(Scalar::Number(*f)),
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(Scalar::Text(s.clone())),
        other => Some(Scalar::Text(other.to_string())),
    }
}

// Numbers become Scalar::Number, anything else stays text
fn to_scalar(value: String) -> Scalar {
    match value.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Scalar::Number(n),
        _ => Scalar::Text(value),
    }
}

// Parse a CSV row into a vector of strings
fn parse_csv_row(line: &str) -> Result<Vec<String>> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Double quote inside quoted field - add a single quote
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(current_field);
                current_field = String::new();
            }
            '\r' if !in_quotes => {}
            _ => current_field.push(c),
        }
    }

    if in_quotes {
        return Err(DatavisError::Parse(format!(
            "Unterminated quoted field in line: {}",
            line
        )));
    }

    result.push(current_field);
    Ok(result)
}
