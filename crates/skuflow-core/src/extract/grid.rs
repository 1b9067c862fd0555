//! Cell-grid loading from delimited text and spreadsheet workbooks.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use tracing::{debug, trace};

use crate::error::GridError;
use crate::models::cell::CellValue;

/// A rectangular-ish block of cells; rows may differ in length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    /// Worksheet name for workbook sources.
    pub sheet_name: Option<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            sheet_name: None,
            rows,
        }
    }

    /// Build a grid from string rows.
    pub fn from_strings<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            rows.into_iter()
                .map(|row| row.into_iter().map(|s| CellValue::text(s.as_ref())).collect())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(CellValue::is_empty))
    }
}

/// Physical format of a tabular payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridFormat {
    Delimited,
    Workbook,
}

impl GridFormat {
    /// Detect by magic bytes: zip (xlsx/ods) and OLE2 (xls) are workbooks.
    pub fn detect(bytes: &[u8]) -> Self {
        const ZIP: &[u8] = b"PK\x03\x04";
        const OLE: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
        if bytes.starts_with(ZIP) || bytes.starts_with(OLE) {
            GridFormat::Workbook
        } else {
            GridFormat::Delimited
        }
    }
}

/// Load a grid, choosing the reader from the payload's signature.
pub fn load(bytes: &[u8]) -> Result<Grid, GridError> {
    let grid = match GridFormat::detect(bytes) {
        GridFormat::Workbook => load_workbook(bytes)?,
        GridFormat::Delimited => load_delimited(bytes)?,
    };
    if grid.is_empty() {
        return Err(GridError::Empty);
    }
    Ok(grid)
}

/// Read CSV, semicolon- or tab-separated text.
pub fn load_delimited(bytes: &[u8]) -> Result<Grid, GridError> {
    let bytes = bytes.strip_prefix("\u{feff}".as_bytes()).unwrap_or(bytes);
    let delimiter = sniff_delimiter(bytes);
    trace!("Delimiter sniffed as {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| CellValue::text(String::from_utf8_lossy(field)))
                .collect(),
        );
    }

    debug!("Read {} delimited rows", rows.len());
    Ok(Grid::new(rows))
}

/// Pick the candidate delimiter most frequent in the first non-blank lines.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    const CANDIDATES: [u8; 3] = [b',', b';', b'\t'];

    let sample: Vec<&[u8]> = bytes
        .split(|b| *b == b'\n')
        .filter(|line| line.iter().any(|b| !b.is_ascii_whitespace()))
        .take(5)
        .collect();

    CANDIDATES
        .iter()
        .copied()
        .map(|d| {
            let count: usize = sample
                .iter()
                .map(|line| count_unquoted(line, d))
                .sum();
            (d, count)
        })
        .filter(|(_, count)| *count > 0)
        // max_by_key keeps the last maximum; reverse so ',' wins ties
        .rev()
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

fn count_unquoted(line: &[u8], delimiter: u8) -> usize {
    let mut quoted = false;
    let mut count = 0;
    for b in line {
        match *b {
            b'"' => quoted = !quoted,
            b if b == delimiter && !quoted => count += 1,
            _ => {}
        }
    }
    count
}

/// Read the first non-empty worksheet of an xlsx/xls/ods workbook.
pub fn load_workbook(bytes: &[u8]) -> Result<Grid, GridError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| GridError::Workbook(e.to_string()))?;

    for name in workbook.sheet_names() {
        let range = match workbook.worksheet_range(&name) {
            Ok(range) => range,
            Err(e) => {
                debug!("Skipping unreadable sheet '{}': {}", name, e);
                continue;
            }
        };

        let rows: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().map(cell_from_data).collect())
            .collect();

        let grid = Grid {
            sheet_name: Some(name.clone()),
            rows,
        };
        if !grid.is_empty() {
            debug!("Read {} rows from sheet '{}'", grid.rows.len(), name);
            return Ok(grid);
        }
    }

    Err(GridError::NoSheet)
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::text(b.to_string()),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.as_str()),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_comma_csv() {
        let grid = load(b"Name,Price\nWidget,\"1,234.56\"\n").unwrap();
        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[1][1], CellValue::Text("1,234.56".to_string()));
        assert_eq!(grid.sheet_name, None);
    }

    #[test]
    fn test_semicolon_csv_with_bom() {
        let grid = load("\u{feff}Bezeichnung;Preis\nRelais;12,50\n".as_bytes()).unwrap();
        assert_eq!(grid.rows[0][0], CellValue::Text("Bezeichnung".to_string()));
        assert_eq!(grid.rows[1][1], CellValue::Text("12,50".to_string()));
    }

    #[test]
    fn test_tab_separated() {
        let grid = load(b"Name\tQty\tPrice\nBolt\t100\t0.20\n").unwrap();
        assert_eq!(grid.rows[1].len(), 3);
    }

    #[test]
    fn test_ragged_rows_and_blank_cells() {
        let grid = load(b"a,b,c\nx,,\ny\n").unwrap();
        assert_eq!(grid.rows[1][1], CellValue::Empty);
        assert_eq!(grid.rows[2].len(), 1);
    }

    #[test]
    fn test_empty_payload() {
        assert!(matches!(load(b""), Err(GridError::Empty)));
        assert!(matches!(load(b" , ,\n"), Err(GridError::Empty)));
    }

    #[test]
    fn test_broken_workbook() {
        let err = load(b"PK\x03\x04garbage").unwrap_err();
        assert!(matches!(err, GridError::Workbook(_)));
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(GridFormat::detect(b"PK\x03\x04rest"), GridFormat::Workbook);
        assert_eq!(GridFormat::detect(b"a,b"), GridFormat::Delimited);
    }
}
