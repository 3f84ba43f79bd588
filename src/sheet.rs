use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use sha2::{Digest, Sha256};

use crate::error::{DescontosError, Result};

// ---------------------------------------------------------------------------
// Source files
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceKind {
    Csv,
    #[cfg(feature = "xlsx")]
    Workbook,
}

/// A spreadsheet read fully into memory. The checksum identifies its content.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub kind: SourceKind,
    pub bytes: Vec<u8>,
    pub checksum: String,
}

impl SourceFile {
    pub fn read(path: &Path) -> Result<Self> {
        let kind = detect_kind(path)?;
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        Ok(Self::from_bytes(name, kind, bytes))
    }

    pub fn from_bytes(name: String, kind: SourceKind, bytes: Vec<u8>) -> Self {
        let checksum = compute_checksum(&bytes);
        Self {
            name,
            kind,
            bytes,
            checksum,
        }
    }

    /// Name of the single sheet a CSV file exposes.
    fn csv_sheet_name(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("Sheet1")
            .to_string()
    }
}

fn detect_kind(path: &Path) -> Result<SourceKind> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => Ok(SourceKind::Csv),
        #[cfg(feature = "xlsx")]
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SourceKind::Workbook),
        _ => Err(DescontosError::UnsupportedFormat(path.display().to_string())),
    }
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Raw cells
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
    Error(String),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// The untouched grid of one sheet, first sheet row first.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

/// Spreadsheet serial dates count days from 1899-12-30 (this absorbs the
/// 1900 leap year bug); the fraction is the time of day.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.floor();
    let secs = ((serial - days) * 86_400.0).round() as i64;
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    base.checked_add_signed(chrono::Duration::days(days as i64))?
        .checked_add_signed(chrono::Duration::seconds(secs))
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

pub fn sheet_names(source: &SourceFile) -> Result<Vec<String>> {
    match source.kind {
        SourceKind::Csv => Ok(vec![source.csv_sheet_name()]),
        #[cfg(feature = "xlsx")]
        SourceKind::Workbook => workbook::sheet_names(source),
    }
}

pub fn read_sheet(source: &SourceFile, sheet: &str) -> Result<RawSheet> {
    match source.kind {
        SourceKind::Csv => {
            if sheet != source.csv_sheet_name() {
                return Err(DescontosError::SheetNotFound(sheet.to_string()));
            }
            read_csv(source, sheet)
        }
        #[cfg(feature = "xlsx")]
        SourceKind::Workbook => workbook::read_sheet(source, sheet),
    }
}

fn read_csv(source: &SourceFile, sheet: &str) -> Result<RawSheet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(source.bytes.as_slice());
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let cells = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(field.to_string())
                }
            })
            .collect();
        rows.push(cells);
    }
    Ok(RawSheet {
        name: sheet.to_string(),
        rows,
    })
}

#[cfg(feature = "xlsx")]
mod workbook {
    use std::io::Cursor;

    use calamine::{Data, Reader};

    use super::{excel_serial_to_datetime, Cell, RawSheet, SourceFile};
    use crate::error::{DescontosError, Result};

    fn open(source: &SourceFile) -> Result<calamine::Sheets<Cursor<Vec<u8>>>> {
        Ok(calamine::open_workbook_auto_from_rs(Cursor::new(
            source.bytes.clone(),
        ))?)
    }

    pub fn sheet_names(source: &SourceFile) -> Result<Vec<String>> {
        Ok(open(source)?.sheet_names())
    }

    pub fn read_sheet(source: &SourceFile, sheet: &str) -> Result<RawSheet> {
        let mut workbook = open(source)?;
        if !workbook.sheet_names().iter().any(|n| n == sheet) {
            return Err(DescontosError::SheetNotFound(sheet.to_string()));
        }
        let range = workbook.worksheet_range(sheet)?;

        // The used range may start below the first row; keep absolute positions.
        let start_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); start_row];
        for row in range.rows() {
            rows.push(row.iter().map(convert).collect());
        }
        Ok(RawSheet {
            name: sheet.to_string(),
            rows,
        })
    }

    fn convert(data: &Data) -> Cell {
        match data {
            Data::Empty => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
                .map(Cell::DateTime)
                .unwrap_or(Cell::Empty),
            Data::DateTimeIso(s) => chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .map(Cell::DateTime)
                .unwrap_or_else(|_| Cell::Text(s.clone())),
            Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(e) => Cell::Error(format!("{e:?}")),
        }
    }

    #[cfg(test)]
    mod tests {
        use calamine::CellErrorType;
        use chrono::NaiveDate;
        use rust_xlsxwriter::{Format, Workbook};

        use super::*;
        use crate::importer::load_ledger;
        use crate::sheet::SourceKind;

        /// "Janeiro" leaves its first row blank, so the used range starts on
        /// the header row. "Fevereiro" only has a banner.
        fn workbook_source() -> SourceFile {
            let mut workbook = Workbook::new();
            let date_format = Format::new().set_num_format("dd/mm/yyyy");

            let sheet = workbook.add_worksheet().set_name("Janeiro").unwrap();
            for (col, header) in ["SETOR", "DATA", "SUB-TOTAL", "DESCONTO"].iter().enumerate() {
                sheet.write_string(1, col as u16, *header).unwrap();
            }
            sheet.write_string(2, 0, "Loja").unwrap();
            sheet.write_number_with_format(2, 1, 45296.0, &date_format).unwrap();
            sheet.write_number(2, 2, 100.0).unwrap();
            sheet.write_number(2, 3, 10.0).unwrap();

            let banner_only = workbook.add_worksheet().set_name("Fevereiro").unwrap();
            banner_only.write_string(0, 0, "Relatório de fevereiro").unwrap();

            let bytes = workbook.save_to_buffer().unwrap();
            SourceFile::from_bytes("caixa.xlsx".to_string(), SourceKind::Workbook, bytes)
        }

        #[test]
        fn test_sheet_names_in_workbook_order() {
            let src = workbook_source();
            assert_eq!(sheet_names(&src).unwrap(), vec!["Janeiro", "Fevereiro"]);
        }

        #[test]
        fn test_read_sheet_keeps_blank_first_row() {
            let raw = read_sheet(&workbook_source(), "Janeiro").unwrap();
            assert_eq!(raw.rows.len(), 3);
            assert!(raw.rows[0].iter().all(Cell::is_empty));
            assert_eq!(raw.rows[1][0], Cell::Text("SETOR".to_string()));
            let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
            assert!(matches!(&raw.rows[2][1], Cell::DateTime(dt) if dt.date() == day));
            assert_eq!(raw.rows[2][2], Cell::Number(100.0));
        }

        #[test]
        fn test_missing_sheet_is_reported() {
            assert!(matches!(
                read_sheet(&workbook_source(), "Março"),
                Err(DescontosError::SheetNotFound(_))
            ));
        }

        #[test]
        fn test_ledger_from_workbook() {
            let ledger = load_ledger(&workbook_source(), "Janeiro").unwrap();
            assert_eq!(ledger.rows.len(), 1);
            let row = &ledger.rows[0];
            assert_eq!(row.row, 3);
            assert_eq!(row.date, NaiveDate::from_ymd_opt(2024, 1, 5));
            assert_eq!(row.sector, "Loja");
            assert_eq!(row.payable, 90.0);

            let banner_only = load_ledger(&workbook_source(), "Fevereiro");
            assert!(matches!(banner_only, Err(DescontosError::Ingest { .. })));
        }

        #[test]
        fn test_convert_cells() {
            assert_eq!(convert(&Data::Int(7)), Cell::Number(7.0));
            assert_eq!(
                convert(&Data::Error(CellErrorType::Div0)),
                Cell::Error("Div0".to_string())
            );
            let iso = convert(&Data::DateTimeIso("2024-01-05T10:30:00".to_string()));
            assert_eq!(
                iso,
                Cell::DateTime(
                    NaiveDate::from_ymd_opt(2024, 1, 5)
                        .unwrap()
                        .and_hms_opt(10, 30, 0)
                        .unwrap()
                )
            );
            assert_eq!(
                convert(&Data::DateTimeIso("05/01/2024".to_string())),
                Cell::Text("05/01/2024".to_string())
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_source(name: &str, content: &str) -> SourceFile {
        SourceFile::from_bytes(name.to_string(), SourceKind::Csv, content.as_bytes().to_vec())
    }

    #[test]
    fn test_excel_serial_to_datetime() {
        let dt = excel_serial_to_datetime(45667.0).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        let noon = excel_serial_to_datetime(45667.5).unwrap();
        assert_eq!(noon.format("%H:%M").to_string(), "12:00");
        assert!(excel_serial_to_datetime(f64::NAN).is_none());
    }

    #[test]
    fn test_checksum_identifies_content() {
        let a = csv_source("a.csv", "x,y\n1,2\n");
        let b = csv_source("b.csv", "x,y\n1,2\n");
        let c = csv_source("a.csv", "x,y\n1,3\n");
        assert_eq!(a.checksum, b.checksum);
        assert_ne!(a.checksum, c.checksum);
        assert_eq!(a.checksum.len(), 64);
    }

    #[test]
    fn test_csv_exposes_single_sheet_named_after_stem() {
        let src = csv_source("vendas março.csv", "banner\nA,B\n");
        assert_eq!(sheet_names(&src).unwrap(), vec!["vendas março".to_string()]);
        assert!(matches!(
            read_sheet(&src, "Outra"),
            Err(DescontosError::SheetNotFound(_))
        ));
    }

    #[test]
    fn test_read_csv_keeps_text_and_empty_cells() {
        let src = csv_source("caixa.csv", "Relatório\nSETOR,DESCONTO\nLoja,\"1.234,56\"\nBar,\n");
        let sheet = read_sheet(&src, "caixa").unwrap();
        assert_eq!(sheet.rows.len(), 4);
        assert_eq!(sheet.rows[2][1], Cell::Text("1.234,56".to_string()));
        assert_eq!(sheet.rows[3][1], Cell::Empty);
    }

    #[test]
    fn test_detect_kind_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();
        assert!(matches!(
            SourceFile::read(&path),
            Err(DescontosError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_cell_is_empty() {
        assert!(Cell::Empty.is_empty());
        assert!(Cell::Text("   ".to_string()).is_empty());
        assert!(!Cell::Number(0.0).is_empty());
    }
}
