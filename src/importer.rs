use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::info;

use crate::error::{DescontosError, Result};
use crate::models::{Capabilities, Column, IngestStats, Ledger, Transaction, UNDEFINED};
use crate::sheet::{self, excel_serial_to_datetime, Cell, RawSheet, SourceFile};

/// Rows above the header that carry no data (the sheet title banner).
const BANNER_ROWS: usize = 1;

// ---------------------------------------------------------------------------
// Value coercion
// ---------------------------------------------------------------------------

/// Parse a pt-BR money string: drop `R$`, thousands `.`, decimal `,`.
pub fn parse_money_text(raw: &str) -> Option<f64> {
    let s = raw.replace("R$", "");
    let s = s.trim().replace('.', "").replace(',', ".");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Money value of a cell. Numbers pass through, text follows
/// [`parse_money_text`], anything else is worth nothing.
pub fn money(cell: &Cell) -> f64 {
    match cell {
        Cell::Number(n) => *n,
        Cell::Text(s) => parse_money_text(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S", "%d/%m/%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(s, "%d/%m/%Y").ok()
}

pub fn date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Number(n) => excel_serial_to_datetime(*n).map(|dt| dt.date()),
        Cell::Text(s) => parse_date_text(s),
        _ => None,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Text value of a cell; missing values become the [`UNDEFINED`] sentinel.
pub fn text(cell: &Cell) -> String {
    match cell {
        Cell::Text(s) if !s.trim().is_empty() => s.clone(),
        Cell::Number(n) => format_number(*n),
        Cell::Bool(b) => b.to_string(),
        Cell::DateTime(dt) => dt.date().format("%Y-%m-%d").to_string(),
        Cell::Error(e) => e.clone(),
        _ => UNDEFINED.to_string(),
    }
}

/// The discount actually granted as a share of the sub-total. Service
/// charges reduce it. Always within `[0, 1]`.
pub fn discount_fraction(subtotal: f64, payable: f64) -> f64 {
    if subtotal == 0.0 {
        return 0.0;
    }
    let fraction = (subtotal - payable) / subtotal;
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

/// Maps recognized headers to their (first) position in the header row.
fn header_index(header: &[Cell]) -> HashMap<Column, usize> {
    let mut index = HashMap::new();
    for (i, cell) in header.iter().enumerate() {
        let name = match cell {
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => format_number(*n),
            _ => continue,
        };
        if let Some(col) = Column::from_header(&name) {
            index.entry(col).or_insert(i);
        }
    }
    index
}

/// Clean a raw sheet into a ledger. The first row is a banner, the second
/// the header; data starts on the third.
pub fn ingest(source_name: &str, raw: &RawSheet) -> Result<Ledger> {
    let header = raw.rows.get(BANNER_ROWS).ok_or_else(|| DescontosError::Ingest {
        sheet: raw.name.clone(),
        reason: "sheet has no header row".to_string(),
    })?;
    let index = header_index(header);
    let present: Vec<Column> = index.keys().copied().collect();
    let capabilities = Capabilities::from_columns(&present);

    let empty = Cell::Empty;
    let cell = |row: &[Cell], col: Column| -> Option<Cell> {
        index
            .get(&col)
            .map(|&i| row.get(i).unwrap_or(&empty).clone())
    };

    let mut stats = IngestStats::default();
    let mut rows = Vec::new();

    for (offset, line) in raw.rows.iter().enumerate().skip(BANNER_ROWS + 1) {
        if line.iter().all(Cell::is_empty) {
            stats.blank_lines += 1;
            continue;
        }
        stats.data_lines += 1;

        let day = match cell(line, Column::Date) {
            Some(c) => match date(&c) {
                Some(d) => Some(d),
                None => {
                    stats.dropped_dates += 1;
                    continue;
                }
            },
            None => None,
        };

        let subtotal = cell(line, Column::Subtotal).map_or(0.0, |c| money(&c));
        let discount = cell(line, Column::Discount).map_or(0.0, |c| money(&c));
        let service = cell(line, Column::Service).map_or(0.0, |c| money(&c));
        let payable = subtotal - discount + service;

        let text_or_default = |col: Column| cell(line, col).map_or_else(|| UNDEFINED.to_string(), |c| text(&c));

        rows.push(Transaction {
            row: offset + 1,
            date: day,
            sector: text_or_default(Column::Sector),
            responsible: text_or_default(Column::Responsible),
            description: text_or_default(Column::Description),
            subtotal,
            discount,
            service,
            payable,
            discount_fraction: discount_fraction(subtotal, payable),
        });
    }

    info!(
        sheet = %raw.name,
        rows = rows.len(),
        dropped_dates = stats.dropped_dates,
        "ingested sheet"
    );

    Ok(Ledger {
        source: source_name.to_string(),
        sheet: raw.name.clone(),
        capabilities,
        rows,
        stats,
    })
}

/// Read and clean one sheet of a source file. Any failure is reported as a
/// critical ingestion error for that sheet.
pub fn load_ledger(source: &SourceFile, sheet: &str) -> Result<Ledger> {
    let raw = sheet::read_sheet(source, sheet).map_err(|e| match e {
        DescontosError::Ingest { .. } => e,
        other => DescontosError::Ingest {
            sheet: sheet.to_string(),
            reason: other.to_string(),
        },
    })?;
    ingest(&source.name, &raw)
}
