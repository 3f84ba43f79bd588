use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::error::{DescontosError, Result};
use crate::filters::{DateRange, Filter};
use crate::importer::load_ledger;
use crate::models::Ledger;
use crate::reports::{build_report, Report};
use crate::sheet::SourceFile;

/// State carried between interactions on one uploaded file.
///
/// Ledgers are memoized by (content checksum, sheet), so re-selecting a sheet
/// never re-reads it. Loading a file with different content counts as a new
/// upload and forgets the previous selection.
#[derive(Debug, Default)]
pub struct Session {
    memo: HashMap<(String, String), Rc<Ledger>>,
    checksum: Option<String>,
    last_ledger: Option<Rc<Ledger>>,
    last_sheet: Option<String>,
    date_range: Option<DateRange>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, source: &SourceFile, sheet: &str) -> Result<Rc<Ledger>> {
        if self.checksum.as_deref() != Some(source.checksum.as_str()) {
            debug!(file = %source.name, "new upload, clearing selection");
            self.checksum = Some(source.checksum.clone());
            self.last_ledger = None;
            self.last_sheet = None;
            self.date_range = None;
        }

        let key = (source.checksum.clone(), sheet.to_string());
        let ledger = match self.memo.get(&key) {
            Some(hit) => {
                debug!(sheet, "ledger memo hit");
                Rc::clone(hit)
            }
            None => {
                debug!(sheet, "ledger memo miss");
                match load_ledger(source, sheet) {
                    Ok(ledger) => {
                        let ledger = Rc::new(ledger);
                        self.memo.insert(key, Rc::clone(&ledger));
                        ledger
                    }
                    Err(e) => {
                        self.last_ledger = None;
                        return Err(e);
                    }
                }
            }
        };

        self.last_ledger = Some(Rc::clone(&ledger));
        self.last_sheet = Some(sheet.to_string());
        Ok(ledger)
    }

    /// Build the report for the last loaded ledger and remember the date
    /// range it resolved to.
    pub fn report(&mut self, filter: &Filter) -> Result<Report> {
        let ledger = self
            .last_ledger
            .clone()
            .ok_or_else(|| DescontosError::Other("No sheet loaded".to_string()))?;
        let report = build_report(&ledger, filter)?;
        self.date_range = report.date_range;
        Ok(report)
    }

    pub fn last_ledger(&self) -> Option<&Rc<Ledger>> {
        self.last_ledger.as_ref()
    }

    pub fn last_sheet(&self) -> Option<&str> {
        self.last_sheet.as_deref()
    }

    pub fn date_range(&self) -> Option<DateRange> {
        self.date_range
    }

    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }
}
