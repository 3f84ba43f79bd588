use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::error::{DescontosError, Result};
use crate::models::{Feature, Ledger, Transaction, Warning};

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        if from > to {
            return Err(DescontosError::InvalidRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Requested range endpoints; a missing end is taken from the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DateSelection {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateSelection {
    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Resolve against the (min, max) dates of the rows being filtered.
    ///
    /// Only two explicit ends can be out of order. When a filled-in bound
    /// would fall on the wrong side of the given end, the range collapses to
    /// that end and selects nothing.
    pub fn resolve(&self, bounds: (NaiveDate, NaiveDate)) -> Result<DateRange> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => DateRange::new(from, to),
            (Some(from), None) => Ok(DateRange { from, to: bounds.1.max(from) }),
            (None, Some(to)) => Ok(DateRange { from: bounds.0.min(to), to }),
            (None, None) => Ok(DateRange { from: bounds.0, to: bounds.1 }),
        }
    }
}

impl From<DateRange> for DateSelection {
    fn from(range: DateRange) -> Self {
        Self {
            from: Some(range.from),
            to: Some(range.to),
        }
    }
}

/// User selections. `None` means every value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Filter {
    pub sector: Option<String>,
    pub responsible: Option<String>,
    pub dates: DateSelection,
}

/// The rows a filter kept, plus what was actually applied.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    pub rows: Vec<&'a Transaction>,
    pub date_range: Option<DateRange>,
    pub warnings: Vec<Warning>,
}

/// Choices offered for each filter, cascading the way selections narrow.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub sectors: Option<Vec<String>>,
    pub responsibles: Option<Vec<String>>,
    pub date_bounds: Option<(NaiveDate, NaiveDate)>,
}

pub fn distinct_sorted<'a, F>(rows: &[&'a Transaction], key: F) -> Vec<String>
where
    F: Fn(&'a Transaction) -> &'a str,
{
    let mut values: Vec<String> = rows.iter().map(|t| key(*t).to_string()).collect();
    values.sort();
    values.dedup();
    values
}

pub fn date_bounds(rows: &[&Transaction]) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates = rows.iter().filter_map(|t| t.date);
    let first = dates.next()?;
    Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}

fn by_sector<'a>(rows: Vec<&'a Transaction>, sector: &str) -> Vec<&'a Transaction> {
    rows.into_iter().filter(|t| t.sector == sector).collect()
}

fn by_responsible<'a>(rows: Vec<&'a Transaction>, responsible: &str) -> Vec<&'a Transaction> {
    rows.into_iter().filter(|t| t.responsible == responsible).collect()
}

pub fn by_date<'a>(rows: Vec<&'a Transaction>, range: &DateRange) -> Vec<&'a Transaction> {
    rows.into_iter()
        .filter(|t| t.date.is_some_and(|d| range.contains(d)))
        .collect()
}

/// Apply sector, then responsible, then date. A filter whose column the
/// sheet lacks is skipped with a warning.
pub fn apply<'a>(ledger: &'a Ledger, filter: &Filter) -> Result<FilteredView<'a>> {
    let caps = &ledger.capabilities;
    let mut warnings = Vec::new();
    let mut rows: Vec<&Transaction> = ledger.rows.iter().collect();

    if caps.supports(Feature::SectorFilter) {
        if let Some(sector) = &filter.sector {
            rows = by_sector(rows, sector);
        }
    } else {
        warnings.push(Warning::missing(caps, Feature::SectorFilter));
    }

    if caps.supports(Feature::ResponsibleFilter) {
        if let Some(responsible) = &filter.responsible {
            rows = by_responsible(rows, responsible);
        }
    } else {
        warnings.push(Warning::missing(caps, Feature::ResponsibleFilter));
    }

    let mut date_range = None;
    if caps.supports(Feature::DateFilter) {
        match date_bounds(&rows) {
            Some(bounds) => {
                let range = filter.dates.resolve(bounds)?;
                rows = by_date(rows, &range);
                date_range = Some(range);
            }
            None => warnings.push(Warning::NoDates),
        }
    } else {
        warnings.push(Warning::missing(caps, Feature::DateFilter));
    }

    debug!(
        sector = ?filter.sector,
        responsible = ?filter.responsible,
        kept = rows.len(),
        "applied filters"
    );

    Ok(FilteredView {
        rows,
        date_range,
        warnings,
    })
}

/// Sector choices come from the whole ledger, responsible choices from the
/// sector selection, date bounds from both.
pub fn options(ledger: &Ledger, filter: &Filter) -> FilterOptions {
    let caps = &ledger.capabilities;
    let mut rows: Vec<&Transaction> = ledger.rows.iter().collect();
    let mut opts = FilterOptions::default();

    if caps.supports(Feature::SectorFilter) {
        opts.sectors = Some(distinct_sorted(&rows, |t| t.sector.as_str()));
        if let Some(sector) = &filter.sector {
            rows = by_sector(rows, sector);
        }
    }
    if caps.supports(Feature::ResponsibleFilter) {
        opts.responsibles = Some(distinct_sorted(&rows, |t| t.responsible.as_str()));
        if let Some(responsible) = &filter.responsible {
            rows = by_responsible(rows, responsible);
        }
    }
    if caps.supports(Feature::DateFilter) {
        opts.date_bounds = date_bounds(&rows);
    }
    opts
}

/// Dates on the command line: ISO or day-first.
pub fn parse_cli_date(raw: &str) -> Result<NaiveDate> {
    let s = raw.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .map_err(|_| DescontosError::InvalidDate(raw.to_string()))
}
