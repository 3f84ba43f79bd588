use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

/// Placeholder stored in text columns when the cell is missing.
pub const UNDEFINED: &str = "Não definido";

/// Columns the importer recognizes. Header names are matched exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Column {
    Subtotal,
    Discount,
    Service,
    Date,
    Responsible,
    Sector,
    Description,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::Subtotal,
        Column::Discount,
        Column::Service,
        Column::Date,
        Column::Responsible,
        Column::Sector,
        Column::Description,
    ];

    pub fn header(&self) -> &'static str {
        match self {
            Self::Subtotal => "SUB-TOTAL",
            Self::Discount => "DESCONTO",
            Self::Service => "SERVIÇO",
            Self::Date => "DATA",
            Self::Responsible => "RESPONSÁVEL",
            Self::Sector => "SETOR",
            Self::Description => "DESCRIÇÃO",
        }
    }

    pub fn from_header(header: &str) -> Option<Column> {
        Self::ALL.iter().find(|c| c.header() == header).copied()
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Report features that depend on optional columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Feature {
    SectorFilter,
    ResponsibleFilter,
    DateFilter,
    PolicyAnalysis,
    LargestDiscountDetail,
    DiscountByResponsible,
    SubtotalBySector,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::SectorFilter,
        Feature::ResponsibleFilter,
        Feature::DateFilter,
        Feature::PolicyAnalysis,
        Feature::LargestDiscountDetail,
        Feature::DiscountByResponsible,
        Feature::SubtotalBySector,
    ];

    pub fn requires(&self) -> &'static [Column] {
        match self {
            Self::SectorFilter => &[Column::Sector],
            Self::ResponsibleFilter => &[Column::Responsible],
            Self::DateFilter => &[Column::Date],
            Self::PolicyAnalysis => &[Column::Sector],
            Self::LargestDiscountDetail => &[Column::Responsible],
            Self::DiscountByResponsible => &[Column::Responsible, Column::Discount],
            Self::SubtotalBySector => &[Column::Sector, Column::Subtotal],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::SectorFilter => "sector filter",
            Self::ResponsibleFilter => "responsible filter",
            Self::DateFilter => "date filter",
            Self::PolicyAnalysis => "discount policy analysis",
            Self::LargestDiscountDetail => "largest discount detail",
            Self::DiscountByResponsible => "discount by responsible chart",
            Self::SubtotalBySector => "sub-total by sector chart",
        }
    }
}

/// Which recognized columns a sheet carries, and therefore which features
/// downstream stages may run. Built once at ingestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    columns: Vec<Column>,
}

impl Capabilities {
    pub fn from_columns(columns: &[Column]) -> Self {
        let mut present: Vec<Column> = Vec::new();
        for col in Column::ALL {
            if columns.contains(&col) {
                present.push(col);
            }
        }
        Self { columns: present }
    }

    pub fn has(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn supports(&self, feature: Feature) -> bool {
        feature.requires().iter().all(|c| self.has(*c))
    }

    /// Columns a feature needs that the sheet lacks.
    pub fn missing_for(&self, feature: Feature) -> Vec<Column> {
        feature
            .requires()
            .iter()
            .filter(|c| !self.has(**c))
            .copied()
            .collect()
    }
}

/// Non-fatal problems surfaced next to the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    MissingColumns { feature: Feature, columns: Vec<Column> },
    NoDates,
}

impl Warning {
    pub fn missing(caps: &Capabilities, feature: Feature) -> Self {
        Self::MissingColumns {
            feature,
            columns: caps.missing_for(feature),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumns { feature, columns } => {
                let names: Vec<&str> = columns.iter().map(|c| c.header()).collect();
                write!(
                    f,
                    "Column(s) {} not found; skipping {}",
                    names.join(", "),
                    feature.label()
                )
            }
            Self::NoDates => f.write_str("Column DATA is empty for the current selection; skipping date filter"),
        }
    }
}

/// One cleaned ledger line. Derived fields are computed at creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub row: usize,
    pub date: Option<NaiveDate>,
    pub sector: String,
    pub responsible: String,
    pub description: String,
    pub subtotal: f64,
    pub discount: f64,
    pub service: f64,
    pub payable: f64,
    pub discount_fraction: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestStats {
    pub data_lines: usize,
    pub blank_lines: usize,
    pub dropped_dates: usize,
}

/// The cleaned table for one (file, sheet) pair.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub source: String,
    pub sheet: String,
    pub capabilities: Capabilities,
    pub rows: Vec<Transaction>,
    pub stats: IngestStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_from_header_is_exact() {
        assert_eq!(Column::from_header("SERVIÇO"), Some(Column::Service));
        assert_eq!(Column::from_header("SERVICO"), None);
        assert_eq!(Column::from_header("setor"), None);
    }

    #[test]
    fn test_capabilities_features() {
        let caps = Capabilities::from_columns(&[Column::Sector, Column::Discount]);
        assert!(caps.supports(Feature::PolicyAnalysis));
        assert!(caps.supports(Feature::SectorFilter));
        assert!(!caps.supports(Feature::DiscountByResponsible));
        assert_eq!(
            caps.missing_for(Feature::SubtotalBySector),
            vec![Column::Subtotal]
        );
    }

    #[test]
    fn test_warning_message_names_columns() {
        let caps = Capabilities::from_columns(&[]);
        let w = Warning::missing(&caps, Feature::DiscountByResponsible);
        assert_eq!(
            w.to_string(),
            "Column(s) RESPONSÁVEL, DESCONTO not found; skipping discount by responsible chart"
        );
    }
}
