use serde::Serialize;

use crate::models::Transaction;

/// Sector fragment marking staff purchases.
pub const EMPLOYEE_MARKER: &str = "funcion";
/// Staff discounts above this fraction break policy.
pub const EMPLOYEE_LIMIT: f64 = 0.10;
/// Sector fragment marking courtesy sales.
pub const COURTESY_MARKER: &str = "cortesia";
/// Courtesy discounts above this fraction break policy.
pub const COURTESY_LIMIT: f64 = 0.05;
/// Inclusive band of otherwise-unexplained large discounts.
pub const HIGH_VALUE_MIN: f64 = 0.80;
pub const HIGH_VALUE_MAX: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyCategory {
    Employee,
    Courtesy,
    HighValue,
}

impl PolicyCategory {
    /// Priority order. A row lands in the first category it matches.
    pub const ALL: [PolicyCategory; 3] = [
        PolicyCategory::Employee,
        PolicyCategory::Courtesy,
        PolicyCategory::HighValue,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Employee => "Employee policy",
            Self::Courtesy => "Courtesy policy",
            Self::HighValue => "Other high-value discounts",
        }
    }

    pub fn rule(&self) -> &'static str {
        match self {
            Self::Employee => "Discounts > 10%",
            Self::Courtesy => "Discounts > 5%",
            Self::HighValue => "Entries between 80% and 99%",
        }
    }

    /// Whether a row breaks this category's rule, ignoring priority.
    pub fn matches(&self, t: &Transaction) -> bool {
        let sector = normalize_sector(&t.sector);
        let fraction = t.discount_fraction;
        match self {
            Self::Employee => sector.contains(EMPLOYEE_MARKER) && fraction > EMPLOYEE_LIMIT,
            Self::Courtesy => sector.contains(COURTESY_MARKER) && fraction > COURTESY_LIMIT,
            Self::HighValue => (HIGH_VALUE_MIN..=HIGH_VALUE_MAX).contains(&fraction),
        }
    }
}

/// Lower-cased, trimmed sector used for matching only.
pub fn normalize_sector(sector: &str) -> String {
    sector.trim().to_lowercase()
}

/// Disjoint split of a view. Each set keeps the view's row order.
#[derive(Debug, Clone, Default)]
pub struct PolicyPartition<'a> {
    pub employee: Vec<&'a Transaction>,
    pub courtesy: Vec<&'a Transaction>,
    pub high_value: Vec<&'a Transaction>,
    pub unclassified: Vec<&'a Transaction>,
}

impl<'a> PolicyPartition<'a> {
    pub fn get(&self, category: PolicyCategory) -> &[&'a Transaction] {
        match category {
            PolicyCategory::Employee => &self.employee,
            PolicyCategory::Courtesy => &self.courtesy,
            PolicyCategory::HighValue => &self.high_value,
        }
    }

    pub fn flagged(&self) -> usize {
        self.employee.len() + self.courtesy.len() + self.high_value.len()
    }
}

/// Run the category passes in priority order. Every pass only sees what the
/// previous passes left behind.
pub fn classify<'a>(view: &[&'a Transaction]) -> PolicyPartition<'a> {
    let (employee, rest): (Vec<&Transaction>, Vec<&Transaction>) = view
        .iter()
        .copied()
        .partition(|t| PolicyCategory::Employee.matches(t));
    let (courtesy, rest): (Vec<&Transaction>, Vec<&Transaction>) = rest
        .into_iter()
        .partition(|t| PolicyCategory::Courtesy.matches(t));
    let (high_value, unclassified): (Vec<&Transaction>, Vec<&Transaction>) = rest
        .into_iter()
        .partition(|t| PolicyCategory::HighValue.matches(t));

    PolicyPartition {
        employee,
        courtesy,
        high_value,
        unclassified,
    }
}
