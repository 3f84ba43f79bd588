use chrono::NaiveDate;
use serde::Serialize;

use crate::error::Result;
use crate::filters::{self, DateRange, Filter};
use crate::models::{Column, Feature, IngestStats, Ledger, Transaction, Warning};
use crate::policy::{classify, PolicyCategory, PolicyPartition};

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_payable: f64,
    pub total_discount: f64,
    pub count: usize,
}

pub fn summarize(view: &[&Transaction]) -> Overview {
    Overview {
        total_payable: view.iter().map(|t| t.payable).sum(),
        total_discount: view.iter().map(|t| t.discount).sum(),
        count: view.len(),
    }
}

/// Row with the largest key; ties go to the earliest row.
fn max_by_first<'a, F>(view: &[&'a Transaction], key: F) -> Option<&'a Transaction>
where
    F: Fn(&Transaction) -> f64,
{
    let mut best: Option<&'a Transaction> = None;
    for t in view {
        match best {
            Some(b) if key(*t) <= key(b) => {}
            _ => best = Some(*t),
        }
    }
    best
}

pub fn largest_discount<'a>(view: &[&'a Transaction]) -> Option<&'a Transaction> {
    max_by_first(view, |t| t.discount)
}

pub fn largest_fraction<'a>(view: &[&'a Transaction]) -> Option<&'a Transaction> {
    max_by_first(view, |t| t.discount_fraction)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotal {
    pub name: String,
    pub total: f64,
}

/// Sum `value` per `key`, groups listed in first-encounter order.
pub fn group_sums<K, V>(view: &[&Transaction], key: K, value: V) -> Vec<GroupTotal>
where
    K: Fn(&Transaction) -> &str,
    V: Fn(&Transaction) -> f64,
{
    let mut groups: Vec<GroupTotal> = Vec::new();
    for t in view {
        let name = key(*t);
        match groups.iter_mut().find(|g| g.name == name) {
            Some(g) => g.total += value(*t),
            None => groups.push(GroupTotal {
                name: name.to_string(),
                total: value(*t),
            }),
        }
    }
    groups
}

/// Largest group; ties go to the group seen first.
pub fn top_group(groups: &[GroupTotal]) -> Option<&GroupTotal> {
    let mut best: Option<&GroupTotal> = None;
    for g in groups {
        match best {
            Some(b) if g.total <= b.total => {}
            _ => best = Some(g),
        }
    }
    best
}

pub fn discount_by_responsible(view: &[&Transaction]) -> Vec<GroupTotal> {
    group_sums(view, |t| t.responsible.as_str(), |t| t.discount)
}

pub fn top_responsible_by_discount(view: &[&Transaction]) -> Option<GroupTotal> {
    top_group(&discount_by_responsible(view)).cloned()
}

/// Descending by total; equal totals keep their order.
pub fn ranked(mut groups: Vec<GroupTotal>) -> Vec<GroupTotal> {
    groups.sort_by(|a, b| b.total.total_cmp(&a.total));
    groups
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub name: String,
    pub total: f64,
    pub share: f64,
}

pub fn shares(groups: Vec<GroupTotal>) -> Vec<Share> {
    let total: f64 = groups.iter().map(|g| g.total).sum();
    groups
        .into_iter()
        .map(|g| Share {
            share: if total != 0.0 { g.total / total } else { 0.0 },
            name: g.name,
            total: g.total,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Report assembly
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowSummary {
    pub row: usize,
    pub date: Option<NaiveDate>,
    pub sector: String,
    pub responsible: String,
    pub description: String,
    pub discount: f64,
    pub discount_fraction: f64,
}

impl From<&Transaction> for RowSummary {
    fn from(t: &Transaction) -> Self {
        Self {
            row: t.row,
            date: t.date,
            sector: t.sector.clone(),
            responsible: t.responsible.clone(),
            description: t.description.clone(),
            discount: t.discount,
            discount_fraction: t.discount_fraction,
        }
    }
}

/// One line of the detail table. Columns the sheet lacks are `None`;
/// the percentage is the fraction times 100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    #[serde(rename = "DATA", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "SETOR", skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(rename = "RESPONSÁVEL", skip_serializing_if = "Option::is_none")]
    pub responsible: Option<String>,
    #[serde(rename = "DESCRIÇÃO", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "SUB-TOTAL", skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<f64>,
    #[serde(rename = "DESCONTO", skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(rename = "SERVIÇO", skip_serializing_if = "Option::is_none")]
    pub service: Option<f64>,
    #[serde(rename = "A PAGAR")]
    pub payable: f64,
    #[serde(rename = "PERCENTUAL_DESCONTADO")]
    pub discount_percent: f64,
}

pub fn detail_row(t: &Transaction, columns: &[Column]) -> DetailRow {
    let has = |c: Column| columns.contains(&c);
    DetailRow {
        date: if has(Column::Date) { t.date } else { None },
        sector: has(Column::Sector).then(|| t.sector.clone()),
        responsible: has(Column::Responsible).then(|| t.responsible.clone()),
        description: has(Column::Description).then(|| t.description.clone()),
        subtotal: has(Column::Subtotal).then_some(t.subtotal),
        discount: has(Column::Discount).then_some(t.discount),
        service: has(Column::Service).then_some(t.service),
        payable: t.payable,
        discount_percent: t.discount_fraction * 100.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryReport {
    pub category: PolicyCategory,
    pub count: usize,
    pub rows: Vec<RowSummary>,
    pub top_responsible: Option<GroupTotal>,
    pub largest_fraction: Option<RowSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyReport {
    pub categories: Vec<CategoryReport>,
    pub unclassified: usize,
}

impl PolicyReport {
    pub fn category(&self, category: PolicyCategory) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == category)
    }
}

pub fn policy_report(partition: &PolicyPartition, with_responsible: bool) -> PolicyReport {
    let categories = PolicyCategory::ALL
        .iter()
        .map(|&category| {
            let set = partition.get(category);
            CategoryReport {
                category,
                count: set.len(),
                rows: set.iter().map(|t| RowSummary::from(*t)).collect(),
                top_responsible: if with_responsible {
                    top_responsible_by_discount(set)
                } else {
                    None
                },
                largest_fraction: largest_fraction(set).map(RowSummary::from),
            }
        })
        .collect();
    PolicyReport {
        categories,
        unclassified: partition.unclassified.len(),
    }
}

/// Everything the front ends render for one selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub source: String,
    pub sheet: String,
    pub columns: Vec<Column>,
    pub stats: IngestStats,
    pub filter: Filter,
    pub date_range: Option<DateRange>,
    pub warnings: Vec<Warning>,
    pub overview: Overview,
    pub largest_discount: Option<RowSummary>,
    pub top_responsible: Option<GroupTotal>,
    pub policy: Option<PolicyReport>,
    pub discount_by_responsible: Option<Vec<GroupTotal>>,
    pub subtotal_by_sector: Option<Vec<Share>>,
    pub detail: Vec<DetailRow>,
}

impl Report {
    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }
}

/// Filter, classify and aggregate one ledger.
pub fn build_report(ledger: &Ledger, filter: &Filter) -> Result<Report> {
    let caps = &ledger.capabilities;
    let view = filters::apply(ledger, filter)?;
    let rows = &view.rows;
    let mut warnings = view.warnings.clone();

    let largest = if caps.supports(Feature::LargestDiscountDetail) {
        largest_discount(rows).map(RowSummary::from)
    } else {
        warnings.push(Warning::missing(caps, Feature::LargestDiscountDetail));
        None
    };

    let by_responsible = if caps.supports(Feature::DiscountByResponsible) {
        Some(discount_by_responsible(rows))
    } else {
        warnings.push(Warning::missing(caps, Feature::DiscountByResponsible));
        None
    };
    let top_responsible = by_responsible
        .as_deref()
        .and_then(top_group)
        .cloned();

    let policy = if caps.supports(Feature::PolicyAnalysis) {
        let partition = classify(rows);
        Some(policy_report(&partition, caps.has(Column::Responsible)))
    } else {
        warnings.push(Warning::missing(caps, Feature::PolicyAnalysis));
        None
    };

    let subtotal_by_sector = if caps.supports(Feature::SubtotalBySector) {
        Some(shares(group_sums(rows, |t| t.sector.as_str(), |t| t.subtotal)))
    } else {
        warnings.push(Warning::missing(caps, Feature::SubtotalBySector));
        None
    };

    Ok(Report {
        source: ledger.source.clone(),
        sheet: ledger.sheet.clone(),
        columns: caps.columns().to_vec(),
        stats: ledger.stats.clone(),
        filter: filter.clone(),
        date_range: view.date_range,
        warnings,
        overview: summarize(rows),
        largest_discount: largest,
        top_responsible,
        policy,
        discount_by_responsible: by_responsible.map(ranked),
        subtotal_by_sector,
        detail: rows.iter().map(|t| detail_row(t, caps.columns())).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::DateSelection;
    use crate::importer::discount_fraction;
    use crate::models::Capabilities;

    fn txn(row: usize, sector: &str, responsible: &str, subtotal: f64, discount: f64) -> Transaction {
        let payable = subtotal - discount;
        Transaction {
            row,
            date: NaiveDate::from_ymd_opt(2024, 1, row as u32),
            sector: sector.to_string(),
            responsible: responsible.to_string(),
            description: format!("item {row}"),
            subtotal,
            discount,
            service: 0.0,
            payable,
            discount_fraction: discount_fraction(subtotal, payable),
        }
    }

    fn sample() -> Vec<Transaction> {
        vec![
            txn(1, "Funcionario Loja", "Ana", 1000.0, 150.0),
            txn(2, "Cortesia VIP", "Bia", 200.0, 9.0),
            txn(3, "Loja", "Caio", 500.0, 450.0),
            txn(4, "Cortesia VIP", "Ana", 100.0, 20.0),
            txn(5, "Loja", "Bia", 300.0, 0.0),
        ]
    }

    fn ledger(columns: &[Column], rows: Vec<Transaction>) -> Ledger {
        Ledger {
            source: "caixa.csv".to_string(),
            sheet: "caixa".to_string(),
            capabilities: Capabilities::from_columns(columns),
            rows,
            stats: IngestStats::default(),
        }
    }

    #[test]
    fn test_summarize() {
        let rows = sample();
        let view: Vec<&Transaction> = rows.iter().collect();
        let o = summarize(&view);
        assert_eq!(o.count, 5);
        assert_eq!(o.total_discount, 629.0);
        assert_eq!(o.total_payable, 2100.0 - 629.0);
        assert_eq!(summarize(&[]).count, 0);
    }

    #[test]
    fn test_largest_discount_ties_pick_first() {
        let rows = vec![
            txn(1, "Loja", "Ana", 100.0, 30.0),
            txn(2, "Loja", "Bia", 100.0, 50.0),
            txn(3, "Loja", "Caio", 100.0, 50.0),
        ];
        let view: Vec<&Transaction> = rows.iter().collect();
        assert_eq!(largest_discount(&view).unwrap().row, 2);
        assert!(largest_discount(&[]).is_none());
    }

    #[test]
    fn test_group_sums_first_encounter_order() {
        let rows = sample();
        let view: Vec<&Transaction> = rows.iter().collect();
        let groups = discount_by_responsible(&view);
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Bia", "Caio"]);
        assert_eq!(groups[0].total, 170.0);
        assert_eq!(groups[1].total, 9.0);
        assert_eq!(groups[2].total, 450.0);
        assert_eq!(top_responsible_by_discount(&view).unwrap().name, "Caio");
    }

    #[test]
    fn test_top_group_ties_pick_first_seen() {
        let groups = vec![
            GroupTotal { name: "Bia".to_string(), total: 10.0 },
            GroupTotal { name: "Ana".to_string(), total: 10.0 },
        ];
        assert_eq!(top_group(&groups).unwrap().name, "Bia");
        assert!(top_group(&[]).is_none());
    }

    #[test]
    fn test_ranked_is_descending_and_stable() {
        let groups = vec![
            GroupTotal { name: "a".to_string(), total: 1.0 },
            GroupTotal { name: "b".to_string(), total: 5.0 },
            GroupTotal { name: "c".to_string(), total: 1.0 },
        ];
        let names: Vec<String> = ranked(groups).into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_shares() {
        let s = shares(vec![
            GroupTotal { name: "Loja".to_string(), total: 300.0 },
            GroupTotal { name: "Bar".to_string(), total: 100.0 },
        ]);
        assert_eq!(s[0].share, 0.75);
        assert_eq!(s[1].share, 0.25);
        let zero = shares(vec![GroupTotal { name: "Loja".to_string(), total: 0.0 }]);
        assert_eq!(zero[0].share, 0.0);
    }

    #[test]
    fn test_detail_row_scales_percentage_only() {
        let t = txn(1, "Loja", "Ana", 1000.0, 150.0);
        let row = detail_row(&t, &[Column::Sector, Column::Discount]);
        assert_eq!(row.discount_percent, 15.0);
        assert_eq!(t.discount_fraction, 0.15);
        assert_eq!(row.sector.as_deref(), Some("Loja"));
        assert!(row.responsible.is_none());
        assert!(row.date.is_none());
        assert_eq!(row.discount, Some(150.0));
        assert!(row.subtotal.is_none());
    }

    #[test]
    fn test_detail_row_json_uses_sheet_headers() {
        let t = txn(1, "Loja", "Ana", 1000.0, 150.0);
        let row = detail_row(&t, &[Column::Sector]);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["SETOR"], "Loja");
        assert_eq!(json["A PAGAR"], 850.0);
        assert!(json.get("RESPONSÁVEL").is_none());
    }

    #[test]
    fn test_build_report_full() {
        let l = ledger(&Column::ALL, sample());
        let r = build_report(&l, &Filter::default()).unwrap();
        assert!(r.warnings.is_empty());
        assert_eq!(r.overview.count, 5);
        assert_eq!(r.largest_discount.as_ref().unwrap().row, 3);
        assert_eq!(r.top_responsible.as_ref().unwrap().name, "Caio");

        let policy = r.policy.as_ref().unwrap();
        let employee = policy.category(PolicyCategory::Employee).unwrap();
        assert_eq!(employee.count, 1);
        assert_eq!(employee.top_responsible.as_ref().unwrap().name, "Ana");
        let courtesy = policy.category(PolicyCategory::Courtesy).unwrap();
        assert_eq!(courtesy.rows.iter().map(|r| r.row).collect::<Vec<_>>(), vec![4]);
        let high = policy.category(PolicyCategory::HighValue).unwrap();
        assert_eq!(high.rows[0].row, 3);
        assert_eq!(policy.unclassified, 2);

        let bars = r.discount_by_responsible.as_ref().unwrap();
        assert_eq!(bars[0].name, "Caio");
        assert_eq!(bars.last().unwrap().name, "Bia");
        assert_eq!(r.detail.len(), 5);
    }

    #[test]
    fn test_build_report_filtered_empty_is_valid() {
        let l = ledger(&Column::ALL, sample());
        let filter = Filter {
            sector: Some("Cozinha".to_string()),
            ..Default::default()
        };
        let r = build_report(&l, &filter).unwrap();
        assert_eq!(r.overview.count, 0);
        assert!(r.largest_discount.is_none());
        assert!(r.top_responsible.is_none());
        let policy = r.policy.unwrap();
        for c in &policy.categories {
            assert_eq!(c.count, 0);
            assert!(c.top_responsible.is_none());
            assert!(c.largest_fraction.is_none());
        }
    }

    #[test]
    fn test_build_report_open_start_after_sector_rows_is_empty() {
        let l = ledger(
            &Column::ALL,
            vec![txn(5, "Loja", "Ana", 100.0, 10.0), txn(20, "Bar", "Bia", 100.0, 10.0)],
        );
        let filter = Filter {
            sector: Some("Loja".to_string()),
            dates: DateSelection {
                from: NaiveDate::from_ymd_opt(2024, 1, 10),
                to: None,
            },
            ..Default::default()
        };
        let r = build_report(&l, &filter).unwrap();
        assert_eq!(r.overview.count, 0);
        assert!(r.detail.is_empty());
        assert_eq!(r.date_range.unwrap().from.to_string(), "2024-01-10");
    }

    #[test]
    fn test_build_report_without_sector_skips_policy() {
        let l = ledger(&[Column::Subtotal, Column::Discount], sample());
        let r = build_report(&l, &Filter::default()).unwrap();
        assert!(r.policy.is_none());
        assert!(r.subtotal_by_sector.is_none());
        assert!(r.discount_by_responsible.is_none());
        assert!(r
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::MissingColumns { feature: Feature::PolicyAnalysis, .. })));
        assert_eq!(r.overview.count, 5);
    }
}
