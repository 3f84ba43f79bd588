use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::filters::FilterOptions;
use crate::fmt::{date, money, opt_date, percent};
use crate::models::{Column, Warning};
use crate::policy::PolicyCategory;
use crate::reports::{CategoryReport, DetailRow, GroupTotal, PolicyReport, Report, Share};

const BAR_WIDTH: usize = 30;

fn right(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

pub fn format_warnings(warnings: &[Warning]) -> String {
    warnings
        .iter()
        .map(|w| format!("Warning: {w}").yellow().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line naming the sheet, its size and the applied selection.
pub fn format_heading(report: &Report) -> String {
    let mut parts = vec![format!("Sheet '{}' of {}", report.sheet, report.source)];
    parts.push(format!("{} data rows", report.stats.data_lines));
    if let Some(s) = &report.filter.sector {
        parts.push(format!("sector {s}"));
    }
    if let Some(r) = &report.filter.responsible {
        parts.push(format!("responsible {r}"));
    }
    if let Some(range) = report.date_range {
        parts.push(format!("{} to {}", date(range.from), date(range.to)));
    }
    parts.join(" | ").bold().to_string()
}

pub fn format_overview(report: &Report) -> String {
    let o = &report.overview;
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![Cell::new("Total payable"), right(money(o.total_payable))]);
    table.add_row(vec![Cell::new("Total discounts"), right(money(o.total_discount))]);
    table.add_row(vec![Cell::new("Entries"), right(o.count.to_string())]);
    if let Some(top) = &report.top_responsible {
        table.add_row(vec![
            Cell::new("Top responsible by discount"),
            Cell::new(format!("{} ({})", top.name, money(top.total))),
        ]);
    }
    let mut out = format!("Overview\n{table}");

    if let Some(row) = &report.largest_discount {
        let mut detail = Table::new();
        detail.set_header(vec!["Date", "Responsible", "Description", "Discount", "%"]);
        detail.add_row(vec![
            Cell::new(opt_date(row.date)),
            Cell::new(&row.responsible),
            Cell::new(&row.description),
            right(money(row.discount)),
            right(percent(row.discount_fraction)),
        ]);
        out.push_str(&format!("\n\nLargest discount\n{detail}"));
    }
    out
}

fn format_category_summary(policy: &PolicyReport) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Category", "Rule", "Entries", "Top responsible", "Largest %"]);
    for c in &policy.categories {
        let top = c
            .top_responsible
            .as_ref()
            .map(|g| format!("{} ({})", g.name, money(g.total)))
            .unwrap_or_else(|| "-".to_string());
        let largest = c
            .largest_fraction
            .as_ref()
            .map(|r| percent(r.discount_fraction))
            .unwrap_or_else(|| "-".to_string());
        let count = if c.count > 0 {
            c.count.to_string().red().bold().to_string()
        } else {
            c.count.to_string().green().to_string()
        };
        table.add_row(vec![
            Cell::new(c.category.title()),
            Cell::new(c.category.rule()),
            right(count),
            Cell::new(top),
            right(largest),
        ]);
    }
    table.to_string()
}

fn format_category_rows(category: &CategoryReport) -> String {
    let title = format!("{} ({})", category.category.title(), category.category.rule());
    if category.rows.is_empty() {
        return format!("{title}\nNo entries.");
    }
    let mut table = Table::new();
    table.set_header(vec!["Row", "Date", "Responsible", "Description", "Discount", "%"]);
    for r in &category.rows {
        table.add_row(vec![
            right(r.row.to_string()),
            Cell::new(opt_date(r.date)),
            Cell::new(&r.responsible),
            Cell::new(&r.description),
            right(money(r.discount)),
            right(percent(r.discount_fraction)),
        ]);
    }
    format!("{title}\n{table}")
}

/// Category summary only; `format_policy_detail` adds the per-row lists.
pub fn format_policy(policy: &PolicyReport) -> String {
    let mut out = format!("Discount policy\n{}", format_category_summary(policy));
    if policy.categories.iter().any(|c| c.category == PolicyCategory::Employee && c.count > 0) {
        out.push_str(&format!(
            "\n{}",
            "Employee discounts above the limit found".red()
        ));
    }
    out
}

pub fn format_policy_detail(policy: &PolicyReport) -> String {
    let mut out = format_policy(policy);
    for c in &policy.categories {
        out.push_str("\n\n");
        out.push_str(&format_category_rows(c));
    }
    out.push_str(&format!("\n\nWithin policy: {} entries", policy.unclassified));
    out
}

/// Horizontal text bars scaled to the largest value.
pub fn format_ranked_bars(title: &str, groups: &[GroupTotal]) -> String {
    if groups.is_empty() {
        return format!("{title}\nNo data.");
    }
    let max = groups.iter().map(|g| g.total).fold(0.0_f64, f64::max);
    let name_width = groups.iter().map(|g| g.name.chars().count()).max().unwrap_or(0);
    let mut lines = vec![title.to_string()];
    for g in groups {
        let len = if max > 0.0 {
            ((g.total / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let pad = name_width - g.name.chars().count();
        lines.push(format!(
            "  {}{}  {} {}",
            g.name,
            " ".repeat(pad),
            "█".repeat(len).cyan(),
            money(g.total)
        ));
    }
    lines.join("\n")
}

pub fn format_shares(title: &str, shares: &[Share]) -> String {
    if shares.is_empty() {
        return format!("{title}\nNo data.");
    }
    let mut table = Table::new();
    table.set_header(vec!["Sector", "Sub-total", "Share"]);
    for s in shares {
        table.add_row(vec![
            Cell::new(&s.name),
            right(money(s.total)),
            right(percent(s.share)),
        ]);
    }
    format!("{title}\n{table}")
}

fn detail_cells(row: &DetailRow, columns: &[Column]) -> Vec<Cell> {
    let mut cells = Vec::new();
    for col in columns {
        let cell = match col {
            Column::Date => Cell::new(opt_date(row.date)),
            Column::Sector => Cell::new(row.sector.as_deref().unwrap_or("")),
            Column::Responsible => Cell::new(row.responsible.as_deref().unwrap_or("")),
            Column::Description => Cell::new(row.description.as_deref().unwrap_or("")),
            Column::Subtotal => right(money(row.subtotal.unwrap_or(0.0))),
            Column::Discount => right(money(row.discount.unwrap_or(0.0))),
            Column::Service => right(money(row.service.unwrap_or(0.0))),
        };
        cells.push(cell);
    }
    cells.push(right(money(row.payable)));
    cells.push(right(format!("{:.2}%", row.discount_percent)));
    cells
}

/// Detail table with the present columns in a fixed order (date, sector,
/// responsible, description, then amounts); `limit` 0 prints every row.
pub fn format_detail(report: &Report, limit: usize) -> String {
    if report.detail.is_empty() {
        return "Detail\nNo entries for the current selection.".to_string();
    }
    let columns: Vec<Column> = DETAIL_ORDER
        .iter()
        .copied()
        .filter(|c| report.has_column(*c))
        .collect();
    let mut header: Vec<&str> = columns.iter().map(|c| c.header()).collect();
    header.push("A PAGAR");
    header.push("PERCENTUAL_DESCONTADO");

    let mut table = Table::new();
    table.set_header(header);
    let shown = if limit == 0 { report.detail.len() } else { limit.min(report.detail.len()) };
    for row in &report.detail[..shown] {
        table.add_row(detail_cells(row, &columns));
    }
    let mut out = format!("Detail\n{table}");
    if shown < report.detail.len() {
        out.push_str(&format!(
            "\n{}",
            format!("Showing {shown} of {} entries (--limit 0 shows all)", report.detail.len())
                .dimmed()
        ));
    }
    out
}

const DETAIL_ORDER: [Column; 7] = [
    Column::Date,
    Column::Sector,
    Column::Responsible,
    Column::Description,
    Column::Subtotal,
    Column::Discount,
    Column::Service,
];

pub fn format_report(report: &Report, limit: usize) -> String {
    let mut sections = vec![format_heading(report)];
    if !report.warnings.is_empty() {
        sections.push(format_warnings(&report.warnings));
    }
    sections.push(format_overview(report));
    if let Some(policy) = &report.policy {
        sections.push(format_policy(policy));
    }
    if let Some(groups) = &report.discount_by_responsible {
        sections.push(format_ranked_bars("Discount by responsible", groups));
    }
    if let Some(shares) = &report.subtotal_by_sector {
        sections.push(format_shares("Sub-total by sector", shares));
    }
    sections.push(format_detail(report, limit));
    sections.join("\n\n")
}

/// Body of `descontos policy`.
pub fn format_policy_report(report: &Report) -> String {
    let mut sections = vec![format_heading(report)];
    if !report.warnings.is_empty() {
        sections.push(format_warnings(&report.warnings));
    }
    if let Some(policy) = &report.policy {
        sections.push(format_policy_detail(policy));
    }
    sections.join("\n\n")
}

pub fn format_options(options: &FilterOptions) -> String {
    let mut out = Vec::new();
    match &options.sectors {
        Some(s) => out.push(format!("{}\n  {}", "Sectors".bold(), s.join("\n  "))),
        None => out.push(format!("{}\n  {}", "Sectors".bold(), "(no SETOR column)".dimmed())),
    }
    match &options.responsibles {
        Some(r) => out.push(format!("{}\n  {}", "Responsibles".bold(), r.join("\n  "))),
        None => out.push(format!(
            "{}\n  {}",
            "Responsibles".bold(),
            "(no RESPONSÁVEL column)".dimmed()
        )),
    }
    match options.date_bounds {
        Some((from, to)) => out.push(format!("{}\n  {} to {}", "Dates".bold(), date(from), date(to))),
        None => out.push(format!("{}\n  {}", "Dates".bold(), "(no dates)".dimmed())),
    }
    out.join("\n\n")
}

pub fn format_sheets(names: &[String]) -> String {
    if names.is_empty() {
        return "No sheets found.".to_string();
    }
    names
        .iter()
        .enumerate()
        .map(|(i, n)| format!("{:>3}  {n}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::Filter;
    use crate::models::{Capabilities, IngestStats, Ledger, Transaction};
    use crate::reports::build_report;
    use chrono::NaiveDate;

    fn report(columns: &[Column]) -> Report {
        colored::control::set_override(false);
        let rows = vec![
            Transaction {
                row: 3,
                date: NaiveDate::from_ymd_opt(2024, 1, 5),
                sector: "Funcionario Loja".to_string(),
                responsible: "Ana".to_string(),
                description: "Almoço".to_string(),
                subtotal: 1000.0,
                discount: 150.0,
                service: 0.0,
                payable: 850.0,
                discount_fraction: 0.15,
            },
            Transaction {
                row: 4,
                date: NaiveDate::from_ymd_opt(2024, 1, 6),
                sector: "Loja".to_string(),
                responsible: "Bia".to_string(),
                description: "Jantar".to_string(),
                subtotal: 200.0,
                discount: 0.0,
                service: 20.0,
                payable: 220.0,
                discount_fraction: 0.0,
            },
        ];
        let ledger = Ledger {
            source: "caixa.csv".to_string(),
            sheet: "caixa".to_string(),
            capabilities: Capabilities::from_columns(columns),
            rows,
            stats: IngestStats { data_lines: 2, ..Default::default() },
        };
        build_report(&ledger, &Filter::default()).unwrap()
    }

    #[test]
    fn test_format_report_sections() {
        let out = format_report(&report(&Column::ALL), 50);
        assert!(out.contains("Sheet 'caixa' of caixa.csv"));
        assert!(out.contains("05/01/2024 to 06/01/2024"));
        assert!(out.contains("R$ 1.070,00"));
        assert!(out.contains("R$ 150,00"));
        assert!(out.contains("Employee policy"));
        assert!(out.contains("Discount by responsible"));
        assert!(out.contains("Sub-total by sector"));
        assert!(out.contains("PERCENTUAL_DESCONTADO"));
        assert!(out.contains("15.00%"));
        assert!(!out.contains("Warning"));
    }

    #[test]
    fn test_format_report_warns_for_missing_columns() {
        let out = format_report(&report(&[Column::Subtotal, Column::Discount]), 50);
        assert!(out.contains("Warning: Column(s) SETOR not found; skipping discount policy analysis"));
        assert!(!out.contains("Employee policy"));
        assert!(!out.contains("Largest discount"));
        assert!(!out.contains("DESCRIÇÃO"));
    }

    #[test]
    fn test_detail_limit() {
        let r = report(&Column::ALL);
        let out = format_detail(&r, 1);
        assert!(out.contains("Showing 1 of 2 entries"));
        assert!(out.contains("Almoço"));
        assert!(!out.contains("Jantar"));
        assert!(format_detail(&r, 0).contains("Jantar"));
    }

    #[test]
    fn test_policy_detail_lists_rows() {
        let r = report(&Column::ALL);
        let out = format_policy_report(&r);
        assert!(out.contains("Almoço"));
        assert!(out.contains("No entries."));
        assert!(out.contains("Within policy: 1 entries"));
    }

    #[test]
    fn test_ranked_bars_scale_to_max() {
        colored::control::set_override(false);
        let out = format_ranked_bars(
            "Bars",
            &[
                GroupTotal { name: "Ana".to_string(), total: 100.0 },
                GroupTotal { name: "Bia".to_string(), total: 50.0 },
                GroupTotal { name: "Caio".to_string(), total: 0.0 },
            ],
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1].matches('█').count(), BAR_WIDTH);
        assert_eq!(lines[2].matches('█').count(), BAR_WIDTH / 2);
        assert_eq!(lines[3].matches('█').count(), 0);
    }

    #[test]
    fn test_format_options_and_sheets() {
        colored::control::set_override(false);
        let opts = FilterOptions {
            sectors: Some(vec!["Bar".to_string(), "Loja".to_string()]),
            responsibles: None,
            date_bounds: None,
        };
        let out = format_options(&opts);
        assert!(out.contains("  Bar\n  Loja"));
        assert!(out.contains("(no RESPONSÁVEL column)"));
        assert_eq!(format_sheets(&["Jan".to_string()]), "  1  Jan");
        assert_eq!(format_sheets(&[]), "No sheets found.");
    }
}
