use chrono::{Duration, NaiveDate};
use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph},
    Frame,
};

use crate::cli::SourceArgs;
use crate::error::{DescontosError, Result};
use crate::filters::{self, Filter, FilterOptions};
use crate::fmt::{date, money, opt_date, percent};
use crate::reports::Report;
use crate::session::Session;
use crate::settings::{load_settings, pick_sheet};
use crate::sheet::{sheet_names, SourceFile};
use crate::tui::{
    discount_span, money_span, run_view, wrap_text, InteractiveView, ViewAction, FOOTER_STYLE,
    HEADER_STYLE, SELECTED_STYLE, WARNING_STYLE,
};

const ALL: &str = "All";
const PAGE_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Sheet,
    Sector,
    Responsible,
    From,
    To,
}

impl Control {
    const ORDER: [Control; 5] = [
        Control::Sheet,
        Control::Sector,
        Control::Responsible,
        Control::From,
        Control::To,
    ];

    fn label(&self) -> &'static str {
        match self {
            Self::Sheet => "Sheet",
            Self::Sector => "Sector",
            Self::Responsible => "Responsible",
            Self::From => "From",
            Self::To => "To",
        }
    }
}

pub struct Dashboard {
    source: SourceFile,
    sheets: Vec<String>,
    sheet_idx: usize,
    session: Session,
    filter: Filter,
    options: FilterOptions,
    report: Option<Report>,
    focus: usize,
    detail_scroll: usize,
    status_message: Option<String>,
}

impl Dashboard {
    pub fn new(source: SourceFile, sheets: Vec<String>, sheet: &str) -> Result<Self> {
        let sheet_idx = sheets
            .iter()
            .position(|s| s == sheet)
            .ok_or_else(|| DescontosError::SheetNotFound(sheet.to_string()))?;
        let mut dashboard = Self {
            source,
            sheets,
            sheet_idx,
            session: Session::new(),
            filter: Filter::default(),
            options: FilterOptions::default(),
            report: None,
            focus: 0,
            detail_scroll: 0,
            status_message: None,
        };
        dashboard.refresh();
        Ok(dashboard)
    }

    fn sheet(&self) -> &str {
        &self.sheets[self.sheet_idx]
    }

    fn focused(&self) -> Control {
        Control::ORDER[self.focus]
    }

    /// Reload the selected sheet through the session, drop selections the
    /// new choices no longer offer, and rebuild the report.
    fn refresh(&mut self) {
        self.status_message = None;
        self.detail_scroll = 0;
        let sheet = self.sheet().to_string();
        let ledger = match self.session.load(&self.source, &sheet) {
            Ok(l) => l,
            Err(e) => {
                self.report = None;
                self.options = FilterOptions::default();
                self.status_message = Some(e.to_string());
                return;
            }
        };

        self.options = filters::options(&ledger, &self.filter);
        if !offered(&self.options.sectors, &self.filter.sector) {
            self.filter.sector = None;
            self.options = filters::options(&ledger, &self.filter);
        }
        if !offered(&self.options.responsibles, &self.filter.responsible) {
            self.filter.responsible = None;
            self.options = filters::options(&ledger, &self.filter);
        }
        self.clamp_dates();

        match self.session.report(&self.filter) {
            Ok(report) => self.report = Some(report),
            Err(e) => {
                self.report = None;
                self.status_message = Some(e.to_string());
            }
        }
    }

    /// Pull the chosen dates into the current data bounds. Both ends move
    /// monotonically, so an ordered range stays ordered.
    fn clamp_dates(&mut self) {
        let dates = &mut self.filter.dates;
        match self.options.date_bounds {
            Some((lo, hi)) => {
                dates.from = dates.from.map(|d| d.clamp(lo, hi));
                dates.to = dates.to.map(|d| d.clamp(lo, hi));
            }
            None => {
                dates.from = None;
                dates.to = None;
            }
        }
    }

    fn cycle_sheet(&mut self, step: isize) {
        let n = self.sheets.len();
        if n < 2 {
            return;
        }
        self.sheet_idx = cycle_index(self.sheet_idx, n, step);
        self.refresh();
    }

    /// Step through `All` followed by the offered values.
    fn cycle_choice(current: &Option<String>, choices: &Option<Vec<String>>, step: isize) -> Option<String> {
        let Some(choices) = choices else {
            return None;
        };
        let pos = match current {
            Some(c) => choices.iter().position(|v| v == c).map(|p| p + 1).unwrap_or(0),
            None => 0,
        };
        let next = cycle_index(pos, choices.len() + 1, step);
        if next == 0 {
            None
        } else {
            Some(choices[next - 1].clone())
        }
    }

    /// The range currently in effect: the explicit ends, else the data bounds.
    fn effective_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let (lo, hi) = self.options.date_bounds?;
        Some((
            self.filter.dates.from.unwrap_or(lo),
            self.filter.dates.to.unwrap_or(hi),
        ))
    }

    fn shift_date(&mut self, control: Control, days: i64) {
        let Some((from, to)) = self.effective_range() else {
            self.status_message = Some("No dates to filter on".to_string());
            return;
        };
        match control {
            Control::From => {
                let moved = from + Duration::days(days);
                self.filter.dates.from = Some(moved.min(to));
            }
            Control::To => {
                let moved = to + Duration::days(days);
                self.filter.dates.to = Some(moved.max(from));
            }
            _ => return,
        }
        self.refresh();
    }

    fn change(&mut self, step: isize, days: i64) {
        match self.focused() {
            Control::Sheet => self.cycle_sheet(step),
            Control::Sector => {
                self.filter.sector =
                    Self::cycle_choice(&self.filter.sector, &self.options.sectors, step);
                self.refresh();
            }
            Control::Responsible => {
                self.filter.responsible =
                    Self::cycle_choice(&self.filter.responsible, &self.options.responsibles, step);
                self.refresh();
            }
            control @ (Control::From | Control::To) => self.shift_date(control, days),
        }
    }

    fn reset(&mut self) {
        self.filter = Filter::default();
        self.refresh();
    }

    // -----------------------------------------------------------------------
    // Drawing
    // -----------------------------------------------------------------------

    fn control_value(&self, control: Control) -> String {
        match control {
            Control::Sheet => self.sheet().to_string(),
            Control::Sector => match &self.options.sectors {
                None => "(no SETOR column)".to_string(),
                Some(_) => self.filter.sector.clone().unwrap_or_else(|| ALL.to_string()),
            },
            Control::Responsible => match &self.options.responsibles {
                None => "(no RESPONSÁVEL column)".to_string(),
                Some(_) => self.filter.responsible.clone().unwrap_or_else(|| ALL.to_string()),
            },
            Control::From => self.effective_range().map(|r| date(r.0)).unwrap_or_else(|| "-".to_string()),
            Control::To => self.effective_range().map(|r| date(r.1)).unwrap_or_else(|| "-".to_string()),
        }
    }

    fn draw_controls(&self, frame: &mut Frame, area: Rect) {
        let lines: Vec<Line> = Control::ORDER
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let text = format!(" {:<12} < {} >", c.label(), self.control_value(*c));
                if i == self.focus {
                    Line::from(Span::styled(format!("{text:<width$}", width = area.width as usize), SELECTED_STYLE))
                } else {
                    Line::from(text)
                }
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_summary(&self, frame: &mut Frame, area: Rect, report: &Report) {
        let [left, right] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(area);

        let o = &report.overview;
        let mut lines = vec![
            Line::from(vec![Span::raw(" Total payable    "), money_span(o.total_payable)]),
            Line::from(vec![Span::raw(" Total discounts  "), discount_span(o.total_discount)]),
            Line::from(format!(" Entries          {}", o.count)),
        ];
        if let Some(top) = &report.top_responsible {
            lines.push(Line::from(vec![
                Span::raw(format!(" Top responsible  {} ", top.name)),
                discount_span(top.total),
            ]));
        }
        if let Some(row) = &report.largest_discount {
            let (text, _) = wrap_text(
                &format!(
                    " Largest discount {} on {} by {} ({})",
                    money(row.discount),
                    opt_date(row.date),
                    row.responsible,
                    percent(row.discount_fraction)
                ),
                left.width.saturating_sub(1) as usize,
            );
            lines.extend(text.lines().map(|l| Line::from(l.to_string())));
        }
        frame.render_widget(Paragraph::new(lines), left);

        let bold = Style::default().add_modifier(Modifier::BOLD);
        let mut policy_lines = vec![Line::from(Span::styled(" Discount policy", bold))];
        match &report.policy {
            Some(policy) => {
                for c in &policy.categories {
                    let style = if c.count > 0 {
                        Style::default().fg(Color::Red)
                    } else {
                        Style::default().fg(Color::Rgb(80, 220, 100))
                    };
                    let top = c
                        .top_responsible
                        .as_ref()
                        .map(|g| format!("  top {}", g.name))
                        .unwrap_or_default();
                    policy_lines.push(Line::from(vec![
                        Span::raw(format!(" {:<28}", c.category.title())),
                        Span::styled(format!("{:>4}", c.count), style),
                        Span::styled(top, FOOTER_STYLE),
                    ]));
                }
            }
            None => policy_lines.push(Line::from(Span::styled(" (no SETOR column)", FOOTER_STYLE))),
        }
        frame.render_widget(Paragraph::new(policy_lines), right);
    }

    fn draw_charts(&self, frame: &mut Frame, area: Rect, report: &Report) {
        let [left, right] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(area);
        let title_style = Style::default().add_modifier(Modifier::BOLD);

        if let Some(groups) = &report.discount_by_responsible {
            let bars: Vec<Bar> = groups
                .iter()
                .map(|g| {
                    Bar::default()
                        .value(g.total.max(0.0).round() as u64)
                        .label(Line::from(g.name.as_str()))
                        .text_value(money(g.total))
                        .style(Style::default().fg(Color::Cyan))
                })
                .collect();
            let chart = BarChart::default()
                .block(
                    Block::default()
                        .title(" Discount by responsible")
                        .title_style(title_style)
                        .borders(Borders::NONE),
                )
                .direction(Direction::Horizontal)
                .bar_width(1)
                .bar_gap(0)
                .data(BarGroup::default().bars(&bars));
            frame.render_widget(chart, left);
        }

        if let Some(shares) = &report.subtotal_by_sector {
            let name_width = shares.iter().map(|s| s.name.chars().count()).max().unwrap_or(6);
            let mut lines = vec![Line::from(Span::styled(" Sub-total by sector", title_style))];
            for s in shares {
                lines.push(Line::from(vec![
                    Span::raw(format!(" {:<width$}  ", s.name, width = name_width)),
                    Span::styled(format!("{:>8}  ", percent(s.share)), HEADER_STYLE),
                    money_span(s.total),
                ]));
            }
            frame.render_widget(Paragraph::new(lines), right);
        }
    }

    fn draw_detail(&self, frame: &mut Frame, area: Rect, report: &Report) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let mut lines = vec![Line::from(Span::styled(
            format!(" Detail ({} entries)", report.detail.len()),
            bold,
        ))];
        let visible = area.height.saturating_sub(1) as usize;
        for row in report.detail.iter().skip(self.detail_scroll).take(visible) {
            lines.push(Line::from(vec![
                Span::raw(format!(
                    " {:<10}  {:<16.16}  {:<16.16}  ",
                    opt_date(row.date),
                    row.sector.as_deref().unwrap_or(""),
                    row.responsible.as_deref().unwrap_or(""),
                )),
                money_span(row.payable),
                Span::raw("  "),
                Span::styled(format!("{:>7.2}%", row.discount_percent), HEADER_STYLE),
            ]));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }
}

impl InteractiveView for Dashboard {
    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let border_style = Style::default().fg(Color::DarkGray);
        let warning_rows = self
            .report
            .as_ref()
            .map(|r| r.warnings.len().min(3) as u16)
            .unwrap_or(0);

        let [header_area, sep1, controls_area, sep2, warn_area, summary_area, charts_area, detail_area, hints_area] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(Control::ORDER.len() as u16),
                Constraint::Length(1),
                Constraint::Length(warning_rows),
                Constraint::Length(6),
                Constraint::Fill(1),
                Constraint::Fill(1),
                Constraint::Length(1),
            ])
            .areas(area);

        frame.render_widget(
            Paragraph::new(format!(" descontos: {}", self.source.name)).style(HEADER_STYLE),
            header_area,
        );
        let sep_line = "━".repeat(area.width as usize);
        let sep_widget = Paragraph::new(sep_line.as_str()).style(border_style);
        frame.render_widget(sep_widget.clone(), sep1);
        frame.render_widget(sep_widget, sep2);

        self.draw_controls(frame, controls_area);

        if let Some(report) = &self.report {
            let warn_lines: Vec<Line> = report
                .warnings
                .iter()
                .take(3)
                .map(|w| Line::from(Span::styled(format!(" {w}"), WARNING_STYLE)))
                .collect();
            frame.render_widget(Paragraph::new(warn_lines), warn_area);
            self.draw_summary(frame, summary_area, report);
            self.draw_charts(frame, charts_area, report);
            self.draw_detail(frame, detail_area, report);
        }

        let hints = match &self.status_message {
            Some(msg) => Paragraph::new(format!(" {msg}")).style(WARNING_STYLE),
            None => Paragraph::new(
                " Up/Down=control  Left/Right=change  [/]=30 days  PgUp/PgDn=scroll  r=reset  q=quit",
            )
            .style(FOOTER_STYLE),
        };
        frame.render_widget(hints, hints_area);
    }

    fn handle_key(&mut self, code: KeyCode) -> ViewAction {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Close,
            KeyCode::Up => self.focus = self.focus.saturating_sub(1),
            KeyCode::Down => self.focus = (self.focus + 1).min(Control::ORDER.len() - 1),
            KeyCode::Left => self.change(-1, -1),
            KeyCode::Right => self.change(1, 1),
            KeyCode::Char('[') => self.change(-1, -PAGE_DAYS),
            KeyCode::Char(']') => self.change(1, PAGE_DAYS),
            KeyCode::Char('r') => self.reset(),
            KeyCode::PageDown => {
                let len = self.report.as_ref().map(|r| r.detail.len()).unwrap_or(0);
                self.detail_scroll = (self.detail_scroll + 10).min(len.saturating_sub(1));
            }
            KeyCode::PageUp => self.detail_scroll = self.detail_scroll.saturating_sub(10),
            _ => {}
        }
        ViewAction::Continue
    }
}

fn offered(choices: &Option<Vec<String>>, selected: &Option<String>) -> bool {
    match (choices, selected) {
        (_, None) => true,
        (Some(c), Some(s)) => c.contains(s),
        (None, Some(_)) => false,
    }
}

fn cycle_index(pos: usize, len: usize, step: isize) -> usize {
    (pos as isize + step).rem_euclid(len as isize) as usize
}

pub fn run(source: &SourceArgs) -> Result<()> {
    let settings = load_settings();
    let file = SourceFile::read(&source.file)?;
    let sheets = sheet_names(&file)?;
    let sheet = match &source.sheet {
        Some(s) => s.clone(),
        None => pick_sheet(&settings, &sheets)
            .ok_or_else(|| DescontosError::Other(format!("{} has no sheets", file.name)))?,
    };
    let mut dashboard = Dashboard::new(file, sheets, &sheet)?;
    run_view(&mut dashboard)
}
