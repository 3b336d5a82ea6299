use std::io::IsTerminal;

use colored::Colorize;
use comfy_table::{Cell, Table};
use crossterm::event::KeyCode;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::analytics::{DateRange, OTHERS};
use crate::api::Backend;
use crate::error::Result;
use crate::fmt::{format_k, money, number, percent};
use crate::reports::{get_dashboard, Dashboard, NO_DATA};
use crate::tui::{
    bar, money_span, run_report_view, ReportView, ReportViewAction, FOOTER_STYLE, HEADER_STYLE,
    SLICE_COLORS, SPIKE_STYLE,
};

const BOLD: Style = Style::new().add_modifier(Modifier::BOLD);

/// Which chart fills the lower half.
#[derive(Clone, Copy, PartialEq, Debug)]
enum LowerPanel {
    Balance,
    Debits,
}

pub struct DashboardView {
    data: Dashboard,
    lower: LowerPanel,
}

impl DashboardView {
    pub fn new(data: Dashboard) -> Self {
        Self {
            data,
            lower: LowerPanel::Balance,
        }
    }

    fn range_label(&self) -> String {
        match (self.data.range.from, self.data.range.to) {
            (Some(f), Some(t)) => format!("{f} to {t}"),
            _ => "all time".to_string(),
        }
    }

    fn draw_stats(&self, frame: &mut Frame, area: Rect) {
        let t = &self.data.totals;
        let rate = t
            .savings_rate()
            .map(percent)
            .unwrap_or_else(|| "n/a".to_string());
        let lines = vec![
            Line::from(vec![Span::raw(" Income        "), money_span(t.credit)]),
            Line::from(vec![Span::raw(" Expenses      "), money_span(-t.debit)]),
            Line::from(vec![Span::raw(" Net           "), money_span(t.net())]),
            Line::from(format!(
                " Transactions  {}   Savings rate {}",
                number(self.data.transaction_count),
                rate
            )),
        ];
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_daily_flows(&self, frame: &mut Frame, area: Rect) {
        let income_style = Style::default().fg(Color::Rgb(80, 220, 100));
        let expense_style = Style::default().fg(Color::Red);

        let max_val = self
            .data
            .daily_flows
            .iter()
            .map(|d| d.income.max(d.expense))
            .fold(0.0, f64::max);
        let (top_tick, _) = y_axis_ticks(max_val);

        let groups: Vec<BarGroup> = self
            .data
            .daily_flows
            .iter()
            .map(|d| {
                let label = d.day.get(5..).unwrap_or(&d.day).to_string();
                let bars = vec![
                    Bar::default().value(d.income.round() as u64).style(income_style),
                    Bar::default().value(d.expense.round() as u64).style(expense_style),
                ];
                BarGroup::default().label(Line::from(label)).bars(&bars)
            })
            .collect();

        let block = Block::default()
            .title(format!("Daily Income vs Expense (scale {})", format_k(top_tick)))
            .title_style(BOLD)
            .borders(Borders::NONE);
        let mut chart = BarChart::default()
            .block(block)
            .bar_width(2)
            .bar_gap(0)
            .group_gap(2)
            .max(top_tick.round() as u64);
        for group in &groups {
            chart = chart.data(group.clone());
        }
        frame.render_widget(chart, area);
    }

    fn draw_categories(&self, frame: &mut Frame, area: Rect) {
        let total: f64 = self.data.categories.iter().map(|c| c.total).sum();
        let name_width = self
            .data
            .categories
            .iter()
            .map(|c| c.name.chars().count())
            .max()
            .unwrap_or(10);
        let bar_width = (area.width as usize).saturating_sub(name_width + 12).max(4);

        let mut lines = vec![Line::from(Span::styled(" Spending by Category", BOLD))];
        for (i, c) in self.data.categories.iter().enumerate() {
            let color = if c.name == OTHERS {
                Color::DarkGray
            } else {
                SLICE_COLORS[i % SLICE_COLORS.len()]
            };
            let share = if total > 0.0 { c.total / total } else { 0.0 };
            lines.push(Line::from(vec![
                Span::raw(format!(" {:<width$} ", c.name, width = name_width)),
                Span::styled(bar(c.total, total, bar_width), Style::default().fg(color)),
                Span::styled(format!(" {}", percent(share)), FOOTER_STYLE),
            ]));
        }
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_balance(&self, frame: &mut Frame, area: Rect) {
        let points: Vec<(f64, f64)> = self
            .data
            .balance
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64, p.value))
            .collect();
        let (min_y, max_y) = points
            .iter()
            .fold((0.0_f64, 0.0_f64), |(lo, hi), &(_, y)| (lo.min(y), hi.max(y)));
        let max_x = points.len().saturating_sub(1).max(1) as f64;
        let first = self.data.balance.first().map(|p| p.day.clone()).unwrap_or_default();
        let last = self.data.balance.last().map(|p| p.day.clone()).unwrap_or_default();

        let dataset = Dataset::default()
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Cyan))
            .data(&points);
        let chart = Chart::new(vec![dataset])
            .block(Block::default().title("Balance Trend").title_style(BOLD))
            .x_axis(
                Axis::default()
                    .bounds([0.0, max_x])
                    .labels(vec![Span::raw(first), Span::raw(last)])
                    .style(FOOTER_STYLE),
            )
            .y_axis(
                Axis::default()
                    .bounds([min_y, max_y.max(min_y + 1.0)])
                    .labels(vec![Span::raw(money(min_y)), Span::raw(money(max_y))])
                    .style(FOOTER_STYLE),
            );
        frame.render_widget(chart, area);
    }

    fn draw_debits(&self, frame: &mut Frame, area: Rect) {
        let normal = Style::default().fg(Color::Rgb(56, 189, 248));
        let bars: Vec<Bar> = self
            .data
            .daily_debits
            .iter()
            .map(|p| {
                let style = if self.data.is_spike(p) { SPIKE_STYLE } else { normal };
                Bar::default()
                    .value(p.value.round() as u64)
                    .style(style)
                    .text_value(String::new())
            })
            .collect();
        let title = format!(
            "Daily Debits (threshold {}, {} spikes)",
            money(self.data.threshold),
            self.data
                .daily_debits
                .iter()
                .filter(|p| self.data.is_spike(p))
                .count()
        );
        let chart = BarChart::default()
            .block(Block::default().title(title).title_style(BOLD))
            .bar_width(1)
            .bar_gap(0)
            .data(BarGroup::default().bars(&bars));
        frame.render_widget(chart, area);
    }
}

impl ReportView for DashboardView {
    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let [header_area, sep1, stats_area, sep2, upper_area, lower_area, hints_area] =
            Layout::vertical([
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Length(4),
                Constraint::Length(1),
                Constraint::Fill(1),
                Constraint::Fill(1),
                Constraint::Length(1),
            ])
            .areas(area);

        frame.render_widget(
            Paragraph::new(format!(" Dashboard | {}", self.range_label())).style(HEADER_STYLE),
            header_area,
        );
        let sep = "━".repeat(area.width as usize);
        let sep_widget = Paragraph::new(sep.as_str()).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(sep_widget.clone(), sep1);
        frame.render_widget(sep_widget, sep2);

        if self.data.transaction_count == 0 {
            frame.render_widget(Paragraph::new(format!(" {NO_DATA}")), stats_area);
        } else {
            let [stats_left, stats_right] =
                Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .areas(stats_area);
            self.draw_stats(frame, stats_left);
            let subs = self.data.hidden_subscriptions.len();
            let flagged = self.data.flagged_days.len();
            frame.render_widget(
                Paragraph::new(vec![
                    Line::from(format!(" Hidden subscriptions  {subs}")),
                    Line::from(format!(" Heavy-spend days      {flagged}")),
                ]),
                stats_right,
            );

            let [upper_left, upper_right] =
                Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .areas(upper_area);
            self.draw_daily_flows(frame, upper_left);
            self.draw_categories(frame, upper_right);

            match self.lower {
                LowerPanel::Balance => self.draw_balance(frame, lower_area),
                LowerPanel::Debits => self.draw_debits(frame, lower_area),
            }
        }

        frame.render_widget(
            Paragraph::new(" Tab:balance/debits  q:quit").style(FOOTER_STYLE),
            hints_area,
        );
    }

    fn handle_key(&mut self, code: KeyCode) -> ReportViewAction {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => ReportViewAction::Close,
            KeyCode::Tab | KeyCode::Left | KeyCode::Right => {
                self.lower = match self.lower {
                    LowerPanel::Balance => LowerPanel::Debits,
                    LowerPanel::Debits => LowerPanel::Balance,
                };
                ReportViewAction::Continue
            }
            _ => ReportViewAction::Continue,
        }
    }
}

/// Round axis maximum: 1k, 2.5k, 5k, 10k, 25k, ...
fn y_axis_ticks(max_val: f64) -> (f64, f64) {
    let steps = [
        1000.0, 2500.0, 5000.0, 10000.0, 25000.0, 50000.0, 100000.0, 250000.0, 500000.0,
        1000000.0, 2500000.0, 5000000.0, 10000000.0,
    ];
    let top = steps
        .iter()
        .copied()
        .find(|&s| s >= max_val)
        .unwrap_or(max_val);
    (top, top / 2.0)
}

/// Plain rendering for pipes and redirects.
pub fn format_dashboard(data: &Dashboard) -> String {
    if data.transaction_count == 0 {
        return NO_DATA.to_string();
    }
    let t = &data.totals;
    let mut out = vec![
        "Dashboard".bold().to_string(),
        format!(
            "Income {}  Expenses {}  Net {}  Transactions {}",
            money(t.credit).green(),
            money(t.debit).red(),
            money(t.net()),
            number(data.transaction_count)
        ),
        String::new(),
    ];

    let mut flows = Table::new();
    flows.set_header(vec!["Day", "Income", "Expense"]);
    for d in &data.daily_flows {
        flows.add_row(vec![
            Cell::new(&d.day),
            Cell::new(money(d.income)),
            Cell::new(money(d.expense)),
        ]);
    }
    out.push(flows.to_string());

    let mut cats = Table::new();
    cats.set_header(vec!["Category", "Spent"]);
    for c in &data.categories {
        cats.add_row(vec![Cell::new(&c.name), Cell::new(money(c.total))]);
    }
    out.push(cats.to_string());

    let spikes: Vec<String> = data
        .daily_debits
        .iter()
        .filter(|p| data.is_spike(p))
        .map(|p| format!("  {} {}", p.day, money(p.value)))
        .collect();
    out.push(format!(
        "Spend spikes above {}: {}",
        money(data.threshold),
        spikes.len()
    ));
    out.extend(spikes);
    if let Some(last) = data.balance.last() {
        out.push(format!("Closing balance change: {}", money(last.value)));
    }
    out.join("\n")
}

pub fn run(backend: &dyn Backend, user_id: &str, from: Option<&str>, to: Option<&str>) -> Result<()> {
    let range = DateRange::parse(from, to)?;
    let data = get_dashboard(&backend.statements(user_id)?, range);
    if std::io::stdout().is_terminal() {
        let mut view = DashboardView::new(data);
        run_report_view(&mut view)
    } else {
        println!("{}", format_dashboard(&data));
        Ok(())
    }
}
