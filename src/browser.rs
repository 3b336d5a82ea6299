use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    DefaultTerminal, Frame,
};

use crate::analytics::{self, is_anomalous};
use crate::api::Backend;
use crate::categories::{self, CATEGORIES};
use crate::error::{FinwizzError, Result};
use crate::fmt::money;
use crate::models::{CategoryUpdate, Transaction};
use crate::tui::{self, FOOTER_STYLE, HEADER_STYLE, SELECTED_STYLE};

const PAGE_SIZE: usize = 20;

enum BrowseMode {
    Normal,
    GotoPage(String),
    GotoDate(String),
    Search(String),
    EditCategory { query: String, selection: usize },
    /// Category chosen, waiting for y/n before anything is sent.
    Confirm(&'static str),
}

pub enum BrowseAction {
    Continue,
    Close,
    CommitEdit,
}

pub struct TransactionBrowser {
    rows: Vec<Transaction>,
    filters_desc: String,
    offset: usize,
    visible_count: usize,
    selected: usize,
    mode: BrowseMode,
    status_message: Option<String>,
    pending_category: Option<&'static str>,
    table_state: TableState,
}

impl TransactionBrowser {
    pub fn new(rows: Vec<Transaction>, filters_desc: String) -> Self {
        Self {
            rows,
            filters_desc,
            offset: 0,
            visible_count: PAGE_SIZE,
            selected: 0,
            mode: BrowseMode::Normal,
            status_message: None,
            pending_category: None,
            table_state: TableState::default(),
        }
    }

    /// Rows as currently held, including any category edits made in the session.
    #[cfg(test)]
    pub fn rows(&self) -> &[Transaction] {
        &self.rows
    }

    pub fn run(&mut self, backend: &dyn Backend) -> Result<()> {
        if self.rows.is_empty() {
            println!("No transactions found.");
            return Ok(());
        }

        let hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            ratatui::restore();
            hook(info);
        }));

        let mut terminal = ratatui::init();
        let result = self.event_loop(&mut terminal, backend);
        ratatui::restore();
        result
    }

    fn selected_row(&self) -> Option<&Transaction> {
        self.rows.get(self.offset + self.selected)
    }

    pub fn draw_frame(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let narrow = area.width < 110;

        let edit_height: u16 = match &self.mode {
            BrowseMode::EditCategory { .. } => 1 + self.filtered_categories().len().min(9) as u16,
            BrowseMode::Confirm(_) => 1,
            _ => 0,
        };

        let [title_area, table_area, edit_area, status_area, keys_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(edit_height),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(Paragraph::new("Transactions").style(HEADER_STYLE), title_area);

        let (fixed_cols, num_cols): (u16, u16) = if narrow {
            (2 + 10 + 14 + 15, 5)
        } else {
            (2 + 10 + 14 + 15 + 14 + 26, 7)
        };
        let spacing = num_cols - 1;
        let desc_width = (table_area.width.saturating_sub(fixed_cols + spacing) as usize).max(10);

        let header_overhead = 2u16;
        let available_height = table_area.height.saturating_sub(header_overhead) as usize;
        let mut rendered_rows = Vec::new();
        let mut total_height = 0usize;
        let mut vis = 0usize;

        for txn in self.rows.iter().skip(self.offset) {
            let (wrapped_desc, line_count) = tui::wrap_text(&txn.description, desc_width);
            let h = line_count as usize;
            if total_height + h > available_height && vis > 0 {
                break;
            }

            let flag = Cell::from(if is_anomalous(txn) { "!" } else { "" });
            let category = txn.category.clone().unwrap_or_else(|| "\u{2014}".to_string());
            let mut cells = vec![
                flag,
                Cell::from(txn.day_label()),
                Cell::from(wrapped_desc),
                Cell::from(tui::money_span(txn.amount)),
                Cell::from(category),
            ];
            if !narrow {
                cells.push(Cell::from(txn.balance.map(money).unwrap_or_default()));
                cells.push(Cell::from(txn.upload_id.clone()));
            }

            rendered_rows.push(Row::new(cells).height(line_count));
            total_height += h;
            vis += 1;
        }
        self.visible_count = vis.max(1);

        let mut widths = vec![
            Constraint::Length(2),
            Constraint::Length(10),
            Constraint::Fill(1),
            Constraint::Length(14),
            Constraint::Length(15),
        ];
        let mut header_cells = vec!["", "Date", "Description", "Amount", "Category"];
        if !narrow {
            widths.extend([Constraint::Length(14), Constraint::Length(26)]);
            header_cells.extend(["Balance", "Upload"]);
        }

        self.table_state.select(Some(self.selected));
        let table = Table::new(rendered_rows, widths)
            .header(Row::new(header_cells).style(HEADER_STYLE).bottom_margin(1))
            .column_spacing(1)
            .row_highlight_style(SELECTED_STYLE);
        frame.render_stateful_widget(table, table_area, &mut self.table_state);

        if edit_height > 0 {
            let edit_lines: Vec<Line> = match &self.mode {
                BrowseMode::EditCategory { query, selection } => {
                    let matches = self.filtered_categories();
                    let mut lines = vec![Line::from(format!("  Category: {query}\u{2588}"))];
                    if matches.is_empty() {
                        lines.push(Line::from(Span::styled(
                            "    (no matches)",
                            Style::default().fg(Color::DarkGray),
                        )));
                    } else {
                        for (i, name) in matches.iter().enumerate() {
                            let marker = if i == *selection { ">" } else { " " };
                            lines.push(Line::from(format!("  {marker} {name}")));
                        }
                    }
                    lines
                }
                BrowseMode::Confirm(category) => {
                    let desc = self.selected_row().map(|t| t.description.as_str()).unwrap_or("");
                    vec![Line::from(format!("  Set '{desc}' to {category}? (y/n)"))]
                }
                _ => vec![],
            };
            frame.render_widget(Paragraph::new(edit_lines), edit_area);
        }

        let totals = analytics::totals(&self.rows);
        let end_row = (self.offset + self.visible_count).min(self.rows.len());
        let filters = if self.filters_desc.is_empty() {
            String::new()
        } else {
            format!(" | {}", self.filters_desc)
        };
        let mut status = format!(
            "Rows {}-{} of {} | Net: {}{}",
            self.offset + 1,
            end_row,
            self.rows.len(),
            money(totals.net()),
            filters,
        );
        if let Some(ref msg) = self.status_message {
            status.push_str(" | ");
            status.push_str(msg);
        }
        frame.render_widget(Paragraph::new(status).style(FOOTER_STYLE), status_area);

        let keys_widget = match &self.mode {
            BrowseMode::Normal => Paragraph::new(
                "\u{2191}/\u{2193}:select  e:category  n/\u{2192}:next  p/\u{2190}:prev  g:page  d:date  /:search  q:quit",
            )
            .style(FOOTER_STYLE),
            BrowseMode::GotoPage(input) => Paragraph::new(format!("Go to page: {input}\u{2588}")),
            BrowseMode::GotoDate(input) => {
                Paragraph::new(format!("Jump to date (YYYY-MM-DD): {input}\u{2588}"))
            }
            BrowseMode::Search(input) => {
                Paragraph::new(format!("Find description: {input}\u{2588}"))
            }
            BrowseMode::EditCategory { .. } => {
                Paragraph::new("Type to filter, Enter=select, Esc=cancel").style(FOOTER_STYLE)
            }
            BrowseMode::Confirm(_) => {
                Paragraph::new("y=send to backend, n/Esc=cancel").style(FOOTER_STYLE)
            }
        };
        frame.render_widget(keys_widget, keys_area);
    }

    pub fn handle_key_event(&mut self, code: KeyCode) -> BrowseAction {
        self.status_message = None;

        match &self.mode {
            BrowseMode::Normal => match code {
                KeyCode::Char('q') | KeyCode::Esc => return BrowseAction::Close,
                KeyCode::Down => {
                    let on_screen = self
                        .visible_count
                        .min(self.rows.len().saturating_sub(self.offset));
                    if self.selected + 1 < on_screen {
                        self.selected += 1;
                    } else if self.offset + self.visible_count < self.rows.len() {
                        self.offset += 1;
                    }
                }
                KeyCode::Up => {
                    if self.selected > 0 {
                        self.selected -= 1;
                    } else if self.offset > 0 {
                        self.offset -= 1;
                    }
                }
                KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown => {
                    self.scroll_down();
                    self.selected = 0;
                }
                KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => {
                    self.scroll_up();
                    self.selected = 0;
                }
                KeyCode::Home => {
                    self.offset = 0;
                    self.selected = 0;
                }
                KeyCode::End => {
                    self.scroll_to_end();
                    self.selected = 0;
                }
                KeyCode::Char('g') => self.mode = BrowseMode::GotoPage(String::new()),
                KeyCode::Char('d') => self.mode = BrowseMode::GotoDate(String::new()),
                KeyCode::Char('/') => self.mode = BrowseMode::Search(String::new()),
                KeyCode::Char('e') | KeyCode::Enter => {
                    if self.selected_row().is_some_and(|t| !t.upload_id.is_empty()) {
                        self.mode = BrowseMode::EditCategory {
                            query: String::new(),
                            selection: 0,
                        };
                    } else {
                        self.status_message = Some("Row has no upload id; cannot edit".into());
                    }
                }
                _ => {}
            },
            BrowseMode::GotoPage(_) | BrowseMode::GotoDate(_) | BrowseMode::Search(_) => {
                match code {
                    KeyCode::Esc => self.mode = BrowseMode::Normal,
                    KeyCode::Enter => self.submit_input(),
                    KeyCode::Backspace => self.input_backspace(),
                    KeyCode::Char(c) => self.input_push(c),
                    _ => {}
                }
            }
            BrowseMode::EditCategory { .. } => return self.handle_edit_category_key(code),
            BrowseMode::Confirm(_) => return self.handle_confirm_key(code),
        }
        BrowseAction::Continue
    }

    fn event_loop(&mut self, terminal: &mut DefaultTerminal, backend: &dyn Backend) -> Result<()> {
        loop {
            terminal.draw(|frame| self.draw_frame(frame))?;

            if let Event::Key(KeyEvent {
                code,
                modifiers,
                kind,
                ..
            }) = event::read()?
            {
                if kind != KeyEventKind::Press {
                    continue;
                }
                if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
                    break;
                }

                match self.handle_key_event(code) {
                    BrowseAction::Close => break,
                    BrowseAction::Continue => {}
                    BrowseAction::CommitEdit => {
                        if let Err(e) = self.commit_edit(backend) {
                            self.status_message = Some(format!("Edit failed: {e}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn scroll_down(&mut self) {
        let new_offset = self.offset + self.visible_count;
        if new_offset < self.rows.len() {
            self.offset = new_offset;
        }
    }

    fn scroll_up(&mut self) {
        self.offset = self.offset.saturating_sub(self.visible_count);
    }

    fn scroll_to_end(&mut self) {
        self.offset = self.rows.len().saturating_sub(PAGE_SIZE);
    }

    fn input_push(&mut self, c: char) {
        if let BrowseMode::GotoPage(s) | BrowseMode::GotoDate(s) | BrowseMode::Search(s) =
            &mut self.mode
        {
            s.push(c);
        }
    }

    fn input_backspace(&mut self) {
        if let BrowseMode::GotoPage(s) | BrowseMode::GotoDate(s) | BrowseMode::Search(s) =
            &mut self.mode
        {
            s.pop();
        }
    }

    fn submit_input(&mut self) {
        let mode = std::mem::replace(&mut self.mode, BrowseMode::Normal);
        match &mode {
            BrowseMode::GotoPage(input) => {
                if let Ok(page) = input.trim().parse::<usize>() {
                    if page >= 1 {
                        let target = (page - 1) * PAGE_SIZE;
                        self.offset = target.min(self.rows.len().saturating_sub(1));
                        self.selected = 0;
                    }
                }
            }
            BrowseMode::GotoDate(input) => {
                let target = input.trim();
                if !target.is_empty() {
                    if let Some(idx) = self.rows.iter().position(|r| r.day_label().as_str() >= target) {
                        self.offset = idx;
                        self.selected = 0;
                    } else {
                        self.status_message = Some(format!("No transactions on or after {target}"));
                    }
                }
            }
            BrowseMode::Search(input) => {
                let needle = input.trim().to_lowercase();
                if needle.is_empty() {
                    return;
                }
                // search forward from the row after the selection, wrapping around
                let start = self.offset + self.selected + 1;
                let len = self.rows.len();
                let found = (0..len)
                    .map(|i| (start + i) % len)
                    .find(|&i| self.rows[i].description.to_lowercase().contains(&needle));
                match found {
                    Some(idx) => {
                        self.offset = idx;
                        self.selected = 0;
                    }
                    None => self.status_message = Some(format!("No description matches '{needle}'")),
                }
            }
            _ => {}
        }
    }

    fn filtered_categories(&self) -> Vec<&'static str> {
        let query = match &self.mode {
            BrowseMode::EditCategory { query, .. } => query.to_lowercase(),
            _ => return vec![],
        };
        CATEGORIES
            .iter()
            .copied()
            .filter(|c| c.to_lowercase().contains(&query))
            .take(9)
            .collect()
    }

    fn handle_edit_category_key(&mut self, code: KeyCode) -> BrowseAction {
        match code {
            KeyCode::Char(c) => {
                if let BrowseMode::EditCategory { query, selection } = &mut self.mode {
                    query.push(c);
                    *selection = 0;
                }
            }
            KeyCode::Backspace => {
                if let BrowseMode::EditCategory { query, selection } = &mut self.mode {
                    query.pop();
                    *selection = 0;
                }
            }
            KeyCode::Up => {
                if let BrowseMode::EditCategory { selection, .. } = &mut self.mode {
                    *selection = selection.saturating_sub(1);
                }
            }
            KeyCode::Down => {
                let count = self.filtered_categories().len();
                if let BrowseMode::EditCategory { selection, .. } = &mut self.mode {
                    if count > 0 && *selection + 1 < count {
                        *selection += 1;
                    }
                }
            }
            KeyCode::Enter => {
                let matches = self.filtered_categories();
                if !matches.is_empty() {
                    let sel_idx = match &self.mode {
                        BrowseMode::EditCategory { selection, .. } => (*selection).min(matches.len() - 1),
                        _ => 0,
                    };
                    self.mode = BrowseMode::Confirm(matches[sel_idx]);
                }
            }
            KeyCode::Esc => self.mode = BrowseMode::Normal,
            _ => {}
        }
        BrowseAction::Continue
    }

    fn handle_confirm_key(&mut self, code: KeyCode) -> BrowseAction {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let BrowseMode::Confirm(category) = self.mode {
                    self.pending_category = Some(category);
                }
                self.mode = BrowseMode::Normal;
                BrowseAction::CommitEdit
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.mode = BrowseMode::Normal;
                self.status_message = Some("Edit cancelled".into());
                BrowseAction::Continue
            }
            _ => BrowseAction::Continue,
        }
    }

    /// Send the pending category for the selected row. Local rows change only on success.
    pub fn commit_edit(&mut self, backend: &dyn Backend) -> Result<()> {
        let category = self
            .pending_category
            .take()
            .ok_or_else(|| FinwizzError::Other("No category chosen".into()))?;
        let update = self
            .selected_row()
            .map(|t| CategoryUpdate::for_transaction(t, category))
            .ok_or_else(|| FinwizzError::Other("No row selected".into()))?;
        let message = categories::update_category(backend, &mut self.rows, update)?;
        self.status_message = Some(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::tests::txn;
    use crate::api::tests::FakeBackend;

    fn make_rows(n: usize) -> Vec<Transaction> {
        (0..n)
            .map(|i| {
                let amount = if i % 2 == 0 { 100.0 } else { -50.0 };
                txn(
                    &format!("2025-01-{:02}", (i % 28) + 1),
                    &format!("Transaction {}", i + 1),
                    amount,
                    None,
                )
            })
            .collect()
    }

    #[test]
    fn test_scroll_down() {
        let mut browser = TransactionBrowser::new(make_rows(50), String::new());
        browser.scroll_down();
        assert_eq!(browser.offset, PAGE_SIZE);
        browser.scroll_down();
        assert_eq!(browser.offset, PAGE_SIZE * 2);
    }

    #[test]
    fn test_scroll_down_stops_at_end() {
        let mut browser = TransactionBrowser::new(make_rows(10), String::new());
        browser.scroll_down();
        assert_eq!(browser.offset, 0);
    }

    #[test]
    fn test_scroll_up_saturates() {
        let mut browser = TransactionBrowser::new(make_rows(50), String::new());
        browser.offset = PAGE_SIZE;
        browser.scroll_up();
        browser.scroll_up();
        assert_eq!(browser.offset, 0);
    }

    #[test]
    fn test_scroll_to_end() {
        let mut browser = TransactionBrowser::new(make_rows(50), String::new());
        browser.scroll_to_end();
        assert_eq!(browser.offset, 50 - PAGE_SIZE);
    }

    #[test]
    fn test_goto_page() {
        let mut browser = TransactionBrowser::new(make_rows(100), String::new());
        browser.mode = BrowseMode::GotoPage("3".to_string());
        browser.submit_input();
        assert_eq!(browser.offset, 2 * PAGE_SIZE);
    }

    #[test]
    fn test_goto_date_found() {
        let mut browser = TransactionBrowser::new(make_rows(30), String::new());
        browser.mode = BrowseMode::GotoDate("2025-01-15".to_string());
        browser.submit_input();
        assert_eq!(browser.offset, 14);
    }

    #[test]
    fn test_goto_date_not_found() {
        let mut browser = TransactionBrowser::new(make_rows(5), String::new());
        browser.mode = BrowseMode::GotoDate("2026-01-01".to_string());
        browser.submit_input();
        assert_eq!(browser.offset, 0);
        assert!(browser.status_message.as_ref().unwrap().contains("2026-01-01"));
    }

    #[test]
    fn test_search_wraps_around() {
        let mut browser = TransactionBrowser::new(make_rows(30), String::new());
        browser.mode = BrowseMode::Search("transaction 25".to_string());
        browser.submit_input();
        assert_eq!(browser.offset, 24);

        browser.mode = BrowseMode::Search("transaction 5".to_string());
        browser.submit_input();
        assert_eq!(browser.offset, 4);
    }

    #[test]
    fn test_search_not_found() {
        let mut browser = TransactionBrowser::new(make_rows(5), String::new());
        browser.mode = BrowseMode::Search("zomato".to_string());
        browser.submit_input();
        assert!(browser.status_message.as_ref().unwrap().contains("zomato"));
    }

    #[test]
    fn test_handle_key_returns_close_on_q() {
        let mut browser = TransactionBrowser::new(make_rows(5), String::new());
        assert!(matches!(browser.handle_key_event(KeyCode::Char('q')), BrowseAction::Close));
    }

    #[test]
    fn test_selected_row_up_down() {
        let mut browser = TransactionBrowser::new(make_rows(50), String::new());
        browser.handle_key_event(KeyCode::Down);
        browser.handle_key_event(KeyCode::Down);
        assert_eq!(browser.selected, 2);
        browser.handle_key_event(KeyCode::Up);
        browser.handle_key_event(KeyCode::Up);
        browser.handle_key_event(KeyCode::Up);
        assert_eq!(browser.selected, 0);
    }

    #[test]
    fn test_edit_filter_confirm_and_commit() {
        let backend = FakeBackend::default();
        let mut browser = TransactionBrowser::new(make_rows(5), String::new());
        browser.selected = 1;

        browser.handle_key_event(KeyCode::Char('e'));
        for c in "foo".chars() {
            browser.handle_key_event(KeyCode::Char(c));
        }
        assert_eq!(browser.filtered_categories(), vec!["Food"]);
        browser.handle_key_event(KeyCode::Enter);
        assert!(matches!(browser.mode, BrowseMode::Confirm("Food")));

        let action = browser.handle_key_event(KeyCode::Char('y'));
        assert!(matches!(action, BrowseAction::CommitEdit));
        browser.commit_edit(&backend).unwrap();

        assert_eq!(browser.rows()[1].category.as_deref(), Some("Food"));
        assert!(browser.rows()[0].category.is_none());
        assert_eq!(backend.updates.borrow()[0].description, "Transaction 2");
    }

    #[test]
    fn test_confirm_declined_sends_nothing() {
        let mut browser = TransactionBrowser::new(make_rows(5), String::new());
        browser.mode = BrowseMode::Confirm("Rent");
        let action = browser.handle_key_event(KeyCode::Char('n'));
        assert!(matches!(action, BrowseAction::Continue));
        assert!(browser.pending_category.is_none());
        assert!(matches!(browser.mode, BrowseMode::Normal));
    }

    #[test]
    fn test_failed_commit_keeps_rows() {
        let backend = FakeBackend {
            fail_update: Some("Transaction not found or not updated".into()),
            ..Default::default()
        };
        let mut browser = TransactionBrowser::new(make_rows(5), String::new());
        browser.pending_category = Some("Rent");
        assert!(browser.commit_edit(&backend).is_err());
        assert!(browser.rows().iter().all(|t| t.category.is_none()));
    }

    #[test]
    fn test_edit_refused_without_upload_id() {
        let mut rows = make_rows(2);
        rows[0].upload_id.clear();
        let mut browser = TransactionBrowser::new(rows, String::new());
        browser.handle_key_event(KeyCode::Char('e'));
        assert!(matches!(browser.mode, BrowseMode::Normal));
        assert!(browser.status_message.is_some());
    }

    #[test]
    fn test_esc_cancels_edit() {
        let mut browser = TransactionBrowser::new(make_rows(5), String::new());
        browser.handle_key_event(KeyCode::Char('e'));
        browser.handle_key_event(KeyCode::Esc);
        assert!(matches!(browser.mode, BrowseMode::Normal));
    }
}
