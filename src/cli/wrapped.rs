use std::time::Duration;

use colored::Colorize;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Alignment, Constraint, Layout},
    style::Style,
    text::Line,
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
    Frame,
};

use crate::api::Backend;
use crate::effects::{self, Particle};
use crate::error::Result;
use crate::tui::FOOTER_STYLE;
use crate::wrapped::{build_deck, Deck};

const TICK_INTERVAL: Duration = Duration::from_millis(50);
const CARD_WIDTH: u16 = 56;
const CARD_HEIGHT: u16 = 11;

struct WrappedView {
    deck: Deck,
    phase: f64,
    particles: Vec<Particle>,
    width: u16,
    height: u16,
    /// Cards advanced so far, for the position indicator.
    seen: usize,
}

impl WrappedView {
    fn new(deck: Deck, width: u16, height: u16) -> Self {
        Self {
            deck,
            phase: 0.0,
            particles: effects::pre_seed_particles(width, height),
            width,
            height,
            seen: 0,
        }
    }

    fn tick(&mut self) {
        self.phase += 1.0 / 70.0;
        effects::tick_particles(&mut self.particles, self.width, self.height);
    }

    fn advance(&mut self) {
        self.deck.advance();
        self.seen += 1;
    }

    /// Returns false when the view should close.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => false,
            KeyCode::Char(' ') | KeyCode::Enter | KeyCode::Right | KeyCode::Char('n') => {
                self.advance();
                true
            }
            _ => true,
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        self.width = area.width;
        self.height = area.height;

        let Some(card) = self.deck.front() else {
            return;
        };
        let palette = card.palette();
        effects::render_particles(&self.particles, palette, frame, area);

        let [_, title_area, _, middle, _, hints_area] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(CARD_HEIGHT),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(effects::gradient_line("Your Money, Wrapped", palette, self.phase))
                .alignment(Alignment::Center),
            title_area,
        );

        let [_, card_area, _] = Layout::horizontal([
            Constraint::Fill(1),
            Constraint::Length(CARD_WIDTH.min(area.width)),
            Constraint::Fill(1),
        ])
        .areas(middle);

        let border_color = effects::gradient_color(palette, self.phase);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border_color))
            .title(effects::gradient_line(&format!(" {} ", card.title()), palette, self.phase));
        let position = self.seen % self.deck.len().max(1) + 1;
        let body = vec![
            Line::from(""),
            Line::from(card.content()),
            Line::from(""),
            Line::from(""),
            Line::styled(format!("{position}/{}", self.deck.len()), FOOTER_STYLE),
        ];
        frame.render_widget(
            Paragraph::new(body)
                .block(block)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            card_area,
        );

        frame.render_widget(
            Paragraph::new("space/enter: next card  q: quit")
                .style(FOOTER_STYLE)
                .alignment(Alignment::Center),
            hints_area,
        );
    }
}

pub fn format_plain(deck: &Deck) -> String {
    deck.iter()
        .map(|card| format!("{}\n  {}", card.title().bold(), card.content()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn run_animated(deck: Deck) -> Result<()> {
    let (width, height) = crossterm::terminal::size().unwrap_or((80, 24));
    let mut view = WrappedView::new(deck, width, height);

    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        hook(info);
    }));
    let mut terminal = ratatui::init();

    let result: Result<()> = loop {
        if let Err(e) = terminal.draw(|frame| view.draw(frame)) {
            break Err(e.into());
        }

        if event::poll(TICK_INTERVAL)? {
            match event::read() {
                Err(e) => break Err(e.into()),
                Ok(Event::Key(key)) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if key.modifiers.contains(KeyModifiers::CONTROL)
                        && key.code == KeyCode::Char('c')
                    {
                        break Ok(());
                    }
                    if !view.handle_key(key.code) {
                        break Ok(());
                    }
                }
                _ => {}
            }
        }

        view.tick();
    };

    ratatui::restore();
    result
}

pub fn run(backend: &dyn Backend, user_id: &str, plain: bool) -> Result<()> {
    let deck = build_deck(&backend.statements(user_id)?);
    if plain || !std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        println!("{}", format_plain(&deck));
        return Ok(());
    }
    run_animated(deck)
}
