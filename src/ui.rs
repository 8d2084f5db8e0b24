use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use crate::clock::Clock;
use crate::session::{Command, Session, SessionState};
use crate::timeline::{ClockFormat, MinuteLine, Symbol, VISIBLE_MINUTES};

const HORIZONTAL_MARGIN: u16 = 2;
const HELP: &str = "enter/space count   p pause   s start/resume   u undo   q quit";

/// One frame of the counter: header, timeline, stats line and prompt
pub struct SessionView<'a, C: Clock> {
    session: &'a Session<C>,
    format: ClockFormat,
    color: bool,
}

impl<'a, C: Clock> SessionView<'a, C> {
    pub fn new(session: &'a Session<C>, format: ClockFormat, color: bool) -> Self {
        Self {
            session,
            format,
            color,
        }
    }

    fn style(&self, style: Style) -> Style {
        if self.color {
            style
        } else {
            Style::default()
        }
    }

    fn symbol_style(&self, symbol: Symbol) -> Style {
        let style = match symbol {
            Symbol::Tick => Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            Symbol::Idle => Style::default().fg(Color::Gray),
            Symbol::Blank => Style::default(),
            Symbol::PauseMark | Symbol::ResumeMark => Style::default().fg(Color::Yellow),
            Symbol::Filler => Style::default().add_modifier(Modifier::DIM),
        };
        self.style(style)
    }

    fn header(&self) -> Line<'static> {
        let (state, color) = match self.session.state() {
            SessionState::Running => ("RUNNING", Color::Green),
            SessionState::Paused => ("PAUSED", Color::Yellow),
            SessionState::Stopped => ("STOPPED", Color::Red),
        };
        Line::from(vec![
            Span::styled(
                "tally ",
                self.style(Style::default().add_modifier(Modifier::BOLD)),
            ),
            Span::styled(
                format!("[{state}]"),
                self.style(Style::default().fg(color).add_modifier(Modifier::BOLD)),
            ),
            Span::raw("   "),
            Span::styled(HELP, self.style(Style::default().add_modifier(Modifier::DIM))),
        ])
    }

    fn timeline_line(&self, line: &MinuteLine) -> Line<'static> {
        let mut spans = vec![Span::styled(
            format!("{} ", line.label(self.format)),
            self.style(Style::default().fg(Color::Cyan)),
        )];
        // consecutive equal symbols share a span
        let runs = line.symbols().iter().chunk_by(|s| **s);
        spans.extend((&runs).into_iter().map(|(symbol, run)| {
            let text: String = run.map(|s| s.glyph()).collect();
            Span::styled(text, self.symbol_style(symbol))
        }));
        Line::from(spans)
    }

    fn stats_line(&self) -> Line<'static> {
        let timeline = self.session.timeline();
        let now = self.session.clock().now();
        match self.session.stats().summary_text(timeline, now, self.format) {
            Some(text) => Line::from(Span::styled(
                text,
                self.style(Style::default().fg(Color::Black).bg(Color::LightYellow)),
            )),
            None => Line::default(),
        }
    }

    fn prompt_line(&self) -> Line<'static> {
        Line::from(vec![
            Span::raw("Command: "),
            Span::styled(
                command_echo(self.session.last_command()),
                self.style(Style::default().add_modifier(Modifier::BOLD)),
            ),
        ])
    }
}

/// What the prompt shows for the key pressed in the previous cycle
pub fn command_echo(command: Option<Command>) -> &'static str {
    match command {
        Some(Command::Increment) => "#",
        Some(Command::Pause) => "p",
        Some(Command::StartOrResume) => "s",
        Some(Command::Undo) => "u",
        Some(Command::Quit) => "q",
        Some(Command::Other) | None => "",
    }
}

impl<C: Clock> Widget for SessionView<'_, C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(2),
                Constraint::Length(VISIBLE_MINUTES as u16),
                Constraint::Length(2),
                Constraint::Length(1),
                Constraint::Min(0),
            ])
            .split(area);

        Paragraph::new(self.header()).render(chunks[0], buf);

        let lines: Vec<Line> = self
            .session
            .timeline()
            .lines()
            .map(|line| self.timeline_line(line))
            .collect();
        Paragraph::new(lines).render(chunks[1], buf);

        Paragraph::new(vec![Line::default(), self.stats_line()]).render(chunks[2], buf);
        Paragraph::new(self.prompt_line()).render(chunks[3], buf);
    }
}
