use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Wrap};

use crate::app::{ProgressEvent, ProgressSink, SearchOutcome, SearchState, format_elapsed};
use crate::domain::{SearchRequest, SearchType};
use crate::error::KnapsackError;
use crate::query::DEFAULT_BASE_URL;

const EVENTS_MAX: usize = 8;
const TITLE: &str = "KNApSAcK Simple Searching Tool";

type Backend = Terminal<CrosstermBackend<io::Stdout>>;

#[derive(Debug)]
struct TuiState {
    search_type: SearchType,
    keyword: String,
    notice: Option<String>,
    search_state: SearchState,
    status: String,
    progress: (usize, usize),
    events: VecDeque<String>,
    started: Instant,
}

/// Terminal front-end: a search form, a progress view and a result screen.
pub struct Tui {
    state: Arc<Mutex<TuiState>>,
}

struct TuiProgress {
    state: Arc<Mutex<TuiState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            state.search_state = event.state;
            if let Some(progress) = event.progress {
                state.progress = progress;
            }
            state.status = event.message.clone();
            push_event(
                &mut state.events,
                format!("[{}] {}", timestamp(), event.message),
            );
        }
    }
}

impl Default for Tui {
    fn default() -> Self {
        Self::new()
    }
}

impl Tui {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(TuiState {
                search_type: SearchType::Metabolite,
                keyword: String::new(),
                notice: None,
                search_state: SearchState::Idle,
                status: "ready".to_string(),
                progress: (0, 0),
                events: VecDeque::new(),
                started: Instant::now(),
            })),
        }
    }

    /// Shows the search form. `None` when the user quits.
    pub fn form(&mut self) -> miette::Result<Option<SearchRequest>> {
        let mut terminal = enter_terminal()?;

        let request = loop {
            if let Ok(state) = self.state.lock() {
                terminal
                    .draw(|frame| draw_form(frame, &state))
                    .into_diagnostic()?;
            }

            if !event::poll(Duration::from_millis(120)).into_diagnostic()? {
                continue;
            }
            let Event::Key(key) = event::read().into_diagnostic()? else {
                continue;
            };
            match self.handle_form_key(key) {
                FormAction::None => {}
                FormAction::Quit => break None,
                FormAction::Submit(request) => break Some(request),
            }
        };

        leave_terminal()?;
        Ok(request)
    }

    /// Runs `f` on a worker thread while drawing its progress.
    pub fn run<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, KnapsackError> + Send + 'static,
        R: Send + 'static,
    {
        if let Ok(mut state) = self.state.lock() {
            state.started = Instant::now();
            state.progress = (0, 0);
            state.events.clear();
        }

        let mut terminal = enter_terminal()?;
        let (tx, rx) = std::sync::mpsc::channel();
        let sink = TuiProgress {
            state: self.state.clone(),
        };
        let handle = thread::spawn(move || tx.send(f(&sink)));

        loop {
            if let Ok(state) = self.state.lock() {
                terminal
                    .draw(|frame| draw_progress(frame, &state))
                    .into_diagnostic()?;
            }

            if let Ok(result) = rx.try_recv() {
                leave_terminal()?;
                handle.join().ok();
                return result.map_err(miette::Report::new);
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if key.kind == KeyEventKind::Press && matches!(key.code, KeyCode::Esc) {
                        break;
                    }
                }
            }
        }

        leave_terminal()?;
        Err(miette::Report::msg("search aborted"))
    }

    /// Shows the outcome until a key is pressed.
    pub fn finish(&mut self, outcome: &SearchOutcome) -> miette::Result<()> {
        let mut terminal = enter_terminal()?;
        loop {
            terminal
                .draw(|frame| draw_outcome(frame, outcome))
                .into_diagnostic()?;
            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if key.kind == KeyEventKind::Press {
                        break;
                    }
                }
            }
        }
        leave_terminal()
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> FormAction {
        if key.kind != KeyEventKind::Press {
            return FormAction::None;
        }
        let Ok(mut state) = self.state.lock() else {
            return FormAction::Quit;
        };
        match key.code {
            KeyCode::Esc => return FormAction::Quit,
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
                state.search_type = match state.search_type {
                    SearchType::Metabolite => SearchType::Organism,
                    SearchType::Organism => SearchType::Metabolite,
                };
            }
            KeyCode::Backspace => {
                state.keyword.pop();
            }
            KeyCode::Char(ch) => {
                state.keyword.push(ch);
                state.notice = None;
            }
            KeyCode::Enter => {
                let keyword = state.keyword.clone();
                match SearchRequest::parse(state.search_type.as_param(), &keyword) {
                    Ok(request) => return FormAction::Submit(request),
                    Err(err) => state.notice = Some(err.to_string()),
                }
            }
            _ => {}
        }
        FormAction::None
    }
}

enum FormAction {
    None,
    Quit,
    Submit(SearchRequest),
}

fn enter_terminal() -> miette::Result<Backend> {
    let mut stdout = io::stdout();
    enable_raw_mode().into_diagnostic()?;
    stdout.execute(EnterAlternateScreen).into_diagnostic()?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).into_diagnostic()?;
    terminal.clear().into_diagnostic()?;
    Ok(terminal)
}

fn leave_terminal() -> miette::Result<()> {
    disable_raw_mode().into_diagnostic()?;
    let mut stdout = io::stdout();
    stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
    Ok(())
}

fn screen_layout(area: Rect, body: u16) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(body),
            Constraint::Min(3),
            Constraint::Length(2),
        ])
        .split(area)
}

fn title_bar() -> Paragraph<'static> {
    Paragraph::new(vec![
        Line::from(Span::styled(
            TITLE,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            DEFAULT_BASE_URL,
            Style::default().fg(Color::DarkGray),
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::BOTTOM))
}

fn footer(text: &'static str) -> Paragraph<'static> {
    Paragraph::new(Line::from(Span::styled(
        text,
        Style::default().fg(Color::DarkGray),
    )))
    .block(Block::default().borders(Borders::TOP))
}

fn draw_form(frame: &mut ratatui::Frame, state: &TuiState) {
    let chunks = screen_layout(frame.area(), 5);
    frame.render_widget(title_bar(), chunks[0]);

    let radio = |kind: SearchType, label: &'static str| {
        let selected = state.search_type == kind;
        let marker = if selected { "(•) " } else { "( ) " };
        let style = if selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        Span::styled(format!("{marker}{label}   "), style)
    };

    let keyword_prefix = "Keyword:   ";
    let form = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("Search by: ", Style::default().fg(Color::Gray)),
            radio(SearchType::Metabolite, "Metabolite"),
            radio(SearchType::Organism, "Organism"),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled(keyword_prefix, Style::default().fg(Color::Gray)),
            Span::styled(state.keyword.clone(), Style::default().fg(Color::White)),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Search"));
    frame.render_widget(form, chunks[1]);

    let notice = state
        .notice
        .as_ref()
        .map(|notice| {
            Line::from(Span::styled(
                notice.clone(),
                Style::default().fg(Color::Red),
            ))
        })
        .unwrap_or_else(|| Line::from(""));
    frame.render_widget(Paragraph::new(notice).wrap(Wrap { trim: true }), chunks[2]);
    frame.render_widget(
        footer("←/→ search type · type a keyword · Enter search · Esc quit"),
        chunks[3],
    );

    let area = chunks[1];
    let cursor_x = area
        .x
        .saturating_add(1)
        .saturating_add((keyword_prefix.len() + state.keyword.chars().count()) as u16)
        .min(area.x.saturating_add(area.width.saturating_sub(2)));
    frame.set_cursor_position((cursor_x, area.y.saturating_add(3)));
}

fn draw_progress(frame: &mut ratatui::Frame, state: &TuiState) {
    let chunks = screen_layout(frame.area(), 4);
    frame.render_widget(title_bar(), chunks[0]);

    let (done, total) = state.progress;
    let ratio = if total == 0 {
        0.0
    } else {
        (done as f64 / total as f64).clamp(0.0, 1.0)
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(format!(
            "Progress · {} · {}s",
            state.search_state,
            state.started.elapsed().as_secs()
        )))
        .gauge_style(Style::default().fg(Color::Blue))
        .label(format!("{done}/{total} compounds"))
        .ratio(ratio);
    frame.render_widget(gauge, chunks[1]);

    let events: Vec<Line> = state
        .events
        .iter()
        .map(|event| Line::from(Span::raw(event.clone())))
        .collect();
    let log = Paragraph::new(events)
        .block(Block::default().borders(Borders::ALL).title(state.status.clone()))
        .wrap(Wrap { trim: true });
    frame.render_widget(log, chunks[2]);
    frame.render_widget(footer("Esc abort"), chunks[3]);
}

fn draw_outcome(frame: &mut ratatui::Frame, outcome: &SearchOutcome) {
    let chunks = screen_layout(frame.area(), 5);
    frame.render_widget(title_bar(), chunks[0]);

    let results = &outcome.results;
    let mut lines = Vec::new();
    if results.is_empty() {
        lines.push(Line::from(Span::styled(
            "No results found",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
    } else {
        lines.push(Line::from(vec![
            Span::styled("Compounds: ", Style::default().fg(Color::Gray)),
            Span::styled(
                results.len().to_string(),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("   Skipped: ", Style::default().fg(Color::Gray)),
            Span::raw(results.skipped().len().to_string()),
        ]));
    }
    if let Some(path) = &outcome.output_path {
        lines.push(Line::from(vec![
            Span::styled("Saved to: ", Style::default().fg(Color::Gray)),
            Span::styled(path.clone(), Style::default().fg(Color::Cyan)),
        ]));
    }
    lines.push(Line::from(vec![
        Span::styled("Elapsed: ", Style::default().fg(Color::Gray)),
        Span::raw(format_elapsed(Duration::from_millis(outcome.elapsed_ms as u64))),
    ]));
    let summary = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Result"));
    frame.render_widget(summary, chunks[1]);

    let preview: Vec<Line> = results
        .iter()
        .map(|record| {
            Line::from(vec![
                Span::styled(
                    format!("{} ", record.knapsack_id),
                    Style::default().fg(Color::Cyan),
                ),
                Span::raw(record.common_names.first().cloned().unwrap_or_default()),
            ])
        })
        .collect();
    frame.render_widget(
        Paragraph::new(preview).block(Block::default().borders(Borders::ALL).title("Compounds")),
        chunks[2],
    );
    frame.render_widget(footer("press any key to close"), chunks[3]);
}

fn push_event(buffer: &mut VecDeque<String>, item: String) {
    buffer.push_back(item);
    while buffer.len() > EVENTS_MAX {
        buffer.pop_front();
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
