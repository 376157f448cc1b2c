use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::{Frame, Terminal};
use textwrap::wrap;

use crate::controller::Controller;
use crate::model::{Author, Comment, Meme};
use crate::scroll::{InfiniteScroll, ScrollMetrics};
use crate::session::Session;

const INDENT: &str = "  ";
const COMMENT_INDENT: &str = "    ";

pub struct Options {
    pub controller: Controller,
    pub scroll_offset: u32,
    pub session: Option<Arc<Session>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Browse,
    Compose,
}

type ScrollCallback = Box<dyn FnMut()>;

pub struct Model {
    controller: Controller,
    session: Option<Arc<Session>>,
    scroll: InfiniteScroll<ScrollCallback>,
    scroll_end_rx: Receiver<()>,
    mode: Mode,
    selected: usize,
    scroll_top: u32,
    viewport_height: u32,
    content_height: u32,
    meme_starts: Vec<u32>,
    status_message: String,
    needs_redraw: bool,
}

impl Model {
    pub fn new(options: Options) -> Self {
        let (scroll_end_tx, scroll_end_rx) = unbounded();
        let on_scroll_end: ScrollCallback = Box::new(move || {
            let _ = scroll_end_tx.send(());
        });
        let mut model = Self {
            controller: options.controller,
            session: options.session,
            scroll: InfiniteScroll::new(options.scroll_offset, on_scroll_end),
            scroll_end_rx,
            mode: Mode::Browse,
            selected: 0,
            scroll_top: 0,
            viewport_height: 0,
            content_height: 0,
            meme_starts: Vec::new(),
            status_message: "Loading memes...".to_string(),
            needs_redraw: true,
        };
        model.controller.start();
        model
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        self.scroll.detach();
        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let tick_rate = Duration::from_millis(120);
        let mut last_tick = Instant::now();

        loop {
            if self.controller.poll() {
                self.after_update();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key.code) {
                        break;
                    }
                }
            }

            self.drain_scroll_end();

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.controller.is_busy() {
                    self.needs_redraw = true;
                }
            }
        }

        Ok(())
    }

    fn after_update(&mut self) {
        if let Some(message) = self.controller.status_message() {
            self.status_message = message.to_string();
        } else if !self.controller.memes().is_empty() {
            self.status_message = format!("{} memes loaded.", self.controller.memes().len());
        }
        if self.controller.auth_lost() {
            let signed_in = self
                .session
                .as_ref()
                .map(|session| session.is_authenticated())
                .unwrap_or(false);
            if !signed_in {
                self.status_message =
                    "Session expired. Restart with --token <jwt> to sign in again.".to_string();
            }
        }
        self.needs_redraw = true;
    }

    fn drain_scroll_end(&mut self) {
        let mut advanced = false;
        while self.scroll_end_rx.try_recv().is_ok() {
            if self.controller.advance_page() {
                advanced = true;
            }
        }
        if advanced {
            self.status_message = format!("Loading page {}...", self.controller.state().page());
            self.needs_redraw = true;
        }
    }

    /// Returns true when the app should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        self.needs_redraw = true;
        if self.mode == Mode::Compose {
            self.handle_compose_key(code);
            return false;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('j') | KeyCode::Down => self.scroll_by(1),
            KeyCode::Char('k') | KeyCode::Up => self.scroll_by(-1),
            KeyCode::PageDown | KeyCode::Char(' ') => {
                self.scroll_by(self.viewport_height.max(1) as i64)
            }
            KeyCode::PageUp => self.scroll_by(-(self.viewport_height.max(1) as i64)),
            KeyCode::Char('n') | KeyCode::Char('J') => self.select(self.selected as i64 + 1),
            KeyCode::Char('p') | KeyCode::Char('K') => self.select(self.selected as i64 - 1),
            KeyCode::Enter | KeyCode::Char('c') => {
                if let Some(id) = self.selected_id() {
                    self.controller.toggle_section(&id);
                }
            }
            KeyCode::Char('m') => {
                if let Some(id) = self.selected_id() {
                    self.controller.load_more_comments(&id);
                }
            }
            KeyCode::Char('i') => {
                if let Some(id) = self.selected_id() {
                    if !self.controller.state().is_open(&id) {
                        self.controller.toggle_section(&id);
                    }
                    self.mode = Mode::Compose;
                    self.status_message =
                        "Type your comment. Enter to post, Esc to stop editing.".to_string();
                }
            }
            _ => {}
        }
        false
    }

    fn handle_compose_key(&mut self, code: KeyCode) {
        let Some(id) = self.selected_id() else {
            self.mode = Mode::Browse;
            return;
        };
        match code {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                self.status_message.clear();
            }
            KeyCode::Enter => {
                self.controller.submit_comment(&id);
                self.status_message = "Posting comment...".to_string();
            }
            KeyCode::Backspace => {
                let mut draft = self.controller.draft(&id).to_string();
                draft.pop();
                self.controller.change_draft(&id, draft);
            }
            KeyCode::Char(ch) => {
                let mut draft = self.controller.draft(&id).to_string();
                draft.push(ch);
                self.controller.change_draft(&id, draft);
            }
            _ => {}
        }
    }

    fn selected_id(&self) -> Option<String> {
        self.controller
            .memes()
            .get(self.selected)
            .map(|meme| meme.id.clone())
    }

    fn select(&mut self, index: i64) {
        let count = self.controller.memes().len();
        if count == 0 {
            return;
        }
        self.selected = index.clamp(0, count as i64 - 1) as usize;
        if let Some(start) = self.meme_starts.get(self.selected).copied() {
            self.scroll_to(start);
        }
    }

    fn scroll_by(&mut self, delta: i64) {
        let target = (self.scroll_top as i64 + delta).max(0) as u32;
        self.scroll_to(target);
        if let Some(index) = self
            .meme_starts
            .iter()
            .rposition(|start| *start <= self.scroll_top)
        {
            self.selected = index;
        }
    }

    fn scroll_to(&mut self, line: u32) {
        let max_top = self.content_height.saturating_sub(self.viewport_height);
        self.scroll_top = line.min(max_top);
        self.scroll.on_scroll(ScrollMetrics {
            scroll_top: self.scroll_top,
            scroll_height: self.content_height,
            client_height: self.viewport_height,
        });
    }

    fn draw(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(1), Constraint::Length(1)])
            .split(frame.size());

        let feed_area = chunks[0];
        let width = feed_area.width.saturating_sub(2).max(10) as usize;
        let lines = self.feed_lines(width);
        self.content_height = lines.len() as u32;
        self.viewport_height = feed_area.height.saturating_sub(2) as u32;
        if !self.scroll.is_attached() && self.viewport_height > 0 {
            self.scroll.attach();
        }
        let max_top = self.content_height.saturating_sub(self.viewport_height);
        self.scroll_top = self.scroll_top.min(max_top);

        let title = match self.controller.state().is_exhausted() {
            true => " meme-feed · end of feed ".to_string(),
            false => format!(" meme-feed · page {} ", self.controller.state().page()),
        };
        let feed = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title))
            .scroll((self.scroll_top.min(u16::MAX as u32) as u16, 0));
        frame.render_widget(feed, feed_area);

        let busy = if self.controller.is_busy() { "⟳ " } else { "" };
        let status = Paragraph::new(format!("{busy}{}", self.status_message))
            .style(Style::default().fg(Color::Yellow));
        frame.render_widget(status, chunks[1]);

        let help = match self.mode {
            Mode::Browse => {
                "j/k scroll · n/p next/prev meme · Enter comments · m more · i write · q quit"
            }
            Mode::Compose => "typing comment · Enter post · Backspace delete · Esc done",
        };
        frame.render_widget(
            Paragraph::new(help).style(Style::default().fg(Color::DarkGray)),
            chunks[2],
        );
    }

    fn feed_lines(&mut self, width: usize) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        let mut starts = Vec::new();
        let state = self.controller.state();

        if state.memes().is_empty() {
            lines.push(Line::from(if state.is_loading_feed() {
                "Loading memes..."
            } else {
                "No memes yet."
            }));
        }

        for (index, meme) in state.memes().iter().enumerate() {
            starts.push(lines.len() as u32);
            let selected = index == self.selected;
            let open = state.is_open(&meme.id);
            push_meme(&mut lines, meme, selected, open, width);
            if open {
                let composing = selected && self.mode == Mode::Compose;
                push_comment_section(
                    &mut lines,
                    state.draft(&meme.id),
                    state.comments(&meme.id),
                    state.is_loading_comments(&meme.id),
                    composing,
                    width,
                );
            }
            lines.push(Line::from(Span::styled(
                "─".repeat(width),
                Style::default().fg(Color::DarkGray),
            )));
        }

        if state.is_loading_feed() && !state.memes().is_empty() {
            lines.push(Line::from("Loading more memes..."));
        }

        self.meme_starts = starts;
        lines
    }
}

fn push_meme(lines: &mut Vec<Line<'static>>, meme: &Meme, selected: bool, open: bool, width: usize) {
    let marker = if selected { "▌ " } else { "  " };
    let name_style = if selected {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    };
    lines.push(Line::from(vec![
        Span::raw(marker),
        Span::styled(author_name(meme.author.as_ref()), name_style),
        Span::styled(
            format!(" · {}", format_age(meme.created_at())),
            Style::default().fg(Color::DarkGray),
        ),
    ]));

    if !meme.texts.is_empty() {
        let captions = meme
            .texts
            .iter()
            .map(|caption| format!("“{}”", caption.content))
            .collect::<Vec<_>>()
            .join("  ");
        push_wrapped(lines, &captions, INDENT, width, Style::default().fg(Color::Magenta));
    }
    push_wrapped(lines, &meme.description, INDENT, width, Style::default());
    if !meme.picture_url.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("{INDENT}{}", meme.picture_url),
            Style::default().fg(Color::Blue),
        )));
    }
    let caret = if open { "▴" } else { "▾" };
    lines.push(Line::from(Span::styled(
        format!("{INDENT}{} comments {caret}", meme.comments_count),
        Style::default().fg(Color::Green),
    )));
}

fn push_comment_section(
    lines: &mut Vec<Line<'static>>,
    draft: &str,
    comments: &[Comment],
    loading: bool,
    composing: bool,
    width: usize,
) {
    let cursor = if composing { "▏" } else { "" };
    let prompt = if draft.is_empty() && !composing {
        "Type your comment here... (i)".to_string()
    } else {
        format!("{draft}{cursor}")
    };
    let prompt_style = if composing {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    lines.push(Line::from(vec![
        Span::raw(COMMENT_INDENT),
        Span::styled("> ", Style::default().fg(Color::Cyan)),
        Span::styled(prompt, prompt_style),
    ]));

    for comment in comments {
        lines.push(Line::from(vec![
            Span::raw(COMMENT_INDENT),
            Span::styled(
                author_name(comment.author.as_ref()),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" · {}", format_age(comment.created_at())),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        push_wrapped(lines, &comment.content, COMMENT_INDENT, width, Style::default());
    }

    let footer = if loading {
        "Loading comments..."
    } else {
        "[m] Load more comments"
    };
    lines.push(Line::from(Span::styled(
        format!("{COMMENT_INDENT}{footer}"),
        Style::default().fg(Color::Blue),
    )));
}

fn push_wrapped(
    lines: &mut Vec<Line<'static>>,
    text: &str,
    indent: &str,
    width: usize,
    style: Style,
) {
    if text.trim().is_empty() {
        return;
    }
    let available = width.saturating_sub(indent.len()).max(8);
    for row in wrap(text, available) {
        lines.push(Line::from(Span::styled(format!("{indent}{row}"), style)));
    }
}

fn author_name(author: Option<&Author>) -> String {
    author
        .map(|author| author.username.clone())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn format_age(created_at: Option<DateTime<Utc>>) -> String {
    let Some(created_at) = created_at else {
        return String::new();
    };
    let seconds = (Utc::now() - created_at).num_seconds();
    match seconds {
        s if s < 60 => "just now".to_string(),
        s if s < 60 * 60 => format!("{}m ago", s / 60),
        s if s < 60 * 60 * 24 => format!("{}h ago", s / 3600),
        s if s < 60 * 60 * 24 * 30 => format!("{}d ago", s / 86_400),
        s if s < 60 * 60 * 24 * 365 => format!("{}mo ago", s / (86_400 * 30)),
        s => format!("{}y ago", s / (86_400 * 365)),
    }
}
