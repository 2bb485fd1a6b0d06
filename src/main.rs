mod logging;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures::StreamExt;
use rag::{
    AssistantsApi, CancelToken, ChatTurn, Config as RagConfig, OpenAiClient, Role, Session,
    SessionSettings, SessionStatus, collect_documents,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap};
use tokio::sync::mpsc;

const EXAMPLE_QUESTIONS: [&str; 5] = [
    "What's our Q4 revenue according to the financial reports?",
    "Summarize the key points from the strategy document",
    "What are the main risks mentioned in our risk assessment?",
    "Find all mentions of budget allocations",
    "What does the CSV data show about our customer demographics?",
];

#[tokio::main]
async fn main() -> io::Result<()> {
    let rag_cfg = Arc::new(RagConfig::from_env());
    let _log_guard = logging::init(&rag_cfg.log_dir);
    let preselected: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(rag_cfg, preselected);
    let (tx, mut rx) = mpsc::unbounded_channel::<Response>();
    let res = run_app(&mut terminal, &mut app, tx, &mut rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.shutdown(&mut rx).await;
    res
}

struct App {
    rag_cfg: Arc<RagConfig>,
    api: Option<Arc<dyn AssistantsApi>>,
    /// `None` while a background task owns the session.
    session: Option<Session>,
    transcript: Vec<ChatTurn>,
    pending_prompt: Option<String>,
    status: SessionStatus,
    selected: Vec<PathBuf>,
    notice: Option<Notice>,
    input: String,
    cursor: usize,
    input_mode: InputMode,
    chat_scroll: usize,
    chat_content_len: usize,
    chat_view_height: usize,
    chat_auto_scroll: bool,
    busy: Option<Action>,
    cancel: Option<CancelToken>,
    spinner_idx: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputMode {
    ApiKey,
    Chat,
    Files,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Action {
    Setup,
    Turn,
    Clear,
}

enum Notice {
    Info(String),
    Error(String),
}

struct Response {
    action: Action,
    session: Session,
    result: rag::Result<()>,
}

impl App {
    fn new(rag_cfg: Arc<RagConfig>, selected: Vec<PathBuf>) -> Self {
        let session = Session::new(SessionSettings::from_config(&rag_cfg));
        let mut app = Self {
            rag_cfg,
            api: None,
            status: session.status(),
            session: Some(session),
            transcript: Vec::new(),
            pending_prompt: None,
            selected,
            notice: None,
            input: String::new(),
            cursor: 0,
            input_mode: InputMode::ApiKey,
            chat_scroll: 0,
            chat_content_len: 0,
            chat_view_height: 0,
            chat_auto_scroll: false,
            busy: None,
            cancel: None,
            spinner_idx: 0,
        };
        if app.rag_cfg.api_key.is_some() {
            app.connect((*app.rag_cfg).clone());
        } else {
            app.notice = Some(Notice::Info(
                "Please enter your OpenAI API key to continue.".to_string(),
            ));
        }
        app
    }

    fn connect(&mut self, cfg: RagConfig) {
        // The blocking client starts its own runtime; keep that off the async worker.
        match tokio::task::block_in_place(|| OpenAiClient::from_config(&cfg)) {
            Ok(client) => {
                self.api = Some(Arc::new(client));
                self.rag_cfg = Arc::new(cfg);
                self.input_mode = if self.selected.is_empty() {
                    InputMode::Files
                } else {
                    InputMode::Chat
                };
                self.notice = Some(Notice::Info(
                    "Add documents, then press F2 to set up the RAG system.".to_string(),
                ));
            }
            Err(err) => {
                tracing::error!(error = %err, "client initialization failed");
                self.notice = Some(Notice::Error(format!(
                    "Error initializing OpenAI client: {}",
                    err
                )));
            }
        }
    }

    fn insert_char(&mut self, c: char) {
        let at = byte_offset(&self.input, self.cursor);
        self.input.insert(at, c);
        self.cursor += 1;
    }

    fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = byte_offset(&self.input, self.cursor);
        self.input.remove(at);
    }

    fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    fn move_right(&mut self) {
        if self.cursor < self.input.chars().count() {
            self.cursor += 1;
        }
    }

    fn take_input(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.input).trim().to_string()
    }

    fn toggle_mode(&mut self) {
        self.input_mode = match self.input_mode {
            InputMode::ApiKey => return,
            InputMode::Chat => InputMode::Files,
            InputMode::Files => InputMode::Chat,
        };
        self.input.clear();
        self.cursor = 0;
    }

    fn submit(&mut self, tx: mpsc::UnboundedSender<Response>) {
        if self.input.trim().is_empty() {
            return;
        }
        match self.input_mode {
            InputMode::ApiKey => {
                let key = self.take_input();
                self.connect((*self.rag_cfg).clone().with_api_key(key));
            }
            InputMode::Files => {
                let path = PathBuf::from(self.take_input());
                if !path.exists() {
                    self.notice = Some(Notice::Error(format!("No such file: {}", path.display())));
                } else if !self.selected.contains(&path) {
                    self.notice = Some(Notice::Info(format!("Selected {}", path.display())));
                    self.selected.push(path);
                }
            }
            InputMode::Chat => {
                if self.busy.is_some() {
                    return;
                }
                if !self.status.is_ready() {
                    self.notice = Some(Notice::Info(
                        "Upload your documents and press F2 to set up the RAG system first."
                            .to_string(),
                    ));
                    return;
                }
                let prompt = self.take_input();
                self.pending_prompt = Some(prompt.clone());
                self.chat_auto_scroll = true;
                self.dispatch(Action::Turn, tx, move |session, api, cancel| {
                    session.submit_turn(api, &prompt, cancel).map(|_| ())
                });
            }
        }
    }

    fn setup_now(&mut self, tx: mpsc::UnboundedSender<Response>) {
        if self.busy.is_some() || self.api.is_none() {
            return;
        }
        if self.selected.is_empty() {
            self.notice = Some(Notice::Error("Choose files (PDF, CSV, TXT) first.".to_string()));
            self.input_mode = InputMode::Files;
            return;
        }
        let paths = self.selected.clone();
        let exts = self.rag_cfg.accepted_exts.clone();
        self.notice = Some(Notice::Info(
            "Creating vector store and uploading files...".to_string(),
        ));
        self.dispatch(Action::Setup, tx, move |session, api, cancel| {
            let docs = collect_documents(&paths, &exts)?;
            session.setup(api, docs, cancel)
        });
    }

    fn clear_chat(&mut self, tx: mpsc::UnboundedSender<Response>) {
        if self.busy.is_some() || !self.status.assistant_ready {
            return;
        }
        self.dispatch(Action::Clear, tx, |session, api, _| session.clear_chat(api));
    }

    fn dispatch<F>(&mut self, action: Action, tx: mpsc::UnboundedSender<Response>, work: F)
    where
        F: FnOnce(&mut Session, &dyn AssistantsApi, &CancelToken) -> rag::Result<()> + Send + 'static,
    {
        let Some(api) = self.api.clone() else {
            return;
        };
        let Some(mut session) = self.session.take() else {
            return;
        };
        let cancel = CancelToken::new();
        self.cancel = Some(cancel.clone());
        self.busy = Some(action);
        tokio::task::spawn_blocking(move || {
            let result = work(&mut session, api.as_ref(), &cancel);
            let _ = tx.send(Response {
                action,
                session,
                result,
            });
        });
    }

    fn cancel_running(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
            self.notice = Some(Notice::Info("Cancelling...".to_string()));
        }
    }

    fn finish(&mut self, response: Response) {
        let Response {
            action,
            session,
            result,
        } = response;
        self.transcript = session.history().to_vec();
        self.status = session.status();
        self.session = Some(session);
        self.pending_prompt = None;
        self.busy = None;
        self.cancel = None;
        self.chat_auto_scroll = true;

        self.notice = match (action, result) {
            (Action::Setup, Ok(())) => {
                self.input_mode = InputMode::Chat;
                Some(Notice::Info(format!(
                    "RAG System Ready! Files uploaded: {}",
                    self.status.files_uploaded
                )))
            }
            (Action::Setup, Err(err)) => Some(Notice::Error(format!("Setup failed: {}", err))),
            (Action::Turn, Ok(())) => None,
            (Action::Turn, Err(err)) => Some(Notice::Error(format!(
                "Failed to get response from assistant: {}",
                err
            ))),
            (Action::Clear, Ok(())) => Some(Notice::Info("Chat cleared.".to_string())),
            (Action::Clear, Err(err)) => Some(Notice::Error(format!(
                "Failed to create conversation thread: {}",
                err
            ))),
        };
    }

    /// Deletes remote objects on exit when teardown is enabled.
    async fn shutdown(&mut self, rx: &mut mpsc::UnboundedReceiver<Response>) {
        if !self.rag_cfg.teardown {
            return;
        }
        self.reclaim_session(rx).await;
        let (Some(api), Some(mut session)) = (self.api.clone(), self.session.take()) else {
            return;
        };
        let _ = tokio::task::spawn_blocking(move || session.teardown(api.as_ref())).await;
    }

    /// Cancels any in-flight task and waits for it to hand the session back.
    async fn reclaim_session(&mut self, rx: &mut mpsc::UnboundedReceiver<Response>) {
        if self.session.is_some() || self.busy.is_none() {
            return;
        }
        self.cancel_running();
        tracing::info!("waiting for the running task before teardown");
        if let Some(response) = rx.recv().await {
            self.finish(response);
        }
    }

    fn scroll_up(&mut self, by: usize) {
        self.chat_scroll = self.chat_scroll.saturating_sub(by);
    }

    fn scroll_down(&mut self, by: usize) {
        let max_scroll = self.chat_content_len.saturating_sub(self.chat_view_height);
        self.chat_scroll = (self.chat_scroll + by).min(max_scroll);
    }

    fn scroll_to_end(&mut self) {
        self.chat_scroll = self.chat_content_len.saturating_sub(self.chat_view_height);
    }
}

fn byte_offset(input: &str, char_idx: usize) -> usize {
    input
        .char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(input.len())
}

fn inner_width(area: ratatui::layout::Rect) -> usize {
    area.width.saturating_sub(2) as usize
}

fn inner_height(area: ratatui::layout::Rect) -> usize {
    area.height.saturating_sub(2) as usize
}

fn view_start(len: usize, cursor: usize, max_width: usize) -> usize {
    if len <= max_width {
        return 0;
    }
    let cursor = cursor.min(len);
    let start = cursor.saturating_sub(max_width / 2);
    start.min(len - max_width)
}

fn truncate_input(input: &str, cursor: usize, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    let len = input.chars().count();
    let start = view_start(len, cursor, max_width);
    input.chars().skip(start).take(max_width).collect()
}

fn cursor_x_in_view(input: &str, cursor: usize, max_width: usize) -> usize {
    if max_width == 0 {
        return 0;
    }
    let len = input.chars().count();
    let start = view_start(len, cursor, max_width);
    cursor.min(len).saturating_sub(start).min(max_width)
}

fn ready_line(label: &str, ready: bool, ok: &str, missing: &str) -> Line<'static> {
    let (mark, text, color) = if ready {
        ("✅", ok, Color::Green)
    } else {
        ("❌", missing, Color::Red)
    };
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().add_modifier(Modifier::BOLD)),
        Span::styled(format!("{} {}", mark, text), Style::default().fg(color)),
    ])
}

fn chat_text(app: &App) -> Text<'static> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    if !app.status.is_ready() && app.transcript.is_empty() {
        lines.push(Line::from("Upload your company documents and start chatting with your data!"));
        lines.push(Line::from(""));
        lines.push(Line::styled(
            "Example questions you can ask:",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        for q in EXAMPLE_QUESTIONS {
            lines.push(Line::from(format!("  - \"{}\"", q)));
        }
        return Text::from(lines);
    }

    let turns = app
        .transcript
        .iter()
        .map(|t| (t.role, t.text.as_str()))
        .chain(app.pending_prompt.as_deref().map(|p| (Role::User, p)));
    for (role, text) in turns {
        let (label, color) = match role {
            Role::User => ("You", Color::Blue),
            Role::Assistant => ("Assistant", Color::Magenta),
        };
        lines.push(Line::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ));
        for line in text.lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::from(""));
    }
    if app.busy == Some(Action::Turn) {
        lines.push(Line::styled("Thinking...", Style::default().fg(Color::DarkGray)));
    }
    Text::from(lines)
}

fn sidebar_text(app: &App) -> Text<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = vec![Line::styled(format!("Documents ({})", app.selected.len()), bold)];
    if app.selected.is_empty() {
        lines.push(Line::from("  (none selected)"));
    }
    for path in &app.selected {
        lines.push(Line::from(format!("  - {}", path.display())));
    }

    lines.push(Line::from(""));
    lines.push(Line::styled("Status", bold));
    lines.push(ready_line("Assistant", app.status.assistant_ready, "Ready", "Not setup"));
    lines.push(ready_line("Thread", app.status.conversation_ready, "Active", "Not created"));
    lines.push(ready_line("Vector Store", app.status.index_ready, "Ready", "Not setup"));
    if app.status.index_ready {
        lines.push(Line::from(format!("Files uploaded: {}", app.status.files_uploaded)));
    }

    if let Some(notice) = &app.notice {
        lines.push(Line::from(""));
        let (text, color) = match notice {
            Notice::Info(text) => (text.clone(), Color::Blue),
            Notice::Error(text) => (text.clone(), Color::Red),
        };
        lines.push(Line::styled(text, Style::default().fg(color)));
    }

    lines.push(Line::from(""));
    lines.push(Line::styled(
        "Note: this uses OpenAI's API. Your documents will be processed by OpenAI.",
        Style::default().fg(Color::DarkGray),
    ));
    Text::from(lines)
}

fn draw_ui(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    let spinner = ["|", "/", "-", "\\"];

    terminal.draw(|frame| {
        let title_style = Style::default().fg(Color::Black).add_modifier(Modifier::BOLD);
        let info_border = Style::default().fg(Color::Black);
        let input_border = Style::default().fg(Color::DarkGray);
        let help_border = Style::default().fg(Color::DarkGray);
        let help_text_style = Style::default().fg(Color::DarkGray);
        let input_text_style = Style::default().fg(Color::DarkGray);

        let area = frame.area();
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(32), Constraint::Percentage(68)])
            .split(area);
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(8),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(columns[1]);

        let sidebar = Paragraph::new(sidebar_text(app))
            .wrap(Wrap { trim: true })
            .block(
                Block::bordered()
                    .title("Setup")
                    .title_style(title_style)
                    .border_style(info_border),
            );
        frame.render_widget(sidebar, columns[0]);

        let chat_title = match app.busy {
            Some(action) => {
                let label = match action {
                    Action::Setup => "setting up",
                    Action::Turn => "thinking",
                    Action::Clear => "clearing",
                };
                format!("Chat with your documents {} {}", spinner[app.spinner_idx], label)
            }
            None => "Chat with your documents".to_string(),
        };
        let chat_block = Block::bordered()
            .title(chat_title)
            .title_style(title_style)
            .border_style(info_border);

        let text = chat_text(app);
        app.chat_content_len = text.lines.len().max(1);
        app.chat_view_height = inner_height(chunks[0]);
        let max_scroll = app.chat_content_len.saturating_sub(app.chat_view_height);
        if app.chat_auto_scroll {
            app.chat_scroll = max_scroll;
            app.chat_auto_scroll = false;
        } else if app.chat_scroll > max_scroll {
            app.chat_scroll = max_scroll;
        }

        let chat = Paragraph::new(text)
            .scroll((app.chat_scroll as u16, 0))
            .wrap(Wrap { trim: false })
            .block(chat_block);
        frame.render_widget(chat, chunks[0]);

        let mut chat_scrollbar = ScrollbarState::new(app.chat_content_len).position(app.chat_scroll);
        let chat_scrollbar_widget = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .track_style(Style::default().fg(Color::DarkGray))
            .thumb_style(Style::default().fg(Color::Blue));
        frame.render_stateful_widget(
            chat_scrollbar_widget,
            chunks[0].inner(Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut chat_scrollbar,
        );

        let input_title = match app.input_mode {
            InputMode::ApiKey => "OpenAI API Key",
            InputMode::Chat => "Ask a question about your documents...",
            InputMode::Files => "Add file or directory (PDF, CSV, TXT, MD, DOCX)",
        };
        let input_block = Block::bordered()
            .title(input_title)
            .title_style(title_style)
            .border_style(input_border);
        let shown = match app.input_mode {
            InputMode::ApiKey => "*".repeat(app.input.chars().count()),
            _ => app.input.clone(),
        };
        let input_view = truncate_input(&shown, app.cursor, inner_width(chunks[1]));
        let input = Paragraph::new(input_view)
            .style(input_text_style)
            .block(input_block)
            .wrap(Wrap { trim: false });
        frame.render_widget(input, chunks[1]);

        let cursor_x = cursor_x_in_view(&shown, app.cursor, inner_width(chunks[1]));
        let x = chunks[1].x + 1 + cursor_x as u16;
        let y = chunks[1].y + 1;
        frame.set_cursor_position((x, y));

        let help_block = Block::bordered()
            .title("Controls")
            .title_style(title_style)
            .border_style(help_border);
        let help_text = match (app.input_mode, app.busy.is_some()) {
            (_, true) => "Esc: Cancel | Up/Down/PgUp/PgDn/End: Scroll | Ctrl+C: Quit",
            (InputMode::ApiKey, false) => "Enter: Save key | Esc/Ctrl+C: Quit",
            (InputMode::Files, false) => {
                "Enter: Add path | Ctrl+X: Clear selection | F2/Ctrl+R: Setup | Tab: Chat | Esc/Ctrl+C: Quit"
            }
            (InputMode::Chat, false) => {
                "Enter: Send | F2/Ctrl+R: Setup | Ctrl+L: Clear chat | Tab: Files | Up/Down/PgUp/PgDn/End: Scroll | Esc/Ctrl+C: Quit"
            }
        };
        let help = Paragraph::new(help_text)
            .style(help_text_style)
            .wrap(Wrap { trim: true })
            .block(help_block);
        frame.render_widget(help, chunks[2]);
    })?;

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    tx: mpsc::UnboundedSender<Response>,
    rx: &mut mpsc::UnboundedReceiver<Response>,
) -> io::Result<()> {
    let mut events = EventStream::new();
    let mut spinner_tick = tokio::time::interval(Duration::from_millis(100));
    spinner_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    draw_ui(terminal, app)?;

    loop {
        tokio::select! {
            _ = spinner_tick.tick() => {
                if app.busy.is_some() {
                    app.spinner_idx = (app.spinner_idx + 1) % 4;
                    draw_ui(terminal, app)?;
                }
            }
            maybe_result = rx.recv() => {
                if let Some(response) = maybe_result {
                    app.finish(response);
                    draw_ui(terminal, app)?;
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
                        match key.code {
                            KeyCode::Char('c') if ctrl => {
                                app.cancel_running();
                                return Ok(());
                            }
                            KeyCode::Esc if app.busy.is_some() => app.cancel_running(),
                            KeyCode::Esc => return Ok(()),
                            KeyCode::Char('r') if ctrl => app.setup_now(tx.clone()),
                            KeyCode::F(2) => app.setup_now(tx.clone()),
                            KeyCode::Char('l') if ctrl => app.clear_chat(tx.clone()),
                            KeyCode::Char('x') if ctrl && app.busy.is_none() => {
                                app.selected.clear();
                            }
                            KeyCode::Enter => app.submit(tx.clone()),
                            KeyCode::Up => app.scroll_up(1),
                            KeyCode::Down => app.scroll_down(1),
                            KeyCode::PageUp => app.scroll_up(app.chat_view_height.max(1)),
                            KeyCode::PageDown => app.scroll_down(app.chat_view_height.max(1)),
                            KeyCode::Home => app.chat_scroll = 0,
                            KeyCode::End => app.scroll_to_end(),
                            KeyCode::Tab => app.toggle_mode(),
                            KeyCode::Left => app.move_left(),
                            KeyCode::Right => app.move_right(),
                            KeyCode::Backspace => app.delete_char(),
                            KeyCode::Char(ch) if !ctrl => app.insert_char(ch),
                            _ => {}
                        }
                        draw_ui(terminal, app)?;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => {}
                    None => return Ok(()),
                }
            }
        }
    }
}
