mod export;
mod help;

use crate::cli::{gen_run_id, Cli};
use crate::crew::CrewSettings;
use crate::env::{self, ResolvedEnv};
use crate::model::{FailureKind, ProcessMode, RunConfig, RunEvent, RunResult};
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Terminal,
};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Topic,
    Process,
    Memory,
    Cache,
    MaxRpm,
    OutputDir,
    OutputName,
    Debug,
}

impl FormField {
    const ALL: [FormField; 8] = [
        FormField::Topic,
        FormField::Process,
        FormField::Memory,
        FormField::Cache,
        FormField::MaxRpm,
        FormField::OutputDir,
        FormField::OutputName,
        FormField::Debug,
    ];

    fn label(self) -> &'static str {
        match self {
            FormField::Topic => "Topic",
            FormField::Process => "Process",
            FormField::Memory => "Crew memory",
            FormField::Cache => "Crew cache",
            FormField::MaxRpm => "Max RPM",
            FormField::OutputDir => "Output directory",
            FormField::OutputName => "Output filename",
            FormField::Debug => "Research debug",
        }
    }

    fn is_text(self) -> bool {
        matches!(
            self,
            FormField::Topic | FormField::OutputDir | FormField::OutputName
        )
    }
}

struct UiState {
    tab: usize,
    selected: usize,
    editing: bool,

    topic: String,
    process: ProcessMode,
    memory: bool,
    cache: bool,
    max_rpm: u32,
    output_dir: String,
    output_name: String,
    show_debug: bool,

    running: bool,
    run_started: Option<Instant>,
    info: String,
    last_result: Option<RunResult>,
    preview_scroll: u16,

    // Settings echo, resolved once at startup.
    key_echo: String,
    model_echo: String,
    channels_echo: String,
}

impl UiState {
    fn from_args(args: &Cli, env: &ResolvedEnv) -> Self {
        Self {
            tab: 0,
            selected: 0,
            editing: false,
            topic: args.topic.clone(),
            process: args.process,
            memory: args.memory,
            cache: args.cache,
            max_rpm: args.max_rpm,
            output_dir: args.output_dir.display().to_string(),
            output_name: args.output_name.clone(),
            show_debug: args.show_debug,
            running: false,
            run_started: None,
            info: String::new(),
            last_result: None,
            preview_scroll: 0,
            key_echo: if env.openai_api_key.is_some() {
                let src = env
                    .sources
                    .get(env::KEY_OPENAI_API_KEY)
                    .map(|s| s.as_str())
                    .unwrap_or("default");
                format!("set ({src})")
            } else {
                "missing".to_string()
            },
            model_echo: env.openai_model.clone(),
            channels_echo: env.youtube_channels.clone(),
        }
    }

    /// Fresh immutable snapshot of the current form values.
    fn snapshot(&self, args: &Cli) -> RunConfig {
        RunConfig {
            topic: self.topic.clone(),
            process: self.process,
            memory: self.memory,
            cache: self.cache,
            max_rpm: self.max_rpm,
            output_dir: self.output_dir.clone().into(),
            output_name: self.output_name.clone(),
            show_debug: self.show_debug,
            base_url: args.base_url.clone(),
            request_timeout: Duration::from(args.request_timeout),
            run_id: gen_run_id(),
        }
    }

    fn field(&self) -> FormField {
        FormField::ALL[self.selected]
    }

    fn active_text_mut(&mut self) -> Option<&mut String> {
        match self.field() {
            FormField::Topic => Some(&mut self.topic),
            FormField::OutputDir => Some(&mut self.output_dir),
            FormField::OutputName => Some(&mut self.output_name),
            _ => None,
        }
    }

    /// Left/Right adjustment; also used for Enter on non-text fields.
    fn adjust(&mut self, up: bool) {
        match self.field() {
            FormField::Process => self.process = self.process.toggled(),
            FormField::Memory => self.memory = !self.memory,
            FormField::Cache => self.cache = !self.cache,
            FormField::Debug => self.show_debug = !self.show_debug,
            FormField::MaxRpm => {
                self.max_rpm = if up {
                    (self.max_rpm + 10).min(200)
                } else {
                    self.max_rpm.saturating_sub(10).max(10)
                };
            }
            _ => {}
        }
    }
}

pub async fn run(args: Cli) -> Result<()> {
    // Resolve credentials once; the controller and the settings echo both get
    // the same immutable view.
    let env = env::resolve(args.secrets_file.as_deref());

    // Unbounded channels avoid backpressure between controller and UI.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let settings = CrewSettings {
        base_url: args.base_url.clone(),
        request_timeout: Duration::from(args.request_timeout),
        env: env.clone(),
    };

    // TUI runs in a dedicated thread to keep all blocking I/O out of the
    // Tokio runtime.
    let ui_args = args.clone();
    let ui_handle = std::thread::spawn(move || run_threaded(ui_args, env, event_rx, cmd_tx));

    let res = orchestrator::run_controller(settings, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    args: Cli,
    env: ResolvedEnv,
    mut event_rx: UnboundedReceiver<RunEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState::from_args(&args, &env);

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep the UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if state.editing {
                    handle_edit_key(&mut state, k.code);
                    continue;
                }
                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Tab) => {
                        state.tab = (state.tab + 1) % 2;
                    }
                    (_, KeyCode::Up) if state.tab == 0 => {
                        state.selected = state.selected.checked_sub(1).unwrap_or(0);
                    }
                    (_, KeyCode::Down) if state.tab == 0 => {
                        state.selected = (state.selected + 1).min(FormField::ALL.len() - 1);
                    }
                    (_, KeyCode::Enter) if state.tab == 0 => {
                        if state.field().is_text() {
                            state.editing = true;
                        } else {
                            state.adjust(true);
                        }
                    }
                    (_, KeyCode::Left) if state.tab == 0 => state.adjust(false),
                    (_, KeyCode::Right) if state.tab == 0 => state.adjust(true),
                    (_, KeyCode::Char(' ')) if state.tab == 0 => state.adjust(true),
                    (_, KeyCode::Char('r')) => {
                        if state.running {
                            state.info = "A run is already in progress.".into();
                        } else {
                            let _ = cmd_tx.send(UiCommand::Run(Box::new(state.snapshot(&args))));
                        }
                    }
                    (_, KeyCode::Char('x')) => {
                        if state.running {
                            let _ = cmd_tx.send(UiCommand::Cancel);
                        }
                    }
                    (_, KeyCode::Char('s')) => {
                        if let Some(r) = state.last_result.as_ref() {
                            state.info = export::save_message(
                                r,
                                std::path::Path::new(&state.output_dir),
                                &state.output_name,
                            );
                        } else {
                            state.info = "No completed run to save yet.".into();
                        }
                    }
                    (_, KeyCode::Char('e')) => {
                        if let Some(r) = state.last_result.as_ref() {
                            match export::export_result_markdown(r) {
                                Ok(path) => {
                                    state.info = format!("Exported: {}", path.display());
                                }
                                Err(e) => state.info = format!("Export failed: {e:#}"),
                            }
                        } else {
                            state.info = "No completed run to export yet.".into();
                        }
                    }
                    (_, KeyCode::Char('c')) => {
                        if let Some(r) = state.last_result.as_ref() {
                            match export::copy_to_clipboard(&r.markdown) {
                                Ok(()) => state.info = "Copied post to clipboard.".into(),
                                Err(e) => state.info = format!("Copy failed: {e:#}"),
                            }
                        }
                    }
                    (_, KeyCode::PageUp) => {
                        state.preview_scroll = state.preview_scroll.saturating_sub(5);
                    }
                    (_, KeyCode::PageDown) => {
                        state.preview_scroll = state.preview_scroll.saturating_add(5);
                    }
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    res
}

fn handle_edit_key(state: &mut UiState, code: KeyCode) {
    match code {
        KeyCode::Enter | KeyCode::Esc => state.editing = false,
        KeyCode::Backspace => {
            if let Some(text) = state.active_text_mut() {
                text.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(text) = state.active_text_mut() {
                text.push(c);
            }
        }
        _ => {}
    }
}

fn apply_event(state: &mut UiState, ev: RunEvent) {
    match ev {
        RunEvent::RunStarted { topic } => {
            state.running = true;
            state.run_started = Some(Instant::now());
            state.preview_scroll = 0;
            state.info = format!("Running crew on \"{topic}\"…");
        }
        RunEvent::Status(msg) => {
            state.info = msg;
        }
        RunEvent::RunCompleted { result } => {
            state.running = false;
            state.info = match result.saved_path.as_deref() {
                Some(p) => format!("Done in {:.1}s — saved to {}", result.elapsed_sec, p.display()),
                None => format!("Done in {:.1}s", result.elapsed_sec),
            };
            state.last_result = Some(*result);
        }
        RunEvent::RunFailed { kind, detail } => {
            state.running = false;
            let label = match kind {
                FailureKind::Validation => "Validation error",
                FailureKind::Configuration => "Configuration error",
                FailureKind::Pipeline => "Run failed",
            };
            state.info = format!("{label}: {detail}");
        }
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Run"), Line::from("Help")])
        .select(state.tab)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("crew-blog-cli"),
        )
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_run(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn draw_run(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(44), Constraint::Min(0)].as_ref())
        .split(area);

    draw_form(cols[0], f, state);

    let debug_height = if state.show_debug { 6 } else { 0 };
    let main = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(debug_height),
            ]
            .as_ref(),
        )
        .split(cols[1]);

    draw_status(main[0], f, state);
    draw_preview(main[1], f, state);
    if state.show_debug {
        draw_debug_note(main[2], f);
    }
}

fn draw_form(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(5)].as_ref())
        .split(area);

    let mut lines: Vec<Line> = Vec::new();
    for (i, field) in FormField::ALL.iter().enumerate() {
        let value = match field {
            FormField::Topic => state.topic.clone(),
            FormField::Process => state.process.to_string(),
            FormField::Memory => on_off(state.memory).to_string(),
            FormField::Cache => on_off(state.cache).to_string(),
            FormField::MaxRpm => state.max_rpm.to_string(),
            FormField::OutputDir => state.output_dir.clone(),
            FormField::OutputName => state.output_name.clone(),
            FormField::Debug => on_off(state.show_debug).to_string(),
        };
        let selected = i == state.selected;
        let marker = if selected { "▸ " } else { "  " };
        let value = if selected && state.editing {
            format!("{value}▌")
        } else {
            value
        };
        let value_style = if selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::raw(marker),
            Span::styled(
                format!("{:<17}", field.label()),
                Style::default().fg(Color::Gray),
            ),
            Span::styled(value, value_style),
        ]));
    }
    let form = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Settings"));
    f.render_widget(form, rows[0]);

    let echo = Paragraph::new(vec![
        Line::from(vec![
            Span::styled("api key: ", Style::default().fg(Color::Gray)),
            Span::raw(state.key_echo.clone()),
        ]),
        Line::from(vec![
            Span::styled("model: ", Style::default().fg(Color::Gray)),
            Span::raw(state.model_echo.clone()),
        ]),
        Line::from(vec![
            Span::styled("channels: ", Style::default().fg(Color::Gray)),
            Span::raw(state.channels_echo.clone()),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Secrets used"));
    f.render_widget(echo, rows[1]);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let text = if state.running {
        let secs = state
            .run_started
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0);
        format!("⏳ {} ({secs}s)", state.info)
    } else {
        state.info.clone()
    };
    let status =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, area);
}

fn draw_preview(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    // Raw markdown as wrapped text; no markup execution.
    let body = match state.last_result.as_ref() {
        Some(r) => r.markdown.clone(),
        None => "Press r to run the crew and generate a post.".to_string(),
    };
    let preview = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .scroll((state.preview_scroll, 0))
        .block(Block::default().borders(Borders::ALL).title("Blog Preview"));
    f.render_widget(preview, area);
}

fn draw_debug_note(area: Rect, f: &mut ratatui::Frame) {
    // Intentional placeholder: the crew's result carries only the final post,
    // so there is no structured research data to show here.
    let note = Paragraph::new(
        "No intermediate research output is available: the crew returns only \
         the final post. Returning structured notes from the research task \
         and attaching them to the result would enable this view.",
    )
    .wrap(Wrap { trim: false })
    .style(Style::default().fg(Color::Gray))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Research Debug"),
    );
    f.render_widget(note, area);
}

fn on_off(v: bool) -> &'static str {
    if v {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> UiState {
        UiState {
            tab: 0,
            selected: 0,
            editing: false,
            topic: "AI vs ML".into(),
            process: ProcessMode::Sequential,
            memory: true,
            cache: true,
            max_rpm: 60,
            output_dir: "outputs".into(),
            output_name: "new-blog-post.md".into(),
            show_debug: false,
            running: false,
            run_started: None,
            info: String::new(),
            last_result: None,
            preview_scroll: 0,
            key_echo: "set (env)".into(),
            model_echo: "gpt-4o-mini".into(),
            channels_echo: "@krishnaik06".into(),
        }
    }

    #[test]
    fn rpm_adjustment_stays_in_widget_bounds() {
        let mut state = test_state();
        state.selected = FormField::ALL
            .iter()
            .position(|f| *f == FormField::MaxRpm)
            .expect("field exists");
        state.max_rpm = 190;
        state.adjust(true);
        state.adjust(true);
        assert_eq!(state.max_rpm, 200);
        state.max_rpm = 20;
        state.adjust(false);
        state.adjust(false);
        assert_eq!(state.max_rpm, 10);
    }

    #[test]
    fn failure_events_stop_the_run_and_label_the_kind() {
        let mut state = test_state();
        state.running = true;
        apply_event(
            &mut state,
            RunEvent::RunFailed {
                kind: FailureKind::Validation,
                detail: "Please enter a topic.".into(),
            },
        );
        assert!(!state.running);
        assert!(state.info.starts_with("Validation error:"));
    }

    #[test]
    fn completion_reports_elapsed_at_one_decimal() {
        let mut state = test_state();
        state.running = true;
        apply_event(
            &mut state,
            RunEvent::RunCompleted {
                result: Box::new(RunResult {
                    timestamp_utc: "2025-01-01T00:00:00Z".into(),
                    run_id: "r1".into(),
                    topic: "AI vs ML".into(),
                    markdown: "# Post".into(),
                    elapsed_sec: 61.27,
                    process: ProcessMode::Sequential,
                    memory: true,
                    cache: true,
                    max_rpm: 60,
                    model: "gpt-4o-mini".into(),
                    saved_path: None,
                    meta_path: None,
                }),
            },
        );
        assert!(!state.running);
        assert!(state.info.contains("Done in 61.3s"));
        assert!(state.last_result.is_some());
    }
}
