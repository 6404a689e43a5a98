mod export;
mod help;
mod preview;
mod state;

use crate::backend::BackendClient;
use crate::cli::{build_config, build_store, Cli};
use crate::model::{ImageSlot, WorkflowEvent};
use crate::orchestrator::{self, Envelope};
use crate::storage::ResultStore;
use crate::workflow::{format_score, tier, ScoreTier, Step, WorkflowController};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs, Wrap},
    Terminal,
};
use state::{KeyOutcome, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const STAGES: [&str; 5] = ["Upload", "Detect", "Match", "Process", "Result"];

pub async fn run(args: Cli) -> Result<()> {
    let client = BackendClient::new(&build_config(&args))?;
    let store = build_store(&args);
    let (event_tx, event_rx) = mpsc::unbounded_channel::<WorkflowEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Envelope>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let base_url = client.base_url().to_string();
    let ui_store = store.clone();
    let ui_handle =
        std::thread::spawn(move || run_threaded(base_url, ui_store, event_rx, cmd_tx));

    orchestrator::run_session(WorkflowController::new(client), store, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    match join_res {
        Ok(Ok(res)) => res,
        Ok(Err(_)) => Err(anyhow::anyhow!("TUI thread panicked")),
        Err(e) => Err(anyhow::anyhow!("failed to join TUI thread: {e}")),
    }
}

/// Run the TUI loop on a dedicated thread.
pub fn run_threaded(
    base_url: String,
    store: ResultStore,
    mut event_rx: UnboundedReceiver<WorkflowEvent>,
    cmd_tx: UnboundedSender<Envelope>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let mut state = UiState {
        base_url,
        busy: Some("Connecting…".into()),
        ..Default::default()
    };

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
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
                match state.handle_key(k.modifiers, k.code) {
                    KeyOutcome::Nothing => {}
                    KeyOutcome::Send(command) => {
                        let envelope = Envelope::new(state.revision, command);
                        if cmd_tx.send(envelope).is_err() {
                            break Err(anyhow::anyhow!("workflow session stopped"));
                        }
                    }
                    KeyOutcome::ExportAnnotated => export::save_and_show_path(&mut state, &store),
                    KeyOutcome::Quit => {
                        let _ = cmd_tx.send(Envelope::new(
                            state.revision,
                            orchestrator::SessionCommand::Quit,
                        ));
                        break Ok(());
                    }
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Wizard"), Line::from("Help")])
        .select(state.tab)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("bluree @ {}", state.base_url)),
        )
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_wizard(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn draw_wizard(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1), // breadcrumb
                Constraint::Min(0),    // step view
                Constraint::Length(4), // status
            ]
            .as_ref(),
        )
        .split(area);

    f.render_widget(Paragraph::new(breadcrumb(state.step)), rows[0]);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(state.step.title());
    let inner = block.inner(rows[1]);
    f.render_widget(block, rows[1]);
    match state.step {
        Step::Idle | Step::ImagesUploaded => draw_upload(inner, f, state),
        Step::AwaitingHumanDetectionConfirmation => draw_detection(inner, f, state),
        Step::AwaitingMatchDecision => draw_match(inner, f, state),
        Step::AwaitingProcessChoice => draw_process(inner, f, state),
        Step::ResultReady => draw_result(inner, f, state),
        Step::NoMatchFound => draw_no_match(inner, f),
    }

    draw_status(rows[2], f, state);
}

fn breadcrumb(step: Step) -> Line<'static> {
    let current = step.stage();
    let mut spans = Vec::new();
    for (i, name) in STAGES.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
        }
        let style = if i == current {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else if i < current {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(*name, style));
    }
    Line::from(spans)
}

fn hint(keys: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, (key, what)) in keys.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw("  "));
        }
        spans.push(Span::styled(*key, Style::default().fg(Color::Magenta)));
        spans.push(Span::raw(format!(" {what}")));
    }
    Line::from(spans)
}

/// Bordered image panel; falls back to `placeholder` text.
fn draw_preview(
    area: Rect,
    f: &mut ratatui::Frame,
    title: &str,
    preview: &preview::Preview,
    placeholder: &str,
) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let inner = block.inner(area);
    f.render_widget(block, area);
    let lines = preview.lines(inner.width, inner.height, placeholder);
    f.render_widget(Paragraph::new(lines), inner);
}

/// Split `area` into a text header of `header` rows and the remaining space.
fn split_header(area: Rect, header: u16) -> (Rect, Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(header), Constraint::Min(0)].as_ref())
        .split(area);
    (rows[0], rows[1])
}

fn split_columns(area: Rect) -> (Rect, Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(area);
    (cols[0], cols[1])
}

fn upload_line(state: &UiState, slot: ImageSlot) -> Line<'static> {
    let label = format!("{:<14}", format!("{}:", capitalize(slot.label())));
    if let Some(input) = state.input.as_ref().filter(|i| i.slot == slot) {
        return Line::from(vec![
            Span::styled(label, Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}▏", input.buffer),
                Style::default().fg(Color::Cyan),
            ),
        ]);
    }
    match state.uploaded_name(slot) {
        Some(name) => Line::from(vec![
            Span::styled(label, Style::default().fg(Color::Gray)),
            Span::raw(name.to_string()),
            Span::styled("  uploaded", Style::default().fg(Color::Green)),
        ]),
        None => Line::from(vec![
            Span::styled(label, Style::default().fg(Color::Gray)),
            Span::styled("not uploaded", Style::default().fg(Color::DarkGray)),
        ]),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn draw_upload(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let (header, body) = split_header(area, 4);
    let mut lines = vec![
        upload_line(state, ImageSlot::Scene),
        upload_line(state, ImageSlot::Person),
        Line::from(""),
    ];
    lines.push(if state.input.is_some() {
        hint(&[("enter", "upload"), ("esc", "cancel")])
    } else if state.step == Step::ImagesUploaded {
        hint(&[("s", "scene path"), ("p", "person path"), ("d", "detect figures")])
    } else {
        hint(&[("s", "scene path"), ("p", "person path")])
    });
    f.render_widget(Paragraph::new(lines), header);

    let (left, right) = split_columns(body);
    draw_preview(left, f, "Scene", &state.scene_preview, "No scene image");
    draw_preview(right, f, "Person", &state.person_preview, "No person image");
}

fn draw_detection(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let (header, body) = split_header(area, 2);
    let found = state
        .snapshot
        .as_ref()
        .and_then(|s| s.remaining_candidates)
        .map(|n| format!("{n} figure(s) detected"))
        .unwrap_or_else(|| "Figure count unavailable".into());
    let lines = vec![
        Line::from(found),
        hint(&[("c", "confirm figures"), ("e", "save annotated")]),
    ];
    f.render_widget(Paragraph::new(lines), header);
    draw_preview(
        body,
        f,
        "Detected figures",
        &state.annotated_preview,
        "No annotated image",
    );
}

fn tier_color(tier: ScoreTier) -> Color {
    match tier {
        ScoreTier::High => Color::Green,
        ScoreTier::Mid => Color::Yellow,
        ScoreTier::Low => Color::Red,
        ScoreTier::Default => Color::Gray,
    }
}

fn draw_match(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let (header, body) = split_header(area, 3);
    let snapshot = state.snapshot.as_ref();
    let score_line = match snapshot.and_then(|s| s.similarity_score) {
        Some(score) => {
            let t = tier(score);
            Line::from(vec![
                Span::styled("Similarity: ", Style::default().fg(Color::Gray)),
                Span::styled(
                    format_score(score),
                    Style::default().fg(tier_color(t)).add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("  ({})", t.label())),
            ])
        }
        None => Line::from(Span::styled(
            "Similarity unavailable",
            Style::default().fg(Color::DarkGray),
        )),
    };
    let remaining = snapshot
        .and_then(|s| s.remaining_candidates)
        .map(|n| n.to_string())
        .unwrap_or_else(|| "-".into());
    let lines = vec![
        score_line,
        Line::from(format!("Remaining candidates: {remaining}")),
        hint(&[("a", "accept"), ("x", "reject"), ("e", "save annotated")]),
    ];
    f.render_widget(Paragraph::new(lines), header);

    let (left, right) = split_columns(body);
    draw_preview(left, f, "Candidate", &state.annotated_preview, "No annotated image");
    draw_preview(right, f, "Person", &state.person_preview, "No person image");
}

fn draw_process(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let (header, body) = split_header(area, 2);
    let lines = vec![
        Line::from("Match accepted. Choose how to hide the person."),
        hint(&[("b", "blur"), ("k", "sticker")]),
    ];
    f.render_widget(Paragraph::new(lines), header);
    draw_preview(body, f, "Matched", &state.annotated_preview, "No annotated image");
}

fn draw_result(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines = vec![
        Line::from(Span::styled(
            "The processed image is ready.",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    match state.last_saved.as_ref() {
        Some(path) => lines.push(Line::from(vec![
            Span::styled("Saved to: ", Style::default().fg(Color::Gray)),
            Span::raw(path.display().to_string()),
        ])),
        None => lines.push(Line::from(Span::styled(
            "Not saved yet",
            Style::default().fg(Color::DarkGray),
        ))),
    }
    lines.push(Line::from(""));
    lines.push(hint(&[("s", "save result"), ("n", "new session")]));
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn draw_no_match(area: Rect, f: &mut ratatui::Frame) {
    let lines = vec![
        Line::from(Span::styled(
            "The person is not there!",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        hint(&[("n", "new session")]),
    ];
    f.render_widget(Paragraph::new(lines), area);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines = Vec::new();
    if let Some(action) = state.busy.as_deref() {
        lines.push(Line::from(vec![
            Span::styled("Working… ", Style::default().fg(Color::Yellow)),
            Span::raw(action.to_string()),
        ]));
    }
    if let Some(err) = state.error.as_deref() {
        lines.push(Line::from(Span::styled(
            err.to_string(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    } else if !state.info.is_empty() {
        lines.push(Line::from(Span::raw(state.info.clone())));
    }
    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(p, area);
}
