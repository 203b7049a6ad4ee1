/// QuantVision Dashboard - terminal host
///
/// - Live snapshot feed from the vision backend (`/ws/vision`)
/// - Strategy panel fed by `/analyze_snapshot`
/// - `C` arms screen calibration: press, drag and release the mouse to
///   select the capture region, which is posted to `/calibrate`
use std::{error::Error, io, sync::Arc, time::Duration};

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use quantvision_dashboard::{
    render_calibration_overlay, render_raw_feed, render_status_bar, render_strategy,
    submit_calibration, BackendClient, CalibrationEndpoint, CalibrationOutcome, CalibrationRect,
    CalibrationPhase, CalibrationSession, DashboardConfig, DashboardDisplay, DisplaySink, DisplayState,
    SnapshotChannel, SnapshotChannelConfig, SnapshotPipeline, TerminalOverlay,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    Frame, Terminal,
};
use rustls::crypto::ring::default_provider;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const TICK_RATE: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Logs go to a file, stdout belongs to the terminal UI
    init_logging()?;
    let _ = default_provider().install_default();

    let config = DashboardConfig::from_env();
    info!("Starting QuantVision dashboard against {}", config.backend_url);

    let client = Arc::new(BackendClient::new(&config)?);
    let display = DashboardDisplay::new();

    let pipeline = SnapshotPipeline::new(
        client.clone(),
        Arc::new(display.clone()),
        config.signal_policy,
    );
    let channel = SnapshotChannel::new(SnapshotChannelConfig::from_dashboard(&config)?, pipeline);
    let (_channel_task, _channel_state) = channel.start();

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &config, display, client).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = &res {
        error!("Dashboard exited with error: {}", e);
    }
    res?;

    info!("QuantVision dashboard stopped");
    Ok(())
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    config: &DashboardConfig,
    display: DashboardDisplay,
    endpoint: Arc<dyn CalibrationEndpoint>,
) -> io::Result<()> {
    let mut session = CalibrationSession::new(TerminalOverlay::new(config.cell_px));
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<CalibrationOutcome>();
    let mut quit_requested = false;

    loop {
        // Settle finished calibration submissions
        while let Ok(outcome) = outcome_rx.try_recv() {
            let notice = session.complete_submission(&outcome);
            display.render_notice(&notice);
        }

        if quit_requested && ready_to_quit(&session) {
            return Ok(());
        }

        let state = display.snapshot();
        terminal.draw(|f| ui(f, &state, &session, config.notice_ttl))?;

        // Yield so spawned network tasks make progress between frames
        tokio::task::yield_now().await;

        if !event::poll(TICK_RATE)? {
            continue;
        }

        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if handle_key(&mut session, key.code) == KeyAction::Quit {
                    quit_requested = true;
                }
            }
            Event::Mouse(mouse) => {
                if let Some(rect) = handle_mouse(&mut session, mouse) {
                    let endpoint = Arc::clone(&endpoint);
                    let outcome_tx = outcome_tx.clone();
                    tokio::spawn(async move {
                        let outcome = submit_calibration(endpoint.as_ref(), rect).await;
                        let _ = outcome_tx.send(outcome);
                    });
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyAction {
    None,
    Quit,
}

/// Route a key press. Esc only cancels an armed or dragging calibration; a
/// quit request is honoured once no submission is pending.
fn handle_key(session: &mut CalibrationSession<TerminalOverlay>, code: KeyCode) -> KeyAction {
    match code {
        KeyCode::Char('q') | KeyCode::Char('Q') => {
            if session.phase() == CalibrationPhase::Submitting {
                info!("Quit requested, waiting for calibration submission to settle");
            }
            KeyAction::Quit
        }
        KeyCode::Esc => {
            session.abort();
            KeyAction::None
        }
        KeyCode::Char('c') | KeyCode::Char('C') => {
            session.start();
            KeyAction::None
        }
        _ => KeyAction::None,
    }
}

fn ready_to_quit(session: &CalibrationSession<TerminalOverlay>) -> bool {
    session.phase() != CalibrationPhase::Submitting
}

/// Route a mouse event to the calibration session. Returns the rectangle to
/// submit once the drag is released.
fn handle_mouse(
    session: &mut CalibrationSession<TerminalOverlay>,
    mouse: MouseEvent,
) -> Option<CalibrationRect> {
    let overlay = session.surface();
    let (mounted, dragging) = (overlay.is_mounted(), overlay.wants_drag_events());
    if !mounted {
        return None;
    }

    let at = overlay.to_viewport(mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            session.pointer_down(at);
            None
        }
        MouseEventKind::Drag(MouseButton::Left) if dragging => {
            session.pointer_move(at);
            None
        }
        MouseEventKind::Up(MouseButton::Left) if dragging => session.pointer_up(at),
        _ => None,
    }
}

fn ui(
    f: &mut Frame,
    state: &DisplayState,
    session: &CalibrationSession<TerminalOverlay>,
    notice_ttl: Duration,
) {
    let size = f.area();

    // Main layout: top status bar, main content
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(size);

    render_status_bar(
        f,
        chunks[0],
        state,
        session.phase(),
        state.active_notice(notice_ttl),
    );

    // Strategy (left), raw feed (right)
    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .margin(1)
        .split(chunks[1]);

    render_strategy(f, main_chunks[0], state);
    render_raw_feed(f, main_chunks[1], state);

    // Capture layer sits above everything else
    render_calibration_overlay(f, size, session.surface());
}

fn init_logging() -> io::Result<()> {
    let path = std::env::var("QUANTVISION_LOG_FILE")
        .unwrap_or_else(|_| "quantvision-dashboard.log".to_string());
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}
