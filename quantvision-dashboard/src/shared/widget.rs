//! Ratatui widgets for the dashboard regions and the calibration overlay

use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use super::calibration::{CalibrationPhase, CaptureSurface, PointerStyle};
use super::display::DisplayState;
use super::types::{CalibrationRect, ChannelState, Point, TradeAction};

const C_BUY: Color = Color::Rgb(100, 220, 100);
const C_SELL: Color = Color::Rgb(220, 100, 100);
const C_NEUTRAL: Color = Color::Rgb(180, 180, 100);
const C_DIM: Color = Color::Rgb(120, 120, 120);
const C_BRIGHT: Color = Color::Rgb(220, 220, 220);
const C_ACCENT: Color = Color::Rgb(100, 180, 220);
const C_HEADER: Color = Color::Rgb(180, 130, 220);
const C_FEED: Color = Color::Rgb(16, 185, 129);

/// Calibration overlay drawn on top of the dashboard
///
/// Terminal cells are mapped onto viewport pixels with a fixed cell size, so a
/// selection made in cells comes out in the pixel space the vision capture
/// process reads from.
#[derive(Debug, Clone)]
pub struct TerminalOverlay {
    cell_px: (f64, f64),
    mounted: bool,
    pointer: PointerStyle,
    selection: Option<CalibrationRect>,
    drag_listeners: bool,
}

impl TerminalOverlay {
    pub fn new(cell_px: (f64, f64)) -> Self {
        Self {
            cell_px,
            mounted: false,
            pointer: PointerStyle::Default,
            selection: None,
            drag_listeners: false,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Whether mouse drag / release events should reach the calibration session.
    pub fn wants_drag_events(&self) -> bool {
        self.drag_listeners
    }

    pub fn pointer(&self) -> PointerStyle {
        self.pointer
    }

    /// Top-left pixel of a terminal cell.
    pub fn to_viewport(&self, column: u16, row: u16) -> Point {
        Point::new(
            f64::from(column) * self.cell_px.0,
            f64::from(row) * self.cell_px.1,
        )
    }

    /// Current selection in terminal cells, at least one cell wide and high.
    pub fn selection_cells(&self) -> Option<Rect> {
        let rect = self.selection?;
        let (cw, ch) = self.cell_px;
        let x = (rect.x / cw).floor();
        let y = (rect.y / ch).floor();
        let right = (rect.right() / cw).ceil().max(x + 1.0);
        let bottom = (rect.bottom() / ch).ceil().max(y + 1.0);

        Some(Rect::new(
            clamp_u16(x),
            clamp_u16(y),
            clamp_u16(right - x),
            clamp_u16(bottom - y),
        ))
    }
}

impl CaptureSurface for TerminalOverlay {
    fn mount(&mut self, pointer: PointerStyle) {
        self.mounted = true;
        self.pointer = pointer;
    }

    fn unmount(&mut self) {
        self.mounted = false;
        self.pointer = PointerStyle::Default;
        self.selection = None;
    }

    fn draw_selection(&mut self, rect: CalibrationRect) {
        self.selection = Some(rect);
    }

    fn attach_drag_listeners(&mut self) {
        self.drag_listeners = true;
    }

    fn detach_drag_listeners(&mut self) {
        self.drag_listeners = false;
    }
}

fn clamp_u16(value: f64) -> u16 {
    value.clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Top bar: stream status, calibration phase, notices, key help
pub fn render_status_bar(
    f: &mut Frame,
    area: Rect,
    state: &DisplayState,
    phase: CalibrationPhase,
    notice: Option<&str>,
) {
    let (status_symbol, status_color) = match state.channel_state {
        ChannelState::Open => ("●", Color::Rgb(0, 255, 127)),
        ChannelState::Connecting => ("◌", C_NEUTRAL),
        ChannelState::Closed => ("○", Color::Rgb(255, 69, 58)),
    };

    let mut spans = vec![
        Span::styled(
            format!(" {} {} ", status_symbol, state.channel_state),
            Style::default()
                .fg(status_color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" ⏱  {} ", state.last_update.format("%H:%M:%S%.3f")),
            Style::default().fg(Color::Rgb(100, 149, 237)),
        ),
        Span::styled(
            " ◆ QUANTVISION ◆ ",
            Style::default()
                .fg(Color::Rgb(255, 215, 0))
                .add_modifier(Modifier::BOLD),
        ),
    ];

    let phase_label = match phase {
        CalibrationPhase::Idle => None,
        CalibrationPhase::Armed => Some("CALIBRATE: press & drag"),
        CalibrationPhase::Dragging => Some("CALIBRATE: release to save"),
        CalibrationPhase::Submitting => Some("CALIBRATE: saving..."),
    };
    if let Some(label) = phase_label {
        spans.push(Span::styled(
            format!(" {} ", label),
            Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
        ));
    }

    if let Some(message) = notice {
        spans.push(Span::styled(
            format!(" {} ", message),
            Style::default().fg(C_BRIGHT).bg(Color::Rgb(40, 40, 60)),
        ));
    }

    spans.push(Span::styled(
        " [C] Calibrate  [Esc] Cancel  [Q] Quit ",
        Style::default().fg(C_DIM),
    ));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Double)
        .border_style(Style::default().fg(Color::Rgb(138, 43, 226)))
        .style(Style::default().bg(Color::Rgb(18, 18, 28)));

    let paragraph = Paragraph::new(Line::from(spans))
        .block(block)
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn action_color(direction: TradeAction) -> Color {
    match direction {
        TradeAction::Buy => C_BUY,
        TradeAction::Sell => C_SELL,
        TradeAction::Hold | TradeAction::Other => C_NEUTRAL,
    }
}

/// Raw feed region: latest snapshot, pretty-printed
pub fn render_raw_feed(f: &mut Frame, area: Rect, state: &DisplayState) {
    let mut title = String::from(" LIVE MARKET FEED ");
    match (&state.feed_symbol, &state.feed_timeframe) {
        (Some(symbol), Some(timeframe)) => title.push_str(&format!("· {} {} ", symbol, timeframe)),
        (Some(symbol), None) => title.push_str(&format!("· {} ", symbol)),
        _ => {}
    }
    title.push_str(&format!("· #{} ", state.snapshots_received));

    let block = Block::default()
        .title(Span::styled(
            title,
            Style::default().fg(C_HEADER).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));

    let body = match &state.raw_feed {
        Some(pretty) => Paragraph::new(pretty.as_str()).style(Style::default().fg(C_FEED)),
        None => Paragraph::new("Waiting for vision ingestion...")
            .style(Style::default().fg(C_DIM))
            .alignment(Alignment::Center),
    };

    f.render_widget(body.block(block).wrap(Wrap { trim: false }), area);
}

/// Strategy region: action / confidence / regime of the displayed signal
pub fn render_strategy(f: &mut Frame, area: Rect, state: &DisplayState) {
    let block = Block::default()
        .title(Span::styled(
            " STRATEGY ENGINE ",
            Style::default().fg(C_HEADER).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(C_DIM));

    let Some(signal) = &state.strategy else {
        let waiting = Paragraph::new("Awaiting trade signals...")
            .style(Style::default().fg(C_DIM))
            .block(block);
        f.render_widget(waiting, area);
        return;
    };

    let direction_color = action_color(signal.direction());

    let label = |text: &'static str| Span::styled(text, Style::default().fg(C_DIM));

    let mut lines = vec![
        Line::from(vec![
            label("Action:     "),
            Span::styled(
                signal.action.clone(),
                Style::default()
                    .fg(direction_color)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            label("Confidence: "),
            Span::styled(
                format!("{:.2}", signal.confidence_score),
                Style::default().fg(Color::Rgb(250, 204, 21)),
            ),
        ]),
        Line::from(vec![
            label("Regime:     "),
            Span::styled(signal.market_regime.clone(), Style::default().fg(C_ACCENT)),
        ]),
    ];

    if let Some(ticker) = &signal.ticker {
        lines.push(Line::from(vec![
            label("Ticker:     "),
            Span::styled(ticker.clone(), Style::default().fg(C_BRIGHT)),
        ]));
    }
    if let Some(price) = signal.price {
        lines.push(Line::from(vec![
            label("Price:      "),
            Span::styled(format!("{:.2}", price), Style::default().fg(C_BRIGHT)),
        ]));
    }
    if let Some(rsi) = signal.rsi {
        lines.push(Line::from(vec![
            label("RSI:        "),
            Span::styled(format!("{:.1}", rsi), Style::default().fg(C_BRIGHT)),
        ]));
    }
    if let Some(prob) = signal.ml_prob_profitable {
        lines.push(Line::from(vec![
            label("ML p(win):  "),
            Span::styled(format!("{:.2}", prob), Style::default().fg(C_BRIGHT)),
        ]));
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}

/// Dimmed full-screen capture layer with the in-progress selection
pub fn render_calibration_overlay(f: &mut Frame, area: Rect, overlay: &TerminalOverlay) {
    if !overlay.is_mounted() {
        return;
    }

    f.render_widget(Clear, area);
    let hint = match overlay.pointer() {
        PointerStyle::Crosshair => " ✛ SELECT CAPTURE REGION ✛ ",
        PointerStyle::Default => " SELECT CAPTURE REGION ",
    };
    let backdrop = Block::default()
        .title(Span::styled(
            hint,
            Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
        ))
        .title_alignment(Alignment::Center)
        .style(Style::default().bg(Color::Rgb(10, 10, 14)));
    f.render_widget(backdrop, area);

    if let Some(selection) = overlay.selection_cells() {
        let selection = selection.intersection(area);
        let frame = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(C_FEED))
            .style(Style::default().bg(Color::Rgb(12, 48, 38)));
        f.render_widget(frame, selection);
    }
}
