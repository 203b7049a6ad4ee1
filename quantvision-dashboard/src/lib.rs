/// QuantVision Dashboard - Shared Library
///
/// Core of the terminal dashboard sitting in front of the vision backend:
/// - calibration: drag-to-select the screen region the capture process reads
/// - snapshot channel: `/ws/vision` subscription, per-snapshot analysis and
///   rendering of the returned trading signal
///
/// The library includes:
/// - Data types for calibration rectangles, snapshots and signals
/// - HTTP and WebSocket clients for the backend
/// - Render sinks and ratatui widgets for the display regions
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::types::{
    AnalysisResponse, AnalysisSignal, CalibrationRect, ChannelState, Point, SnapshotEvent,
    TradeAction,
};

pub use shared::calibration::{
    CalibrationOutcome, CalibrationPhase, CalibrationSession, CaptureSurface, PointerStyle,
};
pub use shared::client::{
    submit_calibration, BackendClient, CalibrationEndpoint, SnapshotAnalyzer,
};
pub use shared::config::DashboardConfig;
pub use shared::display::{DashboardDisplay, DisplaySink, DisplayState};
pub use shared::error::DashboardError;
pub use shared::pipeline::{SignalPolicy, SnapshotPipeline};
pub use shared::websocket::{SnapshotChannel, SnapshotChannelConfig};

pub use shared::widget::{
    render_calibration_overlay, render_raw_feed, render_status_bar, render_strategy,
    TerminalOverlay,
};
