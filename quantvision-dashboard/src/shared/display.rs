/// Render sinks written by the dashboard core
///
/// The core never owns markup. It pushes content into named regions:
/// - raw feed: the latest snapshot, pretty-printed
/// - strategy: action / confidence / regime of the latest applied signal
/// plus the stream status and short-lived operator notices.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::shared::types::{AnalysisSignal, ChannelState, SnapshotEvent};

/// Display regions the core writes into
pub trait DisplaySink: Send + Sync {
    fn render_raw_feed(&self, snapshot: &SnapshotEvent);

    fn render_strategy(&self, signal: &AnalysisSignal);

    fn render_channel_state(&self, state: ChannelState);

    fn render_notice(&self, message: &str);
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub shown_at: Instant,
}

/// Content of every display region at one point in time
#[derive(Debug, Clone)]
pub struct DisplayState {
    pub raw_feed: Option<String>,
    pub feed_symbol: Option<String>,
    pub feed_timeframe: Option<String>,
    pub snapshots_received: u64,
    pub strategy: Option<AnalysisSignal>,
    pub channel_state: ChannelState,
    pub notice: Option<Notice>,
    pub last_update: DateTime<Utc>,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            raw_feed: None,
            feed_symbol: None,
            feed_timeframe: None,
            snapshots_received: 0,
            strategy: None,
            channel_state: ChannelState::Connecting,
            notice: None,
            last_update: Utc::now(),
        }
    }
}

impl DisplayState {
    /// Notice text if it was shown less than `ttl` ago.
    pub fn active_notice(&self, ttl: Duration) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|notice| notice.shown_at.elapsed() < ttl)
            .map(|notice| notice.message.as_str())
    }
}

/// Shared in-memory display the terminal host draws from
#[derive(Debug, Clone, Default)]
pub struct DashboardDisplay {
    inner: Arc<Mutex<DisplayState>>,
}

impl DashboardDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current display content, taken once per frame.
    pub fn snapshot(&self) -> DisplayState {
        self.inner.lock().clone()
    }
}

impl DisplaySink for DashboardDisplay {
    fn render_raw_feed(&self, snapshot: &SnapshotEvent) {
        let mut state = self.inner.lock();
        state.raw_feed = Some(snapshot.pretty());
        state.feed_symbol = snapshot.symbol().map(str::to_string);
        state.feed_timeframe = snapshot.timeframe().map(str::to_string);
        state.snapshots_received += 1;
        state.last_update = Utc::now();
    }

    fn render_strategy(&self, signal: &AnalysisSignal) {
        let mut state = self.inner.lock();
        state.strategy = Some(signal.clone());
        state.last_update = Utc::now();
    }

    fn render_channel_state(&self, channel_state: ChannelState) {
        self.inner.lock().channel_state = channel_state;
    }

    fn render_notice(&self, message: &str) {
        self.inner.lock().notice = Some(Notice {
            message: message.to_string(),
            shown_at: Instant::now(),
        });
    }
}
