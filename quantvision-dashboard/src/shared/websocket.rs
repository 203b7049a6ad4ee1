/// Snapshot stream subscription (`/ws/vision`)
///
/// Provides heartbeat, per-message parsing and channel state tracking.
/// There is no reconnect: once the stream closes the channel stays CLOSED.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::shared::config::DashboardConfig;
use crate::shared::error::DashboardError;
use crate::shared::pipeline::SnapshotPipeline;
use crate::shared::types::ChannelState;

/// Snapshot channel configuration
#[derive(Debug, Clone)]
pub struct SnapshotChannelConfig {
    /// WebSocket stream URL
    pub url: String,
    /// Ping interval to keep connection alive
    pub ping_interval: Duration,
}

impl Default for SnapshotChannelConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws/vision".to_string(),
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl SnapshotChannelConfig {
    /// Create a new configuration with custom URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Derive the stream settings from the dashboard configuration
    pub fn from_dashboard(config: &DashboardConfig) -> Result<Self, DashboardError> {
        Ok(Self::new(config.stream_url()?.to_string()).with_ping_interval(config.ping_interval))
    }

    /// Set ping interval
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }
}

/// Long-lived subscription feeding a [`SnapshotPipeline`]
pub struct SnapshotChannel {
    config: SnapshotChannelConfig,
    pipeline: SnapshotPipeline,
    state_tx: watch::Sender<ChannelState>,
}

impl SnapshotChannel {
    pub fn new(config: SnapshotChannelConfig, pipeline: SnapshotPipeline) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Connecting);
        Self {
            config,
            pipeline,
            state_tx,
        }
    }

    /// Receiver for channel state updates
    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    /// Spawn the subscription onto the runtime
    pub fn start(self) -> (JoinHandle<()>, watch::Receiver<ChannelState>) {
        let state_rx = self.subscribe();
        let handle = tokio::spawn(self.run());
        (handle, state_rx)
    }

    /// Connect and process messages until the stream closes
    pub async fn run(mut self) {
        self.set_state(ChannelState::Connecting);
        info!("Opening snapshot stream {}", self.config.url);

        let ws_stream = match connect_async(self.config.url.as_str()).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                error!("Failed to connect to {}: {}", self.config.url, e);
                self.set_state(ChannelState::Closed);
                return;
            }
        };

        info!("Connected to snapshot stream at {}", self.config.url);
        self.set_state(ChannelState::Open);

        let (mut write, mut read) = ws_stream.split();

        // Spawn ping task to keep connection alive
        let ping_interval = self.config.ping_interval;
        let (ping_shutdown_tx, mut ping_shutdown_rx) = mpsc::channel::<()>(1);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ping_interval);
            // First tick fires immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if write.send(Message::Ping(vec![].into())).await.is_err() {
                            debug!("Failed to send ping, connection likely dead");
                            break;
                        }
                    }
                    _ = ping_shutdown_rx.recv() => {
                        debug!("Ping task shutting down");
                        break;
                    }
                }
            }
        });

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    // Analysis tasks are detached; the pipeline owns their outcome
                    if let Err(e) = self.pipeline.ingest(&text) {
                        warn!("Skipping snapshot message: {}", e);
                        debug!("Raw message: {}", text.chars().take(200).collect::<String>());
                    }
                }
                Ok(Message::Binary(bytes)) => {
                    debug!("Ignoring {} byte binary frame", bytes.len());
                }
                Ok(Message::Close(frame)) => {
                    info!("Server closed snapshot stream: {:?}", frame);
                    break;
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Heartbeat messages - tungstenite handles these automatically
                }
                Err(e) => {
                    error!("Snapshot stream error: {}", DashboardError::from(e));
                    break;
                }
                _ => {}
            }
        }

        // Stop ping task
        let _ = ping_shutdown_tx.send(()).await;

        self.set_state(ChannelState::Closed);
        warn!("Snapshot stream closed, not reconnecting");
    }

    /// Display first, so a watcher woken by the change sees it rendered
    fn set_state(&self, state: ChannelState) {
        self.pipeline.sink().render_channel_state(state);
        self.state_tx.send_replace(state);
    }
}
