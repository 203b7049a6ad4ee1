use thiserror::Error;

/// All errors generated by the dashboard core.
///
/// None of these are fatal: each one is scoped to the event that triggered it
/// (a single stream message, a single analysis request, a single calibration
/// submission).
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to parse payload: {0}")]
    Parse(String),

    #[error("{endpoint} responded with HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("invalid endpoint url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl DashboardError {
    /// Network failure reaching the backend (connect, send, receive, non-success status).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DashboardError::Transport(_) | DashboardError::Status { .. }
        )
    }

    /// Malformed snapshot or response payload.
    pub fn is_parse(&self) -> bool {
        matches!(self, DashboardError::Parse(_))
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(value: reqwest::Error) -> Self {
        // Body decoding failures are payload problems, not transport problems
        if value.is_decode() {
            Self::Parse(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for DashboardError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value.to_string())
    }
}
