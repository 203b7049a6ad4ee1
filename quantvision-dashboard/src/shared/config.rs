/// Dashboard configuration
///
/// Every value has a default matching the local backend layout
/// (`http://127.0.0.1:8000`) and can be overridden from the environment:
///
/// - `QUANTVISION_BACKEND_URL` - base url of the vision backend
/// - `QUANTVISION_WS_URL` - explicit snapshot stream url (otherwise derived)
/// - `QUANTVISION_SIGNAL_POLICY` - `last_completed` | `newest_snapshot`
/// - `QUANTVISION_CELL_PX` - terminal cell size in pixels, `WxH`

use std::time::Duration;

use tracing::warn;
use url::Url;

use crate::shared::error::DashboardError;
use crate::shared::pipeline::SignalPolicy;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";

const CALIBRATE_PATH: &str = "calibrate";
const ANALYZE_PATH: &str = "analyze_snapshot";
const STREAM_PATH: &str = "ws/vision";

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Vision backend base url
    pub backend_url: Url,
    /// Snapshot stream url; derived from `backend_url` when `None`
    pub stream_url: Option<Url>,
    /// Ping interval to keep the stream alive
    pub ping_interval: Duration,
    /// Per-request timeout for calibration and analysis calls (none by default)
    pub request_timeout: Option<Duration>,
    /// How completed analysis responses are applied to the strategy region
    pub signal_policy: SignalPolicy,
    /// How long operator notices stay on screen
    pub notice_ttl: Duration,
    /// Pixel size of one terminal cell (width, height)
    pub cell_px: (f64, f64),
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            stream_url: None,
            ping_interval: Duration::from_secs(30),
            request_timeout: None,
            signal_policy: SignalPolicy::default(),
            notice_ttl: Duration::from_secs(3),
            cell_px: (8.0, 16.0),
        }
    }
}

impl DashboardConfig {
    /// Build a configuration from `QUANTVISION_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Invalid values are
    /// logged and replaced by their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("QUANTVISION_BACKEND_URL") {
            match Url::parse(&raw) {
                Ok(url) => config.backend_url = url,
                Err(e) => warn!("Ignoring QUANTVISION_BACKEND_URL={}: {}", raw, e),
            }
        }

        if let Some(raw) = lookup("QUANTVISION_WS_URL") {
            match Url::parse(&raw) {
                Ok(url) => config.stream_url = Some(url),
                Err(e) => warn!("Ignoring QUANTVISION_WS_URL={}: {}", raw, e),
            }
        }

        if let Some(raw) = lookup("QUANTVISION_SIGNAL_POLICY") {
            match raw.parse::<SignalPolicy>() {
                Ok(policy) => config.signal_policy = policy,
                Err(()) => warn!("Ignoring unknown QUANTVISION_SIGNAL_POLICY={}", raw),
            }
        }

        if let Some(raw) = lookup("QUANTVISION_CELL_PX") {
            match parse_cell_px(&raw) {
                Some(cell_px) => config.cell_px = cell_px,
                None => warn!("Ignoring QUANTVISION_CELL_PX={}, expected WxH", raw),
            }
        }

        config
    }

    /// Set the backend base url
    pub fn with_backend_url(mut self, url: &str) -> Result<Self, DashboardError> {
        self.backend_url = Url::parse(url)?;
        Ok(self)
    }

    /// Set an explicit snapshot stream url
    pub fn with_stream_url(mut self, url: &str) -> Result<Self, DashboardError> {
        self.stream_url = Some(Url::parse(url)?);
        Ok(self)
    }

    /// Set the signal application policy
    pub fn with_signal_policy(mut self, policy: SignalPolicy) -> Self {
        self.signal_policy = policy;
        self
    }

    /// Set the per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// `POST` target for calibration rectangles
    pub fn calibrate_url(&self) -> Result<Url, DashboardError> {
        self.endpoint(CALIBRATE_PATH)
    }

    /// `POST` target for snapshot analysis
    pub fn analyze_url(&self) -> Result<Url, DashboardError> {
        self.endpoint(ANALYZE_PATH)
    }

    /// Snapshot stream url, `ws(s)://<backend>/ws/vision` unless overridden
    pub fn stream_url(&self) -> Result<Url, DashboardError> {
        if let Some(url) = &self.stream_url {
            return Ok(url.clone());
        }

        let mut url = self.endpoint(STREAM_PATH)?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            _ => return Ok(url),
        };
        // Credentials, port, path and query carry over unchanged
        url.set_scheme(scheme).map_err(|()| {
            DashboardError::Parse(format!("cannot derive {} stream URL from {}", scheme, url))
        })?;
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, DashboardError> {
        let mut base = self.backend_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        Ok(base.join(path)?)
    }
}

fn default_backend_url() -> Url {
    Url::parse(DEFAULT_BACKEND_URL).expect("default backend url is valid")
}

fn parse_cell_px(raw: &str) -> Option<(f64, f64)> {
    let (w, h) = raw.trim().split_once(['x', 'X'])?;
    let w = w.trim().parse::<f64>().ok().filter(|v| *v > 0.0)?;
    let h = h.trim().parse::<f64>().ok().filter(|v| *v > 0.0)?;
    Some((w, h))
}
