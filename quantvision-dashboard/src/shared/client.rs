//! HTTP client for the vision backend
//!
//! Two seams, one per remote operation, so the calibration session and the
//! snapshot pipeline can be driven against in-memory fakes.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::shared::calibration::CalibrationOutcome;
use crate::shared::config::DashboardConfig;
use crate::shared::error::DashboardError;
use crate::shared::types::{AnalysisResponse, CalibrationRect, SnapshotEvent};

/// Remote "set calibration" operation
#[async_trait]
pub trait CalibrationEndpoint: Send + Sync {
    async fn set_calibration(&self, rect: CalibrationRect) -> Result<(), DashboardError>;
}

/// Remote per-snapshot analysis
#[async_trait]
pub trait SnapshotAnalyzer: Send + Sync {
    async fn analyze(&self, snapshot: &SnapshotEvent) -> Result<AnalysisResponse, DashboardError>;
}

/// reqwest-backed client for `/calibrate` and `/analyze_snapshot`
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    calibrate_url: Url,
    analyze_url: Url,
}

impl BackendClient {
    pub fn new(config: &DashboardConfig) -> Result<Self, DashboardError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            calibrate_url: config.calibrate_url()?,
            analyze_url: config.analyze_url()?,
        })
    }

    fn check_status(
        url: &Url,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, DashboardError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(DashboardError::Status {
                endpoint: url.path().to_string(),
                status: status.as_u16(),
            })
        }
    }
}

#[async_trait]
impl CalibrationEndpoint for BackendClient {
    async fn set_calibration(&self, rect: CalibrationRect) -> Result<(), DashboardError> {
        debug!("POST {} {}", self.calibrate_url, rect);
        let response = self
            .http
            .post(self.calibrate_url.clone())
            .json(&rect)
            .send()
            .await?;

        // Response body is not part of the contract
        Self::check_status(&self.calibrate_url, response).map(|_| ())
    }
}

#[async_trait]
impl SnapshotAnalyzer for BackendClient {
    async fn analyze(&self, snapshot: &SnapshotEvent) -> Result<AnalysisResponse, DashboardError> {
        let response = self
            .http
            .post(self.analyze_url.clone())
            .json(snapshot)
            .send()
            .await?;

        let response = Self::check_status(&self.analyze_url, response)?;
        Ok(response.json::<AnalysisResponse>().await?)
    }
}

/// Submit a rectangle and fold the result into an operator-facing outcome.
pub async fn submit_calibration(
    endpoint: &dyn CalibrationEndpoint,
    rect: CalibrationRect,
) -> CalibrationOutcome {
    match endpoint.set_calibration(rect).await {
        Ok(()) => CalibrationOutcome::Saved(rect),
        Err(e) => CalibrationOutcome::Failed {
            rect,
            reason: e.to_string(),
        },
    }
}
