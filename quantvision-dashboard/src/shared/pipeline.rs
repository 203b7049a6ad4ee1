//! Per-snapshot ingestion: parse -> render raw feed -> analyse -> render signal
//!
//! Rendering the raw feed never waits on analysis. Each snapshot gets its own
//! analysis task; tasks are neither serialised nor cancelled, so responses can
//! settle in any order. [`SignalPolicy`] decides what that means for the
//! strategy region.

use std::{str::FromStr, sync::Arc};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::shared::client::SnapshotAnalyzer;
use crate::shared::display::DisplaySink;
use crate::shared::error::DashboardError;
use crate::shared::types::SnapshotEvent;

/// How settled analysis responses are applied to the strategy region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalPolicy {
    /// Whichever response settles last wins, even if it belongs to an older snapshot
    #[default]
    LastCompleted,
    /// A response is dropped if a newer snapshot's signal is already displayed
    NewestSnapshot,
}

impl FromStr for SignalPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last_completed" => Ok(SignalPolicy::LastCompleted),
            "newest_snapshot" => Ok(SignalPolicy::NewestSnapshot),
            _ => Err(()),
        }
    }
}

/// Stream message handler shared by the snapshot channel
pub struct SnapshotPipeline {
    analyzer: Arc<dyn SnapshotAnalyzer>,
    sink: Arc<dyn DisplaySink>,
    policy: SignalPolicy,
    next_seq: u64,
    // Sequence number of the snapshot whose signal is on display
    applied_seq: Arc<Mutex<u64>>,
}

impl SnapshotPipeline {
    pub fn new(
        analyzer: Arc<dyn SnapshotAnalyzer>,
        sink: Arc<dyn DisplaySink>,
        policy: SignalPolicy,
    ) -> Self {
        Self {
            analyzer,
            sink,
            policy,
            next_seq: 0,
            applied_seq: Arc::new(Mutex::new(0)),
        }
    }

    pub fn sink(&self) -> &Arc<dyn DisplaySink> {
        &self.sink
    }

    /// Handle one stream message.
    ///
    /// A malformed message is rejected with [`DashboardError::Parse`] and has no
    /// effect. Otherwise the snapshot is rendered immediately and its analysis
    /// is spawned; the returned handle resolves once the response is applied
    /// or discarded.
    pub fn ingest(&mut self, text: &str) -> Result<JoinHandle<()>, DashboardError> {
        let snapshot = SnapshotEvent::parse(text)?;
        self.sink.render_raw_feed(&snapshot);

        self.next_seq += 1;
        let job = AnalysisJob {
            seq: self.next_seq,
            snapshot,
            analyzer: Arc::clone(&self.analyzer),
            sink: Arc::clone(&self.sink),
            policy: self.policy,
            applied_seq: Arc::clone(&self.applied_seq),
        };

        Ok(tokio::spawn(job.run()))
    }
}

struct AnalysisJob {
    seq: u64,
    snapshot: SnapshotEvent,
    analyzer: Arc<dyn SnapshotAnalyzer>,
    sink: Arc<dyn DisplaySink>,
    policy: SignalPolicy,
    applied_seq: Arc<Mutex<u64>>,
}

impl AnalysisJob {
    async fn run(self) {
        let response = match self.analyzer.analyze(&self.snapshot).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Analysis of snapshot #{} failed: {}", self.seq, e);
                return;
            }
        };

        if !response.is_ok() {
            debug!(
                "Analysis of snapshot #{} returned status {:?}: {}",
                self.seq,
                response.status,
                response.reason.as_deref().unwrap_or("-")
            );
        }

        let Some(signal) = response.signal else {
            return;
        };

        // Check and render under one lock so two settling jobs cannot interleave
        let mut applied = self.applied_seq.lock();
        if self.policy == SignalPolicy::NewestSnapshot && *applied > self.seq {
            debug!(
                "Dropping signal for snapshot #{}, #{} already displayed",
                self.seq, *applied
            );
            return;
        }
        *applied = self.seq;
        self.sink.render_strategy(&signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::display::DashboardDisplay;
    use crate::shared::types::{AnalysisResponse, AnalysisSignal};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::sync::oneshot;

    /// Analyzer whose responses are released by the test, keyed by snapshot `id`
    #[derive(Default)]
    struct GatedAnalyzer {
        gates: Mutex<HashMap<u64, oneshot::Receiver<Result<AnalysisResponse, DashboardError>>>>,
    }

    impl GatedAnalyzer {
        fn gate(&self, id: u64) -> oneshot::Sender<Result<AnalysisResponse, DashboardError>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().insert(id, rx);
            tx
        }
    }

    #[async_trait]
    impl SnapshotAnalyzer for GatedAnalyzer {
        async fn analyze(
            &self,
            snapshot: &SnapshotEvent,
        ) -> Result<AnalysisResponse, DashboardError> {
            let id = snapshot
                .as_value()
                .get("id")
                .and_then(|v| v.as_u64())
                .unwrap_or_default();
            let gate = self.gates.lock().remove(&id);
            match gate {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(DashboardError::Transport("gate dropped".to_string()))),
                None => Ok(AnalysisResponse::default()),
            }
        }
    }

    fn signal(regime: &str) -> AnalysisResponse {
        AnalysisResponse {
            status: Some("ok".to_string()),
            signal: Some(AnalysisSignal {
                action: "BUY / LONG".to_string(),
                confidence_score: 0.5,
                market_regime: regime.to_string(),
                ticker: None,
                price: None,
                rsi: None,
                ml_prob_profitable: None,
            }),
            reason: None,
        }
    }

    fn pipeline(
        policy: SignalPolicy,
    ) -> (SnapshotPipeline, Arc<GatedAnalyzer>, DashboardDisplay) {
        let analyzer = Arc::new(GatedAnalyzer::default());
        let display = DashboardDisplay::new();
        let pipeline = SnapshotPipeline::new(analyzer.clone(), Arc::new(display.clone()), policy);
        (pipeline, analyzer, display)
    }

    fn message(id: u64) -> String {
        json!({"id": id, "symbol": "NIFTY"}).to_string()
    }

    fn displayed_regime(display: &DashboardDisplay) -> Option<String> {
        display.snapshot().strategy.map(|s| s.market_regime)
    }

    #[tokio::test]
    async fn test_out_of_order_responses_last_completed_wins() {
        let (mut pipeline, analyzer, display) = pipeline(SignalPolicy::LastCompleted);
        let gates: Vec<_> = (1..=3).map(|id| analyzer.gate(id)).collect();
        let handles: Vec<_> = (1..=3)
            .map(|id| pipeline.ingest(&message(id)).unwrap())
            .collect();

        // Raw feed shows the latest snapshot before any analysis settles
        let state = display.snapshot();
        assert_eq!(state.snapshots_received, 3);
        assert!(state.raw_feed.unwrap().contains("\"id\": 3"));
        assert_eq!(displayed_regime(&display), None);

        let mut gates = gates.into_iter().map(Some).collect::<Vec<_>>();
        let mut handles = handles.into_iter().map(Some).collect::<Vec<_>>();
        for index in [2usize, 0, 1] {
            let gate = gates[index].take().unwrap();
            gate.send(Ok(signal(&format!("regime-{}", index + 1)))).unwrap();
            handles[index].take().unwrap().await.unwrap();
        }

        assert_eq!(displayed_regime(&display), Some("regime-2".to_string()));
        assert!(display.snapshot().raw_feed.unwrap().contains("\"id\": 3"));
    }

    #[tokio::test]
    async fn test_out_of_order_responses_newest_snapshot_wins() {
        let (mut pipeline, analyzer, display) = pipeline(SignalPolicy::NewestSnapshot);
        let gate_1 = analyzer.gate(1);
        let gate_2 = analyzer.gate(2);
        let first = pipeline.ingest(&message(1)).unwrap();
        let second = pipeline.ingest(&message(2)).unwrap();

        gate_2.send(Ok(signal("newer"))).unwrap();
        second.await.unwrap();
        gate_1.send(Ok(signal("older"))).unwrap();
        first.await.unwrap();

        assert_eq!(displayed_regime(&display), Some("newer".to_string()));
    }

    #[tokio::test]
    async fn test_missing_signal_keeps_previous_strategy() {
        let (mut pipeline, analyzer, display) = pipeline(SignalPolicy::LastCompleted);

        let gate = analyzer.gate(1);
        let handle = pipeline.ingest(&message(1)).unwrap();
        gate.send(Ok(signal("Bull-Low-Vol"))).unwrap();
        handle.await.unwrap();

        let gate = analyzer.gate(2);
        let handle = pipeline.ingest(&message(2)).unwrap();
        gate.send(Ok(AnalysisResponse {
            status: Some("no_symbol".to_string()),
            signal: None,
            reason: None,
        }))
        .unwrap();
        handle.await.unwrap();

        let gate = analyzer.gate(3);
        let handle = pipeline.ingest(&message(3)).unwrap();
        gate.send(Err(DashboardError::Transport("timed out".to_string())))
            .unwrap();
        handle.await.unwrap();

        assert_eq!(displayed_regime(&display), Some("Bull-Low-Vol".to_string()));
        assert_eq!(display.snapshot().snapshots_received, 3);
    }

    #[tokio::test]
    async fn test_malformed_message_is_skipped() {
        let (mut pipeline, _analyzer, display) = pipeline(SignalPolicy::LastCompleted);

        let err = pipeline.ingest("{\"id\": ").unwrap_err();
        assert!(err.is_parse());
        assert_eq!(display.snapshot().snapshots_received, 0);

        pipeline.ingest(&message(7)).unwrap().await.unwrap();
        let state = display.snapshot();
        assert_eq!(state.snapshots_received, 1);
        assert!(state.raw_feed.unwrap().contains("\"id\": 7"));
    }

    #[test]
    fn test_signal_policy_from_str() {
        assert_eq!("last_completed".parse::<SignalPolicy>(), Ok(SignalPolicy::LastCompleted));
        assert_eq!(" Newest_Snapshot ".parse::<SignalPolicy>(), Ok(SignalPolicy::NewestSnapshot));
        assert_eq!("latest".parse::<SignalPolicy>(), Err(()));
    }
}
