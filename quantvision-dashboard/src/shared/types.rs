/// Core data types exchanged with the vision backend
///
/// These types match the JSON formats served by the backend at
/// http://127.0.0.1:8000 (`/calibrate`, `/analyze_snapshot`, `/ws/vision`)

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::shared::error::DashboardError;

/// Pointer position in viewport pixel coordinates
///
/// Coordinates are never negative: a pointer reported outside the viewport is
/// pinned to its top/left edge. Non-finite coordinates are treated as 0.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: viewport_coord(x),
            y: viewport_coord(y),
        }
    }

    /// Same point with both coordinates pinned into the viewport
    pub fn pinned(self) -> Self {
        Self::new(self.x, self.y)
    }
}

fn viewport_coord(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Screen region the vision capture process should read from
///
/// Serialises to the exact body expected by `POST /calibrate`:
/// `{"x": .., "y": .., "width": .., "height": ..}`
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct CalibrationRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CalibrationRect {
    /// Rectangle spanned by an anchor and the current pointer, in any drag direction.
    ///
    /// Both corners are pinned into the viewport first, so the rectangle is
    /// always finite with non-negative x/y.
    pub fn from_corners(anchor: Point, pointer: Point) -> Self {
        let (anchor, pointer) = (anchor.pinned(), pointer.pinned());
        Self {
            x: anchor.x.min(pointer.x),
            y: anchor.y.min(pointer.y),
            width: (pointer.x - anchor.x).abs(),
            height: (pointer.y - anchor.y).abs(),
        }
    }

    /// Zero-area rectangle (pointer released without moving).
    pub fn is_degenerate(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

impl std::fmt::Display for CalibrationRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} @ ({}, {})",
            self.width, self.height, self.x, self.y
        )
    }
}

/// Opaque chart snapshot delivered over `/ws/vision`
///
/// The schema belongs to the vision service. The dashboard only needs it to be
/// valid JSON so it can be pretty-printed and forwarded verbatim to
/// `/analyze_snapshot`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SnapshotEvent(serde_json::Value);

impl SnapshotEvent {
    /// Parse a raw stream message.
    pub fn parse(text: &str) -> Result<Self, DashboardError> {
        serde_json::from_str(text)
            .map(Self)
            .map_err(|e| DashboardError::Parse(format!("snapshot: {e}")))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Ticker symbol read off the chart, if the capture recognised one.
    pub fn symbol(&self) -> Option<&str> {
        self.0.get("symbol").and_then(|v| v.as_str())
    }

    pub fn timeframe(&self) -> Option<&str> {
        self.0.get("timeframe").and_then(|v| v.as_str())
    }

    /// Two-space indented rendering for the raw feed region.
    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }
}

impl From<serde_json::Value> for SnapshotEvent {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Direction a signal's action label points in
///
/// The analysis service labels actions `BUY / LONG`, `SELL / SHORT` and
/// `NO TRADE`; the bare forms are recognised too. Only used to pick a colour,
/// the label itself is displayed as received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
    Other,
}

impl TradeAction {
    pub fn classify(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "BUY" | "LONG" | "BUY / LONG" => TradeAction::Buy,
            "SELL" | "SHORT" | "SELL / SHORT" => TradeAction::Sell,
            "HOLD" | "NO TRADE" => TradeAction::Hold,
            _ => TradeAction::Other,
        }
    }
}

/// Trading signal produced by `/analyze_snapshot`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalysisSignal {
    /// Action label exactly as sent by the service
    pub action: String,
    /// Fraction of agreeing sub-signals, in [0, 1]
    pub confidence_score: f64,
    pub market_regime: String,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub rsi: Option<f64>,
    #[serde(default)]
    pub ml_prob_profitable: Option<f64>,
}

/// Response body of `/analyze_snapshot`
///
/// `status` is `ok`, `error` (with `reason`) or `no_symbol`. Only `signal`
/// drives the display.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub signal: Option<AnalysisSignal>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl AnalysisSignal {
    pub fn direction(&self) -> TradeAction {
        TradeAction::classify(&self.action)
    }
}

impl AnalysisResponse {
    pub fn is_ok(&self) -> bool {
        matches!(self.status.as_deref(), None | Some("ok"))
    }
}

/// Lifecycle of the `/ws/vision` subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ChannelState {
    #[display("CONNECTING")]
    Connecting,
    #[display("OPEN")]
    Open,
    #[display("CLOSED")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rect_from_corners_any_direction() {
        struct TestCase {
            anchor: Point,
            pointer: Point,
            expected: CalibrationRect,
        }

        let expected = CalibrationRect {
            x: 10.0,
            y: 20.0,
            width: 90.0,
            height: 40.0,
        };

        let tests = vec![
            TestCase {
                // TC0: down-right
                anchor: Point::new(10.0, 20.0),
                pointer: Point::new(100.0, 60.0),
                expected,
            },
            TestCase {
                // TC1: up-left
                anchor: Point::new(100.0, 60.0),
                pointer: Point::new(10.0, 20.0),
                expected,
            },
            TestCase {
                // TC2: up-right
                anchor: Point::new(10.0, 60.0),
                pointer: Point::new(100.0, 20.0),
                expected,
            },
            TestCase {
                // TC3: down-left
                anchor: Point::new(100.0, 20.0),
                pointer: Point::new(10.0, 60.0),
                expected,
            },
            TestCase {
                // TC4: no movement
                anchor: Point::new(10.0, 20.0),
                pointer: Point::new(10.0, 20.0),
                expected: CalibrationRect {
                    x: 10.0,
                    y: 20.0,
                    width: 0.0,
                    height: 0.0,
                },
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = CalibrationRect::from_corners(test.anchor, test.pointer);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_point_pins_negative_coordinates() {
        assert_eq!(Point::new(-5.0, 7.0), Point { x: 0.0, y: 7.0 });
    }

    #[test]
    fn test_rect_from_unpinned_corners() {
        struct TestCase {
            anchor: Point,
            pointer: Point,
            expected: CalibrationRect,
        }

        let tests = vec![
            TestCase {
                // TC0: anchor left of and above the viewport
                anchor: Point { x: -20.0, y: -5.0 },
                pointer: Point { x: 30.0, y: 40.0 },
                expected: CalibrationRect {
                    x: 0.0,
                    y: 0.0,
                    width: 30.0,
                    height: 40.0,
                },
            },
            TestCase {
                // TC1: infinite pointer coordinates
                anchor: Point { x: 10.0, y: 10.0 },
                pointer: Point {
                    x: f64::INFINITY,
                    y: f64::NEG_INFINITY,
                },
                expected: CalibrationRect {
                    x: 0.0,
                    y: 0.0,
                    width: 10.0,
                    height: 10.0,
                },
            },
            TestCase {
                // TC2: NaN anchor
                anchor: Point {
                    x: f64::NAN,
                    y: 4.0,
                },
                pointer: Point { x: 6.0, y: 8.0 },
                expected: CalibrationRect {
                    x: 0.0,
                    y: 4.0,
                    width: 6.0,
                    height: 4.0,
                },
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = CalibrationRect::from_corners(test.anchor, test.pointer);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }

        // Never serialises a null coordinate
        let rect = CalibrationRect::from_corners(
            Point::new(f64::INFINITY, 1.0),
            Point::new(2.0, f64::NAN),
        );
        let body = serde_json::to_value(rect).unwrap();
        assert!(body.as_object().unwrap().values().all(|v| v.is_f64()));
    }

    #[test]
    fn test_rect_serialises_as_calibrate_body() {
        let rect = CalibrationRect {
            x: 10.0,
            y: 20.0,
            width: 0.0,
            height: 0.0,
        };
        assert_eq!(
            serde_json::to_value(rect).unwrap(),
            json!({"x": 10.0, "y": 20.0, "width": 0.0, "height": 0.0})
        );
        assert!(rect.is_degenerate());
    }

    #[test]
    fn test_snapshot_parse() {
        let snapshot =
            SnapshotEvent::parse(r#"{"source":"screen_capture","symbol":"NIFTY","timeframe":"5m"}"#)
                .unwrap();
        assert_eq!(snapshot.symbol(), Some("NIFTY"));
        assert_eq!(snapshot.timeframe(), Some("5m"));
        assert!(snapshot.pretty().contains("\n  \"source\": \"screen_capture\""));

        let err = SnapshotEvent::parse("{not json").unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn test_trade_action_labels() {
        struct TestCase {
            input: &'static str,
            expected: TradeAction,
        }

        let tests = vec![
            TestCase {
                // TC0: service label
                input: "BUY / LONG",
                expected: TradeAction::Buy,
            },
            TestCase {
                // TC1: bare label
                input: "sell",
                expected: TradeAction::Sell,
            },
            TestCase {
                // TC2: no trade maps to hold
                input: "NO TRADE",
                expected: TradeAction::Hold,
            },
            TestCase {
                // TC3: bare hold
                input: " hold ",
                expected: TradeAction::Hold,
            },
            TestCase {
                // TC4: unknown label
                input: "SCALE IN",
                expected: TradeAction::Other,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = TradeAction::classify(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_analysis_response_with_and_without_signal() {
        let with_signal: AnalysisResponse = serde_json::from_value(json!({
            "status": "ok",
            "signal": {
                "action": "BUY / LONG",
                "confidence_score": 0.67,
                "market_regime": "Bull-Low-Vol",
                "rsi": 58.2,
                "ticker": "AAPL"
            }
        }))
        .unwrap();
        let signal = with_signal.signal.unwrap();
        assert_eq!(signal.action, "BUY / LONG");
        assert_eq!(signal.direction(), TradeAction::Buy);
        assert_eq!(signal.market_regime, "Bull-Low-Vol");
        assert_eq!(signal.rsi, Some(58.2));
        assert_eq!(signal.price, None);

        let no_symbol: AnalysisResponse =
            serde_json::from_value(json!({"status": "no_symbol"})).unwrap();
        assert!(no_symbol.signal.is_none());
        assert!(!no_symbol.is_ok());
    }

    #[test]
    fn test_signal_keeps_action_label_verbatim() {
        let signal: AnalysisSignal = serde_json::from_value(json!({
            "action": "HOLD",
            "confidence_score": 0.4,
            "market_regime": "Range"
        }))
        .unwrap();
        assert_eq!(signal.action, "HOLD");
        assert_eq!(signal.direction(), TradeAction::Hold);
        assert_eq!(serde_json::to_value(&signal).unwrap()["action"], json!("HOLD"));

        let signal: AnalysisSignal = serde_json::from_value(json!({
            "action": "long",
            "confidence_score": 0.9,
            "market_regime": "Bull-Low-Vol"
        }))
        .unwrap();
        assert_eq!(signal.action, "long");
        assert_eq!(signal.direction(), TradeAction::Buy);
    }

    #[test]
    fn test_channel_state_display() {
        assert_eq!(ChannelState::Connecting.to_string(), "CONNECTING");
        assert_eq!(ChannelState::Closed.to_string(), "CLOSED");
    }
}
