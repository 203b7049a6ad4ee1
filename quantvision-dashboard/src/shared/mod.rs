/// Shared modules for the QuantVision dashboard
pub mod calibration;
pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod pipeline;
pub mod types;
pub mod websocket;
pub mod widget;
