//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `report_listener` - TCP listener for live position reports
//! - `egress_channel` - Typed channel for outbound score messages
//! - `score_log` - Score update output to file (JSONL format)

pub mod egress_channel;
pub mod report_listener;
pub mod score_log;

// Re-export commonly used types
pub use egress_channel::{create_egress_channel, EgressMessage, EgressSender, TrackEventPayload};
pub use report_listener::{start_report_listener, ReportListenerConfig};
pub use score_log::ScoreLog;
