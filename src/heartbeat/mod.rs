//! Machine heartbeats.

pub mod monitor;

pub use monitor::{Heartbeat, HeartbeatMonitor, MonitorState, MonitorStatus, TerminalError};
