//! Background heartbeat loop for one machine.
//!
//! Each monitor owns one OS thread. The thread pings immediately, then once
//! per interval, until it is stopped or hits a terminal failure. Pings are
//! strictly sequential: the next one is only scheduled after the previous
//! call has returned.
//!
//! Status is published on a `watch` channel; a terminal failure is also
//! delivered exactly once on the `oneshot` receiver handed out by
//! [`HeartbeatMonitor::start`].

use crate::config::HeartbeatPolicy;
use crate::TollgateError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::{oneshot, watch};

/// Interval used when neither the policy nor the machine specifies one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);

/// Margin subtracted from the machine's heartbeat duration so pings land
/// before the authority considers the machine dead.
pub const DURATION_MARGIN: Duration = Duration::from_secs(30);

/// Sends one liveness signal for a machine.
pub trait Heartbeat: Send + Sync + 'static {
    /// Ping the authority for `machine_id`, returning the recorded heartbeat time.
    fn ping(&self, machine_id: &str) -> Result<DateTime<Utc>, TollgateError>;
}

/// Receives the monitor's terminal error.
pub type TerminalError = oneshot::Receiver<TollgateError>;

/// Coarse state of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Thread started, first ping not yet answered.
    Starting,
    /// Last ping succeeded.
    Alive,
    /// Tolerating consecutive transient failures.
    Retrying {
        /// Consecutive failures so far.
        attempt: u32,
    },
    /// Stopped on request.
    Stopped,
    /// Gave up after a terminal failure.
    Failed,
}

/// Snapshot published on the status channel.
#[derive(Debug, Clone)]
pub struct MonitorStatus {
    /// Current state.
    pub state: MonitorState,
    /// Time of the last successful heartbeat.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Most recent error, transient or terminal.
    pub last_error: Option<TollgateError>,
}

impl MonitorStatus {
    fn starting() -> Self {
        Self {
            state: MonitorState::Starting,
            last_heartbeat: None,
            last_error: None,
        }
    }
}

/// Pick the ping interval: explicit policy, else the machine's heartbeat
/// duration less [`DURATION_MARGIN`] (at least one second), else
/// [`DEFAULT_INTERVAL`].
pub fn resolve_interval(policy: &HeartbeatPolicy, heartbeat_duration: Option<Duration>) -> Duration {
    if let Some(interval) = policy.interval {
        return interval;
    }
    match heartbeat_duration {
        Some(duration) => duration
            .saturating_sub(DURATION_MARGIN)
            .max(Duration::from_secs(1)),
        None => DEFAULT_INTERVAL,
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at `cap`.
pub fn backoff_delay(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << shift).min(cap)
}

/// Handle to a running heartbeat thread.
///
/// Dropping the handle stops the thread.
pub struct HeartbeatMonitor {
    machine_id: String,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<Option<oneshot::Sender<TollgateError>>>>,
    status: watch::Receiver<MonitorStatus>,
    unused_sink: Option<oneshot::Sender<TollgateError>>,
}

impl HeartbeatMonitor {
    /// Start monitoring `machine_id`.
    ///
    /// Returns the handle and the receiver on which a terminal failure is
    /// reported once.
    pub fn start(
        heartbeat: Arc<dyn Heartbeat>,
        machine_id: impl Into<String>,
        interval: Duration,
        policy: &HeartbeatPolicy,
    ) -> Result<(Self, TerminalError), TollgateError> {
        let (sink, terminal) = oneshot::channel();
        let monitor = Self::start_with_sink(heartbeat, machine_id.into(), interval, policy, sink)?;
        Ok((monitor, terminal))
    }

    /// Start a monitor that reports into an existing terminal channel.
    pub(crate) fn start_with_sink(
        heartbeat: Arc<dyn Heartbeat>,
        machine_id: String,
        interval: Duration,
        policy: &HeartbeatPolicy,
        sink: oneshot::Sender<TollgateError>,
    ) -> Result<Self, TollgateError> {
        if interval.is_zero() {
            return Err(TollgateError::Config(
                "heartbeat interval must be non-zero".to_string(),
            ));
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let (status_tx, status_rx) = watch::channel(MonitorStatus::starting());

        let worker = Worker {
            heartbeat,
            machine_id: machine_id.clone(),
            interval,
            max_retries: policy.max_retries,
            backoff_base: policy.backoff_base,
            stop_rx,
            status_tx,
        };

        let handle = thread::Builder::new()
            .name(format!("tollgate-heartbeat-{}", machine_id))
            .spawn(move || worker.run(sink))
            .map_err(|e| TollgateError::IoError(format!("Failed to spawn heartbeat thread: {}", e)))?;

        tracing::info!(machine = %machine_id, interval_secs = interval.as_secs(), "heartbeat monitor started");

        Ok(Self {
            machine_id,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            status: status_rx,
            unused_sink: None,
        })
    }

    /// Stop the monitor and wait for its thread to exit.
    ///
    /// Once this returns no ping is in flight and none will be sent.
    /// Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // The thread may already have exited after a terminal failure.
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(sink) => self.unused_sink = sink,
                Err(_) => tracing::error!(machine = %self.machine_id, "heartbeat thread panicked"),
            }
            tracing::info!(machine = %self.machine_id, "heartbeat monitor stopped");
        }
    }

    /// Terminal channel sender left unused by a stopped monitor, so a
    /// restarted monitor can keep reporting to the original receiver.
    pub(crate) fn take_sink(&mut self) -> Option<oneshot::Sender<TollgateError>> {
        self.unused_sink.take()
    }

    /// Whether the background thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Current status snapshot.
    pub fn status(&self) -> MonitorStatus {
        self.status.borrow().clone()
    }

    /// Most recent error observed by the monitor.
    pub fn last_error(&self) -> Option<TollgateError> {
        self.status.borrow().last_error.clone()
    }

    /// Time of the last successful heartbeat.
    pub fn last_heartbeat(&self) -> Option<DateTime<Utc>> {
        self.status.borrow().last_heartbeat
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status.clone()
    }

    /// Machine this monitor pings for.
    pub fn machine_id(&self) -> &str {
        &self.machine_id
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for HeartbeatMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeartbeatMonitor")
            .field("machine_id", &self.machine_id)
            .field("running", &self.is_running())
            .field("state", &self.status.borrow().state)
            .finish()
    }
}

struct Worker {
    heartbeat: Arc<dyn Heartbeat>,
    machine_id: String,
    interval: Duration,
    max_retries: u32,
    backoff_base: Duration,
    stop_rx: mpsc::Receiver<()>,
    status_tx: watch::Sender<MonitorStatus>,
}

impl Worker {
    /// Loop until stopped (returning the unused sink) or failed (sink consumed).
    fn run(self, sink: oneshot::Sender<TollgateError>) -> Option<oneshot::Sender<TollgateError>> {
        let mut failures: u32 = 0;
        let mut wait = Duration::ZERO;

        loop {
            match self.stop_rx.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    self.status_tx.send_modify(|s| s.state = MonitorState::Stopped);
                    return Some(sink);
                }
            }

            match self.heartbeat.ping(&self.machine_id) {
                Ok(at) => {
                    if failures > 0 {
                        tracing::info!(machine = %self.machine_id, failures, "heartbeat recovered");
                    }
                    failures = 0;
                    wait = self.interval;
                    self.status_tx.send_modify(|s| {
                        s.state = MonitorState::Alive;
                        s.last_heartbeat = Some(at);
                    });
                    tracing::debug!(machine = %self.machine_id, "heartbeat sent");
                }
                Err(e) if e.is_transient() && failures < self.max_retries => {
                    failures += 1;
                    wait = backoff_delay(self.backoff_base, failures, self.interval);
                    tracing::warn!(
                        machine = %self.machine_id,
                        attempt = failures,
                        retry_in_ms = wait.as_millis() as u64,
                        error = %e,
                        "heartbeat failed, retrying"
                    );
                    self.status_tx.send_modify(|s| {
                        s.state = MonitorState::Retrying { attempt: failures };
                        s.last_error = Some(e);
                    });
                }
                Err(e) => {
                    tracing::error!(machine = %self.machine_id, error = %e, "heartbeat monitor giving up");
                    self.status_tx.send_modify(|s| {
                        s.state = MonitorState::Failed;
                        s.last_error = Some(e.clone());
                    });
                    // Receiver may have been dropped; the status channel still has it.
                    let _ = sink.send(e);
                    return None;
                }
            }
        }
    }
}
