//! Activated machines and their heartbeat monitors.

use crate::heartbeat::monitor::{resolve_interval, HeartbeatMonitor, TerminalError};
use crate::license::parse_timestamp;
use crate::manager::LicenseClient;
use crate::protocol::models::{MachineAttributes, Resource};
use crate::TollgateError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Local view of a machine's activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    /// Activated on the authority.
    Active,
    /// Deactivated (or found missing) on the authority.
    Deactivated,
}

/// One activated fingerprint.
///
/// A machine owns its heartbeat monitor: dropping the machine stops it.
/// The license is referenced by ID only.
#[derive(Debug)]
pub struct Machine {
    /// Machine ID.
    pub id: String,
    /// Owning license ID.
    pub license_id: Option<String>,
    /// Caller-supplied fingerprint.
    pub fingerprint: String,
    /// Display name.
    pub name: Option<String>,
    /// Reported hostname.
    pub hostname: Option<String>,
    /// Reported platform.
    pub platform: Option<String>,
    /// Reported CPU cores.
    pub cores: Option<u32>,
    /// When the machine was activated.
    pub activated_at: Option<DateTime<Utc>>,
    /// Last heartbeat recorded by the authority when this record was fetched.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Heartbeat window required by the policy.
    pub heartbeat_duration: Option<Duration>,
    /// Whether the policy requires heartbeats.
    pub require_heartbeat: bool,
    state: MachineState,
    client: LicenseClient,
    monitor: Option<HeartbeatMonitor>,
}

impl Machine {
    pub(crate) fn from_resource(
        resource: Resource<MachineAttributes>,
        client: LicenseClient,
    ) -> Result<Self, TollgateError> {
        let license_id = resource.related_id("license");
        let attrs = resource.attributes;

        Ok(Self {
            id: resource.id,
            license_id,
            fingerprint: attrs.fingerprint,
            name: attrs.name,
            hostname: attrs.hostname,
            platform: attrs.platform,
            cores: attrs.cores,
            activated_at: attrs.created.as_deref().map(parse_timestamp).transpose()?,
            last_heartbeat: attrs
                .last_heartbeat
                .as_deref()
                .map(parse_timestamp)
                .transpose()?,
            heartbeat_duration: attrs.heartbeat_duration.map(Duration::from_secs),
            require_heartbeat: attrs.require_heartbeat,
            state: MachineState::Active,
            client,
            monitor: None,
        })
    }

    /// Local activation state.
    pub fn state(&self) -> MachineState {
        self.state
    }

    pub(crate) fn mark_deactivated(&mut self) {
        self.state = MachineState::Deactivated;
    }

    /// Start the heartbeat monitor.
    ///
    /// Returns the receiver on which a terminal heartbeat failure is
    /// reported. Callers should treat that failure as fatal to the session.
    pub fn start_monitor(&mut self) -> Result<TerminalError, TollgateError> {
        if self.state == MachineState::Deactivated {
            return Err(TollgateError::NotFound);
        }
        if self.is_monitoring() {
            return Err(TollgateError::MonitorRunning);
        }

        let (sink, terminal) = oneshot::channel();
        self.spawn_monitor(sink)?;
        Ok(terminal)
    }

    /// Stop the heartbeat monitor, blocking until its thread has exited.
    ///
    /// Returns whether a monitor was running.
    pub fn stop_monitor(&mut self) -> bool {
        match self.monitor.as_mut() {
            Some(monitor) => {
                let was_running = monitor.is_running();
                monitor.stop();
                was_running
            }
            None => false,
        }
    }

    /// Restart a monitor stopped by [`stop_monitor`](Self::stop_monitor),
    /// reporting into the caller's original terminal receiver.
    ///
    /// If the monitor cannot be restarted the sender is dropped, so the
    /// receiver observes a closed channel instead of waiting forever.
    pub(crate) fn resume_monitor(&mut self) -> Result<(), TollgateError> {
        let sink = self.monitor.as_mut().and_then(HeartbeatMonitor::take_sink);
        match sink {
            Some(sink) => self.spawn_monitor(sink),
            None => Ok(()),
        }
    }

    fn spawn_monitor(&mut self, sink: oneshot::Sender<TollgateError>) -> Result<(), TollgateError> {
        // Joins any finished predecessor.
        self.monitor = None;

        let policy = &self.client.config().heartbeat;
        let interval = resolve_interval(policy, self.heartbeat_duration);
        let monitor = HeartbeatMonitor::start_with_sink(
            Arc::new(self.client.clone()),
            self.id.clone(),
            interval,
            policy,
            sink,
        )?;
        self.monitor = Some(monitor);
        Ok(())
    }

    /// Whether a heartbeat monitor thread is running.
    pub fn is_monitoring(&self) -> bool {
        self.monitor.as_ref().map(|m| m.is_running()).unwrap_or(false)
    }

    /// The current (or last) heartbeat monitor.
    pub fn monitor(&self) -> Option<&HeartbeatMonitor> {
        self.monitor.as_ref()
    }

    /// Deactivate through the client that activated this machine.
    pub fn deactivate(&mut self) -> Result<(), TollgateError> {
        let client = self.client.clone();
        client.deactivate(self)
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        self.stop_monitor();
    }
}
