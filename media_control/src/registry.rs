//! ControllerRegistry: every instantiated controller plus the identity of
//! the active one.
//!
//! The registry is owned by the dispatcher and only mutated through
//! [`ControllerRegistry::switch`] and [`ControllerRegistry::deactivate`], so
//! there is no shared "current platform" anywhere else. `switch` is called
//! between two `execute` calls, which makes it atomic from the dispatcher's
//! point of view.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::command::Capabilities;
use crate::controller::{ConnectError, ControllerSession, MediaController, Platform};
use crate::worker::ControllerWorker;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no controller registered for {0}")]
    UnknownPlatform(Platform),
    #[error("could not activate {platform}: {source}")]
    SwitchFailed {
        platform: Platform,
        #[source]
        source:   ConnectError,
    },
    #[error("could not start controller thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Default)]
pub struct ControllerRegistry {
    workers:     BTreeMap<Platform, ControllerWorker>,
    active:      Option<Platform>,
    deactivated: bool,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a worker for `controller`, replacing any earlier controller for
    /// the same platform.
    pub fn register(&mut self, controller: Box<dyn MediaController>) -> Result<(), RegistryError> {
        let worker = ControllerWorker::spawn(controller)?;
        let platform = worker.platform();
        if let Some(old) = self.workers.insert(platform, worker) {
            old.shutdown(Duration::from_secs(1));
            if self.active == Some(platform) {
                self.active = None;
            }
        }
        Ok(())
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.workers.keys().copied().collect()
    }

    /// The controller currently receiving commands, unless it was
    /// deactivated after repeated session failures.
    pub fn active(&self) -> Option<&ControllerWorker> {
        if self.deactivated {
            return None;
        }
        self.active.and_then(|p| self.workers.get(&p))
    }

    pub fn active_platform(&self) -> Option<Platform> {
        if self.deactivated { None } else { self.active }
    }

    pub fn capabilities(&self, platform: Platform) -> Option<Capabilities> {
        self.workers.get(&platform).map(|w| w.capabilities())
    }

    /// Make `to` the active controller.
    ///
    /// The incoming session is established first; on failure the previous
    /// controller stays active and nothing is torn down. On success the
    /// outgoing controller is released, waiting up to `timeout` for any
    /// call still running on it. Reselecting a deactivated platform
    /// reactivates it.
    pub fn switch(&mut self, to: Platform, timeout: Duration) -> Result<ControllerSession, RegistryError> {
        let incoming = self.workers.get(&to).ok_or(RegistryError::UnknownPlatform(to))?;
        let session = incoming
            .ensure_session(timeout)
            .map_err(|source| RegistryError::SwitchFailed { platform: to, source })?;

        if let Some(from) = self.active.filter(|p| *p != to) {
            if let Some(outgoing) = self.workers.get(&from) {
                if !outgoing.release(timeout) {
                    warn!(platform = %from, ?timeout, "outgoing controller did not release in time");
                }
            }
        }
        self.active = Some(to);
        self.deactivated = false;
        info!(platform = %to, session = %session.handle.0, "controller active");
        Ok(session)
    }

    /// Stop routing to the active controller until it is reselected.
    pub fn deactivate(&mut self) -> Option<Platform> {
        if self.deactivated {
            return None;
        }
        let platform = self.active?;
        self.deactivated = true;
        warn!(%platform, "controller deactivated");
        Some(platform)
    }

    /// Release every session and stop every worker.
    pub fn shutdown(&mut self, timeout: Duration) {
        self.active = None;
        for (_, worker) in std::mem::take(&mut self.workers) {
            worker.shutdown(timeout);
        }
    }
}

impl Drop for ControllerRegistry {
    fn drop(&mut self) {
        self.shutdown(Duration::from_millis(500));
    }
}
