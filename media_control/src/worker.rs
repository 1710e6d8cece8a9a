//! One thread per controller.
//!
//! Platform automation can block for as long as the remote UI likes, so each
//! controller lives on its own thread and callers wait on replies with a
//! deadline. An `execute` that misses its deadline is never sent twice:
//!
//! | State at the deadline | Result |
//! |---|---|
//! | still queued behind another call | withdrawn; the worker skips it, nothing was actuated |
//! | running | the caller keeps waiting up to the in-flight grace for the real reply |
//! | still running after the grace | abandoned; it may yet take effect, so it must not be retried |

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use thiserror::Error;
use tracing::{debug, warn};

use crate::command::{Capabilities, MediaCommand};
use crate::controller::{Ack, ConnectError, ControllerSession, ExecError, MediaController, Platform};

const QUEUED:    u8 = 0;
const RUNNING:   u8 = 1;
const WITHDRAWN: u8 = 2;

/// Why an `execute` round trip produced no [`Ack`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The controller answered with an error.
    #[error(transparent)]
    Exec(#[from] ExecError),
    /// Still queued at the deadline and withdrawn unperformed. Safe to retry.
    #[error("no reply within {0:?}; withdrawn before it ran")]
    Withdrawn(Duration),
    /// Started but never answered. It may still take effect.
    #[error("no reply within {0:?}; outcome unknown")]
    Abandoned(Duration),
}

enum Request {
    Ensure  { resp_tx: Sender<Result<ControllerSession, ConnectError>> },
    Execute { command: MediaCommand, state: Arc<AtomicU8>, resp_tx: Sender<Result<Ack, ExecError>> },
    Release { resp_tx: Sender<()> },
}

pub struct ControllerWorker {
    platform:     Platform,
    capabilities: Capabilities,
    tx:           Sender<Request>,
    done_rx:      Receiver<()>,
    join:         JoinHandle<()>,
}

impl ControllerWorker {
    pub fn spawn(controller: Box<dyn MediaController>) -> std::io::Result<Self> {
        let platform = controller.platform();
        let capabilities = controller.capabilities();
        let (tx, rx) = crossbeam_channel::unbounded::<Request>();
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let join = thread::Builder::new()
            .name(format!("controller-{platform}"))
            .spawn(move || worker_main(controller, rx, done_tx))?;
        Ok(Self { platform, capabilities, tx, done_rx, join })
    }

    pub fn platform(&self)     -> Platform     { self.platform }
    pub fn capabilities(&self) -> Capabilities { self.capabilities }

    pub fn ensure_session(&self, timeout: Duration) -> Result<ControllerSession, ConnectError> {
        let (resp_tx, resp_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(Request::Ensure { resp_tx })
            .map_err(|_| ConnectError::Unreachable(format!("{} worker stopped", self.platform)))?;
        match resp_rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ConnectError::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ConnectError::Unreachable(format!("{} worker stopped", self.platform)))
            }
        }
    }

    /// Run `command`, waiting `deadline` for the reply. A call already
    /// running at the deadline gets `grace` more to finish.
    pub fn execute(&self, command: MediaCommand, deadline: Duration, grace: Duration) -> Result<Ack, CallError> {
        let stopped = || CallError::Exec(ExecError::TransportFailure(format!("{} worker stopped", self.platform)));
        let state = Arc::new(AtomicU8::new(QUEUED));
        let (resp_tx, resp_rx) = crossbeam_channel::bounded(1);
        self.tx
            .send(Request::Execute { command, state: Arc::clone(&state), resp_tx })
            .map_err(|_| stopped())?;
        match resp_rx.recv_timeout(deadline) {
            Ok(result) => return result.map_err(CallError::Exec),
            Err(RecvTimeoutError::Disconnected) => return Err(stopped()),
            Err(RecvTimeoutError::Timeout) => {}
        }

        if state.compare_exchange(QUEUED, WITHDRAWN, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            warn!(platform = %self.platform, %command, ?deadline, "execute still queued at deadline; withdrawn");
            return Err(CallError::Withdrawn(deadline));
        }
        warn!(platform = %self.platform, %command, ?deadline, "execute running past deadline; waiting");
        match resp_rx.recv_timeout(grace) {
            Ok(result) => result.map_err(CallError::Exec),
            Err(RecvTimeoutError::Timeout) => Err(CallError::Abandoned(deadline + grace)),
            Err(RecvTimeoutError::Disconnected) => Err(stopped()),
        }
    }

    /// Release the session once any in-flight call has finished. Returns
    /// false if that did not happen within `timeout`.
    pub fn release(&self, timeout: Duration) -> bool {
        let (resp_tx, resp_rx) = crossbeam_channel::bounded(1);
        if self.tx.send(Request::Release { resp_tx }).is_err() {
            return false;
        }
        resp_rx.recv_timeout(timeout).is_ok()
    }

    /// Stop the thread. The worker releases its session on the way out; a
    /// worker still stuck in a call after `timeout` is detached.
    pub fn shutdown(self, timeout: Duration) {
        let Self { platform, tx, done_rx, join, .. } = self;
        drop(tx);
        match done_rx.recv_timeout(timeout) {
            Ok(()) => {
                if join.join().is_err() {
                    warn!(%platform, "controller worker panicked");
                }
            }
            Err(_) => warn!(%platform, ?timeout, "controller worker did not stop in time; detaching"),
        }
    }
}

fn worker_main(mut controller: Box<dyn MediaController>, rx: Receiver<Request>, done_tx: Sender<()>) {
    let platform = controller.platform();
    debug!(%platform, "controller worker started");
    while let Ok(request) = rx.recv() {
        match request {
            Request::Ensure { resp_tx } => {
                let _ = resp_tx.send(controller.ensure_session());
            }
            Request::Execute { command, state, resp_tx } => {
                if state.compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire).is_err() {
                    debug!(%platform, %command, "withdrawn request skipped");
                    continue;
                }
                let _ = resp_tx.send(controller.execute(&command));
            }
            Request::Release { resp_tx } => {
                controller.release();
                let _ = resp_tx.send(());
            }
        }
    }
    controller.release();
    debug!(%platform, "controller worker stopped");
    let _ = done_tx.send(());
}
