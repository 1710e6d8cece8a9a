//! Dispatcher: routes commands to the active controller and owns the retry
//! policy.
//!
//! | Failure | Handling |
//! |---|---|
//! | `Unsupported` | pre-checked against the capability set; never sent, never retried |
//! | `TransportFailure` | retried with exponential backoff; surfaced after `max_attempts` failures |
//! | no reply, call withdrawn unperformed | treated as a transport failure |
//! | no reply, call running past the in-flight grace | surfaced at once; never retried, it may still land |
//! | `SessionExpired` | one `ensure_session` then one more try; a second failure deactivates the controller |

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::command::{CommandKind, MediaCommand};
use crate::controller::{Ack, ControllerSession, ExecError, Platform};
use crate::registry::{ControllerRegistry, RegistryError};
use crate::worker::CallError;

// ════════════════════════════════════════════════════════════════════════════
// RetryPolicy
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// K: transport failures tolerated before giving up (total attempts).
    pub max_attempts:    u32,
    pub backoff_base:    Duration,
    pub backoff_max:     Duration,
    /// Deadline for one `execute` or `ensure_session` round trip.
    pub execute_timeout: Duration,
    /// Extra wait for an `execute` that is already running at its deadline.
    pub inflight_grace:  Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts:    3,
            backoff_base:    Duration::from_millis(100),
            backoff_max:     Duration::from_secs(1),
            execute_timeout: Duration::from_secs(3),
            inflight_grace:  Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `failures`-th consecutive failure: base, 2·base,
    /// 4·base, ... capped at `backoff_max`.
    pub fn backoff(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << shift).min(self.backoff_max)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DispatchOutcome
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoOp,
    NoActiveController,
    Unsupported { platform: Platform, kind: CommandKind },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Executed    { platform: Platform, ack: Ack, attempts: u32 },
    /// Never reached a controller.
    Skipped(SkipReason),
    /// Gave up after retrying; the controller stays active.
    Failed      { platform: Platform, error: ExecError, attempts: u32 },
    /// The session could not be recovered; the controller is inactive until
    /// reselected.
    Deactivated { platform: Platform, reason: String },
}

// ════════════════════════════════════════════════════════════════════════════
// Dispatcher
// ════════════════════════════════════════════════════════════════════════════

pub struct Dispatcher {
    registry: ControllerRegistry,
    policy:   RetryPolicy,
}

impl Dispatcher {
    pub fn new(registry: ControllerRegistry, policy: RetryPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn registry(&self) -> &ControllerRegistry { &self.registry }
    pub fn policy(&self)   -> &RetryPolicy        { &self.policy }

    pub fn active_platform(&self) -> Option<Platform> {
        self.registry.active_platform()
    }

    /// Switch the active controller. Runs between two dispatches, so no
    /// command is routed mid-switch.
    pub fn select(&mut self, platform: Platform, timeout: Duration) -> Result<ControllerSession, RegistryError> {
        self.registry.switch(platform, timeout)
    }

    pub fn dispatch(&mut self, command: MediaCommand) -> DispatchOutcome {
        if command.is_noop() {
            return DispatchOutcome::Skipped(SkipReason::NoOp);
        }
        let Some(worker) = self.registry.active() else {
            debug!(%command, "no active controller");
            return DispatchOutcome::Skipped(SkipReason::NoActiveController);
        };
        let platform = worker.platform();
        if !worker.capabilities().contains(command.kind) {
            info!(%platform, %command, "unsupported on this platform; dropped");
            return DispatchOutcome::Skipped(SkipReason::Unsupported { platform, kind: command.kind });
        }

        let timeout = self.policy.execute_timeout;
        let mut attempts = 0u32;
        let mut transport_failures = 0u32;
        let mut reconnected = false;
        let reason = loop {
            attempts += 1;
            let failure = match worker.execute(command, timeout, self.policy.inflight_grace) {
                Ok(ack) => {
                    debug!(%platform, %command, attempts, "executed");
                    return DispatchOutcome::Executed { platform, ack, attempts };
                }
                Err(e @ CallError::Abandoned(_)) => {
                    warn!(%platform, %command, attempts, error = %e, "no answer; not retrying");
                    return DispatchOutcome::Failed {
                        platform,
                        error: ExecError::TransportFailure(e.to_string()),
                        attempts,
                    };
                }
                Err(e @ CallError::Withdrawn(_)) => e.to_string(),
                Err(CallError::Exec(ExecError::TransportFailure(msg))) => msg,
                Err(CallError::Exec(ExecError::Unsupported(kind))) => {
                    info!(%platform, %kind, "controller refused command; dropped");
                    return DispatchOutcome::Skipped(SkipReason::Unsupported { platform, kind });
                }
                Err(CallError::Exec(ExecError::SessionExpired)) => {
                    if reconnected {
                        break "session expired again after reconnect".to_string();
                    }
                    reconnected = true;
                    info!(%platform, "session expired, reconnecting");
                    if let Err(e) = worker.ensure_session(timeout) {
                        break format!("reconnect failed: {e}");
                    }
                    continue;
                }
            };

            transport_failures += 1;
            if transport_failures >= self.policy.max_attempts {
                warn!(%platform, %command, attempts, error = %failure, "giving up");
                return DispatchOutcome::Failed {
                    platform,
                    error: ExecError::TransportFailure(failure),
                    attempts,
                };
            }
            let delay = self.policy.backoff(transport_failures);
            warn!(%platform, %command, attempt = attempts, error = %failure, ?delay, "transport failure, retrying");
            thread::sleep(delay);
        };

        self.registry.deactivate();
        warn!(%platform, %command, %reason, "controller deactivated until reselected");
        DispatchOutcome::Deactivated { platform, reason }
    }

    pub fn shutdown(&mut self, timeout: Duration) {
        self.registry.shutdown(timeout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::automation::{Key, UiAction};
    use crate::command::Capabilities;
    use crate::controller::{ConnectError, MediaController, SessionHandle};

    /// Controller that replays scripted results and counts calls.
    #[derive(Clone)]
    struct Scripted {
        platform:     Platform,
        capabilities: Capabilities,
        results:      Arc<Mutex<VecDeque<Result<(), ExecError>>>>,
        connects:     Arc<Mutex<VecDeque<Result<(), ConnectError>>>>,
        executed:     Arc<AtomicUsize>,
        ensured:      Arc<AtomicUsize>,
        delay:        Duration,
    }

    impl Scripted {
        fn new(platform: Platform, capabilities: Capabilities) -> Self {
            Self {
                platform,
                capabilities,
                results:  Arc::default(),
                connects: Arc::default(),
                executed: Arc::default(),
                ensured:  Arc::default(),
                delay:    Duration::ZERO,
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn then(&self, r: Result<(), ExecError>) -> &Self {
            self.results.lock().push_back(r);
            self
        }

        fn executed(&self) -> usize { self.executed.load(Ordering::SeqCst) }
        fn ensured(&self)  -> usize { self.ensured.load(Ordering::SeqCst) }
    }

    impl MediaController for Scripted {
        fn platform(&self) -> Platform { self.platform }
        fn capabilities(&self) -> Capabilities { self.capabilities }
        fn ensure_session(&mut self) -> Result<ControllerSession, ConnectError> {
            self.ensured.fetch_add(1, Ordering::SeqCst);
            self.connects.lock().pop_front().unwrap_or(Ok(()))?;
            Ok(ControllerSession {
                platform:     self.platform,
                handle:       SessionHandle(format!("{}-session", self.platform)),
                capabilities: self.capabilities,
            })
        }
        fn execute(&mut self, command: &MediaCommand) -> Result<Ack, ExecError> {
            self.executed.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            self.results.lock().pop_front().unwrap_or(Ok(()))?;
            Ok(Ack { platform: self.platform, kind: command.kind, action: UiAction::key(Key::Space) })
        }
        fn release(&mut self) {}
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts:    3,
            backoff_base:    Duration::from_millis(1),
            backoff_max:     Duration::from_millis(4),
            execute_timeout: Duration::from_secs(1),
            inflight_grace:  Duration::from_secs(2),
        }
    }

    fn dispatcher(controllers: &[&Scripted]) -> Dispatcher {
        let mut registry = ControllerRegistry::new();
        for c in controllers {
            registry.register(Box::new((*c).clone())).unwrap();
        }
        let mut d = Dispatcher::new(registry, policy());
        d.select(controllers[0].platform, Duration::from_secs(1)).unwrap();
        d
    }

    fn transport() -> ExecError {
        ExecError::TransportFailure("connection reset".into())
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let p = RetryPolicy {
            backoff_base: Duration::from_millis(100),
            backoff_max:  Duration::from_millis(350),
            ..RetryPolicy::default()
        };
        assert_eq!(p.backoff(1), Duration::from_millis(100));
        assert_eq!(p.backoff(2), Duration::from_millis(200));
        assert_eq!(p.backoff(3), Duration::from_millis(350));
        assert_eq!(p.backoff(40), Duration::from_millis(350));
    }

    #[test]
    fn unsupported_command_never_reaches_execute() {
        let yt = Scripted::new(Platform::YouTube, Capabilities::all().without(&[CommandKind::SeekForward]));
        let mut d = dispatcher(&[&yt]);
        let out = d.dispatch(MediaCommand::with_param(CommandKind::SeekForward, 10.0));
        assert_eq!(
            out,
            DispatchOutcome::Skipped(SkipReason::Unsupported { platform: Platform::YouTube, kind: CommandKind::SeekForward })
        );
        assert_eq!(yt.executed(), 0);
    }

    #[test]
    fn transport_failure_stops_after_k_attempts() {
        let yt = Scripted::new(Platform::YouTube, Capabilities::all());
        yt.then(Err(transport())).then(Err(transport())).then(Err(transport())).then(Err(transport()));
        let mut d = dispatcher(&[&yt]);
        let out = d.dispatch(MediaCommand::new(CommandKind::PlayPause));
        assert!(matches!(out, DispatchOutcome::Failed { attempts: 3, error: ExecError::TransportFailure(_), .. }));
        assert_eq!(yt.executed(), 3, "no fourth attempt");
        // the controller is still active
        assert_eq!(d.active_platform(), Some(Platform::YouTube));
    }

    #[test]
    fn slow_reply_is_awaited_and_actuated_once() {
        let yt = Scripted::new(Platform::YouTube, Capabilities::all()).slow(Duration::from_millis(150));
        let mut d = dispatcher(&[&yt]);
        d.policy.execute_timeout = Duration::from_millis(50);
        let out = d.dispatch(MediaCommand::new(CommandKind::VolumeUp));
        assert!(matches!(out, DispatchOutcome::Executed { attempts: 1, .. }), "{out:?}");
        assert_eq!(yt.executed(), 1);
    }

    #[test]
    fn unanswered_call_fails_without_a_second_actuation() {
        let yt = Scripted::new(Platform::YouTube, Capabilities::all()).slow(Duration::from_millis(300));
        let mut d = dispatcher(&[&yt]);
        d.policy.execute_timeout = Duration::from_millis(20);
        d.policy.inflight_grace = Duration::from_millis(30);
        let out = d.dispatch(MediaCommand::new(CommandKind::VolumeUp));
        assert!(matches!(out, DispatchOutcome::Failed { attempts: 1, .. }), "{out:?}");
        thread::sleep(Duration::from_millis(400));
        assert_eq!(yt.executed(), 1);
    }

    #[test]
    fn transient_failure_then_success() {
        let yt = Scripted::new(Platform::YouTube, Capabilities::all());
        yt.then(Err(transport()));
        let mut d = dispatcher(&[&yt]);
        let out = d.dispatch(MediaCommand::new(CommandKind::Next));
        assert!(matches!(out, DispatchOutcome::Executed { attempts: 2, .. }));
    }

    #[test]
    fn controller_refusal_is_not_retried() {
        let yt = Scripted::new(Platform::YouTube, Capabilities::all());
        yt.then(Err(ExecError::Unsupported(CommandKind::Mute)));
        let mut d = dispatcher(&[&yt]);
        let out = d.dispatch(MediaCommand::new(CommandKind::Mute));
        assert!(matches!(out, DispatchOutcome::Skipped(SkipReason::Unsupported { .. })));
        assert_eq!(yt.executed(), 1);
    }

    #[test]
    fn expired_session_reconnects_and_retries_once() {
        let yt = Scripted::new(Platform::YouTube, Capabilities::all());
        yt.then(Err(ExecError::SessionExpired));
        let mut d = dispatcher(&[&yt]);
        let ensured_before = yt.ensured();
        let out = d.dispatch(MediaCommand::new(CommandKind::VolumeUp));
        assert!(matches!(out, DispatchOutcome::Executed { attempts: 2, .. }));
        assert_eq!(yt.ensured(), ensured_before + 1);
    }

    #[test]
    fn repeated_expiry_deactivates_until_reselected() {
        let yt = Scripted::new(Platform::YouTube, Capabilities::all());
        yt.then(Err(ExecError::SessionExpired)).then(Err(ExecError::SessionExpired));
        let mut d = dispatcher(&[&yt]);
        let out = d.dispatch(MediaCommand::new(CommandKind::VolumeUp));
        assert!(matches!(out, DispatchOutcome::Deactivated { platform: Platform::YouTube, .. }));
        assert_eq!(yt.executed(), 2);

        let out = d.dispatch(MediaCommand::new(CommandKind::VolumeUp));
        assert_eq!(out, DispatchOutcome::Skipped(SkipReason::NoActiveController));
        assert_eq!(yt.executed(), 2);

        d.select(Platform::YouTube, Duration::from_secs(1)).unwrap();
        assert!(matches!(d.dispatch(MediaCommand::new(CommandKind::VolumeUp)), DispatchOutcome::Executed { .. }));
    }

    #[test]
    fn failed_reconnect_deactivates() {
        let yt = Scripted::new(Platform::YouTube, Capabilities::all());
        yt.then(Err(ExecError::SessionExpired));
        let mut d = dispatcher(&[&yt]);
        yt.connects.lock().push_back(Err(ConnectError::Timeout));
        let out = d.dispatch(MediaCommand::new(CommandKind::PlayPause));
        match out {
            DispatchOutcome::Deactivated { reason, .. } => assert!(reason.contains("reconnect failed")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(yt.executed(), 1);
    }

    #[test]
    fn switch_routes_subsequent_commands_to_new_controller() {
        let yt = Scripted::new(Platform::YouTube, Capabilities::all());
        let sp = Scripted::new(Platform::Spotify, Capabilities::all());
        let mut d = dispatcher(&[&yt, &sp]);
        d.dispatch(MediaCommand::new(CommandKind::PlayPause));
        d.select(Platform::Spotify, Duration::from_secs(1)).unwrap();
        for _ in 0..3 {
            let out = d.dispatch(MediaCommand::new(CommandKind::Next));
            assert!(matches!(out, DispatchOutcome::Executed { platform: Platform::Spotify, .. }));
        }
        assert_eq!(yt.executed(), 1);
        assert_eq!(sp.executed(), 3);
    }

    #[test]
    fn noop_is_skipped() {
        let yt = Scripted::new(Platform::YouTube, Capabilities::all());
        let mut d = dispatcher(&[&yt]);
        assert_eq!(d.dispatch(MediaCommand::noop()), DispatchOutcome::Skipped(SkipReason::NoOp));
        assert_eq!(yt.executed(), 0);
    }
}
