//! The running pipeline: three named threads joined by channels.
//!
//! ```text
//!  gm-capture ──FrameQueue (drop oldest)──► gm-recognize ──bounded commands──► gm-dispatch
//!  FrameSource                              extract, classify,                 Dispatcher
//!                                           stabilize, map                     └─► active controller
//! ```
//!
//! | Channel | Full | Closed |
//! |---|---|---|
//! | frames | oldest frame dropped, `FramesDropped` once per burst | recognizer drains, then exits |
//! | commands | producer blocks for `busy_timeout`, reports `ControllerBusy`, keeps waiting | dispatcher reports `SourceClosed` |
//! | control | unbounded | dispatcher shuts down |
//! | events | event dropped and counted in `events_dropped` | events discarded |
//!
//! A committed command is never dropped by backpressure. The dispatcher
//! handles control messages before the next queued command, so a platform
//! switch lands between two `execute` calls and never during one.
//! Events are diagnostics: a consumer that stops reading loses them and
//! never stalls a pipeline thread.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError, TrySendError};
use thiserror::Error;
use tracing::{debug, info, warn};

use hand_gesture::{
    FrameSource, GestureEvent, Handedness, LandmarkEngine, LandmarkExtractor, Recognizer, SourceError, Timestamped,
};
use media_control::{
    ControllerRegistry, ControllerSession, DispatchOutcome, Dispatcher, ExecError, MediaCommand, Platform,
    RegistryError, SkipReason,
};

use crate::config::{Config, ConfigError};
use crate::mapper::CommandMapper;
use crate::queue::FrameQueue;

/// Events held for a slow consumer before new ones are dropped.
pub const EVENT_BUFFER: usize = 1024;

/// How often idle loops look at the stop flag.
const TICK: Duration = Duration::from_millis(20);

/// Back-off while the source reports itself unavailable.
const UNAVAILABLE_RETRY: Duration = Duration::from_millis(100);

// ════════════════════════════════════════════════════════════════════════════
// Diagnostics
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The gesture has no entry in the mapping table.
    NoMapping,
    /// The active platform cannot perform this kind of command.
    Unsupported { platform: Platform },
    NoActiveController,
}

/// Everything the pipeline reports while it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    GestureFired(GestureEvent),
    HandLost { hand: Handedness },
    CommandDispatched { platform: Platform, command: MediaCommand, attempts: u32 },
    CommandDropped { command: MediaCommand, reason: DropReason },
    /// Retries exhausted; the controller stays active.
    ControllerFailure { platform: Platform, command: MediaCommand, error: ExecError, attempts: u32 },
    /// Session could not be recovered; reselect the platform to resume.
    ControllerDeactivated { platform: Platform, command: MediaCommand, reason: String },
    PlatformSwitched { from: Option<Platform>, to: Platform },
    SwitchFailed { platform: Platform, error: String },
    /// The command queue stayed full past the busy timeout. The command is
    /// still waiting to be queued.
    ControllerBusy { command: MediaCommand },
    /// Start of a burst of dropped frames; `total` counts all drops so far.
    FramesDropped { total: u64 },
    /// Every captured frame and every command has been processed.
    SourceClosed,
    /// Commands still queued at stop were discarded.
    Stopped { discarded: usize },
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use PipelineEvent::*;
        match self {
            GestureFired(e) => write!(f, "gesture   {} hand: {} (streak {})", e.hand, e.label, e.streak),
            HandLost { hand } => write!(f, "hand lost {hand}"),
            CommandDispatched { platform, command, attempts } => {
                write!(f, "command   {command} → {platform} ({attempts} attempt(s))")
            }
            CommandDropped { command, reason } => match reason {
                DropReason::NoMapping => write!(f, "dropped   {command}: no mapping"),
                DropReason::Unsupported { platform } => write!(f, "dropped   {command}: unsupported on {platform}"),
                DropReason::NoActiveController => write!(f, "dropped   {command}: no active controller"),
            },
            ControllerFailure { platform, command, error, attempts } => {
                write!(f, "failed    {command} on {platform} after {attempts} attempt(s): {error}")
            }
            ControllerDeactivated { platform, reason, .. } => {
                write!(f, "inactive  {platform}: {reason} (reselect to resume)")
            }
            PlatformSwitched { from: Some(from), to } => write!(f, "platform  {from} → {to}"),
            PlatformSwitched { from: None, to } => write!(f, "platform  {to}"),
            SwitchFailed { platform, error } => write!(f, "platform  {platform} unavailable: {error}"),
            ControllerBusy { command } => write!(f, "busy      {command} waiting for the controller"),
            FramesDropped { total } => write!(f, "lagging   {total} frame(s) dropped so far"),
            SourceClosed => write!(f, "source closed"),
            Stopped { discarded } => write!(f, "stopped   ({discarded} queued command(s) discarded)"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Frame source or landmark engine unavailable at startup.
    #[error("pipeline cannot start: {0}")]
    Fatal(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Switch(#[from] RegistryError),
    #[error("pipeline is stopped")]
    Stopped,
}

// ════════════════════════════════════════════════════════════════════════════
// Counters
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Counters {
    frames_captured:     AtomicU64,
    frames_dropped:      AtomicU64,
    frames_processed:    AtomicU64,
    detection_errors:    AtomicU64,
    malformed_hands:     AtomicU64,
    gestures_fired:      AtomicU64,
    commands_dispatched: AtomicU64,
    commands_dropped:    AtomicU64,
    commands_failed:     AtomicU64,
    events_dropped:      AtomicU64,
}

fn bump(counter: &AtomicU64, by: u64) -> u64 {
    counter.fetch_add(by, Ordering::Relaxed) + by
}

/// Point-in-time copy of the running counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_captured:     u64,
    pub frames_dropped:      u64,
    pub frames_processed:    u64,
    pub detection_errors:    u64,
    pub malformed_hands:     u64,
    pub gestures_fired:      u64,
    pub commands_dispatched: u64,
    pub commands_dropped:    u64,
    pub commands_failed:     u64,
    pub events_dropped:      u64,
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PipelineStats {
            frames_captured:     get(&self.frames_captured),
            frames_dropped:      get(&self.frames_dropped),
            frames_processed:    get(&self.frames_processed),
            detection_errors:    get(&self.detection_errors),
            malformed_hands:     get(&self.malformed_hands),
            gestures_fired:      get(&self.gestures_fired),
            commands_dispatched: get(&self.commands_dispatched),
            commands_dropped:    get(&self.commands_dropped),
            commands_failed:     get(&self.commands_failed),
            events_dropped:      get(&self.events_dropped),
        }
    }
}

/// State shared by all three threads.
#[derive(Clone)]
struct Shared {
    stop:     Arc<AtomicBool>,
    counters: Arc<Counters>,
    events:   Sender<PipelineEvent>,
}

impl Shared {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn emit(&self, event: PipelineEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                if bump(&self.counters.events_dropped, 1) == 1 {
                    warn!(%event, "event consumer is behind; dropping events");
                }
            }
            // nobody listening is fine
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

enum Control {
    Select { platform: Platform, reply: Sender<Result<ControllerSession, RegistryError>> },
    Stop,
}

// ════════════════════════════════════════════════════════════════════════════
// Pipeline
// ════════════════════════════════════════════════════════════════════════════

pub struct Pipeline;

impl Pipeline {
    /// Open the source, load the engine, activate `config.platform` and spawn
    /// the pipeline threads.
    ///
    /// Only an unusable config, source or engine fails startup. A platform
    /// that cannot be activated is reported as `SwitchFailed` on the event
    /// stream and the pipeline runs without an active controller until one
    /// is selected.
    pub fn start<S, E>(
        config: Config,
        mut source: S,
        engine: E,
        registry: ControllerRegistry,
    ) -> Result<PipelineHandle, PipelineError>
    where
        S: FrameSource,
        E: LandmarkEngine<Frame = S::Frame>,
    {
        config.validate()?;

        source
            .open()
            .map_err(|e| PipelineError::Fatal(format!("frame source: {e}")))?;
        let mut extractor = LandmarkExtractor::new(engine, config.capture.max_hands);
        if let Err(e) = extractor.load() {
            source.close();
            return Err(PipelineError::Fatal(format!("landmark engine: {e}")));
        }

        let (events_tx, events_rx) = crossbeam_channel::bounded(EVENT_BUFFER);
        let shared = Shared {
            stop:     Arc::new(AtomicBool::new(false)),
            counters: Arc::new(Counters::default()),
            events:   events_tx,
        };

        let mut dispatcher = Dispatcher::new(registry, config.retry_policy());
        match dispatcher.select(config.platform, config.switch_timeout()) {
            Ok(_) => shared.emit(PipelineEvent::PlatformSwitched { from: None, to: config.platform }),
            Err(e) => {
                warn!(platform = %config.platform, error = %e, "initial platform unavailable");
                shared.emit(PipelineEvent::SwitchFailed { platform: config.platform, error: e.to_string() });
            }
        }

        let (frames, frames_rx) = FrameQueue::bounded(config.capture.frame_queue);
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(config.dispatch.command_queue);
        let (control_tx, control_rx) = crossbeam_channel::unbounded();

        let mut handle = PipelineHandle {
            control:  control_tx,
            events:   events_rx,
            stop:     Arc::clone(&shared.stop),
            counters: Arc::clone(&shared.counters),
            threads:  Vec::with_capacity(3),
        };

        let dispatch = DispatchStage {
            dispatcher,
            commands: cmd_rx,
            control: control_rx,
            switch_timeout: config.switch_timeout(),
            shared: shared.clone(),
        };
        handle.spawn("gm-dispatch", move || dispatch.run())?;

        let recognize = RecognizeStage {
            extractor,
            recognizer: Recognizer::new(
                config.classifier.clone(),
                config.stabilizer.clone(),
                config.capture.motion_window,
            ),
            mapper: CommandMapper::from_rules(&config.mapping),
            frames: frames_rx,
            commands: cmd_tx,
            busy_timeout: config.busy_timeout(),
            shared: shared.clone(),
        };
        handle.spawn("gm-recognize", move || recognize.run())?;

        let poll = config.poll_interval();
        handle.spawn("gm-capture", move || capture(source, frames, poll, shared))?;

        info!(platform = %config.platform, "pipeline started");
        Ok(handle)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PipelineHandle
// ════════════════════════════════════════════════════════════════════════════

/// Control surface of a running pipeline. Dropping it stops the pipeline
/// and waits for the threads.
pub struct PipelineHandle {
    control:  Sender<Control>,
    events:   Receiver<PipelineEvent>,
    stop:     Arc<AtomicBool>,
    counters: Arc<Counters>,
    threads:  Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    fn spawn<F>(&mut self, name: &str, f: F) -> Result<(), PipelineError>
    where
        F: FnOnce() + Send + 'static,
    {
        match thread::Builder::new().name(name.to_string()).spawn(f) {
            Ok(join) => {
                self.threads.push(join);
                Ok(())
            }
            Err(e) => {
                // Drop stops whatever already started.
                Err(PipelineError::Fatal(format!("spawn {name}: {e}")))
            }
        }
    }

    /// Switch the active platform. Blocks until the incoming session is up
    /// (or failed) and the outgoing one has been released.
    pub fn select_platform(&self, platform: Platform) -> Result<ControllerSession, PipelineError> {
        let (reply, reply_rx) = crossbeam_channel::bounded(1);
        self.control
            .send(Control::Select { platform, reply })
            .map_err(|_| PipelineError::Stopped)?;
        let result = reply_rx.recv().map_err(|_| PipelineError::Stopped)?;
        Ok(result?)
    }

    /// Diagnostic stream. Ends once every pipeline thread has exited.
    pub fn events(&self) -> Receiver<PipelineEvent> {
        self.events.clone()
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Ask every thread to wind down. In-flight controller calls are allowed
    /// to finish or time out; queued commands are discarded.
    pub fn stop(&self) {
        if !self.stop.swap(true, Ordering::AcqRel) {
            info!("pipeline stopping");
        }
        let _ = self.control.send(Control::Stop);
    }

    /// Wait for the threads to exit and return the final counters. Call
    /// [`stop`](Self::stop) first unless the source is finite.
    pub fn join(mut self) -> PipelineStats {
        self.join_threads();
        self.stats()
    }

    fn join_threads(&mut self) {
        for join in std::mem::take(&mut self.threads) {
            let name = join.thread().name().unwrap_or("pipeline").to_string();
            if join.join().is_err() {
                warn!(thread = %name, "pipeline thread panicked");
            }
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        if self.threads.is_empty() {
            return;
        }
        self.stop();
        self.join_threads();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Capture
// ════════════════════════════════════════════════════════════════════════════

fn capture<S: FrameSource>(mut source: S, frames: FrameQueue<S::Frame>, poll: Duration, shared: Shared) {
    let counters = &shared.counters;
    let mut in_burst = false;
    while !shared.stopping() {
        match source.next_frame() {
            Ok(Some(frame)) => {
                bump(&counters.frames_captured, 1);
                let dropped = frames.push(frame);
                if dropped == 0 {
                    in_burst = false;
                    continue;
                }
                let total = bump(&counters.frames_dropped, dropped as u64);
                if !in_burst {
                    in_burst = true;
                    debug!(total, "recognizer lagging, dropping frames");
                    shared.emit(PipelineEvent::FramesDropped { total });
                }
            }
            Ok(None) => thread::sleep(poll),
            Err(SourceError::Unavailable(msg)) => {
                warn!(error = %msg, "frame source unavailable; retrying");
                thread::sleep(UNAVAILABLE_RETRY);
            }
            Err(SourceError::Closed) => {
                info!("frame source exhausted");
                break;
            }
        }
    }
    source.close();
    debug!("capture stopped");
}

// ════════════════════════════════════════════════════════════════════════════
// Recognize
// ════════════════════════════════════════════════════════════════════════════

struct RecognizeStage<E: LandmarkEngine> {
    extractor:    LandmarkExtractor<E>,
    recognizer:   Recognizer,
    mapper:       CommandMapper,
    frames:       Receiver<E::Frame>,
    commands:     Sender<MediaCommand>,
    busy_timeout: Duration,
    shared:       Shared,
}

impl<E> RecognizeStage<E>
where
    E: LandmarkEngine,
    E::Frame: Timestamped,
{
    fn run(mut self) {
        while !self.shared.stopping() {
            match self.frames.recv_timeout(TICK) {
                Ok(frame) => {
                    if !self.process(&frame) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("recognizer stopped");
    }

    /// Returns false once the commands channel can no longer accept work.
    fn process(&mut self, frame: &E::Frame) -> bool {
        let counters = Arc::clone(&self.shared.counters);
        let now = frame.timestamp();
        // before observing, so a hand back from a stall starts over
        for hand in self.recognizer.evict_stale(now) {
            self.shared.emit(PipelineEvent::HandLost { hand });
        }
        match self.extractor.extract(frame) {
            Ok(extraction) => {
                bump(&counters.malformed_hands, extraction.malformed as u64);
                for hand in &extraction.hands {
                    let (_, fired) = self.recognizer.observe(hand);
                    let Some(event) = fired else { continue };
                    bump(&counters.gestures_fired, 1);
                    debug!(hand = %event.hand, label = %event.label, "gesture");
                    self.shared.emit(PipelineEvent::GestureFired(event));

                    let command = self.mapper.map(&event);
                    if command.is_noop() {
                        bump(&counters.commands_dropped, 1);
                        debug!(label = %event.label, "no mapping");
                        self.shared.emit(PipelineEvent::CommandDropped { command, reason: DropReason::NoMapping });
                    } else if !self.submit(command) {
                        return false;
                    }
                }
            }
            Err(e) => {
                bump(&counters.detection_errors, 1);
                warn!(error = %e, ?now, "detection failed; frame skipped");
            }
        }
        bump(&counters.frames_processed, 1);
        true
    }

    /// Queue a committed command, waiting as long as it takes. Only a stop
    /// or a vanished dispatcher gives up on it.
    fn submit(&self, mut command: MediaCommand) -> bool {
        let mut reported = false;
        loop {
            match self.commands.send_timeout(command, self.busy_timeout) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(back)) => {
                    command = back;
                    if self.shared.stopping() {
                        debug!(%command, "stopping; command not queued");
                        return false;
                    }
                    if !reported {
                        reported = true;
                        warn!(%command, "controller busy; holding command");
                        self.shared.emit(PipelineEvent::ControllerBusy { command });
                    }
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Dispatch
// ════════════════════════════════════════════════════════════════════════════

struct DispatchStage {
    dispatcher:     Dispatcher,
    commands:       Receiver<MediaCommand>,
    control:        Receiver<Control>,
    switch_timeout: Duration,
    shared:         Shared,
}

impl DispatchStage {
    fn run(self) {
        let DispatchStage { mut dispatcher, commands, control, switch_timeout, shared } = self;
        let mut commands_open = true;
        loop {
            let message = match control.try_recv() {
                Ok(c) => c,
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) if !commands_open => match control.recv() {
                    Ok(c) => c,
                    Err(_) => break,
                },
                Err(TryRecvError::Empty) => crossbeam_channel::select! {
                    recv(control) -> msg => {
                        let Ok(c) = msg else { break };
                        c
                    }
                    recv(commands) -> msg => {
                        match msg {
                            Ok(command) => dispatch(&mut dispatcher, &shared, command),
                            Err(_) => {
                                commands_open = false;
                                if !shared.stopping() {
                                    info!("all frames processed");
                                    shared.emit(PipelineEvent::SourceClosed);
                                }
                            }
                        }
                        continue;
                    }
                },
            };
            match message {
                Control::Select { platform, reply } => {
                    let from = dispatcher.active_platform();
                    let result = dispatcher.select(platform, switch_timeout);
                    match &result {
                        Ok(_) => shared.emit(PipelineEvent::PlatformSwitched { from, to: platform }),
                        Err(e) => {
                            warn!(%platform, error = %e, "platform switch failed");
                            shared.emit(PipelineEvent::SwitchFailed { platform, error: e.to_string() });
                        }
                    }
                    let _ = reply.send(result);
                }
                Control::Stop => break,
            }
        }

        let discarded = commands.try_iter().count();
        if discarded > 0 {
            info!(discarded, "queued commands discarded");
        }
        dispatcher.shutdown(switch_timeout);
        shared.emit(PipelineEvent::Stopped { discarded });
        debug!("dispatcher stopped");
    }
}

fn dispatch(dispatcher: &mut Dispatcher, shared: &Shared, command: MediaCommand) {
    let counters = &shared.counters;
    let event = match dispatcher.dispatch(command) {
        DispatchOutcome::Executed { platform, attempts, .. } => {
            bump(&counters.commands_dispatched, 1);
            PipelineEvent::CommandDispatched { platform, command, attempts }
        }
        DispatchOutcome::Skipped(reason) => {
            bump(&counters.commands_dropped, 1);
            let reason = match reason {
                SkipReason::NoOp => DropReason::NoMapping,
                SkipReason::NoActiveController => DropReason::NoActiveController,
                SkipReason::Unsupported { platform, .. } => DropReason::Unsupported { platform },
            };
            PipelineEvent::CommandDropped { command, reason }
        }
        DispatchOutcome::Failed { platform, error, attempts } => {
            bump(&counters.commands_failed, 1);
            PipelineEvent::ControllerFailure { platform, command, error, attempts }
        }
        DispatchOutcome::Deactivated { platform, reason } => {
            bump(&counters.commands_failed, 1);
            PipelineEvent::ControllerDeactivated { platform, command, reason }
        }
    };
    shared.emit(event);
}
