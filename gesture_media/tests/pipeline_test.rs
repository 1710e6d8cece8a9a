//! End-to-end runs of the threaded pipeline over scripted and hand-fed
//! frame sources, with dry-run automation engines standing in for browsers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use gesture_media::{
    Config, DropReason, MappingRule, Pipeline, PipelineError, PipelineEvent, PipelineHandle, PipelineStats,
    SimEngine, SimFrame, SimHand, SimSource,
};
use hand_gesture::{
    DetectedHand, DetectionError, FrameSource, GestureLabel, Handedness, LandmarkEngine, SourceError,
};
use media_control::{
    controller_for, Ack, AutomationError, Capabilities, CommandKind, ConnectError, ControllerRegistry,
    ControllerSession, DryRunAutomation, ExecError, Key, MediaCommand, MediaController, Platform, SessionHandle,
    UiAction,
};

const DEADLINE: Duration = Duration::from_secs(10);

// ════════════════════════════════════════════════════════════════════════════
// Fixtures
// ════════════════════════════════════════════════════════════════════════════

fn config(platform: Platform) -> Config {
    let mut c = Config::default();
    c.platform = platform;
    // large enough that unpaced scripts never lose frames
    c.capture.frame_queue = 1024;
    c.dispatch.backoff_base_ms = 1;
    c.dispatch.backoff_max_ms = 4;
    c
}

/// Dry-run controllers for every platform, plus their engines.
fn rig() -> (ControllerRegistry, BTreeMap<Platform, DryRunAutomation>) {
    let mut registry = ControllerRegistry::new();
    let mut engines = BTreeMap::new();
    for platform in Platform::ALL {
        let engine = DryRunAutomation::new(platform.as_str());
        registry.register(controller_for(platform, engine.clone())).unwrap();
        engines.insert(platform, engine);
    }
    (registry, engines)
}

/// Frames pushed by the test; closes when the sender is dropped.
struct GatedSource(Receiver<SimFrame>);

impl FrameSource for GatedSource {
    type Frame = SimFrame;

    fn next_frame(&mut self) -> Result<Option<SimFrame>, SourceError> {
        match self.0.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SourceError::Closed),
        }
    }
}

fn gated() -> (Sender<SimFrame>, GatedSource) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (tx, GatedSource(rx))
}

fn fist_frame(index: u64) -> SimFrame {
    SimFrame {
        timestamp: Duration::from_millis(index * 40),
        hands:     vec![SimHand { handedness: Handedness::Right, pose: GestureLabel::Fist, origin: [0.5, 0.6] }],
        glitch:    false,
    }
}

/// Receive until `pred` matches, collecting everything seen.
fn wait_for(
    events: &Receiver<PipelineEvent>,
    seen: &mut Vec<PipelineEvent>,
    pred: impl Fn(&PipelineEvent) -> bool,
) -> bool {
    let deadline = Instant::now() + DEADLINE;
    while let Ok(event) = events.recv_deadline(deadline) {
        let hit = pred(&event);
        seen.push(event);
        if hit {
            return true;
        }
    }
    false
}

/// Let a finite source play out, stop, and collect every event.
fn finish(handle: PipelineHandle) -> (Vec<PipelineEvent>, PipelineStats) {
    let events = handle.events();
    let mut seen = Vec::new();
    assert!(
        wait_for(&events, &mut seen, |e| matches!(e, PipelineEvent::SourceClosed)),
        "source never closed: {seen:?}"
    );
    handle.stop();
    assert!(wait_for(&events, &mut seen, |e| matches!(e, PipelineEvent::Stopped { .. })));
    (seen, handle.join())
}

fn fired(events: &[PipelineEvent]) -> Vec<(GestureLabel, Duration)> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::GestureFired(g) => Some((g.label, g.fired_at)),
            _ => None,
        })
        .collect()
}

fn dispatched(events: &[PipelineEvent]) -> Vec<(Platform, CommandKind)> {
    events
        .iter()
        .filter_map(|e| match e {
            PipelineEvent::CommandDispatched { platform, command, .. } => Some((*platform, command.kind)),
            _ => None,
        })
        .collect()
}

fn presses(engine: &DryRunAutomation, key: Key) -> usize {
    engine
        .performed()
        .iter()
        .filter(|a| matches!(a, UiAction::Press { key: k, .. } if *k == key))
        .count()
}

// ════════════════════════════════════════════════════════════════════════════
// Recognition to dispatch
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn ten_fist_frames_dispatch_one_play_pause() {
    let (registry, engines) = rig();
    let source = SimSource::from_script("fist:10", 25).unwrap();
    let handle = Pipeline::start(config(Platform::YouTube), source, SimEngine, registry).unwrap();
    let (events, stats) = finish(handle);

    // fifth frame at 25 fps
    assert_eq!(fired(&events), vec![(GestureLabel::Fist, Duration::from_millis(160))]);
    assert_eq!(dispatched(&events), vec![(Platform::YouTube, CommandKind::PlayPause)]);
    assert_eq!(presses(&engines[&Platform::YouTube], Key::Char('k')), 1);
    assert_eq!(stats.frames_processed, 10);
    assert_eq!(stats.gestures_fired, 1);
    assert_eq!(stats.commands_dispatched, 1);
}

#[test]
fn cooldown_holds_back_repeat_until_window_passes() {
    let (registry, _engines) = rig();
    let mut cfg = config(Platform::YouTube);
    cfg.stabilizer.cooldown_ms = 2000;
    // fist through 1.56 s, hand gone, fist again from 2.12 s
    let source = SimSource::from_script("fist:40,none:13,fist:10", 25).unwrap();
    let handle = Pipeline::start(cfg, source, SimEngine, registry).unwrap();
    let (events, stats) = finish(handle);

    let fires = fired(&events);
    assert_eq!(fires.len(), 2, "{fires:?}");
    assert_eq!(fires[0].1, Duration::from_millis(160));
    assert!(fires[1].1 - fires[0].1 >= Duration::from_secs(2), "{fires:?}");
    assert!(events.contains(&PipelineEvent::HandLost { hand: Handedness::Right }));
    assert_eq!(stats.commands_dispatched, 2);
}

#[test]
fn unmapped_gesture_is_dropped_without_a_controller_call() {
    let (registry, engines) = rig();
    let mut cfg = config(Platform::YouTube);
    cfg.mapping = vec![MappingRule::new(GestureLabel::Peace, CommandKind::Next)];
    let source = SimSource::from_script("fist:10", 25).unwrap();
    let handle = Pipeline::start(cfg, source, SimEngine, registry).unwrap();
    let (events, stats) = finish(handle);

    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::CommandDropped { reason: DropReason::NoMapping, .. }
    )));
    assert_eq!(stats.commands_dispatched, 0);
    // only the navigation that opened the session
    assert_eq!(engines[&Platform::YouTube].performed().len(), 1);
}

#[test]
fn unsupported_seek_never_reaches_spotify() {
    let (registry, engines) = rig();
    let source = SimSource::from_script("swipe-right:12", 25).unwrap();
    let handle = Pipeline::start(config(Platform::Spotify), source, SimEngine, registry).unwrap();
    let (events, stats) = finish(handle);

    assert!(fired(&events).iter().any(|(label, _)| *label == GestureLabel::SwipeRight));
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::CommandDropped {
            command: MediaCommand { kind: CommandKind::SeekForward, .. },
            reason:  DropReason::Unsupported { platform: Platform::Spotify },
        }
    )));
    assert_eq!(stats.commands_dispatched, 0);
    let spotify = engines[&Platform::Spotify].performed();
    assert!(spotify.iter().all(|a| matches!(a, UiAction::Navigate(_))), "{spotify:?}");
}

#[test]
fn detection_errors_skip_frames_and_keep_running() {
    let (registry, _engines) = rig();
    let source = SimSource::from_script("glitch:3,fist:10,glitch:2", 25).unwrap();
    let handle = Pipeline::start(config(Platform::YouTube), source, SimEngine, registry).unwrap();
    let (events, stats) = finish(handle);

    assert_eq!(stats.detection_errors, 5);
    assert_eq!(stats.frames_processed, 15);
    assert_eq!(dispatched(&events), vec![(Platform::YouTube, CommandKind::PlayPause)]);
}

#[test]
fn two_hands_fire_independently() {
    let (registry, _engines) = rig();
    let source = SimSource::from_script("left/peace+right/thumbs-up:10", 25).unwrap();
    let handle = Pipeline::start(config(Platform::YouTube), source, SimEngine, registry).unwrap();
    let (events, _) = finish(handle);

    let mut kinds: Vec<_> = dispatched(&events).into_iter().map(|(_, k)| k).collect();
    kinds.sort();
    assert_eq!(kinds, vec![CommandKind::Next, CommandKind::VolumeUp]);
}

#[test]
fn hand_back_from_a_stall_starts_a_fresh_streak() {
    let (registry, engines) = rig();
    let (tx, source) = gated();
    let handle = Pipeline::start(config(Platform::YouTube), source, SimEngine, registry).unwrap();
    for i in 0..4 {
        tx.send(fist_frame(i)).unwrap();
    }
    // nothing arrives for five seconds of stream time
    let mut late = fist_frame(0);
    late.timestamp = Duration::from_millis(5000);
    tx.send(late).unwrap();
    drop(tx);
    let (events, stats) = finish(handle);

    assert!(fired(&events).is_empty(), "{events:?}");
    assert!(events.contains(&PipelineEvent::HandLost { hand: Handedness::Right }));
    assert_eq!(stats.frames_processed, 5);
    assert_eq!(stats.commands_dispatched, 0);
    assert_eq!(presses(&engines[&Platform::YouTube], Key::Char('k')), 0);
}

// ════════════════════════════════════════════════════════════════════════════
// Controllers
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn switch_mid_stream_routes_to_new_platform_only() {
    let (registry, engines) = rig();
    let mut cfg = config(Platform::YouTube);
    cfg.stabilizer.cooldown_ms = 0;
    let (frames, source) = gated();
    let handle = Pipeline::start(cfg, source, SimEngine, registry).unwrap();
    let events = handle.events();
    let mut seen = Vec::new();

    for i in 0..5 {
        frames.send(fist_frame(i)).unwrap();
    }
    assert!(wait_for(&events, &mut seen, |e| matches!(e, PipelineEvent::CommandDispatched { .. })));

    let session = handle.select_platform(Platform::TikTok).unwrap();
    assert_eq!(session.platform, Platform::TikTok);

    for i in 5..10 {
        frames.send(fist_frame(i)).unwrap();
    }
    assert!(wait_for(&events, &mut seen, |e| matches!(
        e,
        PipelineEvent::CommandDispatched { platform: Platform::TikTok, .. }
    )));
    drop(frames);
    let (rest, _) = finish(handle);
    seen.extend(rest);

    let switch_at = seen
        .iter()
        .position(|e| matches!(e, PipelineEvent::PlatformSwitched { to: Platform::TikTok, .. }))
        .unwrap();
    assert!(dispatched(&seen[switch_at..]).iter().all(|(p, _)| *p == Platform::TikTok));
    assert_eq!(presses(&engines[&Platform::YouTube], Key::Char('k')), 1);
    assert_eq!(presses(&engines[&Platform::TikTok], Key::Space), 1);
    // outgoing session was released at the switch
    assert_eq!(engines[&Platform::YouTube].journal().lock().closed.len(), 1);
}

#[test]
fn transport_failures_surface_after_k_attempts() {
    let (registry, engines) = rig();
    let (frames, source) = gated();
    let handle = Pipeline::start(config(Platform::YouTube), source, SimEngine, registry).unwrap();
    let youtube = &engines[&Platform::YouTube];
    for _ in 0..4 {
        youtube.fail_next(AutomationError::Timeout);
    }

    for i in 0..5 {
        frames.send(fist_frame(i)).unwrap();
    }
    drop(frames);
    let (events, stats) = finish(handle);

    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::ControllerFailure { platform: Platform::YouTube, attempts: 3, .. }
    )));
    assert_eq!(stats.commands_failed, 1);
    // the fourth injected failure was never consumed
    assert_eq!(youtube.journal().lock().fail_next.len(), 1);
}

#[test]
fn unavailable_initial_platform_is_reported_and_reselectable() {
    let (registry, engines) = rig();
    engines[&Platform::YouTube].fail_next(AutomationError::Unreachable("no browser".into()));
    let (frames, source) = gated();
    let handle = Pipeline::start(config(Platform::YouTube), source, SimEngine, registry).unwrap();
    let events = handle.events();
    let mut seen = Vec::new();

    assert!(wait_for(&events, &mut seen, |e| matches!(
        e,
        PipelineEvent::SwitchFailed { platform: Platform::YouTube, .. }
    )));
    for i in 0..5 {
        frames.send(fist_frame(i)).unwrap();
    }
    assert!(wait_for(&events, &mut seen, |e| matches!(
        e,
        PipelineEvent::CommandDropped { reason: DropReason::NoActiveController, .. }
    )));

    handle.select_platform(Platform::YouTube).unwrap();
    for i in 50..55 {
        frames.send(fist_frame(i)).unwrap();
    }
    drop(frames);
    let (rest, _) = finish(handle);
    assert_eq!(dispatched(&rest), vec![(Platform::YouTube, CommandKind::PlayPause)]);
}

#[test]
fn failed_switch_keeps_current_platform() {
    let (registry, engines) = rig();
    let (_frames, source) = gated();
    let handle = Pipeline::start(config(Platform::YouTube), source, SimEngine, registry).unwrap();
    engines[&Platform::Spotify].fail_next(AutomationError::Unreachable("offline".into()));

    let err = handle.select_platform(Platform::Spotify).unwrap_err();
    assert!(matches!(err, PipelineError::Switch(_)), "{err}");
    assert_eq!(engines[&Platform::YouTube].journal().lock().closed.len(), 0);
    handle.stop();
    let stats = handle.join();
    assert_eq!(stats.commands_failed, 0);
}

/// Controller that takes a while per command and records what it ran.
struct Sluggish {
    delay: Duration,
    ran:   Arc<Mutex<Vec<CommandKind>>>,
}

impl MediaController for Sluggish {
    fn platform(&self) -> Platform { Platform::YouTube }

    fn capabilities(&self) -> Capabilities { Capabilities::all() }

    fn ensure_session(&mut self) -> Result<ControllerSession, ConnectError> {
        Ok(ControllerSession {
            platform:     Platform::YouTube,
            handle:       SessionHandle("sluggish".into()),
            capabilities: Capabilities::all(),
        })
    }

    fn execute(&mut self, command: &MediaCommand) -> Result<Ack, ExecError> {
        thread::sleep(self.delay);
        self.ran.lock().push(command.kind);
        Ok(Ack { platform: Platform::YouTube, kind: command.kind, action: UiAction::key(Key::Space) })
    }

    fn release(&mut self) {}
}

#[test]
fn full_command_queue_reports_busy_but_loses_nothing() {
    let ran = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ControllerRegistry::new();
    registry
        .register(Box::new(Sluggish { delay: Duration::from_millis(150), ran: Arc::clone(&ran) }))
        .unwrap();

    let mut cfg = config(Platform::YouTube);
    cfg.stabilizer.confirm_frames = 1;
    cfg.stabilizer.cooldown_ms = 0;
    cfg.dispatch.command_queue = 1;
    cfg.dispatch.busy_timeout_ms = 20;
    // every frame commits a gesture
    let source = SimSource::from_script("fist:4", 25).unwrap();
    let handle = Pipeline::start(cfg, source, SimEngine, registry).unwrap();
    let (events, stats) = finish(handle);

    assert!(events.iter().any(|e| matches!(e, PipelineEvent::ControllerBusy { .. })));
    assert_eq!(stats.commands_dispatched, 4);
    assert_eq!(ran.lock().len(), 4);
}

// ════════════════════════════════════════════════════════════════════════════
// Lifecycle
// ════════════════════════════════════════════════════════════════════════════

struct BrokenEngine;

impl LandmarkEngine for BrokenEngine {
    type Frame = SimFrame;

    fn load(&mut self) -> Result<(), DetectionError> {
        Err(DetectionError::BackendUnavailable("model file missing".into()))
    }

    fn detect(&mut self, _: &SimFrame) -> Result<Vec<DetectedHand>, DetectionError> {
        Ok(Vec::new())
    }
}

struct DeadCamera;

impl FrameSource for DeadCamera {
    type Frame = SimFrame;

    fn open(&mut self) -> Result<(), SourceError> {
        Err(SourceError::Unavailable("/dev/video0 busy".into()))
    }

    fn next_frame(&mut self) -> Result<Option<SimFrame>, SourceError> {
        Err(SourceError::Closed)
    }
}

#[test]
fn unavailable_engine_or_source_is_fatal() {
    let (registry, _) = rig();
    let source = SimSource::from_script("fist:1", 25).unwrap();
    let err = Pipeline::start(config(Platform::YouTube), source, BrokenEngine, registry).err().unwrap();
    assert!(matches!(err, PipelineError::Fatal(ref m) if m.contains("model file missing")), "{err}");

    let (registry, _) = rig();
    let err = Pipeline::start(config(Platform::YouTube), DeadCamera, SimEngine, registry).err().unwrap();
    assert!(matches!(err, PipelineError::Fatal(_)), "{err}");
}

#[test]
fn invalid_config_is_rejected_before_anything_starts() {
    let (registry, engines) = rig();
    let mut cfg = config(Platform::YouTube);
    cfg.stabilizer.confirm_frames = 0;
    let source = SimSource::from_script("fist:1", 25).unwrap();
    let err = Pipeline::start(cfg, source, SimEngine, registry).err().unwrap();
    assert!(matches!(err, PipelineError::Config(_)), "{err}");
    assert!(engines[&Platform::YouTube].journal().lock().opened.is_empty());
}

#[test]
fn stop_releases_sessions_and_ends_the_event_stream() {
    let (registry, engines) = rig();
    let (_frames, source) = gated();
    let handle = Pipeline::start(config(Platform::TikTok), source, SimEngine, registry).unwrap();
    let events = handle.events();
    handle.stop();
    let stats = handle.join();

    assert_eq!(stats.frames_captured, 0);
    let tail: Vec<_> = events.try_iter().collect();
    assert!(matches!(tail.last(), Some(PipelineEvent::Stopped { discarded: 0 })), "{tail:?}");
    // every sender is gone once the threads have exited
    assert!(events.recv_timeout(Duration::from_millis(50)).is_err());
    let journal = engines[&Platform::TikTok].journal();
    let journal = journal.lock();
    assert_eq!(journal.opened.len(), 1);
    assert_eq!(journal.closed, journal.opened);
}
