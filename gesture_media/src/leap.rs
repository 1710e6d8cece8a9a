//! Leap Motion hardware source (`leap` feature).
//!
//! The LeapC connection lives on its own polling thread; tracking frames are
//! converted to the 21-point model there and handed to [`LeapSource`] over a
//! small channel. The device already delivers a skeleton, so [`LeapEngine`]
//! only passes the hands through.
//!
//! | Landmark | Leap joint |
//! |---|---|
//! | wrist | middle metacarpal, base |
//! | thumb CMC / MCP / IP / TIP | thumb proximal base, intermediate base, distal base, distal tip |
//! | finger MCP / PIP / DIP / TIP | proximal base, intermediate base, distal base, distal tip |
//!
//! Leap coordinates are millimetres with y pointing up; landmarks are
//! metres with y pointing down, matching image orientation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError, TrySendError};
use tracing::{debug, info, warn};

use hand_gesture::{
    DetectedHand, DetectionError, FrameSource, Handedness, LandmarkEngine, Point3, SourceError, Timestamped,
    LANDMARK_COUNT,
};

/// LeapC poll timeout, milliseconds.
const POLL_MS: u32 = 100;

/// Converted frames waiting for the capture thread.
const BUFFER: usize = 4;

const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// One tracking frame, already in landmark form.
#[derive(Debug, Clone)]
pub struct LeapFrame {
    pub timestamp: Duration,
    pub hands:     Vec<DetectedHand>,
}

impl Timestamped for LeapFrame {
    fn timestamp(&self) -> Duration { self.timestamp }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapSource
// ════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct LeapSource {
    rx:   Option<Receiver<LeapFrame>>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl LeapSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSource for LeapSource {
    type Frame = LeapFrame;

    /// Connect to the device. Fails if LeapC cannot open a connection.
    fn open(&mut self) -> Result<(), SourceError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (tx, rx) = crossbeam_channel::bounded::<LeapFrame>(BUFFER);
        let stop = Arc::clone(&self.stop);

        let join = thread::Builder::new()
            .name("leap-poll".into())
            .spawn(move || {
                use leaprs::*;

                let mut connection = match Connection::create(ConnectionConfig::default()) {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("create connection: {e:?}")));
                        return;
                    }
                };
                if let Err(e) = connection.open() {
                    let _ = ready_tx.send(Err(format!("open device: {e:?}")));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                let started = Instant::now();

                while !stop.load(Ordering::Acquire) {
                    let msg = match connection.poll(POLL_MS) {
                        Ok(m)  => m,
                        Err(_) => continue,
                    };
                    if let Event::Tracking(frame) = msg.event() {
                        let mut hands = Vec::with_capacity(2);
                        for hand in frame.hands() {
                            let handedness = if hand.hand_type() == HandType::Left {
                                Handedness::Left
                            } else {
                                Handedness::Right
                            };
                            let digits: Vec<_> = hand.digits().collect();
                            if digits.len() < 5 {
                                continue;
                            }
                            let mut points: Vec<Point3> = Vec::with_capacity(LANDMARK_COUNT);
                            let wrist = digits[2].metacarpal().prev_joint();
                            points.push(landmark(wrist.x, wrist.y, wrist.z));
                            for digit in &digits {
                                for joint in [
                                    digit.proximal().prev_joint(),
                                    digit.intermediate().prev_joint(),
                                    digit.distal().prev_joint(),
                                    digit.distal().next_joint(),
                                ] {
                                    points.push(landmark(joint.x, joint.y, joint.z));
                                }
                            }
                            hands.push(DetectedHand { points, handedness, score: 1.0 });
                        }
                        let frame = LeapFrame { timestamp: started.elapsed(), hands };
                        // a full buffer means the capture thread is behind; skip
                        if let Err(TrySendError::Disconnected(_)) = tx.try_send(frame) {
                            break;
                        }
                    }
                }
                debug!("leap polling stopped");
            })
            .map_err(|e| SourceError::Unavailable(format!("spawn leap thread: {e}")))?;

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => {
                info!("leap motion connected");
                self.rx = Some(rx);
                self.join = Some(join);
                Ok(())
            }
            Ok(Err(msg)) => Err(SourceError::Unavailable(msg)),
            Err(RecvTimeoutError::Timeout) => {
                self.stop.store(true, Ordering::Release);
                Err(SourceError::Unavailable("leap device did not answer".into()))
            }
            Err(RecvTimeoutError::Disconnected) => Err(SourceError::Unavailable("leap thread exited".into())),
        }
    }

    fn next_frame(&mut self) -> Result<Option<LeapFrame>, SourceError> {
        let Some(rx) = &self.rx else {
            return Err(SourceError::Closed);
        };
        match rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SourceError::Closed),
        }
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::Release);
        self.rx = None;
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("leap polling thread panicked");
            }
        }
    }
}

/// Leap millimetres (y up) to landmark metres (y down).
fn landmark(x: f32, y: f32, z: f32) -> Point3 {
    [x / 1000.0, -y / 1000.0, z / 1000.0]
}

// ════════════════════════════════════════════════════════════════════════════
// LeapEngine
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct LeapEngine;

impl LandmarkEngine for LeapEngine {
    type Frame = LeapFrame;

    fn detect(&mut self, frame: &LeapFrame) -> Result<Vec<DetectedHand>, DetectionError> {
        Ok(frame.hands.clone())
    }
}
