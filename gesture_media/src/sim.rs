//! Scripted simulation: a frame source and landmark engine that need no
//! camera.
//!
//! A script is a comma-separated list of `<hands>:<frames>` segments.
//! `<hands>` is one or more `[left/|right/]<pose>` items joined by `+`
//! (right hand by default), `none` for an empty frame, or `glitch` for a
//! frame the engine cannot read.
//!
//! ```text
//! fist:10,none:15,swipe-up:12,left/peace+right/fist:8,glitch:2
//! ```
//!
//! Each hand keeps its own position across segments. Swipes move it by a
//! fixed step per frame and static poses hold it where it is, so the motion
//! window never sees a jump between segments.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use hand_gesture::synthetic::synthesize;
use hand_gesture::{
    DetectedHand, DetectionError, FrameSource, GestureLabel, Handedness, LandmarkEngine, SourceError, Timestamped,
};

/// Hand scale in image units (wrist to middle knuckle).
pub const HAND_SCALE: f32 = 0.1;

/// Swipe displacement per frame, image units.
pub const SWIPE_STEP: f32 = 0.06;

const DETECTION_SCORE: f32 = 0.9;

fn start_origin(hand: Handedness) -> [f32; 2] {
    match hand {
        Handedness::Left  => [0.35, 0.6],
        Handedness::Right => [0.65, 0.6],
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("segment '{0}' is not <hands>:<frames>")]
    Segment(String),
    #[error("unknown pose '{0}'")]
    Pose(String),
    #[error("unknown hand '{0}' (left or right)")]
    Hand(String),
    #[error("hand listed twice in '{0}'")]
    DuplicateHand(String),
    #[error("script is empty")]
    Empty,
}

// ════════════════════════════════════════════════════════════════════════════
// Frames
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimHand {
    pub handedness: Handedness,
    pub pose:       GestureLabel,
    /// Wrist position in image units.
    pub origin:     [f32; 2],
}

/// One simulated camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SimFrame {
    pub timestamp: Duration,
    pub hands:     Vec<SimHand>,
    /// Unreadable frame; the engine rejects it.
    pub glitch:    bool,
}

impl Timestamped for SimFrame {
    fn timestamp(&self) -> Duration { self.timestamp }
}

// ════════════════════════════════════════════════════════════════════════════
// Script
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Hands(Vec<(Handedness, GestureLabel)>),
    Glitch,
}

#[derive(Debug, Clone, PartialEq)]
struct Segment {
    content: Content,
    frames:  u32,
}

fn parse_hand(item: &str) -> Result<(Handedness, GestureLabel), ScriptError> {
    let (hand, pose) = match item.split_once('/') {
        Some(("left", pose))  => (Handedness::Left, pose),
        Some(("right", pose)) => (Handedness::Right, pose),
        Some((other, _))      => return Err(ScriptError::Hand(other.to_string())),
        None                  => (Handedness::Right, item),
    };
    let pose: GestureLabel = pose.parse().map_err(|_| ScriptError::Pose(pose.to_string()))?;
    Ok((hand, pose))
}

fn parse_segment(text: &str) -> Result<Segment, ScriptError> {
    let (body, count) = text
        .rsplit_once(':')
        .ok_or_else(|| ScriptError::Segment(text.to_string()))?;
    let frames: u32 = count
        .trim()
        .parse()
        .map_err(|_| ScriptError::Segment(text.to_string()))?;
    let body = body.trim();
    let content = match body {
        "glitch" => Content::Glitch,
        "none" | "" => Content::Hands(Vec::new()),
        _ => {
            let mut hands = Vec::new();
            for item in body.split('+') {
                let (hand, pose) = parse_hand(item.trim())?;
                if hands.iter().any(|(h, _)| *h == hand) {
                    return Err(ScriptError::DuplicateHand(text.to_string()));
                }
                if pose != GestureLabel::None {
                    hands.push((hand, pose));
                }
            }
            Content::Hands(hands)
        }
    };
    Ok(Segment { content, frames })
}

fn swipe_step(pose: GestureLabel) -> [f32; 2] {
    match pose {
        GestureLabel::SwipeLeft  => [-SWIPE_STEP, 0.0],
        GestureLabel::SwipeRight => [SWIPE_STEP, 0.0],
        GestureLabel::SwipeUp    => [0.0, -SWIPE_STEP],
        GestureLabel::SwipeDown  => [0.0, SWIPE_STEP],
        _                        => [0.0, 0.0],
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimSource
// ════════════════════════════════════════════════════════════════════════════

/// Plays a script at a fixed frame rate, then reports `Closed`.
pub struct SimSource {
    segments: Vec<Segment>,
    period:   Duration,
    paced:    bool,
    segment:  usize,
    in_seg:   u32,
    index:    u64,
    origins:  BTreeMap<Handedness, [f32; 2]>,
    started:  Option<Instant>,
}

impl SimSource {
    /// Unpaced: frames are produced as fast as they are pulled, timestamps
    /// still advance by one frame period each.
    pub fn from_script(script: &str, fps: u32) -> Result<Self, ScriptError> {
        let segments = script
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;
        if segments.iter().all(|s| s.frames == 0) {
            return Err(ScriptError::Empty);
        }
        Ok(Self {
            segments,
            period:  Duration::from_micros(1_000_000 / u64::from(fps.max(1))),
            paced:   false,
            segment: 0,
            in_seg:  0,
            index:   0,
            origins: BTreeMap::new(),
            started: None,
        })
    }

    /// Hold each frame back until its timestamp has passed on the wall clock.
    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }

    pub fn period(&self) -> Duration { self.period }

    /// Frames in the whole script.
    pub fn len(&self) -> u64 {
        self.segments.iter().map(|s| u64::from(s.frames)).sum()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn advance(&mut self) -> Option<&Segment> {
        while let Some(seg) = self.segments.get(self.segment) {
            if self.in_seg < seg.frames {
                break;
            }
            self.segment += 1;
            self.in_seg = 0;
        }
        self.segments.get(self.segment)
    }
}

impl FrameSource for SimSource {
    type Frame = SimFrame;

    fn open(&mut self) -> Result<(), SourceError> {
        self.started = Some(Instant::now());
        debug!(frames = self.len(), period = ?self.period, paced = self.paced, "simulation opened");
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<SimFrame>, SourceError> {
        let timestamp = self.period * self.index as u32;
        if self.paced {
            let started = *self.started.get_or_insert_with(Instant::now);
            if started.elapsed() < timestamp {
                return Ok(None);
            }
        }
        let Some(segment) = self.advance() else {
            return Err(SourceError::Closed);
        };
        let content = segment.content.clone();
        self.in_seg += 1;
        self.index += 1;

        let frame = match content {
            Content::Glitch => SimFrame { timestamp, hands: Vec::new(), glitch: true },
            Content::Hands(hands) => {
                let hands = hands
                    .into_iter()
                    .map(|(handedness, pose)| {
                        let origin = self.origins.entry(handedness).or_insert_with(|| start_origin(handedness));
                        let step = swipe_step(pose);
                        origin[0] += step[0];
                        origin[1] += step[1];
                        SimHand { handedness, pose, origin: *origin }
                    })
                    .collect();
                SimFrame { timestamp, hands, glitch: false }
            }
        };
        Ok(Some(frame))
    }

    fn close(&mut self) {
        debug!(played = self.index, "simulation closed");
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimEngine
// ════════════════════════════════════════════════════════════════════════════

/// Renders each [`SimHand`] as a clean 21-point hand.
#[derive(Debug, Default)]
pub struct SimEngine;

impl LandmarkEngine for SimEngine {
    type Frame = SimFrame;

    fn detect(&mut self, frame: &SimFrame) -> Result<Vec<DetectedHand>, DetectionError> {
        if frame.glitch {
            return Err(DetectionError::MalformedInput(format!("glitch at {:?}", frame.timestamp)));
        }
        Ok(frame
            .hands
            .iter()
            .filter_map(|h| synthesize(h.pose, h.handedness, frame.timestamp, h.origin, HAND_SCALE))
            .map(|f| DetectedHand { points: f.points().to_vec(), handedness: f.handedness(), score: DETECTION_SCORE })
            .collect())
    }
}
