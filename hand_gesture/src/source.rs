//! Seams to the outside world: where camera frames come from and what turns
//! them into hand landmarks.
//!
//! Both traits are implemented by the binary (a synthetic generator, or a
//! Leap Motion device behind the `leap` feature) and by test fakes.

use std::time::Duration;

use thiserror::Error;

use crate::landmarks::{Handedness, Point3};

/// Anything that carries a capture timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> Duration;
}

// ════════════════════════════════════════════════════════════════════════════
// FrameSource
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Device missing, busy, or refused to open.
    #[error("frame source unavailable: {0}")]
    Unavailable(String),
    /// The source has been closed and will not produce more frames.
    #[error("frame source closed")]
    Closed,
}

/// A pull-based camera. Consumers call `next_frame` whenever they are ready;
/// `Ok(None)` means "nothing new yet".
pub trait FrameSource: Send + 'static {
    type Frame: Timestamped + Send + 'static;

    fn open(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Self::Frame>, SourceError>;

    fn close(&mut self) {}
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkEngine
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    /// The detection model could not be loaded. Fatal at startup.
    #[error("landmark backend unavailable: {0}")]
    BackendUnavailable(String),
    /// This one frame could not be processed. The pipeline skips it.
    #[error("malformed input frame: {0}")]
    MalformedInput(String),
}

/// Raw engine output for one hand, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedHand {
    pub points:     Vec<Point3>,
    pub handedness: Handedness,
    /// Detection confidence in `[0, 1]`.
    pub score:      f32,
}

/// Hand landmark detector for a particular frame type.
pub trait LandmarkEngine: Send + 'static {
    type Frame;

    /// Load models / connect to the device. Called once before the first
    /// `detect`.
    fn load(&mut self) -> Result<(), DetectionError> {
        Ok(())
    }

    fn detect(&mut self, frame: &Self::Frame) -> Result<Vec<DetectedHand>, DetectionError>;
}
