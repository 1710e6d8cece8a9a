//! 21-point hand landmark frames.
//!
//! Points follow the usual wrist + four-joints-per-finger layout and are in
//! image orientation: x grows to the right, y grows **downward**.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════
// Joint indices
// ════════════════════════════════════════════════════════════════════════════

/// Number of landmarks in every hand frame.
pub const LANDMARK_COUNT: usize = 21;

pub const WRIST:      usize = 0;
pub const THUMB_CMC:  usize = 1;
pub const THUMB_MCP:  usize = 2;
pub const THUMB_IP:   usize = 3;
pub const THUMB_TIP:  usize = 4;
pub const INDEX_MCP:  usize = 5;
pub const INDEX_PIP:  usize = 6;
pub const INDEX_DIP:  usize = 7;
pub const INDEX_TIP:  usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP:   usize = 13;
pub const RING_PIP:   usize = 14;
pub const RING_DIP:   usize = 15;
pub const RING_TIP:   usize = 16;
pub const PINKY_MCP:  usize = 17;
pub const PINKY_PIP:  usize = 18;
pub const PINKY_DIP:  usize = 19;
pub const PINKY_TIP:  usize = 20;

/// Fingertips, thumb first.
pub const FINGERTIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// Knuckle each finger's direction is measured from, thumb first.
pub const FINGER_BASES: [usize; 5] = [THUMB_MCP, INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

/// Joints whose mean is taken as the palm centre.
pub const PALM_JOINTS: [usize; 5] = [WRIST, INDEX_MCP, MIDDLE_MCP, RING_MCP, PINKY_MCP];

pub type Point3 = [f32; 3];

// ════════════════════════════════════════════════════════════════════════════
// Handedness
// ════════════════════════════════════════════════════════════════════════════

/// Which hand a frame belongs to. Also the key of a hand's tracking slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl std::fmt::Display for Handedness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkFrame
// ════════════════════════════════════════════════════════════════════════════

/// A hand frame that cannot be fed to the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum MalformedLandmarkFrame {
    #[error("malformed landmark frame: expected {expected} points, got {actual}")]
    PointCount { expected: usize, actual: usize },
    #[error("malformed landmark frame: point {index} is not finite")]
    NonFinite { index: usize },
}

/// One hand's landmarks at one instant.
///
/// Construction validates the point count; a frame with the wrong number of
/// points is rejected, never truncated or padded.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    points:     Vec<Point3>,
    timestamp:  Duration,
    handedness: Handedness,
}

impl LandmarkFrame {
    pub fn new(
        points: Vec<Point3>,
        timestamp: Duration,
        handedness: Handedness,
    ) -> Result<Self, MalformedLandmarkFrame> {
        if points.len() != LANDMARK_COUNT {
            return Err(MalformedLandmarkFrame::PointCount {
                expected: LANDMARK_COUNT,
                actual: points.len(),
            });
        }
        if let Some(index) = points.iter().position(|p| p.iter().any(|c| !c.is_finite())) {
            return Err(MalformedLandmarkFrame::NonFinite { index });
        }
        Ok(Self { points, timestamp, handedness })
    }

    pub fn points(&self)     -> &[Point3]   { &self.points }
    pub fn point(&self, index: usize) -> Point3 { self.points[index] }
    pub fn timestamp(&self)  -> Duration    { self.timestamp }
    pub fn handedness(&self) -> Handedness  { self.handedness }

    /// Mean of the wrist and the four finger knuckles.
    pub fn palm_centroid(&self) -> Point3 {
        let mut c = [0.0f32; 3];
        for &j in PALM_JOINTS.iter() {
            let p = self.points[j];
            c[0] += p[0];
            c[1] += p[1];
            c[2] += p[2];
        }
        let n = PALM_JOINTS.len() as f32;
        [c[0] / n, c[1] / n, c[2] / n]
    }

    /// Wrist to middle-finger knuckle distance; the unit every geometric
    /// feature is normalised by.
    pub fn palm_size(&self) -> f32 {
        distance(&self.points[WRIST], &self.points[MIDDLE_MCP])
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Geometry helpers
// ════════════════════════════════════════════════════════════════════════════

/// Euclidean distance between two 3D points.
pub fn distance(a: &Point3, b: &Point3) -> f32 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let dz = b[2] - a[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Unit vector of `to - from` in the image plane, or `None` when degenerate.
pub fn planar_direction(from: &Point3, to: &Point3) -> Option<[f32; 2]> {
    let dx = to[0] - from[0];
    let dy = to[1] - from[1];
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1e-6 {
        return None;
    }
    Some([dx / len, dy / len])
}
