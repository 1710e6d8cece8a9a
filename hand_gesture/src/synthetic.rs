//! Synthetic hand poses.
//!
//! Builds clean 21-point frames for any static gesture so the pipeline can
//! run without a camera and tests can drive the classifier with known
//! geometry. Poses are laid out in *hand units* (wrist at the origin,
//! wrist to middle knuckle ≈ 1, y pointing down) then scaled and translated
//! into image coordinates. Handedness is only a tag; the geometry is not
//! mirrored.
//!
//! Swipes are an open palm whose `origin` the caller moves between frames.

use std::time::Duration;

use crate::classifier::GestureLabel;
use crate::landmarks::{Handedness, LandmarkFrame, Point3, LANDMARK_COUNT};

type P = [f32; 2];

const WRIST:     P = [0.0, 0.0];
const THUMB_CMC: P = [-0.25, -0.2];

/// Knuckles of index, middle, ring, pinky.
const KNUCKLES: [P; 4] = [[-0.35, -0.9], [-0.1, -1.0], [0.15, -0.95], [0.38, -0.85]];

/// PIP / DIP / TIP offsets from the knuckle.
const EXTENDED: [P; 3] = [[0.0, -0.45], [0.0, -0.75], [0.0, -1.0]];
const CURLED:   [P; 3] = [[0.0, -0.35], [0.0, -0.2], [0.0, 0.15]];

/// Thumb MCP / IP / TIP.
const THUMB_OPEN:   [P; 3] = [[-0.55, -0.4], [-0.85, -0.45], [-1.1, -0.5]];
const THUMB_TUCKED: [P; 3] = [[-0.4, -0.45], [-0.3, -0.65], [-0.1, -0.7]];
const THUMB_UP:     [P; 3] = [[-0.5, -0.5], [-0.53, -1.15], [-0.55, -1.75]];
const THUMB_DOWN:   [P; 3] = [[-0.5, -0.5], [-0.55, 0.0], [-0.6, 0.35]];
const THUMB_PINCH:  [P; 3] = [[-0.55, -0.5], [-0.65, -0.9], [-0.65, -1.25]];

/// Index PIP / DIP / TIP, absolute, for poses that bend it off-axis.
const INDEX_PINCH: [P; 3] = [[-0.45, -1.25], [-0.55, -1.35], [-0.62, -1.3]];
const INDEX_V:     [P; 3] = [[-0.45, -1.32], [-0.53, -1.6], [-0.6, -1.85]];
const MIDDLE_V:    [P; 3] = [[-0.02, -1.42], [0.05, -1.72], [0.1, -1.95]];

#[derive(Clone, Copy)]
enum Finger {
    Extended,
    Curled,
    Toward(P),
    Absolute([P; 3]),
}

fn finger_joints(knuckle: P, pose: Finger) -> [P; 3] {
    let offset = |o: P| [knuckle[0] + o[0], knuckle[1] + o[1]];
    match pose {
        Finger::Extended => EXTENDED.map(offset),
        Finger::Curled => CURLED.map(offset),
        Finger::Toward(d) => [0.45, 0.75, 1.0].map(|k| [knuckle[0] + d[0] * k, knuckle[1] + d[1] * k]),
        Finger::Absolute(j) => j,
    }
}

/// Build a frame for `label`, or `None` for [`GestureLabel::None`].
pub fn synthesize(
    label: GestureLabel,
    hand: Handedness,
    timestamp: Duration,
    origin: [f32; 2],
    scale: f32,
) -> Option<LandmarkFrame> {
    use Finger::*;
    use GestureLabel as G;

    let (thumb, fingers): ([P; 3], [Finger; 4]) = match label {
        G::None => return None,
        G::Fist => (THUMB_TUCKED, [Curled; 4]),
        G::OpenPalm | G::SwipeLeft | G::SwipeRight | G::SwipeUp | G::SwipeDown => {
            (THUMB_OPEN, [Extended; 4])
        }
        G::Pinch => (THUMB_PINCH, [Absolute(INDEX_PINCH), Extended, Extended, Extended]),
        G::PointUp    => (THUMB_TUCKED, [Toward([0.0, -1.0]), Curled, Curled, Curled]),
        G::PointDown  => (THUMB_TUCKED, [Toward([0.0, 1.0]), Curled, Curled, Curled]),
        G::PointLeft  => (THUMB_TUCKED, [Toward([-1.0, 0.0]), Curled, Curled, Curled]),
        G::PointRight => (THUMB_TUCKED, [Toward([1.0, 0.0]), Curled, Curled, Curled]),
        G::ThumbsUp   => (THUMB_UP, [Curled; 4]),
        G::ThumbsDown => (THUMB_DOWN, [Curled; 4]),
        G::Peace      => (THUMB_TUCKED, [Absolute(INDEX_V), Absolute(MIDDLE_V), Curled, Curled]),
    };

    let mut pts: Vec<P> = Vec::with_capacity(LANDMARK_COUNT);
    pts.push(WRIST);
    pts.push(THUMB_CMC);
    pts.extend_from_slice(&thumb);
    for (knuckle, pose) in KNUCKLES.iter().zip(fingers) {
        pts.push(*knuckle);
        pts.extend_from_slice(&finger_joints(*knuckle, pose));
    }

    let points: Vec<Point3> = pts
        .into_iter()
        .map(|p| [origin[0] + p[0] * scale, origin[1] + p[1] * scale, 0.0])
        .collect();
    LandmarkFrame::new(points, timestamp, hand).ok()
}
