//! Per-hand geometric feature vector.
//!
//! Every distance is divided by the palm size (wrist to middle knuckle), so
//! features do not depend on how far the hand is from the camera.
//!
//! | Feature | Definition |
//! |---|---|
//! | `reach[f]` | finger tip to its own knuckle; for the thumb, thumb tip to the index knuckle |
//! | `extension[f]` | `reach` mapped linearly onto `[0, 1]` between the curled and extended ratios |
//! | `pinch` | thumb tip to index tip |
//! | `spread` | index tip to middle tip |
//! | `thumb_dir`, `index_dir` | image-plane unit vector from the finger's knuckle to its tip |

use crate::landmarks::{
    distance, planar_direction, LandmarkFrame, FINGERTIPS, FINGER_BASES, INDEX_MCP, INDEX_TIP,
    MIDDLE_TIP, THUMB_MCP, THUMB_TIP,
};

/// Palm sizes below this are treated as a degenerate detection.
pub const MIN_PALM_SIZE: f32 = 1e-6;

pub const THUMB:  usize = 0;
pub const INDEX:  usize = 1;
pub const MIDDLE: usize = 2;
pub const RING:   usize = 3;
pub const PINKY:  usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct HandFeatures {
    pub palm_size: f32,
    pub reach:     [f32; 5],
    pub extension: [f32; 5],
    pub pinch:     f32,
    pub spread:    f32,
    pub thumb_dir: [f32; 2],
    pub index_dir: [f32; 2],
}

impl HandFeatures {
    /// Compute features, or `None` for a hand whose palm has collapsed to a
    /// point (nothing meaningful can be normalised against it).
    pub fn compute(frame: &LandmarkFrame, extended_ratio: f32, curled_ratio: f32) -> Option<Self> {
        let palm_size = frame.palm_size();
        if palm_size < MIN_PALM_SIZE {
            return None;
        }
        let pts = frame.points();

        let mut reach = [0.0f32; 5];
        for finger in 0..5 {
            let base = if finger == THUMB { INDEX_MCP } else { FINGER_BASES[finger] };
            reach[finger] = distance(&pts[FINGERTIPS[finger]], &pts[base]) / palm_size;
        }

        let span = (extended_ratio - curled_ratio).max(MIN_PALM_SIZE);
        let mut extension = [0.0f32; 5];
        for finger in 0..5 {
            extension[finger] = ((reach[finger] - curled_ratio) / span).clamp(0.0, 1.0);
        }

        Some(Self {
            palm_size,
            reach,
            extension,
            pinch:     distance(&pts[THUMB_TIP], &pts[INDEX_TIP]) / palm_size,
            spread:    distance(&pts[INDEX_TIP], &pts[MIDDLE_TIP]) / palm_size,
            thumb_dir: planar_direction(&pts[THUMB_MCP], &pts[THUMB_TIP]).unwrap_or([0.0, 0.0]),
            index_dir: planar_direction(&pts[INDEX_MCP], &pts[INDEX_TIP]).unwrap_or([0.0, 0.0]),
        })
    }

    pub fn extended(&self, finger: usize) -> f32 { self.extension[finger] }
    pub fn curled(&self, finger: usize)   -> f32 { 1.0 - self.extension[finger] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::classifier::GestureLabel;
    use crate::landmarks::{Handedness, LANDMARK_COUNT};
    use crate::synthetic::synthesize;

    fn features(label: GestureLabel) -> HandFeatures {
        let f = synthesize(label, Handedness::Right, Duration::ZERO, [0.5, 0.5], 0.2).unwrap();
        HandFeatures::compute(&f, 0.9, 0.5).unwrap()
    }

    #[test]
    fn fist_has_every_finger_curled() {
        let f = features(GestureLabel::Fist);
        for finger in 0..5 {
            assert!(f.curled(finger) > 0.9, "finger {finger}: {:?}", f.extension);
        }
    }

    #[test]
    fn open_palm_has_every_finger_extended() {
        let f = features(GestureLabel::OpenPalm);
        for finger in 0..5 {
            assert!(f.extended(finger) > 0.8, "finger {finger}: {:?}", f.extension);
        }
        assert!(f.pinch > 1.0);
    }

    #[test]
    fn features_are_scale_invariant() {
        let small = synthesize(GestureLabel::Peace, Handedness::Left, Duration::ZERO, [0.3, 0.3], 0.05).unwrap();
        let large = synthesize(GestureLabel::Peace, Handedness::Left, Duration::ZERO, [0.6, 0.6], 0.3).unwrap();
        let a = HandFeatures::compute(&small, 0.9, 0.5).unwrap();
        let b = HandFeatures::compute(&large, 0.9, 0.5).unwrap();
        for finger in 0..5 {
            assert!((a.reach[finger] - b.reach[finger]).abs() < 1e-3);
        }
        assert!((a.spread - b.spread).abs() < 1e-3);
    }

    #[test]
    fn pointing_direction_follows_index() {
        let f = features(GestureLabel::PointLeft);
        assert!(f.index_dir[0] < -0.9);
        let f = features(GestureLabel::PointUp);
        // image y grows downward
        assert!(f.index_dir[1] < -0.9);
    }

    #[test]
    fn collapsed_palm_yields_no_features() {
        let frame = LandmarkFrame::new(vec![[0.5, 0.5, 0.0]; LANDMARK_COUNT], Duration::ZERO, Handedness::Right).unwrap();
        assert!(HandFeatures::compute(&frame, 0.9, 0.5).is_none());
    }
}
