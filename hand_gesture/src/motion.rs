//! Short-horizon palm motion for swipe detection.
//!
//! The caller pushes one sample per observed frame; the classifier differences
//! the oldest and newest palm centroid in the window.

use std::collections::VecDeque;
use std::time::Duration;

use crate::features::MIN_PALM_SIZE;
use crate::landmarks::LandmarkFrame;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    timestamp: Duration,
    centroid:  [f32; 2],
    palm_size: f32,
}

/// Net palm displacement across the window, in palm units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Travel {
    pub dx:      f32,
    pub dy:      f32,
    pub elapsed: Duration,
}

impl Travel {
    pub fn distance(&self) -> f32 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }

    /// Palm units per second; zero when no time has passed.
    pub fn speed(&self) -> f32 {
        let secs = self.elapsed.as_secs_f32();
        if secs <= 0.0 { 0.0 } else { self.distance() / secs }
    }
}

#[derive(Debug, Clone)]
pub struct MotionWindow {
    samples:  VecDeque<Sample>,
    capacity: usize,
}

impl MotionWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self { samples: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn len(&self)      -> usize { self.samples.len() }
    pub fn is_empty(&self) -> bool  { self.samples.is_empty() }
    pub fn clear(&mut self)         { self.samples.clear() }

    pub fn push(&mut self, frame: &LandmarkFrame) {
        let c = frame.palm_centroid();
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample {
            timestamp: frame.timestamp(),
            centroid:  [c[0], c[1]],
            palm_size: frame.palm_size(),
        });
    }

    /// Displacement from the oldest to the newest sample, or `None` with
    /// fewer than two samples or a degenerate palm.
    pub fn travel(&self) -> Option<Travel> {
        let first = self.samples.front()?;
        let last = self.samples.back()?;
        if self.samples.len() < 2 {
            return None;
        }
        let mean_palm = self.samples.iter().map(|s| s.palm_size).sum::<f32>() / self.samples.len() as f32;
        if mean_palm < MIN_PALM_SIZE {
            return None;
        }
        Some(Travel {
            dx:      (last.centroid[0] - first.centroid[0]) / mean_palm,
            dy:      (last.centroid[1] - first.centroid[1]) / mean_palm,
            elapsed: last.timestamp.saturating_sub(first.timestamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::GestureLabel;
    use crate::landmarks::Handedness;
    use crate::synthetic::synthesize;

    fn at(ms: u64, x: f32) -> LandmarkFrame {
        synthesize(GestureLabel::OpenPalm, Handedness::Right, Duration::from_millis(ms), [x, 0.5], 0.1).unwrap()
    }

    #[test]
    fn needs_two_samples() {
        let mut w = MotionWindow::new(4);
        assert!(w.travel().is_none());
        w.push(&at(0, 0.2));
        assert!(w.travel().is_none());
    }

    #[test]
    fn travel_is_in_palm_units() {
        let mut w = MotionWindow::new(4);
        w.push(&at(0, 0.2));
        w.push(&at(100, 0.3));
        let t = w.travel().unwrap();
        // palm size is ~0.1 at this scale, so 0.1 image units is ~1 palm
        assert!((t.dx - 0.995).abs() < 0.01, "{t:?}");
        assert!(t.dy.abs() < 1e-4);
        assert_eq!(t.elapsed, Duration::from_millis(100));
        assert!((t.speed() - 9.95).abs() < 0.1);
    }

    #[test]
    fn window_is_bounded() {
        let mut w = MotionWindow::new(3);
        for i in 0..10u64 {
            w.push(&at(i * 10, 0.1 + i as f32 * 0.01));
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.travel().unwrap().elapsed, Duration::from_millis(20));
    }
}
