//! LandmarkExtractor: adapts a [`LandmarkEngine`] into validated
//! [`LandmarkFrame`]s.
//!
//! "No hand present" is an empty result, never an error. A hand with the
//! wrong number of points is dropped on its own and counted in
//! [`Extraction::malformed`]; the rest of the frame is still delivered.

use tracing::{debug, warn};

use crate::landmarks::{Handedness, LandmarkFrame};
use crate::source::{DetectionError, LandmarkEngine, Timestamped};

/// Output of one `extract` call.
#[derive(Debug, Default, Clone)]
pub struct Extraction {
    pub hands:     Vec<LandmarkFrame>,
    pub malformed: usize,
}

pub struct LandmarkExtractor<E> {
    engine:    E,
    max_hands: usize,
}

impl<E> LandmarkExtractor<E>
where
    E: LandmarkEngine,
    E::Frame: Timestamped,
{
    pub fn new(engine: E, max_hands: usize) -> Self {
        Self { engine, max_hands: max_hands.max(1) }
    }

    pub fn max_hands(&self) -> usize { self.max_hands }

    /// Bring the engine up. `BackendUnavailable` here is fatal to the caller.
    pub fn load(&mut self) -> Result<(), DetectionError> {
        self.engine.load()
    }

    /// Run the engine over one frame.
    ///
    /// Hands are kept in descending detection score, at most one per
    /// handedness (hand slots are keyed by handedness), and at most
    /// `max_hands` overall.
    pub fn extract(&mut self, frame: &E::Frame) -> Result<Extraction, DetectionError> {
        let timestamp = frame.timestamp();
        let mut detected = self.engine.detect(frame)?;
        detected.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut out = Extraction::default();
        let mut seen: Vec<Handedness> = Vec::with_capacity(2);
        for hand in detected {
            if out.hands.len() == self.max_hands {
                break;
            }
            if seen.contains(&hand.handedness) {
                debug!(hand = %hand.handedness, score = hand.score, "duplicate handedness dropped");
                continue;
            }
            match LandmarkFrame::new(hand.points, timestamp, hand.handedness) {
                Ok(f) => {
                    seen.push(f.handedness());
                    out.hands.push(f);
                }
                Err(e) => {
                    warn!(hand = %hand.handedness, error = %e, "skipping malformed hand");
                    out.malformed += 1;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::landmarks::{Point3, LANDMARK_COUNT};
    use crate::source::DetectedHand;

    struct Frame(Duration);

    impl Timestamped for Frame {
        fn timestamp(&self) -> Duration { self.0 }
    }

    /// Engine that replays a fixed answer for every frame.
    struct Canned(Result<Vec<DetectedHand>, DetectionError>);

    impl LandmarkEngine for Canned {
        type Frame = Frame;
        fn detect(&mut self, _: &Frame) -> Result<Vec<DetectedHand>, DetectionError> {
            self.0.clone()
        }
    }

    fn hand(handedness: Handedness, score: f32, n: usize) -> DetectedHand {
        DetectedHand { points: vec![[0.0, 0.0, 0.0] as Point3; n], handedness, score }
    }

    #[test]
    fn empty_detection_is_not_an_error() {
        let mut x = LandmarkExtractor::new(Canned(Ok(vec![])), 2);
        let out = x.extract(&Frame(Duration::ZERO)).unwrap();
        assert!(out.hands.is_empty());
        assert_eq!(out.malformed, 0);
    }

    #[test]
    fn caps_hand_count() {
        let engine = Canned(Ok(vec![
            hand(Handedness::Left, 0.8, LANDMARK_COUNT),
            hand(Handedness::Right, 0.9, LANDMARK_COUNT),
        ]));
        let mut x = LandmarkExtractor::new(engine, 1);
        let out = x.extract(&Frame(Duration::from_millis(40))).unwrap();
        assert_eq!(out.hands.len(), 1);
        // highest score wins the single slot
        assert_eq!(out.hands[0].handedness(), Handedness::Right);
        assert_eq!(out.hands[0].timestamp(), Duration::from_millis(40));
    }

    #[test]
    fn malformed_hand_is_skipped_not_fatal() {
        let engine = Canned(Ok(vec![
            hand(Handedness::Left, 0.9, 17),
            hand(Handedness::Right, 0.5, LANDMARK_COUNT),
        ]));
        let mut x = LandmarkExtractor::new(engine, 2);
        let out = x.extract(&Frame(Duration::ZERO)).unwrap();
        assert_eq!(out.malformed, 1);
        assert_eq!(out.hands.len(), 1);
        assert_eq!(out.hands[0].handedness(), Handedness::Right);
    }

    #[test]
    fn one_hand_per_handedness() {
        let engine = Canned(Ok(vec![
            hand(Handedness::Left, 0.7, LANDMARK_COUNT),
            hand(Handedness::Left, 0.9, LANDMARK_COUNT),
        ]));
        let mut x = LandmarkExtractor::new(engine, 2);
        let out = x.extract(&Frame(Duration::ZERO)).unwrap();
        assert_eq!(out.hands.len(), 1);
    }

    #[test]
    fn engine_failure_surfaces_as_detection_error() {
        let engine = Canned(Err(DetectionError::MalformedInput("bad jpeg".into())));
        let mut x = LandmarkExtractor::new(engine, 2);
        assert!(matches!(
            x.extract(&Frame(Duration::ZERO)),
            Err(DetectionError::MalformedInput(_))
        ));
    }
}
