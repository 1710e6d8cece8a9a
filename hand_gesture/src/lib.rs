//! # hand_gesture
//!
//! Turns noisy, per-frame hand landmark measurements into stable, debounced
//! gesture events.
//!
//! ## Stages
//!
//! | Stage | Type | Memory |
//! |---|---|---|
//! | Landmark extraction | [`LandmarkExtractor`] | none; one camera frame in, 0..N hands out |
//! | Classification | [`GestureClassifier`] | none; pure function of one hand plus its [`MotionWindow`] |
//! | Stabilization | [`GestureStabilizer`] | per hand: Idle → Tracking → Fired state machine |
//! | Hand bookkeeping | [`HandTable`] / [`Recognizer`] | one slot per tracked hand, evicted after a grace period |
//!
//! ## Quick start
//!
//! ```rust
//! use std::time::Duration;
//! use hand_gesture::{ClassifierConfig, GestureLabel, Handedness, Recognizer, StabilizerConfig};
//! use hand_gesture::synthetic::synthesize;
//!
//! let mut rec = Recognizer::new(ClassifierConfig::default(), StabilizerConfig::default(), 6);
//! let mut fired = Vec::new();
//! for i in 0..10u64 {
//!     let ts = Duration::from_millis(i * 33);
//!     let hand = synthesize(GestureLabel::Fist, Handedness::Right, ts, [0.5, 0.7], 0.1).unwrap();
//!     if let (_, Some(event)) = rec.observe(&hand) {
//!         fired.push(event);
//!     }
//! }
//! assert_eq!(fired.len(), 1);
//! assert_eq!(fired[0].label, GestureLabel::Fist);
//! ```

pub mod landmarks;
pub mod source;
pub mod extractor;
pub mod features;
pub mod classifier;
pub mod motion;
pub mod stabilizer;
pub mod hands;
pub mod synthetic;

pub use landmarks::{Handedness, LandmarkFrame, MalformedLandmarkFrame, Point3, LANDMARK_COUNT};
pub use source::{DetectedHand, DetectionError, FrameSource, LandmarkEngine, SourceError, Timestamped};
pub use extractor::{Extraction, LandmarkExtractor};
pub use features::HandFeatures;
pub use classifier::{ClassifierConfig, GestureCandidate, GestureClassifier, GestureLabel};
pub use motion::{MotionWindow, Travel};
pub use stabilizer::{GestureEvent, GestureStabilizer, LabelThresholds, StabilizerConfig, StabilizerState};
pub use hands::{HandTable, Recognizer};
