//! Indexed table of tracked hands.
//!
//! A slot (stabilizer + motion window) is created the first time a hand is
//! seen and torn down once it has been missing longer than the grace
//! period, so a hand that reappears later starts from a clean Idle state.
//! Only the per-label firing times survive eviction: a returning hand is
//! still bound by the cooldown of what it last fired.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::classifier::{ClassifierConfig, GestureCandidate, GestureClassifier, GestureLabel};
use crate::landmarks::{Handedness, LandmarkFrame};
use crate::motion::MotionWindow;
use crate::stabilizer::{GestureEvent, GestureStabilizer, StabilizerConfig};

#[derive(Debug)]
pub struct HandSlot {
    pub stabilizer: GestureStabilizer,
    pub motion:     MotionWindow,
}

#[derive(Debug)]
pub struct HandTable {
    slots:         BTreeMap<Handedness, HandSlot>,
    history:       BTreeMap<Handedness, HashMap<GestureLabel, Duration>>,
    config:        Arc<StabilizerConfig>,
    motion_window: usize,
}

impl HandTable {
    pub fn new(config: StabilizerConfig, motion_window: usize) -> Self {
        Self {
            slots: BTreeMap::new(),
            history: BTreeMap::new(),
            config: Arc::new(config),
            motion_window,
        }
    }

    pub fn len(&self)      -> usize { self.slots.len() }
    pub fn is_empty(&self) -> bool  { self.slots.is_empty() }

    pub fn get(&self, hand: Handedness) -> Option<&HandSlot> {
        self.slots.get(&hand)
    }

    pub fn slot_mut(&mut self, hand: Handedness) -> &mut HandSlot {
        let config = &self.config;
        let history = &mut self.history;
        let window = self.motion_window;
        self.slots.entry(hand).or_insert_with(|| {
            debug!(%hand, "hand tracked");
            let fired = history.remove(&hand).unwrap_or_default();
            HandSlot {
                stabilizer: GestureStabilizer::with_history(hand, Arc::clone(config), fired),
                motion:     MotionWindow::new(window),
            }
        })
    }

    /// Drop every slot that has gone unseen past the grace period.
    pub fn evict_stale(&mut self, now: Duration) -> Vec<Handedness> {
        let stale: Vec<Handedness> = self
            .slots
            .iter()
            .filter(|(_, s)| s.stabilizer.is_stale(now))
            .map(|(h, _)| *h)
            .collect();
        for hand in &stale {
            self.evict(*hand);
        }
        stale
    }

    /// Tear down `hand`'s slot if it has gone unseen past the grace period
    /// at `now`. Returns whether it was evicted.
    pub fn evict_if_stale(&mut self, hand: Handedness, now: Duration) -> bool {
        let stale = self.slots.get(&hand).is_some_and(|s| s.stabilizer.is_stale(now));
        if stale {
            self.evict(hand);
        }
        stale
    }

    fn evict(&mut self, hand: Handedness) {
        if let Some(slot) = self.slots.remove(&hand) {
            self.history.insert(hand, slot.stabilizer.into_history());
        }
        debug!(%hand, "hand lost");
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Recognizer
// ════════════════════════════════════════════════════════════════════════════

/// Classifier + hand table: the whole per-hand half of the pipeline.
#[derive(Debug)]
pub struct Recognizer {
    classifier: GestureClassifier,
    hands:      HandTable,
}

impl Recognizer {
    pub fn new(classifier: ClassifierConfig, stabilizer: StabilizerConfig, motion_window: usize) -> Self {
        Self {
            classifier: GestureClassifier::new(classifier),
            hands:      HandTable::new(stabilizer, motion_window),
        }
    }

    pub fn hands(&self) -> &HandTable { &self.hands }

    /// Classify one validated hand frame and feed its stabilizer. A slot
    /// that went stale before this frame is replaced, never resumed.
    pub fn observe(&mut self, frame: &LandmarkFrame) -> (GestureCandidate, Option<GestureEvent>) {
        self.hands.evict_if_stale(frame.handedness(), frame.timestamp());
        let slot = self.hands.slot_mut(frame.handedness());
        slot.motion.push(frame);
        let candidate = self.classifier.classify(frame, &slot.motion);
        let event = slot.stabilizer.observe(&candidate);
        (candidate, event)
    }

    pub fn evict_stale(&mut self, now: Duration) -> Vec<Handedness> {
        self.hands.evict_stale(now)
    }
}
