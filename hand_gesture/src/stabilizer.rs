//! GestureStabilizer: per-hand debounce + cooldown state machine.
//!
//! ```text
//!            conf ≥ τ_enter, label ≠ none, label not cooling
//!   Idle ─────────────────────────────────────────────► Tracking(label, 1)
//!    ▲                                                   │  same label, conf ≥ τ_hold
//!    │ different label / conf < τ_hold                   │  count += 1
//!    ├───────────────────────────────────────────────────┤
//!    │                                                   ▼  count == N_confirm
//!    │          cooldown elapsed                      Fired(label, t) ── emits GestureEvent
//!    └────────────────────────────────────────────────────┘
//! ```
//!
//! While `Fired`, further candidates for the same label are absorbed. A
//! different qualifying label may start tracking right away; the fired
//! label's cooldown is remembered per label so switching back and forth
//! cannot refire it early.
//!
//! All timing uses candidate timestamps, never the wall clock.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{GestureCandidate, GestureLabel};
use crate::landmarks::Handedness;

// ════════════════════════════════════════════════════════════════════════════
// StabilizerConfig
// ════════════════════════════════════════════════════════════════════════════

/// Per-label threshold overrides. Missing fields fall back to the global
/// thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelThresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enter: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold:  Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// τ_enter: confidence needed to start tracking a label.
    pub enter_threshold:    f32,
    /// τ_hold: confidence needed to keep tracking it.
    pub hold_threshold:     f32,
    /// N_confirm: consecutive agreeing candidates before firing.
    pub confirm_frames:     u32,
    pub cooldown_ms:        u64,
    pub hand_lost_grace_ms: u64,
    /// Keyed by kebab-case label name.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels:             BTreeMap<String, LabelThresholds>,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            enter_threshold:    0.7,
            hold_threshold:     0.6,
            confirm_frames:     5,
            cooldown_ms:        1000,
            hand_lost_grace_ms: 500,
            labels:             BTreeMap::new(),
        }
    }
}

impl StabilizerConfig {
    pub fn enter_for(&self, label: GestureLabel) -> f32 {
        self.labels.get(label.as_str()).and_then(|t| t.enter).unwrap_or(self.enter_threshold)
    }

    pub fn hold_for(&self, label: GestureLabel) -> f32 {
        self.labels.get(label.as_str()).and_then(|t| t.hold).unwrap_or(self.hold_threshold)
    }

    pub fn cooldown(&self) -> Duration { Duration::from_millis(self.cooldown_ms) }
    pub fn grace(&self)    -> Duration { Duration::from_millis(self.hand_lost_grace_ms) }
}

// ════════════════════════════════════════════════════════════════════════════
// GestureEvent
// ════════════════════════════════════════════════════════════════════════════

/// A committed detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureEvent {
    pub hand:      Handedness,
    pub label:     GestureLabel,
    pub fired_at:  Duration,
    /// Consecutive agreeing candidates that produced the event.
    pub streak:    u32,
    /// Magnitude of the firing candidate (swipe distance, palm units).
    pub magnitude: f32,
}

// ════════════════════════════════════════════════════════════════════════════
// GestureStabilizer
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StabilizerState {
    Idle,
    Tracking { label: GestureLabel, count: u32 },
    Fired { label: GestureLabel, fired_at: Duration },
}

#[derive(Debug)]
pub struct GestureStabilizer {
    hand:      Handedness,
    config:    Arc<StabilizerConfig>,
    state:     StabilizerState,
    last_fire: HashMap<GestureLabel, Duration>,
    last_seen: Option<Duration>,
}

impl GestureStabilizer {
    pub fn new(hand: Handedness, config: Arc<StabilizerConfig>) -> Self {
        Self::with_history(hand, config, HashMap::new())
    }

    /// Fresh state machine that still honours cooldowns of earlier firings
    /// by the same hand.
    pub fn with_history(
        hand: Handedness,
        config: Arc<StabilizerConfig>,
        last_fire: HashMap<GestureLabel, Duration>,
    ) -> Self {
        Self {
            hand,
            config,
            state: StabilizerState::Idle,
            last_fire,
            last_seen: None,
        }
    }

    /// Last firing time per label.
    pub fn into_history(self) -> HashMap<GestureLabel, Duration> {
        self.last_fire
    }

    pub fn hand(&self)      -> Handedness       { self.hand }
    pub fn state(&self)     -> StabilizerState  { self.state }
    pub fn last_seen(&self) -> Option<Duration> { self.last_seen }

    /// True once no candidate has arrived for longer than the grace period.
    pub fn is_stale(&self, now: Duration) -> bool {
        match self.last_seen {
            Some(seen) => now.saturating_sub(seen) > self.config.grace(),
            None => false,
        }
    }

    /// Feed one candidate; returns an event on the frame that commits it.
    pub fn observe(&mut self, candidate: &GestureCandidate) -> Option<GestureEvent> {
        let now = candidate.timestamp;
        self.last_seen = Some(now);

        match self.state {
            StabilizerState::Fired { label, fired_at } => {
                if now.saturating_sub(fired_at) >= self.config.cooldown() {
                    self.state = StabilizerState::Idle;
                    self.try_enter(candidate)
                } else if candidate.label != label {
                    self.try_enter(candidate)
                } else {
                    None
                }
            }
            StabilizerState::Tracking { label, count } => {
                if candidate.label == label && candidate.confidence >= self.config.hold_for(label) {
                    let count = count + 1;
                    if count >= self.config.confirm_frames {
                        Some(self.fire(candidate, count))
                    } else {
                        self.state = StabilizerState::Tracking { label, count };
                        None
                    }
                } else {
                    self.state = StabilizerState::Idle;
                    self.try_enter(candidate)
                }
            }
            StabilizerState::Idle => self.try_enter(candidate),
        }
    }

    fn cooling(&self, label: GestureLabel, now: Duration) -> bool {
        self.last_fire
            .get(&label)
            .is_some_and(|&t| now.saturating_sub(t) < self.config.cooldown())
    }

    /// Start tracking `candidate` if it qualifies. Leaves the state alone
    /// otherwise.
    fn try_enter(&mut self, candidate: &GestureCandidate) -> Option<GestureEvent> {
        let label = candidate.label;
        if label == GestureLabel::None
            || candidate.confidence < self.config.enter_for(label)
            || self.cooling(label, candidate.timestamp)
        {
            return None;
        }
        if self.config.confirm_frames <= 1 {
            return Some(self.fire(candidate, 1));
        }
        self.state = StabilizerState::Tracking { label, count: 1 };
        None
    }

    fn fire(&mut self, candidate: &GestureCandidate, streak: u32) -> GestureEvent {
        let fired_at = candidate.timestamp;
        self.state = StabilizerState::Fired { label: candidate.label, fired_at };
        self.last_fire.insert(candidate.label, fired_at);
        debug!(hand = %self.hand, label = %candidate.label, streak, ?fired_at, "gesture fired");
        GestureEvent {
            hand: self.hand,
            label: candidate.label,
            fired_at,
            streak,
            magnitude: candidate.magnitude,
        }
    }
}
