//! GestureClassifier: one hand in, one [`GestureCandidate`] out.
//!
//! Classification is template matching, not learned inference. Each gesture
//! is a short list of geometric *terms* ("index extended", "thumb pointing
//! up", "thumb and index pinched"). A term's agreement is a number in
//! `[0, 1]` where 0.5 sits exactly on its threshold.
//!
//! * **score**  = mean agreement over the template's terms; reported as the
//!   candidate's confidence.
//! * **margin** = lowest agreement − 0.5; a template only qualifies when every
//!   term is on the right side of its threshold (`margin ≥ 0`) and the score
//!   reaches `min_match_score`.
//!
//! The best qualifying template wins; scores within [`TIE_EPSILON`] go to the
//! larger margin. A qualifying swipe outranks every static pose. Nothing
//! qualifying yields `none` with confidence 0.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::features::{HandFeatures, INDEX, MIDDLE, PINKY, RING, THUMB};
use crate::landmarks::LandmarkFrame;
use crate::motion::MotionWindow;

/// Scores closer than this are considered tied.
pub const TIE_EPSILON: f32 = 1e-3;

// ════════════════════════════════════════════════════════════════════════════
// GestureLabel
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GestureLabel {
    None,
    Fist,
    OpenPalm,
    Pinch,
    PointUp,
    PointDown,
    PointLeft,
    PointRight,
    ThumbsUp,
    ThumbsDown,
    Peace,
    SwipeLeft,
    SwipeRight,
    SwipeUp,
    SwipeDown,
}

impl GestureLabel {
    pub const ALL: [GestureLabel; 15] = [
        Self::None,
        Self::Fist,
        Self::OpenPalm,
        Self::Pinch,
        Self::PointUp,
        Self::PointDown,
        Self::PointLeft,
        Self::PointRight,
        Self::ThumbsUp,
        Self::ThumbsDown,
        Self::Peace,
        Self::SwipeLeft,
        Self::SwipeRight,
        Self::SwipeUp,
        Self::SwipeDown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None       => "none",
            Self::Fist       => "fist",
            Self::OpenPalm   => "open-palm",
            Self::Pinch      => "pinch",
            Self::PointUp    => "point-up",
            Self::PointDown  => "point-down",
            Self::PointLeft  => "point-left",
            Self::PointRight => "point-right",
            Self::ThumbsUp   => "thumbs-up",
            Self::ThumbsDown => "thumbs-down",
            Self::Peace      => "peace",
            Self::SwipeLeft  => "swipe-left",
            Self::SwipeRight => "swipe-right",
            Self::SwipeUp    => "swipe-up",
            Self::SwipeDown  => "swipe-down",
        }
    }

    pub fn is_swipe(&self) -> bool {
        matches!(self, Self::SwipeLeft | Self::SwipeRight | Self::SwipeUp | Self::SwipeDown)
    }

    /// Every label except `none`.
    pub fn recognizable() -> Vec<GestureLabel> {
        Self::ALL.iter().copied().filter(|l| *l != Self::None).collect()
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GestureLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| format!("unknown gesture label '{s}'"))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// GestureCandidate
// ════════════════════════════════════════════════════════════════════════════

/// One frame's raw guess. Carries no memory of earlier frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureCandidate {
    pub label:      GestureLabel,
    pub confidence: f32,
    pub timestamp:  Duration,
    /// Swipe distance in palm units; 0 for static poses.
    pub magnitude:  f32,
}

impl GestureCandidate {
    pub fn none(timestamp: Duration) -> Self {
        Self { label: GestureLabel::None, confidence: 0.0, timestamp, magnitude: 0.0 }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ClassifierConfig
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Reach (palm units) at which a finger counts as fully extended.
    pub extended_ratio:     f32,
    /// Reach at or below which a finger counts as fully curled.
    pub curled_ratio:       f32,
    /// Thumb–index tip distance below which the hand is pinching.
    pub pinch_ratio:        f32,
    /// Index–middle tip distance above which two raised fingers form a V.
    pub peace_spread_ratio: f32,
    /// Minimum cosine between a finger and a direction to count as pointing.
    pub pointing_min:       f32,
    /// Minimum palm travel for a swipe, in palm units.
    pub swipe_min_distance: f32,
    /// Minimum palm speed for a swipe, in palm units per second.
    pub swipe_min_speed:    f32,
    pub min_match_score:    f32,
    /// Labels the classifier may produce. `none` is implicit.
    pub vocabulary:         Vec<GestureLabel>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            extended_ratio:     0.9,
            curled_ratio:       0.5,
            pinch_ratio:        0.25,
            peace_spread_ratio: 0.3,
            pointing_min:       0.7,
            swipe_min_distance: 1.5,
            swipe_min_speed:    3.0,
            min_match_score:    0.6,
            vocabulary:         GestureLabel::recognizable(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Templates
// ════════════════════════════════════════════════════════════════════════════

const UP:    [f32; 2] = [0.0, -1.0];
const DOWN:  [f32; 2] = [0.0, 1.0];
const LEFT:  [f32; 2] = [-1.0, 0.0];
const RIGHT: [f32; 2] = [1.0, 0.0];

#[derive(Debug, Clone, Copy)]
enum Term {
    Extended(usize),
    Curled(usize),
    Pinched,
    Apart,
    Spread,
    IndexToward([f32; 2]),
    ThumbToward([f32; 2]),
}

fn template(label: GestureLabel) -> &'static [Term] {
    use Term::*;
    match label {
        GestureLabel::Fist => &[Curled(THUMB), Curled(INDEX), Curled(MIDDLE), Curled(RING), Curled(PINKY)],
        GestureLabel::OpenPalm => &[
            Extended(THUMB), Extended(INDEX), Extended(MIDDLE), Extended(RING), Extended(PINKY), Apart,
        ],
        GestureLabel::Pinch => &[Extended(MIDDLE), Extended(RING), Extended(PINKY), Pinched],
        GestureLabel::PointUp    => &[Extended(INDEX), Curled(MIDDLE), Curled(RING), Curled(PINKY), IndexToward(UP)],
        GestureLabel::PointDown  => &[Extended(INDEX), Curled(MIDDLE), Curled(RING), Curled(PINKY), IndexToward(DOWN)],
        GestureLabel::PointLeft  => &[Extended(INDEX), Curled(MIDDLE), Curled(RING), Curled(PINKY), IndexToward(LEFT)],
        GestureLabel::PointRight => &[Extended(INDEX), Curled(MIDDLE), Curled(RING), Curled(PINKY), IndexToward(RIGHT)],
        GestureLabel::ThumbsUp => &[
            Extended(THUMB), Curled(INDEX), Curled(MIDDLE), Curled(RING), Curled(PINKY), ThumbToward(UP),
        ],
        GestureLabel::ThumbsDown => &[
            Extended(THUMB), Curled(INDEX), Curled(MIDDLE), Curled(RING), Curled(PINKY), ThumbToward(DOWN),
        ],
        GestureLabel::Peace => &[Extended(INDEX), Extended(MIDDLE), Curled(RING), Curled(PINKY), Spread],
        _ => &[],
    }
}

#[derive(Debug, Clone, Copy)]
struct Match {
    label:     GestureLabel,
    score:     f32,
    margin:    f32,
    magnitude: f32,
}

impl Match {
    /// Higher score wins; near-ties go to the larger margin.
    fn beats(&self, other: &Match) -> bool {
        if (self.score - other.score).abs() <= TIE_EPSILON {
            self.margin > other.margin
        } else {
            self.score > other.score
        }
    }
}

fn unit(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

fn dot(a: [f32; 2], b: [f32; 2]) -> f32 {
    a[0] * b[0] + a[1] * b[1]
}

// ════════════════════════════════════════════════════════════════════════════
// GestureClassifier
// ════════════════════════════════════════════════════════════════════════════

/// Stateless; the only input besides the frame is the caller's motion window.
#[derive(Debug, Clone, Default)]
pub struct GestureClassifier {
    config: ClassifierConfig,
}

impl GestureClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig { &self.config }

    pub fn classify(&self, frame: &LandmarkFrame, motion: &MotionWindow) -> GestureCandidate {
        let timestamp = frame.timestamp();
        let Some(features) = HandFeatures::compute(frame, self.config.extended_ratio, self.config.curled_ratio) else {
            return GestureCandidate::none(timestamp);
        };

        if let Some(swipe) = self.match_swipe(motion) {
            trace!(label = %swipe.label, score = swipe.score, "swipe");
            return GestureCandidate {
                label:      swipe.label,
                confidence: swipe.score,
                timestamp,
                magnitude:  swipe.magnitude,
            };
        }

        let mut best: Option<Match> = None;
        for &label in &self.config.vocabulary {
            let terms = template(label);
            if terms.is_empty() {
                continue;
            }
            let m = self.score(label, terms, &features);
            if !self.qualifies(&m) {
                continue;
            }
            if best.map_or(true, |b| m.beats(&b)) {
                best = Some(m);
            }
        }

        match best {
            Some(m) => GestureCandidate { label: m.label, confidence: m.score, timestamp, magnitude: 0.0 },
            None    => GestureCandidate::none(timestamp),
        }
    }

    fn qualifies(&self, m: &Match) -> bool {
        m.margin >= 0.0 && m.score >= self.config.min_match_score
    }

    fn agreement(&self, term: Term, f: &HandFeatures) -> f32 {
        let c = &self.config;
        match term {
            Term::Extended(finger) => f.extended(finger),
            Term::Curled(finger)   => f.curled(finger),
            Term::Pinched          => unit(1.0 - f.pinch / (2.0 * c.pinch_ratio)),
            Term::Apart            => unit(f.pinch / (2.0 * c.pinch_ratio)),
            Term::Spread           => unit(f.spread / (2.0 * c.peace_spread_ratio)),
            Term::IndexToward(dir) => self.pointing(dot(f.index_dir, dir)),
            Term::ThumbToward(dir) => self.pointing(dot(f.thumb_dir, dir)),
        }
    }

    /// Cosine mapped so that `pointing_min` lands on 0.5 and 1.0 on 1.0.
    fn pointing(&self, cos: f32) -> f32 {
        let span = (1.0 - self.config.pointing_min).max(1e-3);
        unit(0.5 + (cos - self.config.pointing_min) / (2.0 * span))
    }

    fn score(&self, label: GestureLabel, terms: &[Term], f: &HandFeatures) -> Match {
        let mut sum = 0.0;
        let mut min = 1.0f32;
        for &t in terms {
            let a = self.agreement(t, f);
            sum += a;
            min = min.min(a);
        }
        Match { label, score: sum / terms.len() as f32, margin: min - 0.5, magnitude: 0.0 }
    }

    fn match_swipe(&self, motion: &MotionWindow) -> Option<Match> {
        let travel = motion.travel()?;
        let (ax, ay) = (travel.dx.abs(), travel.dy.abs());
        if ax + ay <= 0.0 {
            return None;
        }
        let label = if ax >= ay {
            if travel.dx < 0.0 { GestureLabel::SwipeLeft } else { GestureLabel::SwipeRight }
        } else if travel.dy < 0.0 {
            GestureLabel::SwipeUp
        } else {
            GestureLabel::SwipeDown
        };
        if !self.config.vocabulary.contains(&label) {
            return None;
        }

        let distance = travel.distance();
        let purity = ax.max(ay) / (ax + ay);
        let terms = [
            unit(distance / (2.0 * self.config.swipe_min_distance)),
            unit(travel.speed() / (2.0 * self.config.swipe_min_speed)),
            unit(2.0 * purity - 1.0),
        ];
        let min = terms.iter().copied().fold(1.0f32, f32::min);
        let m = Match {
            label,
            score: terms.iter().sum::<f32>() / terms.len() as f32,
            margin: min - 0.5,
            magnitude: distance,
        };
        self.qualifies(&m).then_some(m)
    }
}
