//! Configuration: every threshold, queue size and the gesture → command
//! table, loadable from TOML.
//!
//! ```toml
//! platform = "youtube"
//!
//! [capture]
//! max_hands = 2
//!
//! [stabilizer]
//! confirm_frames = 5
//! cooldown_ms = 1000
//!
//! [stabilizer.labels.pinch]
//! enter = 0.85
//!
//! [[mapping]]
//! label = "fist"
//! command = "play-pause"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use hand_gesture::{ClassifierConfig, GestureLabel, StabilizerConfig};
use media_control::{Platform, RetryPolicy};

use crate::mapper::{default_rules, MappingRule};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ════════════════════════════════════════════════════════════════════════════
// Sections
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Hands tracked at once.
    pub max_hands:        usize,
    /// Frames buffered between capture and recognition; oldest dropped first.
    pub frame_queue:      usize,
    /// Sleep when the source has no new frame.
    pub poll_interval_ms: u64,
    /// Frames of palm history used for swipe detection.
    pub motion_window:    usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_hands:        2,
            frame_queue:      4,
            poll_interval_ms: 5,
            motion_window:    6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Committed commands waiting for the dispatcher. Never dropped.
    pub command_queue:      usize,
    pub max_attempts:       u32,
    pub backoff_base_ms:    u64,
    pub backoff_max_ms:     u64,
    pub execute_timeout_ms: u64,
    pub switch_timeout_ms:  u64,
    /// Extra wait for a call that was already running at its timeout.
    /// Past it the outcome is reported unknown and never retried.
    pub inflight_grace_ms:  u64,
    /// How long the recognizer blocks on a full command queue before
    /// reporting the controller as busy.
    pub busy_timeout_ms:    u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            command_queue:      16,
            max_attempts:       3,
            backoff_base_ms:    100,
            backoff_max_ms:     1000,
            execute_timeout_ms: 3000,
            switch_timeout_ms:  5000,
            inflight_grace_ms:  10000,
            busy_timeout_ms:    250,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Config
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Platform activated at startup.
    pub platform:   Platform,
    pub capture:    CaptureConfig,
    pub classifier: ClassifierConfig,
    pub stabilizer: StabilizerConfig,
    pub dispatch:   DispatchConfig,
    pub mapping:    Vec<MappingRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            platform:   Platform::YouTube,
            capture:    CaptureConfig::default(),
            classifier: ClassifierConfig::default(),
            stabilizer: StabilizerConfig::default(),
            dispatch:   DispatchConfig::default(),
            mapping:    default_rules(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

fn unit_range(name: &str, v: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&v) {
        return Err(invalid(format!("{name} must be in [0, 1], got {v}")));
    }
    Ok(())
}

fn positive(name: &str, v: f32) -> Result<(), ConfigError> {
    if !(v > 0.0 && v.is_finite()) {
        return Err(invalid(format!("{name} must be > 0, got {v}")));
    }
    Ok(())
}

impl Config {
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.capture;
        if c.max_hands == 0 {
            return Err(invalid("capture.max_hands must be >= 1"));
        }
        if c.frame_queue == 0 {
            return Err(invalid("capture.frame_queue must be >= 1"));
        }
        if c.motion_window < 2 {
            return Err(invalid(format!("capture.motion_window must be >= 2, got {}", c.motion_window)));
        }

        let k = &self.classifier;
        positive("classifier.curled_ratio", k.curled_ratio)?;
        if k.curled_ratio >= k.extended_ratio {
            return Err(invalid(format!(
                "classifier.curled_ratio ({}) must be below extended_ratio ({})",
                k.curled_ratio, k.extended_ratio
            )));
        }
        positive("classifier.pinch_ratio", k.pinch_ratio)?;
        positive("classifier.peace_spread_ratio", k.peace_spread_ratio)?;
        positive("classifier.swipe_min_distance", k.swipe_min_distance)?;
        positive("classifier.swipe_min_speed", k.swipe_min_speed)?;
        if !(0.0..1.0).contains(&k.pointing_min) {
            return Err(invalid(format!("classifier.pointing_min must be in [0, 1), got {}", k.pointing_min)));
        }
        unit_range("classifier.min_match_score", k.min_match_score)?;
        if k.vocabulary.contains(&GestureLabel::None) {
            return Err(invalid("classifier.vocabulary must not list 'none'"));
        }

        let s = &self.stabilizer;
        unit_range("stabilizer.enter_threshold", s.enter_threshold)?;
        unit_range("stabilizer.hold_threshold", s.hold_threshold)?;
        if s.confirm_frames == 0 {
            return Err(invalid("stabilizer.confirm_frames must be >= 1"));
        }
        for (name, t) in &s.labels {
            let label: GestureLabel = name.parse().map_err(|e: String| invalid(format!("stabilizer.labels: {e}")))?;
            if let Some(v) = t.enter {
                unit_range(&format!("stabilizer.labels.{label}.enter"), v)?;
            }
            if let Some(v) = t.hold {
                unit_range(&format!("stabilizer.labels.{label}.hold"), v)?;
            }
        }

        let d = &self.dispatch;
        if d.command_queue == 0 {
            return Err(invalid("dispatch.command_queue must be >= 1"));
        }
        if d.max_attempts == 0 {
            return Err(invalid("dispatch.max_attempts must be >= 1"));
        }
        if d.backoff_base_ms > d.backoff_max_ms {
            return Err(invalid("dispatch.backoff_base_ms must not exceed backoff_max_ms"));
        }
        if d.execute_timeout_ms == 0 || d.switch_timeout_ms == 0 || d.inflight_grace_ms == 0 {
            return Err(invalid("dispatch timeouts must be > 0"));
        }

        for rule in &self.mapping {
            if !k.vocabulary.contains(&rule.label) {
                return Err(invalid(format!("mapping for '{}' is not in the classifier vocabulary", rule.label)));
            }
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts:    self.dispatch.max_attempts,
            backoff_base:    Duration::from_millis(self.dispatch.backoff_base_ms),
            backoff_max:     Duration::from_millis(self.dispatch.backoff_max_ms),
            execute_timeout: Duration::from_millis(self.dispatch.execute_timeout_ms),
            inflight_grace:  Duration::from_millis(self.dispatch.inflight_grace_ms),
        }
    }

    pub fn switch_timeout(&self) -> Duration { Duration::from_millis(self.dispatch.switch_timeout_ms) }
    pub fn busy_timeout(&self)   -> Duration { Duration::from_millis(self.dispatch.busy_timeout_ms) }
    pub fn poll_interval(&self)  -> Duration { Duration::from_millis(self.capture.poll_interval_ms) }
}
