//! CommandMapper: gesture event → media command.
//!
//! The table is data ([`MappingRule`]s, loadable from the `[[mapping]]`
//! config section). Lookup is total: a label with no rule maps to a no-op
//! command that the dispatcher discards.
//!
//! Parameters come from the rule: `scale × event magnitude` when `scale` is
//! set (a swipe's measured distance scales a volume delta), otherwise the
//! fixed `step`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hand_gesture::{GestureEvent, GestureLabel};
use media_control::{CommandKind, MediaCommand};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    pub label:   GestureLabel,
    pub command: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step:    Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale:   Option<f32>,
}

impl MappingRule {
    pub fn new(label: GestureLabel, command: CommandKind) -> Self {
        Self { label, command, step: None, scale: None }
    }

    pub fn step(mut self, step: f32) -> Self {
        self.step = Some(step);
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }

    fn param(&self, magnitude: f32) -> Option<f32> {
        match (self.scale, self.step) {
            (Some(scale), _) => Some(scale * magnitude),
            (None, step)     => step,
        }
    }
}

/// Default gesture set.
pub fn default_rules() -> Vec<MappingRule> {
    use CommandKind as C;
    use GestureLabel as G;
    vec![
        MappingRule::new(G::OpenPalm, C::PlayPause),
        MappingRule::new(G::Fist, C::PlayPause),
        MappingRule::new(G::ThumbsUp, C::VolumeUp),
        MappingRule::new(G::ThumbsDown, C::VolumeDown),
        MappingRule::new(G::Peace, C::Next),
        MappingRule::new(G::PointUp, C::Previous),
        MappingRule::new(G::Pinch, C::Mute),
        MappingRule::new(G::SwipeRight, C::SeekForward).step(10.0),
        MappingRule::new(G::SwipeLeft, C::SeekBackward).step(10.0),
        MappingRule::new(G::SwipeUp, C::VolumeSet).scale(5.0),
        MappingRule::new(G::SwipeDown, C::VolumeSet).scale(-5.0),
    ]
}

#[derive(Debug, Clone)]
pub struct CommandMapper {
    table: BTreeMap<GestureLabel, MappingRule>,
}

impl Default for CommandMapper {
    fn default() -> Self {
        Self::from_rules(&default_rules())
    }
}

impl CommandMapper {
    /// Later rules for the same label override earlier ones.
    pub fn from_rules(rules: &[MappingRule]) -> Self {
        let table = rules.iter().map(|r| (r.label, r.clone())).collect();
        Self { table }
    }

    pub fn rule(&self, label: GestureLabel) -> Option<&MappingRule> {
        self.table.get(&label)
    }

    pub fn map(&self, event: &GestureEvent) -> MediaCommand {
        match self.table.get(&event.label) {
            Some(rule) => MediaCommand { kind: rule.command, param: rule.param(event.magnitude) },
            None => MediaCommand::noop(),
        }
    }

    /// `(label, command description)` for every label, mapped or not.
    pub fn describe(&self) -> Vec<(GestureLabel, String)> {
        GestureLabel::recognizable()
            .into_iter()
            .map(|label| {
                let text = match self.table.get(&label) {
                    Some(MappingRule { command, scale: Some(s), .. }) => format!("{command} ({s:+} × swipe distance)"),
                    Some(MappingRule { command, step: Some(s), .. })  => format!("{command} ({s})"),
                    Some(MappingRule { command, .. })                 => command.to_string(),
                    None                                              => "(unmapped)".to_string(),
                };
                (label, text)
            })
            .collect()
    }
}
