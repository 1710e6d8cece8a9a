//! Abstract media commands and capability sets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ════════════════════════════════════════════════════════════════════════════
// CommandKind
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    PlayPause,
    Next,
    Previous,
    VolumeUp,
    VolumeDown,
    /// Relative volume change; the parameter is a signed percentage delta.
    VolumeSet,
    SeekForward,
    SeekBackward,
    Mute,
    /// Produced for unmapped gestures. Never reaches a controller.
    NoOp,
}

impl CommandKind {
    /// Every kind a controller can be asked to perform.
    pub const ACTIONABLE: [CommandKind; 9] = [
        Self::PlayPause,
        Self::Next,
        Self::Previous,
        Self::VolumeUp,
        Self::VolumeDown,
        Self::VolumeSet,
        Self::SeekForward,
        Self::SeekBackward,
        Self::Mute,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlayPause    => "play-pause",
            Self::Next         => "next",
            Self::Previous     => "previous",
            Self::VolumeUp     => "volume-up",
            Self::VolumeDown   => "volume-down",
            Self::VolumeSet    => "volume-set",
            Self::SeekForward  => "seek-forward",
            Self::SeekBackward => "seek-backward",
            Self::Mute         => "mute",
            Self::NoOp         => "no-op",
        }
    }

    fn bit(&self) -> u16 {
        match self {
            Self::NoOp => 0,
            other => 1 << (*other as u16),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ACTIONABLE
            .iter()
            .chain(std::iter::once(&Self::NoOp))
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown command '{s}'"))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MediaCommand
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaCommand {
    pub kind:  CommandKind,
    /// Seek seconds, volume delta, ... Meaning depends on `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<f32>,
}

impl MediaCommand {
    pub fn new(kind: CommandKind) -> Self {
        Self { kind, param: None }
    }

    pub fn with_param(kind: CommandKind, param: f32) -> Self {
        Self { kind, param: Some(param) }
    }

    pub fn noop() -> Self {
        Self::new(CommandKind::NoOp)
    }

    pub fn is_noop(&self) -> bool {
        self.kind == CommandKind::NoOp
    }
}

impl fmt::Display for MediaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.param {
            Some(p) => write!(f, "{}({:+.1})", self.kind, p),
            None    => write!(f, "{}", self.kind),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Capabilities
// ════════════════════════════════════════════════════════════════════════════

/// Set of command kinds a controller can actually perform. `NoOp` is never a
/// member.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u16);

impl Capabilities {
    pub const fn empty() -> Self { Self(0) }

    pub fn all() -> Self {
        Self::of(&CommandKind::ACTIONABLE)
    }

    pub fn of(kinds: &[CommandKind]) -> Self {
        Self(kinds.iter().fold(0, |acc, k| acc | k.bit()))
    }

    pub fn contains(&self, kind: CommandKind) -> bool {
        let bit = kind.bit();
        bit != 0 && self.0 & bit == bit
    }

    pub fn without(self, kinds: &[CommandKind]) -> Self {
        Self(self.0 & !Self::of(kinds).0)
    }

    pub fn is_empty(&self) -> bool { self.0 == 0 }

    pub fn iter(&self) -> impl Iterator<Item = CommandKind> + '_ {
        CommandKind::ACTIONABLE.into_iter().filter(move |k| self.contains(*k))
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
