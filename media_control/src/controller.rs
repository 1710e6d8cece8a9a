//! The MediaController contract and the closed set of platforms.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::automation::{Automation, AutomationError, UiAction};
use crate::command::{Capabilities, CommandKind, MediaCommand};
use crate::platforms::{SpotifyController, TikTokController, YouTubeController};

// ════════════════════════════════════════════════════════════════════════════
// Platform
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    #[serde(rename = "youtube")]
    YouTube,
    Spotify,
    #[serde(rename = "tiktok")]
    TikTok,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Self::YouTube, Self::Spotify, Self::TikTok];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::Spotify => "spotify",
            Self::TikTok  => "tiktok",
        }
    }

    /// Page a fresh session navigates to.
    pub fn url(&self) -> &'static str {
        match self {
            Self::YouTube => "https://www.youtube.com",
            Self::Spotify => "https://open.spotify.com",
            Self::TikTok  => "https://www.tiktok.com",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| format!("unknown platform '{s}' (expected youtube, spotify or tiktok)"))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Sessions, acks, errors
// ════════════════════════════════════════════════════════════════════════════

/// Opaque session handle as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSession {
    pub platform:     Platform,
    pub handle:       SessionHandle,
    pub capabilities: Capabilities,
}

/// Successful execution report.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub platform: Platform,
    pub kind:     CommandKind,
    /// The UI action that carried the command out.
    pub action:   UiAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("automation engine unreachable: {0}")]
    Unreachable(String),
    #[error("could not open platform page: {0}")]
    Navigation(String),
    #[error("session setup timed out")]
    Timeout,
}

impl From<AutomationError> for ConnectError {
    fn from(e: AutomationError) -> Self {
        match e {
            AutomationError::Unreachable(m) => Self::Unreachable(m),
            AutomationError::Timeout        => Self::Timeout,
            other                           => Self::Navigation(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// Not in the capability set. Never attempted, never retried.
    #[error("{0} is not supported on this platform")]
    Unsupported(CommandKind),
    /// Reconnect before retrying.
    #[error("controller session expired")]
    SessionExpired,
    /// Transient; eligible for retry.
    #[error("transport failure: {0}")]
    TransportFailure(String),
}

// ════════════════════════════════════════════════════════════════════════════
// MediaController
// ════════════════════════════════════════════════════════════════════════════

/// Executes abstract commands against one real platform.
pub trait MediaController: Send + 'static {
    fn platform(&self) -> Platform;

    fn capabilities(&self) -> Capabilities;

    /// Establish or validate the session. Idempotent: a live session is
    /// reused.
    fn ensure_session(&mut self) -> Result<ControllerSession, ConnectError>;

    fn execute(&mut self, command: &MediaCommand) -> Result<Ack, ExecError>;

    /// Tear the session down. Safe to call without a session.
    fn release(&mut self);
}

/// Build the controller for `platform` over an automation engine.
pub fn controller_for<A: Automation>(platform: Platform, automation: A) -> Box<dyn MediaController> {
    match platform {
        Platform::YouTube => Box::new(YouTubeController::new(automation)),
        Platform::Spotify => Box::new(SpotifyController::new(automation)),
        Platform::TikTok  => Box::new(TikTokController::new(automation)),
    }
}
