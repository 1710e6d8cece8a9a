//! Concrete platform controllers.
//!
//! All three drive a web player through an [`Automation`] engine and share
//! the session plumbing in [`BrowserSession`]; each one only supplies its
//! capability set and its command → UI action table.
//!
//! Every command is exactly one UI action, so a failed attempt has either
//! taken effect or not and a retry never repeats half of a command.
//!
//! | Platform | Transport | Seek | Volume set |
//! |---|---|---|---|
//! | YouTube | keyboard shortcuts | `l` / `j` for 10 s, player script for other steps | player script |
//! | Spotify | `data-testid` button clicks | no | script on `<audio>` |
//! | TikTok | keyboard shortcuts | no | script on `<video>` |

mod spotify;
mod tiktok;
mod youtube;

pub use spotify::SpotifyController;
pub use tiktok::TikTokController;
pub use youtube::YouTubeController;

use tracing::{debug, info, warn};

use crate::automation::{Automation, AutomationError, SessionToken, UiAction};
use crate::command::{Capabilities, MediaCommand};
use crate::controller::{Ack, ConnectError, ControllerSession, ExecError, Platform, SessionHandle};

/// Session state shared by every browser-driven controller.
pub(crate) struct BrowserSession<A> {
    platform:     Platform,
    capabilities: Capabilities,
    automation:   A,
    token:        Option<SessionToken>,
}

impl<A: Automation> BrowserSession<A> {
    pub(crate) fn new(platform: Platform, capabilities: Capabilities, automation: A) -> Self {
        Self { platform, capabilities, automation, token: None }
    }

    pub(crate) fn platform(&self)     -> Platform     { self.platform }
    pub(crate) fn capabilities(&self) -> Capabilities { self.capabilities }

    fn session(&self, token: &SessionToken) -> ControllerSession {
        ControllerSession {
            platform:     self.platform,
            handle:       SessionHandle(token.0.clone()),
            capabilities: self.capabilities,
        }
    }

    pub(crate) fn ensure(&mut self) -> Result<ControllerSession, ConnectError> {
        if let Some(token) = self.token.clone() {
            if self.automation.is_alive(&token) {
                return Ok(self.session(&token));
            }
            debug!(platform = %self.platform, session = %token.0, "session no longer alive");
            self.token = None;
        }

        let token = self.automation.open_session()?;
        if let Err(e) = self.automation.perform(&token, &UiAction::Navigate(self.platform.url().to_string())) {
            self.automation.close_session(&token);
            return Err(e.into());
        }
        info!(platform = %self.platform, session = %token.0, "session established");
        let session = self.session(&token);
        self.token = Some(token);
        Ok(session)
    }

    /// Perform the single action that carries `command` out. `None` means
    /// the table has no action for it.
    pub(crate) fn run(&mut self, command: &MediaCommand, action: Option<UiAction>) -> Result<Ack, ExecError> {
        let action = match action {
            Some(action) if self.capabilities.contains(command.kind) => action,
            _ => return Err(ExecError::Unsupported(command.kind)),
        };
        let token = self.token.clone().ok_or(ExecError::SessionExpired)?;
        match self.automation.perform(&token, &action) {
            Ok(()) => Ok(Ack { platform: self.platform, kind: command.kind, action }),
            Err(AutomationError::SessionLost) => {
                warn!(platform = %self.platform, "session lost mid-command");
                self.token = None;
                Err(ExecError::SessionExpired)
            }
            Err(e) => Err(ExecError::TransportFailure(e.to_string())),
        }
    }

    pub(crate) fn release(&mut self) {
        if let Some(token) = self.token.take() {
            self.automation.close_session(&token);
            info!(platform = %self.platform, session = %token.0, "session released");
        }
    }
}

/// Signed percentage delta carried by a volume-set command.
pub(crate) fn volume_delta(command: &MediaCommand) -> f32 {
    command.param.unwrap_or(0.0)
}

/// Script that nudges the first matching media element's volume by `delta`
/// percent, clamped to `[0, 1]`.
pub(crate) fn volume_script(element: &str, delta: f32) -> String {
    format!(
        "const m = document.querySelector('{element}'); \
         if (m) {{ m.volume = Math.min(1, Math.max(0, m.volume + ({:.3}))); }}",
        delta / 100.0
    )
}
