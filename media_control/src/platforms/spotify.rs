//! Spotify web player: transport buttons by `data-testid`, volume by script.

use crate::automation::{Automation, UiAction};
use crate::command::{Capabilities, CommandKind, MediaCommand};
use crate::controller::{Ack, ConnectError, ControllerSession, ExecError, MediaController, Platform};

use super::{volume_delta, volume_script, BrowserSession};

const PLAY_PAUSE: &str = "button[data-testid=\"control-button-playpause\"]";
const SKIP_NEXT:  &str = "button[data-testid=\"control-button-skip-forward\"]";
const SKIP_BACK:  &str = "button[data-testid=\"control-button-skip-back\"]";
const MUTE:       &str = "button[data-testid=\"volume-bar-toggle-mute-button\"]";

/// Volume step for volume-up / volume-down, in percent.
const VOLUME_STEP: f32 = 10.0;

pub struct SpotifyController<A> {
    session: BrowserSession<A>,
}

impl<A: Automation> SpotifyController<A> {
    pub fn new(automation: A) -> Self {
        let caps = Capabilities::all().without(&[CommandKind::SeekForward, CommandKind::SeekBackward]);
        Self { session: BrowserSession::new(Platform::Spotify, caps, automation) }
    }

    fn action(command: &MediaCommand) -> Option<UiAction> {
        match command.kind {
            CommandKind::PlayPause  => Some(UiAction::click(PLAY_PAUSE)),
            CommandKind::Next       => Some(UiAction::click(SKIP_NEXT)),
            CommandKind::Previous   => Some(UiAction::click(SKIP_BACK)),
            CommandKind::Mute       => Some(UiAction::click(MUTE)),
            CommandKind::VolumeUp   => Some(UiAction::Script(volume_script("audio", VOLUME_STEP))),
            CommandKind::VolumeDown => Some(UiAction::Script(volume_script("audio", -VOLUME_STEP))),
            CommandKind::VolumeSet  => Some(UiAction::Script(volume_script("audio", volume_delta(command)))),
            CommandKind::SeekForward | CommandKind::SeekBackward | CommandKind::NoOp => None,
        }
    }
}

impl<A: Automation> MediaController for SpotifyController<A> {
    fn platform(&self)     -> Platform     { self.session.platform() }
    fn capabilities(&self) -> Capabilities { self.session.capabilities() }

    fn ensure_session(&mut self) -> Result<ControllerSession, ConnectError> {
        self.session.ensure()
    }

    fn execute(&mut self, command: &MediaCommand) -> Result<Ack, ExecError> {
        self.session.run(command, Self::action(command))
    }

    fn release(&mut self) {
        self.session.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::DryRunAutomation;

    #[test]
    fn seek_is_unsupported_and_never_actuated() {
        let engine = DryRunAutomation::new("sp");
        let mut c = SpotifyController::new(engine.clone());
        c.ensure_session().unwrap();
        let before = engine.performed().len();
        assert_eq!(
            c.execute(&MediaCommand::with_param(CommandKind::SeekForward, 10.0)),
            Err(ExecError::Unsupported(CommandKind::SeekForward))
        );
        assert_eq!(engine.performed().len(), before);
    }

    #[test]
    fn transport_clicks_test_ids() {
        let engine = DryRunAutomation::new("sp");
        let mut c = SpotifyController::new(engine.clone());
        c.ensure_session().unwrap();
        c.execute(&MediaCommand::new(CommandKind::Next)).unwrap();
        assert_eq!(engine.performed().last(), Some(&UiAction::click(SKIP_NEXT)));
    }

    #[test]
    fn volume_goes_through_audio_element() {
        let engine = DryRunAutomation::new("sp");
        let mut c = SpotifyController::new(engine.clone());
        c.ensure_session().unwrap();
        c.execute(&MediaCommand::new(CommandKind::VolumeDown)).unwrap();
        match engine.performed().last() {
            Some(UiAction::Script(js)) => assert!(js.contains("'audio'") && js.contains("-0.100")),
            other => panic!("unexpected action {other:?}"),
        }
    }
}
