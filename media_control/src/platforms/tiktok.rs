//! TikTok: feed navigation by arrow keys, volume by script on `<video>`.

use crate::automation::{Automation, Key, UiAction};
use crate::command::{Capabilities, CommandKind, MediaCommand};
use crate::controller::{Ack, ConnectError, ControllerSession, ExecError, MediaController, Platform};

use super::{volume_delta, volume_script, BrowserSession};

const VOLUME_STEP: f32 = 10.0;

pub struct TikTokController<A> {
    session: BrowserSession<A>,
}

impl<A: Automation> TikTokController<A> {
    pub fn new(automation: A) -> Self {
        let caps = Capabilities::all().without(&[CommandKind::SeekForward, CommandKind::SeekBackward]);
        Self { session: BrowserSession::new(Platform::TikTok, caps, automation) }
    }

    fn action(command: &MediaCommand) -> Option<UiAction> {
        match command.kind {
            CommandKind::PlayPause  => Some(UiAction::key(Key::Space)),
            // the feed scrolls vertically
            CommandKind::Next       => Some(UiAction::key(Key::ArrowDown)),
            CommandKind::Previous   => Some(UiAction::key(Key::ArrowUp)),
            CommandKind::Mute       => Some(UiAction::key(Key::Char('m'))),
            CommandKind::VolumeUp   => Some(UiAction::Script(volume_script("video", VOLUME_STEP))),
            CommandKind::VolumeDown => Some(UiAction::Script(volume_script("video", -VOLUME_STEP))),
            CommandKind::VolumeSet  => Some(UiAction::Script(volume_script("video", volume_delta(command)))),
            CommandKind::SeekForward | CommandKind::SeekBackward | CommandKind::NoOp => None,
        }
    }
}

impl<A: Automation> MediaController for TikTokController<A> {
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
