//! YouTube: keyboard shortcuts on the watch page.

use crate::automation::{Automation, Key, UiAction};
use crate::command::{Capabilities, CommandKind, MediaCommand};
use crate::controller::{Ack, ConnectError, ControllerSession, ExecError, MediaController, Platform};

use super::{volume_delta, BrowserSession};

/// Seconds the `l` / `j` shortcuts jump.
const SHORTCUT_SEEK: f32 = 10.0;

const PLAYER: &str = "#movie_player";

pub struct YouTubeController<A> {
    session: BrowserSession<A>,
}

impl<A: Automation> YouTubeController<A> {
    pub fn new(automation: A) -> Self {
        Self { session: BrowserSession::new(Platform::YouTube, Capabilities::all(), automation) }
    }

    fn action(command: &MediaCommand) -> Option<UiAction> {
        let action = match command.kind {
            CommandKind::PlayPause    => UiAction::key(Key::Char('k')),
            CommandKind::Next         => UiAction::shifted(Key::Char('N')),
            CommandKind::Previous     => UiAction::shifted(Key::Char('P')),
            CommandKind::VolumeUp     => UiAction::key(Key::ArrowUp),
            CommandKind::VolumeDown   => UiAction::key(Key::ArrowDown),
            CommandKind::Mute         => UiAction::key(Key::Char('m')),
            CommandKind::SeekForward  => seek(command, 1.0, 'l'),
            CommandKind::SeekBackward => seek(command, -1.0, 'j'),
            CommandKind::VolumeSet    => player_script(&format!(
                "p.setVolume(Math.min(100, Math.max(0, p.getVolume() + ({:.1}))));",
                volume_delta(command)
            )),
            CommandKind::NoOp => return None,
        };
        Some(action)
    }
}

/// The shortcut when the step is the one it jumps, a player seek otherwise.
fn seek(command: &MediaCommand, direction: f32, shortcut: char) -> UiAction {
    let step = command.param.unwrap_or(SHORTCUT_SEEK).abs();
    if (step - SHORTCUT_SEEK).abs() < f32::EPSILON {
        return UiAction::key(Key::Char(shortcut));
    }
    player_script(&format!(
        "p.seekTo(Math.max(0, p.getCurrentTime() + ({:.1})), true);",
        direction * step
    ))
}

fn player_script(body: &str) -> UiAction {
    UiAction::Script(format!("const p = document.querySelector('{PLAYER}'); if (p) {{ {body} }}"))
}

impl<A: Automation> MediaController for YouTubeController<A> {
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

    fn ready() -> (YouTubeController<DryRunAutomation>, DryRunAutomation) {
        let engine = DryRunAutomation::new("yt");
        let mut c = YouTubeController::new(engine.clone());
        c.ensure_session().unwrap();
        engine.journal().lock().performed.clear();
        (c, engine)
    }

    #[test]
    fn shortcuts_match_the_player() {
        let (mut c, engine) = ready();
        c.execute(&MediaCommand::new(CommandKind::PlayPause)).unwrap();
        c.execute(&MediaCommand::new(CommandKind::Next)).unwrap();
        c.execute(&MediaCommand::new(CommandKind::SeekBackward)).unwrap();
        assert_eq!(
            engine.performed(),
            vec![
                UiAction::key(Key::Char('k')),
                UiAction::shifted(Key::Char('N')),
                UiAction::key(Key::Char('j')),
            ]
        );
    }

    #[test]
    fn volume_set_is_one_player_call() {
        let (mut c, engine) = ready();
        let ack = c.execute(&MediaCommand::with_param(CommandKind::VolumeSet, -1.5)).unwrap();
        let UiAction::Script(js) = &ack.action else { panic!("{:?}", ack.action) };
        assert!(js.contains("#movie_player") && js.contains("(-1.5)"), "{js}");
        assert_eq!(engine.performed(), vec![ack.action.clone()]);
    }

    #[test]
    fn seek_honours_the_mapped_step() {
        let (mut c, engine) = ready();
        c.execute(&MediaCommand::with_param(CommandKind::SeekForward, 10.0)).unwrap();
        c.execute(&MediaCommand::with_param(CommandKind::SeekBackward, 30.0)).unwrap();
        let performed = engine.performed();
        assert_eq!(performed[0], UiAction::key(Key::Char('l')));
        match &performed[1] {
            UiAction::Script(js) => assert!(js.contains("seekTo") && js.contains("(-30.0)"), "{js}"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
