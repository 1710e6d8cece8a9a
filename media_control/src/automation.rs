//! The browser/platform automation engine seam.
//!
//! Controllers never talk to a browser directly; they translate commands
//! into [`UiAction`]s and hand them to an [`Automation`] implementation one
//! at a time. [`DryRunAutomation`] logs instead of acting, like a null audio
//! or MIDI output, and keeps a journal that tests and the simulator read.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

// ════════════════════════════════════════════════════════════════════════════
// Actions
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Char(char),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Space      => f.write_str("Space"),
            Self::ArrowUp    => f.write_str("ArrowUp"),
            Self::ArrowDown  => f.write_str("ArrowDown"),
            Self::ArrowLeft  => f.write_str("ArrowLeft"),
            Self::ArrowRight => f.write_str("ArrowRight"),
            Self::Char(c)    => write!(f, "{c}"),
        }
    }
}

/// One discrete UI action.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Navigate(String),
    Press { key: Key, shift: bool },
    Click { selector: String },
    Script(String),
}

impl UiAction {
    pub fn key(key: Key) -> Self {
        Self::Press { key, shift: false }
    }

    pub fn shifted(key: Key) -> Self {
        Self::Press { key, shift: true }
    }

    pub fn click(selector: impl Into<String>) -> Self {
        Self::Click { selector: selector.into() }
    }
}

impl fmt::Display for UiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate(url)             => write!(f, "navigate {url}"),
            Self::Press { key, shift: false } => write!(f, "press {key}"),
            Self::Press { key, shift: true }  => write!(f, "press Shift+{key}"),
            Self::Click { selector }        => write!(f, "click {selector}"),
            Self::Script(js)                => write!(f, "script {js}"),
        }
    }
}

/// Opaque handle to one automation session (a browser tab, a driver
/// session, an API token).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutomationError {
    #[error("automation engine unreachable: {0}")]
    Unreachable(String),
    #[error("automation session lost")]
    SessionLost,
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("automation call timed out")]
    Timeout,
}

// ════════════════════════════════════════════════════════════════════════════
// Automation trait
// ════════════════════════════════════════════════════════════════════════════

pub trait Automation: Send + 'static {
    fn open_session(&mut self) -> Result<SessionToken, AutomationError>;

    fn is_alive(&mut self, session: &SessionToken) -> bool;

    fn perform(&mut self, session: &SessionToken, action: &UiAction) -> Result<(), AutomationError>;

    fn close_session(&mut self, session: &SessionToken);
}

impl<A: Automation + ?Sized> Automation for Box<A> {
    fn open_session(&mut self) -> Result<SessionToken, AutomationError> {
        (**self).open_session()
    }
    fn is_alive(&mut self, session: &SessionToken) -> bool {
        (**self).is_alive(session)
    }
    fn perform(&mut self, session: &SessionToken, action: &UiAction) -> Result<(), AutomationError> {
        (**self).perform(session, action)
    }
    fn close_session(&mut self, session: &SessionToken) {
        (**self).close_session(session)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// DryRunAutomation
// ════════════════════════════════════════════════════════════════════════════

/// Everything a dry-run engine has been asked to do, shared between clones.
#[derive(Debug, Default)]
pub struct Journal {
    pub opened:    Vec<SessionToken>,
    pub closed:    Vec<SessionToken>,
    pub performed: Vec<(SessionToken, UiAction)>,
    /// Failures handed out, in order, to the next `perform` calls.
    pub fail_next: VecDeque<AutomationError>,
}

/// Automation engine that only logs. Each clone shares one journal.
#[derive(Debug, Clone)]
pub struct DryRunAutomation {
    label:   String,
    journal: Arc<Mutex<Journal>>,
    counter: Arc<Mutex<u64>>,
}

impl DryRunAutomation {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label:   label.into(),
            journal: Arc::new(Mutex::new(Journal::default())),
            counter: Arc::new(Mutex::new(0)),
        }
    }

    pub fn journal(&self) -> Arc<Mutex<Journal>> {
        Arc::clone(&self.journal)
    }

    /// Make the next `perform` call fail with `err`.
    pub fn fail_next(&self, err: AutomationError) {
        self.journal.lock().fail_next.push_back(err);
    }

    pub fn performed(&self) -> Vec<UiAction> {
        self.journal.lock().performed.iter().map(|(_, a)| a.clone()).collect()
    }
}

impl Automation for DryRunAutomation {
    fn open_session(&mut self) -> Result<SessionToken, AutomationError> {
        let id = {
            let mut c = self.counter.lock();
            *c += 1;
            *c
        };
        let token = SessionToken(format!("{}-{id}", self.label));
        info!(engine = %self.label, session = %token.0, "dry-run session opened");
        self.journal.lock().opened.push(token.clone());
        Ok(token)
    }

    fn is_alive(&mut self, session: &SessionToken) -> bool {
        let j = self.journal.lock();
        j.opened.contains(session) && !j.closed.contains(session)
    }

    fn perform(&mut self, session: &SessionToken, action: &UiAction) -> Result<(), AutomationError> {
        let mut j = self.journal.lock();
        if let Some(err) = j.fail_next.pop_front() {
            info!(engine = %self.label, %action, error = %err, "dry-run injected failure");
            return Err(err);
        }
        info!(engine = %self.label, session = %session.0, %action, "dry-run");
        j.performed.push((session.clone(), action.clone()));
        Ok(())
    }

    fn close_session(&mut self, session: &SessionToken) {
        info!(engine = %self.label, session = %session.0, "dry-run session closed");
        self.journal.lock().closed.push(session.clone());
    }
}
