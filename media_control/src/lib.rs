//! # media_control
//!
//! Abstract media commands and the machinery that carries them out on a
//! streaming platform.
//!
//! ```text
//!  MediaCommand ──► Dispatcher ──► ControllerRegistry ──► ControllerWorker (thread)
//!                   retry/backoff   active platform        └─► MediaController
//!                                                               └─► Automation engine
//! ```
//!
//! Controllers are a closed set ([`Platform`]) behind one trait
//! ([`MediaController`]), so retry and timeout handling stays uniform across
//! platforms.

pub mod command;
pub mod automation;
pub mod controller;
pub mod platforms;
pub mod worker;
pub mod registry;
pub mod dispatcher;

pub use command::{Capabilities, CommandKind, MediaCommand};
pub use automation::{Automation, AutomationError, DryRunAutomation, Key, SessionToken, UiAction};
pub use controller::{
    controller_for, Ack, ConnectError, ControllerSession, ExecError, MediaController, Platform, SessionHandle,
};
pub use worker::{CallError, ControllerWorker};
pub use registry::{ControllerRegistry, RegistryError};
pub use dispatcher::{DispatchOutcome, Dispatcher, RetryPolicy, SkipReason};
