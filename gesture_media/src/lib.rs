//! # gesture_media
//!
//! Hand-gesture media remote. Wires [`hand_gesture`] recognition to
//! [`media_control`] dispatch through a threaded, backpressured pipeline.
//!
//! ```text
//!  FrameSource ─► LandmarkExtractor ─► GestureClassifier ─► GestureStabilizer
//!                                                                  │ GestureEvent
//!                                                                  ▼
//!  active MediaController ◄─ Dispatcher ◄─ command queue ◄─ CommandMapper
//! ```
//!
//! The simulation source ([`sim`]) drives the whole pipeline from a pose
//! script; the `leap` feature adds a Leap Motion source.

pub mod mapper;
pub mod config;
pub mod queue;
pub mod pipeline;
pub mod sim;
pub mod cli;
#[cfg(feature = "leap")]
pub mod leap;

pub use mapper::{default_rules, CommandMapper, MappingRule};
pub use config::{CaptureConfig, Config, ConfigError, DispatchConfig};
pub use queue::FrameQueue;
pub use pipeline::{DropReason, Pipeline, EVENT_BUFFER, PipelineError, PipelineEvent, PipelineHandle, PipelineStats};
pub use sim::{ScriptError, SimEngine, SimFrame, SimHand, SimSource};
