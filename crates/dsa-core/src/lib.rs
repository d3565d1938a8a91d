//! Core session logic for ds-anywhere
//!
//! This crate provides the foundational types, error handling, event hub,
//! frame scheduling, configuration, and logging infrastructure shared by
//! the rest of the workspace.

pub mod config;
pub mod error;
pub mod events;
pub mod firmware;
pub mod lifecycle;
pub mod logging;
pub mod scheduler;

pub use config::{Config, InputSettings};
pub use error::{EmulatorError, Result};
pub use events::{Channel, EventHub, Subscriber};
pub use firmware::{FirmwareSettings, Language};
pub use lifecycle::SessionState;
pub use scheduler::{FrameScheduler, FrameSpeed};
