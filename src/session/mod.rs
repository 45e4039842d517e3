//! Recording session management
//!
//! This module provides the `RecordingCoordinator` abstraction that glues:
//! - Microphone capture and segment encoding
//! - The ordered segment upload queue
//! - The text segment side channel
//! - The render-friendly recording-clock signal

mod config;
mod coordinator;
mod stats;

pub use config::RecorderConfig;
pub use coordinator::{RecordingCoordinator, SessionError};
pub use stats::SessionStats;
