//! Scenecast Common Utilities
//!
//! Shared infrastructure for all Scenecast crates:
//! - Error taxonomy and result aliases
//! - Frame clock and drift utilities for audio/video synchronization
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
