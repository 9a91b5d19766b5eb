//! Scenecast Project Model
//!
//! Defines the core data contracts for Scenecast projects:
//! - **Script:** The read-only scene/line manifest and its tunables
//! - **Durations:** The per-scene duration contract produced by reconciliation
//! - **Chunks:** The invariant-checked partition of scenes across capture workers
//! - **Capture:** The record of which chunk file covers which scenes
//! - **Project:** On-disk layout of a project directory
//!
//! Scene ids are dense and ascending from zero. Every sequence type here
//! rejects input that violates that ordering, because audio and video are
//! both concatenated in scene-id order.

pub mod capture;
pub mod chunk;
pub mod durations;
pub mod project;
pub mod script;

pub use capture::*;
pub use chunk::*;
pub use durations::*;
pub use project::*;
pub use script::*;
