//! Scenecast Render Engine
//!
//! Merges a captured and reconciled project into one muxed file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! scene_durations.json ──┐
//! audio/scene_SS_LL.wav ─┴── fit each scene ── audio/full_audio.wav ──┐
//!                                                                      ├── mux ── final_output.mp4
//! chunks/capture.json ───┐                                             │
//! chunks/chunk_CC.mkv ───┴── concat (copy) ── normalize ── recording.mp4
//! ```

pub mod audio;
pub mod merge;
pub mod video;

pub use audio::{assemble_audio, fit_scene, AudioOptions, AudioReport, FitAction, SceneFit};
pub use merge::{merge_project, MergeOptions, MergeReport};
pub use video::command_exists;
