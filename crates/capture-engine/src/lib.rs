//! Scenecast Capture Engine
//!
//! Records the presentation into one raw video file per chunk, with all
//! chunks captured in parallel.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────── CaptureOrchestrator ─────────────────────────────┐
//! │  ChunkPlan [0,3) [3,6) [6,9) [9,10)                                           │
//! │                                                                               │
//! │  worker 0                     worker 1                     ...                │
//! │  ┌─────────────┐              ┌─────────────┐                                 │
//! │  │ Surface     │ push frames  │ Surface     │                                 │
//! │  │  (Chromium) ├──────┐       │  (Chromium) ├──────┐                          │
//! │  └──────▲──────┘      ▼       └──────▲──────┘      ▼                          │
//! │   goTo(id)     latest-frame    goTo(id)     latest-frame                      │
//! │         │         slot               │         slot                           │
//! │  ┌──────┴──────┐      │       ┌──────┴──────┐      │                          │
//! │  │ tick loop   │◄─────┘       │ tick loop   │◄─────┘                          │
//! │  └──────┬──────┘              └──────┬──────┘                                 │
//! │         ▼ stdin                      ▼ stdin                                  │
//! │   ffmpeg → chunk_00.mkv        ffmpeg → chunk_01.mkv                          │
//! └───────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each scene is recorded for exactly `ceil(duration * fps)` ticks. Frame
//! counts are fixed by the duration manifest, never corrected against the
//! wall clock.

pub mod encoder;
pub mod frame;
pub mod orchestrator;
pub mod surface;
pub mod worker;

pub use encoder::{EncoderConfig, FfmpegSinkFactory, FrameSink, FrameSinkFactory};
pub use frame::{frame_slot, Frame, FrameReader, FrameWriter};
pub use orchestrator::{capture_project, CaptureOptions, CaptureOrchestrator};
pub use surface::{ChromiumLauncher, PresentationSurface, SurfaceLauncher, SurfaceOptions};
pub use worker::{
    abort_signal, capture_chunk, AbortHandle, AbortSignal, ChunkJob, ChunkOutcome, WorkerTiming,
};
