//! Scenecast Narration
//!
//! Turns the narration script into the per-scene duration contract:
//! - **Synthesis:** VOICEVOX client behind the [`SpeechSynthesizer`] seam
//! - **Cache:** write-once line waveforms keyed by `(scene, line)`
//! - **Reconciliation:** measured line durations to final scene durations
//! - **Wave:** PCM helpers shared with the merge stage

pub mod cache;
pub mod reconcile;
pub mod synth;
pub mod wave;

pub use cache::{CachedLine, WaveCache};
pub use reconcile::{reconcile_project, ReconcileSummary, Reconciler, SkippedLine};
pub use synth::{SpeechSynthesizer, SynthesisError, VoicevoxClient};
pub use wave::{PcmBuffer, WaveFormat, WaveInfo};
