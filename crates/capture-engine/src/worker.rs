//! Chunk worker: captures one contiguous scene range into one file.

use std::path::PathBuf;
use std::time::Duration;

use scenecast_common::clock::{FrameClock, RunClock};
use scenecast_common::{ScenecastError, ScenecastResult};
use scenecast_project_model::{Chunk, SceneId};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::encoder::FrameSinkFactory;
use crate::frame::frame_slot;
use crate::surface::{PresentationSurface, SurfaceLauncher};

/// Per-worker timing and presentation settings.
#[derive(Debug, Clone)]
pub struct WorkerTiming {
    pub fps: u32,
    /// CSS zoom applied to the presentation body.
    pub zoom: f64,
    pub ready_timeout: Duration,
    pub first_frame_timeout: Duration,
    /// Pause after the readiness barrier so canvases can initialise.
    pub warmup: Duration,
    /// Pause after each priming jump.
    pub settle: Duration,
}

impl WorkerTiming {
    /// Worst-case time spent before the first tick.
    pub fn setup_allowance(&self) -> Duration {
        self.ready_timeout + self.first_frame_timeout + self.warmup + self.settle * 2
    }
}

/// Work assigned to one worker.
#[derive(Debug, Clone)]
pub struct ChunkJob {
    pub chunk: Chunk,
    /// Final durations of the chunk's scenes, in scene order.
    pub scene_durations: Vec<f64>,
    pub output: PathBuf,
    /// Wall-clock limit from the loaded page to the finalized file.
    pub budget: Duration,
}

impl ChunkJob {
    pub fn expected_frames(&self, clock: &FrameClock) -> u64 {
        self.scene_durations
            .iter()
            .map(|&d| clock.frames_for(d))
            .sum()
    }

    pub fn expected_secs(&self) -> f64 {
        self.scene_durations.iter().sum()
    }
}

/// Result of a successful chunk capture.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub chunk: Chunk,
    pub output: PathBuf,
    /// Ticks per scene, in scene order.
    pub scene_frames: Vec<(SceneId, u64)>,
    pub expected_frames: u64,
    pub frames_written: u64,
    /// Frames pushed by the surface (including overwritten ones).
    pub frames_received: u64,
    pub elapsed_secs: f64,
}

/// Sender half of a capture-wide abort signal.
pub type AbortHandle = watch::Sender<bool>;

/// Receiver half of a capture-wide abort signal.
pub type AbortSignal = watch::Receiver<bool>;

/// Create an abort signal shared by every worker of one capture.
pub fn abort_signal() -> (AbortHandle, AbortSignal) {
    watch::channel(false)
}

/// Resolves once the signal is raised. A dropped sender never aborts.
async fn aborted(mut signal: AbortSignal) {
    if signal.wait_for(|&raised| raised).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Capture one chunk.
///
/// The surface is shut down on every path once launched: success, error,
/// an exceeded budget, or an abort raised by another worker.
pub async fn capture_chunk(
    job: &ChunkJob,
    launcher: &dyn SurfaceLauncher,
    sinks: &dyn FrameSinkFactory,
    timing: &WorkerTiming,
    abort: AbortSignal,
) -> ScenecastResult<ChunkOutcome> {
    let chunk = job.chunk.index;
    if job.scene_durations.len() != job.chunk.len() {
        return Err(ScenecastError::capture(
            chunk,
            format!(
                "{} durations supplied for {} scenes",
                job.scene_durations.len(),
                job.chunk.len()
            ),
        ));
    }

    tracing::info!(
        chunk,
        start = job.chunk.start,
        end = job.chunk.end,
        duration_secs = job.expected_secs(),
        "Worker starting"
    );

    let mut surface = launcher.launch(chunk).await?;
    let result = tokio::select! {
        driven = tokio::time::timeout(job.budget, drive(job, surface.as_mut(), sinks, timing)) => {
            driven.unwrap_or_else(|_| {
                Err(ScenecastError::capture(
                    chunk,
                    format!("exceeded wall-clock budget of {:.0}s", job.budget.as_secs_f64()),
                ))
            })
        }
        _ = aborted(abort) => {
            Err(ScenecastError::capture(chunk, "aborted after another chunk failed"))
        }
    };
    if let Err(e) = surface.shutdown().await {
        tracing::warn!(chunk, error = %e, "Surface shutdown failed");
    }
    result
}

async fn drive(
    job: &ChunkJob,
    surface: &mut dyn PresentationSurface,
    sinks: &dyn FrameSinkFactory,
    timing: &WorkerTiming,
) -> ScenecastResult<ChunkOutcome> {
    let chunk = job.chunk.index;
    let clock = FrameClock::new(timing.fps);
    let run = RunClock::start();

    surface.apply_zoom(timing.zoom).await?;
    surface.wait_ready(timing.ready_timeout).await?;
    tokio::time::sleep(timing.warmup).await;

    let (writer, mut reader) = frame_slot();
    surface.start_frames(writer).await?;
    if !reader.wait_first(timing.first_frame_timeout).await {
        return Err(ScenecastError::capture(
            chunk,
            format!(
                "no frame received within {:?}",
                timing.first_frame_timeout
            ),
        ));
    }

    // Visit the first scene, then step back one, so the loop below records
    // the entry transition into the first scene.
    if let Some(priming) = job.chunk.priming_scene() {
        surface.jump_to_scene(job.chunk.first_scene()).await?;
        tokio::time::sleep(timing.settle).await;
        surface.jump_to_scene(priming).await?;
        tokio::time::sleep(timing.settle).await;
    }

    let mut sink = sinks.create(&job.chunk, &job.output)?;
    let mut ticker = tokio::time::interval(clock.tick_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut scene_frames = Vec::with_capacity(job.chunk.len());
    for (scene, &duration) in job.chunk.range().zip(&job.scene_durations) {
        surface.jump_to_scene(scene).await?;
        let frames = clock.frames_for(duration);
        for _ in 0..frames {
            ticker.tick().await;
            let frame = reader
                .latest()
                .ok_or_else(|| ScenecastError::capture(chunk, "frame slot emptied"))?;
            sink.write_frame(&frame).await?;
        }
        tracing::info!(chunk, scene, frames, duration_secs = duration, "Scene captured");
        scene_frames.push((scene, frames));
    }

    if let Err(e) = surface.stop_frames().await {
        tracing::warn!(chunk, error = %e, "Stopping frame stream failed");
    }
    let frames_written = sink.finish().await?;
    let expected_frames: u64 = scene_frames.iter().map(|(_, f)| f).sum();
    if frames_written != expected_frames {
        return Err(ScenecastError::capture(
            chunk,
            format!("encoder committed {frames_written} frames, expected {expected_frames}"),
        ));
    }

    let outcome = ChunkOutcome {
        chunk: job.chunk,
        output: job.output.clone(),
        scene_frames,
        expected_frames,
        frames_written,
        frames_received: reader.published(),
        elapsed_secs: run.elapsed_secs(),
    };
    tracing::info!(
        chunk,
        frames = outcome.frames_written,
        received = outcome.frames_received,
        elapsed_secs = outcome.elapsed_secs,
        "Chunk complete"
    );
    Ok(outcome)
}
