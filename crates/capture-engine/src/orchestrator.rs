//! Capture orchestrator: partitions the scene range and runs one worker per
//! chunk in parallel.
//!
//! Workers share nothing but an abort signal: each owns its surface, its
//! frame slot and its encoder. The first failing chunk raises the signal,
//! the others release their surfaces and stop, and the run fails.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use scenecast_common::clock::{FrameClock, RunClock};
use scenecast_common::{ScenecastError, ScenecastResult};
use scenecast_project_model::{
    CaptureManifest, ChunkPlan, ChunkRecord, DurationManifest, ProjectLayout,
};
use tokio::task::JoinSet;

use crate::encoder::FrameSinkFactory;
use crate::surface::SurfaceLauncher;
use crate::worker::{abort_signal, capture_chunk, ChunkJob, ChunkOutcome, WorkerTiming};

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub workers: usize,
    pub width: u32,
    pub height: u32,
    pub timing: WorkerTiming,
    /// A chunk may take `expected * budget_factor + budget_slack` (plus setup)
    /// of wall-clock time before it is failed.
    pub budget_factor: f64,
    pub budget_slack: Duration,
}

impl CaptureOptions {
    /// Wall-clock budget for a chunk of `expected_secs` of content.
    pub fn chunk_budget(&self, expected_secs: f64) -> Duration {
        let scaled = Duration::from_secs_f64((expected_secs * self.budget_factor).max(0.0));
        scaled + self.budget_slack + self.timing.setup_allowance()
    }
}

/// Runs all chunk workers for one capture.
pub struct CaptureOrchestrator {
    launcher: Arc<dyn SurfaceLauncher>,
    sinks: Arc<dyn FrameSinkFactory>,
    options: CaptureOptions,
}

impl CaptureOrchestrator {
    pub fn new(
        launcher: Arc<dyn SurfaceLauncher>,
        sinks: Arc<dyn FrameSinkFactory>,
        options: CaptureOptions,
    ) -> Self {
        Self {
            launcher,
            sinks,
            options,
        }
    }

    /// Capture every scene in `durations` into `chunks_dir`.
    ///
    /// The directory is wiped first. On success the capture manifest is
    /// written to `chunks_dir/capture.json` and returned.
    pub async fn run(
        &self,
        durations: &DurationManifest,
        chunks_dir: &Path,
    ) -> ScenecastResult<CaptureManifest> {
        let scene_count = durations.scenes.len();
        let plan = ChunkPlan::partition(scene_count, self.options.workers)
            .map_err(|e| ScenecastError::config(e.to_string()))?;
        if self.options.timing.fps != durations.settings.fps {
            return Err(ScenecastError::config(format!(
                "capture runs at {}fps but durations were reconciled for {}fps",
                self.options.timing.fps, durations.settings.fps
            )));
        }
        let clock = FrameClock::new(self.options.timing.fps);
        let run_clock = RunClock::start();

        reset_dir(chunks_dir)?;

        tracing::info!(
            scenes = scene_count,
            workers = self.options.workers,
            chunks = plan.len(),
            fps = clock.fps(),
            total_secs = durations.total_secs(),
            "Starting capture"
        );

        let all = durations.durations();
        let (abort, signal) = abort_signal();
        let mut set = JoinSet::new();
        for chunk in plan.chunks() {
            let scene_durations = all[chunk.range()].to_vec();
            let budget = self
                .options
                .chunk_budget(scene_durations.iter().sum());
            let job = ChunkJob {
                chunk: *chunk,
                scene_durations,
                output: chunks_dir.join(ProjectLayout::chunk_file_name(chunk.index)),
                budget,
            };
            let signal = signal.clone();
            let launcher = self.launcher.clone();
            let sinks = self.sinks.clone();
            let timing = self.options.timing.clone();

            tracing::info!(
                chunk = chunk.index,
                start = chunk.start,
                end = chunk.end,
                frames = job.expected_frames(&clock),
                budget_secs = budget.as_secs_f64(),
                "Chunk scheduled"
            );

            set.spawn(async move {
                let result =
                    capture_chunk(&job, launcher.as_ref(), sinks.as_ref(), &timing, signal).await;
                (job.chunk.index, result)
            });
        }

        let mut outcomes: Vec<ChunkOutcome> = Vec::with_capacity(plan.len());
        while let Some(joined) = set.join_next().await {
            let failure = match joined {
                Ok((_, Ok(outcome))) => {
                    outcomes.push(outcome);
                    continue;
                }
                Ok((index, Err(e))) => {
                    tracing::error!(chunk = index, error = %e, "Chunk failed; aborting capture");
                    e
                }
                Err(e) => {
                    tracing::error!(error = %e, "Capture worker panicked; aborting capture");
                    ScenecastError::Other(anyhow::anyhow!("capture worker panicked: {e}"))
                }
            };
            // Every worker shuts its surface down on abort; wait for them.
            let _ = abort.send(true);
            while set.join_next().await.is_some() {}
            return Err(failure);
        }

        outcomes.sort_by_key(|o| o.chunk.index);
        let manifest = CaptureManifest {
            fps: clock.fps(),
            width: self.options.width,
            height: self.options.height,
            zoom: self.options.timing.zoom,
            recorded_at: run_clock.epoch_wall().to_string(),
            scene_count,
            chunks: outcomes
                .iter()
                .map(|o| ChunkRecord {
                    index: o.chunk.index,
                    start: o.chunk.start,
                    end: o.chunk.end,
                    file: ProjectLayout::chunk_file_name(o.chunk.index),
                    expected_frames: o.expected_frames,
                    frames_written: o.frames_written,
                })
                .collect(),
        };
        manifest
            .plan()
            .map_err(|e| ScenecastError::config(format!("capture manifest invalid: {e}")))?;
        manifest
            .save(chunks_dir.join(scenecast_project_model::CAPTURE_FILE))
            .map_err(|e| ScenecastError::config(e.to_string()))?;

        let frames = manifest.total_frames();
        tracing::info!(
            chunks = manifest.chunks.len(),
            frames,
            video_secs = clock.frames_to_secs(frames),
            elapsed_secs = run_clock.elapsed_secs(),
            "Capture complete"
        );
        Ok(manifest)
    }
}

/// Capture a project directory using its duration manifest.
pub async fn capture_project(
    layout: &ProjectLayout,
    orchestrator: &CaptureOrchestrator,
) -> ScenecastResult<CaptureManifest> {
    let durations_path = layout.durations_path();
    if !durations_path.exists() {
        return Err(ScenecastError::FileNotFound {
            path: durations_path,
        });
    }
    let durations = layout
        .load_durations()
        .map_err(|e| ScenecastError::config(e.to_string()))?;
    orchestrator.run(&durations, &layout.chunks_dir()).await
}

fn reset_dir(dir: &Path) -> ScenecastResult<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}
