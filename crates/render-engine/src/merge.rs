//! Merge engine: fitted audio track, joined and normalised video, final mux.

use scenecast_common::clock::{DriftMeasurement, FrameClock, RunClock};
use scenecast_common::{ScenecastError, ScenecastResult};
use scenecast_project_model::ProjectLayout;

use crate::audio::{assemble_audio, AudioOptions, AudioReport};
use crate::video::{
    command_exists, concat_args, concat_list, mux_args, normalize_args, probe_duration, run_ffmpeg,
};

/// Name of the concat list inside the chunks directory.
pub const CONCAT_LIST_FILE: &str = "concat_list.txt";

/// Intermediate stream-copied join of all chunks.
const JOINED_FILE: &str = "joined.mkv";

/// Merge settings.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub audio: AudioOptions,
    /// x264 CRF for the normalisation pass.
    pub crf: u32,
    pub audio_codec: String,
    pub audio_bitrate_kbps: u32,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            audio: AudioOptions::default(),
            crf: 20,
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: 192,
        }
    }
}

/// Outcome of a merge.
#[derive(Debug, Clone)]
pub struct MergeReport {
    pub audio: AudioReport,
    /// Duration implied by the captured frame counts.
    pub expected_video_secs: f64,
    /// Measured duration of the normalised recording.
    pub video_secs: f64,
    /// Measured duration of the muxed output.
    pub output_secs: f64,
}

impl MergeReport {
    /// Normalised recording against the captured frame count.
    pub fn video_drift(&self) -> DriftMeasurement {
        DriftMeasurement::from_secs(self.expected_video_secs, self.video_secs)
    }

    /// Muxed output against the assembled audio track.
    pub fn output_drift(&self) -> DriftMeasurement {
        DriftMeasurement::from_secs(self.audio.total_secs(), self.output_secs)
    }
}

/// Produce `final_output.mp4` for a captured and reconciled project.
pub fn merge_project(layout: &ProjectLayout, options: &MergeOptions) -> ScenecastResult<MergeReport> {
    for path in [layout.durations_path(), layout.capture_manifest_path()] {
        if !path.exists() {
            return Err(ScenecastError::FileNotFound { path });
        }
    }
    let durations = layout
        .load_durations()
        .map_err(|e| ScenecastError::config(e.to_string()))?;
    let capture = layout
        .load_capture()
        .map_err(|e| ScenecastError::config(e.to_string()))?;
    let issues = capture.mismatches(&durations);
    if !issues.is_empty() {
        return Err(ScenecastError::merge(format!(
            "captured video does not match the duration manifest ({}); re-run capture",
            issues.join("; ")
        )));
    }

    for tool in ["ffmpeg", "ffprobe"] {
        if !command_exists(tool) {
            return Err(ScenecastError::unsupported(format!("{tool} not found on PATH")));
        }
    }

    let run_clock = RunClock::start();
    let clock = FrameClock::new(capture.fps);
    tracing::info!(
        project = %layout.name(),
        scenes = capture.scene_count,
        chunks = capture.chunks.len(),
        fps = capture.fps,
        "Starting merge"
    );

    let audio = assemble_audio(layout, &durations, &options.audio)?;

    let chunks_dir = layout.chunks_dir();
    let files = capture
        .ordered_files(&chunks_dir)
        .map_err(|e| ScenecastError::merge(e.to_string()))?;
    let list_path = chunks_dir.join(CONCAT_LIST_FILE);
    std::fs::write(&list_path, concat_list(&files))?;

    let joined = chunks_dir.join(JOINED_FILE);
    run_ffmpeg("concat", &concat_args(&list_path, &joined))?;
    let recording = layout.recording_path();
    run_ffmpeg(
        "normalize",
        &normalize_args(&joined, &recording, capture.fps, options.crf),
    )?;
    if let Err(e) = std::fs::remove_file(&joined) {
        tracing::debug!(error = %e, "Could not remove joined intermediate");
    }

    let output = layout.final_output_path();
    run_ffmpeg(
        "mux",
        &mux_args(
            &recording,
            &layout.full_audio_path(),
            &output,
            &options.audio_codec,
            options.audio_bitrate_kbps,
        ),
    )?;

    let report = MergeReport {
        expected_video_secs: clock.frames_to_secs(capture.total_frames()),
        video_secs: probe_duration(&recording)?,
        output_secs: probe_duration(&output)?,
        audio,
    };

    let frame_ms = clock.frame_ms();
    let video_drift = report.video_drift();
    if video_drift.exceeds_threshold_ms(frame_ms) {
        tracing::warn!(
            drift_ms = video_drift.drift_ms(),
            expected_secs = report.expected_video_secs,
            actual_secs = report.video_secs,
            "Recording length differs from captured frame count"
        );
    }
    let output_drift = report.output_drift();
    if output_drift.exceeds_threshold_ms(frame_ms) {
        tracing::warn!(
            drift_ms = output_drift.drift_ms(),
            audio_secs = report.audio.total_secs(),
            video_secs = report.video_secs,
            "Final output is shorter than the audio track"
        );
    }

    tracing::info!(
        output = %output.display(),
        video_secs = report.video_secs,
        audio_secs = report.audio.total_secs(),
        output_secs = report.output_secs,
        minutes = report.output_secs / 60.0,
        elapsed_secs = run_clock.elapsed_secs(),
        "Merge complete"
    );
    Ok(report)
}
