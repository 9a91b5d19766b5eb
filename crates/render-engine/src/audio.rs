//! Scene audio assembly.
//!
//! Each scene's cached line waves are joined with fixed silence gaps and
//! then fitted to the scene's final duration in samples. The full track is
//! the fitted scenes in scene order, so its length is the sum of the
//! per-scene sample counts.

use std::fmt;
use std::path::Path;

use scenecast_common::clock::samples_for;
use scenecast_common::{ScenecastError, ScenecastResult};
use scenecast_narration::{wave, PcmBuffer, WaveFormat};
use scenecast_project_model::{DurationManifest, ProjectLayout, SceneDurationRecord, SceneId};

/// Settings for audio assembly.
#[derive(Debug, Clone)]
pub struct AudioOptions {
    /// Overflow beyond this is reported as a reconciliation mismatch.
    pub tolerance_secs: f64,
    /// Sample rate used when no scene has any synthesized line.
    pub default_sample_rate: u32,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            tolerance_secs: 0.1,
            default_sample_rate: 24000,
        }
    }
}

/// What fitting did to a scene's audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitAction {
    /// Already the exact length.
    Exact,
    /// Trailing silence added.
    Padded,
    /// Tail cut within tolerance.
    Trimmed,
    /// Tail cut beyond tolerance.
    Overflow,
}

impl fmt::Display for FitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FitAction::Exact => "OK",
            FitAction::Padded => "pad",
            FitAction::Trimmed => "trim",
            FitAction::Overflow => "TRIM",
        })
    }
}

/// Fitting result for one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneFit {
    pub scene: SceneId,
    /// Length of the joined lines before fitting.
    pub actual_secs: f64,
    pub target_secs: f64,
    pub action: FitAction,
}

impl SceneFit {
    /// Positive when the joined audio was longer than the target.
    pub fn overflow_secs(&self) -> f64 {
        self.actual_secs - self.target_secs
    }
}

/// Summary of a full-track assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioReport {
    pub format: WaveFormat,
    pub scenes: Vec<SceneFit>,
    pub total_frames: u64,
}

impl AudioReport {
    pub fn total_secs(&self) -> f64 {
        self.total_frames as f64 / self.format.sample_rate as f64
    }

    pub fn count(&self, action: FitAction) -> usize {
        self.scenes.iter().filter(|s| s.action == action).count()
    }
}

/// Join line waves with `silence_secs` gaps and fit the result to exactly
/// the record's final duration.
pub fn fit_scene(
    record: &SceneDurationRecord,
    lines: &[PcmBuffer],
    format: WaveFormat,
    silence_secs: f64,
    tolerance_secs: f64,
) -> ScenecastResult<(PcmBuffer, SceneFit)> {
    let gap = samples_for(silence_secs, format.sample_rate);
    let mut audio = PcmBuffer::new(format);
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            audio.append_silence(gap);
        }
        audio.append(line).map_err(|e| {
            ScenecastError::merge(format!("scene {} line {i}: {e}", record.id))
        })?;
    }

    let actual_secs = audio.duration_secs();
    let target_frames = samples_for(record.final_duration_secs, format.sample_rate);
    let action = match audio.frames().cmp(&target_frames) {
        std::cmp::Ordering::Equal => FitAction::Exact,
        std::cmp::Ordering::Less => FitAction::Padded,
        std::cmp::Ordering::Greater if actual_secs - record.final_duration_secs > tolerance_secs => {
            FitAction::Overflow
        }
        std::cmp::Ordering::Greater => FitAction::Trimmed,
    };
    audio.fit_to_frames(target_frames);

    Ok((
        audio,
        SceneFit {
            scene: record.id,
            actual_secs,
            target_secs: record.final_duration_secs,
            action,
        },
    ))
}

/// Determine the track format from the first referenced line wave, or the
/// default when no scene has audio.
fn track_format(
    durations: &DurationManifest,
    audio_dir: &Path,
    default_sample_rate: u32,
) -> ScenecastResult<WaveFormat> {
    let first = durations
        .scenes
        .iter()
        .flat_map(|s| s.audio_files.iter())
        .next();
    match first {
        Some(line) => {
            let path = audio_dir.join(&line.file);
            Ok(wave::probe_file(&path)
                .map_err(|e| ScenecastError::merge(e.to_string()))?
                .format)
        }
        None => Ok(WaveFormat::mono16(default_sample_rate)),
    }
}

/// Build every scene's fitted audio and the full track, writing
/// `audio/scene_SS_full.wav` for each scene and `audio/full_audio.wav`.
pub fn assemble_audio(
    layout: &ProjectLayout,
    durations: &DurationManifest,
    options: &AudioOptions,
) -> ScenecastResult<AudioReport> {
    let audio_dir = layout.audio_dir();
    std::fs::create_dir_all(&audio_dir)?;
    let format = track_format(durations, &audio_dir, options.default_sample_rate)?;
    let silence = durations.settings.inter_line_silence;

    let mut track = PcmBuffer::new(format);
    let mut fits = Vec::with_capacity(durations.scenes.len());
    for record in &durations.scenes {
        let lines = record
            .audio_files
            .iter()
            .map(|line| {
                let path = audio_dir.join(&line.file);
                PcmBuffer::read(&path).map_err(|e| ScenecastError::merge(e.to_string()))
            })
            .collect::<ScenecastResult<Vec<_>>>()?;

        let (scene_audio, fit) =
            fit_scene(record, &lines, format, silence, options.tolerance_secs)?;
        scene_audio
            .write(&layout.scene_audio_path(record.id))
            .map_err(|e| ScenecastError::merge(e.to_string()))?;

        let line = format!(
            "Scene {}: audio={:.2}s target={:.2}s {}",
            record.id, fit.actual_secs, fit.target_secs, fit.action
        );
        if fit.action == FitAction::Overflow {
            tracing::warn!(
                scene = record.id,
                overflow_secs = fit.overflow_secs(),
                "{line} (audio longer than its reconciled duration)"
            );
        } else {
            tracing::info!(scene = record.id, "{line}");
        }

        track
            .append(&scene_audio)
            .map_err(|e| ScenecastError::merge(e.to_string()))?;
        fits.push(fit);
    }

    track
        .write(&layout.full_audio_path())
        .map_err(|e| ScenecastError::merge(e.to_string()))?;

    let report = AudioReport {
        format,
        scenes: fits,
        total_frames: track.frames(),
    };
    tracing::info!(
        scenes = report.scenes.len(),
        padded = report.count(FitAction::Padded),
        trimmed = report.count(FitAction::Trimmed) + report.count(FitAction::Overflow),
        exact = report.count(FitAction::Exact),
        total_secs = report.total_secs(),
        "Audio track assembled"
    );
    Ok(report)
}
