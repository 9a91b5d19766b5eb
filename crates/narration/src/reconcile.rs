//! Duration reconciliation.
//!
//! Walks the script scene by scene, line by line, synthesizing every line
//! that is not cached yet, and turns the measured waveform durations into
//! the per-scene duration contract.

use scenecast_common::{ScenecastError, ScenecastResult};
use scenecast_project_model::{
    DurationManifest, LineAudioRef, ProjectLayout, ReconcileSettings, SceneDurationRecord,
    ScriptManifest,
};

use crate::cache::{CachedLine, WaveCache};
use crate::synth::SpeechSynthesizer;

/// A line that was left out of its scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedLine {
    pub scene: usize,
    pub line: usize,
    pub reason: String,
}

/// Outcome counters for one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileSummary {
    pub scenes: usize,
    pub lines: usize,
    pub synthesized: usize,
    pub cached: usize,
    pub skipped: Vec<SkippedLine>,
    pub total_secs: f64,
}

/// Duration Reconciliation Engine.
pub struct Reconciler {
    synthesizer: Box<dyn SpeechSynthesizer>,
    cache: WaveCache,
}

impl Reconciler {
    pub fn new(synthesizer: Box<dyn SpeechSynthesizer>, cache: WaveCache) -> Self {
        Self { synthesizer, cache }
    }

    /// Reconcile every scene of `script`.
    ///
    /// Unknown speakers abort before any synthesis. A failed line is logged
    /// and skipped; the scene's duration is computed from the remaining
    /// lines.
    pub async fn run(
        &self,
        script: &ScriptManifest,
    ) -> ScenecastResult<(DurationManifest, ReconcileSummary)> {
        if let Some((speaker, scene, line)) = script.unknown_speakers().into_iter().next() {
            return Err(ScenecastError::config(format!(
                "unknown speaker '{speaker}' in scene {scene} line {line}"
            )));
        }
        let settings = script.settings();
        let total_lines = script.scenes.line_count();
        let mut summary = ReconcileSummary {
            scenes: script.scenes.len(),
            lines: total_lines,
            ..ReconcileSummary::default()
        };

        tracing::info!(
            scenes = script.scenes.len(),
            lines = total_lines,
            synthesizer = self.synthesizer.name(),
            speed_scale = settings.speed_scale,
            "Reconciling scene durations"
        );

        let mut counter = 0usize;
        let mut records = Vec::with_capacity(script.scenes.len());
        for scene in &script.scenes {
            let mut audio_files = Vec::with_capacity(scene.lines.len());
            let mut skipped_lines = Vec::new();

            for (idx, line) in scene.lines.iter().enumerate() {
                counter += 1;
                let voice_id = script.voice_id(&line.speaker).ok_or_else(|| {
                    ScenecastError::config(format!(
                        "unknown speaker '{}' in scene {} line {idx}",
                        line.speaker, scene.id
                    ))
                })?;

                let cached = match self.cache.lookup(scene.id, idx)? {
                    Some(hit) => {
                        tracing::info!(
                            "[{counter}/{total_lines}] SKIP {} ({:.2}s)",
                            hit.file,
                            hit.duration_secs()
                        );
                        summary.cached += 1;
                        hit
                    }
                    None => match self
                        .synthesize_line(scene.id, idx, &line.text, voice_id, &settings)
                        .await
                    {
                        Ok(stored) => {
                            tracing::info!(
                                "[{counter}/{total_lines}] {} ({:.2}s) {}",
                                stored.file,
                                stored.duration_secs(),
                                preview(&line.text)
                            );
                            summary.synthesized += 1;
                            stored
                        }
                        Err(e) if e.is_transient() => {
                            tracing::warn!(
                                scene = scene.id,
                                line = idx,
                                error = %e,
                                "[{counter}/{total_lines}] Line skipped"
                            );
                            skipped_lines.push(idx);
                            summary.skipped.push(SkippedLine {
                                scene: scene.id,
                                line: idx,
                                reason: e.to_string(),
                            });
                            continue;
                        }
                        Err(e) => return Err(e),
                    },
                };

                audio_files.push(LineAudioRef {
                    line: idx,
                    file: cached.file,
                    speaker: line.speaker.clone(),
                    duration: cached.info.duration_secs(),
                });
            }

            let record = SceneDurationRecord::new(
                scene.id,
                scene.title.clone(),
                scene.hold_secs,
                audio_files,
                skipped_lines,
                &settings,
            );
            summary.total_secs += record.final_duration_secs;
            tracing::info!(
                scene = record.id,
                title = %record.title,
                lines = record.audio_files.len(),
                skipped = record.skipped_lines.len(),
                duration_secs = record.final_duration_secs,
                running_total_secs = summary.total_secs,
                "Scene reconciled"
            );
            records.push(record);
        }

        tracing::info!(
            total_secs = summary.total_secs,
            total_mins = summary.total_secs / 60.0,
            synthesized = summary.synthesized,
            cached = summary.cached,
            skipped = summary.skipped.len(),
            "Reconciliation complete"
        );

        Ok((DurationManifest::new(settings, records), summary))
    }

    async fn synthesize_line(
        &self,
        scene: usize,
        line: usize,
        text: &str,
        voice_id: u32,
        settings: &ReconcileSettings,
    ) -> ScenecastResult<CachedLine> {
        let bytes = self
            .synthesizer
            .synthesize(text, voice_id, settings.speed_scale)
            .await
            .map_err(|e| ScenecastError::synthesis(scene, line, e.to_string()))?;
        match self.cache.store(scene, line, &bytes) {
            Ok(stored) => Ok(stored),
            Err(ScenecastError::Waveform { message }) => Err(ScenecastError::synthesis(
                scene,
                line,
                format!("service returned an unreadable waveform: {message}"),
            )),
            Err(e) => Err(e),
        }
    }
}

/// Reconcile a project directory and persist `scene_durations.json`.
pub async fn reconcile_project(
    layout: &ProjectLayout,
    synthesizer: Box<dyn SpeechSynthesizer>,
) -> ScenecastResult<ReconcileSummary> {
    let script_path = layout.script_path();
    if !script_path.exists() {
        return Err(ScenecastError::FileNotFound { path: script_path });
    }
    let script = layout
        .load_script()
        .map_err(|e| ScenecastError::config(e.to_string()))?;

    let reconciler = Reconciler::new(synthesizer, WaveCache::new(layout.audio_dir()));
    let (manifest, summary) = reconciler.run(&script).await?;
    manifest
        .save(layout.durations_path())
        .map_err(|e| ScenecastError::config(e.to_string()))?;
    tracing::info!(path = %layout.durations_path().display(), "Duration manifest written");
    Ok(summary)
}

fn preview(text: &str) -> String {
    const MAX: usize = 30;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_by_chars() {
        assert_eq!(preview("short"), "short");
        let long = "あ".repeat(40);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 33);
    }
}
