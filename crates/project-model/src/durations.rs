//! Duration manifest (`scene_durations.json`).
//!
//! The authoritative per-scene duration contract: capture drives each
//! scene for exactly its `duration`, and merge fits the scene's audio to
//! the same value. Durations sit on the frame grid of `settings.fps`, so a
//! scene's tick count and its sample count cover the same span. Every
//! duration can be recomputed from the record and the stored settings alone.

use std::path::Path;

use scenecast_common::clock::FrameClock;
use serde::{Deserialize, Serialize};

use crate::project::{read_json, write_json_atomic, ProjectError};
use crate::script::{ReconcileSettings, SceneId};

/// Current manifest format version.
pub const DURATION_MANIFEST_VERSION: u32 = 2;

/// Recomputed durations must match the stored ones to this precision.
const RECOMPUTE_EPSILON: f64 = 1e-9;

/// Final duration of a scene from its hold time and measured line durations.
///
/// `hold + Σ lines + (n - 1) · silence + padding` for the `n` measured lines
/// of a scene with `scripted_lines > 0`. A scene without scripted lines is
/// `hold`, plus `padding` when `pad_silent_scenes` is set. A scripted scene
/// whose lines all failed keeps `hold + padding`.
///
/// The result is rounded up to a whole number of frames at `settings.fps`.
pub fn scene_duration(
    hold_secs: f64,
    line_secs: &[f64],
    scripted_lines: usize,
    settings: &ReconcileSettings,
) -> f64 {
    let raw = if scripted_lines == 0 {
        if settings.pad_silent_scenes {
            hold_secs + settings.scene_end_padding
        } else {
            hold_secs
        }
    } else {
        let speech: f64 = line_secs.iter().sum();
        let gaps = line_secs.len().saturating_sub(1) as f64 * settings.inter_line_silence;
        hold_secs + speech + gaps + settings.scene_end_padding
    };
    snap_to_frames(raw, settings.fps)
}

/// Round `secs` up to the next frame boundary at `fps`.
pub fn snap_to_frames(secs: f64, fps: u32) -> f64 {
    let clock = FrameClock::new(fps);
    clock.frames_to_secs(clock.frames_for(secs))
}

/// Reference to one synthesized line in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineAudioRef {
    /// Line index within the scene.
    pub line: usize,
    /// Cache file name relative to the project's `audio/` directory.
    pub file: String,
    pub speaker: String,
    /// Duration measured from the waveform header.
    pub duration: f64,
}

/// Final duration record for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDurationRecord {
    pub id: SceneId,
    pub title: String,
    #[serde(rename = "hold_sec", default)]
    pub hold_secs: f64,
    /// Final duration in seconds.
    #[serde(rename = "duration")]
    pub final_duration_secs: f64,
    /// Successfully synthesized lines, in line order.
    #[serde(default)]
    pub audio_files: Vec<LineAudioRef>,
    /// Line indices whose synthesis failed and were left out.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_lines: Vec<usize>,
}

impl SceneDurationRecord {
    /// Build a record, computing its final duration.
    pub fn new(
        id: SceneId,
        title: impl Into<String>,
        hold_secs: f64,
        audio_files: Vec<LineAudioRef>,
        skipped_lines: Vec<usize>,
        settings: &ReconcileSettings,
    ) -> Self {
        let mut record = Self {
            id,
            title: title.into(),
            hold_secs,
            final_duration_secs: 0.0,
            audio_files,
            skipped_lines,
        };
        record.final_duration_secs = record.recompute(settings);
        record
    }

    pub fn line_durations(&self) -> Vec<f64> {
        self.audio_files.iter().map(|a| a.duration).collect()
    }

    /// Lines the script holds for this scene, synthesized or skipped.
    pub fn scripted_lines(&self) -> usize {
        self.audio_files.len() + self.skipped_lines.len()
    }

    /// Recompute the final duration from this record alone.
    pub fn recompute(&self, settings: &ReconcileSettings) -> f64 {
        scene_duration(
            self.hold_secs,
            &self.line_durations(),
            self.scripted_lines(),
            settings,
        )
    }
}

/// The persisted duration contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationManifest {
    pub version: u32,
    pub settings: ReconcileSettings,
    pub scenes: Vec<SceneDurationRecord>,
}

impl DurationManifest {
    pub fn new(settings: ReconcileSettings, scenes: Vec<SceneDurationRecord>) -> Self {
        Self {
            version: DURATION_MANIFEST_VERSION,
            settings,
            scenes,
        }
    }

    /// Load a manifest from disk, rejecting one that violates its own
    /// invariants.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let manifest: Self = read_json(path.as_ref())?;
        if manifest.version > DURATION_MANIFEST_VERSION {
            return Err(ProjectError::invalid(format!(
                "duration manifest version {} is newer than supported version {}",
                manifest.version, DURATION_MANIFEST_VERSION
            )));
        }
        let issues = manifest.verify();
        if !issues.is_empty() {
            return Err(ProjectError::invalid(issues.join("; ")));
        }
        Ok(manifest)
    }

    /// Persist atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        write_json_atomic(path.as_ref(), self)
    }

    pub fn get(&self, id: SceneId) -> Option<&SceneDurationRecord> {
        self.scenes.get(id).filter(|r| r.id == id)
    }

    /// Final durations in scene order.
    pub fn durations(&self) -> Vec<f64> {
        self.scenes.iter().map(|r| r.final_duration_secs).collect()
    }

    pub fn total_secs(&self) -> f64 {
        self.scenes.iter().map(|r| r.final_duration_secs).sum()
    }

    /// Check scene ordering and that every stored duration matches the
    /// value recomputed from the record. Returns a list of problems.
    pub fn verify(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for (expected, record) in self.scenes.iter().enumerate() {
            if record.id != expected {
                issues.push(format!(
                    "scene at position {expected} has id {} (ids must be dense and ascending)",
                    record.id
                ));
            }
            let recomputed = record.recompute(&self.settings);
            if (recomputed - record.final_duration_secs).abs() > RECOMPUTE_EPSILON {
                issues.push(format!(
                    "scene {} duration {:.6}s does not match recomputed {:.6}s",
                    record.id, record.final_duration_secs, recomputed
                ));
            }
            if !record.final_duration_secs.is_finite() || record.final_duration_secs < 0.0 {
                issues.push(format!(
                    "scene {} has invalid duration {}",
                    record.id, record.final_duration_secs
                ));
            }
        }
        issues
    }

    /// Check that every referenced line file exists under `audio_dir`.
    /// Returns a list of missing files.
    pub fn validate_sources(&self, audio_dir: &Path) -> Vec<String> {
        let mut missing = Vec::new();
        for record in &self.scenes {
            for audio in &record.audio_files {
                let path = audio_dir.join(&audio.file);
                if !path.exists() {
                    missing.push(format!(
                        "scene {} line {}: {}",
                        record.id,
                        audio.line,
                        path.display()
                    ));
                }
            }
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn settings() -> ReconcileSettings {
        ReconcileSettings {
            speed_scale: 1.0,
            inter_line_silence: 0.3,
            scene_end_padding: 0.5,
            pad_silent_scenes: false,
            fps: 30,
        }
    }

    fn line(line: usize, duration: f64) -> LineAudioRef {
        LineAudioRef {
            line,
            file: format!("scene_00_{line:02}.wav"),
            speaker: "narrator".into(),
            duration,
        }
    }

    #[test]
    fn test_scene_duration_formula() {
        let s = settings();
        assert!((scene_duration(0.0, &[1.2, 0.8], 2, &s) - 2.8).abs() < 1e-9);
        assert!((scene_duration(0.0, &[2.0], 1, &s) - 2.5).abs() < 1e-9);
        assert!((scene_duration(1.0, &[2.0], 1, &s) - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_silent_scene_is_hold_only_unless_padded() {
        let mut s = settings();
        assert_eq!(scene_duration(0.0, &[], 0, &s), 0.0);
        assert!((scene_duration(2.0, &[], 0, &s) - 2.0).abs() < 1e-9);
        s.pad_silent_scenes = true;
        assert!((scene_duration(0.0, &[], 0, &s) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_scene_with_every_line_failed_keeps_padding() {
        let s = settings();
        assert!((scene_duration(0.0, &[], 1, &s) - 0.5).abs() < 1e-9);
        let record = SceneDurationRecord::new(0, "Lost", 0.0, vec![], vec![0, 1], &s);
        assert_eq!(record.scripted_lines(), 2);
        assert!((record.final_duration_secs - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_durations_sit_on_the_frame_grid() {
        let s = settings();
        // 1.0001 + 0.5 = 1.5001s -> 46 frames
        let d = scene_duration(0.0, &[1.0001], 1, &s);
        assert!((d - 46.0 / 30.0).abs() < 1e-12);
        assert_eq!(FrameClock::new(30).frames_for(d), 46);
        assert!((snap_to_frames(d, 30) - d).abs() < 1e-12);
    }

    #[test]
    fn test_verify_detects_tampered_duration() {
        let s = settings();
        let mut record = SceneDurationRecord::new(0, "Intro", 0.0, vec![line(0, 1.0)], vec![], &s);
        assert!((record.final_duration_secs - 1.5).abs() < 1e-9);
        record.final_duration_secs = 1.6;
        let manifest = DurationManifest::new(s, vec![record]);
        let issues = manifest.verify();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("does not match"));
    }

    #[test]
    fn test_save_load_preserves_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene_durations.json");
        let s = settings();
        let manifest = DurationManifest::new(
            s,
            vec![
                SceneDurationRecord::new(0, "A", 0.0, vec![line(0, 1.2), line(1, 0.8)], vec![], &s),
                SceneDurationRecord::new(1, "B", 0.0, vec![], vec![], &s),
            ],
        );
        manifest.save(&path).unwrap();
        let first = std::fs::read(&path).unwrap();

        let loaded = DurationManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
        loaded.save(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), first);

        let text = String::from_utf8(first).unwrap();
        assert!(!text.contains("skipped_lines"));
        assert!(text.contains("\"duration\""));
    }

    #[test]
    fn test_validate_sources_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("scene_00_00.wav"), b"RIFF").unwrap();
        let s = settings();
        let manifest = DurationManifest::new(
            s,
            vec![SceneDurationRecord::new(
                0,
                "A",
                0.0,
                vec![line(0, 1.0), line(1, 1.0)],
                vec![],
                &s,
            )],
        );
        let missing = manifest.validate_sources(dir.path());
        assert_eq!(missing.len(), 1);
        assert!(missing[0].contains("scene_00_01.wav"));
    }

    proptest! {
        #[test]
        fn prop_duration_covers_speech_and_hold(
            hold in 0.0f64..10.0,
            lines in proptest::collection::vec(0.0f64..20.0, 0..8),
            silence in 0.0f64..2.0,
            padding in 0.0f64..2.0,
            fps in prop::sample::select(vec![24u32, 25, 30, 60]),
        ) {
            let s = ReconcileSettings {
                speed_scale: 1.0,
                inter_line_silence: silence,
                scene_end_padding: padding,
                pad_silent_scenes: false,
                fps,
            };
            let d = scene_duration(hold, &lines, lines.len(), &s);
            let speech: f64 = lines.iter().sum();
            prop_assert!(d + 1e-9 >= hold + speech);
            if !lines.is_empty() {
                prop_assert!(d + 1e-9 >= hold + speech + padding);
            }
            let frames = d * fps as f64;
            prop_assert!((frames - frames.round()).abs() < 1e-6);
            let raw = if lines.is_empty() {
                hold
            } else {
                hold + speech + (lines.len() - 1) as f64 * silence + padding
            };
            prop_assert!(d < raw + 1.0 / fps as f64 + 1e-9);
        }
    }
}
