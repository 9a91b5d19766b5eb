//! Script manifest: the narration script and its reconciliation tunables.
//!
//! The manifest is supplied externally and never mutated by the pipeline.
//! Scene order in [`SceneSequence`] is the single ordering used for both
//! audio and video assembly.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::project::{read_json, ProjectError};

/// Scene identifier: dense, 0-based, ascending.
pub type SceneId = usize;

/// One scripted spoken line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Speaker name, resolved to a voice id through [`ScriptManifest::speakers`].
    pub speaker: String,
    pub text: String,
}

/// One scene of the presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,

    #[serde(default)]
    pub title: String,

    /// Optional hold time added to the scene regardless of its lines.
    #[serde(rename = "hold_sec", default)]
    pub hold_secs: f64,

    #[serde(default)]
    pub lines: Vec<Line>,
}

impl Scene {
    pub fn is_silent(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Scenes in strictly ascending, gap-free id order starting at 0.
///
/// Construction goes through [`SceneSequence::new`], also on deserialization,
/// so an instance always satisfies `scenes[i].id == i`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Scene>", into = "Vec<Scene>")]
pub struct SceneSequence {
    scenes: Vec<Scene>,
}

impl SceneSequence {
    pub fn new(scenes: Vec<Scene>) -> Result<Self, ProjectError> {
        for (expected, scene) in scenes.iter().enumerate() {
            if scene.id != expected {
                return Err(ProjectError::invalid(format!(
                    "scene ids must be dense and ascending from 0: position {expected} holds id {}",
                    scene.id
                )));
            }
            if !scene.hold_secs.is_finite() || scene.hold_secs < 0.0 {
                return Err(ProjectError::invalid(format!(
                    "scene {} has invalid hold_sec {}",
                    scene.id, scene.hold_secs
                )));
            }
        }
        Ok(Self { scenes })
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn get(&self, id: SceneId) -> Option<&Scene> {
        self.scenes.get(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scene> {
        self.scenes.iter()
    }

    pub fn as_slice(&self) -> &[Scene] {
        &self.scenes
    }

    /// Total number of scripted lines across all scenes.
    pub fn line_count(&self) -> usize {
        self.scenes.iter().map(|s| s.lines.len()).sum()
    }
}

impl TryFrom<Vec<Scene>> for SceneSequence {
    type Error = ProjectError;

    fn try_from(scenes: Vec<Scene>) -> Result<Self, Self::Error> {
        Self::new(scenes)
    }
}

impl From<SceneSequence> for Vec<Scene> {
    fn from(seq: SceneSequence) -> Self {
        seq.scenes
    }
}

impl<'a> IntoIterator for &'a SceneSequence {
    type Item = &'a Scene;
    type IntoIter = std::slice::Iter<'a, Scene>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenes.iter()
    }
}

/// Tunables that feed the per-scene duration formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconcileSettings {
    /// Synthesis rate multiplier passed to the speech service.
    pub speed_scale: f64,
    /// Seconds of silence between consecutive lines within a scene.
    pub inter_line_silence: f64,
    /// Seconds appended after a scene's last line.
    pub scene_end_padding: f64,
    /// Whether line-less scenes also receive `scene_end_padding`.
    #[serde(default)]
    pub pad_silent_scenes: bool,
    /// Capture frame rate; final durations are whole frames at this rate.
    #[serde(default = "default_fps")]
    pub fps: u32,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            speed_scale: default_speed_scale(),
            inter_line_silence: default_inter_line_silence(),
            scene_end_padding: default_scene_end_padding(),
            pad_silent_scenes: false,
            fps: default_fps(),
        }
    }
}

/// The narration script (`scene_map.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptManifest {
    /// Speech engine base URL; overrides the application config when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voicevox_url: Option<String>,

    /// Speaker name to voice id.
    #[serde(default)]
    pub speakers: BTreeMap<String, u32>,

    #[serde(default = "default_speed_scale")]
    pub speed_scale: f64,

    #[serde(default = "default_inter_line_silence")]
    pub inter_line_silence: f64,

    #[serde(default = "default_scene_end_padding")]
    pub scene_end_padding: f64,

    #[serde(default)]
    pub pad_silent_scenes: bool,

    /// Frame rate the presentation is captured at.
    #[serde(default = "default_fps")]
    pub fps: u32,

    pub scenes: SceneSequence,
}

fn default_speed_scale() -> f64 {
    1.0
}

fn default_inter_line_silence() -> f64 {
    0.3
}

fn default_scene_end_padding() -> f64 {
    0.5
}

fn default_fps() -> u32 {
    30
}

impl ScriptManifest {
    /// Load and validate a manifest from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let manifest: Self = read_json(path.as_ref())?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            speed_scale: self.speed_scale,
            inter_line_silence: self.inter_line_silence,
            scene_end_padding: self.scene_end_padding,
            pad_silent_scenes: self.pad_silent_scenes,
            fps: self.fps,
        }
    }

    /// Voice id for a speaker name.
    pub fn voice_id(&self, speaker: &str) -> Option<u32> {
        self.speakers.get(speaker).copied()
    }

    /// Speaker names referenced by lines but missing from the speaker map,
    /// with the first `(scene, line)` that references each.
    pub fn unknown_speakers(&self) -> Vec<(String, SceneId, usize)> {
        let mut unknown: Vec<(String, SceneId, usize)> = Vec::new();
        for scene in &self.scenes {
            for (idx, line) in scene.lines.iter().enumerate() {
                if !self.speakers.contains_key(&line.speaker)
                    && !unknown.iter().any(|(name, _, _)| name == &line.speaker)
                {
                    unknown.push((line.speaker.clone(), scene.id, idx));
                }
            }
        }
        unknown
    }

    /// Check tunables and speaker references.
    pub fn validate(&self) -> Result<(), ProjectError> {
        if !self.speed_scale.is_finite() || self.speed_scale <= 0.0 {
            return Err(ProjectError::invalid(format!(
                "speed_scale must be positive, got {}",
                self.speed_scale
            )));
        }
        if self.fps == 0 {
            return Err(ProjectError::invalid("fps must be at least 1"));
        }
        for (name, value) in [
            ("inter_line_silence", self.inter_line_silence),
            ("scene_end_padding", self.scene_end_padding),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ProjectError::invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if let Some((speaker, scene, line)) = self.unknown_speakers().into_iter().next() {
            return Err(ProjectError::invalid(format!(
                "unknown speaker '{speaker}' (first used by scene {scene} line {line})"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "speakers": {"narrator": 3, "guest": 8},
        "speed_scale": 1.2,
        "scenes": [
            {"id": 0, "title": "Intro", "lines": [
                {"speaker": "narrator", "text": "Welcome."},
                {"speaker": "guest", "text": "Hello."}
            ]},
            {"id": 1, "title": "Pause", "hold_sec": 2.0},
            {"id": 2, "title": "Outro", "lines": [{"speaker": "narrator", "text": "Bye."}]}
        ]
    }"#;

    #[test]
    fn test_parse_applies_defaults() {
        let manifest: ScriptManifest = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(manifest.scenes.len(), 3);
        assert_eq!(manifest.scenes.line_count(), 3);
        assert!((manifest.inter_line_silence - 0.3).abs() < 1e-9);
        assert!((manifest.scene_end_padding - 0.5).abs() < 1e-9);
        assert!(!manifest.pad_silent_scenes);
        assert_eq!(manifest.settings().fps, 30);
        assert!(manifest.scenes.get(1).unwrap().is_silent());
        assert!((manifest.scenes.get(1).unwrap().hold_secs - 2.0).abs() < 1e-9);
        assert_eq!(manifest.voice_id("guest"), Some(8));
        manifest.validate().unwrap();
    }

    #[test]
    fn test_gap_in_scene_ids_is_rejected() {
        let json = r#"{"scenes": [{"id": 0}, {"id": 2}]}"#;
        let err = serde_json::from_str::<ScriptManifest>(json).unwrap_err();
        assert!(err.to_string().contains("dense and ascending"));
    }

    #[test]
    fn test_out_of_order_scene_ids_are_rejected() {
        let scenes = vec![
            Scene {
                id: 1,
                title: String::new(),
                hold_secs: 0.0,
                lines: vec![],
            },
            Scene {
                id: 0,
                title: String::new(),
                hold_secs: 0.0,
                lines: vec![],
            },
        ];
        assert!(SceneSequence::new(scenes).is_err());
    }

    #[test]
    fn test_unknown_speaker_fails_validation() {
        let mut manifest: ScriptManifest = serde_json::from_str(SAMPLE).unwrap();
        manifest.speakers.remove("guest");
        let unknown = manifest.unknown_speakers();
        assert_eq!(unknown, vec![("guest".to_string(), 0, 1)]);
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("unknown speaker 'guest'"));
    }

    #[test]
    fn test_negative_tunable_fails_validation() {
        let mut manifest: ScriptManifest = serde_json::from_str(SAMPLE).unwrap();
        manifest.scene_end_padding = -0.1;
        assert!(manifest.validate().is_err());
        manifest.scene_end_padding = 0.5;
        manifest.speed_scale = 0.0;
        assert!(manifest.validate().is_err());
        manifest.speed_scale = 1.0;
        manifest.fps = 0;
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_sequence_serializes_as_plain_array() {
        let manifest: ScriptManifest = serde_json::from_str(SAMPLE).unwrap();
        let value = serde_json::to_value(&manifest).unwrap();
        assert!(value["scenes"].is_array());
        assert_eq!(value["scenes"][1]["hold_sec"], 2.0);
    }
}
