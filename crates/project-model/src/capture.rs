//! Capture manifest (`chunks/capture.json`): which raw chunk file covers
//! which scenes, and how many frames each contains.

use std::path::{Path, PathBuf};

use scenecast_common::clock::FrameClock;
use serde::{Deserialize, Serialize};

use crate::chunk::{Chunk, ChunkPlan};
use crate::durations::DurationManifest;
use crate::project::{read_json, write_json_atomic, ProjectError};

/// One captured chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    /// File name relative to the chunks directory.
    pub file: String,
    /// Sum of per-scene tick counts for the chunk.
    pub expected_frames: u64,
    /// Frames actually written to the encoder.
    pub frames_written: u64,
}

impl ChunkRecord {
    pub fn chunk(&self) -> Chunk {
        Chunk {
            index: self.index,
            start: self.start,
            end: self.end,
        }
    }
}

/// Output of one capture run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureManifest {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub zoom: f64,
    /// When the capture run started (RFC 3339).
    pub recorded_at: String,
    pub scene_count: usize,
    /// Chunks in index order.
    pub chunks: Vec<ChunkRecord>,
}

impl CaptureManifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProjectError> {
        read_json(path.as_ref())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ProjectError> {
        write_json_atomic(path.as_ref(), self)
    }

    /// Re-check the partition invariant of the recorded chunks.
    pub fn plan(&self) -> Result<ChunkPlan, ProjectError> {
        ChunkPlan::from_chunks(
            self.scene_count,
            self.chunks.iter().map(ChunkRecord::chunk).collect(),
        )
    }

    pub fn total_frames(&self) -> u64 {
        self.chunks.iter().map(|c| c.frames_written).sum()
    }

    /// Check the recorded chunks against the current duration manifest:
    /// scene count, frame rate, and every chunk's tick count. Returns a list
    /// of problems, each naming the chunk it concerns.
    pub fn mismatches(&self, durations: &DurationManifest) -> Vec<String> {
        let mut issues = Vec::new();
        if self.scene_count != durations.scenes.len() {
            issues.push(format!(
                "capture covers {} scenes but the duration manifest has {}",
                self.scene_count,
                durations.scenes.len()
            ));
            return issues;
        }
        if self.fps != durations.settings.fps {
            issues.push(format!(
                "capture ran at {}fps but durations are reconciled for {}fps",
                self.fps, durations.settings.fps
            ));
            return issues;
        }
        let clock = FrameClock::new(self.fps);
        for record in &self.chunks {
            let Some(scenes) = durations.scenes.get(record.start..record.end) else {
                issues.push(format!(
                    "chunk {} covers scenes [{}, {}) outside the duration manifest",
                    record.index, record.start, record.end
                ));
                continue;
            };
            let expected: u64 = scenes
                .iter()
                .map(|s| clock.frames_for(s.final_duration_secs))
                .sum();
            if record.expected_frames != expected {
                issues.push(format!(
                    "chunk {} was captured with {} frames but its scenes now need {}",
                    record.index, record.expected_frames, expected
                ));
            }
            if record.frames_written != record.expected_frames {
                issues.push(format!(
                    "chunk {} holds {} frames, expected {}",
                    record.index, record.frames_written, record.expected_frames
                ));
            }
        }
        issues
    }

    /// Chunk files in chunk-start order, verifying that the chunks form a
    /// complete cover of the scene range and that every file exists.
    pub fn ordered_files(&self, chunks_dir: &Path) -> Result<Vec<PathBuf>, ProjectError> {
        self.plan()?;
        let mut files = Vec::with_capacity(self.chunks.len());
        for record in &self.chunks {
            let path = chunks_dir.join(&record.file);
            if !path.is_file() {
                return Err(ProjectError::invalid(format!(
                    "chunk {} file missing: {}",
                    record.index,
                    path.display()
                )));
            }
            files.push(path);
        }
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(chunks: Vec<ChunkRecord>) -> CaptureManifest {
        CaptureManifest {
            fps: 30,
            width: 1440,
            height: 810,
            zoom: 1.5,
            recorded_at: chrono::Utc::now().to_rfc3339(),
            scene_count: 5,
            chunks,
        }
    }

    fn record(index: usize, start: usize, end: usize) -> ChunkRecord {
        ChunkRecord {
            index,
            start,
            end,
            file: format!("chunk_{index:02}.mkv"),
            expected_frames: 30,
            frames_written: 30,
        }
    }

    #[test]
    fn test_ordered_files_requires_existing_cover() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chunk_00.mkv"), b"x").unwrap();
        std::fs::write(dir.path().join("chunk_01.mkv"), b"x").unwrap();

        let good = manifest(vec![record(0, 0, 3), record(1, 3, 5)]);
        let files = good.ordered_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("chunk_00.mkv"));
        assert_eq!(good.total_frames(), 60);

        let gap = manifest(vec![record(0, 0, 3)]);
        assert!(gap.ordered_files(dir.path()).is_err());

        let missing = manifest(vec![record(0, 0, 2), record(1, 2, 4), record(2, 4, 5)]);
        let err = missing.ordered_files(dir.path()).unwrap_err();
        assert!(err.to_string().contains("chunk 2 file missing"));
    }

    #[test]
    fn test_mismatches_name_the_chunk_whose_scenes_changed() {
        use crate::durations::SceneDurationRecord;
        use crate::script::ReconcileSettings;

        let settings = ReconcileSettings::default();
        let durations = |holds: &[f64]| {
            DurationManifest::new(
                settings,
                holds
                    .iter()
                    .enumerate()
                    .map(|(id, &h)| SceneDurationRecord::new(id, "", h, vec![], vec![], &settings))
                    .collect(),
            )
        };
        let mut capture = manifest(vec![
            ChunkRecord {
                expected_frames: 84 + 15,
                frames_written: 84 + 15,
                ..record(0, 0, 2)
            },
            ChunkRecord {
                expected_frames: 30,
                frames_written: 30,
                ..record(1, 2, 3)
            },
        ]);
        capture.scene_count = 3;

        assert!(capture.mismatches(&durations(&[2.8, 0.5, 1.0])).is_empty());

        // scene 0 re-reconciled from 2.8s to 3.1s
        let issues = capture.mismatches(&durations(&[3.1, 0.5, 1.0]));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("chunk 0"));
        assert!(issues[0].contains("now need 108"));

        let issues = capture.mismatches(&durations(&[2.8, 0.5]));
        assert!(issues[0].contains("covers 3 scenes"));
    }
}
