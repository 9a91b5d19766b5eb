//! Project directory layout and shared persistence helpers.
//!
//! A project is a directory holding the script manifest, the presentation
//! page, the line cache and every build artifact:
//!
//! ```text
//! scene_map.json          script manifest (input)
//! index.html              presentation surface (input)
//! audio/                  line cache + fitted scene audio
//! scene_durations.json    duration contract
//! chunks/                 raw chunk captures + capture.json
//! recording.mp4           normalised video
//! final_output.mp4        muxed result
//! ```

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::capture::CaptureManifest;
use crate::durations::DurationManifest;
use crate::script::{SceneId, ScriptManifest};

pub const SCRIPT_FILE: &str = "scene_map.json";
pub const PAGE_FILE: &str = "index.html";
pub const DURATIONS_FILE: &str = "scene_durations.json";
pub const CAPTURE_FILE: &str = "capture.json";
pub const AUDIO_DIR: &str = "audio";
pub const CHUNKS_DIR: &str = "chunks";
pub const RECORDING_FILE: &str = "recording.mp4";
pub const FINAL_OUTPUT_FILE: &str = "final_output.mp4";
pub const FULL_AUDIO_FILE: &str = "full_audio.wav";

/// Paths inside a project directory.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// Filesystem path to the project directory.
    pub root: PathBuf,
}

impl ProjectLayout {
    /// Open an existing project directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ProjectError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(ProjectError::ValidationError {
                message: format!("project directory not found: {}", root.display()),
            });
        }
        Ok(Self { root })
    }

    /// Project name (the directory's file name).
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    pub fn script_path(&self) -> PathBuf {
        self.root.join(SCRIPT_FILE)
    }

    pub fn page_path(&self) -> PathBuf {
        self.root.join(PAGE_FILE)
    }

    pub fn durations_path(&self) -> PathBuf {
        self.root.join(DURATIONS_FILE)
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join(AUDIO_DIR)
    }

    pub fn chunks_dir(&self) -> PathBuf {
        self.root.join(CHUNKS_DIR)
    }

    pub fn capture_manifest_path(&self) -> PathBuf {
        self.chunks_dir().join(CAPTURE_FILE)
    }

    pub fn recording_path(&self) -> PathBuf {
        self.root.join(RECORDING_FILE)
    }

    pub fn final_output_path(&self) -> PathBuf {
        self.root.join(FINAL_OUTPUT_FILE)
    }

    pub fn full_audio_path(&self) -> PathBuf {
        self.audio_dir().join(FULL_AUDIO_FILE)
    }

    /// Cache file name for one scripted line (relative to `audio/`).
    pub fn line_audio_name(scene: SceneId, line: usize) -> String {
        format!("scene_{scene:02}_{line:02}.wav")
    }

    /// Fitted per-scene audio file.
    pub fn scene_audio_path(&self, scene: SceneId) -> PathBuf {
        self.audio_dir().join(format!("scene_{scene:02}_full.wav"))
    }

    /// Raw capture for one chunk (relative to `chunks/`).
    pub fn chunk_file_name(index: usize) -> String {
        format!("chunk_{index:02}.mkv")
    }

    /// `file://` URL of the presentation page.
    pub fn page_url(&self) -> Result<String, ProjectError> {
        let page = self.page_path();
        let absolute = page.canonicalize().map_err(|e| ProjectError::IoError {
            path: page.clone(),
            source: e,
        })?;
        Ok(format!(
            "file://{}",
            absolute.to_string_lossy().replace('\\', "/")
        ))
    }

    pub fn load_script(&self) -> Result<ScriptManifest, ProjectError> {
        ScriptManifest::load(self.script_path())
    }

    pub fn load_durations(&self) -> Result<DurationManifest, ProjectError> {
        DurationManifest::load(self.durations_path())
    }

    pub fn load_capture(&self) -> Result<CaptureManifest, ProjectError> {
        CaptureManifest::load(self.capture_manifest_path())
    }
}

/// Read and parse a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ProjectError> {
    let content = std::fs::read_to_string(path).map_err(|e| ProjectError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ProjectError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write pretty JSON through a sibling temp file and rename it into place,
/// so readers never observe a half-written manifest.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), ProjectError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ProjectError::IoError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let mut json = serde_json::to_string_pretty(value).map_err(|e| ProjectError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;
    json.push('\n');

    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    std::fs::write(&tmp, json).map_err(|e| ProjectError::IoError {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| ProjectError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Errors that can occur when working with projects.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid project: {message}")]
    ValidationError { message: String },
}

impl ProjectError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }
}
