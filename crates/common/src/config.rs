//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where projects are stored. Relative project names given on
    /// the command line are resolved against it when they don't exist in
    /// the working directory.
    pub projects_dir: PathBuf,

    /// Speech synthesis service settings.
    pub synthesis: SynthesisDefaults,

    /// Default capture settings.
    pub capture: CaptureDefaults,

    /// Default merge settings.
    pub merge: MergeDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Speech synthesis service defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisDefaults {
    /// Base URL of the VOICEVOX engine.
    pub voicevox_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Capture orchestrator defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Number of parallel capture workers.
    pub workers: usize,

    /// Viewport width in CSS pixels.
    pub width: u32,

    /// Viewport height in CSS pixels.
    pub height: u32,

    /// CSS zoom applied to the presentation body.
    pub zoom: f64,

    /// Explicit browser binary; autodetected when unset.
    pub browser_executable: Option<PathBuf>,

    /// Page load timeout (seconds).
    pub load_timeout_secs: u64,

    /// Fonts-ready wait timeout (seconds).
    pub ready_timeout_secs: u64,

    /// Timeout for the first screencast frame (seconds).
    pub first_frame_timeout_secs: u64,

    /// Pause after load so canvases can initialise (milliseconds).
    pub warmup_ms: u64,

    /// Pause between the priming jumps (milliseconds).
    pub settle_ms: u64,

    /// Screencast JPEG quality.
    pub jpeg_quality: u32,

    /// x264 CRF for chunk encoding.
    pub crf: u32,

    /// Multiplier applied to a chunk's expected duration to get its
    /// wall-clock budget.
    pub budget_factor: f64,

    /// Fixed slack added to every chunk budget (seconds).
    pub budget_slack_secs: u64,

    /// Maximum wait for an encoder to flush after stdin closes (seconds).
    pub encoder_finish_timeout_secs: u64,

    /// Maximum wait for a graceful browser close (seconds).
    pub browser_close_timeout_secs: u64,
}

/// Merge engine defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeDefaults {
    /// Overflow beyond this many seconds is reported as a mismatch.
    pub tolerance_secs: f64,

    /// Sample rate used for scenes without any synthesized audio.
    pub default_sample_rate: u32,

    /// Final audio codec.
    pub audio_codec: String,

    /// Final audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// x264 CRF for the normalisation pass.
    pub crf: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "scenecast_capture_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for SynthesisDefaults {
    fn default() -> Self {
        Self {
            voicevox_url: "http://127.0.0.1:50021".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            workers: 4,
            width: 1440,
            height: 810,
            zoom: 1.5,
            browser_executable: None,
            load_timeout_secs: 30,
            ready_timeout_secs: 10,
            first_frame_timeout_secs: 10,
            warmup_ms: 2000,
            settle_ms: 1500,
            jpeg_quality: 90,
            crf: 20,
            budget_factor: 2.0,
            budget_slack_secs: 120,
            encoder_finish_timeout_secs: 120,
            browser_close_timeout_secs: 5,
        }
    }
}

impl Default for MergeDefaults {
    fn default() -> Self {
        Self {
            tolerance_secs: 0.1,
            default_sample_rate: 24000,
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: 192,
            crf: 20,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        let mut config = if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        if config.projects_dir.as_os_str().is_empty() {
            config.projects_dir = dirs_default_projects();
        }
        config
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Resolve a project argument: an existing path wins, otherwise the name
    /// is looked up under `projects_dir`.
    pub fn resolve_project(&self, project: &std::path::Path) -> PathBuf {
        if project.exists() || project.is_absolute() {
            project.to_path_buf()
        } else {
            self.projects_dir.join(project)
        }
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("scenecast").join("config.json")
}

/// Default projects directory.
fn dirs_default_projects() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("scenecast").join("projects")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_section_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"capture": {"workers": 8}, "merge": {}}"#).unwrap();
        assert_eq!(config.capture.workers, 8);
        assert_eq!(config.capture.zoom, 1.5);
        assert!((config.merge.tolerance_secs - 0.1).abs() < 1e-9);
        assert_eq!(config.synthesis.voicevox_url, "http://127.0.0.1:50021");
    }

    #[test]
    fn test_resolve_project_prefers_existing_path() {
        let config = AppConfig {
            projects_dir: PathBuf::from("/srv/projects"),
            ..AppConfig::default()
        };
        assert_eq!(
            config.resolve_project(std::path::Path::new("mozart_effect")),
            PathBuf::from("/srv/projects/mozart_effect")
        );
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(config.resolve_project(&cwd), cwd);
    }
}
