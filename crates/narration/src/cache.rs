//! Write-once cache of synthesized line waveforms, keyed by
//! `(scene id, line index)`.

use std::path::{Path, PathBuf};

use scenecast_common::{ScenecastError, ScenecastResult};
use scenecast_project_model::{ProjectLayout, SceneId};

use crate::wave::{probe_bytes, probe_file, WaveInfo};

/// A cached line waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedLine {
    /// File name relative to the cache directory.
    pub file: String,
    pub info: WaveInfo,
}

impl CachedLine {
    pub fn duration_secs(&self) -> f64 {
        self.info.duration_secs()
    }
}

/// Line cache rooted at a project's `audio/` directory.
#[derive(Debug, Clone)]
pub struct WaveCache {
    dir: PathBuf,
}

impl WaveCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, scene: SceneId, line: usize) -> PathBuf {
        self.dir.join(ProjectLayout::line_audio_name(scene, line))
    }

    /// Look up an existing entry. An entry that exists but is not a readable
    /// wave is a configuration error: the cache is never silently rebuilt.
    pub fn lookup(&self, scene: SceneId, line: usize) -> ScenecastResult<Option<CachedLine>> {
        let path = self.path_for(scene, line);
        if !path.exists() {
            return Ok(None);
        }
        let info = probe_file(&path).map_err(|e| {
            ScenecastError::config(format!(
                "corrupt cached waveform {} ({e}); delete it to re-synthesize",
                path.display()
            ))
        })?;
        Ok(Some(CachedLine {
            file: ProjectLayout::line_audio_name(scene, line),
            info,
        }))
    }

    /// Persist a freshly synthesized waveform.
    ///
    /// The bytes are validated before anything touches disk, then written to
    /// a temporary file and renamed into place. An existing entry is never
    /// overwritten; it is returned instead.
    pub fn store(&self, scene: SceneId, line: usize, bytes: &[u8]) -> ScenecastResult<CachedLine> {
        let info = probe_bytes(bytes)?;
        if let Some(existing) = self.lookup(scene, line)? {
            tracing::debug!(scene, line, file = %existing.file, "Cache entry already present");
            return Ok(existing);
        }

        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(scene, line);
        let tmp = path.with_extension(format!("wav.tmp.{}", std::process::id()));
        std::fs::write(&tmp, bytes)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }

        Ok(CachedLine {
            file: ProjectLayout::line_audio_name(scene, line),
            info,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wave::{PcmBuffer, WaveFormat};

    fn wav(frames: u64) -> Vec<u8> {
        PcmBuffer::silence(WaveFormat::mono16(24000), frames)
            .to_wav_bytes()
            .unwrap()
    }

    #[test]
    fn test_store_then_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = WaveCache::new(dir.path().join("audio"));
        assert!(cache.lookup(0, 0).unwrap().is_none());

        let stored = cache.store(0, 0, &wav(12000)).unwrap();
        assert_eq!(stored.file, "scene_00_00.wav");
        assert!((stored.duration_secs() - 0.5).abs() < 1e-12);

        let found = cache.lookup(0, 0).unwrap().unwrap();
        assert_eq!(found, stored);
    }

    #[test]
    fn test_existing_entry_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let cache = WaveCache::new(dir.path());
        cache.store(1, 2, &wav(2400)).unwrap();
        let before = std::fs::read(cache.path_for(1, 2)).unwrap();

        let second = cache.store(1, 2, &wav(4800)).unwrap();
        assert_eq!(second.info.frames, 2400);
        assert_eq!(std::fs::read(cache.path_for(1, 2)).unwrap(), before);
    }

    #[test]
    fn test_invalid_bytes_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = WaveCache::new(dir.path());
        assert!(cache.store(0, 0, b"<html>error</html>").is_err());
        assert!(!cache.path_for(0, 0).exists());
    }

    #[test]
    fn test_corrupt_entry_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = WaveCache::new(dir.path());
        std::fs::write(cache.path_for(3, 0), b"truncated").unwrap();
        let err = cache.lookup(3, 0).unwrap_err();
        assert!(matches!(err, ScenecastError::Config { .. }));
        assert!(err.to_string().contains("scene_03_00.wav"));
    }
}
