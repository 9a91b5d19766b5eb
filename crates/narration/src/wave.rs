//! PCM wave utilities.
//!
//! Durations are always measured from the wave header (`frames / rate`),
//! never taken from what was requested of the synthesizer.

use std::io::Cursor;
use std::path::Path;

use scenecast_common::{ScenecastError, ScenecastResult};

/// Sample layout of an integer PCM wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl WaveFormat {
    /// 16-bit mono at the given rate.
    pub fn mono16(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
        }
    }

    fn spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        }
    }

    fn from_spec(spec: hound::WavSpec) -> ScenecastResult<Self> {
        if spec.sample_format != hound::SampleFormat::Int {
            return Err(ScenecastError::waveform(
                "floating point PCM is not supported",
            ));
        }
        if spec.sample_rate == 0 || spec.channels == 0 {
            return Err(ScenecastError::waveform(format!(
                "invalid wave header: {} Hz, {} channels",
                spec.sample_rate, spec.channels
            )));
        }
        Ok(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
        })
    }
}

/// Header facts about a wave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveInfo {
    pub format: WaveFormat,
    /// Sample frames per channel.
    pub frames: u64,
}

impl WaveInfo {
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.format.sample_rate as f64
    }
}

/// Inspect an in-memory wave.
pub fn probe_bytes(bytes: &[u8]) -> ScenecastResult<WaveInfo> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(wave_err)?;
    info_from_reader(&reader)
}

/// Inspect a wave file.
pub fn probe_file(path: &Path) -> ScenecastResult<WaveInfo> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| ScenecastError::waveform(format!("{}: {e}", path.display())))?;
    info_from_reader(&reader)
}

fn info_from_reader<R: std::io::Read>(reader: &hound::WavReader<R>) -> ScenecastResult<WaveInfo> {
    Ok(WaveInfo {
        format: WaveFormat::from_spec(reader.spec())?,
        frames: reader.duration() as u64,
    })
}

fn wave_err(e: hound::Error) -> ScenecastError {
    ScenecastError::waveform(e.to_string())
}

/// Interleaved integer PCM held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    format: WaveFormat,
    samples: Vec<i32>,
}

impl PcmBuffer {
    pub fn new(format: WaveFormat) -> Self {
        Self {
            format,
            samples: Vec::new(),
        }
    }

    /// `frames` frames of digital silence.
    pub fn silence(format: WaveFormat, frames: u64) -> Self {
        Self {
            format,
            samples: vec![0; frames as usize * format.channels as usize],
        }
    }

    /// Build from interleaved samples. A trailing partial frame is dropped.
    pub fn from_samples(format: WaveFormat, mut samples: Vec<i32>) -> Self {
        let channels = format.channels as usize;
        samples.truncate(samples.len() / channels * channels);
        Self { format, samples }
    }

    /// Read a wave file fully into memory.
    pub fn read(path: &Path) -> ScenecastResult<Self> {
        let mut reader = hound::WavReader::open(path)
            .map_err(|e| ScenecastError::waveform(format!("{}: {e}", path.display())))?;
        let format = WaveFormat::from_spec(reader.spec())?;
        let samples = reader
            .samples::<i32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ScenecastError::waveform(format!("{}: {e}", path.display())))?;
        Ok(Self::from_samples(format, samples))
    }

    /// Write to a wave file, replacing any existing file.
    pub fn write(&self, path: &Path) -> ScenecastResult<()> {
        let mut writer = hound::WavWriter::create(path, self.format.spec())
            .map_err(|e| ScenecastError::waveform(format!("{}: {e}", path.display())))?;
        for &sample in &self.samples {
            writer.write_sample(sample).map_err(wave_err)?;
        }
        writer.finalize().map_err(wave_err)
    }

    /// Encode to in-memory wave bytes.
    pub fn to_wav_bytes(&self) -> ScenecastResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer =
                hound::WavWriter::new(&mut cursor, self.format.spec()).map_err(wave_err)?;
            for &sample in &self.samples {
                writer.write_sample(sample).map_err(wave_err)?;
            }
            writer.finalize().map_err(wave_err)?;
        }
        Ok(cursor.into_inner())
    }

    pub fn format(&self) -> WaveFormat {
        self.format
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    /// Sample frames per channel.
    pub fn frames(&self) -> u64 {
        (self.samples.len() / self.format.channels as usize) as u64
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.format.sample_rate as f64
    }

    /// Append another buffer of the same format.
    pub fn append(&mut self, other: &PcmBuffer) -> ScenecastResult<()> {
        if other.format != self.format {
            return Err(ScenecastError::waveform(format!(
                "format mismatch: {:?} vs {:?}",
                self.format, other.format
            )));
        }
        self.samples.extend_from_slice(&other.samples);
        Ok(())
    }

    pub fn append_silence(&mut self, frames: u64) {
        let len = self.samples.len() + frames as usize * self.format.channels as usize;
        self.samples.resize(len, 0);
    }

    /// Cut to at most `frames` frames.
    pub fn truncate_frames(&mut self, frames: u64) {
        self.samples
            .truncate(frames as usize * self.format.channels as usize);
    }

    /// Pad with trailing silence or cut the tail so the buffer holds exactly
    /// `frames` frames.
    pub fn fit_to_frames(&mut self, frames: u64) {
        let current = self.frames();
        if current < frames {
            self.append_silence(frames - current);
        } else {
            self.truncate_frames(frames);
        }
    }
}
