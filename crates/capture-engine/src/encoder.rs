//! Chunk encoder: an ffmpeg subprocess fed encoded frames over stdin.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use scenecast_common::{ScenecastError, ScenecastResult};
use scenecast_project_model::Chunk;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

/// Destination for one chunk's frames.
#[async_trait::async_trait]
pub trait FrameSink: Send {
    /// Append one frame.
    async fn write_frame(&mut self, frame: &[u8]) -> ScenecastResult<()>;

    /// Close the input and wait for the output to be finalized. Returns the
    /// number of frames the output actually holds.
    async fn finish(&mut self) -> ScenecastResult<u64>;
}

/// Creates one sink per chunk.
pub trait FrameSinkFactory: Send + Sync {
    fn create(&self, chunk: &Chunk, output: &Path) -> ScenecastResult<Box<dyn FrameSink>>;
}

/// Encoder settings.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub fps: u32,
    /// x264 constant rate factor.
    pub crf: u32,
    /// How long to wait for ffmpeg to flush after stdin closes.
    pub finish_timeout: Duration,
}

/// Spawns `ffmpeg -f image2pipe` encoders.
#[derive(Debug, Clone)]
pub struct FfmpegSinkFactory {
    config: EncoderConfig,
}

impl FfmpegSinkFactory {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }
}

impl FrameSinkFactory for FfmpegSinkFactory {
    fn create(&self, chunk: &Chunk, output: &Path) -> ScenecastResult<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegSink::spawn(
            chunk.index,
            output,
            &self.config,
        )?))
    }
}

/// Build the encoder argument list.
pub fn encoder_args(config: &EncoderConfig, output: &Path) -> Vec<String> {
    let fps = config.fps.to_string();
    let crf = config.crf.to_string();
    let mut args: Vec<String> = [
        "-y",
        "-loglevel",
        "error",
        "-nostats",
        "-progress",
        "pipe:1",
        "-f",
        "image2pipe",
        "-framerate",
        fps.as_str(),
        "-i",
        "pipe:0",
        "-c:v",
        "libx264",
        "-preset",
        "fast",
        "-crf",
        crf.as_str(),
        "-pix_fmt",
        "yuv420p",
        "-r",
        fps.as_str(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(output.to_string_lossy().into_owned());
    args
}

/// Frame count carried by one `frame=` line of an ffmpeg `-progress` stream.
pub fn parse_progress_frames(line: &str) -> Option<u64> {
    line.trim().strip_prefix("frame=")?.trim().parse().ok()
}

/// A running ffmpeg process encoding one chunk.
///
/// The child is spawned with `kill_on_drop`, so dropping the sink on an
/// error path terminates the encoder.
pub struct FfmpegSink {
    chunk: usize,
    output: PathBuf,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    progress_task: Option<JoinHandle<Option<u64>>>,
    frames: u64,
    finish_timeout: Duration,
}

impl FfmpegSink {
    pub fn spawn(chunk: usize, output: &Path, config: &EncoderConfig) -> ScenecastResult<Self> {
        let mut child = Command::new("ffmpeg")
            .args(encoder_args(config, output))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ScenecastError::capture(chunk, format!("failed to spawn ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ScenecastError::capture(chunk, "ffmpeg stdin unavailable"))?;

        // Drain stderr in the background; a full pipe would stall ffmpeg.
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        // Encoded frame count as reported by ffmpeg itself.
        let progress_task = child.stdout.take().map(|stdout| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                let mut encoded = None;
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(frames) = parse_progress_frames(&line) {
                        encoded = Some(frames);
                    }
                }
                encoded
            })
        });

        tracing::debug!(chunk, output = %output.display(), "Encoder started");
        Ok(Self {
            chunk,
            output: output.to_path_buf(),
            child,
            stdin: Some(stdin),
            stderr_task,
            progress_task,
            frames: 0,
            finish_timeout: config.finish_timeout,
        })
    }

    async fn stderr_tail(&mut self) -> String {
        match self.stderr_task.take() {
            Some(task) => {
                let text = task.await.unwrap_or_default();
                let lines: Vec<&str> = text.lines().collect();
                lines[lines.len().saturating_sub(5)..].join(" | ")
            }
            None => String::new(),
        }
    }
}

#[async_trait::async_trait]
impl FrameSink for FfmpegSink {
    async fn write_frame(&mut self, frame: &[u8]) -> ScenecastResult<()> {
        let chunk = self.chunk;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ScenecastError::capture(chunk, "encoder already finished"))?;
        if let Err(e) = stdin.write_all(frame).await {
            let tail = self.stderr_tail().await;
            return Err(ScenecastError::capture(
                chunk,
                format!("writing frame {} to ffmpeg failed: {e} {tail}", self.frames),
            ));
        }
        self.frames += 1;
        Ok(())
    }

    async fn finish(&mut self) -> ScenecastResult<u64> {
        let chunk = self.chunk;
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }

        let status = match tokio::time::timeout(self.finish_timeout, self.child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(ScenecastError::capture(
                    chunk,
                    format!("waiting for ffmpeg failed: {e}"),
                ))
            }
            Err(_) => {
                let _ = self.child.kill().await;
                return Err(ScenecastError::capture(
                    chunk,
                    format!(
                        "ffmpeg did not finish within {:?}; killed",
                        self.finish_timeout
                    ),
                ));
            }
        };

        if !status.success() {
            let tail = self.stderr_tail().await;
            return Err(ScenecastError::capture(
                chunk,
                format!("ffmpeg exited with {status}: {tail}"),
            ));
        }

        let encoded = match self.progress_task.take() {
            Some(task) => task.await.ok().flatten(),
            None => None,
        };
        let encoded = encoded.ok_or_else(|| {
            ScenecastError::capture(chunk, "ffmpeg reported no encoded frame count")
        })?;

        tracing::debug!(
            chunk,
            piped = self.frames,
            encoded,
            output = %self.output.display(),
            "Encoder finished"
        );
        Ok(encoded)
    }
}
