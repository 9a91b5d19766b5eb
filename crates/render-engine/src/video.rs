//! ffmpeg/ffprobe invocations for the merge: chunk concatenation,
//! normalisation and the final mux.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use scenecast_common::{ScenecastError, ScenecastResult};

/// Body of an ffmpeg concat-demuxer list for `files`, in the given order.
pub fn concat_list(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| {
            let path = f.to_string_lossy().replace('\'', r"'\''");
            format!("file '{path}'\n")
        })
        .collect()
}

/// Join chunk files without re-encoding.
pub fn concat_args(list: &Path, output: &Path) -> Vec<String> {
    let mut args = strings(&["-y", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"]);
    args.push(path_arg(list));
    args.extend(strings(&["-c", "copy"]));
    args.push(path_arg(output));
    args
}

/// Re-encode the joined capture to one constant frame rate and codec.
pub fn normalize_args(input: &Path, output: &Path, fps: u32, crf: u32) -> Vec<String> {
    let mut args = strings(&["-y", "-loglevel", "error", "-i"]);
    args.push(path_arg(input));
    args.extend(strings(&["-c:v", "libx264", "-preset", "medium", "-crf"]));
    args.push(crf.to_string());
    args.extend(strings(&["-pix_fmt", "yuv420p", "-r"]));
    args.push(fps.to_string());
    args.extend(strings(&["-an", "-movflags", "+faststart"]));
    args.push(path_arg(output));
    args
}

/// Mux video and audio: video copied, audio re-encoded, cut to the shorter.
pub fn mux_args(
    video: &Path,
    audio: &Path,
    output: &Path,
    audio_codec: &str,
    audio_bitrate_kbps: u32,
) -> Vec<String> {
    let mut args = strings(&["-y", "-loglevel", "error", "-i"]);
    args.push(path_arg(video));
    args.push("-i".to_string());
    args.push(path_arg(audio));
    args.extend(strings(&["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy", "-c:a"]));
    args.push(audio_codec.to_string());
    args.push("-b:a".to_string());
    args.push(format!("{audio_bitrate_kbps}k"));
    args.extend(strings(&["-shortest", "-movflags", "+faststart"]));
    args.push(path_arg(output));
    args
}

/// Run ffmpeg to completion. `stage` names the step in errors.
pub fn run_ffmpeg(stage: &str, args: &[String]) -> ScenecastResult<()> {
    tracing::debug!(stage, ?args, "Running ffmpeg");
    let start = std::time::Instant::now();
    let mut child = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ScenecastError::merge(format!("{stage}: failed to start ffmpeg: {e}")))?;

    let mut stderr_output = String::new();
    if let Some(mut stderr) = child.stderr.take() {
        if let Err(e) = stderr.read_to_string(&mut stderr_output) {
            stderr_output = format!("<failed to read ffmpeg stderr: {e}>");
        }
    }

    let status = child
        .wait()
        .map_err(|e| ScenecastError::merge(format!("{stage}: failed to wait on ffmpeg: {e}")))?;
    if !status.success() {
        return Err(ScenecastError::merge(format!(
            "{stage} failed (status {status}): {}",
            stderr_output.trim()
        )));
    }

    tracing::info!(stage, elapsed_secs = start.elapsed().as_secs_f64(), "ffmpeg finished");
    Ok(())
}

/// Container duration in seconds as reported by ffprobe.
pub fn probe_duration(path: &Path) -> ScenecastResult<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .map_err(|e| ScenecastError::merge(format!("failed to start ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(ScenecastError::merge(format!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    parse_duration(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        ScenecastError::merge(format!("ffprobe reported no duration for {}", path.display()))
    })
}

fn parse_duration(raw: &str) -> Option<f64> {
    raw.lines()
        .next()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Whether `binary` is on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
