//! Capture the presentation into per-chunk videos.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scenecast_capture_engine::{
    capture_project, CaptureOptions, CaptureOrchestrator, ChromiumLauncher, EncoderConfig,
    FfmpegSinkFactory, SurfaceOptions, WorkerTiming,
};
use scenecast_common::config::AppConfig;
use scenecast_render_engine::command_exists;

use super::{open_project, runtime};

pub fn run(
    config: &AppConfig,
    project: PathBuf,
    workers: Option<usize>,
    resolution: Option<String>,
    zoom: Option<f64>,
) -> anyhow::Result<()> {
    let layout = open_project(config, &project)?;
    let defaults = &config.capture;

    let workers = workers.unwrap_or(defaults.workers);
    if workers == 0 {
        anyhow::bail!("Worker count must be at least 1");
    }
    let (width, height) = match resolution {
        Some(r) => parse_resolution(&r)?,
        None => (defaults.width, defaults.height),
    };
    let zoom = zoom.unwrap_or(defaults.zoom);
    if !command_exists("ffmpeg") {
        anyhow::bail!("ffmpeg not found on PATH");
    }

    let url = layout
        .page_url()
        .map_err(|e| anyhow::anyhow!("Presentation page unavailable: {e}"))?;
    let fps = layout
        .load_durations()
        .map_err(|e| anyhow::anyhow!("Duration manifest unavailable, run reconcile first: {e}"))?
        .settings
        .fps;

    println!("Capturing project: {}", layout.name());
    println!("  Page: {url}");
    println!("  Workers: {workers}");
    println!("  Viewport: {width}x{height} @ {fps}fps, zoom {zoom}");

    let launcher = ChromiumLauncher::new(SurfaceOptions {
        url,
        width,
        height,
        jpeg_quality: defaults.jpeg_quality,
        browser_executable: defaults.browser_executable.clone(),
        load_timeout: Duration::from_secs(defaults.load_timeout_secs),
        close_timeout: Duration::from_secs(defaults.browser_close_timeout_secs),
    });
    let sinks = FfmpegSinkFactory::new(EncoderConfig {
        fps,
        crf: defaults.crf,
        finish_timeout: Duration::from_secs(defaults.encoder_finish_timeout_secs),
    });
    let options = CaptureOptions {
        workers,
        width,
        height,
        timing: WorkerTiming {
            fps,
            zoom,
            ready_timeout: Duration::from_secs(defaults.ready_timeout_secs),
            first_frame_timeout: Duration::from_secs(defaults.first_frame_timeout_secs),
            warmup: Duration::from_millis(defaults.warmup_ms),
            settle: Duration::from_millis(defaults.settle_ms),
        },
        budget_factor: defaults.budget_factor,
        budget_slack: Duration::from_secs(defaults.budget_slack_secs),
    };

    let orchestrator = CaptureOrchestrator::new(Arc::new(launcher), Arc::new(sinks), options);
    let manifest = runtime()?.block_on(capture_project(&layout, &orchestrator))?;

    println!();
    for chunk in &manifest.chunks {
        println!(
            "  Chunk {}: scenes [{}, {}) -> {} ({} frames)",
            chunk.index, chunk.start, chunk.end, chunk.file, chunk.frames_written
        );
    }
    let frames = manifest.total_frames();
    println!(
        "Captured {frames} frames ({:.1}s) into {}",
        frames as f64 / manifest.fps as f64,
        layout.chunks_dir().display()
    );
    Ok(())
}

/// Parse `WIDTHxHEIGHT`.
fn parse_resolution(raw: &str) -> anyhow::Result<(u32, u32)> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow::anyhow!("Invalid resolution '{raw}', expected WIDTHxHEIGHT"))?;
    let width: u32 = w
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid width in '{raw}'"))?;
    let height: u32 = h
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid height in '{raw}'"))?;
    if width == 0 || height == 0 {
        anyhow::bail!("Resolution must be non-zero: '{raw}'");
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution() {
        assert_eq!(parse_resolution("1440x810").unwrap(), (1440, 810));
        assert_eq!(parse_resolution("1920X1080").unwrap(), (1920, 1080));
        assert!(parse_resolution("1440").is_err());
        assert!(parse_resolution("0x810").is_err());
        assert!(parse_resolution("widex810").is_err());
    }
}
