//! Fit audio, join chunks and mux the final video.

use std::path::PathBuf;

use scenecast_common::config::AppConfig;
use scenecast_render_engine::{merge_project, AudioOptions, FitAction, MergeOptions};

use super::open_project;

pub fn run(config: &AppConfig, project: PathBuf) -> anyhow::Result<()> {
    let layout = open_project(config, &project)?;
    println!("Merging project: {}", layout.name());

    let defaults = &config.merge;
    let options = MergeOptions {
        audio: AudioOptions {
            tolerance_secs: defaults.tolerance_secs,
            default_sample_rate: defaults.default_sample_rate,
        },
        crf: defaults.crf,
        audio_codec: defaults.audio_codec.clone(),
        audio_bitrate_kbps: defaults.audio_bitrate_kbps,
    };

    let report = merge_project(&layout, &options)?;
    let audio = &report.audio;

    println!();
    println!(
        "Audio: {:.2}s over {} scenes ({} padded, {} trimmed, {} exact)",
        audio.total_secs(),
        audio.scenes.len(),
        audio.count(FitAction::Padded),
        audio.count(FitAction::Trimmed) + audio.count(FitAction::Overflow),
        audio.count(FitAction::Exact)
    );
    let overflows: Vec<_> = audio
        .scenes
        .iter()
        .filter(|s| s.action == FitAction::Overflow)
        .collect();
    for fit in &overflows {
        println!(
            "  [WARN] scene {} audio ran {:.2}s past its duration",
            fit.scene,
            fit.overflow_secs()
        );
    }
    println!(
        "Video: {:.2}s (expected {:.2}s, drift {:+.1}ms)",
        report.video_secs,
        report.expected_video_secs,
        report.video_drift().drift_ms()
    );
    println!(
        "Output: {} ({:.2}s, {:.1} min)",
        layout.final_output_path().display(),
        report.output_secs,
        report.output_secs / 60.0
    );
    Ok(())
}
