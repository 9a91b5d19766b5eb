//! Show project information.

use std::path::PathBuf;

use scenecast_common::config::AppConfig;

use super::open_project;

pub fn run(config: &AppConfig, project: PathBuf) -> anyhow::Result<()> {
    let layout = open_project(config, &project)?;
    let script = layout
        .load_script()
        .map_err(|e| anyhow::anyhow!("Failed to load script: {e}"))?;
    let durations = layout.load_durations().ok();

    println!("Project: {}", layout.name());
    println!("  Path: {}", layout.root.display());
    println!();

    println!("Script:");
    println!("  Scenes: {}", script.scenes.len());
    println!("  Lines: {}", script.scenes.line_count());
    println!(
        "  Speakers: {}",
        script
            .speakers
            .iter()
            .map(|(name, id)| format!("{name}={id}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let settings = script.settings();
    println!(
        "  Tunables: speed {} / silence {}s / padding {}s{}",
        settings.speed_scale,
        settings.inter_line_silence,
        settings.scene_end_padding,
        if settings.pad_silent_scenes {
            " (silent scenes padded)"
        } else {
            ""
        }
    );
    println!();

    println!("Scenes:");
    for scene in &script.scenes {
        let duration = durations
            .as_ref()
            .and_then(|d| d.get(scene.id))
            .map(|r| format!("{:.2}s", r.final_duration_secs))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>3}  {:<32} {:>2} line(s)  {duration}",
            scene.id,
            scene.title,
            scene.lines.len()
        );
    }
    if let Some(d) = &durations {
        println!(
            "  Total: {:.1}s ({:.1} min)",
            d.total_secs(),
            d.total_secs() / 60.0
        );
    }
    println!();

    println!("Artifacts:");
    let artifacts = [
        ("Durations", layout.durations_path()),
        ("Capture manifest", layout.capture_manifest_path()),
        ("Audio track", layout.full_audio_path()),
        ("Recording", layout.recording_path()),
        ("Final output", layout.final_output_path()),
    ];
    for (label, path) in artifacts {
        let state = if path.exists() { "present" } else { "missing" };
        println!("  {label}: {state}");
    }
    if let Ok(capture) = layout.load_capture() {
        println!(
            "  Chunks: {} at {}x{} @ {}fps, recorded {}",
            capture.chunks.len(),
            capture.width,
            capture.height,
            capture.fps,
            capture.recorded_at
        );
    }

    Ok(())
}
