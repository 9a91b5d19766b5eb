//! Validate a project's manifests and cached audio.

use std::path::PathBuf;

use scenecast_common::config::AppConfig;

use super::open_project;

pub fn run(config: &AppConfig, project: PathBuf) -> anyhow::Result<()> {
    let layout = open_project(config, &project)?;
    println!("Validating project at: {}", layout.root.display());

    let script = layout
        .load_script()
        .map_err(|e| anyhow::anyhow!("Failed to load script: {e}"))?;
    println!("  Scenes: {}", script.scenes.len());
    println!("  Lines: {}", script.scenes.line_count());

    let mut issues = Vec::new();
    if !layout.page_path().is_file() {
        issues.push(format!(
            "presentation page missing: {}",
            layout.page_path().display()
        ));
    }

    let durations = match layout.load_durations() {
        Ok(durations) => {
            println!("  Duration manifest: {:.1}s total", durations.total_secs());
            if durations.scenes.len() != script.scenes.len() {
                issues.push(format!(
                    "duration manifest has {} scenes, script has {}",
                    durations.scenes.len(),
                    script.scenes.len()
                ));
            }
            if durations.settings != script.settings() {
                issues.push("script tunables changed since the last reconcile".to_string());
            }
            issues.extend(durations.verify());
            issues.extend(durations.validate_sources(&layout.audio_dir()));
            Some(durations)
        }
        Err(e) => {
            println!("  Duration manifest: not available ({e})");
            None
        }
    };

    if layout.capture_manifest_path().exists() {
        match layout.load_capture() {
            Ok(capture) => {
                println!("  Chunks: {}", capture.chunks.len());
                if let Err(e) = capture.ordered_files(&layout.chunks_dir()) {
                    issues.push(e.to_string());
                }
                if let Some(durations) = &durations {
                    issues.extend(capture.mismatches(durations));
                }
            }
            Err(e) => issues.push(format!("capture manifest unreadable: {e}")),
        }
    }

    if issues.is_empty() {
        println!("\nProject is valid.");
        Ok(())
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        anyhow::bail!("{} issue(s) found", issues.len())
    }
}
