//! Synthesize narration and write the duration manifest.

use std::path::PathBuf;
use std::time::Duration;

use scenecast_common::config::AppConfig;
use scenecast_narration::{reconcile_project, VoicevoxClient};

use super::{open_project, runtime};

pub fn run(config: &AppConfig, project: PathBuf) -> anyhow::Result<()> {
    let layout = open_project(config, &project)?;
    println!("Reconciling project: {}", layout.name());

    // The script may override the engine URL; load errors surface below.
    let url = layout
        .load_script()
        .ok()
        .and_then(|script| script.voicevox_url)
        .unwrap_or_else(|| config.synthesis.voicevox_url.clone());
    let client = VoicevoxClient::new(
        url,
        Duration::from_secs(config.synthesis.request_timeout_secs),
    )?;
    println!("  Speech engine: {}", client.base_url());

    let summary = runtime()?.block_on(reconcile_project(&layout, Box::new(client)))?;

    println!();
    println!("Scenes: {}", summary.scenes);
    println!(
        "Lines: {} ({} synthesized, {} cached, {} skipped)",
        summary.lines,
        summary.synthesized,
        summary.cached,
        summary.skipped.len()
    );
    for skipped in &summary.skipped {
        println!(
            "  - scene {} line {}: {}",
            skipped.scene, skipped.line, skipped.reason
        );
    }
    println!(
        "Total: {:.1}s ({:.1} min)",
        summary.total_secs,
        summary.total_secs / 60.0
    );
    println!("Wrote: {}", layout.durations_path().display());
    Ok(())
}
