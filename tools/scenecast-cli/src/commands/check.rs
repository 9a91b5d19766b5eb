//! Check external tools and services.

use std::time::Duration;

use scenecast_common::config::AppConfig;
use scenecast_narration::VoicevoxClient;
use scenecast_render_engine::command_exists;

use super::runtime;

const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
];

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Scenecast System Check");
    println!("{}", "=".repeat(50));

    let mut required_ok = true;
    for tool in ["ffmpeg", "ffprobe"] {
        if command_exists(tool) {
            println!("[OK] {tool}");
        } else {
            println!("[MISSING] {tool} (required for capture and merge)");
            required_ok = false;
        }
    }

    match &config.capture.browser_executable {
        Some(path) if path.is_file() => println!("[OK] Browser: {}", path.display()),
        Some(path) => {
            println!("[MISSING] Browser: {} (configured)", path.display());
            required_ok = false;
        }
        None => match BROWSER_CANDIDATES.iter().find(|b| command_exists(b)) {
            Some(browser) => println!("[OK] Browser: {browser}"),
            None => {
                println!("[MISSING] Browser: none of {}", BROWSER_CANDIDATES.join(", "));
                required_ok = false;
            }
        },
    }

    let client = VoicevoxClient::new(
        config.synthesis.voicevox_url.clone(),
        Duration::from_secs(5),
    )?;
    match runtime()?.block_on(client.version()) {
        Ok(version) => println!("[OK] VOICEVOX {version} at {}", client.base_url()),
        Err(e) => println!("[WARN] VOICEVOX at {} unreachable: {e}", client.base_url()),
    }

    println!();
    if required_ok {
        println!("All required tools are available. Scenecast is ready.");
    } else {
        println!("Some required tools are missing. See above.");
    }
    Ok(())
}
