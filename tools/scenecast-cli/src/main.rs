//! Scenecast CLI: narrated presentation recording.
//!
//! Usage:
//!   scenecast reconcile <PROJECT>                              Synthesize narration, write durations
//!   scenecast capture <PROJECT> [WORKERS] [WxH] [ZOOM]         Capture the presentation in parallel
//!   scenecast merge <PROJECT>                                  Fit audio, join chunks, mux
//!   scenecast info <PROJECT>                                   Show scenes and artifacts
//!   scenecast validate <PROJECT>                               Check manifests and cached audio
//!   scenecast check                                            Check external tools and services

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use scenecast_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "scenecast",
    about = "Record narrated HTML presentations with audio-driven scene timing",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize every line and write scene_durations.json
    Reconcile {
        /// Project directory or name under the projects directory
        project: PathBuf,
    },

    /// Capture every scene into per-chunk videos
    Capture {
        /// Project directory or name under the projects directory
        project: PathBuf,

        /// Number of parallel workers
        workers: Option<usize>,

        /// Viewport size as WIDTHxHEIGHT
        resolution: Option<String>,

        /// CSS zoom applied to the presentation
        zoom: Option<f64>,
    },

    /// Assemble audio, join chunks and mux the final video
    Merge {
        /// Project directory or name under the projects directory
        project: PathBuf,
    },

    /// Show project information
    Info {
        /// Project directory or name under the projects directory
        project: PathBuf,
    },

    /// Validate manifests and cached audio of a project
    Validate {
        /// Project directory or name under the projects directory
        project: PathBuf,
    },

    /// Check external tools and services
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    scenecast_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Reconcile { project } => commands::reconcile::run(&config, project),
        Commands::Capture {
            project,
            workers,
            resolution,
            zoom,
        } => commands::capture::run(&config, project, workers, resolution, zoom),
        Commands::Merge { project } => commands::merge::run(&config, project),
        Commands::Info { project } => commands::info::run(&config, project),
        Commands::Validate { project } => commands::validate::run(&config, project),
        Commands::Check => commands::check::run(&config),
    }
}
