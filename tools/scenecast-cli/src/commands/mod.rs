pub mod capture;
pub mod check;
pub mod info;
pub mod merge;
pub mod reconcile;
pub mod validate;

use std::path::Path;

use scenecast_common::config::AppConfig;
use scenecast_project_model::ProjectLayout;

/// Resolve a project argument against the config and open it.
pub fn open_project(config: &AppConfig, project: &Path) -> anyhow::Result<ProjectLayout> {
    let root = config.resolve_project(project);
    ProjectLayout::open(&root).map_err(|e| anyhow::anyhow!("Failed to open project: {e}"))
}

/// Multi-threaded runtime for the async stages.
pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}
