//! Presentation surface seam.
//!
//! A surface is one isolated automation session showing the presentation.
//! The worker only ever asks it to jump to a scene and to stream frames;
//! the surface holds no knowledge of chunks or durations.

use std::path::PathBuf;
use std::time::Duration;

use scenecast_common::ScenecastResult;
use scenecast_project_model::SceneId;

use crate::frame::FrameWriter;

pub mod chromium;

pub use chromium::ChromiumLauncher;

/// Settings shared by every surface a launcher opens.
#[derive(Debug, Clone)]
pub struct SurfaceOptions {
    /// Page to load (`file://.../index.html`).
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Screencast JPEG quality.
    pub jpeg_quality: u32,
    pub browser_executable: Option<PathBuf>,
    pub load_timeout: Duration,
    pub close_timeout: Duration,
}

/// One live presentation session.
#[async_trait::async_trait]
pub trait PresentationSurface: Send {
    /// Apply a CSS zoom to the page body and let layout reflow.
    async fn apply_zoom(&mut self, zoom: f64) -> ScenecastResult<()>;

    /// Readiness barrier: resolve once fonts are loaded and the page has
    /// painted, or fail after `timeout`.
    async fn wait_ready(&mut self, timeout: Duration) -> ScenecastResult<()>;

    /// Request a jump to `scene`. Returns without waiting for the entry
    /// animation to settle.
    async fn jump_to_scene(&mut self, scene: SceneId) -> ScenecastResult<()>;

    /// Start pushing frames into `writer` until [`stop_frames`] is called.
    ///
    /// [`stop_frames`]: PresentationSurface::stop_frames
    async fn start_frames(&mut self, writer: FrameWriter) -> ScenecastResult<()>;

    async fn stop_frames(&mut self) -> ScenecastResult<()>;

    /// Release the session. Bounded: falls back to forceful termination.
    /// Safe to call more than once.
    async fn shutdown(&mut self) -> ScenecastResult<()>;
}

/// Opens isolated surfaces, one per capture worker.
#[async_trait::async_trait]
pub trait SurfaceLauncher: Send + Sync {
    /// Launch a session for `chunk` and navigate it to the presentation.
    async fn launch(&self, chunk: usize) -> ScenecastResult<Box<dyn PresentationSurface>>;
}
