//! Headless Chromium surface driven over the DevTools protocol.
//!
//! Each surface owns its own browser process, profile directory, handler
//! task and screencast listener. Frames arrive as base64 JPEG screencast
//! events; every event is acknowledged so the browser keeps streaming.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine as _;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventScreencastFrame, ScreencastFrameAckParams, StartScreencastFormat,
    StartScreencastParams, StopScreencastParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::Page;
use futures::StreamExt;
use scenecast_common::{ScenecastError, ScenecastResult};
use scenecast_project_model::SceneId;
use tokio::task::JoinHandle;

use super::{PresentationSurface, SurfaceLauncher, SurfaceOptions};
use crate::frame::FrameWriter;

/// Launches one headless Chromium per worker.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    options: SurfaceOptions,
}

impl ChromiumLauncher {
    pub fn new(options: SurfaceOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self, profile_dir: PathBuf) -> Result<BrowserConfig, String> {
        let opts = &self.options;
        let mut builder = BrowserConfig::builder()
            .window_size(opts.width, opts.height)
            .viewport(Viewport {
                width: opts.width,
                height: opts.height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: true,
                has_touch: false,
            })
            .user_data_dir(profile_dir)
            .request_timeout(opts.load_timeout)
            .no_sandbox()
            .arg("--hide-scrollbars")
            .arg("--disable-gpu")
            .arg("--mute-audio");
        if let Some(exe) = &opts.browser_executable {
            builder = builder.chrome_executable(exe);
        }
        builder.build()
    }
}

#[async_trait::async_trait]
impl SurfaceLauncher for ChromiumLauncher {
    async fn launch(&self, chunk: usize) -> ScenecastResult<Box<dyn PresentationSurface>> {
        let profile_dir = std::env::temp_dir().join(format!(
            "scenecast-chunk-{}-{chunk:02}",
            std::process::id()
        ));
        let config = self
            .browser_config(profile_dir.clone())
            .map_err(|e| ScenecastError::capture(chunk, format!("invalid browser config: {e}")))?;

        let (browser, mut handler) =
            tokio::time::timeout(self.options.load_timeout, Browser::launch(config))
                .await
                .map_err(|_| ScenecastError::capture(chunk, "browser launch timed out"))?
                .map_err(|e| ScenecastError::capture(chunk, format!("browser launch failed: {e}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let mut surface = ChromiumSurface {
            chunk,
            browser: Some(browser),
            handler_task: Some(handler_task),
            page: None,
            frame_task: None,
            profile_dir,
            close_timeout: self.options.close_timeout,
            frame_size: (self.options.width, self.options.height),
            jpeg_quality: self.options.jpeg_quality,
        };

        if let Err(e) = surface.open(&self.options).await {
            if let Err(cleanup) = surface.shutdown().await {
                tracing::warn!(chunk, error = %cleanup, "Cleanup after failed launch also failed");
            }
            return Err(e);
        }

        tracing::info!(chunk, url = %self.options.url, "Presentation loaded");
        Ok(Box::new(surface))
    }
}

/// One browser session showing the presentation.
pub struct ChromiumSurface {
    chunk: usize,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    page: Option<Page>,
    frame_task: Option<JoinHandle<()>>,
    profile_dir: PathBuf,
    close_timeout: Duration,
    frame_size: (u32, u32),
    jpeg_quality: u32,
}

impl ChromiumSurface {
    async fn open(&mut self, options: &SurfaceOptions) -> ScenecastResult<()> {
        let chunk = self.chunk;
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| ScenecastError::capture(chunk, "browser already closed"))?;

        let load = async {
            let page = browser.new_page(options.url.as_str()).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(page)
        };
        let page = tokio::time::timeout(options.load_timeout, load)
            .await
            .map_err(|_| {
                ScenecastError::capture(
                    chunk,
                    format!("page load timed out after {:?}", options.load_timeout),
                )
            })?
            .map_err(|e| ScenecastError::capture(chunk, format!("page load failed: {e}")))?;
        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> ScenecastResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ScenecastError::capture(self.chunk, "page is not open"))
    }

    async fn eval(&self, expression: String) -> ScenecastResult<()> {
        self.page()?
            .evaluate(expression.as_str())
            .await
            .map_err(|e| {
                ScenecastError::capture(self.chunk, format!("`{expression}` failed: {e}"))
            })?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PresentationSurface for ChromiumSurface {
    async fn apply_zoom(&mut self, zoom: f64) -> ScenecastResult<()> {
        self.eval(format!(
            "document.body.style.zoom = '{zoom}'; window.dispatchEvent(new Event('resize'));"
        ))
        .await
    }

    async fn wait_ready(&mut self, timeout: Duration) -> ScenecastResult<()> {
        let chunk = self.chunk;
        let params = EvaluateParams::builder()
            .expression(
                "document.fonts.ready.then(() => new Promise(r => requestAnimationFrame(() => r(true))))",
            )
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| ScenecastError::capture(chunk, e))?;
        let page = self.page()?;
        tokio::time::timeout(timeout, page.evaluate_expression(params))
            .await
            .map_err(|_| {
                ScenecastError::capture(chunk, format!("readiness wait timed out after {timeout:?}"))
            })?
            .map_err(|e| ScenecastError::capture(chunk, format!("readiness wait failed: {e}")))?;
        Ok(())
    }

    async fn jump_to_scene(&mut self, scene: SceneId) -> ScenecastResult<()> {
        self.eval(format!("window.goTo({scene})")).await
    }

    async fn start_frames(&mut self, writer: FrameWriter) -> ScenecastResult<()> {
        let chunk = self.chunk;
        let page = self.page()?.clone();
        let mut events = page
            .event_listener::<EventScreencastFrame>()
            .await
            .map_err(|e| ScenecastError::capture(chunk, format!("screencast listener: {e}")))?;

        let ack_page = page.clone();
        self.frame_task = Some(tokio::spawn(async move {
            let engine = base64::engine::general_purpose::STANDARD;
            while let Some(frame) = events.next().await {
                let encoded: &str = frame.data.as_ref();
                match engine.decode(encoded) {
                    Ok(jpeg) => writer.publish(jpeg),
                    Err(e) => tracing::debug!(chunk, error = %e, "Undecodable screencast frame"),
                }
                if let Err(e) = ack_page
                    .execute(ScreencastFrameAckParams::new(frame.session_id))
                    .await
                {
                    tracing::debug!(chunk, error = %e, "Screencast ack failed");
                }
            }
        }));

        let (width, height) = self.frame_size;
        let params = StartScreencastParams::builder()
            .format(StartScreencastFormat::Jpeg)
            .quality(i64::from(self.jpeg_quality))
            .max_width(i64::from(width))
            .max_height(i64::from(height))
            .every_nth_frame(1)
            .build();
        page.execute(params)
            .await
            .map_err(|e| ScenecastError::capture(chunk, format!("start screencast: {e}")))?;
        Ok(())
    }

    async fn stop_frames(&mut self) -> ScenecastResult<()> {
        let chunk = self.chunk;
        if let Some(task) = self.frame_task.take() {
            task.abort();
        }
        if let Some(page) = &self.page {
            page.execute(StopScreencastParams::default())
                .await
                .map_err(|e| ScenecastError::capture(chunk, format!("stop screencast: {e}")))?;
        }
        Ok(())
    }

    async fn shutdown(&mut self) -> ScenecastResult<()> {
        if let Some(task) = self.frame_task.take() {
            task.abort();
        }
        self.page = None;
        release(
            self.chunk,
            self.browser.take(),
            self.handler_task.take(),
            &self.profile_dir,
            self.close_timeout,
        )
        .await;
        Ok(())
    }
}

/// Close the browser (killing it when close fails or times out), stop its
/// handler and remove the profile directory.
async fn release(
    chunk: usize,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    profile_dir: &Path,
    close_timeout: Duration,
) {
    if let Some(mut browser) = browser {
        match tokio::time::timeout(close_timeout, browser.close()).await {
            Ok(Ok(_)) => {
                let _ = tokio::time::timeout(close_timeout, browser.wait()).await;
            }
            Ok(Err(e)) => {
                tracing::warn!(chunk, error = %e, "Browser close failed; killing");
                let _ = browser.kill().await;
            }
            Err(_) => {
                tracing::warn!(chunk, "Browser close timed out; killing");
                let _ = browser.kill().await;
            }
        }
    }

    if let Some(task) = handler_task {
        task.abort();
    }
    remove_profile(chunk, profile_dir);
    tracing::debug!(chunk, "Browser session released");
}

fn remove_profile(chunk: usize, profile_dir: &Path) {
    if profile_dir.exists() {
        if let Err(e) = std::fs::remove_dir_all(profile_dir) {
            tracing::debug!(chunk, error = %e, "Could not remove browser profile");
        }
    }
}

/// Backstop for a surface dropped without `shutdown`: the release runs on
/// the current runtime, or the profile is removed right away when the
/// browser is already gone.
impl Drop for ChromiumSurface {
    fn drop(&mut self) {
        if let Some(task) = self.frame_task.take() {
            task.abort();
        }
        let browser = self.browser.take();
        let handler_task = self.handler_task.take();
        if browser.is_none() {
            if let Some(task) = handler_task {
                task.abort();
            }
            remove_profile(self.chunk, &self.profile_dir);
            return;
        }

        tracing::warn!(chunk = self.chunk, "Surface dropped without shutdown; releasing");
        let chunk = self.chunk;
        let profile_dir = self.profile_dir.clone();
        let close_timeout = self.close_timeout;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    release(chunk, browser, handler_task, &profile_dir, close_timeout).await;
                });
            }
            Err(_) => {
                // No runtime left to drive a graceful close.
                drop(browser);
                if let Some(task) = handler_task {
                    task.abort();
                }
                remove_profile(chunk, &profile_dir);
            }
        }
    }
}
