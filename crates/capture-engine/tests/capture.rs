use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scenecast_capture_engine::{
    abort_signal, capture_chunk, CaptureOptions, CaptureOrchestrator, ChunkJob, FrameSink,
    FrameSinkFactory, FrameWriter, PresentationSurface, SurfaceLauncher, WorkerTiming,
};
use scenecast_common::{ScenecastError, ScenecastResult};
use scenecast_project_model::{
    Chunk, DurationManifest, ReconcileSettings, SceneDurationRecord, SceneId,
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Zoom,
    Ready,
    Jump(SceneId),
    StartFrames,
    StopFrames,
    Shutdown,
}

type EventLog = Arc<Mutex<Vec<(usize, Event)>>>;

#[derive(Default)]
struct FakeLauncher {
    log: EventLog,
    fail_ready: Option<usize>,
    silent: Option<usize>,
}

#[async_trait]
impl SurfaceLauncher for FakeLauncher {
    async fn launch(&self, chunk: usize) -> ScenecastResult<Box<dyn PresentationSurface>> {
        Ok(Box::new(FakeSurface {
            chunk,
            log: self.log.clone(),
            writer: None,
            fail_ready: self.fail_ready == Some(chunk),
            silent: self.silent == Some(chunk),
        }))
    }
}

/// Publishes a one-byte frame tagged with the current scene on every jump.
struct FakeSurface {
    chunk: usize,
    log: EventLog,
    writer: Option<FrameWriter>,
    fail_ready: bool,
    silent: bool,
}

impl FakeSurface {
    fn record(&self, event: Event) {
        self.log.lock().unwrap().push((self.chunk, event));
    }
}

#[async_trait]
impl PresentationSurface for FakeSurface {
    async fn apply_zoom(&mut self, _zoom: f64) -> ScenecastResult<()> {
        self.record(Event::Zoom);
        Ok(())
    }

    async fn wait_ready(&mut self, timeout: Duration) -> ScenecastResult<()> {
        if self.fail_ready {
            tokio::time::sleep(timeout).await;
            return Err(ScenecastError::capture(self.chunk, "readiness wait timed out"));
        }
        self.record(Event::Ready);
        Ok(())
    }

    async fn jump_to_scene(&mut self, scene: SceneId) -> ScenecastResult<()> {
        self.record(Event::Jump(scene));
        if let Some(writer) = &self.writer {
            writer.publish(vec![scene as u8]);
        }
        Ok(())
    }

    async fn start_frames(&mut self, writer: FrameWriter) -> ScenecastResult<()> {
        self.record(Event::StartFrames);
        if !self.silent {
            writer.publish(vec![u8::MAX]);
            self.writer = Some(writer);
        }
        Ok(())
    }

    async fn stop_frames(&mut self) -> ScenecastResult<()> {
        self.record(Event::StopFrames);
        self.writer = None;
        Ok(())
    }

    async fn shutdown(&mut self) -> ScenecastResult<()> {
        self.record(Event::Shutdown);
        Ok(())
    }
}

#[derive(Default)]
struct FakeSinks {
    frames: Arc<Mutex<HashMap<usize, Vec<u8>>>>,
    stall: Option<usize>,
    /// Chunk whose encoder loses its last frame.
    lossy: Option<usize>,
}

impl FrameSinkFactory for FakeSinks {
    fn create(&self, chunk: &Chunk, output: &Path) -> ScenecastResult<Box<dyn FrameSink>> {
        Ok(Box::new(FakeSink {
            chunk: chunk.index,
            output: output.to_path_buf(),
            frames: self.frames.clone(),
            stall: self.stall == Some(chunk.index),
            lossy: self.lossy == Some(chunk.index),
            written: 0,
        }))
    }
}

struct FakeSink {
    chunk: usize,
    output: PathBuf,
    frames: Arc<Mutex<HashMap<usize, Vec<u8>>>>,
    stall: bool,
    lossy: bool,
    written: u64,
}

#[async_trait]
impl FrameSink for FakeSink {
    async fn write_frame(&mut self, frame: &[u8]) -> ScenecastResult<()> {
        if self.stall {
            std::future::pending::<()>().await;
        }
        self.frames
            .lock()
            .unwrap()
            .entry(self.chunk)
            .or_default()
            .push(frame[0]);
        self.written += 1;
        Ok(())
    }

    async fn finish(&mut self) -> ScenecastResult<u64> {
        std::fs::write(&self.output, b"fake video")?;
        if self.lossy {
            return Ok(self.written.saturating_sub(1));
        }
        Ok(self.written)
    }
}

fn timing() -> WorkerTiming {
    WorkerTiming {
        fps: 30,
        zoom: 1.5,
        ready_timeout: Duration::from_secs(10),
        first_frame_timeout: Duration::from_secs(10),
        warmup: Duration::from_millis(2000),
        settle: Duration::from_millis(1500),
    }
}

fn options(workers: usize) -> CaptureOptions {
    CaptureOptions {
        workers,
        width: 1440,
        height: 810,
        timing: timing(),
        budget_factor: 2.0,
        budget_slack: Duration::from_secs(5),
    }
}

/// Scenes whose final duration is their hold time.
fn manifest(durations: &[f64]) -> DurationManifest {
    let settings = ReconcileSettings::default();
    let scenes = durations
        .iter()
        .enumerate()
        .map(|(id, &d)| SceneDurationRecord::new(id, format!("Scene {id}"), d, vec![], vec![], &settings))
        .collect();
    DurationManifest::new(settings, scenes)
}

fn events(log: &EventLog, chunk: usize) -> Vec<Event> {
    log.lock()
        .unwrap()
        .iter()
        .filter(|(c, _)| *c == chunk)
        .map(|(_, e)| e.clone())
        .collect()
}

fn jumps(log: &EventLog, chunk: usize) -> Vec<SceneId> {
    events(log, chunk)
        .into_iter()
        .filter_map(|e| match e {
            Event::Jump(s) => Some(s),
            _ => None,
        })
        .collect()
}

fn chunk_job(index: usize, start: usize, durations: Vec<f64>, output: PathBuf) -> ChunkJob {
    ChunkJob {
        chunk: Chunk {
            index,
            start,
            end: start + durations.len(),
        },
        scene_durations: durations,
        output,
        budget: Duration::from_secs(600),
    }
}

#[tokio::test(start_paused = true)]
async fn every_scene_gets_exactly_its_tick_count_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let chunks_dir = dir.path().join("chunks");
    std::fs::create_dir_all(&chunks_dir).unwrap();
    std::fs::write(chunks_dir.join("chunk_07.mkv"), b"stale").unwrap();

    let launcher = Arc::new(FakeLauncher::default());
    let log = launcher.log.clone();
    let sinks = Arc::new(FakeSinks::default());
    let frames = sinks.frames.clone();

    let orchestrator = CaptureOrchestrator::new(launcher, sinks, options(2));
    let capture = orchestrator
        .run(&manifest(&[2.8, 0.5, 2.5, 1.0, 0.1]), &chunks_dir)
        .await
        .unwrap();

    let frames = frames.lock().unwrap();
    let mut expected0 = vec![0u8; 84];
    expected0.extend(vec![1u8; 15]);
    expected0.extend(vec![2u8; 75]);
    assert_eq!(frames[&0], expected0);
    let mut expected1 = vec![3u8; 30];
    expected1.extend(vec![4u8; 3]);
    assert_eq!(frames[&1], expected1);

    assert_eq!(capture.chunks.len(), 2);
    assert_eq!((capture.chunks[0].start, capture.chunks[0].end), (0, 3));
    assert_eq!((capture.chunks[1].start, capture.chunks[1].end), (3, 5));
    assert_eq!(capture.chunks[0].frames_written, 174);
    assert_eq!(capture.total_frames(), 207);

    // chunk 0 has nothing to prime from; chunk 1 visits 3, steps back to 2
    assert_eq!(jumps(&log, 0), vec![0, 1, 2]);
    assert_eq!(jumps(&log, 1), vec![3, 2, 3, 4]);

    assert!(!chunks_dir.join("chunk_07.mkv").exists());
    assert!(chunks_dir.join("capture.json").exists());
    assert_eq!(capture.ordered_files(&chunks_dir).unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn worker_follows_readiness_then_priming_then_teardown() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::default();
    let sinks = FakeSinks::default();
    let job = chunk_job(1, 2, vec![1.0], dir.path().join("chunk_01.mkv"));
    let (_abort, signal) = abort_signal();

    let outcome = capture_chunk(&job, &launcher, &sinks, &timing(), signal)
        .await
        .unwrap();
    assert_eq!(outcome.scene_frames, vec![(2, 30)]);
    assert_eq!(outcome.frames_written, 30);

    let events: Vec<Event> = launcher.log.lock().unwrap().iter().map(|(_, e)| e.clone()).collect();
    assert_eq!(
        events,
        vec![
            Event::Zoom,
            Event::Ready,
            Event::StartFrames,
            Event::Jump(2),
            Event::Jump(1),
            Event::Jump(2),
            Event::StopFrames,
            Event::Shutdown,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn readiness_failure_fails_the_run_and_releases_the_surface() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher {
        fail_ready: Some(0),
        ..FakeLauncher::default()
    };
    let job = chunk_job(0, 0, vec![1.0], dir.path().join("chunk_00.mkv"));
    let (_abort, signal) = abort_signal();
    let err = capture_chunk(&job, &launcher, &FakeSinks::default(), &timing(), signal)
        .await
        .unwrap_err();
    assert!(matches!(err, ScenecastError::Capture { chunk: 0, .. }));
    let log = launcher.log.lock().unwrap();
    assert_eq!(log.last().unwrap().1, Event::Shutdown);
}

#[tokio::test(start_paused = true)]
async fn failed_chunk_is_fatal_and_no_manifest_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let chunks_dir = dir.path().join("chunks");
    let launcher = Arc::new(FakeLauncher {
        fail_ready: Some(1),
        ..FakeLauncher::default()
    });
    let orchestrator =
        CaptureOrchestrator::new(launcher, Arc::new(FakeSinks::default()), options(2));

    let err = orchestrator
        .run(&manifest(&[1.0, 1.0, 1.0, 1.0]), &chunks_dir)
        .await
        .unwrap_err();
    assert!(matches!(err, ScenecastError::Capture { chunk: 1, .. }));
    assert!(!chunks_dir.join("capture.json").exists());
}

#[tokio::test(start_paused = true)]
async fn missing_first_frame_fails_the_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let launcher = Arc::new(FakeLauncher {
        silent: Some(0),
        ..FakeLauncher::default()
    });
    let orchestrator =
        CaptureOrchestrator::new(launcher, Arc::new(FakeSinks::default()), options(1));

    let err = orchestrator
        .run(&manifest(&[1.0]), &dir.path().join("chunks"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no frame received"));
}

#[tokio::test(start_paused = true)]
async fn chunk_over_budget_is_failed_not_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let sinks = Arc::new(FakeSinks {
        stall: Some(0),
        ..FakeSinks::default()
    });
    let launcher = Arc::new(FakeLauncher::default());
    let log = launcher.log.clone();
    let orchestrator = CaptureOrchestrator::new(launcher, sinks, options(1));

    let err = orchestrator
        .run(&manifest(&[3.0]), &dir.path().join("chunks"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScenecastError::Capture { chunk: 0, .. }));
    assert!(err.to_string().contains("wall-clock budget"));
    assert_eq!(events(&log, 0).last(), Some(&Event::Shutdown));
}

#[tokio::test(start_paused = true)]
async fn failing_chunk_makes_running_workers_release_their_surfaces() {
    let dir = tempfile::tempdir().unwrap();
    let chunks_dir = dir.path().join("chunks");
    let launcher = Arc::new(FakeLauncher {
        fail_ready: Some(1),
        ..FakeLauncher::default()
    });
    let log = launcher.log.clone();
    let frames = Arc::new(FakeSinks::default());
    let written = frames.frames.clone();
    let orchestrator = CaptureOrchestrator::new(launcher, frames, options(2));

    // chunk 0 is still ticking through its 60s scene when chunk 1 gives up
    let err = orchestrator
        .run(&manifest(&[60.0, 1.0]), &chunks_dir)
        .await
        .unwrap_err();
    assert!(matches!(err, ScenecastError::Capture { chunk: 1, .. }));

    let chunk0 = events(&log, 0);
    assert_eq!(chunk0.last(), Some(&Event::Shutdown));
    assert!(!chunk0.contains(&Event::StopFrames));
    assert!(written.lock().unwrap()[&0].len() < 1800);
    assert_eq!(events(&log, 1).last(), Some(&Event::Shutdown));
}

#[tokio::test(start_paused = true)]
async fn encoder_losing_a_frame_fails_the_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let sinks = Arc::new(FakeSinks {
        lossy: Some(0),
        ..FakeSinks::default()
    });
    let orchestrator =
        CaptureOrchestrator::new(Arc::new(FakeLauncher::default()), sinks, options(1));

    let err = orchestrator
        .run(&manifest(&[1.0]), &dir.path().join("chunks"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScenecastError::Capture { chunk: 0, .. }));
    assert!(err.to_string().contains("committed 29 frames, expected 30"));
}

#[tokio::test]
async fn capture_rate_must_match_the_reconciled_rate() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = options(1);
    options.timing.fps = 60;
    let orchestrator = CaptureOrchestrator::new(
        Arc::new(FakeLauncher::default()),
        Arc::new(FakeSinks::default()),
        options,
    );
    let err = orchestrator
        .run(&manifest(&[1.0]), &dir.path().join("chunks"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScenecastError::Config { .. }));
    assert!(err.to_string().contains("60fps"));
}

#[tokio::test]
async fn zero_workers_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = CaptureOrchestrator::new(
        Arc::new(FakeLauncher::default()),
        Arc::new(FakeSinks::default()),
        options(0),
    );
    let err = orchestrator
        .run(&manifest(&[1.0]), &dir.path().join("chunks"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScenecastError::Config { .. }));
}
