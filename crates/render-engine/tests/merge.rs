use scenecast_common::ScenecastError;
use scenecast_project_model::{
    CaptureManifest, ChunkRecord, DurationManifest, ProjectLayout, ReconcileSettings,
    SceneDurationRecord,
};
use scenecast_render_engine::{merge_project, MergeOptions};

fn durations(holds: &[f64]) -> DurationManifest {
    let settings = ReconcileSettings::default();
    DurationManifest::new(
        settings,
        holds
            .iter()
            .enumerate()
            .map(|(id, &h)| SceneDurationRecord::new(id, format!("Scene {id}"), h, vec![], vec![], &settings))
            .collect(),
    )
}

fn chunk(index: usize, start: usize, end: usize, frames: u64) -> ChunkRecord {
    ChunkRecord {
        index,
        start,
        end,
        file: ProjectLayout::chunk_file_name(index),
        expected_frames: frames,
        frames_written: frames,
    }
}

#[test]
fn durations_changed_after_capture_stop_the_merge() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::open(dir.path()).unwrap();
    std::fs::create_dir_all(layout.chunks_dir()).unwrap();

    // captured against 2.8s / 0.5s / 1.0s
    let capture = CaptureManifest {
        fps: 30,
        width: 1440,
        height: 810,
        zoom: 1.5,
        recorded_at: "2026-01-01T00:00:00+00:00".to_string(),
        scene_count: 3,
        chunks: vec![chunk(0, 0, 2, 84 + 15), chunk(1, 2, 3, 30)],
    };
    capture.save(layout.capture_manifest_path()).unwrap();
    for record in &capture.chunks {
        std::fs::write(layout.chunks_dir().join(&record.file), b"video").unwrap();
    }

    // scene 0 re-reconciled to 3.1s afterwards
    durations(&[3.1, 0.5, 1.0]).save(layout.durations_path()).unwrap();

    let err = merge_project(&layout, &MergeOptions::default()).unwrap_err();
    assert!(matches!(err, ScenecastError::Merge { .. }));
    let message = err.to_string();
    assert!(message.contains("chunk 0"));
    assert!(!message.contains("chunk 1"));
    assert!(!layout.full_audio_path().exists());
}

#[test]
fn missing_capture_manifest_is_file_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let layout = ProjectLayout::open(dir.path()).unwrap();
    durations(&[1.0]).save(layout.durations_path()).unwrap();

    let err = merge_project(&layout, &MergeOptions::default()).unwrap_err();
    assert!(matches!(err, ScenecastError::FileNotFound { .. }));
}
