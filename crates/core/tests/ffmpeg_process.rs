//! End-to-end runs through the real process supervisor.
//!
//! A shell script stands in for ffmpeg: it writes progress to stdout, errors
//! to stderr, and creates the output file given as its last argument.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use transcoder_core::{
    testing::MockProber, CommandBuilder, CreateJobRequest, EventHandle, FileStore, Job, JobQueue,
    JobStatus, JobStore, LocalFileStore, MediaProber, MediaStore, ProcessSupervisor,
    RegisterMediaRequest, ServiceDeps, SqliteJobStore, SqliteMediaStore, Transcoder,
    TranscoderConfig, TranscodingService, WorkerConfig, WorkerDeps, WorkerPool,
};

const FAKE_FFMPEG: &str = r#"#!/bin/sh
for arg in "$@"; do last="$arg"; done
case "$*" in
  *bogus_codec*)
    echo "ffmpeg version 6.1 Copyright (c) 2000-2023" >&2
    echo "[vost#0:0 @ 0x1] error: invalid codec bogus_codec" >&2
    exit 1
    ;;
esac
echo "  configuration: --enable-gpl" >&2
echo "out_time_us=30000000"
echo "speed=4.0x"
echo "out_time_us=60000000"
echo "progress=end"
: > "$last"
exit 0
"#;

struct Engine {
    service: TranscodingService,
    jobs: Arc<dyn JobStore>,
    pool: WorkerPool,
    output_dir: PathBuf,
    input: PathBuf,
    _temp_dir: TempDir,
}

fn write_executable(path: &Path, body: &str) {
    std::fs::write(path, body).expect("Failed to write script");
    let mut perms = std::fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).unwrap();
}

fn engine() -> Engine {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let ffmpeg = temp_dir.path().join("ffmpeg");
    write_executable(&ffmpeg, FAKE_FFMPEG);

    let input = temp_dir.path().join("input.mov");
    std::fs::write(&input, b"not really a movie").unwrap();
    let output_dir = temp_dir.path().join("out");

    let config = TranscoderConfig::with_paths(ffmpeg, PathBuf::from("ffprobe"))
        .with_output_dir(output_dir.clone());

    let jobs: Arc<dyn JobStore> =
        Arc::new(SqliteJobStore::new(&temp_dir.path().join("jobs.db")).unwrap());
    let media: Arc<dyn MediaStore> =
        Arc::new(SqliteMediaStore::new(&temp_dir.path().join("media.db")).unwrap());
    let queue = Arc::new(JobQueue::new());

    let service = TranscodingService::new(ServiceDeps {
        jobs: Arc::clone(&jobs),
        media: Arc::clone(&media),
        prober: Arc::new(MockProber::new()) as Arc<dyn MediaProber>,
        queue: Arc::clone(&queue),
        events: EventHandle::disconnected(),
        transcoder: config.clone(),
        workers: 2,
    });

    let pool = WorkerPool::start(
        WorkerConfig::default().with_workers(2),
        WorkerDeps {
            queue,
            jobs: Arc::clone(&jobs),
            files: Arc::new(LocalFileStore::new(media, output_dir.clone())) as Arc<dyn FileStore>,
            transcoder: Arc::new(ProcessSupervisor::from_config(&config)) as Arc<dyn Transcoder>,
            commands: CommandBuilder::new(&config),
            events: EventHandle::disconnected(),
            progress_buffer: config.progress_buffer,
        },
    );

    Engine {
        service,
        jobs,
        pool,
        output_dir,
        input,
        _temp_dir: temp_dir,
    }
}

impl Engine {
    async fn submit(&self, request: CreateJobRequest) -> Job {
        let media = self
            .service
            .register_media(
                "alice",
                RegisterMediaRequest {
                    path: self.input.to_string_lossy().to_string(),
                },
            )
            .await
            .unwrap();
        self.service
            .create_job(
                "alice",
                CreateJobRequest {
                    input_file_id: media.id,
                    ..request
                },
            )
            .unwrap()
    }

    async fn wait_terminal(&self, id: &str) -> Job {
        for _ in 0..500 {
            let job = self.jobs.get(id).unwrap().unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Timed out waiting for job {}", id);
    }
}

#[tokio::test]
async fn test_process_success_writes_output() {
    let engine = engine();
    let job = engine
        .submit(CreateJobRequest {
            output_filename: Some("result.mp4".to_string()),
            ..Default::default()
        })
        .await;

    let done = engine.wait_terminal(&job.id).await;
    assert_eq!(done.status, JobStatus::Completed, "{:?}", done.error_message);
    assert_eq!(done.progress_percentage, 100);

    let output = engine.output_dir.join("result.mp4");
    assert!(output.exists());
    assert_eq!(
        done.output_path.as_deref(),
        Some(output.to_string_lossy().as_ref())
    );

    engine.pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_process_failure_carries_tool_error() {
    let engine = engine();
    let job = engine
        .submit(CreateJobRequest {
            video_codec: Some("bogus_codec".to_string()),
            ..Default::default()
        })
        .await;

    let done = engine.wait_terminal(&job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    let message = done.error_message.unwrap();
    assert!(message.contains("exit code 1"), "{}", message);
    assert!(message.contains("error: invalid codec bogus_codec"), "{}", message);
    assert!(!message.contains("ffmpeg version"));

    engine.pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_missing_input_fails_job() {
    let engine = engine();
    let first = engine.submit(CreateJobRequest::default()).await;
    let done = engine.wait_terminal(&first.id).await;
    assert_eq!(done.status, JobStatus::Completed);

    // Same media record, file gone from disk.
    std::fs::remove_file(&engine.input).unwrap();
    let again = engine
        .service
        .create_job(
            "alice",
            CreateJobRequest {
                input_file_id: done.input_file_id.clone(),
                ..Default::default()
            },
        )
        .unwrap();

    let failed = engine.wait_terminal(&again.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error_message.unwrap().contains("input.mov"));

    engine.pool.shutdown(Duration::from_secs(1)).await;
}
