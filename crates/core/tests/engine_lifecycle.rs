//! Engine lifecycle integration tests.
//!
//! These tests drive jobs through the service and worker pool with a mock
//! transcoder: queued -> processing -> completed / failed / cancelled

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use transcoder_core::{
    testing::{FlakyJobStore, MockFileStore, MockProber, MockTranscoder},
    CommandBuilder, CreateJobRequest, EventHandle, FileStore, Job, JobQueue, JobStatus, JobStore,
    MediaProber, Priority, RegisterMediaRequest, ServiceDeps, ServiceError, SqliteJobStore,
    SqliteMediaStore, Transcoder, TranscoderConfig, TranscodingService, WorkerConfig, WorkerDeps,
    WorkerPool,
};

/// Test helper wiring the service and pool over a scratch database.
struct TestHarness {
    jobs: Arc<dyn JobStore>,
    queue: Arc<JobQueue>,
    transcoder: Arc<MockTranscoder>,
    service: TranscodingService,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let jobs: Arc<dyn JobStore> =
            Arc::new(SqliteJobStore::new(&db_path).expect("Failed to create job store"));
        Self::with_store(jobs, temp_dir)
    }

    fn with_store(jobs: Arc<dyn JobStore>, temp_dir: TempDir) -> Self {
        let media_path = temp_dir.path().join("media.db");
        let media =
            Arc::new(SqliteMediaStore::new(&media_path).expect("Failed to create media store"));
        let queue = Arc::new(JobQueue::new());

        let service = TranscodingService::new(ServiceDeps {
            jobs: Arc::clone(&jobs),
            media,
            prober: Arc::new(MockProber::new()) as Arc<dyn MediaProber>,
            queue: Arc::clone(&queue),
            events: EventHandle::disconnected(),
            transcoder: TranscoderConfig::default(),
            workers: 1,
        });

        Self {
            jobs,
            queue,
            transcoder: Arc::new(MockTranscoder::new()),
            service,
            _temp_dir: temp_dir,
        }
    }

    fn start_pool(&self, workers: usize) -> WorkerPool {
        let deps = WorkerDeps {
            queue: Arc::clone(&self.queue),
            jobs: Arc::clone(&self.jobs),
            files: Arc::new(MockFileStore::new()) as Arc<dyn FileStore>,
            transcoder: Arc::clone(&self.transcoder) as Arc<dyn Transcoder>,
            commands: CommandBuilder::new(&TranscoderConfig::default()),
            events: EventHandle::disconnected(),
            progress_buffer: 16,
        };
        WorkerPool::start(WorkerConfig::default().with_workers(workers), deps)
    }

    async fn media_id(&self) -> String {
        self.service
            .register_media(
                "alice",
                RegisterMediaRequest {
                    path: "/videos/input.mov".to_string(),
                },
            )
            .await
            .expect("Failed to register media")
            .id
    }

    async fn submit(&self, priority: Priority) -> Job {
        let input_file_id = self.media_id().await;
        self.service
            .create_job(
                "alice",
                CreateJobRequest {
                    input_file_id,
                    priority: Some(priority),
                    ..Default::default()
                },
            )
            .expect("Failed to create job")
    }

    async fn wait_for_status(&self, id: &str, check: impl Fn(JobStatus) -> bool) -> Job {
        for _ in 0..300 {
            let job = self.jobs.get(id).unwrap().unwrap();
            if check(job.status) {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Timed out waiting for job {}", id);
    }

    async fn wait_terminal(&self, id: &str) -> Job {
        self.wait_for_status(id, |s| s.is_terminal()).await
    }
}

#[tokio::test]
async fn test_dequeue_follows_priority_order() {
    let harness = TestHarness::new();

    // Submitted before any worker exists so all four compete at once.
    let low = harness.submit(Priority::Low).await;
    let urgent = harness.submit(Priority::Urgent).await;
    let normal = harness.submit(Priority::Normal).await;
    let high = harness.submit(Priority::High).await;

    let pool = harness.start_pool(1);
    for job in [&low, &urgent, &normal, &high] {
        harness.wait_terminal(&job.id).await;
    }

    let order: Vec<String> = harness
        .transcoder
        .recorded_executions()
        .await
        .into_iter()
        .map(|e| e.input.job_id)
        .collect();
    assert_eq!(order, vec![urgent.id, high.id, normal.id, low.id]);

    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_successful_job_reaches_completed_at_100() {
    let harness = TestHarness::new();
    harness.transcoder.set_progress_steps(vec![10, 40, 40, 90]).await;
    let pool = harness.start_pool(2);

    let job = harness.submit(Priority::Normal).await;
    let done = harness.wait_terminal(&job.id).await;

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress_percentage, 100);
    assert!(done.error_message.is_none());
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());
    assert!(done.actual_duration_secs.is_some());

    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_tool_failure_records_diagnostics() {
    let harness = TestHarness::new();
    harness
        .transcoder
        .push_failure(1, &["[libx264 @ 0x1] error: invalid codec"])
        .await;
    let pool = harness.start_pool(1);

    let job = harness.submit(Priority::Normal).await;
    let done = harness.wait_terminal(&job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert_ne!(done.progress_percentage, 100);
    let message = done.error_message.expect("failed job must carry a message");
    assert!(message.contains("error: invalid codec"), "{}", message);
    assert!(done.completed_at.is_some());

    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_cancel_while_processing_is_conflict() {
    let harness = TestHarness::new();
    harness.transcoder.hold();
    let pool = harness.start_pool(1);

    let job = harness.submit(Priority::High).await;
    harness
        .wait_for_status(&job.id, |s| s == JobStatus::Processing)
        .await;

    let err = harness.service.cancel_job(&job.id, Some("alice")).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Conflict {
            status: JobStatus::Processing,
            ..
        }
    ));
    assert_eq!(
        harness.jobs.get(&job.id).unwrap().unwrap().status,
        JobStatus::Processing
    );

    harness.transcoder.release();
    let done = harness.wait_terminal(&job.id).await;
    assert_eq!(done.status, JobStatus::Completed);

    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_cancelled_job_is_never_run() {
    let harness = TestHarness::new();
    harness.transcoder.hold();
    let pool = harness.start_pool(1);

    let blocker = harness.submit(Priority::Urgent).await;
    harness
        .wait_for_status(&blocker.id, |s| s == JobStatus::Processing)
        .await;

    let waiting = harness.submit(Priority::Low).await;
    let cancelled = harness.service.cancel_job(&waiting.id, None).unwrap();
    assert_eq!(cancelled.status, JobStatus::Cancelled);

    harness.transcoder.release();
    harness.wait_terminal(&blocker.id).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(harness.transcoder.execution_count().await, 1);
    assert_eq!(
        harness.jobs.get(&waiting.id).unwrap().unwrap().status,
        JobStatus::Cancelled
    );

    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_persistence_failure_keeps_workers_alive() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let inner: Arc<dyn JobStore> =
        Arc::new(SqliteJobStore::new(&temp_dir.path().join("test.db")).unwrap());
    let flaky = Arc::new(FlakyJobStore::new(inner));
    let harness = TestHarness::with_store(Arc::clone(&flaky) as Arc<dyn JobStore>, temp_dir);

    // The first PROCESSING write fails, mid-job.
    flaky.fail_saves_with_status(JobStatus::Processing, 1);
    let pool = harness.start_pool(3);

    let first = harness.submit(Priority::Normal).await;
    let failed = harness.wait_terminal(&first.id).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error_message.is_some());

    let second = harness.submit(Priority::Normal).await;
    let completed = harness.wait_terminal(&second.id).await;
    assert_eq!(completed.status, JobStatus::Completed);

    let status = pool.status();
    assert_eq!(status.workers, 3);
    assert_eq!(status.live_workers, 3);

    pool.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_restart_recovery() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");

    let (queued_id, interrupted_id) = {
        let store = SqliteJobStore::new(&db_path).unwrap();
        let queued = Job::new("alice", "m1", None, Default::default(), Priority::Normal);
        let mut running = Job::new("alice", "m2", None, Default::default(), Priority::Normal);
        running.start().unwrap();
        store.save(&queued).unwrap();
        store.save(&running).unwrap();
        (queued.id, running.id)
    };

    let jobs: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(&db_path).unwrap());
    let harness = TestHarness::with_store(jobs, temp_dir);
    let report = harness.service.recover_queued().unwrap();
    assert_eq!(report.requeued, 1);
    assert_eq!(report.interrupted, 1);

    let pool = harness.start_pool(1);
    let done = harness.wait_terminal(&queued_id).await;
    assert_eq!(done.status, JobStatus::Completed);

    let interrupted = harness.jobs.get(&interrupted_id).unwrap().unwrap();
    assert_eq!(interrupted.status, JobStatus::Failed);
    assert_eq!(harness.transcoder.execution_count().await, 1);

    pool.shutdown(Duration::from_secs(1)).await;
}
