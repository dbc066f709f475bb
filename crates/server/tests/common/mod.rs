//! Common test utilities for API testing with mocks.
//!
//! The fixture builds the real router over scratch SQLite databases, with a
//! mock prober and a mock transcoder behind a one-worker pool, so requests
//! exercise the whole stack without ffmpeg installed.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use transcoder_core::{
    create_event_system, testing::{MockFileStore, MockProber, MockTranscoder}, CommandBuilder,
    Config, EventStore, FileStore, JobQueue, JobStore, MediaProber, MediaStore, ServiceDeps,
    SqliteEventStore, SqliteJobStore, SqliteMediaStore, Transcoder, TranscodingService,
    WorkerDeps, WorkerPool,
};
use transcoder_server::{api::create_router, state::AppState};

/// Owner used by the fixture's convenience helpers.
pub const OWNER: &str = "alice";

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_job_creation() {
///     let fixture = TestFixture::new().await;
///     let media_id = fixture.register_media("/videos/a.mov").await;
///
///     let response = fixture.post("/api/v1/jobs", json!({
///         "input_file_id": media_id,
///     })).await;
///
///     assert_eq!(response.status, 201);
/// }
/// ```
pub struct TestFixture {
    pub router: Router,
    /// Mock transcoder - script outcomes, hold executions
    pub transcoder: Arc<MockTranscoder>,
    pub pool: Arc<WorkerPool>,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.database.path = temp_dir.path().join("test.db");
        config.workers.max_concurrent_jobs = 1;

        let event_store: Arc<dyn EventStore> = Arc::new(
            SqliteEventStore::new(&temp_dir.path().join("events.db"))
                .expect("Failed to create event store"),
        );
        let jobs: Arc<dyn JobStore> = Arc::new(
            SqliteJobStore::new(&config.database.path).expect("Failed to create job store"),
        );
        let media: Arc<dyn MediaStore> = Arc::new(
            SqliteMediaStore::new(&temp_dir.path().join("media.db"))
                .expect("Failed to create media store"),
        );

        let (events, event_writer) = create_event_system(Arc::clone(&event_store), 100);
        tokio::spawn(event_writer.run());

        let queue = Arc::new(JobQueue::new());
        let service = Arc::new(TranscodingService::new(ServiceDeps {
            jobs: Arc::clone(&jobs),
            media,
            prober: Arc::new(MockProber::new()) as Arc<dyn MediaProber>,
            queue: Arc::clone(&queue),
            events: events.clone(),
            transcoder: config.transcoder.clone(),
            workers: 1,
        }));

        let transcoder = Arc::new(MockTranscoder::new());
        let pool = Arc::new(WorkerPool::start(
            config.workers.clone(),
            WorkerDeps {
                queue,
                jobs,
                files: Arc::new(MockFileStore::new()) as Arc<dyn FileStore>,
                transcoder: Arc::clone(&transcoder) as Arc<dyn Transcoder>,
                commands: CommandBuilder::new(&config.transcoder),
                events,
                progress_buffer: 16,
            },
        ));

        let state = Arc::new(AppState::new(
            config,
            service,
            Arc::clone(&pool),
            event_store,
        ));

        Self {
            router: create_router(state),
            transcoder,
            pool,
            temp_dir,
        }
    }

    /// Send a GET request as the fixture owner.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, Some(OWNER), None).await
    }

    /// Send a GET request without an owner header.
    pub async fn get_anonymous(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, None).await
    }

    pub async fn get_as(&self, owner: &str, path: &str) -> TestResponse {
        self.request("GET", path, Some(owner), None).await
    }

    /// Send a POST request with JSON body as the fixture owner.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(OWNER), Some(body)).await
    }

    pub async fn post_as(&self, owner: &str, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(owner), Some(body)).await
    }

    /// Send a DELETE request as the fixture owner.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, Some(OWNER), None).await
    }

    /// Register an input file and return its media id.
    pub async fn register_media(&self, path: &str) -> String {
        let response = self.post("/api/v1/media", json!({ "path": path })).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
        response.body["id"]
            .as_str()
            .expect("media id")
            .to_string()
    }

    /// Register media and submit a job for it, returning the job id.
    pub async fn submit_job(&self, extra: Value) -> String {
        let media_id = self.register_media("/videos/input.mov").await;
        let mut body = json!({ "input_file_id": media_id });
        if let (Some(target), Some(fields)) = (body.as_object_mut(), extra.as_object()) {
            target.extend(fields.clone());
        }

        let response = self.post("/api/v1/jobs", body).await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text);
        response.body["id"].as_str().expect("job id").to_string()
    }

    /// Poll a job until its status matches.
    pub async fn wait_for_status(&self, job_id: &str, status: &str) -> Value {
        let path = format!("/api/v1/jobs/{}", job_id);
        for _ in 0..300 {
            let response = self.get(&path).await;
            if response.body["status"] == status {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Timed out waiting for job {} to reach {}", job_id, status);
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        owner: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        if let Some(owner) = owner {
            request_builder = request_builder.header("X-Owner-Id", owner);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
