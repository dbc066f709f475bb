use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transcoder_core::{
    create_event_system, load_config, validate_config, CommandBuilder, EventStore, FfprobeProber,
    FileStore, JobEvent, JobQueue, JobStore, LocalFileStore, MediaProber, MediaStore,
    ProcessSupervisor, ServiceDeps, SqliteEventStore, SqliteJobStore, SqliteMediaStore,
    Transcoder, TranscodingService, WorkerDeps, WorkerPool,
};
use transcoder_server::api::create_router;
use transcoder_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("TRANSCODER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Database path: {:?}", config.database.path);
    info!("ffmpeg: {:?}", config.transcoder.ffmpeg_path);
    info!("Workers: {}", config.workers.max_concurrent_jobs);

    // Compute config hash for the ServiceStarted event
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    // Stores
    let event_store: Arc<dyn EventStore> = Arc::new(
        SqliteEventStore::new(&config.database.path).context("Failed to create event store")?,
    );
    let job_store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    let media_store: Arc<dyn MediaStore> = Arc::new(
        SqliteMediaStore::new(&config.database.path).context("Failed to create media store")?,
    );
    info!("Stores initialized");

    // Event system
    let (event_handle, event_writer) =
        create_event_system(Arc::clone(&event_store), config.events.buffer_size);
    let writer_handle = tokio::spawn(event_writer.run());

    event_handle
        .emit(JobEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;

    // Queue and service; recovery runs before any worker can take a job
    let queue = Arc::new(JobQueue::new());
    let prober: Arc<dyn MediaProber> =
        Arc::new(FfprobeProber::new(config.transcoder.ffprobe_path.clone()));
    let service = Arc::new(TranscodingService::new(ServiceDeps {
        jobs: Arc::clone(&job_store),
        media: Arc::clone(&media_store),
        prober,
        queue: Arc::clone(&queue),
        events: event_handle.clone(),
        transcoder: config.transcoder.clone(),
        workers: config.workers.max_concurrent_jobs,
    }));

    let report = service
        .recover_queued()
        .context("Failed to recover jobs from previous run")?;
    info!(
        "Recovered {} queued job(s), failed {} interrupted job(s)",
        report.requeued, report.interrupted
    );

    // Worker pool
    let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(
        Arc::clone(&media_store),
        config.transcoder.output_dir.clone(),
    ));
    let transcoder: Arc<dyn Transcoder> =
        Arc::new(ProcessSupervisor::from_config(&config.transcoder));
    let pool = Arc::new(WorkerPool::start(
        config.workers.clone(),
        WorkerDeps {
            queue,
            jobs: job_store,
            files,
            transcoder,
            commands: CommandBuilder::new(&config.transcoder),
            events: event_handle.clone(),
            progress_buffer: config.transcoder.progress_buffer,
        },
    ));

    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&service),
        Arc::clone(&pool),
        event_store,
    ));
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    pool.shutdown(Duration::from_secs(config.workers.shutdown_grace_secs))
        .await;

    event_handle
        .emit(JobEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // Every EventHandle clone must go before the writer sees its channel close.
    drop(pool);
    drop(service);
    drop(event_handle);

    let _ = writer_handle.await;
    info!("Event writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
