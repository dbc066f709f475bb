pub mod config;
pub mod events;
pub mod job;
pub mod media;
pub mod metrics;
pub mod queue;
pub mod service;
pub mod testing;
pub mod transcoder;
pub mod worker;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use events::{
    create_event_system, EventError, EventFilter, EventHandle, EventRecord, EventStore,
    EventWriter, JobEvent, SqliteEventStore,
};
pub use job::{
    Job, JobError, JobFilter, JobStatus, JobStore, OutputSettings, Priority, ProcessingMode,
    QualityPreset, SqliteJobStore, TransitionError,
};
pub use media::{
    FileStore, FileStoreError, LocalFileStore, MediaError, MediaFile, MediaStore,
    SqliteMediaStore,
};
pub use queue::{JobQueue, QueueError, QueuedEntry};
pub use service::{
    CreateJobRequest, JobPage, RecoveryReport, RegisterMediaRequest, ServiceDeps, ServiceError,
    SystemInfo, TranscodingService,
};
pub use transcoder::{
    CommandBuilder, FfprobeProber, MediaProber, Outcome, ProcessSupervisor, ToolchainInfo,
    TranscodeCommand, TranscodeError, Transcoder, TranscoderConfig,
};
pub use worker::{PoolStatus, WorkerConfig, WorkerDeps, WorkerError, WorkerPool};
