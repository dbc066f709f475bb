mod transcoding;
mod types;

pub use transcoding::{ServiceDeps, TranscodingService, INTERRUPTED_MESSAGE};
pub use types::{
    CreateJobRequest, JobPage, RecoveryReport, RegisterMediaRequest, ServiceError, SystemInfo,
};
