//! FFmpeg invocation: command construction, process supervision, progress and
//! diagnostic parsing, input probing.

mod command;
mod config;
mod diagnostics;
mod error;
mod probe;
mod progress;
mod supervisor;
mod system_info;

pub use command::{hardware_codec, CommandBuilder, TranscodeCommand, NVENC_H264, NVENC_HEVC};
pub use config::TranscoderConfig;
pub use diagnostics::DiagnosticLevel;
pub use error::TranscodeError;
pub use probe::{FfprobeProber, MediaInfo, MediaProber};
pub use progress::{estimate_remaining, percentage, ProgressSample, ProgressTracker, ProgressUpdate};
pub use supervisor::{InputDescriptor, Outcome, ProcessSupervisor, Transcoder};
pub use system_info::{parse_version, ToolchainInfo};
