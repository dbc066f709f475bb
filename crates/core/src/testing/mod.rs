//! Testing utilities and mock implementations.
//!
//! These stand in for the external tools and stores so the worker pool and
//! service can be driven deterministically.
//!
//! # Example
//!
//! ```rust,ignore
//! use transcoder_core::testing::{MockFileStore, MockTranscoder};
//!
//! let transcoder = MockTranscoder::new();
//! transcoder.push_failure(1, &["error: invalid codec"]).await;
//! ```

mod flaky_store;
mod mock_file_store;
mod mock_prober;
mod mock_transcoder;

pub use flaky_store::FlakyJobStore;
pub use mock_file_store::MockFileStore;
pub use mock_prober::MockProber;
pub use mock_transcoder::{MockTranscoder, RecordedExecution};
