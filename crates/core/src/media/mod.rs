//! Input media records and file resolution.

mod files;
mod sqlite_store;
mod store;
mod types;

pub use files::{FileStore, FileStoreError, LocalFileStore, ResolvedFiles};
pub use sqlite_store::SqliteMediaStore;
pub use store::{MediaError, MediaStore};
pub use types::MediaFile;
