//! Job lifecycle event bus: emit through an [`EventHandle`], persist through
//! an [`EventWriter`] task.

mod events;
mod handle;
mod sqlite;
mod store;
mod writer;

pub use events::*;
pub use handle::*;
pub use sqlite::*;
pub use store::*;
pub use writer::*;
