pub mod error;
pub mod events;
pub mod handlers;
pub mod jobs;
pub mod media;
pub mod middleware;
pub mod queue;
pub mod routes;

pub use routes::create_router;
