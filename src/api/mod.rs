//! HTTP API.
//!
//! Routes are nested under `/api/`. Handlers are thin: they parse the
//! request, run the blocking pipeline on a worker thread and map errors to
//! `{ "error": { "code", "message" } }` bodies.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::serve;
pub use types::ApiContext;
