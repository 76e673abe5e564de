//! API endpoint handlers.
//!
//! Handlers parse the request, then hand the blocking pipeline work to
//! `run_blocking`.

pub mod detect;
pub mod health;
pub mod process;
pub mod summarize;
pub mod transactions;
pub mod upload;
pub mod validate;
