//! Operations surface: health, metrics and a local entry point for partitioned-log batches.

mod error;
mod extractor;
pub mod route;
mod state;

pub use state::{AppState, SharedState};
