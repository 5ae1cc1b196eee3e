pub mod api;
pub mod database;
pub mod error;
pub mod ingest;
pub mod media;
pub mod ml;
pub mod pipeline;
pub mod query;
pub mod utils;

pub use error::{PipelineError, PipelineResult};
