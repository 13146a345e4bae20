pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod executor;
pub mod github;
pub mod pipeline;
pub mod report;
pub mod resolver;
pub mod workspace;

pub use error::{ResolutionError, Result, UpdaterError};
pub use pipeline::{EventOutcome, Pipeline};
