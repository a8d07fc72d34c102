pub mod cli;
pub mod config;
pub mod error;
pub mod exposures;
pub mod files;
pub mod keys;
pub mod logging;
pub mod model;
pub mod runner;
pub mod transforms;

pub use error::{PipelineError, PipelineErrorKind};
