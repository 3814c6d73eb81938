//! Declarative assembly pipelines.
//!
//! A [`Configuration`] document describes everything about an assembly:
//! which sources to read, which prefixes to keep, which predicate
//! mutations to apply, the priority order for canonical selection, and
//! where to materialize the raw / processed / priority artifacts. The
//! [`driver`] executes it in stages, each a pure function of the
//! previous stage's collection plus the configuration, materializing
//! intermediates so later stages can re-run without repeating upstream
//! work.

pub mod config;
pub mod driver;

use thiserror::Error;

pub use config::{load_configuration, Configuration, MutationConfig, OutputPaths};
pub use driver::{run, PipelineResult};

use mapforge_io::{IoError, SourceError};

/// Errors from configuration validation or pipeline execution.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration is unusable; raised before any stage runs.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Core(#[from] mapforge_core::Error),

    #[error("configuration file: {0}")]
    ConfigFile(#[from] serde_json::Error),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
