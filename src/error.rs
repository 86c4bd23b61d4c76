//! Error type shared by graph construction, scheduling and execution.
use crate::buffer::Region;
use thiserror::Error;

/// Reasons a pipeline can refuse to build or run.
///
/// Every variant is raised before any stage is evaluated; once the executor
/// starts materializing buffers the run cannot fail.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum PipelineError {
    /// Invalid numeric parameters (kernel sigma, window sizes, ...).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Malformed stage graph (duplicate names, dangling producers, ...).
    #[error("invalid stage graph: {0}")]
    Graph(String),
    /// Schedule that references unknown stages or breaks scoping rules.
    #[error("invalid schedule for stage `{stage}`: {reason}")]
    Schedule { stage: String, reason: String },
    /// Supplied input buffers do not match the declared input stages.
    #[error("input `{stage}` mismatch: {reason}")]
    InputMismatch { stage: String, reason: String },
    /// A stage demands pixels that a pre-padded input cannot supply.
    #[error("stage `{stage}` requires {required:?} but only {available:?} is available")]
    OutOfBounds {
        stage: String,
        required: Region,
        available: Region,
    },
    /// Requested output region is empty.
    #[error("requested output region is empty ({width}x{height})")]
    EmptyOutput { width: i64, height: i64 },
}

impl PipelineError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        PipelineError::InvalidConfig(msg.into())
    }

    pub(crate) fn schedule(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::Schedule {
            stage: stage.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
