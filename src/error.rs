//! Launcher error taxonomy
//!
//! Every fatal condition the launcher can hit before or during submission
//! is a [`LaunchError`]. Coordinator channel failures are not part of this
//! enum: the monitor absorbs them (see [`crate::coordinator::ChannelError`]).

use std::io;

use crate::config::ConfigError;
use crate::fs::FsError;
use crate::host::RmError;
use crate::submit::StateError;

/// Stable classification of a launcher error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A resource ask or job setting is malformed or below its lower bound.
    InvalidArgument,
    /// A resource ask is above what the cluster allows.
    ResourceLimitExceeded,
    /// An input, cache entry or remote jar does not exist.
    PathNotFound,
    /// An output destination already exists.
    DuplicateOutputPath,
    /// A cache specifier carries more than one `#`.
    CacheSpecMalformed,
    /// The resource manager did not register the application.
    SubmissionFailure,
    /// The coordinator could not be reached. Never fatal.
    RpcUnavailable,
    Config,
    Cluster,
    Staging,
    Io,
    Serialization,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::ResourceLimitExceeded => "resource_limit_exceeded",
            ErrorKind::PathNotFound => "path_not_found",
            ErrorKind::DuplicateOutputPath => "duplicate_output_path",
            ErrorKind::CacheSpecMalformed => "cache_spec_malformed",
            ErrorKind::SubmissionFailure => "submission_failure",
            ErrorKind::RpcUnavailable => "rpc_unavailable",
            ErrorKind::Config => "config",
            ErrorKind::Cluster => "cluster",
            ErrorKind::Staging => "staging",
            ErrorKind::Io => "io",
            ErrorKind::Serialization => "serialization",
        };
        write!(f, "{}", s)
    }
}

/// Fatal launcher errors
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    #[error("{what} path {path} does not exist")]
    PathNotFound { what: &'static str, path: String },

    #[error("Output path {0} already exists")]
    DuplicateOutputPath(String),

    #[error("Malformed cache specifier: {0}")]
    CacheSpecMalformed(String),

    #[error("Submission failed: {0}")]
    SubmissionFailure(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] RmError),

    #[error("Submission out of order: {0}")]
    Lifecycle(#[from] StateError),

    #[error("Staging error: {0}")]
    Staging(#[from] FsError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LaunchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LaunchError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            LaunchError::ResourceLimitExceeded(_) => ErrorKind::ResourceLimitExceeded,
            LaunchError::PathNotFound { .. } => ErrorKind::PathNotFound,
            LaunchError::DuplicateOutputPath(_) => ErrorKind::DuplicateOutputPath,
            LaunchError::CacheSpecMalformed(_) => ErrorKind::CacheSpecMalformed,
            LaunchError::SubmissionFailure(_) => ErrorKind::SubmissionFailure,
            LaunchError::Config(_) => ErrorKind::Config,
            LaunchError::Cluster(_) => ErrorKind::Cluster,
            LaunchError::Lifecycle(_) => ErrorKind::SubmissionFailure,
            LaunchError::Staging(_) => ErrorKind::Staging,
            LaunchError::Io(_) => ErrorKind::Io,
            LaunchError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Process exit code for this error.
    ///
    /// Every setup or submission error exits with 1; 2 is reserved for a job
    /// that ran and finished unsuccessfully.
    pub fn exit_code(&self) -> i32 {
        EXIT_SETUP_FAILURE
    }
}

/// Job finished with a successful final status.
pub const EXIT_SUCCESS: i32 = 0;

/// Setup, validation, staging or submission failed.
pub const EXIT_SETUP_FAILURE: i32 = 1;

/// Job reached a terminal state without succeeding.
pub const EXIT_JOB_UNSUCCESSFUL: i32 = 2;

pub type LaunchResult<T> = Result<T, LaunchError>;
