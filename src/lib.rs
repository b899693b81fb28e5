//! xlaunch - distributed training job launcher
//!
//! Client side of a YARN-style cluster submission: validates a job against
//! the cluster's advertised capacity, stages its artifacts on the shared
//! store, submits the coordinator and follows the application until it
//! finishes, relaying coordinator output along the way.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fs;
pub mod host;
pub mod job;
pub mod launch;
pub mod mock;
pub mod paths;
pub mod signal;
pub mod staging;
pub mod submit;
pub mod validate;

pub use config::EffectiveConfig;
pub use error::{ErrorKind, LaunchError, LaunchResult};
pub use job::{AppType, JobSpec, ResourceAsk, Role};
pub use submit::{ControllerSettings, SubmissionController, SubmissionOutcome};
pub use xlaunch_protocol::ApplicationId;
