//! Mock Cluster Implementation
//!
//! In-process stand-ins for the two remote parties the launcher talks to:
//!
//! - **Resource manager** ([`MockCluster`]): `create_application`,
//!   `submit_application` and `get_application_report`, with a scripted
//!   report sequence and failure injection
//! - **Coordinator** ([`MockCoordinator`]): scripted message batches with
//!   connect and fetch failure modes

mod cluster;
mod coordinator;
mod failure;

pub use cluster::{MockCluster, ScriptedReport};
pub use coordinator::MockCoordinator;
pub use failure::{FailureConfig, FailureInjector};
