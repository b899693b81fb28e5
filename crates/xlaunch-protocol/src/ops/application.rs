//! create_application and submit_application payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ApplicationId;

/// Per-container maxima and cluster size, reported once per submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCapability {
    pub max_memory_mb: i64,
    pub max_vcores: i64,
    #[serde(default)]
    pub node_manager_count: u32,
}

/// Response payload for create_application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewApplicationResponse {
    pub application_id: ApplicationId,
    pub capability: ClusterCapability,
}

/// How a local resource is materialized in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    /// Copied as-is.
    File,
    /// Unpacked into a directory named after the resource.
    Archive,
}

/// A named artifact on shared storage that the node manager localizes
/// into the container's working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalResource {
    /// Fully qualified remote location.
    pub location: String,
    pub kind: ResourceKind,
    /// Size in bytes at registration time.
    pub size: u64,
    /// Modification time at registration, milliseconds since the epoch.
    pub timestamp: i64,
}

/// Everything needed to start the coordinator container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerLaunchContext {
    pub local_resources: BTreeMap<String, LocalResource>,
    pub environment: BTreeMap<String, String>,
    pub commands: Vec<String>,
}

/// Memory and virtual cores for one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub memory_mb: i64,
    pub vcores: i64,
}

/// Submission context handed to the resource manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionContext {
    pub application_id: ApplicationId,
    pub name: String,
    pub application_type: String,
    pub queue: String,
    pub priority: i32,
    pub resource: Resource,
    pub am_container: ContainerLaunchContext,
}

/// Request payload for submit_application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitApplicationRequest {
    pub context: SubmissionContext,
}

/// Response payload for submit_application.
///
/// A missing id means the resource manager accepted the call but did not
/// register the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitApplicationResponse {
    #[serde(default)]
    pub application_id: Option<ApplicationId>,
}
