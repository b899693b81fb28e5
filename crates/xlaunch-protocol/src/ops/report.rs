//! get_application_report payloads.

use serde::{Deserialize, Serialize};

use crate::ApplicationId;

/// Lifecycle state as tracked by the resource manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationState {
    New,
    NewSaving,
    Submitted,
    Accepted,
    Running,
    Finished,
    Failed,
    Killed,
}

impl ApplicationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Killed)
    }
}

impl std::fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::NewSaving => "NEW_SAVING",
            Self::Submitted => "SUBMITTED",
            Self::Accepted => "ACCEPTED",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        };
        write!(f, "{}", s)
    }
}

/// Outcome reported by the coordinator once it unregisters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinalStatus {
    Undefined,
    Succeeded,
    Failed,
    Killed,
}

impl std::fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Undefined => "UNDEFINED",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
        };
        write!(f, "{}", s)
    }
}

/// Request payload for get_application_report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetReportRequest {
    pub application_id: ApplicationId,
}

/// Snapshot of an application as seen by the resource manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationReport {
    pub application_id: ApplicationId,
    pub state: ApplicationState,
    pub final_status: FinalStatus,
    /// Coordinator host; empty or `N/A` until the coordinator registers.
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub rpc_port: i32,
    #[serde(default)]
    pub tracking_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

impl ApplicationReport {
    /// Whether the report names a coordinator endpoint that can be dialed.
    pub fn has_coordinator_endpoint(&self) -> bool {
        let host = self.host.trim();
        !host.is_empty() && !host.eq_ignore_ascii_case("N/A")
    }
}
