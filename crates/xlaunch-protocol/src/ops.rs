//! Operation-specific types.

pub mod application;
pub mod messages;
pub mod report;

pub use application::{
    ClusterCapability, ContainerLaunchContext, LocalResource, NewApplicationResponse, Resource,
    ResourceKind, SubmissionContext, SubmitApplicationRequest, SubmitApplicationResponse,
};
pub use messages::{AppMessage, FetchMessagesRequest, FetchMessagesResponse, LogKind};
pub use report::{ApplicationReport, ApplicationState, FinalStatus, GetReportRequest};

/// Known operation names.
pub mod names {
    pub const CREATE_APPLICATION: &str = "create_application";
    pub const SUBMIT_APPLICATION: &str = "submit_application";
    pub const GET_APPLICATION_REPORT: &str = "get_application_report";
    pub const FETCH_APPLICATION_MESSAGES: &str = "fetch_application_messages";
}
