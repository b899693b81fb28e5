//! Resource-Manager Client
//!
//! Typed client for the three resource-manager operations the launcher
//! uses, over any [`Transport`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;
use xlaunch_protocol::ops::{
    names, ApplicationReport, GetReportRequest, NewApplicationResponse, SubmissionContext,
    SubmitApplicationRequest, SubmitApplicationResponse,
};
use xlaunch_protocol::{ApplicationId, ErrorCode, RpcError, RpcRequest};

use super::transport::{Transport, TransportError};

/// Resource-manager client errors
#[derive(Debug, thiserror::Error)]
pub enum RmError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Resource manager incompatible: {0}")]
    Incompatible(String),

    #[error("Application {0} not found")]
    ApplicationNotFound(String),

    #[error("Submission rejected: {0}")]
    Rejected(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type RmResult<T> = Result<T, RmError>;

/// Operations the launcher needs from the resource manager.
pub trait ResourceManager: Send + Sync {
    /// Reserve a new application id and read the cluster's maxima.
    fn create_application(&self) -> RmResult<NewApplicationResponse>;

    /// Submit the coordinator. `None` means the resource manager accepted
    /// the call but did not register an application.
    fn submit_application(&self, context: SubmissionContext) -> RmResult<Option<ApplicationId>>;

    fn get_application_report(&self, application_id: &ApplicationId) -> RmResult<ApplicationReport>;
}

/// Resource-manager client over a transport
pub struct RmClient {
    transport: Arc<dyn Transport>,
}

impl RmClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    fn next_request_id(&self) -> String {
        format!("req-{}", Uuid::new_v4().simple())
    }

    /// Parse error response into RmError
    fn parse_error(&self, error: &RpcError, context: &str) -> RmError {
        match error.code {
            ErrorCode::UnsupportedProtocol => RmError::Incompatible(error.message.clone()),
            ErrorCode::ApplicationNotFound => RmError::ApplicationNotFound(context.to_string()),
            ErrorCode::SubmissionRejected => RmError::Rejected(error.message.clone()),
            ErrorCode::InvalidRequest => RmError::InvalidRequest(error.message.clone()),
            ErrorCode::UnknownOperation => {
                RmError::Protocol(format!("{}: {}", error.code, error.message))
            }
        }
    }

    /// Send one request and decode its payload.
    fn call<T: DeserializeOwned>(&self, op: &str, payload: Value, context: &str) -> RmResult<T> {
        let request = RpcRequest::new(op, self.next_request_id(), payload);
        debug!(op, request_id = %request.request_id, "resource manager call");

        let response = self.transport.execute(&request)?;

        if response.request_id != request.request_id {
            return Err(RmError::Protocol(format!(
                "{} response id {} does not match request {}",
                op, response.request_id, request.request_id
            )));
        }

        if !response.ok {
            let error = response.error.unwrap_or_else(|| {
                RpcError::new(ErrorCode::InvalidRequest, format!("{} failed with no error details", op))
            });
            return Err(self.parse_error(&error, context));
        }

        let payload = response
            .payload
            .ok_or_else(|| RmError::Protocol(format!("{} response missing payload", op)))?;

        serde_json::from_value(payload)
            .map_err(|e| RmError::Protocol(format!("{} response malformed: {}", op, e)))
    }
}

impl ResourceManager for RmClient {
    fn create_application(&self) -> RmResult<NewApplicationResponse> {
        self.call(names::CREATE_APPLICATION, json!({}), "create_application")
    }

    fn submit_application(&self, context: SubmissionContext) -> RmResult<Option<ApplicationId>> {
        let label = context.application_id.to_string();
        let payload = serde_json::to_value(SubmitApplicationRequest { context })
            .map_err(|e| RmError::Protocol(format!("cannot encode submission: {}", e)))?;
        let response: SubmitApplicationResponse =
            self.call(names::SUBMIT_APPLICATION, payload, &label)?;
        Ok(response.application_id)
    }

    fn get_application_report(&self, application_id: &ApplicationId) -> RmResult<ApplicationReport> {
        let payload = serde_json::to_value(GetReportRequest {
            application_id: application_id.clone(),
        })
        .map_err(|e| RmError::Protocol(format!("cannot encode report request: {}", e)))?;
        self.call(names::GET_APPLICATION_REPORT, payload, &application_id.to_string())
    }
}
