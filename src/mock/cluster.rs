//! Mock Resource Manager
//!
//! In-process stand-in for the cluster resource manager. Serves the three
//! launcher operations over the same envelope the gateway speaks, with
//! scripted application reports and failure injection.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::thread;

use chrono::Utc;
use serde_json::{json, Value};
use xlaunch_protocol::ops::{
    names, ApplicationReport, ApplicationState, ClusterCapability, FinalStatus, GetReportRequest,
    NewApplicationResponse, SubmissionContext, SubmitApplicationRequest, SubmitApplicationResponse,
};
use xlaunch_protocol::{
    ApplicationId, RpcError, RpcRequest, RpcResponse, PROTOCOL_MAX, PROTOCOL_MIN, PROTOCOL_VERSION,
};

use super::failure::{FailureConfig, FailureInjector};

/// One step of the report sequence served by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedReport {
    pub state: ApplicationState,
    pub final_status: FinalStatus,
    pub host: String,
    pub rpc_port: i32,
    pub diagnostics: Option<String>,
}

impl ScriptedReport {
    pub fn new(state: ApplicationState, final_status: FinalStatus) -> Self {
        Self {
            state,
            final_status,
            host: "N/A".to_string(),
            rpc_port: -1,
            diagnostics: None,
        }
    }

    /// Report with a registered coordinator endpoint.
    pub fn with_endpoint(mut self, host: impl Into<String>, rpc_port: i32) -> Self {
        self.host = host.into();
        self.rpc_port = rpc_port;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = Some(diagnostics.into());
        self
    }
}

#[derive(Debug)]
struct ClusterState {
    capability: ClusterCapability,
    cluster_timestamp: u64,
    next_sequence: u32,
    created: BTreeSet<ApplicationId>,
    submitted: Option<SubmissionContext>,
    known: BTreeSet<ApplicationId>,
    submit_returns_none: bool,
    /// Remaining reports; the last one repeats forever.
    reports: VecDeque<ScriptedReport>,
    report_calls: usize,
}

/// Configurable mock resource manager
#[derive(Clone)]
pub struct MockCluster {
    state: Arc<Mutex<ClusterState>>,
    failures: Arc<Mutex<FailureInjector>>,
}

impl MockCluster {
    /// Four nodes of 8 GiB / 8 vcores; reports go ACCEPTED, RUNNING,
    /// FINISHED/SUCCEEDED.
    pub fn new() -> Self {
        Self::with_capability(ClusterCapability {
            max_memory_mb: 8192,
            max_vcores: 8,
            node_manager_count: 4,
        })
    }

    pub fn with_capability(capability: ClusterCapability) -> Self {
        let reports = VecDeque::from(vec![
            ScriptedReport::new(ApplicationState::Accepted, FinalStatus::Undefined),
            ScriptedReport::new(ApplicationState::Running, FinalStatus::Undefined),
            ScriptedReport::new(ApplicationState::Finished, FinalStatus::Succeeded),
        ]);
        Self {
            state: Arc::new(Mutex::new(ClusterState {
                capability,
                cluster_timestamp: Utc::now().timestamp_millis().max(0) as u64,
                next_sequence: 1,
                created: BTreeSet::new(),
                submitted: None,
                known: BTreeSet::new(),
                submit_returns_none: false,
                reports,
                report_calls: 0,
            })),
            failures: Arc::new(Mutex::new(FailureInjector::new())),
        }
    }

    // === Public API for test configuration ===

    pub fn capability(&self) -> ClusterCapability {
        self.state.lock().unwrap().capability
    }

    /// Replace the report sequence. An empty script keeps the current one.
    pub fn script_reports(&self, reports: Vec<ScriptedReport>) {
        if reports.is_empty() {
            return;
        }
        self.state.lock().unwrap().reports = reports.into();
    }

    /// Accept submissions without returning an application id.
    pub fn set_submit_returns_none(&self, value: bool) {
        self.state.lock().unwrap().submit_returns_none = value;
    }

    pub fn inject_failure(&self, op: &str, config: FailureConfig) {
        self.failures.lock().unwrap().inject(op, config);
    }

    /// Drop the injected failure for one operation.
    pub fn clear_failure(&self, op: &str) {
        self.failures.lock().unwrap().clear_op(op);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    // === Inspection ===

    /// Last submission context received.
    pub fn submitted(&self) -> Option<SubmissionContext> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn created_count(&self) -> usize {
        self.state.lock().unwrap().created.len()
    }

    pub fn report_calls(&self) -> usize {
        self.state.lock().unwrap().report_calls
    }

    // === Request handling ===

    pub fn handle_request(&self, request: &RpcRequest) -> RpcResponse {
        let request_id = request.request_id.clone();

        if request.protocol_version < PROTOCOL_MIN || request.protocol_version > PROTOCOL_MAX {
            return RpcResponse::error(
                PROTOCOL_VERSION,
                request_id,
                RpcError::unsupported_protocol(request.protocol_version, PROTOCOL_MIN, PROTOCOL_MAX),
            );
        }
        let version = request.protocol_version;

        let injected = self.failures.lock().unwrap().check(&request.op);
        if let Some(failure) = injected {
            if let Some(delay) = failure.delay {
                thread::sleep(delay);
            }
            if let Some((code, message)) = failure.error {
                return RpcResponse::error(version, request_id, RpcError::new(code, message));
            }
        }

        let result = match request.op.as_str() {
            names::CREATE_APPLICATION => self.create_application(),
            names::SUBMIT_APPLICATION => self.submit_application(request),
            names::GET_APPLICATION_REPORT => self.get_application_report(request),
            other => Err(RpcError::unknown_operation(other)),
        };

        match result {
            Ok(payload) => RpcResponse::success(version, request_id, payload),
            Err(err) => RpcResponse::error(version, request_id, err),
        }
    }

    fn create_application(&self) -> Result<Value, RpcError> {
        let mut state = self.state.lock().unwrap();
        let id = ApplicationId::new(state.cluster_timestamp, state.next_sequence);
        state.next_sequence += 1;
        state.created.insert(id.clone());

        to_payload(&NewApplicationResponse {
            application_id: id,
            capability: state.capability,
        })
    }

    fn submit_application(&self, request: &RpcRequest) -> Result<Value, RpcError> {
        let submit: SubmitApplicationRequest = request
            .payload_as()
            .map_err(|e| RpcError::invalid_request(e.to_string()))?;

        let mut state = self.state.lock().unwrap();
        let id = submit.context.application_id.clone();
        if !state.created.contains(&id) {
            return Err(RpcError::application_not_found(&id.to_string()));
        }
        state.submitted = Some(submit.context);

        if state.submit_returns_none {
            return to_payload(&SubmitApplicationResponse { application_id: None });
        }
        state.known.insert(id.clone());
        to_payload(&SubmitApplicationResponse {
            application_id: Some(id),
        })
    }

    fn get_application_report(&self, request: &RpcRequest) -> Result<Value, RpcError> {
        let query: GetReportRequest = request
            .payload_as()
            .map_err(|e| RpcError::invalid_request(e.to_string()))?;

        let mut state = self.state.lock().unwrap();
        if !state.known.contains(&query.application_id) {
            return Err(RpcError::application_not_found(&query.application_id.to_string()));
        }
        state.report_calls += 1;

        let step = if state.reports.len() > 1 {
            state.reports.pop_front()
        } else {
            state.reports.front().cloned()
        };
        let step = step.unwrap_or_else(|| {
            ScriptedReport::new(ApplicationState::Finished, FinalStatus::Succeeded)
        });

        to_payload(&ApplicationReport {
            tracking_url: format!("http://rm.mock:8088/proxy/{}/", query.application_id),
            application_id: query.application_id,
            state: step.state,
            final_status: step.final_status,
            host: step.host,
            rpc_port: step.rpc_port,
            diagnostics: step.diagnostics,
        })
    }
}

impl Default for MockCluster {
    fn default() -> Self {
        Self::new()
    }
}

fn to_payload<T: serde::Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| {
        RpcError::with_data(
            xlaunch_protocol::ErrorCode::InvalidRequest,
            "cannot encode response",
            json!({ "cause": e.to_string() }),
        )
    })
}
