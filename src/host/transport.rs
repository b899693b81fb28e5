//! Transport Layer for the Resource-Manager Client
//!
//! Abstracts the path to the resource manager for testability. Provides:
//! - Transport trait: one request in, one response out
//! - MockTransport: in-process mock cluster for unit tests
//! - GatewayTransport: spawns the cluster gateway command per request

use std::io::{self, Write};
use std::process::{Command, Stdio};

use tracing::debug;
use xlaunch_protocol::{RpcRequest, RpcResponse};

use crate::mock::MockCluster;

/// Transport trait for resource-manager RPC
pub trait Transport: Send + Sync {
    /// Execute an RPC request and return the response
    fn execute(&self, request: &RpcRequest) -> Result<RpcResponse, TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Gateway failed: {0}")]
    Gateway(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Mock transport for testing - connects directly to MockCluster in-process
pub struct MockTransport {
    cluster: MockCluster,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            cluster: MockCluster::new(),
        }
    }

    pub fn with_cluster(cluster: MockCluster) -> Self {
        Self { cluster }
    }

    /// The underlying mock cluster, for test configuration and inspection
    pub fn cluster(&self) -> &MockCluster {
        &self.cluster
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        Ok(self.cluster.handle_request(request))
    }
}

/// Gateway transport for production use
///
/// Runs the configured gateway command once per request.
/// Format: single JSON request line on stdin → single JSON response on stdout.
pub struct GatewayTransport {
    program: String,
    args: Vec<String>,
}

impl GatewayTransport {
    /// Build from a command line; the first element is the program.
    pub fn new(command: &[String]) -> Result<Self, TransportError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| TransportError::Gateway("empty gateway command".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Transport for GatewayTransport {
    fn execute(&self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        let request_json = serde_json::to_string(request)?;
        debug!(op = %request.op, request_id = %request.request_id, "gateway request");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TransportError::Gateway(format!("Failed to spawn {}: {}", self.program, e))
            })?;

        // Dropping stdin closes it so the gateway sees EOF
        let written = match child.stdin.take() {
            Some(mut stdin) => writeln!(stdin, "{}", request_json),
            None => Ok(()),
        };

        // Reap the child even when the request could not be written
        let output = child
            .wait_with_output()
            .map_err(|e| TransportError::Gateway(format!("Gateway process error: {}", e)))?;
        if let Err(e) = written {
            return Err(TransportError::Gateway(format!(
                "{} did not accept the request ({}): {}",
                self.program,
                e,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransportError::Gateway(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let line = output
            .stdout
            .split(|&b| b == b'\n')
            .find(|l| !l.iter().all(u8::is_ascii_whitespace))
            .ok_or_else(|| TransportError::Protocol("Empty gateway response".to_string()))?;

        let response: RpcResponse = serde_json::from_slice(line)
            .map_err(|e| TransportError::Protocol(format!("Invalid response JSON: {}", e)))?;

        Ok(response)
    }
}
