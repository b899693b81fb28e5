//! RPC request types.

use serde::{Deserialize, Serialize};

/// RPC request envelope.
///
/// The gateway reads exactly one request per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol version.
    pub protocol_version: i32,
    /// Operation name, see [`crate::ops::names`].
    pub op: String,
    /// Caller-chosen request ID for correlation.
    pub request_id: String,
    /// Operation-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RpcRequest {
    pub fn new(op: impl Into<String>, request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            op: op.into(),
            request_id: request_id.into(),
            payload,
        }
    }

    /// Decode the payload into an operation-specific request type.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
