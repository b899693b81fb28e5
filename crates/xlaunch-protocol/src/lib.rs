//! xlaunch Protocol Types
//!
//! Defines the JSON RPC envelope spoken between the launcher and the
//! resource-manager gateway, plus the line protocol used to pull messages
//! from a running coordinator.

pub mod application_id;
pub mod error;
pub mod ops;
pub mod request;
pub mod response;

pub use application_id::{ApplicationId, ApplicationIdError};
pub use error::{ErrorCode, RpcError};
pub use request::RpcRequest;
pub use response::RpcResponse;

/// Protocol version carried by every request.
pub const PROTOCOL_VERSION: i32 = 1;

/// Oldest protocol version a gateway may answer with.
pub const PROTOCOL_MIN: i32 = 1;

/// Newest protocol version this implementation understands.
pub const PROTOCOL_MAX: i32 = 1;
