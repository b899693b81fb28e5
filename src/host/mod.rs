//! Resource-Manager Side
//!
//! Client for the cluster resource manager and the transports it runs over.

pub mod rm;
pub mod transport;

pub use rm::{ResourceManager, RmClient, RmError, RmResult};
pub use transport::{GatewayTransport, MockTransport, Transport, TransportError};
