//! Coordinator message channel
//!
//! Once the application is running and the coordinator has published its
//! endpoint, the launcher polls it for buffered stdout/stderr lines. The
//! channel is best effort: every failure surfaces as a [`ChannelError`]
//! that the monitor logs and recovers from.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;
use xlaunch_protocol::ops::{names, AppMessage, FetchMessagesRequest, FetchMessagesResponse};
use xlaunch_protocol::RpcRequest;

use crate::error::ErrorKind;

/// Coordinator channel errors
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Cannot connect to coordinator at {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Coordinator closed the connection")]
    Closed,

    #[error("Coordinator returned an error: {0}")]
    Remote(String),
}

impl ChannelError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::RpcUnavailable
    }
}

/// Opens channels to a coordinator endpoint.
pub trait CoordinatorConnector: Send + Sync {
    fn connect(&self, host: &str, port: i32) -> Result<Box<dyn CoordinatorChannel>, ChannelError>;
}

/// An open channel to the coordinator.
pub trait CoordinatorChannel: Send {
    /// Drain the lines the coordinator has buffered since the last call.
    fn fetch_messages(&mut self) -> Result<Vec<AppMessage>, ChannelError>;
}

/// JSON-lines over TCP, one request line and one response line per fetch.
#[derive(Debug, Clone)]
pub struct TcpCoordinatorConnector {
    timeout: Duration,
}

impl TcpCoordinatorConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CoordinatorConnector for TcpCoordinatorConnector {
    fn connect(&self, host: &str, port: i32) -> Result<Box<dyn CoordinatorChannel>, ChannelError> {
        let endpoint = format!("{}:{}", host, port);
        let connect_err = |source: io::Error| ChannelError::Connect {
            endpoint: endpoint.clone(),
            source,
        };

        let port = u16::try_from(port).map_err(|_| {
            connect_err(io::Error::new(io::ErrorKind::InvalidInput, "port out of range"))
        })?;
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(connect_err)?
            .next()
            .ok_or_else(|| {
                connect_err(io::Error::new(io::ErrorKind::NotFound, "no address for host"))
            })?;

        let stream = TcpStream::connect_timeout(&addr, self.timeout).map_err(connect_err)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        debug!("Connected to coordinator at {}", endpoint);

        let reader = BufReader::new(stream.try_clone()?);
        Ok(Box::new(TcpCoordinatorChannel {
            writer: stream,
            reader,
        }))
    }
}

pub struct TcpCoordinatorChannel {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl CoordinatorChannel for TcpCoordinatorChannel {
    fn fetch_messages(&mut self) -> Result<Vec<AppMessage>, ChannelError> {
        let request = RpcRequest::new(
            names::FETCH_APPLICATION_MESSAGES,
            format!("fetch-{}", Uuid::new_v4().simple()),
            serde_json::to_value(FetchMessagesRequest::default())?,
        );
        let line = serde_json::to_string(&request)?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;

        let mut response_line = String::new();
        if self.reader.read_line(&mut response_line)? == 0 {
            return Err(ChannelError::Closed);
        }

        let response: xlaunch_protocol::RpcResponse = serde_json::from_str(response_line.trim())?;
        if !response.ok {
            let message = response
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no error details".to_string());
            return Err(ChannelError::Remote(message));
        }

        let payload: FetchMessagesResponse = match response.payload {
            Some(payload) => serde_json::from_value(payload)?,
            None => FetchMessagesResponse::default(),
        };
        Ok(payload.messages)
    }
}
