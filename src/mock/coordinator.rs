//! Mock Coordinator
//!
//! Scripted coordinator endpoint for monitor tests. Counts connects and
//! fetches, and can be told to fail either operation.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use xlaunch_protocol::ops::{AppMessage, LogKind};

use crate::coordinator::{ChannelError, CoordinatorChannel, CoordinatorConnector};

#[derive(Debug, Default)]
struct CoordinatorState {
    /// One batch per fetch; empty once drained.
    batches: VecDeque<Vec<AppMessage>>,
    fail_connect: bool,
    fail_fetch: bool,
    connects: usize,
    fetches: usize,
    endpoints: Vec<(String, i32)>,
}

/// Configurable mock coordinator, shared between the connector handed to
/// the monitor and the test that inspects it.
#[derive(Debug, Clone, Default)]
pub struct MockCoordinator {
    state: Arc<Mutex<CoordinatorState>>,
}

impl MockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch of messages for the next fetch.
    pub fn push_batch(&self, batch: Vec<AppMessage>) {
        self.state.lock().unwrap().batches.push_back(batch);
    }

    pub fn push_line(&self, log_kind: LogKind, message: impl Into<String>) {
        self.push_batch(vec![AppMessage {
            log_kind,
            message: message.into(),
        }]);
    }

    /// Every connect attempt fails.
    pub fn fail_connect(&self, value: bool) {
        self.state.lock().unwrap().fail_connect = value;
    }

    /// Every fetch fails.
    pub fn fail_fetch(&self, value: bool) {
        self.state.lock().unwrap().fail_fetch = value;
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn fetches(&self) -> usize {
        self.state.lock().unwrap().fetches
    }

    /// Endpoints the monitor dialed, in order.
    pub fn endpoints(&self) -> Vec<(String, i32)> {
        self.state.lock().unwrap().endpoints.clone()
    }
}

impl CoordinatorConnector for MockCoordinator {
    fn connect(&self, host: &str, port: i32) -> Result<Box<dyn CoordinatorChannel>, ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        state.endpoints.push((host.to_string(), port));
        if state.fail_connect {
            return Err(ChannelError::Connect {
                endpoint: format!("{}:{}", host, port),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "mock refused"),
            });
        }
        Ok(Box::new(MockChannel {
            state: self.state.clone(),
        }))
    }
}

struct MockChannel {
    state: Arc<Mutex<CoordinatorState>>,
}

impl CoordinatorChannel for MockChannel {
    fn fetch_messages(&mut self) -> Result<Vec<AppMessage>, ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.fetches += 1;
        if state.fail_fetch {
            return Err(ChannelError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock channel failure",
            )));
        }
        Ok(state.batches.pop_front().unwrap_or_default())
    }
}
