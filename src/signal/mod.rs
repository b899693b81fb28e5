//! Signal handling (SIGINT/SIGTERM)
//!
//! The launcher never kills what it submitted. On the first signal it
//! logs which application is left running on the cluster and exits with
//! the setup-failure code; further signals are ignored.

use std::process;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tracing::warn;
use xlaunch_protocol::ApplicationId;

use crate::error::EXIT_SETUP_FAILURE;

/// Signal handler state
#[derive(Debug, Default)]
pub struct SignalState {
    signal_count: AtomicU8,
    /// Set once the resource manager has accepted the application
    application_id: Mutex<Option<ApplicationId>>,
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: exit, leaving the application (if any) running
    Exit { left_running: Option<ApplicationId> },
    /// Later signals: already exiting
    Ignore,
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_interrupted(&self) -> bool {
        self.signal_count() > 0
    }

    /// Get the number of signals received
    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Record the submitted application
    pub fn set_application_id(&self, application_id: ApplicationId) {
        if let Ok(mut id) = self.application_id.lock() {
            *id = Some(application_id);
        }
    }

    pub fn application_id(&self) -> Option<ApplicationId> {
        self.application_id.lock().ok().and_then(|id| id.clone())
    }

    /// Handle a signal (SIGINT/SIGTERM)
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);
        if count == 0 {
            SignalAction::Exit {
                left_running: self.application_id(),
            }
        } else {
            SignalAction::Ignore
        }
    }
}

/// Signal handler that manages the signal state
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SignalState::new()),
        }
    }

    /// Get a reference to the signal state
    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Install the handler. Must be called once at program startup.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::Exit {
                left_running: Some(id),
            } => {
                warn!("Interrupted; application {} keeps running on the cluster", id);
                process::exit(EXIT_SETUP_FAILURE);
            }
            SignalAction::Exit { left_running: None } => {
                warn!("Interrupted before the application was submitted");
                process::exit(EXIT_SETUP_FAILURE);
            }
            SignalAction::Ignore => {}
        })
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}
