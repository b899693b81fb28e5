//! Application monitor
//!
//! Polls the resource manager until the application reaches a terminal
//! state, relaying coordinator output while it runs. Coordinator channel
//! failures never end the loop; the channel is dropped and re-opened on a
//! later iteration.

use std::thread;
use std::time::Duration;

use tracing::{info, warn};
use xlaunch_protocol::ops::{AppMessage, ApplicationReport, ApplicationState, FinalStatus, LogKind};
use xlaunch_protocol::ApplicationId;

use crate::coordinator::{CoordinatorChannel, CoordinatorConnector};
use crate::error::LaunchResult;
use crate::host::ResourceManager;

use super::state::Lifecycle;

/// How the application ended, once terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorOutcome {
    pub state: ApplicationState,
    pub final_status: FinalStatus,
    /// Coordinator messages relayed while running.
    pub relayed: usize,
}

impl MonitorOutcome {
    /// Only FINISHED with a SUCCEEDED final status counts as success.
    pub fn succeeded(&self) -> bool {
        self.state == ApplicationState::Finished && self.final_status == FinalStatus::Succeeded
    }
}

pub struct ApplicationMonitor<'a> {
    rm: &'a dyn ResourceManager,
    connector: &'a dyn CoordinatorConnector,
    poll_interval: Duration,
}

impl<'a> ApplicationMonitor<'a> {
    pub fn new(
        rm: &'a dyn ResourceManager,
        connector: &'a dyn CoordinatorConnector,
        poll_interval: Duration,
    ) -> Self {
        Self {
            rm,
            connector,
            poll_interval,
        }
    }

    /// Run until the application is terminal, starting from `report`.
    ///
    /// Only resource-manager errors end the loop early.
    pub fn run(
        &self,
        app_id: &ApplicationId,
        lifecycle: &mut Lifecycle,
        mut report: ApplicationReport,
    ) -> LaunchResult<MonitorOutcome> {
        let mut channel: Option<Box<dyn CoordinatorChannel>> = None;
        let mut relayed = 0;

        loop {
            match lifecycle.observe(report.state) {
                Ok(true) => info!("Application {} is now {}", app_id, report.state),
                Ok(false) => {}
                Err(e) => warn!("Ignoring report for {}: {}", app_id, e),
            }

            if channel.is_none() && report.state == ApplicationState::Running {
                info!("Application report for {} (state: {})", app_id, report.state);
                channel = self.open_channel(&report);
            }

            if report.state.is_terminal() {
                let outcome = MonitorOutcome {
                    state: report.state,
                    final_status: report.final_status,
                    relayed,
                };
                if let Some(diagnostics) = report.diagnostics.as_deref().filter(|d| !d.is_empty()) {
                    info!("Diagnostics for {}: {}", app_id, diagnostics);
                }
                if outcome.succeeded() {
                    info!("Application {} finished with state {}", app_id, report.final_status);
                } else {
                    info!(
                        "Application {} finished with state {} and final status {}",
                        app_id, report.state, report.final_status
                    );
                }
                return Ok(outcome);
            }

            if let Some(open) = channel.as_mut() {
                match open.fetch_messages() {
                    Ok(messages) => relayed += relay(&messages),
                    Err(e) => {
                        warn!("Lost coordinator channel ({}): {}", e.kind(), e);
                        channel = None;
                    }
                }
            }

            if !self.poll_interval.is_zero() {
                thread::sleep(self.poll_interval);
            }

            report = self.rm.get_application_report(app_id)?;
        }
    }

    fn open_channel(&self, report: &ApplicationReport) -> Option<Box<dyn CoordinatorChannel>> {
        if !report.has_coordinator_endpoint() {
            return None;
        }
        match self.connector.connect(&report.host, report.rpc_port) {
            Ok(channel) => {
                info!("Connected to coordinator at {}:{}", report.host, report.rpc_port);
                Some(channel)
            }
            Err(e) => {
                warn!("Coordinator not reachable ({}): {}", e.kind(), e);
                None
            }
        }
    }
}

/// Stderr lines go through the logger, stdout lines to standard output.
fn relay(messages: &[AppMessage]) -> usize {
    for message in messages {
        match message.log_kind {
            LogKind::Stderr => info!("{}", message.message),
            LogKind::Stdout => println!("{}", message.message),
        }
    }
    messages.len()
}
