//! Submission controller
//!
//! Drives one job from a resolved [`JobSpec`] to a terminal application
//! state: path and cache resolution, application creation, validation,
//! staging, launch context, submission, then the monitor loop.

mod monitor;
mod state;

pub use monitor::{ApplicationMonitor, MonitorOutcome};
pub use state::{Lifecycle, StateError, SubmissionState};

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use xlaunch_protocol::ApplicationId;

use crate::cache::CacheResolver;
use crate::config::EffectiveConfig;
use crate::coordinator::CoordinatorConnector;
use crate::error::{LaunchError, LaunchResult, EXIT_JOB_UNSUCCESSFUL, EXIT_SUCCESS};
use crate::fs::SharedFs;
use crate::host::{ResourceManager, RmError};
use crate::job::JobSpec;
use crate::launch::{submission_context, LaunchContextBuilder};
use crate::paths::PathMapper;
use crate::signal::SignalState;
use crate::staging::ArtifactStager;
use crate::validate::ResourceValidator;

/// Settings the controller reads from the effective configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Root of the per-application staging directories
    pub staging_root: String,
    pub poll_interval: Duration,
}

impl ControllerSettings {
    pub fn from_config(config: &EffectiveConfig) -> LaunchResult<Self> {
        let staging_root = config
            .get_str("staging.dir")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| LaunchError::InvalidArgument("staging.dir is not set".to_string()))?
            .to_string();
        let poll_interval = config.get_u64("monitor.poll_interval_ms").ok_or_else(|| {
            LaunchError::InvalidArgument("monitor.poll_interval_ms is not set".to_string())
        })?;
        Ok(Self {
            staging_root,
            poll_interval: Duration::from_millis(poll_interval),
        })
    }
}

/// Result of a submission that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub application_id: ApplicationId,
    pub monitor: MonitorOutcome,
}

impl SubmissionOutcome {
    pub fn succeeded(&self) -> bool {
        self.monitor.succeeded()
    }

    pub fn exit_code(&self) -> i32 {
        if self.succeeded() {
            EXIT_SUCCESS
        } else {
            EXIT_JOB_UNSUCCESSFUL
        }
    }
}

pub struct SubmissionController<'a> {
    rm: &'a dyn ResourceManager,
    fs: &'a dyn SharedFs,
    connector: &'a dyn CoordinatorConnector,
    settings: ControllerSettings,
    signals: Option<Arc<SignalState>>,
    lifecycle: Lifecycle,
}

impl<'a> SubmissionController<'a> {
    pub fn new(
        rm: &'a dyn ResourceManager,
        fs: &'a dyn SharedFs,
        connector: &'a dyn CoordinatorConnector,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            rm,
            fs,
            connector,
            settings,
            signals: None,
            lifecycle: Lifecycle::new(),
        }
    }

    /// Report the submitted application id to the signal handler.
    pub fn with_signal_state(mut self, signals: Arc<SignalState>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Submit `spec` and monitor it to completion.
    ///
    /// `config` is persisted to the staging area as the job configuration.
    pub fn submit(&mut self, spec: &JobSpec, config: &EffectiveConfig) -> LaunchResult<SubmissionOutcome> {
        let mapper = PathMapper::new(self.fs, spec.input_alias.as_str(), spec.output_alias.as_str());
        let inputs = mapper.map_inputs(&spec.inputs)?;
        let outputs = mapper.map_outputs(&spec.outputs)?;
        let cache = CacheResolver::new(self.fs).resolve_all(&spec.cache_files, &spec.cache_archives)?;

        let app = self.rm.create_application()?;
        info!(
            "Requesting a new application from cluster with {} NodeManagers",
            app.capability.node_manager_count
        );
        let app_id = app.application_id;
        info!("Got new Application: {}", app_id);
        self.lifecycle.transition(SubmissionState::ResourcesAcquired)?;

        ResourceValidator::new(&app.capability).validate(spec)?;

        let staged = ArtifactStager::new(self.fs, &self.settings.staging_root).stage(
            &app_id,
            spec,
            config,
            &cache,
        )?;
        self.lifecycle.transition(SubmissionState::Staged)?;

        let launch = LaunchContextBuilder::new(spec, &app.capability, &staged, &inputs, &outputs).build()?;
        let context = submission_context(&app_id, spec, launch);

        info!("Submitting application {} to queue {}", app_id, spec.queue);
        let submitted = match self.rm.submit_application(context) {
            Err(RmError::Rejected(reason)) => {
                return Err(LaunchError::SubmissionFailure(format!(
                    "resource manager rejected application {}: {}",
                    app_id, reason
                )))
            }
            other => other?,
        };
        let submitted = submitted.ok_or_else(|| {
            LaunchError::SubmissionFailure(format!(
                "resource manager did not register application {}",
                app_id
            ))
        })?;
        self.lifecycle.transition(SubmissionState::Submitted)?;
        if let Some(signals) = &self.signals {
            signals.set_application_id(submitted.clone());
        }

        let report = self.rm.get_application_report(&submitted)?;
        info!("The url to track the job: {}", report.tracking_url);

        let monitor = ApplicationMonitor::new(self.rm, self.connector, self.settings.poll_interval)
            .run(&submitted, &mut self.lifecycle, report)?;

        Ok(SubmissionOutcome {
            application_id: submitted,
            monitor,
        })
    }
}
