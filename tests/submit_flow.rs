//! End-to-end submission tests
//!
//! Drives the controller against the mock resource manager, the mock
//! coordinator and a shared store mounted on a temporary directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use xlaunch::config::EffectiveConfig;
use xlaunch::error::ErrorKind;
use xlaunch::fs::MountedFs;
use xlaunch::host::{MockTransport, RmClient};
use xlaunch::launch::env;
use xlaunch::mock::{FailureConfig, MockCluster, MockCoordinator, ScriptedReport};
use xlaunch::signal::SignalState;
use xlaunch::submit::SubmissionState;
use xlaunch::{
    AppType, ControllerSettings, JobSpec, LaunchResult, ResourceAsk, SubmissionController,
    SubmissionOutcome,
};
use xlaunch_protocol::ops::{names, AppMessage, ApplicationState, FinalStatus, LogKind, ResourceKind};
use xlaunch_protocol::ErrorCode;

const DEFAULT_FS: &str = "hdfs://nn:8020";

/// A mounted store plus a local workspace holding the job's own files.
struct Fixture {
    store: TempDir,
    local: TempDir,
    fs: MountedFs,
    cluster: MockCluster,
    rm: RmClient,
    coordinator: MockCoordinator,
}

impl Fixture {
    fn new() -> Self {
        let store = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        fs::write(local.path().join("am.jar"), b"coordinator package").unwrap();
        fs::write(local.path().join("train.py"), b"print('training')").unwrap();

        let fs = MountedFs::new(store.path(), DEFAULT_FS);
        let cluster = MockCluster::new();
        let rm = RmClient::new(Arc::new(MockTransport::with_cluster(cluster.clone())));

        Self {
            store,
            local,
            fs,
            cluster,
            rm,
            coordinator: MockCoordinator::new(),
        }
    }

    fn local_file(&self, name: &str) -> PathBuf {
        self.local.path().join(name)
    }

    /// Create a remote directory under the store.
    fn remote_dir(&self, path: &str) {
        fs::create_dir_all(self.store.path().join(path.trim_start_matches('/'))).unwrap();
    }

    /// Create a remote file under the store.
    fn remote_file(&self, path: &str, contents: &[u8]) {
        let local = self.store.path().join(path.trim_start_matches('/'));
        fs::create_dir_all(local.parent().unwrap()).unwrap();
        fs::write(local, contents).unwrap();
    }

    fn staging_path(&self) -> PathBuf {
        self.store.path().join("staging")
    }

    fn spec(&self) -> xlaunch::job::JobSpecBuilder {
        JobSpec::builder(AppType::Tensorflow, self.local_file("am.jar"))
            .app_name("mnist")
            .launch_cmd(Some("python train.py"))
            .files(vec![self.local_file("train.py")])
    }

    fn submit(&self, spec: &JobSpec) -> LaunchResult<SubmissionOutcome> {
        self.submit_with(spec, None)
    }

    fn submit_with(&self, spec: &JobSpec, signals: Option<Arc<SignalState>>) -> LaunchResult<SubmissionOutcome> {
        let config = EffectiveConfig::build(None, None, None).unwrap();
        let settings = ControllerSettings {
            staging_root: "/staging".to_string(),
            poll_interval: Duration::ZERO,
        };
        let mut controller = SubmissionController::new(&self.rm, &self.fs, &self.coordinator, settings);
        if let Some(signals) = signals {
            controller = controller.with_signal_state(signals);
        }
        controller.submit(spec, &config)
    }
}

fn exists(path: &Path) -> bool {
    path.exists()
}

// =============================================================================
// Happy path
// =============================================================================

#[test]
fn test_submit_stages_and_succeeds() {
    let fx = Fixture::new();
    fx.remote_dir("/data/a");
    fx.remote_dir("/data/b");
    let spec = fx
        .spec()
        .inputs(vec!["/data/a,/data/b#train".to_string()])
        .outputs(vec!["/out/model#model".to_string()])
        .build();

    let outcome = fx.submit(&spec).unwrap();

    assert!(outcome.succeeded());
    assert_eq!(outcome.exit_code(), 0);

    let app_dir = fx.staging_path().join(outcome.application_id.to_string());
    assert!(exists(&app_dir.join("AppMaster.jar")));
    assert!(exists(&app_dir.join("job.json")));
    assert!(exists(&app_dir.join("train.py")));

    let context = fx.cluster.submitted().unwrap();
    assert_eq!(context.application_id, outcome.application_id);
    assert_eq!(context.name, "mnist");
    assert_eq!(context.application_type, "TENSORFLOW");

    let environment = &context.am_container.environment;
    assert_eq!(environment[env::APP_TYPE], "TENSORFLOW");
    assert_eq!(environment[env::EXEC_CMD], "python train.py");
    assert_eq!(environment[env::INPUTS], "/data/a,/data/b#train");
    assert_eq!(environment[env::OUTPUTS], "/out/model#model");
    assert_eq!(environment[env::CONTAINER_MAX_MEMORY], "8192");
    assert_eq!(
        environment[env::STAGING_LOCATION],
        format!("{}/staging/{}", DEFAULT_FS, outcome.application_id)
    );
    assert!(environment[env::FILES_LOCATION].ends_with("/train.py"));
    assert!(!environment.contains_key(env::CACHE_FILE_LOCATION));

    let resources = &context.am_container.local_resources;
    assert!(resources.contains_key("AppMaster.jar"));
    assert!(resources.contains_key("job.json"));
    // TensorFlow user files travel by location only
    assert!(!resources.contains_key("train.py"));

    assert_eq!(context.am_container.commands.len(), 1);
    assert!(context.am_container.commands[0].contains("-Xmx1024m"));
}

#[test]
fn test_job_conf_records_application_id() {
    let fx = Fixture::new();
    let outcome = fx.submit(&fx.spec().build()).unwrap();

    let conf = fx
        .staging_path()
        .join(outcome.application_id.to_string())
        .join("job.json");
    let persisted: serde_json::Value = serde_json::from_str(&fs::read_to_string(conf).unwrap()).unwrap();
    assert_eq!(
        persisted["application_id"],
        serde_json::json!(outcome.application_id.to_string())
    );
}

#[cfg(unix)]
#[test]
fn test_job_conf_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let fx = Fixture::new();
    let outcome = fx.submit(&fx.spec().build()).unwrap();
    let conf = fx
        .staging_path()
        .join(outcome.application_id.to_string())
        .join("job.json");
    let mode = fs::metadata(conf).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o644);
}

#[test]
fn test_signal_state_learns_application_id() {
    let fx = Fixture::new();
    let signals = Arc::new(SignalState::new());

    let outcome = fx.submit_with(&fx.spec().build(), Some(Arc::clone(&signals))).unwrap();

    assert_eq!(signals.application_id(), Some(outcome.application_id));
}

#[test]
fn test_two_submissions_stage_apart() {
    let fx = Fixture::new();
    let spec = fx.spec().build();

    let names = |fx: &Fixture| -> Vec<String> {
        fx.cluster
            .submitted()
            .unwrap()
            .am_container
            .local_resources
            .keys()
            .cloned()
            .collect()
    };

    let first = fx.submit(&spec).unwrap();
    let first_names = names(&fx);
    let second = fx.submit(&spec).unwrap();

    assert_ne!(first.application_id, second.application_id);
    assert_eq!(first_names, names(&fx));
    for id in [&first.application_id, &second.application_id] {
        let dir = fx.staging_path().join(id.to_string());
        assert!(exists(&dir.join("AppMaster.jar")));
        assert!(exists(&dir.join("train.py")));
    }
}

// =============================================================================
// Monitoring
// =============================================================================

#[test]
fn test_running_coordinator_output_is_relayed() {
    let fx = Fixture::new();
    fx.cluster.script_reports(vec![
        ScriptedReport::new(ApplicationState::Accepted, FinalStatus::Undefined),
        ScriptedReport::new(ApplicationState::Running, FinalStatus::Undefined).with_endpoint("node-7", 4040),
        ScriptedReport::new(ApplicationState::Finished, FinalStatus::Succeeded),
    ]);
    fx.coordinator.push_batch(vec![
        AppMessage {
            log_kind: LogKind::Stderr,
            message: "worker 0 started".to_string(),
        },
        AppMessage {
            log_kind: LogKind::Stdout,
            message: "step 100 loss 0.31".to_string(),
        },
    ]);

    let outcome = fx.submit(&fx.spec().build()).unwrap();

    assert!(outcome.succeeded());
    assert_eq!(fx.coordinator.connects(), 1);
    assert_eq!(fx.coordinator.fetches(), 1);
    assert_eq!(outcome.monitor.relayed, 2);
    assert_eq!(fx.coordinator.endpoints(), vec![("node-7".to_string(), 4040)]);
}

#[test]
fn test_unreachable_coordinator_does_not_abort() {
    let fx = Fixture::new();
    let running = ScriptedReport::new(ApplicationState::Running, FinalStatus::Undefined)
        .with_endpoint("node-2", 4040);
    fx.cluster.script_reports(vec![
        running.clone(),
        running,
        ScriptedReport::new(ApplicationState::Finished, FinalStatus::Succeeded),
    ]);
    fx.coordinator.fail_connect(true);

    let outcome = fx.submit(&fx.spec().build()).unwrap();

    assert!(outcome.succeeded());
    assert_eq!(outcome.monitor.relayed, 0);
    assert_eq!(fx.coordinator.fetches(), 0);
    assert!(fx.coordinator.connects() >= 1);
}

#[test]
fn test_failed_application_exits_two() {
    let fx = Fixture::new();
    fx.cluster.script_reports(vec![
        ScriptedReport::new(ApplicationState::Running, FinalStatus::Undefined),
        ScriptedReport::new(ApplicationState::Failed, FinalStatus::Failed)
            .with_diagnostics("container exited with code 137"),
    ]);

    let outcome = fx.submit(&fx.spec().build()).unwrap();

    assert!(!outcome.succeeded());
    assert_eq!(outcome.monitor.state, ApplicationState::Failed);
    assert_eq!(outcome.exit_code(), 2);
}

#[test]
fn test_finished_but_failed_is_unsuccessful() {
    let fx = Fixture::new();
    fx.cluster.script_reports(vec![ScriptedReport::new(
        ApplicationState::Finished,
        FinalStatus::Failed,
    )]);

    let outcome = fx.submit(&fx.spec().build()).unwrap();
    assert_eq!(outcome.monitor.state, ApplicationState::Finished);
    assert_eq!(outcome.exit_code(), 2);
}

#[test]
fn test_report_failure_is_a_setup_error() {
    let fx = Fixture::new();
    fx.cluster.inject_failure(
        names::GET_APPLICATION_REPORT,
        FailureConfig::error(ErrorCode::ApplicationNotFound, "resource manager restarted"),
    );

    let err = fx.submit(&fx.spec().build()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cluster);
    assert_eq!(err.exit_code(), 1);
    // The application was submitted before the report failed
    assert!(fx.cluster.submitted().is_some());
}

// =============================================================================
// Failures before and during submission
// =============================================================================

#[test]
fn test_existing_output_fails_before_anything_is_created() {
    let fx = Fixture::new();
    fx.remote_dir("/out/model");
    let spec = fx.spec().outputs(vec!["/out/model#model".to_string()]).build();

    let err = fx.submit(&spec).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DuplicateOutputPath);
    assert_eq!(fx.cluster.created_count(), 0);
    assert!(!exists(&fx.staging_path()));
}

#[test]
fn test_missing_input_is_path_not_found() {
    let fx = Fixture::new();
    let spec = fx.spec().inputs(vec!["/data/missing".to_string()]).build();

    let err = fx.submit(&spec).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PathNotFound);
    assert_eq!(fx.cluster.created_count(), 0);
}

#[test]
fn test_malformed_cache_spec_fails_before_create() {
    let fx = Fixture::new();
    let spec = fx.spec().cache_files(vec!["/shared/vocab.txt#".to_string()]).build();

    let err = fx.submit(&spec).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CacheSpecMalformed);
    assert_eq!(fx.cluster.created_count(), 0);
}

#[test]
fn test_oversized_worker_is_rejected_before_staging() {
    let fx = Fixture::new();
    let spec = fx.spec().worker(ResourceAsk::new(16384, 1, 2)).build();

    let err = fx.submit(&spec).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ResourceLimitExceeded);
    assert_eq!(fx.cluster.created_count(), 1);
    assert!(fx.cluster.submitted().is_none());
    assert!(!exists(&fx.staging_path()));
}

#[test]
fn test_invalid_argument_reported_before_limit() {
    let fx = Fixture::new();
    // Worker memory above the cluster maximum and a negative PS count
    let spec = fx
        .spec()
        .worker(ResourceAsk::new(16384, 1, 2))
        .ps(ResourceAsk::new(1024, 1, -1))
        .single_mode(false)
        .build();

    let err = fx.submit(&spec).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_missing_launch_cmd_fails_after_staging() {
    let fx = Fixture::new();
    let spec = fx.spec().launch_cmd(None::<String>).build();

    let err = fx.submit(&spec).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(err.to_string().contains("invalid launch cmd"));
    assert!(fx.cluster.submitted().is_none());
    // Staged artifacts are left behind
    assert!(exists(&fx.staging_path()));
}

#[test]
fn test_unregistered_submission_is_a_failure() {
    let fx = Fixture::new();
    fx.cluster.set_submit_returns_none(true);

    let err = fx.submit(&fx.spec().build()).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SubmissionFailure);
    assert_eq!(err.exit_code(), 1);
    assert_eq!(fx.cluster.report_calls(), 0);
}

#[test]
fn test_rejected_submission_is_a_submission_failure() {
    let fx = Fixture::new();
    fx.cluster.inject_failure(
        names::SUBMIT_APPLICATION,
        FailureConfig::error(ErrorCode::SubmissionRejected, "queue 'gpu' is full"),
    );

    let err = fx.submit(&fx.spec().build()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SubmissionFailure);
    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("queue 'gpu' is full"));
    assert_eq!(fx.cluster.report_calls(), 0);
}

#[test]
fn test_other_submit_errors_stay_cluster_errors() {
    let fx = Fixture::new();
    fx.cluster.inject_failure(
        names::SUBMIT_APPLICATION,
        FailureConfig::error(ErrorCode::InvalidRequest, "context is missing a queue"),
    );

    let err = fx.submit(&fx.spec().build()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cluster);
}

// =============================================================================
// Framework-specific staging
// =============================================================================

#[test]
fn test_mxnet_cluster_mode_materializes_files_and_cache() {
    let fx = Fixture::new();
    fx.remote_file("/shared/vocab.txt", b"a b c");
    fx.remote_file("/shared/env.zip", b"PK");
    let spec = JobSpec::builder(AppType::Mxnet, fx.local_file("am.jar"))
        .launch_cmd(Some("python train.py"))
        .files(vec![fx.local_file("train.py")])
        .ps(ResourceAsk::new(1024, 1, 1))
        .cache_files(vec!["/shared/vocab.txt".to_string()])
        .cache_archives(vec!["/shared/env.zip#pyenv".to_string()])
        .build();
    assert!(!spec.is_single_mode());

    let outcome = fx.submit(&spec).unwrap();
    assert!(outcome.succeeded());

    let context = fx.cluster.submitted().unwrap();
    let resources = &context.am_container.local_resources;
    assert_eq!(resources["train.py"].kind, ResourceKind::File);
    assert_eq!(resources["vocab.txt"].kind, ResourceKind::File);
    assert_eq!(resources["vocab.txt"].location, format!("{}/shared/vocab.txt", DEFAULT_FS));
    assert_eq!(resources["pyenv"].kind, ResourceKind::Archive);
    assert_eq!(resources["pyenv"].size, 2);

    let environment = &context.am_container.environment;
    assert_eq!(environment[env::CACHE_FILE_LOCATION], "/shared/vocab.txt");
    assert_eq!(environment[env::CACHE_ARCHIVE_LOCATION], "/shared/env.zip#pyenv");
}

#[test]
fn test_tensorflow_cache_is_env_only() {
    let fx = Fixture::new();
    fx.remote_file("/shared/vocab.txt", b"a b c");
    let spec = fx
        .spec()
        .cache_files(vec!["/shared/vocab.txt#words".to_string()])
        .build();

    fx.submit(&spec).unwrap();

    let context = fx.cluster.submitted().unwrap();
    assert!(!context.am_container.local_resources.contains_key("words"));
    assert_eq!(
        context.am_container.environment[env::CACHE_FILE_LOCATION],
        "/shared/vocab.txt#words"
    );
}

#[test]
fn test_remote_lib_jar_is_referenced_in_place() {
    let fx = Fixture::new();
    fx.remote_file("/libs/common.jar", b"jar");
    fs::write(fx.local_file("extra.jar"), b"jar").unwrap();
    let remote = format!("{}/libs/common.jar", DEFAULT_FS);
    let spec = fx
        .spec()
        .lib_jars(vec![remote.clone(), fx.local_file("extra.jar").display().to_string()])
        .build();

    let outcome = fx.submit(&spec).unwrap();

    let context = fx.cluster.submitted().unwrap();
    let environment = &context.am_container.environment;
    let staged_extra = format!("{}/staging/{}/extra.jar", DEFAULT_FS, outcome.application_id);
    assert_eq!(
        environment[env::LIBJARS_LOCATION],
        format!("{},{}", remote, staged_extra)
    );
    assert!(environment[env::CLASSPATH].starts_with("common.jar:extra.jar:${CLASSPATH}:./*"));
    assert!(context.am_container.local_resources.contains_key("common.jar"));
    assert!(!exists(
        &fx.staging_path()
            .join(outcome.application_id.to_string())
            .join("common.jar")
    ));
}

#[test]
fn test_missing_remote_lib_jar() {
    let fx = Fixture::new();
    let spec = fx
        .spec()
        .lib_jars(vec![format!("{}/libs/gone.jar", DEFAULT_FS)])
        .build();

    let err = fx.submit(&spec).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PathNotFound);
    assert!(fx.cluster.submitted().is_none());
}

#[test]
fn test_lifecycle_reaches_terminal_state() {
    let fx = Fixture::new();
    let config = EffectiveConfig::build(None, None, None).unwrap();
    let settings = ControllerSettings {
        staging_root: "/staging".to_string(),
        poll_interval: Duration::ZERO,
    };
    let mut controller = SubmissionController::new(&fx.rm, &fx.fs, &fx.coordinator, settings);

    controller.submit(&fx.spec().build(), &config).unwrap();

    let lifecycle = controller.lifecycle();
    assert_eq!(lifecycle.state(), SubmissionState::Finished);
    assert_eq!(
        &lifecycle.history()[..4],
        &[
            SubmissionState::Created,
            SubmissionState::ResourcesAcquired,
            SubmissionState::Staged,
            SubmissionState::Submitted,
        ]
    );
}
