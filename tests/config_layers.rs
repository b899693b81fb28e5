//! Configuration layering tests
//!
//! Built-in defaults, a user TOML file, `--conf` overrides and typed flags
//! merged into the job description the controller works from.

use std::fs;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use xlaunch::config::{parse_overrides, EffectiveConfig};
use xlaunch::error::ErrorKind;
use xlaunch::{AppType, ControllerSettings, JobSpec, LaunchError};

fn user_config(contents: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("xlaunch.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

fn cli(app_type: &str) -> serde_json::Value {
    json!({
        "app": { "type": app_type },
        "job": { "jar": "/opt/xlaunch/am.jar", "exec_cmd": "python train.py" }
    })
}

#[test]
fn test_layers_apply_in_precedence_order() {
    let (_dir, path) = user_config(
        r#"
[app]
queue = "gpu"

[worker]
num = 4
memory_mb = 4096

[ps]
num = 2
"#,
    );
    let conf = parse_overrides(&["worker.num=6"]).unwrap();

    let mut config = EffectiveConfig::build(Some(&path), Some(conf), Some(cli("mxnet"))).unwrap();
    let spec = JobSpec::from_config(&mut config, Some("alice")).unwrap();

    assert_eq!(spec.app_type, AppType::Mxnet);
    assert_eq!(spec.worker.count, 6);
    assert_eq!(spec.worker.memory_mb, 4096);
    assert_eq!(spec.ps.count, 2);
    assert_eq!(spec.queue, "gpu");
    assert!(!spec.is_single_mode());
    assert_eq!(config.get_bool("mxnet.mode.single"), Some(false));
    assert_eq!(config.sources.len(), 4);
}

#[test]
fn test_missing_user_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    let config = EffectiveConfig::build(Some(&path), None, None).unwrap();
    assert_eq!(config.sources.len(), 1);
}

#[test]
fn test_blank_queue_falls_back_to_submitter() {
    let conf = parse_overrides(&["app.queue="]).unwrap();

    let mut config = EffectiveConfig::build(None, Some(conf.clone()), Some(cli("tensorflow"))).unwrap();
    let spec = JobSpec::from_config(&mut config, Some("alice")).unwrap();
    assert_eq!(spec.queue, "alice");
    assert_eq!(config.get_str("app.queue"), Some("alice"));

    let mut config = EffectiveConfig::build(None, Some(conf), Some(cli("tensorflow"))).unwrap();
    let spec = JobSpec::from_config(&mut config, None).unwrap();
    assert_eq!(spec.queue, "default");
}

#[test]
fn test_tensorflow_without_ps_runs_single_mode() {
    let mut config = EffectiveConfig::build(None, None, Some(cli("TENSORFLOW"))).unwrap();
    let spec = JobSpec::from_config(&mut config, None).unwrap();

    assert!(spec.is_single_mode());
    assert_eq!(config.get_bool("tf.mode.single"), Some(true));
    assert_eq!(config.get_i64("board.worker_index"), Some(0));
}

#[test]
fn test_absolute_board_log_dir_is_qualified() {
    let conf = parse_overrides(&["board.log_dir=/logs/tb", "fs.default=hdfs://nn:8020"]).unwrap();
    let mut config = EffectiveConfig::build(None, Some(conf), Some(cli("tensorflow"))).unwrap();

    JobSpec::from_config(&mut config, None).unwrap();
    assert_eq!(config.get_str("board.log_dir"), Some("hdfs://nn:8020/logs/tb"));
}

#[test]
fn test_relative_board_log_dir_is_kept() {
    let mut config = EffectiveConfig::build(None, None, Some(cli("tensorflow"))).unwrap();
    JobSpec::from_config(&mut config, None).unwrap();
    assert_eq!(config.get_str("board.log_dir"), Some("eventLog"));
}

#[test]
fn test_unknown_app_type_is_invalid() {
    let mut config = EffectiveConfig::build(None, None, Some(cli("spark"))).unwrap();
    let err = JobSpec::from_config(&mut config, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_missing_package_is_invalid() {
    let mut config =
        EffectiveConfig::build(None, None, Some(json!({ "app": { "type": "keras" } }))).unwrap();
    let err = JobSpec::from_config(&mut config, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_non_integer_resource_is_invalid() {
    let conf = parse_overrides(&["worker.memory_mb=lots"]).unwrap();
    let mut config = EffectiveConfig::build(None, Some(conf), Some(cli("tensorflow"))).unwrap();
    let err = JobSpec::from_config(&mut config, None).unwrap_err();
    assert!(err.to_string().contains("worker.memory_mb"));
}

#[test]
fn test_bad_poll_interval_is_a_config_error() {
    let conf = parse_overrides(&["monitor.poll_interval_ms=fast"]).unwrap();
    let err: LaunchError = EffectiveConfig::build(None, Some(conf), None).unwrap_err().into();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_malformed_override() {
    assert!(parse_overrides(&["worker.num"]).is_err());
    assert!(parse_overrides(&["worker..num=1"]).is_err());
}

#[test]
fn test_controller_settings_from_user_file() {
    let (_dir, path) = user_config(
        r#"
[staging]
dir = "/user/alice/.staging"

[monitor]
poll_interval_ms = 250
"#,
    );
    let config = EffectiveConfig::build(Some(&path), None, None).unwrap();
    let settings = ControllerSettings::from_config(&config).unwrap();

    assert_eq!(settings.staging_root, "/user/alice/.staging");
    assert_eq!(settings.poll_interval, Duration::from_millis(250));
}

#[test]
fn test_persisted_config_hides_secrets() {
    let (_dir, path) = user_config(
        r#"
[auth]
token = "s3cr3t"
user = "alice"
"#,
    );
    let config = EffectiveConfig::build(Some(&path), None, Some(cli("tensorflow"))).unwrap();

    let persisted = config.redacted().with_application_id("application_1_0001");
    assert_eq!(persisted.get_str("auth.token"), Some("[REDACTED]"));
    assert_eq!(persisted.get_str("auth.user"), Some("alice"));
    assert_eq!(persisted.redactions, vec!["auth.token".to_string()]);

    let json = persisted.to_json().unwrap();
    assert!(!json.contains("s3cr3t"));
    assert!(json.contains("application_1_0001"));
}
