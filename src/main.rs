//! xlaunch CLI
//!
//! Entry point for the `xlaunch` command-line tool.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xlaunch::config::{default_user_config_path, parse_overrides, set_path};
use xlaunch::coordinator::TcpCoordinatorConnector;
use xlaunch::error::EXIT_SUCCESS;
use xlaunch::fs::MountedFs;
use xlaunch::host::{GatewayTransport, RmClient, RmError};
use xlaunch::signal::SignalHandler;
use xlaunch::validate::ResourceValidator;
use xlaunch::{ControllerSettings, EffectiveConfig, JobSpec, LaunchResult, SubmissionController};
use xlaunch_protocol::ops::ClusterCapability;

#[derive(Parser)]
#[command(name = "xlaunch")]
#[command(about = "Submit and supervise distributed training jobs", version)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Do not print the welcome banner
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage a job, submit it and follow it to completion
    Submit {
        #[command(flatten)]
        job: JobArgs,
    },

    /// Check resource asks against a cluster capability, without contacting the cluster
    Validate {
        #[command(flatten)]
        job: JobArgs,

        /// Maximum memory per container in MB
        #[arg(long)]
        max_memory: i64,

        /// Maximum virtual cores per container
        #[arg(long)]
        max_vcores: i64,
    },
}

#[derive(Args, Debug, Default)]
struct JobArgs {
    /// User config file (default: ~/.config/xlaunch/xlaunch.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Configuration override, key=value (repeatable)
    #[arg(long = "conf", value_name = "KEY=VALUE")]
    conf: Vec<String>,

    /// Application name
    #[arg(long)]
    app_name: Option<String>,

    /// Framework: TENSORFLOW, MXNET, CAFFE, THEANO, PYTORCH, KERAS,
    /// DISTXGBOOST, DISTLIGHTGBM, LIGHTLDA, XFLOW
    #[arg(long)]
    app_type: Option<String>,

    /// Application package (jar) containing the coordinator
    #[arg(long)]
    jar: Option<PathBuf>,

    /// Command the containers run
    #[arg(long)]
    launch_cmd: Option<String>,

    #[arg(long)]
    priority: Option<i64>,

    #[arg(long)]
    queue: Option<String>,

    /// Coordinator memory in MB
    #[arg(long)]
    am_memory: Option<i64>,

    /// Coordinator virtual cores
    #[arg(long)]
    am_cores: Option<i64>,

    #[arg(long)]
    worker_memory: Option<i64>,

    #[arg(long)]
    worker_cores: Option<i64>,

    #[arg(long)]
    worker_num: Option<i64>,

    #[arg(long)]
    ps_memory: Option<i64>,

    #[arg(long)]
    ps_cores: Option<i64>,

    #[arg(long)]
    ps_num: Option<i64>,

    /// Put user jars ahead of the platform classpath
    #[arg(long)]
    user_classpath_first: Option<bool>,

    /// Local files shipped with the job (comma-separated)
    #[arg(long, value_delimiter = ',')]
    files: Vec<String>,

    /// Library jars, local or already on the shared store (comma-separated)
    #[arg(long, value_delimiter = ',')]
    libjars: Vec<String>,

    /// Distributed cache file, remotePath[#alias] (repeatable)
    #[arg(long)]
    cache_file: Vec<String>,

    /// Distributed cache archive, remotePath[#alias] (repeatable)
    #[arg(long)]
    cache_archive: Vec<String>,

    /// Input, remotePath[,remotePath...][#alias] (repeatable)
    #[arg(long)]
    input: Vec<String>,

    /// Output, remotePath[#alias] (repeatable)
    #[arg(long)]
    output: Vec<String>,

    /// PATH override for the containers
    #[arg(long)]
    user_path: Option<String>,
}

impl JobArgs {
    /// Command-line layer of the configuration; only given flags appear.
    fn to_value(&self) -> Value {
        let mut root = json!({});
        let mut put = |path: &str, value: Option<Value>| {
            if let Some(value) = value {
                set_path(&mut root, path, value);
            }
        };
        let list = |items: &[String]| (!items.is_empty()).then(|| json!(items));

        put("app.name", self.app_name.as_ref().map(|v| json!(v)));
        put("app.type", self.app_type.as_ref().map(|v| json!(v.to_uppercase())));
        put("app.priority", self.priority.map(|v| json!(v)));
        put("app.queue", self.queue.as_ref().map(|v| json!(v)));
        put("app.user_classpath_first", self.user_classpath_first.map(|v| json!(v)));
        put("coordinator.memory_mb", self.am_memory.map(|v| json!(v)));
        put("coordinator.vcores", self.am_cores.map(|v| json!(v)));
        put("worker.memory_mb", self.worker_memory.map(|v| json!(v)));
        put("worker.vcores", self.worker_cores.map(|v| json!(v)));
        put("worker.num", self.worker_num.map(|v| json!(v)));
        put("ps.memory_mb", self.ps_memory.map(|v| json!(v)));
        put("ps.vcores", self.ps_cores.map(|v| json!(v)));
        put("ps.num", self.ps_num.map(|v| json!(v)));
        put("job.jar", self.jar.as_ref().map(|v| json!(v.to_string_lossy())));
        put("job.exec_cmd", self.launch_cmd.as_ref().map(|v| json!(v)));
        put("job.files", list(&self.files));
        put("job.libjars", list(&self.libjars));
        put("job.cache_files", list(&self.cache_file));
        put("job.cache_archives", list(&self.cache_archive));
        put("job.inputs", list(&self.input));
        put("job.outputs", list(&self.output));
        put("job.user_path", self.user_path.as_ref().map(|v| json!(v)));

        root
    }

    fn load_config(&self) -> LaunchResult<EffectiveConfig> {
        let user_config = self.config.clone().or_else(default_user_config_path);
        let overrides = if self.conf.is_empty() {
            None
        } else {
            Some(parse_overrides(&self.conf)?)
        };
        Ok(EffectiveConfig::build(
            user_config.as_deref(),
            overrides,
            Some(self.to_value()),
        )?)
    }
}

const BANNER: &str = "\
==================================================
  xlaunch: distributed training job launcher
==================================================";

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "xlaunch=debug" } else { "xlaunch=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if !cli.quiet {
        eprintln!("{}", BANNER);
        eprintln!("  version {}\n", env!("CARGO_PKG_VERSION"));
    }

    let result = match cli.command {
        Commands::Submit { job } => run_submit(&job),
        Commands::Validate {
            job,
            max_memory,
            max_vcores,
        } => run_validate(&job, max_memory, max_vcores),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("{}", e);
            process::exit(e.exit_code());
        }
    }
}

fn run_submit(job: &JobArgs) -> LaunchResult<i32> {
    let handler = SignalHandler::new();
    if let Err(e) = handler.install() {
        warn!("Cannot install the interrupt handler: {}", e);
    }

    let mut config = job.load_config()?;
    let submitter = std::env::var("USER").ok();
    let spec = JobSpec::from_config(&mut config, submitter.as_deref())?;
    let settings = ControllerSettings::from_config(&config)?;

    let gateway = config.get_str_list("cluster.gateway");
    let transport = GatewayTransport::new(&gateway).map_err(RmError::from)?;
    let rm = RmClient::new(Arc::new(transport));

    let fs_root = config.get_str("fs.root").unwrap_or("/");
    let fs_default = config.get_str("fs.default").unwrap_or("");
    let fs = MountedFs::new(fs_root, fs_default);

    let timeout = config.get_u64("coordinator.timeout_ms").unwrap_or(5000);
    let connector = TcpCoordinatorConnector::new(Duration::from_millis(timeout));

    let mut controller =
        SubmissionController::new(&rm, &fs, &connector, settings).with_signal_state(handler.state());
    let outcome = controller.submit(&spec, &config)?;

    info!(
        "Application {} ended with exit code {}",
        outcome.application_id,
        outcome.exit_code()
    );
    Ok(outcome.exit_code())
}

fn run_validate(job: &JobArgs, max_memory: i64, max_vcores: i64) -> LaunchResult<i32> {
    let mut config = job.load_config()?;
    if config.get_str("job.jar").map_or(true, str::is_empty) {
        // The package is never read when validating
        config.set("job.jar", "-");
    }
    let submitter = std::env::var("USER").ok();
    let spec = JobSpec::from_config(&mut config, submitter.as_deref())?;

    let capability = ClusterCapability {
        max_memory_mb: max_memory,
        max_vcores,
        node_manager_count: 0,
    };
    ResourceValidator::new(&capability).validate(&spec)?;

    println!("Job {} ({}) fits the given capability", spec.app_name, spec.app_type.as_str());
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_submit() {
        let cli = Cli::try_parse_from([
            "xlaunch",
            "submit",
            "--app-type",
            "tensorflow",
            "--jar",
            "am.jar",
            "--worker-num",
            "4",
            "--files",
            "a.py,b.py",
            "--input",
            "/data/a#train",
            "--conf",
            "board.enable=false",
        ])
        .unwrap();

        let Commands::Submit { job } = cli.command else {
            panic!("expected submit");
        };
        assert_eq!(job.files, vec!["a.py", "b.py"]);
        assert_eq!(job.conf, vec!["board.enable=false"]);

        let value = job.to_value();
        assert_eq!(value["app"]["type"], "TENSORFLOW");
        assert_eq!(value["worker"]["num"], 4);
        assert_eq!(value["job"]["inputs"][0], "/data/a#train");
        assert!(value["job"].get("outputs").is_none());
        assert!(value.get("ps").is_none());
    }

    #[test]
    fn test_cli_parses_validate() {
        let cli = Cli::try_parse_from([
            "xlaunch",
            "-q",
            "validate",
            "--max-memory",
            "8192",
            "--max-vcores",
            "8",
        ])
        .unwrap();
        assert!(cli.quiet);
        assert!(matches!(
            cli.command,
            Commands::Validate {
                max_memory: 8192,
                max_vcores: 8,
                ..
            }
        ));
    }

    #[test]
    fn test_empty_args_add_nothing() {
        assert_eq!(JobArgs::default().to_value(), json!({}));
    }
}
