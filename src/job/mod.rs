//! JobSpec: the validated description of one training job
//!
//! A JobSpec is resolved once from the effective configuration and is
//! immutable afterwards. Resolution also normalizes a few derived settings
//! back into the configuration (queue fallback, single-process mode, board
//! settings) so the persisted `job.json` matches what the job will see.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{BuiltinDefaults, EffectiveConfig};
use crate::error::{LaunchError, LaunchResult};
use crate::fs::RemotePath;

/// Framework the job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppType {
    Tensorflow,
    Mxnet,
    Caffe,
    Theano,
    Pytorch,
    Keras,
    Distxgboost,
    Distlightgbm,
    Lightlda,
    Xflow,
}

impl AppType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppType::Tensorflow => "TENSORFLOW",
            AppType::Mxnet => "MXNET",
            AppType::Caffe => "CAFFE",
            AppType::Theano => "THEANO",
            AppType::Pytorch => "PYTORCH",
            AppType::Keras => "KERAS",
            AppType::Distxgboost => "DISTXGBOOST",
            AppType::Distlightgbm => "DISTLIGHTGBM",
            AppType::Lightlda => "LIGHTLDA",
            AppType::Xflow => "XFLOW",
        }
    }

    /// Frameworks with a parameter-server role.
    pub fn has_parameter_servers(&self) -> bool {
        matches!(self, AppType::Tensorflow | AppType::Mxnet)
    }

    /// Config key recording single-process mode, for frameworks that have one.
    pub fn single_mode_key(&self) -> Option<&'static str> {
        match self {
            AppType::Tensorflow => Some("tf.mode.single"),
            AppType::Mxnet => Some("mxnet.mode.single"),
            _ => None,
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AppType {
    type Err = LaunchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TENSORFLOW" => Ok(AppType::Tensorflow),
            "MXNET" => Ok(AppType::Mxnet),
            "CAFFE" => Ok(AppType::Caffe),
            "THEANO" => Ok(AppType::Theano),
            "PYTORCH" => Ok(AppType::Pytorch),
            "KERAS" => Ok(AppType::Keras),
            "DISTXGBOOST" => Ok(AppType::Distxgboost),
            "DISTLIGHTGBM" => Ok(AppType::Distlightgbm),
            "LIGHTLDA" => Ok(AppType::Lightlda),
            "XFLOW" => Ok(AppType::Xflow),
            _ => Err(LaunchError::InvalidArgument(format!(
                "unknown application type '{}'",
                s
            ))),
        }
    }
}

/// Job role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Coordinator,
    Worker,
    ParameterServer,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Coordinator => "coordinator",
            Role::Worker => "worker",
            Role::ParameterServer => "ps",
        }
    }

    /// Smallest legal instance count.
    pub fn min_count(&self) -> i64 {
        match self {
            Role::Coordinator | Role::Worker => 1,
            Role::ParameterServer => 0,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Requested resources for one role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAsk {
    pub memory_mb: i64,
    pub vcores: i64,
    pub count: i64,
}

impl ResourceAsk {
    pub fn new(memory_mb: i64, vcores: i64, count: i64) -> Self {
        Self {
            memory_mb,
            vcores,
            count,
        }
    }
}

/// Immutable description of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub app_name: String,
    pub app_type: AppType,
    pub coordinator: ResourceAsk,
    pub worker: ResourceAsk,
    pub ps: ResourceAsk,
    pub priority: i32,
    pub queue: String,
    pub user_classpath_first: bool,
    /// Command the coordinator runs in every worker container.
    pub launch_cmd: Option<String>,
    /// Local path of the coordinator package.
    pub app_jar: PathBuf,
    pub main_class: String,
    /// Local user files shipped with the job.
    pub files: Vec<PathBuf>,
    /// Library jars, local paths or remote locations.
    pub lib_jars: Vec<String>,
    /// Cache file specifiers, each possibly comma-separated.
    pub cache_files: Vec<String>,
    pub cache_archives: Vec<String>,
    /// Input entries, `remote[,remote...][#alias]`.
    pub inputs: Vec<String>,
    /// Output entries, `remote[#alias]`.
    pub outputs: Vec<String>,
    pub user_path: Option<String>,
    pub node_limit: i64,
    pub single_mode: bool,
    pub input_alias: String,
    pub output_alias: String,
    pub platform_classpath: Vec<String>,
}

impl JobSpec {
    pub fn builder(app_type: AppType, app_jar: impl Into<PathBuf>) -> JobSpecBuilder {
        JobSpecBuilder::new(app_type, app_jar)
    }

    /// Resolve a JobSpec from the effective configuration.
    ///
    /// `submitter` replaces an empty queue name. Derived settings are
    /// written back into `config`.
    pub fn from_config(config: &mut EffectiveConfig, submitter: Option<&str>) -> LaunchResult<Self> {
        let app_type: AppType = required_str(config, "app.type")?.parse()?;

        let app_jar = config
            .get_str("job.jar")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                LaunchError::InvalidArgument("no application package given (job.jar)".to_string())
            })?;

        let mut queue = config.get_str("app.queue").unwrap_or("").trim().to_string();
        if queue.is_empty() {
            queue = submitter.unwrap_or("default").to_string();
            info!("No queue given, submitting to the user queue {}", queue);
        }
        config.set("app.queue", queue.clone());

        let ps = ResourceAsk::new(
            int(config, "ps.memory_mb")?,
            int(config, "ps.vcores")?,
            int(config, "ps.num")?,
        );

        let mut single_mode = false;
        if let Some(key) = app_type.single_mode_key() {
            single_mode = config.get_bool(key).unwrap_or(false) || ps.count == 0;
            config.set(key, single_mode);
        }

        let worker = ResourceAsk::new(
            int(config, "worker.memory_mb")?,
            int(config, "worker.vcores")?,
            int(config, "worker.num")?,
        );
        if worker.count == 1 {
            config.set("board.worker_index", 0);
        }

        normalize_board_log_dir(config, app_type);

        let priority = int(config, "app.priority")?;
        let priority = i32::try_from(priority).map_err(|_| {
            LaunchError::InvalidArgument(format!("priority {} out of range", priority))
        })?;

        let spec = JobSpecBuilder::new(app_type, app_jar)
            .app_name(config.get_str("app.name").unwrap_or("xlaunch"))
            .coordinator(ResourceAsk::new(
                int(config, "coordinator.memory_mb")?,
                int(config, "coordinator.vcores")?,
                1,
            ))
            .worker(worker)
            .ps(ps)
            .single_mode(single_mode)
            .priority(priority)
            .queue(queue)
            .user_classpath_first(config.get_bool("app.user_classpath_first").unwrap_or(true))
            .launch_cmd(config.get_str("job.exec_cmd").filter(|s| !s.trim().is_empty()))
            .main_class(required_str(config, "coordinator.main_class")?)
            .files(config.get_str_list("job.files").into_iter().map(PathBuf::from).collect())
            .lib_jars(config.get_str_list("job.libjars"))
            .cache_files(config.get_str_list("job.cache_files"))
            .cache_archives(config.get_str_list("job.cache_archives"))
            .inputs(config.get_str_list("job.inputs"))
            .outputs(config.get_str_list("job.outputs"))
            .user_path(config.get_str("job.user_path").filter(|s| !s.is_empty()))
            .node_limit(int(config, "cluster.node_limit")?)
            .input_alias(required_str(config, "io.input_alias")?)
            .output_alias(required_str(config, "io.output_alias")?)
            .platform_classpath(config.get_str_list("cluster.platform_classpath"))
            .build();

        Ok(spec)
    }

    /// Whether the parameter-server role is inactive.
    pub fn is_single_mode(&self) -> bool {
        self.app_type.has_parameter_servers() && self.single_mode
    }

    /// Whether user files are registered as per-container local resources.
    pub fn materializes_user_files(&self) -> bool {
        self.app_type == AppType::Mxnet && !self.is_single_mode()
    }

    /// Whether cache entries are registered as per-container local resources.
    pub fn materializes_cache(&self) -> bool {
        (self.app_type == AppType::Mxnet && !self.is_single_mode())
            || self.app_type == AppType::Distxgboost
    }

    /// Roles whose resources are checked, in validation order.
    ///
    /// Parameter servers are listed only for multi-role frameworks; in
    /// single-process mode only their count is meaningful.
    pub fn roles(&self) -> Vec<(Role, ResourceAsk)> {
        let mut roles = vec![(Role::Coordinator, self.coordinator), (Role::Worker, self.worker)];
        if self.app_type.has_parameter_servers() {
            roles.push((Role::ParameterServer, self.ps));
        }
        roles
    }
}

/// Qualify an absolute board log dir against the default store and warn when
/// a non-TensorFlow board is pointed at distributed storage.
fn normalize_board_log_dir(config: &mut EffectiveConfig, app_type: AppType) {
    let Some(log_dir) = config.get_str("board.log_dir").map(str::to_string) else {
        return;
    };
    let mut resolved = RemotePath::parse(&log_dir);
    if log_dir.starts_with('/') {
        if let Some(default_fs) = config.get_str("fs.default") {
            resolved = resolved.qualify(default_fs);
            config.set("board.log_dir", resolved.to_string());
        }
    }
    if resolved.is_remote() && app_type != AppType::Tensorflow {
        warn!(
            "Board log dir {} is on distributed storage, which {} boards may not read",
            resolved,
            app_type
        );
    }
}

fn int(config: &EffectiveConfig, path: &str) -> LaunchResult<i64> {
    config
        .get_i64(path)
        .ok_or_else(|| LaunchError::InvalidArgument(format!("{} must be an integer", path)))
}

fn required_str(config: &EffectiveConfig, path: &str) -> LaunchResult<String> {
    config
        .get_str(path)
        .map(str::to_string)
        .ok_or_else(|| LaunchError::InvalidArgument(format!("{} must be a string", path)))
}

/// Builder for [`JobSpec`], seeded with the built-in defaults.
#[derive(Debug, Clone)]
pub struct JobSpecBuilder {
    spec: JobSpec,
    single_mode: Option<bool>,
}

impl JobSpecBuilder {
    pub fn new(app_type: AppType, app_jar: impl Into<PathBuf>) -> Self {
        let d = BuiltinDefaults::default();
        Self {
            spec: JobSpec {
                app_name: d.app_name,
                app_type,
                coordinator: ResourceAsk::new(d.coordinator_memory_mb, d.coordinator_vcores, 1),
                worker: ResourceAsk::new(d.worker_memory_mb, d.worker_vcores, d.worker_num),
                ps: ResourceAsk::new(d.ps_memory_mb, d.ps_vcores, d.ps_num),
                priority: d.priority as i32,
                queue: d.queue,
                user_classpath_first: d.user_classpath_first,
                launch_cmd: None,
                app_jar: app_jar.into(),
                main_class: d.main_class,
                files: Vec::new(),
                lib_jars: Vec::new(),
                cache_files: Vec::new(),
                cache_archives: Vec::new(),
                inputs: Vec::new(),
                outputs: Vec::new(),
                user_path: None,
                node_limit: d.node_limit,
                single_mode: false,
                input_alias: d.input_alias,
                output_alias: d.output_alias,
                platform_classpath: d.platform_classpath,
            },
            single_mode: None,
        }
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.spec.app_name = name.into();
        self
    }

    pub fn coordinator(mut self, ask: ResourceAsk) -> Self {
        self.spec.coordinator = ask;
        self
    }

    pub fn worker(mut self, ask: ResourceAsk) -> Self {
        self.spec.worker = ask;
        self
    }

    pub fn ps(mut self, ask: ResourceAsk) -> Self {
        self.spec.ps = ask;
        self
    }

    /// Force single-process mode on or off. When unset it follows the
    /// parameter-server count.
    pub fn single_mode(mut self, single: bool) -> Self {
        self.single_mode = Some(single);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.spec.priority = priority;
        self
    }

    pub fn queue(mut self, queue: impl Into<String>) -> Self {
        self.spec.queue = queue.into();
        self
    }

    pub fn user_classpath_first(mut self, first: bool) -> Self {
        self.spec.user_classpath_first = first;
        self
    }

    pub fn launch_cmd<S: Into<String>>(mut self, cmd: Option<S>) -> Self {
        self.spec.launch_cmd = cmd.map(Into::into);
        self
    }

    pub fn main_class(mut self, class: impl Into<String>) -> Self {
        self.spec.main_class = class.into();
        self
    }

    pub fn files(mut self, files: Vec<PathBuf>) -> Self {
        self.spec.files = files;
        self
    }

    pub fn lib_jars(mut self, jars: Vec<String>) -> Self {
        self.spec.lib_jars = jars;
        self
    }

    pub fn cache_files(mut self, specs: Vec<String>) -> Self {
        self.spec.cache_files = specs;
        self
    }

    pub fn cache_archives(mut self, specs: Vec<String>) -> Self {
        self.spec.cache_archives = specs;
        self
    }

    pub fn inputs(mut self, inputs: Vec<String>) -> Self {
        self.spec.inputs = inputs;
        self
    }

    pub fn outputs(mut self, outputs: Vec<String>) -> Self {
        self.spec.outputs = outputs;
        self
    }

    pub fn user_path<S: Into<String>>(mut self, path: Option<S>) -> Self {
        self.spec.user_path = path.map(Into::into);
        self
    }

    pub fn node_limit(mut self, limit: i64) -> Self {
        self.spec.node_limit = limit;
        self
    }

    pub fn input_alias(mut self, alias: impl Into<String>) -> Self {
        self.spec.input_alias = alias.into();
        self
    }

    pub fn output_alias(mut self, alias: impl Into<String>) -> Self {
        self.spec.output_alias = alias.into();
        self
    }

    pub fn platform_classpath(mut self, entries: Vec<String>) -> Self {
        self.spec.platform_classpath = entries;
        self
    }

    pub fn build(mut self) -> JobSpec {
        self.spec.single_mode = self.spec.app_type.has_parameter_servers()
            && self.single_mode.unwrap_or(self.spec.ps.count == 0);
        self.spec
    }
}
