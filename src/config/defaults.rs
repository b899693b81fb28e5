//! Built-in launcher defaults (layer 1)
//!
//! Hardcoded defaults for all configuration values.

use serde::{Deserialize, Serialize};

/// Coordinator entry point inside the application package.
pub const DEFAULT_MAIN_CLASS: &str = "xlaunch.coordinator.ApplicationMaster";

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Application name (default: "xlaunch")
    pub app_name: String,

    /// Framework kind (default: "TENSORFLOW")
    pub app_type: String,

    /// Scheduler priority (default: 3)
    pub priority: i64,

    /// Queue name (default: "default"; empty falls back to the submitter)
    pub queue: String,

    /// Put user jars ahead of the platform classpath (default: true)
    pub user_classpath_first: bool,

    /// Coordinator memory in MB (default: 1024)
    pub coordinator_memory_mb: i64,

    /// Coordinator virtual cores (default: 1)
    pub coordinator_vcores: i64,

    /// Worker memory in MB (default: 1024)
    pub worker_memory_mb: i64,

    /// Worker virtual cores (default: 1)
    pub worker_vcores: i64,

    /// Number of workers (default: 1)
    pub worker_num: i64,

    /// Parameter-server memory in MB (default: 1024)
    pub ps_memory_mb: i64,

    /// Parameter-server virtual cores (default: 1)
    pub ps_vcores: i64,

    /// Number of parameter servers (default: 0)
    pub ps_num: i64,

    /// Upper bound on workers + parameter servers (default: 200)
    pub node_limit: i64,

    /// Status poll interval in milliseconds (default: 10000)
    pub poll_interval_ms: u64,

    /// Coordinator connect/read timeout in milliseconds (default: 5000)
    pub coordinator_timeout_ms: u64,

    /// Staging root on the shared store (default: "/tmp/xlaunch/staging")
    pub staging_dir: String,

    /// Alias for inputs given without one (default: "input")
    pub input_alias: String,

    /// Alias for outputs given without one (default: "output")
    pub output_alias: String,

    /// Coordinator main class
    pub main_class: String,

    /// Platform classpath entries appended after `${CLASSPATH}:./*`
    pub platform_classpath: Vec<String>,

    /// Board (training visualization) log directory (default: "eventLog")
    pub board_log_dir: String,

    /// Shared store default authority (default: "hdfs://localhost:9000")
    pub fs_default: String,

    /// Local mount point of the shared store (default: "/")
    pub fs_root: String,

    /// Gateway command used to reach the resource manager
    pub gateway: Vec<String>,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            app_name: "xlaunch".to_string(),
            app_type: "TENSORFLOW".to_string(),
            priority: 3,
            queue: "default".to_string(),
            user_classpath_first: true,
            coordinator_memory_mb: 1024,
            coordinator_vcores: 1,
            worker_memory_mb: 1024,
            worker_vcores: 1,
            worker_num: 1,
            ps_memory_mb: 1024,
            ps_vcores: 1,
            ps_num: 0,
            node_limit: 200,
            poll_interval_ms: 10_000,
            coordinator_timeout_ms: 5_000,
            staging_dir: "/tmp/xlaunch/staging".to_string(),
            input_alias: "input".to_string(),
            output_alias: "output".to_string(),
            main_class: DEFAULT_MAIN_CLASS.to_string(),
            platform_classpath: vec![
                "$HADOOP_CONF_DIR".to_string(),
                "$HADOOP_COMMON_HOME/share/hadoop/common/*".to_string(),
                "$HADOOP_COMMON_HOME/share/hadoop/common/lib/*".to_string(),
                "$HADOOP_YARN_HOME/share/hadoop/yarn/*".to_string(),
                "$HADOOP_YARN_HOME/share/hadoop/yarn/lib/*".to_string(),
            ],
            board_log_dir: "eventLog".to_string(),
            fs_default: "hdfs://localhost:9000".to_string(),
            fs_root: "/".to_string(),
            gateway: vec!["xlaunch-rm-gateway".to_string()],
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "app": {
                "name": self.app_name,
                "type": self.app_type,
                "priority": self.priority,
                "queue": self.queue,
                "user_classpath_first": self.user_classpath_first
            },
            "coordinator": {
                "memory_mb": self.coordinator_memory_mb,
                "vcores": self.coordinator_vcores,
                "main_class": self.main_class,
                "timeout_ms": self.coordinator_timeout_ms
            },
            "worker": {
                "memory_mb": self.worker_memory_mb,
                "vcores": self.worker_vcores,
                "num": self.worker_num
            },
            "ps": {
                "memory_mb": self.ps_memory_mb,
                "vcores": self.ps_vcores,
                "num": self.ps_num
            },
            "cluster": {
                "node_limit": self.node_limit,
                "gateway": self.gateway,
                "platform_classpath": self.platform_classpath
            },
            "fs": {
                "default": self.fs_default,
                "root": self.fs_root
            },
            "staging": {
                "dir": self.staging_dir
            },
            "monitor": {
                "poll_interval_ms": self.poll_interval_ms
            },
            "io": {
                "input_alias": self.input_alias,
                "output_alias": self.output_alias,
                "input_strategy": "DOWNLOAD",
                "output_strategy": "UPLOAD",
                "input_file_rename": false,
                "stream_shuffle": false,
                "stream_epoch": 1
            },
            "board": {
                "enable": true,
                "worker_index": 0,
                "reload_interval": 1,
                "log_dir": self.board_log_dir,
                "history_dir": "/tmp/xlaunch/board-history",
                "cache_timeout": 20
            },
            "tf": {
                "mode": { "single": false }
            },
            "mxnet": {
                "mode": { "single": false }
            }
        })
    }
}
