//! Coordinator launch context
//!
//! Assembles the environment, command line and local resources for the
//! coordinator container from the job spec and what staging produced.

use std::collections::BTreeMap;

use tracing::info;
use xlaunch_protocol::ops::{ClusterCapability, ContainerLaunchContext, Resource, SubmissionContext};
use xlaunch_protocol::ApplicationId;

use crate::error::{LaunchError, LaunchResult};
use crate::job::JobSpec;
use crate::paths::PathMapping;
use crate::staging::StagedArtifacts;

/// Environment variable names read by the coordinator.
pub mod env {
    pub const APP_TYPE: &str = "XL_APP_TYPE";
    pub const FILES_LOCATION: &str = "XL_FILES_LOCATION";
    pub const LIBJARS_LOCATION: &str = "XL_LIBJARS_LOCATION";
    pub const CLASSPATH: &str = "CLASSPATH";
    pub const STAGING_LOCATION: &str = "XL_STAGING_LOCATION";
    pub const APP_JAR_LOCATION: &str = "XL_APP_JAR_LOCATION";
    pub const JOB_CONF_LOCATION: &str = "XL_JOB_CONF_LOCATION";
    pub const EXEC_CMD: &str = "XL_EXEC_CMD";
    pub const CACHE_FILE_LOCATION: &str = "XL_CACHE_FILE_LOCATION";
    pub const CACHE_ARCHIVE_LOCATION: &str = "XL_CACHE_ARCHIVE_LOCATION";
    pub const INPUTS: &str = "XL_INPUTS";
    pub const OUTPUTS: &str = "XL_OUTPUTS";
    pub const CONTAINER_MAX_MEMORY: &str = "XL_CONTAINER_MAX_MEMORY";
    pub const USER_PATH: &str = "XL_USER_PATH";
}

/// Expanded by the node manager to the container's log directory.
pub const LOG_DIR_EXPANSION_VAR: &str = "<LOG_DIR>";

/// Expanded by the node manager to the container's Java home.
pub const JAVA_HOME_EXPANSION_VAR: &str = "{{JAVA_HOME}}";

/// Classpath seen by the coordinator.
///
/// `${CLASSPATH}:./*` plus the platform entries, with the user's jar names
/// either in front or at the end.
pub fn build_classpath(platform: &[String], jar_names: &[String], user_first: bool) -> String {
    let mut base = String::from("${CLASSPATH}:./*");
    for entry in platform {
        base.push(':');
        base.push_str(entry.trim());
    }

    if jar_names.is_empty() {
        return base;
    }
    let jars = jar_names.join(":");
    if user_first {
        format!("{}:{}", jars, base)
    } else {
        format!("{}:{}", base, jars)
    }
}

/// The single command line starting the coordinator.
pub fn build_command(memory_mb: i64, main_class: &str) -> String {
    format!(
        "{java}/bin/java -Xms{mem}m -Xmx{mem}m {class} 1>{log}/stdout 2>{log}/stderr",
        java = JAVA_HOME_EXPANSION_VAR,
        mem = memory_mb,
        class = main_class,
        log = LOG_DIR_EXPANSION_VAR,
    )
}

pub struct LaunchContextBuilder<'a> {
    spec: &'a JobSpec,
    capability: &'a ClusterCapability,
    staged: &'a StagedArtifacts,
    inputs: &'a PathMapping,
    outputs: &'a PathMapping,
}

impl<'a> LaunchContextBuilder<'a> {
    pub fn new(
        spec: &'a JobSpec,
        capability: &'a ClusterCapability,
        staged: &'a StagedArtifacts,
        inputs: &'a PathMapping,
        outputs: &'a PathMapping,
    ) -> Self {
        Self {
            spec,
            capability,
            staged,
            inputs,
            outputs,
        }
    }

    /// Coordinator environment.
    ///
    /// Fails with `InvalidArgument` when the job has no launch command.
    pub fn environment(&self) -> LaunchResult<BTreeMap<String, String>> {
        info!("Building environments for the coordinator");
        let spec = self.spec;
        let mut vars = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            vars.insert(key.to_string(), value);
        };

        put(env::APP_TYPE, spec.app_type.as_str().to_string());

        if !self.staged.files.is_empty() {
            put(env::FILES_LOCATION, self.staged.files.join(","));
        }
        if !self.staged.lib_jars.is_empty() {
            put(env::LIBJARS_LOCATION, self.staged.lib_jars.join(","));
        }
        put(
            env::CLASSPATH,
            build_classpath(
                &spec.platform_classpath,
                &self.staged.lib_jar_names,
                spec.user_classpath_first,
            ),
        );
        put(env::STAGING_LOCATION, self.staged.staging_dir.to_string());
        put(env::APP_JAR_LOCATION, self.staged.app_jar.to_string());
        put(env::JOB_CONF_LOCATION, self.staged.job_conf.to_string());

        match spec.launch_cmd.as_deref().map(str::trim) {
            Some(cmd) if !cmd.is_empty() => put(env::EXEC_CMD, cmd.to_string()),
            _ => {
                return Err(LaunchError::InvalidArgument(
                    "invalid launch cmd for the application".to_string(),
                ))
            }
        }

        if !spec.cache_files.is_empty() {
            put(env::CACHE_FILE_LOCATION, spec.cache_files.join(","));
        }
        if !spec.cache_archives.is_empty() {
            put(env::CACHE_ARCHIVE_LOCATION, spec.cache_archives.join(","));
        }
        if !self.inputs.is_empty() {
            put(env::INPUTS, self.inputs.to_input_env());
        }
        if !self.outputs.is_empty() {
            put(env::OUTPUTS, self.outputs.to_output_env());
        }
        put(env::CONTAINER_MAX_MEMORY, self.capability.max_memory_mb.to_string());
        if let Some(path) = spec.user_path.as_deref().filter(|p| !p.is_empty()) {
            put(env::USER_PATH, path.to_string());
        }

        Ok(vars)
    }

    pub fn build(&self) -> LaunchResult<ContainerLaunchContext> {
        let environment = self.environment()?;

        info!("Building coordinator launch command");
        let command = build_command(self.spec.coordinator.memory_mb, &self.spec.main_class);
        info!("Coordinator launch command: {}", command);

        Ok(ContainerLaunchContext {
            local_resources: self.staged.manifest.to_local_resources(),
            environment,
            commands: vec![command],
        })
    }
}

/// Submission context for the resource manager.
pub fn submission_context(
    app_id: &ApplicationId,
    spec: &JobSpec,
    am_container: ContainerLaunchContext,
) -> SubmissionContext {
    SubmissionContext {
        application_id: app_id.clone(),
        name: spec.app_name.clone(),
        application_type: spec.app_type.as_str().to_string(),
        queue: spec.queue.clone(),
        priority: spec.priority,
        resource: Resource {
            memory_mb: spec.coordinator.memory_mb,
            vcores: spec.coordinator.vcores,
        },
        am_container,
    }
}
