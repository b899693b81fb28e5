//! Resource validation against live cluster capacity
//!
//! Checks run in two passes over every role: lower bounds first
//! (`InvalidArgument`), then cluster maxima (`ResourceLimitExceeded`), then
//! the node limit for multi-role frameworks. A malformed ask therefore
//! always reports `InvalidArgument`, whatever else is wrong with the job.

use tracing::info;
use xlaunch_protocol::ops::ClusterCapability;

use crate::error::{LaunchError, LaunchResult};
use crate::job::{JobSpec, ResourceAsk, Role};

pub struct ResourceValidator<'a> {
    capability: &'a ClusterCapability,
}

impl<'a> ResourceValidator<'a> {
    pub fn new(capability: &'a ClusterCapability) -> Self {
        Self { capability }
    }

    /// Validate every role of `spec`. Stops at the first violation.
    pub fn validate(&self, spec: &JobSpec) -> LaunchResult<()> {
        info!("Max mem capability of resources in this cluster {}", self.capability.max_memory_mb);
        info!("Max vcores capability of resources in this cluster {}", self.capability.max_vcores);

        let checked = Self::checked_roles(spec);

        for (role, ask, resources) in &checked {
            Self::check_lower_bounds(*role, ask, *resources)?;
        }

        for (role, ask, resources) in &checked {
            self.check_upper_bounds(*role, ask, *resources)?;
        }

        if spec.app_type.has_parameter_servers() {
            let total = spec.worker.count + spec.ps.count;
            if total > spec.node_limit {
                return Err(LaunchError::ResourceLimitExceeded(format!(
                    "container num requested {} over the limit {}",
                    total, spec.node_limit
                )));
            }
        }

        Ok(())
    }

    /// Roles with a flag saying whether memory/vcores apply. Parameter
    /// servers in single-process mode only have their count checked.
    fn checked_roles(spec: &JobSpec) -> Vec<(Role, ResourceAsk, bool)> {
        spec.roles()
            .into_iter()
            .map(|(role, ask)| {
                let resources = !(role == Role::ParameterServer && spec.is_single_mode());
                (role, ask, resources)
            })
            .collect()
    }

    fn check_lower_bounds(role: Role, ask: &ResourceAsk, resources: bool) -> LaunchResult<()> {
        if ask.count < role.min_count() {
            return Err(LaunchError::InvalidArgument(format!(
                "invalid no. of {} specified: {}",
                role, ask.count
            )));
        }
        if !resources {
            return Ok(());
        }
        if ask.memory_mb <= 0 {
            return Err(LaunchError::InvalidArgument(format!(
                "invalid memory specified for {}: {}",
                role, ask.memory_mb
            )));
        }
        if ask.vcores <= 0 {
            return Err(LaunchError::InvalidArgument(format!(
                "invalid vcores specified for {}: {}",
                role, ask.vcores
            )));
        }
        Ok(())
    }

    fn check_upper_bounds(&self, role: Role, ask: &ResourceAsk, resources: bool) -> LaunchResult<()> {
        if role != Role::Coordinator {
            info!("Apply for {} number {}", role, ask.count);
        }
        if !resources {
            return Ok(());
        }
        if ask.memory_mb > self.capability.max_memory_mb {
            return Err(LaunchError::ResourceLimitExceeded(format!(
                "{} memory requested {} above the max threshold of the cluster {}",
                role, ask.memory_mb, self.capability.max_memory_mb
            )));
        }
        info!("Apply for {} memory {}M", role, ask.memory_mb);

        if ask.vcores > self.capability.max_vcores {
            return Err(LaunchError::ResourceLimitExceeded(format!(
                "{} vcores requested {} above the max threshold of the cluster {}",
                role, ask.vcores, self.capability.max_vcores
            )));
        }
        info!("Apply for {} vcores {}", role, ask.vcores);
        Ok(())
    }
}
