//! Failure Injection for the Mock Cluster
//!
//! Supports configurable failure injection for testing error paths.

use std::collections::HashMap;
use std::time::Duration;

use xlaunch_protocol::ErrorCode;

/// Failure configuration for an operation
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Error to return (if any)
    pub error: Option<(ErrorCode, String)>,
    /// Delay to add before responding
    pub delay: Option<Duration>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Create a config that returns an error
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: Some((code, message.into())),
            delay: None,
            fail_count: None,
        }
    }

    /// Create a config that just adds delay
    pub fn delay(duration: Duration) -> Self {
        Self {
            error: None,
            delay: Some(duration),
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Failure injector keyed by operation name
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<String, FailureConfig>,
    call_counts: HashMap<String, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for an operation
    pub fn inject(&mut self, op: impl Into<String>, config: FailureConfig) {
        let op = op.into();
        self.configs.insert(op.clone(), config);
        self.call_counts.insert(op, 0);
    }

    pub fn inject_error(&mut self, op: impl Into<String>, code: ErrorCode, message: impl Into<String>) {
        self.inject(op, FailureConfig::error(code, message));
    }

    /// Clear all failure injections
    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    pub fn clear_op(&mut self, op: &str) {
        self.configs.remove(op);
        self.call_counts.remove(op);
    }

    /// Count a call to `op` and return the failure to apply, if any.
    pub fn check(&mut self, op: &str) -> Option<FailureConfig> {
        let config = self.configs.get(op)?;
        let count = self.call_counts.entry(op.to_string()).or_insert(0);
        *count += 1;

        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return None; // Exceeded fail count, succeed now
            }
        }

        Some(config.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_injector_basic() {
        let mut injector = FailureInjector::new();

        assert!(injector.check("create_application").is_none());

        injector.inject_error("submit_application", ErrorCode::SubmissionRejected, "queue full");

        let config = injector.check("submit_application").unwrap();
        assert_eq!(
            config.error,
            Some((ErrorCode::SubmissionRejected, "queue full".to_string()))
        );
    }

    #[test]
    fn test_failure_injector_fail_count() {
        let mut injector = FailureInjector::new();

        // Fail twice, then succeed
        injector.inject(
            "get_application_report",
            FailureConfig::error(ErrorCode::InvalidRequest, "flaky").with_fail_count(2),
        );

        assert!(injector.check("get_application_report").is_some());
        assert!(injector.check("get_application_report").is_some());
        assert!(injector.check("get_application_report").is_none());
    }

    #[test]
    fn test_failure_injector_clear() {
        let mut injector = FailureInjector::new();

        injector.inject_error("submit_application", ErrorCode::InvalidRequest, "msg");
        injector.inject("create_application", FailureConfig::delay(Duration::from_millis(1)));
        assert!(injector.check("submit_application").is_some());

        injector.clear_op("submit_application");
        assert!(injector.check("submit_application").is_none());
        assert!(injector.check("create_application").is_some());

        injector.clear();
        assert!(injector.check("create_application").is_none());
    }
}
