//! SchedulerBuilder - wiring and startup validation.
//!
//! Operations are registered up front; `expect_operations` lists the names
//! the caller will submit, and `build` fails fast if any are missing.

use std::sync::Arc;

use super::scheduler::{BatchScheduler, SchedulerParts};
use crate::config::SchedulerConfig;
use crate::error::BatchError;
use crate::impls::OperationRegistry;
use crate::ports::{Clock, IdGenerator, ItemOperation, SystemClock, UlidGenerator};

/// ```ignore
/// let scheduler = SchedulerBuilder::new()
///     .config(config)
///     .register("narrate", narrate)?
///     .expect_operations(&["narrate"])
///     .build()?;
/// ```
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    registry: OperationRegistry,
    expected: Option<Vec<String>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing operations: {0:?}; they were expected but never registered")]
    MissingOperations(Vec<String>),

    #[error("invalid scheduler config: {0}")]
    InvalidConfig(BatchError),
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            clock: None,
            ids: None,
            registry: OperationRegistry::new(),
            expected: None,
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Defaults to ULIDs stamped with the configured clock.
    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        operation: Arc<dyn ItemOperation>,
    ) -> Result<Self, BatchError> {
        self.registry.register(name, operation)?;
        Ok(self)
    }

    pub fn expect_operations(mut self, names: &[&str]) -> Self {
        self.expected = Some(names.iter().map(|name| name.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<BatchScheduler, BuildError> {
        self.config.validate().map_err(BuildError::InvalidConfig)?;
        if let Some(expected) = &self.expected {
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !self.registry.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingOperations(missing));
            }
        }
        Ok(self.assemble())
    }

    fn assemble(self) -> BatchScheduler {
        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        BatchScheduler::from_parts(SchedulerParts {
            config: self.config,
            clock,
            ids,
            registry: self.registry,
        })
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RetryPolicy;
    use crate::error::OperationError;
    use crate::ports::operation_fn;
    use std::time::Duration;

    fn echo() -> Arc<dyn ItemOperation> {
        operation_fn(|id, _| async move { Ok::<_, OperationError>(serde_json::json!(id)) })
    }

    #[test]
    fn build_succeeds_when_expected_operations_are_registered() {
        let scheduler = SchedulerBuilder::new()
            .register("narrate", echo())
            .unwrap()
            .expect_operations(&["narrate"])
            .build()
            .unwrap();
        assert_eq!(scheduler.registry().names(), vec!["narrate".to_string()]);
    }

    #[test]
    fn build_reports_missing_operations() {
        let result = SchedulerBuilder::new()
            .register("narrate", echo())
            .unwrap()
            .expect_operations(&["narrate", "translate", "summarize"])
            .build();

        match result {
            Err(BuildError::MissingOperations(missing)) => {
                assert_eq!(missing, vec!["translate".to_string(), "summarize".to_string()]);
            }
            _ => panic!("expected a missing operations error"),
        }
    }

    #[test]
    fn duplicate_registration_fails() {
        let result = SchedulerBuilder::new()
            .register("narrate", echo())
            .unwrap()
            .register("narrate", echo());
        assert!(matches!(result, Err(BatchError::DuplicateOperation(_))));
    }

    #[test]
    fn build_rejects_a_shrinking_backoff() {
        let config = SchedulerConfig {
            backoff: RetryPolicy::new(Duration::from_secs(2), 0.5),
            ..SchedulerConfig::default()
        };
        let result = SchedulerBuilder::new().config(config).build();

        match result {
            Err(BuildError::InvalidConfig(BatchError::InvalidArgument(msg))) => {
                assert!(msg.contains("multiplier"));
            }
            _ => panic!("expected an invalid config error"),
        }
    }

    #[test]
    fn new_validates_like_build() {
        let config = SchedulerConfig {
            backoff: RetryPolicy::new(Duration::ZERO, 2.0),
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            BatchScheduler::new(config),
            Err(BuildError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_is_carried_through() {
        let config = SchedulerConfig {
            max_batch_size: 5,
            ..SchedulerConfig::default()
        };
        let scheduler = SchedulerBuilder::new().config(config.clone()).build().unwrap();
        assert_eq!(scheduler.config(), &config);
    }
}
