//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{BatchOptions, ResolvedOptions, RetryPolicy};
use crate::error::BatchError;

fn default_max_batch_size() -> usize {
    50
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_attempts_limit() -> u32 {
    10
}

fn default_operation_timeout() -> Option<Duration> {
    Some(Duration::from_secs(300))
}

fn default_event_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Largest accepted batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Attempts per item when a batch does not say otherwise.
    #[serde(default = "default_max_attempts")]
    pub default_max_attempts: u32,

    /// Largest per-batch attempts override accepted.
    #[serde(default = "default_max_attempts_limit")]
    pub max_attempts_limit: u32,

    #[serde(default)]
    pub backoff: RetryPolicy,

    /// Per-attempt deadline; `None` disables it.
    #[serde(default = "default_operation_timeout", with = "humantime_serde")]
    pub operation_timeout: Option<Duration>,

    /// Event buffer per subscriber before it starts lagging.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            default_max_attempts: default_max_attempts(),
            max_attempts_limit: default_max_attempts_limit(),
            backoff: RetryPolicy::default(),
            operation_timeout: default_operation_timeout(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl SchedulerConfig {
    /// Check the settings as a whole. Deserialisation only fills defaults;
    /// this is where nonsensical combinations are caught.
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.max_batch_size == 0 {
            return Err(BatchError::InvalidArgument(
                "max_batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_attempts_limit == 0 {
            return Err(BatchError::InvalidArgument(
                "max_attempts_limit must be at least 1".to_string(),
            ));
        }
        if self.default_max_attempts == 0 || self.default_max_attempts > self.max_attempts_limit {
            return Err(BatchError::InvalidArgument(format!(
                "default_max_attempts must be between 1 and {}, got {}",
                self.max_attempts_limit, self.default_max_attempts
            )));
        }
        if self.operation_timeout.is_some_and(|limit| limit.is_zero()) {
            return Err(BatchError::InvalidArgument(
                "operation_timeout must be greater than zero".to_string(),
            ));
        }
        self.backoff.validate().map_err(BatchError::InvalidArgument)
    }

    /// Check the batch size and fill unset options from the defaults.
    pub fn resolve(
        &self,
        item_count: usize,
        options: BatchOptions,
    ) -> Result<ResolvedOptions, BatchError> {
        if item_count == 0 {
            return Err(BatchError::InvalidArgument(
                "batch must contain at least one item".to_string(),
            ));
        }
        if item_count > self.max_batch_size {
            return Err(BatchError::InvalidArgument(format!(
                "batch of {item_count} items exceeds the maximum of {}",
                self.max_batch_size
            )));
        }

        let max_attempts = options.max_attempts.unwrap_or(self.default_max_attempts);
        if max_attempts == 0 || max_attempts > self.max_attempts_limit {
            return Err(BatchError::InvalidArgument(format!(
                "max_attempts must be between 1 and {}, got {max_attempts}",
                self.max_attempts_limit
            )));
        }

        if options.operation_timeout.is_some_and(|limit| limit.is_zero()) {
            return Err(BatchError::InvalidArgument(
                "operation_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(ResolvedOptions {
            max_attempts,
            operation_timeout: options.operation_timeout.or(self.operation_timeout),
            label: options.label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_batch_size, 50);
        assert_eq!(config.default_max_attempts, 3);
        assert_eq!(config.backoff.delay(1), Duration::from_secs(2));
        assert_eq!(config.operation_timeout, Some(Duration::from_secs(300)));
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let json = r#"{
            "max_batch_size": 10,
            "backoff": { "base_delay": "1s" },
            "operation_timeout": "45s"
        }"#;
        let config: SchedulerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.default_max_attempts, 3);
        assert_eq!(config.backoff.multiplier, 2.0);
        assert_eq!(config.backoff.delay(3), Duration::from_secs(4));
        assert_eq!(config.operation_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn default_config_is_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
    }

    #[rstest]
    #[case::shrinking_backoff(r#"{ "backoff": { "multiplier": 0.5 } }"#)]
    #[case::negative_backoff(r#"{ "backoff": { "multiplier": -1.0 } }"#)]
    #[case::zero_base_delay(r#"{ "backoff": { "base_delay": "0s" } }"#)]
    #[case::zero_batch_size(r#"{ "max_batch_size": 0 }"#)]
    #[case::default_over_limit(r#"{ "default_max_attempts": 4, "max_attempts_limit": 3 }"#)]
    #[case::zero_timeout(r#"{ "operation_timeout": "0s" }"#)]
    fn validate_rejects(#[case] json: &str) {
        let config: SchedulerConfig = serde_json::from_str(json).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, BatchError::InvalidArgument(_)));
    }

    #[test]
    fn serialized_config_reads_back_unchanged() {
        let config = SchedulerConfig {
            backoff: RetryPolicy::new(Duration::from_millis(500), 3.0)
                .with_max_delay(Duration::from_secs(60)),
            operation_timeout: None,
            ..SchedulerConfig::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["backoff"]["base_delay"], "500ms");
        assert_eq!(json["backoff"]["max_delay"], "1m");

        let back: SchedulerConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }

    #[rstest]
    #[case::empty(0, BatchOptions::default())]
    #[case::oversized(51, BatchOptions::default())]
    #[case::zero_attempts(1, BatchOptions::default().with_max_attempts(0))]
    #[case::too_many_attempts(1, BatchOptions::default().with_max_attempts(11))]
    #[case::zero_timeout(1, BatchOptions::default().with_operation_timeout(Duration::ZERO))]
    fn resolve_rejects(#[case] items: usize, #[case] options: BatchOptions) {
        let err = SchedulerConfig::default().resolve(items, options).unwrap_err();
        assert!(matches!(err, BatchError::InvalidArgument(_)));
    }

    #[test]
    fn resolve_prefers_batch_overrides() {
        let options = BatchOptions::default()
            .with_max_attempts(5)
            .with_operation_timeout(Duration::from_secs(1))
            .with_label("nightly");
        let resolved = SchedulerConfig::default().resolve(3, options).unwrap();
        assert_eq!(resolved.max_attempts, 5);
        assert_eq!(resolved.operation_timeout, Some(Duration::from_secs(1)));
        assert_eq!(resolved.label.as_deref(), Some("nightly"));
    }

    #[test]
    fn resolve_falls_back_to_config() {
        let resolved = SchedulerConfig::default()
            .resolve(50, BatchOptions::default())
            .unwrap();
        assert_eq!(resolved.max_attempts, 3);
        assert_eq!(resolved.operation_timeout, Some(Duration::from_secs(300)));
    }
}
