//! Inputs accepted when a batch is created.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One unit of work submitted to a batch: an external reference plus an
/// opaque payload handed to the operation unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemInput {
    pub id: String,

    #[serde(default)]
    pub data: serde_json::Value,
}

impl ItemInput {
    pub fn new(id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

impl From<String> for ItemInput {
    fn from(id: String) -> Self {
        Self::new(id, serde_json::Value::Null)
    }
}

impl From<&str> for ItemInput {
    fn from(id: &str) -> Self {
        Self::new(id, serde_json::Value::Null)
    }
}

/// Per-batch overrides. Unset fields fall back to the scheduler config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Maximum attempts per item, first attempt included.
    #[serde(default, alias = "retries", skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Deadline applied to every single attempt.
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub operation_timeout: Option<Duration>,

    /// Free-form caller label, echoed back in summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl BatchOptions {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Options after defaults have been applied and limits checked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedOptions {
    pub max_attempts: u32,

    #[serde(with = "humantime_serde")]
    pub operation_timeout: Option<Duration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}
