//! Registry of named item operations.
//!
//! Built during initialization (mutable), then shared read-only by the
//! scheduler, so lookups need no lock.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::BatchError;
use crate::ports::ItemOperation;

#[derive(Default)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<dyn ItemOperation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        operation: Arc<dyn ItemOperation>,
    ) -> Result<(), BatchError> {
        let name = name.into();
        if self.operations.contains_key(&name) {
            return Err(BatchError::DuplicateOperation(name));
        }
        self.operations.insert(name, operation);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ItemOperation>> {
        self.operations.get(name).cloned()
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ItemOperation>, BatchError> {
        self.get(name)
            .ok_or_else(|| BatchError::UnknownOperation(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.operations.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.names())
            .finish()
    }
}
