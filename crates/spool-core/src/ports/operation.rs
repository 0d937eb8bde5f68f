//! ItemOperation port - the caller-supplied work done for each item.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OperationError;

/// The external operation run once per attempt.
///
/// Receives the item's external reference and its opaque payload. A returned
/// error is an ordinary attempt failure and goes through the retry path.
#[async_trait]
pub trait ItemOperation: Send + Sync {
    async fn run(
        &self,
        item_id: &str,
        data: &serde_json::Value,
    ) -> Result<serde_json::Value, OperationError>;
}

/// Adapter turning an async closure into an [`ItemOperation`].
pub struct FnOperation<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ItemOperation for FnOperation<F>
where
    F: Fn(String, serde_json::Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<serde_json::Value, OperationError>> + Send,
{
    async fn run(
        &self,
        item_id: &str,
        data: &serde_json::Value,
    ) -> Result<serde_json::Value, OperationError> {
        (self.f)(item_id.to_string(), data.clone()).await
    }
}

/// ```ignore
/// let op = operation_fn(|id, _data| async move {
///     sessions.narrate(&id).await.map_err(OperationError::from_display)
/// });
/// ```
pub fn operation_fn<F, Fut>(f: F) -> Arc<dyn ItemOperation>
where
    F: Fn(String, serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, OperationError>> + Send + 'static,
{
    Arc::new(FnOperation { f })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn closure_operation_receives_id_and_data() {
        let op = operation_fn(|id, data| async move {
            Ok::<_, OperationError>(json!({ "id": id, "echo": data }))
        });

        let out = op.run("s-1", &json!({"lang": "en"})).await.unwrap();
        assert_eq!(out, json!({ "id": "s-1", "echo": { "lang": "en" } }));
    }

    #[tokio::test]
    async fn closure_operation_propagates_failure() {
        let op = operation_fn(|id, _| async move {
            Err::<serde_json::Value, _>(OperationError::new(format!("session {id} not found")))
        });

        let err = op.run("s-9", &json!(null)).await.unwrap_err();
        assert_eq!(err.message(), "session s-9 not found");
    }
}
