use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;

/// The error type handlers fail with. The description is serialized into the
/// error reply, so it should be meaningful to the remote caller.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A trait representing a handler bound to a pattern.
///
/// Handlers may run concurrently with each other, including for messages of
/// the same pattern, so they must be safe to execute in parallel.
#[async_trait]
pub trait PatternHandler: Send + Sync + 'static {
    /// Handles the decoded request payload, returning the reply payload.
    async fn handle(&self, payload: Value) -> Result<Value, HandlerError>;
}

/// Adapts an async closure into a [`PatternHandler`].
#[derive(Clone, Debug)]
pub struct FnHandler<F>(F);

/// Creates a [`PatternHandler`] from an async closure.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> PatternHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    async fn handle(&self, payload: Value) -> Result<Value, HandlerError> {
        (self.0)(payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_handler_fn_adapts_closure() {
        let handler = handler_fn(|payload: Value| async move {
            Ok(json!({ "echo": payload }))
        });

        let reply = handler.handle(json!("hi")).await.unwrap();
        assert_eq!(reply, json!({ "echo": "hi" }));
    }

    #[tokio::test]
    async fn test_handler_fn_propagates_failure() {
        let handler = handler_fn(|_payload: Value| async move {
            Err::<Value, HandlerError>("token expired".into())
        });

        let err = handler.handle(json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "token expired");
    }
}
