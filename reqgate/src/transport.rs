//! Transport seam: the caller-supplied asynchronous client.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use crate::error::TransportError;

/// The injected network operation.
///
/// Takes the (possibly rewritten) request payload and returns a result for
/// the validator to judge, or fails.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: Value) -> Result<Value, TransportError>;
}

/// Adapter turning an async closure into a [`Transport`].
pub struct FnTransport<F>(F);

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TransportError>> + Send + 'static,
{
    async fn call(&self, request: Value) -> Result<Value, TransportError> {
        (self.0)(request).await
    }
}

/// Wrap an async closure as a shareable transport.
pub fn transport_fn<F, Fut>(f: F) -> Arc<dyn Transport>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, TransportError>> + Send + 'static,
{
    Arc::new(FnTransport(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn closure_transport_echoes() {
        let transport = transport_fn(|request| async move { Ok(json!({ "echo": request })) });
        let result = transport.call(json!("ping")).await.unwrap();
        assert_eq!(result, json!({ "echo": "ping" }));
    }

    #[tokio::test]
    async fn closure_transport_fails() {
        let transport =
            transport_fn(|_| async { Err(TransportError::new("connection refused")) });
        let err = transport.call(json!(null)).await.unwrap_err();
        assert_eq!(err.message(), "connection refused");
    }
}
