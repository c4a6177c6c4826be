use super::StreamEvent;

use anyhow::Result;
use axum::async_trait;
use std::future::Future;
use std::sync::Arc;

/// A projection fed by the change log. Every handler sees every batch and decides for
/// itself which records are relevant.
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, event: Arc<StreamEvent>) -> Result<()>;
}

/// Adapts an async closure into a [`Handler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new<T: Into<String>>(name: T, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Arc<StreamEvent>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    fn name(&self) -> &str {
        self.name.as_str()
    }

    async fn handle(&self, event: Arc<StreamEvent>) -> Result<()> {
        (self.f)(event).await
    }
}
