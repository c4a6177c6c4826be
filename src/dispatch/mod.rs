mod envelope;
mod handler;

pub use envelope::{ChangeRecord, StreamEvent};
pub use handler::{FnHandler, Handler};

use crate::dynamodb::types::Records;
use crate::metrics::{Counter, Failure, SharedMetrics};

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Routes every non-empty batch to all registered handlers.
pub struct RecordDispatcher {
    handlers: Vec<Arc<dyn Handler>>,
    metrics: SharedMetrics,
}

impl RecordDispatcher {
    pub fn new(metrics: SharedMetrics) -> Self {
        Self {
            handlers: vec![],
            metrics,
        }
    }

    pub fn register<H: Handler + 'static>(&mut self, handler: H) -> &mut Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn register_fn<T, F, Fut>(&mut self, name: T, f: F) -> &mut Self
    where
        T: Into<String>,
        F: Fn(Arc<StreamEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.register(FnHandler::new(name, f))
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Runs every handler concurrently on the batch and waits for all of them. A handler
    /// that errors or panics is logged and counted; it never affects its siblings.
    pub async fn dispatch(&self, records: Records) {
        if records.is_empty() {
            return;
        }

        let event = match self.normalize(records) {
            Some(event) => Arc::new(event),
            None => return,
        };

        self.metrics.add(Counter::BatchesDispatched, 1);
        self.metrics
            .add(Counter::RecordsDispatched, event.len() as u64);
        debug!(records = event.len(), "Dispatching batch");

        let tasks: Vec<_> = self
            .handlers
            .iter()
            .map(|handler| {
                let handler = Arc::clone(handler);
                let event = Arc::clone(&event);
                let name = handler.name().to_string();
                (name, tokio::spawn(async move { handler.handle(event).await }))
            })
            .collect();

        for (name, task) in tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(handler = %name, error = ?err, "Handler failed");
                    self.metrics.fail_handler(&name);
                }
                Err(err) => {
                    error!(handler = %name, error = %err, "Handler panicked");
                    self.metrics.fail_handler(&name);
                }
            }
        }
    }

    /// Decodes every record and keeps only those that decode, in both the typed view and the
    /// serialized envelope.
    fn normalize(&self, raw: Records) -> Option<StreamEvent> {
        let mut kept = vec![];
        let mut records = vec![];

        for record in raw.iter() {
            match ChangeRecord::decode(record) {
                Ok(decoded) => {
                    kept.push(record.clone());
                    records.push(decoded);
                }
                Err(err) => {
                    warn!(
                        event_id = record.event_id().unwrap_or_default(),
                        sequence_number = record.sequence_number().unwrap_or_default(),
                        error = %err,
                        "Skipping malformed change record"
                    );
                    self.metrics.fail(Failure::MalformedRecord);
                }
            }
        }

        if records.is_empty() {
            None
        } else {
            Some(StreamEvent::new(kept.into(), records))
        }
    }
}
