//! Consumer of the partitioned domain-event log.

mod batch;
pub mod cache;
mod event;
mod projector;

pub use batch::{BatchItemFailure, BatchResponse, KinesisBatch, KinesisPayload, KinesisRecord};
pub use cache::{Cache, MemoryCache};
pub use event::{DomainEvent, EventType, Payload, PostCreated};
pub use projector::{post_key, read_set_key, CacheProjector, CachedPost};

use crate::error::EventError;
use crate::metrics::{Counter, Failure, SharedMetrics};

use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct PartitionedLogConsumer {
    projector: Arc<CacheProjector>,
    metrics: SharedMetrics,
}

impl PartitionedLogConsumer {
    pub fn new(cache: Arc<dyn Cache>, metrics: SharedMetrics) -> Self {
        Self {
            projector: Arc::new(CacheProjector::new(cache)),
            metrics,
        }
    }

    /// Processes the records one at a time in batch order, since events of one partition may
    /// touch the same cache key. Each record fails on its own and the sequence numbers of the
    /// failed ones are reported in batch order.
    pub async fn handle(&self, batch: KinesisBatch) -> BatchResponse {
        let mut response = BatchResponse::default();

        for record in batch.records {
            let id = record.sequence_number().to_string();
            let projector = Arc::clone(&self.projector);

            let result = match tokio::spawn(process(projector, record)).await {
                Ok(result) => result,
                Err(err) => Err(EventError::Projection(anyhow::anyhow!("{err}"))),
            };

            match result {
                Ok(event_type) => {
                    debug!(sequence_number = %id, %event_type, "Processed event");
                    self.metrics.add(Counter::EventsProcessed, 1);
                }
                Err(err) => {
                    warn!(sequence_number = %id, error = %err, "Failed to process event");
                    self.metrics.fail(Failure::Event);
                    response.batch_item_failures.push(BatchItemFailure {
                        item_identifier: id,
                    });
                }
            }
        }

        response
    }
}

async fn process(
    projector: Arc<CacheProjector>,
    record: KinesisRecord,
) -> Result<EventType, EventError> {
    let bytes = STANDARD.decode(record.kinesis.data.as_bytes())?;
    let event = DomainEvent::parse(&bytes)?;
    projector
        .project(&event)
        .await
        .map_err(EventError::Projection)?;
    Ok(event.event_type())
}
