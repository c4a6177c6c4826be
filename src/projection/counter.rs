use super::{CounterDelta, CounterStore, ProjectionTarget};
use crate::dispatch::{ChangeRecord, Handler, StreamEvent};
use crate::dynamodb::types::OperationType;
use crate::entity::EntityKind;
use crate::metrics::{Counter, Failure, SharedMetrics};

use anyhow::Result;
use axum::async_trait;
use std::sync::Arc;
use tracing::{error, warn};

/// Keeps a per-post counter in step with inserts and removals of one child entity kind.
pub struct CounterAggregator {
    name: String,
    kind: EntityKind,
    attribute: String,
    store: Arc<dyn CounterStore>,
    metrics: SharedMetrics,
}

impl CounterAggregator {
    pub fn new<T: Into<String>>(
        kind: EntityKind,
        attribute: T,
        store: Arc<dyn CounterStore>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            name: format!("{}-counter", kind.to_string().to_lowercase()),
            kind,
            attribute: attribute.into(),
            store,
            metrics,
        }
    }

    pub fn comments(store: Arc<dyn CounterStore>, metrics: SharedMetrics) -> Self {
        Self::new(EntityKind::Comment, "commentsCount", store, metrics)
    }

    pub fn likes(store: Arc<dyn CounterStore>, metrics: SharedMetrics) -> Self {
        Self::new(EntityKind::Like, "likesCount", store, metrics)
    }

    /// Works out the single update a record calls for, if any.
    fn plan(&self, record: &ChangeRecord) -> Option<(ProjectionTarget, CounterDelta)> {
        let delta = match record.event_name {
            OperationType::Insert => 1,
            OperationType::Remove => -1,
            _ => return None,
        };

        let entity = record.image()?;
        if entity.kind() != Some(self.kind) {
            return None;
        }

        let metadata = entity.post_metadata()?;
        match (metadata.post_user_id, metadata.post_sk) {
            (Some(post_user_id), Some(post_sk)) => Some((
                ProjectionTarget::post(post_user_id, post_sk),
                CounterDelta {
                    attribute: self.attribute.clone(),
                    delta,
                },
            )),
            _ => {
                error!(
                    handler = %self.name,
                    pk = %record.keys.pk,
                    sk = %record.keys.sk,
                    sequence_number = %record.sequence_number,
                    post_user_id = ?metadata.post_user_id,
                    post_sk = ?metadata.post_sk,
                    "Missing post metadata"
                );
                self.metrics.fail(Failure::MissingMetadata);
                None
            }
        }
    }
}

#[async_trait]
impl Handler for CounterAggregator {
    fn name(&self) -> &str {
        self.name.as_str()
    }

    async fn handle(&self, event: Arc<StreamEvent>) -> Result<()> {
        for record in event.records() {
            let Some((target, delta)) = self.plan(record) else {
                continue;
            };

            match self.store.add(&target, &delta).await {
                Ok(()) => self.metrics.add(Counter::CounterUpdates, 1),
                Err(err) => {
                    warn!(
                        handler = %self.name,
                        pk = %target.pk,
                        sk = %target.sk,
                        delta = delta.delta,
                        error = ?err,
                        "Failed to update counter"
                    );
                    self.metrics.fail(Failure::CounterWrite);
                }
            }
        }

        Ok(())
    }
}
