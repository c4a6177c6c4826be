use crate::events::PartitionedLogConsumer;
use crate::metrics::SharedMetrics;
use crate::scheduler::{PollingScheduler, SchedulerState};

use std::sync::Arc;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    scheduler: Arc<PollingScheduler>,
    consumer: Arc<PartitionedLogConsumer>,
    metrics: SharedMetrics,
}

impl AppState {
    pub fn new(
        scheduler: Arc<PollingScheduler>,
        consumer: Arc<PartitionedLogConsumer>,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            scheduler,
            consumer,
            metrics,
        }
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn consumer(&self) -> Arc<PartitionedLogConsumer> {
        Arc::clone(&self.consumer)
    }

    pub fn metrics(&self) -> SharedMetrics {
        Arc::clone(&self.metrics)
    }
}
