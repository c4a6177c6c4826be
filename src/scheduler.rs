use crate::dispatch::RecordDispatcher;
use crate::dynamodb::{
    shard::{children_of, discover, starting_shards},
    types::ShardIteratorType,
    ChangeLogLocator, Client, ShardCursorManager,
};
use crate::error::SetupError;
use crate::metrics::{Counter, Failure, SharedMetrics};

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    sync::{oneshot, watch, Mutex},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerState {
    Idle,
    Initializing,
    Polling,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub table: String,
    pub interval: Duration,
    pub iterator_type: ShardIteratorType,
}

/// Drives the change log of one table: reads every open shard on a fixed interval and hands
/// each batch to the dispatcher.
pub struct PollingScheduler {
    client: Arc<dyn Client>,
    dispatcher: Arc<RecordDispatcher>,
    metrics: SharedMetrics,
    config: SchedulerConfig,
    state: watch::Sender<SchedulerState>,
    running: Mutex<Option<Running>>,
}

struct Running {
    tx_stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl PollingScheduler {
    pub fn new(
        client: Arc<dyn Client>,
        dispatcher: Arc<RecordDispatcher>,
        metrics: SharedMetrics,
        config: SchedulerConfig,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            client,
            dispatcher,
            metrics,
            config,
            state,
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Locates the change log, positions a cursor on every starting shard, performs one read
    /// and then keeps reading on the configured interval.
    pub async fn start(&self) -> Result<(), SetupError> {
        let mut running = self.running.lock().await;

        match self.state() {
            SchedulerState::Idle => {}
            SchedulerState::Stopped => {
                warn!(table = %self.config.table, "Scheduler was stopped and cannot restart");
                return Ok(());
            }
            _ => return Ok(()),
        }

        if self.config.interval.is_zero() {
            error!(table = %self.config.table, "Refusing to poll with a zero interval");
            return Err(SetupError::ZeroInterval);
        }

        self.state.send_replace(SchedulerState::Initializing);

        let mut poller = match self.initialize().await {
            Ok(poller) => poller,
            Err(err) => {
                error!(table = %self.config.table, error = %err, "Failed to start polling");
                self.state.send_replace(SchedulerState::Idle);
                return Err(err);
            }
        };

        poller.tick().await;

        let (tx_stop, mut rx_stop) = oneshot::channel::<()>();
        let period = self.config.interval;
        let task = tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately and the initial read already happened.
            timer.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = &mut rx_stop => break,
                    _ = timer.tick() => poller.tick().await,
                }
            }
        });

        *running = Some(Running { tx_stop, task });
        self.state.send_replace(SchedulerState::Polling);
        info!(
            table = %self.config.table,
            interval_ms = self.config.interval.as_millis() as u64,
            "Polling started"
        );
        Ok(())
    }

    /// Disarms the timer and waits for a read in flight, and its dispatch, to finish.
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;

        if let Some(Running { tx_stop, task }) = running.take() {
            // The receiver is only gone if the task already ended.
            let _ = tx_stop.send(());
            if let Err(err) = task.await {
                error!(table = %self.config.table, error = %err, "Polling task failed");
            }
        }

        if self.state() != SchedulerState::Stopped {
            self.state.send_replace(SchedulerState::Stopped);
            info!(table = %self.config.table, "Polling stopped");
        }
    }

    async fn initialize(&self) -> Result<Poller, SetupError> {
        let log_id = ChangeLogLocator::new(Arc::clone(&self.client))
            .locate(&self.config.table)
            .await?;

        let shards = discover(self.client.as_ref(), &log_id).await?;
        let starting = starting_shards(&shards, self.config.iterator_type);
        if starting.is_empty() {
            return Err(SetupError::NoShards(self.config.table.clone()));
        }

        let mut cursors = vec![];
        for shard in starting {
            let cursor = ShardCursorManager::initialize(
                Arc::clone(&self.client),
                &log_id,
                shard,
                self.config.iterator_type,
            )
            .await?;
            cursors.push(cursor);
        }

        debug!(log_id = %log_id, shards = cursors.len(), "Initialized shard cursors");
        let followed = cursors.iter().map(|c| c.shard_id().to_string()).collect();
        Ok(Poller {
            client: Arc::clone(&self.client),
            dispatcher: Arc::clone(&self.dispatcher),
            metrics: Arc::clone(&self.metrics),
            log_id,
            cursors,
            closed: vec![],
            followed,
        })
    }
}

/// State owned by the polling task.
struct Poller {
    client: Arc<dyn Client>,
    dispatcher: Arc<RecordDispatcher>,
    metrics: SharedMetrics,
    log_id: String,
    cursors: Vec<ShardCursorManager>,
    /// Closed shards whose children have not been picked up yet.
    closed: Vec<String>,
    /// Every shard a cursor was ever opened on.
    followed: HashSet<String>,
}

impl Poller {
    async fn tick(&mut self) {
        self.metrics.add(Counter::Polls, 1);

        let tasks: Vec<_> = std::mem::take(&mut self.cursors)
            .into_iter()
            .map(|mut cursor| {
                let shard_id = cursor.shard_id().to_string();
                let task = tokio::spawn(async move {
                    let result = cursor.advance().await;
                    (cursor, result)
                });
                (shard_id, task)
            })
            .collect();

        for (shard_id, task) in tasks {
            match task.await {
                Ok((cursor, Ok(records))) => {
                    self.dispatcher.dispatch(records).await;
                    if cursor.is_closed() {
                        info!(shard_id = %shard_id, "Shard closed");
                        self.closed.push(shard_id);
                    } else {
                        self.cursors.push(cursor);
                    }
                }
                Ok((cursor, Err(err))) => {
                    error!(shard_id = %shard_id, error = ?err, "Failed to read records");
                    self.metrics.fail(Failure::ReadRecords);
                    self.cursors.push(cursor);
                }
                Err(err) => {
                    error!(shard_id = %shard_id, error = %err, "Shard reader panicked");
                    self.metrics.fail(Failure::ReadRecords);
                }
            }
        }

        if !self.closed.is_empty() {
            self.follow_lineage().await;
        }
    }

    /// Starts the children of closed shards from their first record. A closed shard whose
    /// children are not listed yet stays pending until they are.
    async fn follow_lineage(&mut self) {
        let shards = match discover(self.client.as_ref(), &self.log_id).await {
            Ok(shards) => shards,
            Err(err) => {
                warn!(error = ?err, "Failed to list shards, retrying next tick");
                return;
            }
        };

        let mut pending = vec![];
        for parent in std::mem::take(&mut self.closed) {
            let children = children_of(&shards, &parent);

            if children.is_empty() {
                if shards.iter().any(|shard| shard.id == parent) {
                    debug!(shard_id = %parent, "Closed shard has no children yet");
                    pending.push(parent);
                } else {
                    debug!(shard_id = %parent, "Closed shard is no longer listed");
                }
                continue;
            }

            for child in children {
                if self.followed.contains(&child.id) {
                    continue;
                }

                let child_id = child.id.clone();
                match ShardCursorManager::initialize(
                    Arc::clone(&self.client),
                    &self.log_id,
                    child,
                    ShardIteratorType::TrimHorizon,
                )
                .await
                {
                    Ok(cursor) => {
                        info!(parent_id = %parent, shard_id = %child_id, "Following child shard");
                        self.followed.insert(child_id);
                        self.cursors.push(cursor);
                    }
                    Err(err) => {
                        warn!(shard_id = %child_id, error = ?err, "Failed to open child shard");
                        if !pending.contains(&parent) {
                            pending.push(parent.clone());
                        }
                    }
                }
            }
        }

        self.closed = pending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::StreamEvent;
    use crate::dynamodb::client::mock::{MockClient, MockShard};
    use crate::dynamodb::types::{Record, ShardPosition};
    use crate::metrics::Metrics;
    use anyhow::Result;
    use tokio::time::sleep;

    const INTERVAL: Duration = Duration::from_millis(20);

    type Seen = Arc<std::sync::Mutex<Vec<Vec<String>>>>;

    fn record(seq: &str) -> Record {
        crate::dispatch::fixtures::insert(crate::entity::fixtures::post_item("u1", seq), seq)
    }

    fn scheduler(
        client: &Arc<MockClient>,
        iterator_type: ShardIteratorType,
    ) -> (PollingScheduler, Seen, SharedMetrics) {
        let seen: Seen = Arc::default();
        let sink = Arc::clone(&seen);
        let metrics = Metrics::new();

        let mut dispatcher = RecordDispatcher::new(Arc::clone(&metrics));
        dispatcher.register_fn("recorder", move |event: Arc<StreamEvent>| {
            let seqs = event
                .records()
                .iter()
                .map(|r| r.sequence_number.clone())
                .collect();
            sink.lock().unwrap().push(seqs);
            std::future::ready(Ok::<(), anyhow::Error>(()))
        });

        let scheduler = PollingScheduler::new(
            client.clone(),
            Arc::new(dispatcher),
            Arc::clone(&metrics),
            SchedulerConfig {
                table: "Social".into(),
                interval: INTERVAL,
                iterator_type,
            },
        );
        (scheduler, seen, metrics)
    }

    fn flat(seen: &Seen) -> Vec<String> {
        seen.lock().unwrap().iter().flatten().cloned().collect()
    }

    #[tokio::test]
    async fn it_reads_once_before_start_returns() -> Result<()> {
        let client = Arc::new(MockClient::new([
            MockShard::new("shard_0", None).page([record("1")])
        ]));
        let (scheduler, seen, metrics) = scheduler(&client, ShardIteratorType::Latest);

        assert_eq!(scheduler.state(), SchedulerState::Idle);
        scheduler.start().await?;

        assert_eq!(scheduler.state(), SchedulerState::Polling);
        assert_eq!(flat(&seen), ["1"]);
        assert_eq!(metrics.count(Counter::Polls), 1);

        scheduler.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn it_keeps_polling_on_the_interval() -> Result<()> {
        let client = Arc::new(MockClient::new([MockShard::new("shard_0", None)]));
        let (scheduler, seen, _) = scheduler(&client, ShardIteratorType::Latest);

        scheduler.start().await?;
        client.push_page("shard_0", [record("1"), record("2")]);
        sleep(INTERVAL * 3).await;
        client.push_page("shard_0", [record("3")]);
        sleep(INTERVAL * 3).await;
        scheduler.stop().await;

        assert_eq!(flat(&seen), ["1", "2", "3"]);
        Ok(())
    }

    #[tokio::test]
    async fn it_reads_nothing_after_stop() -> Result<()> {
        let client = Arc::new(MockClient::new([MockShard::new("shard_0", None)]));
        let (scheduler, _, _) = scheduler(&client, ShardIteratorType::Latest);

        scheduler.start().await?;
        scheduler.stop().await;
        let calls = client.get_records_calls();

        sleep(INTERVAL * 4).await;

        assert_eq!(client.get_records_calls(), calls);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        Ok(())
    }

    #[tokio::test]
    async fn stop_waits_for_the_read_in_flight() -> Result<()> {
        let client = Arc::new(
            MockClient::new([MockShard::new("shard_0", None)])
                .with(|s| s.read_delay = Some(Duration::from_millis(60))),
        );
        let (scheduler, seen, _) = scheduler(&client, ShardIteratorType::Latest);

        scheduler.start().await?;
        client.push_page("shard_0", [record("1")]);
        // The next tick fires after one interval and its read is still sleeping.
        sleep(INTERVAL + Duration::from_millis(15)).await;
        let calls = client.get_records_calls();
        scheduler.stop().await;

        assert_eq!(flat(&seen), ["1"]);
        assert_eq!(client.get_records_calls(), calls);
        Ok(())
    }

    #[tokio::test]
    async fn start_is_idempotent() -> Result<()> {
        let client = Arc::new(MockClient::new([MockShard::new("shard_0", None)]));
        let (scheduler, _, _) = scheduler(&client, ShardIteratorType::Latest);

        scheduler.start().await?;
        scheduler.start().await?;

        assert_eq!(client.source().iterator_requests.len(), 1);
        scheduler.stop().await;
        Ok(())
    }

    #[tokio::test]
    async fn a_stopped_scheduler_stays_stopped() -> Result<()> {
        let client = Arc::new(MockClient::new([MockShard::new("shard_0", None)]));
        let (scheduler, _, _) = scheduler(&client, ShardIteratorType::Latest);

        scheduler.start().await?;
        scheduler.stop().await;
        scheduler.start().await?;

        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(client.source().iterator_requests.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn setup_errors_return_to_idle() {
        let client = Arc::new(MockClient::new([MockShard::new("shard_0", None)]).with(|s| {
            s.enabled = false;
        }));
        let (scheduler, _, _) = scheduler(&client, ShardIteratorType::Latest);

        let result = scheduler.start().await;
        assert!(matches!(result, Err(SetupError::LogDisabled(t)) if t == "Social"));
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        client.source().enabled = true;
        let log_id = client.source().log_id.take();
        let result = scheduler.start().await;
        assert!(matches!(result, Err(SetupError::LogIdMissing(_))));
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        client.source().log_id = log_id;
        assert!(scheduler.start().await.is_ok());
        assert_eq!(scheduler.state(), SchedulerState::Polling);
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn it_refuses_a_log_without_shards() {
        let client = Arc::new(MockClient::new([]));
        let (scheduler, _, _) = scheduler(&client, ShardIteratorType::Latest);

        let result = scheduler.start().await;
        assert!(matches!(result, Err(SetupError::NoShards(_))));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn a_failed_read_is_counted_and_retried() -> Result<()> {
        let client = Arc::new(
            MockClient::new([MockShard::new("shard_0", None).page([record("1")])])
                .with(|s| s.fail_reads = 1),
        );
        let (scheduler, seen, metrics) = scheduler(&client, ShardIteratorType::Latest);

        scheduler.start().await?;
        assert!(flat(&seen).is_empty());
        assert_eq!(metrics.failures(Failure::ReadRecords), 1);

        sleep(INTERVAL * 3).await;
        scheduler.stop().await;

        assert_eq!(flat(&seen), ["1"]);
        Ok(())
    }

    #[tokio::test]
    async fn it_follows_children_of_a_closed_shard() -> Result<()> {
        let client = Arc::new(MockClient::new([
            MockShard::new("shard_0", None)
                .page([record("1")])
                .closing(),
            MockShard::new("shard_1", Some("shard_0")).page([record("2")]),
        ]));
        let (scheduler, seen, _) = scheduler(&client, ShardIteratorType::TrimHorizon);

        scheduler.start().await?;
        assert_eq!(flat(&seen), ["1"]);

        sleep(INTERVAL * 3).await;
        scheduler.stop().await;

        assert_eq!(flat(&seen), ["1", "2"]);
        assert_eq!(
            client.source().iterator_requests,
            [
                ("shard_0".to_string(), ShardPosition::Start(ShardIteratorType::TrimHorizon)),
                ("shard_1".to_string(), ShardPosition::Start(ShardIteratorType::TrimHorizon)),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn it_picks_up_a_child_created_after_the_split() -> Result<()> {
        let client = Arc::new(MockClient::new([MockShard::new("shard_0", None)]));
        let (scheduler, seen, _) = scheduler(&client, ShardIteratorType::Latest);

        scheduler.start().await?;
        client.add_shard(MockShard::new("shard_1", Some("shard_0")).page([record("7")]));
        client.with_shard("shard_0", |s| s.closes = true);

        sleep(INTERVAL * 4).await;
        scheduler.stop().await;

        assert_eq!(flat(&seen), ["7"]);
        Ok(())
    }

    #[tokio::test]
    async fn it_refuses_a_zero_interval() {
        let client = Arc::new(MockClient::new([MockShard::new("shard_0", None)]));
        let metrics = Metrics::new();
        let scheduler = PollingScheduler::new(
            client.clone(),
            Arc::new(RecordDispatcher::new(Arc::clone(&metrics))),
            metrics,
            SchedulerConfig {
                table: "Social".into(),
                interval: Duration::ZERO,
                iterator_type: ShardIteratorType::Latest,
            },
        );

        let result = scheduler.start().await;

        assert!(matches!(result, Err(SetupError::ZeroInterval)));
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(client.get_records_calls(), 0);
    }

    #[tokio::test]
    async fn a_closed_shard_waits_for_children_listed_later() -> Result<()> {
        let client = Arc::new(MockClient::new([
            MockShard::new("shard_0", None).page([record("1")]).closing()
        ]));
        let (scheduler, seen, _) = scheduler(&client, ShardIteratorType::Latest);

        scheduler.start().await?;
        sleep(INTERVAL * 3).await;
        assert_eq!(flat(&seen), ["1"]);

        client.add_shard(MockShard::new("shard_1", Some("shard_0")).page([record("2")]));
        sleep(INTERVAL * 4).await;
        scheduler.stop().await;

        assert_eq!(flat(&seen), ["1", "2"]);
        assert_eq!(
            client.source().iterator_requests,
            [
                ("shard_0".to_string(), ShardPosition::Start(ShardIteratorType::Latest)),
                ("shard_1".to_string(), ShardPosition::Start(ShardIteratorType::TrimHorizon)),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn an_expired_iterator_does_not_stop_the_shard() -> Result<()> {
        let client = Arc::new(MockClient::new([
            MockShard::new("shard_0", None).page([record("1")])
        ]));
        let (scheduler, seen, metrics) = scheduler(&client, ShardIteratorType::Latest);

        scheduler.start().await?;
        client.source().expire_reads = 1;
        client.push_page("shard_0", [record("2")]);
        sleep(INTERVAL * 3).await;
        client.push_page("shard_0", [record("3")]);
        sleep(INTERVAL * 3).await;
        scheduler.stop().await;

        assert_eq!(flat(&seen), ["1", "2", "3"]);
        assert_eq!(metrics.failures(Failure::ReadRecords), 0);
        assert_eq!(
            client.source().iterator_requests[1],
            ("shard_0".to_string(), ShardPosition::After("1".into()))
        );
        Ok(())
    }
}
