use feed_projector::{
    config::Config,
    dispatch::RecordDispatcher,
    dynamodb::DynamodbClient,
    events::{MemoryCache, PartitionedLogConsumer},
    metrics::Metrics,
    projection::{CounterAggregator, DynamodbStore, FeedFanout},
    scheduler::{PollingScheduler, SchedulerConfig},
    web::{route, AppState},
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::new();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::new();
    let metrics = Metrics::new();

    let client = DynamodbClient::builder()
        .await
        .endpoint_url(config.endpoint_url())
        .build();
    let store = Arc::new(DynamodbStore::new(client.db(), config.table_name()));

    let mut dispatcher = RecordDispatcher::new(Arc::clone(&metrics));
    dispatcher
        .register(CounterAggregator::comments(store.clone(), Arc::clone(&metrics)))
        .register(CounterAggregator::likes(store.clone(), Arc::clone(&metrics)))
        .register(FeedFanout::new(
            store.clone(),
            store,
            config.celebrity_threshold(),
            Arc::clone(&metrics),
        ));
    info!(handlers = ?dispatcher.handler_names(), "Registered handlers");

    let scheduler = Arc::new(PollingScheduler::new(
        Arc::new(client),
        Arc::new(dispatcher),
        Arc::clone(&metrics),
        SchedulerConfig {
            table: config.table_name().to_string(),
            interval: config.poll_interval(),
            iterator_type: config.shard_iterator_type(),
        },
    ));

    if let Err(err) = scheduler.start().await {
        error!(error = %err, "Change log polling is not running");
    }

    let consumer = Arc::new(PartitionedLogConsumer::new(
        Arc::new(MemoryCache::new()),
        Arc::clone(&metrics),
    ));
    let state = Arc::new(AppState::new(Arc::clone(&scheduler), consumer, metrics));

    let app = route::router(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(
                DefaultMakeSpan::new()
                    .level(Level::INFO)
                    .include_headers(true),
            )
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(
                DefaultOnResponse::new()
                    .level(Level::INFO)
                    .latency_unit(LatencyUnit::Micros)
                    .include_headers(true),
            ),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));
    info!("listening on {addr}");

    let server = axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {err}");
            }
            info!("Shutting down");
        });

    if let Err(err) = server.await {
        error!("{:#?}", err);
    }

    scheduler.stop().await;
}
