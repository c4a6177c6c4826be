use super::{error::HttpError, extractor::Json, SharedState};
use crate::events::KinesisBatch;
use crate::scheduler::SchedulerState;

use axum::{
    extract::State,
    response::{self, IntoResponse},
    routing::{get, post},
    Router,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Health {
    status: SchedulerState,
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    response::Json(Health {
        status: state.scheduler_state(),
    })
}

async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    response::Json(state.metrics().snapshot())
}

async fn events(
    State(state): State<SharedState>,
    Json(batch): Json<KinesisBatch>,
) -> Result<impl IntoResponse, HttpError> {
    let response = state.consumer().handle(batch).await;
    Ok(response::Json(response))
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/events", post(events))
        .with_state(state)
}
