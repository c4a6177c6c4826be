//! Posts a one-record batch with a POST_CREATED event to a running server.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{SecondsFormat, Utc};
use feed_projector::ENV_PORT;
use serde_json::{json, Value};
use std::env;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;
use ulid::Ulid;

fn post_created() -> Value {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    json!({
        "eventId": Ulid::new().to_string(),
        "eventType": "POST_CREATED",
        "timestamp": now,
        "version": 1,
        "postId": Ulid::new().to_string(),
        "userId": "alice",
        "handle": "alice",
        "caption": "First light",
        "imageUrl": "https://cdn.example.com/first-light.jpg",
        "createdAt": now,
    })
}

async fn send(port: &str) -> anyhow::Result<Value> {
    let batch = json!({
        "Records": [{
            "eventID": "shardId-000000000000:1",
            "kinesis": {
                "data": STANDARD.encode(post_created().to_string()),
                "sequenceNumber": "1",
                "partitionKey": "alice",
            }
        }]
    });

    let response = reqwest::Client::new()
        .post(format!("http://localhost:{port}/events"))
        .json(&batch)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::new();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let port = env::var(ENV_PORT).unwrap_or_else(|_| "3000".to_string());
    match send(&port).await {
        Ok(body) => info!("{body}"),
        Err(err) => error!("{:#?}", err),
    }
}
