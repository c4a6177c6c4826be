//! Writes a post and a comment on it so the change log carries one of each.

use aws_sdk_dynamodb::{config::Builder as ConfigBuilder, types::AttributeValue, Client};
use chrono::{SecondsFormat, Utc};
use feed_projector::{ENV_DYNAMODB_ENDPOINT_URL, ENV_TABLE_NAME};
use std::env;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;
use ulid::Ulid;

const DEFAULT_TABLE: &str = "Social";
const USER_ID: &str = "alice";
const COMMENTER_ID: &str = "bob";

fn s<T: Into<String>>(value: T) -> AttributeValue {
    AttributeValue::S(value.into())
}

fn n(value: u64) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

async fn put_post(client: &Client, table: &str, post_id: &str) -> anyhow::Result<()> {
    client
        .put_item()
        .table_name(table)
        .item("PK", s(format!("USER#{USER_ID}")))
        .item("SK", s(format!("POST#{post_id}")))
        .item("entityType", s("POST"))
        .item("postId", s(post_id))
        .item("userId", s(USER_ID))
        .item("handle", s(USER_ID))
        .item("caption", s("First light"))
        .item("imageUrl", s(format!("https://cdn.example.com/{post_id}.jpg")))
        .item("likesCount", n(0))
        .item("commentsCount", n(0))
        .item(
            "createdAt",
            s(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        )
        .send()
        .await?;
    Ok(())
}

async fn put_comment(client: &Client, table: &str, post_id: &str) -> anyhow::Result<()> {
    let comment_id = Ulid::new().to_string();
    client
        .put_item()
        .table_name(table)
        .item("PK", s(format!("POST#{post_id}")))
        .item("SK", s(format!("COMMENT#{comment_id}")))
        .item("entityType", s("COMMENT"))
        .item("commentId", s(comment_id))
        .item("postId", s(post_id))
        .item("userId", s(COMMENTER_ID))
        .item("content", s("Lovely"))
        .item("postUserId", s(USER_ID))
        .item("postSK", s(format!("POST#{post_id}")))
        .send()
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::new();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let url =
        env::var(ENV_DYNAMODB_ENDPOINT_URL).expect("env DYNAMODB_ENDPOINT_URL is required");
    let table = env::var(ENV_TABLE_NAME).unwrap_or_else(|_| DEFAULT_TABLE.to_string());
    let config = ConfigBuilder::from(&aws_config::load_from_env().await)
        .endpoint_url(url)
        .build();
    let client = Client::from_conf(config);

    let post_id = Ulid::new().to_string();
    if let Err(err) = put_post(&client, &table, &post_id).await {
        error!("{:#?}", err);
        return;
    }
    if let Err(err) = put_comment(&client, &table, &post_id).await {
        error!("{:#?}", err);
        return;
    }
    info!(post_id = %post_id, "Wrote a post and a comment");
}
