use aws_sdk_dynamodb::{
    config::Builder as ConfigBuilder,
    types::{
        AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType,
        StreamSpecification, StreamViewType,
    },
    Client,
};
use feed_projector::{ENV_DYNAMODB_ENDPOINT_URL, ENV_TABLE_NAME};
use std::env;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_TABLE: &str = "Social";

fn key(name: &str, key_type: KeyType) -> anyhow::Result<KeySchemaElement> {
    Ok(KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()?)
}

fn string_attribute(name: &str) -> anyhow::Result<AttributeDefinition> {
    Ok(AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()?)
}

async fn create_table(client: &Client, table: &str) -> anyhow::Result<Option<String>> {
    let output = client
        .create_table()
        .table_name(table)
        .attribute_definitions(string_attribute("PK")?)
        .attribute_definitions(string_attribute("SK")?)
        .key_schema(key("PK", KeyType::Hash)?)
        .key_schema(key("SK", KeyType::Range)?)
        .billing_mode(BillingMode::PayPerRequest)
        .stream_specification(
            StreamSpecification::builder()
                .stream_enabled(true)
                .stream_view_type(StreamViewType::NewAndOldImages)
                .build()?,
        )
        .send()
        .await?;

    Ok(output
        .table_description
        .and_then(|description| description.latest_stream_arn))
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

    match create_table(&client, &table).await {
        Ok(arn) => info!("Stream ARN: {}", arn.unwrap_or_default()),
        Err(err) => error!("{:#?}", err),
    }
}
