//! Example: propagate correlation ids through a chain of simulated invocations
//!
//! Run with `RUST_LOG=debug cargo run --example lambda_handler` to see the dispatch decisions.

use lambda_correlation::{
    enable_correlation_ids, inject_correlation_ids, use_correlation_ids, Handler,
    InvocationContext, CALL_CHAIN_LENGTH, X_CORRELATION_ID,
};
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Span fields are only visible with a formatter that prints span context
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let handler = Handler::new(handler)
        .with_hook(enable_correlation_ids(None))
        .before(|_| inject_correlation_ids(&tracing::Span::current()));

    // First hop: an HTTP request without correlation headers
    let http_event = json!({
        "version": "2.0",
        "requestContext": { "http": { "method": "POST", "path": "/orders" } },
        "headers": { "content-type": "application/json" }
    });
    let queue_event = handler
        .call(http_event, InvocationContext::new("http-invocation-1"))
        .await
        .unwrap();

    // Second hop: the queue message the first hop would have published
    let stream_event = handler
        .call(queue_event, InvocationContext::new("sqs-invocation-1"))
        .await
        .unwrap();

    tracing::info!(event = %stream_event, "Final downstream event");
}

/// Builds the SQS event a downstream consumer would receive
async fn handler(_event: Value, _context: InvocationContext) -> Result<Value, Infallible> {
    let ids = use_correlation_ids();
    tracing::info!("Handling invocation");

    let attribute = |key: &str| {
        json!({ "stringValue": ids.get(key).unwrap_or_default(), "dataType": "String" })
    };

    Ok(json!({
        "Records": [{
            "messageId": "demo-message",
            "body": "{}",
            "messageAttributes": {
                "x-correlation-id": attribute(X_CORRELATION_ID),
                "call-chain-length": attribute(CALL_CHAIN_LENGTH)
            }
        }]
    }))
}
