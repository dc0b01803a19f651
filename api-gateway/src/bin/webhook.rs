//! Webhook Lambda - Inbound job notifications.
//!
//! Endpoints:
//! - POST /webhook/bedrock-job-monitor - Relay a knowledge-base ingestion job update

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use reqwest::Method;
use serde_json::{Map, Value};
use shared::http::{empty_response, finish, relay, route_path};
use shared::{AppState, TokenStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SECRET_HEADER: &str = "x-webhook-secret";

/// Parse the raw body ourselves so every failure gets a precise message.
fn parse_job_update(body: &Body) -> shared::Result<Map<String, Value>> {
    let text = std::str::from_utf8(body.as_ref())
        .map_err(|_| shared::Error::Validation("Body must be UTF-8 text".to_string()))?;
    if text.trim().is_empty() {
        return Err(shared::Error::Validation("Request body is required".to_string()));
    }

    let mut update = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            return Err(shared::Error::Validation(
                "Body must be a JSON object".to_string(),
            ))
        }
        Err(e) => {
            return Err(shared::Error::Validation(format!(
                "Body is not valid JSON: {}",
                e
            )))
        }
    };

    for field in ["jobId", "status"] {
        let value = match update.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                return Err(shared::Error::Validation(format!(
                    "{} must be a non-empty string",
                    field
                )))
            }
        };
        update.insert(field.to_string(), Value::String(value));
    }

    Ok(update)
}

fn check_secret(state: &AppState, event: &Request) -> shared::Result<()> {
    let Some(expected) = state.config.webhook_secret.as_deref() else {
        return Ok(());
    };

    let provided = event
        .headers()
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        warn!("Rejected webhook with missing or wrong secret");
        return Err(shared::Error::Unauthorized(
            "Invalid webhook secret".to_string(),
        ));
    }
    Ok(())
}

async fn job_monitor(
    state: &AppState,
    event: &Request,
    tokens: &TokenStore,
) -> shared::Result<Response<Body>> {
    check_secret(state, event)?;
    let update = parse_job_update(event.body())?;

    info!(
        "Job update: jobId={} status={}",
        update["jobId"].as_str().unwrap_or_default(),
        update["status"].as_str().unwrap_or_default()
    );

    let normalized = state
        .backend
        .send_json(
            Method::POST,
            "/webhook/bedrock-job-monitor",
            tokens.access(),
            Value::Object(update),
        )
        .await?;

    match normalized.status {
        202 | 204 => Ok(empty_response(normalized.status)),
        _ => relay(&normalized),
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let tokens = state.tokens(&event);
    let path = route_path(&event);
    let method = event.method().as_str();

    info!("Webhook request: {} {}", method, path);

    let result = match (method, path.as_str()) {
        ("POST", "/webhook/bedrock-job-monitor") => job_monitor(&state, &event, &tokens).await,
        _ => Err(shared::Error::NotFound("Not found".to_string())),
    };

    finish(result, tokens)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::from_env()?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
