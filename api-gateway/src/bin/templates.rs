//! Templates Lambda - Agent template catalogue.
//!
//! Endpoints:
//! - GET /templates - List templates

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::http::{finish, relay, route_path};
use shared::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let tokens = state.tokens(&event);
    let path = route_path(&event);
    let method = event.method().as_str();

    info!("Templates request: {} {}", method, path);

    let result = match (method, path.as_str()) {
        ("GET", "/templates") => match state.backend.get("/templates", tokens.access()).await {
            Ok(normalized) if normalized.ok && !normalized.data.is_array() => Err(
                shared::Error::UpstreamContract("Template list response is not a list".to_string()),
            ),
            Ok(normalized) => relay(&normalized),
            Err(e) => Err(e),
        },
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
