//! LLM Lambda - Language-model configuration updates.
//!
//! Endpoints:
//! - PATCH /llm/update?llmId - Update an LLM config

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use reqwest::Method;
use serde_json::Value;
use shared::http::{finish, parse_object_body, query_param, relay, route_path};
use shared::models::ensure_end_call_tool;
use shared::validate::require_uuid;
use shared::{AppState, TokenStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn update(
    state: &AppState,
    event: &Request,
    tokens: &TokenStore,
) -> shared::Result<Response<Body>> {
    let llm_id = query_param(event, "llmId");
    let llm_id = require_uuid(llm_id.as_deref(), "llmId")?;

    let mut body = parse_object_body(event.body())?;
    ensure_end_call_tool(&mut body);

    let normalized = state
        .backend
        .send_json(
            Method::PATCH,
            &format!("/llm/{}", llm_id),
            tokens.access(),
            Value::Object(body),
        )
        .await?;

    relay(&normalized)
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let tokens = state.tokens(&event);
    let path = route_path(&event);
    let method = event.method().as_str();

    info!("LLM request: {} {}", method, path);

    let result = match (method, path.as_str()) {
        ("PATCH", "/llm/update") => update(&state, &event, &tokens).await,
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

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::http;
    use serde_json::json;
    use shared::Config;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LLM_ID: &str = "6ec0bd7f-11c0-43da-975e-2a8ad9ebae0b";

    fn request(uri: &str, body: &str) -> Request {
        http::Request::builder()
            .method("PATCH")
            .uri(uri)
            .header("content-type", "application/json")
            .header("cookie", "accessToken=tok")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_update_appends_end_call_tool() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("/llm/{}", LLM_ID)))
            .and(body_json(json!({
                "generalPrompt": "Be brief.",
                "generalTools": [
                    { "type": "transfer_call", "number": "+15550100" },
                    shared::models::end_call_tool(),
                ],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "llmId": LLM_ID })))
            .expect(1)
            .mount(&server)
            .await;

        let state = Arc::new(AppState::new(Config::for_backend(server.uri())));
        let body = json!({
            "generalPrompt": "Be brief.",
            "generalTools": [{ "type": "transfer_call", "number": "+15550100" }],
        });
        let response = handler(
            state,
            request(&format!("/api/llm/update?llmId={}", LLM_ID), &body.to_string()),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_update_rejects_missing_id() {
        let state = Arc::new(AppState::new(Config::for_backend("http://127.0.0.1:1")));
        let response = handler(state, request("/api/llm/update", "{}")).await.unwrap();

        assert_eq!(response.status(), 400);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["message"], "llmId is required");
    }

    #[tokio::test]
    async fn test_update_rejects_non_object_body() {
        let state = Arc::new(AppState::new(Config::for_backend("http://127.0.0.1:1")));
        let response = handler(
            state,
            request(&format!("/api/llm/update?llmId={}", LLM_ID), "[\"x\"]"),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 400);
    }
}
