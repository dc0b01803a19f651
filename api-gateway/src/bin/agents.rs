//! Agents Lambda - Voice agent management.
//!
//! Endpoints:
//! - POST /agents/create-blank - Create LLM config, pick a voice, create the agent
//! - POST /agents/create-from-template/{templateId} - Clone a template
//! - GET /agents/dashboard?page&size - Paged agent list
//! - PATCH /agents/update?agentId - Update an agent
//! - GET /agents/{agentId} - Get agent details
//! - DELETE /agents/{agentId} - Delete an agent

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::http::{
    finish, json_response, parse_json_body, parse_object_body, query_param, relay, route_path,
    segments,
};
use shared::models::end_call_tool;
use shared::validate::{require_uuid, Pagination};
use shared::{AppState, TokenStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Used when the backend lists no voices at all.
const FALLBACK_VOICE_ID: &str = "11labs-Adrian";
const DEFAULT_AGENT_NAME: &str = "Untitled Agent";

/// Optional body for blank agent creation
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBlankRequest {
    agent_name: Option<String>,
}

fn blank_llm_config() -> Value {
    json!({
        "generalPrompt": "",
        "beginMessage": "",
        "generalTools": [end_call_tool()],
    })
}

/// Recommended voice first, then the first listed, then the built-in fallback.
fn pick_voice(voices: &Value) -> String {
    let list = voices
        .as_array()
        .or_else(|| voices.get("voices").and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or_default();

    let voice_id = |voice: &Value| {
        voice
            .get("voiceId")
            .or_else(|| voice.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    list.iter()
        .filter(|v| v.get("recommended").and_then(Value::as_bool).unwrap_or(false))
        .find_map(voice_id)
        .or_else(|| list.iter().find_map(voice_id))
        .unwrap_or_else(|| FALLBACK_VOICE_ID.to_string())
}

async fn create_blank(
    state: &AppState,
    event: &Request,
    tokens: &TokenStore,
) -> shared::Result<Response<Body>> {
    let request: CreateBlankRequest = if event.body().is_empty() {
        CreateBlankRequest::default()
    } else {
        parse_json_body(event.body())?
    };
    let agent_name = request
        .agent_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_AGENT_NAME.to_string());

    // 1. LLM config
    let llm = state
        .backend
        .send_json(Method::POST, "/llm", tokens.access(), blank_llm_config())
        .await?;
    if !llm.ok {
        warn!("LLM creation failed with status {}", llm.status);
        return relay(&llm);
    }
    let llm_id = llm
        .data
        .get("id")
        .or_else(|| llm.data.get("llmId"))
        .and_then(Value::as_str)
        .ok_or_else(|| {
            shared::Error::UpstreamContract("LLM creation response is missing an id".to_string())
        })?
        .to_string();

    // 2. Voice
    let voices = state.backend.get("/voices", tokens.access()).await?;
    if !voices.ok {
        warn!("Voice listing failed with status {} (llm {} left in place)", voices.status, llm_id);
        return relay(&voices);
    }
    let voice_id = pick_voice(&voices.data);

    // 3. Agent. Earlier steps are not rolled back if this fails.
    let agent = state
        .backend
        .send_json(
            Method::POST,
            "/agents",
            tokens.access(),
            json!({
                "agentName": agent_name,
                "llmId": llm_id,
                "voiceId": voice_id,
            }),
        )
        .await?;
    if !agent.ok {
        warn!("Agent creation failed with status {} (llm {} left in place)", agent.status, llm_id);
    } else {
        info!("Created blank agent with llm {} and voice {}", llm_id, voice_id);
    }

    relay(&agent)
}

async fn create_from_template(
    state: &AppState,
    template_id: &str,
    tokens: &TokenStore,
) -> shared::Result<Response<Body>> {
    let template_id = require_uuid(Some(template_id), "templateId")?;

    let normalized = state
        .backend
        .call(
            Method::POST,
            &format!("/templates/{}/agents", template_id),
            tokens.access(),
            shared::Payload::Empty,
        )
        .await?;

    relay(&normalized)
}

/// Pull the item array out of the two list shapes the backend uses.
fn list_items(data: &Value) -> Option<&Vec<Value>> {
    data.as_array().or_else(|| {
        data.get("content")
            .or_else(|| data.get("items"))
            .and_then(Value::as_array)
    })
}

async fn dashboard(
    state: &AppState,
    event: &Request,
    tokens: &TokenStore,
) -> shared::Result<Response<Body>> {
    let pagination = Pagination::from_query(
        query_param(event, "page").as_deref(),
        query_param(event, "size").as_deref(),
    );

    let normalized = state
        .backend
        .get(
            &format!("/agents?page={}&size={}", pagination.page, pagination.size),
            tokens.access(),
        )
        .await?;
    if !normalized.ok {
        return relay(&normalized);
    }

    let items = list_items(&normalized.data).ok_or_else(|| {
        shared::Error::UpstreamContract("Agent list response is not a list".to_string())
    })?;
    let next_page = pagination.next_page(items.len());

    json_response(
        200,
        &json!({
            "items": items,
            "page": pagination.page,
            "size": pagination.size,
            "hasMore": next_page.is_some(),
            "nextPage": next_page,
        }),
    )
}

async fn update(
    state: &AppState,
    event: &Request,
    tokens: &TokenStore,
) -> shared::Result<Response<Body>> {
    let agent_id = query_param(event, "agentId");
    let agent_id = require_uuid(agent_id.as_deref(), "agentId")?;
    let body = parse_object_body(event.body())?;

    let normalized = state
        .backend
        .send_json(
            Method::PATCH,
            &format!("/agents/{}", agent_id),
            tokens.access(),
            Value::Object(body),
        )
        .await?;

    relay(&normalized)
}

async fn route(
    state: &AppState,
    event: &Request,
    tokens: &TokenStore,
) -> shared::Result<Response<Body>> {
    let path = route_path(event);
    let method = event.method().as_str();

    info!("Agents request: {} {}", method, path);

    match (method, segments(&path).as_slice()) {
        ("POST", ["agents", "create-blank"]) => create_blank(state, event, tokens).await,
        ("POST", ["agents", "create-from-template", template_id]) => {
            create_from_template(state, template_id, tokens).await
        }
        ("GET", ["agents", "dashboard"]) => dashboard(state, event, tokens).await,
        ("PATCH", ["agents", "update"]) => update(state, event, tokens).await,
        ("GET", ["agents", agent_id]) => {
            let agent_id = require_uuid(Some(*agent_id), "agentId")?;
            let normalized = state
                .backend
                .get(&format!("/agents/{}", agent_id), tokens.access())
                .await?;
            relay(&normalized)
        }
        ("DELETE", ["agents", agent_id]) => {
            let agent_id = require_uuid(Some(*agent_id), "agentId")?;
            let normalized = state
                .backend
                .delete(&format!("/agents/{}", agent_id), tokens.access())
                .await?;
            relay(&normalized)
        }
        _ => Err(shared::Error::NotFound("Not found".to_string())),
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let tokens = state.tokens(&event);
    let result = route(&state, &event, &tokens).await;
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
    use shared::Config;
    use wiremock::matchers::{body_json, header, method, path, query_param as query};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AGENT_ID: &str = "0f8fad5b-d9cb-469f-a165-70867728950e";

    fn state_for(backend_url: &str) -> Arc<AppState> {
        Arc::new(AppState::new(Config::for_backend(backend_url)))
    }

    fn request(verb: &str, uri: &str, body: Option<Value>) -> Request {
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or(Body::Empty);
        http::Request::builder()
            .method(verb)
            .uri(uri)
            .header("content-type", "application/json")
            .header("cookie", "accessToken=tok; refreshToken=ref")
            .body(body)
            .unwrap()
    }

    fn json_of(response: &Response<Body>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[test]
    fn test_pick_voice_prefers_recommended() {
        let voices = json!([
            { "voiceId": "first" },
            { "voiceId": "star", "recommended": true },
        ]);
        assert_eq!(pick_voice(&voices), "star");
    }

    #[test]
    fn test_pick_voice_falls_back() {
        assert_eq!(pick_voice(&json!([{ "id": "only" }])), "only");
        assert_eq!(pick_voice(&json!({ "voices": [{ "voiceId": "nested" }] })), "nested");
        assert_eq!(pick_voice(&json!([])), FALLBACK_VOICE_ID);
        assert_eq!(pick_voice(&json!({ "unexpected": true })), FALLBACK_VOICE_ID);
    }

    #[tokio::test]
    async fn test_create_blank_runs_all_three_steps() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/llm"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(blank_llm_config()))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "llm-1" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/voices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "voiceId": "v-1" },
                { "voiceId": "v-2", "recommended": true },
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/agents"))
            .and(body_json(json!({
                "agentName": "Receptionist",
                "llmId": "llm-1",
                "voiceId": "v-2",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "agentId": "a-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let event = request(
            "POST",
            "/api/agents/create-blank",
            Some(json!({ "agentName": " Receptionist " })),
        );
        let response = handler(state_for(&server.uri()), event).await.unwrap();

        assert_eq!(response.status(), 201);
        assert_eq!(json_of(&response)["agentId"], "a-1");
    }

    #[tokio::test]
    async fn test_create_blank_short_circuits_on_llm_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/llm"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({ "message": "quota" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/voices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let response = handler(
            state_for(&server.uri()),
            request("POST", "/api/agents/create-blank", None),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 422);
        assert_eq!(json_of(&response)["message"], "quota");
    }

    #[tokio::test]
    async fn test_create_blank_without_llm_id_is_502() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/llm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "created": true })))
            .mount(&server)
            .await;

        let response = handler(
            state_for(&server.uri()),
            request("POST", "/api/agents/create-blank", None),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 502);
    }

    #[tokio::test]
    async fn test_create_blank_relays_agent_failure_without_rollback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/llm"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "llmId": "llm-9" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/voices"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/agents"))
            .and(body_json(json!({
                "agentName": DEFAULT_AGENT_NAME,
                "llmId": "llm-9",
                "voiceId": FALLBACK_VOICE_ID,
            })))
            .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let response = handler(
            state_for(&server.uri()),
            request("POST", "/api/agents/create-blank", None),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 500);
        assert_eq!(json_of(&response)["message"], "db down");
    }

    #[tokio::test]
    async fn test_dashboard_clamps_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agents"))
            .and(query("page", "0"))
            .and(query("size", "200"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{ "agentId": "a-1" }],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = handler(
            state_for(&server.uri()),
            request("GET", "/api/agents/dashboard?page=-5&size=10000", None),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            json_of(&response),
            json!({
                "items": [{ "agentId": "a-1" }],
                "page": 0,
                "size": 200,
                "hasMore": true,
                "nextPage": 1,
            })
        );
    }

    #[tokio::test]
    async fn test_dashboard_empty_page_has_no_next() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agents"))
            .and(query("page", "3"))
            .and(query("size", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let response = handler(
            state_for(&server.uri()),
            request("GET", "/api/agents/dashboard?page=3", None),
        )
        .await
        .unwrap();

        let body = json_of(&response);
        assert_eq!(body["nextPage"], Value::Null);
        assert_eq!(body["hasMore"], false);
    }

    #[tokio::test]
    async fn test_dashboard_rejects_unexpected_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/agents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "agents": "nope" })))
            .mount(&server)
            .await;

        let response = handler(
            state_for(&server.uri()),
            request("GET", "/api/agents/dashboard", None),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 502);
    }

    #[tokio::test]
    async fn test_update_requires_uuid() {
        let response = handler(
            state_for("http://127.0.0.1:1"),
            request("PATCH", "/api/agents/update?agentId=abc", Some(json!({ "agentName": "x" }))),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 400);
        assert_eq!(json_of(&response)["message"], "agentId must be a valid UUID");
    }

    #[tokio::test]
    async fn test_update_forwards_patch() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("/agents/{}", AGENT_ID)))
            .and(body_json(json!({ "agentName": "x" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "agentName": "x" })))
            .expect(1)
            .mount(&server)
            .await;

        let response = handler(
            state_for(&server.uri()),
            request(
                "PATCH",
                &format!("/api/agents/update?agentId={}", AGENT_ID),
                Some(json!({ "agentName": "x" })),
            ),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_create_from_template_validates_id() {
        let response = handler(
            state_for("http://127.0.0.1:1"),
            request("POST", "/api/agents/create-from-template/not-a-uuid", None),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_create_from_template_relays() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/templates/{}/agents", AGENT_ID)))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "agentId": "a-2" })))
            .expect(1)
            .mount(&server)
            .await;

        let response = handler(
            state_for(&server.uri()),
            request("POST", &format!("/api/agents/create-from-template/{}", AGENT_ID), None),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 201);
        assert_eq!(json_of(&response)["agentId"], "a-2");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = handler(
            state_for("http://127.0.0.1:1"),
            request("PUT", "/api/agents/dashboard", None),
        )
        .await
        .unwrap();

        assert_eq!(response.status(), 404);
    }
}
