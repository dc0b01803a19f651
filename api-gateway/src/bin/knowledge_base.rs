//! Knowledge Base Lambda - Knowledge bases and their sources.
//!
//! Endpoints:
//! - GET /knowledge-base - List knowledge bases
//! - POST /knowledge-base - Create a knowledge base (multipart)
//! - POST /knowledge-base/sitemap - Discover URLs from a sitemap
//! - GET /knowledge-base/{id} - Get a knowledge base
//! - DELETE /knowledge-base/{id} - Delete a knowledge base
//! - POST /knowledge-base/{id}/sources - Add sources (multipart)
//! - GET /knowledge-base/{id}/sources/{sourceId} - Get a source
//! - DELETE /knowledge-base/{id}/sources/{sourceId} - Delete a source

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use reqwest::{Method, Url};
use serde_json::Value;
use shared::http::{finish, parse_object_body, relay, route_path, segments};
use shared::knowledge::SourceBundle;
use shared::validate::require_uuid;
use shared::{AppState, Payload, TokenStore};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use validator::Validate;

/// Request body for sitemap discovery
#[derive(Debug, Validate)]
struct SitemapRequest {
    #[validate(url)]
    url: String,
}

impl SitemapRequest {
    fn check(&self) -> shared::Result<()> {
        let invalid = || shared::Error::Validation("url must be a valid http(s) URL".to_string());

        self.validate().map_err(|_| invalid())?;
        let parsed = Url::parse(&self.url).map_err(|_| invalid())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid());
        }
        Ok(())
    }
}

async fn read_sources(event: &Request) -> shared::Result<SourceBundle> {
    SourceBundle::from_multipart(event.headers(), event.body().as_ref()).await
}

async fn create(
    state: &AppState,
    event: &Request,
    tokens: &TokenStore,
) -> shared::Result<Response<Body>> {
    let bundle = read_sources(event).await?;
    if bundle.name.is_none() {
        return Err(shared::Error::Validation(
            "Knowledge base name is required.".to_string(),
        ));
    }

    let normalized = state
        .backend
        .call(
            Method::POST,
            "/knowledge-base",
            tokens.access(),
            Payload::Multipart(bundle.into_form()?),
        )
        .await?;

    relay(&normalized)
}

async fn add_sources(
    state: &AppState,
    event: &Request,
    knowledge_base_id: &str,
    tokens: &TokenStore,
) -> shared::Result<Response<Body>> {
    let knowledge_base_id = require_uuid(Some(knowledge_base_id), "knowledgeBaseId")?;

    let mut bundle = read_sources(event).await?;
    bundle.require_sources()?;
    // The target is in the path; a stray name field is not forwarded.
    bundle.name = None;

    let normalized = state
        .backend
        .call(
            Method::POST,
            &format!("/knowledge-base/{}/sources", knowledge_base_id),
            tokens.access(),
            Payload::Multipart(bundle.into_form()?),
        )
        .await?;

    relay(&normalized)
}

async fn sitemap(
    state: &AppState,
    event: &Request,
    tokens: &TokenStore,
) -> shared::Result<Response<Body>> {
    let mut body = parse_object_body(event.body())?;
    let url = match body.get("url") {
        Some(Value::String(url)) if !url.trim().is_empty() => url.trim().to_string(),
        _ => return Err(shared::Error::Validation("url is required".to_string())),
    };

    let request = SitemapRequest { url };
    request.check()?;
    body.insert("url".to_string(), Value::String(request.url));

    let normalized = state
        .backend
        .send_json(
            Method::POST,
            "/knowledge-base/sitemap",
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

    info!("Knowledge base request: {} {}", method, path);

    let normalized = match (method, segments(&path).as_slice()) {
        ("GET", ["knowledge-base"]) => state.backend.get("/knowledge-base", tokens.access()).await?,
        ("POST", ["knowledge-base"]) => return create(state, event, tokens).await,
        ("POST", ["knowledge-base", "sitemap"]) => return sitemap(state, event, tokens).await,
        ("GET", ["knowledge-base", id]) => {
            let id = require_uuid(Some(*id), "knowledgeBaseId")?;
            state
                .backend
                .get(&format!("/knowledge-base/{}", id), tokens.access())
                .await?
        }
        ("DELETE", ["knowledge-base", id]) => {
            let id = require_uuid(Some(*id), "knowledgeBaseId")?;
            state
                .backend
                .delete(&format!("/knowledge-base/{}", id), tokens.access())
                .await?
        }
        ("POST", ["knowledge-base", id, "sources"]) => {
            return add_sources(state, event, id, tokens).await
        }
        ("GET", ["knowledge-base", id, "sources", source_id]) => {
            let id = require_uuid(Some(*id), "knowledgeBaseId")?;
            let source_id = require_uuid(Some(*source_id), "sourceId")?;
            state
                .backend
                .get(
                    &format!("/knowledge-base/{}/sources/{}", id, source_id),
                    tokens.access(),
                )
                .await?
        }
        ("DELETE", ["knowledge-base", id, "sources", source_id]) => {
            let id = require_uuid(Some(*id), "knowledgeBaseId")?;
            let source_id = require_uuid(Some(*source_id), "sourceId")?;
            state
                .backend
                .delete(
                    &format!("/knowledge-base/{}/sources/{}", id, source_id),
                    tokens.access(),
                )
                .await?
        }
        _ => return Err(shared::Error::NotFound("Not found".to_string())),
    };

    relay(&normalized)
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
