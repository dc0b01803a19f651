//! Authenticated client for the voice-agent backend.

use reqwest::header::{AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::Method;
use serde_json::Value;
use tracing::error;

use crate::normalize::NormalizedResponse;
use crate::Result;

/// Outbound request body.
#[derive(Debug)]
pub enum Payload {
    Empty,
    Json(Value),
    /// Multipart bodies carry their own boundary content type.
    Multipart(Form),
}

/// Client for the external backend API.
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// Shared connection pool
    http_client: reqwest::Client,
    /// Base URL without trailing slash
    base_url: String,
}

impl BackendClient {
    /// Create a new backend client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue one request, attaching the bearer token when there is one.
    ///
    /// No retry, no refresh on 401 and no explicit timeout; the caller decides
    /// what a non-2xx status means.
    pub async fn fetch(
        &self,
        method: Method,
        path: &str,
        access_token: Option<&str>,
        payload: Payload,
    ) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mut request = self
            .http_client
            .request(method, self.url(path))
            .header(CACHE_CONTROL, "no-store");

        if let Some(token) = access_token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        request = match payload {
            Payload::Empty => request.header(CONTENT_TYPE, "application/json"),
            Payload::Json(body) => request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string()),
            Payload::Multipart(form) => request.multipart(form),
        };

        request.send().await
    }

    /// Fetch and normalize. Only a transport failure is an error here.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        access_token: Option<&str>,
        payload: Payload,
    ) -> Result<NormalizedResponse> {
        let response = self
            .fetch(method.clone(), path, access_token, payload)
            .await
            .map_err(|e| {
                error!("Backend {} {} failed: {}", method, path, e);
                e
            })?;

        Ok(NormalizedResponse::from_response(response).await)
    }

    /// GET convenience.
    pub async fn get(&self, path: &str, access_token: Option<&str>) -> Result<NormalizedResponse> {
        self.call(Method::GET, path, access_token, Payload::Empty).await
    }

    /// DELETE convenience.
    pub async fn delete(&self, path: &str, access_token: Option<&str>) -> Result<NormalizedResponse> {
        self.call(Method::DELETE, path, access_token, Payload::Empty).await
    }

    /// JSON-body convenience for POST/PATCH/PUT.
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        access_token: Option<&str>,
        body: Value,
    ) -> Result<NormalizedResponse> {
        self.call(method, path, access_token, Payload::Json(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_bearer_and_json_headers_attached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agents"))
            .and(header("authorization", "Bearer tok"))
            .and(header("content-type", "application/json"))
            .and(header("cache-control", "no-store"))
            .and(body_json(json!({ "agentName": "A" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "agent-1" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = BackendClient::new(server.uri());
        let normalized = client
            .send_json(Method::POST, "/agents", Some("tok"), json!({ "agentName": "A" }))
            .await
            .unwrap();

        assert!(normalized.ok);
        assert_eq!(normalized.data["id"], "agent-1");
    }

    #[tokio::test]
    async fn test_no_authorization_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/templates"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/templates"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = BackendClient::new(server.uri());
        let normalized = client.get("/templates", None).await.unwrap();
        assert_eq!(normalized.status, 200);
    }

    #[tokio::test]
    async fn test_non_2xx_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/knowledge-base/kb"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = BackendClient::new(server.uri());
        let normalized = client.delete("knowledge-base/kb", Some("tok")).await.unwrap();
        assert!(!normalized.ok);
        assert_eq!(normalized.status, 403);
        assert_eq!(normalized.message(), Some("forbidden"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        let client = BackendClient::new("http://127.0.0.1:1");
        let result = client.get("/templates", None).await;
        assert!(matches!(result, Err(crate::Error::Transport(_))));
    }
}
