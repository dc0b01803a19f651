//! HTTP helpers for Lambda functions.

use lambda_http::http::header::{HeaderValue, CONTENT_TYPE};
use lambda_http::http::StatusCode;
use lambda_http::{Body, Request, RequestExt, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::error;

use crate::cookies::TokenStore;
use crate::normalize::NormalizedResponse;
use crate::{Error, Result};

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY)
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(code: u16, data: &T) -> Result<Response<Body>> {
    let mut response = Response::new(Body::from(serde_json::to_string(data)?));
    *response.status_mut() = status(code);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

/// `{message}` response.
pub fn message_response(code: u16, message: impl Into<String>) -> Result<Response<Body>> {
    json_response(code, &json!({ "message": message.into() }))
}

/// Response with a status and no body.
pub fn empty_response(code: u16) -> Response<Body> {
    let mut response = Response::new(Body::Empty);
    *response.status_mut() = status(code);
    response
}

/// Forward the backend's status and body as-is. A 204 stays bodyless.
pub fn relay(normalized: &NormalizedResponse) -> Result<Response<Body>> {
    if normalized.status == 204 {
        return Ok(empty_response(204));
    }
    json_response(normalized.status, &normalized.data)
}

/// Parse request body as JSON, failing with a 400 on empty or bad input.
pub fn parse_json_body<T: DeserializeOwned>(body: &Body) -> Result<T> {
    let bytes: &[u8] = body.as_ref();
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(Error::Validation("Request body is required".to_string()));
    }

    serde_json::from_slice(bytes)
        .map_err(|e| Error::Validation(format!("Invalid JSON body: {}", e)))
}

/// Parse a body that must be a JSON object.
pub fn parse_object_body(body: &Body) -> Result<Map<String, Value>> {
    match parse_json_body::<Value>(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::Validation("Request body must be a JSON object".to_string())),
    }
}

/// Look up a query parameter from the Lambda query map, falling back to the
/// raw URI query string (locally invoked requests only carry the latter).
pub fn query_param(event: &Request, name: &str) -> Option<String> {
    if let Some(value) = event.query_string_parameters_ref().and_then(|q| q.first(name)) {
        return Some(value.to_string());
    }

    event.uri().query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = urlencoding::decode(&key.replace('+', " ")).ok()?.into_owned();
        if key != name {
            return None;
        }
        urlencoding::decode(&value.replace('+', " "))
            .ok()
            .map(|v| v.into_owned())
    })
}

/// Request path with the `/api` stage prefix and trailing slashes removed.
pub fn route_path(event: &Request) -> String {
    let raw_path = event.uri().path();
    let path = raw_path.strip_prefix("/api").unwrap_or(raw_path);
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

/// Path split into non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Turn a handler outcome into the Lambda response, flushing cookie writes.
///
/// Cookie writes made before a handler error still reach the browser. A cookie
/// that cannot be written turns the response into a 500; the invocation itself
/// never fails.
pub fn finish(
    result: Result<Response<Body>>,
    tokens: TokenStore,
) -> std::result::Result<Response<Body>, lambda_http::Error> {
    let mut response = result.unwrap_or_else(|e| {
        if e.status_code() >= 500 {
            error!("Request failed: {}", e);
        }
        e.into_response()
    });

    if let Err(e) = tokens.apply(&mut response) {
        error!("Failed to write cookies: {}", e);
        response = e.into_response();
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::http;

    fn request(uri: &str) -> Request {
        http::Request::builder().uri(uri).body(Body::Empty).unwrap()
    }

    #[test]
    fn test_query_param_from_uri() {
        let event = request("/api/agents/dashboard?page=-5&size=10000&name=a%20b+c");
        assert_eq!(query_param(&event, "page").as_deref(), Some("-5"));
        assert_eq!(query_param(&event, "size").as_deref(), Some("10000"));
        assert_eq!(query_param(&event, "name").as_deref(), Some("a b c"));
        assert_eq!(query_param(&event, "missing"), None);
    }

    #[test]
    fn test_route_path_strips_stage_and_slashes() {
        assert_eq!(route_path(&request("/api/templates/")), "/templates");
        assert_eq!(route_path(&request("/templates")), "/templates");
        assert_eq!(route_path(&request("/api")), "/");
    }

    #[test]
    fn test_parse_json_body_errors_are_validation() {
        assert!(matches!(
            parse_json_body::<Value>(&Body::Empty),
            Err(Error::Validation(msg)) if msg == "Request body is required"
        ));
        assert!(matches!(
            parse_json_body::<Value>(&Body::from("{oops")),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            parse_object_body(&Body::from("[1,2]")),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_relay_keeps_status_and_body() {
        let normalized = NormalizedResponse::from_parts(409, r#"{"message":"exists"}"#);
        let response = relay(&normalized).unwrap();
        assert_eq!(response.status(), 409);

        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["message"], "exists");
    }

    #[test]
    fn test_relay_no_content_has_no_body() {
        let normalized = NormalizedResponse::from_parts(204, "");
        let response = relay(&normalized).unwrap();

        assert_eq!(response.status(), 204);
        assert!(response.body().is_empty());
        assert!(response.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_finish_survives_unwritable_cookie() {
        let mut tokens = TokenStore::from_headers(&http::HeaderMap::new(), false);
        tokens.set(&crate::CredentialPair {
            access_token: "a\nb".into(),
            refresh_token: "c".into(),
        });

        let response = finish(message_response(200, "ok"), tokens).unwrap();
        assert_eq!(response.status(), 500);
    }

    #[test]
    fn test_finish_renders_errors_and_cookies() {
        let mut tokens = TokenStore::from_headers(&http::HeaderMap::new(), false);
        tokens.clear();

        let response = finish(Err(Error::Validation("bad".into())), tokens).unwrap();
        assert_eq!(response.status(), 400);
        assert_eq!(response.headers().get_all(http::header::SET_COOKIE).iter().count(), 2);
    }
}
