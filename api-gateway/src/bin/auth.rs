//! Auth Lambda - Session lifecycle for the dashboard.
//!
//! Endpoints:
//! - POST /auth/oauth-callback - Complete OAuth login or surface a challenge
//! - POST /auth/refresh - Rotate tokens using the refresh cookie
//! - POST /auth/signout - Clear the session
//! - POST /auth/verify-email - Answer an email challenge
//! - POST /auth/verify-phone - Answer a phone challenge
//! - POST /auth/add-phone - Attach a phone number during login
//! - GET /auth/session - Decode the current access token

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use shared::http::{finish, json_response, message_response, parse_json_body, relay, route_path};
use shared::validate::normalize_phone;
use shared::{decode_claims, resolve_auth, AppState, AuthResponse, TokenStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Verification code submission
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest {
    challenge_token: Option<String>,
    code: Option<String>,
}

/// Phone number submission during login
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddPhoneRequest {
    challenge_token: Option<String>,
    phone_number: Option<String>,
}

fn required(value: Option<String>, field: &str) -> shared::Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| shared::Error::Validation(format!("{} is required", field)))
}

/// Classify a 2xx backend body; anything unrecognized is contract drift.
fn expect_auth_response(data: &Value) -> shared::Result<AuthResponse> {
    AuthResponse::from_value(data).ok_or_else(|| {
        shared::Error::UpstreamContract("Unexpected authentication response".to_string())
    })
}

fn oauth_callback(event: &Request, tokens: &mut TokenStore) -> shared::Result<Response<Body>> {
    let payload: Value = parse_json_body(event.body())?;

    let Some(auth) = AuthResponse::from_value(&payload) else {
        return message_response(400, "Invalid authentication payload");
    };

    let result = resolve_auth(&auth, tokens, None);
    info!("OAuth callback resolved");
    json_response(200, &result)
}

async fn refresh(state: &AppState, tokens: &mut TokenStore) -> shared::Result<Response<Body>> {
    let Some(refresh_token) = tokens.refresh().map(str::to_string) else {
        return message_response(401, "No refresh token");
    };

    let normalized = state
        .backend
        .send_json(
            Method::POST,
            "/auth/refresh",
            tokens.access(),
            json!({ "refreshToken": refresh_token }),
        )
        .await?;

    if !normalized.ok {
        warn!("Token refresh rejected with status {}", normalized.status);
        return relay(&normalized);
    }

    match expect_auth_response(&normalized.data)? {
        AuthResponse::Jwt(jwt) => {
            tokens.set(&jwt.credentials());
            message_response(200, "Token refreshed")
        }
        AuthResponse::Challenge(_) => Err(shared::Error::UpstreamContract(
            "Refresh returned a challenge instead of tokens".to_string(),
        )),
    }
}

async fn signout(state: &AppState, tokens: &mut TokenStore) -> shared::Result<Response<Body>> {
    // The local session ends whatever the backend says.
    match state
        .backend
        .send_json(
            Method::POST,
            "/auth/signout",
            tokens.access(),
            json!({ "refreshToken": tokens.refresh() }),
        )
        .await
    {
        Ok(normalized) if !normalized.ok => {
            warn!("Backend signout returned status {}", normalized.status)
        }
        Ok(_) => {}
        Err(e) => warn!("Backend signout failed: {}", e),
    }

    tokens.clear();
    message_response(200, "Logged out")
}

async fn verify(
    state: &AppState,
    event: &Request,
    tokens: &mut TokenStore,
    backend_path: &str,
) -> shared::Result<Response<Body>> {
    let request: VerifyRequest = parse_json_body(event.body())?;
    let challenge_token = required(request.challenge_token, "challengeToken")?;
    let code = required(request.code, "code")?;

    let normalized = state
        .backend
        .send_json(
            Method::POST,
            backend_path,
            tokens.access(),
            json!({ "challengeToken": challenge_token, "code": code }),
        )
        .await?;

    if !normalized.ok {
        return relay(&normalized);
    }

    let auth = expect_auth_response(&normalized.data)?;
    let result = resolve_auth(&auth, tokens, None);

    if matches!(auth, AuthResponse::Jwt(_)) && tokens.phone_target().is_some() {
        tokens.clear_phone_target();
    }

    json_response(200, &result)
}

async fn add_phone(
    state: &AppState,
    event: &Request,
    tokens: &mut TokenStore,
) -> shared::Result<Response<Body>> {
    let request: AddPhoneRequest = parse_json_body(event.body())?;
    let challenge_token = required(request.challenge_token, "challengeToken")?;
    let raw_phone = required(request.phone_number, "phoneNumber")?;
    let phone = normalize_phone(&raw_phone).ok_or_else(|| {
        shared::Error::Validation("phoneNumber must be a valid phone number".to_string())
    })?;

    let normalized = state
        .backend
        .send_json(
            Method::POST,
            "/auth/add-phone",
            tokens.access(),
            json!({ "challengeToken": challenge_token, "phoneNumber": phone }),
        )
        .await?;

    if !normalized.ok {
        return relay(&normalized);
    }

    let auth = expect_auth_response(&normalized.data)?;
    if let AuthResponse::Challenge(_) = auth {
        tokens.set_phone_target(&phone);
    }

    let result = resolve_auth(&auth, tokens, Some(&phone));
    json_response(200, &result)
}

fn session(tokens: &TokenStore) -> shared::Result<Response<Body>> {
    let anonymous = json!({ "authenticated": false });

    let Some(token) = tokens.access() else {
        return json_response(200, &anonymous);
    };

    match decode_claims(token) {
        Ok(claims) if !claims.is_expired(chrono::Utc::now().timestamp()) => json_response(
            200,
            &json!({
                "authenticated": true,
                "userId": claims.user_id(),
                "username": claims.display_name(),
                "expiresAt": claims.exp,
            }),
        ),
        Ok(_) => json_response(200, &anonymous),
        Err(e) => {
            warn!("Access token could not be decoded: {}", e);
            json_response(200, &anonymous)
        }
    }
}

async fn route(
    state: &AppState,
    event: &Request,
    tokens: &mut TokenStore,
) -> shared::Result<Response<Body>> {
    let path = route_path(event);
    let method = event.method().as_str();

    info!("Auth request: {} {}", method, path);

    match (method, path.as_str()) {
        ("POST", "/auth/oauth-callback") => oauth_callback(event, tokens),
        ("POST", "/auth/refresh") => refresh(state, tokens).await,
        ("POST", "/auth/signout") => signout(state, tokens).await,
        ("POST", "/auth/verify-email") => verify(state, event, tokens, "/auth/verify-email").await,
        ("POST", "/auth/verify-phone") => verify(state, event, tokens, "/auth/verify-phone").await,
        ("POST", "/auth/add-phone") => add_phone(state, event, tokens).await,
        ("GET", "/auth/session") => session(tokens),
        _ => Err(shared::Error::NotFound("Not found".to_string())),
    }
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let mut tokens = state.tokens(&event);
    let result = route(&state, &event, &mut tokens).await;
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
