//! Shared data models.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const END_CALL_TOOL_TYPE: &str = "end_call";

/// Access and refresh bearer tokens, always stored and cleared together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Completed login issued by the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwtResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl JwtResponse {
    pub fn credentials(&self) -> CredentialPair {
        CredentialPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Kind of verification still required before login completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChallengeType {
    Email,
    Phone,
    AddPhone,
}

/// Pending verification step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub challenge_token: String,
    pub challenge_type: ChallengeType,
    #[serde(default)]
    pub target: Option<String>,
}

/// Either a completed login or a pending challenge, never both.
#[derive(Debug, Clone)]
pub enum AuthResponse {
    Jwt(JwtResponse),
    Challenge(ChallengeResponse),
}

impl AuthResponse {
    /// Classify a backend payload. A non-empty string `accessToken` selects the
    /// JWT variant, which then needs both tokens to be usable cookie values.
    /// Null or missing tokens fall through to the challenge parse.
    pub fn from_value(payload: &Value) -> Option<Self> {
        let has_access_token = payload
            .get("accessToken")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());

        if has_access_token {
            let jwt: JwtResponse = serde_json::from_value(payload.clone()).ok()?;
            if !is_cookie_value(&jwt.access_token) || !is_cookie_value(&jwt.refresh_token) {
                return None;
            }
            return Some(AuthResponse::Jwt(jwt));
        }

        let challenge: ChallengeResponse = serde_json::from_value(payload.clone()).ok()?;
        if challenge.challenge_token.is_empty() {
            return None;
        }
        Some(AuthResponse::Challenge(challenge))
    }
}

/// Non-empty and made only of RFC 6265 cookie-octets, so it can be written
/// into a `Set-Cookie` header as-is.
pub fn is_cookie_value(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E))
}

/// What the browser learns about an auth step. Tokens never leave the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ClientAuthResult {
    #[serde(rename = "JWT")]
    Jwt,
    #[serde(rename = "CHALLENGE", rename_all = "camelCase")]
    Challenge {
        challenge_token: String,
        challenge_type: ChallengeType,
        target: String,
    },
}

/// Tool every LLM config carries so the agent can hang up.
pub fn end_call_tool() -> Value {
    json!({
        "type": END_CALL_TOOL_TYPE,
        "name": END_CALL_TOOL_TYPE,
        "description": "End the call when the conversation is complete or the caller asks to hang up.",
    })
}

/// Append the end-call tool to an existing `generalTools` array that lacks it.
/// Bodies without that array are left alone.
pub fn ensure_end_call_tool(config: &mut Map<String, Value>) {
    let Some(Value::Array(tools)) = config.get_mut("generalTools") else {
        return;
    };

    let present = tools
        .iter()
        .any(|tool| tool.get("type").and_then(Value::as_str) == Some(END_CALL_TOOL_TYPE));
    if !present {
        tools.push(end_call_tool());
    }
}
