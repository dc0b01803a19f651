//! JWT payload decoding and auth-step resolution.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::cookies::TokenStore;
use crate::models::{AuthResponse, ChallengeType, ClientAuthResult};
use crate::Result;

/// Claims carried by a backend access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// Subject (user id)
    pub sub: Option<String>,
    /// Explicit user id claim, preferred over `sub` when present
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Expiration (seconds since epoch)
    #[serde(default)]
    pub exp: Option<i64>,
}

impl SessionClaims {
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().or(self.sub.as_deref())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.username.as_deref().or(self.email.as_deref())
    }

    /// A token without `exp` never expires as far as the relay is concerned.
    pub fn is_expired(&self, now: i64) -> bool {
        self.exp.is_some_and(|exp| exp <= now)
    }
}

/// Decode a token's payload without verifying its signature.
///
/// The relay never authorizes anything from these claims; the backend
/// verifies the token on every call. This is only for display.
pub fn decode_claims(token: &str) -> Result<SessionClaims> {
    let token = token.strip_prefix("Bearer ").unwrap_or(token);

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let key = DecodingKey::from_secret(b"unused");

    let token_data = decode::<SessionClaims>(token, &key, &validation)?;
    Ok(token_data.claims)
}

/// Turn a classified backend payload into the browser-facing result,
/// persisting tokens when login completed.
///
/// Challenge target: the explicit one, else the pending phone number for
/// phone challenges, else empty.
pub fn resolve_auth(
    response: &AuthResponse,
    tokens: &mut TokenStore,
    target: Option<&str>,
) -> ClientAuthResult {
    match response {
        AuthResponse::Jwt(jwt) => {
            tokens.set(&jwt.credentials());
            ClientAuthResult::Jwt
        }
        AuthResponse::Challenge(challenge) => {
            let target = target
                .or(challenge.target.as_deref())
                .or(match challenge.challenge_type {
                    ChallengeType::Phone => tokens.phone_target(),
                    _ => None,
                })
                .unwrap_or_default()
                .to_string();

            ClientAuthResult::Challenge {
                challenge_token: challenge.challenge_token.clone(),
                challenge_type: challenge.challenge_type,
                target,
            }
        }
    }
}
