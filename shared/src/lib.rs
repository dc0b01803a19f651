//! Shared library for the Reacherr relay Lambda functions.
//!
//! Every route handler is a thin relay: validate the request, call the
//! voice-agent backend with the session's bearer token, and hand back the
//! normalized response. Session tokens live in cookies, never in memory.

pub mod auth;
pub mod backend;
pub mod config;
pub mod cookies;
pub mod error;
pub mod http;
pub mod knowledge;
pub mod models;
pub mod normalize;
pub mod state;
pub mod validate;

pub use auth::{decode_claims, resolve_auth, SessionClaims};
pub use backend::{BackendClient, Payload};
pub use config::Config;
pub use cookies::TokenStore;
pub use error::{Error, Result};
pub use models::{AuthResponse, ChallengeType, ClientAuthResult, CredentialPair};
pub use normalize::NormalizedResponse;
pub use state::AppState;
