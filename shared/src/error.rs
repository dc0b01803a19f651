//! Error types for the relay Lambda functions.

use lambda_http::http::header::{HeaderValue, CONTENT_TYPE};
use lambda_http::http::StatusCode;
use lambda_http::{Body, Response};
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while relaying a request to the backend.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or rejected credentials
    #[error("Authentication error: {0}")]
    Unauthorized(String),

    /// Unknown route or resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend answered 2xx with a body we cannot trust
    #[error("Unexpected backend response: {0}")]
    UpstreamContract(String),

    /// Backend could not be reached
    #[error("Backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Inbound multipart body could not be read
    #[error("Multipart error: {0}")]
    Multipart(#[from] multer::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Token payload could not be decoded
    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::Multipart(_) => 400,
            Error::Unauthorized(_) | Error::Jwt(_) => 401,
            Error::NotFound(_) => 404,
            Error::UpstreamContract(_) | Error::Transport(_) => 502,
            _ => 500,
        }
    }

    /// Message safe to hand back to the browser.
    pub fn client_message(&self) -> String {
        match self {
            Error::Validation(msg)
            | Error::Unauthorized(msg)
            | Error::NotFound(msg)
            | Error::UpstreamContract(msg) => msg.clone(),
            Error::Multipart(e) => format!("Invalid multipart body: {}", e),
            Error::Jwt(_) => "Invalid token".to_string(),
            Error::Transport(_) => "Backend unavailable".to_string(),
            _ => "Internal server error".to_string(),
        }
    }

    /// Render as a `{message}` JSON response. Never fails.
    pub fn into_response(self) -> Response<Body> {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::json!({ "message": self.client_message() }).to_string();

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
