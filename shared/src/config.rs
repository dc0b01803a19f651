//! Configuration management for Lambda functions.

use std::env;

use crate::{Error, Result};

const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the voice-agent backend, without trailing slash
    pub backend_url: String,
    /// Mark auth cookies `Secure`
    pub secure_cookies: bool,
    /// Shared secret expected on webhook ingress
    pub webhook_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let backend_url = env::var("BACKEND_URL")
            .or_else(|_| env::var("NEXT_PUBLIC_BACKEND_URL"))
            .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string());

        let environment = env::var("APP_ENV")
            .or_else(|_| env::var("NODE_ENV"))
            .unwrap_or_default();

        Ok(Self {
            backend_url: normalize_base_url(&backend_url)?,
            secure_cookies: environment == "production",
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
        })
    }

    /// Development configuration pointing at the given backend.
    pub fn for_backend(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
            secure_cookies: false,
            webhook_secret: None,
        }
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let url = reqwest::Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("Invalid backend URL {:?}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "Backend URL must be http or https, got {}",
            url.scheme()
        )));
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}
