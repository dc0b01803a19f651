//! Per-process state shared across invocations.

use lambda_http::Request;

use crate::backend::BackendClient;
use crate::cookies::TokenStore;
use crate::{Config, Result};

/// Built once per cold start; immutable afterwards.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
    pub backend: BackendClient,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let backend = BackendClient::new(config.backend_url.clone());
        Self { config, backend }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Config::from_env()?))
    }

    /// Token store for one request.
    pub fn tokens(&self, event: &Request) -> TokenStore {
        TokenStore::from_headers(event.headers(), self.config.secure_cookies)
    }
}
