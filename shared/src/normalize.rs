//! Uniform view of a backend response.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

const EMPTY_RESPONSE: &str = "Empty response";
const UNREADABLE_RESPONSE: &str = "Failed to read response body";

/// `{ok, status, data}` where `ok` mirrors the 2xx class of `status` and
/// `data` is the parsed JSON body or a `{message}` stand-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedResponse {
    pub ok: bool,
    pub status: u16,
    pub data: Value,
}

impl NormalizedResponse {
    pub fn from_parts(status: u16, text: &str) -> Self {
        let data = if text.trim().is_empty() {
            json!({ "message": EMPTY_RESPONSE })
        } else {
            serde_json::from_str(text).unwrap_or_else(|_| json!({ "message": text }))
        };

        Self {
            ok: (200..300).contains(&status),
            status,
            data,
        }
    }

    /// Consume the response body exactly once. Never fails.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        match response.text().await {
            Ok(text) => Self::from_parts(status, &text),
            Err(e) => {
                warn!("Failed to read backend response body (status {}): {}", status, e);
                Self {
                    ok: (200..300).contains(&status),
                    status,
                    data: json!({ "message": UNREADABLE_RESPONSE }),
                }
            }
        }
    }

    /// `data.message` when the body carried one.
    pub fn message(&self) -> Option<&str> {
        self.data.get("message").and_then(Value::as_str)
    }
}
