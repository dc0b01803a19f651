//! Phone Numbers Lambda - Telephony number search.
//!
//! Endpoints:
//! - POST /phone-numbers/available?page&size - Search purchasable numbers
//! - GET /phone-numbers - List numbers owned by the account

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::http::{finish, json_response, parse_json_body, query_param, relay, route_path};
use shared::validate::{CountryCode, Pagination, Provider};
use shared::{AppState, TokenStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Request body for number search
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailableRequest {
    country_code: Option<String>,
    provider: Option<String>,
    area_code: Option<String>,
}

/// Validated search sent to the backend
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailableSearch {
    country_code: CountryCode,
    provider: Provider,
    #[serde(skip_serializing_if = "Option::is_none")]
    area_code: Option<String>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct AvailableNumbers {
    numbers: Vec<String>,
    last: bool,
}

impl Default for AvailableNumbers {
    fn default() -> Self {
        Self {
            numbers: Vec::new(),
            last: true,
        }
    }
}

impl AvailableRequest {
    fn validate(self) -> shared::Result<AvailableSearch> {
        let country_code = match self.country_code.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(shared::Error::Validation("countryCode is required".to_string()))
            }
            Some(raw) => CountryCode::parse(raw).ok_or_else(|| {
                shared::Error::Validation(
                    "countryCode must be one of US, CA, IN, IT, FR".to_string(),
                )
            })?,
        };

        let provider = match self.provider.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(shared::Error::Validation("provider is required".to_string()))
            }
            Some(raw) => Provider::parse(raw).ok_or_else(|| {
                shared::Error::Validation(
                    "provider must be one of TWILIO, CUSTOM, TELNYX, PLIVO".to_string(),
                )
            })?,
        };

        let area_code = self
            .area_code
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        if let Some(area_code) = &area_code {
            if area_code.len() > 6 || !area_code.chars().all(|c| c.is_ascii_digit()) {
                return Err(shared::Error::Validation(
                    "areaCode must contain only digits".to_string(),
                ));
            }
        }

        Ok(AvailableSearch {
            country_code,
            provider,
            area_code,
        })
    }
}

/// Reduce whatever the backend sent to `{numbers, last}`.
fn normalize_numbers(data: &Value, pagination: Pagination) -> AvailableNumbers {
    let Some(list) = data
        .as_array()
        .or_else(|| data.get("numbers").and_then(Value::as_array))
        .or_else(|| data.get("content").and_then(Value::as_array))
    else {
        warn!("Unrecognized available-numbers payload; returning an empty page");
        return AvailableNumbers::default();
    };

    let numbers: Vec<String> = list
        .iter()
        .filter_map(|entry| match entry {
            Value::String(number) => Some(number.clone()),
            Value::Object(_) => entry
                .get("phoneNumber")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        })
        .collect();

    let last = data
        .get("last")
        .and_then(Value::as_bool)
        .unwrap_or(numbers.len() < pagination.size as usize);

    AvailableNumbers { numbers, last }
}

async fn available(
    state: &AppState,
    event: &Request,
    tokens: &TokenStore,
) -> shared::Result<Response<Body>> {
    let request: AvailableRequest = parse_json_body(event.body())?;
    let search = request.validate()?;
    let pagination = Pagination::from_query(
        query_param(event, "page").as_deref(),
        query_param(event, "size").as_deref(),
    );

    info!(
        "Searching {:?} numbers in {:?} (page {}, size {})",
        search.provider, search.country_code, pagination.page, pagination.size
    );

    let normalized = state
        .backend
        .send_json(
            reqwest::Method::POST,
            &format!(
                "/phone-numbers/available?page={}&size={}",
                pagination.page, pagination.size
            ),
            tokens.access(),
            serde_json::to_value(&search)?,
        )
        .await?;
    if !normalized.ok {
        return relay(&normalized);
    }

    json_response(200, &normalize_numbers(&normalized.data, pagination))
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let tokens = state.tokens(&event);
    let path = route_path(&event);
    let method = event.method().as_str();

    info!("Phone numbers request: {} {}", method, path);

    let result = match (method, path.as_str()) {
        ("POST", "/phone-numbers/available") => available(&state, &event, &tokens).await,
        ("GET", "/phone-numbers") => match state.backend.get("/phone-numbers", tokens.access()).await {
            Ok(normalized) => relay(&normalized),
            Err(e) => Err(e),
        },
        _ => Err(shared::Error::NotFound("Not found".to_string())),
    };

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
