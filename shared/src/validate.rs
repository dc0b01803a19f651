//! Input validation shared by the route handlers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub const MAX_PAGE: i64 = 10_000;
pub const MIN_SIZE: i64 = 1;
pub const MAX_SIZE: i64 = 200;
pub const DEFAULT_SIZE: i64 = 50;

/// Canonical hyphenated 8-4-4-4-12 UUID, either case.
pub fn is_uuid(value: &str) -> bool {
    // Only the hyphenated form is 36 characters long.
    value.len() == 36 && Uuid::try_parse(value).is_ok()
}

/// Returns the identifier or a 400 naming the field.
pub fn require_uuid<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        None | Some("") => Err(Error::Validation(format!("{} is required", field))),
        Some(v) if is_uuid(v) => Ok(v),
        Some(_) => Err(Error::Validation(format!("{} must be a valid UUID", field))),
    }
}

/// Zero-based page and bounded page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub size: i64,
}

impl Pagination {
    /// Clamp raw query values; unparseable values fall back to the defaults.
    pub fn from_query(page: Option<&str>, size: Option<&str>) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(0)
            .clamp(0, MAX_PAGE);
        let size = size
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_SIZE)
            .clamp(MIN_SIZE, MAX_SIZE);

        Self { page, size }
    }

    /// There is a next page exactly when this one had items.
    pub fn next_page(&self, item_count: usize) -> Option<i64> {
        if item_count == 0 {
            None
        } else {
            Some(self.page + 1)
        }
    }
}

/// Countries phone numbers can be searched in.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountryCode {
    US,
    CA,
    IN,
    IT,
    FR,
}

impl CountryCode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "US" => Some(Self::US),
            "CA" => Some(Self::CA),
            "IN" => Some(Self::IN),
            "IT" => Some(Self::IT),
            "FR" => Some(Self::FR),
            _ => None,
        }
    }
}

/// Telephony providers the backend can buy numbers from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provider {
    Twilio,
    Custom,
    Telnyx,
    Plivo,
}

impl Provider {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TWILIO" => Some(Self::Twilio),
            "CUSTOM" => Some(Self::Custom),
            "TELNYX" => Some(Self::Telnyx),
            "PLIVO" => Some(Self::Plivo),
            _ => None,
        }
    }
}

/// Strip common formatting and accept 7-15 digits with an optional leading `+`.
pub fn normalize_phone(value: &str) -> Option<String> {
    let compact: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    let digits = compact.strip_prefix('+').unwrap_or(&compact);
    if (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(compact)
    } else {
        None
    }
}
