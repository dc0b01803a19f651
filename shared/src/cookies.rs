//! Cookie-backed storage for the session's bearer tokens.
//!
//! A `TokenStore` is built from the inbound `Cookie` header, mutated while the
//! request is handled and then flushed onto the response as `Set-Cookie`
//! headers. Nothing is kept in process memory between requests.

use lambda_http::http::header::{HeaderMap, HeaderValue, COOKIE, SET_COOKIE};
use lambda_http::{Body, Response};

use crate::models::CredentialPair;
use crate::{Error, Result};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
pub const PHONE_TARGET_COOKIE: &str = "reacherr_phone_target";

/// Pending phone verification target lives for ten minutes.
pub const PHONE_TARGET_MAX_AGE_SECONDS: u64 = 600;

#[derive(Debug, Clone)]
pub struct TokenStore {
    access: Option<String>,
    refresh: Option<String>,
    phone_target: Option<String>,
    secure: bool,
    pending: Vec<String>,
}

impl TokenStore {
    pub fn from_headers(headers: &HeaderMap, secure: bool) -> Self {
        Self {
            access: extract_cookie_value(headers, ACCESS_TOKEN_COOKIE),
            refresh: extract_cookie_value(headers, REFRESH_TOKEN_COOKIE),
            phone_target: extract_cookie_value(headers, PHONE_TARGET_COOKIE)
                .and_then(|v| urlencoding::decode(&v).ok().map(|s| s.into_owned())),
            secure,
            pending: Vec::new(),
        }
    }

    pub fn access(&self) -> Option<&str> {
        self.access.as_deref()
    }

    pub fn refresh(&self) -> Option<&str> {
        self.refresh.as_deref()
    }

    pub fn phone_target(&self) -> Option<&str> {
        self.phone_target.as_deref()
    }

    /// Persist both tokens as session cookies.
    pub fn set(&mut self, credentials: &CredentialPair) {
        let access = self.cookie(ACCESS_TOKEN_COOKIE, &credentials.access_token, None);
        let refresh = self.cookie(REFRESH_TOKEN_COOKIE, &credentials.refresh_token, None);
        self.pending.push(access);
        self.pending.push(refresh);

        self.access = Some(credentials.access_token.clone());
        self.refresh = Some(credentials.refresh_token.clone());
    }

    /// Expire both tokens immediately.
    pub fn clear(&mut self) {
        let access = self.cookie(ACCESS_TOKEN_COOKIE, "", Some(0));
        let refresh = self.cookie(REFRESH_TOKEN_COOKIE, "", Some(0));
        self.pending.push(access);
        self.pending.push(refresh);

        self.access = None;
        self.refresh = None;
    }

    pub fn set_phone_target(&mut self, phone: &str) {
        let encoded = urlencoding::encode(phone).into_owned();
        let cookie = self.cookie(PHONE_TARGET_COOKIE, &encoded, Some(PHONE_TARGET_MAX_AGE_SECONDS));
        self.pending.push(cookie);
        self.phone_target = Some(phone.to_string());
    }

    pub fn clear_phone_target(&mut self) {
        let cookie = self.cookie(PHONE_TARGET_COOKIE, "", Some(0));
        self.pending.push(cookie);
        self.phone_target = None;
    }

    /// `Set-Cookie` values queued so far, in write order.
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// Append every queued cookie write to the response.
    pub fn apply(self, response: &mut Response<Body>) -> Result<()> {
        for cookie in self.pending {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| Error::Internal(format!("Invalid cookie value: {}", e)))?;
            response.headers_mut().append(SET_COOKIE, value);
        }
        Ok(())
    }

    fn cookie(&self, name: &str, value: &str, max_age: Option<u64>) -> String {
        let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax");
        if let Some(max_age) = max_age {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn extract_cookie_value(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for part in raw.split(';') {
            let mut pieces = part.trim().splitn(2, '=');
            let key = pieces.next().unwrap_or_default().trim();
            let value = pieces.next().unwrap_or_default().trim();

            if key == cookie_name && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}
