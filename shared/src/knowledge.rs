//! Knowledge-base source uploads.
//!
//! The inbound multipart body is read field by field and rebuilt into a fresh
//! outbound form. Only the three source fields (plus the knowledge-base name
//! on create) survive; files outside the allow-list or over the size cap are
//! dropped.

use std::convert::Infallible;

use bytes::Bytes;
use lambda_http::http::header::{HeaderMap, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{Error, Result};

pub const FILES_FIELD: &str = "knowledgeBaseFiles";
pub const URLS_FIELD: &str = "knowledgeBaseUrls";
pub const TEXTS_FIELD: &str = "knowledgeBaseTexts";
pub const NAME_FIELD: &str = "knowledgeBaseName";

pub const URLS_BLOB_NAME: &str = "knowledgeBaseUrls.json";
pub const TEXTS_BLOB_NAME: &str = "knowledgeBaseText.json";

/// 50 MiB per uploaded file.
pub const MAX_FILE_BYTES: usize = 50 * 1024 * 1024;

pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "md", "csv", "html", "htm", "json", "rtf", "pptx", "xlsx",
];

/// One uploaded document.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadFile {
    fn extension(&self) -> Option<String> {
        let (_, ext) = self.file_name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }

    pub fn is_allowed(&self) -> bool {
        self.data.len() <= MAX_FILE_BYTES
            && self
                .extension()
                .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// Inline text source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSource {
    pub title: String,
    pub text: String,
}

/// Files, URLs and texts bound for one knowledge base.
#[derive(Debug, Default)]
pub struct SourceBundle {
    pub name: Option<String>,
    pub files: Vec<UploadFile>,
    pub urls: Vec<String>,
    pub texts: Vec<TextSource>,
}

impl SourceBundle {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.urls.is_empty() && self.texts.is_empty()
    }

    /// 400 unless at least one source survived filtering.
    pub fn require_sources(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::Validation("At least one source is required.".to_string()));
        }
        Ok(())
    }

    /// Read an inbound multipart body.
    pub async fn from_multipart(headers: &HeaderMap, body: &[u8]) -> Result<Self> {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Error::Validation("Expected a multipart/form-data body".to_string()))?;
        let boundary = multer::parse_boundary(content_type)
            .map_err(|_| Error::Validation("Expected a multipart/form-data body".to_string()))?;

        let body = Bytes::copy_from_slice(body);
        let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut bundle = SourceBundle::default();
        let mut raw_texts = Vec::new();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(|m| m.to_string());

            match name.as_str() {
                FILES_FIELD => {
                    let file = UploadFile {
                        file_name: file_name.unwrap_or_default(),
                        content_type,
                        data: field.bytes().await?,
                    };
                    if file.is_allowed() {
                        bundle.files.push(file);
                    } else {
                        warn!(
                            "Dropping upload {:?} ({} bytes): extension or size not allowed",
                            file.file_name,
                            file.data.len()
                        );
                    }
                }
                URLS_FIELD => {
                    let value = field.text().await?;
                    bundle.urls.extend(collect_urls(&value));
                }
                TEXTS_FIELD => {
                    let title = file_name.clone();
                    let value = field.text().await?;
                    raw_texts.push((title, value));
                }
                NAME_FIELD => {
                    let value = field.text().await?;
                    let value = value.trim();
                    if !value.is_empty() {
                        bundle.name = Some(value.to_string());
                    }
                }
                other => {
                    debug!("Ignoring multipart field {:?}", other);
                }
            }
        }

        for (index, (title, value)) in raw_texts.into_iter().enumerate() {
            bundle.texts.extend(normalize_text(title, &value, index + 1));
        }

        info!(
            "Assembled knowledge-base sources: files={}, urls={}, texts={}",
            bundle.files.len(),
            bundle.urls.len(),
            bundle.texts.len()
        );

        Ok(bundle)
    }

    /// Build the outbound form.
    pub fn into_form(self) -> Result<Form> {
        let mut form = Form::new();

        if let Some(name) = self.name {
            form = form.text(NAME_FIELD, name);
        }

        for file in self.files {
            let mut part = Part::bytes(file.data.to_vec()).file_name(file.file_name);
            if let Some(content_type) = file.content_type {
                part = part
                    .mime_str(&content_type)
                    .map_err(|e| Error::Internal(format!("Invalid upload content type: {}", e)))?;
            }
            form = form.part(FILES_FIELD, part);
        }

        if !self.urls.is_empty() {
            form = form.part(URLS_FIELD, json_blob(&self.urls, URLS_BLOB_NAME)?);
        }

        if !self.texts.is_empty() {
            form = form.part(TEXTS_FIELD, json_blob(&self.texts, TEXTS_BLOB_NAME)?);
        }

        Ok(form)
    }
}

fn json_blob<T: Serialize>(value: &T, file_name: &'static str) -> Result<Part> {
    Part::bytes(serde_json::to_vec(value)?)
        .file_name(file_name)
        .mime_str("application/json")
        .map_err(|e| Error::Internal(format!("Failed to build {}: {}", file_name, e)))
}

/// A URL field may hold one URL, a JSON array of URLs, or one URL per line.
fn collect_urls(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
        return items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// A text source is either an uploaded file (titled by its name), a JSON
/// `{title, text}` object or array of them, or plain text.
fn normalize_text(file_name: Option<String>, value: &str, ordinal: usize) -> Vec<TextSource> {
    if value.trim().is_empty() {
        return Vec::new();
    }

    if file_name.is_none() {
        if let Ok(parsed) = serde_json::from_str::<Value>(value.trim()) {
            let items = match parsed {
                Value::Array(items) => items,
                object @ Value::Object(_) => vec![object],
                _ => Vec::new(),
            };
            let sources: Vec<TextSource> = items
                .into_iter()
                .filter_map(|item| {
                    let text = item.get("text")?.as_str()?.trim().to_string();
                    if text.is_empty() {
                        return None;
                    }
                    let title = item
                        .get("title")
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Text {}", ordinal));
                    Some(TextSource { title, text })
                })
                .collect();
            if !sources.is_empty() {
                return sources;
            }
        }
    }

    let title = file_name
        .map(|name| match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem.to_string(),
            _ => name,
        })
        .unwrap_or_else(|| format!("Text {}", ordinal));

    vec![TextSource {
        title,
        text: value.trim().to_string(),
    }]
}
