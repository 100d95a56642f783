// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

use crate::config::HttpSettings;
use crate::errors::TransportError;

/// Maximum response body size (10MB) to prevent memory exhaustion
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static CSRF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"name="csrf"\s+value="([^"]+)""#).unwrap());
static FILE_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"type="file"\s+name="([^"]+)""#).unwrap());
static FILE_FIELD_REVERSED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"name="([^"]+)"\s+type="file""#).unwrap());
static HIDDEN_INPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<input[^>]*type="hidden"[^>]*>"#).unwrap());
static NAME_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"name="([^"]*)""#).unwrap());
static VALUE_ATTR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"value="([^"]*)""#).unwrap());

/// A response as seen by the analysis pipeline.
///
/// Header names are lower-cased; repeated headers are joined, with
/// `set-cookie` values separated by newlines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub duration_ms: u64,
}

impl HttpResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
            headers: BTreeMap::new(),
            duration_ms: 0,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.body.contains(pattern)
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers.get(&name.to_lowercase()).cloned()
    }
}

/// A file to send through the upload form.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

impl UploadFile {
    /// Content type is guessed from the filename.
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let filename = filename.into();
        let content_type = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            filename,
            content: content.into(),
            content_type,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// The two network operations the scan core depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<HttpResponse, TransportError>;

    async fn upload(&self, file: &UploadFile) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<HttpResponse, TransportError> {
        (**self).fetch(url).await
    }

    async fn upload(&self, file: &UploadFile) -> Result<HttpResponse, TransportError> {
        (**self).upload(file).await
    }
}

/// Fields scraped from the page hosting the upload form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormFields {
    pub csrf: Option<String>,
    pub file_field: Option<String>,
    pub hidden: Vec<(String, String)>,
}

impl FormFields {
    pub fn parse(html: &str) -> Self {
        let csrf = CSRF_RE
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let file_field = FILE_FIELD_RE
            .captures(html)
            .or_else(|| FILE_FIELD_REVERSED_RE.captures(html))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let hidden = HIDDEN_INPUT_RE
            .find_iter(html)
            .filter_map(|tag| {
                let tag = tag.as_str();
                let name = NAME_ATTR_RE.captures(tag)?.get(1)?.as_str().to_string();
                if name == "csrf" {
                    return None;
                }
                let value = VALUE_ATTR_RE
                    .captures(tag)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                Some((name, value))
            })
            .collect();

        Self {
            csrf,
            file_field,
            hidden,
        }
    }

    fn merge(&mut self, other: FormFields) {
        if self.csrf.is_none() {
            self.csrf = other.csrf;
        }
        if self.file_field.is_none() {
            self.file_field = other.file_field;
        }
        for (name, value) in other.hidden {
            if !self.hidden.iter().any(|(n, _)| *n == name) {
                self.hidden.push((name, value));
            }
        }
    }
}

/// reqwest-backed transport bound to one upload endpoint.
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    upload_url: String,
    timeout: Duration,
    max_body_size: usize,
}

impl HttpClient {
    pub fn new(upload_url: &str, timeout_secs: u64) -> Result<Self, TransportError> {
        Self::with_config(upload_url, &HttpSettings::default().with_timeout(timeout_secs), None)
    }

    /// Build a client with redirects disabled, so 302/303 upload answers
    /// reach the observer untouched.
    pub fn with_config(
        upload_url: &str,
        settings: &HttpSettings,
        session_cookie: Option<&str>,
    ) -> Result<Self, TransportError> {
        Url::parse(upload_url).map_err(|_| TransportError::InvalidUrl {
            url: upload_url.to_string(),
        })?;

        if settings.accept_invalid_certs {
            warn!("Certificate validation is DISABLED for this scan");
        }

        let mut default_headers = HeaderMap::new();
        if let Some(cookie) = session_cookie {
            let cookie = if cookie.contains('=') {
                cookie.to_string()
            } else {
                format!("session={}", cookie)
            };
            let value = HeaderValue::from_str(&cookie).map_err(|e| TransportError::Request {
                url: upload_url.to_string(),
                reason: format!("invalid cookie header: {}", e),
            })?;
            default_headers.insert(COOKIE, value);
        }

        let timeout = Duration::from_secs(settings.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(
                settings
                    .user_agent
                    .clone()
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            )
            .default_headers(default_headers)
            .build()
            .map_err(|e| TransportError::Request {
                url: upload_url.to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client: Arc::new(client),
            upload_url: upload_url.to_string(),
            timeout,
            max_body_size: settings.max_body_bytes,
        })
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// Send GET request
    pub async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, url, self.timeout))?;
        self.read_response(response, url, started).await
    }

    /// Send POST request with form-encoded data
    pub async fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        let started = Instant::now();
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", encode_form_value(k), encode_form_value(v)))
            .collect::<Vec<_>>()
            .join("&");

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, url, self.timeout))?;
        self.read_response(response, url, started).await
    }

    /// Scrape the upload page and its parent for the CSRF token, the file
    /// input name and hidden fields. Missing pages are skipped.
    pub async fn discover_form(&self) -> FormFields {
        let mut fields = FormFields::default();

        for page in form_pages(&self.upload_url) {
            match self.get(&page).await {
                Ok(response) if response.status_code == 200 => {
                    fields.merge(FormFields::parse(&response.body));
                }
                Ok(response) => {
                    debug!("Form discovery: {} returned {}", page, response.status_code);
                }
                Err(e) => {
                    debug!("Form discovery: {} failed: {}", page, e);
                }
            }
            if fields.csrf.is_some() && fields.file_field.is_some() {
                break;
            }
        }

        fields
    }

    async fn send_multipart(
        &self,
        file: &UploadFile,
        fields: FormFields,
    ) -> Result<HttpResponse, TransportError> {
        let field_name = fields
            .file_field
            .clone()
            .unwrap_or_else(|| default_file_field(&self.upload_url).to_string());

        let part = Part::bytes(file.content.clone())
            .file_name(file.filename.clone())
            .mime_str(&file.content_type)
            .map_err(|e| TransportError::Request {
                url: self.upload_url.clone(),
                reason: format!("invalid content type {}: {}", file.content_type, e),
            })?;

        let mut form = Form::new().percent_encode_noop();
        for (name, value) in fields.hidden {
            form = form.text(name, value);
        }
        if let Some(csrf) = fields.csrf {
            form = form.text("csrf", csrf);
        }
        form = form.part(field_name.clone(), part);

        debug!(
            "Uploading {} ({} bytes, {}) as field '{}'",
            file.filename,
            file.content.len(),
            file.content_type,
            field_name
        );

        let started = Instant::now();
        let response = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, &self.upload_url, self.timeout))?;
        self.read_response(response, &self.upload_url, started).await
    }

    async fn read_response(
        &self,
        response: reqwest::Response,
        url: &str,
        started: Instant,
    ) -> Result<HttpResponse, TransportError> {
        let status_code = response.status().as_u16();
        let headers = collect_headers(response.headers());

        let body_bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(e, url, self.timeout))?;
        let body = if body_bytes.len() > self.max_body_size {
            // Truncate oversized responses
            String::from_utf8_lossy(&body_bytes[..self.max_body_size]).to_string()
        } else {
            String::from_utf8_lossy(&body_bytes).to_string()
        };

        Ok(HttpResponse {
            status_code,
            body,
            headers,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl Transport for HttpClient {
    async fn fetch(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.get(url).await
    }

    async fn upload(&self, file: &UploadFile) -> Result<HttpResponse, TransportError> {
        let fields = self.discover_form().await;
        self.send_multipart(file, fields).await
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers.iter() {
        let Ok(value) = value.to_str() else { continue };
        let name = name.as_str().to_lowercase();
        let separator = if name == "set-cookie" { "\n" } else { ", " };
        map.entry(name)
            .and_modify(|existing| {
                existing.push_str(separator);
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    map
}

/// The upload URL itself, then the page one path segment up.
fn form_pages(upload_url: &str) -> Vec<String> {
    let mut pages = vec![upload_url.to_string()];
    if let Ok(mut url) = Url::parse(upload_url) {
        let parent = {
            let path = url.path().trim_end_matches('/');
            match path.rfind('/') {
                Some(idx) if idx > 0 => Some(path[..idx].to_string()),
                _ => None,
            }
        };
        if let Some(parent) = parent {
            url.set_path(&parent);
            url.set_query(None);
            pages.push(url.to_string());
        }
    }
    pages
}

fn default_file_field(upload_url: &str) -> &'static str {
    if upload_url.contains("web-security-academy") {
        "avatar"
    } else {
        "file"
    }
}

fn encode_form_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
