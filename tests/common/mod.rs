// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Scripted transport for driving the director without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use upload_intel::errors::TransportError;
use upload_intel::http_client::{HttpResponse, Transport, UploadFile};

type UploadHandler = Box<dyn Fn(&UploadFile) -> Result<HttpResponse, TransportError> + Send + Sync>;
type FetchHandler = Box<dyn Fn(&str) -> Result<HttpResponse, TransportError> + Send + Sync>;

pub const REJECTION: &str = "Sorry, invalid file type. Only JPG & PNG files are allowed";

pub struct ScriptedTransport {
    upload: UploadHandler,
    fetch: FetchHandler,
    uploads: Mutex<Vec<String>>,
    fetches: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(
        upload: impl Fn(&UploadFile) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
        fetch: impl Fn(&str) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            upload: Box::new(upload),
            fetch: Box::new(fetch),
            uploads: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
        }
    }

    /// Filenames in upload order.
    pub fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().clone()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetches.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.fetches.lock().push(url.to_string());
        (self.fetch)(url)
    }

    async fn upload(&self, file: &UploadFile) -> Result<HttpResponse, TransportError> {
        self.uploads.lock().push(file.filename.clone());
        (self.upload)(file)
    }
}

/// Accepts the benign baseline image, rejects everything else.
pub fn accept_images_only(file: &UploadFile) -> HttpResponse {
    if file.filename == "baseline.jpg" {
        HttpResponse::new(200, "The file avatars/baseline.jpg has been uploaded.")
    } else {
        HttpResponse::new(403, REJECTION)
    }
}

pub fn not_found(_url: &str) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(404, "Not Found"))
}

/// Adds the fingerprint headers of a PHP 7 site behind Apache.
pub fn apache_php7(response: HttpResponse) -> HttpResponse {
    response
        .with_header("Server", "Apache/2.4.41 (Ubuntu)")
        .with_header("X-Powered-By", "PHP/7.4.3")
}
