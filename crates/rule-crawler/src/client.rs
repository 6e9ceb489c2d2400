use bytes::Bytes;
use futures::StreamExt;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, StatusCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::{CrawlerConfig, CrawlerError, RequestBody, RequestOptions, Result};

/// Thin transport over a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    config: Arc<CrawlerConfig>,
}

impl HttpClient {
    pub fn new(config: Arc<CrawlerConfig>) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();

        for (key, value) in &config.headers {
            headers.insert(
                reqwest::header::HeaderName::from_bytes(key.as_bytes())
                    .map_err(|e| CrawlerError::InvalidHeader(format!("{}: {}", key, e)))?,
                reqwest::header::HeaderValue::from_str(value)
                    .map_err(|e| CrawlerError::InvalidHeader(format!("{}: {}", key, e)))?,
            );
        }

        let mut builder = ReqwestClient::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects as usize));

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        // Builder failures come from bad settings, not from the network.
        let client = builder
            .build()
            .map_err(|e| CrawlerError::Config(format!("invalid client settings: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Sends the request and buffers the whole body. Any status is accepted.
    pub async fn fetch(&self, options: &RequestOptions) -> Result<CrawlResponse> {
        let request = self.build_request(options)?;
        let start = Instant::now();

        let response = request.send().await?;
        let url = response.url().clone();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        let elapsed = start.elapsed();

        info!("Fetched {} bytes from {} ({}) in {:?}", body.len(), url, status, elapsed);

        Ok(CrawlResponse {
            url,
            status,
            headers,
            body,
            elapsed,
        })
    }

    /// Streams a 200 response body into `path`, returning the size on disk.
    ///
    /// The status is checked before the file is created, so a rejected
    /// response leaves nothing behind.
    pub async fn download(&self, options: &RequestOptions, path: &Path) -> Result<u64> {
        let request = self.build_request(options)?;
        let response = request.send().await?;

        if response.status() != StatusCode::OK {
            warn!("Download of {} rejected with status {}", response.url(), response.status());
            return Err(CrawlerError::status(response.status()));
        }

        debug!("Streaming {} to {}", response.url(), path.display());

        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }

        file.flush().await?;
        drop(file);

        let size = tokio::fs::metadata(path).await?.len();
        if size != written {
            warn!("Wrote {} bytes to {} but it holds {}", written, path.display(), size);
        }

        info!("Downloaded {} bytes to {}", size, path.display());
        Ok(size)
    }

    fn build_request(&self, options: &RequestOptions) -> Result<RequestBuilder> {
        let url = options.validate()?;
        let method = Method::from_bytes(options.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| CrawlerError::Config(format!("invalid HTTP method: {}", options.method)))?;

        debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);

        if !options.query.is_empty() {
            request = request.query(&options.query);
        }

        for (key, value) in &options.headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| CrawlerError::InvalidHeader(format!("{}: {}", key, e)))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| CrawlerError::InvalidHeader(format!("{}: {}", key, e)))?;
            request = request.header(name, value);
        }

        request = match &options.body {
            Some(RequestBody::Text(text)) => request.body(text.clone()),
            Some(RequestBody::Json(json)) => request.json(json),
            Some(RequestBody::Form(form)) => request.form(form),
            None => request,
        };

        if let Some(timeout_ms) = options.timeout_ms {
            request = request.timeout(Duration::from_millis(timeout_ms));
        }

        Ok(request)
    }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct CrawlResponse {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub headers: reqwest::header::HeaderMap,
    pub body: Bytes,
    pub elapsed: Duration,
}

impl CrawlResponse {
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn status_text(&self) -> &str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn is_ok(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Absolute form of a download destination; empty paths are rejected.
pub fn resolve_destination(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(CrawlerError::Config("empty file path for download".to_string()));
    }

    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
