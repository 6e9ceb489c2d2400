pub mod client;
pub mod config;
pub mod element;
pub mod engine;
pub mod error;
pub mod parser;
pub mod rule;

pub use client::*;
pub use config::*;
pub use element::*;
pub use engine::*;
pub use error::*;
pub use parser::*;
pub use rule::*;

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetches pages and runs extraction rules over them.
#[derive(Debug, Clone)]
pub struct Crawler {
    client: HttpClient,
    engine: RuleEngine,
}

impl Crawler {
    pub fn new() -> Result<Self> {
        Self::with_config(CrawlerConfig::default())
    }

    pub fn with_config(config: CrawlerConfig) -> Result<Self> {
        let engine = RuleEngine::new().with_max_depth(config.max_rule_depth);
        let client = HttpClient::new(Arc::new(config))?;
        Ok(Self { client, engine })
    }

    pub fn config(&self) -> &CrawlerConfig {
        self.client.config()
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    /// Fetches `options` and returns the buffered response.
    ///
    /// With `strict_status` any status other than 200 is an error; otherwise
    /// the response is returned whatever its status.
    pub async fn fetch_response(
        &self,
        options: impl Into<RequestOptions>,
        strict_status: bool,
    ) -> Result<CrawlResponse> {
        let response = self.client.fetch(&options.into()).await?;

        if strict_status && !response.is_ok() {
            warn!("Rejecting {} with status {}", response.url, response.status);
            return Err(CrawlerError::status(response.status));
        }

        Ok(response)
    }

    /// Streams the response body to `path` and returns the bytes written.
    pub async fn fetch_to_file(
        &self,
        options: impl Into<RequestOptions>,
        path: impl AsRef<Path>,
    ) -> Result<u64> {
        let path = resolve_destination(path.as_ref())?;
        let options = options.into();
        options.validate()?;

        self.client.download(&options, &path).await
    }

    /// Fetches an HTML page and walks `rule` over its document node.
    ///
    /// Without a rule the whole document HTML is returned.
    pub async fn fetch_and_extract(
        &self,
        options: impl Into<RequestOptions>,
        rule: Option<&Rule>,
    ) -> Result<Value> {
        let response = self.fetch_response(options, true).await?;
        let default_rule = Rule::html();
        let rule = rule.unwrap_or(&default_rule);

        Ok(self.extract(&response.body, Some(response.url), rule))
    }

    /// Parses `body` and walks `rule` over it.
    pub fn extract(&self, body: &[u8], base_url: Option<url::Url>, rule: &Rule) -> Value {
        let mut document = Document::parse_bytes(body);
        if let Some(base_url) = base_url {
            document = document.with_base_url(base_url);
        }

        let result = self.engine.walk(&document.root(), rule);
        debug!("Extracted {} from {} bytes", result_shape(&result), body.len());
        result
    }
}

fn result_shape(value: &Value) -> String {
    match value {
        Value::Object(map) => format!("{} fields", map.len()),
        Value::Array(items) => format!("{} items", items.len()),
        Value::Null => "null".to_string(),
        _ => "a single value".to_string(),
    }
}
