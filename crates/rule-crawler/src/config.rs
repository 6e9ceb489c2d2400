use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::{CrawlerError, Result};

pub const DEFAULT_MAX_RULE_DEPTH: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub user_agent: String,
    /// Whole-request deadline. `None` waits for the server indefinitely.
    pub timeout: Option<Duration>,
    pub max_redirects: u32,
    pub headers: Vec<(String, String)>,
    pub max_rule_depth: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; RuleCrawler/0.1)".to_string(),
            timeout: None,
            max_redirects: 10,
            headers: vec![
                ("Accept".to_string(), "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string()),
                ("Accept-Language".to_string(), "en-US,en;q=0.5".to_string()),
            ],
            max_rule_depth: DEFAULT_MAX_RULE_DEPTH,
        }
    }
}

impl CrawlerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(user_agent) = std::env::var("CRAWLER_USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Ok(timeout) = std::env::var("CRAWLER_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.timeout = Some(Duration::from_secs(secs));
            }
        }

        if let Ok(redirects) = std::env::var("CRAWLER_MAX_REDIRECTS") {
            if let Ok(redirects) = redirects.parse() {
                config.max_redirects = redirects;
            }
        }

        if let Ok(depth) = std::env::var("CRAWLER_MAX_RULE_DEPTH") {
            if let Ok(depth) = depth.parse() {
                config.max_rule_depth = depth;
            }
        }

        config
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.headers.push((key, value));
        self
    }

    pub fn with_max_rule_depth(mut self, depth: usize) -> Self {
        self.max_rule_depth = depth;
        self
    }
}

/// Payload sent with a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestBody {
    Text(String),
    Json(serde_json::Value),
    Form(BTreeMap<String, String>),
}

/// A single HTTP request description.
///
/// Deserializes either from a bare URL string (a GET request) or from an
/// object carrying `method`, `url`, `headers`, `query`, `body` and
/// `timeout_ms`. The object form also takes the classic request-library
/// spellings: `uri`, `qs`, `timeout`, a string `body`, and top-level `json`
/// or `form` payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OptionsRepr")]
pub struct RequestOptions {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OptionsRepr {
    Url(String),
    Full(Box<FullOptions>),
    Unrecognized(serde_json::Value),
}

#[derive(Deserialize)]
struct FullOptions {
    #[serde(default = "default_method")]
    method: String,
    #[serde(alias = "uri")]
    url: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default, alias = "qs")]
    query: BTreeMap<String, String>,
    #[serde(default)]
    body: Option<BodyRepr>,
    #[serde(default)]
    json: Option<serde_json::Value>,
    #[serde(default)]
    form: Option<BTreeMap<String, String>>,
    #[serde(default, alias = "timeout")]
    timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BodyRepr {
    Text(String),
    Tagged(RequestBody),
    Raw(serde_json::Value),
}

fn default_method() -> String {
    "GET".to_string()
}

impl TryFrom<OptionsRepr> for RequestOptions {
    type Error = String;

    fn try_from(repr: OptionsRepr) -> std::result::Result<Self, Self::Error> {
        let full = match repr {
            OptionsRepr::Url(url) => return Ok(RequestOptions::get(url)),
            OptionsRepr::Full(full) => *full,
            OptionsRepr::Unrecognized(value) => {
                return Err(format!(
                    "request options must be a URL string or an object with a string `url` (or `uri`), found {}",
                    value
                ))
            }
        };

        let FullOptions { method, url, mut headers, query, body, json, form, timeout_ms } = full;

        // `json: true` only asks for a JSON exchange; any other value is the payload.
        let json_flag = matches!(json, Some(serde_json::Value::Bool(true)));
        if json_flag && !headers.keys().any(|key| key.eq_ignore_ascii_case("accept")) {
            headers.insert("Accept".to_string(), "application/json".to_string());
        }

        let body = match (form, json, body) {
            (Some(form), _, _) => Some(RequestBody::Form(form)),
            (None, Some(payload), _) if !payload.is_boolean() => Some(RequestBody::Json(payload)),
            (None, _, Some(BodyRepr::Text(text))) => Some(RequestBody::Text(text)),
            (None, _, Some(BodyRepr::Tagged(body))) => Some(body),
            (None, _, Some(BodyRepr::Raw(payload))) => Some(RequestBody::Json(payload)),
            (None, _, None) => None,
        };

        Ok(RequestOptions { method, url, headers, query, body, timeout_ms })
    }
}

impl RequestOptions {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: default_method(),
            url: url.into(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            body: None,
            timeout_ms: None,
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Checks the options before any I/O and returns the parsed target URL.
    pub fn validate(&self) -> Result<Url> {
        if self.url.trim().is_empty() {
            return Err(CrawlerError::Config("empty crawler options are invalid".to_string()));
        }

        let url = Url::parse(self.url.trim())?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CrawlerError::InvalidUrl(self.url.clone()));
        }

        Ok(url)
    }
}

impl From<&str> for RequestOptions {
    fn from(url: &str) -> Self {
        RequestOptions::get(url)
    }
}

impl From<String> for RequestOptions {
    fn from(url: String) -> Self {
        RequestOptions::get(url)
    }
}

impl From<Url> for RequestOptions {
    fn from(url: Url) -> Self {
        RequestOptions::get(String::from(url))
    }
}

impl From<&Url> for RequestOptions {
    fn from(url: &Url) -> Self {
        RequestOptions::get(url.as_str())
    }
}
