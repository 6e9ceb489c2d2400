use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error("Invalid crawler configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{status} {reason}")]
    Status { status: u16, reason: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Invalid rule at {path}: {reason}")]
    InvalidRule { path: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a [`CrawlerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad options, rule or destination, detected before any I/O.
    Config,
    /// Network failure or a rejected status code.
    Transport,
    /// Local filesystem failure.
    Io,
}

impl CrawlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CrawlerError::Http(_) | CrawlerError::Status { .. } => ErrorKind::Transport,
            CrawlerError::Io(_) => ErrorKind::Io,
            CrawlerError::Config(_)
            | CrawlerError::UrlParse(_)
            | CrawlerError::InvalidUrl(_)
            | CrawlerError::InvalidHeader(_)
            | CrawlerError::InvalidRule { .. }
            | CrawlerError::Json(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn status(status: reqwest::StatusCode) -> Self {
        CrawlerError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlerError>;
