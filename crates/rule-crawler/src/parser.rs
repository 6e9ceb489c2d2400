use scraper::Html;
use tracing::debug;
use url::Url;

use crate::HtmlElement;

/// One parsed HTML document.
pub struct Document {
    html: Html,
    base_url: Option<Url>,
}

impl Document {
    pub fn parse(html: &str) -> Self {
        Self {
            html: Html::parse_document(html),
            base_url: None,
        }
    }

    /// Parses a response body, replacing invalid UTF-8 sequences.
    pub fn parse_bytes(body: &[u8]) -> Self {
        let html = String::from_utf8_lossy(body);
        debug!("Parsing {} bytes of HTML", body.len());
        Self::parse(&html)
    }

    pub fn parse_fragment(html: &str) -> Self {
        Self {
            html: Html::parse_fragment(html),
            base_url: None,
        }
    }

    /// Base for resolving relative `href`/`src` properties.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// The document node, above `<html>`.
    pub fn root(&self) -> HtmlElement<'_> {
        HtmlElement::document(&self.html, self.base_url.as_ref())
    }

    pub fn html(&self) -> &Html {
        &self.html
    }
}
