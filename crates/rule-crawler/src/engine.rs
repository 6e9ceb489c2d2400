//! Recursive interpreter for [`Rule`] trees.
//!
//! [`RuleEngine::walk`] turns a rule into an object (or a single value for
//! `_` rules) and [`RuleEngine::evaluate`] applies one rule function. The two
//! recurse into each other through `findOne`, `find` and nested rules.
//! Neither ever fails: malformed functions, unparsable selectors and missing
//! matches come out as `null` or empty results.

use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::config::DEFAULT_MAX_RULE_DEPTH;
use crate::{MarkupElement, Rule, RuleFn};

#[derive(Debug, Clone, Copy)]
pub struct RuleEngine {
    max_depth: usize,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_RULE_DEPTH,
        }
    }
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the combined rule nesting and element descent. Anything deeper
    /// evaluates to `null`.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn walk<E: MarkupElement>(&self, element: &E, rule: &Rule) -> Value {
        self.walk_at(element, rule, 0)
    }

    pub fn evaluate<E: MarkupElement>(&self, element: &E, function: &RuleFn) -> Value {
        self.evaluate_at(element, function, 0)
    }

    fn walk_at<E: MarkupElement>(&self, element: &E, rule: &Rule, depth: usize) -> Value {
        if depth > self.max_depth {
            warn!("Rule nesting exceeds max depth {}, yielding null", self.max_depth);
            return Value::Null;
        }

        if let Some(function) = rule.shortcut() {
            return self.evaluate_at(element, function, depth + 1);
        }

        let mut result = Map::new();
        for (name, function) in rule.fields() {
            result.insert(name.to_string(), self.evaluate_at(element, function, depth + 1));
        }
        Value::Object(result)
    }

    fn evaluate_at<E: MarkupElement>(&self, element: &E, function: &RuleFn, depth: usize) -> Value {
        if depth > self.max_depth {
            warn!("Rule nesting exceeds max depth {}, yielding null", self.max_depth);
            return Value::Null;
        }

        match function {
            RuleFn::Text => Value::String(element.text()),
            RuleFn::Value => element.value(),
            RuleFn::Html => string_or_null(element.inner_html()),
            RuleFn::Css(property) => string_or_null(element.css(property)),
            RuleFn::Data(key) => element.data(key),
            RuleFn::Attr(name) => string_or_null(element.attr(name)),
            RuleFn::Prop(name) => element.prop(name),
            RuleFn::FindOne { selector, rule } => match element.find(selector) {
                Some(matches) => matches
                    .first()
                    .map(|first| self.walk_at(first, rule, depth + 1))
                    .unwrap_or(Value::Null),
                None => Value::Null,
            },
            RuleFn::Find { selector, rule } => match element.find(selector) {
                Some(matches) => Value::Array(
                    matches
                        .iter()
                        .map(|descendant| self.walk_at(descendant, rule, depth + 1))
                        .collect(),
                ),
                None => Value::Null,
            },
            RuleFn::Nested(rule) => self.walk_at(element, rule, depth + 1),
            RuleFn::Invalid(raw) => {
                trace!("Ignoring malformed rule function {}", raw);
                Value::Null
            }
        }
    }
}

fn string_or_null(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Document;
    use serde_json::json;

    fn extract(html: &str, rule: Value) -> Value {
        let doc = Document::parse(html);
        RuleEngine::new().walk(&doc.root(), &Rule::from_value(&rule))
    }

    #[test]
    fn test_bare_tag_matches_array_form() {
        let doc = Document::parse("<p id='x'>Hi <b>there</b></p>");
        let engine = RuleEngine::new();
        let p = doc.root().find("p").unwrap().remove(0);

        for tag in ["text", "value", "html"] {
            assert_eq!(
                engine.evaluate(&p, &RuleFn::from_value(&json!(tag))),
                engine.evaluate(&p, &RuleFn::from_value(&json!([tag]))),
            );
        }
        assert_eq!(engine.evaluate(&p, &RuleFn::Html), json!("Hi <b>there</b>"));
    }

    #[test]
    fn test_non_string_argument_yields_null() {
        let html = "<a href='/x' data-id='1' style='color: red'>x</a>";
        for op in ["css", "data", "attr", "prop"] {
            let rule = json!({ "_": ["findOne", "a", { "_": [op, 1] }] });
            assert_eq!(extract(html, rule), Value::Null, "operator {}", op);
        }
    }

    #[test]
    fn test_find_and_find_one_without_matches() {
        let html = "<ul><li>a</li></ul>";
        assert_eq!(extract(html, json!({ "_": ["find", "span", { "_": "text" }] })), json!([]));
        assert_eq!(extract(html, json!({ "_": ["findOne", "span", { "_": "text" }] })), Value::Null);
        assert_eq!(extract(html, json!({ "_": ["find", 7, { "_": "text" }] })), Value::Null);
        assert_eq!(extract(html, json!({ "_": ["findOne", "li[", { "_": "text" }] })), Value::Null);
    }

    #[test]
    fn test_find_preserves_document_order() {
        let html = "<ul><li>one</li><li>two</li><li>three</li></ul>";
        let result = extract(html, json!({ "items": ["find", "li", { "_": "text" }] }));
        assert_eq!(result, json!({ "items": ["one", "two", "three"] }));
    }

    #[test]
    fn test_find_one_end_to_end() {
        let html = r#"<div class="card"><span class="author fn">Alice</span></div>"#;
        let rule = json!({ "_": ["findOne", "span.author.fn", { "_": "text" }] });
        assert_eq!(extract(html, rule), json!("Alice"));
    }

    #[test]
    fn test_shortcut_never_wraps() {
        let html = "<p>Hi</p>";
        let rule = json!({ "_": ["findOne", "p", { "_": "text" }] });
        assert_eq!(extract(html, rule), json!("Hi"));
        assert_eq!(extract(html, json!({})), json!({}));

        let doc = Document::parse(html);
        let p = doc.root().find("p").unwrap().remove(0);
        let built = Rule::new().field(crate::SHORTCUT_KEY, RuleFn::Text);
        assert_eq!(RuleEngine::new().walk(&p, &built), json!("Hi"));
    }

    #[test]
    fn test_falsy_shortcut_is_an_ordinary_field() {
        let html = "<p>Hi</p>";
        let result = extract(html, json!({ "_": "", "title": ["findOne", "p", { "_": "text" }] }));
        assert_eq!(result, json!({ "_": null, "title": "Hi" }));
    }

    #[test]
    fn test_nested_rule_uses_same_element() {
        let html = r#"<article><h1>Title</h1><a class="more" href="/next">More</a></article>"#;
        let rule = json!({
            "article": ["findOne", "article", {
                "heading": ["findOne", "h1", { "_": "text" }],
                "meta": { "link": ["findOne", "a.more", { "_": ["attr", "href"] }] },
                "missing": ["findOne", "a.more", { "_": ["attr", "title"] }],
                "bogus": "nonsense",
            }],
        });

        assert_eq!(
            extract(html, rule),
            json!({
                "article": {
                    "heading": "Title",
                    "meta": { "link": "/next" },
                    "missing": null,
                    "bogus": null,
                }
            })
        );
    }

    #[test]
    fn test_find_without_rule_yields_empty_objects() {
        let html = "<ul><li>a</li><li>b</li></ul>";
        assert_eq!(extract(html, json!({ "_": ["find", "li"] })), json!([{}, {}]));
    }

    #[test]
    fn test_array_rule_argument_is_an_empty_rule() {
        let html = "<ul><li>a</li><li>b</li></ul>";
        let raw = json!({ "_": ["find", "li", ["text"]] });
        assert_eq!(extract(html, raw.clone()), json!([{}, {}]));
        assert!(Rule::from_value(&raw).validate().is_err());
    }

    #[test]
    fn test_depth_limit_yields_null() {
        let html = "<div><div><div><span>deep</span></div></div></div>";
        let doc = Document::parse(html);
        let rule = Rule::from_value(&json!({
            "_": ["findOne", "div", { "_": ["findOne", "div", { "_": ["findOne", "span", { "_": "text" }] }] }]
        }));

        assert_eq!(RuleEngine::new().walk(&doc.root(), &rule), json!("deep"));
        assert_eq!(RuleEngine::new().with_max_depth(3).walk(&doc.root(), &rule), Value::Null);
    }

    #[test]
    fn test_default_rule_returns_document_html() {
        let doc = Document::parse("<p>Hi</p>");
        let result = RuleEngine::new().walk(&doc.root(), &Rule::html());
        assert_eq!(result, json!(doc.html().html()));
    }
}
