//! Typed form of the declarative extraction grammar.
//!
//! On the wire a rule is a JSON object mapping field names to rule functions.
//! A rule function is either a bare operator tag (`"text"`), an operator array
//! (`["attr", "href"]`, `["find", "li", { "_": "text" }]`) or a nested rule
//! object. The reserved key `_` replaces the whole object result with a
//! single value.
//!
//! Parsing is forgiving: anything that does not fit the grammar is kept as
//! [`RuleFn::Invalid`] and evaluates to `null`. Call [`Rule::validate`] to
//! reject such rules up front instead.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::{CrawlerError, Result};

/// Key that turns a rule into a single-value shortcut.
pub const SHORTCUT_KEY: &str = "_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Text,
    Value,
    Html,
    Css,
    Data,
    Attr,
    Prop,
    FindOne,
    Find,
}

impl Operator {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(Operator::Text),
            "value" => Some(Operator::Value),
            "html" => Some(Operator::Html),
            "css" => Some(Operator::Css),
            "data" => Some(Operator::Data),
            "attr" => Some(Operator::Attr),
            "prop" => Some(Operator::Prop),
            "findOne" => Some(Operator::FindOne),
            "find" => Some(Operator::Find),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Operator::Text => "text",
            Operator::Value => "value",
            Operator::Html => "html",
            Operator::Css => "css",
            Operator::Data => "data",
            Operator::Attr => "attr",
            Operator::Prop => "prop",
            Operator::FindOne => "findOne",
            Operator::Find => "find",
        }
    }
}

/// How to derive one value from one element.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleFn {
    Text,
    Value,
    Html,
    Css(String),
    Data(String),
    Attr(String),
    Prop(String),
    FindOne { selector: String, rule: Rule },
    Find { selector: String, rule: Rule },
    /// A sub-rule evaluated against the same element.
    Nested(Rule),
    /// Raw JSON that matched no form of the grammar.
    Invalid(Value),
}

impl RuleFn {
    pub fn css(name: impl Into<String>) -> Self {
        RuleFn::Css(name.into())
    }

    pub fn data(key: impl Into<String>) -> Self {
        RuleFn::Data(key.into())
    }

    pub fn attr(name: impl Into<String>) -> Self {
        RuleFn::Attr(name.into())
    }

    pub fn prop(name: impl Into<String>) -> Self {
        RuleFn::Prop(name.into())
    }

    pub fn find_one(selector: impl Into<String>, rule: Rule) -> Self {
        RuleFn::FindOne { selector: selector.into(), rule }
    }

    pub fn find(selector: impl Into<String>, rule: Rule) -> Self {
        RuleFn::Find { selector: selector.into(), rule }
    }

    pub fn operator(&self) -> Option<Operator> {
        match self {
            RuleFn::Text => Some(Operator::Text),
            RuleFn::Value => Some(Operator::Value),
            RuleFn::Html => Some(Operator::Html),
            RuleFn::Css(_) => Some(Operator::Css),
            RuleFn::Data(_) => Some(Operator::Data),
            RuleFn::Attr(_) => Some(Operator::Attr),
            RuleFn::Prop(_) => Some(Operator::Prop),
            RuleFn::FindOne { .. } => Some(Operator::FindOne),
            RuleFn::Find { .. } => Some(Operator::Find),
            RuleFn::Nested(_) | RuleFn::Invalid(_) => None,
        }
    }

    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(tag) => Self::from_parts(tag, &[], value),
            Value::Array(items) => match items.split_first() {
                Some((Value::String(tag), args)) => Self::from_parts(tag, args, value),
                _ => RuleFn::Invalid(value.clone()),
            },
            Value::Object(_) => RuleFn::Nested(Rule::from_value(value)),
            _ => RuleFn::Invalid(value.clone()),
        }
    }

    fn from_parts(tag: &str, args: &[Value], raw: &Value) -> Self {
        let Some(operator) = Operator::from_tag(tag) else {
            return RuleFn::Invalid(raw.clone());
        };

        let name = match args.first() {
            Some(Value::String(name)) => Some(name.clone()),
            _ => None,
        };

        match (operator, name) {
            (Operator::Text, _) => RuleFn::Text,
            (Operator::Value, _) => RuleFn::Value,
            (Operator::Html, _) => RuleFn::Html,
            (Operator::Css, Some(name)) => RuleFn::Css(name),
            (Operator::Data, Some(name)) => RuleFn::Data(name),
            (Operator::Attr, Some(name)) => RuleFn::Attr(name),
            (Operator::Prop, Some(name)) => RuleFn::Prop(name),
            (Operator::FindOne, Some(selector)) => RuleFn::FindOne {
                selector,
                rule: Rule::from_arg(args.get(1)),
            },
            (Operator::Find, Some(selector)) => RuleFn::Find {
                selector,
                rule: Rule::from_arg(args.get(1)),
            },
            (_, None) => RuleFn::Invalid(raw.clone()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RuleFn::Text | RuleFn::Value | RuleFn::Html => {
                Value::String(self.tag_or_empty().to_string())
            }
            RuleFn::Css(name) | RuleFn::Data(name) | RuleFn::Attr(name) | RuleFn::Prop(name) => {
                Value::Array(vec![
                    Value::String(self.tag_or_empty().to_string()),
                    Value::String(name.clone()),
                ])
            }
            RuleFn::FindOne { selector, rule } | RuleFn::Find { selector, rule } => {
                Value::Array(vec![
                    Value::String(self.tag_or_empty().to_string()),
                    Value::String(selector.clone()),
                    rule.to_value(),
                ])
            }
            RuleFn::Nested(rule) => rule.to_value(),
            RuleFn::Invalid(raw) => raw.clone(),
        }
    }

    fn tag_or_empty(&self) -> &'static str {
        self.operator().map(|op| op.tag()).unwrap_or("")
    }

    /// Whether this function would trigger the `_` shortcut.
    fn is_truthy(&self) -> bool {
        match self {
            RuleFn::Invalid(raw) => is_truthy(raw),
            _ => true,
        }
    }

    fn validate_at(&self, path: &str) -> Result<()> {
        match self {
            RuleFn::Invalid(raw) => Err(CrawlerError::InvalidRule {
                path: path.to_string(),
                reason: format!("unrecognized rule function {}", raw),
            }),
            RuleFn::FindOne { rule, .. } | RuleFn::Find { rule, .. } => {
                rule.validate_at(&format!("{}[2]", path))
            }
            RuleFn::Nested(rule) => rule.validate_at(path),
            _ => Ok(()),
        }
    }
}

/// Mapping from field name to [`RuleFn`], or a single `_` shortcut.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rule {
    shortcut: Option<Box<RuleFn>>,
    fields: Vec<(String, RuleFn)>,
    // Raw JSON when something other than an object stood where a rule belongs.
    malformed: Option<Value>,
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{ "_": function }`.
    pub fn single(function: RuleFn) -> Self {
        Self::new().field(SHORTCUT_KEY, function)
    }

    /// `{ "_": "html" }`, the rule used when none is given.
    pub fn html() -> Self {
        Self::single(RuleFn::Html)
    }

    /// Sets one field. A truthy function under `_` becomes the shortcut,
    /// exactly as when the same rule is parsed from JSON.
    pub fn field(mut self, name: impl Into<String>, function: RuleFn) -> Self {
        let name = name.into();
        self.fields.retain(|(existing, _)| *existing != name);
        if name == SHORTCUT_KEY {
            self.shortcut = None;
            if function.is_truthy() {
                self.shortcut = Some(Box::new(function));
                return self;
            }
        }
        self.fields.push((name, function));
        self
    }

    pub fn shortcut(&self) -> Option<&RuleFn> {
        self.shortcut.as_deref()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &RuleFn)> {
        self.fields.iter().map(|(name, function)| (name.as_str(), function))
    }

    pub fn is_empty(&self) -> bool {
        self.shortcut.is_none() && self.fields.is_empty()
    }

    pub fn from_value(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self {
                malformed: Some(value.clone()),
                ..Self::default()
            };
        };

        let mut rule = Self::default();
        for (key, raw) in map {
            if key == SHORTCUT_KEY && is_truthy(raw) {
                rule.shortcut = Some(Box::new(RuleFn::from_value(raw)));
            } else {
                rule.fields.push((key.clone(), RuleFn::from_value(raw)));
            }
        }
        rule
    }

    fn from_arg(arg: Option<&Value>) -> Self {
        Self::from_value(arg.unwrap_or(&Value::Null))
    }

    pub fn to_value(&self) -> Value {
        if let Some(raw) = &self.malformed {
            return raw.clone();
        }

        let mut map = Map::new();
        for (name, function) in &self.fields {
            map.insert(name.clone(), function.to_value());
        }
        if let Some(shortcut) = &self.shortcut {
            map.insert(SHORTCUT_KEY.to_string(), shortcut.to_value());
        }
        Value::Object(map)
    }

    /// Rejects rules containing anything the grammar does not recognize.
    ///
    /// Evaluation never fails on such rules; it produces `null` for the
    /// offending field. This check is for callers who would rather know.
    pub fn validate(&self) -> Result<()> {
        self.validate_at("$")
    }

    fn validate_at(&self, path: &str) -> Result<()> {
        if let Some(raw) = &self.malformed {
            return Err(CrawlerError::InvalidRule {
                path: path.to_string(),
                reason: format!("expected a rule object, found {}", raw),
            });
        }

        if let Some(shortcut) = &self.shortcut {
            shortcut.validate_at(&format!("{}.{}", path, SHORTCUT_KEY))?;
        }
        for (name, function) in &self.fields {
            function.validate_at(&format!("{}.{}", path, name))?;
        }
        Ok(())
    }
}

/// JSON truthiness: `null`, `false`, `0` and `""` are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl From<Value> for Rule {
    fn from(value: Value) -> Self {
        Rule::from_value(&value)
    }
}

impl FromStr for Rule {
    type Err = CrawlerError;

    fn from_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)?;
        Ok(Rule::from_value(&value))
    }
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Rule::from_value(&value))
    }
}

impl Serialize for RuleFn {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RuleFn {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(RuleFn::from_value(&value))
    }
}
