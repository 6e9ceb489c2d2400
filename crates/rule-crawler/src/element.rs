use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Number, Value};
use tracing::trace;
use url::Url;

/// Read access to one node of a parsed markup tree.
///
/// This is everything the rule engine needs from an HTML library. Accessors
/// return `None`/`Value::Null` where a browser-style API would return
/// `undefined`.
pub trait MarkupElement: Sized {
    /// Concatenated text of every descendant text node.
    fn text(&self) -> String;

    /// Form value (`<input>`, `<textarea>`, `<select>`, `<option>`).
    fn value(&self) -> Value;

    fn inner_html(&self) -> Option<String>;

    /// One property of the inline `style` attribute.
    fn css(&self, property: &str) -> Option<String>;

    /// A `data-*` attribute, decoded to a typed value.
    fn data(&self, key: &str) -> Value;

    fn attr(&self, name: &str) -> Option<String>;

    /// A DOM-style property.
    fn prop(&self, name: &str) -> Value;

    /// Descendants matching `selector`, in document order.
    ///
    /// Returns `None` when the selector cannot be parsed.
    fn find(&self, selector: &str) -> Option<Vec<Self>>;
}

#[derive(Debug, Clone, Copy)]
enum Handle<'a> {
    Document(&'a Html),
    Element(ElementRef<'a>),
}

/// [`MarkupElement`] over a `scraper` tree. Either the document node itself
/// or one element in it.
#[derive(Debug, Clone, Copy)]
pub struct HtmlElement<'a> {
    handle: Handle<'a>,
    base_url: Option<&'a Url>,
}

impl<'a> HtmlElement<'a> {
    pub fn document(html: &'a Html, base_url: Option<&'a Url>) -> Self {
        Self {
            handle: Handle::Document(html),
            base_url,
        }
    }

    pub fn element(element: ElementRef<'a>, base_url: Option<&'a Url>) -> Self {
        Self {
            handle: Handle::Element(element),
            base_url,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self.handle, Handle::Document(_))
    }

    /// Lower-case tag name, `None` for the document node.
    pub fn tag_name(&self) -> Option<&'a str> {
        match self.handle {
            Handle::Document(_) => None,
            Handle::Element(el) => Some(el.value().name()),
        }
    }

    fn as_element(&self) -> Option<ElementRef<'a>> {
        match self.handle {
            Handle::Document(_) => None,
            Handle::Element(el) => Some(el),
        }
    }

    fn has_attr(&self, name: &str) -> bool {
        self.as_element()
            .map(|el| el.value().attr(name).is_some())
            .unwrap_or(false)
    }

    fn outer_html(&self) -> String {
        match self.handle {
            Handle::Document(html) => html.html(),
            Handle::Element(el) => el.html(),
        }
    }

    fn styles(&self) -> Vec<(String, String)> {
        self.as_element()
            .and_then(|el| el.value().attr("style"))
            .map(parse_style)
            .unwrap_or_default()
    }

    fn resolve(&self, raw: &str) -> String {
        self.base_url
            .and_then(|base| base.join(raw).ok())
            .map(String::from)
            .unwrap_or_else(|| raw.to_string())
    }

    fn select_value(el: ElementRef<'a>) -> Value {
        let options: Vec<ElementRef<'a>> = el
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "option")
            .collect();

        if el.value().attr("multiple").is_some() {
            return Value::Array(
                options
                    .iter()
                    .filter(|option| option.value().attr("selected").is_some())
                    .filter_map(|option| option.value().attr("value"))
                    .map(|value| Value::String(value.to_string()))
                    .collect(),
            );
        }

        // Without an explicit selection the first option is selected.
        options
            .iter()
            .find(|option| option.value().attr("selected").is_some())
            .or_else(|| options.first())
            .and_then(|option| option.value().attr("value"))
            .map(|value| Value::String(value.to_string()))
            .unwrap_or(Value::Null)
    }
}

impl<'a> MarkupElement for HtmlElement<'a> {
    fn text(&self) -> String {
        match self.handle {
            Handle::Document(html) => {
                let mut text = String::new();
                for node in html.tree.root().descendants() {
                    if let Some(chunk) = node.value().as_text() {
                        text.push_str(chunk);
                    }
                }
                text
            }
            Handle::Element(el) => el.text().collect(),
        }
    }

    fn value(&self) -> Value {
        let Some(el) = self.as_element() else {
            return Value::Null;
        };

        match el.value().name() {
            "textarea" => Value::String(self.text()),
            "select" => Self::select_value(el),
            "input" | "option" => optional_string(el.value().attr("value")),
            _ => Value::Null,
        }
    }

    fn inner_html(&self) -> Option<String> {
        match self.handle {
            Handle::Document(html) => Some(html.html()),
            Handle::Element(el) => Some(el.inner_html()),
        }
    }

    fn css(&self, property: &str) -> Option<String> {
        self.styles()
            .into_iter()
            .rev()
            .find(|(name, _)| name.eq_ignore_ascii_case(property))
            .map(|(_, value)| value)
    }

    fn data(&self, key: &str) -> Value {
        let attr_name = format!("data-{}", kebab_case(key));
        self.as_element()
            .and_then(|el| el.value().attr(&attr_name))
            .map(decode_data_value)
            .unwrap_or(Value::Null)
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.as_element()
            .and_then(|el| el.value().attr(name))
            .map(|value| value.to_string())
    }

    fn prop(&self, name: &str) -> Value {
        let Some(el) = self.as_element() else {
            return Value::Null;
        };

        match name {
            "tagName" | "nodeName" => Value::String(el.value().name().to_ascii_uppercase()),
            "innerHTML" => Value::String(el.inner_html()),
            "outerHTML" => Value::String(self.outer_html()),
            "textContent" | "innerText" => Value::String(self.text()),
            "style" => Value::Object(
                self.styles()
                    .into_iter()
                    .map(|(name, value)| (name, Value::String(value)))
                    .collect::<Map<String, Value>>(),
            ),
            "href" | "src" => el
                .value()
                .attr(name)
                .map(|raw| Value::String(self.resolve(raw)))
                .unwrap_or(Value::Null),
            _ if is_boolean_attr(name) => Value::Bool(self.has_attr(&name.to_ascii_lowercase())),
            _ => optional_string(el.value().attr(name)),
        }
    }

    fn find(&self, selector: &str) -> Option<Vec<Self>> {
        let selector = match Selector::parse(selector) {
            Ok(selector) => selector,
            Err(e) => {
                trace!("Invalid selector {:?}: {:?}", selector, e);
                return None;
            }
        };

        // Tree order, not node-creation order: the parser may relocate nodes.
        let descendants = match self.handle {
            Handle::Document(html) => html.tree.root().descendants().skip(1),
            Handle::Element(scope) => scope.descendants().skip(1),
        };

        let base_url = self.base_url;
        let matches: Vec<Self> = descendants
            .filter_map(ElementRef::wrap)
            .filter(|el| selector.matches(el))
            .map(|el| HtmlElement::element(el, base_url))
            .collect();

        Some(matches)
    }
}

fn optional_string(value: Option<&str>) -> Value {
    value
        .map(|value| Value::String(value.to_string()))
        .unwrap_or(Value::Null)
}

fn is_boolean_attr(name: &str) -> bool {
    const BOOLEAN_ATTRS: &[&str] = &[
        "async", "autofocus", "autoplay", "checked", "controls", "defer", "disabled", "hidden",
        "loop", "multiple", "open", "readonly", "required", "scoped", "selected",
    ];
    BOOLEAN_ATTRS.iter().any(|attr| attr.eq_ignore_ascii_case(name))
}

/// Splits an inline style attribute into `(property, value)` pairs.
fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// `fooBar` -> `foo-bar`.
fn kebab_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Decodes a `data-*` attribute: keywords, canonical numbers and JSON
/// containers become typed values, everything else stays a string.
fn decode_data_value(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        _ => {}
    }

    if let Ok(n) = raw.parse::<i64>() {
        if n.to_string() == raw {
            return Value::Number(n.into());
        }
    }

    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() && f != 0.0 && f.to_string() == raw {
            if let Some(n) = Number::from_f64(f) {
                return Value::Number(n);
            }
        }
    }

    let is_container = (raw.starts_with('{') && raw.ends_with('}'))
        || (raw.starts_with('[') && raw.ends_with(']'));
    if is_container {
        if let Ok(value) = serde_json::from_str(raw) {
            return value;
        }
    }

    Value::String(raw.to_string())
}
