//! Selector normalization into the single dialect drivers understand.

use super::descriptor::{LocatorDescriptor, Strategy};
use std::fmt;

/// A selector in the driver dialect.
///
/// Renders as plain CSS, an XPath expression starting with `/` or `(`,
/// `text=<needle>`, or `<tag>:has-text('<needle>')`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DialectSelector {
    Css(String),
    XPath(String),
    /// Visible-text match, case-insensitive substring.
    Text(String),
    /// CSS selector filtered by contained text.
    CssWithText { css: String, text: String },
}

impl DialectSelector {
    /// Classify a raw selector string.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("//") || raw.starts_with("(//") {
            return DialectSelector::XPath(raw.to_string());
        }
        if let Some(text) = raw.strip_prefix("text=") {
            return DialectSelector::Text(unquote(text).to_string());
        }
        if let Some(xpath) = raw.strip_prefix("xpath=") {
            return DialectSelector::XPath(xpath.to_string());
        }
        if let Some(css) = raw.strip_prefix("css=") {
            return DialectSelector::Css(css.to_string());
        }
        if let Some((css, text)) = parse_has_text(raw) {
            return DialectSelector::CssWithText { css, text };
        }
        DialectSelector::Css(raw.to_string())
    }
}

impl fmt::Display for DialectSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialectSelector::Css(css) => f.write_str(css),
            DialectSelector::XPath(xpath) => f.write_str(xpath),
            DialectSelector::Text(text) => write!(f, "text={}", text),
            DialectSelector::CssWithText { css, text } => {
                write!(f, "{}:has-text('{}')", css, text)
            }
        }
    }
}

/// Convert a descriptor into the driver dialect. Pure, never fails.
pub fn normalize(descriptor: &LocatorDescriptor) -> DialectSelector {
    match descriptor {
        LocatorDescriptor::Raw { selector } => DialectSelector::parse(selector),
        LocatorDescriptor::Pair { strategy, value } => match strategy {
            Strategy::Css => DialectSelector::Css(value.clone()),
            Strategy::XPath => {
                if value.starts_with('/') || value.starts_with('(') || value.starts_with('.') {
                    DialectSelector::XPath(value.clone())
                } else {
                    DialectSelector::XPath(format!("//{}", value))
                }
            }
            Strategy::Text => DialectSelector::Text(value.clone()),
            Strategy::Id => DialectSelector::Css(format!("#{}", value)),
        },
    }
}

/// `button:has-text('Cancel')` -> (`button`, `Cancel`).
///
/// Only a bare tag name (or nothing) may precede the pseudo-class; anything
/// more elaborate stays CSS and is left for the driver to reject.
fn parse_has_text(raw: &str) -> Option<(String, String)> {
    let (prefix, rest) = raw.split_once(":has-text(")?;
    let inner = rest.strip_suffix(')')?;
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }
    let css = if prefix.is_empty() { "*" } else { prefix };
    Some((css.to_string(), unquote(inner).to_string()))
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    for quote in ['\'', '"'] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}
