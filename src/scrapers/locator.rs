//! Element locators and ordered fallback chains

use anyhow::Result;
use serde::Deserialize;
use std::fmt;

use super::traits::Page;

/// How to find elements on a page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Locator {
    Css(String),
    XPath(String),
    /// Elements matching `css` whose text contains `needle`
    Text { css: String, needle: String },
    /// `child` looked up inside the `index`-th element matched by `parent`
    Within {
        parent: Box<Locator>,
        index: usize,
        child: Box<Locator>,
    },
}

impl Locator {
    /// Parse a catalogue string.
    ///
    /// `//…`, `(…` and `xpath=…` are XPath, `text=…` matches any element by
    /// text and `css:has-text('…')` narrows a CSS selector by text.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(xpath) = raw.strip_prefix("xpath=") {
            return Self::XPath(xpath.to_string());
        }
        if raw.starts_with("//") || raw.starts_with('(') {
            return Self::XPath(raw.to_string());
        }
        if let Some(needle) = raw.strip_prefix("text=") {
            return Self::text("*", needle.trim_matches(|c| c == '"' || c == '\''));
        }
        if let Some(start) = raw.find(":has-text(") {
            let css = &raw[..start];
            let rest = &raw[start + ":has-text(".len()..];
            if let Some(needle) = rest.strip_suffix(')') {
                return Self::text(css, needle.trim_matches(|c| c == '"' || c == '\''));
            }
        }
        Self::Css(raw.to_string())
    }

    pub fn text(css: &str, needle: &str) -> Self {
        let css = if css.is_empty() { "*" } else { css };
        Self::Text {
            css: css.to_string(),
            needle: needle.to_string(),
        }
    }

    /// Scope `child` to the `index`-th match of `self`.
    pub fn within(&self, index: usize, child: &Locator) -> Self {
        Self::Within {
            parent: Box::new(self.clone()),
            index,
            child: Box::new(child.clone()),
        }
    }
}

impl From<String> for Locator {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for Locator {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{css}"),
            Self::XPath(xpath) => write!(f, "xpath={xpath}"),
            Self::Text { css, needle } => write!(f, "{css}:has-text('{needle}')"),
            Self::Within { parent, index, child } => write!(f, "{parent} >> nth={index} >> {child}"),
        }
    }
}

/// Strategies tried in order until one finds an element
#[derive(Debug, Clone, Default)]
pub struct LocatorChain {
    strategies: Vec<Locator>,
}

impl LocatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, locator: Locator) -> Self {
        self.strategies.push(locator);
        self
    }

    /// Append `locator` when present.
    pub fn then_some(self, locator: Option<&Locator>) -> Self {
        match locator {
            Some(locator) => self.then(locator.clone()),
            None => self,
        }
    }

    #[cfg(test)]
    pub fn strategies(&self) -> &[Locator] {
        &self.strategies
    }

    /// First strategy matching at least one element. With `visible`, the
    /// first matched element must also be visible.
    pub fn first_match(&self, page: &dyn Page, visible: bool) -> Result<Option<&Locator>> {
        for locator in &self.strategies {
            if page.count(locator)? == 0 {
                continue;
            }
            if visible && !page.is_visible(locator, 0)? {
                continue;
            }
            return Ok(Some(locator));
        }
        Ok(None)
    }
}
