//! In-memory `Page` over static markup, for driving the scrapers in tests.
//!
//! XPath locators never match. Scroll heights follow a script indexed by the
//! number of scrolls performed so far.

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Duration;

use super::locator::Locator;
use super::traits::Page;

pub struct SnapshotPage {
    url: RefCell<String>,
    markup: RefCell<String>,
    home: String,
    heights: Vec<i64>,
    scrolls: Cell<usize>,
    typed: RefCell<String>,
    routes: HashMap<String, (String, String)>,
    clicks: RefCell<Vec<String>>,
}

impl SnapshotPage {
    pub fn new(url: &str, markup: &str) -> Self {
        Self {
            url: RefCell::new(url.to_string()),
            markup: RefCell::new(markup.to_string()),
            home: markup.to_string(),
            heights: Vec::new(),
            scrolls: Cell::new(0),
            typed: RefCell::new(String::new()),
            routes: HashMap::new(),
            clicks: RefCell::new(Vec::new()),
        }
    }

    /// Heights reported by `scroll_height` after 0, 1, 2... scrolls; the last
    /// value repeats once the script runs out.
    pub fn with_scroll_heights(mut self, heights: Vec<i64>) -> Self {
        self.heights = heights;
        self
    }

    /// Submitting `query` in a search field loads `markup` at `url`.
    pub fn with_route(mut self, query: &str, url: &str, markup: &str) -> Self {
        self.routes
            .insert(query.to_string(), (url.to_string(), markup.to_string()));
        self
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.borrow().clone()
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.get()
    }

    fn with_document<T>(&self, f: impl FnOnce(&Html) -> T) -> T {
        let document = Html::parse_document(&self.markup.borrow());
        f(&document)
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn owns_text(element: &ElementRef<'_>, needle: &str) -> bool {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .any(|text| text.contains(needle))
}

fn text_of(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

fn matches_text(element: &ElementRef<'_>, css: &str, needle: &str) -> bool {
    if css == "*" {
        owns_text(element, needle)
    } else {
        text_of(element).contains(needle)
    }
}

fn select<'a>(document: &'a Html, locator: &Locator) -> Vec<ElementRef<'a>> {
    match locator {
        Locator::Css(css) => match selector(css) {
            Some(sel) => document.select(&sel).collect(),
            None => Vec::new(),
        },
        Locator::XPath(_) => Vec::new(),
        Locator::Text { css, needle } => match selector(css) {
            Some(sel) => document
                .select(&sel)
                .filter(|e| matches_text(e, css, needle))
                .collect(),
            None => Vec::new(),
        },
        Locator::Within { parent, index, child } => {
            match select(document, parent).into_iter().nth(*index) {
                Some(scope) => select_in(scope, child),
                None => Vec::new(),
            }
        }
    }
}

fn select_in<'a>(scope: ElementRef<'a>, locator: &Locator) -> Vec<ElementRef<'a>> {
    match locator {
        Locator::Css(css) => match selector(css) {
            Some(sel) => scope.select(&sel).collect(),
            None => Vec::new(),
        },
        Locator::XPath(_) => Vec::new(),
        Locator::Text { css, needle } => match selector(css) {
            Some(sel) => scope
                .select(&sel)
                .filter(|e| matches_text(e, css, needle))
                .collect(),
            None => Vec::new(),
        },
        Locator::Within { parent, index, child } => {
            match select_in(scope, parent).into_iter().nth(*index) {
                Some(inner) => select_in(inner, child),
                None => Vec::new(),
            }
        }
    }
}

fn is_shown(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    let hidden_style = value
        .attr("style")
        .map(|s| s.replace(' ', "").contains("display:none"))
        .unwrap_or(false);
    value.attr("hidden").is_none() && !hidden_style
}

impl Page for SnapshotPage {
    fn goto(&self, url: &str) -> Result<()> {
        *self.url.borrow_mut() = url.to_string();
        *self.markup.borrow_mut() = self.home.clone();
        self.scrolls.set(0);
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        Ok(self.url.borrow().clone())
    }

    fn content(&self) -> Result<String> {
        Ok(self.markup.borrow().clone())
    }

    fn count(&self, locator: &Locator) -> Result<usize> {
        Ok(self.with_document(|doc| select(doc, locator).len()))
    }

    fn text(&self, locator: &Locator, index: usize) -> Result<Option<String>> {
        Ok(self.with_document(|doc| select(doc, locator).get(index).map(text_of)))
    }

    fn all_texts(&self, locator: &Locator) -> Result<Vec<String>> {
        Ok(self.with_document(|doc| select(doc, locator).iter().map(text_of).collect()))
    }

    fn attribute(&self, locator: &Locator, index: usize, name: &str) -> Result<Option<String>> {
        Ok(self.with_document(|doc| {
            select(doc, locator)
                .get(index)
                .and_then(|e| e.value().attr(name).map(str::to_string))
        }))
    }

    fn is_visible(&self, locator: &Locator, index: usize) -> Result<bool> {
        Ok(self.with_document(|doc| select(doc, locator).get(index).map(is_shown).unwrap_or(false)))
    }

    fn click(&self, locator: &Locator, index: usize) -> Result<()> {
        if self.count(locator)? <= index {
            return Err(anyhow!("No element #{} matches {}", index, locator));
        }
        self.clicks.borrow_mut().push(locator.to_string());
        Ok(())
    }

    fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        if self.count(locator)? == 0 {
            return Err(anyhow!("No element matches {}", locator));
        }
        *self.typed.borrow_mut() = text.to_string();
        Ok(())
    }

    fn press(&self, key: &str) -> Result<()> {
        if key != "Enter" {
            return Ok(());
        }
        let typed = self.typed.borrow().clone();
        if let Some((url, markup)) = self.routes.get(&typed) {
            *self.url.borrow_mut() = url.clone();
            *self.markup.borrow_mut() = markup.clone();
            self.scrolls.set(0);
        }
        Ok(())
    }

    fn scroll_by(&self, container: &Locator, _pixels: i64) -> Result<()> {
        if self.count(container)? == 0 {
            return Err(anyhow!("No element matches {}", container));
        }
        self.scrolls.set(self.scrolls.get() + 1);
        Ok(())
    }

    fn scroll_height(&self, container: &Locator) -> Result<i64> {
        if self.count(container)? == 0 {
            return Err(anyhow!("No element matches {}", container));
        }
        let index = self.scrolls.get().min(self.heights.len().saturating_sub(1));
        Ok(self.heights.get(index).copied().unwrap_or(0))
    }

    fn scroll_into_view(&self, locator: &Locator, index: usize) -> Result<()> {
        if self.count(locator)? <= index {
            return Err(anyhow!("No element #{} matches {}", index, locator));
        }
        Ok(())
    }

    fn wait_for(&self, locator: &Locator, _timeout: Duration) -> Result<bool> {
        Ok(self.count(locator)? > 0)
    }
}
