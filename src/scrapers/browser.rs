use anyhow::{anyhow, Context, Result};
use headless_chrome::protocol::cdp::Target;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use rand::seq::SliceRandom;
use rand::Rng;
use std::ffi::OsStr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::locator::Locator;
use super::traits::{Page, Session};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

fn random_viewport() -> (u32, u32) {
    let mut rng = rand::thread_rng();
    (rng.gen_range(1280..=1920), rng.gen_range(720..=1080))
}

/// The single Chrome instance of a run and its current browsing context.
///
/// Dropping the session closes the page and the browser, so every exit path
/// of the run releases them.
pub struct BrowserSession {
    page: ChromePage,
    context_id: String,
    browser: Browser,
}

impl BrowserSession {
    /// Launch Chrome and open a first context
    pub fn acquire(headless: bool) -> Result<Self> {
        info!("Launching Chrome (headless: {})...", headless);

        let (width, height) = random_viewport();
        let user_agent = format!("--user-agent={}", random_user_agent());
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .window_size(Some((width, height)))
            .args(vec![
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-setuid-sandbox"),
                OsStr::new("--disable-infobars"),
                OsStr::new("--window-position=0,0"),
                OsStr::new(&user_agent),
            ])
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let (context_id, page) = open_context(&browser)?;
        info!("Browser started successfully");

        Ok(Self {
            page,
            context_id,
            browser,
        })
    }

    /// Close the browser now instead of at scope exit
    pub fn release(self) {
        drop(self);
    }
}

/// Fresh incognito context with a randomized fingerprint
fn open_context(browser: &Browser) -> Result<(String, ChromePage)> {
    let context = browser
        .new_context()
        .context("Failed to create browser context")?;
    let context_id = context.get_id().to_string();
    let tab = context.new_tab().context("Failed to open tab")?;

    let (width, height) = random_viewport();
    let user_agent = random_user_agent();
    tab.set_user_agent(user_agent, None, None)?;
    tab.enable_stealth_mode()?;
    if let Err(e) = tab.set_bounds(Bounds::Normal {
        left: Some(0),
        top: Some(0),
        width: Some(f64::from(width)),
        height: Some(f64::from(height)),
    }) {
        warn!("Could not resize window: {}", e);
    }

    info!("Fresh context created. Viewport: {}x{}", width, height);
    Ok((context_id, ChromePage { tab }))
}

impl Session for BrowserSession {
    fn page(&self) -> &dyn Page {
        &self.page
    }

    fn rotate(&mut self) -> Result<()> {
        let (context_id, page) = open_context(&self.browser)?;
        let old_page = std::mem::replace(&mut self.page, page);
        let old_context = std::mem::replace(&mut self.context_id, context_id);

        if let Err(e) = old_page.tab.close(true) {
            warn!("Failed to close previous tab: {}", e);
        }
        let dispose = Target::DisposeBrowserContext {
            browser_context_id: old_context.clone(),
        };
        if let Err(e) = self.page.tab.call_method(dispose) {
            debug!("Could not dispose context {}: {}", old_context, e);
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Err(e) = self.page.tab.close(true) {
            debug!("Tab already gone on shutdown: {}", e);
        }
        info!("Browser closed.");
    }
}

/// A Chrome tab seen through the `Page` interface
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    fn resolve(&self, locator: &Locator) -> Vec<Element<'_>> {
        match locator {
            Locator::Css(css) => self.tab.find_elements(css).unwrap_or_default(),
            Locator::XPath(xpath) => self.tab.find_elements_by_xpath(xpath).unwrap_or_default(),
            Locator::Text { css, needle } if css == "*" => self
                .tab
                .find_elements_by_xpath(&own_text_xpath(needle))
                .unwrap_or_default(),
            Locator::Text { css, needle } => {
                with_text(self.tab.find_elements(css).unwrap_or_default(), needle)
            }
            Locator::Within { parent, index, child } => {
                match self.resolve(parent).into_iter().nth(*index) {
                    Some(scope) => resolve_in(&scope, child),
                    None => Vec::new(),
                }
            }
        }
    }

    fn nth(&self, locator: &Locator, index: usize) -> Option<Element<'_>> {
        self.resolve(locator).into_iter().nth(index)
    }

    fn first(&self, locator: &Locator) -> Result<Element<'_>> {
        self.nth(locator, 0)
            .ok_or_else(|| anyhow!("No element matches {}", locator))
    }
}

fn resolve_in<'a>(scope: &Element<'a>, locator: &Locator) -> Vec<Element<'a>> {
    match locator {
        Locator::Css(css) => scope.find_elements(css).unwrap_or_default(),
        Locator::XPath(xpath) => xpath_in(scope, &scoped_xpath(xpath)),
        Locator::Text { css, needle } if css == "*" => xpath_in(scope, &scoped_xpath(&own_text_xpath(needle))),
        Locator::Text { css, needle } => with_text(scope.find_elements(css).unwrap_or_default(), needle),
        Locator::Within { parent, index, child } => {
            match resolve_in(scope, parent).into_iter().nth(*index) {
                Some(inner) => resolve_in(&inner, child),
                None => Vec::new(),
            }
        }
    }
}

const HIT_MARK: &str = "data-scout-hit";

/// Evaluate `xpath` with `scope` as the context node.
///
/// Matches are tagged in the page and read back with a CSS query on `scope`,
/// so the returned handles live as long as the tab, not as long as `scope`.
fn xpath_in<'a>(scope: &Element<'a>, xpath: &str) -> Vec<Element<'a>> {
    let tag = format!(
        "function(xp) {{ const r = document.evaluate(xp, this, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
         for (let i = 0; i < r.snapshotLength; i++) {{ const n = r.snapshotItem(i); if (n.setAttribute) n.setAttribute('{HIT_MARK}', ''); }} \
         return r.snapshotLength; }}"
    );
    if let Err(e) = scope.call_js_fn(&tag, vec![serde_json::json!(xpath)], false) {
        debug!("XPath {} failed in scope: {}", xpath, e);
        return Vec::new();
    }

    let hits = scope
        .find_elements(&format!("[{HIT_MARK}]"))
        .unwrap_or_default();

    let clear = format!(
        "function() {{ this.querySelectorAll('[{HIT_MARK}]').forEach(n => n.removeAttribute('{HIT_MARK}')); }}"
    );
    if let Err(e) = scope.call_js_fn(&clear, vec![], false) {
        debug!("Could not clear XPath marks: {}", e);
    }
    hits
}

/// Anchor a document-rooted expression at the context node
fn scoped_xpath(xpath: &str) -> String {
    if xpath.starts_with('/') {
        format!(".{}", xpath)
    } else {
        xpath.to_string()
    }
}

/// Elements owning a text node that contains `needle`
fn own_text_xpath(needle: &str) -> String {
    format!("//*[text()[contains(., '{}')]]", needle.replace('\'', ""))
}

fn with_text<'a>(elements: Vec<Element<'a>>, needle: &str) -> Vec<Element<'a>> {
    elements
        .into_iter()
        .filter(|e| e.get_inner_text().map(|t| t.contains(needle)).unwrap_or(false))
        .collect()
}

fn js_value(element: &Element<'_>, function: &str) -> Result<Option<serde_json::Value>> {
    Ok(element.call_js_fn(function, vec![], false)?.value)
}

impl Page for ChromePage {
    fn goto(&self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to navigate to {}", url))?;
        self.tab.wait_until_navigated()?;
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        Ok(self.tab.get_url())
    }

    fn content(&self) -> Result<String> {
        self.tab.get_content()
    }

    fn count(&self, locator: &Locator) -> Result<usize> {
        Ok(self.resolve(locator).len())
    }

    fn text(&self, locator: &Locator, index: usize) -> Result<Option<String>> {
        match self.nth(locator, index) {
            Some(element) => {
                let text = js_value(&element, "function() { return this.textContent; }")?;
                Ok(text.and_then(|v| v.as_str().map(str::to_string)))
            }
            None => Ok(None),
        }
    }

    fn all_texts(&self, locator: &Locator) -> Result<Vec<String>> {
        let mut texts = Vec::new();
        for element in self.resolve(locator) {
            let text = js_value(&element, "function() { return this.textContent; }")?;
            texts.push(text.and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default());
        }
        Ok(texts)
    }

    fn attribute(&self, locator: &Locator, index: usize, name: &str) -> Result<Option<String>> {
        match self.nth(locator, index) {
            Some(element) => element.get_attribute_value(name),
            None => Ok(None),
        }
    }

    fn is_visible(&self, locator: &Locator, index: usize) -> Result<bool> {
        match self.nth(locator, index) {
            Some(element) => {
                let visible = js_value(
                    &element,
                    "function() { return !!(this.offsetWidth || this.offsetHeight || this.getClientRects().length); }",
                )?;
                Ok(visible.and_then(|v| v.as_bool()).unwrap_or(false))
            }
            None => Ok(false),
        }
    }

    fn click(&self, locator: &Locator, index: usize) -> Result<()> {
        let element = self
            .nth(locator, index)
            .ok_or_else(|| anyhow!("No element #{} matches {}", index, locator))?;
        element.click()?;
        Ok(())
    }

    fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
        let element = self.first(locator)?;
        element.call_js_fn("function() { this.value = ''; }", vec![], false)?;
        element.click()?;

        let mut rng = rand::thread_rng();
        for c in text.chars() {
            self.tab.type_str(&c.to_string())?;
            thread::sleep(Duration::from_millis(rng.gen_range(50..=150)));
        }
        Ok(())
    }

    fn press(&self, key: &str) -> Result<()> {
        self.tab.press_key(key)?;
        Ok(())
    }

    fn scroll_by(&self, container: &Locator, pixels: i64) -> Result<()> {
        let element = self.first(container)?;
        element.call_js_fn(
            &format!("function() {{ this.scrollBy(0, {}); }}", pixels),
            vec![],
            false,
        )?;
        Ok(())
    }

    fn scroll_height(&self, container: &Locator) -> Result<i64> {
        let element = self.first(container)?;
        let height = js_value(&element, "function() { return this.scrollHeight; }")?;
        height
            .and_then(|v| v.as_i64())
            .ok_or_else(|| anyhow!("scrollHeight unavailable for {}", container))
    }

    fn scroll_into_view(&self, locator: &Locator, index: usize) -> Result<()> {
        let element = self
            .nth(locator, index)
            .ok_or_else(|| anyhow!("No element #{} matches {}", index, locator))?;
        element.scroll_into_view()?;
        Ok(())
    }

    fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<bool> {
        let started = Instant::now();
        loop {
            if self.count(locator)? > 0 {
                return Ok(true);
            }
            if started.elapsed() >= timeout {
                return Ok(false);
            }
            thread::sleep(Duration::from_millis(250));
        }
    }
}
