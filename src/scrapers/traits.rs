use anyhow::Result;
use std::time::Duration;

use super::locator::Locator;
use super::types::DelayRange;

/// The rendering surface the scrapers drive.
///
/// Elements are addressed by locator plus match index so that implementations
/// never hand out borrowed element handles.
pub trait Page {
    fn goto(&self, url: &str) -> Result<()>;

    fn current_url(&self) -> Result<String>;

    /// Full markup of the current document
    fn content(&self) -> Result<String>;

    fn count(&self, locator: &Locator) -> Result<usize>;

    /// Text content of the `index`-th match, `None` when there is no such match
    fn text(&self, locator: &Locator, index: usize) -> Result<Option<String>>;

    /// Text content of every match
    fn all_texts(&self, locator: &Locator) -> Result<Vec<String>>;

    fn attribute(&self, locator: &Locator, index: usize, name: &str) -> Result<Option<String>>;

    fn is_visible(&self, locator: &Locator, index: usize) -> Result<bool>;

    fn click(&self, locator: &Locator, index: usize) -> Result<()>;

    /// Clear the first match and type `text` into it key by key
    fn fill(&self, locator: &Locator, text: &str) -> Result<()>;

    fn press(&self, key: &str) -> Result<()>;

    /// Scroll the first match of `container` down by `pixels`
    fn scroll_by(&self, container: &Locator, pixels: i64) -> Result<()>;

    fn scroll_height(&self, container: &Locator) -> Result<i64>;

    fn scroll_into_view(&self, locator: &Locator, index: usize) -> Result<()>;

    /// Wait until `locator` matches; `false` when the timeout expires first
    fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<bool>;
}

/// Owner of the live page, able to swap in a fresh browsing context
pub trait Session {
    fn page(&self) -> &dyn Page;

    fn rotate(&mut self) -> Result<()>;
}

/// Source of the pauses between browser actions
pub trait Pacer {
    fn pause(&self, range: DelayRange);

    /// Pause for the run's configured default range
    fn pause_default(&self);
}
