use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::SelectorCatalogue;
use crate::models::{PlaceRecord, ReviewRecord};

use super::dates::parse_relative_date;
use super::locator::{Locator, LocatorChain};
use super::traits::{Pacer, Page};
use super::types::{DelayRange, HarvestLimits, ScrollOutcome, StopReason};

const SCROLL_STEP: i64 = 5000;
const MENU_TIMEOUT: Duration = Duration::from_secs(5);

fn interrupted(cycles: usize, error: anyhow::Error) -> ScrollOutcome {
    warn!("Scrolling stopped after {} cycles: {:#}", cycles, error);
    ScrollOutcome {
        cycles,
        reason: StopReason::Interrupted,
    }
}

/// Loads a place's review list and reads every rendered review
pub struct ReviewHarvester<'a> {
    page: &'a dyn Page,
    selectors: &'a SelectorCatalogue,
    pacer: &'a dyn Pacer,
    limits: HarvestLimits,
}

impl<'a> ReviewHarvester<'a> {
    pub fn new(
        page: &'a dyn Page,
        selectors: &'a SelectorCatalogue,
        pacer: &'a dyn Pacer,
        limits: HarvestLimits,
    ) -> Self {
        Self {
            page,
            selectors,
            pacer,
            limits,
        }
    }

    /// Harvest the reviews of the place whose detail panel is showing.
    ///
    /// An unreachable reviews tab or list yields no reviews rather than an error.
    pub fn harvest(&self, place: &PlaceRecord) -> Vec<ReviewRecord> {
        match self.try_harvest(place) {
            Ok(reviews) => reviews,
            Err(e) => {
                error!("Error during review scraping: {:#}", e);
                Vec::new()
            }
        }
    }

    fn try_harvest(&self, place: &PlaceRecord) -> Result<Vec<ReviewRecord>> {
        if !self.open_reviews_tab()? {
            error!("Reviews tab not found or not clickable.");
            return Ok(Vec::new());
        }
        self.pacer.pause(DelayRange::new(3.0, 5.0));

        self.sort_by_newest()?;

        let containers = self.container_chain();
        let Some(container) = containers.first_match(self.page, false)? else {
            error!("Review container not found.");
            return Ok(Vec::new());
        };

        let outcome = self.load(container);
        let rendered = self.page.count(&self.selectors.reviews.item)?;
        info!(
            "Finished scrolling after {} cycles ({:?}). Found {} potential reviews.",
            outcome.cycles, outcome.reason, rendered
        );

        Ok(self.extract_all(place, rendered))
    }

    fn open_reviews_tab(&self) -> Result<bool> {
        let sel = &self.selectors.reviews;
        let chain = LocatorChain::new()
            .then(sel.tab_button.clone())
            .then(Locator::text("button", &sel.tab_text))
            .then(Locator::text("div[role='tab']", &sel.tab_text));

        match chain.first_match(self.page, true)? {
            Some(tab) => {
                info!("Clicking reviews tab using locator: {}", tab);
                self.page.click(tab, 0)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Switch to newest-first ordering. Returns whether it took effect; a
    /// missing sort control or option leaves the default order.
    fn sort_by_newest(&self) -> Result<bool> {
        let sel = &self.selectors.reviews;
        let fallbacks = &self.selectors.xpath_fallbacks;

        let sort_buttons = LocatorChain::new()
            .then(sel.sort_button.clone())
            .then_some(fallbacks.sort_button.as_ref());
        let Some(sort_button) = sort_buttons.first_match(self.page, true)? else {
            warn!("Sort button not found.");
            return Ok(false);
        };

        info!("Opening sort menu.");
        self.page.click(sort_button, 0)?;
        self.pacer.pause(DelayRange::new(2.0, 3.0));
        let menu = Locator::Css("div[role='menuitemradio'], div[role='menuitem']".into());
        if !self.page.wait_for(&menu, MENU_TIMEOUT)? {
            warn!("Sort menu did not render.");
        }

        let newest_options = LocatorChain::new()
            .then(sel.sort_newest.clone())
            .then(Locator::text("div[role='menuitemradio']", &sel.newest_text))
            .then(Locator::text("div[role='menuitem']", &sel.newest_text))
            .then(Locator::text("*", &sel.newest_text))
            .then_some(fallbacks.sort_newest.as_ref());
        match newest_options.first_match(self.page, false)? {
            Some(newest) => {
                info!("Selecting '{}' sort option.", sel.newest_text);
                self.page.click(newest, 0)?;
                self.pacer.pause(DelayRange::new(4.0, 6.0));
                Ok(true)
            }
            None => {
                warn!("Sort option '{}' not found.", sel.newest_text);
                Ok(false)
            }
        }
    }

    fn container_chain(&self) -> LocatorChain {
        LocatorChain::new()
            .then(self.selectors.reviews.container.clone())
            .then(Locator::Css("div.m6QErb[tabindex='-1']".into()))
            .then(Locator::Css("div[role='main']".into()))
    }

    /// Scroll `container` until its height stops growing, the scroll budget
    /// runs out, or enough reviews are rendered. A failing scroll ends the
    /// loop early with whatever has been loaded.
    pub fn load(&self, container: &Locator) -> ScrollOutcome {
        let mut cycles = 0;
        let mut last_height = match self.page.scroll_height(container) {
            Ok(height) => height,
            Err(e) => return interrupted(cycles, e),
        };

        while cycles < self.limits.max_scrolls {
            cycles += 1;
            match self.scroll_cycle(container, last_height) {
                Ok(Some(height)) => last_height = height,
                Ok(None) => {
                    info!("Reached the end of the list or stuck.");
                    return ScrollOutcome {
                        cycles,
                        reason: StopReason::Stable,
                    };
                }
                Err(e) => return interrupted(cycles, e),
            }

            let max = self.limits.max_reviews;
            if max > 0 && self.page.count(&self.selectors.reviews.item).unwrap_or(0) >= max {
                return ScrollOutcome {
                    cycles,
                    reason: StopReason::MaxReviews,
                };
            }
        }

        ScrollOutcome {
            cycles,
            reason: StopReason::MaxScrolls,
        }
    }

    /// One scroll+wait cycle. Returns the new height, or `None` when the
    /// height did not move even after a retry.
    fn scroll_cycle(&self, container: &Locator, last_height: i64) -> Result<Option<i64>> {
        self.page.scroll_by(container, SCROLL_STEP)?;
        self.reveal_last_item();
        self.pacer.pause(DelayRange::new(1.5, 3.0));
        self.click_more_reviews();

        let height = self.page.scroll_height(container)?;
        if height != last_height {
            return Ok(Some(height));
        }
        self.page.scroll_by(container, SCROLL_STEP)?;
        self.pacer.pause(DelayRange::new(1.0, 2.0));
        let height = self.page.scroll_height(container)?;
        Ok((height != last_height).then_some(height))
    }

    fn reveal_last_item(&self) {
        let item = &self.selectors.reviews.item;
        let rendered = self.page.count(item).unwrap_or(0);
        if rendered == 0 {
            return;
        }
        if let Err(e) = self.page.scroll_into_view(item, rendered - 1) {
            debug!("Could not scroll last review into view: {}", e);
        }
    }

    /// Best-effort click on the "more reviews" control
    fn click_more_reviews(&self) {
        let button = &self.selectors.reviews.more_reviews_button;
        let shown = self.page.count(button).map(|n| n > 0).unwrap_or(false)
            && self.page.is_visible(button, 0).unwrap_or(false);
        if !shown {
            return;
        }
        info!("Clicking 'more reviews' button.");
        match self.page.click(button, 0) {
            Ok(()) => self.pacer.pause(DelayRange::new(2.0, 4.0)),
            Err(e) => warn!("Could not click 'more reviews' button: {:#}", e),
        }
    }

    fn extract_all(&self, place: &PlaceRecord, rendered: usize) -> Vec<ReviewRecord> {
        let mut reviews = Vec::with_capacity(rendered);
        for index in 0..rendered {
            match self.extract_one(place, index) {
                Ok(review) => reviews.push(review),
                Err(e) => warn!("Error extracting single review: {:#}", e),
            }
        }
        reviews
    }

    fn extract_one(&self, place: &PlaceRecord, index: usize) -> Result<ReviewRecord> {
        let sel = &self.selectors.reviews;
        let scoped = |child: &Locator| sel.item.within(index, child);

        let more = scoped(&sel.more_button);
        if self.page.count(&more)? > 0 {
            match self.page.click(&more, 0) {
                Ok(()) => self.pacer.pause(DelayRange::new(0.5, 1.0)),
                Err(e) => debug!("Could not expand review #{}: {}", index, e),
            }
        }

        let author = self
            .page
            .text(&scoped(&sel.author), 0)?
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| anyhow!("review #{} has no author", index))?;
        let date_raw = self.page.text(&scoped(&sel.date), 0)?;
        let owner_reply_date_raw = match &sel.owner_reply_date {
            Some(locator) => self.page.text(&scoped(locator), 0)?,
            None => None,
        };
        let owner_reply = match &sel.owner_reply_text {
            Some(locator) => self.page.text(&scoped(locator), 0)?.unwrap_or_default(),
            None => String::new(),
        };

        Ok(ReviewRecord {
            place_id: place.place_id.clone(),
            review_id: self.page.attribute(&sel.item, index, "data-review-id")?,
            author,
            rating: self.page.attribute(&scoped(&sel.rating), 0, "aria-label")?,
            date: parse_relative_date(date_raw.as_deref()),
            date_raw,
            text: self.page.text(&scoped(&sel.text), 0)?.unwrap_or_default(),
            owner_reply,
            owner_reply_date: parse_relative_date(owner_reply_date_raw.as_deref()),
            owner_reply_date_raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::pacing::NoPause;
    use crate::scrapers::snapshot::SnapshotPage;
    use chrono::{Duration as Days, Local};

    const REVIEWS: &str = r#"
        <button role="tab" aria-label="Ulasan untuk Monas">Ulasan</button>
        <button aria-label="Urutkan ulasan">Urutkan</button>
        <div role="menuitemradio" data-index="0">Paling relevan</div>
        <div role="menuitemradio" data-index="1">Terbaru</div>
        <div class="m6QErb DxyBCb kA9KIf dS8AEf" tabindex="-1">
          <div class="jftiEf" data-review-id="r1">
            <div class="d4r55"> Budi </div>
            <span class="kvMYJc" aria-label="5 bintang"></span>
            <span class="rsqaWe">2 hari lalu</span>
            <span class="wiI7pd">Tempatnya bagus </span>
            <button class="w8nwRe">Lainnya</button>
            <div class="CDe7pd"><span class="DZSIDd">Baru</span><div class="wiI7pd">Terima kasih</div></div>
          </div>
          <div class="jftiEf" data-review-id="r2">
            <div class="d4r55">Sari</div>
            <span class="kvMYJc" aria-label="3 bintang"></span>
            <span class="rsqaWe">Baru</span>
          </div>
          <div class="jftiEf"><span class="rsqaWe">1 minggu lalu</span></div>
        </div>"#;

    fn catalogue() -> SelectorCatalogue {
        SelectorCatalogue::builtin().unwrap()
    }

    fn place() -> PlaceRecord {
        PlaceRecord {
            place_id: Some("ChIJplace".into()),
            query_name: "Monas".into(),
            ..PlaceRecord::default()
        }
    }

    fn container(selectors: &SelectorCatalogue) -> Locator {
        selectors.reviews.container.clone()
    }

    #[test]
    fn harvests_rendered_reviews_newest_first() {
        let selectors = catalogue();
        let page = SnapshotPage::new("https://maps.test/place", REVIEWS).with_scroll_heights(vec![800, 800]);
        let limits = HarvestLimits { max_scrolls: 10, max_reviews: 0 };
        let reviews = ReviewHarvester::new(&page, &selectors, &NoPause, limits).harvest(&place());

        // the third card has no author and is skipped
        assert_eq!(reviews.len(), 2);
        let first = &reviews[0];
        assert_eq!(first.review_id.as_deref(), Some("r1"));
        assert_eq!(first.place_id.as_deref(), Some("ChIJplace"));
        assert_eq!(first.author, " Budi ");
        assert_eq!(first.rating.as_deref(), Some("5 bintang"));
        assert_eq!(first.date_raw.as_deref(), Some("2 hari lalu"));
        let today = Local::now().date_naive();
        let expected = first.date.unwrap();
        assert!(expected == today - Days::days(2) || expected == today - Days::days(1));
        assert_eq!(first.owner_reply, "Terima kasih");
        assert_eq!(first.owner_reply_date_raw.as_deref(), Some("Baru"));
        assert_eq!(reviews[1].text, "");
        assert_eq!(reviews[1].owner_reply, "");

        let clicks = page.clicks();
        assert_eq!(clicks[0], "button[role='tab'][aria-label^='Ulasan']");
        assert_eq!(clicks[1], "button[aria-label='Urutkan ulasan']");
        assert_eq!(clicks[2], "div[role='menuitemradio'][data-index='1']");
        assert!(clicks.contains(&"div.jftiEf >> nth=0 >> button.w8nwRe".to_string()));
    }

    #[test]
    fn missing_reviews_tab_yields_nothing() {
        let selectors = catalogue();
        let page = SnapshotPage::new("https://maps.test/place", "<h1 class='DUwDvf'>Monas</h1>");
        let reviews = ReviewHarvester::new(&page, &selectors, &NoPause, HarvestLimits::default()).harvest(&place());
        assert!(reviews.is_empty());
        assert!(page.clicks().is_empty());
    }

    #[test]
    fn missing_sort_control_keeps_default_order() {
        let selectors = catalogue();
        let markup = r#"
            <div role="tab">Ulasan</div>
            <div role="main"><div class="jftiEf"><div class="d4r55">Ani</div></div></div>"#;
        let page = SnapshotPage::new("https://maps.test/place", markup);
        let reviews = ReviewHarvester::new(&page, &selectors, &NoPause, HarvestLimits::default()).harvest(&place());

        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].author, "Ani");
        assert_eq!(page.clicks(), vec!["div[role='tab']:has-text('Ulasan')".to_string()]);
    }

    #[test]
    fn review_cap_ends_scrolling_but_every_rendered_item_is_read() {
        let selectors = catalogue();
        let page = SnapshotPage::new("https://maps.test/place", REVIEWS).with_scroll_heights(vec![100, 200, 300]);
        let limits = HarvestLimits { max_scrolls: 10, max_reviews: 1 };
        let reviews = ReviewHarvester::new(&page, &selectors, &NoPause, limits).harvest(&place());

        assert_eq!(page.scrolls(), 1);
        let ids: Vec<_> = reviews.iter().map(|r| r.review_id.as_deref()).collect();
        assert_eq!(ids, vec![Some("r1"), Some("r2")]);
    }

    /// Delegates to a snapshot but fails selected interactions
    struct FlakyPage {
        inner: SnapshotPage,
        failing_click: Option<&'static str>,
        failing_scroll: bool,
    }

    impl Page for FlakyPage {
        fn goto(&self, url: &str) -> Result<()> {
            self.inner.goto(url)
        }

        fn current_url(&self) -> Result<String> {
            self.inner.current_url()
        }

        fn content(&self) -> Result<String> {
            self.inner.content()
        }

        fn count(&self, locator: &Locator) -> Result<usize> {
            self.inner.count(locator)
        }

        fn text(&self, locator: &Locator, index: usize) -> Result<Option<String>> {
            self.inner.text(locator, index)
        }

        fn all_texts(&self, locator: &Locator) -> Result<Vec<String>> {
            self.inner.all_texts(locator)
        }

        fn attribute(&self, locator: &Locator, index: usize, name: &str) -> Result<Option<String>> {
            self.inner.attribute(locator, index, name)
        }

        fn is_visible(&self, locator: &Locator, index: usize) -> Result<bool> {
            self.inner.is_visible(locator, index)
        }

        fn click(&self, locator: &Locator, index: usize) -> Result<()> {
            match self.failing_click {
                Some(needle) if locator.to_string().contains(needle) => {
                    Err(anyhow!("Node is detached from document"))
                }
                _ => self.inner.click(locator, index),
            }
        }

        fn fill(&self, locator: &Locator, text: &str) -> Result<()> {
            self.inner.fill(locator, text)
        }

        fn press(&self, key: &str) -> Result<()> {
            self.inner.press(key)
        }

        fn scroll_by(&self, container: &Locator, pixels: i64) -> Result<()> {
            if self.failing_scroll {
                return Err(anyhow!("Target closed"));
            }
            self.inner.scroll_by(container, pixels)
        }

        fn scroll_height(&self, container: &Locator) -> Result<i64> {
            self.inner.scroll_height(container)
        }

        fn scroll_into_view(&self, locator: &Locator, index: usize) -> Result<()> {
            self.inner.scroll_into_view(locator, index)
        }

        fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<bool> {
            self.inner.wait_for(locator, timeout)
        }
    }

    const PAGINATED: &str = r#"
        <button role="tab" aria-label="Ulasan">Ulasan</button>
        <div class="m6QErb DxyBCb kA9KIf dS8AEf" tabindex="-1">
          <div class="jftiEf" data-review-id="a"><div class="d4r55">Ani</div></div>
          <div class="jftiEf" data-review-id="b"><div class="d4r55">Bayu</div></div>
        </div>
        <button>Ulasan lainnya</button>"#;

    #[test]
    fn failed_pagination_click_keeps_rendered_reviews() {
        let selectors = catalogue();
        let page = FlakyPage {
            inner: SnapshotPage::new("https://maps.test/place", PAGINATED).with_scroll_heights(vec![10, 20, 30, 40]),
            failing_click: Some("Ulasan lainnya"),
            failing_scroll: false,
        };
        let limits = HarvestLimits { max_scrolls: 3, max_reviews: 0 };
        let reviews = ReviewHarvester::new(&page, &selectors, &NoPause, limits).harvest(&place());

        assert_eq!(reviews.len(), 2);
        assert_eq!(page.inner.scrolls(), 3);
    }

    #[test]
    fn failed_scroll_stops_loading_but_still_extracts() {
        let selectors = catalogue();
        let page = FlakyPage {
            inner: SnapshotPage::new("https://maps.test/place", PAGINATED),
            failing_click: None,
            failing_scroll: true,
        };
        let harvester = ReviewHarvester::new(&page, &selectors, &NoPause, HarvestLimits::default());

        let outcome = harvester.load(&container(&selectors));
        assert_eq!(outcome, ScrollOutcome { cycles: 1, reason: StopReason::Interrupted });

        let authors: Vec<_> = harvester.harvest(&place()).into_iter().map(|r| r.author).collect();
        assert_eq!(authors, vec!["Ani", "Bayu"]);
    }

    #[test]
    fn failed_expand_click_keeps_the_review() {
        let selectors = catalogue();
        let page = FlakyPage {
            inner: SnapshotPage::new("https://maps.test/place", REVIEWS),
            failing_click: Some("button.w8nwRe"),
            failing_scroll: false,
        };
        let reviews = ReviewHarvester::new(&page, &selectors, &NoPause, HarvestLimits::default()).harvest(&place());
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].text, "Tempatnya bagus ");
    }

    #[test]
    fn supplied_fallbacks_drive_the_sort_menu() {
        let selectors = SelectorCatalogue::builtin_with_fallbacks(serde_json::json!({
            "sort_button": "button.alt-sort",
            "sort_newest": "li.alt-newest"
        }))
        .unwrap();
        let markup = r#"
            <button role="tab" aria-label="Ulasan">Ulasan</button>
            <button class="alt-sort">Urutkan</button>
            <ul><li class="alt-newest">Paling baru</li></ul>
            <div class="m6QErb DxyBCb kA9KIf dS8AEf" tabindex="-1">
              <div class="jftiEf"><div class="d4r55">Ani</div></div>
            </div>"#;
        let page = SnapshotPage::new("https://maps.test/place", markup);
        let reviews = ReviewHarvester::new(&page, &selectors, &NoPause, HarvestLimits::default()).harvest(&place());

        assert_eq!(reviews.len(), 1);
        assert_eq!(
            page.clicks(),
            vec![
                "button[role='tab'][aria-label^='Ulasan']".to_string(),
                "button.alt-sort".to_string(),
                "li.alt-newest".to_string(),
            ]
        );
    }

    #[test]
    fn scrolling_stops_one_retry_after_height_settles() {
        let selectors = catalogue();
        // grows for k = 3 cycles, then stays put
        let page = SnapshotPage::new("https://maps.test/place", REVIEWS)
            .with_scroll_heights(vec![100, 200, 300, 400]);
        let limits = HarvestLimits { max_scrolls: 50, max_reviews: 0 };
        let harvester = ReviewHarvester::new(&page, &selectors, &NoPause, limits);

        let outcome = harvester.load(&container(&selectors));
        assert_eq!(outcome.reason, StopReason::Stable);
        assert!(outcome.cycles <= 3 + 2);
        assert_eq!(outcome.cycles, 4);
    }

    #[test]
    fn scrolling_never_exceeds_the_budget() {
        let selectors = catalogue();
        let heights = (1..=200).map(|i| i * 100).collect();
        let page = SnapshotPage::new("https://maps.test/place", REVIEWS).with_scroll_heights(heights);
        let limits = HarvestLimits { max_scrolls: 7, max_reviews: 0 };
        let harvester = ReviewHarvester::new(&page, &selectors, &NoPause, limits);

        let outcome = harvester.load(&container(&selectors));
        assert_eq!(outcome, ScrollOutcome { cycles: 7, reason: StopReason::MaxScrolls });
        assert_eq!(page.scrolls(), 7);
    }

    #[test]
    fn scrolling_stops_when_enough_reviews_render() {
        let selectors = catalogue();
        let heights = (1..=200).map(|i| i * 100).collect();
        let page = SnapshotPage::new("https://maps.test/place", REVIEWS).with_scroll_heights(heights);
        let limits = HarvestLimits { max_scrolls: 50, max_reviews: 2 };
        let harvester = ReviewHarvester::new(&page, &selectors, &NoPause, limits);

        let outcome = harvester.load(&container(&selectors));
        assert_eq!(outcome, ScrollOutcome { cycles: 1, reason: StopReason::MaxReviews });
    }

    #[test]
    fn pagination_button_is_clicked_each_cycle_when_visible() {
        let selectors = catalogue();
        let markup = r#"
            <div class="m6QErb DxyBCb kA9KIf dS8AEf" tabindex="-1"><div class="jftiEf"></div></div>
            <button>Ulasan lainnya</button>"#;
        let page = SnapshotPage::new("https://maps.test/place", markup).with_scroll_heights(vec![10, 20, 30]);
        let limits = HarvestLimits { max_scrolls: 2, max_reviews: 0 };
        let harvester = ReviewHarvester::new(&page, &selectors, &NoPause, limits);

        harvester.load(&container(&selectors));
        let pagination = page
            .clicks()
            .iter()
            .filter(|c| c.as_str() == "button:has-text('Ulasan lainnya')")
            .count();
        assert_eq!(pagination, 2);
    }
}
