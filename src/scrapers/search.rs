use anyhow::Result;
use tracing::{error, info};

use crate::config::SelectorCatalogue;

use super::traits::{Pacer, Page};
use super::types::DelayRange;

const POLL_ATTEMPTS: usize = 5;

/// URL fragments that only appear on a place detail page
const DETAIL_URL_MARKERS: [&str; 2] = ["!1s", "ChIJ"];

/// Search for `name` and land on its detail panel.
///
/// Returns `false` when neither a result list nor a detail page shows up
/// within the polling budget, or when the search itself errors.
pub fn search_place(page: &dyn Page, selectors: &SelectorCatalogue, name: &str, pacer: &dyn Pacer) -> bool {
    info!("Searching for: {}", name);
    match try_search(page, selectors, name, pacer) {
        Ok(found) => found,
        Err(e) => {
            error!("Error during search: {:#}", e);
            false
        }
    }
}

fn try_search(page: &dyn Page, selectors: &SelectorCatalogue, name: &str, pacer: &dyn Pacer) -> Result<bool> {
    let sel = &selectors.search;
    page.fill(&sel.input, name)?;
    page.press("Enter")?;

    for _ in 0..POLL_ATTEMPTS {
        if page.count(&sel.recommendation_item)? > 0 {
            info!("Multiple results found. Selecting the first one.");
            page.click(&sel.recommendation_item.within(0, &sel.recommendation_link), 0)?;
            pacer.pause(DelayRange::new(2.0, 4.0));
            return Ok(true);
        }
        let url = page.current_url()?;
        if DETAIL_URL_MARKERS.iter().any(|marker| url.contains(marker)) {
            return Ok(true);
        }
        pacer.pause(DelayRange::new(1.0, 2.0));
    }

    Ok(false)
}
