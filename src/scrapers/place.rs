use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SelectorCatalogue;
use crate::models::{Coordinates, PlaceRecord};

use super::locator::Locator;
use super::traits::Page;

static MARKUP_PLACE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(ChIJ[a-zA-Z0-9_-]{20,})").expect("valid place id regex"));
static URL_DATA_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!1s([a-zA-Z0-9_:-]+)(?:!|$)").expect("valid data id regex"));
static URL_PLACE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(ChIJ[a-zA-Z0-9_-]{10,})").expect("valid place id regex"));
static URL_PIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!3d(-?\d+(?:\.\d+)?)!4d(-?\d+(?:\.\d+)?)").expect("valid pin regex")
});
static URL_VIEWPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@(-?\d+(?:\.\d+)?),(-?\d+(?:\.\d+)?)").expect("valid viewport regex")
});
/// "4,5(2.530)": rating, then the review count in parentheses
static RATING_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([\d,]+[.,]?\d*)\s*\(([\d,.]+)\)").expect("valid rating summary regex")
});

const NAME_TIMEOUT: Duration = Duration::from_secs(10);

/// `<meta>` tags of the page keyed by `itemprop`, `name` or `property`
pub fn page_metadata(markup: &str) -> HashMap<String, String> {
    let document = Html::parse_document(markup);
    let mut metadata = HashMap::new();
    let Ok(meta) = Selector::parse("meta[content]") else {
        return metadata;
    };
    for element in document.select(&meta) {
        let value = element.value();
        let key = value
            .attr("itemprop")
            .or_else(|| value.attr("name"))
            .or_else(|| value.attr("property"));
        if let (Some(key), Some(content)) = (key, value.attr("content")) {
            metadata.insert(key.to_string(), content.to_string());
        }
    }
    metadata
}

/// Place identifier, preferring page metadata over markup over the URL.
pub fn resolve_place_id(metadata: &HashMap<String, String>, markup: &str, url: &str) -> Option<String> {
    if let Some(id) = metadata.get("place_id").filter(|id| !id.is_empty()) {
        return Some(id.clone());
    }
    if let Some(c) = MARKUP_PLACE_ID.captures(markup) {
        return Some(c[1].to_string());
    }
    place_id_from_url(url)
}

pub fn place_id_from_url(url: &str) -> Option<String> {
    URL_DATA_ID
        .captures(url)
        .or_else(|| URL_PLACE_ID.captures(url))
        .map(|c| c[1].to_string())
}

/// Pin coordinates (`!3d…!4d…`) when present, else the map viewport centre
pub fn coordinates_from_url(url: &str) -> Option<Coordinates> {
    let c = URL_PIN.captures(url).or_else(|| URL_VIEWPORT.captures(url))?;
    Some(Coordinates {
        latitude: c[1].parse().ok()?,
        longitude: c[2].parse().ok()?,
    })
}

/// Split "rating(count)" text. The count loses every `.` and `,`.
pub fn parse_rating_summary(text: &str) -> Option<(String, Option<u64>)> {
    let c = RATING_SUMMARY.captures(text)?;
    let rating = c[1].replace(',', ".");
    let count = c[2].replace(['.', ','], "").parse().ok();
    Some((rating, count))
}

fn digits(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn non_empty(text: String) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn first_text(page: &dyn Page, locator: &Locator) -> Option<String> {
    match page.text(locator, 0) {
        Ok(text) => text.and_then(non_empty),
        Err(e) => {
            debug!("Could not read {}: {}", locator, e);
            None
        }
    }
}

fn first_attribute(page: &dyn Page, locator: &Locator, name: &str) -> Option<String> {
    match page.attribute(locator, 0, name) {
        Ok(value) => value.and_then(non_empty),
        Err(e) => {
            debug!("Could not read {} of {}: {}", name, locator, e);
            None
        }
    }
}

fn present(page: &dyn Page, locator: Option<&Locator>) -> bool {
    locator.is_some_and(|l| page.count(l).map(|n| n > 0).unwrap_or(false))
}

/// Contact rows often render only an icon; their aria-label ("Alamat: …")
/// then carries the value.
fn contact_field(page: &dyn Page, locator: &Locator) -> Option<String> {
    if !present(page, Some(locator)) {
        return None;
    }
    let text = first_text(page, locator);
    if text.as_ref().is_some_and(|t| t.chars().count() >= 5) {
        return text;
    }
    first_attribute(page, locator, "aria-label")
        .and_then(|aria| aria.rsplit(':').next().and_then(|v| non_empty(v.to_string())))
        .or(text)
}

/// Scrape the detail panel currently shown on `page`.
///
/// Never fails: unreadable fields stay empty and unexpected errors are logged
/// with whatever was gathered so far returned.
pub fn extract_place(page: &dyn Page, selectors: &SelectorCatalogue, name: &str) -> PlaceRecord {
    let url = page.current_url().unwrap_or_default();
    let markup = page.content().unwrap_or_else(|e| {
        warn!("Could not read page markup: {}", e);
        String::new()
    });

    let mut record = PlaceRecord {
        place_id: resolve_place_id(&page_metadata(&markup), &markup, &url),
        coordinates: coordinates_from_url(&url),
        url,
        query_name: name.to_string(),
        ..PlaceRecord::default()
    };

    if let Err(e) = fill_details(page, selectors, &mut record) {
        warn!("Some details could not be extracted: {:#}", e);
    }
    info!(
        "Extracted details for: {}",
        record.display_name.as_deref().unwrap_or(name)
    );
    record
}

fn fill_details(page: &dyn Page, selectors: &SelectorCatalogue, record: &mut PlaceRecord) -> Result<()> {
    let sel = &selectors.place_details;

    if !page.wait_for(&sel.name, NAME_TIMEOUT)? {
        warn!("Main name element not found within timeout.");
    }
    record.display_name = first_text(page, &sel.name);

    record.rating = first_text(page, &sel.rating).map(|r| r.replace(',', "."));
    if present(page, Some(&sel.reviews_count)) {
        record.review_count = first_attribute(page, &sel.reviews_count, "aria-label")
            .or_else(|| first_text(page, &sel.reviews_count))
            .and_then(|t| digits(&t));
    }

    record.address = contact_field(page, &sel.address);
    record.website = contact_field(page, &sel.website);
    record.phone = contact_field(page, &sel.phone);

    if let Some(summary) = first_text(page, &sel.rating_summary) {
        match parse_rating_summary(&summary) {
            Some((rating, count)) => {
                record.rating = Some(rating);
                if count.is_some() {
                    record.review_count = count;
                }
            }
            None => {
                if record.rating.is_none() {
                    record.rating = Some(summary);
                }
            }
        }
    }

    record.description = sel.description.as_ref().and_then(|l| first_text(page, l));
    record.is_sponsored = present(page, sel.sponsored.as_ref());
    record.can_claim = present(page, sel.claim.as_ref());

    if let Some(locator) = &sel.categories {
        let categories: Vec<String> = page
            .all_texts(locator)?
            .into_iter()
            .filter_map(non_empty)
            .collect();
        if !categories.is_empty() {
            record.main_category = categories.first().cloned();
            record.categories = Some(categories.join(", "));
        }
    }

    record.featured_image = sel
        .featured_image
        .as_ref()
        .and_then(|l| first_attribute(page, l, "src"));
    record.is_temporarily_closed = present(page, sel.temporarily_closed.as_ref());
    record.is_permanently_closed = present(page, sel.permanently_closed.as_ref());
    record.opening_hours = sel
        .opening_hours
        .as_ref()
        .and_then(|l| first_attribute(page, l, "aria-label"));

    if let Some(locator) = &sel.review_keywords {
        let keywords: Vec<String> = page
            .all_texts(locator)?
            .into_iter()
            .filter_map(non_empty)
            .collect();
        if !keywords.is_empty() {
            record.review_keywords = Some(keywords.join(", "));
        }
    }

    apply_fallbacks(page, selectors, record);
    Ok(())
}

/// Second pass over the alternate locators, only for fields still empty
fn apply_fallbacks(page: &dyn Page, selectors: &SelectorCatalogue, record: &mut PlaceRecord) {
    let xf = &selectors.xpath_fallbacks;
    let fallback_text = |locator: &Option<Locator>| locator.as_ref().and_then(|l| first_text(page, l));

    if record.address.is_none() {
        record.address = fallback_text(&xf.address);
    }
    if record.website.is_none() {
        record.website = fallback_text(&xf.website);
    }
    if record.phone.is_none() {
        record.phone = fallback_text(&xf.phone);
    }
    if record.rating.is_none() {
        record.rating = fallback_text(&xf.rating);
    }
    if record.review_count.is_none() {
        record.review_count = fallback_text(&xf.reviews_count).and_then(|t| digits(&t));
    }
}
