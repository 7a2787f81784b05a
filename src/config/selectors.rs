//! Selector catalogue: semantic field names mapped to DOM locators

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::scrapers::locator::Locator;

const DEFAULT_CATALOGUE: &str = include_str!("../../config/selectors.json");

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSelectors {
    pub input: Locator,
    pub recommendation_item: Locator,
    pub recommendation_link: Locator,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceSelectors {
    pub name: Locator,
    pub rating: Locator,
    pub reviews_count: Locator,
    pub rating_summary: Locator,
    pub address: Locator,
    pub website: Locator,
    pub phone: Locator,
    #[serde(default)]
    pub description: Option<Locator>,
    #[serde(default)]
    pub sponsored: Option<Locator>,
    #[serde(default)]
    pub claim: Option<Locator>,
    #[serde(default)]
    pub categories: Option<Locator>,
    #[serde(default)]
    pub featured_image: Option<Locator>,
    #[serde(default)]
    pub temporarily_closed: Option<Locator>,
    #[serde(default)]
    pub permanently_closed: Option<Locator>,
    #[serde(default)]
    pub opening_hours: Option<Locator>,
    #[serde(default)]
    pub review_keywords: Option<Locator>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSelectors {
    pub tab_button: Locator,
    pub tab_text: String,
    pub sort_button: Locator,
    pub sort_newest: Locator,
    pub newest_text: String,
    pub container: Locator,
    pub more_reviews_button: Locator,
    pub item: Locator,
    pub author: Locator,
    pub rating: Locator,
    pub date: Locator,
    pub text: Locator,
    pub more_button: Locator,
    #[serde(default)]
    pub owner_reply_text: Option<Locator>,
    #[serde(default)]
    pub owner_reply_date: Option<Locator>,
}

/// Last-resort locators, consulted only when the primary ones found nothing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FallbackSelectors {
    pub address: Option<Locator>,
    pub website: Option<Locator>,
    pub phone: Option<Locator>,
    pub rating: Option<Locator>,
    pub reviews_count: Option<Locator>,
    pub sort_button: Option<Locator>,
    pub sort_newest: Option<Locator>,
}

/// Immutable locator configuration, loaded once per run
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorCatalogue {
    pub search: SearchSelectors,
    pub place_details: PlaceSelectors,
    pub reviews: ReviewSelectors,
    #[serde(default)]
    pub xpath_fallbacks: FallbackSelectors,
}

impl SelectorCatalogue {
    /// The catalogue compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json(DEFAULT_CATALOGUE).context("Built-in selector catalogue is invalid")
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from `path` when given, otherwise fall back to the built-in catalogue.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read selectors from {}", path.display()))?;
                Self::from_json(&text)
                    .with_context(|| format!("Failed to parse selectors in {}", path.display()))
            }
            None => Self::builtin(),
        }
    }

    /// Built-in catalogue with its `xpath_fallbacks` group replaced
    #[cfg(test)]
    pub fn builtin_with_fallbacks(fallbacks: serde_json::Value) -> Result<Self> {
        let mut document: serde_json::Value = serde_json::from_str(DEFAULT_CATALOGUE)?;
        document["xpath_fallbacks"] = fallbacks;
        Self::from_json(&document.to_string())
    }
}
