//! Run configuration, read from command-line flags or the environment

pub mod selectors;

pub use selectors::SelectorCatalogue;

use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

use crate::scrapers::types::{DelayRange, HarvestLimits};

/// Scrape place details and reviews from Google Maps into CSV files
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Settings {
    /// Run Chrome without a visible window
    #[arg(long, env = "HEADLESS", default_value_t = true, action = ArgAction::Set)]
    pub headless: bool,

    /// Lower bound of the default random delay, in seconds
    #[arg(long, env = "MIN_DELAY", default_value_t = 2.0)]
    pub min_delay: f64,

    /// Upper bound of the default random delay, in seconds
    #[arg(long, env = "MAX_DELAY", default_value_t = 5.0)]
    pub max_delay: f64,

    /// Stop loading reviews once this many are rendered (0 = unbounded)
    #[arg(long, env = "MAX_REVIEWS", default_value_t = 100)]
    pub max_reviews: usize,

    /// Scroll budget multiplier; a place gets ten scroll cycles per unit
    #[arg(long, env = "SCROLL_RETRY", default_value_t = 5)]
    pub scroll_retry: usize,

    /// CSV file holding the place names to scrape
    #[arg(long, env = "INPUT_FILE", default_value = "input_data/nama_tempat.csv")]
    pub input_file: PathBuf,

    /// Column of the input CSV that holds the place names
    #[arg(long, env = "INPUT_COLUMN", default_value = "nama_tempat")]
    pub input_column: String,

    /// Only process the first N places
    #[arg(long, env = "MAX_PLACES")]
    pub max_places: Option<usize>,

    /// Start page for every search
    #[arg(long, env = "G_MAPS_URL", default_value = "https://www.google.com/maps")]
    pub gmaps_url: String,

    /// Reviews dated before this day are not exported
    #[arg(long, env = "CUTOFF_DATE", default_value = "2025-04-01")]
    pub cutoff_date: NaiveDate,

    /// Directory receiving the review and error CSV files
    #[arg(long, env = "OUTPUT_DIR", default_value = "output_data")]
    pub output_dir: PathBuf,

    /// Directory receiving the run log
    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// JSON selector catalogue replacing the built-in one
    #[arg(long, env = "SELECTORS_FILE")]
    pub selectors_file: Option<PathBuf>,

    /// Place names to scrape instead of reading the input file
    pub places: Vec<String>,
}

impl Settings {
    pub fn default_delay(&self) -> DelayRange {
        DelayRange::new(self.min_delay, self.max_delay)
    }

    pub fn harvest_limits(&self) -> HarvestLimits {
        HarvestLimits {
            max_scrolls: self.scroll_retry * 10,
            max_reviews: self.max_reviews,
        }
    }
}
