use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;

/// Geographic position of a place
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Attributes scraped from a place's detail panel.
///
/// Built once per visit and never mutated after the extractor returns it.
#[derive(Debug, Clone, Default)]
pub struct PlaceRecord {
    pub place_id: Option<String>,
    pub url: String,
    /// Name the place was searched for
    pub query_name: String,
    /// Name shown in the detail panel
    pub display_name: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub rating: Option<String>,
    pub review_count: Option<u64>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub main_category: Option<String>,
    pub categories: Option<String>,
    pub featured_image: Option<String>,
    pub opening_hours: Option<String>,
    pub review_keywords: Option<String>,
    pub owner: Option<String>,
    pub competitors: Option<String>,
    pub closed_on: Option<String>,
    pub is_sponsored: bool,
    pub can_claim: bool,
    pub is_temporarily_closed: bool,
    pub is_permanently_closed: bool,
}

/// A single review as rendered in the reviews list
#[derive(Debug, Clone, Default)]
pub struct ReviewRecord {
    pub place_id: Option<String>,
    /// `data-review-id` of the rendered element; neither unique nor guaranteed
    pub review_id: Option<String>,
    pub author: String,
    pub rating: Option<String>,
    pub date_raw: Option<String>,
    pub date: Option<NaiveDate>,
    pub text: String,
    pub owner_reply: String,
    pub owner_reply_date_raw: Option<String>,
    pub owner_reply_date: Option<NaiveDate>,
}

/// One exported line: a review joined with its place
#[derive(Debug, Clone)]
pub struct OutputRow {
    pub place_id: Option<String>,
    pub place_url: String,
    pub place_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub is_sponsored: bool,
    pub reviews: Option<u64>,
    pub total_reviews: Option<u64>,
    pub competitors: Option<String>,
    pub website: Option<String>,
    pub can_claim: bool,
    pub owner: Option<String>,
    pub featured_image: Option<String>,
    pub main_category: Option<String>,
    pub categories: Option<String>,
    pub total_rating: Option<String>,
    pub review_rating: Option<String>,
    pub workday_timing: Option<String>,
    pub is_temporarily_closed: bool,
    pub is_permanently_closed: bool,
    pub closed_on: Option<String>,
    pub phone: Option<String>,
    pub review_id: Option<String>,
    pub review_keywords: Option<String>,
    pub author_name: String,
    pub review_date: Option<NaiveDate>,
    pub review_text: String,
    pub owner_reply: String,
    pub owner_reply_date: Option<NaiveDate>,
    pub ingestion_time: NaiveDateTime,
}

/// Export column order
pub const COLUMNS: &[&str] = &[
    "place_id",
    "place_url",
    "place_name",
    "latitude",
    "longitude",
    "address",
    "description",
    "is_sponsored",
    "reviews",
    "total_reviews",
    "competitors",
    "website",
    "can_claim",
    "owner",
    "featured_image",
    "main_category",
    "categories",
    "total_rating",
    "review_rating",
    "workday_timing",
    "is_temporarily_closed",
    "is_permanently_closed",
    "closed_on",
    "phone",
    "review_id",
    "review_keywords",
    "author_name",
    "review_date",
    "review_text",
    "owner_reply",
    "owner_reply_date",
    "ingestion_time",
];

/// Column name to cell text, as handed to the CSV exporter
pub type Record = BTreeMap<&'static str, String>;

fn cell<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

impl OutputRow {
    /// Flatten into a record keyed by export column names.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("place_id", cell(&self.place_id));
        record.insert("place_url", self.place_url.clone());
        record.insert("place_name", self.place_name.clone());
        record.insert("latitude", cell(&self.latitude));
        record.insert("longitude", cell(&self.longitude));
        record.insert("address", cell(&self.address));
        record.insert("description", cell(&self.description));
        record.insert("is_sponsored", self.is_sponsored.to_string());
        record.insert("reviews", cell(&self.reviews));
        record.insert("total_reviews", cell(&self.total_reviews));
        record.insert("competitors", cell(&self.competitors));
        record.insert("website", cell(&self.website));
        record.insert("can_claim", self.can_claim.to_string());
        record.insert("owner", cell(&self.owner));
        record.insert("featured_image", cell(&self.featured_image));
        record.insert("main_category", cell(&self.main_category));
        record.insert("categories", cell(&self.categories));
        record.insert("total_rating", cell(&self.total_rating));
        record.insert("review_rating", cell(&self.review_rating));
        record.insert("workday_timing", cell(&self.workday_timing));
        record.insert("is_temporarily_closed", self.is_temporarily_closed.to_string());
        record.insert("is_permanently_closed", self.is_permanently_closed.to_string());
        record.insert("closed_on", cell(&self.closed_on));
        record.insert("phone", cell(&self.phone));
        record.insert("review_id", cell(&self.review_id));
        record.insert("review_keywords", cell(&self.review_keywords));
        record.insert("author_name", self.author_name.clone());
        record.insert("review_date", cell(&self.review_date));
        record.insert("review_text", self.review_text.clone());
        record.insert("owner_reply", self.owner_reply.clone());
        record.insert("owner_reply_date", cell(&self.owner_reply_date));
        record.insert(
            "ingestion_time",
            self.ingestion_time.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        record
    }
}

/// A place that could not be processed.
///
/// Written through serde as the error report's row type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub place_name: String,
    pub error: String,
}

impl ErrorRecord {
    pub fn new(place_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            place_name: place_name.into(),
            error: error.into(),
        }
    }
}
