use chrono::{NaiveDate, NaiveDateTime};

use crate::models::{OutputRow, PlaceRecord, ReviewRecord};

/// Join each review with its place, dropping reviews dated before `cutoff`.
///
/// Reviews without a resolved date are kept.
pub fn build_rows(
    reviews: &[ReviewRecord],
    place: &PlaceRecord,
    cutoff: NaiveDate,
    ingested_at: NaiveDateTime,
) -> Vec<OutputRow> {
    reviews
        .iter()
        .filter(|review| review.date.map_or(true, |date| date >= cutoff))
        .map(|review| OutputRow {
            place_id: place.place_id.clone(),
            place_url: place.url.clone(),
            place_name: place.query_name.clone(),
            latitude: place.coordinates.map(|c| c.latitude),
            longitude: place.coordinates.map(|c| c.longitude),
            address: place.address.clone(),
            description: place.description.clone(),
            is_sponsored: place.is_sponsored,
            reviews: place.review_count,
            total_reviews: place.review_count,
            competitors: place.competitors.clone(),
            website: place.website.clone(),
            can_claim: place.can_claim,
            owner: place.owner.clone(),
            featured_image: place.featured_image.clone(),
            main_category: place.main_category.clone(),
            categories: place.categories.clone(),
            total_rating: place.rating.clone(),
            review_rating: review.rating.clone(),
            workday_timing: place.opening_hours.clone(),
            is_temporarily_closed: place.is_temporarily_closed,
            is_permanently_closed: place.is_permanently_closed,
            closed_on: place.closed_on.clone(),
            phone: place.phone.clone(),
            review_id: review.review_id.clone(),
            review_keywords: place.review_keywords.clone(),
            author_name: review.author.trim().to_string(),
            review_date: review.date,
            review_text: review.text.trim().to_string(),
            owner_reply: review.owner_reply.trim().to_string(),
            owner_reply_date: review.owner_reply_date,
            ingestion_time: ingested_at,
        })
        .collect()
}
