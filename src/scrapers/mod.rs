pub mod browser;
pub mod dates;
pub mod locator;
pub mod pacing;
pub mod place;
pub mod reviews;
pub mod search;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod snapshot;

pub use browser::BrowserSession;
pub use pacing::RandomPacer;
pub use place::extract_place;
pub use reviews::ReviewHarvester;
pub use search::search_place;
pub use traits::{Pacer, Page, Session};
pub use types::{DelayRange, HarvestLimits};
