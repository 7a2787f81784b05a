//! Per-place pipeline: search, extract, harvest, export

use anyhow::Context;
use chrono::{Local, NaiveDate};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{SelectorCatalogue, Settings};
use crate::export::{build_rows, CsvExporter};
use crate::models::{ErrorRecord, OutputRow, Record};
use crate::scrapers::{extract_place, search_place, DelayRange, HarvestLimits, Pacer, Page, ReviewHarvester, Session};

/// Where a place is in its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceState {
    Searching,
    DetailLoaded,
    ReviewsHarvested,
    Exported,
    Failed,
}

#[derive(Debug, Error)]
pub enum PlaceError {
    #[error("Search failed")]
    SearchFailed,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub gmaps_url: String,
    pub cutoff: NaiveDate,
    pub limits: HarvestLimits,
}

impl From<&Settings> for RunOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            gmaps_url: settings.gmaps_url.clone(),
            cutoff: settings.cutoff_date,
            limits: settings.harvest_limits(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub places: usize,
    pub exported_places: usize,
    pub rows: usize,
    pub errors: Vec<ErrorRecord>,
    pub rows_path: Option<PathBuf>,
    pub errors_path: Option<PathBuf>,
}

/// Drives every place of a run through one session, one at a time
pub struct Orchestrator<'a> {
    selectors: &'a SelectorCatalogue,
    exporter: &'a CsvExporter,
    pacer: &'a dyn Pacer,
    options: RunOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        selectors: &'a SelectorCatalogue,
        exporter: &'a CsvExporter,
        pacer: &'a dyn Pacer,
        options: RunOptions,
    ) -> Self {
        Self {
            selectors,
            exporter,
            pacer,
            options,
        }
    }

    /// Process `places` in order. A failing place is recorded and skipped;
    /// only writing the error report can fail the run.
    pub fn run(&self, session: &mut dyn Session, places: &[String]) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary {
            places: places.len(),
            ..RunSummary::default()
        };

        for (index, name) in places.iter().enumerate() {
            info!("Processing place {}/{}: {}", index + 1, places.len(), name);

            let mut state = PlaceState::Searching;
            match self.process(session.page(), name, &mut state) {
                Ok(rows) => {
                    summary.rows += rows;
                    summary.exported_places += 1;
                    if rows > 0 {
                        summary.rows_path = Some(self.exporter.rows_path());
                    }
                }
                Err(e) => {
                    error!("Failed to process {} while {:?}: {}", name, state, e);
                    state = PlaceState::Failed;
                    summary.errors.push(ErrorRecord::new(name.as_str(), e.to_string()));
                }
            }
            debug!("{} finished in state {:?}", name, state);

            self.pacer.pause(DelayRange::new(5.0, 10.0));

            if index % 2 == 1 {
                info!("Rotating browser context...");
                if let Err(e) = session.rotate() {
                    warn!("Context rotation failed, keeping the current one: {:#}", e);
                }
            }
        }

        summary.errors_path = self.exporter.export_errors(&summary.errors)?;
        info!(
            "Run finished: {} places, {} exported, {} rows, {} errors",
            summary.places,
            summary.exported_places,
            summary.rows,
            summary.errors.len()
        );
        if let Some(path) = &summary.rows_path {
            info!("Reviews written to {}", path.display());
        }
        if let Some(path) = &summary.errors_path {
            info!("Errors written to {}", path.display());
        }
        Ok(summary)
    }

    /// Returns the number of rows exported for `name`.
    fn process(&self, page: &dyn Page, name: &str, state: &mut PlaceState) -> Result<usize, PlaceError> {
        page.goto(&self.options.gmaps_url)
            .with_context(|| format!("Failed to open {}", self.options.gmaps_url))?;
        self.pacer.pause_default();

        if !search_place(page, self.selectors, name, self.pacer) {
            return Err(PlaceError::SearchFailed);
        }
        self.pacer.pause(DelayRange::new(2.0, 4.0));
        *state = PlaceState::DetailLoaded;

        let place = extract_place(page, self.selectors, name);
        if place.place_id.is_none() {
            warn!("Place ID not found for {}", name);
        }

        let harvester = ReviewHarvester::new(page, self.selectors, self.pacer, self.options.limits);
        let reviews = harvester.harvest(&place);
        info!("Collected {} reviews for {}", reviews.len(), name);
        *state = PlaceState::ReviewsHarvested;

        let rows = build_rows(&reviews, &place, self.options.cutoff, Local::now().naive_local());
        if rows.len() < reviews.len() {
            info!(
                "Dropped {} reviews dated before {}",
                reviews.len() - rows.len(),
                self.options.cutoff
            );
        }
        let records: Vec<Record> = rows.iter().map(OutputRow::to_record).collect();
        self.exporter.export_rows(&records)?;
        *state = PlaceState::Exported;

        Ok(rows.len())
    }
}
