mod config;
mod export;
mod input;
mod logging;
mod models;
mod runner;
mod scrapers;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use config::{SelectorCatalogue, Settings};
use export::CsvExporter;
use runner::{Orchestrator, RunOptions};
use scrapers::{BrowserSession, RandomPacer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    let (_log_guard, log_path) = logging::init_logging(&settings.log_dir)?;

    info!("📍 Google Maps Review Scout");
    info!("==========================");
    info!("Logging to {}", log_path.display());

    let selectors = SelectorCatalogue::load(settings.selectors_file.as_deref())?;

    let places = if !settings.places.is_empty() {
        input::limit(settings.places.clone(), settings.max_places)
    } else {
        if !tokio::fs::try_exists(&settings.input_file).await.unwrap_or(false) {
            error!("Input file not found: {}", settings.input_file.display());
            return Ok(());
        }
        input::load_places(&settings.input_file, &settings.input_column, settings.max_places)?
    };
    if places.is_empty() {
        warn!("No places to process.");
        return Ok(());
    }
    info!("Loaded {} places to process.", places.len());

    // Browser work is blocking and strictly sequential
    let summary = tokio::task::spawn_blocking(move || {
        let exporter = CsvExporter::new(&settings.output_dir)?;
        let pacer = RandomPacer::new(settings.default_delay());
        let mut session = BrowserSession::acquire(settings.headless)?;

        let orchestrator = Orchestrator::new(&selectors, &exporter, &pacer, RunOptions::from(&settings));
        let result = orchestrator.run(&mut session, &places);
        session.release();
        result
    })
    .await
    .context("Scraper task aborted")??;

    println!();
    println!("Places processed: {}", summary.places);
    println!("Rows exported:    {}", summary.rows);
    println!("Places failed:    {}", summary.errors.len());
    if let Some(path) = &summary.rows_path {
        println!("Reviews file:     {}", path.display());
    }
    if let Some(path) = &summary.errors_path {
        println!("Error report:     {}", path.display());
    }

    info!("Scraping process completed.");
    Ok(())
}
