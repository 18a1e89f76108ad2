mod config;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use harvest_logging::{harvest_error, harvest_info};
use leaders_core::{CountryStage, RunReport};
use leaders_engine::{HarvestEngine, JsonFileSink, LogProgressSink, SessionClient};
use log::LevelFilter;

use config::AppConfig;

fn main() -> ExitCode {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match config::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let level = if config.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(config.log_destination, level, &config.log_file);

    match run(&config) {
        Ok(report) => {
            println!(
                "Saved {} leaders from {} of {} countries to {}",
                report.leaders(),
                report.count(CountryStage::Persisted),
                report.country_count(),
                config.output_path.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            harvest_error!("Harvest failed: {:#}", err);
            eprintln!("Failed to retrieve country leaders.");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &AppConfig) -> anyhow::Result<RunReport> {
    harvest_info!(
        "Harvesting leaders from {} into {}",
        config.base_url,
        config.output_path.display()
    );
    let session = SessionClient::new(&config.base_url, config.client_settings())
        .with_context(|| format!("invalid base url {:?}", config.base_url))?;
    let mut engine = HarvestEngine::new(session, JsonFileSink::new(&config.output_path))
        .with_settings(config.harvest_settings())
        .with_progress(LogProgressSink);

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let report = runtime.block_on(engine.run())?;

    let skipped: Vec<&str> = report.skipped().collect();
    if !skipped.is_empty() {
        harvest_info!("Countries left out: {}", skipped.join(", "));
    }
    Ok(report)
}
