use harvest_logging::harvest_info;
use leaders_core::CountryStage;

use crate::HarvestEvent;

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: HarvestEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn emit(&self, _event: HarvestEvent) {}
}

/// Reports terminal country stages and run milestones through the logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: HarvestEvent) {
        match event {
            HarvestEvent::Authenticated { cookies } => {
                harvest_info!("Session ready with {} cookies", cookies);
            }
            HarvestEvent::CountriesListed { count } => {
                harvest_info!("{} countries to harvest", count);
            }
            HarvestEvent::Stage { country, stage } => match stage {
                CountryStage::Persisted | CountryStage::Skipped => {
                    harvest_info!("Country {} {}", country, stage);
                }
                _ => {}
            },
            HarvestEvent::Persisted { countries } => {
                harvest_info!("Snapshot saved with {} countries", countries);
            }
        }
    }
}
