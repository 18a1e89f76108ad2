use harvest_logging::{harvest_debug, harvest_info, harvest_warn};
use leaders_core::{
    Country, CountryStage, LeaderAggregate, LeaderRecord, RunReport, NO_PARAGRAPH_SENTINEL,
};
use serde_json::Value;
use thiserror::Error;

use crate::biography::{BiographyExtractor, BoldParagraphExtractor};
use crate::decode::decode_body;
use crate::persist::{AggregateSink, PersistError};
use crate::progress::{NullProgressSink, ProgressSink};
use crate::session::SessionClient;
use crate::{HarvestEvent, HttpResponse, RequestError};

/// Names of the leader fields the harvester reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    pub profile_url_field: String,
    pub intro_field: String,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            profile_url_field: "wikipedia_url".to_string(),
            intro_field: "biography_intro".to_string(),
        }
    }
}

/// Failures that end a run. Everything else degrades to empty results.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("authentication failed: {0}")]
    Authenticate(#[source] RequestError),
    #[error("failed to persist leaders: {0}")]
    Persist(#[from] PersistError),
}

pub struct HarvestEngine {
    session: SessionClient,
    settings: HarvestSettings,
    extractor: Box<dyn BiographyExtractor>,
    sink: Box<dyn AggregateSink>,
    progress: Box<dyn ProgressSink>,
    aggregate: LeaderAggregate,
}

impl HarvestEngine {
    pub fn new(session: SessionClient, sink: impl AggregateSink + 'static) -> Self {
        Self {
            session,
            settings: HarvestSettings::default(),
            extractor: Box::new(BoldParagraphExtractor),
            sink: Box::new(sink),
            progress: Box::new(NullProgressSink),
            aggregate: LeaderAggregate::new(),
        }
    }

    pub fn with_settings(mut self, settings: HarvestSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_extractor(mut self, extractor: impl BiographyExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_progress(mut self, progress: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    pub fn session(&self) -> &SessionClient {
        &self.session
    }

    pub fn aggregate(&self) -> &LeaderAggregate {
        &self.aggregate
    }

    /// Harvests every listed country, persisting after each one that succeeds.
    ///
    /// Only a transport failure while authenticating or a failed write ends the
    /// run early; whatever was persisted before stays on disk.
    pub async fn run(&mut self) -> Result<RunReport, HarvestError> {
        self.aggregate.clear();
        self.session
            .authenticate()
            .await
            .map_err(HarvestError::Authenticate)?;
        self.progress.emit(HarvestEvent::Authenticated {
            cookies: self.session.token().len(),
        });

        let countries = self.fetch_countries().await;
        self.progress.emit(HarvestEvent::CountriesListed {
            count: countries.len(),
        });

        let mut report = RunReport::new(countries.iter().cloned());
        let mut persisted_once = false;
        for country in countries {
            if report.stage(&country).is_some_and(CountryStage::is_terminal) {
                report.reopen(&country);
            }

            let Some(mut leaders) = self.fetch_leaders(&country).await else {
                self.advance(&mut report, &country, CountryStage::Skipped);
                continue;
            };
            self.advance(&mut report, &country, CountryStage::LeadersFetched);

            for leader in leaders.iter_mut() {
                let biography = self.enrich_leader(leader).await;
                report.record_leader(biography);
            }
            self.advance(&mut report, &country, CountryStage::Enriched);

            self.aggregate.insert(country.clone(), leaders);
            self.persist()?;
            persisted_once = true;
            self.advance(&mut report, &country, CountryStage::Persisted);
        }

        if !persisted_once {
            self.persist()?;
        }

        harvest_info!(
            "Harvest finished: {} of {} countries saved, {} leaders",
            report.count(CountryStage::Persisted),
            report.country_count(),
            report.leaders()
        );
        Ok(report)
    }

    /// Lists countries in API order. Any failure yields an empty list.
    pub async fn fetch_countries(&self) -> Vec<Country> {
        let url = match self.session.endpoint("countries") {
            Ok(url) => url,
            Err(err) => {
                harvest_warn!("Cannot build countries url: {}", err);
                return Vec::new();
            }
        };
        let response = match self.session.get(&url, &[]).await {
            Ok(response) => response,
            Err(err) => {
                harvest_warn!("Countries request failed: {}", err);
                return Vec::new();
            }
        };
        if !response.is_success() {
            harvest_warn!("Countries request answered {}", response.status);
            return Vec::new();
        }

        match serde_json::from_slice::<Value>(&response.body) {
            Ok(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(country) => Some(country),
                    other => {
                        harvest_warn!("Ignoring non-string country entry {}", other);
                        None
                    }
                })
                .collect(),
            Ok(other) => {
                harvest_warn!("Countries body is not an array: {}", other);
                Vec::new()
            }
            Err(err) => {
                harvest_warn!("Countries body is not JSON: {}", err);
                Vec::new()
            }
        }
    }

    /// Fetches the leaders of one country, re-authenticating once on a 403.
    ///
    /// `None` means the country must be left out of the aggregate; an empty
    /// list is a successful answer.
    pub async fn fetch_leaders(&mut self, country: &str) -> Option<Vec<LeaderRecord>> {
        let url = match self.session.endpoint("leaders") {
            Ok(url) => url,
            Err(err) => {
                harvest_warn!("Cannot build leaders url: {}", err);
                return None;
            }
        };
        let params = [("country", country)];

        let mut response = self.request_leaders(&url, &params, country).await?;
        if response.is_auth_expired() {
            harvest_info!("Token rejected while fetching {}, re-authenticating", country);
            if let Err(err) = self.session.authenticate().await {
                harvest_warn!("Re-authentication failed for {}: {}", country, err);
                return None;
            }
            response = self.request_leaders(&url, &params, country).await?;
        }

        if !response.is_success() {
            harvest_warn!("Leaders of {} answered {}", country, response.status);
            return None;
        }
        parse_leaders(&response.body, country)
    }

    async fn request_leaders(
        &self,
        url: &str,
        params: &[(&str, &str)],
        country: &str,
    ) -> Option<HttpResponse> {
        match self.session.get(url, params).await {
            Ok(response) => Some(response),
            Err(err) => {
                harvest_warn!("Leaders request for {} failed: {}", country, err);
                None
            }
        }
    }

    /// Attaches the biography intro when the record has a profile url field.
    ///
    /// Returns `None` when the field is absent (record untouched), otherwise
    /// whether a paragraph was found.
    pub async fn enrich_leader(&self, leader: &mut LeaderRecord) -> Option<bool> {
        let profile_field = self.settings.profile_url_field.as_str();
        let Some(url) = leader.get(profile_field)?.as_str().map(str::to_string) else {
            harvest_warn!("Profile field {} is not a string", profile_field);
            leader.set_text(&self.settings.intro_field, NO_PARAGRAPH_SENTINEL);
            return Some(false);
        };

        let intro = self.fetch_biography(&url).await;
        let found = intro != NO_PARAGRAPH_SENTINEL;
        if !found {
            harvest_debug!("No introduction found at {}", url);
        }
        leader.set_text(&self.settings.intro_field, intro);
        Some(found)
    }

    async fn fetch_biography(&self, url: &str) -> String {
        let response = match self.session.get(url, &[]).await {
            Ok(response) => response,
            Err(err) => {
                harvest_warn!("Profile page {} failed: {}", url, err);
                return NO_PARAGRAPH_SENTINEL.to_string();
            }
        };
        if !response.is_success() {
            harvest_warn!("Failed to fetch profile page {} ({})", url, response.status);
            return NO_PARAGRAPH_SENTINEL.to_string();
        }
        let html = decode_body(&response.body, response.content_type.as_deref());
        self.extractor.extract(&html)
    }

    fn persist(&self) -> Result<(), PersistError> {
        self.sink.persist(&self.aggregate)?;
        self.progress.emit(HarvestEvent::Persisted {
            countries: self.aggregate.len(),
        });
        Ok(())
    }

    fn advance(&self, report: &mut RunReport, country: &str, stage: CountryStage) {
        if let Err(err) = report.advance(country, stage) {
            harvest_warn!("{}", err);
            return;
        }
        self.progress.emit(HarvestEvent::Stage {
            country: country.to_string(),
            stage,
        });
    }
}

fn parse_leaders(body: &[u8], country: &str) -> Option<Vec<LeaderRecord>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Array(items)) => {
            let total = items.len();
            let leaders: Vec<LeaderRecord> =
                items.into_iter().filter_map(LeaderRecord::from_value).collect();
            if leaders.len() < total {
                harvest_warn!(
                    "Dropped {} non-object leader entries for {}",
                    total - leaders.len(),
                    country
                );
            }
            Some(leaders)
        }
        Ok(other) => {
            harvest_warn!("Leaders body for {} is not an array: {}", country, other);
            None
        }
        Err(err) => {
            harvest_warn!("Leaders body for {} is not JSON: {}", country, err);
            None
        }
    }
}
