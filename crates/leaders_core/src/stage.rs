use std::fmt;

use crate::Country;

/// Lifecycle of one country during a harvest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountryStage {
    Pending,
    LeadersFetched,
    Enriched,
    Persisted,
    /// Leaders fetch failed, including the retry after re-authentication.
    Skipped,
}

impl CountryStage {
    pub fn can_advance_to(self, next: CountryStage) -> bool {
        matches!(
            (self, next),
            (CountryStage::Pending, CountryStage::LeadersFetched)
                | (CountryStage::Pending, CountryStage::Skipped)
                | (CountryStage::LeadersFetched, CountryStage::Enriched)
                | (CountryStage::Enriched, CountryStage::Persisted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CountryStage::Persisted | CountryStage::Skipped)
    }
}

impl fmt::Display for CountryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CountryStage::Pending => "pending",
            CountryStage::LeadersFetched => "leaders fetched",
            CountryStage::Enriched => "enriched",
            CountryStage::Persisted => "persisted",
            CountryStage::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    UnknownCountry(Country),
    InvalidTransition {
        country: Country,
        from: CountryStage,
        to: CountryStage,
    },
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::UnknownCountry(country) => write!(f, "unknown country {country:?}"),
            StageError::InvalidTransition { country, from, to } => {
                write!(f, "country {country:?} cannot go from {from} to {to}")
            }
        }
    }
}

impl std::error::Error for StageError {}

/// Per-run bookkeeping: stage of every listed country plus biography counters.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunReport {
    countries: Vec<(Country, CountryStage)>,
    leaders: usize,
    biographies_found: usize,
    biographies_missing: usize,
}

impl RunReport {
    /// Starts every listed country in `Pending`. Duplicates are tracked once.
    pub fn new<I>(countries: I) -> Self
    where
        I: IntoIterator<Item = Country>,
    {
        let mut report = Self::default();
        for country in countries {
            if !report.countries.iter().any(|(name, _)| *name == country) {
                report.countries.push((country, CountryStage::Pending));
            }
        }
        report
    }

    pub fn stage(&self, country: &str) -> Option<CountryStage> {
        self.countries
            .iter()
            .find(|(name, _)| name == country)
            .map(|(_, stage)| *stage)
    }

    pub fn advance(&mut self, country: &str, next: CountryStage) -> Result<(), StageError> {
        let (_, stage) = self
            .countries
            .iter_mut()
            .find(|(name, _)| name == country)
            .ok_or_else(|| StageError::UnknownCountry(country.to_string()))?;
        if !stage.can_advance_to(next) {
            return Err(StageError::InvalidTransition {
                country: country.to_string(),
                from: *stage,
                to: next,
            });
        }
        *stage = next;
        Ok(())
    }

    /// A persisted country may be harvested again when the API lists it twice.
    pub fn reopen(&mut self, country: &str) {
        if let Some((_, stage)) = self.countries.iter_mut().find(|(name, _)| name == country) {
            *stage = CountryStage::Pending;
        }
    }

    pub fn record_leader(&mut self, biography: Option<bool>) {
        self.leaders += 1;
        match biography {
            Some(true) => self.biographies_found += 1,
            Some(false) => self.biographies_missing += 1,
            None => {}
        }
    }

    pub fn count(&self, stage: CountryStage) -> usize {
        self.countries.iter().filter(|(_, s)| *s == stage).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &str> {
        self.countries
            .iter()
            .filter(|(_, stage)| *stage == CountryStage::Skipped)
            .map(|(name, _)| name.as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.countries.iter().all(|(_, stage)| stage.is_terminal())
    }

    pub fn country_count(&self) -> usize {
        self.countries.len()
    }

    pub fn leaders(&self) -> usize {
        self.leaders
    }

    pub fn biographies_found(&self) -> usize {
        self.biographies_found
    }

    pub fn biographies_missing(&self) -> usize {
        self.biographies_missing
    }
}
