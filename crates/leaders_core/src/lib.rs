//! Leaders core: data model, per-country state machine and text cleaning.
mod clean;
mod model;
mod stage;

pub use clean::{clean_paragraph, NO_PARAGRAPH_SENTINEL};
pub use model::{Country, LeaderAggregate, LeaderRecord};
pub use stage::{CountryStage, RunReport, StageError};
