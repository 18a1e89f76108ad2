//! Leaders engine: authenticated session, harvest pipeline and persistence.
mod biography;
mod decode;
mod harvest;
mod persist;
mod progress;
mod session;
mod types;

pub use biography::{BiographyExtractor, BoldParagraphExtractor};
pub use decode::decode_body;
pub use harvest::{HarvestEngine, HarvestError, HarvestSettings};
pub use persist::{
    ensure_output_dir, to_pretty_json, AggregateSink, AtomicFileWriter, JsonFileSink, PersistError,
};
pub use progress::{LogProgressSink, NullProgressSink, ProgressSink};
pub use session::{AuthToken, ClientSettings, SessionClient};
pub use types::{FailureKind, HarvestEvent, HttpResponse, RequestError};
