mod malformed;
pub use malformed::{MalformedPolicy, ParseMalformedPolicyError, RejectLog};

mod pipeline;
pub use pipeline::{IngestError, IngestStats, Pipeline};

mod progress;
pub use progress::Progress;
