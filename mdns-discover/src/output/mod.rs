pub mod format;
pub mod summary;

pub use format::write_json;
pub use summary::{RunSummary, SummaryReporter};
