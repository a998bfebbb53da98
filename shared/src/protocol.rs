use std::time::Duration;

/// Domain suffix appended to every browsed service type
pub const DEFAULT_DOMAIN: &str = "local.";

/// Per-query browse deadline when nothing else is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Number of service-type queries allowed in flight at once
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Separator used when joining TXT segments for display
pub const TXT_SEPARATOR: &str = ";";

/// Separator between the parts of a deduplication key
pub const KEY_SEPARATOR: &str = "|";
