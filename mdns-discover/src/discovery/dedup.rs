use std::collections::HashSet;
use shared::protocol::KEY_SEPARATOR;

/// Identity of a physical service instance: "hostname|address|port"
pub fn build_key(hostname: &str, address: &str, port: u16) -> String {
    format!("{hostname}{KEY_SEPARATOR}{address}{KEY_SEPARATOR}{port}")
}

/// First-seen-wins membership set over instance keys.
///
/// Workers keep one per query, the orchestrator keeps one per run; the two
/// never share state.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the instance and returns true if it had not been seen before
    pub fn first_sight(&mut self, hostname: &str, address: &str, port: u16) -> bool {
        self.seen.insert(build_key(hostname, address, port))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}
