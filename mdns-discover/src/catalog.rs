//! Built-in catalog of service types browsed in multi-service mode

use std::collections::HashSet;

const BUILTIN: &str = include_str!("../data/services.txt");

/// Service types embedded at build time
pub fn builtin() -> Vec<String> {
    parse(BUILTIN)
}

/// Parses a catalog listing: one service type per line, `#` comments and
/// blank lines skipped, repeats dropped in favour of the first occurrence.
pub fn parse(listing: &str) -> Vec<String> {
    dedup(
        listing
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string),
    )
}

/// Assembles the catalog for a run. `replace` substitutes the built-in list
/// entirely; `extra` is appended afterwards.
pub fn resolve(replace: Option<Vec<String>>, extra: Vec<String>) -> Vec<String> {
    let base = replace.unwrap_or_else(builtin);
    dedup(
        base.into_iter()
            .chain(extra)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()),
    )
}

fn dedup(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names.filter(|name| seen.insert(name.clone())).collect()
}
