//! Human-readable run summary and the figures shared with the JSON envelope

use std::collections::HashSet;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use colored::Colorize;
use serde::Serialize;
use shared::types::Service;
use crate::discovery::DiscoveryStats;

/// Headline figures of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub service_types: usize,
    pub instances: usize,
    pub instances_per_second: f64,
    pub suppressed_timeouts: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn new(services: &[Service], stats: &DiscoveryStats, elapsed: Duration) -> Self {
        let service_types = services
            .iter()
            .filter(|s| !s.service_type.is_empty())
            .map(|s| s.service_type.as_str())
            .collect::<HashSet<_>>()
            .len();

        let secs = elapsed.as_secs_f64();
        let instances_per_second = if secs > 0.0 {
            services.len() as f64 / secs
        } else {
            0.0
        };

        Self {
            elapsed: truncate_millis(elapsed),
            service_types,
            instances: services.len(),
            instances_per_second,
            suppressed_timeouts: stats.suppressed_timeouts,
            errors: stats.errors,
        }
    }
}

fn truncate_millis(elapsed: Duration) -> Duration {
    Duration::from_millis(elapsed.as_millis().min(u64::MAX as u128) as u64)
}

fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

/// Writes the end-of-run summary to the diagnostic stream
#[derive(Debug, Clone, Copy)]
pub struct SummaryReporter {
    pub enabled: bool,
    pub color: bool,
}

impl SummaryReporter {
    pub fn new(enabled: bool, color: bool) -> Self {
        Self { enabled, color }
    }

    /// Reports the run started at `started`. Does nothing when disabled.
    pub fn report<W: Write>(
        &self,
        out: W,
        services: &[Service],
        started: Instant,
        stats: &DiscoveryStats,
    ) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let summary = RunSummary::new(services, stats, started.elapsed());
        self.render(out, &summary, stats)
    }

    fn paint(&self, text: String, style: fn(String) -> String) -> String {
        if self.color {
            style(text)
        } else {
            text
        }
    }

    fn render<W: Write>(&self, mut out: W, summary: &RunSummary, stats: &DiscoveryStats) -> io::Result<()> {
        let elapsed = humantime::format_duration(summary.elapsed);

        if summary.instances == 0 {
            let mut msg = format!("Summary: Completed in {elapsed} - No services found");
            if summary.suppressed_timeouts > 0 {
                msg.push_str(&format!(" ({} suppressed timeouts)", summary.suppressed_timeouts));
            }
            return writeln!(out, "{}", self.paint(msg, |s| s.bold().to_string()));
        }

        let types = self.paint(
            plural(summary.service_types, "service type", "service types"),
            |s| s.green().to_string(),
        );
        let instances = self.paint(
            plural(summary.instances, "instance", "instances"),
            |s| s.green().to_string(),
        );

        let mut extras = vec![format!("{:.2} inst/s", summary.instances_per_second)];
        if summary.suppressed_timeouts > 0 {
            extras.push(self.paint(
                format!("{} suppressed timeouts", summary.suppressed_timeouts),
                |s| s.yellow().to_string(),
            ));
        }
        if summary.errors > 0 {
            extras.push(self.paint(
                format!("{} errors", summary.errors),
                |s| s.red().to_string(),
            ));
        }

        writeln!(
            out,
            "{} Completed in {elapsed} - {types}, {instances} ({})",
            self.paint("Summary:".to_string(), |s| s.bold().to_string()),
            extras.join(", ")
        )?;

        let ranked = stats.ranked_service_types();
        if ranked.is_empty() {
            return Ok(());
        }
        writeln!(out, "{}", self.paint("Top services:".to_string(), |s| s.bold().to_string()))?;
        for (name, count) in ranked {
            let pct = count as f64 / summary.instances as f64 * 100.0;
            let line = format!("  {name}: {count} ({pct:.1}%)");
            writeln!(out, "{}", self.paint(line, |s| s.green().to_string()))?;
        }
        Ok(())
    }
}
