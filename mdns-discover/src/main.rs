mod catalog;
mod config;
mod discovery;
mod error;
mod logging;
mod mdns;
mod output;

use std::io::{IsTerminal, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use anyhow::{Context, Result};
use clap::Parser;
use shared::types::{OutputMode, Service};
use crate::config::{Cli, Settings};
use crate::discovery::{run_query_isolated, DiscoveryOptions, DiscoveryStats, Orchestrator, Query};
use crate::error::{DiscoveryError, ExitStatus};
use crate::mdns::{MdnsResolver, Resolver};
use crate::output::{write_json, RunSummary, SummaryReporter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let color_allowed = !cli.no_color && std::io::stderr().is_terminal();
    logging::init(cli.debug, color_allowed);

    let mut settings = match Settings::resolve(cli) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("{}", e);
            return e.exit_status().into();
        }
    };
    settings.color = settings.color && color_allowed;

    let resolver = Arc::new(MdnsResolver::new());
    let result = run(
        &settings,
        resolver.clone(),
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .await;
    resolver.shutdown();

    match result {
        Ok(()) => ExitStatus::Success.into(),
        Err(e) => {
            tracing::error!("{:#}", e);
            let status = ExitStatus::from_error(&e);
            tracing::debug!("exit {}: {}", status.code(), status.meaning());
            status.into()
        }
    }
}

/// One discovery run. Results go to `stdout`, every other message to `stderr`.
async fn run(
    settings: &Settings,
    resolver: Arc<dyn Resolver>,
    stdout: &mut (dyn Write + Send),
    stderr: &mut (dyn Write + Send),
) -> Result<()> {
    let started = Instant::now();
    let emit = settings.mode == OutputMode::Text;

    tracing::debug!(
        "Showing: {}",
        settings
            .fields
            .fields()
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(" ")
    );

    let (services, stats) = match &settings.service_filter {
        Some(service_type) => {
            let query = Query {
                service_type: service_type.clone(),
                domain: settings.domain.clone(),
                fields: settings.fields.clone(),
                timeout: settings.timeout,
            };
            let services = run_query_isolated(resolver.as_ref(), &query, emit.then_some(&mut *stdout))
                .await
                .with_context(|| format!("discover {service_type}"))?;
            let mut stats = DiscoveryStats::new(1);
            for service in &services {
                stats.record_instance(&service.service_type);
            }
            (services, stats)
        }
        None => {
            if settings.catalog.is_empty() {
                writeln!(stderr, "No built-in services available (services list empty)")?;
                return Err(DiscoveryError::NoServicesConfigured.into());
            }
            let options = DiscoveryOptions {
                fields: settings.fields.clone(),
                timeout: settings.timeout,
                concurrency: settings.concurrency,
                domain: settings.domain.clone(),
                mode: settings.mode,
                emit,
                verbose: settings.debug,
            };
            let discovery = Orchestrator::new(resolver, options)
                .discover_all(&settings.catalog, &mut *stdout)
                .await
                .context("multi-discover")?;
            (discovery.services, discovery.stats)
        }
    };

    report(settings, &services, &stats, started, stdout, stderr)
}

fn report(
    settings: &Settings,
    services: &[Service],
    stats: &DiscoveryStats,
    started: Instant,
    stdout: &mut (dyn Write + Send),
    stderr: &mut (dyn Write + Send),
) -> Result<()> {
    match settings.mode {
        OutputMode::Json => {
            let summary = settings
                .summary
                .then(|| RunSummary::new(services, stats, started.elapsed()));
            write_json(&mut *stdout, services, summary.as_ref()).context("marshal json")?;
        }
        OutputMode::Text => {
            if services.is_empty() {
                writeln!(
                    stderr,
                    "No services discovered (consider adjusting MDNS_TIMEOUT or filters)"
                )?;
            }
            SummaryReporter::new(settings.summary, settings.color)
                .report(&mut *stderr, services, started, stats)
                .context("write summary")?;
        }
    }
    Ok(())
}
