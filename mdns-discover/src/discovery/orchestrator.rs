use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use shared::types::{FieldSelection, OutputMode, Service};
use tokio::sync::{mpsc, Semaphore};
use crate::discovery::dedup::Deduplicator;
use crate::discovery::stats::DiscoveryStats;
use crate::discovery::worker::{run_query_isolated, Query};
use crate::error::{DiscoveryError, Result};
use crate::mdns::Resolver;
use crate::output::format::render_service;

/// Settings for a multi-service run
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub fields: FieldSelection,
    pub timeout: Duration,
    /// Queries allowed in flight at once, at least 1
    pub concurrency: usize,
    pub domain: String,
    pub mode: OutputMode,
    /// Print each new instance as soon as it is aggregated (text mode only)
    pub emit: bool,
    /// Report "timed out with no results" as an error instead of suppressing it
    pub verbose: bool,
}

/// Outcome of a multi-service run
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Unique instances in the order they were aggregated
    pub services: Vec<Service>,
    pub stats: DiscoveryStats,
}

/// What a worker task posts back on completion
struct QueryReport {
    service_type: String,
    outcome: Result<Vec<Service>>,
}

/// Fans one discovery run out over a catalog of service types
pub struct Orchestrator {
    resolver: Arc<dyn Resolver>,
    options: DiscoveryOptions,
}

impl Orchestrator {
    pub fn new(resolver: Arc<dyn Resolver>, options: DiscoveryOptions) -> Self {
        Self { resolver, options }
    }

    /// Queries every catalog entry and merges the results.
    ///
    /// At most `concurrency` queries run at once. Results are aggregated in
    /// completion order, so sequence numbers and output order vary from run to
    /// run. Worker failures never abort the run; they are tallied in the
    /// returned stats. Lines are written to `out` only in text mode with
    /// emission enabled.
    pub async fn discover_all(
        &self,
        catalog: &[String],
        out: &mut (dyn Write + Send),
    ) -> Result<Discovery> {
        if catalog.is_empty() {
            return Err(DiscoveryError::NoServicesConfigured);
        }

        let expected = catalog.len();
        // More permits than queries would never be used
        let concurrency = self.options.concurrency.clamp(1, expected);
        let permits = Arc::new(Semaphore::new(concurrency));
        let (tx, mut rx) = mpsc::channel::<QueryReport>(expected);

        tracing::debug!(
            "Discovering {} service types, {} at a time",
            expected,
            concurrency
        );

        for service_type in catalog {
            let query = Query {
                service_type: service_type.clone(),
                domain: self.options.domain.clone(),
                fields: self.options.fields.clone(),
                timeout: self.options.timeout,
            };
            let resolver = Arc::clone(&self.resolver);
            let permits = Arc::clone(&permits);
            let tx = tx.clone();

            tokio::spawn(async move {
                // The semaphore is never closed, so the permit is always granted
                let _permit = permits.acquire_owned().await;
                let outcome = run_query_isolated(resolver.as_ref(), &query, None).await;
                let report = QueryReport {
                    service_type: query.service_type,
                    outcome,
                };
                if tx.send(report).await.is_err() {
                    tracing::debug!("Aggregator gone before report was delivered");
                }
            });
        }
        // Every task holds its own sender; the channel closes once all have reported
        drop(tx);

        let print = self.options.emit && self.options.mode == OutputMode::Text;
        let mut seen = Deduplicator::new();
        let mut discovery = Discovery {
            services: Vec::new(),
            stats: DiscoveryStats::new(expected),
        };

        for received in 0..expected {
            let Some(report) = rx.recv().await else {
                return Err(DiscoveryError::ResultChannelClosed { received, expected });
            };
            self.aggregate(report, &mut seen, &mut discovery, print.then_some(&mut *out))?;
        }

        tracing::debug!(
            "Collected {} unique instances from {} service types",
            seen.len(),
            expected
        );
        Ok(discovery)
    }

    fn aggregate(
        &self,
        report: QueryReport,
        seen: &mut Deduplicator,
        discovery: &mut Discovery,
        mut out: Option<&mut (dyn Write + Send)>,
    ) -> Result<()> {
        let QueryReport {
            service_type,
            outcome,
        } = report;

        let batch = match outcome {
            Ok(batch) => batch,
            Err(DiscoveryError::TimedOutZero) if !self.options.verbose => {
                let msg = format!("discover {service_type}: {} (suppressed)", DiscoveryError::TimedOutZero);
                tracing::debug!("{}", msg);
                discovery.stats.record_suppressed(msg);
                return Ok(());
            }
            Err(e) => {
                let msg = format!("discover {service_type}: {e}");
                tracing::warn!("{}", msg);
                discovery.stats.record_error(msg);
                return Ok(());
            }
        };

        for mut service in batch {
            if !seen.first_sight(&service.hostname, &service.address, service.port) {
                tracing::trace!(
                    "Dropping duplicate {}|{}|{} from {}",
                    service.hostname,
                    service.address,
                    service.port,
                    service_type
                );
                continue;
            }

            service.service_type = service_type.clone();
            discovery.stats.record_instance(&service_type);
            if let Some(out) = out.as_deref_mut() {
                let line = render_service(&self.options.fields, discovery.services.len() + 1, &service);
                writeln!(out, "{line}")?;
            }
            discovery.services.push(service);
        }
        Ok(())
    }
}
