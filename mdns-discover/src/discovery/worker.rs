use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use futures::{FutureExt, StreamExt};
use shared::types::{FieldSelection, Service};
use tokio_util::sync::CancellationToken;
use crate::discovery::dedup::Deduplicator;
use crate::discovery::txt::parse_txt;
use crate::error::{DiscoveryError, Result};
use crate::mdns::Resolver;
use crate::output::format::render_line;

/// One service-type query
#[derive(Debug, Clone)]
pub struct Query {
    pub service_type: String,
    pub domain: String,
    pub fields: FieldSelection,
    pub timeout: Duration,
}

/// Browses a single service type until the deadline fires or the resolver
/// closes the stream, returning the instances in arrival order.
///
/// Repeated sightings of the same host/address/port within the query are
/// dropped, so the first advertisement's TXT data is the one kept. When `out`
/// is given every new instance is also written to it as a text line.
///
/// A deadline that passes with nothing found yields
/// `DiscoveryError::TimedOutZero`; partial results are a success.
pub async fn run_query<R: Resolver + ?Sized>(
    resolver: &R,
    query: &Query,
    mut out: Option<&mut (dyn Write + Send)>,
) -> Result<Vec<Service>> {
    let cancel = CancellationToken::new();
    let _cancel_on_exit = cancel.clone().drop_guard();

    let mut entries = resolver
        .browse(&query.service_type, &query.domain, cancel.clone())
        .await?;

    let deadline = tokio::time::sleep(query.timeout);
    tokio::pin!(deadline);

    let mut seen = Deduplicator::new();
    let mut collected: Vec<Service> = Vec::new();

    loop {
        let entry = tokio::select! {
            _ = &mut deadline => {
                cancel.cancel();
                tracing::debug!(
                    "discovery for {} timed out after {:?} ({} results)",
                    query.service_type,
                    query.timeout,
                    collected.len()
                );
                if collected.is_empty() {
                    return Err(DiscoveryError::TimedOutZero);
                }
                return Ok(collected);
            }
            entry = entries.next() => entry,
        };

        let Some(entry) = entry else {
            tracing::debug!(
                "discovery stream closed for {} ({} results)",
                query.service_type,
                collected.len()
            );
            return Ok(collected);
        };

        let txt = parse_txt(&entry.txt);
        let addresses = entry
            .ipv4
            .iter()
            .map(ToString::to_string)
            .chain(entry.ipv6.iter().map(ToString::to_string));

        for address in addresses {
            if !seen.first_sight(&entry.host_name, &address, entry.port) {
                continue;
            }

            if let Some(out) = out.as_deref_mut() {
                let line = render_line(
                    &query.fields,
                    collected.len() + 1,
                    &query.service_type,
                    &entry.host_name,
                    &address,
                    entry.port,
                    &txt.joined,
                );
                writeln!(out, "{line}")?;
            }

            collected.push(Service {
                service_type: query.service_type.clone(),
                hostname: entry.host_name.clone(),
                address,
                port: entry.port,
                text: txt.joined.clone(),
                txt_attributes: txt.attributes.clone(),
            });
        }
    }
}

/// Runs [`run_query`] and turns a panic inside it into
/// `DiscoveryError::WorkerPanicked`.
pub async fn run_query_isolated<R: Resolver + ?Sized>(
    resolver: &R,
    query: &Query,
    out: Option<&mut (dyn Write + Send)>,
) -> Result<Vec<Service>> {
    AssertUnwindSafe(run_query(resolver, query, out))
        .catch_unwind()
        .await
        .unwrap_or(Err(DiscoveryError::WorkerPanicked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use crate::mdns::scripted::{entry, ScriptedResolver};
    use crate::mdns::RawEntry;

    fn query(service_type: &str) -> Query {
        Query {
            service_type: service_type.to_string(),
            domain: "local.".to_string(),
            fields: FieldSelection::default(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_stream_times_out_with_zero() {
        let resolver = ScriptedResolver::new().hold_open();
        let result = run_query(&resolver, &query("_ssh._tcp"), None).await;
        assert!(matches!(result, Err(DiscoveryError::TimedOutZero)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_isolated_query_reports_panic() {
        let resolver = ScriptedResolver::new().panic_on("_ssh._tcp");
        let result = run_query_isolated(&resolver, &query("_ssh._tcp"), None).await;
        assert!(matches!(result, Err(DiscoveryError::WorkerPanicked)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_results_at_deadline_are_success() {
        let resolver = ScriptedResolver::new()
            .hold_open()
            .with("_ssh._tcp", vec![entry("host.local.", [10, 0, 0, 5], 22)]);

        let services = run_query(&resolver, &query("_ssh._tcp"), None).await.unwrap();

        assert_eq!(services.len(), 1);
        assert_eq!(services[0].service_type, "_ssh._tcp");
        assert_eq!(services[0].address, "10.0.0.5");
        assert_eq!(services[0].port, 22);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_returns_early_without_error() {
        let resolver = ScriptedResolver::new();
        let started = tokio::time::Instant::now();

        let services = run_query(&resolver, &query("_ssh._tcp"), None).await.unwrap();

        assert!(services.is_empty());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_record_per_address_ipv4_first() {
        let raw = RawEntry {
            host_name: "dual.local.".to_string(),
            ipv4: vec![Ipv4Addr::new(10, 0, 0, 5)],
            ipv6: vec!["fe80::1".parse::<Ipv6Addr>().unwrap()],
            port: 8080,
            txt: vec!["fv=p20.1".to_string(), "junk".to_string()],
        };
        let resolver = ScriptedResolver::new().with("_http._tcp", vec![raw]);

        let services = run_query(&resolver, &query("_http._tcp"), None).await.unwrap();

        let addresses: Vec<&str> = services.iter().map(|s| s.address.as_str()).collect();
        assert_eq!(addresses, vec!["10.0.0.5", "fe80::1"]);
        for service in &services {
            assert_eq!(service.text, "fv=p20.1;junk");
            assert_eq!(service.txt_attributes.as_ref().unwrap()["fv"], "p20.1");
            assert_eq!(service.txt_attributes.as_ref().unwrap().len(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_advertisement_keeps_first_txt() {
        let mut first = entry("host.local.", [10, 0, 0, 5], 22);
        first.txt = vec!["version=1".to_string()];
        let mut second = first.clone();
        second.txt = vec!["version=2".to_string()];
        let resolver = ScriptedResolver::new().with("_ssh._tcp", vec![first, second]);

        let services = run_query(&resolver, &query("_ssh._tcp"), None).await.unwrap();

        assert_eq!(services.len(), 1);
        assert_eq!(services[0].text, "version=1");
        assert_eq!(services[0].txt_attributes.as_ref().unwrap()["version"], "1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_without_addresses_is_dropped() {
        let bare = RawEntry {
            host_name: "ghost.local.".to_string(),
            port: 22,
            ..RawEntry::default()
        };
        let resolver = ScriptedResolver::new().with(
            "_ssh._tcp",
            vec![bare, entry("host.local.", [10, 0, 0, 5], 22)],
        );

        let services = run_query(&resolver, &query("_ssh._tcp"), None).await.unwrap();

        assert_eq!(services.len(), 1);
        assert_eq!(services[0].hostname, "host.local.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_emission_numbers_lines() {
        let resolver = ScriptedResolver::new().with(
            "_ssh._tcp",
            vec![
                entry("a.local.", [10, 0, 0, 5], 22),
                entry("a.local.", [10, 0, 0, 5], 22),
                entry("b.local.", [10, 0, 0, 6], 22),
            ],
        );
        let mut q = query("_ssh._tcp");
        q.fields = FieldSelection::parse_list("count,hostname");
        let mut out: Vec<u8> = Vec::new();

        let services = run_query(&resolver, &q, Some(&mut out as &mut (dyn Write + Send)))
            .await
            .unwrap();

        assert_eq!(services.len(), 2);
        assert_eq!(String::from_utf8(out).unwrap(), "1 a.local.\n2 b.local.\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolver_failures_are_classified() {
        let init = ScriptedResolver::new().fail_init("_ssh._tcp");
        let result = run_query(&init, &query("_ssh._tcp"), None).await;
        assert!(matches!(result, Err(DiscoveryError::ResolverInit(_))));

        let browse = ScriptedResolver::new().fail_browse("_ssh._tcp");
        let result = run_query(&browse, &query("_ssh._tcp"), None).await;
        assert!(matches!(result, Err(DiscoveryError::BrowseFailed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_is_cancelled_when_query_ends() {
        let resolver = ScriptedResolver::new()
            .hold_open()
            .with("_ssh._tcp", vec![entry("host.local.", [10, 0, 0, 5], 22)]);

        run_query(&resolver, &query("_ssh._tcp"), None).await.unwrap();

        assert_eq!(resolver.in_flight(), 0);
        assert!(resolver.all_cancelled());
    }
}
