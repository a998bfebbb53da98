use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use crate::error::{DiscoveryError, Result};

/// Live, unordered stream of browse results. Ends when the cancellation token
/// fires or the resolver gives up on its own.
pub type EntryStream = BoxStream<'static, RawEntry>;

/// One answer to a browse, as reported by the network.
/// Nothing here is deduplicated; the same instance may show up repeatedly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub host_name: String,
    pub ipv4: Vec<Ipv4Addr>,
    pub ipv6: Vec<Ipv6Addr>,
    pub port: u16,
    pub txt: Vec<String>,
}

/// Browses one service type at a time
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Starts browsing `service_type` under `domain`.
    ///
    /// # Errors
    ///
    /// `DiscoveryError::ResolverInit` if the underlying responder cannot be
    /// started, `DiscoveryError::BrowseFailed` if the browse is rejected.
    async fn browse(
        &self,
        service_type: &str,
        domain: &str,
        cancel: CancellationToken,
    ) -> Result<EntryStream>;
}

/// Resolver backed by the mdns-sd daemon.
///
/// The daemon is started on the first browse. If that fails the query is
/// reported as a resolver init failure and the next browse tries again.
#[derive(Default)]
pub struct MdnsResolver {
    daemon: OnceCell<ServiceDaemon>,
}

impl MdnsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    async fn daemon(&self) -> Result<&ServiceDaemon> {
        self.daemon
            .get_or_try_init(|| async {
                tracing::debug!("Starting mDNS daemon");
                ServiceDaemon::new().map_err(|e| DiscoveryError::ResolverInit(e.to_string()))
            })
            .await
    }

    /// Stops the daemon if one was started
    pub fn shutdown(&self) {
        if let Some(daemon) = self.daemon.get() {
            if let Err(e) = daemon.shutdown() {
                tracing::debug!("Failed to shutdown mDNS daemon: {}", e);
            }
        }
    }
}

#[async_trait]
impl Resolver for MdnsResolver {
    async fn browse(
        &self,
        service_type: &str,
        domain: &str,
        cancel: CancellationToken,
    ) -> Result<EntryStream> {
        let daemon = self.daemon().await?.clone();
        let ty_domain = qualify(service_type, domain);

        let receiver: flume::Receiver<ServiceEvent> =
            daemon
                .browse(&ty_domain)
                .map_err(|e| DiscoveryError::BrowseFailed {
                    service_type: service_type.to_string(),
                    reason: e.to_string(),
                })?;

        let guard = BrowseGuard { daemon, ty_domain };

        let stream = async_stream::stream! {
            let guard = guard;
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = receiver.recv_async() => event,
                };
                match event {
                    Ok(ServiceEvent::ServiceResolved(info)) => {
                        tracing::trace!("Resolved {} on {}", info.get_fullname(), info.get_hostname());
                        yield convert_service_info(&info);
                    }
                    Ok(ServiceEvent::SearchStopped(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!("Browse receiver for {} disconnected: {}", guard.ty_domain, e);
                        break;
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

/// Stops the browse when the entry stream is dropped
struct BrowseGuard {
    daemon: ServiceDaemon,
    ty_domain: String,
}

impl Drop for BrowseGuard {
    fn drop(&mut self) {
        if let Err(e) = self.daemon.stop_browse(&self.ty_domain) {
            tracing::trace!("Failed to stop browsing {}: {}", self.ty_domain, e);
        }
    }
}

/// Builds the fully qualified browse name, e.g. "_http._tcp.local."
fn qualify(service_type: &str, domain: &str) -> String {
    let service_type = service_type.trim_end_matches('.');
    let domain = domain.trim_matches('.');
    format!("{service_type}.{domain}.")
}

/// Convert an mdns-sd ServiceInfo to a RawEntry
fn convert_service_info(info: &ServiceInfo) -> RawEntry {
    let mut ipv4 = Vec::new();
    let mut ipv6 = Vec::new();
    for addr in info.get_addresses() {
        match addr {
            IpAddr::V4(v4) => ipv4.push(*v4),
            IpAddr::V6(v6) => ipv6.push(*v6),
        }
    }
    ipv4.sort();
    ipv6.sort();

    // Keep advertisement order; properties without a value are bare keys
    let txt = info
        .get_properties()
        .iter()
        .map(|prop| match prop.val() {
            Some(val) => format!("{}={}", prop.key(), String::from_utf8_lossy(val)),
            None => prop.key().to_string(),
        })
        .collect();

    RawEntry {
        host_name: info.get_hostname().to_string(),
        ipv4,
        ipv6,
        port: info.get_port(),
        txt,
    }
}
