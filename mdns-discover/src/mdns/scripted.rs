//! In-memory resolver driven by a per-service-type script

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use crate::error::{DiscoveryError, Result};
use crate::mdns::{EntryStream, RawEntry, Resolver};

pub fn entry(host_name: &str, ipv4: [u8; 4], port: u16) -> RawEntry {
    RawEntry {
        host_name: host_name.to_string(),
        ipv4: vec![Ipv4Addr::from(ipv4)],
        port,
        ..RawEntry::default()
    }
}

#[derive(Default)]
pub struct ScriptedResolver {
    script: HashMap<String, Vec<RawEntry>>,
    hold_open: bool,
    init_failures: HashSet<String>,
    browse_failures: HashSet<String>,
    panics: HashSet<String>,
    browses: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    tokens: Mutex<Vec<CancellationToken>>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries returned for `service_type`, in order
    pub fn with(mut self, service_type: &str, entries: Vec<RawEntry>) -> Self {
        self.script.insert(service_type.to_string(), entries);
        self
    }

    /// Keep streams open after the scripted entries until cancelled
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn fail_init(mut self, service_type: &str) -> Self {
        self.init_failures.insert(service_type.to_string());
        self
    }

    pub fn fail_browse(mut self, service_type: &str) -> Self {
        self.browse_failures.insert(service_type.to_string());
        self
    }

    pub fn panic_on(mut self, service_type: &str) -> Self {
        self.panics.insert(service_type.to_string());
        self
    }

    pub fn browses(&self) -> usize {
        self.browses.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of streams that were open at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn all_cancelled(&self) -> bool {
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .all(CancellationToken::is_cancelled)
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn browse(
        &self,
        service_type: &str,
        _domain: &str,
        cancel: CancellationToken,
    ) -> Result<EntryStream> {
        self.browses.fetch_add(1, Ordering::SeqCst);

        if self.panics.contains(service_type) {
            panic!("scripted panic for {service_type}");
        }
        if self.init_failures.contains(service_type) {
            return Err(DiscoveryError::ResolverInit("scripted".to_string()));
        }
        if self.browse_failures.contains(service_type) {
            return Err(DiscoveryError::BrowseFailed {
                service_type: service_type.to_string(),
                reason: "scripted".to_string(),
            });
        }

        self.tokens.lock().unwrap().push(cancel.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(Arc::clone(&self.in_flight));

        let entries = stream::iter(self.script.get(service_type).cloned().unwrap_or_default());
        let stream = if self.hold_open {
            entries.chain(stream::pending()).boxed()
        } else {
            entries.boxed()
        };

        Ok(stream
            .take_until(cancel.cancelled_owned())
            .map(move |entry| {
                let _held = &guard;
                entry
            })
            .boxed())
    }
}
