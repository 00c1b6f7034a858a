use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use reqwest::Client;
use tracing::debug;

use crate::probe::{Probe, probe};

/// Chooses a backend for each request from a swappable candidate list.
#[derive(Clone, Debug)]
pub struct Router {
    backends: Arc<ArcSwap<Vec<String>>>,
    client: Client,
    probe_timeout: Duration,
}

impl Router {
    /// Creates a router over `backends`, probed in the given order.
    pub fn new(backends: Vec<String>, probe_timeout: Duration) -> Self {
        Self {
            backends: Arc::new(ArcSwap::from_pointee(backends)),
            client: Client::new(),
            probe_timeout,
        }
    }

    /// Replaces the candidate list. Requests already selecting keep the list
    /// they loaded.
    pub fn reconfigure(&self, backends: Vec<String>) {
        debug!(?backends, "reconfiguring backends");
        self.backends.store(Arc::new(backends));
    }

    /// The current candidate list.
    pub fn backends(&self) -> Arc<Vec<String>> {
        self.backends.load_full()
    }

    /// HTTP client shared by probes and proxied requests.
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// First candidate that reports itself as leader.
    pub async fn leader(&self) -> Option<String> {
        self.select(|p| p == Probe::Leader).await
    }

    /// First candidate that answers its stats probe.
    pub async fn available(&self) -> Option<String> {
        self.select(Probe::is_available).await
    }

    async fn select(&self, accept: impl Fn(Probe) -> bool) -> Option<String> {
        let backends = self.backends.load_full();

        for candidate in backends.iter() {
            let result = probe(&self.client, candidate, self.probe_timeout).await;
            debug!(candidate, ?result, "probed backend");

            if accept(result) {
                return Some(candidate.clone());
            }
        }

        None
    }
}
