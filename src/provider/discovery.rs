//! Health-based instance discovery
//!
//! Polls seed URLs for `/.well-known/micro-service.json` metadata and the
//! advertised health endpoint. Healthy instances are republished into the
//! [`MemoryDirectory`] whenever the probed set changes.
//!
//! ## Contract
//!
//! Instances expose a JSON document at `/.well-known/micro-service.json`:
//!
//! ```json
//! {
//!   "name": "micro.web.catalog",
//!   "version": "1.2.0",
//!   "domain": "micro",
//!   "health_path": "/health",
//!   "endpoints": ["Catalog.List", "Catalog.Get"]
//! }
//! ```

use super::{MemoryDirectory, PublishedInstance, RouteCandidate};
use crate::config::{DiscoveryConfig, WILDCARD_DOMAIN};
use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Well-known path for instance metadata (RFC 8615)
pub const WELL_KNOWN_PATH: &str = "/.well-known/micro-service.json";

/// Instance metadata as served by the well-known document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceMetadata {
    /// Registered service name, e.g. "micro.web.catalog"
    pub name: String,
    /// Instance version, used for change detection
    pub version: String,
    /// Domain the instance registers in (default: "*")
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Address to route to; defaults to the seed's host:port
    #[serde(default)]
    pub address: Option<String>,
    /// Health check path (default: "/health")
    #[serde(default = "default_health_path")]
    pub health_path: String,
    /// Endpoints the instance serves
    #[serde(default)]
    pub endpoints: Vec<String>,
}

fn default_domain() -> String {
    WILDCARD_DOMAIN.to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

/// A probed instance
#[derive(Debug, Clone)]
pub struct DiscoveredService {
    /// Base URL of the seed that was probed
    pub seed_url: String,
    pub metadata: ServiceMetadata,
    /// Whether the health endpoint returned 2xx
    pub healthy: bool,
}

impl DiscoveredService {
    /// Routable address: the advertised one, else the seed's authority
    pub fn address(&self) -> Option<String> {
        if let Some(address) = &self.metadata.address {
            return Some(address.clone());
        }
        let uri: http::Uri = self.seed_url.parse().ok()?;
        let authority = uri.authority()?;
        match authority.port_u16() {
            Some(_) => Some(authority.as_str().to_string()),
            None => {
                let port = if uri.scheme_str() == Some("https") { 443 } else { 80 };
                Some(format!("{}:{}", authority.host(), port))
            }
        }
    }
}

/// Discovery provider - probes seeds and tracks what it saw last
pub struct DiscoveryProvider {
    config: DiscoveryConfig,
    client: reqwest::Client,
    discovered: Arc<RwLock<BTreeMap<String, Vec<DiscoveredService>>>>,
}

impl DiscoveryProvider {
    pub fn new(config: DiscoveryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            config,
            client,
            discovered: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Probe a single seed URL for metadata and health
    pub async fn probe_seed(&self, seed_url: &str) -> Result<DiscoveredService> {
        let base = seed_url.trim_end_matches('/');
        let metadata_url = format!("{}{}", base, WELL_KNOWN_PATH);

        let resp = self.client.get(&metadata_url).send().await.map_err(|e| {
            GatewayError::Discovery(format!(
                "Failed to fetch metadata from {}: {}",
                metadata_url, e
            ))
        })?;

        if !resp.status().is_success() {
            return Err(GatewayError::Discovery(format!(
                "Metadata endpoint {} returned status {}",
                metadata_url,
                resp.status()
            )));
        }

        let metadata: ServiceMetadata = resp.json().await.map_err(|e| {
            GatewayError::Discovery(format!(
                "Failed to parse metadata from {}: {}",
                metadata_url, e
            ))
        })?;

        let health_url = format!("{}{}", base, metadata.health_path);
        let healthy = match self.client.get(&health_url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        };

        Ok(DiscoveredService {
            seed_url: seed_url.to_string(),
            metadata,
            healthy,
        })
    }

    /// Probe all configured seeds; failures are logged and skipped
    pub async fn probe_all(&self) -> Vec<DiscoveredService> {
        let mut results = Vec::new();
        for seed in &self.config.seeds {
            match self.probe_seed(&seed.url).await {
                Ok(discovered) => {
                    tracing::debug!(
                        seed = %seed.url,
                        service = %discovered.metadata.name,
                        healthy = discovered.healthy,
                        "Discovered instance"
                    );
                    results.push(discovered);
                }
                Err(e) => {
                    tracing::warn!(seed = %seed.url, error = %e, "Failed to probe seed");
                }
            }
        }
        results
    }

    /// Whether a probe result differs from the previous one
    pub async fn has_changed(&self, probed: &[DiscoveredService]) -> bool {
        let cached = self.discovered.read().await;
        let fresh = group_by_name(probed);

        if cached.len() != fresh.len() {
            return true;
        }

        fresh.iter().any(|(name, entries)| match cached.get(name) {
            None => true,
            Some(old) => {
                old.len() != entries.len()
                    || old.iter().zip(entries.iter()).any(|(a, b)| {
                        a.seed_url != b.seed_url
                            || a.metadata != b.metadata
                            || a.healthy != b.healthy
                    })
            }
        })
    }

    /// Remember a probe result
    pub async fn update_cache(&self, probed: &[DiscoveredService]) {
        let mut cached = self.discovered.write().await;
        *cached = group_by_name(probed);
    }

    /// Snapshot of the last probe result
    pub async fn discovered(&self) -> BTreeMap<String, Vec<DiscoveredService>> {
        self.discovered.read().await.clone()
    }
}

fn group_by_name(services: &[DiscoveredService]) -> BTreeMap<String, Vec<DiscoveredService>> {
    let mut grouped: BTreeMap<String, Vec<DiscoveredService>> = BTreeMap::new();
    for svc in services {
        grouped
            .entry(svc.metadata.name.clone())
            .or_default()
            .push(svc.clone());
    }
    grouped
}

/// Directory entries for every healthy probed instance
pub fn build_instances(discovered: &[DiscoveredService]) -> Vec<PublishedInstance> {
    discovered
        .iter()
        .filter(|svc| svc.healthy)
        .filter_map(|svc| {
            let address = svc.address()?;
            Some(PublishedInstance {
                candidate: RouteCandidate {
                    service: svc.metadata.name.clone(),
                    address,
                    domain: svc.metadata.domain.clone(),
                },
                endpoints: svc.metadata.endpoints.clone(),
            })
        })
        .collect()
}

/// Spawn the discovery polling loop.
///
/// Probes every seed once per interval and republishes the healthy set
/// into `directory` when it changes.
pub fn spawn_discovery_loop(
    config: DiscoveryConfig,
    directory: Arc<MemoryDirectory>,
) -> tokio::task::JoinHandle<()> {
    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    let provider = DiscoveryProvider::new(config);

    tokio::spawn(async move {
        loop {
            let discovered = provider.probe_all().await;

            if provider.has_changed(&discovered).await {
                provider.update_cache(&discovered).await;
                let instances = build_instances(&discovered);
                tracing::info!(
                    probed = discovered.len(),
                    healthy = instances.len(),
                    "Discovery detected changes, republishing instances"
                );
                directory.replace_discovered(instances).await;
            }

            tokio::time::sleep(poll_interval).await;
        }
    })
}
