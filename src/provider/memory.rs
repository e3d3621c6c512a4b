//! In-memory service directory
//!
//! Holds statically configured instances plus instances published by the
//! discovery loop. Discovered instances are replaced wholesale on every
//! refresh; static ones live for the lifetime of the process unless
//! deregistered.

use super::{DirectoryError, LookupOptions, RouteCandidate, ServiceDirectory};
use crate::config::{DirectoryConfig, WILDCARD_DOMAIN};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Static,
    Discovered,
}

#[derive(Debug, Clone)]
struct Instance {
    address: String,
    domain: String,
    source: Source,
    endpoints: Vec<String>,
}

impl Instance {
    fn visible_in(&self, domain: &str) -> bool {
        domain.is_empty() || self.domain == WILDCARD_DOMAIN || self.domain == domain
    }
}

/// A discovered instance and the endpoints it advertises
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedInstance {
    pub candidate: RouteCandidate,
    pub endpoints: Vec<String>,
}

/// In-memory directory keyed by service name
#[derive(Default)]
pub struct MemoryDirectory {
    services: RwLock<BTreeMap<String, Vec<Instance>>>,
}

impl MemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory seeded with the statically configured services
    pub fn from_config(config: &DirectoryConfig) -> Self {
        let mut services: BTreeMap<String, Vec<Instance>> = BTreeMap::new();
        for (name, svc) in &config.services {
            let instances = svc
                .addresses
                .iter()
                .map(|address| Instance {
                    address: address.clone(),
                    domain: svc.domain.clone(),
                    source: Source::Static,
                    endpoints: svc.endpoints.clone(),
                })
                .collect();
            services.insert(name.clone(), instances);
        }
        Self {
            services: RwLock::new(services),
        }
    }

    /// Register one instance of a service
    pub async fn register(&self, name: &str, address: &str, domain: &str) {
        let mut services = self.services.write().await;
        let instances = services.entry(name.to_string()).or_default();
        if instances
            .iter()
            .any(|i| i.address == address && i.domain == domain)
        {
            return;
        }
        instances.push(Instance {
            address: address.to_string(),
            domain: domain.to_string(),
            source: Source::Static,
            endpoints: Vec::new(),
        });
        tracing::debug!(service = name, address, domain, "Registered instance");
    }

    /// Remove one instance; the service disappears with its last instance
    pub async fn deregister(&self, name: &str, address: &str) {
        let mut services = self.services.write().await;
        if let Some(instances) = services.get_mut(name) {
            instances.retain(|i| i.address != address);
            if instances.is_empty() {
                services.remove(name);
            }
        }
        tracing::debug!(service = name, address, "Deregistered instance");
    }

    /// Replace every discovered instance with a fresh set
    pub async fn replace_discovered(&self, published: Vec<PublishedInstance>) {
        let mut services = self.services.write().await;
        for instances in services.values_mut() {
            instances.retain(|i| i.source == Source::Static);
        }
        for PublishedInstance {
            candidate,
            endpoints,
        } in published
        {
            services
                .entry(candidate.service)
                .or_default()
                .push(Instance {
                    address: candidate.address,
                    domain: candidate.domain,
                    source: Source::Discovered,
                    endpoints,
                });
        }
        services.retain(|_, instances| !instances.is_empty());
    }

    /// Number of registered services
    pub async fn len(&self) -> usize {
        self.services.read().await.len()
    }

    /// Whether no service is registered
    pub async fn is_empty(&self) -> bool {
        self.services.read().await.is_empty()
    }
}

#[async_trait]
impl ServiceDirectory for MemoryDirectory {
    async fn lookup(
        &self,
        name: &str,
        options: &LookupOptions,
    ) -> std::result::Result<Vec<RouteCandidate>, DirectoryError> {
        let services = self.services.read().await;
        let instances = services.get(name).ok_or(DirectoryError::NotFound)?;
        Ok(instances
            .iter()
            .filter(|i| i.visible_in(&options.domain))
            .map(|i| RouteCandidate {
                service: name.to_string(),
                address: i.address.clone(),
                domain: i.domain.clone(),
            })
            .collect())
    }

    async fn list_services(
        &self,
        options: &LookupOptions,
    ) -> std::result::Result<Vec<String>, DirectoryError> {
        let services = self.services.read().await;
        Ok(services
            .iter()
            .filter(|(_, instances)| instances.iter().any(|i| i.visible_in(&options.domain)))
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn endpoints(
        &self,
        name: &str,
        options: &LookupOptions,
    ) -> std::result::Result<Vec<String>, DirectoryError> {
        let services = self.services.read().await;
        let instances = services.get(name).ok_or(DirectoryError::NotFound)?;
        let endpoints: BTreeSet<&String> = instances
            .iter()
            .filter(|i| i.visible_in(&options.domain))
            .flat_map(|i| i.endpoints.iter())
            .collect();
        Ok(endpoints.into_iter().cloned().collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
