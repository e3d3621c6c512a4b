//! Service directory - where live service instances are looked up
//!
//! The dispatcher only consumes the [`ServiceDirectory`] contract. The
//! in-memory directory holds statically configured instances and whatever
//! the discovery loop publishes into it.

pub mod discovery;
mod memory;

pub use discovery::{spawn_discovery_loop, DiscoveredService, DiscoveryProvider, ServiceMetadata};
pub use memory::{MemoryDirectory, PublishedInstance};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// One live network address at which a named service can be reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteCandidate {
    /// Registered service name
    pub service: String,
    /// Network address in "host:port" format
    pub address: String,
    /// Domain the instance is registered in
    pub domain: String,
}

/// Scope of a lookup
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Domain / network to search; empty matches every domain
    pub domain: String,
}

impl LookupOptions {
    /// Scope a lookup to a domain
    pub fn domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }
}

/// Directory failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// No route is registered under the requested name
    #[error("route not found")]
    NotFound,
    /// The directory itself failed
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Service directory contract
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Return the live candidates for `name` within the lookup scope
    async fn lookup(
        &self,
        name: &str,
        options: &LookupOptions,
    ) -> std::result::Result<Vec<RouteCandidate>, DirectoryError>;

    /// Names of every registered service visible in the lookup scope
    async fn list_services(
        &self,
        options: &LookupOptions,
    ) -> std::result::Result<Vec<String>, DirectoryError>;

    /// Endpoints advertised by `name`; empty when the directory does not track them
    async fn endpoints(
        &self,
        _name: &str,
        _options: &LookupOptions,
    ) -> std::result::Result<Vec<String>, DirectoryError> {
        Ok(Vec::new())
    }

    /// Directory name for logging
    fn name(&self) -> &str;
}
