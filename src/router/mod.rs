//! Router - request classification and service-name resolution
//!
//! Two resolution strategies share one contract:
//! - path: `/catalog/items` resolves service `catalog`, path `/items`
//! - subdomain: `catalog.example.com/items` resolves service `catalog`, path `/items`
//!
//! Both consult the service directory on every call and pick one candidate
//! through a [`RouteSelector`]. Nothing is cached across requests.

mod classify;
mod host;
mod path;
mod subdomain;

pub use classify::{Classification, Classifier, RouteBy, Target, SERVICE_INFO_PREFIX};
pub use host::{is_ip_literal, normalize_host, reverse_labels, strip_port};
pub use path::PathResolver;
pub use subdomain::SubdomainResolver;

use crate::config::{GatewayConfig, ResolverMode};
use crate::provider::{DirectoryError, LookupOptions, RouteCandidate, ServiceDirectory};
use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// The fully rewritten target a request is forwarded to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEndpoint {
    /// Resolved service name, prefix included
    pub name: String,
    /// HTTP method of the inbound request
    pub method: String,
    /// Candidate address, "host:port"
    pub host: String,
    /// Service-relative path
    pub path: String,
    /// Domain the lookup was scoped to
    pub domain: String,
}

/// Resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("invalid service path")]
    InvalidPath,
    #[error("service not found")]
    NotFound,
    #[error("directory error: {0}")]
    Directory(String),
}

impl ResolveError {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPath => "invalid_path",
            Self::NotFound => "not_found",
            Self::Directory(_) => "directory",
        }
    }
}

impl From<DirectoryError> for ResolveError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound => Self::NotFound,
            DirectoryError::Unavailable(msg) => Self::Directory(msg),
        }
    }
}

/// The request fields resolution depends on
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub method: String,
    /// Normalized host, no port
    pub host: String,
    /// Request path without query
    pub path: String,
    /// Namespace the request was classified into; scopes the lookup
    pub namespace: String,
}

/// Picks one route among live candidates
pub trait RouteSelector: Send + Sync {
    fn select<'a>(&self, candidates: &'a [RouteCandidate]) -> Option<&'a RouteCandidate>;
}

/// Uniform random pick from the process-wide thread-local source
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSelector;

impl RouteSelector for RandomSelector {
    fn select<'a>(&self, candidates: &'a [RouteCandidate]) -> Option<&'a RouteCandidate> {
        match candidates.len() {
            0 => None,
            1 => candidates.first(),
            n => candidates.get(rand::thread_rng().gen_range(0..n)),
        }
    }
}

/// Resolution strategy contract
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn resolve(&self, req: &RouteRequest) -> std::result::Result<ResolvedEndpoint, ResolveError>;

    /// Strategy name for logging
    fn name(&self) -> &'static str;
}

/// Shared tail of both strategies: prefix the name, look it up, pick one
pub(crate) struct Lookup {
    directory: Arc<dyn ServiceDirectory>,
    selector: Arc<dyn RouteSelector>,
    prefix: Option<String>,
}

impl Lookup {
    pub(crate) fn new(
        directory: Arc<dyn ServiceDirectory>,
        selector: Arc<dyn RouteSelector>,
        prefix: Option<String>,
    ) -> Self {
        Self {
            directory,
            selector,
            prefix: prefix.filter(|p| !p.is_empty()),
        }
    }

    pub(crate) fn qualify(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}.{}", prefix, name),
            None => name.to_string(),
        }
    }

    pub(crate) async fn endpoint(
        &self,
        req: &RouteRequest,
        name: &str,
        path: String,
    ) -> std::result::Result<ResolvedEndpoint, ResolveError> {
        let name = self.qualify(name);
        let candidates = self
            .directory
            .lookup(&name, &LookupOptions::domain(req.namespace.clone()))
            .await?;
        let route = self
            .selector
            .select(&candidates)
            .ok_or(ResolveError::NotFound)?;

        Ok(ResolvedEndpoint {
            name,
            method: req.method.clone(),
            host: route.address.clone(),
            path,
            domain: req.namespace.clone(),
        })
    }
}

/// Both strategies, dispatched on the classification outcome
pub struct Resolver {
    path: PathResolver,
    subdomain: Option<SubdomainResolver>,
}

impl Resolver {
    /// Build the strategies the configuration calls for
    pub fn from_config(
        config: &GatewayConfig,
        directory: Arc<dyn ServiceDirectory>,
        selector: Arc<dyn RouteSelector>,
    ) -> Self {
        let path = PathResolver::new(
            directory.clone(),
            selector.clone(),
            config.service_prefix.clone(),
        );
        let subdomain = match (config.resolver, config.base_domain()) {
            (ResolverMode::Subdomain, Some(base)) => Some(SubdomainResolver::new(
                directory,
                selector,
                config.service_prefix.clone(),
                base,
            )),
            _ => None,
        };
        Self { path, subdomain }
    }

    /// Resolve with the strategy named by the classifier
    pub async fn resolve(
        &self,
        req: &RouteRequest,
        by: RouteBy,
    ) -> std::result::Result<ResolvedEndpoint, ResolveError> {
        let result = match (by, &self.subdomain) {
            (RouteBy::Subdomain, Some(subdomain)) => subdomain.resolve(req).await,
            (RouteBy::Subdomain, None) => Err(ResolveError::InvalidPath),
            (RouteBy::Path, _) => self.path.resolve(req).await,
        };
        if let Err(e) = &result {
            tracing::debug!(host = %req.host, path = %req.path, by = ?by, error = %e, "Resolution failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryDirectory;

    fn candidate(address: &str) -> RouteCandidate {
        RouteCandidate {
            service: "svc".to_string(),
            address: address.to_string(),
            domain: "*".to_string(),
        }
    }

    pub(crate) struct FailingDirectory;

    #[async_trait]
    impl ServiceDirectory for FailingDirectory {
        async fn lookup(
            &self,
            _name: &str,
            _options: &LookupOptions,
        ) -> std::result::Result<Vec<RouteCandidate>, DirectoryError> {
            Err(DirectoryError::Unavailable("registry down".to_string()))
        }

        async fn list_services(
            &self,
            _options: &LookupOptions,
        ) -> std::result::Result<Vec<String>, DirectoryError> {
            Err(DirectoryError::Unavailable("registry down".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn request(host: &str, path: &str) -> RouteRequest {
        RouteRequest {
            method: "GET".to_string(),
            host: host.to_string(),
            path: path.to_string(),
            namespace: "micro".to_string(),
        }
    }

    #[test]
    fn test_random_selector_empty() {
        assert!(RandomSelector.select(&[]).is_none());
    }

    #[test]
    fn test_random_selector_single() {
        let candidates = vec![candidate("10.0.0.5:8080")];
        assert_eq!(
            RandomSelector.select(&candidates).unwrap().address,
            "10.0.0.5:8080"
        );
    }

    #[test]
    fn test_random_selector_stays_in_bounds() {
        let candidates = vec![candidate("a:1"), candidate("b:1"), candidate("c:1")];
        let mut seen = std::collections::HashSet::new();
        for _ in 0..300 {
            seen.insert(RandomSelector.select(&candidates).unwrap().address.clone());
        }
        assert!(seen.len() > 1);
        assert!(seen.iter().all(|a| ["a:1", "b:1", "c:1"].contains(&a.as_str())));
    }

    #[test]
    fn test_directory_error_mapping() {
        assert_eq!(
            ResolveError::from(DirectoryError::NotFound),
            ResolveError::NotFound
        );
        assert_eq!(
            ResolveError::from(DirectoryError::Unavailable("x".to_string())),
            ResolveError::Directory("x".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolver_dispatches_by_classification() {
        let dir = Arc::new(MemoryDirectory::new());
        dir.register("catalog", "10.0.0.5:8080", "*").await;

        let config = GatewayConfig {
            resolver: ResolverMode::Subdomain,
            base_domain: Some("example.com".to_string()),
            ..Default::default()
        };
        let resolver = Resolver::from_config(&config, dir, Arc::new(RandomSelector));

        let by_path = resolver
            .resolve(&request("example.com", "/catalog/items"), RouteBy::Path)
            .await
            .unwrap();
        assert_eq!(by_path.path, "/items");

        let by_host = resolver
            .resolve(&request("catalog.example.com", "/items"), RouteBy::Subdomain)
            .await
            .unwrap();
        assert_eq!(by_host.name, "catalog");
        assert_eq!(by_host.path, "/items");
    }

    #[tokio::test]
    async fn test_resolver_without_subdomain_strategy() {
        let dir = Arc::new(MemoryDirectory::new());
        let resolver =
            Resolver::from_config(&GatewayConfig::default(), dir, Arc::new(RandomSelector));
        let err = resolver
            .resolve(&request("catalog.example.com", "/"), RouteBy::Subdomain)
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::InvalidPath);
    }

    #[tokio::test]
    async fn test_directory_failure_is_distinct_from_not_found() {
        let resolver = Resolver::from_config(
            &GatewayConfig::default(),
            Arc::new(FailingDirectory),
            Arc::new(RandomSelector),
        );
        let err = resolver
            .resolve(&request("example.com", "/catalog/items"), RouteBy::Path)
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::Directory("registry down".to_string()));
        assert_eq!(err.kind(), "directory");
        assert_eq!(ResolveError::NotFound.kind(), "not_found");
    }
}
