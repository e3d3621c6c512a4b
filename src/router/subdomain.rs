//! Subdomain-based resolution - the host label in front of the base domain
//! names the service

use super::host::subdomain_of;
use super::path::service_name_regex;
use super::{EndpointResolver, Lookup, ResolveError, ResolvedEndpoint, RouteRequest, RouteSelector};
use crate::provider::ServiceDirectory;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

/// Resolves `<service>.<base_domain>/<path>` to service `<prefix>.<service>` at `/<path>`
pub struct SubdomainResolver {
    lookup: Lookup,
    base_domain: String,
    name_pattern: Regex,
}

impl SubdomainResolver {
    pub fn new(
        directory: Arc<dyn ServiceDirectory>,
        selector: Arc<dyn RouteSelector>,
        prefix: Option<String>,
        base_domain: String,
    ) -> Self {
        Self {
            lookup: Lookup::new(directory, selector, prefix),
            base_domain,
            name_pattern: service_name_regex(),
        }
    }

    /// Service label of a host under the base domain
    pub fn service_name<'a>(&self, host: &'a str) -> std::result::Result<&'a str, ResolveError> {
        let labels = subdomain_of(host, &self.base_domain).ok_or(ResolveError::InvalidPath)?;
        // only the left-most label names the service
        let name = labels.split('.').next().unwrap_or(labels);
        if !self.name_pattern.is_match(name) {
            return Err(ResolveError::InvalidPath);
        }
        Ok(name)
    }
}

#[async_trait]
impl EndpointResolver for SubdomainResolver {
    async fn resolve(&self, req: &RouteRequest) -> std::result::Result<ResolvedEndpoint, ResolveError> {
        let name = self.service_name(&req.host)?;
        let path = if req.path.starts_with('/') {
            req.path.clone()
        } else {
            format!("/{}", req.path)
        };
        self.lookup.endpoint(req, name, path).await
    }

    fn name(&self) -> &'static str {
        "subdomain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryDirectory;
    use crate::router::RandomSelector;

    fn resolver(dir: Arc<MemoryDirectory>, prefix: Option<&str>) -> SubdomainResolver {
        SubdomainResolver::new(
            dir,
            Arc::new(RandomSelector),
            prefix.map(String::from),
            "example.com".to_string(),
        )
    }

    fn request(host: &str, path: &str) -> RouteRequest {
        RouteRequest {
            method: "POST".to_string(),
            host: host.to_string(),
            path: path.to_string(),
            namespace: "micro".to_string(),
        }
    }

    #[tokio::test]
    async fn test_resolve_by_subdomain() {
        let dir = Arc::new(MemoryDirectory::new());
        dir.register("catalog", "10.0.0.5:8080", "*").await;

        let ep = resolver(dir, None)
            .resolve(&request("catalog.example.com", "/items/1"))
            .await
            .unwrap();
        assert_eq!(ep.name, "catalog");
        assert_eq!(ep.path, "/items/1");
        assert_eq!(ep.method, "POST");
        assert_eq!(ep.host, "10.0.0.5:8080");
    }

    #[tokio::test]
    async fn test_resolve_applies_prefix() {
        let dir = Arc::new(MemoryDirectory::new());
        dir.register("micro.web.catalog", "10.0.0.5:8080", "*").await;

        let ep = resolver(dir, Some("micro.web"))
            .resolve(&request("catalog.example.com", ""))
            .await
            .unwrap();
        assert_eq!(ep.name, "micro.web.catalog");
        assert_eq!(ep.path, "/");
    }

    #[test]
    fn test_service_name() {
        let r = resolver(Arc::new(MemoryDirectory::new()), None);
        assert_eq!(r.service_name("catalog.example.com").unwrap(), "catalog");
        assert_eq!(r.service_name("catalog.acme.example.com").unwrap(), "catalog");
        assert_eq!(
            r.service_name("example.com").unwrap_err(),
            ResolveError::InvalidPath
        );
        assert_eq!(
            r.service_name("catalog.other.org").unwrap_err(),
            ResolveError::InvalidPath
        );
        assert_eq!(
            r.service_name("-bad.example.com").unwrap_err(),
            ResolveError::InvalidPath
        );
    }

    #[tokio::test]
    async fn test_unknown_subdomain_is_not_found() {
        let r = resolver(Arc::new(MemoryDirectory::new()), None);
        assert_eq!(
            r.resolve(&request("missing.example.com", "/")).await.unwrap_err(),
            ResolveError::NotFound
        );
    }
}
