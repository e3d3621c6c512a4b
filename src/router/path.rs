//! Path-based resolution - the first path segment names the service

use super::{EndpointResolver, Lookup, ResolveError, ResolvedEndpoint, RouteRequest, RouteSelector};
use crate::provider::ServiceDirectory;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

/// Alphanumeric labels joined by single hyphens
pub(crate) const SERVICE_NAME_PATTERN: &str = r"^[a-zA-Z0-9]+(-[a-zA-Z0-9]+)*$";

pub(crate) fn service_name_regex() -> Regex {
    Regex::new(SERVICE_NAME_PATTERN).expect("service name pattern is a valid regex")
}

/// Resolves `/<service>/<rest>` to service `<prefix>.<service>` at path `/<rest>`
pub struct PathResolver {
    lookup: Lookup,
    name_pattern: Regex,
}

impl PathResolver {
    pub fn new(
        directory: Arc<dyn ServiceDirectory>,
        selector: Arc<dyn RouteSelector>,
        prefix: Option<String>,
    ) -> Self {
        Self {
            lookup: Lookup::new(directory, selector, prefix),
            name_pattern: service_name_regex(),
        }
    }

    /// Split a path into the service segment and the rewritten remainder
    pub fn split<'a>(&self, path: &'a str) -> std::result::Result<(&'a str, String), ResolveError> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() < 2 {
            return Err(ResolveError::InvalidPath);
        }
        let name = parts[1];
        if !self.name_pattern.is_match(name) {
            return Err(ResolveError::InvalidPath);
        }
        Ok((name, format!("/{}", parts[2..].join("/"))))
    }
}

#[async_trait]
impl EndpointResolver for PathResolver {
    async fn resolve(&self, req: &RouteRequest) -> std::result::Result<ResolvedEndpoint, ResolveError> {
        let (name, path) = self.split(&req.path)?;
        self.lookup.endpoint(req, name, path).await
    }

    fn name(&self) -> &'static str {
        "path"
    }
}
