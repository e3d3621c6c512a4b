//! Reverse-proxy director
//!
//! Turns a resolved endpoint into the target of the internal hop, or
//! neutralizes the request when there is nothing to forward to.

use crate::router::{ResolveError, ResolvedEndpoint, Resolver, RouteBy, RouteRequest};
use std::sync::Arc;

/// Where and how a request is forwarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardTarget {
    /// Full upstream URL, always plain http
    pub url: String,
    /// Authority of the upstream, also sent as `Host`
    pub host: String,
    /// Value of the base-path header: `/` + resolved service name
    pub base_path: String,
    /// Resolved service name
    pub service: String,
}

/// Outcome of directing one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Direction {
    Forward(ForwardTarget),
    /// Nothing is forwarded; the transport renders a clean failure
    Neutralized(ResolveError),
}

impl Direction {
    /// Rewrite a resolved endpoint into a forward target, keeping the query
    pub fn to_endpoint(endpoint: &ResolvedEndpoint, query: Option<&str>) -> Self {
        if endpoint.host.is_empty() {
            return Self::Neutralized(ResolveError::NotFound);
        }
        let mut url = format!("http://{}{}", endpoint.host, endpoint.path);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }
        Self::Forward(ForwardTarget {
            url,
            host: endpoint.host.clone(),
            base_path: format!("/{}", endpoint.name),
            service: endpoint.name.clone(),
        })
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, Self::Forward(_))
    }
}

/// Director bound to the resolver it falls back on
pub struct Director {
    resolver: Arc<Resolver>,
}

impl Director {
    pub fn new(resolver: Arc<Resolver>) -> Self {
        Self { resolver }
    }

    /// Direct a request, reusing an endpoint resolved earlier in the pipeline
    pub async fn direct(
        &self,
        cached: Option<&ResolvedEndpoint>,
        req: &RouteRequest,
        by: RouteBy,
        query: Option<&str>,
    ) -> Direction {
        if let Some(endpoint) = cached {
            return Direction::to_endpoint(endpoint, query);
        }
        match self.resolver.resolve(req, by).await {
            Ok(endpoint) => Direction::to_endpoint(&endpoint, query),
            Err(e) => {
                tracing::warn!(host = %req.host, path = %req.path, error = %e, "Failed to resolve url");
                Direction::Neutralized(e)
            }
        }
    }
}
