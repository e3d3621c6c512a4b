//! Request classifier - dashboard or remote service
//!
//! Classification never fails. Every indeterminate case is served by the
//! local dashboard rather than forwarded.

use super::host::{is_ip_literal, reverse_labels, subdomain_of, tenant_of};
use crate::config::{GatewayConfig, HostPrecedence, ResolverMode};

/// Internal informational paths handled by the dashboard
pub const SERVICE_INFO_PREFIX: &str = "/service/";

/// How a remote request is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteBy {
    Path,
    Subdomain,
}

/// Where a request goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Dashboard,
    Service(RouteBy),
}

/// Classification outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Effective host, lowercase, no port; empty when none could be determined
    pub host: String,
    /// Namespace the request belongs to
    pub namespace: String,
    pub target: Target,
}

impl Classification {
    pub fn is_dashboard(&self) -> bool {
        self.target == Target::Dashboard
    }
}

/// Classifier built from the immutable configuration
#[derive(Debug, Clone)]
pub struct Classifier {
    namespace: String,
    dashboard_namespace: String,
    dashboard_host: Option<String>,
    base_domain: Option<String>,
    mode: ResolverMode,
    precedence: HostPrecedence,
}

impl Classifier {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            dashboard_namespace: config.dashboard_namespace(),
            dashboard_host: config.dashboard_host().map(str::to_ascii_lowercase),
            base_domain: config.base_domain(),
            mode: config.resolver,
            precedence: config.host_precedence,
        }
    }

    /// Namespace of a request: the tenant of `<svc>.<tenant>.<base>`, else the serving one
    pub fn namespace_of(&self, host: &str) -> String {
        self.base_domain
            .as_deref()
            .and_then(|base| tenant_of(host, base))
            .unwrap_or_else(|| self.namespace.clone())
    }

    /// Classify a request by its normalized host and path
    pub fn classify(&self, host: Option<&str>, path: &str) -> Classification {
        let host = host.unwrap_or_default();
        let namespace = self.namespace_of(host);
        let target = self.target(host, &namespace, path);
        Classification {
            host: host.to_string(),
            namespace,
            target,
        }
    }

    fn target(&self, host: &str, namespace: &str, path: &str) -> Target {
        if host.is_empty()
            || self.dashboard_host.as_deref() == Some(host)
            || is_ip_literal(host)
            || reverse_labels(host) == self.dashboard_namespace
            || path.starts_with(SERVICE_INFO_PREFIX)
        {
            return Target::Dashboard;
        }

        if self.mode == ResolverMode::Path {
            return if path == "/" || path.is_empty() {
                Target::Dashboard
            } else {
                Target::Service(RouteBy::Path)
            };
        }

        let foreign = namespace != self.namespace;
        let subdomain = self
            .base_domain
            .as_deref()
            .and_then(|base| subdomain_of(host, base))
            .is_some();

        let decided = match self.precedence {
            HostPrecedence::Namespace if foreign => Some(RouteBy::Path),
            HostPrecedence::Namespace if subdomain => Some(RouteBy::Subdomain),
            HostPrecedence::Subdomain if subdomain => Some(RouteBy::Subdomain),
            HostPrecedence::Subdomain if foreign => Some(RouteBy::Path),
            _ => None,
        };
        if let Some(by) = decided {
            return Target::Service(by);
        }

        if path.matches('/').count() == 1 {
            Target::Dashboard
        } else {
            Target::Service(RouteBy::Path)
        }
    }
}
