//! Configuration types for the dispatcher
//!
//! One immutable configuration value is built at startup and shared by
//! reference with every component. Uses HCL (HashiCorp Configuration
//! Language) as the file format.

mod auth;
mod directory;

pub use auth::{AccessConfig, AuthConfig, InspectorKind, ResourceConfig, RuleConfig};
pub use directory::{
    DirectoryConfig, DiscoveryConfig, DiscoverySeedConfig, StaticServiceConfig, WILDCARD_DOMAIN,
};

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{GatewayError, Result};

/// Namespace every deployment falls back to
pub const DEFAULT_NAMESPACE: &str = "micro";

/// How the target service name is derived from a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResolverMode {
    /// First path segment names the service: `/catalog/items`
    #[default]
    Path,
    /// Left-most host label names the service: `catalog.example.com`
    Subdomain,
}

impl std::fmt::Display for ResolverMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Subdomain => write!(f, "subdomain"),
        }
    }
}

impl std::str::FromStr for ResolverMode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "path" => Ok(Self::Path),
            "subdomain" => Ok(Self::Subdomain),
            other => Err(GatewayError::Config(format!(
                "Unknown resolver '{}' (expected 'path' or 'subdomain')",
                other
            ))),
        }
    }
}

/// Which classification rule wins when a tenant host also qualifies for
/// subdomain routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HostPrecedence {
    /// A foreign namespace forces path routing before subdomain routing is considered
    #[default]
    Namespace,
    /// Subdomain routing is considered before the foreign-namespace rule
    Subdomain,
}

/// Top-level dispatcher configuration
///
/// # HCL Example
///
/// ```hcl
/// address   = "0.0.0.0:8082"
/// namespace = "micro"
/// resolver  = "path"
///
/// directory {
///   services "micro.web.catalog" {
///     addresses = ["10.0.0.5:8080"]
///   }
/// }
///
/// auth {
///   inspector = "jwt"
///   secret    = "change-me"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Public listener address in "host:port" format
    #[serde(default = "default_address")]
    pub address: String,

    /// Namespace this instance serves
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Service type suffix (the dashboard lives at `<namespace>.<type>`)
    #[serde(default = "default_service_type", rename = "type")]
    pub service_type: String,

    /// Resolution strategy
    #[serde(default)]
    pub resolver: ResolverMode,

    /// Prefix joined with `.` in front of every resolved service name
    #[serde(default)]
    pub service_prefix: Option<String>,

    /// Hostname the dashboard is served on
    #[serde(default)]
    pub dashboard_host: Option<String>,

    /// Canonical base domain used for subdomain routing and tenant hosts
    #[serde(default)]
    pub base_domain: Option<String>,

    /// Header carrying the resolved service's base path to the backend
    #[serde(default = "default_base_path_header")]
    pub base_path_header: String,

    /// Precedence between tenant hosts and subdomain routing
    #[serde(default)]
    pub host_precedence: HostPrecedence,

    /// Upstream request timeout in seconds (default: 30)
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Service directory sources
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Authentication and authorization
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_address() -> String {
    "0.0.0.0:80".to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_service_type() -> String {
    "web".to_string()
}

fn default_base_path_header() -> String {
    "X-Micro-Web-Base-Path".to_string()
}

fn default_upstream_timeout() -> u64 {
    30
}

impl GatewayConfig {
    /// Load configuration from an HCL file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            GatewayError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_hcl(&content)
    }

    /// Parse configuration from an HCL string
    pub fn from_hcl(content: &str) -> Result<Self> {
        hcl::from_str(content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse HCL config: {}", e)))
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<()> {
        self.address.parse::<SocketAddr>().map_err(|e| {
            GatewayError::Config(format!("Invalid address '{}': {}", self.address, e))
        })?;

        if self.namespace.trim().is_empty() {
            return Err(GatewayError::Config("namespace cannot be empty".to_string()));
        }
        if self.service_type.trim().is_empty() {
            return Err(GatewayError::Config("type cannot be empty".to_string()));
        }

        if let Some(prefix) = &self.service_prefix {
            if prefix.is_empty() || prefix.contains('/') {
                return Err(GatewayError::Config(format!(
                    "Invalid service_prefix '{}'",
                    prefix
                )));
            }
        }

        if self.resolver == ResolverMode::Subdomain && self.base_domain().is_none() {
            return Err(GatewayError::Config(
                "subdomain resolver requires 'base_domain'".to_string(),
            ));
        }

        http::HeaderName::from_bytes(self.base_path_header.as_bytes()).map_err(|e| {
            GatewayError::Config(format!(
                "Invalid base_path_header '{}': {}",
                self.base_path_header, e
            ))
        })?;

        self.directory.validate()?;
        self.auth.validate()?;

        Ok(())
    }

    /// The `<namespace>.<type>` name the dashboard answers to
    pub fn dashboard_namespace(&self) -> String {
        format!("{}.{}", self.namespace, self.service_type)
    }

    /// Non-empty base domain, lowercased and without a leading dot
    pub fn base_domain(&self) -> Option<String> {
        self.base_domain
            .as_deref()
            .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
    }

    /// Non-empty dashboard host override
    pub fn dashboard_host(&self) -> Option<&str> {
        self.dashboard_host.as_deref().filter(|h| !h.is_empty())
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            namespace: default_namespace(),
            service_type: default_service_type(),
            resolver: ResolverMode::default(),
            service_prefix: None,
            dashboard_host: None,
            base_domain: None,
            base_path_header: default_base_path_header(),
            host_precedence: HostPrecedence::default(),
            upstream_timeout_secs: default_upstream_timeout(),
            directory: DirectoryConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}
