//! Directory configuration - statically registered services and discovery seeds

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Matches lookups in every domain
pub const WILDCARD_DOMAIN: &str = "*";

/// Service directory sources
///
/// # Example
///
/// ```hcl
/// directory {
///   services "micro.web.catalog" {
///     addresses = ["10.0.0.5:8080"]
///     domain    = "micro"
///   }
///   discovery {
///     poll_interval_secs = 15
///     seeds = [
///       { url = "http://10.0.0.7:9000" }
///     ]
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Statically registered services: name -> instances
    #[serde(default)]
    pub services: HashMap<String, StaticServiceConfig>,

    /// Health-based discovery of service instances
    #[serde(default)]
    pub discovery: Option<DiscoveryConfig>,
}

/// A statically registered service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticServiceConfig {
    /// Instance addresses in "host:port" format
    pub addresses: Vec<String>,

    /// Domain the instances are registered in (default: "*")
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Endpoints the service exposes, shown by the dashboard
    #[serde(default)]
    pub endpoints: Vec<String>,
}

fn default_domain() -> String {
    WILDCARD_DOMAIN.to_string()
}

/// Discovery provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Seed URLs to probe for service metadata
    pub seeds: Vec<DiscoverySeedConfig>,

    /// Polling interval in seconds (default: 30)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// HTTP timeout per probe in seconds (default: 5)
    #[serde(default = "default_discovery_timeout")]
    pub timeout_secs: u64,
}

/// A single discovery seed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySeedConfig {
    /// Base URL of the instance, e.g. "http://10.0.0.5:8080"
    pub url: String,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_discovery_timeout() -> u64 {
    5
}

impl DirectoryConfig {
    /// Validate directory sources
    pub fn validate(&self) -> Result<()> {
        for (name, svc) in &self.services {
            if name.is_empty() {
                return Err(GatewayError::Config(
                    "directory service name cannot be empty".to_string(),
                ));
            }
            if svc.addresses.is_empty() {
                return Err(GatewayError::Config(format!(
                    "Service '{}' has no addresses configured",
                    name
                )));
            }
            if let Some(bad) = svc.addresses.iter().find(|a| !a.contains(':')) {
                return Err(GatewayError::Config(format!(
                    "Service '{}': address '{}' must be host:port",
                    name, bad
                )));
            }
        }

        if let Some(discovery) = &self.discovery {
            if discovery.poll_interval_secs == 0 {
                return Err(GatewayError::Config(
                    "discovery poll_interval_secs must be positive".to_string(),
                ));
            }
            if let Some(seed) = discovery
                .seeds
                .iter()
                .find(|s| !s.url.starts_with("http://") && !s.url.starts_with("https://"))
            {
                return Err(GatewayError::Config(format!(
                    "Discovery seed '{}' must be an http(s) URL",
                    seed.url
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(addresses: &[&str]) -> StaticServiceConfig {
        StaticServiceConfig {
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
            domain: default_domain(),
            endpoints: Vec::new(),
        }
    }

    #[test]
    fn test_directory_default_empty() {
        let config = DirectoryConfig::default();
        assert!(config.services.is_empty());
        assert!(config.discovery.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_addresses() {
        let mut config = DirectoryConfig::default();
        config.services.insert("catalog".to_string(), service(&[]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_address_without_port() {
        let mut config = DirectoryConfig::default();
        config.services.insert("catalog".to_string(), service(&["10.0.0.5"]));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("host:port"));
    }

    #[test]
    fn test_discovery_defaults_in_hcl() {
        let hcl = r#"
            seeds = [
                { url = "http://localhost:9000" }
            ]
        "#;
        let disc: DiscoveryConfig = hcl::from_str(hcl).unwrap();
        assert_eq!(disc.poll_interval_secs, 30);
        assert_eq!(disc.timeout_secs, 5);
    }

    #[test]
    fn test_validate_discovery_seed_scheme() {
        let config = DirectoryConfig {
            services: HashMap::new(),
            discovery: Some(DiscoveryConfig {
                seeds: vec![DiscoverySeedConfig {
                    url: "10.0.0.5:8080".to_string(),
                }],
                poll_interval_secs: 30,
                timeout_secs: 5,
            }),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_static_service_default_domain() {
        let hcl = r#"
            addresses = ["10.0.0.5:8080"]
        "#;
        let svc: StaticServiceConfig = hcl::from_str(hcl).unwrap();
        assert_eq!(svc.domain, WILDCARD_DOMAIN);
        assert!(svc.endpoints.is_empty());
    }
}
