//! Auth configuration - token inspection and access rules

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which token inspector to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InspectorKind {
    /// Every token resolves to an account of the serving namespace
    #[default]
    Noop,
    /// HS256 JSON Web Tokens
    Jwt,
}

/// Whether a rule grants or denies access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessConfig {
    Grant,
    Deny,
}

/// Authentication and authorization settings
///
/// # Example
///
/// ```hcl
/// auth {
///   inspector          = "jwt"
///   secret             = "change-me"
///   private_namespaces = ["acme"]
///   login_url          = "/login"
///
///   rules "admin-only" {
///     scope     = "admin"
///     namespace = "micro"
///     access    = "grant"
///     priority  = 10
///     resource {
///       name     = "micro.web.admin"
///       endpoint = "*"
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Run authentication and authorization before forwarding (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Token inspector implementation
    #[serde(default)]
    pub inspector: InspectorKind,

    /// HMAC secret for the jwt inspector
    #[serde(default)]
    pub secret: Option<String>,

    /// Namespaces that never admit anonymous callers
    #[serde(default)]
    pub private_namespaces: Vec<String>,

    /// Browser requests denied for lack of identity are redirected here
    #[serde(default)]
    pub login_url: Option<String>,

    /// Access rules keyed by rule id
    #[serde(default)]
    pub rules: HashMap<String, RuleConfig>,
}

fn default_true() -> bool {
    true
}

/// A single access rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// "" for public, "*" for any account, otherwise a required scope
    #[serde(default)]
    pub scope: String,

    /// Namespace the rule applies in; "*" for every namespace
    #[serde(default = "wildcard")]
    pub namespace: String,

    /// Resource the rule applies to
    #[serde(default)]
    pub resource: ResourceConfig,

    /// Grant or deny
    pub access: AccessConfig,

    /// Higher priority rules are evaluated first
    #[serde(default)]
    pub priority: i32,
}

/// Resource pattern of a rule; "*" matches anything, a trailing "*" matches a prefix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceConfig {
    #[serde(default = "wildcard", rename = "type")]
    pub resource_type: String,
    #[serde(default = "wildcard")]
    pub name: String,
    #[serde(default = "wildcard")]
    pub endpoint: String,
}

fn wildcard() -> String {
    "*".to_string()
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            resource_type: wildcard(),
            name: wildcard(),
            endpoint: wildcard(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            inspector: InspectorKind::default(),
            secret: None,
            private_namespaces: Vec::new(),
            login_url: None,
            rules: HashMap::new(),
        }
    }
}

impl AuthConfig {
    /// Validate auth settings
    pub fn validate(&self) -> Result<()> {
        if self.inspector == InspectorKind::Jwt
            && self.secret.as_deref().map(str::is_empty).unwrap_or(true)
        {
            return Err(GatewayError::Config(
                "jwt inspector requires a non-empty 'secret'".to_string(),
            ));
        }
        if let Some(url) = &self.login_url {
            if url.is_empty() {
                return Err(GatewayError::Config("login_url cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}
