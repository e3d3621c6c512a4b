//! Authentication and authorization
//!
//! The [`Authenticator`] composes three collaborators:
//! - a [`TokenInspector`] turning a bearer token into an [`Account`]
//! - a [`NamespaceAuthorizer`] guarding tenant boundaries
//! - a [`ResourceAuthorizer`] deciding access to one service endpoint
//!
//! Everything it produces lives in a [`RequestScope`] owned by one request.

mod authenticator;
mod error;
mod inspector;
mod namespace;
mod rules;

pub use authenticator::{Authenticator, BEARER_SCHEME, TOKEN_COOKIE};
pub use error::AuthError;
pub use inspector::{Claims, JwtInspector, NoopInspector};
pub use namespace::NamespacePolicy;
pub use rules::{Access, Rule, RuleVerifier};

use crate::router::ResolvedEndpoint;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Resource type of every dispatched call
pub const SERVICE_RESOURCE: &str = "service";

/// An authenticated identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// Namespace that issued the account
    pub issuer: String,
    /// Scopes granted to the account
    #[serde(default)]
    pub scopes: Vec<String>,
    /// "user", "service", ...
    #[serde(default, rename = "type")]
    pub account_type: String,
}

impl Account {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// The (service, endpoint) pair a call is authorized against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub resource_type: String,
    pub name: String,
    pub endpoint: String,
}

impl Resource {
    /// Resource of a resolved service call; the endpoint is the service-relative path
    pub fn service(endpoint: &ResolvedEndpoint) -> Self {
        Self {
            resource_type: SERVICE_RESOURCE.to_string(),
            name: endpoint.name.clone(),
            endpoint: endpoint.path.clone(),
        }
    }
}

/// Per-request state threaded through the dispatch pipeline
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    /// Namespace the request is served under
    pub namespace: String,
    /// Account visible to downstream handlers
    pub account: Option<Account>,
    /// Account used for authorization decisions
    pub trusted: Option<Account>,
    /// Endpoint resolved before authorization, reused by the director
    pub endpoint: Option<ResolvedEndpoint>,
}

impl RequestScope {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: ResolvedEndpoint) -> Self {
        self.endpoint = Some(endpoint);
        self
    }
}

/// Token inspection failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InspectError {
    #[error("no token supplied")]
    Missing,
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Authorization collaborator failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizeError {
    #[error("forbidden")]
    Forbidden,
    #[error("{0}")]
    Internal(String),
}

/// Turns a raw token, possibly empty, into an account
#[async_trait]
pub trait TokenInspector: Send + Sync {
    async fn inspect(&self, token: &str) -> std::result::Result<Account, InspectError>;
}

/// Guards namespace boundaries; `public` admits anonymous callers
#[async_trait]
pub trait NamespaceAuthorizer: Send + Sync {
    async fn authorize(
        &self,
        account: Option<&Account>,
        namespace: &str,
        public: bool,
    ) -> std::result::Result<(), AuthorizeError>;
}

/// Decides access of an account, or an anonymous caller, to one resource
#[async_trait]
pub trait ResourceAuthorizer: Send + Sync {
    async fn verify(
        &self,
        account: Option<&Account>,
        resource: &Resource,
        namespace: &str,
    ) -> std::result::Result<(), AuthorizeError>;
}
