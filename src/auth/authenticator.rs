//! Authenticator - credential extraction, account binding and authorization

use super::{
    AuthError, AuthorizeError, JwtInspector, NamespaceAuthorizer, NamespacePolicy, NoopInspector,
    RequestScope, Resource, ResourceAuthorizer, RuleVerifier, TokenInspector,
};
use crate::config::{GatewayConfig, InspectorKind, DEFAULT_NAMESPACE};
use crate::error::{GatewayError, Result};
use crate::router::ResolvedEndpoint;
use http::header::{AUTHORIZATION, COOKIE};
use http::HeaderMap;
use std::sync::Arc;

/// Required prefix of the Authorization header
pub const BEARER_SCHEME: &str = "Bearer ";
/// Cookie carrying the dashboard session token
pub const TOKEN_COOKIE: &str = "micro-token";

pub struct Authenticator {
    inspector: Arc<dyn TokenInspector>,
    namespaces: Arc<dyn NamespaceAuthorizer>,
    resources: Arc<dyn ResourceAuthorizer>,
}

impl Authenticator {
    pub fn new(
        inspector: Arc<dyn TokenInspector>,
        namespaces: Arc<dyn NamespaceAuthorizer>,
        resources: Arc<dyn ResourceAuthorizer>,
    ) -> Self {
        Self {
            inspector,
            namespaces,
            resources,
        }
    }

    /// Build the configured inspector, namespace policy and rule set
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let inspector: Arc<dyn TokenInspector> = match config.auth.inspector {
            InspectorKind::Noop => Arc::new(NoopInspector::new(config.namespace.clone())),
            InspectorKind::Jwt => {
                let secret = config.auth.secret.as_deref().ok_or_else(|| {
                    GatewayError::Config("jwt inspector requires 'secret'".to_string())
                })?;
                Arc::new(JwtInspector::from_secret(secret)?)
            }
        };
        let rules = RuleVerifier::from_config(&config.auth);
        tracing::debug!(
            inspector = ?config.auth.inspector,
            rules = rules.len(),
            private = config.auth.private_namespaces.len(),
            "Authenticator configured"
        );
        Ok(Self::new(
            inspector,
            Arc::new(NamespacePolicy::new(config.auth.private_namespaces.clone())),
            Arc::new(rules),
        ))
    }

    /// Raw token of a request: the Bearer header, else the session cookie, else ""
    ///
    /// A present Authorization header with any other scheme is rejected.
    pub fn extract_token(headers: &HeaderMap, id: &str) -> std::result::Result<String, AuthError> {
        if let Some(value) = headers.get(AUTHORIZATION) {
            let value = value.to_str().unwrap_or_default();
            return match value.strip_prefix(BEARER_SCHEME) {
                Some(token) => Ok(token.to_string()),
                None => Err(AuthError::unauthorized(
                    id,
                    "invalid authorization header. expected Bearer schema",
                )),
            };
        }
        Ok(token_cookie(headers).unwrap_or_default())
    }

    /// Inspect the token and bind the account into a fresh scope
    ///
    /// The account is trusted only when its issuer is the serving namespace.
    /// In the default namespace a foreign account is still attached, untrusted.
    pub async fn authenticate(&self, token: &str, namespace: &str) -> RequestScope {
        let mut scope = RequestScope::new(namespace);
        match self.inspector.inspect(token).await {
            Ok(acc) if acc.issuer == namespace => {
                scope.trusted = Some(acc.clone());
                scope.account = Some(acc);
            }
            Ok(acc) if namespace == DEFAULT_NAMESPACE => {
                scope.account = Some(acc);
            }
            Ok(acc) => {
                tracing::debug!(account = %acc.id, issuer = %acc.issuer, namespace, "Ignoring foreign account");
            }
            Err(e) => {
                tracing::trace!(error = %e, "Token inspection failed");
            }
        }
        scope
    }

    /// Authorize the scope's trusted account against the namespace and the endpoint
    pub async fn authorize(
        &self,
        scope: &RequestScope,
        endpoint: &ResolvedEndpoint,
    ) -> std::result::Result<(), AuthError> {
        let id = endpoint.name.as_str();
        let trusted = scope.trusted.as_ref();

        match self.namespaces.authorize(trusted, &scope.namespace, true).await {
            Ok(()) => {}
            Err(AuthorizeError::Forbidden) if trusted.is_some() => {
                return Err(AuthError::forbidden(id, "forbidden namespace"));
            }
            Err(AuthorizeError::Forbidden) => {
                return Err(AuthError::unauthorized(
                    id,
                    format!("Unauthorized call made to namespace {}", scope.namespace),
                ));
            }
            Err(AuthorizeError::Internal(e)) => {
                return Err(AuthError::internal(id, e));
            }
        }

        let resource = Resource::service(endpoint);
        match self.resources.verify(trusted, &resource, &scope.namespace).await {
            Ok(()) => Ok(()),
            Err(AuthorizeError::Forbidden) => match trusted {
                Some(acc) => Err(AuthError::forbidden(
                    id,
                    format!(
                        "Forbidden call made to {}:{} by {}",
                        resource.name, resource.endpoint, acc.id
                    ),
                )),
                None => Err(AuthError::unauthorized(
                    id,
                    format!(
                        "Unauthorized call made to {}:{}",
                        resource.name, resource.endpoint
                    ),
                )),
            },
            Err(AuthorizeError::Internal(e)) => Err(AuthError::internal(
                id,
                format!("Error authorizing request: {}", e),
            )),
        }
    }

    /// Authenticate and authorize; the returned scope carries the endpoint
    pub async fn check(
        &self,
        token: &str,
        namespace: &str,
        endpoint: ResolvedEndpoint,
    ) -> std::result::Result<RequestScope, AuthError> {
        let scope = self.authenticate(token, namespace).await;
        self.authorize(&scope, &endpoint).await?;
        Ok(scope.with_endpoint(endpoint))
    }
}

fn token_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.to_string())
}
