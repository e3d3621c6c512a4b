//! Namespace-level authorization

use super::{Account, AuthorizeError, NamespaceAuthorizer};
use async_trait::async_trait;
use std::collections::HashSet;

/// Accounts pass in the namespace that issued them. Anonymous callers pass
/// when public access is requested and the namespace is not private.
#[derive(Debug, Clone, Default)]
pub struct NamespacePolicy {
    private: HashSet<String>,
}

impl NamespacePolicy {
    pub fn new<I, S>(private_namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            private: private_namespaces.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_private(&self, namespace: &str) -> bool {
        self.private.contains(namespace)
    }
}

#[async_trait]
impl NamespaceAuthorizer for NamespacePolicy {
    async fn authorize(
        &self,
        account: Option<&Account>,
        namespace: &str,
        public: bool,
    ) -> std::result::Result<(), AuthorizeError> {
        match account {
            Some(acc) if acc.issuer == namespace => Ok(()),
            Some(_) => Err(AuthorizeError::Forbidden),
            None if public && !self.is_private(namespace) => Ok(()),
            None => Err(AuthorizeError::Forbidden),
        }
    }
}
