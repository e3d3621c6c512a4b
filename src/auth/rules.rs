//! Rule-based resource authorization
//!
//! Only rules whose namespace pattern covers the request namespace take
//! part. They are evaluated by descending priority; the first rule whose
//! resource pattern matches and whose scope applies to the caller decides.
//! Scope `""` applies to everybody, `"*"` to any account, anything else to
//! accounts carrying that scope. No deciding rule means forbidden.

use super::{Account, AuthorizeError, Resource, ResourceAuthorizer};
use crate::config::{AccessConfig, AuthConfig, ResourceConfig};
use async_trait::async_trait;

/// Scope that applies to anonymous callers too
pub const SCOPE_PUBLIC: &str = "";
/// Scope that applies to every account
pub const SCOPE_ACCOUNT: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Grant,
    Deny,
}

impl From<AccessConfig> for Access {
    fn from(access: AccessConfig) -> Self {
        match access {
            AccessConfig::Grant => Self::Grant,
            AccessConfig::Deny => Self::Deny,
        }
    }
}

/// A compiled access rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub scope: String,
    /// Namespace pattern, `*` for all
    pub namespace: String,
    pub resource_type: String,
    pub name: String,
    pub endpoint: String,
    pub access: Access,
    pub priority: i32,
}

impl Rule {
    pub fn new(id: &str, scope: &str, resource: &ResourceConfig, access: Access, priority: i32) -> Self {
        Self {
            id: id.to_string(),
            scope: scope.to_string(),
            namespace: "*".to_string(),
            resource_type: resource.resource_type.clone(),
            name: resource.name.clone(),
            endpoint: resource.endpoint.clone(),
            access,
            priority,
        }
    }

    /// Restrict the rule to namespaces matching `pattern`
    pub fn in_namespace(mut self, pattern: &str) -> Self {
        self.namespace = pattern.to_string();
        self
    }

    fn covers(&self, namespace: &str) -> bool {
        pattern_matches(&self.namespace, namespace)
    }

    fn matches(&self, resource: &Resource) -> bool {
        pattern_matches(&self.resource_type, &resource.resource_type)
            && pattern_matches(&self.name, &resource.name)
            && pattern_matches(&self.endpoint, &resource.endpoint)
    }

    fn applies_to(&self, account: Option<&Account>) -> bool {
        match (self.scope.as_str(), account) {
            (SCOPE_PUBLIC, _) => true,
            (_, None) => false,
            (SCOPE_ACCOUNT, Some(_)) => true,
            (scope, Some(acc)) => acc.has_scope(scope),
        }
    }
}

/// `*` matches anything, a trailing `*` matches a prefix
fn pattern_matches(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}

/// Rule set verifier
#[derive(Debug, Clone, Default)]
pub struct RuleVerifier {
    rules: Vec<Rule>,
}

impl RuleVerifier {
    /// Build from rules; order of the input does not matter
    pub fn new(mut rules: Vec<Rule>) -> Self {
        // stable order for equal priorities
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Self { rules }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config
                .rules
                .iter()
                .map(|(id, rule)| {
                    Rule::new(id, &rule.scope, &rule.resource, rule.access.into(), rule.priority)
                        .in_namespace(&rule.namespace)
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[async_trait]
impl ResourceAuthorizer for RuleVerifier {
    async fn verify(
        &self,
        account: Option<&Account>,
        resource: &Resource,
        namespace: &str,
    ) -> std::result::Result<(), AuthorizeError> {
        let mut rules = self.rules.iter().filter(|rule| rule.covers(namespace)).peekable();

        // no rules for this namespace: any account, none for anonymous callers
        if rules.peek().is_none() {
            return match account {
                Some(_) => Ok(()),
                None => Err(AuthorizeError::Forbidden),
            };
        }

        let decision = rules.find(|rule| rule.matches(resource) && rule.applies_to(account));

        match decision {
            Some(rule) => {
                tracing::debug!(
                    rule = %rule.id,
                    namespace,
                    service = %resource.name,
                    endpoint = %resource.endpoint,
                    access = ?rule.access,
                    "Rule matched"
                );
                match rule.access {
                    Access::Grant => Ok(()),
                    Access::Deny => Err(AuthorizeError::Forbidden),
                }
            }
            None => Err(AuthorizeError::Forbidden),
        }
    }
}
