//! Token inspectors
//!
//! - `jwt`: HS256 JSON Web Tokens, `exp` required
//! - `noop`: every token, the empty one included, is a serving-namespace account

use super::{Account, InspectError, TokenInspector};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by dispatcher tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    #[serde(default)]
    pub sub: String,
    /// Expiration time (UTC timestamp)
    #[serde(default)]
    pub exp: u64,
    /// Issuing namespace
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, rename = "type")]
    pub account_type: String,
}

impl From<Claims> for Account {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            issuer: claims.iss,
            scopes: claims.scopes,
            account_type: claims.account_type,
        }
    }
}

/// HS256 JWT inspector
pub struct JwtInspector {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtInspector {
    pub fn from_secret(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(GatewayError::Config(
                "JWT secret cannot be empty".to_string(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // issuer is checked against the namespace by the authenticator
        validation.validate_aud = false;
        validation.required_spec_claims = ["exp"].iter().map(|s| s.to_string()).collect();

        Ok(Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Decode and validate a token
    pub fn validate_token(&self, token: &str) -> std::result::Result<Claims, InspectError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| InspectError::Invalid(e.to_string()))
    }
}

#[async_trait]
impl TokenInspector for JwtInspector {
    async fn inspect(&self, token: &str) -> std::result::Result<Account, InspectError> {
        if token.is_empty() {
            return Err(InspectError::Missing);
        }
        let claims = self.validate_token(token)?;
        if claims.sub.is_empty() {
            return Err(InspectError::Invalid("missing subject".to_string()));
        }
        Ok(claims.into())
    }
}

/// Accepts anything as an account of one issuer
pub struct NoopInspector {
    issuer: String,
}

impl NoopInspector {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }
}

#[async_trait]
impl TokenInspector for NoopInspector {
    async fn inspect(&self, token: &str) -> std::result::Result<Account, InspectError> {
        let id = if token.is_empty() { "anonymous" } else { token };
        Ok(Account {
            id: id.to_string(),
            issuer: self.issuer.clone(),
            scopes: Vec::new(),
            account_type: "user".to_string(),
        })
    }
}
