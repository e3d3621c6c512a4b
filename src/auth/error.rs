//! Wire-facing authorization errors

use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Terminal authentication / authorization outcome for a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No identity, or not enough of one
    #[error("{detail}")]
    Unauthorized { id: String, detail: String },
    /// Identity present but denied
    #[error("{detail}")]
    Forbidden { id: String, detail: String },
    /// An authorization collaborator failed
    #[error("{detail}")]
    InternalServerError { id: String, detail: String },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    id: &'a str,
    code: u16,
    detail: &'a str,
    status: &'a str,
}

impl AuthError {
    pub fn unauthorized(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Unauthorized {
            id: id.into(),
            detail: detail.into(),
        }
    }

    pub fn forbidden(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Forbidden {
            id: id.into(),
            detail: detail.into(),
        }
    }

    pub fn internal(id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InternalServerError {
            id: id.into(),
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Unauthorized { id, .. }
            | Self::Forbidden { id, .. }
            | Self::InternalServerError { id, .. } => id,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::Unauthorized { detail, .. }
            | Self::Forbidden { detail, .. }
            | Self::InternalServerError { detail, .. } => detail,
        }
    }

    /// JSON body: `{"id", "code", "detail", "status"}`
    pub fn to_json(&self) -> Vec<u8> {
        let status = self.status();
        let body = ErrorBody {
            id: self.id(),
            code: status.as_u16(),
            detail: self.detail(),
            status: status.canonical_reason().unwrap_or_default(),
        };
        serde_json::to_vec(&body).unwrap_or_default()
    }
}
