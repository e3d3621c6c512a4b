//! # Web Dispatch
//!
//! A dynamic request dispatcher for a microservice web tier. Each inbound
//! HTTP request is either served by the local dashboard or resolved to a
//! live service instance through the service directory, authenticated,
//! authorized and reverse-proxied to it.
//!
//! ## Architecture
//!
//! ```text
//! Entrypoint → Classifier → Resolver → Authenticator → Director → Upstream
//!                  │
//!                  └─► Dashboard
//! ```
//!
//! ## Resolution
//!
//! - **path**: `GET /catalog/items` → service `catalog`, path `/items`
//! - **subdomain**: `GET catalog.example.com/items` → service `catalog`, path `/items`
//!
//! The resolved service name is sent to the backend in a base-path header
//! (`X-Micro-Web-Base-Path` by default) so it can rebuild absolute links.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use web_dispatch::{Gateway, config::GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> web_dispatch::Result<()> {
//!     let config = GatewayConfig::from_file("dispatch.hcl").await?;
//!     let gateway = Gateway::new(config)?;
//!     gateway.start().await?;
//!     gateway.wait_for_shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod dispatch;
pub(crate) mod entrypoint;
pub mod error;
pub mod gateway;
pub mod observability;
pub mod provider;
pub mod proxy;
pub mod router;

// Re-export main types
pub use dispatch::Dispatcher;
pub use error::{GatewayError, Result};
pub use gateway::Gateway;

use serde::{Deserialize, Serialize};

/// Gateway runtime state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GatewayState {
    /// Created but not yet started
    #[default]
    Created,
    /// Binding the listener
    Starting,
    /// Accepting and dispatching requests
    Running,
    Stopping,
    Stopped,
}

impl std::fmt::Display for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Gateway health status snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: GatewayState,
    /// Uptime in seconds since the gateway was created
    pub uptime_secs: u64,
    pub active_connections: usize,
    /// Total requests handled since start
    pub total_requests: u64,
}
