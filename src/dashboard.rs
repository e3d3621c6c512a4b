//! Dashboard API - the local routes served when a request is not dispatched
//!
//! Lists web services and directory contents as JSON and exposes the
//! dispatcher's own health, version and metrics.

use crate::config::{GatewayConfig, ResolverMode};
use crate::observability::DispatchMetrics;
use crate::provider::{LookupOptions, RouteCandidate, ServiceDirectory};
use crate::router::SERVICE_INFO_PREFIX;
use crate::{GatewayState, HealthStatus};
use http::Method;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// A web application reachable through the dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebService {
    pub name: String,
    pub link: String,
}

/// One directory entry with its live candidates
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDetail {
    pub name: String,
    pub nodes: Vec<RouteCandidate>,
    /// Advertised endpoints, sorted; empty when the directory has none
    pub endpoints: Vec<String>,
}

/// Dispatcher version information
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl VersionInfo {
    pub(crate) fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Response from the dashboard API
#[derive(Debug, Clone)]
pub struct DashboardResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

impl DashboardResponse {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        Self {
            status,
            content_type: "application/json".to_string(),
            body: serde_json::to_string_pretty(value).unwrap_or_default(),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, &serde_json::json!({ "error": message.into() }))
    }

    fn empty(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            body: String::new(),
        }
    }
}

/// CORS headers attached to every dashboard response
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "POST, PATCH, GET, OPTIONS, PUT, DELETE"),
    (
        "access-control-allow-headers",
        "Accept, Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, Authorization",
    ),
];

/// Runtime state the dashboard reports on
#[derive(Clone)]
pub struct DashboardContext {
    pub state: Arc<RwLock<GatewayState>>,
    pub started: Instant,
    pub metrics: Arc<DispatchMetrics>,
}

impl DashboardContext {
    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            state: self
                .state
                .read()
                .map(|s| s.clone())
                .unwrap_or_else(|e| e.into_inner().clone()),
            uptime_secs: self.started.elapsed().as_secs(),
            active_connections: self.metrics.active_connections().max(0) as usize,
            total_requests: self.metrics.total_requests(),
        }
    }
}

/// Dashboard API
pub struct DashboardApi {
    directory: Arc<dyn ServiceDirectory>,
    context: DashboardContext,
    service_type: String,
    mode: ResolverMode,
    base_domain: Option<String>,
}

impl DashboardApi {
    pub fn new(
        config: &GatewayConfig,
        directory: Arc<dyn ServiceDirectory>,
        context: DashboardContext,
    ) -> Self {
        Self {
            directory,
            context,
            service_type: config.service_type.clone(),
            mode: config.resolver,
            base_domain: config.base_domain(),
        }
    }

    /// Handle a dashboard request
    ///
    /// `host` is the normalized request host, used for subdomain links when
    /// no base domain is configured.
    pub async fn handle(
        &self,
        method: &Method,
        path: &str,
        host: &str,
        namespace: &str,
    ) -> DashboardResponse {
        if method == Method::OPTIONS {
            return DashboardResponse::empty(204);
        }

        match path {
            "" | "/" => {
                let services = self.web_services(host, namespace).await;
                DashboardResponse::json(200, &serde_json::json!({ "services": services }))
            }
            "/health" | "/health/" => DashboardResponse::json(200, &self.context.health()),
            "/version" | "/version/" => DashboardResponse::json(200, &VersionInfo::current()),
            "/metrics" | "/metrics/" => DashboardResponse {
                status: 200,
                content_type: "text/plain; version=0.0.4".to_string(),
                body: self.context.metrics.render_prometheus(),
            },
            "/favicon.ico" => DashboardResponse::empty(204),
            s if s.starts_with(SERVICE_INFO_PREFIX) => {
                let name = s[SERVICE_INFO_PREFIX.len()..].trim_end_matches('/');
                if name.is_empty() {
                    self.list_services(namespace).await
                } else {
                    self.service(name, namespace).await
                }
            }
            _ => DashboardResponse::error(404, "Not found"),
        }
    }

    /// Directory services whose name carries the web type, as link targets
    pub async fn web_services(&self, host: &str, namespace: &str) -> Vec<WebService> {
        let names = match self
            .directory
            .list_services(&LookupOptions::domain(namespace))
            .await
        {
            Ok(names) => names,
            Err(e) => {
                tracing::error!(error = %e, "Error listing services");
                Vec::new()
            }
        };

        let marker = format!(".{}.", self.service_type);
        let domain = self.base_domain.as_deref().unwrap_or(host);

        let mut services: Vec<WebService> = names
            .iter()
            .filter_map(|full| full.split_once(marker.as_str()).map(|(_, name)| name))
            .filter(|name| !name.is_empty())
            .map(|name| {
                let link = if self.mode == ResolverMode::Subdomain && !domain.is_empty() {
                    format!("https://{}.{}", name, domain)
                } else {
                    format!("/{}/", name)
                };
                WebService {
                    name: display_name(name),
                    link,
                }
            })
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        services
    }

    async fn list_services(&self, namespace: &str) -> DashboardResponse {
        match self
            .directory
            .list_services(&LookupOptions::domain(namespace))
            .await
        {
            Ok(mut names) => {
                names.sort();
                DashboardResponse::json(200, &serde_json::json!({ "services": names }))
            }
            Err(e) => {
                tracing::error!(error = %e, "Error listing services");
                DashboardResponse::error(500, format!("Error occurred: {}", e))
            }
        }
    }

    async fn service(&self, name: &str, namespace: &str) -> DashboardResponse {
        let options = LookupOptions::domain(namespace);
        match self.directory.lookup(name, &options).await {
            Ok(nodes) if nodes.is_empty() => DashboardResponse::error(404, "Not found"),
            Ok(nodes) => {
                let endpoints = self
                    .directory
                    .endpoints(name, &options)
                    .await
                    .unwrap_or_else(|e| {
                        tracing::warn!(service = name, error = %e, "Error listing endpoints");
                        Vec::new()
                    });
                DashboardResponse::json(
                    200,
                    &ServiceDetail {
                        name: name.to_string(),
                        nodes,
                        endpoints,
                    },
                )
            }
            Err(crate::provider::DirectoryError::NotFound) => {
                DashboardResponse::error(404, "Not found")
            }
            Err(e) => DashboardResponse::error(500, format!("Error occurred: {}", e)),
        }
    }
}

/// Short names with digits read as acronyms: `m3o` shows as `M3O`
fn display_name(name: &str) -> String {
    if name.len() <= 3 && name.chars().any(|c| c.is_ascii_digit()) {
        name.to_ascii_uppercase()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MemoryDirectory, PublishedInstance};

    async fn api(mode: ResolverMode, base_domain: Option<&str>) -> DashboardApi {
        let dir = Arc::new(MemoryDirectory::new());
        dir.register("micro.web.catalog", "10.0.0.5:8080", "*").await;
        dir.register("micro.web.m3o", "10.0.0.6:8080", "*").await;
        dir.register("micro.web.accounts", "10.0.0.7:8080", "*").await;
        dir.register("micro.api.orders", "10.0.0.8:8080", "*").await;
        dir.register("private", "10.0.0.9:8080", "acme").await;
        dir.replace_discovered(vec![PublishedInstance {
            candidate: RouteCandidate {
                service: "micro.api.orders".to_string(),
                address: "10.0.0.10:8080".to_string(),
                domain: "*".to_string(),
            },
            endpoints: vec!["Orders.Read".to_string(), "Orders.Create".to_string()],
        }])
        .await;

        let config = GatewayConfig {
            resolver: mode,
            base_domain: base_domain.map(str::to_string),
            ..Default::default()
        };
        let context = DashboardContext {
            state: Arc::new(RwLock::new(GatewayState::Running)),
            started: Instant::now(),
            metrics: Arc::new(DispatchMetrics::new()),
        };
        DashboardApi::new(&config, dir, context)
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("m3o"), "M3O");
        assert_eq!(display_name("a1"), "A1");
        assert_eq!(display_name("catalog"), "catalog");
        assert_eq!(display_name("abc"), "abc");
        assert_eq!(display_name("abc1"), "abc1");
    }

    #[tokio::test]
    async fn test_web_services_path_mode() {
        let api = api(ResolverMode::Path, None).await;
        let services = api.web_services("localhost", "micro").await;
        assert_eq!(
            services,
            vec![
                WebService {
                    name: "M3O".to_string(),
                    link: "/m3o/".to_string()
                },
                WebService {
                    name: "accounts".to_string(),
                    link: "/accounts/".to_string()
                },
                WebService {
                    name: "catalog".to_string(),
                    link: "/catalog/".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_web_services_subdomain_links() {
        let api = api(ResolverMode::Subdomain, Some("example.com")).await;
        let services = api.web_services("example.com", "micro").await;
        let catalog = services.iter().find(|s| s.name == "catalog").unwrap();
        assert_eq!(catalog.link, "https://catalog.example.com");
    }

    #[tokio::test]
    async fn test_index_route() {
        let api = api(ResolverMode::Path, None).await;
        let resp = api.handle(&Method::GET, "/", "localhost", "micro").await;
        assert_eq!(resp.status, 200);
        let json: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(json["services"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_service_listing_is_scoped_and_sorted() {
        let api = api(ResolverMode::Path, None).await;
        let resp = api.handle(&Method::GET, "/service/", "localhost", "micro").await;
        assert_eq!(resp.status, 200);
        let json: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        let names: Vec<&str> = json["services"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "micro.api.orders",
                "micro.web.accounts",
                "micro.web.catalog",
                "micro.web.m3o"
            ]
        );
    }

    #[tokio::test]
    async fn test_service_detail() {
        let api = api(ResolverMode::Path, None).await;
        let resp = api
            .handle(&Method::GET, "/service/micro.web.catalog", "localhost", "micro")
            .await;
        assert_eq!(resp.status, 200);
        let json: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(json["name"], "micro.web.catalog");
        assert_eq!(json["nodes"][0]["address"], "10.0.0.5:8080");
        assert!(json["endpoints"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_service_detail_lists_endpoints() {
        let api = api(ResolverMode::Path, None).await;
        let resp = api
            .handle(&Method::GET, "/service/micro.api.orders", "localhost", "micro")
            .await;
        assert_eq!(resp.status, 200);
        let json: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(json["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(
            json["endpoints"],
            serde_json::json!(["Orders.Create", "Orders.Read"])
        );
    }

    #[tokio::test]
    async fn test_service_detail_not_found() {
        let api = api(ResolverMode::Path, None).await;
        let resp = api
            .handle(&Method::GET, "/service/missing", "localhost", "micro")
            .await;
        assert_eq!(resp.status, 404);

        // registered, but not visible from this namespace
        let resp = api
            .handle(&Method::GET, "/service/private", "localhost", "micro")
            .await;
        assert_eq!(resp.status, 404);
    }

    #[tokio::test]
    async fn test_health_version_metrics() {
        let api = api(ResolverMode::Path, None).await;

        let resp = api.handle(&Method::GET, "/health", "", "micro").await;
        assert_eq!(resp.status, 200);
        let health: HealthStatus = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(health.state, GatewayState::Running);

        let resp = api.handle(&Method::GET, "/version", "", "micro").await;
        assert!(resp.body.contains(env!("CARGO_PKG_VERSION")));

        let resp = api.handle(&Method::GET, "/metrics", "", "micro").await;
        assert!(resp.content_type.starts_with("text/plain"));
        assert!(resp.body.contains("dispatch_requests_total"));
    }

    #[tokio::test]
    async fn test_options_and_favicon() {
        let api = api(ResolverMode::Path, None).await;
        let resp = api.handle(&Method::OPTIONS, "/anything", "", "micro").await;
        assert_eq!(resp.status, 204);
        let resp = api.handle(&Method::GET, "/favicon.ico", "", "micro").await;
        assert_eq!(resp.status, 204);
        assert!(resp.body.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let api = api(ResolverMode::Path, None).await;
        let resp = api.handle(&Method::GET, "/nope", "", "micro").await;
        assert_eq!(resp.status, 404);
    }
}
