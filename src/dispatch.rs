//! Dispatch orchestrator - classify, then serve locally or resolve and forward
//!
//! ```text
//! classify ─► dashboard
//!    │
//!    └─► token scheme ─► resolve ─► authenticate/authorize ─► direct ─► forward
//!                          │                │
//!                          └─► 502          └─► 401 / 403 / 500
//! ```

use crate::auth::{AuthError, Authenticator};
use crate::config::GatewayConfig;
use crate::dashboard::{DashboardApi, DashboardContext, CORS_HEADERS};
use crate::error::{GatewayError, Result};
use crate::observability::{AccessLog, AccessLogEntry, DispatchMetrics, Outcome, RequestTracker};
use crate::provider::ServiceDirectory;
use crate::proxy::{Direction, Director, ForwardTarget, HttpProxy};
use crate::router::{
    normalize_host, Classification, Classifier, RandomSelector, ResolveError, Resolver, RouteBy,
    RouteRequest, Target,
};
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, HOST, LOCATION, USER_AGENT};
use http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Everything one request is handled with, built once from the configuration
pub struct Dispatcher {
    classifier: Classifier,
    resolver: Arc<Resolver>,
    director: Director,
    authenticator: Option<Authenticator>,
    /// Issuer trusted by this instance; the Host header never changes it
    namespace: String,
    proxy: HttpProxy,
    dashboard: DashboardApi,
    metrics: Arc<DispatchMetrics>,
    access_log: Arc<AccessLog>,
    /// Error id used before a service name is known
    local_id: String,
    login_url: Option<String>,
}

/// What the access log and metrics need to know about a finished request
struct Finished {
    status: StatusCode,
    outcome: Outcome,
    route: &'static str,
    service: Option<String>,
    upstream: Option<String>,
}

impl Dispatcher {
    pub fn new(
        config: &GatewayConfig,
        directory: Arc<dyn ServiceDirectory>,
        context: DashboardContext,
        access_log: Arc<AccessLog>,
    ) -> Result<Self> {
        let base_path_header = HeaderName::from_bytes(config.base_path_header.as_bytes())
            .map_err(|e| {
                GatewayError::Config(format!(
                    "Invalid base_path_header '{}': {}",
                    config.base_path_header, e
                ))
            })?;

        let resolver = Arc::new(Resolver::from_config(
            config,
            directory.clone(),
            Arc::new(RandomSelector),
        ));
        let authenticator = if config.auth.enabled {
            Some(Authenticator::from_config(config)?)
        } else {
            tracing::warn!("Authentication disabled, every resolved request is forwarded");
            None
        };
        let metrics = context.metrics.clone();

        Ok(Self {
            classifier: Classifier::new(config),
            director: Director::new(resolver.clone()),
            resolver,
            authenticator,
            namespace: config.namespace.clone(),
            proxy: HttpProxy::new(
                base_path_header,
                Duration::from_secs(config.upstream_timeout_secs),
            ),
            dashboard: DashboardApi::new(config, directory, context),
            metrics,
            access_log,
            local_id: config.dashboard_namespace(),
            login_url: config.auth.login_url.clone().filter(|u| !u.is_empty()),
        })
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// Handle one request end to end
    pub async fn dispatch(&self, req: Request<Bytes>, remote: SocketAddr) -> Response<Bytes> {
        let tracker = self.access_log.start_request();
        let host_header = req.headers().get(HOST).and_then(|v| v.to_str().ok());
        let host = normalize_host(req.uri(), host_header);
        let class = self.classifier.classify(host.as_deref(), req.uri().path());

        let (response, finished) = match class.target {
            Target::Dashboard => self.serve_dashboard(&req, &class).await,
            Target::Service(by) => self.serve_service(&req, &class, by).await,
        };

        self.finish(&req, &class, remote, &tracker, &response, finished);
        response
    }

    async fn serve_dashboard(
        &self,
        req: &Request<Bytes>,
        class: &Classification,
    ) -> (Response<Bytes>, Finished) {
        let page = self
            .dashboard
            .handle(req.method(), req.uri().path(), &class.host, &class.namespace)
            .await;
        let status = StatusCode::from_u16(page.status).unwrap_or(StatusCode::OK);

        let mut resp = with_body(status, Bytes::from(page.body));
        if let Ok(value) = HeaderValue::from_str(&page.content_type) {
            resp.headers_mut().insert(CONTENT_TYPE, value);
        }
        for (name, value) in CORS_HEADERS {
            resp.headers_mut()
                .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }

        let finished = Finished {
            status,
            outcome: Outcome::Dashboard,
            route: "dashboard",
            service: None,
            upstream: None,
        };
        (resp, finished)
    }

    async fn serve_service(
        &self,
        req: &Request<Bytes>,
        class: &Classification,
        by: RouteBy,
    ) -> (Response<Bytes>, Finished) {
        // the host-derived namespace scopes the directory lookup, never trust
        let route = RouteRequest {
            method: req.method().as_str().to_string(),
            host: class.host.clone(),
            path: req.uri().path().to_string(),
            namespace: class.namespace.clone(),
        };
        let query = req.uri().query();

        let direction = match &self.authenticator {
            Some(auth) => {
                let token = match Authenticator::extract_token(req.headers(), &self.local_id) {
                    Ok(token) => token,
                    Err(e) => return self.denied(req, by, None, e, false),
                };
                let endpoint = match self.resolver.resolve(&route, by).await {
                    Ok(endpoint) => endpoint,
                    Err(e) => return self.neutralized(&route, by, e),
                };
                let service = endpoint.name.clone();
                let scope = match auth.check(&token, &self.namespace, endpoint).await {
                    Ok(scope) => scope,
                    Err(e) => return self.denied(req, by, Some(service), e, token.is_empty()),
                };
                self.director
                    .direct(scope.endpoint.as_ref(), &route, by, query)
                    .await
            }
            None => self.director.direct(None, &route, by, query).await,
        };

        match direction {
            Direction::Forward(target) => self.forward(req, by, target).await,
            Direction::Neutralized(e) => self.neutralized(&route, by, e),
        }
    }

    async fn forward(
        &self,
        req: &Request<Bytes>,
        by: RouteBy,
        target: ForwardTarget,
    ) -> (Response<Bytes>, Finished) {
        let result = self
            .proxy
            .forward(&target, req.method(), req.headers(), req.body().clone())
            .await;

        let (resp, outcome) = match result {
            Ok(upstream) => {
                let mut resp = with_body(upstream.status, upstream.body);
                *resp.headers_mut() = upstream.headers;
                (resp, Outcome::Forwarded)
            }
            Err(e) => {
                tracing::error!(service = %target.service, upstream = %target.host, error = %e, "Proxy error");
                let status = match e {
                    GatewayError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    _ => StatusCode::BAD_GATEWAY,
                };
                (json_error(status, &e.to_string()), Outcome::UpstreamError)
            }
        };

        let finished = Finished {
            status: resp.status(),
            outcome,
            route: route_label(by),
            service: Some(target.service),
            upstream: Some(target.host),
        };
        (resp, finished)
    }

    /// Render a resolution failure; nothing is forwarded
    fn neutralized(
        &self,
        route: &RouteRequest,
        by: RouteBy,
        err: ResolveError,
    ) -> (Response<Bytes>, Finished) {
        match &err {
            ResolveError::Directory(msg) => {
                tracing::error!(kind = err.kind(), host = %route.host, path = %route.path, error = %msg, "Service directory failed");
            }
            _ => {
                tracing::info!(kind = err.kind(), host = %route.host, path = %route.path, "No route for request");
            }
        }
        self.metrics.record_resolve_failure(err.kind());

        let status = StatusCode::BAD_GATEWAY;
        let finished = Finished {
            status,
            outcome: Outcome::Neutralized,
            route: route_label(by),
            service: None,
            upstream: None,
        };
        (json_error(status, &err.to_string()), finished)
    }

    /// Render an authentication or authorization failure
    ///
    /// Anonymous browser requests go to the login page when one is configured.
    fn denied(
        &self,
        req: &Request<Bytes>,
        by: RouteBy,
        service: Option<String>,
        err: AuthError,
        anonymous: bool,
    ) -> (Response<Bytes>, Finished) {
        tracing::debug!(id = err.id(), status = err.status().as_u16(), detail = err.detail(), "Request denied");

        let outcome = match err {
            AuthError::Unauthorized { .. } => Outcome::Unauthorized,
            AuthError::Forbidden { .. } => Outcome::Forbidden,
            AuthError::InternalServerError { .. } => Outcome::AuthError,
        };

        let redirect = match (&self.login_url, &err) {
            (Some(login), AuthError::Unauthorized { .. }) if anonymous && wants_html(req) => {
                login_redirect(login, req.uri().path())
            }
            _ => None,
        };
        let resp = redirect.unwrap_or_else(|| {
            let mut resp = with_body(err.status(), Bytes::from(err.to_json()));
            resp.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            resp
        });

        let finished = Finished {
            status: resp.status(),
            outcome,
            route: route_label(by),
            service,
            upstream: None,
        };
        (resp, finished)
    }

    fn finish(
        &self,
        req: &Request<Bytes>,
        class: &Classification,
        remote: SocketAddr,
        tracker: &RequestTracker,
        resp: &Response<Bytes>,
        finished: Finished,
    ) {
        let status = finished.status.as_u16();
        let bytes = resp.body().len() as u64;
        self.metrics.record_request(status, bytes, finished.outcome);
        if let Some(service) = &finished.service {
            self.metrics
                .record_service(service, status, tracker.elapsed_us());
        }

        let entry = AccessLogEntry {
            timestamp: String::new(),
            client_ip: remote.ip().to_string(),
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            host: Some(class.host.clone()).filter(|h| !h.is_empty()),
            status,
            response_bytes: bytes,
            duration_ms: 0,
            route: finished.route.to_string(),
            outcome: finished.outcome.as_str().to_string(),
            service: finished.service,
            upstream: finished.upstream,
            user_agent: req
                .headers()
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };
        self.access_log.record(&tracker.finish(entry));
    }
}

fn route_label(by: RouteBy) -> &'static str {
    match by {
        RouteBy::Path => "path",
        RouteBy::Subdomain => "subdomain",
    }
}

fn with_body(status: StatusCode, body: Bytes) -> Response<Bytes> {
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    resp
}

fn json_error(status: StatusCode, message: &str) -> Response<Bytes> {
    let body = serde_json::json!({ "error": message }).to_string();
    let mut resp = with_body(status, Bytes::from(body));
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    resp
}

fn wants_html(req: &Request<Bytes>) -> bool {
    req.headers()
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("text/html"))
}

fn login_redirect(login_url: &str, path: &str) -> Option<Response<Bytes>> {
    let sep = if login_url.contains('?') { '&' } else { '?' };
    let location = HeaderValue::from_str(&format!("{}{}redirect_to={}", login_url, sep, path)).ok()?;
    let mut resp = with_body(StatusCode::FOUND, Bytes::new());
    resp.headers_mut().insert(LOCATION, location);
    Some(resp)
}
