//! HTTP forwarding transport - sends the directed request upstream

use super::ForwardTarget;
use crate::error::{GatewayError, Result};
use bytes::Bytes;
use http::header::HOST;
use http::HeaderName;
use std::time::Duration;

/// HTTP reverse proxy
pub struct HttpProxy {
    client: reqwest::Client,
    timeout: Duration,
    base_path_header: HeaderName,
}

impl HttpProxy {
    /// Create a proxy writing the base path into `base_path_header`
    pub fn new(base_path_header: HeaderName, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(100)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            client,
            timeout,
            base_path_header,
        }
    }

    /// Forward a request to its directed target
    pub async fn forward(
        &self,
        target: &ForwardTarget,
        method: &http::Method,
        headers: &http::HeaderMap,
        body: Bytes,
    ) -> Result<ProxyResponse> {
        let mut req_builder = self.client.request(method.clone(), &target.url);

        for (key, value) in headers.iter() {
            if *key != HOST && *key != self.base_path_header && !is_hop_by_hop(key.as_str()) {
                req_builder = req_builder.header(key.clone(), value.clone());
            }
        }
        req_builder = req_builder
            .header(HOST, target.host.as_str())
            .header(self.base_path_header.clone(), target.base_path.as_str())
            .body(body);

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::UpstreamTimeout(self.timeout.as_millis() as u64)
            } else if e.is_connect() {
                GatewayError::ServiceUnavailable(format!(
                    "Cannot connect to {} at {}: {}",
                    target.service, target.host, e
                ))
            } else {
                GatewayError::Http(e)
            }
        })?;

        let status = response.status();
        let mut resp_headers = response.headers().clone();
        strip_hop_by_hop(&mut resp_headers);
        let resp_body = response.bytes().await.map_err(GatewayError::Http)?;

        Ok(ProxyResponse {
            status,
            headers: resp_headers,
            body: resp_body,
        })
    }
}

/// Response from an upstream service
pub struct ProxyResponse {
    pub status: http::StatusCode,
    pub headers: http::HeaderMap,
    pub body: Bytes,
}

/// Drop hop-by-hop headers from an upstream response
fn strip_hop_by_hop(headers: &mut http::HeaderMap) {
    let hop: Vec<HeaderName> = headers
        .keys()
        .filter(|k| is_hop_by_hop(k.as_str()))
        .cloned()
        .collect();
    for name in hop {
        headers.remove(name);
    }
}

/// Check if a header is a hop-by-hop header that should not be forwarded
fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}
