//! Integration tests for Web Dispatch
//!
//! These tests spin up real TCP listeners and HTTP backends to verify
//! end-to-end request flow through the dispatcher.

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use web_dispatch::config::{GatewayConfig, InspectorKind, ResolverMode};
use web_dispatch::Gateway;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SECRET: &str = "integration-secret";

/// Spawn a minimal HTTP backend that answers every request with `body` and
/// reports the raw request head it received.
async fn spawn_backend(body: &'static str) -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(s) => s,
                Err(_) => break,
            };
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());
                let resp = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    (addr, rx)
}

/// Start a gateway on an ephemeral port
async fn start(config: GatewayConfig) -> (Gateway, SocketAddr) {
    let gateway = Gateway::new(GatewayConfig {
        address: "127.0.0.1:0".to_string(),
        ..config
    })
    .unwrap();
    gateway.start().await.unwrap();
    let addr = gateway.local_addr().unwrap();
    (gateway, addr)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

fn prefixed_config() -> GatewayConfig {
    GatewayConfig {
        service_prefix: Some("acme".to_string()),
        ..Default::default()
    }
}

fn jwt_config() -> GatewayConfig {
    let mut config = prefixed_config();
    config.auth.inspector = InspectorKind::Jwt;
    config.auth.secret = Some(SECRET.to_string());
    config
}

fn token(sub: &str, iss: &str) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};
    let claims = serde_json::json!({
        "sub": sub,
        "iss": iss,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().find_map(|line| {
        let (k, v) = line.split_once(':')?;
        k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

// ---------------------------------------------------------------------------
// Path mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_path_mode_forwards_rewritten_request() {
    let (backend, mut seen) = spawn_backend("catalog items").await;
    let (gateway, addr) = start(prefixed_config()).await;
    gateway
        .directory()
        .register("acme.catalog", &backend.to_string(), "*")
        .await;

    let resp = client()
        .get(format!("http://{}/catalog/items?page=2", addr))
        .header("host", "shop.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "catalog items");

    let head = seen.recv().await.unwrap();
    assert!(head.starts_with("GET /items?page=2 HTTP/1.1"), "head: {}", head);
    assert_eq!(header(&head, "x-micro-web-base-path"), Some("/acme.catalog"));
    assert_eq!(header(&head, "host"), Some(backend.to_string().as_str()));

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_zero_candidates_is_bad_gateway() {
    let (gateway, addr) = start(prefixed_config()).await;

    let resp = client()
        .get(format!("http://{}/catalog/items", addr))
        .header("host", "shop.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);

    let snap = gateway.metrics().snapshot();
    assert_eq!(snap.outcomes["neutralized"], 1);
    gateway.shutdown().await;
}

#[tokio::test]
async fn test_basic_authorization_rejected() {
    let (backend, _seen) = spawn_backend("never").await;
    let (gateway, addr) = start(prefixed_config()).await;
    gateway
        .directory()
        .register("acme.catalog", &backend.to_string(), "*")
        .await;

    let resp = client()
        .get(format!("http://{}/catalog/items", addr))
        .header("host", "shop.example.com")
        .header("authorization", "Basic abcdef")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], 401);
    assert_eq!(body["status"], "Unauthorized");
    gateway.shutdown().await;
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_jwt_anonymous_unauthorized_then_token_forwarded() {
    let (backend, mut seen) = spawn_backend("secret stuff").await;
    let (gateway, addr) = start(jwt_config()).await;
    gateway
        .directory()
        .register("acme.catalog", &backend.to_string(), "*")
        .await;

    let resp = client()
        .get(format!("http://{}/catalog/items", addr))
        .header("host", "shop.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client()
        .get(format!("http://{}/catalog/items", addr))
        .header("host", "shop.example.com")
        .header("authorization", format!("Bearer {}", token("alice", "micro")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "secret stuff");

    let head = seen.recv().await.unwrap();
    assert!(head.starts_with("GET /items HTTP/1.1"));
    gateway.shutdown().await;
}

#[tokio::test]
async fn test_token_cookie_accepted() {
    let (backend, _seen) = spawn_backend("ok").await;
    let (gateway, addr) = start(jwt_config()).await;
    gateway
        .directory()
        .register("acme.catalog", &backend.to_string(), "*")
        .await;

    let resp = client()
        .get(format!("http://{}/catalog/", addr))
        .header("host", "shop.example.com")
        .header("cookie", format!("theme=dark; micro-token={}", token("bob", "micro")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    gateway.shutdown().await;
}

#[tokio::test]
async fn test_login_redirect_for_browsers() {
    let mut config = jwt_config();
    config.auth.login_url = Some("/login".to_string());
    let (backend, _seen) = spawn_backend("never").await;
    let (gateway, addr) = start(config).await;
    gateway
        .directory()
        .register("acme.catalog", &backend.to_string(), "*")
        .await;

    let resp = client()
        .get(format!("http://{}/catalog/items", addr))
        .header("host", "shop.example.com")
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 302);
    assert_eq!(
        resp.headers()["location"],
        "/login?redirect_to=/catalog/items"
    );
    gateway.shutdown().await;
}

// ---------------------------------------------------------------------------
// Subdomain mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_subdomain_mode_keeps_path() {
    let (backend, mut seen) = spawn_backend("hello").await;
    let config = GatewayConfig {
        resolver: ResolverMode::Subdomain,
        base_domain: Some("example.com".to_string()),
        ..Default::default()
    };
    let (gateway, addr) = start(config).await;
    gateway
        .directory()
        .register("catalog", &backend.to_string(), "*")
        .await;

    let resp = client()
        .post(format!("http://{}/items/42", addr))
        .header("host", "catalog.example.com")
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let head = seen.recv().await.unwrap();
    assert!(head.starts_with("POST /items/42 HTTP/1.1"), "head: {}", head);
    assert_eq!(header(&head, "x-micro-web-base-path"), Some("/catalog"));
    gateway.shutdown().await;
}

#[tokio::test]
async fn test_tenant_host_trusts_only_serving_issuer() {
    let (backend, mut seen) = spawn_backend("invoices").await;
    let mut config = GatewayConfig {
        resolver: ResolverMode::Subdomain,
        base_domain: Some("example.com".to_string()),
        ..Default::default()
    };
    config.auth.inspector = InspectorKind::Jwt;
    config.auth.secret = Some(SECRET.to_string());
    let (gateway, addr) = start(config).await;
    gateway
        .directory()
        .register("billing", &backend.to_string(), "*")
        .await;

    let resp = client()
        .get(format!("http://{}/billing/invoices", addr))
        .header("host", "x.evil.example.com")
        .header("authorization", format!("Bearer {}", token("mallory", "evil")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert!(seen.try_recv().is_err());

    let resp = client()
        .get(format!("http://{}/billing/invoices", addr))
        .header("host", "x.evil.example.com")
        .header("authorization", format!("Bearer {}", token("alice", "micro")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "invoices");

    let head = seen.recv().await.unwrap();
    assert!(head.starts_with("GET /invoices HTTP/1.1"), "head: {}", head);
    gateway.shutdown().await;
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_dashboard_on_ip_host() {
    let (gateway, addr) = start(GatewayConfig::default()).await;
    gateway
        .directory()
        .register("micro.web.catalog", "10.0.0.5:8080", "*")
        .await;

    // 127.0.0.1 is an IP literal: always the dashboard, even for a service-like path
    let resp = client()
        .get(format!("http://{}/", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["services"][0]["name"], "catalog");
    assert_eq!(body["services"][0]["link"], "/catalog/");

    let resp = client()
        .get(format!("http://{}/service/micro.web.catalog", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");

    let resp = client()
        .get(format!("http://{}/metrics", addr))
        .send()
        .await
        .unwrap();
    let text = resp.text().await.unwrap();
    assert!(text.contains("dispatch_outcomes_total{outcome=\"dashboard\"}"));

    gateway.shutdown().await;
}

#[tokio::test]
async fn test_service_prefix_reserved_in_path_mode() {
    let (gateway, addr) = start(GatewayConfig::default()).await;

    let resp = client()
        .get(format!("http://{}/service/", addr))
        .header("host", "shop.example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["services"].as_array().unwrap().is_empty());
    gateway.shutdown().await;
}
