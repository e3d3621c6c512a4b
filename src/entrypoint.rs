//! Entrypoint - the HTTP listener feeding the dispatcher
//!
//! One task per accepted connection. A request's future is dropped when its
//! connection goes away, which cancels any in-flight lookup or upstream call.

use crate::dispatch::Dispatcher;
use crate::error::{GatewayError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Bind the listener and start accepting connections
pub async fn start_http_entrypoint(
    addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::Other(format!("Failed to bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;

    tracing::info!(address = %local_addr, "HTTP entrypoint listening");

    let handle = tokio::spawn(async move {
        loop {
            let (stream, remote_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                    continue;
                }
            };

            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher.metrics().inc_connections();
                let io = TokioIo::new(stream);
                let served = http1::Builder::new()
                    .serve_connection(
                        io,
                        service_fn(|req| handle_http_request(req, remote_addr, dispatcher.clone())),
                    )
                    .await;
                if let Err(e) = served {
                    tracing::debug!(remote = %remote_addr, error = %e, "Connection closed with error");
                }
                dispatcher.metrics().dec_connections();
            });
        }
    });

    Ok((local_addr, handle))
}

/// Buffer the body and hand the request to the dispatcher
async fn handle_http_request(
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
) -> std::result::Result<hyper::Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();

    let resp = dispatcher
        .dispatch(http::Request::from_parts(parts, body), remote_addr)
        .await;
    Ok(resp.map(Full::new))
}
