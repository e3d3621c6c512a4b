//! Proxy layer - directing and forwarding service requests

pub mod director;
pub mod http_proxy;

pub use director::{Direction, Director, ForwardTarget};
pub use http_proxy::{HttpProxy, ProxyResponse};
