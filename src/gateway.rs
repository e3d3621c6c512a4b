//! Gateway orchestrator - lifecycle of the dispatcher
//!
//! Builds the directory, the dispatcher and the listener from one immutable
//! configuration, and owns the background tasks they run on.

use crate::config::GatewayConfig;
use crate::dashboard::DashboardContext;
use crate::dispatch::Dispatcher;
use crate::entrypoint;
use crate::error::{GatewayError, Result};
use crate::observability::{AccessLog, DispatchMetrics};
use crate::provider::{spawn_discovery_loop, MemoryDirectory};
use crate::GatewayState;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// The main Gateway
pub struct Gateway {
    config: Arc<GatewayConfig>,
    state: Arc<RwLock<GatewayState>>,
    start_time: Instant,
    shutdown: AtomicBool,
    metrics: Arc<DispatchMetrics>,
    access_log: Arc<AccessLog>,
    directory: Arc<MemoryDirectory>,
    /// Address the listener is bound to once started
    local_addr: RwLock<Option<SocketAddr>>,
    /// Listener and discovery tasks
    handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl Gateway {
    /// Create a gateway from a validated configuration
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;
        let directory = Arc::new(MemoryDirectory::from_config(&config.directory));

        Ok(Self {
            config: Arc::new(config),
            state: Arc::new(RwLock::new(GatewayState::Created)),
            start_time: Instant::now(),
            shutdown: AtomicBool::new(false),
            metrics: Arc::new(DispatchMetrics::new()),
            access_log: Arc::new(AccessLog::new()),
            directory,
            local_addr: RwLock::new(None),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Start the gateway: bind the listener and begin discovery
    pub async fn start(&self) -> Result<()> {
        self.set_state(GatewayState::Starting);

        let addr: SocketAddr = self.config.address.parse().map_err(|e| {
            GatewayError::Config(format!("Invalid address '{}': {}", self.config.address, e))
        })?;

        let context = DashboardContext {
            state: self.state.clone(),
            started: self.start_time,
            metrics: self.metrics.clone(),
        };
        let dispatcher = Arc::new(Dispatcher::new(
            &self.config,
            self.directory.clone(),
            context,
            self.access_log.clone(),
        )?);
        tracing::info!(
            namespace = %self.config.namespace,
            resolver = %self.config.resolver,
            services = self.directory.len().await,
            auth = self.config.auth.enabled,
            "Dispatcher configured"
        );

        let (bound, listener) = entrypoint::start_http_entrypoint(addr, dispatcher).await?;
        let mut handles = vec![listener];

        if let Some(discovery) = &self.config.directory.discovery {
            tracing::info!(seeds = discovery.seeds.len(), "Starting service discovery");
            handles.push(spawn_discovery_loop(
                discovery.clone(),
                self.directory.clone(),
            ));
        }

        *self.local_addr.write().unwrap_or_else(|e| e.into_inner()) = Some(bound);
        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(handles);

        self.set_state(GatewayState::Running);
        tracing::info!(address = %bound, "Gateway is running");

        Ok(())
    }

    /// Stop accepting connections and end background tasks
    pub async fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        self.set_state(GatewayState::Stopping);
        tracing::info!("Gateway shutting down");

        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            handle.abort();
        }

        self.set_state(GatewayState::Stopped);
        tracing::info!("Gateway stopped");
    }

    /// Wait for Ctrl+C, then shut down
    pub async fn wait_for_shutdown(&self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
        self.shutdown().await;
    }

    pub fn state(&self) -> GatewayState {
        self.state
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn metrics(&self) -> &Arc<DispatchMetrics> {
        &self.metrics
    }

    /// The in-memory directory; instances registered here are live immediately
    pub fn directory(&self) -> &Arc<MemoryDirectory> {
        &self.directory
    }

    /// Bound listener address, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, new_state: GatewayState) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(from = %*state, to = %new_state, "State transition");
        *state = new_state;
    }
}
