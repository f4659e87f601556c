//! HTTP listener serving mocked traffic and the control plane.
//!
//! Each accepted connection is served by hyper's HTTP/1 connection driver on
//! its own task. Requests under `/mockserver/` go to the control plane; all
//! others are matched against the expectation store.
//!
//! # Module Structure
//!
//! - `mod.rs` - [`MockServer`] start-up, accept loop and shutdown
//! - `state` - [`ServerState`] shared by every connection
//! - `handler` - per-request matching and dispatch
//! - `response` - model response to hyper response, with connection options
//! - `stream` - socket wrapper used by ERROR actions
//! - `convert` - hyper to model conversions
//! - `headers` - shared header names and helpers
//! - `network` - listener socket setup

pub mod convert;
mod handler;
pub mod headers;
mod network;
pub mod response;
mod state;
mod stream;

pub use state::ServerState;

use crate::action::client::{HttpClient, HyperHttpClient};
use crate::action::webhook::WebhookQueue;
use crate::action::ActionHandler;
use crate::admin_api::parse_expectations;
use crate::config::Config;
use crate::store::ExpectationStore;
use anyhow::Context;
use handler::{handle_request, ConnectionContext};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use stream::{ConnectionControl, ControlledStream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A running mock server.
pub struct MockServer {
    state: Arc<ServerState>,
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl MockServer {
    /// Bind the listener, load initial expectations and start serving.
    pub async fn start(config: &Config) -> anyhow::Result<Self> {
        let client = HyperHttpClient::new(&config.client).context("Failed to create outbound client")?;
        Self::start_with_client(config, Arc::new(client)).await
    }

    /// Like [`MockServer::start`], with a caller-supplied outbound client.
    pub async fn start_with_client(
        config: &Config,
        client: Arc<dyn HttpClient>,
    ) -> anyhow::Result<Self> {
        let webhooks = Arc::new(WebhookQueue::new(config.webhooks.queue_size));
        webhooks.start(Arc::clone(&client));
        let state = Arc::new(ServerState::new(
            ExpectationStore::new(config.store.max_log_entries),
            ActionHandler::new(client, webhooks),
        ));

        let server_state = Arc::clone(&state);
        let mut server = Self {
            state,
            local_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            shutdown: CancellationToken::new(),
            accept_task: Mutex::new(None),
        };
        if let Some(path) = &config.initialization.expectations_file {
            let count = server.load_expectations_file(path)?;
            info!("Loaded {} expectation(s) from {}", count, path.display());
        }

        let addr = network::resolve(&config.listen.host, config.listen.port)
            .with_context(|| format!("Failed to resolve {}", config.listen.address()))?;
        let listener = network::create_listener(addr)
            .with_context(|| format!("Failed to bind {}", addr))?;
        server.local_addr = listener.local_addr().context("Failed to read bound address")?;
        server_state.add_port(server.local_addr.port());
        info!("Decoy listening on {}", server.local_addr);

        let task = tokio::spawn(accept_loop(listener, server_state, server.shutdown.clone()));
        *server.accept_task.lock() = Some(task);
        Ok(server)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Register the expectations in a JSON file holding one expectation or an array.
    pub fn load_expectations_file(&self, path: &Path) -> anyhow::Result<usize> {
        let contents = std::fs::read(path)
            .with_context(|| format!("Failed to read expectations file {}", path.display()))?;
        let dtos = parse_expectations(&contents)
            .with_context(|| format!("Failed to parse expectations file {}", path.display()))?;
        let stored = self.state.register(dtos).map_err(|errors| {
            anyhow::anyhow!(
                "Invalid expectations in {}: {}",
                path.display(),
                errors.join("; ")
            )
        })?;
        Ok(stored.len())
    }

    /// Resolves once [`MockServer::shutdown`] has been called.
    pub async fn stopped(&self) {
        self.shutdown.cancelled().await
    }

    /// Stop accepting connections, close open ones and stop webhook delivery.
    pub async fn shutdown(&self) {
        info!("Decoy on port {} shutting down", self.port());
        self.shutdown.cancel();
        let task = self.accept_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("Accept loop ended abnormally: {}", e);
            }
        }
        self.state.actions.webhooks().shutdown().await;
    }
}

async fn accept_loop(listener: TcpListener, state: Arc<ServerState>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, remote_addr)) => {
                        let state = Arc::clone(&state);
                        let cancel = shutdown.child_token();
                        tokio::spawn(serve_connection(stream, remote_addr, state, cancel));
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            _ = shutdown.cancelled() => {
                debug!("Accept loop exiting");
                break;
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    state: Arc<ServerState>,
    cancel: CancellationToken,
) {
    let local_addr = match stream.local_addr() {
        Ok(addr) => addr,
        Err(e) => {
            debug!("Dropping connection from {}: {}", remote_addr, e);
            return;
        }
    };
    let _ = stream.set_nodelay(true);
    let control = ConnectionControl::new();
    let context = Arc::new(ConnectionContext {
        local_addr,
        remote_addr,
        control: Arc::clone(&control),
        close: Arc::new(Notify::new()),
        cancel: cancel.clone(),
    });
    // in-flight delays end with the connection
    let _guard = cancel.clone().drop_guard();

    let io = TokioIo::new(ControlledStream::new(stream, Arc::clone(&control)));
    let close = Arc::clone(&context.close);
    let service = service_fn(move |req| {
        let state = Arc::clone(&state);
        let context = Arc::clone(&context);
        async move { handle_request(req, state, context).await }
    });
    let connection = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = close.notified() => {
            debug!("Closing connection from {} after response", remote_addr);
            connection.as_mut().graceful_shutdown();
            connection.as_mut().await
        }
        _ = cancel.cancelled() => {
            connection.as_mut().graceful_shutdown();
            connection.as_mut().await
        }
    };
    if let Err(e) = result {
        if !control.is_taken_over() {
            debug!("Connection error from {}: {}", remote_addr, e);
        }
    }
}
