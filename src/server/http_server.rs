//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, RwLock, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::signal;
use log::{debug, error, info, warn};

use crate::parser::HttpRequest;
use crate::server::config::ServerConfig;
use crate::server::dispatch::dispatch;
use crate::server::error::Error;
use crate::server::ingest::read_request;
use crate::server::response::{HttpResponse, StatusCode};
use crate::server::router::{RouteMethod, Router};
use crate::server::writer::ResponseWriter;

// How long a rejected connection is drained before it is dropped.
const REJECT_LINGER: Duration = Duration::from_millis(500);
const REJECT_DRAIN_LIMIT: usize = 64 * 1024;

/// Lifecycle of the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Never started.
    Created,
    /// Accepting connections.
    Listening,
    /// Stopped; the route table holds only the defaults.
    Closed,
}

/// An HTTP server.
pub struct HttpServer {
    /// The server configuration.
    pub config: ServerConfig,
    /// The route table shared with every connection.
    pub router: Arc<RwLock<Router>>,
    state: Arc<watch::Sender<ServerState>>,
}

/// A running listener returned by [`HttpServer::listen`].
///
/// Dropping the handle without calling [`ServerHandle::close`] also stops
/// the listener, but does not wait for it.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    state: watch::Receiver<ServerState>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait until the listener has stopped on its own or been closed.
    pub async fn stopped(&mut self) {
        let _ = self.state.wait_for(|state| *state == ServerState::Closed).await;
    }

    /// Stop accepting, drain in-flight connections, and reset the route table.
    pub async fn close(self) -> Result<(), Error> {
        // Fails only if the accept loop already exited
        let _ = self.shutdown_tx.try_send(());
        self.task
            .await
            .map_err(|e| Error::InternalError(format!("Listener task failed: {e}")))
    }
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let (state, _) = watch::channel(ServerState::Created);
        Self {
            config,
            router: Arc::new(RwLock::new(Router::new())),
            state: Arc::new(state),
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    /// Register a handler for `method` and `path`.
    ///
    /// Returns false if the route was already taken. Routes may be added while
    /// the server is listening.
    pub async fn route<F, Fut>(&self, method: impl Into<RouteMethod>, path: impl Into<String>, handler: F) -> bool
    where
        F: Fn(HttpRequest, ResponseWriter) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.router.write().await.register(method, path, handler)
    }

    /// Log the registered endpoints.
    async fn display_server_info(&self) {
        let router = self.router.read().await;
        let mut routes: Vec<String> = router
            .routes()
            .map(|(method, path)| format!("{method} {path}"))
            .collect();
        routes.sort();

        info!("Registered endpoints:");
        for route in routes {
            info!("  {route}");
        }
    }

    /// Set up the TCP listener.
    async fn setup_listener(&self) -> Result<(TcpListener, SocketAddr), Error> {
        let addr = self.config.addr;
        let listener = TcpListener::bind(addr).await.map_err(|source| {
            error!("Failed to bind {addr}: {source}");
            Error::BindError { addr, source }
        })?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on http://{local_addr}");
        Ok((listener, local_addr))
    }

    /// Bind the listener and start accepting connections in the background.
    pub async fn listen(&self) -> Result<ServerHandle, Error> {
        let mut previous = ServerState::Created;
        let claimed = self.state.send_if_modified(|state| {
            if *state == ServerState::Listening {
                return false;
            }
            previous = *state;
            *state = ServerState::Listening;
            true
        });
        if !claimed {
            return Err(Error::AlreadyListening);
        }

        let (listener, local_addr) = match self.setup_listener().await {
            Ok(bound) => bound,
            Err(e) => {
                self.state.send_replace(previous);
                return Err(e);
            }
        };

        self.display_server_info().await;

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(Self::accept_loop(
            listener,
            self.router.clone(),
            Arc::new(self.config.clone()),
            shutdown_rx,
            self.state.clone(),
        ));

        Ok(ServerHandle {
            local_addr,
            shutdown_tx,
            state: self.state.subscribe(),
            task,
        })
    }

    /// Start the server and serve until Ctrl+C, then close it.
    pub async fn start(&self) -> Result<(), Error> {
        let mut handle = self.listen().await?;

        let interrupted = tokio::select! {
            result = signal::ctrl_c() => Some(result),
            _ = handle.stopped() => None,
        };

        match interrupted {
            Some(Ok(())) => info!("Received Ctrl+C, initiating graceful shutdown"),
            Some(Err(e)) => {
                error!("Error setting up Ctrl+C handler: {e}");
                handle.stopped().await;
            }
            None => warn!("Listener stopped, shutting down"),
        }

        handle.close().await
    }

    async fn accept_loop(
        listener: TcpListener,
        router: Arc<RwLock<Router>>,
        config: Arc<ServerConfig>,
        mut shutdown_rx: mpsc::Receiver<()>,
        state: Arc<watch::Sender<ServerState>>,
    ) {
        // Create a semaphore to limit concurrent connections
        let semaphore = Arc::new(Semaphore::new(config.max_connections));
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server...");
                    break;
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Connection task failed: {e}");
                    }
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((socket, addr)) => Self::handle_new_connection(
                            socket,
                            addr,
                            &semaphore,
                            &router,
                            &config,
                            &mut tasks,
                        ),
                        Err(e) => Self::handle_connection_error(e).await,
                    }
                }
            }
        }

        drop(listener);
        Self::perform_shutdown(&mut tasks, config.shutdown_timeout).await;

        router.write().await.reset();
        state.send_replace(ServerState::Closed);
        info!("Server closed, routes reset to defaults");
    }

    /// Spawn the task serving a newly accepted connection.
    fn handle_new_connection(
        mut socket: TcpStream,
        addr: SocketAddr,
        semaphore: &Arc<Semaphore>,
        router: &Arc<RwLock<Router>>,
        config: &Arc<ServerConfig>,
        tasks: &mut JoinSet<()>,
    ) {
        // Try to acquire a permit from the semaphore
        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Connection limit reached, rejecting connection from {addr}");
                tasks.spawn(async move {
                    let response = HttpResponse::new(StatusCode::ServiceUnavailable)
                        .with_content_type("text/plain")
                        .with_body_string("Server is at capacity, please try again later");
                    if Self::write_response(&mut socket, response).await.is_ok() {
                        Self::drain(&mut socket).await;
                    }
                });
                return;
            }
        };

        let router = router.clone();
        let config = config.clone();

        tasks.spawn(async move {
            // The permit is dropped when the task completes, releasing the semaphore slot
            let _permit = permit;
            debug!("Connection from {addr}");

            if let Err(e) = Self::handle_connection(&mut socket, router, &config).await {
                if e.is_protocol_violation() {
                    warn!("Rejected request from {addr}: {e}");
                } else {
                    error!("Error handling connection from {addr}: {e}");
                }
            }
        });
    }

    /// Handle accept errors.
    ///
    /// These are usually per-connection (the peer reset before accept) or
    /// transient resource exhaustion, so the listener keeps going.
    async fn handle_connection_error(e: std::io::Error) {
        error!("Error accepting connection: {e}");

        // Wait a bit before retrying
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    /// Wait for in-flight connections, aborting those still running after `timeout`.
    async fn perform_shutdown(tasks: &mut JoinSet<()>, timeout: Duration) {
        info!("Waiting for {len} active connections to complete...", len = tasks.len());
        let drained = tokio::time::timeout(timeout, async {
            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Aborting {len} connections still open after {timeout:?}", len = tasks.len());
            tasks.shutdown().await;
        }
    }

    /// Serve a single request on `socket`.
    ///
    /// The request is read in full, then dispatched, and the response written
    /// before the write half is shut down. Protocol violations are answered
    /// with their fixed response and still returned as errors; transport
    /// failures close the connection without a response.
    pub async fn handle_connection<S>(
        socket: &mut S,
        router: Arc<RwLock<Router>>,
        config: &ServerConfig,
    ) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let ingested = match tokio::time::timeout(config.read_timeout, read_request(&mut *socket, config)).await {
            Ok(result) => result,
            Err(_) => return Err(Error::Timeout(config.read_timeout)),
        };

        let request = match ingested {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()), // Connection closed
            Err(e) => {
                if let Some(response) = e.rejection() {
                    Self::write_response(&mut *socket, response).await?;
                    Self::drain(&mut *socket).await;
                }
                return Err(e);
            }
        };

        let response = dispatch(&router, request).await?;
        Self::write_response(socket, response).await
    }

    async fn write_response<S>(socket: &mut S, response: HttpResponse) -> Result<(), Error>
    where
        S: AsyncWrite + Unpin,
    {
        let response = response.with_header("Connection", "close");
        socket.write_all(&response.to_bytes()).await?;
        socket.flush().await?;
        if let Err(e) = socket.shutdown().await {
            debug!("Error shutting down connection: {e}");
        }
        Ok(())
    }

    // Unread request bytes would turn the close into a reset and could
    // destroy the rejection before the client reads it.
    async fn drain<S>(socket: &mut S)
    where
        S: AsyncRead + Unpin,
    {
        let _ = tokio::time::timeout(REJECT_LINGER, async {
            let mut buf = [0u8; 1024];
            let mut total = 0;
            while total < REJECT_DRAIN_LIMIT {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => total += n,
                }
            }
        })
        .await;
    }
}
