//! In-process mock server engine.
//!
//! `LocalEngine` owns a tokio runtime. Each started contract gets its own
//! listener and accept loop on that runtime; `stop_mock_server` signals the
//! loop and every open connection to shut down.

use super::handler::{handle_contract_request, ContractServer, UnmatchedRequest};
use super::tls::create_tls_acceptor;
use super::MockServerEngine;
use crate::config::MockServerConfig;
use crate::contract::Contract;
use crate::error::EngineError;
use crate::query::DuplicatePolicy;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::RwLock;
use socket2::{Domain, Protocol, Socket, Type};
use std::collections::HashMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

/// Serves contracts from a private tokio runtime.
pub struct LocalEngine {
    runtime: Option<Runtime>,
    /// Running servers by port
    servers: RwLock<HashMap<u16, Arc<ContractServer>>>,
    tls_acceptor: Option<TlsAcceptor>,
    query_policy: DuplicatePolicy,
}

impl LocalEngine {
    /// Engine without TLS material; starts with `tls = true` fail.
    ///
    /// Incoming queries are read with [`DuplicatePolicy::Accumulate`].
    pub fn new() -> Result<Self, EngineError> {
        Self::build(None, DuplicatePolicy::Accumulate)
    }

    /// Engine configured from the TLS files and query policy of `config`.
    pub fn from_config(config: &MockServerConfig) -> Result<Self, EngineError> {
        let acceptor = config
            .tls_files
            .as_ref()
            .map(create_tls_acceptor)
            .transpose()?;
        Self::build(acceptor, config.query_duplicates)
    }

    fn build(
        tls_acceptor: Option<TlsAcceptor>,
        query_policy: DuplicatePolicy,
    ) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("pactkit-engine")
            .enable_all()
            .build()
            .map_err(EngineError::Runtime)?;
        Ok(Self {
            runtime: Some(runtime),
            servers: RwLock::new(HashMap::new()),
            tls_acceptor,
            query_policy,
        })
    }

    /// Ports with a running server
    pub fn running_ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.servers.read().keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// Whether every interaction on `port` was requested at least once.
    pub fn all_matched(&self, port: u16) -> Option<bool> {
        self.servers.read().get(&port).map(|s| s.all_matched())
    }

    /// Requests on `port` that matched no interaction.
    pub fn unmatched_requests(&self, port: u16) -> Option<Vec<UnmatchedRequest>> {
        self.servers.read().get(&port).map(|s| s.unmatched_requests())
    }

    fn runtime(&self) -> Result<&Runtime, EngineError> {
        self.runtime.as_ref().ok_or_else(|| {
            EngineError::Runtime(std::io::Error::other("engine runtime is shut down"))
        })
    }
}

impl MockServerEngine for LocalEngine {
    fn start_mock_server(
        &self,
        contract_json: &str,
        bind_address: &str,
        tls: bool,
    ) -> Result<u16, EngineError> {
        let contract = Contract::from_json(contract_json)
            .map_err(|e| EngineError::InvalidContract(e.to_string()))?;

        let acceptor = if tls {
            Some(self.tls_acceptor.clone().ok_or(EngineError::TlsUnavailable)?)
        } else {
            None
        };

        let addr = resolve(bind_address)?;
        if addr.port() != 0 && self.servers.read().contains_key(&addr.port()) {
            return Err(EngineError::Bind {
                addr: bind_address.to_string(),
                reason: "port is already served by this engine".to_string(),
            });
        }

        let runtime = self.runtime()?;
        let listener = {
            let _guard = runtime.enter();
            create_listener(addr)
        }
        .map_err(|e| EngineError::Bind {
            addr: bind_address.to_string(),
            reason: e.to_string(),
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| EngineError::Bind {
                addr: bind_address.to_string(),
                reason: e.to_string(),
            })?
            .port();

        let server = Arc::new(ContractServer::new(port, contract, self.query_policy));
        // Subscribe before spawning so a stop issued right after start is seen.
        let shutdown_rx = server.shutdown_tx.subscribe();
        runtime.spawn(accept_loop(listener, Arc::clone(&server), acceptor, shutdown_rx));

        info!(
            "Mock server bound to {}:{} ({} interactions, tls: {})",
            addr.ip(),
            port,
            server.contract.interactions.len(),
            tls
        );
        self.servers.write().insert(port, server);
        Ok(port)
    }

    fn stop_mock_server(&self, port: u16) {
        let server = self.servers.write().remove(&port);
        match server {
            Some(server) => {
                let _ = server.shutdown_tx.send(());
                info!("Mock server on port {} stopped", port);
            }
            None => debug!("No mock server on port {}, nothing to stop", port),
        }
    }
}

impl Drop for LocalEngine {
    fn drop(&mut self) {
        for (_, server) in self.servers.write().drain() {
            let _ = server.shutdown_tx.send(());
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn resolve(bind_address: &str) -> Result<SocketAddr, EngineError> {
    bind_address
        .to_socket_addrs()
        .map_err(|e| EngineError::InvalidAddress(format!("{bind_address}: {e}")))?
        .next()
        .ok_or_else(|| EngineError::InvalidAddress(bind_address.to_string()))
}

/// Create a TCP listener; must be called inside the engine runtime context.
fn create_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

async fn accept_loop(
    listener: TcpListener,
    server: Arc<ContractServer>,
    acceptor: Option<TlsAcceptor>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let port = server.port;

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        let server = Arc::clone(&server);
                        let acceptor = acceptor.clone();
                        let conn_shutdown = server.shutdown_tx.subscribe();
                        tokio::spawn(async move {
                            match acceptor {
                                Some(acceptor) => match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        serve_connection(tls_stream, server, addr, conn_shutdown)
                                            .await
                                    }
                                    Err(e) => error!("TLS handshake failed from {}: {}", addr, e),
                                },
                                None => serve_connection(stream, server, addr, conn_shutdown).await,
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error on port {}: {}", port, e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                debug!("Accept loop on port {} shutting down", port);
                break;
            }
        }
    }
}

async fn serve_connection<S>(
    stream: S,
    server: Arc<ContractServer>,
    addr: SocketAddr,
    mut shutdown_rx: broadcast::Receiver<()>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let port = server.port;
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let server = Arc::clone(&server);
        async move { handle_contract_request(req, server, addr).await }
    });

    tokio::select! {
        result = http1::Builder::new().serve_connection(io, service) => {
            if let Err(e) = result {
                debug!("Connection error on port {}: {}", port, e);
            }
        }
        _ = shutdown_rx.recv() => {
            debug!("Closing connection from {} on port {}", addr, port);
        }
    }
}
