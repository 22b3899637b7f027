// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2026 nervosys

//! TCP ingestion server for field devices
//!
//! Every accepted connection carries exactly one request. The handler reads the
//! type byte, decodes the body, applies it to the [`SensorHub`] and, if the
//! registry accepted it, writes the [`ACK`] byte before closing. Anything else
//! (bad framing, timeout, unknown device or sensor) closes the connection
//! without a reply; the device retries on its own.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use hublib::host::LogNotifier;
//! use hublib::hub::SensorHub;
//! use hublib::server::{IngestionServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> hublib::Result<()> {
//!     let hub = Arc::new(SensorHub::in_memory(Arc::new(LogNotifier)));
//!     let server = IngestionServer::bind(ServerConfig::default(), hub).await?;
//!     server.run().await
//! }
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::codec::{self, FrameError, Request, ACK, DEFAULT_MAX_FIELD_LEN};
use crate::error::{HubError, Result};
use crate::hub::SensorHub;

/// Default listen port for field devices
pub const DEFAULT_PORT: u16 = 8901;

/// Listener and per-connection settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind (default: "0.0.0.0")
    pub host: String,
    /// Port (default: 8901, 0 picks a free port)
    pub port: u16,
    /// Deadline for reading one full request (None = wait forever)
    pub read_timeout: Option<Duration>,
    /// Largest accepted string field in bytes
    pub max_field_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            read_timeout: Some(Duration::from_secs(30)),
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Where a connection is in its single-request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Waiting for the type byte and fields
    AwaitingType,
    /// Request decoded and handed to the hub
    Dispatched,
    /// Reply (if any) written, stream shut down
    Closed,
}

/// One field-device connection
pub struct Connection<S> {
    stream: S,
    peer: String,
    state: ConnectionState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
            state: ConnectionState::AwaitingType,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Serve the single request on this connection.
    ///
    /// Returns `true` if the request was applied and acknowledged. Errors never
    /// escape; they are logged and the connection is closed.
    pub async fn serve(&mut self, hub: &Arc<SensorHub>, config: &ServerConfig) -> bool {
        let acked = match self.exchange(hub, config).await {
            Ok(acked) => acked,
            Err(HubError::Frame(e)) => {
                log::debug!("Dropped request from {} ({:?}): {}", self.peer, self.state, e);
                false
            }
            Err(e) => {
                log::warn!("Connection from {} failed: {}", self.peer, e);
                false
            }
        };

        let _ = self.stream.shutdown().await;
        self.state = ConnectionState::Closed;
        acked
    }

    async fn exchange(&mut self, hub: &Arc<SensorHub>, config: &ServerConfig) -> Result<bool> {
        let request = self.read_request(config).await?;
        self.state = ConnectionState::Dispatched;

        let hub = Arc::clone(hub);
        let applied = tokio::task::spawn_blocking(move || hub.dispatch(&request))
            .await
            .map_err(|e| HubError::Other(format!("dispatch task failed: {}", e)))?;
        if !applied {
            return Ok(false);
        }

        self.stream.write_all(&[ACK]).await?;
        self.stream.flush().await?;
        Ok(true)
    }

    async fn read_request(&mut self, config: &ServerConfig) -> Result<Request> {
        let read = codec::read_request(&mut self.stream, config.max_field_len);
        let request = match config.read_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| FrameError::Timeout)??,
            None => read.await?,
        };
        Ok(request)
    }
}

/// Bound listener plus the shared hub
pub struct IngestionServer {
    config: ServerConfig,
    hub: Arc<SensorHub>,
    listener: TcpListener,
}

impl IngestionServer {
    /// Bind the listen socket. Use port 0 to let the OS choose.
    pub async fn bind(config: ServerConfig, hub: Arc<SensorHub>) -> Result<Self> {
        let addr = config.listen_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| HubError::Other(format!("Failed to bind to {}: {}", addr, e)))?;

        Ok(Self {
            config,
            hub,
            listener,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn hub(&self) -> &Arc<SensorHub> {
        &self.hub
    }

    /// Accept connections forever
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already handed to a task are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        log::info!("Sensor hub listening on {}", self.local_addr()?);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            log::warn!("Accept error: {}", e);
                            continue;
                        }
                    };

                    let hub = Arc::clone(&self.hub);
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        let mut conn = Connection::new(stream, peer.to_string());
                        conn.serve(&hub, &config).await;
                    });
                }
            }
        }

        Ok(())
    }
}
