//! TCP listener: accept connections, spawn one task per connection (spec §4.8, §5).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use basicsql_auth::AuthStore;
use basicsql_engine::Engine;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::connection;

/// Default bind address if the host does not override it (spec §4.8).
pub const DEFAULT_BIND: &str = "0.0.0.0:4162";

pub struct Server {
    bind_addr: SocketAddr,
    engine: Arc<Engine>,
    auth: Arc<AuthStore>,
}

impl Server {
    pub fn new(bind_addr: SocketAddr, engine: Arc<Engine>, auth: Arc<AuthStore>) -> Self {
        Self { bind_addr, engine, auth }
    }

    /// Bind and serve until the process is killed. Each accepted connection
    /// runs as an independent task so a short-lived or long-lived connection
    /// never blocks another (spec §5, §6 HTTP bridge tolerance).
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "BasicSQL server listening");

        loop {
            match listener.accept().await {
                Ok((socket, peer)) => {
                    let engine = Arc::clone(&self.engine);
                    let auth = Arc::clone(&self.auth);
                    tokio::spawn(async move {
                        if let Err(err) = connection::handle(socket, engine, auth).await {
                            error!(%peer, "connection ended with error: {err}");
                        }
                    });
                }
                Err(err) => {
                    warn!("error accepting connection: {err}");
                }
            }
        }
    }
}
