// Copyright (c) 2026 MCU-Debug Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Connection acceptor. Every accepted target gets its own session task; the
//! acceptor keeps listening no matter what happens to those sessions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::net::{TcpListener, TcpSocket};

use crate::config::ServerConfig;
use crate::session::{run_session, PacketHandler, SessionId};

/// Pause after a failed accept, so a persistent failure such as fd exhaustion
/// does not spin the loop.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

pub struct DebugServer {
    listener: TcpListener,
    next_id: SessionId,
}

impl DebugServer {
    /// Bind and listen. Must be called from inside a tokio runtime.
    pub fn bind(config: &ServerConfig) -> Result<Self> {
        let addr = SocketAddr::new(config.bind, config.port);
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket
            .bind(addr)
            .with_context(|| format!("failed to bind {}", addr))?;
        let listener = socket
            .listen(config.backlog)
            .with_context(|| format!("failed to listen on {}", addr))?;
        info!(
            "Listening for targets on {} (backlog {})",
            listener.local_addr()?,
            config.backlog
        );
        Ok(Self {
            listener,
            next_id: 1,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, one session task per target.
    pub async fn run<H>(mut self, handler: Arc<H>)
    where
        H: PacketHandler + ?Sized,
    {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let id = self.next_id;
                    self.next_id += 1;
                    info!("Target connected from {} (session {})", peer, id);
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("Session {}: failed to set TCP_NODELAY: {}", id, e);
                    }
                    tokio::spawn(run_session(stream, id, peer, handler.clone()));
                }
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }
}
