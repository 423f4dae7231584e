// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::task::JoinHandle;

use crate::errors::ProtocolError;
use crate::observability::messages::protocol::{AcceptFailed, ServerListening};
use crate::observability::messages::StructuredLog;
use crate::protocol::connection;
use crate::protocol::node::{Node, Side};

/// Accepts client connections and coordinates barriers.
pub struct Server {
    node: Arc<Node>,
    local_addr: SocketAddr,
    accept: JoinHandle<()>,
}

impl Server {
    /// Listen on `address` with a fresh server node. Port 0 picks a free port.
    pub async fn start(address: impl ToSocketAddrs) -> Result<Self, ProtocolError> {
        Self::start_with(Node::new(Side::Server), address).await
    }

    pub async fn start_with(node: Arc<Node>, address: impl ToSocketAddrs) -> Result<Self, ProtocolError> {
        let listener = TcpListener::bind(address).await?;
        let local_addr = listener.local_addr()?;
        ServerListening { address: local_addr }.log();
        let accept = tokio::spawn(accept_loop(node.clone(), listener));
        Ok(Self {
            node,
            local_addr,
            accept,
        })
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn connection_count(&self) -> usize {
        self.node.connection_count()
    }

    /// Raise a barrier over every connected client with the node's timeout.
    pub async fn barrier(&self) -> Result<u64, ProtocolError> {
        self.node.barrier(self.node.barrier_timeout()).await
    }

    /// Stop accepting, close every connection and drop owned objects.
    pub async fn stop(self) {
        self.node.shutdown();
        let _ = self.accept.await;
    }
}

async fn accept_loop(node: Arc<Node>, listener: TcpListener) {
    let token = node.shutdown_token();
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    if let Err(error) = connection::spawn(node.clone(), stream) {
                        AcceptFailed { reason: &error }.log();
                    }
                }
                Err(error) => AcceptFailed { reason: &error }.log(),
            },
        }
    }
}
