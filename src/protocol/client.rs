// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::errors::ProtocolError;
use crate::protocol::connection;
use crate::protocol::node::{Node, Side};
use crate::protocol::ObjectKind;
use crate::utils::ConnectionTag;

/// A connection to one server.
///
/// On connect the client announces everything already registered on its
/// node, then asks the server for its complete state.
pub struct Client {
    node: Arc<Node>,
    server: ConnectionTag,
    server_addr: SocketAddr,
}

impl Client {
    pub async fn connect(address: impl ToSocketAddrs) -> Result<Self, ProtocolError> {
        Self::connect_with(Node::new(Side::Client), address).await
    }

    pub async fn connect_with(node: Arc<Node>, address: impl ToSocketAddrs) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect(address).await?;
        let server_addr = stream.peer_addr()?;
        let server = connection::spawn(node.clone(), stream)?;
        node.announce_to(server);
        node.request_from(server, ObjectKind::Global, "", "");
        Ok(Self {
            node,
            server,
            server_addr,
        })
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn server_tag(&self) -> ConnectionTag {
        self.server
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn is_connected(&self) -> bool {
        self.node.connection_tags().contains(&self.server)
    }

    /// Wait for the server's next barrier round, acknowledge it and block
    /// until it is released.
    pub async fn barrier(&self) -> Result<u64, ProtocolError> {
        self.node.barrier(self.node.barrier_timeout()).await
    }

    pub fn ping(&self) -> u64 {
        self.node.ping()
    }

    pub fn pong_received(&self, token: u64) -> bool {
        self.node.pong_received_from(self.server, token)
    }

    /// True while the server reports itself busy.
    pub fn server_busy(&self) -> bool {
        self.node.peer_busy(self.server).unwrap_or(false)
    }

    pub fn stop(self) {
        self.node.shutdown();
    }
}
