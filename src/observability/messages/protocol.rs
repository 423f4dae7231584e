// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for network replication and barrier synchronization.

use crate::observability::messages::StructuredLog;
use crate::protocol::{ObjectKind, Ownership};
use crate::utils::{ConnectionTag, Origin};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use tracing::Span;

/// Server accepted its listening socket.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ServerListening {
    pub address: SocketAddr,
}

impl Display for ServerListening {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Synchronization server listening on {}", self.address)
    }
}

impl StructuredLog for ServerListening {
    fn log(&self) {
        tracing::info!(address = %self.address, "{}", self);
    }
}

/// A peer connection was established.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ConnectionOpened {
    pub tag: ConnectionTag,
    pub peer: SocketAddr,
}

impl Display for ConnectionOpened {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Connection {} opened with {}", self.tag, self.peer)
    }
}

impl StructuredLog for ConnectionOpened {
    fn log(&self) {
        tracing::info!(connection = %self.tag, peer = %self.peer, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "connection",
            span_name = name,
            connection = %self.tag,
            peer = %self.peer,
        )
    }
}

/// A peer connection ended.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ConnectionClosed<'a> {
    pub tag: ConnectionTag,
    pub reason: &'a str,
}

impl Display for ConnectionClosed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Connection {} closed: {}", self.tag, self.reason)
    }
}

impl StructuredLog for ConnectionClosed<'_> {
    fn log(&self) {
        tracing::info!(connection = %self.tag, reason = self.reason, "{}", self);
    }
}

/// A single inbound message was discarded; the connection stays open.
///
/// # Log Level
/// `warn!` - Peer sent something this node could not use
pub struct MessageDropped<'a> {
    pub tag: ConnectionTag,
    pub reason: &'a dyn Display,
}

impl Display for MessageDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Dropped message from {}: {}", self.tag, self.reason)
    }
}

impl StructuredLog for MessageDropped<'_> {
    fn log(&self) {
        tracing::warn!(connection = %self.tag, reason = %self.reason, "{}", self);
    }
}

/// An object entered a registry.
///
/// # Log Level
/// `debug!` - Routine replication traffic
pub struct ObjectRegistered<'a> {
    pub kind: ObjectKind,
    pub key: &'a str,
    pub ownership: Ownership,
    pub origin: Origin,
}

impl Display for ObjectRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Registered {} '{}' ({:?}, from {:?})",
            self.kind, self.key, self.ownership, self.origin
        )
    }
}

impl StructuredLog for ObjectRegistered<'_> {
    fn log(&self) {
        tracing::debug!(
            kind = %self.kind,
            key = self.key,
            ownership = ?self.ownership,
            origin = ?self.origin,
            "{}", self
        );
    }
}

/// An object left a registry.
///
/// # Log Level
/// `debug!` - Routine replication traffic
pub struct ObjectRemoved<'a> {
    pub kind: ObjectKind,
    pub key: &'a str,
    pub origin: Origin,
}

impl Display for ObjectRemoved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Removed {} '{}' (from {:?})", self.kind, self.key, self.origin)
    }
}

impl StructuredLog for ObjectRemoved<'_> {
    fn log(&self) {
        tracing::debug!(kind = %self.kind, key = self.key, origin = ?self.origin, "{}", self);
    }
}

/// A peer asked to remove an object this node registered itself.
///
/// # Log Level
/// `debug!` - Borrowed objects outlive remote removals
pub struct RemoveIgnored<'a> {
    pub kind: ObjectKind,
    pub key: &'a str,
}

impl Display for RemoveIgnored<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Ignoring remote removal of borrowed {} '{}'", self.kind, self.key)
    }
}

impl StructuredLog for RemoveIgnored<'_> {
    fn log(&self) {
        tracing::debug!(kind = %self.kind, key = self.key, "{}", self);
    }
}

/// A message referred to an object this node does not know.
///
/// # Log Level
/// `warn!` - Peers are out of sync
pub struct UnknownObject<'a> {
    pub kind: ObjectKind,
    pub key: &'a str,
    pub message: &'a str,
}

impl Display for UnknownObject<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} for unknown {} '{}'", self.message, self.kind, self.key)
    }
}

impl StructuredLog for UnknownObject<'_> {
    fn log(&self) {
        tracing::warn!(kind = %self.kind, key = self.key, message = self.message, "{}", self);
    }
}

/// A registration or update from a peer could not be applied.
///
/// # Log Level
/// `warn!` - The local copy keeps its previous state
pub struct UpdateRejected<'a> {
    pub kind: ObjectKind,
    pub key: &'a str,
    pub reason: &'a dyn Display,
}

impl Display for UpdateRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Could not apply update to {} '{}': {}", self.kind, self.key, self.reason)
    }
}

impl StructuredLog for UpdateRejected<'_> {
    fn log(&self) {
        tracing::warn!(kind = %self.kind, key = self.key, reason = %self.reason, "{}", self);
    }
}

/// A COMMAND could not be served.
///
/// # Log Level
/// `warn!` - The requesting node receives a failed reply
pub struct CommandFailed<'a> {
    pub command: &'a str,
    pub object_id: &'a str,
    pub reason: &'a dyn Display,
}

impl Display for CommandFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Command '{}' on '{}' failed: {}", self.command, self.object_id, self.reason)
    }
}

impl StructuredLog for CommandFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            command = self.command,
            object_id = self.object_id,
            reason = %self.reason,
            "{}", self
        );
    }
}

/// A peer reported busy or available.
///
/// # Log Level
/// `debug!` - Routine status traffic
pub struct PeerStatusChanged {
    pub tag: ConnectionTag,
    pub busy: bool,
}

impl Display for PeerStatusChanged {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let state = if self.busy { "busy" } else { "available" };
        write!(f, "Peer {} is {}", self.tag, state)
    }
}

impl StructuredLog for PeerStatusChanged {
    fn log(&self) {
        tracing::debug!(connection = %self.tag, busy = self.busy, "{}", self);
    }
}

/// A barrier was raised.
///
/// # Log Level
/// `debug!` - Emitted once per barrier round
pub struct BarrierStarted {
    pub sequence: u64,
    pub participants: usize,
}

impl Display for BarrierStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Barrier {} waiting for {} participant(s)", self.sequence, self.participants)
    }
}

impl StructuredLog for BarrierStarted {
    fn log(&self) {
        tracing::debug!(sequence = self.sequence, participants = self.participants, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("barrier", span_name = name, sequence = self.sequence)
    }
}

/// Every participant acknowledged the barrier.
///
/// # Log Level
/// `debug!` - Emitted once per barrier round
pub struct BarrierCompleted {
    pub sequence: u64,
    pub elapsed_ms: u128,
}

impl Display for BarrierCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Barrier {} released after {}ms", self.sequence, self.elapsed_ms)
    }
}

impl StructuredLog for BarrierCompleted {
    fn log(&self) {
        tracing::debug!(sequence = self.sequence, elapsed_ms = self.elapsed_ms as u64, "{}", self);
    }
}

/// A barrier gave up waiting.
///
/// # Log Level
/// `warn!` - Some participant never acknowledged
pub struct BarrierTimedOut {
    pub sequence: u64,
    pub pending: usize,
}

impl Display for BarrierTimedOut {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Barrier {} timed out with {} participant(s) outstanding",
            self.sequence, self.pending
        )
    }
}

impl StructuredLog for BarrierTimedOut {
    fn log(&self) {
        tracing::warn!(sequence = self.sequence, pending = self.pending, "{}", self);
    }
}

/// A node stopped and dropped the objects its peers had created.
///
/// # Log Level
/// `info!` - Important operational event
pub struct NodeStopped<'a> {
    pub side: &'a str,
    pub dropped: usize,
}

impl Display for NodeStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} stopped, dropped {} remote object(s)", self.side, self.dropped)
    }
}

impl StructuredLog for NodeStopped<'_> {
    fn log(&self) {
        tracing::info!(side = self.side, dropped = self.dropped, "{}", self);
    }
}

/// The listener failed to accept a connection.
///
/// # Log Level
/// `warn!` - The server keeps listening
pub struct AcceptFailed<'a> {
    pub reason: &'a dyn Display,
}

impl Display for AcceptFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Could not accept connection: {}", self.reason)
    }
}

impl StructuredLog for AcceptFailed<'_> {
    fn log(&self) {
        tracing::warn!(reason = %self.reason, "{}", self);
    }
}
