// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The state shared by both ends of a connection: object registries, peer
//! bookkeeping and the handling of every inbound message.
//!
//! Objects registered through the public API are *borrowed*: the embedding
//! application owns them and the node only relays their changes. Objects
//! created from a peer's REGISTER are *owned* and dropped again on REMOVE or
//! shutdown. Every registered object carries one relay subscription that turns
//! its change events into CONFIGURE messages for all peers except the one the
//! change came from.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::backends::MirrorProcessor;
use crate::config::consts::{DEFAULT_BARRIER_TIMEOUT_MS, DEFAULT_COMMAND_TIMEOUT_MS};
use crate::config::NodeConfig;
use crate::engine::{Configuration, ProcessorChange, ProcessorField};
use crate::errors::{ProtocolError, RegistryError};
use crate::observability::messages::protocol::{
    CommandFailed, MessageDropped, NodeStopped, ObjectRegistered, ObjectRemoved, PeerStatusChanged,
    RemoveIgnored, UnknownObject, UpdateRejected,
};
use crate::observability::messages::StructuredLog;
use crate::proto::envelope::Body;
use crate::proto::register::Details;
use crate::proto::{
    Barrier, BarrierStage, Command, CommandReply, Configure, ConfigureKind, DataPoolDetails,
    DimensionDetails, DiskBufferDetails, Envelope, NodeState, ObjectType, Ping, Pong, ProcessorDetails,
    Register, Remove, Request, SpaceDetails, Status,
};
use crate::protocol::barrier::{BarrierCoordinator, BarrierFollower};
use crate::protocol::convert::{
    configuration_from_entries, configuration_to_entries, dimension_details, processor_details,
    representation_from_code, representation_to_wire, snapshot_from_details, values_from_wire,
    values_to_wire, variant_from_wire, variant_to_wire,
};
use crate::protocol::data_pool::{DataPool, CREATE_DATA_SLICE_COMMAND};
use crate::protocol::disk_buffer::{DiskBuffer, DiskBufferChange, DiskBufferEvent};
use crate::protocol::registry::{Ownership, Registry};
use crate::protocol::root_paths::RootPathMap;
use crate::protocol::ObjectKind;
use crate::space::{Dimension, DimensionChange, DimensionKey, ParameterSpace, SpaceEvent};
use crate::traits::Processor;
use crate::utils::{ConnectionTag, Origin};

/// Which end of the star topology a node sits on. Decides the barrier role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Server,
    Client,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Server => "server",
            Side::Client => "client",
        }
    }
}

/// Serves a named COMMAND sent by a peer.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, object_id: &str, arguments: &Configuration) -> Result<Configuration, ProtocolError>;
}

struct Peer {
    sender: mpsc::UnboundedSender<Envelope>,
    address: SocketAddr,
    busy: bool,
    pongs: HashSet<u64>,
}

struct PendingCommand {
    tag: ConnectionTag,
    reply: oneshot::Sender<CommandReply>,
}

pub struct Node {
    side: Side,
    me: Weak<Node>,
    parameters: Registry<DimensionKey, Dimension>,
    spaces: Registry<String, ParameterSpace>,
    processors: Registry<String, dyn Processor>,
    disk_buffers: Registry<String, DiskBuffer>,
    data_pools: Registry<String, DataPool>,
    peers: Mutex<BTreeMap<ConnectionTag, Peer>>,
    next_connection: AtomicU64,
    next_message: AtomicU64,
    next_ping: AtomicU64,
    pending_commands: Mutex<HashMap<u64, PendingCommand>>,
    handlers: RwLock<HashMap<String, Arc<dyn CommandHandler>>>,
    busy: AtomicUsize,
    root_paths: RwLock<RootPathMap>,
    barrier_timeout: RwLock<Duration>,
    command_timeout: RwLock<Duration>,
    coordinator: BarrierCoordinator,
    follower: BarrierFollower,
    shutdown: CancellationToken,
}

fn unknown(kind: ObjectKind, key: impl fmt::Display) -> ProtocolError {
    RegistryError::UnknownObject {
        kind,
        key: key.to_string(),
    }
    .into()
}

fn object_type(code: i32) -> Result<ObjectType, ProtocolError> {
    ObjectType::try_from(code).map_err(|_| ProtocolError::UnexpectedMessage(format!("object type {}", code)))
}

fn ownership_for(origin: Origin) -> Ownership {
    match origin {
        Origin::Local => Ownership::Borrowed,
        Origin::Remote(_) => Ownership::Owned,
    }
}

impl Node {
    pub fn new(side: Side) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            side,
            me: me.clone(),
            parameters: Registry::new(ObjectKind::Parameter),
            spaces: Registry::new(ObjectKind::ParameterSpace),
            processors: Registry::new(ObjectKind::Processor),
            disk_buffers: Registry::new(ObjectKind::DiskBuffer),
            data_pools: Registry::new(ObjectKind::DataPool),
            peers: Mutex::new(BTreeMap::new()),
            next_connection: AtomicU64::new(1),
            next_message: AtomicU64::new(1),
            next_ping: AtomicU64::new(1),
            pending_commands: Mutex::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
            busy: AtomicUsize::new(0),
            root_paths: RwLock::new(RootPathMap::new()),
            barrier_timeout: RwLock::new(Duration::from_millis(DEFAULT_BARRIER_TIMEOUT_MS)),
            command_timeout: RwLock::new(Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS)),
            coordinator: BarrierCoordinator::new(),
            follower: BarrierFollower::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// A node with the barrier timeout and root path map from `config`.
    pub fn with_config(side: Side, config: &NodeConfig) -> Arc<Self> {
        let node = Self::new(side);
        node.set_barrier_timeout(Duration::from_millis(config.barrier_timeout_ms));
        node.set_root_path_map(RootPathMap::from_config(&config.root_path_map));
        node
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn set_root_path_map(&self, map: RootPathMap) {
        *self.root_paths.write() = map;
    }

    pub fn barrier_timeout(&self) -> Duration {
        *self.barrier_timeout.read()
    }

    pub fn set_barrier_timeout(&self, timeout: Duration) {
        *self.barrier_timeout.write() = timeout;
    }

    pub fn command_timeout(&self) -> Duration {
        *self.command_timeout.read()
    }

    pub fn set_command_timeout(&self, timeout: Duration) {
        *self.command_timeout.write() = timeout;
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // ------------------------------------------------------------------
    // Local registration
    // ------------------------------------------------------------------

    /// Register a free-standing dimension and announce it to every peer.
    pub fn register_parameter(&self, dimension: Arc<Dimension>) -> Result<Arc<Dimension>, RegistryError> {
        if self.adopt_dimension(&dimension, Ownership::Borrowed, Origin::Local)? {
            self.broadcast(self.register_dimension_body(&dimension), Origin::Local);
        }
        Ok(dimension)
    }

    /// Register a parameter space with all its dimensions. Dimensions added
    /// to the space later are picked up automatically.
    pub fn register_space(&self, space: Arc<ParameterSpace>) -> Result<Arc<ParameterSpace>, RegistryError> {
        if self.adopt_space(&space, Ownership::Borrowed, Origin::Local)? {
            self.broadcast(self.register_space_body(&space), Origin::Local);
        }
        Ok(space)
    }

    pub fn register_processor(&self, processor: Arc<dyn Processor>) -> Result<Arc<dyn Processor>, RegistryError> {
        if self.adopt_processor(&processor, Ownership::Borrowed, Origin::Local)? {
            self.broadcast(self.register_processor_body(processor.as_ref()), Origin::Local);
        }
        Ok(processor)
    }

    pub fn register_disk_buffer(&self, buffer: Arc<DiskBuffer>) -> Result<Arc<DiskBuffer>, RegistryError> {
        if self.adopt_disk_buffer(&buffer, Ownership::Borrowed, Origin::Local)? {
            self.broadcast(self.register_disk_buffer_body(&buffer), Origin::Local);
        }
        Ok(buffer)
    }

    /// Register a data pool. Its parameter space is registered too so peers
    /// can resolve it.
    pub fn register_data_pool(&self, pool: Arc<DataPool>) -> Result<Arc<DataPool>, RegistryError> {
        self.register_space(pool.space().clone())?;
        let inserted = self.data_pools.insert(
            pool.id().to_string(),
            pool.clone(),
            Ownership::Borrowed,
            Origin::Local,
        )?;
        if inserted {
            self.log_registered(ObjectKind::DataPool, pool.id(), Ownership::Borrowed, Origin::Local);
            self.broadcast(self.register_data_pool_body(&pool), Origin::Local);
        }
        Ok(pool)
    }

    /// Remove a registered object locally and tell every peer. Returns false
    /// if nothing was registered under that key.
    pub fn unregister(&self, kind: ObjectKind, id: &str, group: &str) -> bool {
        let removed = match kind {
            ObjectKind::Parameter => {
                let key = DimensionKey::new(id, group);
                let Some(dimension) = self.parameters.get(&key) else {
                    return false;
                };
                // Members of a registered space leave through the space so
                // its relay announces the removal.
                if let Some(space) = dimension.space_id().and_then(|space_id| self.spaces.get(&space_id)) {
                    return space.remove_dimension(id, group).is_some();
                }
                self.parameters.remove(&key).is_some()
            }
            ObjectKind::ParameterSpace => match self.spaces.remove(&id.to_string()) {
                Some(space) => {
                    self.forget_space_members(&space);
                    true
                }
                None => false,
            },
            ObjectKind::Processor => self.processors.remove(&id.to_string()).is_some(),
            ObjectKind::DiskBuffer => self.disk_buffers.remove(&id.to_string()).is_some(),
            ObjectKind::DataPool => self.data_pools.remove(&id.to_string()).is_some(),
            ObjectKind::Global => false,
        };
        if removed {
            ObjectRemoved {
                kind,
                key: id,
                origin: Origin::Local,
            }
            .log();
            self.broadcast(
                Body::Remove(Remove {
                    object_type: ObjectType::from(kind) as i32,
                    id: id.to_string(),
                    group: group.to_string(),
                    space_id: String::new(),
                }),
                Origin::Local,
            );
        }
        removed
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn parameter(&self, name: &str, group: &str) -> Option<Arc<Dimension>> {
        self.parameters.get(&DimensionKey::new(name, group))
    }

    pub fn space(&self, id: &str) -> Option<Arc<ParameterSpace>> {
        self.spaces.get(&id.to_string())
    }

    pub fn processor(&self, id: &str) -> Option<Arc<dyn Processor>> {
        self.processors.get(&id.to_string())
    }

    pub fn disk_buffer(&self, id: &str) -> Option<Arc<DiskBuffer>> {
        self.disk_buffers.get(&id.to_string())
    }

    pub fn data_pool(&self, id: &str) -> Option<Arc<DataPool>> {
        self.data_pools.get(&id.to_string())
    }

    pub fn ownership(&self, kind: ObjectKind, id: &str, group: &str) -> Option<Ownership> {
        match kind {
            ObjectKind::Parameter => self.parameters.ownership(&DimensionKey::new(id, group)),
            ObjectKind::ParameterSpace => self.spaces.ownership(&id.to_string()),
            ObjectKind::Processor => self.processors.ownership(&id.to_string()),
            ObjectKind::DiskBuffer => self.disk_buffers.ownership(&id.to_string()),
            ObjectKind::DataPool => self.data_pools.ownership(&id.to_string()),
            ObjectKind::Global => None,
        }
    }

    fn origin_of(&self, kind: ObjectKind, id: &str, group: &str) -> Option<Origin> {
        match kind {
            ObjectKind::Parameter => self.parameters.origin(&DimensionKey::new(id, group)),
            ObjectKind::ParameterSpace => self.spaces.origin(&id.to_string()),
            ObjectKind::Processor => self.processors.origin(&id.to_string()),
            ObjectKind::DiskBuffer => self.disk_buffers.origin(&id.to_string()),
            ObjectKind::DataPool => self.data_pools.origin(&id.to_string()),
            ObjectKind::Global => None,
        }
    }

    pub fn object_count(&self, kind: ObjectKind) -> usize {
        match kind {
            ObjectKind::Parameter => self.parameters.len(),
            ObjectKind::ParameterSpace => self.spaces.len(),
            ObjectKind::Processor => self.processors.len(),
            ObjectKind::DiskBuffer => self.disk_buffers.len(),
            ObjectKind::DataPool => self.data_pools.len(),
            ObjectKind::Global => {
                self.parameters.len()
                    + self.spaces.len()
                    + self.processors.len()
                    + self.disk_buffers.len()
                    + self.data_pools.len()
            }
        }
    }

    // ------------------------------------------------------------------
    // Peers
    // ------------------------------------------------------------------

    pub fn connection_tags(&self) -> Vec<ConnectionTag> {
        self.peers.lock().keys().copied().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn peer_address(&self, tag: ConnectionTag) -> Option<SocketAddr> {
        self.peers.lock().get(&tag).map(|peer| peer.address)
    }

    /// Last STATUS reported by a peer.
    pub fn peer_busy(&self, tag: ConnectionTag) -> Option<bool> {
        self.peers.lock().get(&tag).map(|peer| peer.busy)
    }

    /// True while this node serves at least one REQUEST or COMMAND.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn attach_peer(&self, address: SocketAddr) -> (ConnectionTag, mpsc::UnboundedReceiver<Envelope>) {
        let tag = ConnectionTag(self.next_connection.fetch_add(1, Ordering::SeqCst));
        let (sender, outbox) = mpsc::unbounded_channel();
        self.peers.lock().insert(
            tag,
            Peer {
                sender,
                address,
                busy: false,
                pongs: HashSet::new(),
            },
        );
        (tag, outbox)
    }

    pub(crate) fn detach_peer(&self, tag: ConnectionTag) {
        self.peers.lock().remove(&tag);
        self.coordinator.forget(tag);
        // Dropping the reply senders fails the waiting callers.
        self.pending_commands.lock().retain(|_, pending| pending.tag != tag);
    }

    fn envelope(&self, body: Body) -> Envelope {
        Envelope {
            message_id: self.next_message.fetch_add(1, Ordering::SeqCst),
            body: Some(body),
        }
    }

    fn send_envelope(&self, tag: ConnectionTag, envelope: Envelope) -> bool {
        match self.peers.lock().get(&tag) {
            Some(peer) => peer.sender.send(envelope).is_ok(),
            None => false,
        }
    }

    fn send_to(&self, tag: ConnectionTag, body: Body) -> bool {
        self.send_envelope(tag, self.envelope(body))
    }

    /// Send `body` to every peer except the one `origin` points at.
    fn broadcast(&self, body: Body, origin: Origin) {
        let envelope = self.envelope(body);
        for (tag, peer) in self.peers.lock().iter() {
            if origin.is_from(*tag) {
                continue;
            }
            let _ = peer.sender.send(envelope.clone());
        }
    }

    // ------------------------------------------------------------------
    // Requests, commands, ping
    // ------------------------------------------------------------------

    /// Ask every peer for the current state of an object, or of everything
    /// with [`ObjectKind::Global`]. Answers arrive as REGISTER messages.
    pub fn request(&self, kind: ObjectKind, id: &str, group: &str) {
        self.broadcast(Self::request_body(kind, id, group), Origin::Local);
    }

    pub(crate) fn request_from(&self, tag: ConnectionTag, kind: ObjectKind, id: &str, group: &str) -> bool {
        self.send_to(tag, Self::request_body(kind, id, group))
    }

    fn request_body(kind: ObjectKind, id: &str, group: &str) -> Body {
        Body::Request(Request {
            object_type: ObjectType::from(kind) as i32,
            id: id.to_string(),
            group: group.to_string(),
        })
    }

    pub fn register_command_handler(&self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.handlers.write().insert(name.into(), handler);
    }

    /// Run a named command on the peer that owns the object. Objects this
    /// node registered itself go to the only peer, if there is exactly one.
    pub async fn send_command(
        &self,
        kind: ObjectKind,
        id: &str,
        name: &str,
        arguments: Configuration,
    ) -> Result<Configuration, ProtocolError> {
        let tag = match self.origin_of(kind, id, "") {
            Some(Origin::Remote(tag)) => tag,
            _ => {
                let tags = self.connection_tags();
                match tags.as_slice() {
                    [only] => *only,
                    _ => return Err(ProtocolError::NotConnected),
                }
            }
        };
        self.send_command_to(tag, kind, id, name, arguments).await
    }

    pub async fn send_command_to(
        &self,
        tag: ConnectionTag,
        kind: ObjectKind,
        id: &str,
        name: &str,
        arguments: Configuration,
    ) -> Result<Configuration, ProtocolError> {
        let envelope = self.envelope(Body::Command(Command {
            object_type: ObjectType::from(kind) as i32,
            id: id.to_string(),
            name: name.to_string(),
            arguments: configuration_to_entries(&arguments),
        }));
        let message_id = envelope.message_id;
        let (sender, receiver) = oneshot::channel();
        self.pending_commands.lock().insert(
            message_id,
            PendingCommand {
                tag,
                reply: sender,
            },
        );
        if !self.send_envelope(tag, envelope) {
            self.pending_commands.lock().remove(&message_id);
            return Err(ProtocolError::NotConnected);
        }

        let timeout = self.command_timeout();
        let reply = match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => return Err(ProtocolError::NotConnected),
            Err(_) => {
                self.pending_commands.lock().remove(&message_id);
                return Err(ProtocolError::Timeout(timeout));
            }
        };
        if !reply.success {
            return Err(ProtocolError::CommandFailed(reply.error));
        }
        configuration_from_entries(&reply.results)
    }

    /// Slice `field` along `dimension` in a data pool. Pools registered here
    /// are sliced locally; owned pools are sliced by the peer they came from
    /// and the returned path is translated to this node's root.
    pub async fn create_data_slice(&self, pool_id: &str, field: &str, dimension: &str) -> Result<PathBuf, ProtocolError> {
        let pool = self
            .data_pool(pool_id)
            .ok_or_else(|| unknown(ObjectKind::DataPool, pool_id))?;
        match self.data_pools.origin(&pool_id.to_string()) {
            Some(Origin::Remote(tag)) => {
                let arguments = Configuration::new()
                    .with("field", field)
                    .with("dimension", dimension);
                let results = self
                    .send_command_to(tag, ObjectKind::DataPool, pool_id, CREATE_DATA_SLICE_COMMAND, arguments)
                    .await?;
                let path = results
                    .get_as::<String>("path")
                    .ok_or_else(|| ProtocolError::InvalidValue("slice reply without a path".to_string()))?;
                Ok(self.incoming_path(&path))
            }
            _ => {
                let (field, dimension) = (field.to_string(), dimension.to_string());
                tokio::task::spawn_blocking(move || pool.create_data_slice(&field, &dimension))
                    .await
                    .map_err(|error| ProtocolError::CommandFailed(error.to_string()))?
                    .map_err(ProtocolError::from)
            }
        }
    }

    /// Send a PING to every peer. Returns the token to check with
    /// [`Node::pong_received`].
    pub fn ping(&self) -> u64 {
        let token = self.next_ping.fetch_add(1, Ordering::SeqCst);
        self.broadcast(Body::Ping(Ping { token }), Origin::Local);
        token
    }

    /// True once every connected peer answered the ping with `token`.
    pub fn pong_received(&self, token: u64) -> bool {
        let peers = self.peers.lock();
        !peers.is_empty() && peers.values().all(|peer| peer.pongs.contains(&token))
    }

    pub fn pong_received_from(&self, tag: ConnectionTag, token: u64) -> bool {
        self.peers
            .lock()
            .get(&tag)
            .is_some_and(|peer| peer.pongs.contains(&token))
    }

    /// Block until every node reached the barrier. The server coordinates a
    /// round over its current connections; a client answers the next round
    /// the server raises.
    pub async fn barrier(&self, timeout: Duration) -> Result<u64, ProtocolError> {
        match self.side {
            Side::Server => {
                self.coordinator
                    .run(self.connection_tags(), timeout, |stage, sequence| {
                        self.broadcast(
                            Body::Barrier(Barrier {
                                stage: stage as i32,
                                sequence,
                            }),
                            Origin::Local,
                        )
                    })
                    .await
            }
            Side::Client => {
                if self.connection_count() == 0 {
                    return Err(ProtocolError::NotConnected);
                }
                self.follower
                    .run(timeout, |sequence| {
                        self.broadcast(
                            Body::Barrier(Barrier {
                                stage: BarrierStage::AckLock as i32,
                                sequence,
                            }),
                            Origin::Local,
                        )
                    })
                    .await
            }
        }
    }

    /// Close every connection and drop all owned objects. Borrowed objects
    /// stay with the application.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.peers.lock().clear();
        self.pending_commands.lock().clear();
        let dropped = self.data_pools.clear_owned()
            + self.disk_buffers.clear_owned()
            + self.processors.clear_owned()
            + self.parameters.clear_owned()
            + self.spaces.clear_owned();
        NodeStopped {
            side: self.side.as_str(),
            dropped,
        }
        .log();
    }

    // ------------------------------------------------------------------
    // Adoption and relays
    // ------------------------------------------------------------------

    fn log_registered(&self, kind: ObjectKind, key: &str, ownership: Ownership, origin: Origin) {
        ObjectRegistered {
            kind,
            key,
            ownership,
            origin,
        }
        .log();
    }

    /// Insert into the parameter registry and attach the relay. Returns true
    /// if the dimension is new to the registry.
    fn adopt_dimension(&self, dimension: &Arc<Dimension>, ownership: Ownership, origin: Origin) -> Result<bool, RegistryError> {
        let key = dimension.key().clone();
        if !self.parameters.insert(key.clone(), dimension.clone(), ownership, origin)? {
            return Ok(false);
        }
        let node = self.me.clone();
        let weak = Arc::downgrade(dimension);
        let relay = dimension.subscribe(move |event| {
            if let (Some(node), Some(dimension)) = (node.upgrade(), weak.upgrade()) {
                node.broadcast(Body::Configure(dimension_configure(&dimension, &event.change)), event.origin);
            }
        });
        self.parameters.set_relay(&key, relay);
        self.log_registered(ObjectKind::Parameter, &key.to_string(), ownership, origin);
        Ok(true)
    }

    /// Insert a space and its current members without announcing the
    /// members one by one.
    fn adopt_space(&self, space: &Arc<ParameterSpace>, ownership: Ownership, origin: Origin) -> Result<bool, RegistryError> {
        let id = space.id().to_string();
        // Dimensions are identified by name and group across all spaces.
        for dimension in space.dimensions() {
            if let Some(existing) = self.parameters.get(dimension.key()) {
                if !Arc::ptr_eq(&existing, &dimension) {
                    return Err(RegistryError::DuplicateInstance {
                        kind: ObjectKind::Parameter,
                        key: dimension.key().to_string(),
                    });
                }
            }
        }
        if !self.spaces.insert(id.clone(), space.clone(), ownership, origin)? {
            return Ok(false);
        }
        for dimension in space.dimensions() {
            if let Err(error) = self.adopt_dimension(&dimension, ownership, origin) {
                UpdateRejected {
                    kind: ObjectKind::Parameter,
                    key: &dimension.key().to_string(),
                    reason: &error,
                }
                .log();
            }
        }
        let node = self.me.clone();
        let weak = Arc::downgrade(space);
        let relay = space.subscribe(move |event| {
            if let (Some(node), Some(space)) = (node.upgrade(), weak.upgrade()) {
                node.on_space_event(&space, event);
            }
        });
        self.spaces.set_relay(&id, relay);
        self.log_registered(ObjectKind::ParameterSpace, &id, ownership, origin);
        Ok(true)
    }

    fn adopt_processor(&self, processor: &Arc<dyn Processor>, ownership: Ownership, origin: Origin) -> Result<bool, RegistryError> {
        let id = processor.id().to_string();
        if !self.processors.insert(id.clone(), processor.clone(), ownership, origin)? {
            return Ok(false);
        }
        let node = self.me.clone();
        let relay = processor.core().subscribe_changes(move |change| {
            if let Some(node) = node.upgrade() {
                node.broadcast(Body::Configure(node.processor_configure(change)), change.origin);
            }
        });
        self.processors.set_relay(&id, relay);
        self.log_registered(ObjectKind::Processor, &id, ownership, origin);
        Ok(true)
    }

    fn adopt_disk_buffer(&self, buffer: &Arc<DiskBuffer>, ownership: Ownership, origin: Origin) -> Result<bool, RegistryError> {
        let id = buffer.id().to_string();
        if !self.disk_buffers.insert(id.clone(), buffer.clone(), ownership, origin)? {
            return Ok(false);
        }
        let node = self.me.clone();
        let relay = buffer.subscribe(move |event| {
            if let Some(node) = node.upgrade() {
                node.broadcast(Body::Configure(node.disk_buffer_configure(event)), event.origin);
            }
        });
        self.disk_buffers.set_relay(&id, relay);
        self.log_registered(ObjectKind::DiskBuffer, &id, ownership, origin);
        Ok(true)
    }

    fn on_space_event(&self, space: &Arc<ParameterSpace>, event: &SpaceEvent) {
        match event {
            SpaceEvent::DimensionRegistered { key, origin } => {
                let Some(dimension) = space.get_dimension(&key.name, &key.group) else {
                    return;
                };
                match self.adopt_dimension(&dimension, ownership_for(*origin), *origin) {
                    Ok(true) => self.broadcast(self.register_dimension_body(&dimension), *origin),
                    Ok(false) => {}
                    Err(error) => UpdateRejected {
                        kind: ObjectKind::Parameter,
                        key: &key.to_string(),
                        reason: &error,
                    }
                    .log(),
                }
            }
            SpaceEvent::DimensionRemoved { key, origin } => {
                if self.parameters.remove(key).is_none() {
                    return;
                }
                ObjectRemoved {
                    kind: ObjectKind::Parameter,
                    key: &key.to_string(),
                    origin: *origin,
                }
                .log();
                self.broadcast(
                    Body::Remove(Remove {
                        object_type: ObjectType::Parameter as i32,
                        id: key.name.clone(),
                        group: key.group.clone(),
                        space_id: space.id().to_string(),
                    }),
                    *origin,
                );
            }
            SpaceEvent::RootPathChanged { path, origin } => {
                let configure = Configure {
                    object_type: ObjectType::ParameterSpace as i32,
                    id: space.id().to_string(),
                    kind: ConfigureKind::RootPath as i32,
                    text: self.outgoing_path(path),
                    ..Default::default()
                };
                self.broadcast(Body::Configure(configure), *origin);
            }
            SpaceEvent::PathTemplateChanged { template, origin } => {
                let configure = Configure {
                    object_type: ObjectType::ParameterSpace as i32,
                    id: space.id().to_string(),
                    kind: ConfigureKind::PathTemplate as i32,
                    text: template.clone(),
                    ..Default::default()
                };
                self.broadcast(Body::Configure(configure), *origin);
            }
            // Members relay their own changes.
            SpaceEvent::DimensionChanged(_) => {}
        }
    }

    fn forget_space_members(&self, space: &ParameterSpace) {
        for dimension in space.dimensions() {
            self.parameters.remove(dimension.key());
        }
    }

    // ------------------------------------------------------------------
    // Outgoing message bodies
    // ------------------------------------------------------------------

    fn outgoing_path(&self, path: &Path) -> String {
        self.root_paths.read().to_remote(path).to_string_lossy().into_owned()
    }

    fn incoming_path(&self, text: &str) -> PathBuf {
        self.root_paths.read().to_local(Path::new(text))
    }

    fn register_body(object_type: ObjectType, details: Details) -> Body {
        Body::Register(Register {
            object_type: object_type as i32,
            details: Some(details),
        })
    }

    fn register_dimension_body(&self, dimension: &Dimension) -> Body {
        Self::register_body(ObjectType::Parameter, Details::Dimension(dimension_details(dimension)))
    }

    fn register_space_body(&self, space: &ParameterSpace) -> Body {
        let details = SpaceDetails {
            id: space.id().to_string(),
            root_path: self.outgoing_path(&space.root_path()),
            path_template: space.path_template(),
            dimensions: space.dimensions().iter().map(|d| dimension_details(d)).collect(),
        };
        Self::register_body(ObjectType::ParameterSpace, Details::Space(details))
    }

    fn register_processor_body(&self, processor: &dyn Processor) -> Body {
        let mut details = processor_details(processor);
        let paths = self.root_paths.read();
        for directory in [
            &mut details.input_directory,
            &mut details.output_directory,
            &mut details.running_directory,
        ] {
            *directory = paths.to_remote(Path::new(directory.as_str())).to_string_lossy().into_owned();
        }
        Self::register_body(ObjectType::Processor, Details::Processor(details))
    }

    fn register_disk_buffer_body(&self, buffer: &DiskBuffer) -> Body {
        let details = DiskBufferDetails {
            id: buffer.id().to_string(),
            file_name: buffer.file_name().to_string(),
            path: self.outgoing_path(&buffer.path()),
            buffer_count: u32::try_from(buffer.buffer_count()).unwrap_or(u32::MAX),
            current_file: buffer.current_file().unwrap_or_default(),
        };
        Self::register_body(ObjectType::DiskBuffer, Details::DiskBuffer(details))
    }

    fn register_data_pool_body(&self, pool: &DataPool) -> Body {
        let details = DataPoolDetails {
            id: pool.id().to_string(),
            space_id: pool.space().id().to_string(),
            slice_cache_directory: self.outgoing_path(&pool.slice_cache_directory()),
            data_files: pool.data_files(),
        };
        Self::register_body(ObjectType::DataPool, Details::DataPool(details))
    }

    fn processor_configure(&self, change: &ProcessorChange) -> Configure {
        let mut configure = Configure {
            object_type: ObjectType::Processor as i32,
            id: change.processor_id.clone(),
            ..Default::default()
        };
        match &change.field {
            ProcessorField::InputDirectory(path) => {
                configure.kind = ConfigureKind::InputDirectory as i32;
                configure.text = self.outgoing_path(path);
            }
            ProcessorField::OutputDirectory(path) => {
                configure.kind = ConfigureKind::OutputDirectory as i32;
                configure.text = self.outgoing_path(path);
            }
            ProcessorField::RunningDirectory(path) => {
                configure.kind = ConfigureKind::RunningDirectory as i32;
                configure.text = self.outgoing_path(path);
            }
            ProcessorField::Enabled(enabled) => {
                configure.kind = ConfigureKind::Enabled as i32;
                configure.flag = *enabled;
            }
            ProcessorField::ConfigurationValue(key, value) => {
                configure.kind = ConfigureKind::ConfigurationValue as i32;
                configure.key = key.clone();
                configure.value = Some(variant_to_wire(value));
            }
        }
        configure
    }

    fn disk_buffer_configure(&self, event: &DiskBufferEvent) -> Configure {
        let mut configure = Configure {
            object_type: ObjectType::DiskBuffer as i32,
            id: event.id.clone(),
            ..Default::default()
        };
        match &event.change {
            DiskBufferChange::NewData(file) => {
                configure.kind = ConfigureKind::NewData as i32;
                configure.text = file.clone();
            }
            DiskBufferChange::Path(path) => {
                configure.kind = ConfigureKind::BufferPath as i32;
                configure.text = self.outgoing_path(path);
            }
        }
        configure
    }

    /// Everything this node knows, sent to one peer. Spaces go first so
    /// members and pools can resolve them.
    pub(crate) fn announce_to(&self, tag: ConnectionTag) {
        for space in self.spaces.objects() {
            self.send_to(tag, self.register_space_body(&space));
        }
        for dimension in self.parameters.objects() {
            let in_space = dimension
                .space_id()
                .is_some_and(|space_id| self.spaces.contains(&space_id));
            if !in_space {
                self.send_to(tag, self.register_dimension_body(&dimension));
            }
        }
        for processor in self.processors.objects() {
            self.send_to(tag, self.register_processor_body(processor.as_ref()));
        }
        for buffer in self.disk_buffers.objects() {
            self.send_to(tag, self.register_disk_buffer_body(&buffer));
        }
        for pool in self.data_pools.objects() {
            self.send_to(tag, self.register_data_pool_body(&pool));
        }
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Apply one message received on connection `tag`.
    pub(crate) fn handle(&self, tag: ConnectionTag, envelope: Envelope) {
        let Some(body) = envelope.body else {
            MessageDropped {
                tag,
                reason: &"empty envelope",
            }
            .log();
            return;
        };
        let result = match body {
            Body::Register(register) => self.on_register(tag, register),
            Body::Configure(configure) => self.on_configure(tag, configure),
            Body::Remove(remove) => self.on_remove(tag, remove),
            Body::Request(request) => self.on_request(tag, request),
            Body::Command(command) => {
                self.on_command(tag, envelope.message_id, command);
                Ok(())
            }
            Body::CommandReply(reply) => self.on_command_reply(reply),
            Body::Ping(ping) => {
                self.send_to(tag, Body::Pong(Pong { token: ping.token }));
                Ok(())
            }
            Body::Pong(pong) => {
                if let Some(peer) = self.peers.lock().get_mut(&tag) {
                    peer.pongs.insert(pong.token);
                }
                Ok(())
            }
            Body::Status(status) => {
                self.on_status(tag, status);
                Ok(())
            }
            Body::Barrier(barrier) => self.on_barrier(tag, barrier),
        };
        if let Err(error) = result {
            MessageDropped { tag, reason: &error }.log();
        }
    }

    fn on_register(&self, tag: ConnectionTag, register: Register) -> Result<(), ProtocolError> {
        let origin = Origin::Remote(tag);
        let kind = ObjectKind::from(object_type(register.object_type)?);
        match register.details {
            Some(Details::Dimension(details)) => self.apply_dimension(&details, origin).map(|_| ()),
            Some(Details::Space(details)) => self.apply_space(&details, origin),
            Some(Details::Processor(details)) => self.apply_processor(&details, origin),
            Some(Details::DiskBuffer(details)) => self.apply_disk_buffer(&details, origin),
            Some(Details::DataPool(details)) => self.apply_data_pool(&details, origin),
            None => Err(RegistryError::MissingDetails {
                kind,
                key: String::new(),
            }
            .into()),
        }
    }

    /// A registered dimension either joins a known space, updates the
    /// instance already registered under its key, or becomes a new owned
    /// dimension.
    fn apply_dimension(&self, details: &DimensionDetails, origin: Origin) -> Result<Arc<Dimension>, ProtocolError> {
        let snapshot = snapshot_from_details(details)?;
        let key = DimensionKey::new(details.name.as_str(), details.group.as_str());

        if let Some(space) = self.space(&details.space_id) {
            let incoming = Arc::new(Dimension::new(key.name.as_str(), key.group.as_str(), snapshot.value_type));
            incoming.apply_snapshot(snapshot, Origin::Local);
            // The space relay adopts and announces the member.
            return Ok(space.register_dimension_from(incoming, origin)?);
        }

        if let Some(existing) = self.parameters.get(&key) {
            if existing.snapshot() != snapshot {
                existing.apply_snapshot(snapshot, origin);
            }
            return Ok(existing);
        }

        let dimension = Arc::new(Dimension::new(key.name.as_str(), key.group.as_str(), snapshot.value_type));
        dimension.apply_snapshot(snapshot, Origin::Local);
        if self.adopt_dimension(&dimension, Ownership::Owned, origin)? {
            self.broadcast(self.register_dimension_body(&dimension), origin);
        }
        Ok(dimension)
    }

    fn apply_space(&self, details: &SpaceDetails, origin: Origin) -> Result<(), ProtocolError> {
        let root = self.incoming_path(&details.root_path);
        let members = details.dimensions.iter().map(|member| DimensionDetails {
            space_id: details.id.clone(),
            ..member.clone()
        });

        if let Some(space) = self.space(&details.id) {
            if space.root_path() != root {
                space.set_root_path_from(root, origin);
            }
            if space.path_template() != details.path_template {
                space.set_path_template_from(details.path_template.clone(), origin);
            }
            for member in members {
                self.apply_dimension(&member, origin)?;
            }
            return Ok(());
        }

        // Build the whole space before anyone subscribes so peers see one
        // REGISTER instead of a burst of member updates.
        let space = Arc::new(ParameterSpace::new(details.id.clone()));
        space.set_root_path(root);
        space.set_path_template(details.path_template.clone());
        for member in members {
            let dimension = match self.parameters.get(&DimensionKey::new(member.name.as_str(), member.group.as_str())) {
                Some(existing) => {
                    let snapshot = snapshot_from_details(&member)?;
                    if existing.snapshot() != snapshot {
                        existing.apply_snapshot(snapshot, origin);
                    }
                    existing
                }
                None => {
                    let snapshot = snapshot_from_details(&member)?;
                    let dimension = Dimension::new(member.name.as_str(), member.group.as_str(), snapshot.value_type);
                    dimension.apply_snapshot(snapshot, Origin::Local);
                    Arc::new(dimension)
                }
            };
            space.register_dimension(dimension)?;
        }
        if self.adopt_space(&space, Ownership::Owned, origin)? {
            self.broadcast(self.register_space_body(&space), origin);
        }
        Ok(())
    }

    fn apply_processor_details(&self, processor: &dyn Processor, details: &ProcessorDetails, origin: Origin) -> Result<(), ProtocolError> {
        let core = processor.core();
        core.set_input_directory_from(self.incoming_path(&details.input_directory), origin);
        core.set_output_directory_from(self.incoming_path(&details.output_directory), origin);
        core.set_running_directory_from(self.incoming_path(&details.running_directory), origin);
        core.set_input_files(details.input_files.clone());
        core.set_output_files(details.output_files.clone());
        core.set_enabled_from(details.enabled, origin);
        for (key, value) in configuration_from_entries(&details.configuration)?.iter() {
            core.set_configuration_value_from(key.clone(), value.clone(), origin);
        }
        Ok(())
    }

    fn apply_processor(&self, details: &ProcessorDetails, origin: Origin) -> Result<(), ProtocolError> {
        if let Some(existing) = self.processor(&details.id) {
            return self.apply_processor_details(existing.as_ref(), details, origin);
        }
        let mirror: Arc<dyn Processor> = Arc::new(MirrorProcessor::new(&details.id, details.type_name.clone()));
        self.apply_processor_details(mirror.as_ref(), details, Origin::Local)?;
        if self.adopt_processor(&mirror, Ownership::Owned, origin)? {
            self.broadcast(self.register_processor_body(mirror.as_ref()), origin);
        }
        Ok(())
    }

    fn apply_disk_buffer(&self, details: &DiskBufferDetails, origin: Origin) -> Result<(), ProtocolError> {
        let path = self.incoming_path(&details.path);
        if let Some(existing) = self.disk_buffer(&details.id) {
            if existing.path() != path {
                existing.set_path_from(path, origin);
            }
            if !details.current_file.is_empty() && existing.current_file().as_deref() != Some(details.current_file.as_str()) {
                existing.done_writing_from(&details.current_file, origin);
            }
            return Ok(());
        }
        let buffer = Arc::new(
            DiskBuffer::new(details.id.clone(), details.file_name.clone(), path)
                .with_buffer_count(details.buffer_count as usize),
        );
        if !details.current_file.is_empty() {
            buffer.done_writing(&details.current_file);
        }
        if self.adopt_disk_buffer(&buffer, Ownership::Owned, origin)? {
            self.broadcast(self.register_disk_buffer_body(&buffer), origin);
        }
        Ok(())
    }

    fn apply_data_pool(&self, details: &DataPoolDetails, origin: Origin) -> Result<(), ProtocolError> {
        let directory = self.incoming_path(&details.slice_cache_directory);
        if let Some(existing) = self.data_pool(&details.id) {
            existing.set_slice_cache_directory(directory);
            existing.set_data_files(details.data_files.clone());
            return Ok(());
        }
        let space = self
            .space(&details.space_id)
            .unwrap_or_else(|| Arc::new(ParameterSpace::new(details.space_id.clone())));
        let pool = Arc::new(DataPool::new(details.id.clone(), space, directory).with_data_files(details.data_files.clone()));
        if self
            .data_pools
            .insert(details.id.clone(), pool.clone(), Ownership::Owned, origin)?
        {
            self.log_registered(ObjectKind::DataPool, &details.id, Ownership::Owned, origin);
            self.broadcast(self.register_data_pool_body(&pool), origin);
        }
        Ok(())
    }

    fn on_configure(&self, tag: ConnectionTag, configure: Configure) -> Result<(), ProtocolError> {
        let origin = Origin::Remote(tag);
        let kind = ConfigureKind::try_from(configure.kind)
            .map_err(|_| ProtocolError::UnexpectedMessage(format!("configure kind {}", configure.kind)))?;
        let object = ObjectKind::from(object_type(configure.object_type)?);
        let mismatch = || ProtocolError::UnexpectedMessage(format!("{:?} does not apply to a {}", kind, object));

        match object {
            ObjectKind::Parameter => {
                let Some(dimension) = self.parameter(&configure.id, &configure.group) else {
                    return self.report_unknown(object, &configure.id, "CONFIGURE");
                };
                match kind {
                    ConfigureKind::CurrentIndex => {
                        let index = configure.number as usize;
                        if !dimension.set_current_index_from(index, origin) {
                            return Err(ProtocolError::InvalidValue(format!(
                                "index {} outside '{}' with {} values",
                                index,
                                dimension.key(),
                                dimension.size()
                            )));
                        }
                    }
                    ConfigureKind::Space => {
                        dimension.set_space(values_from_wire(&configure.values)?, configure.ids, origin)?;
                    }
                    ConfigureKind::Representation => {
                        dimension.set_representation_from(representation_from_code(configure.number)?, origin);
                    }
                    ConfigureKind::Stride => dimension.set_stride_from(configure.number as usize, origin),
                    _ => return Err(mismatch()),
                }
            }
            ObjectKind::ParameterSpace => {
                let Some(space) = self.space(&configure.id) else {
                    return self.report_unknown(object, &configure.id, "CONFIGURE");
                };
                match kind {
                    ConfigureKind::RootPath => space.set_root_path_from(self.incoming_path(&configure.text), origin),
                    ConfigureKind::PathTemplate => space.set_path_template_from(configure.text, origin),
                    _ => return Err(mismatch()),
                }
            }
            ObjectKind::Processor => {
                let Some(processor) = self.processor(&configure.id) else {
                    return self.report_unknown(object, &configure.id, "CONFIGURE");
                };
                let core = processor.core();
                match kind {
                    ConfigureKind::InputDirectory => core.set_input_directory_from(self.incoming_path(&configure.text), origin),
                    ConfigureKind::OutputDirectory => {
                        core.set_output_directory_from(self.incoming_path(&configure.text), origin)
                    }
                    ConfigureKind::RunningDirectory => {
                        core.set_running_directory_from(self.incoming_path(&configure.text), origin)
                    }
                    ConfigureKind::Enabled => core.set_enabled_from(configure.flag, origin),
                    ConfigureKind::ConfigurationValue => {
                        let value = configure
                            .value
                            .as_ref()
                            .ok_or_else(|| ProtocolError::InvalidValue(format!("'{}' has no value", configure.key)))?;
                        core.set_configuration_value_from(configure.key.clone(), variant_from_wire(value)?, origin);
                    }
                    _ => return Err(mismatch()),
                }
            }
            ObjectKind::DiskBuffer => {
                let Some(buffer) = self.disk_buffer(&configure.id) else {
                    return self.report_unknown(object, &configure.id, "CONFIGURE");
                };
                match kind {
                    ConfigureKind::NewData => buffer.done_writing_from(&configure.text, origin),
                    ConfigureKind::BufferPath => buffer.set_path_from(self.incoming_path(&configure.text), origin),
                    _ => return Err(mismatch()),
                }
            }
            ObjectKind::DataPool | ObjectKind::Global => return Err(mismatch()),
        }
        Ok(())
    }

    fn report_unknown(&self, kind: ObjectKind, key: &str, message: &str) -> Result<(), ProtocolError> {
        UnknownObject { kind, key, message }.log();
        Ok(())
    }

    /// Peers may only remove what they created; borrowed objects survive.
    fn on_remove(&self, tag: ConnectionTag, remove: Remove) -> Result<(), ProtocolError> {
        let origin = Origin::Remote(tag);
        let kind = ObjectKind::from(object_type(remove.object_type)?);
        let outcome = match kind {
            ObjectKind::Parameter => {
                let key = DimensionKey::new(remove.id.as_str(), remove.group.as_str());
                let member_of = self
                    .parameter(&remove.id, &remove.group)
                    .and_then(|dimension| dimension.space_id())
                    .and_then(|space_id| self.space(&space_id));
                match (self.parameters.ownership(&key), member_of) {
                    (Some(Ownership::Owned), Some(space)) => {
                        // The space relay drops and announces it.
                        space.remove_dimension_from(&remove.id, &remove.group, origin);
                        return Ok(());
                    }
                    _ => self.parameters.remove_owned(&key).map(|_| ()),
                }
            }
            ObjectKind::ParameterSpace => self.spaces.remove_owned(&remove.id).map(|space| {
                self.forget_space_members(&space);
            }),
            ObjectKind::Processor => self.processors.remove_owned(&remove.id).map(|_| ()),
            ObjectKind::DiskBuffer => self.disk_buffers.remove_owned(&remove.id).map(|_| ()),
            ObjectKind::DataPool => self.data_pools.remove_owned(&remove.id).map(|_| ()),
            ObjectKind::Global => return Err(ProtocolError::UnexpectedMessage("REMOVE of global".to_string())),
        };
        match outcome {
            Ok(()) => {
                ObjectRemoved {
                    kind,
                    key: &remove.id,
                    origin,
                }
                .log();
                self.broadcast(Body::Remove(remove), origin);
            }
            Err(Some(_)) => RemoveIgnored { kind, key: &remove.id }.log(),
            Err(None) => UnknownObject {
                kind,
                key: &remove.id,
                message: "REMOVE",
            }
            .log(),
        }
        Ok(())
    }

    fn on_request(&self, tag: ConnectionTag, request: Request) -> Result<(), ProtocolError> {
        let _busy = BusyGuard::enter(self);
        let kind = ObjectKind::from(object_type(request.object_type)?);
        let body = match kind {
            ObjectKind::Global => {
                self.announce_to(tag);
                return Ok(());
            }
            ObjectKind::Parameter => self
                .parameter(&request.id, &request.group)
                .map(|dimension| self.register_dimension_body(&dimension)),
            ObjectKind::ParameterSpace => self.space(&request.id).map(|space| self.register_space_body(&space)),
            ObjectKind::Processor => self
                .processor(&request.id)
                .map(|processor| self.register_processor_body(processor.as_ref())),
            ObjectKind::DiskBuffer => self
                .disk_buffer(&request.id)
                .map(|buffer| self.register_disk_buffer_body(&buffer)),
            ObjectKind::DataPool => self.data_pool(&request.id).map(|pool| self.register_data_pool_body(&pool)),
        };
        match body {
            Some(body) => {
                self.send_to(tag, body);
                Ok(())
            }
            None => self.report_unknown(kind, &request.id, "REQUEST"),
        }
    }

    fn on_command(&self, tag: ConnectionTag, message_id: u64, command: Command) {
        let Some(node) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            let _busy = BusyGuard::enter(&node);
            let reply = match node.serve_command(&command).await {
                Ok(results) => CommandReply {
                    request_id: message_id,
                    success: true,
                    error: String::new(),
                    results: configuration_to_entries(&results),
                },
                Err(error) => {
                    CommandFailed {
                        command: &command.name,
                        object_id: &command.id,
                        reason: &error,
                    }
                    .log();
                    CommandReply {
                        request_id: message_id,
                        success: false,
                        error: error.to_string(),
                        results: Vec::new(),
                    }
                }
            };
            node.send_to(tag, Body::CommandReply(reply));
        });
    }

    async fn serve_command(&self, command: &Command) -> Result<Configuration, ProtocolError> {
        let arguments = configuration_from_entries(&command.arguments)?;
        if command.name == CREATE_DATA_SLICE_COMMAND {
            let argument = |name: &str| {
                arguments
                    .get_as::<String>(name)
                    .ok_or_else(|| ProtocolError::InvalidValue(format!("missing argument '{}'", name)))
            };
            let (field, dimension) = (argument("field")?, argument("dimension")?);
            let path = self.create_data_slice(&command.id, &field, &dimension).await?;
            return Ok(Configuration::new().with("path", self.outgoing_path(&path)));
        }
        let handler = self
            .handlers
            .read()
            .get(&command.name)
            .cloned()
            .ok_or_else(|| ProtocolError::CommandFailed(format!("no handler for '{}'", command.name)))?;
        handler.handle(&command.id, &arguments).await
    }

    fn on_command_reply(&self, reply: CommandReply) -> Result<(), ProtocolError> {
        let pending = self
            .pending_commands
            .lock()
            .remove(&reply.request_id)
            .ok_or_else(|| ProtocolError::UnexpectedMessage(format!("reply to unknown command {}", reply.request_id)))?;
        // The caller may have timed out in the meantime.
        let _ = pending.reply.send(reply);
        Ok(())
    }

    fn on_status(&self, tag: ConnectionTag, status: Status) {
        let busy = status.state() == NodeState::Busy;
        if let Some(peer) = self.peers.lock().get_mut(&tag) {
            peer.busy = busy;
        }
        PeerStatusChanged { tag, busy }.log();
    }

    fn on_barrier(&self, tag: ConnectionTag, barrier: Barrier) -> Result<(), ProtocolError> {
        let stage = BarrierStage::try_from(barrier.stage)
            .map_err(|_| ProtocolError::UnexpectedMessage(format!("barrier stage {}", barrier.stage)))?;
        match (self.side, stage) {
            (Side::Server, BarrierStage::AckLock) => {
                self.coordinator.acknowledge(tag, barrier.sequence);
            }
            (Side::Client, BarrierStage::Request) => self.follower.on_request(barrier.sequence),
            (Side::Client, BarrierStage::Unlock) => self.follower.on_unlock(barrier.sequence),
            (side, stage) => {
                return Err(ProtocolError::UnexpectedMessage(format!(
                    "{:?} is not sent to a {}",
                    stage,
                    side.as_str()
                )))
            }
        }
        Ok(())
    }
}

fn dimension_configure(dimension: &Dimension, change: &DimensionChange) -> Configure {
    let mut configure = Configure {
        object_type: ObjectType::Parameter as i32,
        id: dimension.name().to_string(),
        group: dimension.group().to_string(),
        ..Default::default()
    };
    match change {
        DimensionChange::CurrentIndex(index) => {
            configure.kind = ConfigureKind::CurrentIndex as i32;
            configure.number = *index as u64;
        }
        DimensionChange::Space => {
            let snapshot = dimension.snapshot();
            configure.kind = ConfigureKind::Space as i32;
            configure.values = values_to_wire(&snapshot.values);
            configure.ids = snapshot.ids;
        }
        DimensionChange::Representation(representation) => {
            configure.kind = ConfigureKind::Representation as i32;
            configure.number = representation_to_wire(*representation) as i32 as u64;
        }
        DimensionChange::Stride(stride) => {
            configure.kind = ConfigureKind::Stride as i32;
            configure.number = *stride as u64;
        }
    }
    configure
}

/// Holds the node busy while a REQUEST or COMMAND is served. Peers get a
/// STATUS message on the first enter and the last exit.
struct BusyGuard<'a> {
    node: &'a Node,
}

impl<'a> BusyGuard<'a> {
    fn enter(node: &'a Node) -> Self {
        if node.busy.fetch_add(1, Ordering::SeqCst) == 0 {
            node.broadcast(
                Body::Status(Status {
                    state: NodeState::Busy as i32,
                }),
                Origin::Local,
            );
        }
        Self { node }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if self.node.busy.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.node.broadcast(
                Body::Status(Status {
                    state: NodeState::Available as i32,
                }),
                Origin::Local,
            );
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("side", &self.side)
            .field("connections", &self.connection_count())
            .field("objects", &self.object_count(ObjectKind::Global))
            .finish()
    }
}
