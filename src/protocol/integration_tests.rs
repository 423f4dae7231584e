// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::backends::stub::StubProcessor;
use crate::engine::Configuration;
use crate::errors::ProtocolError;
use crate::protocol::{
    Client, CommandHandler, DataPool, DiskBuffer, Node, ObjectKind, Ownership, RootPathMap, Server, Side,
};
use crate::space::{Dimension, ParameterSpace, ValueType, VariantValue};
use crate::traits::Processor;
use crate::utils::Origin;

async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Round-trip a ping so everything sent before it has been applied.
async fn settle(client: &Client) {
    let token = client.ping();
    assert!(eventually(|| client.pong_received(token)).await);
}

async fn server() -> Server {
    Server::start("127.0.0.1:0").await.unwrap()
}

async fn client(server: &Server) -> Client {
    Client::connect(server.local_addr()).await.unwrap()
}

fn doubles(name: &str, values: &[f64]) -> Arc<Dimension> {
    let dimension = Dimension::new(name, "", ValueType::Double);
    dimension
        .set_values(values.iter().copied().map(VariantValue::Double).collect())
        .unwrap();
    Arc::new(dimension)
}

#[tokio::test]
async fn a_registered_space_reaches_every_node() {
    let server = server().await;
    let alice = client(&server).await;

    let space = Arc::new(ParameterSpace::new("scan"));
    space.set_path_template("a_%%alpha:INDEX%%");
    space
        .new_dimension("alpha", "", ValueType::Double)
        .set_values(vec![VariantValue::Double(0.1), VariantValue::Double(0.2)])
        .unwrap();
    alice.node().register_space(space.clone()).unwrap();

    let bob = client(&server).await;
    assert!(eventually(|| bob.node().parameter("alpha", "").is_some()).await);
    let mirrored = bob.node().space("scan").unwrap();
    assert_eq!(mirrored.path_template(), "a_%%alpha:INDEX%%");
    assert_eq!(bob.node().ownership(ObjectKind::ParameterSpace, "scan", ""), Some(Ownership::Owned));

    space.find_dimension("alpha").unwrap().set_current_index(1);
    assert!(eventually(|| mirrored.find_dimension("alpha").map(|d| d.current_index()) == Some(1)).await);
    assert_eq!(server.node().parameter("alpha", "").unwrap().current_index(), 1);

    server.stop().await;
}

#[tokio::test]
async fn changes_are_never_echoed_to_the_node_they_came_from() {
    let server = server().await;
    let alice = client(&server).await;
    let bob = client(&server).await;

    let dimension = alice.node().register_parameter(doubles("eci1", &[1.0, 2.0, 3.0])).unwrap();
    assert!(eventually(|| bob.node().parameter("eci1", "").is_some()).await);

    let origins = Arc::new(Mutex::new(Vec::new()));
    let sink = origins.clone();
    dimension.subscribe(move |event| sink.lock().push(event.origin));

    dimension.set_current_index(2);
    assert!(eventually(|| bob.node().parameter("eci1", "").unwrap().current_index() == 2).await);
    settle(&alice).await;

    assert_eq!(*origins.lock(), vec![Origin::Local]);
    server.stop().await;
}

#[tokio::test]
async fn duplicate_registrations_share_one_entry() {
    let server = server().await;
    let alice = client(&server).await;
    alice.node().register_parameter(doubles("eci1", &[1.0, 2.0])).unwrap();
    settle(&alice).await;

    // A second node announces its own "eci1" on connect.
    let node = Node::new(Side::Client);
    node.register_parameter(doubles("eci1", &[5.0, 6.0, 7.0])).unwrap();
    let bob = Client::connect_with(node, server.local_addr()).await.unwrap();
    settle(&bob).await;

    assert_eq!(server.node().object_count(ObjectKind::Parameter), 1);
    let shared = server.node().parameter("eci1", "").unwrap();
    assert_eq!(shared.size(), 3);
    assert!(eventually(|| alice.node().parameter("eci1", "").unwrap().size() == 3).await);

    server.stop().await;
}

#[tokio::test]
async fn barrier_returns_only_after_every_participant_arrived() {
    let server = server().await;
    let alice = client(&server).await;
    let bob = client(&server).await;
    assert!(eventually(|| server.connection_count() == 2).await);

    let started = Instant::now();
    let late_arrived = Arc::new(AtomicBool::new(false));
    let flag = late_arrived.clone();
    let early = tokio::spawn(async move { alice.barrier().await.map(|seq| (seq, alice)) });
    let late = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        flag.store(true, Ordering::SeqCst);
        bob.barrier().await.map(|seq| (seq, bob))
    });

    let sequence = server.barrier().await.unwrap();
    assert!(late_arrived.load(Ordering::SeqCst));
    assert!(started.elapsed() >= Duration::from_millis(200));

    let (early_sequence, _alice) = early.await.unwrap().unwrap();
    let (late_sequence, _bob) = late.await.unwrap().unwrap();
    assert_eq!(early_sequence, sequence);
    assert_eq!(late_sequence, sequence);

    server.stop().await;
}

#[tokio::test]
async fn barrier_times_out_when_a_client_never_arrives() {
    let server = server().await;
    let _silent = client(&server).await;
    assert!(eventually(|| server.connection_count() == 1).await);

    let result = server.node().barrier(Duration::from_millis(100)).await;
    assert!(matches!(result, Err(ProtocolError::Timeout(_))));
    server.stop().await;
}

#[tokio::test]
async fn root_paths_are_translated_in_both_directions() {
    let server = server().await;
    let mut map = RootPathMap::new();
    map.add("/srv/runs", "/home/alice/runs");
    server.node().set_root_path_map(map);
    let alice = client(&server).await;

    let space = Arc::new(ParameterSpace::new("scan"));
    space.set_root_path("/home/alice/runs/today");
    alice.node().register_space(space.clone()).unwrap();
    settle(&alice).await;

    let mirrored = server.node().space("scan").unwrap();
    assert_eq!(mirrored.root_path(), PathBuf::from("/srv/runs/today"));

    mirrored.set_root_path("/srv/runs/tomorrow");
    assert!(eventually(|| space.root_path() == Path::new("/home/alice/runs/tomorrow")).await);
    server.stop().await;
}

#[tokio::test]
async fn processor_settings_and_buffers_replicate() {
    let server = server().await;
    let alice = client(&server).await;
    let dir = tempfile::tempdir().unwrap();

    let processor: Arc<dyn Processor> = Arc::new(StubProcessor::new("solver"));
    alice.node().register_processor(processor.clone()).unwrap();
    let buffer = Arc::new(DiskBuffer::new("field", "field.json", dir.path()));
    alice.node().register_disk_buffer(buffer.clone()).unwrap();
    settle(&alice).await;

    let mirror = server.node().processor("solver").unwrap();
    processor.core().set_configuration_value("tolerance", 0.5);
    processor.core().set_enabled(false);
    buffer.write_next(b"{}").unwrap();

    assert!(eventually(|| !mirror.core().enabled()).await);
    assert_eq!(
        mirror.core().configuration().get("tolerance"),
        Some(&VariantValue::Double(0.5))
    );
    let replica = server.node().disk_buffer("field").unwrap();
    assert!(eventually(|| replica.current_file().as_deref() == Some("field_0.json")).await);

    server.stop().await;
}

#[tokio::test]
async fn removal_propagates_but_spares_borrowed_objects() {
    let server = server().await;
    let alice = client(&server).await;
    let bob = client(&server).await;

    alice.node().register_parameter(doubles("temp", &[1.0])).unwrap();
    bob.node().register_parameter(doubles("kept", &[2.0])).unwrap();
    assert!(eventually(|| bob.node().parameter("temp", "").is_some()).await);
    assert!(eventually(|| alice.node().parameter("kept", "").is_some()).await);

    assert!(alice.node().unregister(ObjectKind::Parameter, "temp", ""));
    assert!(eventually(|| bob.node().parameter("temp", "").is_none()).await);
    assert!(server.node().parameter("temp", "").is_none());

    // A remote removal never drops the registering node's own copy.
    alice.node().unregister(ObjectKind::Parameter, "kept", "");
    settle(&alice).await;
    settle(&bob).await;
    assert!(bob.node().parameter("kept", "").is_some());

    server.stop().await;
}

#[tokio::test]
async fn data_slices_are_created_by_the_owning_node() {
    let dir = tempfile::tempdir().unwrap();
    let space = Arc::new(ParameterSpace::new("grid"));
    space.set_root_path(dir.path());
    space.set_path_template("x_%%x:INDEX%%");
    space
        .new_dimension("x", "", ValueType::Int32)
        .set_values((1..=3).map(VariantValue::Int32).collect())
        .unwrap();
    for index in 0..3 {
        let run = dir.path().join(format!("x_{}", index));
        std::fs::create_dir_all(&run).unwrap();
        std::fs::write(run.join("out.json"), format!("{{\"energy\": {}}}", index * 10)).unwrap();
    }

    let server = server().await;
    let alice = client(&server).await;
    let pool = Arc::new(DataPool::new("pool", space, dir.path().join("slices")).with_data_files(["out.json"]));
    alice.node().register_data_pool(pool).unwrap();
    settle(&alice).await;

    let bob = client(&server).await;
    assert!(eventually(|| bob.node().data_pool("pool").is_some()).await);

    let path = bob.node().create_data_slice("pool", "energy", "x").await.unwrap();
    assert!(path.starts_with(dir.path().join("slices")));
    let slice: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(slice["values"], serde_json::json!([0, 10, 20]));

    let missing = server.node().create_data_slice("pool", "pressure", "x").await;
    assert!(matches!(missing, Err(ProtocolError::CommandFailed(_))));

    server.stop().await;
}

struct Doubler;

#[async_trait]
impl CommandHandler for Doubler {
    async fn handle(&self, _object_id: &str, arguments: &Configuration) -> Result<Configuration, ProtocolError> {
        let value = arguments
            .get_as::<f64>("value")
            .ok_or_else(|| ProtocolError::InvalidValue("value".to_string()))?;
        Ok(Configuration::new().with("value", value * 2.0))
    }
}

#[tokio::test]
async fn custom_commands_round_trip_through_handlers() {
    let server = server().await;
    server.node().register_command_handler("double", Arc::new(Doubler));
    let alice = client(&server).await;

    let reply = alice
        .node()
        .send_command(ObjectKind::Processor, "any", "double", Configuration::new().with("value", 2.5))
        .await
        .unwrap();
    assert_eq!(reply.get_as::<f64>("value"), Some(5.0));

    let unknown = alice
        .node()
        .send_command(ObjectKind::Processor, "any", "triple", Configuration::new())
        .await;
    assert!(matches!(unknown, Err(ProtocolError::CommandFailed(_))));
    assert!(eventually(|| !alice.server_busy()).await);

    server.stop().await;
}

#[tokio::test]
async fn pings_are_answered_by_every_peer() {
    let server = server().await;
    let alice = client(&server).await;
    let bob = client(&server).await;
    assert!(eventually(|| server.connection_count() == 2).await);

    let token = server.node().ping();
    assert!(eventually(|| server.node().pong_received(token)).await);
    settle(&alice).await;
    settle(&bob).await;

    server.stop().await;
    assert!(eventually(|| !alice.is_connected() && !bob.is_connected()).await);
}
