// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One task pair per TCP connection: a writer draining the peer's outbox and
//! a reader feeding inbound frames to the node.

use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::errors::ProtocolError;
use crate::observability::messages::protocol::{ConnectionClosed, ConnectionOpened, MessageDropped};
use crate::observability::messages::StructuredLog;
use crate::proto::Envelope;
use crate::protocol::codec::{read_frame, write_frame};
use crate::protocol::node::Node;
use crate::utils::ConnectionTag;

/// Attach `stream` to `node` and start its reader and writer tasks.
pub(crate) fn spawn(node: Arc<Node>, stream: TcpStream) -> Result<ConnectionTag, ProtocolError> {
    let peer = stream.peer_addr()?;
    stream.set_nodelay(true)?;
    let (reader, writer) = stream.into_split();
    let (tag, outbox) = node.attach_peer(peer);

    let opened = ConnectionOpened { tag, peer };
    opened.log();
    let span = opened.span("connection");

    let token = node.shutdown_token().child_token();
    tokio::spawn(write_loop(tag, writer, outbox, token.clone()).instrument(span.clone()));
    tokio::spawn(read_loop(node, tag, reader, token).instrument(span));
    Ok(tag)
}

async fn write_loop(
    tag: ConnectionTag,
    mut writer: OwnedWriteHalf,
    mut outbox: mpsc::UnboundedReceiver<Envelope>,
    token: CancellationToken,
) {
    loop {
        let envelope = tokio::select! {
            _ = token.cancelled() => break,
            next = outbox.recv() => match next {
                Some(envelope) => envelope,
                None => break,
            },
        };
        if let Err(error) = write_frame(&mut writer, &envelope).await {
            if error.is_recoverable() {
                MessageDropped { tag, reason: &error }.log();
                continue;
            }
            token.cancel();
            break;
        }
    }
    let _ = writer.shutdown().await;
}

async fn read_loop(node: Arc<Node>, tag: ConnectionTag, reader: OwnedReadHalf, token: CancellationToken) {
    let mut reader = BufReader::new(reader);
    let reason = loop {
        let frame = tokio::select! {
            _ = token.cancelled() => break "shutdown",
            frame = read_frame(&mut reader) => frame,
        };
        match frame {
            Ok(Some(envelope)) => node.handle(tag, envelope),
            Ok(None) => break "closed by peer",
            Err(error) if error.is_recoverable() => MessageDropped { tag, reason: &error }.log(),
            Err(_) => break "I/O error",
        }
    };
    token.cancel();
    node.detach_peer(tag);
    ConnectionClosed { tag, reason }.log();
}
