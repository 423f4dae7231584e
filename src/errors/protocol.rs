// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;
use thiserror::Error;

use crate::errors::SpaceError;
use crate::protocol::ObjectKind;

/// Frame-level errors on a connection.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Frame of {0} bytes exceeds the frame limit")]
    FrameTooLarge(usize),

    #[error("Malformed message: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Oversized and malformed frames cost one message; I/O errors end the
    /// connection.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CodecError::Io(_))
    }
}

/// Errors raised by the object registries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// Two different instances were registered under one key.
    #[error("{kind:?} '{key}' is already registered as a different instance")]
    DuplicateInstance { kind: ObjectKind, key: String },

    #[error("Unknown {kind:?} '{key}'")]
    UnknownObject { kind: ObjectKind, key: String },

    #[error("Message for {kind:?} '{key}' is missing its details")]
    MissingDetails { kind: ObjectKind, key: String },
}

/// Errors from the network protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Not connected")]
    NotConnected,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Invalid value in message: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Space(#[from] SpaceError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
