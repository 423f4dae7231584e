// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Length-prefixed protobuf frames.

use prost::Message;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::consts::MAX_FRAME_BYTES;
use crate::errors::CodecError;
use crate::proto::Envelope;

/// Read one frame. `Ok(None)` means the peer closed the stream between
/// frames.
///
/// An oversized frame is skipped in full before the error is returned, so the
/// stream stays aligned on the next header.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Envelope>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let length = match reader.read_u32().await {
        Ok(length) => length as usize,
        Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(error) => return Err(error.into()),
    };

    if length > MAX_FRAME_BYTES {
        let mut skipped = (&mut *reader).take(length as u64);
        tokio::io::copy(&mut skipped, &mut tokio::io::sink()).await?;
        return Err(CodecError::FrameTooLarge(length));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    Ok(Some(Envelope::decode(body.as_slice())?))
}

pub async fn write_frame<W>(writer: &mut W, envelope: &Envelope) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let body = envelope.encode_to_vec();
    if body.len() > MAX_FRAME_BYTES {
        return Err(CodecError::FrameTooLarge(body.len()));
    }
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}
