// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Length-prefixed text frames.
//!
//! Every message on the control channel is a 32-bit network-order length
//! followed by exactly that many bytes of ASCII, no terminator. Reads and
//! writes transfer the full frame or fail; a peer that stops mid-frame is a
//! broken peer.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a frame payload. Real messages are a few dozen bytes; a
/// longer prefix means the peer is not speaking this protocol.
pub const MAX_FRAME: usize = 512;

/// Write one frame: length prefix, then the payload.
pub async fn write_frame<W>(writer: &mut W, payload: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_FRAME || !payload.is_ascii() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "unencodable frame"));
    }
    let len = (payload.len() as u32).to_be_bytes();
    writer.write_all(&len).await?;
    writer.write_all(payload.as_bytes()).await?;
    writer.flush().await
}

/// Read one frame and return its payload.
///
/// An oversized length prefix or non-ASCII payload is reported as
/// [`io::ErrorKind::InvalidData`]; EOF before a complete frame is an
/// [`io::ErrorKind::UnexpectedEof`].
pub async fn read_frame<R>(reader: &mut R) -> io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "frame length out of bounds"));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    if !payload.is_ascii() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "frame is not ASCII"));
    }
    String::from_utf8(payload)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "frame is not ASCII"))
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
