//! Line-framed transport
//!
//! Reads newline-terminated frames with a size cap, and runs the writer
//! task that drains a connection's outbound queue.

use std::io;
use std::net::IpAddr;

use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::{Message, PeerSender};
use crate::constants::MAX_MESSAGE_SIZE;

/// Read one frame, without its trailing newline.
///
/// Returns `Ok(None)` at end of stream. A frame longer than
/// [`MAX_MESSAGE_SIZE`] is an `InvalidData` error.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();
    let limit = MAX_MESSAGE_SIZE as u64 + 1;
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut frame).await?;

    if read == 0 {
        return Ok(None);
    }

    if frame.last() == Some(&b'\n') {
        frame.pop();
        if frame.last() == Some(&b'\r') {
            frame.pop();
        }
    } else if frame.len() > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "message too large"));
    }

    Ok(Some(frame))
}

/// Spawn the writer task for a connection and return its queue.
///
/// Writes are fire-and-forget: a failed write is logged and ends the task.
pub fn spawn_writer<W>(mut writer: W, peer: IpAddr) -> PeerSender
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            debug!("Sending {} to {}", message.command(), peer);
            if let Err(e) = writer.write_all(message.to_line().as_bytes()).await {
                warn!("Write to {} failed: {}", peer, e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    tx
}
