//! Dedicated writer task for the outbound stream.
//!
//! All outgoing frames flow through an mpsc channel into a single task that
//! owns the write half. Senders never contend on a lock, frames are written
//! whole (never interleaved), and frames queued close together share one
//! flush.
//!
//! ```text
//! sendRequest ──┐
//! sendRequest ──┼─► mpsc::Sender<Bytes> ─► writer task ─► subprocess stdin
//! notification ─┘
//! ```

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, RpcError};

/// Default frame-queue capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames written between flushes.
const MAX_BATCH_SIZE: usize = 64;

/// Handle for queueing frames to the writer task.
///
/// Cheaply cloneable; shared by every caller issuing requests.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
}

impl WriterHandle {
    /// Queue one encoded frame.
    ///
    /// Waits for queue space when the channel is full, which is the write
    /// path's backpressure.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ConnectionClosed`] if the writer task has exited.
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| RpcError::ConnectionClosed)
    }
}

/// Spawn the writer task over `writer` and return a handle for queueing
/// frames plus the task's join handle.
pub fn spawn_writer_task<W>(writer: W, channel_capacity: usize) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(channel_capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Receive frames and write them out, batching ready frames per flush.
async fn writer_loop<W>(mut rx: mpsc::Receiver<Bytes>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(frame) => frame,
            // All handles dropped: clean shutdown.
            None => return Ok(()),
        };

        writer.write_all(&first).await?;

        let mut batched = 1;
        while batched < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => {
                    writer.write_all(&frame).await?;
                    batched += 1;
                }
                Err(_) => break,
            }
        }

        writer.flush().await?;
    }
}
