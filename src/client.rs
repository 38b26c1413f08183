//! Client construction and the inbound dispatch loop.
//!
//! The [`ClientBuilder`] configures the transport and attaches it to a duplex
//! byte stream (the subprocess's stdout/stdin). The [`Client`] then runs two
//! tasks:
//! 1. a reader that feeds the decode buffer and dispatches each payload
//! 2. a writer that drains the outbound frame queue
//!
//! A request's life is `sent -> resolved | rejected`, exactly once; on
//! connection loss every still-pending request is rejected so no caller
//! hangs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{Result, RpcError};
use crate::pending::PendingRequests;
use crate::protocol::{encode_message, FrameBuffer, Incoming, Notification, Request};
use crate::writer::{spawn_writer_task, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Handler invoked for every server-initiated notification, in decode order.
pub type NotificationHandler = Arc<dyn Fn(&str, Value) + Send + Sync>;

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum accepted inbound body size.
    pub max_body_size: usize,
    /// Outbound frame-queue capacity.
    pub channel_capacity: usize,
    /// Read buffer size for the inbound loop.
    pub read_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_body_size: crate::protocol::DEFAULT_MAX_BODY_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            read_buffer_size: 64 * 1024,
        }
    }
}

/// Builder for configuring and connecting a [`Client`].
pub struct ClientBuilder {
    config: ClientConfig,
    handler: Option<NotificationHandler>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            handler: None,
        }
    }

    /// Register the notification handler. Registered once at startup; a
    /// second call replaces the first.
    pub fn on_notification<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, Value) + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Set the maximum accepted inbound body size.
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Set the outbound frame-queue capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set the read buffer size for the inbound loop.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Attach the transport to a connected duplex stream and start its
    /// reader and writer tasks.
    ///
    /// `reader` is the subprocess's stdout, `writer` its stdin. The
    /// subprocess itself is spawned and owned by the caller. Must be called
    /// within a tokio runtime.
    pub fn connect<R, W>(self, reader: R, writer: W) -> Client
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer_handle, writer_task) = spawn_writer_task(writer, self.config.channel_capacity);

        let handler: NotificationHandler = self.handler.unwrap_or_else(|| {
            Arc::new(|method: &str, _params: Value| {
                tracing::debug!(%method, "unhandled server notification");
            })
        });

        let inner = Arc::new(Inner {
            next_id: AtomicU64::new(0),
            pending: PendingRequests::new(),
            writer: writer_handle,
        });

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reader_inner = inner.clone();
        let config = self.config.clone();

        // Either side failing is connection loss: a writer that died on a
        // broken pipe stops answering requests just as surely as a closed
        // inbound stream does.
        let reader_task = tokio::spawn(async move {
            tokio::select! {
                res = read_loop(reader, &reader_inner, &handler, &config) => {
                    if let Err(err) = res {
                        tracing::error!(%err, "read loop terminated");
                    }
                }
                res = writer_task => {
                    if let Ok(Err(err)) = res {
                        tracing::error!(%err, "write loop terminated");
                    }
                }
            }
            // Whatever ended the loop, nobody answers the outstanding
            // requests anymore.
            reader_inner.pending.drain_all();
            let _ = shutdown_tx.send(());
        });

        Client {
            inner,
            shutdown_rx,
            _reader_task: reader_task,
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared transport state: id counter, correlation table, write queue.
struct Inner {
    next_id: AtomicU64,
    pending: PendingRequests,
    writer: WriterHandle,
}

impl Inner {
    async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        let (_id, rx) = self.issue_request(method, params).await?;
        rx.await.map_err(|_| RpcError::ConnectionClosed)?
    }

    async fn send_request_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        let (id, rx) = self.issue_request(method, params).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(outcome) => outcome.map_err(|_| RpcError::ConnectionClosed)?,
            Err(_elapsed) => {
                // Remove the entry so the eventual response is dropped as
                // unmatched instead of accumulating in the table.
                self.pending.remove(id);
                Err(RpcError::Timeout)
            }
        }
    }

    /// Allocate an id, register the pending entry, and queue the frame.
    ///
    /// Registration happens before the write so a response racing back on
    /// the reader task always finds its entry.
    async fn issue_request(
        &self,
        method: &str,
        params: Value,
    ) -> Result<(u64, oneshot::Receiver<Result<Value>>)> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = encode_message(&Request::new(id, method, params))?;

        let (tx, rx) = oneshot::channel();
        self.pending.register(id, tx)?;

        if let Err(err) = self.writer.send(frame).await {
            self.pending.remove(id);
            return Err(err);
        }

        tracing::debug!(id, %method, "request sent");
        Ok((id, rx))
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<()> {
        let frame = encode_message(&Notification::new(method, params))?;
        self.writer.send(frame).await?;
        tracing::debug!(%method, "notification sent");
        Ok(())
    }
}

/// A connected transport to one language-server subprocess.
///
/// Constructed once per connection via [`Client::builder`]; torn down when
/// the inbound stream closes, at which point every pending request is
/// rejected with [`RpcError::ConnectionClosed`].
pub struct Client {
    inner: Arc<Inner>,
    shutdown_rx: oneshot::Receiver<()>,
    _reader_task: JoinHandle<()>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Send a request and await its correlated response.
    ///
    /// Ids are allocated from an atomic counter starting at 1; any number of
    /// requests may be outstanding, and responses resolve in whatever order
    /// they arrive.
    pub async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        self.inner.send_request(method, params).await
    }

    /// [`send_request`](Self::send_request) with a deadline. On expiry the
    /// pending entry is removed and the caller gets [`RpcError::Timeout`].
    pub async fn send_request_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        self.inner
            .send_request_with_timeout(method, params, timeout)
            .await
    }

    /// Send a fire-and-forget notification (no id, no completion signal).
    pub async fn send_notification(&self, method: &str, params: Value) -> Result<()> {
        self.inner.send_notification(method, params).await
    }

    /// A cloneable handle for issuing requests from multiple tasks.
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            inner: self.inner.clone(),
        }
    }

    /// Number of requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    /// Block until the inbound stream closes.
    ///
    /// By the time this returns, every pending request has been rejected.
    pub async fn wait_for_shutdown(self) -> Result<()> {
        let _ = self.shutdown_rx.await;
        Ok(())
    }
}

/// Cheaply cloneable request-issuing handle onto a [`Client`].
#[derive(Clone)]
pub struct ClientHandle {
    inner: Arc<Inner>,
}

impl ClientHandle {
    /// See [`Client::send_request`].
    pub async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        self.inner.send_request(method, params).await
    }

    /// See [`Client::send_request_with_timeout`].
    pub async fn send_request_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value> {
        self.inner
            .send_request_with_timeout(method, params, timeout)
            .await
    }

    /// See [`Client::send_notification`].
    pub async fn send_notification(&self, method: &str, params: Value) -> Result<()> {
        self.inner.send_notification(method, params).await
    }
}

/// Inbound loop: read chunks, extract payloads, dispatch each one.
async fn read_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    inner: &Inner,
    handler: &NotificationHandler,
    config: &ClientConfig,
) -> Result<()> {
    let mut frames = FrameBuffer::with_max_body(config.max_body_size);
    let mut buf = vec![0u8; config.read_buffer_size];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            tracing::debug!("inbound stream closed");
            return Ok(());
        }

        for payload in frames.push(&buf[..n])? {
            dispatch(payload, inner, handler);
        }
    }
}

/// Route one decoded payload.
fn dispatch(payload: Value, inner: &Inner, handler: &NotificationHandler) {
    match Incoming::classify(payload) {
        Incoming::Response { id, result } => {
            if !inner.pending.resolve(id, result) {
                tracing::debug!(id, "dropping response with no pending request");
            }
        }
        Incoming::Error { id, error } => {
            if !inner.pending.reject(id, RpcError::Server(error)) {
                tracing::debug!(id, "dropping error response with no pending request");
            }
        }
        Incoming::Notification { method, params } => {
            handler(&method, params);
        }
        Incoming::Unroutable(payload) => {
            tracing::debug!(%payload, "dropping unroutable payload");
        }
    }
}
