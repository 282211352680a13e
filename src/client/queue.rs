//! Bounded outbound line queue.
//!
//! Producers hand complete protocol lines (no terminator) to an
//! [`OutboundSender`]; a single writer task takes them in order and writes
//! each one, CR-LF terminated, onto the connection.
//!
//! ```text
//! send_message / PONG / replies ──► mpsc (bounded) ──► writer task ──► socket
//! ```
//!
//! Producers never wait: a full queue drops the line and reports
//! [`QueueError::Full`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::SinkExt;
use tmi_proto::LineCodec;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedWrite;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::error::QueueError;

/// Counters shared between producers and the writer task.
#[derive(Debug, Default)]
struct Pending {
    /// Lines accepted but not yet written.
    count: AtomicUsize,
    /// Signalled when `count` drops to zero.
    idle: Notify,
}

impl Pending {
    fn finish_one(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Cloneable producer handle.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    tx: mpsc::Sender<String>,
    pending: Arc<Pending>,
    capacity: usize,
}

impl OutboundSender {
    /// Queue a line without waiting.
    ///
    /// A full queue drops the line; the drop is logged here and returned.
    pub fn enqueue(&self, line: impl Into<String>) -> Result<(), QueueError> {
        self.pending.count.fetch_add(1, Ordering::AcqRel);

        match self.tx.try_send(line.into()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(line)) => {
                self.pending.finish_one();
                error!(
                    capacity = self.capacity,
                    line = %line,
                    "Outbound queue full, dropping line"
                );
                Err(QueueError::Full {
                    capacity: self.capacity,
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.pending.finish_one();
                Err(QueueError::Closed)
            }
        }
    }

    /// Number of lines accepted but not yet written.
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::Acquire)
    }

    /// Maximum number of lines the queue holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The queue and its single consumer.
///
/// Created around the write half of a connection. Lines enqueued before
/// [`start`](Self::start) wait in the queue and are written once the
/// consumer runs.
pub struct OutboundQueue<W> {
    sender: OutboundSender,
    rx: Option<mpsc::Receiver<String>>,
    writer: Option<W>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<W>>,
}

impl<W> OutboundQueue<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a stopped queue that will write to `writer`.
    pub fn new(writer: W, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            sender: OutboundSender {
                tx,
                pending: Arc::new(Pending::default()),
                capacity: capacity.max(1),
            },
            rx: Some(rx),
            writer: Some(writer),
            shutdown: None,
            handle: None,
        }
    }

    /// Producer handle for this queue.
    pub fn sender(&self) -> OutboundSender {
        self.sender.clone()
    }

    /// Queue a line without waiting. See [`OutboundSender::enqueue`].
    pub fn enqueue(&self, line: impl Into<String>) -> Result<(), QueueError> {
        self.sender.enqueue(line)
    }

    /// True while the writer task is running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawn the writer task. `name` labels the task's tracing span.
    ///
    /// Starting an already started (or stopped) queue does nothing.
    pub fn start(&mut self, name: &str) {
        let (Some(rx), Some(writer)) = (self.rx.take(), self.writer.take()) else {
            warn!(name, "Outbound queue already started");
            return;
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let pending = Arc::clone(&self.sender.pending);
        let span = info_span!("writer", name = %name);

        self.shutdown = Some(shutdown_tx);
        self.handle = Some(tokio::spawn(
            write_lines(rx, writer, pending, shutdown_rx).instrument(span),
        ));
    }

    /// Wait until every accepted line is written, or `grace` elapses.
    ///
    /// Returns true if the queue went idle.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        let pending = &self.sender.pending;
        let idle = async {
            loop {
                let notified = pending.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if pending.count.load(Ordering::Acquire) == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(grace, idle).await.is_ok()
    }

    /// Stop the writer task and shut down the write half.
    ///
    /// Interrupts a pending take; lines still queued are dropped.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        // Dropping the receiver of a never-started queue closes it too.
        self.rx.take();

        let writer = match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(writer) => Some(writer),
                Err(e) => {
                    error!(error = %e, "Outbound writer task failed");
                    None
                }
            },
            None => self.writer.take(),
        };

        if let Some(mut writer) = writer
            && let Err(e) = writer.shutdown().await
        {
            debug!(error = %e, "Error shutting down write half");
        }
    }
}

/// Writer task body. Returns the underlying writer when stopped.
async fn write_lines<W>(
    mut rx: mpsc::Receiver<String>,
    writer: W,
    pending: Arc<Pending>,
    mut shutdown: oneshot::Receiver<()>,
) -> W
where
    W: AsyncWrite + Unpin + Send,
{
    let mut framed = FramedWrite::new(writer, LineCodec::new());

    loop {
        let line = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            line = rx.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        // SinkExt::send flushes, so every line leaves immediately.
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            result = framed.send(line) => {
                if let Err(e) = result {
                    warn!(error = %e, code = e.error_code(), "Failed to write outbound line");
                }
            }
        }
        pending.finish_one();
    }

    debug!("Outbound writer stopped");
    framed.into_inner()
}
