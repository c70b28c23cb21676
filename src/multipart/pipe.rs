//! Bounded producer/consumer byte pipe.
//!
//! [`pipe`] spawns a producer task that writes chunks into a bounded channel
//! and returns the reading end as a [`Stream`]. The reader is what the HTTP
//! transport sends as the request body.
//!
//! # Guarantees
//!
//! - Chunks arrive in the order they were written.
//! - A write waits while the channel is full, so the producer can never run
//!   more than `capacity` chunks ahead of the consumer.
//! - A producer error is delivered once, as the last item, after every chunk
//!   written before it. The stream then ends.
//! - Dropping the reader makes the producer's next write fail with
//!   [`EncodeError::StreamClosed`], which ends the producer task. Everything
//!   the producer owns is dropped with it.
//! - A panicking producer ends the stream with
//!   [`EncodeError::ProducerFailed`], never with a clean end of stream.
//!
//! # Examples
//!
//! ```
//! use couchdb_stream_http::multipart::pipe;
//! use futures::StreamExt;
//!
//! # tokio_test::block_on(async {
//! let mut reader = pipe(2, |mut writer| async move {
//!     writer.write("hello ").await?;
//!     writer.write("world").await
//! });
//!
//! let mut body = Vec::new();
//! while let Some(chunk) = reader.next().await {
//!     body.extend_from_slice(&chunk.unwrap());
//! }
//! assert_eq!(body, b"hello world");
//! # });
//! ```

use crate::error::EncodeError;
use bytes::Bytes;
use futures::{FutureExt, Stream};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Writing end of a pipe, owned by the producer.
#[derive(Debug)]
pub struct PipeWriter {
    sender: mpsc::Sender<Result<Bytes, EncodeError>>,
    written: u64,
}

impl PipeWriter {
    /// Write a chunk, waiting until the consumer has room for it.
    ///
    /// Fails with [`EncodeError::StreamClosed`] once the reader is gone.
    pub async fn write(&mut self, chunk: impl Into<Bytes>) -> Result<(), EncodeError> {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return Ok(());
        }
        let len = chunk.len() as u64;
        self.sender
            .send(Ok(chunk))
            .await
            .map_err(|_| EncodeError::StreamClosed)?;
        self.written += len;
        Ok(())
    }

    /// Total bytes accepted so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

}

/// Reading end of a pipe.
///
/// Yields the producer's chunks, then at most one error, then ends.
pub struct PipeReader {
    receiver: ReceiverStream<Result<Bytes, EncodeError>>,
    finished: bool,
}

impl PipeReader {
    fn new(receiver: mpsc::Receiver<Result<Bytes, EncodeError>>) -> Self {
        PipeReader {
            receiver: ReceiverStream::new(receiver),
            finished: false,
        }
    }
}

impl Stream for PipeReader {
    type Item = Result<Bytes, EncodeError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        let polled = Pin::new(&mut self.receiver).poll_next(cx);
        match &polled {
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => {
                self.finished = true;
                // Stop the producer if it is somehow still writing.
                self.receiver.close();
            }
            _ => {}
        }
        polled
    }
}

impl std::fmt::Debug for PipeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeReader")
            .field("finished", &self.finished)
            .finish()
    }
}

/// Run `producer` on its own task and return the stream of what it writes.
///
/// `capacity` is the number of chunks that may be buffered between the two
/// ends (at least one). Must be called from within a tokio runtime.
pub fn pipe<F, Fut>(capacity: usize, producer: F) -> PipeReader
where
    F: FnOnce(PipeWriter) -> Fut,
    Fut: Future<Output = Result<(), EncodeError>> + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let errors = sender.clone();
    let task = producer(PipeWriter { sender, written: 0 });

    tokio::spawn(async move {
        let outcome = AssertUnwindSafe(task)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(EncodeError::ProducerFailed(panic_message(&*panic))));
        match outcome {
            Ok(()) => tracing::debug!("pipe producer finished"),
            Err(EncodeError::StreamClosed) => {
                tracing::debug!("pipe consumer went away, producer stopped")
            }
            Err(err) => {
                tracing::warn!("pipe producer failed: {}", err);
                // Ignored if the consumer is already gone.
                let _ = errors.send(Err(err)).await;
            }
        }
    });

    PipeReader::new(receiver)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "producer panicked".to_string()
    }
}
