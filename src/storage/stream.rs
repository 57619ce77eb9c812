//! Lazy message streams returned by the read operations.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};

use super::Result;
use crate::message::Message;

/// Lazily decoded messages, in the order the query imposed.
///
/// The database cursor behind the stream stays open until the stream is
/// exhausted or dropped.
pub type MessageStream = BoxStream<'static, Result<Message>>;

/// Per-aggregate replay: a message stream plus the version watermark.
///
/// The watermark is the `aggregate_root_version` of the last message
/// yielded, or 0 when nothing was yielded. It is final only once the stream
/// has ended, so [`AggregateStream::watermark`] returns `None` until then.
///
/// A watermark of 0 is ambiguous: it means either that nothing matched or
/// that the last message yielded was at version 0. Callers that need to
/// tell those apart should count the messages they received.
pub struct AggregateStream {
    inner: MessageStream,
    last_version: u64,
    state: State,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Finished,
    Failed,
}

impl AggregateStream {
    pub fn new(inner: MessageStream) -> Self {
        Self {
            inner,
            last_version: 0,
            state: State::Open,
        }
    }

    /// Version of the last message yielded so far.
    pub fn last_version(&self) -> u64 {
        self.last_version
    }

    /// Final watermark, available once the stream has ended cleanly.
    pub fn watermark(&self) -> Option<u64> {
        (self.state == State::Finished).then_some(self.last_version)
    }

    /// Drain the stream, returning every message and the final watermark.
    ///
    /// Stops at the first error.
    pub async fn collect_with_watermark(mut self) -> Result<(Vec<Message>, u64)> {
        let mut messages = Vec::new();
        while let Some(message) = self.next().await {
            messages.push(message?);
        }
        Ok((messages, self.last_version))
    }
}

impl Stream for AggregateStream {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // An error ends the replay; rows after it are never decoded.
        if self.state != State::Open {
            return Poll::Ready(None);
        }
        let polled = self.inner.poll_next_unpin(cx);
        match &polled {
            Poll::Ready(Some(Ok(message))) => {
                self.last_version = message.aggregate_root_version().unwrap_or(0);
            }
            Poll::Ready(Some(Err(_))) => self.state = State::Failed,
            Poll::Ready(None) => self.state = State::Finished,
            Poll::Pending => {}
        }
        polled
    }
}
