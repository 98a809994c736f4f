//! Order-preserving, terminate-once wrapper around a provider stream.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::llm::{ChatStream, LLMError, StreamEvent};

/// What the client-facing side of a stream sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// A text fragment, in upstream order.
    Text(String),
    /// The upstream finished normally.
    End,
    /// The upstream failed or went idle; carries a client-safe message.
    Failed(String),
}

/// Unified error type for streaming, flattening nested Results.
enum StreamError {
    Llm(LLMError),
    Timeout,
}

type FlattenedStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, StreamError>> + Send>>;

/// Wraps a provider stream with an idle timeout.
///
/// Yields text fragments in order, then exactly one `End` or `Failed`, then
/// nothing. Dropping it drops the upstream stream, which aborts the outbound
/// connection.
pub struct RelayStream {
    inner: FlattenedStream,
    finished: bool,
}

impl RelayStream {
    pub fn new(inner: ChatStream, idle_timeout: Duration) -> Self {
        let timed_stream = inner.timeout(idle_timeout);
        let flattened = timed_stream.map(|result| match result {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(llm_err)) => Err(StreamError::Llm(llm_err)),
            Err(_elapsed) => Err(StreamError::Timeout),
        });

        Self {
            inner: Box::pin(flattened),
            finished: false,
        }
    }
}

impl Stream for RelayStream {
    type Item = Fragment;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.inner.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(StreamEvent::Token(text)))) => {
                Poll::Ready(Some(Fragment::Text(text)))
            }
            Poll::Ready(Some(Ok(StreamEvent::Done))) | Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(Some(Fragment::End))
            }
            Poll::Ready(Some(Err(StreamError::Timeout))) => {
                self.finished = true;
                warn!("upstream stream idle timeout");
                Poll::Ready(Some(Fragment::Failed("Stream idle timeout".to_string())))
            }
            Poll::Ready(Some(Err(StreamError::Llm(e)))) => {
                self.finished = true;
                warn!(error = %e, "upstream stream failed");
                let message = match e {
                    LLMError::Api {
                        detail: Some(detail),
                        ..
                    } => detail,
                    _ => "Upstream stream failed".to_string(),
                };
                Poll::Ready(Some(Fragment::Failed(message)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
