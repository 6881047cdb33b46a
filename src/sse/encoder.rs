//! Event-stream encoding
//!
//! Frames are handed to hyper one at a time through a bounded channel, so
//! each event is written to the caller's connection as soon as it is sent
//! rather than buffered into a full response.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use hyper::body::{Body, Frame};
use tokio::sync::mpsc;

use super::StreamEvent;
use crate::types::{ControlError, Result};

/// Serialize one event as an event-stream frame
pub fn encode_frame(event: &StreamEvent) -> Bytes {
    let mut frame = String::new();
    if let Some(name) = &event.event {
        frame.push_str("event: ");
        frame.push_str(name);
        frame.push('\n');
    }
    for line in event.data.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
    Bytes::from(frame)
}

/// Streaming half of the response sink
#[async_trait::async_trait]
pub trait EventSink: Send {
    /// Deliver one event to the caller. Fails with `CallerGone` once the
    /// caller is no longer listening.
    async fn send_event(&mut self, event: &StreamEvent) -> Result<()>;
}

/// Writes frames into an [`EventStreamBody`]
#[derive(Clone)]
pub struct EventStreamEncoder {
    tx: mpsc::Sender<Bytes>,
}

impl EventStreamEncoder {
    /// Resolves once the response body has been dropped (caller disconnected)
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait::async_trait]
impl EventSink for EventStreamEncoder {
    async fn send_event(&mut self, event: &StreamEvent) -> Result<()> {
        self.tx
            .send(encode_frame(event))
            .await
            .map_err(|_| ControlError::CallerGone)
    }
}

/// Response body fed by an [`EventStreamEncoder`]
///
/// The body ends once every encoder clone has been dropped.
pub struct EventStreamBody {
    rx: mpsc::Receiver<Bytes>,
}

impl Body for EventStreamBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<std::result::Result<Frame<Bytes>, Infallible>>> {
        self.rx
            .poll_recv(cx)
            .map(|frame| frame.map(|bytes| Ok(Frame::data(bytes))))
    }
}

/// Connected encoder / body pair
pub fn event_stream(buffer: usize) -> (EventStreamEncoder, EventStreamBody) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (EventStreamEncoder { tx }, EventStreamBody { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_encode_completion_frame() {
        assert_eq!(
            encode_frame(&StreamEvent::completion()),
            Bytes::from_static(b"data: all\n\n")
        );
    }

    #[test]
    fn test_encode_named_multiline_frame() {
        let frame = encode_frame(&StreamEvent::named("error", "line one\nline two"));
        assert_eq!(
            frame,
            Bytes::from_static(b"event: error\ndata: line one\ndata: line two\n\n")
        );
    }

    #[test]
    fn test_encoded_frame_decodes_back() {
        let event = StreamEvent::named("progress", "a\nb");
        let mut parser = crate::sse::FrameParser::new();
        assert_eq!(parser.push(&encode_frame(&event)).unwrap(), vec![event]);
    }

    #[tokio::test]
    async fn test_body_yields_one_frame_per_event() {
        let (mut encoder, mut body) = event_stream(4);
        encoder.send_event(&StreamEvent::new("first")).await.unwrap();
        encoder.send_event(&StreamEvent::completion()).await.unwrap();
        drop(encoder);

        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(first, Bytes::from_static(b"data: first\n\n"));
        let second = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(second, Bytes::from_static(b"data: all\n\n"));
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn test_send_after_body_dropped_reports_caller_gone() {
        let (mut encoder, body) = event_stream(1);
        drop(body);
        assert!(encoder.is_closed());
        let err = encoder.send_event(&StreamEvent::completion()).await.unwrap_err();
        assert!(matches!(err, ControlError::CallerGone));
    }
}
