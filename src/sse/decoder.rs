//! Event-stream decoding
//!
//! [`FrameParser`] is the pure line grammar; [`EventStreamDecoder`] drives it
//! from an async byte stream (a peer's response body).

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};

use super::StreamEvent;
use crate::types::{ControlError, Result};

/// Decoded events from one peer connection
pub type EventStream = BoxStream<'static, Result<StreamEvent>>;

/// Longest line a peer may send before the stream is rejected
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// A peer sent a line longer than the parser accepts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event-stream line exceeds {limit} bytes")]
pub struct LineTooLong {
    pub limit: usize,
}

/// Incremental parser for the `text/event-stream` line format
///
/// Bytes can arrive split at any point, including mid-line; incomplete
/// lines are held until the rest arrives, up to `max_line` bytes.
#[derive(Debug)]
pub struct FrameParser {
    pending: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
    max_line: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_LEN)
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            pending: Vec::new(),
            data: Vec::new(),
            event: None,
            max_line,
        }
    }

    /// Feed a chunk, returning every event it completes
    pub fn push(&mut self, chunk: &[u8]) -> std::result::Result<Vec<StreamEvent>, LineTooLong> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if offset > self.max_line {
                return Err(self.overflow());
            }
            let mut line = &self.pending[start..end];
            if line.last() == Some(&b'\r') {
                line = &line[..line.len() - 1];
            }
            let line = String::from_utf8_lossy(line).into_owned();
            start = end + 1;
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        // consumed lines leave the buffer in one shift
        self.pending.drain(..start);

        if self.pending.len() > self.max_line {
            return Err(self.overflow());
        }
        Ok(events)
    }

    fn overflow(&mut self) -> LineTooLong {
        self.pending.clear();
        self.data.clear();
        self.event = None;
        LineTooLong {
            limit: self.max_line,
        }
    }

    /// End of input: flush an unterminated line and any event still pending
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            let line = String::from_utf8_lossy(&line).trim_end_matches('\r').to_string();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<StreamEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // id / retry carry nothing floodgate acts on
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<StreamEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(StreamEvent { event, data })
    }
}

/// Lazy event sequence over a byte stream
///
/// Ends when the source ends. A source error, or a line over the parser's
/// limit, is returned once as the final item and nothing is read after it.
pub struct EventStreamDecoder<S> {
    peer: String,
    source: S,
    parser: FrameParser,
    ready: VecDeque<StreamEvent>,
    finished: bool,
}

impl<S, E> EventStreamDecoder<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + Send,
    E: Into<ControlError>,
{
    pub fn new(peer: impl Into<String>, source: S) -> Self {
        Self {
            peer: peer.into(),
            source,
            parser: FrameParser::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }

    /// Next event, reading more bytes as needed
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            match self.source.next().await {
                Some(Ok(chunk)) => match self.parser.push(&chunk) {
                    Ok(events) => self.ready.extend(events),
                    Err(e) => {
                        self.finished = true;
                        return Some(Err(ControlError::Protocol {
                            addr: self.peer.clone(),
                            reason: e.to_string(),
                        }));
                    }
                },
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e.into()));
                }
                None => {
                    self.finished = true;
                    self.ready.extend(self.parser.finish());
                }
            }
        }
    }

    pub fn into_stream(self) -> EventStream
    where
        S: 'static,
        E: 'static,
    {
        futures::stream::unfold(self, |mut decoder| async move {
            decoder.next_event().await.map(|event| (event, decoder))
        })
        .boxed()
    }
}
