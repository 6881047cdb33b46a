//! Server-sent event framing
//!
//! Router peers report drain progress as a `text/event-stream`; floodgate
//! re-emits the aggregated result to its own caller in the same format.
//!
//! - [`decoder`]: bytes from one peer connection → [`StreamEvent`]s
//! - [`encoder`]: [`StreamEvent`]s → frames on the caller's response body

pub mod decoder;
pub mod encoder;

pub use decoder::{EventStream, EventStreamDecoder, FrameParser, LineTooLong, MAX_LINE_LEN};
pub use encoder::{encode_frame, event_stream, EventSink, EventStreamBody, EventStreamEncoder};

/// Content type of event-stream responses
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

/// Data value a peer sends once it has finished draining
pub const COMPLETION_SENTINEL: &str = "all";

/// One decoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// Value of the `event:` field, if the peer named the event
    pub event: Option<String>,
    pub data: String,
}

impl StreamEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
        }
    }

    /// The completion marker
    pub fn completion() -> Self {
        Self::new(COMPLETION_SENTINEL)
    }

    /// Exact match of the data payload against the completion marker
    ///
    /// The `event:` name plays no part: a peer frame named `error` whose data
    /// is `all` still marks that peer as drained.
    pub fn is_completion(&self) -> bool {
        self.data == COMPLETION_SENTINEL
    }
}
