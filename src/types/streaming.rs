//! Types for streaming responses.

use crate::response::{FinishReason, Usage};

/// Events a vendor decoder extracts from one streamed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of content was received.
    ContentDelta { delta: String },
    /// Token counts reported by the vendor (may arrive more than once).
    Usage { usage: Usage },
    /// The vendor reported why generation stopped.
    Finish { finish_reason: FinishReason },
    /// The stream has finished.
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_event_properties() {
        let content_event = StreamEvent::ContentDelta {
            delta: "test".to_string(),
        };
        assert!(matches!(content_event, StreamEvent::ContentDelta { .. }));

        let finish = StreamEvent::Finish {
            finish_reason: FinishReason::Length,
        };
        assert_ne!(finish, StreamEvent::Done);
    }
}
