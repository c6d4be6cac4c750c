//! Event normalizer - upstream frames to [`StreamEvent`]s.
//!
//! Each raw frame holds newline-delimited records. Records of interest look
//! like `data: {"type":"text","text":"Hal"}`; the `[DONE]` sentinel is a
//! no-op. Parsing is best effort: unparseable records and unknown `type`
//! discriminators are dropped without failing the session.

use serde::Deserialize;

use super::{Citation, StreamEvent};

/// Prefix of records that carry a JSON payload.
pub const DATA_PREFIX: &str = "data:";

/// End-of-stream sentinel payload.
pub const END_OF_STREAM_SENTINEL: &str = "[DONE]";

/// Text returned when the watchdog fires before any text arrived.
pub const TIMEOUT_PLACEHOLDER_TEXT: &str =
    "The AI backend did not respond in time. Please try again.";

/// Message reported when the connection ends without a terminal record.
pub const CONNECTION_LOST_MESSAGE: &str = "Upstream connection closed before the response completed";

const DEFAULT_ERROR_MESSAGE: &str = "upstream reported an error";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum UpstreamRecord {
    #[serde(alias = "delta", alias = "text_delta")]
    Text {
        #[serde(alias = "content")]
        text: String,
    },
    #[serde(alias = "source")]
    Citation {
        #[serde(default)]
        title: Option<String>,
        url: String,
    },
    #[serde(alias = "complete")]
    Done,
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Accumulates text and citations across frames of one session.
#[derive(Debug, Default)]
pub struct EventNormalizer {
    text: String,
    citations: Vec<Citation>,
    finished: bool,
}

impl EventNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses one raw frame into zero or more events.
    ///
    /// Nothing is emitted once a terminal event has been produced.
    pub fn ingest(&mut self, frame: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for line in frame.lines() {
            if self.finished {
                break;
            }
            if let Some(event) = self.ingest_record(line) {
                events.push(event);
            }
        }
        events
    }

    fn ingest_record(&mut self, line: &str) -> Option<StreamEvent> {
        let payload = line.trim_start().strip_prefix(DATA_PREFIX)?.trim();
        if payload.is_empty() || payload == END_OF_STREAM_SENTINEL {
            return None;
        }

        let record = match serde_json::from_str::<UpstreamRecord>(payload) {
            Ok(record) => record,
            Err(e) => {
                tracing::trace!(error = %e, "Dropping unparseable upstream record");
                return None;
            }
        };

        match record {
            UpstreamRecord::Text { text } => {
                if text.is_empty() {
                    return None;
                }
                self.text.push_str(&text);
                Some(StreamEvent::TextDelta(text))
            }
            UpstreamRecord::Citation { title, url } => {
                let title = title.filter(|t| !t.is_empty()).unwrap_or_else(|| url.clone());
                let citation = Citation::new(title, url);
                self.citations.push(citation.clone());
                Some(StreamEvent::Citation(citation))
            }
            UpstreamRecord::Done => Some(self.complete(None)),
            UpstreamRecord::Error { message } => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
                Some(self.fail(message))
            }
            UpstreamRecord::Unknown => None,
        }
    }

    /// Synthetic completion used when the watchdog fires.
    ///
    /// Carries the partial text, or the placeholder if nothing arrived.
    pub fn time_out(&mut self) -> StreamEvent {
        let fallback = if self.text.is_empty() {
            Some(TIMEOUT_PLACEHOLDER_TEXT)
        } else {
            None
        };
        self.complete(fallback)
    }

    /// Synthetic failure used when the connection is lost mid-stream.
    pub fn connection_lost(&mut self) -> StreamEvent {
        self.fail(CONNECTION_LOST_MESSAGE.to_string())
    }

    fn complete(&mut self, fallback_text: Option<&str>) -> StreamEvent {
        self.finished = true;
        let full_text = match fallback_text {
            Some(text) => text.to_string(),
            None => self.text.clone(),
        };
        StreamEvent::Completed {
            full_text,
            citations: self.citations.clone(),
        }
    }

    fn fail(&mut self, message: String) -> StreamEvent {
        self.finished = true;
        StreamEvent::Failed(message)
    }

    /// True once a terminal event has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Text accumulated so far.
    pub fn partial_text(&self) -> &str {
        &self.text
    }

    /// Citations accumulated so far, in arrival order.
    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn data(json: &str) -> String {
        format!("data: {}\n", json)
    }

    #[test]
    fn text_records_emit_deltas_and_accumulate() {
        let mut normalizer = EventNormalizer::new();
        let events = normalizer.ingest(&data(r#"{"type":"text","text":"Hal"}"#));
        assert_eq!(events, vec![StreamEvent::TextDelta("Hal".to_string())]);

        normalizer.ingest(&data(r#"{"type":"text","text":"o!"}"#));
        assert_eq!(normalizer.partial_text(), "Halo!");
    }

    #[test]
    fn one_frame_may_carry_several_records() {
        let mut normalizer = EventNormalizer::new();
        let frame = format!(
            "{}{}{}",
            data(r#"{"type":"text","text":"Hal"}"#),
            data(r#"{"type":"text","text":"o!"}"#),
            data(r#"{"type":"citation","title":"X","url":"http://x"}"#),
        );

        let events = normalizer.ingest(&frame);

        assert_eq!(events.len(), 3);
        assert_eq!(events[2], StreamEvent::Citation(Citation::new("X", "http://x")));
    }

    #[test]
    fn done_emits_completed_with_accumulated_state() {
        let mut normalizer = EventNormalizer::new();
        normalizer.ingest(&data(r#"{"type":"text","text":"Hal"}"#));
        normalizer.ingest(&data(r#"{"type":"text","text":"o!"}"#));
        normalizer.ingest(&data(r#"{"type":"citation","title":"X","url":"http://x"}"#));

        let events = normalizer.ingest(&data(r#"{"type":"done"}"#));

        assert_eq!(
            events,
            vec![StreamEvent::Completed {
                full_text: "Halo!".to_string(),
                citations: vec![Citation::new("X", "http://x")],
            }]
        );
        assert!(normalizer.is_finished());
    }

    #[test]
    fn error_record_emits_failed_with_upstream_message() {
        let mut normalizer = EventNormalizer::new();
        let events = normalizer.ingest(&data(r#"{"type":"error","message":"quota exhausted"}"#));
        assert_eq!(events, vec![StreamEvent::Failed("quota exhausted".to_string())]);
    }

    #[test]
    fn error_record_without_message_uses_default() {
        let mut normalizer = EventNormalizer::new();
        let events = normalizer.ingest(&data(r#"{"type":"error"}"#));
        assert_eq!(
            events,
            vec![StreamEvent::Failed("upstream reported an error".to_string())]
        );
    }

    #[test]
    fn nothing_is_emitted_after_terminal() {
        let mut normalizer = EventNormalizer::new();
        let frame = format!(
            "{}{}",
            data(r#"{"type":"done"}"#),
            data(r#"{"type":"text","text":"late"}"#),
        );

        let events = normalizer.ingest(&frame);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_terminal());

        let later = normalizer.ingest(&data(r#"{"type":"text","text":"later"}"#));
        assert!(later.is_empty());
    }

    #[test]
    fn sentinel_and_noise_are_ignored() {
        let mut normalizer = EventNormalizer::new();
        let frame = "data: [DONE]\n: keep-alive\nevent: message\ndata: {not json\n\ndata:\n";
        assert!(normalizer.ingest(frame).is_empty());
        assert!(!normalizer.is_finished());
    }

    #[test]
    fn unknown_discriminators_are_ignored() {
        let mut normalizer = EventNormalizer::new();
        let events = normalizer.ingest(&data(r#"{"type":"usage","tokens":12}"#));
        assert!(events.is_empty());
    }

    #[test]
    fn record_missing_required_field_is_dropped() {
        let mut normalizer = EventNormalizer::new();
        let events = normalizer.ingest(&data(r#"{"type":"text"}"#));
        assert!(events.is_empty());
        assert_eq!(normalizer.partial_text(), "");
    }

    #[test]
    fn aliases_are_accepted() {
        let mut normalizer = EventNormalizer::new();
        let frame = format!(
            "{}{}{}",
            data(r#"{"type":"delta","content":"a"}"#),
            data(r#"{"type":"source","url":"http://s"}"#),
            data(r#"{"type":"complete"}"#),
        );

        let events = normalizer.ingest(&frame);

        assert_eq!(events[0], StreamEvent::TextDelta("a".to_string()));
        assert_eq!(events[1], StreamEvent::Citation(Citation::new("http://s", "http://s")));
        assert!(events[2].is_terminal());
    }

    #[test]
    fn crlf_frames_are_split_per_record() {
        let mut normalizer = EventNormalizer::new();
        let frame = "data: {\"type\":\"text\",\"text\":\"a\"}\r\ndata: {\"type\":\"text\",\"text\":\"b\"}\r\n";
        assert_eq!(normalizer.ingest(frame).len(), 2);
        assert_eq!(normalizer.partial_text(), "ab");
    }

    #[test]
    fn time_out_keeps_partial_text() {
        let mut normalizer = EventNormalizer::new();
        normalizer.ingest(&data(r#"{"type":"text","text":"partial"}"#));

        let event = normalizer.time_out();

        assert_eq!(
            event,
            StreamEvent::Completed {
                full_text: "partial".to_string(),
                citations: vec![],
            }
        );
    }

    #[test]
    fn time_out_without_text_uses_placeholder() {
        let mut normalizer = EventNormalizer::new();
        match normalizer.time_out() {
            StreamEvent::Completed { full_text, .. } => {
                assert_eq!(full_text, TIMEOUT_PLACEHOLDER_TEXT)
            }
            other => panic!("expected Completed, got {:?}", other),
        }
    }

    #[test]
    fn connection_lost_is_failure() {
        let mut normalizer = EventNormalizer::new();
        assert_eq!(
            normalizer.connection_lost(),
            StreamEvent::Failed(CONNECTION_LOST_MESSAGE.to_string())
        );
        assert!(normalizer.is_finished());
    }

    proptest! {
        #[test]
        fn citation_order_matches_arrival_order(
            titles in proptest::collection::vec("[a-zA-Z0-9 ]{0,12}", 0..20)
        ) {
            let mut normalizer = EventNormalizer::new();
            for (i, title) in titles.iter().enumerate() {
                let record = serde_json::json!({
                    "type": "citation",
                    "title": title,
                    "url": format!("http://example.com/{}", i),
                });
                normalizer.ingest(&format!("data: {}\n", record));
            }

            let events = normalizer.ingest("data: {\"type\":\"done\"}\n");
            let citations = match &events[0] {
                StreamEvent::Completed { citations, .. } => citations.clone(),
                other => panic!("expected Completed, got {:?}", other),
            };

            prop_assert_eq!(citations.len(), titles.len());
            for (i, citation) in citations.iter().enumerate() {
                prop_assert_eq!(&citation.url, &format!("http://example.com/{}", i));
            }
        }
    }
}
