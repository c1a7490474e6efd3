//! SSE decoding for `POST /chat-messages` in streaming mode.
//!
//! Dify embeds the event name inside the JSON payload (`{"event": "message", ...}`)
//! and only uses bare `event:` lines for keep-alive pings:
//!
//! ```text
//! data: {"event":"message","task_id":"t1","message_id":"m1","conversation_id":"c1","answer":"Hi"}
//!
//! event: ping
//!
//! data: {"event":"message_end","message_id":"m1","conversation_id":"c1","metadata":{...}}
//! ```
//!
//! Chunks from the network can split anywhere, including inside a UTF-8
//! sequence, so the decoder buffers raw bytes and only decodes complete lines.

use log::{debug, warn};
use serde::Deserialize;

use super::types::{AgentThought, MessageFile, RetrieverResource};

/// A decoded streaming event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// Answer delta (`message` and `agent_message`).
    Message(AnswerChunk),
    /// Replaces the whole answer so far (content moderation).
    MessageReplace(AnswerChunk),
    AgentThought(AgentThought),
    MessageFile(MessageFile),
    MessageEnd(MessageEnd),
    Error(StreamError),
    Ping,
    /// Events the chat view doesn't use (workflow/node progress, tts).
    Other(String),
}

impl ChatEvent {
    /// Ids carried by the event, if any: `(conversation_id, message_id, task_id)`.
    pub fn ids(&self) -> Option<(&str, &str, &str)> {
        match self {
            ChatEvent::Message(c) | ChatEvent::MessageReplace(c) => {
                Some((&c.conversation_id, &c.message_id, &c.task_id))
            }
            ChatEvent::MessageEnd(e) => Some((&e.conversation_id, &e.message_id, &e.task_id)),
            _ => None,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AnswerChunk {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub task_id: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MessageEnd {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub metadata: MessageEndMetadata,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MessageEndMetadata {
    #[serde(default)]
    pub retriever_resources: Vec<RetrieverResource>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StreamError {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub task_id: String,
}

/// Envelope used to read the event name before parsing the full payload.
#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    event: String,
}

/// Parse a single `data:` payload into a [`ChatEvent`].
pub fn parse_event(data: &str) -> Result<ChatEvent, serde_json::Error> {
    let envelope: Envelope = serde_json::from_str(data)?;
    let event = match envelope.event.as_str() {
        "message" | "agent_message" => ChatEvent::Message(serde_json::from_str(data)?),
        "message_replace" => ChatEvent::MessageReplace(serde_json::from_str(data)?),
        "agent_thought" => ChatEvent::AgentThought(serde_json::from_str(data)?),
        "message_file" => ChatEvent::MessageFile(serde_json::from_str(data)?),
        "message_end" => ChatEvent::MessageEnd(serde_json::from_str(data)?),
        "error" => ChatEvent::Error(serde_json::from_str(data)?),
        "ping" => ChatEvent::Ping,
        other => ChatEvent::Other(other.to_string()),
    };
    Ok(event)
}

/// Incremental line decoder for the chat event stream.
#[derive(Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes; returns every event completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<ChatEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = decode_line(line.trim()) {
                events.push(event);
            }
        }

        events
    }

    /// Flush a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Vec<ChatEvent> {
        if self.pending.is_empty() {
            return Vec::new();
        }
        let rest = std::mem::take(&mut self.pending);
        let line = String::from_utf8_lossy(&rest);
        decode_line(line.trim()).into_iter().collect()
    }
}

fn decode_line(line: &str) -> Option<ChatEvent> {
    if line.is_empty() {
        return None;
    }

    if let Some(name) = line.strip_prefix("event:") {
        let name = name.trim();
        debug!("SSE event line: {}", name);
        return (name == "ping").then_some(ChatEvent::Ping);
    }

    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        debug!("Received [DONE] marker");
        return None;
    }

    match parse_event(data) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Skipping malformed SSE payload ({}): {}", e, data);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_event_parses_ids_and_answer() {
        let data = r#"{"event":"message","task_id":"t1","message_id":"m1","conversation_id":"c1","answer":"Hi"}"#;
        let event = parse_event(data).unwrap();
        assert_eq!(event.ids(), Some(("c1", "m1", "t1")));
        assert!(matches!(event, ChatEvent::Message(ref c) if c.answer == "Hi"));
    }

    #[test]
    fn test_agent_message_is_treated_as_answer_delta() {
        let data = r#"{"event":"agent_message","answer":"x","conversation_id":"c","message_id":"m","task_id":"t"}"#;
        assert!(matches!(parse_event(data).unwrap(), ChatEvent::Message(_)));
    }

    #[test]
    fn test_unknown_event_becomes_other() {
        let data = r#"{"event":"workflow_started","task_id":"t"}"#;
        assert_eq!(parse_event(data).unwrap(), ChatEvent::Other("workflow_started".into()));
    }

    #[test]
    fn test_message_end_carries_retriever_resources() {
        let data = r#"{"event":"message_end","message_id":"m","conversation_id":"c","task_id":"t",
            "metadata":{"retriever_resources":[{"dataset_name":"Docs","document_name":"a.md","score":0.9,"content":"..."}]}}"#;
        let ChatEvent::MessageEnd(end) = parse_event(data).unwrap() else {
            panic!("expected MessageEnd");
        };
        assert_eq!(end.metadata.retriever_resources.len(), 1);
        assert_eq!(end.metadata.retriever_resources[0].dataset_name, "Docs");
    }

    #[test]
    fn test_decoder_handles_lines_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let first = decoder.push(b"data: {\"event\":\"message\",\"ans");
        assert!(first.is_empty());
        let second = decoder.push(b"wer\":\"Hello\"}\n\n");
        assert_eq!(second.len(), 1);
        assert!(matches!(&second[0], ChatEvent::Message(c) if c.answer == "Hello"));
    }

    #[test]
    fn test_decoder_handles_utf8_split_across_chunks() {
        let payload = "data: {\"event\":\"message\",\"answer\":\"你好\"}\n".as_bytes();
        // Split inside the first multi-byte character
        let split = payload.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&payload[..split]).is_empty());
        let events = decoder.push(&payload[split..]);
        assert!(matches!(&events[0], ChatEvent::Message(c) if c.answer == "你好"));
    }

    #[test]
    fn test_decoder_emits_ping_and_skips_garbage() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: ping\n\ndata: not json\n\ndata: {\"event\":\"error\",\"status\":400,\"code\":\"invalid_param\",\"message\":\"bad\"}\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ChatEvent::Ping);
        assert!(matches!(&events[1], ChatEvent::Error(e) if e.status == 400 && e.message == "bad"));
    }

    #[test]
    fn test_decoder_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"event\":\"ping\"}").is_empty());
        assert_eq!(decoder.finish(), vec![ChatEvent::Ping]);
        assert!(decoder.finish().is_empty());
    }
}
