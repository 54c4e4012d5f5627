//! Incremental parsing of streamed responses
//!
//! Raw byte chunks arrive from the transport with arbitrary boundaries. The
//! [`FrameParser`] buffers them, cuts complete newline-terminated lines, and
//! hands each line to the active [`ProtocolAdapter`] exactly once. Only the
//! trailing partial line is kept between chunks. Lines are cut at the byte
//! level, so a chunk boundary inside a multi-byte character simply waits for
//! the rest of the character.

use crate::error::{ChatError, LineParseError};
use crate::protocol::{Channel, Delta, StreamEvent};
use crate::providers::ProtocolAdapter;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default limit for a single buffered line (10MB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Stateful line parser for one response stream
pub struct FrameParser {
    adapter: Arc<dyn ProtocolAdapter>,
    buffer: Vec<u8>,
    max_line_bytes: usize,
    think_splitter: Option<ThinkTagSplitter>,
    full_response: String,
    skipped_lines: usize,
    discarding: bool,
}

impl FrameParser {
    pub fn new(adapter: Arc<dyn ProtocolAdapter>) -> Self {
        Self {
            adapter,
            buffer: Vec::new(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            think_splitter: None,
            full_response: String::new(),
            skipped_lines: 0,
            discarding: false,
        }
    }

    /// Limit how long a line may grow while waiting for its newline
    pub fn with_max_line_bytes(mut self, limit: usize) -> Self {
        self.max_line_bytes = limit.max(1);
        self
    }

    /// Route text inside inline `<think>` tags to the thinking channel
    pub fn with_think_tags(mut self, enabled: bool) -> Self {
        self.think_splitter = enabled.then(ThinkTagSplitter::new);
        self
    }

    /// Feed one chunk, returning the events of every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        // Retained bytes hold no newline, so only the new chunk is scanned
        let mut scan_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut buffer = std::mem::take(&mut self.buffer);
        let mut consumed = 0;
        while let Some(offset) = buffer[scan_from..].iter().position(|b| *b == b'\n') {
            let end = scan_from + offset;
            if self.discarding {
                self.discarding = false;
            } else if end - consumed > self.max_line_bytes {
                self.reject_line(end - consumed, &mut events);
            } else {
                self.handle_line(&buffer[consumed..end], &mut events);
            }
            consumed = end + 1;
            scan_from = consumed;
        }
        buffer.drain(..consumed);
        self.buffer = buffer;

        if self.discarding {
            self.buffer.clear();
        } else if self.buffer.len() > self.max_line_bytes {
            self.reject_line(self.buffer.len(), &mut events);
            self.buffer.clear();
            // Drop the rest of this line when its newline arrives
            self.discarding = true;
        }

        events
    }

    /// End of stream: treat whatever is buffered as a complete line and
    /// release any text held back by the think-tag splitter
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        let rest = std::mem::take(&mut self.buffer);
        let discarding = std::mem::take(&mut self.discarding);
        if !rest.is_empty() && !discarding {
            self.handle_line(&rest, &mut events);
        }

        if let Some(splitter) = self.think_splitter.as_mut() {
            let held = splitter.finish();
            for delta in held {
                self.emit_delta(delta, &mut events);
            }
        }

        if self.skipped_lines > 0 {
            debug!("Stream finished with {} skipped lines", self.skipped_lines);
        }

        events
    }

    /// Answer-channel text emitted so far
    pub fn full_response(&self) -> &str {
        &self.full_response
    }

    /// Consume the parser, returning the accumulated answer
    pub fn into_full_response(self) -> String {
        self.full_response
    }

    /// Number of lines dropped as unparseable
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    fn reject_line(&mut self, len: usize, events: &mut Vec<StreamEvent>) {
        warn!(
            "Discarding {} byte line over the {} byte limit",
            len, self.max_line_bytes
        );
        events.push(StreamEvent::Error(ChatError::FrameTooLarge {
            limit: self.max_line_bytes,
        }));
    }

    fn handle_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.is_empty() {
            return;
        }

        let parsed = std::str::from_utf8(raw)
            .map_err(|_| LineParseError::InvalidUtf8)
            .and_then(|line| self.adapter.parse_line(line));

        match parsed {
            Ok(Some(StreamEvent::Delta(delta))) => self.route_delta(delta, events),
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(e) => {
                self.skipped_lines += 1;
                warn!("Skipping unparseable stream line from {}: {}", self.adapter.name(), e);
                debug!("Raw line: {}", String::from_utf8_lossy(raw));
            }
        }
    }

    fn route_delta(&mut self, delta: Delta, events: &mut Vec<StreamEvent>) {
        match (self.think_splitter.as_mut(), delta.channel) {
            (Some(splitter), Channel::Answer) => {
                let parts = splitter.push(&delta.text);
                for part in parts {
                    self.emit_delta(part, events);
                }
            }
            (Some(splitter), Channel::Thinking) => {
                // Held-back answer text precedes the thinking delta
                let held = splitter.finish();
                for part in held {
                    self.emit_delta(part, events);
                }
                self.emit_delta(delta, events);
            }
            _ => self.emit_delta(delta, events),
        }
    }

    fn emit_delta(&mut self, delta: Delta, events: &mut Vec<StreamEvent>) {
        if delta.channel == Channel::Answer {
            self.full_response.push_str(&delta.text);
        }
        events.push(StreamEvent::Delta(delta));
    }
}

/// Splits answer text on inline `<think>...</think>` sections.
///
/// Tags may be cut across deltas; a trailing fragment that could still
/// become a tag is held back until the next delta decides it.
#[derive(Debug, Default)]
pub struct ThinkTagSplitter {
    in_think: bool,
    pending: String,
}

impl ThinkTagSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the splitter is currently inside a think section
    pub fn in_think(&self) -> bool {
        self.in_think
    }

    pub fn push(&mut self, text: &str) -> Vec<Delta> {
        self.pending.push_str(text);
        let mut out = Vec::new();

        loop {
            let tag = if self.in_think { THINK_CLOSE } else { THINK_OPEN };

            if let Some(idx) = self.pending.find(tag) {
                let before: String = self.pending.drain(..idx).collect();
                self.pending.drain(..tag.len());
                self.emit(before, &mut out);
                self.in_think = !self.in_think;
                continue;
            }

            // Tags are ASCII, so the cut lands on a char boundary
            let keep = partial_tag_suffix(&self.pending, tag);
            let ready_len = self.pending.len() - keep;
            let ready: String = self.pending.drain(..ready_len).collect();
            self.emit(ready, &mut out);
            return out;
        }
    }

    /// Release held-back text, at end of stream or before unrelated output
    pub fn finish(&mut self) -> Vec<Delta> {
        let mut out = Vec::new();
        let rest = std::mem::take(&mut self.pending);
        self.emit(rest, &mut out);
        out
    }

    fn emit(&self, text: String, out: &mut Vec<Delta>) {
        if text.is_empty() {
            return;
        }
        out.push(if self.in_think {
            Delta::thinking(text)
        } else {
            Delta::answer(text)
        });
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `tag`
fn partial_tag_suffix(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|len| text.ends_with(&tag[..*len]))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerateConfig;
    use crate::providers::GenerateAdapter;

    fn generate_parser() -> FrameParser {
        FrameParser::new(Arc::new(GenerateAdapter::new(GenerateConfig {
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "m".to_string(),
            temperature: 0.7,
        })))
    }

    fn texts(events: &[StreamEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(StreamEvent::as_delta)
            .map(|d| d.text.clone())
            .collect()
    }

    #[test]
    fn test_lines_in_one_chunk() {
        let mut parser = generate_parser();
        let events = parser.push(b"{\"response\":\"he\"}\n{\"response\":\"llo\"}\n");
        assert_eq!(texts(&events), vec!["he", "llo"]);
        assert_eq!(parser.full_response(), "hello");
    }

    #[test]
    fn test_line_split_across_chunks_parsed_once() {
        let mut parser = generate_parser();
        assert!(parser.push(b"{\"respo").is_empty());
        let events = parser.push(b"nse\":\"a\"}\n{\"response\":\"b\"}\n");
        assert_eq!(texts(&events), vec!["a", "b"]);

        // Nothing is replayed on later chunks
        let events = parser.push(b"{\"response\":\"c\"}\n");
        assert_eq!(texts(&events), vec!["c"]);
        assert_eq!(parser.full_response(), "abc");
    }

    #[test]
    fn test_split_multibyte_character() {
        let line = "{\"response\":\"番茄\"}\n".as_bytes();
        // Cut inside the first character
        let cut = line.iter().position(|b| *b >= 0x80).unwrap() + 1;

        let mut parser = generate_parser();
        assert!(parser.push(&line[..cut]).is_empty());
        let events = parser.push(&line[cut..]);
        assert_eq!(texts(&events), vec!["番茄"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut parser = generate_parser();
        assert!(parser.push(b"{\"response\":\"tail\"}").is_empty());
        let events = parser.finish();
        assert_eq!(texts(&events), vec!["tail"]);
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let mut parser = generate_parser();
        let events = parser.push(b"{\"response\":\"a\"}\nnot json\n\xff\xfe\n{\"response\":\"b\"}\n");
        assert_eq!(texts(&events), vec!["a", "b"]);
        assert_eq!(parser.skipped_lines(), 2);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let mut parser = generate_parser();
        let events = parser.push(b"{\"response\":\"a\"}\r\n\r\n\n");
        assert_eq!(texts(&events), vec!["a"]);
        assert_eq!(parser.skipped_lines(), 0);
    }

    #[test]
    fn test_oversized_line() {
        let mut parser = generate_parser().with_max_line_bytes(8);
        let events = parser.push(b"0123456789");
        assert!(matches!(
            events.as_slice(),
            [StreamEvent::Error(ChatError::FrameTooLarge { limit: 8 })]
        ));
    }

    #[test]
    fn test_line_limit_ignores_chunking() {
        let line = b"{\"response\":\"abcdefghij\"}\n{\"response\":\"k\"}\n";
        let mut whole = generate_parser().with_max_line_bytes(16);
        let whole_events = whole.push(line);

        let mut split = generate_parser().with_max_line_bytes(16);
        let mut split_events = split.push(&line[..20]);
        split_events.extend(split.push(&line[20..]));

        for events in [&whole_events, &split_events] {
            assert!(matches!(
                events.as_slice(),
                [StreamEvent::Error(ChatError::FrameTooLarge { limit: 16 }), StreamEvent::Delta(_)]
            ));
            assert_eq!(texts(events), vec!["k"]);
        }
        assert_eq!(split.skipped_lines(), 0);
    }

    #[test]
    fn test_long_line_in_small_chunks() {
        let mut parser = generate_parser();
        let text = "x".repeat(4096);
        let line = format!("{{\"response\":\"{}\"}}\n", text);
        let mut events = Vec::new();
        for piece in line.as_bytes().chunks(3) {
            events.extend(parser.push(piece));
        }
        assert_eq!(texts(&events), vec![text]);
    }

    #[test]
    fn test_thinking_field_after_held_answer_text() {
        let mut parser = generate_parser().with_think_tags(true);
        let mut events = parser.push(b"{\"response\":\"a <\"}\n");
        events.extend(parser.push(b"{\"thinking\":\"T\"}\n"));
        events.extend(parser.push(b"{\"response\":\"b\"}\n"));
        events.extend(parser.finish());

        assert_eq!(texts(&events), vec!["a ", "<", "T", "b"]);
        assert_eq!(parser.full_response(), "a <b");
    }

    #[test]
    fn test_think_tags_routed_to_thinking() {
        let mut parser = generate_parser().with_think_tags(true);
        let mut events = Vec::new();
        for piece in ["<thi", "nk>plan", "ning</th", "ink>Eat ", "tofu"] {
            let line = format!("{{\"response\":\"{}\"}}\n", piece);
            events.extend(parser.push(line.as_bytes()));
        }
        events.extend(parser.finish());

        let thinking: String = events
            .iter()
            .filter_map(StreamEvent::as_delta)
            .filter(|d| d.is_thinking())
            .map(|d| d.text.as_str())
            .collect();
        assert_eq!(thinking, "planning");
        assert_eq!(parser.full_response(), "Eat tofu");
    }

    #[test]
    fn test_splitter_releases_false_partial_tag() {
        let mut splitter = ThinkTagSplitter::new();
        assert!(splitter.push("a <").iter().all(|d| d.text == "a "));
        let out = splitter.push("b");
        assert_eq!(out, vec![Delta::answer("<b")]);
        assert!(!splitter.in_think());
    }

    #[test]
    fn test_splitter_finish_releases_held_text() {
        let mut splitter = ThinkTagSplitter::new();
        let out = splitter.push("<think>x</thi");
        assert_eq!(out, vec![Delta::thinking("x")]);
        assert_eq!(splitter.finish(), vec![Delta::thinking("</thi")]);
    }

    #[test]
    fn test_partial_tag_suffix() {
        assert_eq!(partial_tag_suffix("abc<th", THINK_OPEN), 3);
        assert_eq!(partial_tag_suffix("abc", THINK_OPEN), 0);
        assert_eq!(partial_tag_suffix("x</", THINK_CLOSE), 2);
    }
}
