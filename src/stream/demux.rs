//! Stream demultiplexer
//!
//! Splits the model's output stream into display text, reasoning text and
//! tool invocations. The work happens in two stages driven by one state
//! machine:
//!
//! 1. Reasoning markers split the text into a reasoning channel and a
//!    display channel. A marker cut in half by a chunk boundary is held back
//!    until the next chunk decides it.
//! 2. Display-channel text is classified line by line. Tool lines and
//!    comment lines are kept out of the display; prose is streamed through as
//!    soon as its line can no longer turn into either.
//!
//! Both stages only depend on the bytes seen so far, never on where the
//! chunk boundaries fell, so any chunking of the same stream produces the
//! same accumulated output.

use crate::config::StreamConfig;

use super::invocation::{parse_line, LineParse, ToolInvocation};
use super::utf8::Utf8Carry;

/// Output of one `feed` call, in stream order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemuxEvent {
    Display(String),
    Reasoning(String),
    Invocation(ToolInvocation),
}

/// Coarse state, as seen from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    InReasoning,
    BufferingToolLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Display,
    Reasoning,
}

/// Classification of the current display line. Prefixes only count at
/// column 0.
#[derive(Debug, Default)]
enum LineState {
    /// Nothing on this line yet
    #[default]
    Start,
    /// A proper prefix of the keyword
    Keyword(String),
    /// After the keyword; everything up to the terminating newline
    ToolLine(String),
    /// Dropped through the next newline (comments, oversize tool lines)
    Skip,
    /// Streaming to display through the next newline
    Prose,
}

pub struct Demultiplexer {
    open_marker: String,
    close_marker: String,
    /// Keyword plus its separating space
    keyword: String,
    drop_comments: bool,
    max_line_bytes: usize,

    channel: Channel,
    /// Tail that may be the beginning of the next marker
    held: String,
    line: LineState,
    utf8: Utf8Carry,

    display: String,
    reasoning: String,
    invocations: Vec<ToolInvocation>,
    discarded_lines: usize,
    unterminated_reasoning: bool,
    finished: bool,
}

impl Demultiplexer {
    pub fn new(config: &StreamConfig) -> Self {
        let defaults = StreamConfig::default();
        let pick = |value: &str, fallback: String| {
            if value.is_empty() {
                fallback
            } else {
                value.to_string()
            }
        };
        Self {
            open_marker: pick(&config.reasoning_open, defaults.reasoning_open),
            close_marker: pick(&config.reasoning_close, defaults.reasoning_close),
            keyword: format!("{} ", pick(config.tool_keyword.trim(), defaults.tool_keyword)),
            drop_comments: config.drop_comment_lines,
            max_line_bytes: config.max_tool_line_bytes,
            channel: Channel::Display,
            held: String::new(),
            line: LineState::default(),
            utf8: Utf8Carry::default(),
            display: String::new(),
            reasoning: String::new(),
            invocations: Vec::new(),
            discarded_lines: 0,
            unterminated_reasoning: false,
            finished: false,
        }
    }

    pub fn state(&self) -> ChannelState {
        match (self.channel, &self.line) {
            (Channel::Reasoning, _) => ChannelState::InReasoning,
            (Channel::Display, LineState::ToolLine(_)) => ChannelState::BufferingToolLine,
            _ => ChannelState::Idle,
        }
    }

    /// Everything routed to display so far
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Everything routed to reasoning so far
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn invocations(&self) -> &[ToolInvocation] {
        &self.invocations
    }

    /// Tool lines dropped as malformed, oversize or incomplete
    pub fn discarded_lines(&self) -> usize {
        self.discarded_lines
    }

    /// The stream ended inside a reasoning section
    pub fn unterminated_reasoning(&self) -> bool {
        self.unterminated_reasoning
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<DemuxEvent> {
        let mut events = Vec::new();
        if self.finished {
            tracing::warn!("Ignoring {} bytes fed after end of stream", chunk.len());
            return events;
        }
        self.split(chunk, &mut events);
        events
    }

    /// Feed raw transport bytes; a character split across chunks is carried over
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Vec<DemuxEvent> {
        if self.finished {
            tracing::warn!("Ignoring {} bytes fed after end of stream", bytes.len());
            return Vec::new();
        }
        let text = self.utf8.decode(bytes);
        self.feed(&text)
    }

    /// End of stream: flush held text and settle the final line.
    ///
    /// An open reasoning section is treated as closed. A tool line whose
    /// payload is complete is still forwarded; an incomplete one is dropped.
    pub fn finish(&mut self) -> Vec<DemuxEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        let tail = self.utf8.finish();
        if !tail.is_empty() {
            self.split(&tail, &mut events);
        }

        let held = std::mem::take(&mut self.held);
        match self.channel {
            Channel::Reasoning => {
                self.emit_reasoning(&held, &mut events);
                self.unterminated_reasoning = true;
                tracing::debug!("Stream ended inside a reasoning section");
            }
            Channel::Display => self.classify(&held, &mut events),
        }

        match std::mem::take(&mut self.line) {
            LineState::Keyword(text) => self.emit_display(text, &mut events),
            LineState::ToolLine(line) => match parse_line(&line) {
                LineParse::Complete(invocation) => self.emit_invocation(invocation, &mut events),
                LineParse::Incomplete | LineParse::Malformed(_) => {
                    tracing::debug!("Discarding unfinished tool line at end of stream");
                    self.discarded_lines += 1;
                }
            },
            LineState::Start | LineState::Skip | LineState::Prose => {}
        }

        self.finished = true;
        events
    }

    /// Tear down after a transport failure. Nothing buffered is forwarded.
    pub fn abort(&mut self) {
        if matches!(self.line, LineState::ToolLine(_)) {
            self.discarded_lines += 1;
        }
        self.held.clear();
        self.line = LineState::default();
        self.utf8.clear();
        self.finished = true;
    }

    // =========================================================================
    // Stage 1: reasoning markers
    // =========================================================================

    fn split(&mut self, chunk: &str, events: &mut Vec<DemuxEvent>) {
        let mut buffer = std::mem::take(&mut self.held);
        buffer.push_str(chunk);
        let open = self.open_marker.clone();
        let close = self.close_marker.clone();

        let mut rest = buffer.as_str();
        loop {
            let marker = match self.channel {
                Channel::Display => open.as_str(),
                Channel::Reasoning => close.as_str(),
            };
            match rest.find(marker) {
                Some(pos) => {
                    self.route(&rest[..pos], events);
                    rest = &rest[pos + marker.len()..];
                    self.channel = match self.channel {
                        Channel::Display => Channel::Reasoning,
                        Channel::Reasoning => Channel::Display,
                    };
                }
                None => {
                    let keep = partial_marker_len(rest, marker);
                    let (ready, partial) = rest.split_at(rest.len() - keep);
                    self.route(ready, events);
                    self.held = partial.to_string();
                    break;
                }
            }
        }
    }

    fn route(&mut self, text: &str, events: &mut Vec<DemuxEvent>) {
        match self.channel {
            Channel::Reasoning => self.emit_reasoning(text, events),
            Channel::Display => self.classify(text, events),
        }
    }

    // =========================================================================
    // Stage 2: display lines
    // =========================================================================

    fn classify(&mut self, text: &str, events: &mut Vec<DemuxEvent>) {
        let mut out = String::new();
        for ch in text.chars() {
            let state = std::mem::take(&mut self.line);
            self.line = match state {
                LineState::Start => match ch {
                    '#' if self.drop_comments => LineState::Skip,
                    _ => self.keyword_step(ch.to_string(), &mut out),
                },
                LineState::Keyword(mut text) => {
                    text.push(ch);
                    self.keyword_step(text, &mut out)
                }
                LineState::ToolLine(mut line) => {
                    if ch == '\n' {
                        self.end_tool_line(line, &mut out, events)
                    } else {
                        line.push(ch);
                        self.bounded(line)
                    }
                }
                LineState::Skip if ch == '\n' => LineState::default(),
                LineState::Skip => LineState::Skip,
                LineState::Prose => {
                    out.push(ch);
                    if ch == '\n' {
                        LineState::default()
                    } else {
                        LineState::Prose
                    }
                }
            };
        }
        self.emit_display(out, events);
    }

    /// Decide whether the start of the line is still heading towards the
    /// keyword
    fn keyword_step(&self, text: String, out: &mut String) -> LineState {
        if text == self.keyword {
            LineState::ToolLine(String::new())
        } else if self.keyword.starts_with(text.as_str()) {
            LineState::Keyword(text)
        } else {
            out.push_str(&text);
            if text.ends_with('\n') {
                LineState::default()
            } else {
                LineState::Prose
            }
        }
    }

    /// The newline always ends a tool line; a payload still open at that
    /// point is dropped and the next line is classified afresh
    fn end_tool_line(
        &mut self,
        line: String,
        out: &mut String,
        events: &mut Vec<DemuxEvent>,
    ) -> LineState {
        match parse_line(&line) {
            LineParse::Complete(invocation) => {
                // Keep display and invocation events in stream order
                self.emit_display(std::mem::take(out), events);
                self.emit_invocation(invocation, events);
                LineState::default()
            }
            LineParse::Incomplete => {
                tracing::warn!("Dropping tool line with an unclosed payload");
                self.discarded_lines += 1;
                LineState::default()
            }
            LineParse::Malformed(reason) => {
                tracing::warn!("Dropping malformed tool line: {}", reason);
                self.discarded_lines += 1;
                LineState::default()
            }
        }
    }

    fn bounded(&mut self, line: String) -> LineState {
        if line.len() > self.max_line_bytes {
            tracing::warn!(
                "Dropping tool line longer than {} bytes",
                self.max_line_bytes
            );
            self.discarded_lines += 1;
            LineState::Skip
        } else {
            LineState::ToolLine(line)
        }
    }

    // =========================================================================
    // Sinks
    // =========================================================================

    fn emit_display(&mut self, text: String, events: &mut Vec<DemuxEvent>) {
        if text.is_empty() {
            return;
        }
        self.display.push_str(&text);
        match events.last_mut() {
            Some(DemuxEvent::Display(last)) => last.push_str(&text),
            _ => events.push(DemuxEvent::Display(text)),
        }
    }

    fn emit_reasoning(&mut self, text: &str, events: &mut Vec<DemuxEvent>) {
        if text.is_empty() {
            return;
        }
        self.reasoning.push_str(text);
        match events.last_mut() {
            Some(DemuxEvent::Reasoning(last)) => last.push_str(text),
            _ => events.push(DemuxEvent::Reasoning(text.to_string())),
        }
    }

    fn emit_invocation(&mut self, invocation: ToolInvocation, events: &mut Vec<DemuxEvent>) {
        tracing::debug!("Recognized tool invocation {}", invocation.name);
        self.invocations.push(invocation.clone());
        events.push(DemuxEvent::Invocation(invocation));
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of `marker`
fn partial_marker_len(text: &str, marker: &str) -> usize {
    let longest = marker.len().saturating_sub(1).min(text.len());
    (1..=longest)
        .rev()
        .find(|&k| {
            let start = text.len() - k;
            text.is_char_boundary(start) && marker.starts_with(&text[start..])
        })
        .unwrap_or(0)
}
