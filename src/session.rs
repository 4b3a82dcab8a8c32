//! One generation request, from first chunk to end of stream
//!
//! An [`AgentSession`] owns the demultiplexer for a single model response.
//! Display and reasoning deltas go out on the session event channel as they
//! are recognized; tool invocations go to the [`CallQueue`] without waiting
//! for earlier calls to run.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::config::StreamConfig;
use crate::stream::{ChannelState, DemuxEvent, Demultiplexer, ToolInvocation};
use crate::tools::{CallId, CallQueue, QueueError};

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionEnd {
    /// The stream ran to its end
    Completed,
    /// The transport failed mid-stream
    Aborted,
    /// The user stopped the request
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub display: String,
    pub reasoning: String,
    pub invocations: Vec<ToolInvocation>,
    pub calls: Vec<CallId>,
    pub unterminated_reasoning: bool,
    pub discarded_tool_lines: usize,
    pub end: SessionEnd,
}

/// Events sent to the UI while a session runs
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    TextDelta(String),
    ReasoningDelta(String),
    ToolQueued { call_id: CallId, name: String },
    Finished(SessionSummary),
}

pub struct AgentSession {
    id: String,
    demux: Demultiplexer,
    queue: CallQueue,
    events: mpsc::UnboundedSender<SessionEvent>,
    calls: Vec<CallId>,
    end: Option<SessionEnd>,
}

impl AgentSession {
    pub fn new(
        config: &StreamConfig,
        queue: CallQueue,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        queue.begin_session();
        let id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("Session {} started", id);
        Self {
            id,
            demux: Demultiplexer::new(config),
            queue,
            events,
            calls: Vec::new(),
            end: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ChannelState {
        self.demux.state()
    }

    /// Calls queued so far, in stream order
    pub fn calls(&self) -> &[CallId] {
        &self.calls
    }

    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }

    pub fn feed(&mut self, chunk: &str) -> Result<(), QueueError> {
        let events = self.demux.feed(chunk);
        self.forward(events)
    }

    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<(), QueueError> {
        let events = self.demux.feed_bytes(bytes);
        self.forward(events)
    }

    /// End of stream. Calls already queued keep running.
    pub fn finish(&mut self) -> Result<SessionSummary, QueueError> {
        if self.end.is_none() {
            let events = self.demux.finish();
            self.forward(events)?;
        }
        Ok(self.close(SessionEnd::Completed))
    }

    /// Transport failure: buffered text is dropped and queued calls are
    /// cancelled. Calls that already committed stay in the document.
    pub fn abort(&mut self) -> SessionSummary {
        tracing::warn!("Session {} aborted by transport failure", self.id);
        self.stop(SessionEnd::Aborted)
    }

    /// User cancel; same teardown as `abort`
    pub fn cancel(&mut self) -> SessionSummary {
        tracing::info!("Session {} cancelled", self.id);
        self.stop(SessionEnd::Cancelled)
    }

    fn stop(&mut self, end: SessionEnd) -> SessionSummary {
        if self.end.is_none() {
            self.demux.abort();
            self.queue.cancel();
        }
        self.close(end)
    }

    fn forward(&mut self, events: Vec<DemuxEvent>) -> Result<(), QueueError> {
        for event in events {
            match event {
                DemuxEvent::Display(text) => self.send(SessionEvent::TextDelta(text)),
                DemuxEvent::Reasoning(text) => self.send(SessionEvent::ReasoningDelta(text)),
                DemuxEvent::Invocation(invocation) => {
                    let name = invocation.name.clone();
                    let call_id = self.queue.enqueue(invocation)?;
                    tracing::debug!("Queued {} as {}", name, call_id);
                    self.calls.push(call_id);
                    self.send(SessionEvent::ToolQueued { call_id, name });
                }
            }
        }
        Ok(())
    }

    /// Record the end once; later calls return the first summary again
    fn close(&mut self, end: SessionEnd) -> SessionSummary {
        let first = self.end.is_none();
        let end = *self.end.get_or_insert(end);
        let summary = SessionSummary {
            session_id: self.id.clone(),
            display: self.demux.display().to_string(),
            reasoning: self.demux.reasoning().to_string(),
            invocations: self.demux.invocations().to_vec(),
            calls: self.calls.clone(),
            unterminated_reasoning: self.demux.unterminated_reasoning(),
            discarded_tool_lines: self.demux.discarded_lines(),
            end,
        };
        if first {
            self.send(SessionEvent::Finished(summary.clone()));
        }
        summary
    }

    fn send(&self, event: SessionEvent) {
        // The UI may already be gone
        let _ = self.events.send(event);
    }
}
