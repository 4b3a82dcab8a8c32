//! Model output stream handling
//!
//! Turns the raw chunked output of the text-generation service into display
//! text, reasoning text and tool invocations.

mod demux;
mod invocation;
mod utf8;

pub use demux::{ChannelState, DemuxEvent, Demultiplexer};
pub use invocation::ToolInvocation;
