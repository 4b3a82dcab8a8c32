//! schagent - drive schematic edits from a streamed model response
//!
//! The crate turns the raw text stream of a generation service into display
//! text, a reasoning transcript and an ordered queue of validated tool calls
//! that edit a schematic one transaction at a time.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use schagent::config::StreamConfig;
//! use schagent::document::MemorySchematic;
//! use schagent::library::MemoryLibrary;
//! use schagent::session::{AgentSession, SessionEvent};
//! use schagent::tools::{CallQueue, ToolDispatcher, ToolRegistry};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let library = Arc::new(MemoryLibrary::builtin()?);
//!     let dispatcher = ToolDispatcher::new(ToolRegistry::new(), MemorySchematic::new(), library);
//!     let (updates_tx, _updates_rx) = mpsc::unbounded_channel();
//!     let (queue, task) = CallQueue::spawn(dispatcher, updates_tx);
//!
//!     let (events_tx, mut events_rx) = mpsc::unbounded_channel();
//!     let mut session = AgentSession::new(&StreamConfig::default(), queue.clone(), events_tx);
//!
//!     // Chunks as they arrive from the transport
//!     session.feed("Adding a resistor.\nTOOL schematic.place_component ")?;
//!     session.feed("{\"symbol\":\"Device:R\",\"x\":100,\"y\":50}\n")?;
//!     session.finish()?;
//!
//!     while let Ok(event) = events_rx.try_recv() {
//!         if let SessionEvent::TextDelta(text) = event {
//!             print!("{}", text);
//!         }
//!     }
//!
//!     queue.idle().await?;
//!     queue.shutdown();
//!     let dispatcher = task.join().await?;
//!     println!("{} items on the sheet", dispatcher.document().len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod document;
pub mod library;
pub mod prompts;
pub mod routing;
pub mod session;
pub mod stream;
pub mod tools;

pub use config::Config;
pub use session::{AgentSession, SessionEnd, SessionEvent, SessionSummary};
pub use stream::{DemuxEvent, Demultiplexer, ToolInvocation};
pub use tools::{CallQueue, ToolDispatcher, ToolRegistry};
