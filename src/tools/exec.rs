//! Tool call queue
//!
//! A single worker task owns the dispatcher (and with it the document) and
//! drains a FIFO of tool calls one at a time. Everything else talks to it
//! through a cloneable [`CallQueue`] handle over an mpsc mailbox, so stream
//! ingestion never waits on a document mutation.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::dispatch::ToolDispatcher;
use super::error::ToolError;
use super::response::ToolResponse;
use crate::document::SchematicDocument;
use crate::stream::ToolInvocation;

// =============================================================================
// Records
// =============================================================================

/// Identifier of one tool call, unique per queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// Lifecycle of a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Queued,
    Running,
    Completed,
    Failed,
    /// Removed by a cancel before it started
    Cancelled,
}

impl CallStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallStatus::Completed | CallStatus::Failed | CallStatus::Cancelled
        )
    }

    fn can_become(self, next: CallStatus) -> bool {
        matches!(
            (self, next),
            (CallStatus::Queued, CallStatus::Running)
                | (CallStatus::Queued, CallStatus::Cancelled)
                | (CallStatus::Running, CallStatus::Completed)
                | (CallStatus::Running, CallStatus::Failed)
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("illegal call status transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: CallStatus,
    pub to: CallStatus,
}

/// A tool call as tracked by the queue
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub id: CallId,
    pub name: String,
    pub raw_payload: String,
    pub queued_at: DateTime<Utc>,
    status: CallStatus,
    outcome: Option<ToolResponse>,
    /// Cancel epoch at enqueue time
    epoch: u64,
}

impl ToolCallRecord {
    pub fn new(id: CallId, invocation: ToolInvocation) -> Self {
        Self {
            id,
            name: invocation.name,
            raw_payload: invocation.raw_payload,
            queued_at: Utc::now(),
            status: CallStatus::Queued,
            outcome: None,
            epoch: 0,
        }
    }

    pub fn status(&self) -> CallStatus {
        self.status
    }

    pub fn outcome(&self) -> Option<&ToolResponse> {
        self.outcome.as_ref()
    }

    /// Move to `next`; terminal states never change again
    pub fn advance(&mut self, next: CallStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_become(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn finish(&mut self, next: CallStatus, response: ToolResponse) {
        match self.advance(next) {
            Ok(()) => self.outcome = Some(response),
            Err(e) => tracing::error!("Tool call {}: {}", self.id, e),
        }
    }
}

/// Notification for the UI sink. Receivers may drop these freely.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub call_id: CallId,
    pub name: String,
    pub status: CallStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ToolResponse>,
    pub at: DateTime<Utc>,
}

impl From<&ToolCallRecord> for StatusUpdate {
    fn from(record: &ToolCallRecord) -> Self {
        Self {
            call_id: record.id,
            name: record.name.clone(),
            status: record.status,
            response: record.outcome.clone(),
            at: Utc::now(),
        }
    }
}

// =============================================================================
// Handle
// =============================================================================

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("call queue worker has stopped")]
    Stopped,
    #[error("call queue worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

enum QueueCommand {
    Enqueue(ToolCallRecord),
    Cancel,
    BeginSession,
    Barrier(oneshot::Sender<()>),
    Shutdown,
}

/// Shared between the handles and the worker
struct CancelState {
    /// Bumped by every cancel; calls enqueued under an older epoch never start
    epoch: AtomicU64,
    /// Token of the call currently running
    in_flight: Mutex<CancellationToken>,
}

/// Handle to the call queue worker
#[derive(Clone)]
pub struct CallQueue {
    tx: mpsc::UnboundedSender<QueueCommand>,
    next_id: Arc<AtomicU64>,
    cancel: Arc<CancelState>,
}

impl CallQueue {
    /// Spawn the worker on the current tokio runtime
    pub fn spawn<D>(
        dispatcher: ToolDispatcher<D>,
        updates: mpsc::UnboundedSender<StatusUpdate>,
    ) -> (CallQueue, QueueTask<D>)
    where
        D: SchematicDocument + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = Arc::new(CancelState {
            epoch: AtomicU64::new(0),
            in_flight: Mutex::new(CancellationToken::new()),
        });
        let worker = Worker {
            dispatcher,
            rx,
            pending: VecDeque::new(),
            updates,
            cancel: Arc::clone(&cancel),
            shutting_down: false,
        };
        let handle = tokio::spawn(worker.run());
        let queue = CallQueue {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
            cancel,
        };
        (queue, QueueTask { handle })
    }

    /// Append a call. Never waits on the worker.
    pub fn enqueue(&self, invocation: ToolInvocation) -> Result<CallId, QueueError> {
        let id = CallId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut record = ToolCallRecord::new(id, invocation);
        record.epoch = self.cancel.epoch.load(Ordering::SeqCst);
        self.tx
            .send(QueueCommand::Enqueue(record))
            .map_err(|_| QueueError::Stopped)?;
        Ok(id)
    }

    /// Drop every call that has not started yet. A running call is signalled
    /// through its context but is allowed to finish its transaction.
    pub fn cancel(&self) {
        self.cancel.epoch.fetch_add(1, Ordering::SeqCst);
        self.cancel.in_flight.lock().cancel();
        let _ = self.tx.send(QueueCommand::Cancel);
    }

    /// Mark the start of a new generation session
    pub fn begin_session(&self) {
        let _ = self.tx.send(QueueCommand::BeginSession);
    }

    /// Wait until every call enqueued before this point has reached a terminal state
    pub async fn idle(&self) -> Result<(), QueueError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(QueueCommand::Barrier(done_tx))
            .map_err(|_| QueueError::Stopped)?;
        done_rx.await.map_err(|_| QueueError::Stopped)
    }

    /// Ask the worker to exit once the queue is drained
    pub fn shutdown(&self) {
        let _ = self.tx.send(QueueCommand::Shutdown);
    }
}

/// Join handle of the worker; yields the dispatcher back on exit
pub struct QueueTask<D> {
    handle: JoinHandle<ToolDispatcher<D>>,
}

impl<D> QueueTask<D> {
    pub async fn join(self) -> Result<ToolDispatcher<D>, QueueError> {
        Ok(self.handle.await?)
    }
}

// =============================================================================
// Worker
// =============================================================================

enum Pending {
    Call(ToolCallRecord),
    Barrier(oneshot::Sender<()>),
}

struct Worker<D> {
    dispatcher: ToolDispatcher<D>,
    rx: mpsc::UnboundedReceiver<QueueCommand>,
    pending: VecDeque<Pending>,
    updates: mpsc::UnboundedSender<StatusUpdate>,
    cancel: Arc<CancelState>,
    shutting_down: bool,
}

impl<D: SchematicDocument> Worker<D> {
    async fn run(mut self) -> ToolDispatcher<D> {
        loop {
            // Absorb everything already in the mailbox so a cancel sent
            // before the next call is seen before that call starts
            while let Ok(command) = self.rx.try_recv() {
                self.apply(command);
            }

            match self.pending.pop_front() {
                Some(Pending::Call(record)) => {
                    self.run_call(record);
                    tokio::task::yield_now().await;
                    continue;
                }
                Some(Pending::Barrier(done)) => {
                    let _ = done.send(());
                    continue;
                }
                None if self.shutting_down => break,
                None => {}
            }

            match self.rx.recv().await {
                Some(command) => self.apply(command),
                None => break,
            }
        }
        tracing::debug!("Call queue worker exiting");
        self.dispatcher
    }

    fn apply(&mut self, command: QueueCommand) {
        match command {
            QueueCommand::Enqueue(record) => {
                tracing::info!("Queued tool call {} ({})", record.id, record.name);
                self.notify(&record);
                self.pending.push_back(Pending::Call(record));
            }
            QueueCommand::Cancel => self.cancel_stale(),
            QueueCommand::BeginSession => self.dispatcher.begin_session(),
            QueueCommand::Barrier(done) => self.pending.push_back(Pending::Barrier(done)),
            QueueCommand::Shutdown => self.shutting_down = true,
        }
    }

    fn current_epoch(&self) -> u64 {
        self.cancel.epoch.load(Ordering::SeqCst)
    }

    /// Cancel every pending call enqueued before the latest cancel
    fn cancel_stale(&mut self) {
        let epoch = self.current_epoch();
        let mut kept = VecDeque::with_capacity(self.pending.len());
        for entry in self.pending.drain(..) {
            match entry {
                Pending::Call(mut record) if record.epoch < epoch => {
                    record.finish(
                        CallStatus::Cancelled,
                        ToolResponse::failure(&ToolError::Cancelled),
                    );
                    tracing::info!("Cancelled tool call {} ({})", record.id, record.name);
                    let _ = self.updates.send(StatusUpdate::from(&record));
                }
                other => kept.push_back(other),
            }
        }
        self.pending = kept;
    }

    fn run_call(&mut self, mut record: ToolCallRecord) {
        // Install a fresh token before the epoch check so a concurrent
        // cancel lands on one or the other
        let token = CancellationToken::new();
        *self.cancel.in_flight.lock() = token.clone();

        if record.epoch < self.current_epoch() {
            record.finish(
                CallStatus::Cancelled,
                ToolResponse::failure(&ToolError::Cancelled),
            );
            self.notify(&record);
            return;
        }

        if let Err(e) = record.advance(CallStatus::Running) {
            tracing::error!("Tool call {}: {}", record.id, e);
            return;
        }
        self.notify(&record);

        let dispatcher = &mut self.dispatcher;
        let result = run_handler(|| {
            dispatcher.execute_with(&record.name, &record.raw_payload, &token)
        });
        let status = match &result {
            Ok(_) => {
                tracing::info!("Tool call {} ({}) completed", record.id, record.name);
                CallStatus::Completed
            }
            Err(e) => {
                tracing::info!("Tool call {} ({}) failed: {}", record.id, record.name, e);
                CallStatus::Failed
            }
        };
        record.finish(status, ToolResponse::from_result(&result));
        self.notify(&record);
    }

    fn notify(&self, record: &ToolCallRecord) {
        // The UI may already be gone
        let _ = self.updates.send(StatusUpdate::from(record));
    }
}

/// Handlers are synchronous. On a multi-thread runtime the worker thread is
/// handed over to other tasks while one runs; a current-thread runtime has
/// no spare thread, so the handler runs inline and holds it.
fn run_handler<R>(handler: impl FnOnce() -> R) -> R {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => tokio::task::block_in_place(handler),
        _ => handler(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Point, Text};
    use crate::document::{ItemKind, MemorySchematic};
    use crate::library::MemoryLibrary;
    use crate::tools::schema::object_schema;
    use crate::tools::{names, Payload, Tool, ToolContext, ToolOutput, ToolRegistry, ToolSchema};
    use crate::tools::ErrorCode;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicBool;

    fn invocation(name: &str, payload: Value) -> ToolInvocation {
        ToolInvocation {
            name: name.to_string(),
            raw_payload: payload.to_string(),
        }
    }

    fn spawn_with(
        registry: ToolRegistry,
    ) -> (
        CallQueue,
        QueueTask<MemorySchematic>,
        mpsc::UnboundedReceiver<StatusUpdate>,
    ) {
        let library = Arc::new(MemoryLibrary::builtin().unwrap());
        let dispatcher = ToolDispatcher::new(registry, MemorySchematic::new(), library);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (queue, task) = CallQueue::spawn(dispatcher, updates_tx);
        (queue, task, updates_rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<StatusUpdate>) -> Vec<StatusUpdate> {
        let mut updates = vec![];
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    fn statuses_for(updates: &[StatusUpdate], id: CallId) -> Vec<CallStatus> {
        updates
            .iter()
            .filter(|u| u.call_id == id)
            .map(|u| u.status)
            .collect()
    }

    #[test]
    fn test_record_state_machine() {
        let mut record = ToolCallRecord::new(CallId(1), invocation("a.b", json!({})));
        assert_eq!(record.status(), CallStatus::Queued);
        assert!(record.advance(CallStatus::Completed).is_err());
        record.advance(CallStatus::Running).unwrap();
        record.advance(CallStatus::Failed).unwrap();
        assert!(record.status().is_terminal());
        assert_eq!(
            record.advance(CallStatus::Running),
            Err(InvalidTransition {
                from: CallStatus::Failed,
                to: CallStatus::Running
            })
        );
    }

    #[tokio::test]
    async fn test_calls_run_in_fifo_order() {
        let (queue, task, mut rx) = spawn_with(ToolRegistry::new());

        let mut ids = vec![];
        for (i, reference) in ["R1", "R2", "R3"].iter().enumerate() {
            let id = queue
                .enqueue(invocation(
                    names::PLACE_COMPONENT,
                    json!({"symbol": "Device:R", "x": 10.0 + 10.0 * i as f64, "y": 20, "reference": reference}),
                ))
                .unwrap();
            ids.push(id);
        }
        queue.idle().await.unwrap();
        queue.shutdown();
        let dispatcher = task.join().await.unwrap();

        let history: Vec<&str> = dispatcher
            .document()
            .history()
            .iter()
            .map(|c| c.description.as_str())
            .collect();
        assert_eq!(history.len(), 3);
        assert!(history[0].contains("R1"));
        assert!(history[1].contains("R2"));
        assert!(history[2].contains("R3"));

        let updates = drain(&mut rx);
        for id in ids {
            assert_eq!(
                statuses_for(&updates, id),
                vec![CallStatus::Queued, CallStatus::Running, CallStatus::Completed],
                "status sequence for {}",
                id
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_tool_fails_once() {
        let (queue, task, mut rx) = spawn_with(ToolRegistry::new());
        let id = queue.enqueue(invocation("foo.bar", json!({}))).unwrap();
        queue.idle().await.unwrap();
        queue.shutdown();
        let dispatcher = task.join().await.unwrap();
        assert!(dispatcher.document().is_empty());

        let updates = drain(&mut rx);
        let last = updates.iter().rfind(|u| u.call_id == id).unwrap();
        assert_eq!(last.status, CallStatus::Failed);
        let response = last.response.as_ref().unwrap();
        assert_eq!(response.error_code, Some(ErrorCode::UnknownTool));
    }

    #[tokio::test]
    async fn test_cancel_prevents_queued_calls() {
        let (queue, task, mut rx) = spawn_with(ToolRegistry::new());
        let first = queue
            .enqueue(invocation(names::ADD_JUNCTION, json!({"x": 1, "y": 1})))
            .unwrap();
        let second = queue
            .enqueue(invocation(names::ADD_JUNCTION, json!({"x": 2, "y": 2})))
            .unwrap();
        // The worker has not been scheduled yet on this runtime
        queue.cancel();

        let later = queue
            .enqueue(invocation(names::ADD_JUNCTION, json!({"x": 3, "y": 3})))
            .unwrap();
        queue.idle().await.unwrap();
        queue.shutdown();
        let dispatcher = task.join().await.unwrap();

        assert_eq!(dispatcher.document().len(), 1, "only the call after cancel runs");
        let updates = drain(&mut rx);
        for id in [first, second] {
            assert_eq!(
                statuses_for(&updates, id),
                vec![CallStatus::Queued, CallStatus::Cancelled]
            );
        }
        assert_eq!(
            statuses_for(&updates, later).last(),
            Some(&CallStatus::Completed)
        );
    }

    /// Cancels its own queue from inside the handler
    struct CancellingTool {
        queue: Arc<Mutex<Option<CallQueue>>>,
        saw_cancel: Arc<AtomicBool>,
    }

    impl Tool for CancellingTool {
        fn name(&self) -> &'static str {
            "test.cancel_self"
        }

        fn description(&self) -> &'static str {
            "Triggers a cancel while running"
        }

        fn schema(&self) -> ToolSchema {
            object_schema().build()
        }

        fn example(&self) -> Value {
            json!({})
        }

        fn execute(&self, ctx: &mut ToolContext<'_>, _: &Payload) -> Result<ToolOutput, ToolError> {
            if let Some(queue) = self.queue.lock().as_ref() {
                queue.cancel();
            }
            self.saw_cancel.store(ctx.is_cancelled(), Ordering::SeqCst);
            ctx.document_mut().add_item(ItemKind::Text(Text {
                text: "finished anyway".into(),
                position: Point::new(1.0, 1.0),
            }))?;
            Ok(ToolOutput::message("finished"))
        }
    }

    #[tokio::test]
    async fn test_cancel_lets_running_call_finish() {
        let slot = Arc::new(Mutex::new(None));
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(CancellingTool {
            queue: Arc::clone(&slot),
            saw_cancel: Arc::clone(&saw_cancel),
        }));
        let (queue, task, mut rx) = spawn_with(registry);
        *slot.lock() = Some(queue.clone());

        let running = queue.enqueue(invocation("test.cancel_self", json!({}))).unwrap();
        let queued = queue
            .enqueue(invocation(names::ADD_JUNCTION, json!({"x": 5, "y": 5})))
            .unwrap();
        queue.idle().await.unwrap();
        slot.lock().take();
        queue.shutdown();
        let dispatcher = task.join().await.unwrap();

        assert!(saw_cancel.load(Ordering::SeqCst));
        assert_eq!(dispatcher.document().len(), 1);
        let updates = drain(&mut rx);
        assert_eq!(
            statuses_for(&updates, running).last(),
            Some(&CallStatus::Completed)
        );
        assert_eq!(
            statuses_for(&updates, queued),
            vec![CallStatus::Queued, CallStatus::Cancelled]
        );
    }

    /// Records what it saw of the document when it started
    struct ObservingTool {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Tool for ObservingTool {
        fn name(&self) -> &'static str {
            "test.observe"
        }

        fn description(&self) -> &'static str {
            "Logs start and end with the visible item count"
        }

        fn schema(&self) -> ToolSchema {
            object_schema().build()
        }

        fn example(&self) -> Value {
            json!({})
        }

        fn execute(&self, ctx: &mut ToolContext<'_>, _: &Payload) -> Result<ToolOutput, ToolError> {
            let seen = ctx.document().items().len();
            assert!(ctx.document().in_transaction());
            self.log.lock().push(format!("start {}", seen));
            ctx.document_mut().add_item(ItemKind::Junction {
                position: Point::new(1.0, 1.0),
            })?;
            self.log.lock().push(format!("end {}", seen));
            Ok(ToolOutput::message("observed"))
        }
    }

    #[tokio::test]
    async fn test_each_call_sees_previous_commit() {
        let log = Arc::new(Mutex::new(vec![]));
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(ObservingTool {
            log: Arc::clone(&log),
        }));
        let (queue, task, _rx) = spawn_with(registry);

        for _ in 0..4 {
            queue.enqueue(invocation("test.observe", json!({}))).unwrap();
        }
        queue.idle().await.unwrap();
        queue.shutdown();
        task.join().await.unwrap();

        assert_eq!(
            *log.lock(),
            vec!["start 0", "end 0", "start 1", "end 1", "start 2", "end 2", "start 3", "end 3"]
        );
    }

    /// Blocks until another task on the runtime answers
    struct WaitingTool {
        started: Arc<AtomicBool>,
        answer: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl Tool for WaitingTool {
        fn name(&self) -> &'static str {
            "test.wait"
        }

        fn description(&self) -> &'static str {
            "Waits for a signal from a sibling task"
        }

        fn schema(&self) -> ToolSchema {
            object_schema().build()
        }

        fn example(&self) -> Value {
            json!({})
        }

        fn execute(&self, _: &mut ToolContext<'_>, _: &Payload) -> Result<ToolOutput, ToolError> {
            self.started.store(true, Ordering::SeqCst);
            self.answer
                .lock()
                .recv_timeout(std::time::Duration::from_secs(5))
                .map_err(|e| ToolError::OperationFailed(format!("no answer: {}", e)))?;
            Ok(ToolOutput::message("answered"))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_blocking_handler_leaves_runtime_free() {
        let started = Arc::new(AtomicBool::new(false));
        let (answer_tx, answer_rx) = std::sync::mpsc::channel();
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(WaitingTool {
            started: Arc::clone(&started),
            answer: Mutex::new(answer_rx),
        }));
        let (queue, task, mut rx) = spawn_with(registry);

        // Runs on the only worker thread, so it needs that thread back while
        // the handler blocks
        let flag = Arc::clone(&started);
        let signaller = tokio::spawn(async move {
            while !flag.load(Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            let _ = answer_tx.send(());
        });

        let id = queue.enqueue(invocation("test.wait", json!({}))).unwrap();
        queue.idle().await.unwrap();
        signaller.await.unwrap();
        queue.shutdown();
        task.join().await.unwrap();

        let updates = drain(&mut rx);
        assert_eq!(
            statuses_for(&updates, id).last(),
            Some(&CallStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_handles_fail_after_shutdown() {
        let (queue, task, _rx) = spawn_with(ToolRegistry::new());
        queue.shutdown();
        task.join().await.unwrap();
        assert!(matches!(
            queue.enqueue(invocation(names::ADD_JUNCTION, json!({"x": 1, "y": 1}))),
            Err(QueueError::Stopped)
        ));
        assert!(queue.idle().await.is_err());
    }
}
