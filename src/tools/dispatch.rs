//! Tool dispatch
//!
//! `ToolDispatcher::execute` is the single entry point that turns a tool name
//! and a raw payload into a document mutation: lookup, decode, validate, then
//! run the handler inside a transaction that is committed on success and
//! discarded on any failure, including a panic.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::error::ToolError;
use super::response::ToolOutput;
use super::ToolRegistry;
use crate::document::{DocumentError, Point, SchematicDocument};
use crate::library::SymbolLibrary;
use crate::routing::DEFAULT_OBSTACLE_MARGIN_MM;

/// Geometry limits and routing parameters handed to every handler
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSettings {
    pub obstacle_margin: f64,
    pub sheet_width: f64,
    pub sheet_height: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            obstacle_margin: DEFAULT_OBSTACLE_MARGIN_MM,
            sheet_width: 1189.0,
            sheet_height: 841.0,
        }
    }
}

impl ToolSettings {
    /// Reject points that are not finite or fall outside the sheet
    pub fn check_point(&self, point: Point) -> Result<Point, ToolError> {
        if !point.is_finite() {
            return Err(ToolError::InvalidCoordinates(format!(
                "({}, {}) is not a finite position",
                point.x, point.y
            )));
        }
        let on_sheet = (0.0..=self.sheet_width).contains(&point.x)
            && (0.0..=self.sheet_height).contains(&point.y);
        if !on_sheet {
            return Err(ToolError::InvalidCoordinates(format!(
                "({}, {}) is outside the {}x{} mm sheet",
                point.x, point.y, self.sheet_width, self.sheet_height
            )));
        }
        Ok(point)
    }
}

/// What a handler can reach while its transaction is open
pub struct ToolContext<'a> {
    document: &'a mut (dyn SchematicDocument + 'a),
    library: &'a dyn SymbolLibrary,
    settings: &'a ToolSettings,
    cancellation: &'a CancellationToken,
}

impl<'a> ToolContext<'a> {
    pub fn new(
        document: &'a mut (dyn SchematicDocument + 'a),
        library: &'a dyn SymbolLibrary,
        settings: &'a ToolSettings,
        cancellation: &'a CancellationToken,
    ) -> Self {
        Self {
            document,
            library,
            settings,
            cancellation,
        }
    }

    pub fn document(&self) -> &(dyn SchematicDocument + 'a) {
        &*self.document
    }

    pub fn document_mut(&mut self) -> &mut (dyn SchematicDocument + 'a) {
        &mut *self.document
    }

    pub fn library(&self) -> &'a dyn SymbolLibrary {
        self.library
    }

    pub fn settings(&self) -> &'a ToolSettings {
        self.settings
    }

    /// Set when the user cancelled while this call was running. Long
    /// operations may bail out early; the call still ends normally.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Open transaction that is discarded unless committed
struct Transaction<'a> {
    document: &'a mut (dyn SchematicDocument + 'a),
    open: bool,
}

impl<'a> Transaction<'a> {
    fn open(document: &'a mut (dyn SchematicDocument + 'a)) -> Result<Self, DocumentError> {
        document.open_transaction()?;
        Ok(Self {
            document,
            open: true,
        })
    }

    fn document(&mut self) -> &mut (dyn SchematicDocument + 'a) {
        &mut *self.document
    }

    fn commit(mut self, description: &str) -> Result<(), DocumentError> {
        self.document.commit(description)?;
        self.open = false;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.open {
            self.document.discard();
        }
    }
}

/// Validates and executes tool calls against a document
pub struct ToolDispatcher<D> {
    registry: ToolRegistry,
    document: D,
    library: Arc<dyn SymbolLibrary>,
    settings: ToolSettings,
    /// Unknown names already logged this session
    reported_unknown: HashSet<String>,
}

impl<D: SchematicDocument> ToolDispatcher<D> {
    pub fn new(registry: ToolRegistry, document: D, library: Arc<dyn SymbolLibrary>) -> Self {
        Self {
            registry,
            document,
            library,
            settings: ToolSettings::default(),
            reported_unknown: HashSet::new(),
        }
    }

    pub fn with_settings(mut self, settings: ToolSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }

    /// Start a new generation session; unknown tool names get logged again
    pub fn begin_session(&mut self) {
        self.reported_unknown.clear();
    }

    pub fn execute(&mut self, name: &str, raw_payload: &str) -> Result<ToolOutput, ToolError> {
        self.execute_with(name, raw_payload, &CancellationToken::new())
    }

    pub fn execute_with(
        &mut self,
        name: &str,
        raw_payload: &str,
        cancellation: &CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let Some(entry) = self.registry.get(name) else {
            if self.reported_unknown.insert(name.to_string()) {
                tracing::warn!("Model requested unknown tool {}", name);
            }
            return Err(ToolError::UnknownTool(name.to_string()));
        };

        let payload = match serde_json::from_str::<Value>(raw_payload) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(ToolError::InvalidPayload(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )));
            }
            Err(e) => return Err(ToolError::InvalidPayload(e.to_string())),
        };

        entry.schema.validate(&payload)?;

        let tool = Arc::clone(&entry.tool);
        let mut transaction = Transaction::open(&mut self.document)?;
        let outcome = {
            let mut ctx = ToolContext::new(
                transaction.document(),
                self.library.as_ref(),
                &self.settings,
                cancellation,
            );
            panic::catch_unwind(AssertUnwindSafe(|| tool.execute(&mut ctx, &payload)))
        };

        match outcome {
            Ok(Ok(output)) => {
                let description = output.message.as_deref().unwrap_or(name);
                transaction.commit(description)?;
                Ok(output)
            }
            // Dropping the transaction discards it
            Ok(Err(e)) => Err(e),
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("Tool {} panicked: {}", name, reason);
                Err(ToolError::OperationFailed(format!(
                    "handler panicked: {}",
                    reason
                )))
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
