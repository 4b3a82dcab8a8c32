//! Schematic tools: registry, dispatch and the serialized call queue
//!
//! A tool is a named handler with a declared payload schema. The registry is
//! built once at startup; the dispatcher validates payloads and runs handlers
//! inside a document transaction; the call queue feeds the dispatcher one
//! call at a time.

mod dispatch;
mod error;
mod exec;
mod impls;
mod response;
pub mod schema;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

pub use dispatch::{ToolContext, ToolDispatcher, ToolSettings};
pub use error::ToolError;
pub use exec::{
    CallId, CallQueue, CallStatus, InvalidTransition, QueueError, QueueTask, StatusUpdate,
    ToolCallRecord,
};
pub use impls::{
    AddJunctionTool, AddNetLabelTool, AddTextTool, AddWireTool, ConnectWithNetLabelTool,
    DeleteItemTool, GetDatasheetTool, GetNetTool, InspectSelectionTool, MoveComponentTool,
    PlaceComponentTool, SearchSymbolTool,
};
pub use response::{ErrorCode, ToolOutput, ToolResponse};
pub use schema::ToolSchema;

/// Tool name constants
pub mod names {
    pub const PLACE_COMPONENT: &str = "schematic.place_component";
    pub const MOVE_COMPONENT: &str = "schematic.move_component";
    pub const ADD_WIRE: &str = "schematic.add_wire";
    pub const ADD_NET_LABEL: &str = "schematic.add_net_label";
    pub const CONNECT_WITH_NET_LABEL: &str = "schematic.connect_with_net_label";
    pub const ADD_JUNCTION: &str = "schematic.add_junction";
    pub const ADD_TEXT: &str = "schematic.add_text";
    pub const SEARCH_SYMBOL: &str = "schematic.search_symbol";
    pub const GET_DATASHEET: &str = "schematic.get_datasheet";
    pub const DELETE_ITEM: &str = "schematic.delete_item";
    pub const INSPECT_SELECTION: &str = "schematic.inspect_selection";
    pub const GET_NET: &str = "schematic.get_net";

    pub const ALL: &[&str] = &[
        PLACE_COMPONENT,
        MOVE_COMPONENT,
        ADD_WIRE,
        ADD_NET_LABEL,
        CONNECT_WITH_NET_LABEL,
        ADD_JUNCTION,
        ADD_TEXT,
        SEARCH_SYMBOL,
        GET_DATASHEET,
        DELETE_ITEM,
        INSPECT_SELECTION,
        GET_NET,
    ];
}

/// Decoded JSON object payload
pub type Payload = Map<String, Value>;

/// A schematic tool.
///
/// Handlers are synchronous: they run on the queue worker with the document
/// transaction already open, and must not hold on to the context.
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn schema(&self) -> ToolSchema;

    /// Example payload shown in the tool catalog
    fn example(&self) -> Value;

    fn execute(&self, ctx: &mut ToolContext<'_>, payload: &Payload)
        -> Result<ToolOutput, ToolError>;
}

/// Registry entry: the handler plus its schema, built once
#[derive(Clone)]
pub struct RegisteredTool {
    pub tool: Arc<dyn Tool>,
    pub schema: ToolSchema,
}

/// Registry of available tools
#[derive(Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    /// Create a full registry with all tools
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register(Arc::new(PlaceComponentTool));
        registry.register(Arc::new(MoveComponentTool));
        registry.register(Arc::new(AddWireTool));
        registry.register(Arc::new(AddNetLabelTool));
        registry.register(Arc::new(ConnectWithNetLabelTool));
        registry.register(Arc::new(AddJunctionTool));
        registry.register(Arc::new(AddTextTool));
        registry.register(Arc::new(SearchSymbolTool));
        registry.register(Arc::new(GetDatasheetTool));
        registry.register(Arc::new(DeleteItemTool));
        registry.register(Arc::new(InspectSelectionTool));
        registry.register(Arc::new(GetNetTool));

        registry
    }

    /// Full registry restricted to the `enabled` names
    pub fn with_enabled(enabled: &[String]) -> Self {
        let mut registry = Self::new();
        for name in enabled {
            if !registry.tools.contains_key(name) {
                tracing::warn!("Enabled tool {} is not a known tool", name);
            }
        }
        registry.tools.retain(|name, _| enabled.contains(name));
        registry
    }

    pub fn empty() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools
            .insert(tool.name().to_string(), RegisteredTool { tool, schema });
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    /// Tools in name order
    pub fn values(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_registry_matches_names() {
        let registry = ToolRegistry::new();
        let mut expected: Vec<&str> = names::ALL.to_vec();
        expected.sort();
        assert_eq!(registry.names().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_with_enabled_restricts() {
        let registry = ToolRegistry::with_enabled(&[
            names::PLACE_COMPONENT.to_string(),
            "schematic.nope".to_string(),
        ]);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(names::PLACE_COMPONENT).is_some());
        assert!(registry.get(names::ADD_WIRE).is_none());
    }

    #[test]
    fn test_examples_satisfy_schemas() {
        for entry in ToolRegistry::new().values() {
            let example = entry.tool.example();
            let payload = example.as_object().expect("example must be an object");
            assert_eq!(
                entry.schema.validate(payload),
                Ok(()),
                "example for {} does not validate",
                entry.tool.name()
            );
        }
    }
}
