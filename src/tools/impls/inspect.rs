//! Read-only views of the document: the current selection and nets

use serde::Deserialize;
use serde_json::{json, Value};

use super::parse_params;
use crate::document::{Item, ItemKind, Point, SchematicDocument};
use crate::tools::schema::{object_schema, string_field};
use crate::tools::{names, Payload, Tool, ToolContext, ToolError, ToolOutput, ToolSchema};

fn describe(item: &Item) -> String {
    match &item.kind {
        ItemKind::Symbol(symbol) => format!("{} ({} {})", symbol.reference, symbol.lib_id, symbol.value),
        ItemKind::Wire(wire) => format!(
            "wire ({}, {}) to ({}, {})",
            wire.start.x, wire.start.y, wire.end.x, wire.end.y
        ),
        ItemKind::Label(label) => format!("label {}", label.net),
        ItemKind::Junction { position } => format!("junction ({}, {})", position.x, position.y),
        ItemKind::Text(text) => format!("text {:?}", text.text),
    }
}

pub struct InspectSelectionTool;

impl InspectSelectionTool {
    pub const NAME: &'static str = names::INSPECT_SELECTION;
}

impl Tool for InspectSelectionTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Describe the items the user has currently selected in the editor."
    }

    fn schema(&self) -> ToolSchema {
        object_schema().build()
    }

    fn example(&self) -> Value {
        json!({})
    }

    fn execute(&self, ctx: &mut ToolContext<'_>, _payload: &Payload) -> Result<ToolOutput, ToolError> {
        let document = ctx.document();
        let selected: Vec<&Item> = document
            .selection()
            .into_iter()
            .filter_map(|id| document.item(id))
            .collect();
        if selected.is_empty() {
            return Err(ToolError::NoSelection);
        }

        let summary: Vec<String> = selected.iter().map(|item| describe(item)).collect();
        let items = selected
            .iter()
            .map(|item| serde_json::to_value(item))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ToolError::OperationFailed(format!("failed to serialize selection: {}", e)))?;

        Ok(ToolOutput::message(format!(
            "{} selected: {}",
            selected.len(),
            summary.join("; ")
        ))
        .with_data(Value::Array(items)))
    }
}

#[derive(Debug, Deserialize)]
struct GetNetParams {
    net: String,
}

/// Pins lying exactly on one of `points`, as `REF.PIN`
fn pins_at(document: &dyn SchematicDocument, points: &[Point]) -> Vec<String> {
    let mut pins = Vec::new();
    for item in document.items() {
        if let ItemKind::Symbol(symbol) = &item.kind {
            for pin in &symbol.pins {
                if points.iter().any(|p| p.approx_eq(pin.position)) {
                    pins.push(format!("{}.{}", symbol.reference, pin.number));
                }
            }
        }
    }
    pins
}

pub struct GetNetTool;

impl GetNetTool {
    pub const NAME: &'static str = names::GET_NET;
}

impl Tool for GetNetTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "List the labels carrying a net name and the pins they sit on."
    }

    fn schema(&self) -> ToolSchema {
        object_schema()
            .field(string_field("net", "Net name").required())
            .build()
    }

    fn example(&self) -> Value {
        json!({"net": "GND"})
    }

    fn execute(&self, ctx: &mut ToolContext<'_>, payload: &Payload) -> Result<ToolOutput, ToolError> {
        let params: GetNetParams = parse_params(payload)?;
        let net = params.net.trim();
        let document = ctx.document();

        let labels: Vec<(&Item, Point)> = document
            .items()
            .into_iter()
            .filter_map(|item| match &item.kind {
                ItemKind::Label(label) if label.net == net => Some((item, label.position)),
                _ => None,
            })
            .collect();
        if labels.is_empty() {
            return Err(ToolError::NetNotFound(net.to_string()));
        }

        let points: Vec<Point> = labels.iter().map(|(_, p)| *p).collect();
        let pins = pins_at(document, &points);
        let labels: Vec<Value> = labels
            .iter()
            .map(|(item, p)| json!({"id": item.id, "x": p.x, "y": p.y}))
            .collect();

        let message = if pins.is_empty() {
            format!("Net {}: {} labels", net, labels.len())
        } else {
            format!("Net {}: {} labels on {}", net, labels.len(), pins.join(", "))
        };
        Ok(ToolOutput::message(message).with_data(json!({
            "net": net,
            "labels": labels,
            "pins": pins,
        })))
    }
}
