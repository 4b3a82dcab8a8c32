use serde::Deserialize;
use serde_json::{json, Value};

use super::{find_component, parse_params, XY};
use crate::document::ItemKind;
use crate::tools::schema::{number_field, object_schema, string_field};
use crate::tools::{names, Payload, Tool, ToolContext, ToolError, ToolOutput, ToolSchema};

#[derive(Debug, Deserialize)]
struct MoveComponentParams {
    reference: String,
    #[serde(flatten)]
    to: XY,
}

/// Move a placed symbol; its pins and body move with it
pub struct MoveComponentTool;

impl MoveComponentTool {
    pub const NAME: &'static str = names::MOVE_COMPONENT;
}

impl Tool for MoveComponentTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Move a placed component to a new anchor position. Wires are not dragged along."
    }

    fn schema(&self) -> ToolSchema {
        object_schema()
            .field(string_field("reference", "Reference designator, e.g. R1").required())
            .field(number_field("x", "New anchor x in mm").required())
            .field(number_field("y", "New anchor y in mm").required())
            .build()
    }

    fn example(&self) -> Value {
        json!({"reference": "R1", "x": 120, "y": 50})
    }

    fn execute(&self, ctx: &mut ToolContext<'_>, payload: &Payload) -> Result<ToolOutput, ToolError> {
        let params: MoveComponentParams = parse_params(payload)?;
        let position = params.to.on_sheet(ctx.settings())?;

        let (id, symbol) = find_component(ctx.document(), &params.reference)?;
        let mut symbol = symbol.clone();
        let from = symbol.position;
        symbol.move_to(position);

        ctx.document_mut().replace_item(id, ItemKind::Symbol(symbol))?;
        Ok(ToolOutput::message(format!(
            "Moved {} from ({}, {}) to ({}, {})",
            params.reference, from.x, from.y, position.x, position.y
        )))
    }
}
