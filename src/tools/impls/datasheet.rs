use serde::Deserialize;
use serde_json::{json, Value};

use super::parse_params;
use crate::document::{ItemKind, SchematicDocument, Symbol};
use crate::tools::schema::{object_schema, string_field};
use crate::tools::{names, Payload, Tool, ToolContext, ToolError, ToolOutput, ToolSchema};

#[derive(Debug, Deserialize)]
struct GetDatasheetParams {
    reference: String,
}

/// Match a placed symbol by reference, then by value, then by library id
fn lookup<'d>(document: &'d dyn SchematicDocument, key: &str) -> Option<&'d Symbol> {
    let symbols: Vec<&Symbol> = document
        .items()
        .into_iter()
        .filter_map(|item| match &item.kind {
            ItemKind::Symbol(symbol) => Some(symbol),
            _ => None,
        })
        .collect();
    let by = |field: fn(&Symbol) -> &str| symbols.iter().copied().find(|s| field(s) == key);
    by(|s| s.reference.as_str())
        .or_else(|| by(|s| s.value.as_str()))
        .or_else(|| by(|s| s.lib_id.as_str()))
}

pub struct GetDatasheetTool;

impl GetDatasheetTool {
    pub const NAME: &'static str = names::GET_DATASHEET;
}

impl Tool for GetDatasheetTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Get the datasheet link of a placed component, matched by reference, value or library id."
    }

    fn schema(&self) -> ToolSchema {
        object_schema()
            .field(string_field("reference", "Reference, value or library id").required())
            .build()
    }

    fn example(&self) -> Value {
        json!({"reference": "U1"})
    }

    fn execute(&self, ctx: &mut ToolContext<'_>, payload: &Payload) -> Result<ToolOutput, ToolError> {
        let params: GetDatasheetParams = parse_params(payload)?;
        let symbol = lookup(ctx.document(), &params.reference)
            .ok_or_else(|| ToolError::ComponentNotFound(params.reference.clone()))?;

        let message = match &symbol.datasheet {
            Some(url) => format!("Datasheet for {}: {}", symbol.reference, url),
            None => format!("{} has no datasheet", symbol.reference),
        };
        Ok(ToolOutput::message(message).with_data(json!({
            "reference": symbol.reference,
            "lib_id": symbol.lib_id,
            "datasheet": symbol.datasheet,
        })))
    }
}
