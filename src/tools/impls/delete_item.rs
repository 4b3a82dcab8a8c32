use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::parse_params;
use crate::tools::schema::{object_schema, string_field};
use crate::tools::{names, Payload, Tool, ToolContext, ToolError, ToolOutput, ToolSchema};

#[derive(Debug, Deserialize)]
struct DeleteItemParams {
    id: String,
}

pub struct DeleteItemTool;

impl DeleteItemTool {
    pub const NAME: &'static str = names::DELETE_ITEM;
}

impl Tool for DeleteItemTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Delete an item from the sheet by its id, as returned when it was created or \
         listed by schematic.inspect_selection."
    }

    fn schema(&self) -> ToolSchema {
        object_schema()
            .field(string_field("id", "Item id (uuid)").required())
            .build()
    }

    fn example(&self) -> Value {
        json!({"id": "6f1c2b1e-3c4d-4e5f-8a9b-0c1d2e3f4a5b"})
    }

    fn execute(&self, ctx: &mut ToolContext<'_>, payload: &Payload) -> Result<ToolOutput, ToolError> {
        let params: DeleteItemParams = parse_params(payload)?;
        let id = Uuid::parse_str(params.id.trim())
            .map_err(|e| ToolError::invalid_parameter("id", e.to_string()))?;

        let removed = ctx.document_mut().remove_item(id)?;
        Ok(ToolOutput::message(format!(
            "Deleted {} {}",
            removed.kind.type_name(),
            id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::impls::testing::{dispatcher, run};
    use crate::tools::ErrorCode;

    #[test]
    fn test_delete_item() {
        let mut d = dispatcher();
        let output = run(&mut d, names::ADD_JUNCTION, json!({"x": 5, "y": 5})).unwrap();
        let id = output.data.unwrap()["id"].as_str().unwrap().to_string();

        let output = run(&mut d, names::DELETE_ITEM, json!({"id": id})).unwrap();
        assert_eq!(output.message, Some(format!("Deleted junction {}", id)));
        assert!(d.document().is_empty());

        let err = run(&mut d, names::DELETE_ITEM, json!({"id": id})).unwrap_err();
        assert_eq!(err, ToolError::ItemNotFound(id));
    }

    #[test]
    fn test_delete_rejects_bad_id() {
        let mut d = dispatcher();
        let err = run(&mut d, names::DELETE_ITEM, json!({"id": "R1"})).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidParameter));
    }
}
