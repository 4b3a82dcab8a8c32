//! Junction dots and free text

use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_params, XY};
use crate::document::{ItemKind, Text};
use crate::tools::schema::{number_field, object_schema, string_field};
use crate::tools::{names, Payload, Tool, ToolContext, ToolError, ToolOutput, ToolSchema};

pub struct AddJunctionTool;

impl AddJunctionTool {
    pub const NAME: &'static str = names::ADD_JUNCTION;
}

impl Tool for AddJunctionTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Place a junction dot where wires cross and should connect."
    }

    fn schema(&self) -> ToolSchema {
        object_schema()
            .field(number_field("x", "X in mm").required())
            .field(number_field("y", "Y in mm").required())
            .build()
    }

    fn example(&self) -> Value {
        json!({"x": 100, "y": 80})
    }

    fn execute(&self, ctx: &mut ToolContext<'_>, payload: &Payload) -> Result<ToolOutput, ToolError> {
        let at: XY = parse_params(payload)?;
        let position = at.on_sheet(ctx.settings())?;
        let id = ctx
            .document_mut()
            .add_item(ItemKind::Junction { position })?;
        Ok(
            ToolOutput::message(format!("Added junction at ({}, {})", position.x, position.y))
                .with_data(json!({"id": id})),
        )
    }
}

#[derive(Debug, Deserialize)]
struct AddTextParams {
    text: String,
    #[serde(flatten)]
    at: XY,
}

pub struct AddTextTool;

impl AddTextTool {
    pub const NAME: &'static str = names::ADD_TEXT;
}

impl Tool for AddTextTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Place a free text annotation on the sheet."
    }

    fn schema(&self) -> ToolSchema {
        object_schema()
            .field(string_field("text", "Text to place").required())
            .field(number_field("x", "X in mm").required())
            .field(number_field("y", "Y in mm").required())
            .build()
    }

    fn example(&self) -> Value {
        json!({"text": "5V regulator", "x": 90, "y": 70})
    }

    fn execute(&self, ctx: &mut ToolContext<'_>, payload: &Payload) -> Result<ToolOutput, ToolError> {
        let params: AddTextParams = parse_params(payload)?;
        if params.text.trim().is_empty() {
            return Err(ToolError::invalid_parameter("text", "must not be empty"));
        }
        let position = params.at.on_sheet(ctx.settings())?;
        let id = ctx.document_mut().add_item(ItemKind::Text(Text {
            text: params.text,
            position,
        }))?;
        Ok(ToolOutput::message("Added text").with_data(json!({"id": id})))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MemorySchematic, Point, SchematicDocument};
    use crate::tools::impls::testing::{dispatcher, run};
    use crate::tools::ErrorCode;

    #[test]
    fn test_add_junction_and_text() {
        let mut d = dispatcher();
        run(&mut d, names::ADD_JUNCTION, json!({"x": 12.7, "y": 25.4})).unwrap();
        run(&mut d, names::ADD_TEXT, json!({"text": "Power", "x": 10, "y": 10})).unwrap();

        let document: &MemorySchematic = d.document();
        let kinds: Vec<&ItemKind> = document.items().into_iter().map(|i| &i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                &ItemKind::Junction {
                    position: Point::new(12.7, 25.4)
                },
                &ItemKind::Text(Text {
                    text: "Power".into(),
                    position: Point::new(10.0, 10.0)
                }),
            ]
        );
        assert_eq!(document.history().len(), 2);
    }

    #[test]
    fn test_annotation_errors() {
        let mut d = dispatcher();
        let err = run(&mut d, names::ADD_JUNCTION, json!({"x": "1", "y": 1})).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidParameter));
        let err = run(&mut d, names::ADD_TEXT, json!({"text": "", "x": 1, "y": 1})).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidParameter));
        let err = run(&mut d, names::ADD_TEXT, json!({"text": "far", "x": 1, "y": -0.5})).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidCoordinates));
        assert!(d.document().is_empty());
    }
}
