//! Wire placement with orthogonal routing

use serde::Deserialize;
use serde_json::{json, Value};

use super::{find_component, parse_params};
use crate::document::{ItemKind, Point, Wire};
use crate::routing;
use crate::tools::schema::{object_field, object_schema};
use crate::tools::{names, Payload, Tool, ToolContext, ToolError, ToolOutput, ToolSchema};

#[derive(Debug, Deserialize)]
struct AddWireParams {
    start: Value,
    end: Value,
}

/// Pin keys arrive as strings ("A", "1") or bare numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PinKey {
    Name(String),
    Number(u64),
}

impl PinKey {
    fn into_string(self) -> String {
        match self {
            PinKey::Name(name) => name,
            PinKey::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Endpoint {
    Pin { reference: String, pin: PinKey },
    Point { x: f64, y: f64 },
}

fn resolve(ctx: &ToolContext<'_>, field: &str, value: &Value) -> Result<Point, ToolError> {
    let endpoint: Endpoint = serde_json::from_value(value.clone()).map_err(|_| {
        ToolError::invalid_parameter(field, "expected {\"x\", \"y\"} or {\"reference\", \"pin\"}")
    })?;
    match endpoint {
        Endpoint::Point { x, y } => ctx.settings().check_point(Point::new(x, y)),
        Endpoint::Pin { reference, pin } => {
            let (_, symbol) = find_component(ctx.document(), &reference)?;
            let pin = pin.into_string();
            symbol.pin(&pin).map(|p| p.position).ok_or_else(|| {
                ToolError::invalid_parameter(field, format!("{} has no pin {}", reference, pin))
            })
        }
    }
}

pub struct AddWireTool;

impl AddWireTool {
    pub const NAME: &'static str = names::ADD_WIRE;
}

impl Tool for AddWireTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Draw a wire between two points or pins. The wire is routed orthogonally: a \
         straight run when the ends share an axis, otherwise an L shape that avoids \
         component bodies where possible."
    }

    fn schema(&self) -> ToolSchema {
        object_schema()
            .field(object_field("start", "Start: {\"x\", \"y\"} in mm or {\"reference\", \"pin\"}").required())
            .field(object_field("end", "End: {\"x\", \"y\"} in mm or {\"reference\", \"pin\"}").required())
            .build()
    }

    fn example(&self) -> Value {
        json!({"start": {"reference": "R1", "pin": "2"}, "end": {"x": 120, "y": 80}})
    }

    fn execute(&self, ctx: &mut ToolContext<'_>, payload: &Payload) -> Result<ToolOutput, ToolError> {
        let params: AddWireParams = parse_params(payload)?;
        let start = resolve(ctx, "start", &params.start)?;
        let end = resolve(ctx, "end", &params.end)?;
        if start.approx_eq(end) {
            return Err(ToolError::InvalidCoordinates(format!(
                "wire from ({}, {}) to itself has zero length",
                start.x, start.y
            )));
        }

        let obstacles = ctx.document().obstacles();
        let route = routing::route(start, end, &obstacles, ctx.settings().obstacle_margin);
        if route.crossings > 0 {
            tracing::debug!("Wire route crosses {} component bodies", route.crossings);
        }

        let mut ids = Vec::with_capacity(route.segments.len());
        for segment in &route.segments {
            let wire = Wire {
                start: segment.start,
                end: segment.end,
            };
            ids.push(ctx.document_mut().add_item(ItemKind::Wire(wire))?);
        }

        let message = match route.bend() {
            Some(bend) => format!(
                "Wired ({}, {}) to ({}, {}) via ({}, {})",
                start.x, start.y, end.x, end.y, bend.x, bend.y
            ),
            None => format!("Wired ({}, {}) to ({}, {})", start.x, start.y, end.x, end.y),
        };
        Ok(ToolOutput::message(message).with_data(json!({
            "ids": ids,
            "segments": route.segments,
            "crossings": route.crossings,
        })))
    }
}
