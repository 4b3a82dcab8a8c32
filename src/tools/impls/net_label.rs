//! Net labels, free-standing or attached to a pin

use serde::Deserialize;
use serde_json::{json, Value};

use super::place_component::parse_rotation;
use super::{find_component, parse_params, XY};
use crate::document::{ItemKind, Label, LabelKind, Point, Rotation};
use crate::tools::schema::{number_field, object_schema, string_field, Field};
use crate::tools::{names, Payload, Tool, ToolContext, ToolError, ToolOutput, ToolSchema};

fn kind_field() -> Field {
    string_field("kind", "Label scope, default local").one_of(["local", "global", "hierarchical"])
}

fn net_name(net: &str) -> Result<String, ToolError> {
    let net = net.trim();
    if net.is_empty() {
        return Err(ToolError::invalid_parameter("net", "must not be empty"));
    }
    Ok(net.to_string())
}

fn add_label(
    ctx: &mut ToolContext<'_>,
    net: String,
    kind: LabelKind,
    position: Point,
    rotation: Rotation,
) -> Result<ToolOutput, ToolError> {
    let message = format!("Labeled net {} at ({}, {})", net, position.x, position.y);
    let id = ctx.document_mut().add_item(ItemKind::Label(Label {
        net,
        kind,
        position,
        rotation,
    }))?;
    Ok(ToolOutput::message(message).with_data(json!({"id": id})))
}

#[derive(Debug, Deserialize)]
struct AddNetLabelParams {
    net: String,
    #[serde(flatten)]
    at: XY,
    kind: Option<LabelKind>,
    rotation: Option<f64>,
}

pub struct AddNetLabelTool;

impl AddNetLabelTool {
    pub const NAME: &'static str = names::ADD_NET_LABEL;
}

impl Tool for AddNetLabelTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Place a net label at a sheet position. Labels with the same net name are connected."
    }

    fn schema(&self) -> ToolSchema {
        object_schema()
            .field(string_field("net", "Net name, e.g. VCC").required())
            .field(number_field("x", "X in mm").required())
            .field(number_field("y", "Y in mm").required())
            .field(kind_field())
            .field(number_field("rotation", "Degrees").one_of(Rotation::DEGREES))
            .build()
    }

    fn example(&self) -> Value {
        json!({"net": "VCC", "x": 60, "y": 40, "kind": "global"})
    }

    fn execute(&self, ctx: &mut ToolContext<'_>, payload: &Payload) -> Result<ToolOutput, ToolError> {
        let params: AddNetLabelParams = parse_params(payload)?;
        let net = net_name(&params.net)?;
        let position = params.at.on_sheet(ctx.settings())?;
        let rotation = parse_rotation(params.rotation)?;
        add_label(ctx, net, params.kind.unwrap_or_default(), position, rotation)
    }
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    reference: String,
    pin: String,
    net: String,
    kind: Option<LabelKind>,
}

/// Attach a net label directly at a component pin
pub struct ConnectWithNetLabelTool;

impl ConnectWithNetLabelTool {
    pub const NAME: &'static str = names::CONNECT_WITH_NET_LABEL;
}

impl Tool for ConnectWithNetLabelTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Connect a component pin to a net by placing a net label on the pin."
    }

    fn schema(&self) -> ToolSchema {
        object_schema()
            .field(string_field("reference", "Reference designator, e.g. U1").required())
            .field(string_field("pin", "Pin number or name").required())
            .field(string_field("net", "Net name").required())
            .field(kind_field())
            .build()
    }

    fn example(&self) -> Value {
        json!({"reference": "U1", "pin": "VO", "net": "+5V"})
    }

    fn execute(&self, ctx: &mut ToolContext<'_>, payload: &Payload) -> Result<ToolOutput, ToolError> {
        let params: ConnectParams = parse_params(payload)?;
        let net = net_name(&params.net)?;
        let (_, symbol) = find_component(ctx.document(), &params.reference)?;
        let position = symbol.pin(&params.pin).map(|p| p.position).ok_or_else(|| {
            ToolError::invalid_parameter(
                "pin",
                format!("{} has no pin {}", params.reference, params.pin),
            )
        })?;
        add_label(ctx, net, params.kind.unwrap_or_default(), position, Rotation::R0)
    }
}
