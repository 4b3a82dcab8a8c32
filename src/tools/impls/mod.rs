//! Concrete schematic tools

mod add_wire;
mod annotation;
mod datasheet;
mod delete_item;
mod inspect;
mod move_component;
mod net_label;
mod place_component;
mod search_symbol;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use super::{Payload, ToolError, ToolSettings};
use crate::document::{ItemId, ItemKind, Point, SchematicDocument, Symbol};

pub use add_wire::AddWireTool;
pub use annotation::{AddJunctionTool, AddTextTool};
pub use datasheet::GetDatasheetTool;
pub use delete_item::DeleteItemTool;
pub use inspect::{GetNetTool, InspectSelectionTool};
pub use move_component::MoveComponentTool;
pub use net_label::{AddNetLabelTool, ConnectWithNetLabelTool};
pub use place_component::PlaceComponentTool;
pub use search_symbol::SearchSymbolTool;

/// Decode a payload that already passed schema validation
fn parse_params<T: DeserializeOwned>(payload: &Payload) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(payload.clone()))
        .map_err(|e| ToolError::InvalidPayload(format!("Invalid params: {}", e)))
}

/// Sheet position given as `x`/`y` fields
#[derive(Debug, Clone, Copy, Deserialize)]
struct XY {
    x: f64,
    y: f64,
}

impl XY {
    fn on_sheet(self, settings: &ToolSettings) -> Result<Point, ToolError> {
        settings.check_point(Point::new(self.x, self.y))
    }
}

fn find_component<'d>(
    document: &'d dyn SchematicDocument,
    reference: &str,
) -> Result<(ItemId, &'d Symbol), ToolError> {
    document
        .symbol_by_reference(reference)
        .ok_or_else(|| ToolError::ComponentNotFound(reference.to_string()))
}

/// One past the highest numbered reference for `prefix`, e.g. `R5` after
/// `R1`, `R4`
fn next_reference(document: &dyn SchematicDocument, prefix: &str) -> Result<String, ToolError> {
    let highest = document
        .items()
        .into_iter()
        .filter_map(|item| match &item.kind {
            ItemKind::Symbol(symbol) => symbol.reference.strip_prefix(prefix)?.parse::<u64>().ok(),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    let next = highest.checked_add(1).ok_or_else(|| {
        ToolError::invalid_parameter(
            "reference",
            format!("no {} number left to assign; pass a reference explicitly", prefix),
        )
    })?;
    Ok(format!("{}{}", prefix, next))
}


#[cfg(test)]
mod tests {
    use super::testing::{dispatcher, run};
    use super::*;
    use crate::tools::names;
    use serde_json::json;

    #[test]
    fn test_next_reference_skips_used_numbers() {
        let mut d = dispatcher();
        assert_eq!(next_reference(d.document(), "R").unwrap(), "R1");
        for reference in ["R1", "R4"] {
            run(
                &mut d,
                names::PLACE_COMPONENT,
                json!({"symbol": "Device:R", "x": 10, "y": 10, "reference": reference}),
            )
            .unwrap();
        }
        assert_eq!(next_reference(d.document(), "R").unwrap(), "R5");
        assert_eq!(next_reference(d.document(), "C").unwrap(), "C1");
    }

    #[test]
    fn test_next_reference_past_u32() {
        let mut d = dispatcher();
        run(
            &mut d,
            names::PLACE_COMPONENT,
            json!({"symbol": "Device:R", "x": 10, "y": 10, "reference": "R4294967295"}),
        )
        .unwrap();
        let out = run(
            &mut d,
            names::PLACE_COMPONENT,
            json!({"symbol": "Device:R", "x": 30, "y": 10}),
        )
        .unwrap();
        assert_eq!(out.data.unwrap()["reference"], "R4294967296");
    }

    #[test]
    fn test_next_reference_exhausted() {
        let mut d = dispatcher();
        run(
            &mut d,
            names::PLACE_COMPONENT,
            json!({"symbol": "Device:R", "x": 10, "y": 10, "reference": format!("R{}", u64::MAX)}),
        )
        .unwrap();
        let err = run(
            &mut d,
            names::PLACE_COMPONENT,
            json!({"symbol": "Device:R", "x": 30, "y": 10}),
        )
        .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameter { ref field, .. } if field == "reference"));
        assert_eq!(d.document().len(), 1);
    }
}
