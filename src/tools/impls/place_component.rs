//! Place a library symbol on the sheet

use serde::Deserialize;
use serde_json::{json, Value};

use super::{next_reference, parse_params, XY};
use crate::document::{ItemKind, Orientation, Pin, Rotation, Symbol};
use crate::library::{LibId, LibraryError};
use crate::tools::schema::{boolean_field, integer_field, number_field, object_schema, string_field};
use crate::tools::{names, Payload, Tool, ToolContext, ToolError, ToolOutput, ToolSchema};

#[derive(Debug, Deserialize)]
struct PlaceComponentParams {
    symbol: String,
    #[serde(flatten)]
    at: XY,
    reference: Option<String>,
    value: Option<String>,
    unit: Option<f64>,
    rotation: Option<f64>,
    mirror_x: Option<bool>,
    mirror_y: Option<bool>,
}

/// Rotation given in degrees; the schema has already restricted the values
pub(super) fn parse_rotation(degrees: Option<f64>) -> Result<Rotation, ToolError> {
    match degrees {
        None => Ok(Rotation::R0),
        Some(d) => Rotation::from_degrees(d).ok_or_else(|| {
            ToolError::invalid_parameter(
                "rotation",
                format!("must be one of 0, 90, 180, 270 (got {})", d),
            )
        }),
    }
}

pub struct PlaceComponentTool;

impl PlaceComponentTool {
    pub const NAME: &'static str = names::PLACE_COMPONENT;
}

impl Tool for PlaceComponentTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Place a symbol from the library at a sheet position. The reference designator \
         is assigned automatically when omitted."
    }

    fn schema(&self) -> ToolSchema {
        object_schema()
            .field(string_field("symbol", "Library id, e.g. Device:R").required())
            .field(number_field("x", "Anchor x in mm").required())
            .field(number_field("y", "Anchor y in mm").required())
            .field(string_field("reference", "Reference designator, e.g. R1"))
            .field(string_field("value", "Value field, e.g. 10k"))
            .field(integer_field("unit", "Unit of a multi-unit symbol, starting at 1"))
            .field(
                number_field("rotation", "Clockwise rotation in degrees")
                    .one_of(Rotation::DEGREES),
            )
            .field(boolean_field("mirror_x", "Mirror across the horizontal axis"))
            .field(boolean_field("mirror_y", "Mirror across the vertical axis"))
            .build()
    }

    fn example(&self) -> Value {
        json!({"symbol": "Device:R", "x": 100, "y": 50, "value": "10k", "rotation": 90})
    }

    fn execute(&self, ctx: &mut ToolContext<'_>, payload: &Payload) -> Result<ToolOutput, ToolError> {
        let params: PlaceComponentParams = parse_params(payload)?;

        let lib_id: LibId = params
            .symbol
            .parse()
            .map_err(|e: LibraryError| ToolError::invalid_parameter("symbol", e.to_string()))?;
        let position = params.at.on_sheet(ctx.settings())?;
        let orientation = Orientation {
            rotation: parse_rotation(params.rotation)?,
            mirror_x: params.mirror_x.unwrap_or(false),
            mirror_y: params.mirror_y.unwrap_or(false),
        };

        let lib_symbol = ctx
            .library()
            .lookup(&lib_id)
            .ok_or_else(|| ToolError::SymbolNotFound(lib_id.to_string()))?;

        let unit = params.unit.unwrap_or(1.0);
        if unit < 1.0 || unit > f64::from(lib_symbol.units) {
            return Err(ToolError::invalid_parameter(
                "unit",
                format!("{} has units 1..={} (got {})", lib_id, lib_symbol.units, unit),
            ));
        }

        let reference = match params.reference.map(|r| r.trim().to_string()) {
            Some(r) if r.is_empty() => {
                return Err(ToolError::invalid_parameter("reference", "must not be empty"));
            }
            Some(r) => {
                if ctx.document().symbol_by_reference(&r).is_some() {
                    return Err(ToolError::invalid_parameter(
                        "reference",
                        format!("{} is already placed", r),
                    ));
                }
                r
            }
            None => next_reference(ctx.document(), &lib_symbol.reference_prefix)?,
        };

        let pins = lib_symbol
            .pins
            .iter()
            .map(|def| Pin {
                number: def.number.clone(),
                name: def.name.clone(),
                position: orientation.apply(def.offset()).offset(position),
            })
            .collect::<Vec<_>>();
        let bounding_box = orientation.apply_rect(lib_symbol.body).translate(position);

        let symbol = Symbol {
            lib_id: lib_id.to_string(),
            reference: reference.clone(),
            value: params.value.unwrap_or_else(|| lib_symbol.value.clone()),
            unit: unit as u32,
            position,
            orientation,
            datasheet: lib_symbol.datasheet.clone(),
            bounding_box,
            pins,
        };
        let pin_positions: Vec<Value> = symbol
            .pins
            .iter()
            .map(|p| json!({"number": p.number, "x": p.position.x, "y": p.position.y}))
            .collect();

        let id = ctx.document_mut().add_item(ItemKind::Symbol(symbol))?;
        tracing::debug!("Placed {} at ({}, {})", reference, position.x, position.y);

        Ok(
            ToolOutput::message(format!("Placed {} ({})", reference, lib_id)).with_data(json!({
                "id": id,
                "reference": reference,
                "pins": pin_positions,
            })),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{MemorySchematic, Point, SchematicDocument};
    use crate::tools::impls::testing::{dispatcher, run};
    use crate::tools::{ErrorCode, ToolDispatcher};

    fn placed(d: &ToolDispatcher<MemorySchematic>, reference: &str) -> Symbol {
        d.document().symbol_by_reference(reference).unwrap().1.clone()
    }

    #[test]
    fn test_place_assigns_reference_and_absolute_pins() {
        let mut d = dispatcher();
        let output = run(
            &mut d,
            names::PLACE_COMPONENT,
            json!({"symbol": "Device:R", "x": 10, "y": 5}),
        )
        .unwrap();
        assert_eq!(output.message.as_deref(), Some("Placed R1 (Device:R)"));

        let symbol = placed(&d, "R1");
        assert_eq!(symbol.value, "R");
        assert_eq!(symbol.pin("1").unwrap().position, Point::new(10.0, 5.0 - 3.81));
        assert_eq!(symbol.pin("2").unwrap().position, Point::new(10.0, 5.0 + 3.81));
        assert_eq!(symbol.bounding_box.y_min, 5.0 - 2.54);
        assert_eq!(d.document().history()[0].description, "Placed R1 (Device:R)");

        run(&mut d, names::PLACE_COMPONENT, json!({"symbol": "Device:R", "x": 30, "y": 5})).unwrap();
        assert!(d.document().symbol_by_reference("R2").is_some());
    }

    #[test]
    fn test_rotation_turns_pins_clockwise() {
        let mut d = dispatcher();
        run(
            &mut d,
            names::PLACE_COMPONENT,
            json!({"symbol": "Device:R", "x": 50, "y": 50, "rotation": 90}),
        )
        .unwrap();
        let symbol = placed(&d, "R1");
        // Pin 1 sits above the anchor; a quarter turn clockwise moves it right
        assert!(symbol.pin("1").unwrap().position.approx_eq(Point::new(53.81, 50.0)));
        assert_eq!(symbol.orientation.rotation, Rotation::R90);
    }

    #[test]
    fn test_mirror_before_rotation() {
        let orientation = Orientation {
            rotation: Rotation::R90,
            mirror_x: true,
            mirror_y: false,
        };
        let p = orientation
            .apply(Point::new(0.0, -3.81))
            .offset(Point::new(50.0, 50.0));
        assert!(p.approx_eq(Point::new(46.19, 50.0)));
    }

    #[test]
    fn test_explicit_reference_and_value() {
        let mut d = dispatcher();
        run(
            &mut d,
            names::PLACE_COMPONENT,
            json!({"symbol": "Device:C", "x": 20, "y": 20, "reference": "C7", "value": "100n"}),
        )
        .unwrap();
        let symbol = placed(&d, "C7");
        assert_eq!(symbol.value, "100n");

        let err = run(
            &mut d,
            names::PLACE_COMPONENT,
            json!({"symbol": "Device:C", "x": 40, "y": 20, "reference": "C7"}),
        )
        .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::InvalidParameter));
        assert_eq!(d.document().len(), 1);
    }

    #[test]
    fn test_placement_errors() {
        let mut d = dispatcher();
        let cases = [
            (json!({"symbol": "NoColon", "x": 1, "y": 1}), ErrorCode::InvalidParameter),
            (json!({"symbol": "Device:Nope", "x": 1, "y": 1}), ErrorCode::SymbolNotFound),
            (json!({"symbol": "Device:R", "x": -1, "y": 1}), ErrorCode::InvalidCoordinates),
            (json!({"symbol": "Device:R", "x": 1, "y": 5000}), ErrorCode::InvalidCoordinates),
            (json!({"symbol": "Device:R", "x": 1, "y": 1, "unit": 2}), ErrorCode::InvalidParameter),
            (json!({"symbol": "Device:R", "x": 1, "y": 1, "unit": 0}), ErrorCode::InvalidParameter),
            (json!({"symbol": "Device:R", "x": 1, "y": 1, "rotation": 45}), ErrorCode::InvalidParameter),
            (json!({"symbol": "Device:R", "x": 1}), ErrorCode::InvalidParameter),
        ];
        for (payload, code) in cases {
            let err = run(&mut d, names::PLACE_COMPONENT, payload.clone()).unwrap_err();
            assert_eq!(err.code(), Some(code), "payload {}", payload);
        }
        assert!(d.document().is_empty());
        assert!(d.document().history().is_empty());
    }

    #[test]
    fn test_power_symbols_use_their_prefix() {
        let mut d = dispatcher();
        run(&mut d, names::PLACE_COMPONENT, json!({"symbol": "power:GND", "x": 10, "y": 80})).unwrap();
        let item = d.document().items()[0].clone();
        match item.kind {
            ItemKind::Symbol(symbol) => assert_eq!(symbol.reference, "#PWR1"),
            other => panic!("unexpected item {:?}", other),
        }
    }
}
