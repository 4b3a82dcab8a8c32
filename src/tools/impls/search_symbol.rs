use serde::Deserialize;
use serde_json::{json, Value};

use super::parse_params;
use crate::tools::schema::{integer_field, object_schema, string_field};
use crate::tools::{names, Payload, Tool, ToolContext, ToolError, ToolOutput, ToolSchema};

const DEFAULT_LIMIT: usize = 10;
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchSymbolParams {
    query: String,
    limit: Option<f64>,
}

/// Read-only search of the symbol library
pub struct SearchSymbolTool;

impl SearchSymbolTool {
    pub const NAME: &'static str = names::SEARCH_SYMBOL;
}

impl Tool for SearchSymbolTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Search the symbol library by id, description or keyword. Use the returned \
         lib_id with schematic.place_component."
    }

    fn schema(&self) -> ToolSchema {
        object_schema()
            .field(string_field("query", "Search text, e.g. regulator").required())
            .field(integer_field("limit", "Maximum number of results (default 10)"))
            .build()
    }

    fn example(&self) -> Value {
        json!({"query": "capacitor", "limit": 5})
    }

    fn execute(&self, ctx: &mut ToolContext<'_>, payload: &Payload) -> Result<ToolOutput, ToolError> {
        let params: SearchSymbolParams = parse_params(payload)?;
        let limit = match params.limit {
            None => DEFAULT_LIMIT,
            Some(n) if n >= 1.0 => (n as usize).min(MAX_LIMIT),
            Some(n) => {
                return Err(ToolError::invalid_parameter(
                    "limit",
                    format!("must be at least 1 (got {})", n),
                ));
            }
        };

        let matches: Vec<Value> = ctx
            .library()
            .search(&params.query, limit)
            .into_iter()
            .map(|symbol| {
                json!({
                    "lib_id": symbol.lib_id,
                    "description": symbol.description,
                    "pins": symbol.pins.len(),
                    "units": symbol.units,
                })
            })
            .collect();

        Ok(ToolOutput::message(format!(
            "{} symbols match {:?}",
            matches.len(),
            params.query
        ))
        .with_data(Value::Array(matches)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::impls::testing::{dispatcher, run};

    #[test]
    fn test_search_matches_keywords() {
        let mut d = dispatcher();
        let output = run(&mut d, names::SEARCH_SYMBOL, json!({"query": "LDO"})).unwrap();
        let data = output.data.unwrap();
        let ids: Vec<&str> = data
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|m| m["lib_id"].as_str())
            .collect();
        assert_eq!(ids, vec!["Regulator_Linear:LM7805_TO220"]);
    }

    #[test]
    fn test_search_limit() {
        let mut d = dispatcher();
        let output = run(&mut d, names::SEARCH_SYMBOL, json!({"query": "Device", "limit": 2})).unwrap();
        assert_eq!(output.data.unwrap().as_array().unwrap().len(), 2);

        let err = run(&mut d, names::SEARCH_SYMBOL, json!({"query": "x", "limit": 0})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameter { ref field, .. } if field == "limit"));
    }

    #[test]
    fn test_search_is_read_only() {
        let mut d = dispatcher();
        let output = run(&mut d, names::SEARCH_SYMBOL, json!({"query": "nothing-like-this"})).unwrap();
        assert_eq!(output.data, Some(json!([])));
        // The empty transaction still commits, but nothing changed
        assert!(d.document().is_empty());
    }
}
