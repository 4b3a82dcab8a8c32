//! System and user prompts for the schematic agent
//!
//! The system prompt is rendered from the live registry so the catalog the
//! model sees always matches the tools the dispatcher accepts.

use std::fmt::Write;

use crate::config::StreamConfig;
use crate::tools::ToolRegistry;

/// Fixed part of the system prompt. `{open}`, `{close}` and `{keyword}` are
/// replaced with the configured stream grammar.
pub const SYSTEM_PROMPT: &str = r#"You are a schematic capture assistant. You edit the schematic that is open in the user's editor by calling tools.

## Output format
- Write short explanations for the user as plain text.
- Put private reasoning between {open} and {close}. It is never shown as part of the answer.
- Call a tool with exactly one line of the form:
  {keyword} <tool_name> <json_object>
  The line starts with `{keyword}` and holds nothing else. The JSON object must be valid and on one line.
- Tool calls run one at a time, in the order you write them. A call can rely on the effects of the calls before it.
- A failed call changes nothing. Do not repeat it unchanged.
- Lines starting with `#` are ignored.

## Coordinates
- All positions are in millimeters. The origin is the top-left corner of the sheet; x grows to the right and y grows downward.
- Keep positions on the 2.54 mm grid.
- Rotation is in degrees (0, 90, 180 or 270), clockwise on screen.

## Conventions
- Signals flow left to right. Power sits at the top and ground at the bottom.
- Prefer net labels over long wires, and avoid routing wires through component bodies.
- Use standard net names such as VCC, GND or SPI_MOSI.
- Only use the tools listed below. Never invent tool names.
"#;

/// Render the system prompt with the grammar and the tool catalog
pub fn system_prompt(registry: &ToolRegistry, stream: &StreamConfig) -> String {
    let mut prompt = SYSTEM_PROMPT
        .replace("{open}", &stream.reasoning_open)
        .replace("{close}", &stream.reasoning_close)
        .replace("{keyword}", &stream.tool_keyword);

    if registry.is_empty() {
        prompt.push_str("\nNo tools are available. Describe the intended changes instead.\n");
        return prompt;
    }

    prompt.push_str("\n## Tools\n");
    for entry in registry.values() {
        let tool = &entry.tool;
        let schema = serde_json::to_string(&entry.schema.to_json()).unwrap_or_default();
        let example = serde_json::to_string(&tool.example()).unwrap_or_default();
        let _ = write!(
            prompt,
            "\n### {name}\n{description}\nSchema: {schema}\nExample:\n{keyword} {name} {example}\n",
            name = tool.name(),
            description = tool.description(),
            schema = schema,
            keyword = stream.tool_keyword,
            example = example,
        );
    }
    prompt
}

/// Wrap the user's request for the generation service
pub fn user_prompt(request: &str) -> String {
    format!(
        "USER REQUEST:\n{}\n\nExplain the plan briefly, then emit the tool lines needed to carry it out.\n",
        request.trim()
    )
}
