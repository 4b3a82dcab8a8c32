//! Tool invocation line grammar
//!
//! ```text
//! TOOL <dotted.name> <json object>
//! ```
//!
//! The keyword and the single space after it have already been consumed by
//! the demultiplexer; this module classifies the rest of the line.

use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static TOOL_NAME: LazyLock<Result<Regex, fancy_regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$"));

/// A tool call recognized in the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    /// Payload text exactly as received, validated later by the dispatcher
    pub raw_payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineParse {
    /// A complete invocation. The payload may still be rejected later.
    Complete(ToolInvocation),
    /// The JSON object has not been closed yet
    Incomplete,
    /// Not an invocation at all; dropped without reaching the queue
    Malformed(String),
}

pub(crate) fn is_tool_name(name: &str) -> bool {
    match TOOL_NAME.as_ref() {
        Ok(re) => re.is_match(name).unwrap_or(false),
        Err(_) => false,
    }
}

/// Classify the text after `TOOL `
pub(crate) fn parse_line(rest: &str) -> LineParse {
    let rest = rest.trim();
    let (name, payload) = match rest.split_once(char::is_whitespace) {
        Some((name, payload)) => (name, payload.trim()),
        None => (rest, ""),
    };

    if !is_tool_name(name) {
        return LineParse::Malformed(format!("invalid tool name {:?}", name));
    }

    let invocation = ToolInvocation {
        name: name.to_string(),
        raw_payload: payload.to_string(),
    };

    // Only an object that has been opened but not closed is worth waiting for
    if payload.starts_with('{') {
        if let Err(e) = serde_json::from_str::<Value>(payload) {
            if e.is_eof() {
                return LineParse::Incomplete;
            }
        }
    }
    LineParse::Complete(invocation)
}
