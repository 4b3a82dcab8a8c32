//! Response envelope returned for every tool call

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ComponentNotFound,
    SymbolNotFound,
    InvalidCoordinates,
    InvalidParameter,
    NoSelection,
    OperationFailed,
    NetNotFound,
    ItemNotFound,
    UnknownTool,
    InvalidPayload,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ComponentNotFound => "COMPONENT_NOT_FOUND",
            ErrorCode::SymbolNotFound => "SYMBOL_NOT_FOUND",
            ErrorCode::InvalidCoordinates => "INVALID_COORDINATES",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::NoSelection => "NO_SELECTION",
            ErrorCode::OperationFailed => "OPERATION_FAILED",
            ErrorCode::NetNotFound => "NET_NOT_FOUND",
            ErrorCode::ItemNotFound => "ITEM_NOT_FOUND",
            ErrorCode::UnknownTool => "UNKNOWN_TOOL",
            ErrorCode::InvalidPayload => "INVALID_PAYLOAD",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful handler result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub message: Option<String>,
    pub data: Option<Value>,
}

impl ToolOutput {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Wire shape of a tool result:
/// `{success, message?, data?}` on success, `{success: false, error, error_code?}` on failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

impl ToolResponse {
    pub fn success(output: ToolOutput) -> Self {
        Self {
            success: true,
            message: output.message,
            data: output.data,
            error: None,
            error_code: None,
        }
    }

    pub fn failure(error: &ToolError) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error.to_string()),
            error_code: error.code(),
        }
    }

    pub fn from_result(result: &Result<ToolOutput, ToolError>) -> Self {
        match result {
            Ok(output) => Self::success(output.clone()),
            Err(error) => Self::failure(error),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"success\":false}".to_string())
    }
}

/// One-line form shown to the user: the message, or the error plus its code
impl fmt::Display for ToolResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            return f.write_str(self.message.as_deref().unwrap_or("ok"));
        }
        let error = self.error.as_deref().unwrap_or("failed");
        match self.error_code {
            Some(code) => write!(f, "{} ({})", error, code),
            None => f.write_str(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_omits_absent_fields() {
        let response = ToolResponse::success(ToolOutput::message("Placed R1"));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": true, "message": "Placed R1"})
        );
    }

    #[test]
    fn test_failure_envelope_carries_code() {
        let response = ToolResponse::failure(&ToolError::UnknownTool("foo.bar".into()));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": false, "error": "unknown tool: foo.bar", "error_code": "UNKNOWN_TOOL"})
        );
        assert_eq!(response.to_string(), "unknown tool: foo.bar (UNKNOWN_TOOL)");
    }

    #[test]
    fn test_error_code_strings_match_serde() {
        for code in [
            ErrorCode::ComponentNotFound,
            ErrorCode::SymbolNotFound,
            ErrorCode::InvalidCoordinates,
            ErrorCode::InvalidParameter,
            ErrorCode::NoSelection,
            ErrorCode::OperationFailed,
            ErrorCode::NetNotFound,
            ErrorCode::ItemNotFound,
            ErrorCode::UnknownTool,
            ErrorCode::InvalidPayload,
        ] {
            assert_eq!(serde_json::to_value(code).unwrap(), json!(code.as_str()));
        }
    }
}
