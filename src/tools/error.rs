//! Tool failure taxonomy

use thiserror::Error;

use super::response::ErrorCode;
use crate::document::DocumentError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("component not found: {0}")]
    ComponentNotFound(String),
    #[error("symbol not found in library: {0}")]
    SymbolNotFound(String),
    #[error("net not found: {0}")]
    NetNotFound(String),
    #[error("item not found: {0}")]
    ItemNotFound(String),
    #[error("nothing is selected")]
    NoSelection,
    #[error("{0}")]
    OperationFailed(String),
    #[error("cancelled before execution")]
    Cancelled,
}

impl ToolError {
    pub fn invalid_parameter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Canonical error code surfaced in the response envelope
    pub fn code(&self) -> Option<ErrorCode> {
        let code = match self {
            ToolError::UnknownTool(_) => ErrorCode::UnknownTool,
            ToolError::InvalidPayload(_) => ErrorCode::InvalidPayload,
            ToolError::InvalidParameter { .. } => ErrorCode::InvalidParameter,
            ToolError::InvalidCoordinates(_) => ErrorCode::InvalidCoordinates,
            ToolError::ComponentNotFound(_) => ErrorCode::ComponentNotFound,
            ToolError::SymbolNotFound(_) => ErrorCode::SymbolNotFound,
            ToolError::NetNotFound(_) => ErrorCode::NetNotFound,
            ToolError::ItemNotFound(_) => ErrorCode::ItemNotFound,
            ToolError::NoSelection => ErrorCode::NoSelection,
            ToolError::OperationFailed(_) => ErrorCode::OperationFailed,
            ToolError::Cancelled => return None,
        };
        Some(code)
    }
}

impl From<DocumentError> for ToolError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::ItemNotFound(id) => ToolError::ItemNotFound(id.to_string()),
            other => ToolError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            ToolError::UnknownTool("foo.bar".into()).code(),
            Some(ErrorCode::UnknownTool)
        );
        assert_eq!(
            ToolError::invalid_parameter("x", "missing").code(),
            Some(ErrorCode::InvalidParameter)
        );
        assert_eq!(ToolError::Cancelled.code(), None);
    }

    #[test]
    fn test_document_error_conversion() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(
            ToolError::from(DocumentError::ItemNotFound(id)),
            ToolError::ItemNotFound(id.to_string())
        );
        assert_eq!(
            ToolError::from(DocumentError::TransactionAlreadyOpen).code(),
            Some(ErrorCode::OperationFailed)
        );
    }

    #[test]
    fn test_messages_name_the_field() {
        let err = ToolError::invalid_parameter("rotation", "must be one of 0, 90, 180, 270");
        assert_eq!(
            err.to_string(),
            "invalid parameter `rotation`: must be one of 0, 90, 180, 270"
        );
    }
}
