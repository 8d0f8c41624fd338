//! # Result Envelope
//!
//! What every function call answers with, success or not:
//!
//! ```json
//! {
//!   "success": false,
//!   "message": "Another invoice is being created right now. Please wait a moment.",
//!   "error": "Another invoice is being created right now. Please wait a moment.",
//!   "code": "CONFLICT"
//! }
//! ```

use serde::Serialize;
use serde_json::Value;

use crate::error::{EngineError, ErrorCode};

/// Envelope returned by [`crate::Dispatcher::execute`].
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Always human-readable.
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        CommandResult {
            success: true,
            data: (!data.is_null()).then_some(data),
            message: message.into(),
            error: None,
            code: None,
        }
    }

    pub fn failure(err: &EngineError) -> Self {
        CommandResult {
            success: false,
            data: None,
            message: err.user_message(),
            error: Some(err.to_string()),
            code: Some(err.code()),
        }
    }
}

impl From<EngineError> for CommandResult {
    fn from(err: EngineError) -> Self {
        CommandResult::failure(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_omits_error() {
        let result = CommandResult::ok("Created invoice INV-001", json!({ "id": "x" }));
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["success"], json!(true));
        assert!(value.get("error").is_none());
        assert_eq!(value["data"]["id"], json!("x"));
    }

    #[test]
    fn test_failure_envelope() {
        let result = CommandResult::failure(&EngineError::UnknownFunction {
            name: "nope".to_string(),
        });
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Function not found"));
        assert_eq!(result.code, Some(ErrorCode::NotFound));
        assert!(result.data.is_none());
    }
}
