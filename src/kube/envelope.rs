use crate::kube::error::KubeAgentError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifying context carried by both shapes of a [`CommandResult`].
pub type Fields = Map<String, Value>;

/// Turns a `json!({...})` object into [`Fields`]. Non-objects yield no fields.
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

/// Result envelope of every CLI-backed operation.
///
/// Serializes as `{"status": "success", ...}` or
/// `{"status": "error", "message": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CommandResult {
    Success {
        #[serde(flatten)]
        fields: Fields,
    },
    Error {
        message: String,
        #[serde(flatten)]
        context: Fields,
    },
}

impl CommandResult {
    /// Success carrying `context` plus `key: payload`.
    pub fn success(mut context: Fields, key: &str, payload: impl Into<Value>) -> Self {
        context.insert(key.to_string(), payload.into());
        CommandResult::Success { fields: context }
    }

    pub fn error(context: Fields, message: impl Into<String>) -> Self {
        CommandResult::Error {
            message: message.into(),
            context,
        }
    }

    /// Maps the outcome of one invocation: stdout goes under `key`, a failed
    /// command contributes its raw stderr as the message.
    pub fn from_outcome(context: Fields, key: &str, outcome: Result<String, KubeAgentError>) -> Self {
        match outcome {
            Ok(stdout) => Self::success(context, key, stdout),
            Err(KubeAgentError::Command { message, .. }) => Self::error(context, message),
            Err(other) => Self::error(context, other.to_string()),
        }
    }

    #[cfg(test)]
    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success { .. })
    }

    /// Adds a field to either shape.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        match &mut self {
            CommandResult::Success { fields } => fields.insert(key.to_string(), value.into()),
            CommandResult::Error { context, .. } => context.insert(key.to_string(), value.into()),
        };
        self
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            CommandResult::Success { fields } => fields.get("message").and_then(Value::as_str),
            CommandResult::Error { message, .. } => Some(message),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
    }
}
