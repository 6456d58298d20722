use thiserror::Error;

/// Failures raised inside the Kubernetes connector.
///
/// None of these cross the tool boundary: callers turn them into an
/// envelope with [`KubeAgentError::to_envelope`].
#[derive(Debug, Error)]
pub enum KubeAgentError {
    /// Credentials could not be loaded. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The cluster API rejected or failed a request.
    #[error("Kubernetes API error: {0}")]
    Upstream(#[from] kube::Error),

    /// An external binary exited non-zero.
    #[error("{program} failed: {message}")]
    Command { program: String, message: String },

    /// The caller supplied an invalid combination of parameters.
    #[error("{0}")]
    Contract(String),

    /// A command succeeded but its output was not in the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl KubeAgentError {
    pub fn contract(message: impl Into<String>) -> Self {
        KubeAgentError::Contract(message.into())
    }

    /// Renders the error as the `{"error": ...}` failure envelope.
    pub fn to_envelope(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}
