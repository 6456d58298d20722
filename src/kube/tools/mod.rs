mod args;
mod call;

pub use args::{PingRequest, PodLogsRequest, ReadRequest, ToolArgs};
pub use call::ToolCall;

use crate::kube::error::KubeAgentError;
use crate::kube::KubernetesConnector;
use rig::completion::ToolDefinition;
use rig::tool::Tool;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::*;

/// A rig tool backed by the shared connector. `A` picks the tool name,
/// description and argument schema.
pub struct ConnectorTool<A> {
    connector: Arc<KubernetesConnector>,
    _args: PhantomData<fn() -> A>,
}

impl<A: ToolArgs> ConnectorTool<A> {
    pub fn new(connector: Arc<KubernetesConnector>) -> Self {
        ConnectorTool {
            connector,
            _args: PhantomData,
        }
    }
}

/// JSON schema of a tool's arguments without the draft marker.
pub fn parameters_schema<A: ToolArgs>() -> serde_json::Value {
    let schema = schemars::schema_for!(A);
    let mut value = serde_json::to_value(schema).unwrap_or_default();
    if let Some(object) = value.as_object_mut() {
        object.remove("$schema");
        object.remove("title");
    }
    value
}

pub fn definition<A: ToolArgs>() -> ToolDefinition {
    ToolDefinition {
        name: A::NAME.to_string(),
        description: A::DESCRIPTION.to_string(),
        parameters: parameters_schema::<A>(),
    }
}

impl<A: ToolArgs> Tool for ConnectorTool<A> {
    const NAME: &'static str = A::NAME;
    type Args = A;
    type Output = String;
    type Error = KubeAgentError;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        definition::<A>()
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        let result = args.into_call().invoke(&self.connector).await;
        let text = serde_json::to_string_pretty(&result).map_err(|e| {
            error!("Failed to render {} result: {}", A::NAME, e);
            KubeAgentError::from(e)
        })?;
        debug!("{} returned {} bytes", A::NAME, text.len());
        Ok(text)
    }
}
