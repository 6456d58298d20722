use crate::kube::dispatcher::{
    ApiResourcesRequest, ApplyRequest, ContextRequest, CreateRequest, DeleteRequest,
    DescribeRequest, ExplainRequest, GenericRequest, GetRequest, PatchRequest, RolloutRequest,
    ScaleRequest,
};
use crate::kube::exec::ExecRequest;
use crate::kube::helm::{HelmInstallRequest, HelmUninstallRequest, HelmUpgradeRequest};
use crate::kube::logs::LogsRequest;
use crate::kube::port_forward::{PortForwardRequest, StopPortForwardRequest};
use crate::kube::tools::{ConnectorTool, PingRequest, PodLogsRequest, ReadRequest};
use crate::kube::KubernetesConnector;
use rig::client::CompletionClient;
use rig::completion::{Message, Prompt, PromptError};
use rig::providers::openai::{self, responses_api::ResponsesCompletionModel};
use std::error::Error;
use std::sync::Arc;
use tracing::*;

const PREAMBLE: &str = "You are a Kubernetes operations assistant. Answer questions about the \
cluster and carry out requested changes using the provided tools. Prefer read-only tools \
(kubernetes_read_tool, kubectl_get, kubectl_describe, kubectl_logs) unless the user asks for \
a change. Every tool returns JSON: a \"status\" of \"error\" or an \"error\" field means the \
operation failed, so report the message instead of guessing. Reply in plain text.";

/// Upper bound on tool round trips per question.
const MAX_TURNS: usize = 8;

pub struct Agent {
    client: rig::agent::Agent<ResponsesCompletionModel>,
}

impl Agent {
    pub fn new(api_key: String, connector: Arc<KubernetesConnector>) -> Result<Self, Box<dyn Error>> {
        info!("Initializing OpenAI agent");

        let openai_client = openai::Client::<reqwest::Client>::new(api_key).map_err(|e| {
            error!("Failed to initialize OpenAI client: {}", e);
            e
        })?;

        debug!("OpenAI client initialized successfully");

        let client = openai_client
            .agent(openai::GPT_5_1)
            .preamble(PREAMBLE)
            .tool(ConnectorTool::<ReadRequest>::new(connector.clone()))
            .tool(ConnectorTool::<PodLogsRequest>::new(connector.clone()))
            .tool(ConnectorTool::<ApplyRequest>::new(connector.clone()))
            .tool(ConnectorTool::<CreateRequest>::new(connector.clone()))
            .tool(ConnectorTool::<DeleteRequest>::new(connector.clone()))
            .tool(ConnectorTool::<DescribeRequest>::new(connector.clone()))
            .tool(ConnectorTool::<GetRequest>::new(connector.clone()))
            .tool(ConnectorTool::<PatchRequest>::new(connector.clone()))
            .tool(ConnectorTool::<ScaleRequest>::new(connector.clone()))
            .tool(ConnectorTool::<RolloutRequest>::new(connector.clone()))
            .tool(ConnectorTool::<ContextRequest>::new(connector.clone()))
            .tool(ConnectorTool::<ExplainRequest>::new(connector.clone()))
            .tool(ConnectorTool::<ApiResourcesRequest>::new(connector.clone()))
            .tool(ConnectorTool::<GenericRequest>::new(connector.clone()))
            .tool(ConnectorTool::<ExecRequest>::new(connector.clone()))
            .tool(ConnectorTool::<LogsRequest>::new(connector.clone()))
            .tool(ConnectorTool::<HelmInstallRequest>::new(connector.clone()))
            .tool(ConnectorTool::<HelmUpgradeRequest>::new(connector.clone()))
            .tool(ConnectorTool::<HelmUninstallRequest>::new(connector.clone()))
            .tool(ConnectorTool::<PortForwardRequest>::new(connector.clone()))
            .tool(ConnectorTool::<StopPortForwardRequest>::new(connector.clone()))
            .tool(ConnectorTool::<PingRequest>::new(connector))
            .build();

        info!("Agent built successfully with Kubernetes tools");

        Ok(Agent { client })
    }

    pub async fn chat(
        &self,
        prompt: String,
        mut chat_history: Vec<Message>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        debug!("Processing prompt ({} chars)", prompt.len());

        let response: String = self
            .client
            .prompt(&prompt)
            .with_history(&mut chat_history)
            .multi_turn(MAX_TURNS)
            .await
            .map_err(|e: PromptError| {
                error!("Error during agent prompt: {}", e);

                let mut source = e.source();
                while let Some(err) = source {
                    error!("  caused by: {}", err);
                    source = err.source();
                }

                e
            })?;

        info!(
            "Agent response generated successfully ({} chars)",
            response.len()
        );
        Ok(response)
    }
}
