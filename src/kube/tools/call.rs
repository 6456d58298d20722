use super::args::{PingRequest, PodLogsRequest, ReadRequest, ToolArgs};
use crate::kube::dispatcher::{
    ApiResourcesRequest, ApplyRequest, ContextRequest, CreateRequest, DeleteRequest,
    DescribeRequest, ExplainRequest, GenericRequest, GetRequest, PatchRequest, RolloutRequest,
    ScaleRequest,
};
use crate::kube::envelope::CommandResult;
use crate::kube::error::KubeAgentError;
use crate::kube::exec::ExecRequest;
use crate::kube::helm::{HelmInstallRequest, HelmUninstallRequest, HelmUpgradeRequest};
use crate::kube::logs::LogsRequest;
use crate::kube::port_forward::{PortForwardRequest, StopPortForwardRequest};
use crate::kube::reader::ResourceKind;
use crate::kube::KubernetesConnector;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::*;

/// A fully parsed tool invocation.
///
/// Wire form is `{"name": <tool name>, "arguments": {...}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "name", content = "arguments")]
pub enum ToolCall {
    #[serde(rename = "kubernetes_read_tool")]
    Read(ReadRequest),
    #[serde(rename = "kubernetes_pod_logs")]
    PodLogs(PodLogsRequest),
    #[serde(rename = "kubectl_apply")]
    Apply(ApplyRequest),
    #[serde(rename = "kubectl_create")]
    Create(CreateRequest),
    #[serde(rename = "kubectl_delete")]
    Delete(DeleteRequest),
    #[serde(rename = "kubectl_describe")]
    Describe(DescribeRequest),
    #[serde(rename = "kubectl_get")]
    Get(GetRequest),
    #[serde(rename = "kubectl_patch")]
    Patch(PatchRequest),
    #[serde(rename = "kubectl_scale")]
    Scale(ScaleRequest),
    #[serde(rename = "kubectl_rollout")]
    Rollout(RolloutRequest),
    #[serde(rename = "kubectl_context")]
    Context(ContextRequest),
    #[serde(rename = "kubectl_explain")]
    Explain(ExplainRequest),
    #[serde(rename = "kubectl_api_resources")]
    ApiResources(ApiResourcesRequest),
    #[serde(rename = "kubectl_generic")]
    Generic(GenericRequest),
    #[serde(rename = "kubernetes_exec_in_pod")]
    Exec(ExecRequest),
    #[serde(rename = "kubectl_logs")]
    Logs(LogsRequest),
    #[serde(rename = "helm_install")]
    HelmInstall(HelmInstallRequest),
    #[serde(rename = "helm_upgrade")]
    HelmUpgrade(HelmUpgradeRequest),
    #[serde(rename = "helm_uninstall")]
    HelmUninstall(HelmUninstallRequest),
    #[serde(rename = "port_forward")]
    PortForward(PortForwardRequest),
    #[serde(rename = "stop_port_forward")]
    StopPortForward(StopPortForwardRequest),
    #[serde(rename = "kubernetes_ping")]
    Ping(PingRequest),
}

fn envelope(result: Result<CommandResult, KubeAgentError>) -> Value {
    match result {
        Ok(result) => result.to_value(),
        Err(e) => {
            debug!("Rejected tool call: {}", e);
            e.to_envelope()
        }
    }
}

fn serialized<T: serde::Serialize>(result: Result<T, KubeAgentError>) -> Value {
    match result.and_then(|value| Ok(serde_json::to_value(value)?)) {
        Ok(value) => value,
        Err(e) => {
            warn!("Kubernetes request failed: {}", e);
            e.to_envelope()
        }
    }
}

impl ToolCall {
    /// Parses a tool name plus its arguments. Missing arguments count as `{}`.
    pub fn from_parts(name: &str, arguments: Option<Value>) -> Result<Self, serde_json::Error> {
        let arguments = match arguments {
            Some(Value::Null) | None => json!({}),
            Some(value) => value,
        };
        serde_json::from_value(json!({ "name": name, "arguments": arguments }))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::Read(_) => ReadRequest::NAME,
            ToolCall::PodLogs(_) => PodLogsRequest::NAME,
            ToolCall::Apply(_) => ApplyRequest::NAME,
            ToolCall::Create(_) => CreateRequest::NAME,
            ToolCall::Delete(_) => DeleteRequest::NAME,
            ToolCall::Describe(_) => DescribeRequest::NAME,
            ToolCall::Get(_) => GetRequest::NAME,
            ToolCall::Patch(_) => PatchRequest::NAME,
            ToolCall::Scale(_) => ScaleRequest::NAME,
            ToolCall::Rollout(_) => RolloutRequest::NAME,
            ToolCall::Context(_) => ContextRequest::NAME,
            ToolCall::Explain(_) => ExplainRequest::NAME,
            ToolCall::ApiResources(_) => ApiResourcesRequest::NAME,
            ToolCall::Generic(_) => GenericRequest::NAME,
            ToolCall::Exec(_) => ExecRequest::NAME,
            ToolCall::Logs(_) => LogsRequest::NAME,
            ToolCall::HelmInstall(_) => HelmInstallRequest::NAME,
            ToolCall::HelmUpgrade(_) => HelmUpgradeRequest::NAME,
            ToolCall::HelmUninstall(_) => HelmUninstallRequest::NAME,
            ToolCall::PortForward(_) => PortForwardRequest::NAME,
            ToolCall::StopPortForward(_) => StopPortForwardRequest::NAME,
            ToolCall::Ping(_) => PingRequest::NAME,
        }
    }

    /// Runs the call. Every failure is folded into the returned JSON.
    pub async fn invoke(self, connector: &KubernetesConnector) -> Value {
        info!("Invoking tool {}", self.name());

        let kubectl = connector.dispatcher();
        match self {
            ToolCall::Read(req) => match req.resource_type.parse::<ResourceKind>() {
                Ok(kind) => {
                    debug!("Reading {} in {}", kind, req.namespace);
                    serialized(
                        connector
                            .reader()
                            .read(kind, &req.namespace, req.label_selector.as_deref())
                            .await,
                    )
                }
                Err(e) => e.to_envelope(),
            },
            ToolCall::PodLogs(req) => serialized(
                connector
                    .reader()
                    .pod_logs(&req.pod_name, &req.namespace, req.container, req.lines)
                    .await,
            ),
            ToolCall::Apply(req) => envelope(kubectl.apply(&req).await),
            ToolCall::Create(req) => envelope(kubectl.create(&req).await),
            ToolCall::Delete(req) => envelope(kubectl.delete(&req).await),
            ToolCall::Describe(req) => kubectl.describe(&req).await.to_value(),
            ToolCall::Get(req) => kubectl.get(&req).await.to_value(),
            ToolCall::Patch(req) => kubectl.patch(&req).await.to_value(),
            ToolCall::Scale(req) => kubectl.scale(&req).await.to_value(),
            ToolCall::Rollout(req) => kubectl.rollout(&req).await.to_value(),
            ToolCall::Context(req) => envelope(kubectl.context(&req).await),
            ToolCall::Explain(req) => kubectl.explain(&req).await.to_value(),
            ToolCall::ApiResources(_) => kubectl.api_resources().await.to_value(),
            ToolCall::Generic(req) => envelope(kubectl.generic(&req).await),
            ToolCall::Exec(req) => serialized(kubectl.exec(&req).await),
            ToolCall::Logs(req) => kubectl.logs(&req).await.to_value(),
            ToolCall::HelmInstall(req) => connector.helm().install(&req).await.to_value(),
            ToolCall::HelmUpgrade(req) => connector.helm().upgrade(&req).await.to_value(),
            ToolCall::HelmUninstall(req) => connector.helm().uninstall(&req).await.to_value(),
            ToolCall::PortForward(req) => connector.port_forwards().start(&req).await.to_value(),
            ToolCall::StopPortForward(req) => connector
                .port_forwards()
                .stop(req.process_key.as_deref())
                .await
                .to_value(),
            ToolCall::Ping(_) => connector.ping().await.to_value(),
        }
    }
}
