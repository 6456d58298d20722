use super::call::ToolCall;
use crate::kube::dispatcher::{
    ApiResourcesRequest, ApplyRequest, ContextRequest, CreateRequest, DeleteRequest,
    DescribeRequest, ExplainRequest, GenericRequest, GetRequest, PatchRequest, RolloutRequest,
    ScaleRequest,
};
use crate::kube::exec::ExecRequest;
use crate::kube::helm::{HelmInstallRequest, HelmUninstallRequest, HelmUpgradeRequest};
use crate::kube::logs::LogsRequest;
use crate::kube::port_forward::{PortForwardRequest, StopPortForwardRequest};
use crate::kube::reader::{DEFAULT_NAMESPACE, DEFAULT_TAIL_LINES};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Arguments of one named tool.
pub trait ToolArgs: DeserializeOwned + JsonSchema + Send + Sync + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn into_call(self) -> ToolCall;
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_tail_lines() -> i64 {
    DEFAULT_TAIL_LINES
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadRequest {
    /// One of pods, deployments, services, namespaces (singular and short forms accepted).
    pub resource_type: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Label selector such as "app=web". Only applies to pods.
    pub label_selector: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PodLogsRequest {
    pub pod_name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub container: Option<String>,
    /// Number of lines from the end of the log.
    #[serde(default = "default_tail_lines")]
    pub lines: i64,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct PingRequest {}

macro_rules! tool_args {
    ($($args:ty => $variant:ident, $name:literal, $description:literal;)+) => {
        $(
            impl ToolArgs for $args {
                const NAME: &'static str = $name;
                const DESCRIPTION: &'static str = $description;

                fn into_call(self) -> ToolCall {
                    ToolCall::$variant(self)
                }
            }
        )+
    };
}

tool_args! {
    ReadRequest => Read, "kubernetes_read_tool",
        "List pods, deployments, services or namespaces through the Kubernetes API";
    PodLogsRequest => PodLogs, "kubernetes_pod_logs",
        "Read the last lines of a pod's logs through the Kubernetes API";
    ApplyRequest => Apply, "kubectl_apply",
        "Apply a YAML manifest (inline text or file path) with kubectl apply";
    CreateRequest => Create, "kubectl_create",
        "Create a resource from a file or imperatively by type and name";
    DeleteRequest => Delete, "kubectl_delete",
        "Delete resources by file, by type and name, or by type and label selector";
    DescribeRequest => Describe, "kubectl_describe",
        "Show detailed information about a resource or a group of resources";
    GetRequest => Get, "kubectl_get",
        "Get resources with kubectl; JSON output is parsed";
    PatchRequest => Patch, "kubectl_patch",
        "Patch a resource with a strategic, merge or JSON patch";
    ScaleRequest => Scale, "kubectl_scale",
        "Set the replica count of a deployment, replicaset or statefulset";
    RolloutRequest => Rollout, "kubectl_rollout",
        "Manage rollouts: status, history, undo, pause, resume, restart";
    ContextRequest => Context, "kubectl_context",
        "List kubeconfig contexts, show the current one, or switch to another";
    ExplainRequest => Explain, "kubectl_explain",
        "Show the documentation of a resource type or one of its fields";
    ApiResourcesRequest => ApiResources, "kubectl_api_resources",
        "List the API resource types the cluster serves";
    GenericRequest => Generic, "kubectl_generic",
        "Run kubectl with arbitrary arguments";
    ExecRequest => Exec, "kubernetes_exec_in_pod",
        "Run a command inside a pod or one of its containers and return its output";
    LogsRequest => Logs, "kubectl_logs",
        "Fetch logs with kubectl, optionally following them for a bounded time";
    HelmInstallRequest => HelmInstall, "helm_install",
        "Install a Helm chart as a new release";
    HelmUpgradeRequest => HelmUpgrade, "helm_upgrade",
        "Upgrade a Helm release, installing it if missing";
    HelmUninstallRequest => HelmUninstall, "helm_uninstall",
        "Uninstall a Helm release";
    PortForwardRequest => PortForward, "port_forward",
        "Forward a local port to a pod, service or deployment in the background";
    StopPortForwardRequest => StopPortForward, "stop_port_forward",
        "Stop one port forward by key, or all of them";
    PingRequest => Ping, "kubernetes_ping",
        "Check that the Kubernetes API is reachable";
}
