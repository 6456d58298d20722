use crate::kube::dispatcher::CommandDispatcher;
use crate::kube::error::KubeAgentError;
use crate::kube::reader::DEFAULT_NAMESPACE;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::*;

/// Run when the caller gives no command.
const DEFAULT_COMMAND: [&str; 3] = ["/bin/sh", "-c", "ls"];

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecRequest {
    pub pod_name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Container to run in; kubectl picks the default container when omitted.
    pub container: Option<String>,
    /// Command and its arguments. Defaults to `/bin/sh -c ls`.
    #[serde(default)]
    pub command: Vec<String>,
}

/// Output of a command run inside a pod.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecOutput {
    pub pod_name: String,
    pub namespace: String,
    pub container: Option<String>,
    pub command: Vec<String>,
    pub output: String,
}

impl ExecRequest {
    fn command(&self) -> Vec<String> {
        if self.command.is_empty() {
            DEFAULT_COMMAND.iter().map(|s| s.to_string()).collect()
        } else {
            self.command.clone()
        }
    }

    fn container(&self) -> Option<&str> {
        self.container.as_deref().filter(|c| !c.is_empty())
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "exec".to_string(),
            self.pod_name.clone(),
            "-n".to_string(),
            self.namespace.clone(),
        ];
        if let Some(container) = self.container() {
            args.push("-c".to_string());
            args.push(container.to_string());
        }
        args.push("--".to_string());
        args.extend(self.command());
        args
    }
}

impl CommandDispatcher {
    /// Runs a command in a pod without a tty or stdin and returns its stdout.
    pub async fn exec(&self, req: &ExecRequest) -> Result<ExecOutput, KubeAgentError> {
        if req.pod_name.is_empty() {
            return Err(KubeAgentError::contract("pod_name must be provided"));
        }

        let output = self.execute(req.args()).await?;
        debug!("exec in {}/{} returned {} bytes", req.namespace, req.pod_name, output.len());

        Ok(ExecOutput {
            pod_name: req.pod_name.clone(),
            namespace: req.namespace.clone(),
            container: req.container().map(str::to_string),
            command: req.command(),
            output,
        })
    }
}
