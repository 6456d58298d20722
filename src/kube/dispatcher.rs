use crate::kube::envelope::{fields, CommandResult, Fields};
use crate::kube::error::KubeAgentError;
use crate::kube::process::{CommandLine, ProcessRunner};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::*;

/// Writes `contents` to a `.yaml` temp file that is removed on drop.
pub(crate) fn yaml_temp_file(contents: &str) -> Result<NamedTempFile, KubeAgentError> {
    let mut file = tempfile::Builder::new()
        .prefix("kube-tool-agent-")
        .suffix(".yaml")
        .tempfile()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn push_namespace(args: &mut Vec<String>, namespace: Option<&str>) {
    if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
        args.push("-n".to_string());
        args.push(ns.to_string());
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ApplyRequest {
    /// YAML manifest text to apply.
    pub manifest: Option<String>,
    /// Path to a manifest file, used when no manifest text is given.
    pub filename: Option<String>,
    pub namespace: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct CreateRequest {
    /// Resource type for imperative creation (deployment, service, ...).
    pub resource_type: Option<String>,
    pub name: Option<String>,
    /// Manifest file; takes precedence over resource_type/name.
    pub filename: Option<String>,
    pub namespace: Option<String>,
    /// Container image, only used for pods and deployments.
    pub image: Option<String>,
    /// Command appended after `--`.
    pub command: Option<Vec<String>>,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DeleteRequest {
    pub resource_type: Option<String>,
    pub name: Option<String>,
    pub filename: Option<String>,
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
    #[serde(default)]
    pub force: bool,
    /// Grace period in seconds.
    pub grace_period: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DescribeRequest {
    pub resource_type: String,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
}

fn default_output_format() -> String {
    "json".to_string()
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetRequest {
    pub resource_type: String,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
    /// kubectl output format (json, yaml, wide, name, ...). Defaults to json.
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PatchType {
    #[default]
    Strategic,
    Merge,
    Json,
}

impl PatchType {
    fn flag(self) -> &'static str {
        match self {
            PatchType::Strategic => "--type=strategic",
            PatchType::Merge => "--type=merge",
            PatchType::Json => "--type=json",
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PatchRequest {
    pub resource_type: String,
    pub name: String,
    /// Patch body as a JSON string.
    pub patch: String,
    pub namespace: Option<String>,
    #[serde(default)]
    pub patch_type: PatchType,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ScaleRequest {
    pub resource_type: String,
    pub name: String,
    pub replicas: u32,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RolloutAction {
    Status,
    History,
    Undo,
    Pause,
    Resume,
    Restart,
}

impl RolloutAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RolloutAction::Status => "status",
            RolloutAction::History => "history",
            RolloutAction::Undo => "undo",
            RolloutAction::Pause => "pause",
            RolloutAction::Resume => "resume",
            RolloutAction::Restart => "restart",
        }
    }

    fn accepts_timeout(self) -> bool {
        matches!(self, RolloutAction::Status | RolloutAction::Restart)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RolloutRequest {
    pub subcommand: RolloutAction,
    pub resource_type: String,
    pub name: String,
    pub namespace: Option<String>,
    /// Only honoured by `status` and `restart`, e.g. "60s".
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContextAction {
    #[default]
    List,
    Get,
    Set,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ContextRequest {
    #[serde(default)]
    pub action: ContextAction,
    /// Required when action is `set`.
    pub context_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExplainRequest {
    pub resource_type: String,
    /// Dot-separated field path, e.g. "spec.containers".
    pub field_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ApiResourcesRequest {}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct GenericRequest {
    /// Arguments passed to kubectl verbatim, e.g. ["top", "nodes"].
    pub args: Vec<String>,
}

/// One row of `kubectl api-resources`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResource {
    pub name: String,
    pub shortnames: Vec<String>,
    pub apiversion: String,
    pub namespaced: bool,
    pub kind: String,
}

/// Parses the tabular `api-resources` output.
///
/// The header is skipped and rows are split on whitespace, taking the first
/// five columns. Rows with fewer than five tokens are dropped, which also
/// drops resources whose SHORTNAMES column is blank.
pub fn parse_api_resources(stdout: &str) -> Vec<ApiResource> {
    stdout
        .trim()
        .lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 5 {
                return None;
            }
            let shortnames = if parts[1] == "none" {
                Vec::new()
            } else {
                parts[1].split(',').map(str::to_string).collect()
            };
            Some(ApiResource {
                name: parts[0].to_string(),
                shortnames,
                apiversion: parts[2].to_string(),
                namespaced: parts[3] == "true",
                kind: parts[4].to_string(),
            })
        })
        .collect()
}

/// Builds kubectl invocations from structured requests and normalizes their
/// results into [`CommandResult`]s.
///
/// Every method spawns exactly one process, except when the request is
/// rejected up front, in which case the `Err` is returned before anything
/// runs.
pub struct CommandDispatcher {
    runner: Arc<dyn ProcessRunner>,
    kubectl: String,
}

impl CommandDispatcher {
    pub fn new(runner: Arc<dyn ProcessRunner>, kubectl: impl Into<String>) -> Self {
        CommandDispatcher {
            runner,
            kubectl: kubectl.into(),
        }
    }

    pub(crate) fn runner(&self) -> &Arc<dyn ProcessRunner> {
        &self.runner
    }

    pub(crate) fn command(&self, args: Vec<String>) -> CommandLine {
        CommandLine::new(self.kubectl.clone(), args)
    }

    /// Runs one kubectl invocation and returns stdout on success.
    pub(crate) async fn execute(&self, args: Vec<String>) -> Result<String, KubeAgentError> {
        let command = self.command(args);
        info!("Executing: {}", command);

        let output = self.runner.run(&command).await.map_err(|e| {
            error!("Failed to start {}: {}", self.kubectl, e);
            e
        })?;

        if !output.success() {
            warn!(
                "{} exited with {:?}: {}",
                command,
                output.exit_code,
                output.stderr.trim()
            );
        }
        output.into_stdout(&self.kubectl)
    }

    pub async fn apply(&self, req: &ApplyRequest) -> Result<CommandResult, KubeAgentError> {
        let mut args = vec!["apply".to_string()];
        push_namespace(&mut args, req.namespace.as_deref());
        if req.force {
            args.push("--force".to_string());
        }

        // The temp file must outlive the subprocess.
        let _manifest_file;
        if let Some(manifest) = non_empty(&req.manifest) {
            let file = match yaml_temp_file(manifest) {
                Ok(file) => file,
                Err(e) => return Ok(CommandResult::error(Fields::new(), e.to_string())),
            };
            args.push("-f".to_string());
            args.push(file.path().display().to_string());
            _manifest_file = file;
        } else if let Some(filename) = non_empty(&req.filename) {
            args.push("-f".to_string());
            args.push(filename.to_string());
        } else {
            return Err(KubeAgentError::contract(
                "Either manifest or filename must be provided",
            ));
        }

        let outcome = self.execute(args).await;
        Ok(CommandResult::from_outcome(Fields::new(), "message", outcome))
    }

    pub async fn create(&self, req: &CreateRequest) -> Result<CommandResult, KubeAgentError> {
        let mut args = vec!["create".to_string()];
        push_namespace(&mut args, req.namespace.as_deref());
        if req.dry_run {
            args.push("--dry-run=client".to_string());
        }

        if let Some(filename) = non_empty(&req.filename) {
            args.push("-f".to_string());
            args.push(filename.to_string());
        } else if let (Some(resource_type), Some(name)) =
            (non_empty(&req.resource_type), non_empty(&req.name))
        {
            args.push(resource_type.to_string());
            args.push(name.to_string());

            if let Some(image) = non_empty(&req.image) {
                if matches!(resource_type, "deployment" | "pod") {
                    args.push("--image".to_string());
                    args.push(image.to_string());
                }
            }

            if let Some(command) = req.command.as_ref().filter(|c| !c.is_empty()) {
                args.push("--".to_string());
                args.extend(command.iter().cloned());
            }
        } else {
            return Err(KubeAgentError::contract(
                "Either filename or resource_type and name must be provided",
            ));
        }

        let outcome = self.execute(args).await;
        Ok(CommandResult::from_outcome(Fields::new(), "message", outcome))
    }

    pub async fn delete(&self, req: &DeleteRequest) -> Result<CommandResult, KubeAgentError> {
        let mut args = vec!["delete".to_string()];
        push_namespace(&mut args, req.namespace.as_deref());
        if req.force {
            args.push("--force".to_string());
        }
        if let Some(grace) = req.grace_period {
            args.push("--grace-period".to_string());
            args.push(grace.to_string());
        }

        if let Some(filename) = non_empty(&req.filename) {
            args.push("-f".to_string());
            args.push(filename.to_string());
        } else if let Some(resource_type) = non_empty(&req.resource_type) {
            args.push(resource_type.to_string());
            if let Some(name) = non_empty(&req.name) {
                args.push(name.to_string());
            } else if let Some(selector) = non_empty(&req.label_selector) {
                args.push("-l".to_string());
                args.push(selector.to_string());
            } else {
                return Err(KubeAgentError::contract(
                    "Either name or label_selector must be provided with resource_type",
                ));
            }
        } else {
            return Err(KubeAgentError::contract(
                "Either filename or resource_type must be provided",
            ));
        }

        let outcome = self.execute(args).await;
        Ok(CommandResult::from_outcome(Fields::new(), "message", outcome))
    }

    pub async fn describe(&self, req: &DescribeRequest) -> CommandResult {
        let mut args = vec!["describe".to_string(), req.resource_type.clone()];
        if let Some(name) = non_empty(&req.name) {
            args.push(name.to_string());
        } else if let Some(selector) = non_empty(&req.label_selector) {
            args.push("-l".to_string());
            args.push(selector.to_string());
        }
        push_namespace(&mut args, req.namespace.as_deref());

        let context = fields(json!({
            "resource_type": req.resource_type,
            "name": req.name,
            "namespace": req.namespace,
        }));
        CommandResult::from_outcome(context, "description", self.execute(args).await)
    }

    pub async fn get(&self, req: &GetRequest) -> CommandResult {
        let mut args = vec!["get".to_string(), req.resource_type.clone()];
        if let Some(name) = non_empty(&req.name) {
            args.push(name.to_string());
        }
        push_namespace(&mut args, req.namespace.as_deref());
        if let Some(selector) = non_empty(&req.label_selector) {
            args.push("-l".to_string());
            args.push(selector.to_string());
        }
        args.push("-o".to_string());
        args.push(req.output_format.clone());

        let context = fields(json!({
            "resource_type": req.resource_type,
            "name": req.name,
            "namespace": req.namespace,
        }));

        let stdout = match self.execute(args).await {
            Ok(stdout) => stdout,
            Err(e) => return CommandResult::from_outcome(context, "output", Err(e)),
        };

        if req.output_format != "json" {
            return CommandResult::success(context, "output", stdout);
        }

        match serde_json::from_str::<serde_json::Value>(&stdout) {
            Ok(data) => CommandResult::success(context, "data", data),
            Err(e) => {
                let err = KubeAgentError::Parse(e.to_string());
                warn!("kubectl get returned unparsable JSON: {}", err);
                CommandResult::error(context, "Failed to parse JSON output").with("output", stdout)
            }
        }
    }

    pub async fn patch(&self, req: &PatchRequest) -> CommandResult {
        let mut args = vec!["patch".to_string(), req.resource_type.clone(), req.name.clone()];
        push_namespace(&mut args, req.namespace.as_deref());
        args.push(req.patch_type.flag().to_string());
        args.push("-p".to_string());
        args.push(req.patch.clone());

        let context = fields(json!({
            "resource_type": req.resource_type,
            "name": req.name,
            "namespace": req.namespace,
        }));
        CommandResult::from_outcome(context, "result", self.execute(args).await)
    }

    pub async fn scale(&self, req: &ScaleRequest) -> CommandResult {
        let mut args = vec![
            "scale".to_string(),
            format!("{}/{}", req.resource_type, req.name),
            format!("--replicas={}", req.replicas),
        ];
        push_namespace(&mut args, req.namespace.as_deref());

        let context = fields(json!({
            "resource_type": req.resource_type,
            "name": req.name,
            "replicas": req.replicas,
            "namespace": req.namespace,
        }));
        CommandResult::from_outcome(context, "result", self.execute(args).await)
    }

    pub async fn rollout(&self, req: &RolloutRequest) -> CommandResult {
        let mut args = vec![
            "rollout".to_string(),
            req.subcommand.as_str().to_string(),
            format!("{}/{}", req.resource_type, req.name),
        ];
        push_namespace(&mut args, req.namespace.as_deref());
        if let Some(timeout) = non_empty(&req.timeout) {
            if req.subcommand.accepts_timeout() {
                args.push("--timeout".to_string());
                args.push(timeout.to_string());
            }
        }

        let context = fields(json!({
            "subcommand": req.subcommand,
            "resource_type": req.resource_type,
            "name": req.name,
            "namespace": req.namespace,
        }));
        CommandResult::from_outcome(context, "result", self.execute(args).await)
    }

    pub async fn context(&self, req: &ContextRequest) -> Result<CommandResult, KubeAgentError> {
        let args: Vec<String> = match (req.action, non_empty(&req.context_name)) {
            (ContextAction::List, _) => vec!["config".into(), "get-contexts".into()],
            (ContextAction::Get, _) => vec!["config".into(), "current-context".into()],
            (ContextAction::Set, Some(name)) => {
                vec!["config".into(), "use-context".into(), name.to_string()]
            }
            (ContextAction::Set, None) => {
                return Err(KubeAgentError::contract(
                    "Invalid action or missing context name",
                ))
            }
        };

        let context = fields(json!({ "action": req.action }));
        let outcome = self.execute(args).await.map(|out| out.trim().to_string());
        Ok(CommandResult::from_outcome(context, "result", outcome))
    }

    pub async fn explain(&self, req: &ExplainRequest) -> CommandResult {
        let mut args = vec!["explain".to_string(), req.resource_type.clone()];
        if let Some(field_path) = non_empty(&req.field_path) {
            args.push("--recursive".to_string());
            args.push(field_path.to_string());
        }

        let context = fields(json!({
            "resource_type": req.resource_type,
            "field_path": req.field_path,
        }));
        CommandResult::from_outcome(context, "explanation", self.execute(args).await)
    }

    pub async fn api_resources(&self) -> CommandResult {
        match self.execute(vec!["api-resources".to_string()]).await {
            Ok(stdout) => {
                let resources = parse_api_resources(&stdout);
                debug!("Parsed {} API resources", resources.len());
                let total = resources.len();
                CommandResult::success(
                    Fields::new(),
                    "resources",
                    serde_json::to_value(resources).unwrap_or_default(),
                )
                .with("total_count", total)
            }
            Err(e) => CommandResult::from_outcome(Fields::new(), "resources", Err(e)),
        }
    }

    /// Runs kubectl with caller-supplied arguments.
    pub async fn generic(&self, req: &GenericRequest) -> Result<CommandResult, KubeAgentError> {
        if req.args.is_empty() {
            return Err(KubeAgentError::contract(
                "At least one kubectl argument must be provided",
            ));
        }

        let command = self.command(req.args.clone());
        let context = fields(json!({ "command": command.to_string() }));

        info!("Executing: {}", command);
        let result = match self.runner.run(&command).await {
            Ok(output) if output.success() => CommandResult::success(context, "output", output.stdout),
            Ok(output) => CommandResult::error(context, output.stderr.clone())
                .with("stdout", output.stdout)
                .with("stderr", output.stderr),
            Err(e) => CommandResult::error(context, KubeAgentError::from(e).to_string()),
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::process::testing::FakeRunner;
    use pretty_assertions::assert_eq;

    fn dispatcher(runner: &Arc<FakeRunner>) -> CommandDispatcher {
        CommandDispatcher::new(runner.clone(), "kubectl")
    }

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn apply_without_manifest_or_filename_spawns_nothing() {
        let runner = Arc::new(FakeRunner::succeeding(""));
        let err = dispatcher(&runner)
            .apply(&ApplyRequest::default())
            .await
            .unwrap_err();

        assert_eq!(
            err.to_envelope(),
            json!({ "error": "Either manifest or filename must be provided" })
        );
        assert_eq!(runner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn apply_writes_manifest_to_a_scoped_temp_file() {
        let runner = Arc::new(FakeRunner::succeeding("deployment.apps/web configured\n"));
        let manifest = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: demo\n";
        let result = dispatcher(&runner)
            .apply(&ApplyRequest {
                manifest: Some(manifest.to_string()),
                namespace: Some("staging".to_string()),
                force: true,
                ..Default::default()
            })
            .await
            .unwrap();

        let args = runner.last_args();
        assert_eq!(&args[..4], &strings(&["apply", "-n", "staging", "--force"])[..]);
        assert_eq!(args[4], "-f");
        assert!(args[5].ends_with(".yaml"));
        assert_eq!(runner.captured_files(), vec![manifest.to_string()]);
        assert!(!std::path::Path::new(&args[5]).exists());

        assert_eq!(
            result.to_value(),
            json!({ "status": "success", "message": "deployment.apps/web configured\n" })
        );
    }

    #[tokio::test]
    async fn apply_with_filename_passes_it_through() {
        let runner = Arc::new(FakeRunner::succeeding(""));
        dispatcher(&runner)
            .apply(&ApplyRequest {
                filename: Some("deploy/app.yaml".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(runner.last_args(), strings(&["apply", "-f", "deploy/app.yaml"]));
    }

    #[tokio::test]
    async fn create_imperative_deployment_with_image_and_command() {
        let runner = Arc::new(FakeRunner::succeeding("deployment.apps/web created\n"));
        dispatcher(&runner)
            .create(&CreateRequest {
                resource_type: Some("deployment".to_string()),
                name: Some("web".to_string()),
                namespace: Some("dev".to_string()),
                image: Some("nginx:1.27".to_string()),
                command: Some(strings(&["nginx", "-g", "daemon off;"])),
                dry_run: true,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(
            runner.last_args(),
            strings(&[
                "create",
                "-n",
                "dev",
                "--dry-run=client",
                "deployment",
                "web",
                "--image",
                "nginx:1.27",
                "--",
                "nginx",
                "-g",
                "daemon off;",
            ])
        );
    }

    #[tokio::test]
    async fn create_ignores_image_for_other_resource_types() {
        let runner = Arc::new(FakeRunner::succeeding(""));
        dispatcher(&runner)
            .create(&CreateRequest {
                resource_type: Some("namespace".to_string()),
                name: Some("team-a".to_string()),
                image: Some("nginx".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(runner.last_args(), strings(&["create", "namespace", "team-a"]));
    }

    #[tokio::test]
    async fn create_requires_filename_or_type_and_name() {
        let runner = Arc::new(FakeRunner::succeeding(""));
        let err = dispatcher(&runner)
            .create(&CreateRequest {
                resource_type: Some("deployment".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Either filename or resource_type and name must be provided"
        );
        assert_eq!(runner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn delete_by_selector_with_grace_period() {
        let runner = Arc::new(FakeRunner::succeeding("pod \"a\" deleted\n"));
        dispatcher(&runner)
            .delete(&DeleteRequest {
                resource_type: Some("pods".to_string()),
                label_selector: Some("app=web".to_string()),
                namespace: Some("prod".to_string()),
                force: true,
                grace_period: Some(0),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(
            runner.last_args(),
            strings(&["delete", "-n", "prod", "--force", "--grace-period", "0", "pods", "-l", "app=web"])
        );
    }

    #[tokio::test]
    async fn delete_contract_errors_are_reported_before_spawning() {
        let runner = Arc::new(FakeRunner::succeeding(""));
        let d = dispatcher(&runner);

        let err = d.delete(&DeleteRequest::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Either filename or resource_type must be provided");

        let err = d
            .delete(&DeleteRequest {
                resource_type: Some("pod".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Either name or label_selector must be provided with resource_type"
        );
        assert_eq!(runner.spawn_count(), 0);
    }

    #[tokio::test]
    async fn describe_failure_keeps_identifying_fields() {
        let runner = Arc::new(FakeRunner::failing("Error from server (NotFound): pods \"ghost\" not found\n"));
        let result = dispatcher(&runner)
            .describe(&DescribeRequest {
                resource_type: "pod".to_string(),
                name: Some("ghost".to_string()),
                namespace: Some("default".to_string()),
                label_selector: None,
            })
            .await;

        assert_eq!(runner.last_args(), strings(&["describe", "pod", "ghost", "-n", "default"]));
        assert_eq!(
            result.to_value(),
            json!({
                "status": "error",
                "resource_type": "pod",
                "name": "ghost",
                "namespace": "default",
                "message": "Error from server (NotFound): pods \"ghost\" not found\n",
            })
        );
    }

    #[tokio::test]
    async fn get_json_output_is_parsed() {
        let runner = Arc::new(FakeRunner::succeeding(r#"{"kind": "PodList", "items": []}"#));
        let result = dispatcher(&runner)
            .get(&GetRequest {
                resource_type: "pods".to_string(),
                name: None,
                namespace: Some("default".to_string()),
                label_selector: Some("tier=web".to_string()),
                output_format: default_output_format(),
            })
            .await;

        assert_eq!(
            runner.last_args(),
            strings(&["get", "pods", "-n", "default", "-l", "tier=web", "-o", "json"])
        );
        let value = result.to_value();
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"], json!({"kind": "PodList", "items": []}));
    }

    #[tokio::test]
    async fn get_distinguishes_unparsable_output_from_command_failure() {
        let runner = Arc::new(FakeRunner::succeeding("NAME   READY\nweb    1/1\n"));
        let result = dispatcher(&runner)
            .get(&GetRequest {
                resource_type: "pods".to_string(),
                name: None,
                namespace: None,
                label_selector: None,
                output_format: default_output_format(),
            })
            .await;
        let value = result.to_value();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "Failed to parse JSON output");
        assert_eq!(value["output"], "NAME   READY\nweb    1/1\n");

        let runner = Arc::new(FakeRunner::failing("error: connection refused"));
        let result = dispatcher(&runner)
            .get(&GetRequest {
                resource_type: "pods".to_string(),
                name: None,
                namespace: None,
                label_selector: None,
                output_format: default_output_format(),
            })
            .await;
        assert_eq!(result.message(), Some("error: connection refused"));
        assert!(result.to_value().get("output").is_none());
    }

    #[tokio::test]
    async fn get_non_json_format_returns_raw_output() {
        let runner = Arc::new(FakeRunner::succeeding("web-0\n"));
        let result = dispatcher(&runner)
            .get(&GetRequest {
                resource_type: "pods".to_string(),
                name: Some("web-0".to_string()),
                namespace: None,
                label_selector: None,
                output_format: "name".to_string(),
            })
            .await;
        assert_eq!(result.to_value()["output"], "web-0\n");
    }

    #[tokio::test]
    async fn patch_scale_and_rollout_argv() {
        let runner = Arc::new(FakeRunner::succeeding("ok"));
        let d = dispatcher(&runner);

        d.patch(&PatchRequest {
            resource_type: "deployment".to_string(),
            name: "web".to_string(),
            patch: r#"{"spec":{"replicas":2}}"#.to_string(),
            namespace: Some("prod".to_string()),
            patch_type: PatchType::Merge,
        })
        .await;
        assert_eq!(
            runner.last_args(),
            strings(&["patch", "deployment", "web", "-n", "prod", "--type=merge", "-p", r#"{"spec":{"replicas":2}}"#])
        );

        let result = d
            .scale(&ScaleRequest {
                resource_type: "statefulset".to_string(),
                name: "db".to_string(),
                replicas: 3,
                namespace: None,
            })
            .await;
        assert_eq!(runner.last_args(), strings(&["scale", "statefulset/db", "--replicas=3"]));
        assert_eq!(result.to_value()["replicas"], 3);

        d.rollout(&RolloutRequest {
            subcommand: RolloutAction::Undo,
            resource_type: "deployment".to_string(),
            name: "web".to_string(),
            namespace: None,
            timeout: Some("30s".to_string()),
        })
        .await;
        assert_eq!(runner.last_args(), strings(&["rollout", "undo", "deployment/web"]));

        let result = d
            .rollout(&RolloutRequest {
                subcommand: RolloutAction::Status,
                resource_type: "deployment".to_string(),
                name: "web".to_string(),
                namespace: Some("prod".to_string()),
                timeout: Some("30s".to_string()),
            })
            .await;
        assert_eq!(
            runner.last_args(),
            strings(&["rollout", "status", "deployment/web", "-n", "prod", "--timeout", "30s"])
        );
        assert_eq!(result.to_value()["subcommand"], "status");
    }

    #[tokio::test]
    async fn context_actions_map_to_config_subcommands() {
        let runner = Arc::new(FakeRunner::succeeding("kind-dev\n"));
        let d = dispatcher(&runner);

        let result = d
            .context(&ContextRequest {
                action: ContextAction::Get,
                context_name: None,
            })
            .await
            .unwrap();
        assert_eq!(runner.last_args(), strings(&["config", "current-context"]));
        assert_eq!(
            result.to_value(),
            json!({ "status": "success", "action": "get", "result": "kind-dev" })
        );

        d.context(&ContextRequest {
            action: ContextAction::Set,
            context_name: Some("prod".to_string()),
        })
        .await
        .unwrap();
        assert_eq!(runner.last_args(), strings(&["config", "use-context", "prod"]));

        let err = d
            .context(&ContextRequest {
                action: ContextAction::Set,
                context_name: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid action or missing context name");
        assert_eq!(runner.spawn_count(), 2);
    }

    #[tokio::test]
    async fn explain_with_field_path() {
        let runner = Arc::new(FakeRunner::succeeding("KIND: Pod"));
        let result = dispatcher(&runner)
            .explain(&ExplainRequest {
                resource_type: "pod".to_string(),
                field_path: Some("spec.containers".to_string()),
            })
            .await;
        assert_eq!(
            runner.last_args(),
            strings(&["explain", "pod", "--recursive", "spec.containers"])
        );
        assert_eq!(result.to_value()["explanation"], "KIND: Pod");
    }

    const API_RESOURCES: &str = "\
NAME                  SHORTNAMES   APIVERSION   NAMESPACED   KIND
bindings              none         v1           true         Binding
configmaps            cm           v1           true         ConfigMap
pods                  po           v1           true         Pod
deployments           deploy       apps/v1      true         Deployment
events                ev,evt       v1           true         Event
componentstatuses     v1           false        ComponentStatus
";

    #[test]
    fn api_resources_skip_short_lines() {
        let resources = parse_api_resources(API_RESOURCES);
        let names: Vec<_> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["bindings", "configmaps", "pods", "deployments", "events"]);

        assert_eq!(resources[0].shortnames, Vec::<String>::new());
        assert_eq!(resources[4].shortnames, strings(&["ev", "evt"]));
        assert_eq!(
            resources[3],
            ApiResource {
                name: "deployments".to_string(),
                shortnames: strings(&["deploy"]),
                apiversion: "apps/v1".to_string(),
                namespaced: true,
                kind: "Deployment".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn api_resources_total_counts_only_parsed_rows() {
        let runner = Arc::new(FakeRunner::succeeding(API_RESOURCES));
        let value = dispatcher(&runner).api_resources().await.to_value();
        assert_eq!(value["status"], "success");
        assert_eq!(value["total_count"], 5);
        assert_eq!(value["resources"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn generic_failure_reports_both_streams() {
        let runner = Arc::new(FakeRunner::new(crate::kube::process::ProcessOutput {
            exit_code: Some(1),
            stdout: "partial".to_string(),
            stderr: "error: unknown command".to_string(),
        }));
        let result = dispatcher(&runner)
            .generic(&GenericRequest {
                args: strings(&["frobnicate", "nodes"]),
            })
            .await
            .unwrap();

        assert_eq!(
            result.to_value(),
            json!({
                "status": "error",
                "command": "kubectl frobnicate nodes",
                "message": "error: unknown command",
                "stdout": "partial",
                "stderr": "error: unknown command",
            })
        );
    }

    #[tokio::test]
    async fn generic_rejects_empty_arguments() {
        let runner = Arc::new(FakeRunner::succeeding(""));
        assert!(dispatcher(&runner)
            .generic(&GenericRequest::default())
            .await
            .is_err());
        assert_eq!(runner.spawn_count(), 0);
    }

    #[test]
    fn request_defaults_follow_kubectl_conventions() {
        let get: GetRequest = serde_json::from_value(json!({ "resource_type": "pods" })).unwrap();
        assert_eq!(get.output_format, "json");

        let patch: PatchRequest =
            serde_json::from_value(json!({ "resource_type": "svc", "name": "a", "patch": "{}" }))
                .unwrap();
        assert_eq!(patch.patch_type, PatchType::Strategic);

        let ctx: ContextRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(ctx.action, ContextAction::List);
    }
}
