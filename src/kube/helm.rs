use crate::kube::dispatcher::yaml_temp_file;
use crate::kube::envelope::{fields, CommandResult, Fields};
use crate::kube::error::KubeAgentError;
use crate::kube::process::{CommandLine, ProcessRunner};
use crate::kube::reader::DEFAULT_NAMESPACE;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::*;

pub const DEFAULT_HELM_TIMEOUT: &str = "5m0s";

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_timeout() -> Option<String> {
    Some(DEFAULT_HELM_TIMEOUT.to_string())
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct HelmInstallRequest {
    /// Chart reference, e.g. "bitnami/nginx" or a chart name with `repo`.
    pub chart_name: String,
    pub release_name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Values overriding the chart defaults.
    pub values: Option<Map<String, Value>>,
    pub version: Option<String>,
    /// Chart repository URL.
    pub repo: Option<String>,
    #[serde(default)]
    pub create_namespace: bool,
    #[serde(default = "default_timeout")]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct HelmUpgradeRequest {
    pub chart_name: String,
    pub release_name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub values: Option<Map<String, Value>>,
    pub version: Option<String>,
    pub repo: Option<String>,
    /// Install the release if it does not exist yet.
    #[serde(default = "enabled")]
    pub install: bool,
    #[serde(default = "default_timeout")]
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct HelmUninstallRequest {
    pub release_name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Remove release history too. When false, `--keep-history` is passed.
    #[serde(default = "enabled")]
    pub purge: bool,
    #[serde(default = "default_timeout")]
    pub timeout: Option<String>,
}

fn push_chart_source(args: &mut Vec<String>, version: &Option<String>, repo: &Option<String>) {
    if let Some(version) = version.as_ref().filter(|v| !v.is_empty()) {
        args.push("--version".to_string());
        args.push(version.clone());
    }
    if let Some(repo) = repo.as_ref().filter(|r| !r.is_empty()) {
        args.push("--repo".to_string());
        args.push(repo.clone());
    }
}

fn push_timeout(args: &mut Vec<String>, timeout: &Option<String>) {
    if let Some(timeout) = timeout.as_ref().filter(|t| !t.is_empty()) {
        args.push("--timeout".to_string());
        args.push(timeout.clone());
    }
}

/// Drives the helm binary.
pub struct HelmOperations {
    runner: Arc<dyn ProcessRunner>,
    helm: String,
}

impl HelmOperations {
    pub fn new(runner: Arc<dyn ProcessRunner>, helm: impl Into<String>) -> Self {
        HelmOperations {
            runner,
            helm: helm.into(),
        }
    }

    pub async fn install(&self, req: &HelmInstallRequest) -> CommandResult {
        let mut args = vec![
            "install".to_string(),
            req.release_name.clone(),
            req.chart_name.clone(),
            "--namespace".to_string(),
            req.namespace.clone(),
        ];
        if req.create_namespace {
            args.push("--create-namespace".to_string());
        }
        push_chart_source(&mut args, &req.version, &req.repo);
        push_timeout(&mut args, &req.timeout);

        let context = fields(json!({
            "chart_name": req.chart_name,
            "release_name": req.release_name,
            "namespace": req.namespace,
        }));
        self.run_with_values(args, req.values.as_ref(), context).await
    }

    pub async fn upgrade(&self, req: &HelmUpgradeRequest) -> CommandResult {
        let mut args = vec![
            "upgrade".to_string(),
            req.release_name.clone(),
            req.chart_name.clone(),
            "--namespace".to_string(),
            req.namespace.clone(),
        ];
        if req.install {
            args.push("--install".to_string());
        }
        push_chart_source(&mut args, &req.version, &req.repo);
        push_timeout(&mut args, &req.timeout);

        let context = fields(json!({
            "chart_name": req.chart_name,
            "release_name": req.release_name,
            "namespace": req.namespace,
        }));
        self.run_with_values(args, req.values.as_ref(), context).await
    }

    pub async fn uninstall(&self, req: &HelmUninstallRequest) -> CommandResult {
        let mut args = vec![
            "uninstall".to_string(),
            req.release_name.clone(),
            "--namespace".to_string(),
            req.namespace.clone(),
        ];
        if !req.purge {
            args.push("--keep-history".to_string());
        }
        push_timeout(&mut args, &req.timeout);

        let context = fields(json!({
            "release_name": req.release_name,
            "namespace": req.namespace,
        }));
        CommandResult::from_outcome(context, "message", self.execute(args).await)
    }

    /// Appends `-f <values.yaml>` when values are present and keeps the file
    /// alive until helm exits.
    async fn run_with_values(
        &self,
        mut args: Vec<String>,
        values: Option<&Map<String, Value>>,
        context: Fields,
    ) -> CommandResult {
        let values_file = match values.filter(|v| !v.is_empty()).map(write_values).transpose() {
            Ok(file) => file,
            Err(e) => {
                error!("Failed to write helm values: {}", e);
                return CommandResult::error(context, e.to_string());
            }
        };
        if let Some(file) = &values_file {
            args.push("-f".to_string());
            args.push(file.path().display().to_string());
        }

        let outcome = self.execute(args).await;
        drop(values_file);
        CommandResult::from_outcome(context, "message", outcome)
    }

    async fn execute(&self, args: Vec<String>) -> Result<String, KubeAgentError> {
        let command = CommandLine::new(self.helm.clone(), args);
        info!("Executing: {}", command);

        let output = self.runner.run(&command).await?;
        if !output.success() {
            warn!("{} exited with {:?}", command, output.exit_code);
        }
        output.into_stdout(&self.helm)
    }
}

fn write_values(values: &Map<String, Value>) -> Result<NamedTempFile, KubeAgentError> {
    let yaml = serde_yaml::to_string(values)?;
    debug!("Writing {} bytes of helm values", yaml.len());
    yaml_temp_file(&yaml)
}
