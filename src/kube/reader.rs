use crate::kube::connection::ConnectionProvider;
use crate::kube::error::KubeAgentError;
use crate::kube::types::{DeploymentList, NamespaceList, PodList, PodLogs, ServiceList};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Pod, Service};
use kube::api::{ListParams, LogParams};
use kube::Api;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::*;

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_TAIL_LINES: i64 = 100;

/// Resource kinds the read tool can list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Pods,
    Deployments,
    Services,
    Namespaces,
}

impl FromStr for ResourceKind {
    type Err = KubeAgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pod" | "pods" => Ok(ResourceKind::Pods),
            "deployment" | "deployments" | "deploy" => Ok(ResourceKind::Deployments),
            "service" | "services" | "svc" => Ok(ResourceKind::Services),
            "namespace" | "namespaces" | "ns" => Ok(ResourceKind::Namespaces),
            other => Err(KubeAgentError::contract(format!(
                "Resource type '{}' not supported",
                other
            ))),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Pods => "pods",
            ResourceKind::Deployments => "deployments",
            ResourceKind::Services => "services",
            ResourceKind::Namespaces => "namespaces",
        };
        f.write_str(name)
    }
}

/// Typed reads against the cluster API. One API call per operation, no
/// retries.
pub struct ResourceReader {
    provider: Arc<ConnectionProvider>,
}

impl ResourceReader {
    pub fn new(provider: Arc<ConnectionProvider>) -> Self {
        ResourceReader { provider }
    }

    async fn client(&self) -> Result<kube::Client, KubeAgentError> {
        self.provider.handle().await
    }

    /// Lists one kind and renders it as its list envelope.
    pub async fn read(
        &self,
        kind: ResourceKind,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<serde_json::Value, KubeAgentError> {
        let value = match kind {
            ResourceKind::Pods => {
                serde_json::to_value(self.list_pods(namespace, label_selector).await?)?
            }
            ResourceKind::Deployments => serde_json::to_value(self.list_deployments(namespace).await?)?,
            ResourceKind::Services => serde_json::to_value(self.list_services(namespace).await?)?,
            ResourceKind::Namespaces => serde_json::to_value(self.list_namespaces().await?)?,
        };
        Ok(value)
    }

    pub async fn list_pods(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<PodList, KubeAgentError> {
        let pods: Api<Pod> = Api::namespaced(self.client().await?, namespace);

        let mut params = ListParams::default();
        if let Some(selector) = label_selector.filter(|s| !s.is_empty()) {
            params = params.labels(selector);
        }

        let list = pods.list(&params).await.map_err(|e| {
            error!("Failed to list pods in {}: {}", namespace, e);
            KubeAgentError::from(e)
        })?;

        debug!("Listed {} pods in {}", list.items.len(), namespace);
        Ok(PodList::from_pods(&list.items))
    }

    pub async fn list_deployments(&self, namespace: &str) -> Result<DeploymentList, KubeAgentError> {
        let deployments: Api<Deployment> = Api::namespaced(self.client().await?, namespace);

        let list = deployments.list(&ListParams::default()).await.map_err(|e| {
            error!("Failed to list deployments in {}: {}", namespace, e);
            KubeAgentError::from(e)
        })?;

        debug!("Listed {} deployments in {}", list.items.len(), namespace);
        Ok(DeploymentList::from_deployments(&list.items))
    }

    pub async fn list_services(&self, namespace: &str) -> Result<ServiceList, KubeAgentError> {
        let services: Api<Service> = Api::namespaced(self.client().await?, namespace);

        let list = services.list(&ListParams::default()).await.map_err(|e| {
            error!("Failed to list services in {}: {}", namespace, e);
            KubeAgentError::from(e)
        })?;

        debug!("Listed {} services in {}", list.items.len(), namespace);
        Ok(ServiceList::from_services(&list.items))
    }

    pub async fn list_namespaces(&self) -> Result<NamespaceList, KubeAgentError> {
        let namespaces: Api<Namespace> = Api::all(self.client().await?);

        let list = namespaces.list(&ListParams::default()).await.map_err(|e| {
            error!("Failed to list namespaces: {}", e);
            KubeAgentError::from(e)
        })?;

        debug!("Listed {} namespaces", list.items.len());
        Ok(NamespaceList::from_namespaces(&list.items))
    }

    pub async fn pod_logs(
        &self,
        pod_name: &str,
        namespace: &str,
        container: Option<String>,
        tail_lines: i64,
    ) -> Result<PodLogs, KubeAgentError> {
        let pods: Api<Pod> = Api::namespaced(self.client().await?, namespace);

        let params = LogParams {
            container: container.clone(),
            tail_lines: Some(tail_lines),
            ..Default::default()
        };

        let logs = pods.logs(pod_name, &params).await.map_err(|e| {
            error!("Failed to read logs for {}/{}: {}", namespace, pod_name, e);
            KubeAgentError::from(e)
        })?;

        debug!("Read {} bytes of logs from {}/{}", logs.len(), namespace, pod_name);
        Ok(PodLogs::new(
            pod_name.to_string(),
            namespace.to_string(),
            container,
            logs,
        ))
    }

    /// Cheap liveness check: lists at most one namespace.
    pub async fn ping(&self) -> Result<(), KubeAgentError> {
        let namespaces: Api<Namespace> = Api::all(self.client().await?);
        namespaces.list(&ListParams::default().limit(1)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_keywords_parse_to_kinds() {
        for (keyword, kind) in [
            ("pod", ResourceKind::Pods),
            ("pods", ResourceKind::Pods),
            ("deploy", ResourceKind::Deployments),
            ("deployments", ResourceKind::Deployments),
            ("svc", ResourceKind::Services),
            ("service", ResourceKind::Services),
            ("ns", ResourceKind::Namespaces),
            ("namespaces", ResourceKind::Namespaces),
        ] {
            assert_eq!(keyword.parse::<ResourceKind>().unwrap(), kind, "{}", keyword);
        }
    }

    #[test]
    fn unknown_resource_keyword_is_a_contract_error() {
        let err = "configmaps".parse::<ResourceKind>().unwrap_err();
        assert_eq!(
            err.to_envelope(),
            serde_json::json!({ "error": "Resource type 'configmaps' not supported" })
        );
    }
}
