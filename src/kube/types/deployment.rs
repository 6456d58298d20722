use super::{labels, timestamp};
use k8s_openapi::api::apps::v1::Deployment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub replicas: Option<i32>,
    pub ready_replicas: i32,
    pub available_replicas: i32,
    pub updated_replicas: i32,
    pub created: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub selector: BTreeMap<String, String>,
}

impl From<&Deployment> for DeploymentRecord {
    fn from(deployment: &Deployment) -> Self {
        let spec = deployment.spec.as_ref();
        let status = deployment.status.as_ref();

        DeploymentRecord {
            name: deployment.metadata.name.clone(),
            namespace: deployment.metadata.namespace.clone(),
            replicas: spec.and_then(|s| s.replicas),
            ready_replicas: status.and_then(|s| s.ready_replicas).unwrap_or(0),
            available_replicas: status.and_then(|s| s.available_replicas).unwrap_or(0),
            updated_replicas: status.and_then(|s| s.updated_replicas).unwrap_or(0),
            created: timestamp(deployment.metadata.creation_timestamp.as_ref()),
            labels: labels(&deployment.metadata),
            selector: spec
                .and_then(|s| s.selector.match_labels.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentList {
    pub deployments: Vec<DeploymentRecord>,
    pub total_count: usize,
}

impl DeploymentList {
    pub fn from_deployments(items: &[Deployment]) -> Self {
        let deployments: Vec<DeploymentRecord> =
            items.iter().map(DeploymentRecord::from).collect();
        DeploymentList {
            total_count: deployments.len(),
            deployments,
        }
    }
}
