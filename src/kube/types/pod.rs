use super::{labels, timestamp};
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub name: String,
    pub image: Option<String>,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRecord {
    pub name: Option<String>,
    pub namespace: Option<String>,
    /// Pod phase, e.g. `Running`.
    pub status: Option<String>,
    pub node: Option<String>,
    pub created: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub containers: Vec<ContainerRecord>,
}

impl From<&Pod> for PodRecord {
    fn from(pod: &Pod) -> Self {
        let statuses = pod
            .status
            .as_ref()
            .and_then(|s| s.container_statuses.as_deref())
            .unwrap_or_default();

        // A container missing from the status list is not ready.
        let containers = pod
            .spec
            .as_ref()
            .map(|spec| {
                spec.containers
                    .iter()
                    .map(|container| ContainerRecord {
                        name: container.name.clone(),
                        image: container.image.clone(),
                        ready: statuses
                            .iter()
                            .any(|cs| cs.name == container.name && cs.ready),
                    })
                    .collect()
            })
            .unwrap_or_default();

        PodRecord {
            name: pod.metadata.name.clone(),
            namespace: pod.metadata.namespace.clone(),
            status: pod.status.as_ref().and_then(|s| s.phase.clone()),
            node: pod.spec.as_ref().and_then(|s| s.node_name.clone()),
            created: timestamp(pod.metadata.creation_timestamp.as_ref()),
            labels: labels(&pod.metadata),
            containers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodList {
    pub pods: Vec<PodRecord>,
    pub total_count: usize,
}

impl PodList {
    pub fn from_pods(items: &[Pod]) -> Self {
        let pods: Vec<PodRecord> = items.iter().map(PodRecord::from).collect();
        PodList {
            total_count: pods.len(),
            pods,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodLogs {
    pub pod_name: String,
    pub namespace: String,
    pub container: Option<String>,
    pub logs: String,
    pub lines_retrieved: usize,
}

impl PodLogs {
    pub fn new(pod_name: String, namespace: String, container: Option<String>, logs: String) -> Self {
        let lines_retrieved = if logs.is_empty() {
            0
        } else {
            logs.split('\n').count()
        };
        PodLogs {
            pod_name,
            namespace,
            container,
            logs,
            lines_retrieved,
        }
    }
}
