use super::{labels, timestamp};
use k8s_openapi::api::core::v1::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceRecord {
    pub name: Option<String>,
    pub status: Option<String>,
    pub created: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl From<&Namespace> for NamespaceRecord {
    fn from(namespace: &Namespace) -> Self {
        NamespaceRecord {
            name: namespace.metadata.name.clone(),
            status: namespace.status.as_ref().and_then(|s| s.phase.clone()),
            created: timestamp(namespace.metadata.creation_timestamp.as_ref()),
            labels: labels(&namespace.metadata),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceList {
    pub namespaces: Vec<NamespaceRecord>,
    pub total_count: usize,
}

impl NamespaceList {
    pub fn from_namespaces(items: &[Namespace]) -> Self {
        let namespaces: Vec<NamespaceRecord> = items.iter().map(NamespaceRecord::from).collect();
        NamespaceList {
            total_count: namespaces.len(),
            namespaces,
        }
    }
}
