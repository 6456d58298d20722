pub mod deployment;
pub mod namespace;
pub mod pod;
pub mod service;

pub use deployment::DeploymentList;
pub use namespace::NamespaceList;
pub use pod::{PodList, PodLogs};
pub use service::ServiceList;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use std::collections::BTreeMap;

/// ISO-8601 rendering of an optional API timestamp.
pub(crate) fn timestamp(time: Option<&Time>) -> Option<String> {
    time.map(|t| t.0.to_rfc3339())
}

pub(crate) fn labels(meta: &ObjectMeta) -> BTreeMap<String, String> {
    meta.labels.clone().unwrap_or_default()
}
