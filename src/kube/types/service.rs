use super::{labels, timestamp};
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePortRecord {
    pub name: Option<String>,
    pub port: i32,
    /// Either a port number or a named container port.
    pub target_port: Option<IntOrString>,
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: Option<String>,
    pub namespace: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub cluster_ip: Option<String>,
    pub external_ips: Vec<String>,
    pub ports: Vec<ServicePortRecord>,
    pub selector: BTreeMap<String, String>,
    pub created: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl From<&Service> for ServiceRecord {
    fn from(service: &Service) -> Self {
        let spec = service.spec.as_ref();

        ServiceRecord {
            name: service.metadata.name.clone(),
            namespace: service.metadata.namespace.clone(),
            type_: spec.and_then(|s| s.type_.clone()),
            cluster_ip: spec.and_then(|s| s.cluster_ip.clone()),
            external_ips: spec.and_then(|s| s.external_ips.clone()).unwrap_or_default(),
            ports: spec
                .and_then(|s| s.ports.as_ref())
                .map(|ports| {
                    ports
                        .iter()
                        .map(|p| ServicePortRecord {
                            name: p.name.clone(),
                            port: p.port,
                            target_port: p.target_port.clone(),
                            protocol: p.protocol.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default(),
            selector: spec.and_then(|s| s.selector.clone()).unwrap_or_default(),
            created: timestamp(service.metadata.creation_timestamp.as_ref()),
            labels: labels(&service.metadata),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceList {
    pub services: Vec<ServiceRecord>,
    pub total_count: usize,
}

impl ServiceList {
    pub fn from_services(items: &[Service]) -> Self {
        let services: Vec<ServiceRecord> = items.iter().map(ServiceRecord::from).collect();
        ServiceList {
            total_count: services.len(),
            services,
        }
    }
}
