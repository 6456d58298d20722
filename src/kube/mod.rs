pub mod connection;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod exec;
pub mod helm;
pub mod logs;
pub mod port_forward;
pub mod process;
pub mod reader;
pub mod tools;
pub mod types;

pub use connection::{ConnectionProvider, CredentialMode, KubeClientFactory};
pub use envelope::CommandResult;
pub use error::KubeAgentError;

use dispatcher::CommandDispatcher;
use envelope::Fields;
use helm::HelmOperations;
use port_forward::PortForwardRegistry;
use process::{ProcessRunner, SystemRunner};
use reader::ResourceReader;
use std::sync::Arc;
use tracing::*;

/// Startup settings for a [`KubernetesConnector`].
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub credentials: CredentialMode,
    pub kubectl_path: String,
    pub helm_path: String,
}

/// Everything a tool needs to talk to the cluster: the shared API handle,
/// the kubectl/helm front ends and the port-forward sessions.
///
/// Built once in `main` and shared behind an `Arc`.
pub struct KubernetesConnector {
    provider: Arc<ConnectionProvider>,
    reader: ResourceReader,
    dispatcher: CommandDispatcher,
    helm: HelmOperations,
    port_forwards: PortForwardRegistry,
}

impl KubernetesConnector {
    pub fn new(config: ConnectorConfig) -> Self {
        Self::with_runner(config, Arc::new(SystemRunner))
    }

    pub fn with_runner(config: ConnectorConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        info!(
            "Configuring Kubernetes connector ({:?}, kubectl: {}, helm: {})",
            config.credentials, config.kubectl_path, config.helm_path
        );

        let provider = Arc::new(ConnectionProvider::new(KubeClientFactory::new(
            config.credentials,
        )));

        KubernetesConnector {
            reader: ResourceReader::new(provider.clone()),
            dispatcher: CommandDispatcher::new(runner.clone(), config.kubectl_path.clone()),
            helm: HelmOperations::new(runner.clone(), config.helm_path),
            port_forwards: PortForwardRegistry::new(runner, config.kubectl_path),
            provider,
        }
    }

    /// Builds the shared API handle now instead of on first use.
    pub async fn connect(&self) -> Result<(), KubeAgentError> {
        self.provider.handle().await.map(|_| ())
    }

    pub fn reader(&self) -> &ResourceReader {
        &self.reader
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn helm(&self) -> &HelmOperations {
        &self.helm
    }

    pub fn port_forwards(&self) -> &PortForwardRegistry {
        &self.port_forwards
    }

    pub async fn ping(&self) -> CommandResult {
        match self.reader.ping().await {
            Ok(()) => CommandResult::success(
                Fields::new(),
                "message",
                "Kubernetes API connection is active",
            ),
            Err(e) => {
                warn!("Kubernetes ping failed: {}", e);
                CommandResult::error(Fields::new(), e.to_string())
            }
        }
    }

    /// Stops every port forward and closes the API handle.
    pub async fn cleanup(&self) -> CommandResult {
        let stopped = self.port_forwards.stop(None).await;
        debug!("Port forward cleanup: {:?}", stopped.message());

        debug!(
            "Closing Kubernetes connection (connected: {})",
            self.provider.is_connected().await
        );
        self.provider.close().await;
        info!("Kubernetes connector cleaned up");
        CommandResult::success(
            Fields::new(),
            "message",
            "Cleaned up managed Kubernetes resources",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube::process::testing::FakeRunner;
    use serde_json::json;

    pub(crate) fn test_connector(runner: Arc<FakeRunner>) -> KubernetesConnector {
        KubernetesConnector::with_runner(
            ConnectorConfig {
                credentials: CredentialMode::Explicit(None),
                kubectl_path: "kubectl".to_string(),
                helm_path: "helm".to_string(),
            },
            runner,
        )
    }

    #[tokio::test]
    async fn missing_kubeconfig_fails_connect() {
        let connector = test_connector(Arc::new(FakeRunner::succeeding("")));
        assert!(matches!(
            connector.connect().await,
            Err(KubeAgentError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn ping_reports_connection_errors_as_envelopes() {
        let connector = test_connector(Arc::new(FakeRunner::succeeding("")));
        let result = connector.ping().await;
        assert_eq!(
            result.to_value(),
            json!({
                "status": "error",
                "message": "Configuration error: Could not load any Kubernetes configuration",
            })
        );
    }

    #[tokio::test]
    async fn cleanup_closes_the_provider() {
        let connector = test_connector(Arc::new(FakeRunner::succeeding("")));
        let result = connector.cleanup().await;
        assert_eq!(
            result.to_value(),
            json!({ "status": "success", "message": "Cleaned up managed Kubernetes resources" })
        );

        let ping = connector.ping().await;
        assert_eq!(
            ping.message(),
            Some("Configuration error: Kubernetes connection has been closed")
        );
    }
}
