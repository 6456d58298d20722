use crate::kube::error::KubeAgentError;
use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::*;

/// Where cluster credentials come from. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialMode {
    /// Service-account credentials mounted into the pod.
    Ambient,
    /// A kubeconfig file on disk.
    Explicit(Option<PathBuf>),
}

/// Builds the underlying client handle.
#[async_trait]
pub trait HandleFactory: Send + Sync {
    type Handle: Clone + Send + Sync;

    async fn connect(&self) -> Result<Self::Handle, KubeAgentError>;
}

/// Creates `kube::Client`s for a [`CredentialMode`].
pub struct KubeClientFactory {
    mode: CredentialMode,
}

impl KubeClientFactory {
    pub fn new(mode: CredentialMode) -> Self {
        KubeClientFactory { mode }
    }

    async fn load_config(&self) -> Result<kube::Config, KubeAgentError> {
        match &self.mode {
            CredentialMode::Ambient => {
                let config = kube::Config::incluster().map_err(|e| {
                    error!("Failed to load in-cluster configuration: {}", e);
                    KubeAgentError::Configuration(format!("in-cluster configuration: {}", e))
                })?;
                info!("Loaded in-cluster Kubernetes configuration");
                Ok(config)
            }
            CredentialMode::Explicit(path) => {
                let path = match path {
                    Some(p) if p.is_file() => p,
                    _ => {
                        error!(
                            "Failed to load kubeconfig, check that the file exists: {:?}",
                            path
                        );
                        return Err(KubeAgentError::Configuration(
                            "Could not load any Kubernetes configuration".to_string(),
                        ));
                    }
                };

                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    KubeAgentError::Configuration(format!("{}: {}", path.display(), e))
                })?;
                let config =
                    kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                        .await
                        .map_err(|e| {
                            KubeAgentError::Configuration(format!("{}: {}", path.display(), e))
                        })?;
                info!("Loaded kubeconfig from {}", path.display());
                Ok(config)
            }
        }
    }
}

#[async_trait]
impl HandleFactory for KubeClientFactory {
    type Handle = kube::Client;

    async fn connect(&self) -> Result<kube::Client, KubeAgentError> {
        let config = self.load_config().await?;
        let client = kube::Client::try_from(config)?;
        debug!("Kubernetes client created");
        Ok(client)
    }
}

/// Lazily creates one shared handle and hands out clones of it.
///
/// Concurrent first callers wait on the same initialization; the factory
/// runs at most once per successful connect. Later calls never rebuild the
/// handle, whatever their arguments. A failed connect is not cached.
pub struct ConnectionProvider<F: HandleFactory = KubeClientFactory> {
    factory: F,
    handle: RwLock<Option<F::Handle>>,
    closed: AtomicBool,
}

impl<F: HandleFactory> ConnectionProvider<F> {
    pub fn new(factory: F) -> Self {
        ConnectionProvider {
            factory,
            handle: RwLock::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn closed_error() -> KubeAgentError {
        KubeAgentError::Configuration("Kubernetes connection has been closed".to_string())
    }

    pub async fn handle(&self) -> Result<F::Handle, KubeAgentError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Self::closed_error());
        }
        if let Some(handle) = self.handle.read().await.as_ref() {
            return Ok(handle.clone());
        }

        let mut slot = self.handle.write().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(Self::closed_error());
        }
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }

        let handle = self.factory.connect().await?;
        *slot = Some(handle.clone());
        Ok(handle)
    }

    pub async fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.handle.read().await.is_some()
    }

    /// Refuses further use and drops the provider's handle. Clones already
    /// handed out stay valid until their holders drop them.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if self.handle.write().await.take().is_some() {
            debug!("Released Kubernetes client");
        }
    }
}
