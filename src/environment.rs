use crate::kube::CredentialMode;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub struct Environment {
    pub openai_api_key: String,
    pub chat_api_key: String, // Required in the X-API-Key header of every request
    pub development_mode: bool,
    pub kubernetes_config_file: Option<PathBuf>,
    pub kubectl_path: String,
    pub helm_path: String,
    pub server_host: String,
}

fn var_or(name: &str, default: &str) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => {
            debug!("{} loaded from environment", name);
            value
        }
        _ => {
            debug!("{} not set, defaulting to {}", name, default);
            default.to_string()
        }
    }
}

impl Environment {
    pub fn new() -> Self {
        let openai_api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) => {
                debug!("OPENAI_API_KEY loaded from environment");
                key
            }
            Err(_) => {
                warn!("OPENAI_API_KEY not found in environment, using empty string");
                String::new()
            }
        };

        let chat_api_key = match std::env::var("CHAT_API_KEY") {
            Ok(key) => {
                debug!("CHAT_API_KEY loaded from environment");
                key
            }
            Err(_) => {
                warn!("CHAT_API_KEY not found in environment, using empty string");
                String::new()
            }
        };

        let development_mode = match std::env::var("ENV") {
            Ok(val) => {
                let is_development = val == "DEVELOPMENT";
                info!("Development mode: {}", is_development);
                is_development
            }
            Err(_) => {
                debug!("ENV not set, using in-cluster credentials");
                false
            }
        };

        let kubernetes_config_file = match std::env::var("KUBERNETES_CONFIG_FILE") {
            Ok(path) => {
                debug!("KUBERNETES_CONFIG_FILE loaded from environment");
                Some(PathBuf::from(path))
            }
            Err(_) => {
                if development_mode {
                    warn!("KUBERNETES_CONFIG_FILE not found in environment");
                }
                None
            }
        };

        Environment {
            openai_api_key,
            chat_api_key,
            development_mode,
            kubernetes_config_file,
            kubectl_path: var_or("KUBECTL_PATH", "kubectl"),
            helm_path: var_or("HELM_PATH", "helm"),
            server_host: var_or("SERVER_HOST", "0.0.0.0:8080"),
        }
    }

    /// Development reads an explicit kubeconfig; anything else uses the
    /// pod's service account.
    pub fn credential_mode(&self) -> CredentialMode {
        if self.development_mode {
            CredentialMode::Explicit(self.kubernetes_config_file.clone())
        } else {
            CredentialMode::Ambient
        }
    }
}
